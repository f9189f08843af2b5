// --- File: src/core/trie.rs
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const ROOT: usize = 0;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct TrieNode<V> {
    children: HashMap<char, usize>,
    is_terminal: bool,
    value: Option<V>,
}

impl<V> TrieNode<V> {
    fn new() -> Self {
        Self { children: HashMap::new(), is_terminal: false, value: None }
    }
}

/// A character-keyed prefix tree storing one value per complete key.
///
/// Nodes live in a flat arena and refer to their children by index. Slots of
/// pruned nodes are recycled through a free list, so long-lived tries that
/// see many live edits do not grow without bound.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Trie<V = String> {
    nodes: Vec<TrieNode<V>>,
    free: Vec<usize>,
    count: usize,
}

impl<V> Default for Trie<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Trie<V> {
    pub fn new() -> Self {
        Self { nodes: vec![TrieNode::new()], free: Vec::new(), count: 0 }
    }

    /// Number of terminal entries.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn alloc(&mut self) -> usize {
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = TrieNode::new();
                idx
            }
            None => {
                self.nodes.push(TrieNode::new());
                self.nodes.len() - 1
            }
        }
    }

    /// Inserts `value` under `key`, replacing any previous value for that
    /// exact key. O(k) where k is the key length in chars.
    pub fn insert(&mut self, key: &str, value: V) {
        let mut node_idx = ROOT;
        for ch in key.chars() {
            let next_idx = if let Some(&id) = self.nodes[node_idx].children.get(&ch) {
                id
            } else {
                let new_node_id = self.alloc();
                self.nodes[node_idx].children.insert(ch, new_node_id);
                new_node_id
            };
            node_idx = next_idx;
        }

        let node = &mut self.nodes[node_idx];
        if !node.is_terminal {
            node.is_terminal = true;
            self.count += 1;
        }
        node.value = Some(value);
    }

    /// Inserts many entries. Entries are sorted by key first so that shared
    /// prefixes are walked back to back; for duplicate keys the last one in
    /// the input wins, exactly as with sequential `insert`.
    pub fn batch_insert<K, I>(&mut self, entries: I)
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut entries: Vec<(K, V)> = entries.into_iter().collect();
        // Stable sort keeps input order among equal keys.
        entries.sort_by(|a, b| a.0.as_ref().cmp(b.0.as_ref()));
        for (key, value) in entries {
            self.insert(key.as_ref(), value);
        }
    }

    fn node_for(&self, key: &str) -> Option<usize> {
        let mut node_idx = ROOT;
        for ch in key.chars() {
            node_idx = *self.nodes[node_idx].children.get(&ch)?;
        }
        Some(node_idx)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.node_for(key).is_some_and(|idx| self.nodes[idx].is_terminal)
    }

    pub fn find(&self, key: &str) -> Option<&V> {
        let node = &self.nodes[self.node_for(key)?];
        if node.is_terminal {
            node.value.as_ref()
        } else {
            None
        }
    }

    /// Longest terminal key that is a prefix of `text[start..]`.
    ///
    /// Returns the match length in chars together with its value, or
    /// `(0, None)` when no terminal node is crossed. Non-terminal path
    /// prefixes are never reported. O(m) where m is the length of the
    /// longest path shared with the text.
    pub fn find_longest_prefix(&self, text: &[char], start: usize) -> (usize, Option<&V>) {
        let mut node_idx = ROOT;
        let mut best: (usize, Option<&V>) = (0, None);

        for (offset, ch) in text.iter().skip(start).enumerate() {
            match self.nodes[node_idx].children.get(ch) {
                Some(&next_idx) => node_idx = next_idx,
                None => break,
            }
            let node = &self.nodes[node_idx];
            if node.is_terminal {
                best = (offset + 1, node.value.as_ref());
            }
        }
        best
    }

    /// Removes `key`, pruning childless non-terminal ancestors. The root is
    /// never pruned. Returns whether an entry was removed.
    pub fn remove(&mut self, key: &str) -> bool {
        let mut path = Vec::with_capacity(key.len() + 1);
        path.push((ROOT, None));
        let mut node_idx = ROOT;
        for ch in key.chars() {
            match self.nodes[node_idx].children.get(&ch) {
                Some(&next_idx) => {
                    node_idx = next_idx;
                    path.push((node_idx, Some(ch)));
                }
                None => return false,
            }
        }

        let node = &mut self.nodes[node_idx];
        if !node.is_terminal {
            return false;
        }
        node.is_terminal = false;
        node.value = None;
        self.count -= 1;

        // Walk back up, detaching nodes that no longer lead anywhere.
        while path.len() > 1 {
            let (idx, ch) = path[path.len() - 1];
            let node = &self.nodes[idx];
            if node.is_terminal || !node.children.is_empty() {
                break;
            }
            path.pop();
            let (parent, _) = path[path.len() - 1];
            if let Some(ch) = ch {
                self.nodes[parent].children.remove(&ch);
            }
            self.free.push(idx);
        }
        true
    }

    /// Every (key, value) pair, depth first. Diagnostics only.
    pub fn all_entries(&self) -> Vec<(String, &V)> {
        let mut entries = Vec::with_capacity(self.count);
        let mut stack = vec![(ROOT, String::new())];
        while let Some((idx, key)) = stack.pop() {
            let node = &self.nodes[idx];
            if node.is_terminal {
                if let Some(value) = node.value.as_ref() {
                    entries.push((key.clone(), value));
                }
            }
            for (&ch, &child) in &node.children {
                let mut child_key = key.clone();
                child_key.push(ch);
                stack.push((child, child_key));
            }
        }
        entries
    }
}

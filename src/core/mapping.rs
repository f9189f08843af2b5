// File: src/core/mapping.rs
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Correspondence between one span of the source text and its translation.
/// Offsets are char offsets; `*_end` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub original: String,
    pub translated: String,
    pub orig_start: usize,
    pub orig_end: usize,
    pub trans_start: usize,
    pub trans_end: usize,
}

/// A located segment returned by the lookup methods.
///
/// `text` is the dictionary side of the block as segmented. `start..end`
/// is where it sits in the other text, which after rephrasing may differ
/// from `text` in letter case (a capitalized sentence start).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Ordered blocks of one translation plus content indexes for reverse lookup.
///
/// Blocks tile the original text in order. Before rephrasing they also tile
/// the raw token concatenation; after [`TranslationMapping::relocate`] the
/// translated spans point into the final prose, stay ordered and
/// non-overlapping, and the gaps between them are separator whitespace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslationMapping {
    blocks: Vec<Block>,
    #[serde(skip)]
    by_original: HashMap<String, Vec<usize>>,
    #[serde(skip)]
    by_translated: HashMap<String, Vec<usize>>,
    orig_cursor: usize,
    trans_cursor: usize,
}

impl TranslationMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Length of the covered original text, in chars.
    pub fn original_len(&self) -> usize {
        self.orig_cursor
    }

    /// Length of the covered translated text, in chars.
    pub fn translated_len(&self) -> usize {
        self.trans_cursor
    }

    fn index(&mut self, idx: usize) {
        let block = &self.blocks[idx];
        self.by_original.entry(block.original.clone()).or_default().push(idx);
        self.by_translated.entry(block.translated.clone()).or_default().push(idx);
    }

    /// Appends a block at the running cursors and advances them.
    pub fn add_block(&mut self, original: &str, translated: &str) -> usize {
        let orig_len = original.chars().count();
        let trans_len = translated.chars().count();
        let block = Block {
            original: original.to_string(),
            translated: translated.to_string(),
            orig_start: self.orig_cursor,
            orig_end: self.orig_cursor + orig_len,
            trans_start: self.trans_cursor,
            trans_end: self.trans_cursor + trans_len,
        };
        self.orig_cursor += orig_len;
        self.trans_cursor += trans_len;
        self.blocks.push(block);
        let idx = self.blocks.len() - 1;
        self.index(idx);
        idx
    }

    /// Moves every block of `other` behind the blocks already present,
    /// shifting its offsets by the current cursors.
    pub fn append(&mut self, other: TranslationMapping) {
        let orig_base = self.orig_cursor;
        let trans_base = self.trans_cursor;
        for mut block in other.blocks {
            block.orig_start += orig_base;
            block.orig_end += orig_base;
            block.trans_start += trans_base;
            block.trans_end += trans_base;
            self.blocks.push(block);
            let idx = self.blocks.len() - 1;
            self.index(idx);
        }
        self.orig_cursor = orig_base + other.orig_cursor;
        self.trans_cursor = trans_base + other.trans_cursor;
    }

    /// Re-anchors translated spans onto `final_text` after rephrasing.
    ///
    /// Each block's trimmed translation is searched for from a cursor that
    /// only moves forward, ignoring letter case and requiring a word
    /// boundary before word-initial matches. Blank translations get a
    /// zero-width span at the cursor.
    pub fn relocate(&mut self, final_text: &str) {
        let haystack: Vec<char> = final_text.chars().collect();
        let mut cursor = 0;
        for block in &mut self.blocks {
            let needle: Vec<char> = block.translated.trim().chars().collect();
            let found = if needle.is_empty() {
                None
            } else {
                find_word(&haystack, &needle, cursor)
            };
            match found {
                Some(pos) => {
                    block.trans_start = pos;
                    block.trans_end = pos + needle.len();
                    cursor = block.trans_end;
                }
                None => {
                    block.trans_start = cursor;
                    block.trans_end = cursor;
                }
            }
        }
        self.trans_cursor = haystack.len();
    }

    /// Translation of `original_text`. With several candidates and a
    /// `near` position, the block whose `orig_start` is closest wins (first
    /// found on ties); otherwise the first occurrence.
    ///
    /// The returned text is the block's translation before capitalization;
    /// slice the final prose with `start..end` for what is displayed.
    pub fn get_translated_segment(&self, original_text: &str, near: Option<usize>) -> Option<Segment> {
        let idx = pick(&self.blocks, self.by_original.get(original_text)?, near, |b| b.orig_start)?;
        let block = &self.blocks[idx];
        Some(Segment { text: block.translated.clone(), start: block.trans_start, end: block.trans_end })
    }

    /// Symmetric to [`Self::get_translated_segment`], keyed by translated text
    /// and measured against `trans_start`.
    pub fn get_original_segment(&self, translated_text: &str, near: Option<usize>) -> Option<Segment> {
        let idx = pick(&self.blocks, self.by_translated.get(translated_text)?, near, |b| b.trans_start)?;
        let block = &self.blocks[idx];
        Some(Segment { text: block.original.clone(), start: block.orig_start, end: block.orig_end })
    }

    /// Block covering char `pos` of the translated text, if any.
    pub fn block_at_translated(&self, pos: usize) -> Option<&Block> {
        self.blocks.iter().find(|b| b.trans_start <= pos && pos < b.trans_end)
    }

    /// Block covering char `pos` of the original text, if any.
    pub fn block_at_original(&self, pos: usize) -> Option<&Block> {
        let idx = self.blocks.partition_point(|b| b.orig_end <= pos);
        self.blocks.get(idx).filter(|b| b.orig_start <= pos && pos < b.orig_end)
    }

    /// Rebuilds the content indexes, which are not serialized.
    pub fn reindex(&mut self) {
        self.by_original.clear();
        self.by_translated.clear();
        for idx in 0..self.blocks.len() {
            self.index(idx);
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let mut mapping: TranslationMapping = serde_json::from_str(json)?;
        mapping.reindex();
        Ok(mapping)
    }
}

fn pick(blocks: &[Block], candidates: &[usize], near: Option<usize>, key: impl Fn(&Block) -> usize) -> Option<usize> {
    match near {
        Some(pos) if candidates.len() > 1 => candidates
            .iter()
            .copied()
            // min_by_key keeps the first of equal minima.
            .min_by_key(|&idx| key(&blocks[idx]).abs_diff(pos)),
        _ => candidates.first().copied(),
    }
}

fn chars_eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

fn find_word(haystack: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    let needs_boundary = needle[0].is_alphanumeric();
    (from..=haystack.len() - needle.len()).find(|&pos| {
        if needs_boundary && pos > 0 && haystack[pos - 1].is_alphanumeric() {
            return false;
        }
        haystack[pos..pos + needle.len()]
            .iter()
            .zip(needle)
            .all(|(&h, &n)| chars_eq_ignore_case(h, n))
    })
}

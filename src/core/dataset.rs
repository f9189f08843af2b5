// File: src/core/dataset.rs
use crate::core::trie::Trie;
use crate::core::types::{CedictEntry, DictionarySlot};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

pub type PhraseTrie = Trie<String>;
pub type CedictTrie = Trie<Vec<CedictEntry>>;
pub type FallbackTable = HashMap<char, String>;

/// Where one table came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub slot: DictionarySlot,
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<SystemTime>,
    pub entries: usize,
}

/// A freshly parsed table, ready to be slotted into a dataset.
#[derive(Debug, Clone)]
pub enum LoadedTable {
    Phrase(PhraseTrie),
    Fallback(FallbackTable),
    Cedict(CedictTrie),
}

impl LoadedTable {
    pub fn entries(&self) -> usize {
        match self {
            LoadedTable::Phrase(trie) => trie.count(),
            LoadedTable::Fallback(table) => table.len(),
            LoadedTable::Cedict(trie) => trie.count(),
        }
    }
}

/// Everything a translation needs, immutable once published.
///
/// Tables sit behind `Arc`s so that replacing one of them (selective
/// reload, live edit) shares the untouched ones with the previous dataset.
#[derive(Debug, Clone)]
pub struct EngineDataset {
    names2: Arc<PhraseTrie>,
    names: Arc<PhraseTrie>,
    viet_phrase: Arc<PhraseTrie>,
    phien_am: Arc<FallbackTable>,
    cedict: Arc<CedictTrie>,
    files: Vec<FileInfo>,
    loaded_at: SystemTime,
    generation: u64,
}

impl Default for EngineDataset {
    fn default() -> Self {
        Self {
            names2: Arc::default(),
            names: Arc::default(),
            viet_phrase: Arc::default(),
            phien_am: Arc::default(),
            cedict: Arc::default(),
            files: Vec::new(),
            loaded_at: SystemTime::now(),
            generation: 0,
        }
    }
}

impl EngineDataset {
    pub fn builder() -> DatasetBuilder {
        DatasetBuilder::default()
    }

    pub fn phrase_trie(&self, slot: DictionarySlot) -> Option<&PhraseTrie> {
        match slot {
            DictionarySlot::Names2 => Some(&self.names2),
            DictionarySlot::Names => Some(&self.names),
            DictionarySlot::VietPhrase => Some(&self.viet_phrase),
            DictionarySlot::PhienAm | DictionarySlot::Cedict => None,
        }
    }

    pub fn phien_am(&self) -> &FallbackTable {
        &self.phien_am
    }

    pub fn fallback(&self, c: char) -> Option<&str> {
        self.phien_am.get(&c).map(String::as_str)
    }

    pub fn cedict(&self) -> &CedictTrie {
        &self.cedict
    }

    pub fn files(&self) -> &[FileInfo] {
        &self.files
    }

    pub fn file_info(&self, slot: DictionarySlot) -> Option<&FileInfo> {
        self.files.iter().find(|f| f.slot == slot)
    }

    pub fn loaded_at(&self) -> SystemTime {
        self.loaded_at
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn entry_count(&self, slot: DictionarySlot) -> usize {
        match slot {
            DictionarySlot::Names2 => self.names2.count(),
            DictionarySlot::Names => self.names.count(),
            DictionarySlot::VietPhrase => self.viet_phrase.count(),
            DictionarySlot::PhienAm => self.phien_am.len(),
            DictionarySlot::Cedict => self.cedict.count(),
        }
    }

    /// Whether at least one phrase dictionary has entries.
    pub fn has_phrase_entries(&self) -> bool {
        DictionarySlot::PHRASE_ORDER.iter().any(|&slot| self.entry_count(slot) > 0)
    }

    /// Copy of this dataset with the table for `slot` swapped out.
    pub fn with_table(&self, slot: DictionarySlot, table: LoadedTable, info: Option<FileInfo>) -> Self {
        let mut next = self.clone();
        match (slot, table) {
            (DictionarySlot::Names2, LoadedTable::Phrase(trie)) => next.names2 = Arc::new(trie),
            (DictionarySlot::Names, LoadedTable::Phrase(trie)) => next.names = Arc::new(trie),
            (DictionarySlot::VietPhrase, LoadedTable::Phrase(trie)) => next.viet_phrase = Arc::new(trie),
            (DictionarySlot::PhienAm, LoadedTable::Fallback(table)) => next.phien_am = Arc::new(table),
            (DictionarySlot::Cedict, LoadedTable::Cedict(trie)) => next.cedict = Arc::new(trie),
            (slot, table) => {
                tracing::error!(%slot, entries = table.entries(), "table kind does not match slot, ignored");
                return next;
            }
        }
        next.files.retain(|f| f.slot != slot);
        if let Some(info) = info {
            next.files.push(info);
        }
        next
    }

    pub(crate) fn from_tables(
        names2: PhraseTrie,
        names: PhraseTrie,
        viet_phrase: PhraseTrie,
        phien_am: FallbackTable,
        cedict: CedictTrie,
        files: Vec<FileInfo>,
    ) -> Self {
        Self {
            names2: Arc::new(names2),
            names: Arc::new(names),
            viet_phrase: Arc::new(viet_phrase),
            phien_am: Arc::new(phien_am),
            cedict: Arc::new(cedict),
            files,
            loaded_at: SystemTime::now(),
            generation: 0,
        }
    }

    pub(crate) fn parts(&self) -> (&PhraseTrie, &PhraseTrie, &PhraseTrie, &FallbackTable, &CedictTrie) {
        (&self.names2, &self.names, &self.viet_phrase, &self.phien_am, &self.cedict)
    }

    pub(crate) fn stamp(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    pub(crate) fn touch(mut self, loaded_at: SystemTime) -> Self {
        self.loaded_at = loaded_at;
        self
    }
}

/// In-memory construction of a dataset, mainly for embedding and tests.
#[derive(Debug, Default)]
pub struct DatasetBuilder {
    dataset: EngineDataset,
}

impl DatasetBuilder {
    fn phrase(entries: &[(&str, &str)]) -> PhraseTrie {
        let mut trie = Trie::new();
        trie.batch_insert(entries.iter().map(|&(k, v)| (k, v.to_string())));
        trie
    }

    pub fn names2(mut self, entries: &[(&str, &str)]) -> Self {
        self.dataset.names2 = Arc::new(Self::phrase(entries));
        self
    }

    pub fn names(mut self, entries: &[(&str, &str)]) -> Self {
        self.dataset.names = Arc::new(Self::phrase(entries));
        self
    }

    pub fn viet_phrase(mut self, entries: &[(&str, &str)]) -> Self {
        self.dataset.viet_phrase = Arc::new(Self::phrase(entries));
        self
    }

    pub fn phien_am(mut self, entries: &[(char, &str)]) -> Self {
        self.dataset.phien_am = Arc::new(entries.iter().map(|&(c, v)| (c, v.to_string())).collect());
        self
    }

    pub fn cedict(mut self, entries: Vec<CedictEntry>) -> Self {
        self.dataset.cedict = Arc::new(crate::loader::build_cedict_trie(entries));
        self
    }

    pub fn build(self) -> EngineDataset {
        self.dataset
    }
}

/// Shared slot holding the live dataset.
///
/// Readers clone the `Arc` and keep using it for the whole call; publishing
/// replaces the pointer under a short write lock, so no reader ever sees a
/// half-built dataset.
#[derive(Debug, Default)]
pub struct DatasetHandle {
    current: RwLock<Option<Arc<EngineDataset>>>,
    generation: AtomicU64,
}

impl DatasetHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Option<Arc<EngineDataset>> {
        self.current.read().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.current.read().is_some()
    }

    /// Publishes `dataset` with the next generation number and returns it.
    pub fn publish(&self, dataset: EngineDataset) -> Arc<EngineDataset> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let dataset = Arc::new(dataset.stamp(generation));
        *self.current.write() = Some(Arc::clone(&dataset));
        dataset
    }

    /// Generation of the live dataset, 0 when none is loaded.
    pub fn generation(&self) -> u64 {
        self.current.read().as_ref().map_or(0, |d| d.generation())
    }
}

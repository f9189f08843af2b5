// File: src/loader.rs
use crate::config::EngineConfig;
use crate::core::dataset::{CedictTrie, EngineDataset, FallbackTable, FileInfo, LoadedTable, PhraseTrie};
use crate::core::trie::Trie;
use crate::core::types::{CedictEntry, DictionarySlot};
use crate::error::{LoadError, LoadResult};
use crate::persistence::{self, FileStamp};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::thread;
use std::time::SystemTime;
use tracing::{debug, info, warn};

const BOM: char = '\u{feff}';

/// Parses `key=value` lines. Blank lines, `#` comments, lines without `=`
/// and lines with an empty key are dropped. The value is kept raw.
pub fn parse_key_value(content: &str) -> Vec<(String, String)> {
    content
        .trim_start_matches(BOM)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim()))
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

/// Parses one CC-CEDICT line: `Traditional Simplified [pin1 yin1] /def1/def2/`.
pub fn parse_cedict_line(line: &str) -> Option<CedictEntry> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (traditional, rest) = line.split_once(' ')?;
    let (simplified, rest) = rest.trim_start().split_once(' ')?;
    let rest = rest.trim_start().strip_prefix('[')?;
    let (pinyin, rest) = rest.split_once(']')?;
    let definition = rest.trim().trim_matches('/').trim();
    if definition.is_empty() {
        return None;
    }
    Some(CedictEntry {
        traditional: traditional.to_string(),
        simplified: simplified.to_string(),
        pinyin: pinyin.trim().to_string(),
        definition: definition.to_string(),
    })
}

pub fn parse_cedict(content: &str) -> Vec<CedictEntry> {
    content.trim_start_matches(BOM).lines().filter_map(parse_cedict_line).collect()
}

/// Indexes entries under their traditional and, when different, simplified
/// form. Entries sharing a headword are kept in file order.
pub fn build_cedict_trie(entries: Vec<CedictEntry>) -> CedictTrie {
    let mut by_key: HashMap<String, Vec<CedictEntry>> = HashMap::new();
    for entry in entries {
        if entry.simplified != entry.traditional {
            by_key.entry(entry.simplified.clone()).or_default().push(entry.clone());
        }
        by_key.entry(entry.traditional.clone()).or_default().push(entry);
    }
    let mut trie = Trie::new();
    trie.batch_insert(by_key);
    trie
}

pub fn build_phrase_trie(entries: Vec<(String, String)>) -> PhraseTrie {
    let mut trie = Trie::new();
    trie.batch_insert(entries);
    trie
}

/// Keeps entries whose key is exactly one char; later lines win.
pub fn build_fallback(entries: Vec<(String, String)>) -> FallbackTable {
    let mut table = FallbackTable::new();
    for (key, value) in entries {
        let mut chars = key.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            table.insert(c, value);
        }
    }
    table
}

fn decode(bytes: Vec<u8>, path: &Path) -> String {
    String::from_utf8(bytes).unwrap_or_else(|err| {
        warn!(path = %path.display(), "dictionary is not valid UTF-8, replacing bad sequences");
        String::from_utf8_lossy(err.as_bytes()).into_owned()
    })
}

/// Builds datasets from the dictionary directory.
///
/// Files are parsed on a private worker pool, one table per worker.
pub struct DictionaryLoader {
    config: EngineConfig,
    pool: rayon::ThreadPool,
}

impl DictionaryLoader {
    pub fn new(config: EngineConfig) -> LoadResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.load_workers.max(1))
            .thread_name(|i| format!("dict-loader-{i}"))
            .build()
            .map_err(|e| LoadError::WorkerPool(e.to_string()))?;
        Ok(Self { config, pool })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current size and mtime of every configured file.
    pub fn fingerprint(&self) -> Vec<FileStamp> {
        self.config
            .files
            .configured()
            .into_iter()
            .map(|(slot, name)| FileStamp::of(slot, &self.config.data_dir.join(name)))
            .collect()
    }

    /// Loads every configured dictionary into a new dataset.
    pub fn load_all(&self) -> LoadResult<EngineDataset> {
        let fingerprint = self.fingerprint();
        if let Some(path) = &self.config.snapshot_path {
            match persistence::load_snapshot(path, &fingerprint) {
                Ok(Some(dataset)) => {
                    info!(path = %path.display(), "dictionaries restored from snapshot");
                    return Ok(dataset);
                }
                Ok(None) => debug!(path = %path.display(), "snapshot missing or stale"),
                Err(e) => warn!(error = %e, "ignoring unreadable snapshot"),
            }
        }

        let slots: Vec<DictionarySlot> = self.config.files.configured().into_iter().map(|(slot, _)| slot).collect();
        let results: Vec<LoadResult<(DictionarySlot, LoadedTable, Option<FileInfo>)>> = self.pool.install(|| {
            slots
                .par_iter()
                .map(|&slot| self.load_table(slot).map(|(table, info)| (slot, table, info)))
                .collect()
        });

        let mut dataset = EngineDataset::default();
        for result in results {
            let (slot, table, info) = result?;
            dataset = dataset.with_table(slot, table, info);
        }
        if !dataset.has_phrase_entries() {
            return Err(LoadError::EmptyDataset);
        }

        if let Some(path) = &self.config.snapshot_path {
            if let Err(e) = persistence::save_snapshot(&dataset, &fingerprint, path) {
                warn!(error = %e, "could not write dictionary snapshot");
            }
        }
        Ok(dataset.touch(SystemTime::now()))
    }

    /// Rebuilds only `slot`, sharing every other table with `current`.
    pub fn reload_slot(&self, current: &EngineDataset, slot: DictionarySlot) -> LoadResult<EngineDataset> {
        let (table, info) = self.pool.install(|| self.load_table(slot))?;
        let dataset = current.with_table(slot, table, info);
        if !dataset.has_phrase_entries() {
            return Err(LoadError::EmptyDataset);
        }
        Ok(dataset.touch(SystemTime::now()))
    }

    /// Reads and parses the file configured for `slot`. A missing optional
    /// file yields an empty table.
    pub fn load_table(&self, slot: DictionarySlot) -> LoadResult<(LoadedTable, Option<FileInfo>)> {
        let Some(path) = self.config.path_for(slot) else {
            return Ok((empty_table(slot), None));
        };

        let bytes = match self.read_with_retry(&path) {
            Ok(bytes) => bytes,
            Err(LoadError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                if slot.is_mandatory() {
                    return Err(LoadError::MissingFile { slot, path });
                }
                info!(%slot, path = %path.display(), "optional dictionary absent, using empty table");
                return Ok((empty_table(slot), None));
            }
            Err(e) => return Err(e),
        };
        let size = bytes.len() as u64;
        let content = decode(bytes, &path);

        let table = match slot {
            DictionarySlot::Cedict => LoadedTable::Cedict(build_cedict_trie(parse_cedict(&content))),
            DictionarySlot::PhienAm => LoadedTable::Fallback(build_fallback(parse_key_value(&content))),
            _ => LoadedTable::Phrase(build_phrase_trie(parse_key_value(&content))),
        };

        let entries = table.entries();
        info!(%slot, entries, path = %path.display(), "dictionary loaded");
        if entries < self.config.min_entries {
            warn!(%slot, entries, min = self.config.min_entries, "dictionary has fewer entries than expected");
        }

        let modified = fs::metadata(&path).and_then(|m| m.modified()).ok();
        Ok((table, Some(FileInfo { slot, path, size, modified, entries })))
    }

    fn read_with_retry(&self, path: &Path) -> LoadResult<Vec<u8>> {
        let attempts = self.config.retry_attempts.max(1);
        let mut attempt = 1;
        loop {
            let err = match fs::read(path) {
                Ok(bytes) => return Ok(bytes),
                Err(source) => LoadError::Io { path: path.to_path_buf(), source },
            };
            if attempt >= attempts || !err.is_retryable() {
                return Err(err);
            }
            warn!(path = %path.display(), attempt, error = %err, "read failed, retrying");
            thread::sleep(self.config.retry_delay() * attempt);
            attempt += 1;
        }
    }
}

fn empty_table(slot: DictionarySlot) -> LoadedTable {
    match slot {
        DictionarySlot::PhienAm => LoadedTable::Fallback(FallbackTable::new()),
        DictionarySlot::Cedict => LoadedTable::Cedict(Trie::new()),
        _ => LoadedTable::Phrase(Trie::new()),
    }
}

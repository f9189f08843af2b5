// File: src/core/engine.rs
use crate::cache::{CacheStats, TranslationCache};
use crate::config::EngineConfig;
use crate::core::charset::substitute;
use crate::core::dataset::{DatasetHandle, EngineDataset, FileInfo, LoadedTable};
use crate::core::mapping::TranslationMapping;
use crate::core::rephraser::rephrase;
use crate::core::segmenter::Segmenter;
use crate::core::types::DictionarySlot;
use crate::error::{LoadError, LoadResult, TranslateError};
use crate::loader::DictionaryLoader;
use crate::persistence;
use parking_lot::Mutex;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{error, info, warn};

/// Result of one translation call.
#[derive(Debug, Clone, Serialize)]
pub struct Translation {
    pub text: String,
    pub mapping: TranslationMapping,
}

/// Definitions of one key in one dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DictionaryHit {
    pub slot: DictionarySlot,
    pub key: String,
    pub definitions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableMetadata {
    pub slot: DictionarySlot,
    pub entries: usize,
    pub path: Option<PathBuf>,
    pub size: Option<u64>,
}

/// Snapshot of what the engine is serving.
#[derive(Debug, Clone, Serialize)]
pub struct EngineMetadata {
    pub data_dir: PathBuf,
    pub loaded: bool,
    pub generation: u64,
    /// Seconds since the Unix epoch.
    pub loaded_at: Option<u64>,
    pub tables: Vec<TableMetadata>,
    pub cache: CacheStats,
}

impl EngineMetadata {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Translates `text` against `dataset` without touching any cache.
///
/// Each line is handled on its own: its leading whitespace, blank lines
/// and line terminators are copied as literal blocks, the rest is
/// segmented and rephrased.
pub fn translate_with(dataset: &EngineDataset, text: &str) -> Translation {
    let segmenter = Segmenter::new(dataset);
    let mut out = String::with_capacity(text.len() * 2);
    let mut mapping = TranslationMapping::new();

    for line in text.split_inclusive('\n') {
        let body = line.trim_end_matches(['\r', '\n']);
        let ending = &line[body.len()..];
        let content = body.trim_start();
        let leading = &body[..body.len() - content.len()];

        if content.is_empty() {
            verbatim(body, &mut out, &mut mapping);
        } else {
            verbatim(leading, &mut out, &mut mapping);
            let mut line_mapping = TranslationMapping::new();
            let tokens = segmenter.segment(content, &mut line_mapping);
            out.push_str(&rephrase(&tokens, &mut line_mapping));
            mapping.append(line_mapping);
        }
        verbatim(ending, &mut out, &mut mapping);
    }
    Translation { text: out, mapping }
}

fn verbatim(s: &str, out: &mut String, mapping: &mut TranslationMapping) {
    if !s.is_empty() {
        mapping.add_block(s, s);
        out.push_str(s);
    }
}

fn expand_newlines(raw: &str) -> String {
    raw.replace("\\n", "\n")
}

/// The translation engine.
///
/// Translation calls only read the live dataset; refreshes and edits build
/// a replacement off to the side, publish it and then clear the cache.
/// Writers are serialized so that two edits never start from the same
/// base dataset.
pub struct Engine {
    config: EngineConfig,
    loader: DictionaryLoader,
    handle: DatasetHandle,
    cache: TranslationCache,
    write_lock: Mutex<()>,
    /// Start of the last scheduled reload, successful or not.
    last_attempt: Mutex<Option<SystemTime>>,
}

impl Engine {
    /// An engine with no dataset. Translation fails until [`Engine::refresh`]
    /// succeeds.
    pub fn new(config: EngineConfig) -> LoadResult<Self> {
        let cache = TranslationCache::new(config.cache_capacity);
        let loader = DictionaryLoader::new(config.clone())?;
        Ok(Self {
            config,
            loader,
            handle: DatasetHandle::new(),
            cache,
            write_lock: Mutex::new(()),
            last_attempt: Mutex::new(None),
        })
    }

    /// Builds an engine and loads every dictionary.
    pub fn load(config: EngineConfig) -> LoadResult<Self> {
        let engine = Self::new(config)?;
        engine.refresh(None)?;
        Ok(engine)
    }

    /// An engine serving a prebuilt dataset.
    pub fn with_dataset(config: EngineConfig, dataset: EngineDataset) -> LoadResult<Self> {
        let engine = Self::new(config)?;
        engine.handle.publish(dataset);
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        self.handle.is_loaded()
    }

    /// The live dataset, if one is loaded.
    pub fn dataset(&self) -> Option<Arc<EngineDataset>> {
        self.handle.snapshot()
    }

    fn require_dataset(&self) -> Result<Arc<EngineDataset>, TranslateError> {
        self.handle.snapshot().ok_or(TranslateError::DatasetUnavailable)
    }

    pub fn translate(&self, text: &str) -> Result<Translation, TranslateError> {
        let dataset = self.require_dataset()?;
        let generation = dataset.generation();
        if let Some(hit) = self.cache.get(text, generation) {
            return Ok(Translation::clone(&hit));
        }
        let translation = translate_with(&dataset, text);
        self.cache.put(text, generation, Arc::new(translation.clone()));
        Ok(translation)
    }

    /// Reloads every dictionary, or only the one whose file name is
    /// `specific_file`. On failure the previous dataset stays live.
    pub fn refresh(&self, specific_file: Option<&str>) -> LoadResult<()> {
        let _guard = self.write_lock.lock();
        let result = match specific_file {
            None => self.loader.load_all(),
            Some(file) => {
                let name = Path::new(file).file_name().and_then(|n| n.to_str()).unwrap_or(file);
                let slot = self
                    .config
                    .files
                    .slot_for(name)
                    .ok_or_else(|| LoadError::UnknownDictionary(file.to_string()))?;
                match self.handle.snapshot() {
                    Some(current) => self.loader.reload_slot(&current, slot),
                    // Nothing to patch yet.
                    None => self.loader.load_all(),
                }
            }
        };

        match result {
            Ok(dataset) => {
                let published = self.handle.publish(dataset);
                self.cache.invalidate();
                info!(generation = published.generation(), file = specific_file, "dictionaries refreshed");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, file = specific_file, "dictionary refresh failed, keeping previous data");
                Err(e)
            }
        }
    }

    /// Full reload when nothing is loaded or the refresh interval has
    /// passed. Returns whether a reload was attempted.
    ///
    /// A failed attempt is not repeated before another full interval;
    /// file changes still reach [`Engine::refresh`] through the watcher.
    pub fn refresh_if_stale(&self) -> LoadResult<bool> {
        let interval = self.config.refresh_interval();
        let aged = |since: SystemTime| since.elapsed().map_or(true, |age| age >= interval);
        {
            let mut last_attempt = self.last_attempt.lock();
            let data_stale = self.handle.snapshot().map_or(true, |d| aged(d.loaded_at()));
            if !data_stale || !last_attempt.map_or(true, aged) {
                return Ok(false);
            }
            *last_attempt = Some(SystemTime::now());
        }
        self.refresh(None)?;
        Ok(true)
    }

    /// Exact-match entries for `word` in every loaded dictionary, in
    /// lookup priority order. Escaped newlines are expanded.
    pub fn lookup(&self, word: &str) -> Result<Vec<DictionaryHit>, TranslateError> {
        let dataset = self.require_dataset()?;
        Ok(lookup_in(&dataset, word))
    }

    /// [`Engine::lookup`] for every prefix of `word`, longest first.
    pub fn lookup_prefixes(&self, word: &str) -> Result<Vec<DictionaryHit>, TranslateError> {
        let dataset = self.require_dataset()?;
        let ends: Vec<usize> = word.char_indices().map(|(i, c)| i + c.len_utf8()).collect();
        Ok(ends.into_iter().rev().flat_map(|end| lookup_in(&dataset, &word[..end])).collect())
    }

    /// Per-character Hán Việt reading of `text`.
    pub fn to_han_viet(&self, text: &str) -> Result<String, TranslateError> {
        let dataset = self.require_dataset()?;
        let readings: Vec<String> = text
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| dataset.fallback(substitute(c)).map_or_else(|| c.to_string(), str::to_string))
            .collect();
        Ok(readings.join(" "))
    }

    /// Sets `key=value` in the dictionary file of `slot` and in the live
    /// dataset.
    pub fn upsert_entry(&self, slot: DictionarySlot, key: &str, value: &str) -> LoadResult<()> {
        let key = key.trim();
        if slot == DictionarySlot::PhienAm && key.chars().count() != 1 {
            return Err(LoadError::Edit(format!("{slot} keys are single characters, got {key:?}")));
        }
        self.edit(slot, |path, dataset| {
            persistence::write_entry(path, key, value)?;
            let stored = persistence::escape_value(value.trim());
            Ok(Some(match slot {
                DictionarySlot::PhienAm => {
                    let mut table = dataset.phien_am().clone();
                    if let Some(c) = key.chars().next() {
                        table.insert(c, stored);
                    }
                    LoadedTable::Fallback(table)
                }
                _ => {
                    let mut trie = dataset.phrase_trie(slot).cloned().unwrap_or_default();
                    trie.insert(key, stored);
                    LoadedTable::Phrase(trie)
                }
            }))
        })
        .map(|_| ())
    }

    /// Deletes `key` from the dictionary file of `slot` and from the live
    /// dataset. Returns whether the key existed.
    pub fn remove_entry(&self, slot: DictionarySlot, key: &str) -> LoadResult<bool> {
        let key = key.trim();
        self.edit(slot, |path, dataset| {
            let in_file = persistence::delete_entry(path, key)?;
            let table = match slot {
                DictionarySlot::PhienAm => {
                    let mut table = dataset.phien_am().clone();
                    let removed = key.chars().next().and_then(|c| table.remove(&c)).is_some();
                    (removed || in_file).then_some(LoadedTable::Fallback(table))
                }
                _ => {
                    let mut trie = dataset.phrase_trie(slot).cloned().unwrap_or_default();
                    let removed = trie.remove(key);
                    (removed || in_file).then_some(LoadedTable::Phrase(trie))
                }
            };
            Ok(table)
        })
    }

    fn edit<F>(&self, slot: DictionarySlot, apply: F) -> LoadResult<bool>
    where
        F: FnOnce(&Path, &EngineDataset) -> LoadResult<Option<LoadedTable>>,
    {
        if slot == DictionarySlot::Cedict {
            return Err(LoadError::Edit("CC-CEDICT entries cannot be edited".to_string()));
        }
        let _guard = self.write_lock.lock();
        let current = self.handle.snapshot().ok_or_else(|| LoadError::Edit("no dataset loaded".to_string()))?;
        let path = self
            .config
            .path_for(slot)
            .ok_or_else(|| LoadError::Edit(format!("no file configured for {slot}")))?;

        let Some(table) = apply(&path, &current)? else {
            return Ok(false);
        };
        let info = file_info(slot, &path, table.entries());
        let published = self.handle.publish(current.with_table(slot, table, info));
        self.cache.invalidate();
        info!(%slot, generation = published.generation(), "dictionary edited");
        Ok(true)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn metadata(&self) -> EngineMetadata {
        let dataset = self.handle.snapshot();
        let tables = DictionarySlot::ALL
            .into_iter()
            .map(|slot| {
                let info = dataset.as_ref().and_then(|d| d.file_info(slot));
                TableMetadata {
                    slot,
                    entries: dataset.as_ref().map_or(0, |d| d.entry_count(slot)),
                    path: info.map(|f| f.path.clone()),
                    size: info.map(|f| f.size),
                }
            })
            .collect();
        EngineMetadata {
            data_dir: self.config.data_dir.clone(),
            loaded: dataset.is_some(),
            generation: dataset.as_ref().map_or(0, |d| d.generation()),
            loaded_at: dataset
                .as_ref()
                .and_then(|d| d.loaded_at().duration_since(UNIX_EPOCH).ok())
                .map(|age: Duration| age.as_secs()),
            tables,
            cache: self.cache.stats(),
        }
    }
}

fn lookup_in(dataset: &EngineDataset, word: &str) -> Vec<DictionaryHit> {
    let mut hits = Vec::new();
    if word.is_empty() {
        return hits;
    }
    let hit = |slot, definitions| DictionaryHit { slot, key: word.to_string(), definitions };

    for slot in DictionarySlot::PHRASE_ORDER {
        if let Some(value) = dataset.phrase_trie(slot).and_then(|t| t.find(word)) {
            hits.push(hit(slot, vec![expand_newlines(value)]));
        }
    }
    let mut chars = word.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if let Some(reading) = dataset.fallback(c) {
            hits.push(hit(DictionarySlot::PhienAm, vec![expand_newlines(reading)]));
        }
    }
    if let Some(entries) = dataset.cedict().find(word) {
        hits.push(hit(DictionarySlot::Cedict, entries.iter().map(ToString::to_string).collect()));
    }
    hits
}

fn file_info(slot: DictionarySlot, path: &Path, entries: usize) -> Option<FileInfo> {
    match fs::metadata(path) {
        Ok(meta) => Some(FileInfo {
            slot,
            path: path.to_path_buf(),
            size: meta.len(),
            modified: meta.modified().ok(),
            entries,
        }),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not stat edited dictionary");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::CedictEntry;

    fn dataset() -> EngineDataset {
        EngineDataset::builder()
            .names(&[("雪之下", "Tuyết Chi Hạ")])
            .viet_phrase(&[("的", "của"), ("学生", "học sinh"), ("说", "nói\\nbảo")])
            .phien_am(&[('雪', "tuyết"), ('之', "chi"), ('下', "hạ"), ('学', "học")])
            .cedict(vec![CedictEntry {
                traditional: "學生".to_string(),
                simplified: "学生".to_string(),
                pinyin: "xue2 sheng5".to_string(),
                definition: "student".to_string(),
            }])
            .build()
    }

    fn engine() -> Engine {
        Engine::with_dataset(EngineConfig::default(), dataset()).unwrap()
    }

    #[test]
    fn end_to_end_sentence() {
        let translation = engine().translate("雪之下的学生").unwrap();
        assert_eq!(translation.text, "Tuyết Chi Hạ của học sinh");

        let seg = translation.mapping.get_translated_segment("学生", None).unwrap();
        let chars: Vec<char> = translation.text.chars().collect();
        assert_eq!(chars[seg.start..seg.end].iter().collect::<String>(), "học sinh");

        let back = translation.mapping.get_original_segment("của", None).unwrap();
        assert_eq!((back.text.as_str(), back.start, back.end), ("的", 3, 4));
    }

    #[test]
    fn unloaded_engine_refuses_to_translate() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        assert_eq!(engine.translate("的").unwrap_err(), TranslateError::DatasetUnavailable);
        assert!(engine.lookup("的").is_err());
        assert!(!engine.metadata().loaded);
    }

    #[test]
    fn lines_keep_layout() {
        let text = "  雪之下\n\n\t的学生\r\n";
        let translation = engine().translate(text).unwrap();
        assert_eq!(translation.text, "  Tuyết Chi Hạ\n\n\tCủa học sinh\r\n");

        let original: String = translation.mapping.blocks().iter().map(|b| b.original.as_str()).collect();
        assert_eq!(original, text);
        assert_eq!(translation.mapping.translated_len(), translation.text.chars().count());

        let seg = translation.mapping.get_translated_segment("学生", None).unwrap();
        let chars: Vec<char> = translation.text.chars().collect();
        assert_eq!(chars[seg.start..seg.end].iter().collect::<String>(), "học sinh");
    }

    #[test]
    fn repeated_call_hits_cache() {
        let engine = engine();
        let first = engine.translate("的学生").unwrap();
        let second = engine.translate("的学生").unwrap();
        assert_eq!(first.text, second.text);
        assert_eq!(engine.cache_stats().hits, 1);
        assert_eq!(engine.cache_stats().misses, 1);
    }

    #[test]
    fn lookup_walks_every_dictionary() {
        let engine = engine();
        let hits = engine.lookup("学生").unwrap();
        let slots: Vec<DictionarySlot> = hits.iter().map(|h| h.slot).collect();
        assert_eq!(slots, vec![DictionarySlot::VietPhrase, DictionarySlot::Cedict]);
        assert_eq!(hits[1].definitions, vec!["學生/学生 [xue2 sheng5] student".to_string()]);

        let said = engine.lookup("说").unwrap();
        assert_eq!(said[0].definitions, vec!["nói\nbảo".to_string()]);

        let prefixes = engine.lookup_prefixes("学生们").unwrap();
        let keys: Vec<&str> = prefixes.iter().map(|h| h.key.as_str()).collect();
        assert_eq!(keys, vec!["学生", "学生", "学"]);
    }

    #[test]
    fn han_viet_reading() {
        assert_eq!(engine().to_han_viet("雪之下 X").unwrap(), "tuyết chi hạ X");
    }

    #[test]
    fn metadata_serializes() {
        let engine = engine();
        let meta = engine.metadata();
        assert!(meta.loaded);
        assert_eq!(meta.generation, 1);
        let names = meta.tables.iter().find(|t| t.slot == DictionarySlot::Names).unwrap();
        assert_eq!(names.entries, 1);
        let json = meta.to_json().unwrap();
        assert!(json.contains("\"generation\": 1"));
    }

    #[test]
    fn dialogue_quotes_are_spaced() {
        let dataset = EngineDataset::builder().viet_phrase(&[("他", "hắn"), ("说", "nói"), ("你好", "xin chào")]).build();
        let engine = Engine::with_dataset(EngineConfig::default(), dataset).unwrap();
        assert_eq!(engine.translate("他说「你好」").unwrap().text, "Hắn nói “Xin chào”");
        assert_eq!(engine.translate("他说：「你好」").unwrap().text, "Hắn nói: “Xin chào”");
        assert_eq!(engine.translate("他说《你好》").unwrap().text, "Hắn nói « Xin chào »");
    }

    #[test]
    fn failed_scheduled_refresh_waits_an_interval() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::new(EngineConfig::with_data_dir(dir.path())).unwrap();

        assert!(matches!(engine.refresh_if_stale(), Err(LoadError::MissingFile { .. })));
        // The directory is still broken, but the next attempt is a day away.
        assert!(!engine.refresh_if_stale().unwrap());
        assert!(!engine.is_loaded());

        let mut eager = EngineConfig::with_data_dir(dir.path());
        eager.refresh_interval_secs = 0;
        let engine = Engine::new(eager).unwrap();
        assert!(engine.refresh_if_stale().is_err());
        assert!(engine.refresh_if_stale().is_err());
    }

    #[test]
    fn fresh_dataset_is_not_reloaded() {
        assert!(!engine().refresh_if_stale().unwrap());
    }

    #[test]
    fn cedict_is_read_only() {
        let err = engine().upsert_entry(DictionarySlot::Cedict, "好", "good").unwrap_err();
        assert!(matches!(err, LoadError::Edit(_)));
    }
}

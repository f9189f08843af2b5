// File: src/config.rs
use crate::core::types::DictionarySlot;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File names of the dictionaries, relative to `data_dir`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DictionaryFiles {
    pub names2: String,
    pub names: String,
    pub viet_phrase: String,
    pub phien_am: String,
    pub cedict: Option<String>,
}

impl Default for DictionaryFiles {
    fn default() -> Self {
        Self {
            names2: "Names2.txt".to_string(),
            names: "Names.txt".to_string(),
            viet_phrase: "VietPhrase.txt".to_string(),
            phien_am: "ChinesePhienAmWords.txt".to_string(),
            cedict: None,
        }
    }
}

impl DictionaryFiles {
    pub fn file_name(&self, slot: DictionarySlot) -> Option<&str> {
        match slot {
            DictionarySlot::Names2 => Some(&self.names2),
            DictionarySlot::Names => Some(&self.names),
            DictionarySlot::VietPhrase => Some(&self.viet_phrase),
            DictionarySlot::PhienAm => Some(&self.phien_am),
            DictionarySlot::Cedict => self.cedict.as_deref(),
        }
    }

    /// Slot whose configured file name is `name`.
    pub fn slot_for(&self, name: &str) -> Option<DictionarySlot> {
        DictionarySlot::ALL.into_iter().find(|&slot| self.file_name(slot) == Some(name))
    }

    /// Configured (slot, file name) pairs.
    pub fn configured(&self) -> Vec<(DictionarySlot, &str)> {
        DictionarySlot::ALL
            .into_iter()
            .filter_map(|slot| self.file_name(slot).map(|name| (slot, name)))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub data_dir: PathBuf,
    pub files: DictionaryFiles,
    /// Tables below this size are logged as suspicious but still used.
    pub min_entries: usize,
    pub refresh_interval_secs: u64,
    /// 0 disables the translation cache.
    pub cache_capacity: usize,
    pub load_workers: usize,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    /// Compiled dictionaries are cached here when set.
    pub snapshot_path: Option<PathBuf>,
    pub watch_poll_ms: u64,
    pub debounce_ms: u64,
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            files: DictionaryFiles::default(),
            min_entries: 10,
            refresh_interval_secs: 24 * 60 * 60,
            cache_capacity: 1000,
            load_workers: 4,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            snapshot_path: None,
            watch_poll_ms: 1000,
            debounce_ms: 500,
            log_level: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Defaults pointed at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into(), ..Self::default() }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&s)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.load_workers == 0 {
            return Err(ConfigError::Invalid("load_workers must be at least 1".to_string()));
        }
        if self.retry_attempts == 0 {
            return Err(ConfigError::Invalid("retry_attempts must be at least 1".to_string()));
        }
        let files = self.files.configured();
        for (i, (slot, name)) in files.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("empty file name for {slot}")));
            }
            if files[..i].iter().any(|(_, other)| other == name) {
                return Err(ConfigError::Invalid(format!("{name} is configured for more than one dictionary")));
            }
        }
        if self.log_level.parse::<tracing::Level>().is_err() {
            return Err(ConfigError::Invalid(format!("unknown log level {:?}", self.log_level)));
        }
        Ok(())
    }

    pub fn path_for(&self, slot: DictionarySlot) -> Option<PathBuf> {
        self.files.file_name(slot).map(|name| self.data_dir.join(name))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

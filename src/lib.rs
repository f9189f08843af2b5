// src/lib.rs

pub mod cache;
pub mod config;
pub mod core;
pub mod error;
pub mod loader;
pub mod persistence;
pub mod watcher;

pub use crate::cache::{CacheStats, TranslationCache};
pub use crate::config::{DictionaryFiles, EngineConfig};
pub use crate::core::dataset::{DatasetHandle, EngineDataset};
pub use crate::core::engine::{DictionaryHit, Engine, EngineMetadata, Translation};
pub use crate::core::mapping::{Block, Segment, TranslationMapping};
pub use crate::core::trie::Trie;
pub use crate::core::types::{CedictEntry, DictionarySlot, Token, TokenKind};
pub use crate::error::{ConfigError, LoadError, LoadResult, TranslateError};
pub use crate::watcher::{DataWatcher, WatcherHandle};

/// Installs a fmt subscriber at `config.log_level`. Returns false when a
/// global subscriber was already set.
pub fn init_tracing(config: &EngineConfig) -> bool {
    let level = config.log_level.parse::<tracing::Level>().unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_names(true)
        .with_max_level(level)
        .try_init()
        .is_ok()
}

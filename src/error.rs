// File: src/error.rs
use crate::core::types::DictionarySlot;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to build or update a dataset.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("required dictionary {slot} not found at {}", path.display())]
    MissingFile { slot: DictionarySlot, path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no phrase dictionary contains any entry")]
    EmptyDataset,

    #[error("unknown dictionary file: {0}")]
    UnknownDictionary(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("dictionary edit failed: {0}")]
    Edit(String),

    #[error("could not start loader workers: {0}")]
    WorkerPool(String),
}

impl LoadError {
    /// Transient I/O failures are worth another attempt; a missing file or
    /// bad content will not fix itself.
    pub fn is_retryable(&self) -> bool {
        match self {
            LoadError::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::Interrupted
                    | io::ErrorKind::WouldBlock
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::PermissionDenied
                    | io::ErrorKind::Other
            ),
            LoadError::MissingFile { .. }
            | LoadError::EmptyDataset
            | LoadError::UnknownDictionary(_)
            | LoadError::Snapshot(_)
            | LoadError::Edit(_)
            | LoadError::WorkerPool(_) => false,
        }
    }
}

/// Failure of a translation call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    #[error("translation data unavailable: no dataset has been loaded")]
    DatasetUnavailable,
}

/// Failure to read or validate an [`crate::config::EngineConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config syntax: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type LoadResult<T> = Result<T, LoadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_io_is_retryable() {
        let transient = LoadError::Io { path: "a".into(), source: io::Error::from(io::ErrorKind::Interrupted) };
        assert!(transient.is_retryable());

        let missing = LoadError::MissingFile { slot: DictionarySlot::Names, path: "Names.txt".into() };
        assert!(!missing.is_retryable());
        assert!(!LoadError::EmptyDataset.is_retryable());
    }

    #[test]
    fn messages_name_the_file() {
        let missing = LoadError::MissingFile { slot: DictionarySlot::VietPhrase, path: "data/VietPhrase.txt".into() };
        assert_eq!(missing.to_string(), "required dictionary VietPhrase not found at data/VietPhrase.txt");
    }
}

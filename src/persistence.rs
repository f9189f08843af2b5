// File: src/persistence.rs
use crate::core::dataset::{CedictTrie, EngineDataset, FallbackTable, FileInfo, PhraseTrie};
use crate::core::types::DictionarySlot;
use crate::error::{LoadError, LoadResult};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use std::time::SystemTime;
use tempfile::NamedTempFile;

/// Bumped whenever the snapshot layout changes.
const SNAPSHOT_VERSION: u32 = 1;

/// Identity of a dictionary file at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStamp {
    pub slot: DictionarySlot,
    pub name: String,
    pub len: Option<u64>,
    pub modified: Option<SystemTime>,
}

impl FileStamp {
    /// Stamps `path`; a missing file gets `len: None`.
    pub fn of(slot: DictionarySlot, path: &Path) -> Self {
        let meta = fs::metadata(path).ok();
        FileStamp {
            slot,
            name: path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
            len: meta.as_ref().map(|m| m.len()),
            modified: meta.and_then(|m| m.modified().ok()),
        }
    }
}

// Borrowing twin of `Snapshot` so saving does not clone the tries.
#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    fingerprint: &'a [FileStamp],
    names2: &'a PhraseTrie,
    names: &'a PhraseTrie,
    viet_phrase: &'a PhraseTrie,
    phien_am: &'a FallbackTable,
    cedict: &'a CedictTrie,
    files: &'a [FileInfo],
}

#[derive(Deserialize)]
struct Snapshot {
    version: u32,
    fingerprint: Vec<FileStamp>,
    names2: PhraseTrie,
    names: PhraseTrie,
    viet_phrase: PhraseTrie,
    phien_am: FallbackTable,
    cedict: CedictTrie,
    files: Vec<FileInfo>,
}

fn snapshot_err(e: impl std::fmt::Display) -> LoadError {
    LoadError::Snapshot(e.to_string())
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> LoadError + '_ {
    move |source| LoadError::Io { path: path.to_path_buf(), source }
}

/// Writes the compiled tables of `dataset` to `path`, atomically.
pub fn save_snapshot(dataset: &EngineDataset, fingerprint: &[FileStamp], path: &Path) -> LoadResult<()> {
    let parent_dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent_dir).map_err(io_err(parent_dir))?;

    let (names2, names, viet_phrase, phien_am, cedict) = dataset.parts();
    let snapshot = SnapshotRef {
        version: SNAPSHOT_VERSION,
        fingerprint,
        names2,
        names,
        viet_phrase,
        phien_am,
        cedict,
        files: dataset.files(),
    };

    let temp_file = NamedTempFile::new_in(parent_dir).map_err(io_err(parent_dir))?;
    let mut writer = BufWriter::new(&temp_file);
    bincode::serialize_into(&mut writer, &snapshot).map_err(snapshot_err)?;
    writer.flush().map_err(io_err(path))?;
    drop(writer);

    temp_file.persist(path).map_err(|e| io_err(path)(e.error))?;
    tracing::debug!(path = %path.display(), "dictionary snapshot written");
    Ok(())
}

/// Reads a snapshot back. Returns `Ok(None)` when there is none or it was
/// built from files other than `expected`.
pub fn load_snapshot(path: &Path, expected: &[FileStamp]) -> LoadResult<Option<EngineDataset>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_err(path)(e)),
    };
    let snapshot: Snapshot = bincode::deserialize_from(BufReader::new(file)).map_err(snapshot_err)?;
    if snapshot.version != SNAPSHOT_VERSION || snapshot.fingerprint != expected {
        return Ok(None);
    }
    Ok(Some(EngineDataset::from_tables(
        snapshot.names2,
        snapshot.names,
        snapshot.viet_phrase,
        snapshot.phien_am,
        snapshot.cedict,
        snapshot.files,
    )))
}

/// Dictionary files hold one entry per line, so newlines become `\\n`.
pub fn escape_value(value: &str) -> String {
    value.replace("\r\n", "\\n").replace('\n', "\\n")
}

fn entry_key(line: &str) -> Option<&str> {
    line.trim_start_matches('\u{feff}').split_once('=').map(|(key, _)| key.trim())
}

fn rewrite(path: &Path, lines: &[String]) -> LoadResult<()> {
    let parent_dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let mut temp_file = NamedTempFile::new_in(parent_dir).map_err(io_err(parent_dir))?;
    for line in lines {
        writeln!(temp_file, "{line}").map_err(io_err(path))?;
    }
    temp_file.persist(path).map_err(|e| io_err(path)(e.error))?;
    Ok(())
}

fn read_lines(path: &Path) -> LoadResult<Vec<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content.lines().map(str::to_string).collect()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(io_err(path)(e)),
    }
}

/// Sets `key=value` in a key-value dictionary file. The first line with
/// `key` is replaced and later duplicates dropped; otherwise the entry is
/// appended. Newlines in `value` are stored as a literal `\n`.
pub fn write_entry(path: &Path, key: &str, value: &str) -> LoadResult<()> {
    let key = key.trim();
    if key.is_empty() || key.contains('=') || key.contains('\n') {
        return Err(LoadError::Edit(format!("invalid dictionary key {key:?}")));
    }
    let entry = format!("{key}={}", escape_value(value.trim()));

    let mut replaced = false;
    let mut lines = Vec::new();
    for line in read_lines(path)? {
        if entry_key(&line) == Some(key) {
            if !replaced {
                lines.push(entry.clone());
                replaced = true;
            }
        } else {
            lines.push(line);
        }
    }
    if !replaced {
        lines.push(entry);
    }
    rewrite(path, &lines)
}

/// Deletes every `key=` line. Returns whether anything was removed.
pub fn delete_entry(path: &Path, key: &str) -> LoadResult<bool> {
    let key = key.trim();
    let lines = read_lines(path)?;
    let before = lines.len();
    let kept: Vec<String> = lines.into_iter().filter(|line| entry_key(line) != Some(key)).collect();
    if kept.len() == before {
        return Ok(false);
    }
    rewrite(path, &kept)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::parse_key_value;

    fn stamps(dir: &Path) -> Vec<FileStamp> {
        vec![FileStamp::of(DictionarySlot::VietPhrase, &dir.join("VietPhrase.txt"))]
    }

    #[test]
    fn snapshot_round_trip_and_staleness() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("VietPhrase.txt"), "的=của\n").unwrap();
        let path = dir.path().join("cache/dict.bin");
        let dataset = EngineDataset::builder()
            .viet_phrase(&[("的", "của"), ("学生", "học sinh")])
            .phien_am(&[('学', "học")])
            .build();

        save_snapshot(&dataset, &stamps(dir.path()), &path).unwrap();
        let restored = load_snapshot(&path, &stamps(dir.path())).unwrap().unwrap();
        assert_eq!(restored.entry_count(DictionarySlot::VietPhrase), 2);
        assert_eq!(restored.fallback('学'), Some("học"));

        fs::write(dir.path().join("VietPhrase.txt"), "的=của\n学生=học sinh\n").unwrap();
        assert!(load_snapshot(&path, &stamps(dir.path())).unwrap().is_none());
    }

    #[test]
    fn missing_snapshot_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_snapshot(&dir.path().join("none.bin"), &[]).unwrap().is_none());
    }

    #[test]
    fn corrupt_snapshot_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dict.bin");
        fs::write(&path, b"not bincode").unwrap();
        assert!(matches!(load_snapshot(&path, &[]), Err(LoadError::Snapshot(_))));
    }

    #[test]
    fn write_entry_replaces_or_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Names.txt");
        fs::write(&path, "# names\n甲=Giáp\n乙=Ất\n甲=Giáp cũ\n").unwrap();

        write_entry(&path, "甲", "Giáp mới").unwrap();
        write_entry(&path, "丙", "dòng 1\ndòng 2").unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "# names\n甲=Giáp mới\n乙=Ất\n丙=dòng 1\\ndòng 2\n");
        assert_eq!(parse_key_value(&content).len(), 3);
    }

    #[test]
    fn write_entry_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Names2.txt");
        write_entry(&path, "雪乃", "Yukino").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "雪乃=Yukino\n");
        assert!(matches!(write_entry(&path, "a=b", "x"), Err(LoadError::Edit(_))));
    }

    #[test]
    fn delete_entry_reports_removal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("VietPhrase.txt");
        fs::write(&path, "的=của\n学生=học sinh\n").unwrap();

        assert!(delete_entry(&path, "的").unwrap());
        assert!(!delete_entry(&path, "的").unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "学生=học sinh\n");
    }
}

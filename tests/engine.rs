use qt_core::{DataWatcher, DictionarySlot, Engine, EngineConfig, LoadError, TranslateError};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

fn seed(dir: &Path) {
    write(dir, "Names.txt", "\u{feff}# names\n雪之下=Tuyết Chi Hạ\n");
    write(dir, "VietPhrase.txt", "的=của\n学生=học sinh\n说=nói\n");
    write(dir, "ChinesePhienAmWords.txt", "雪=tuyết\n之=chi\n下=hạ\n学=học\n生=sinh\n同=đồng\n");
}

fn config(dir: &Path) -> EngineConfig {
    let mut config = EngineConfig::with_data_dir(dir);
    config.retry_delay_ms = 1;
    config.min_entries = 0;
    config
}

#[test]
fn translates_from_dictionary_directory() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());
    let engine = Engine::load(config(dir.path())).unwrap();

    let translation = engine.translate("雪之下的学生").unwrap();
    assert_eq!(translation.text, "Tuyết Chi Hạ của học sinh");

    let original: String = translation.mapping.blocks().iter().map(|b| b.original.as_str()).collect();
    assert_eq!(original, "雪之下的学生");
}

#[test]
fn missing_mandatory_file_leaves_engine_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());
    fs::remove_file(dir.path().join("ChinesePhienAmWords.txt")).unwrap();

    let err = Engine::load(config(dir.path())).err().unwrap();
    assert!(matches!(err, LoadError::MissingFile { slot: DictionarySlot::PhienAm, .. }));

    let engine = Engine::new(config(dir.path())).unwrap();
    assert!(engine.refresh(None).is_err());
    assert_eq!(engine.translate("的").unwrap_err(), TranslateError::DatasetUnavailable);
}

#[test]
fn failed_refresh_keeps_previous_dataset() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());
    let engine = Engine::load(config(dir.path())).unwrap();
    let generation = engine.metadata().generation;

    fs::remove_file(dir.path().join("VietPhrase.txt")).unwrap();
    assert!(engine.refresh(None).is_err());
    assert!(engine.refresh(Some("VietPhrase.txt")).is_err());

    assert_eq!(engine.metadata().generation, generation);
    assert_eq!(engine.translate("学生").unwrap().text, "Học sinh");
}

#[test]
fn selective_refresh_reloads_one_file_and_clears_cache() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());
    let engine = Engine::load(config(dir.path())).unwrap();
    assert_eq!(engine.translate("的学生").unwrap().text, "Của học sinh");

    write(dir.path(), "VietPhrase.txt", "的=đích\n学生=học trò\n");
    // Still served from the cache until a refresh.
    assert_eq!(engine.translate("的学生").unwrap().text, "Của học sinh");

    engine.refresh(Some("VietPhrase.txt")).unwrap();
    assert_eq!(engine.translate("的学生").unwrap().text, "Đích học trò");
    assert!(engine.cache_stats().invalidations >= 2);

    let err = engine.refresh(Some("Unknown.txt")).unwrap_err();
    assert!(matches!(err, LoadError::UnknownDictionary(_)));
}

#[test]
fn live_edits_update_file_and_dataset() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());
    let engine = Engine::load(config(dir.path())).unwrap();
    assert_eq!(engine.translate("同学").unwrap().text, "Đồng học");

    engine.upsert_entry(DictionarySlot::VietPhrase, "同学", "bạn học").unwrap();
    assert_eq!(engine.translate("同学").unwrap().text, "Bạn học");
    let content = fs::read_to_string(dir.path().join("VietPhrase.txt")).unwrap();
    assert!(content.lines().any(|l| l == "同学=bạn học"));

    assert!(engine.remove_entry(DictionarySlot::VietPhrase, "同学").unwrap());
    assert!(!engine.remove_entry(DictionarySlot::VietPhrase, "同学").unwrap());
    assert_eq!(engine.translate("同学").unwrap().text, "Đồng học");

    // A fresh load sees the same state as the edited engine.
    let reloaded = Engine::load(config(dir.path())).unwrap();
    assert_eq!(reloaded.translate("同学").unwrap().text, "Đồng học");
}

#[test]
fn cedict_lookup_when_configured() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());
    write(dir.path(), "cedict_ts.u8", "# CC-CEDICT\n學生 学生 [xue2 sheng5] /student/schoolchild/\n");
    let mut config = config(dir.path());
    config.files.cedict = Some("cedict_ts.u8".to_string());
    let engine = Engine::load(config).unwrap();

    let hits = engine.lookup("學生").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].slot, DictionarySlot::Cedict);
    assert_eq!(hits[0].definitions, vec!["學生/学生 [xue2 sheng5] student/schoolchild".to_string()]);
    assert_eq!(engine.metadata().tables.iter().find(|t| t.slot == DictionarySlot::Cedict).unwrap().entries, 2);
}

#[test]
fn snapshot_is_reused_until_files_change() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());
    let mut config = config(dir.path());
    config.snapshot_path = Some(dir.path().join("cache").join("dictionaries.bin"));

    let first = Engine::load(config.clone()).unwrap();
    assert!(dir.path().join("cache/dictionaries.bin").exists());

    let second = Engine::load(config.clone()).unwrap();
    assert_eq!(second.translate("雪之下的学生").unwrap().text, first.translate("雪之下的学生").unwrap().text);

    write(dir.path(), "Names.txt", "雪之下=Yukinoshita\n");
    let third = Engine::load(config).unwrap();
    assert_eq!(third.translate("雪之下").unwrap().text, "Yukinoshita");
}

#[test]
fn multi_line_text_keeps_layout_and_offsets() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());
    let engine = Engine::load(config(dir.path())).unwrap();

    let text = "　　雪之下说：“同学。”\n\n  学生";
    let translation = engine.translate(text).unwrap();
    assert!(translation.text.starts_with("　　Tuyết Chi Hạ nói"));
    assert!(translation.text.ends_with("\n\n  Học sinh"));

    let chars: Vec<char> = translation.text.chars().collect();
    let mut last_end = 0;
    for block in translation.mapping.blocks() {
        assert!(block.trans_start >= last_end);
        assert!(block.trans_end <= chars.len());
        last_end = block.trans_end;
    }

    let seg = translation.mapping.get_translated_segment("学生", None).unwrap();
    let found: String = chars[seg.start..seg.end].iter().collect();
    assert_eq!(found.to_lowercase(), "học sinh");
}

#[test]
fn watcher_picks_up_file_changes() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());
    let mut config = config(dir.path());
    config.watch_poll_ms = 10;
    config.debounce_ms = 30;
    let engine = Arc::new(Engine::load(config).unwrap());
    let watcher = DataWatcher::spawn(Arc::clone(&engine)).unwrap();

    write(dir.path(), "Names.txt", "雪之下=Yukinoshita\n雪乃=Yukino\n");

    let deadline = Instant::now() + Duration::from_secs(10);
    while engine.metadata().generation < 2 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    watcher.stop();
    assert_eq!(engine.translate("雪之下").unwrap().text, "Yukinoshita");
}

#[test]
fn translations_see_whole_datasets_during_refresh() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());
    let mut config = config(dir.path());
    config.cache_capacity = 0;
    let engine = Arc::new(Engine::load(config).unwrap());

    let old = "Tuyết Chi Hạ của học sinh";
    let new = "Yukinoshita của học trò";
    let done = AtomicBool::new(false);

    thread::scope(|scope| {
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let engine = Arc::clone(&engine);
                let done = &done;
                scope.spawn(move || {
                    let mut seen = 0;
                    while !done.load(Ordering::Acquire) || seen == 0 {
                        let text = engine.translate("雪之下的学生").unwrap().text;
                        assert!(text == old || text == new, "mixed translation: {text}");
                        seen += 1;
                    }
                    seen
                })
            })
            .collect();

        for round in 0..20 {
            if round % 2 == 0 {
                write(dir.path(), "Names.txt", "雪之下=Yukinoshita\n");
                write(dir.path(), "VietPhrase.txt", "的=của\n学生=học trò\n说=nói\n");
            } else {
                seed(dir.path());
            }
            engine.refresh(None).unwrap();
            if round % 5 == 4 {
                engine.upsert_entry(DictionarySlot::VietPhrase, "说", "bảo").unwrap();
            }
        }
        done.store(true, Ordering::Release);

        for reader in readers {
            assert!(reader.join().unwrap() > 0);
        }
    });
}

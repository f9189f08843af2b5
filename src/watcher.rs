// File: src/watcher.rs
use crate::config::EngineConfig;
use crate::core::engine::Engine;
use crate::persistence::FileStamp;
use std::collections::{BTreeSet, HashMap};
use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Coalesces change notifications that arrive within `window` of each
/// other. A batch is released once no new notification has arrived for a
/// full window.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: BTreeSet<String>,
    last_event: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self { window, pending: BTreeSet::new(), last_event: None }
    }

    pub fn record(&mut self, file: impl Into<String>, now: Instant) {
        self.pending.insert(file.into());
        self.last_event = Some(now);
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    /// The settled batch, sorted by name, if the window has passed.
    pub fn take_ready(&mut self, now: Instant) -> Option<Vec<String>> {
        let last = self.last_event?;
        if self.pending.is_empty() || now.saturating_duration_since(last) < self.window {
            return None;
        }
        self.last_event = None;
        Some(std::mem::take(&mut self.pending).into_iter().collect())
    }
}

/// File names whose stamp differs from `known`; `known` is updated.
pub fn scan_changes(config: &EngineConfig, known: &mut HashMap<String, FileStamp>) -> Vec<String> {
    let mut changed = Vec::new();
    for (slot, name) in config.files.configured() {
        let stamp = FileStamp::of(slot, &config.data_dir.join(name));
        if known.get(name) != Some(&stamp) {
            known.insert(name.to_string(), stamp);
            changed.push(name.to_string());
        }
    }
    changed
}

/// Polls the dictionary files of an engine and refreshes it on change.
pub struct DataWatcher;

impl DataWatcher {
    /// Starts the polling thread. The current state of the files is taken
    /// as the baseline.
    pub fn spawn(engine: Arc<Engine>) -> io::Result<WatcherHandle> {
        let config = engine.config().clone();
        let mut known = HashMap::new();
        scan_changes(&config, &mut known);

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let poll = Duration::from_millis(config.watch_poll_ms.max(1));
        let thread = thread::Builder::new().name("dict-watcher".to_string()).spawn(move || {
            let mut debouncer = Debouncer::new(Duration::from_millis(config.debounce_ms));
            info!(dir = %config.data_dir.display(), "watching dictionary files");
            loop {
                match stop_rx.recv_timeout(poll) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }

                let now = Instant::now();
                for name in scan_changes(&config, &mut known) {
                    debug!(file = %name, "dictionary file changed");
                    debouncer.record(name, now);
                }
                if let Some(batch) = debouncer.take_ready(now) {
                    dispatch(&engine, &batch);
                }

                if engine.is_loaded() {
                    if let Err(e) = engine.refresh_if_stale() {
                        warn!(error = %e, "scheduled refresh failed");
                    }
                }
            }
            debug!("dictionary watcher stopped");
        })?;
        Ok(WatcherHandle { stop: Some(stop_tx), thread: Some(thread) })
    }
}

fn dispatch(engine: &Engine, batch: &[String]) {
    // Errors are logged by `refresh`; the old dataset stays live.
    let _ = match batch {
        [single] => engine.refresh(Some(single.as_str())),
        _ => engine.refresh(None),
    };
}

/// Stops the watcher thread when dropped.
pub struct WatcherHandle {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl WatcherHandle {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("dictionary watcher thread panicked");
            }
        }
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

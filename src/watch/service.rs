//! Filesystem watch service.
//!
//! ```text
//! notify thread → bridge thread (filter + stat) → callback(path, mtime)
//! ```
//!
//! The callback is the only way changes leave this module; the reload loop
//! never talks to the watcher directly.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::utils::mtime::mtime_millis;
use crate::utils::path::normalize_path;

/// How often the bridge thread wakes to check for shutdown and lost roots.
const MAINTAIN_INTERVAL_MS: u64 = 500;

/// Receives one path and its timestamp per change event.
pub type ChangeCallback = Arc<dyn Fn(&Path, i64) + Send + Sync>;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to initialize file watcher")]
    Init(#[source] notify::Error),

    #[error("failed to watch `{0}`")]
    Attach(PathBuf, #[source] notify::Error),

    #[error("failed to spawn watch thread")]
    Thread(#[source] std::io::Error),
}

/// Starts watching a set of directories.
pub trait WatchService: Send + Sync {
    fn watch(
        &self,
        dirs: &[PathBuf],
        callback: ChangeCallback,
    ) -> Result<Box<dyn WatchHandle>, WatchError>;
}

/// A running watch. `close` stops delivery and waits for the watch thread.
pub trait WatchHandle: Send {
    fn close(self: Box<Self>);
}

// =============================================================================
// notify-backed implementation
// =============================================================================

#[derive(Debug, Default, Clone, Copy)]
pub struct NotifyWatchService;

impl WatchService for NotifyWatchService {
    fn watch(
        &self,
        dirs: &[PathBuf],
        callback: ChangeCallback,
    ) -> Result<Box<dyn WatchHandle>, WatchError> {
        // notify delivers on its own thread; bridge through a channel so the
        // filtering and stat calls don't run inside the backend's callback
        let (notify_tx, notify_rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })
        .map_err(WatchError::Init)?;

        let mut roots = WatchRoots::new(dirs.to_vec());
        roots.attach_existing(&mut watcher)?;

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let thread = std::thread::Builder::new()
            .name("devloop-watch".into())
            .spawn(move || {
                run_bridge(watcher, roots, &notify_rx, &callback, &thread_stop);
            })
            .map_err(WatchError::Thread)?;

        Ok(Box::new(NotifyWatchHandle {
            stop,
            thread: Some(thread),
        }))
    }
}

struct NotifyWatchHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl WatchHandle for NotifyWatchHandle {
    fn close(mut self: Box<Self>) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for NotifyWatchHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

fn run_bridge(
    mut watcher: RecommendedWatcher,
    mut roots: WatchRoots,
    notify_rx: &mpsc::Receiver<notify::Result<notify::Event>>,
    callback: &ChangeCallback,
    stop: &AtomicBool,
) {
    let tick = Duration::from_millis(MAINTAIN_INTERVAL_MS);
    while !stop.load(Ordering::SeqCst) {
        match notify_rx.recv_timeout(tick) {
            Ok(Ok(event)) => {
                for path in changed_paths(&event) {
                    // Removed files have no mtime; 0 still differs from the last observation
                    let timestamp = mtime_millis(&path).unwrap_or(0);
                    crate::debug!("watch"; "{:?}: {}", event.kind, path.display());
                    callback(&path, timestamp);
                }
            }
            Ok(Err(e)) => crate::log!("watch"; "notify error: {}", e),
            Err(RecvTimeoutError::Timeout) => roots.maintain(&mut watcher),
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    crate::debug!("watch"; "watcher stopped");
}

/// Paths worth reporting from a raw notify event.
fn changed_paths(event: &notify::Event) -> Vec<PathBuf> {
    use notify::EventKind;

    match event.kind {
        EventKind::Create(_) | EventKind::Remove(_) => {}
        // Metadata-only changes (chmod/atime) would trigger endless rebuild loops
        EventKind::Modify(notify::event::ModifyKind::Metadata(_)) => return Vec::new(),
        EventKind::Modify(_) => {}
        _ => return Vec::new(),
    }

    let mut seen = FxHashSet::default();
    event
        .paths
        .iter()
        .filter(|p| !is_temp_file(p))
        .map(|p| normalize_path(p))
        .filter(|p| seen.insert(p.clone()))
        .collect()
}

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

// =============================================================================
// Watch roots
// =============================================================================

/// Attach roots at startup, re-attach roots that were removed and recreated.
struct WatchRoots {
    desired: Vec<PathBuf>,
    attached: FxHashSet<PathBuf>,
}

impl WatchRoots {
    fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            desired: paths,
            attached: FxHashSet::default(),
        }
    }

    fn attach_existing(&mut self, watcher: &mut RecommendedWatcher) -> Result<(), WatchError> {
        for path in &self.desired {
            if !path.exists() {
                continue;
            }
            watcher
                .watch(path, RecursiveMode::Recursive)
                .map_err(|e| WatchError::Attach(path.clone(), e))?;
            self.attached.insert(path.clone());
        }
        Ok(())
    }

    fn maintain(&mut self, watcher: &mut RecommendedWatcher) {
        self.attached.retain(|path| path.exists());

        for path in &self.desired {
            if self.attached.contains(path) || !path.exists() {
                continue;
            }
            if watcher.watch(path, RecursiveMode::Recursive).is_ok() {
                self.attached.insert(path.clone());
                crate::debug!("watch"; "re-attached watch: {}", path.display());
            }
        }
    }
}

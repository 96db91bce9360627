//! Live ingestion: change-watcher abstraction, the notify adapter and the watch thread.

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use log::{debug, warn};
use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Component, Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::context::{CancelFlag, Origin, SessionEvent};
use crate::engine::tools::{
    canonical_root, has_suffix, is_hidden_name, path_relative_to, path_to_rel_string,
};
use crate::utils::config::HeartbeatConsts;

/// One filesystem change as seen by the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchEvent {
    pub dir: PathBuf,
    pub name: String,
    pub is_dir: bool,
    /// The entry was closed after writing or moved into place.
    pub is_write_close_or_move_to: bool,
}

impl WatchEvent {
    /// Completed file at `path`.
    pub fn file_written(path: &Path) -> Self {
        Self {
            dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            is_dir: false,
            is_write_close_or_move_to: true,
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.name)
    }
}

/// Result of one poll of a [`ChangeWatcher`].
#[derive(Debug)]
pub enum WatchPoll {
    Event(WatchEvent),
    /// Nothing arrived within the timeout.
    Idle,
    /// The backend is gone; no more events will arrive.
    Closed,
}

/// Recursive watch on the input root. Errors are backend hiccups; the caller keeps polling.
pub trait ChangeWatcher: Send {
    fn poll(&mut self, timeout: Duration) -> Result<WatchPoll>;
}

#[derive(Debug, PartialEq, Eq)]
pub enum WatchDecision {
    Ignore,
    /// Relative path to queue.
    Queue(String),
    /// The event points outside the watched root.
    OutsideRoot(PathBuf),
}

/// Decide what to do with `event`: only completed, non-hidden files with the suffix are queued.
pub fn classify_watch_event(root: &Path, suffix: &str, event: &WatchEvent) -> WatchDecision {
    if event.is_dir || !event.is_write_close_or_move_to {
        return WatchDecision::Ignore;
    }
    if is_hidden_name(&event.name) || !has_suffix(&event.name, suffix) {
        return WatchDecision::Ignore;
    }
    let path = event.path();
    let Some(rel) = path_relative_to(&path, root) else {
        return WatchDecision::OutsideRoot(path);
    };
    let hidden_dir = rel.components().any(|c| match c {
        Component::Normal(s) => s.to_str().map(is_hidden_name).unwrap_or(false),
        _ => false,
    });
    if hidden_dir {
        return WatchDecision::Ignore;
    }
    match path_to_rel_string(&rel) {
        Some(filename) => WatchDecision::Queue(filename),
        None => WatchDecision::Ignore,
    }
}

/// [`ChangeWatcher`] backed by the platform's notify backend (inotify on Linux).
pub struct NotifyWatcher {
    _watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
}

impl NotifyWatcher {
    pub fn new(root: &Path) -> Result<Self> {
        let root = canonical_root(root)?;
        let (tx, rx) = unbounded();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let _ = tx.send(res);
            },
            notify::Config::default(),
        )
        .context("create file watcher")?;
        watcher
            .watch(&root, RecursiveMode::Recursive)
            .with_context(|| format!("watch {}", root.display()))?;
        debug!("watching {}", root.display());
        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }
}

/// Map a notify event to a [`WatchEvent`]. Rename events report the destination path.
fn to_watch_event(event: Event) -> Option<WatchEvent> {
    let (path, completed) = match event.kind {
        EventKind::Access(AccessKind::Close(AccessMode::Write))
        | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => (event.paths.first()?, true),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => (event.paths.last()?, true),
        // No close-write notification on these backends.
        #[cfg(not(target_os = "linux"))]
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => {
            (event.paths.first()?, true)
        }
        _ => (event.paths.first()?, false),
    };
    if path.file_name().is_some_and(|n| n.to_str().is_none()) {
        warn!("Ignoring {}: name is not valid UTF-8", path.display());
        return None;
    }
    Some(WatchEvent {
        is_dir: path.is_dir(),
        is_write_close_or_move_to: completed,
        ..WatchEvent::file_written(path)
    })
}

impl ChangeWatcher for NotifyWatcher {
    fn poll(&mut self, timeout: Duration) -> Result<WatchPoll> {
        match self.rx.recv_timeout(timeout) {
            Ok(Ok(event)) => Ok(to_watch_event(event)
                .map(WatchPoll::Event)
                .unwrap_or(WatchPoll::Idle)),
            Ok(Err(e)) => Err(e).context("file watcher"),
            Err(RecvTimeoutError::Timeout) => Ok(WatchPoll::Idle),
            Err(RecvTimeoutError::Disconnected) => Ok(WatchPoll::Closed),
        }
    }
}

/// Consume watcher events until canceled, sending qualifying files to the scheduler.
pub fn spawn_watch_thread(
    mut watcher: Box<dyn ChangeWatcher>,
    root: PathBuf,
    suffix: String,
    events: Sender<SessionEvent>,
    cancel: CancelFlag,
) -> Result<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name(format!("{}-watch", env!("CARGO_PKG_NAME")))
        .spawn(move || {
            while !cancel.is_canceled() {
                let event = match watcher.poll(HeartbeatConsts::WATCH_POLL) {
                    Ok(WatchPoll::Event(event)) => event,
                    Ok(WatchPoll::Idle) => continue,
                    Ok(WatchPoll::Closed) => {
                        debug!("watch: backend closed");
                        return;
                    }
                    Err(e) => {
                        warn!("{:#}", e);
                        continue;
                    }
                };
                match classify_watch_event(&root, &suffix, &event) {
                    WatchDecision::Ignore => {}
                    WatchDecision::OutsideRoot(path) => {
                        warn!(
                            "Ignoring event for {}: outside of {}",
                            path.display(),
                            root.display()
                        );
                    }
                    WatchDecision::Queue(filename) => {
                        let sent = events.send(SessionEvent::Discovered {
                            filename,
                            origin: Origin::Live,
                        });
                        if sent.is_err() {
                            return;
                        }
                    }
                }
            }
            debug!("watch: canceled");
        })?;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(path: &str) -> WatchEvent {
        WatchEvent::file_written(Path::new(path))
    }

    #[test]
    fn queues_completed_files_under_root() {
        let root = Path::new("/data/run");
        assert_eq!(
            classify_watch_event(root, ".fast5", &event("/data/run/bc01/r1.FAST5")),
            WatchDecision::Queue("bc01/r1.FAST5".to_string())
        );
    }

    #[test]
    fn ignores_incomplete_hidden_and_foreign_suffix() {
        let root = Path::new("/data/run");
        let mut open = event("/data/run/r1.fast5");
        open.is_write_close_or_move_to = false;
        assert_eq!(classify_watch_event(root, ".fast5", &open), WatchDecision::Ignore);

        let mut dir = event("/data/run/bc01.fast5");
        dir.is_dir = true;
        assert_eq!(classify_watch_event(root, ".fast5", &dir), WatchDecision::Ignore);

        for path in ["/data/run/.r1.fast5", "/data/run/.tmp/r1.fast5", "/data/run/r1.txt"] {
            assert_eq!(
                classify_watch_event(root, ".fast5", &event(path)),
                WatchDecision::Ignore,
                "{}",
                path
            );
        }
    }

    #[test]
    fn flags_events_outside_root() {
        let root = Path::new("/data/run");
        assert_eq!(
            classify_watch_event(root, ".fast5", &event("/elsewhere/r1.fast5")),
            WatchDecision::OutsideRoot(PathBuf::from("/elsewhere/r1.fast5"))
        );
    }
}

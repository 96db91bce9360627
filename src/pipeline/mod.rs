//! Pipeline components: session state, scan and watch monitors, and the scheduler.

pub mod context;
pub mod error_handler;
pub mod orchestrator;
pub mod session;
pub mod walk;
pub mod watch;

pub use context::{CancelFlag, Origin, SessionEvent};
pub use error_handler::log_worker_fault;
pub use orchestrator::{Collaborators, run};
pub use session::Session;
pub use walk::{Scanner, spawn_scan_thread};
pub use watch::{
    ChangeWatcher, NotifyWatcher, WatchDecision, WatchEvent, WatchPoll, classify_watch_event,
    spawn_watch_thread,
};

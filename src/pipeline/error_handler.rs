use log::error;

/// Log a worker fault: the message, then every trace line separately so multi-line traces
/// stay readable in the log.
pub fn log_worker_fault(message: &str, trace: &str) {
    error!("{}", message);
    for line in trace.lines().filter(|l| !l.trim().is_empty()) {
        error!("  {}", line);
    }
}

/// Log a panic caught in the scheduler loop.
pub fn log_scheduler_panic(message: &str) {
    error!("Unhandled error in the session loop: {}", message);
}

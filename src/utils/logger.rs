use colored::Colorize;
use env_logger::Builder;
use log::{Level, LevelFilter};
use std::io::Write;

use super::config::PackagePaths;

/// Which process is logging. Workers share the parent's stderr, so their lines carry the pid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogRole {
    Session,
    Worker,
}

impl LogRole {
    fn tag(self) -> String {
        let name = PackagePaths::get().pkg_name();
        match self {
            LogRole::Session => name.to_string(),
            LogRole::Worker => format!("{} worker {}", name, std::process::id()),
        }
    }
}

/// Colored env_logger: this crate at Info (Debug when verbose), dependencies at Warn,
/// `RUST_LOG` still honoured. A second call is a no-op.
pub fn setup_logging(verbose: bool) {
    setup_logging_as(LogRole::Session, verbose);
}

pub fn setup_logging_as(role: LogRole, verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let tag = role.tag();

    let _ = Builder::from_default_env()
        .filter_level(LevelFilter::Warn)
        .filter_module(PackagePaths::get().pkg_name(), level)
        .format(move |buf, record| {
            let line = match record.level() {
                Level::Error => format!(
                    "[{} {} {}] {}",
                    tag.cyan(),
                    "ERROR".red(),
                    record.target().white(),
                    record.args()
                ),
                Level::Warn => format!(
                    "[{} {} {}] {}",
                    tag.cyan(),
                    "WARN".yellow(),
                    record.target().white(),
                    record.args()
                ),
                Level::Debug | Level::Trace => {
                    format!("[{} {}] {}", tag.cyan(), "debug".dimmed(), record.args())
                }
                Level::Info => format!("[{}] {}", tag.cyan(), record.args()),
            };
            writeln!(buf, "{}", line)
        })
        .try_init();
}

/// Print a `==>` status message to stdout unless quiet.
pub fn notice(quiet: bool, message: &str) {
    if !quiet {
        println!("{} {}", "==>".cyan().bold(), message);
    }
}

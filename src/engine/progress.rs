//! Progress display for a session: a kdam bar in finite mode, a single status line in live mode.

use kdam::{Animation, Bar, BarExt};
use std::io::Write;

/// Counter snapshot handed to the display every heartbeat.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    pub found: u64,
    pub queued: u64,
    pub processed: u64,
    pub active_batches: usize,
}

/// Configuration for creating a progress bar
pub struct ProgressBarConfig {
    pub total: usize,
    pub desc: &'static str,
    pub animation: Animation,
}

impl ProgressBarConfig {
    /// Create a new progress bar configuration
    pub fn new(total: usize, desc: &'static str, animation: Animation) -> Self {
        Self {
            total,
            desc,
            animation,
        }
    }
}

/// Create a progress bar with the given configuration
pub fn create_progress_bar(config: ProgressBarConfig) -> Bar {
    kdam::tqdm!(
        total = config.total,
        desc = config.desc,
        animation = config.animation
    )
}

/// Create a counter for unknown total (shows count without percentage)
pub fn create_counter(desc: &'static str) -> Bar {
    kdam::tqdm!(
        total = 0,
        desc = desc,
        animation = Animation::Classic,
        position = 0,
        unit = " files"
    )
}

const BAR_DESC: &str = "Processing";

/// Spinner-style counter until the scan finishes, then a determinate bar over `found`.
pub struct FiniteProgress {
    bar: Bar,
    finalized: bool,
}

impl FiniteProgress {
    pub fn new() -> Self {
        let mut bar = create_counter(BAR_DESC);
        let _ = bar.refresh();
        Self {
            bar,
            finalized: false,
        }
    }

    pub fn refresh(&mut self, counters: &Counters, scan_finished: bool) {
        if !self.finalized && scan_finished {
            self.finalized = true;
            let _ = self.bar.clear();
            self.bar = create_progress_bar(ProgressBarConfig::new(
                counters.found as usize,
                BAR_DESC,
                Animation::Classic,
            ));
        } else if self.finalized {
            // found can still shrink when late duplicates are cancelled
            self.bar.total = counters.found as usize;
        }
        let _ = self.bar.update_to(counters.processed as usize);
    }

    pub fn finish(&mut self, counters: &Counters, scan_finished: bool) {
        self.refresh(counters, scan_finished);
        eprintln!();
    }
}

impl Default for FiniteProgress {
    fn default() -> Self {
        Self::new()
    }
}

const GLYPHS: [char; 4] = ['/', '-', '\\', '|'];

/// Single redrawn status line for live mode.
#[derive(Default)]
pub struct LiveStatus {
    prev: Option<(u64, u64, u64)>,
    prev_width: usize,
    glyph: usize,
}

impl LiveStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Line to draw this heartbeat, or None when nothing changed and no batch is in flight.
    /// Padded with spaces to cover a longer previous line.
    pub fn render(&mut self, counters: &Counters) -> Option<String> {
        let current = (counters.processed, counters.queued, counters.found);
        if self.prev == Some(current) && counters.active_batches == 0 {
            return None;
        }
        let glyph = GLYPHS[self.glyph % GLYPHS.len()];
        self.glyph = self.glyph.wrapping_add(1);
        let mut msg = format!(
            "\rLIVE [{}] {} processed, {} queued ({} total reads)",
            glyph, counters.processed, counters.queued, counters.found
        );
        let width = msg.chars().count();
        if width < self.prev_width {
            msg.push_str(&" ".repeat(self.prev_width - width));
        }
        self.prev_width = width;
        self.prev = Some(current);
        Some(msg)
    }

    pub fn refresh(&mut self, counters: &Counters) {
        if let Some(line) = self.render(counters) {
            let mut out = std::io::stdout().lock();
            let _ = out.write_all(line.as_bytes());
            let _ = out.flush();
        }
    }

    pub fn finish(&mut self) {
        println!();
    }
}

/// The two mutually exclusive presentation modes, chosen once per session.
pub enum ProgressDisplay {
    Finite(FiniteProgress),
    Live(LiveStatus),
}

impl ProgressDisplay {
    /// Display for this session, or None when neither console output is wanted.
    /// Finite mode always reports unless quiet; live mode is silent when quiet.
    pub fn for_session(live: bool, quiet: bool) -> Option<Self> {
        match (live, quiet) {
            (_, true) => None,
            (true, false) => Some(ProgressDisplay::Live(LiveStatus::new())),
            (false, false) => Some(ProgressDisplay::Finite(FiniteProgress::new())),
        }
    }

    pub fn refresh(&mut self, counters: &Counters, scan_finished: bool) {
        match self {
            ProgressDisplay::Finite(p) => p.refresh(counters, scan_finished),
            ProgressDisplay::Live(s) => s.refresh(counters),
        }
    }

    pub fn finish(&mut self, counters: &Counters, scan_finished: bool) {
        match self {
            ProgressDisplay::Finite(p) => p.finish(counters, scan_finished),
            ProgressDisplay::Live(s) => s.finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counters(found: u64, queued: u64, processed: u64, active: usize) -> Counters {
        Counters {
            found,
            queued,
            processed,
            active_batches: active,
        }
    }

    #[test]
    fn live_status_redraws_only_on_change_or_activity() {
        let mut status = LiveStatus::new();
        let first = status.render(&counters(3, 3, 0, 0)).unwrap();
        assert!(first.contains("0 processed, 3 queued (3 total reads)"));
        assert!(first.contains("[/]"));
        assert!(status.render(&counters(3, 3, 0, 0)).is_none());
        let busy = status.render(&counters(3, 3, 0, 1)).unwrap();
        assert!(busy.contains("[-]"));
        assert!(status.render(&counters(3, 1, 2, 0)).is_some());
    }

    #[test]
    fn live_status_pads_shorter_lines() {
        let mut status = LiveStatus::new();
        let long = status.render(&counters(1000, 1000, 0, 0)).unwrap();
        let short = status.render(&counters(1, 0, 1, 0)).unwrap();
        assert_eq!(long.chars().count(), short.chars().count());
    }

    #[test]
    fn quiet_disables_display() {
        assert!(ProgressDisplay::for_session(true, true).is_none());
        assert!(ProgressDisplay::for_session(false, true).is_none());
        assert!(matches!(
            ProgressDisplay::for_session(true, false),
            Some(ProgressDisplay::Live(_))
        ));
    }
}

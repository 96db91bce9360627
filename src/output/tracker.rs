//! Running totals across all merged batches, printed once the session completes.

use log::info;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::time::Duration;

use crate::FileResult;

#[derive(Debug, Default)]
pub struct FinalSummaryTracker {
    total: u64,
    by_status: BTreeMap<String, u64>,
    by_label: BTreeMap<String, u64>,
}

impl FinalSummaryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed_results(&mut self, results: &[FileResult]) {
        for result in results {
            self.total += 1;
            *self
                .by_status
                .entry(result.status.as_str().to_string())
                .or_default() += 1;
            if let Some(label) = &result.label {
                *self.by_label.entry(label.clone()).or_default() += 1;
            }
        }
    }

    pub fn summary(&self, elapsed: Duration) -> FinalSummary {
        FinalSummary {
            total: self.total,
            by_status: self.by_status.clone(),
            by_label: self.by_label.clone(),
            elapsed,
        }
    }
}

/// Final run summary returned by a completed session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FinalSummary {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
    pub by_label: BTreeMap<String, u64>,
    pub elapsed: Duration,
}

impl FinalSummary {
    pub fn count(&self, status: &str) -> u64 {
        self.by_status.get(status).copied().unwrap_or(0)
    }

    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "== Summary: {} files in {:.1}s ==",
            self.total,
            self.elapsed.as_secs_f64()
        )];
        for (status, n) in &self.by_status {
            lines.push(format!(" * {:<12}\t{}", status, n));
        }
        if !self.by_label.is_empty() {
            lines.push("== Labels ==".to_string());
            for (label, n) in &self.by_label {
                lines.push(format!(" * {:<12}\t{}", label, n));
            }
        }
        lines
    }

    pub fn print_to(&self, sink: &mut dyn Write) -> io::Result<()> {
        for line in self.lines() {
            writeln!(sink, "{}", line)?;
        }
        sink.flush()
    }

    pub fn log(&self) {
        for line in self.lines() {
            info!("{}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_status_and_label() {
        let mut tracker = FinalSummaryTracker::new();
        let mut labelled = FileResult::okay("bc01/a.fast5", "a");
        labelled.label = Some("bc01".to_string());
        tracker.feed_results(&[
            labelled,
            FileResult::okay("b.fast5", "b"),
            FileResult::disappeared("c.fast5"),
        ]);
        let summary = tracker.summary(Duration::from_secs(1));
        assert_eq!(summary.total, 3);
        assert_eq!(summary.count("okay"), 2);
        assert_eq!(summary.count("disappeared"), 1);
        assert_eq!(summary.by_label.get("bc01"), Some(&1));

        let mut out = Vec::new();
        summary.print_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("3 files"));
        assert!(text.contains("bc01"));
    }
}

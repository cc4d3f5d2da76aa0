use std::sync::atomic::{AtomicU64, Ordering};

use colored::Colorize;
use nestdiff_engine::ProgressSink;

/// Prints a percentage line to stderr whenever the whole-number percentage
/// changes.
#[derive(Debug, Default)]
pub struct StderrProgress {
    // Last printed percentage plus one; zero before the first line.
    last: AtomicU64,
}

impl StderrProgress {
    fn should_print(&self, percent: u64) -> bool {
        self.last.swap(percent + 1, Ordering::Relaxed) != percent + 1
    }
}

pub fn percent(done: u64, total: u64) -> u64 {
    if total == 0 {
        100
    } else {
        done.min(total) * 100 / total
    }
}

impl ProgressSink for StderrProgress {
    fn on_progress(&self, done: u64, total: u64, message: &str) {
        let percent = percent(done, total);
        if self.should_print(percent) {
            eprintln!("{} {message}", format!("[{percent:>3}%]").dimmed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_is_clamped() {
        assert_eq!(percent(0, 0), 100);
        assert_eq!(percent(1, 4), 25);
        assert_eq!(percent(5, 4), 100);
    }

    #[test]
    fn repeated_percentages_are_suppressed() {
        let sink = StderrProgress::default();
        assert!(sink.should_print(10));
        assert!(!sink.should_print(10));
        assert!(sink.should_print(11));
        assert!(sink.should_print(0));
    }
}

//! Download progress estimation.

use crate::event::{Event, EventKind};

/// Upper bound of the progress scale when the file size is known.
pub const PROGRESS_SCALE: u64 = 25;

/// Tracks the file being downloaded and the last progress value sent.
#[derive(Debug, Clone, Default)]
pub struct DownloadProgressEstimator {
    last_filename: Option<String>,
    last_total: Option<i64>,
    last_progress: u64,
}

impl DownloadProgressEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes one `(filename, transferred, total)` sample.
    ///
    /// A total of zero or less means the size is unknown.
    pub fn sample(&mut self, filename: &str, transferred: u64, total: i64) -> Vec<Event> {
        let mut events = Vec::new();
        let description = format!("Download {}: {}/{}", filename, transferred, total);

        if self.last_filename.as_deref() != Some(filename) || self.last_total != Some(total) {
            self.last_filename = Some(filename.to_string());
            self.last_total = Some(total);
            self.last_progress = 0;
            events.push(Event::new(EventKind::Action, description.clone()));
        }

        let progress = estimate(transferred, total);
        if progress > self.last_progress {
            self.last_progress = progress;
            events.push(Event::new(EventKind::Action, description));
            events.push(Event::new(EventKind::Percent, progress.to_string()));
        }

        events
    }

    pub fn last_progress(&self) -> u64 {
        self.last_progress
    }
}

/// Progress value for `transferred` bytes out of `total`.
///
/// Known sizes map onto `0..=25`. Unknown sizes use `ln(1 + KiB)² / 2`,
/// which keeps growing slowly and has no upper bound.
pub fn estimate(transferred: u64, total: i64) -> u64 {
    if total > 0 {
        (transferred as u128 * PROGRESS_SCALE as u128 / total as u128) as u64
    } else {
        let kib = transferred as f64 / 1024.0;
        ((1.0 + kib).ln().powi(2) / 2.0).floor() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_file_announces_itself() {
        let mut estimator = DownloadProgressEstimator::new();
        let events = estimator.sample("core.db", 0, 1000);

        assert_eq!(events, vec![Event::new(EventKind::Action, "Download core.db: 0/1000")]);
    }

    #[test]
    fn test_progress_emitted_only_on_increase() {
        let mut estimator = DownloadProgressEstimator::new();
        estimator.sample("extra.db", 0, 100);

        let events = estimator.sample("extra.db", 40, 100);
        assert_eq!(
            events,
            vec![
                Event::new(EventKind::Action, "Download extra.db: 40/100"),
                Event::new(EventKind::Percent, "10"),
            ]
        );

        // 41 * 25 / 100 is still 10.
        assert!(estimator.sample("extra.db", 41, 100).is_empty());
        assert_eq!(estimator.last_progress(), 10);
    }

    #[test]
    fn test_changed_total_resets_baseline() {
        let mut estimator = DownloadProgressEstimator::new();
        estimator.sample("pkg.tar.zst", 100, 100);
        assert_eq!(estimator.last_progress(), 25);

        let events = estimator.sample("pkg.tar.zst", 100, 200);
        assert_eq!(events.len(), 3);
        assert_eq!(events[2], Event::new(EventKind::Percent, "12"));
    }

    #[test]
    fn test_unknown_size_uses_log_heuristic() {
        assert_eq!(estimate(0, 0), 0);
        // ln(1 + 1024)^2 / 2 = 24.03...
        assert_eq!(estimate(1024 * 1024, 0), 24);
        assert_eq!(estimate(1024 * 1024, -1), 24);

        let mut estimator = DownloadProgressEstimator::new();
        estimator.sample("mirrorlist", 0, -1);
        let events = estimator.sample("mirrorlist", 1024 * 1024, -1);
        assert_eq!(events[1], Event::new(EventKind::Percent, "24"));
        assert!(estimator.sample("mirrorlist", 1024 * 1024 + 1, -1).is_empty());
    }

    proptest! {
        #[test]
        fn known_size_progress_is_bounded_and_monotonic(
            total in 1i64..=i64::MAX / 2,
            a in 0u64..=u64::MAX,
            b in 0u64..=u64::MAX,
        ) {
            let limit = total as u64;
            let (lo, hi) = {
                let (x, y) = (a % (limit + 1), b % (limit + 1));
                (x.min(y), x.max(y))
            };
            let p_lo = estimate(lo, total);
            let p_hi = estimate(hi, total);
            prop_assert!(p_hi <= PROGRESS_SCALE);
            prop_assert!(p_lo <= p_hi);
        }

        #[test]
        fn unknown_size_matches_formula(transferred in 0u64..(1u64 << 40)) {
            let expected = ((1.0 + transferred as f64 / 1024.0).ln().powi(2) / 2.0).floor() as u64;
            prop_assert_eq!(estimate(transferred, 0), expected);
        }

        #[test]
        fn unknown_size_emits_only_on_strict_increase(
            steps in proptest::collection::vec(0u64..(1u64 << 30), 1..40)
        ) {
            let mut estimator = DownloadProgressEstimator::new();
            let mut best = 0u64;
            for transferred in steps {
                let events = estimator.sample("unknown", transferred, 0);
                let emitted = events.iter().any(|e| e.kind == EventKind::Percent);
                let progress = estimate(transferred, 0);
                prop_assert_eq!(emitted, progress > best);
                best = best.max(progress);
            }
        }
    }
}

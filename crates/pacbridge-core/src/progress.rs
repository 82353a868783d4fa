//! Translation of engine progress samples into UI events.

use crate::event::{Event, EventKind};

/// Label shown while the engine reports progress without a named target.
pub const ABSTRACT_TARGET_LABEL: &str = "Checking and loading packages...";

/// Tracks the last progress sample to detect phase and target changes.
///
/// The engine reports progress in two modes. With an empty target it is an
/// abstract phase (integrity checks, loading package files, ...); a falling
/// percent or index means a new phase started. With a named target the
/// engine is working on one package; a new name or a falling percent means
/// a new target.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    last_target: Option<String>,
    last_percent: i32,
    last_index: i64,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            last_target: None,
            last_percent: 100,
            last_index: -1,
        }
    }

    /// Consumes one `(target, percent, index, total)` sample.
    pub fn sample(&mut self, target: &str, percent: i32, index: usize, total: usize) -> Vec<Event> {
        let mut events = Vec::new();
        let index = index as i64;

        if target.is_empty() {
            if percent < self.last_percent || index < self.last_index {
                events.push(Event::new(
                    EventKind::Info,
                    format!("Progress ({} targets)", total),
                ));
                self.last_index = 0;
            }
            events.push(Event::new(EventKind::Target, ABSTRACT_TARGET_LABEL));
            events.push(Event::new(EventKind::Percent, fraction(percent as f64, 100.0)));
            self.last_index = index;
        } else if self.last_target.as_deref() != Some(target) || percent < self.last_percent {
            self.last_target = Some(target.to_string());
            self.last_percent = 0;
            events.push(Event::new(
                EventKind::Target,
                format!("Installing {} ({}/{})", target, index, total),
            ));
            events.push(Event::new(EventKind::Percent, fraction(percent as f64, 100.0)));
            events.push(Event::new(
                EventKind::GlobalPercent,
                fraction(index as f64, total as f64),
            ));
        }

        self.last_percent = percent;
        events
    }

    pub fn last_target(&self) -> Option<&str> {
        self.last_target.as_deref()
    }

    pub fn last_percent(&self) -> i32 {
        self.last_percent
    }

    pub fn last_index(&self) -> i64 {
        self.last_index
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Renders `part / whole` as event text; an empty whole counts as no progress.
fn fraction(part: f64, whole: f64) -> String {
    if whole <= 0.0 {
        return "0".to_string();
    }
    (part / whole).to_string()
}

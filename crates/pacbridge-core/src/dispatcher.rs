//! Engine callback handlers.

use crate::dedup::{EventDeduplicator, Origin};
use crate::download::DownloadProgressEstimator;
use crate::engine::{EngineCallbacks, EngineEvent, LogLevel, Question};
use crate::error::Fatal;
use crate::event::{EventKind, EventQueue};
use crate::progress::ProgressTracker;
use tracing::{debug, error, warn};

/// Turns engine callbacks into deduplicated UI events.
///
/// Owns all per-transaction tracking state. After a fatal error has been
/// queued, every further callback is ignored so nothing lands behind the
/// error in the queue.
pub struct CallbackDispatcher<Q> {
    events: EventDeduplicator<Q>,
    progress: ProgressTracker,
    download: DownloadProgressEstimator,
    fatal: Option<Fatal>,
}

impl<Q: EventQueue> CallbackDispatcher<Q> {
    pub fn new(queue: Q) -> Self {
        Self {
            events: EventDeduplicator::new(queue),
            progress: ProgressTracker::new(),
            download: DownloadProgressEstimator::new(),
            fatal: None,
        }
    }

    /// Queues a UI event unless it repeats the last one of its kind.
    pub fn emit(&mut self, kind: EventKind, text: impl Into<String>) {
        if self.fatal.is_none() {
            self.events.emit(kind, text);
        }
    }

    /// Queues a fatal error event.
    pub fn raise(&mut self, message: &str, origin: Origin) -> Fatal {
        if let Some(fatal) = &self.fatal {
            return fatal.clone();
        }
        let fatal = self.events.emit_error(message, origin);
        self.fatal = Some(fatal.clone());
        fatal
    }

    pub fn fatal(&self) -> Option<&Fatal> {
        self.fatal.as_ref()
    }

    /// Blocks until the consumer has taken every queued event.
    pub fn wait_drained(&self) {
        self.events.wait_drained();
    }

    pub fn queue(&self) -> &Q {
        self.events.queue()
    }
}

/// UI label for an engine lifecycle event.
pub fn event_label(event: EngineEvent) -> Option<&'static str> {
    let label = match event {
        EngineEvent::CheckDepsStart => "Checking dependencies...",
        EngineEvent::FileConflictsStart => "Checking file conflicts...",
        EngineEvent::ResolveDepsStart => "Resolving dependencies...",
        EngineEvent::InterConflictsStart => "Checking inter conflicts...",
        EngineEvent::RemoveStart => "Removing...",
        EngineEvent::UpgradeStart => "Upgrading...",
        EngineEvent::IntegrityStart => "Checking integrity...",
        EngineEvent::LoadStart => "Loading packages files...",
        EngineEvent::ScriptletInfo => "Configuring...",
        EngineEvent::RetrieveStart => "Downloading a file",
        // Per-package installs are covered by progress targets.
        EngineEvent::AddStart | EngineEvent::Other => return None,
    };
    Some(label)
}

impl<Q: EventQueue> EngineCallbacks for CallbackDispatcher<Q> {
    fn on_event(&mut self, event: EngineEvent) {
        if let Some(label) = event_label(event) {
            self.emit(EventKind::Action, label);
        }
    }

    fn on_log(&mut self, level: LogLevel, message: &str) {
        let message = message.trim_end();
        match level {
            LogLevel::Error => error!(target: "alpm", "{}", message),
            LogLevel::Warning => warn!(target: "alpm", "{}", message),
            LogLevel::Debug | LogLevel::Function => {}
        }
    }

    fn on_question(&mut self, question: &Question) {
        debug!("Keeping default answer for {:?}", question);
    }

    fn on_progress(&mut self, target: &str, percent: i32, total: usize, index: usize) {
        if self.fatal.is_some() {
            return;
        }
        let events = self.progress.sample(target, percent, index, total);
        self.events.emit_all(events);
    }

    fn on_download(&mut self, filename: &str, transferred: u64, total: i64) {
        if self.fatal.is_some() {
            return;
        }
        let events = self.download.sample(filename, transferred, total);
        self.events.emit_all(events);
    }

    fn on_total_download_size(&mut self, size: i64) {
        debug!("Total download size: {} bytes", size);
    }
}

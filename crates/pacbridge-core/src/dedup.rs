//! Suppression of repeated events before they reach the queue.

use crate::error::Fatal;
use crate::event::{Event, EventKind, EventQueue, PushError};
use std::collections::HashMap;
use std::fmt;
use tracing::{error, trace};

/// Where a fatal error was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Origin {
    pub module: &'static str,
    pub file: &'static str,
    pub line: u32,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}:{}", self.module, self.file, self.line)
    }
}

/// Captures the [`Origin`] of the invocation site.
#[macro_export]
macro_rules! origin {
    () => {
        $crate::dedup::Origin {
            module: module_path!(),
            file: file!(),
            line: line!(),
        }
    };
}

/// Forwards events to the queue unless the same text was the last one sent
/// for that kind.
///
/// The engine fires progress and log callbacks at a very high rate, often
/// with unchanged content. Only the last text per kind is remembered, so a
/// value that changes and then changes back is delivered again.
pub struct EventDeduplicator<Q> {
    queue: Q,
    last: HashMap<EventKind, String>,
}

impl<Q: EventQueue> EventDeduplicator<Q> {
    pub fn new(queue: Q) -> Self {
        Self {
            queue,
            last: HashMap::new(),
        }
    }

    /// Pushes `(kind, text)` unless it repeats the last text of that kind.
    ///
    /// Returns whether the event was handed to the queue. A full queue drops
    /// the event: the producer is never held back by a slow consumer.
    pub fn emit(&mut self, kind: EventKind, text: impl Into<String>) -> bool {
        let text = text.into();
        if !self.remember(kind, &text) {
            return false;
        }
        self.push(Event::new(kind, text))
    }

    /// Queues a fatal error tagged with where it was raised.
    ///
    /// Blocks while the queue is full, so the error is never dropped.
    /// Always yields a [`Fatal`], even when the text repeats the previous
    /// error and nothing new is queued.
    pub fn emit_error(&mut self, message: &str, origin: Origin) -> Fatal {
        let text = format!("{}: {}", message, origin);
        if self.remember(EventKind::Error, message) {
            // Unlike other events, an error waits for room in the queue.
            if self.queue.push_blocking(Event::new(EventKind::Error, text.clone())).is_err() {
                trace!("Event queue closed, dropping error event");
            }
        }
        error!("{}", text);
        Fatal::new(text)
    }

    /// Pushes every event in order through the repeat filter.
    pub fn emit_all(&mut self, events: impl IntoIterator<Item = Event>) {
        for event in events {
            self.emit(event.kind, event.text);
        }
    }

    /// Blocks until the consumer has drained the queue.
    pub fn wait_drained(&self) {
        self.queue.wait_drained();
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// Records `text` as the last one for `kind`; false if it already was.
    fn remember(&mut self, kind: EventKind, text: &str) -> bool {
        if self.last.get(&kind).is_some_and(|last| last == text) {
            return false;
        }
        self.last.insert(kind, text.to_string());
        true
    }

    fn push(&self, event: Event) -> bool {
        match self.queue.try_push(event) {
            Ok(()) => true,
            Err(PushError::Full) => {
                trace!("Event queue full, dropping event");
                false
            }
            Err(PushError::Closed) => {
                trace!("Event queue closed, dropping event");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ChannelQueue;

    fn drain(receiver: &async_channel::Receiver<Event>) -> Vec<Event> {
        std::iter::from_fn(|| receiver.try_recv().ok()).collect()
    }

    #[test]
    fn test_repeated_event_is_queued_once() {
        let (queue, receiver) = ChannelQueue::bounded(16);
        let mut dedup = EventDeduplicator::new(queue);

        assert!(dedup.emit(EventKind::Action, "Checking dependencies..."));
        assert!(!dedup.emit(EventKind::Action, "Checking dependencies..."));

        assert_eq!(drain(&receiver).len(), 1);
    }

    #[test]
    fn test_same_text_different_kind_is_not_suppressed() {
        let (queue, receiver) = ChannelQueue::bounded(16);
        let mut dedup = EventDeduplicator::new(queue);

        dedup.emit(EventKind::Percent, "0.5");
        dedup.emit(EventKind::GlobalPercent, "0.5");

        assert_eq!(drain(&receiver).len(), 2);
    }

    #[test]
    fn test_text_reappearing_after_change_is_delivered() {
        let (queue, receiver) = ChannelQueue::bounded(16);
        let mut dedup = EventDeduplicator::new(queue);

        dedup.emit(EventKind::Target, "a");
        dedup.emit(EventKind::Target, "b");
        dedup.emit(EventKind::Target, "a");

        let texts: Vec<_> = drain(&receiver).into_iter().map(|e| e.text).collect();
        assert_eq!(texts, vec!["a", "b", "a"]);
    }

    #[test]
    fn test_full_queue_drops_silently() {
        let (queue, receiver) = ChannelQueue::bounded(1);
        let mut dedup = EventDeduplicator::new(queue);

        assert!(dedup.emit(EventKind::Info, "first"));
        assert!(!dedup.emit(EventKind::Info, "second"));

        assert_eq!(drain(&receiver), vec![Event::new(EventKind::Info, "first")]);
    }

    #[test]
    fn test_error_is_augmented_and_fatal() {
        let (queue, receiver) = ChannelQueue::bounded(16);
        let mut dedup = EventDeduplicator::new(queue);

        let fatal = dedup.emit_error("disk full", crate::origin!());
        let events = drain(&receiver);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Error);
        assert!(events[0].text.starts_with("disk full: "));
        assert!(events[0].text.contains("dedup.rs:"));
        assert_eq!(fatal.message, events[0].text);
    }

    #[test]
    fn test_repeated_error_is_still_fatal() {
        let (queue, receiver) = ChannelQueue::bounded(16);
        let mut dedup = EventDeduplicator::new(queue);

        dedup.emit_error("boom", crate::origin!());
        let fatal = dedup.emit_error("boom", crate::origin!());

        assert!(fatal.message.starts_with("boom: "));
        assert_eq!(drain(&receiver).len(), 1);
    }

    #[test]
    fn test_error_waits_for_full_queue() {
        let (queue, receiver) = ChannelQueue::bounded(1);
        let mut dedup = EventDeduplicator::new(queue);
        dedup.emit(EventKind::Info, "busy");

        let consumer = std::thread::spawn(move || {
            let mut seen = Vec::new();
            while let Ok(event) = receiver.recv_blocking() {
                seen.push(event);
                if seen.len() == 2 {
                    break;
                }
            }
            seen
        });

        let fatal = dedup.emit_error("out of space", crate::origin!());
        let seen = consumer.join().unwrap();
        assert_eq!(seen[0], Event::new(EventKind::Info, "busy"));
        assert_eq!(seen[1], Event::new(EventKind::Error, fatal.message));
    }
}

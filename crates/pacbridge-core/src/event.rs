//! UI-facing events and the bounded queue that carries them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::trace;

/// Default capacity of the event queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// How often a drain wait re-checks the queue.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Kind of a UI event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// What the engine is doing right now.
    Action,
    /// Informational line, such as the start of a new progress phase.
    Info,
    /// The item currently being worked on.
    Target,
    /// Progress of the current item.
    Percent,
    /// Progress of the whole transaction.
    GlobalPercent,
    /// Fatal error. The producer terminates once it has been delivered.
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Action => "action",
            EventKind::Info => "info",
            EventKind::Target => "target",
            EventKind::Percent => "percent",
            EventKind::GlobalPercent => "global_percent",
            EventKind::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `(type, text)` pair delivered to the consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub text: String,
}

impl Event {
    pub fn new(kind: EventKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Push could not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    Full,
    Closed,
}

/// Producer side of the event queue.
pub trait EventQueue {
    /// Pushes without blocking.
    fn try_push(&self, event: Event) -> Result<(), PushError>;

    /// Pushes, waiting for room if the queue is full. Only the fatal path
    /// may hold the producer back like this.
    fn push_blocking(&self, event: Event) -> Result<(), PushError>;

    /// Blocks until the consumer has taken every queued event.
    fn wait_drained(&self);
}

/// Bounded FIFO queue backed by `async-channel`.
///
/// The consumer may live on another thread or task and use either the
/// blocking or the async receive side.
#[derive(Clone)]
pub struct ChannelQueue {
    sender: async_channel::Sender<Event>,
}

impl ChannelQueue {
    /// Creates a bounded queue and returns the producer and consumer ends.
    pub fn bounded(capacity: usize) -> (Self, async_channel::Receiver<Event>) {
        let (sender, receiver) = async_channel::bounded(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Number of events not yet taken by the consumer.
    pub fn len(&self) -> usize {
        self.sender.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sender.is_empty()
    }
}

impl EventQueue for ChannelQueue {
    fn try_push(&self, event: Event) -> Result<(), PushError> {
        self.sender.try_send(event).map_err(|e| match e {
            async_channel::TrySendError::Full(_) => PushError::Full,
            async_channel::TrySendError::Closed(_) => PushError::Closed,
        })
    }

    fn push_blocking(&self, event: Event) -> Result<(), PushError> {
        self.sender
            .send_blocking(event)
            .map_err(|_| PushError::Closed)
    }

    fn wait_drained(&self) {
        // A closed channel has nobody left to drain it.
        while !self.sender.is_empty() && !self.sender.is_closed() {
            trace!("Waiting for {} queued events", self.sender.len());
            std::thread::sleep(DRAIN_POLL_INTERVAL);
        }
    }
}

impl<Q: EventQueue + ?Sized> EventQueue for std::rc::Rc<Q> {
    fn try_push(&self, event: Event) -> Result<(), PushError> {
        (**self).try_push(event)
    }

    fn push_blocking(&self, event: Event) -> Result<(), PushError> {
        (**self).push_blocking(event)
    }

    fn wait_drained(&self) {
        (**self).wait_drained()
    }
}

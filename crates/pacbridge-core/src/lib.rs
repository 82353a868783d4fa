//! Core of pacbridge.
//!
//! Drives package database transactions through an [`engine::Engine`] and
//! turns the engine's callbacks into a short, deduplicated stream of
//! [`event::Event`]s on a bounded queue.

pub mod dedup;
pub mod dispatcher;
pub mod download;
pub mod engine;
pub mod error;
pub mod event;
pub mod manager;
pub mod memory;
pub mod options;
pub mod package;
pub mod progress;
pub mod resolver;
pub mod transaction;

pub use dedup::{EventDeduplicator, Origin};
pub use dispatcher::CallbackDispatcher;
pub use download::DownloadProgressEstimator;
pub use engine::{Engine, EngineCallbacks, EngineEvent, EngineVersions, LogLevel, Question, SyncSource};
pub use error::{Error, ExitCode, Fatal, Result};
pub use event::{ChannelQueue, Event, EventKind, EventQueue};
pub use manager::TransactionManager;
pub use options::{TransactionFlags, TransactionOptions};
pub use package::{Group, InstallReason, Package};
pub use progress::ProgressTracker;
pub use resolver::{ConflictSet, PackageResolver};
pub use transaction::{Transaction, TransactionState};

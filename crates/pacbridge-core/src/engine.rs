//! Boundary to the package database engine.
//!
//! The engine owns dependency resolution, conflict detection and the actual
//! install. pacbridge only drives it: it looks packages up in the sync
//! sources, opens transactions and listens to the callbacks the engine fires
//! while it works.

use crate::error::Result;
use crate::options::TransactionFlags;
use crate::package::{Group, Package};
use std::cell::RefCell;
use std::rc::Rc;

/// Lifecycle events reported by the engine during a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineEvent {
    CheckDepsStart,
    FileConflictsStart,
    ResolveDepsStart,
    InterConflictsStart,
    AddStart,
    RemoveStart,
    UpgradeStart,
    IntegrityStart,
    LoadStart,
    ScriptletInfo,
    RetrieveStart,
    /// Any event pacbridge has no label for.
    Other,
}

/// Severity of an engine log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Error,
    Warning,
    Debug,
    Function,
}

/// Questions the engine may ask mid-transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Question {
    InstallIgnorePkg(String),
    Replace { old: String, new: String },
    Conflict { package: String, conflict: String },
    Corrupted(String),
    RemovePkgs(Vec<String>),
    SelectProvider(String),
    ImportKey(String),
    Other,
}

/// Callback surface handed to the engine when a transaction opens.
///
/// The engine calls these synchronously on the thread that drives
/// prepare, commit or a database update.
pub trait EngineCallbacks {
    fn on_event(&mut self, event: EngineEvent);

    fn on_log(&mut self, level: LogLevel, message: &str);

    /// Informational only: the engine's default answer always stands.
    fn on_question(&mut self, question: &Question);

    fn on_progress(&mut self, target: &str, percent: i32, total: usize, index: usize);

    /// `total <= 0` means the size is unknown.
    fn on_download(&mut self, filename: &str, transferred: u64, total: i64);

    fn on_total_download_size(&mut self, size: i64);
}

/// Shared handle to the callbacks, as stored by an engine.
pub type Hooks = Rc<RefCell<dyn EngineCallbacks>>;

/// Version strings of the engine and of the binding used to reach it,
/// e.g. "alpm-rs v4" and "libalpm v15.0.0".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineVersions {
    pub binding: String,
    pub engine: String,
}

/// A registered repository the engine can query.
pub trait SyncSource {
    fn name(&self) -> &str;

    fn package(&self, name: &str) -> Option<Package>;

    fn group(&self, name: &str) -> Option<Group>;
}

/// Operations pacbridge needs from the engine.
pub trait Engine {
    /// Sync sources in registration order.
    fn sync_sources(&self) -> Vec<Box<dyn SyncSource + '_>>;

    /// Registers the callbacks for every following engine call.
    fn set_hooks(&mut self, hooks: Hooks);

    fn init_transaction(&mut self, flags: TransactionFlags) -> Result<()>;

    fn add_package(&mut self, package: &Package) -> Result<()>;

    fn prepare(&mut self) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn release(&mut self) -> Result<()>;

    /// Updates one sync source. Returns false if it was already up to date.
    fn update_source(&mut self, source: &str, force: bool) -> Result<bool>;

    fn versions(&self) -> EngineVersions;
}

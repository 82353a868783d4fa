//! In-process engine.
//!
//! Holds its sync sources in memory, records every call it receives and
//! replays scripted callbacks during prepare, commit and updates. Used for
//! tests and dry runs where no system package database is available.

use crate::engine::{
    Engine, EngineEvent, EngineVersions, Hooks, LogLevel, Question, SyncSource,
};
use crate::error::{Error, Result};
use crate::options::TransactionFlags;
use crate::package::{Group, Package};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use tracing::debug;

/// Version reported for group members that are not also listed as packages.
const DEFAULT_VERSION: &str = "1.0-1";

/// A sync source held in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    packages: Vec<Package>,
    groups: Vec<Group>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            packages: Vec::new(),
            groups: Vec::new(),
        }
    }

    pub fn with_package(mut self, name: &str, version: &str) -> Self {
        self.packages
            .push(Package::new(name, version, self.name.clone()));
        self
    }

    pub fn with_group(mut self, name: &str, members: &[&str]) -> Self {
        let packages = members
            .iter()
            .map(|member| {
                self.packages
                    .iter()
                    .find(|pkg| pkg.name == *member)
                    .cloned()
                    .unwrap_or_else(|| Package::new(*member, DEFAULT_VERSION, self.name.clone()))
            })
            .collect();
        self.groups.push(Group {
            name: name.to_string(),
            packages,
        });
        self
    }
}

impl SyncSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn package(&self, name: &str) -> Option<Package> {
        self.packages.iter().find(|pkg| pkg.name == name).cloned()
    }

    fn group(&self, name: &str) -> Option<Group> {
        self.groups.iter().find(|group| group.name == name).cloned()
    }
}

/// A callback the engine fires while it works.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callback {
    Event(EngineEvent),
    Log(LogLevel, String),
    Question(Question),
    Progress {
        target: String,
        percent: i32,
        total: usize,
        index: usize,
    },
    Download {
        filename: String,
        transferred: u64,
        total: i64,
    },
    TotalDownloadSize(i64),
}

/// Record of what the engine was asked to do.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    pub inits: usize,
    pub prepares: usize,
    pub commits: usize,
    pub releases: usize,
    pub flags: Vec<TransactionFlags>,
    pub added: Vec<Package>,
    pub updated: Vec<String>,
}

/// Engine backed by [`MemorySource`]s.
pub struct MemoryEngine {
    sources: Vec<MemorySource>,
    hooks: Option<Hooks>,
    open: bool,
    prepare_script: Vec<Callback>,
    commit_script: Vec<Callback>,
    update_script: Vec<Callback>,
    source_scripts: HashMap<String, Vec<Callback>>,
    prepare_error: Option<String>,
    commit_error: Option<String>,
    failing_sources: HashSet<String>,
    journal: Rc<RefCell<Journal>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            hooks: None,
            open: false,
            prepare_script: Vec::new(),
            commit_script: Vec::new(),
            update_script: Vec::new(),
            source_scripts: HashMap::new(),
            prepare_error: None,
            commit_error: None,
            failing_sources: HashSet::new(),
            journal: Rc::new(RefCell::new(Journal::default())),
        }
    }

    pub fn with_source(mut self, source: MemorySource) -> Self {
        self.sources.push(source);
        self
    }

    /// Callbacks replayed during prepare.
    pub fn on_prepare(mut self, script: Vec<Callback>) -> Self {
        self.prepare_script = script;
        self
    }

    /// Callbacks replayed during commit.
    pub fn on_commit(mut self, script: Vec<Callback>) -> Self {
        self.commit_script = script;
        self
    }

    /// Callbacks replayed during every source update.
    pub fn on_update(mut self, script: Vec<Callback>) -> Self {
        self.update_script = script;
        self
    }

    /// Callbacks replayed while `source` updates, after the shared ones.
    pub fn on_update_of(mut self, source: impl Into<String>, script: Vec<Callback>) -> Self {
        self.source_scripts.insert(source.into(), script);
        self
    }

    pub fn fail_prepare(mut self, message: impl Into<String>) -> Self {
        self.prepare_error = Some(message.into());
        self
    }

    pub fn fail_commit(mut self, message: impl Into<String>) -> Self {
        self.commit_error = Some(message.into());
        self
    }

    pub fn fail_update(mut self, source: impl Into<String>) -> Self {
        self.failing_sources.insert(source.into());
        self
    }

    /// Shared view of the call journal. Stays valid after the engine is
    /// handed to a manager.
    pub fn journal(&self) -> Rc<RefCell<Journal>> {
        Rc::clone(&self.journal)
    }

    fn replay(&self, script: &[Callback]) {
        let Some(hooks) = &self.hooks else {
            return;
        };
        for callback in script {
            let Ok(mut hooks) = hooks.try_borrow_mut() else {
                debug!("Callbacks busy, skipping {:?}", callback);
                continue;
            };
            match callback {
                Callback::Event(event) => hooks.on_event(*event),
                Callback::Log(level, message) => hooks.on_log(*level, message),
                Callback::Question(question) => hooks.on_question(question),
                Callback::Progress {
                    target,
                    percent,
                    total,
                    index,
                } => hooks.on_progress(target, *percent, *total, *index),
                Callback::Download {
                    filename,
                    transferred,
                    total,
                } => hooks.on_download(filename, *transferred, *total),
                Callback::TotalDownloadSize(size) => hooks.on_total_download_size(*size),
            }
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(Error::TransactionError("transaction not initialized".into()))
        }
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for MemoryEngine {
    fn sync_sources(&self) -> Vec<Box<dyn SyncSource + '_>> {
        self.sources
            .iter()
            .map(|source| Box::new(source.clone()) as Box<dyn SyncSource + '_>)
            .collect()
    }

    fn set_hooks(&mut self, hooks: Hooks) {
        self.hooks = Some(hooks);
    }

    fn init_transaction(&mut self, flags: TransactionFlags) -> Result<()> {
        if self.open {
            return Err(Error::TransactionError(
                "transaction already initialized".into(),
            ));
        }
        self.open = true;
        let mut journal = self.journal.borrow_mut();
        journal.inits += 1;
        journal.flags.push(flags);
        Ok(())
    }

    fn add_package(&mut self, package: &Package) -> Result<()> {
        self.ensure_open()?;
        self.journal.borrow_mut().added.push(package.clone());
        Ok(())
    }

    fn prepare(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.journal.borrow_mut().prepares += 1;
        self.replay(&self.prepare_script);
        match &self.prepare_error {
            Some(message) => Err(Error::TransactionError(message.clone())),
            None => Ok(()),
        }
    }

    fn commit(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.journal.borrow_mut().commits += 1;
        self.replay(&self.commit_script);
        match &self.commit_error {
            Some(message) => Err(Error::TransactionError(message.clone())),
            None => Ok(()),
        }
    }

    fn release(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.open = false;
        self.journal.borrow_mut().releases += 1;
        Ok(())
    }

    fn update_source(&mut self, source: &str, _force: bool) -> Result<bool> {
        self.ensure_open()?;
        if !self.sources.iter().any(|s| s.name == source) {
            return Err(Error::DatabaseError(format!("unknown sync source: {}", source)));
        }
        self.journal.borrow_mut().updated.push(source.to_string());
        self.replay(&self.update_script);
        if let Some(script) = self.source_scripts.get(source) {
            self.replay(script);
        }
        if self.failing_sources.contains(source) {
            return Err(Error::DatabaseError(format!(
                "failed to update {}: could not resolve host",
                source
            )));
        }
        Ok(true)
    }

    fn versions(&self) -> EngineVersions {
        EngineVersions {
            binding: format!("pacbridge-core v{}", env!("CARGO_PKG_VERSION")),
            engine: "memory engine".to_string(),
        }
    }
}

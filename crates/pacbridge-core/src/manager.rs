//! Transaction orchestration: database refresh and package installation.

use crate::dedup::Origin;
use crate::dispatcher::CallbackDispatcher;
use crate::engine::{Engine, EngineVersions, Hooks};
use crate::error::{Error, ExitCode, Fatal, Result};
use crate::event::EventQueue;
use crate::options::TransactionOptions;
use crate::package::Package;
use crate::resolver::{ConflictSet, PackageResolver};
use crate::transaction::Transaction;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, error, info, warn};

/// Drives engine transactions and routes their callbacks to the event queue.
pub struct TransactionManager<Q> {
    engine: Option<Box<dyn Engine>>,
    dispatcher: Rc<RefCell<CallbackDispatcher<Q>>>,
}

impl<Q: EventQueue + 'static> TransactionManager<Q> {
    /// Creates a manager without an engine. Every operation fails until
    /// one is attached.
    pub fn new(queue: Q) -> Self {
        Self {
            engine: None,
            dispatcher: Rc::new(RefCell::new(CallbackDispatcher::new(queue))),
        }
    }

    pub fn with_engine(queue: Q, engine: Box<dyn Engine>) -> Self {
        let mut manager = Self::new(queue);
        manager.engine = Some(engine);
        manager
    }

    pub fn set_engine(&mut self, engine: Box<dyn Engine>) {
        self.engine = Some(engine);
    }

    pub fn dispatcher(&self) -> &Rc<RefCell<CallbackDispatcher<Q>>> {
        &self.dispatcher
    }

    /// Opens a transaction with the callbacks installed on the engine.
    pub fn init(&mut self, options: &TransactionOptions) -> Result<Transaction<'_>> {
        let engine = self
            .engine
            .as_deref_mut()
            .ok_or_else(|| Error::BackendUnavailable("no engine handle configured".into()))?;
        let hooks: Hooks = self.dispatcher.clone();
        engine.set_hooks(hooks);
        Transaction::open(engine, options.flags())
    }

    /// Prepares and commits `t`, then releases it.
    ///
    /// Returns false if the engine rejected either step. The transaction is
    /// released exactly once whatever happens.
    pub fn finalize(mut t: Transaction<'_>) -> bool {
        let flags = t.flags();
        let outcome = t.prepare().and_then(|()| t.commit());
        let state = t.state();

        if let Err(e) = t.release() {
            warn!("Failed to release transaction: {}", e);
        }

        match outcome {
            Ok(()) => true,
            Err(e) => {
                error!(
                    error = %e,
                    state = ?state,
                    flags = ?flags,
                    "Transaction failed"
                );
                false
            }
        }
    }

    /// Force-updates every sync source, one transaction per source.
    ///
    /// Always returns 0. Update failures, and a missing engine, are logged
    /// only.
    pub fn refresh(&mut self, options: &TransactionOptions) -> ExitCode {
        let names: Vec<String> = match &self.engine {
            Some(engine) => engine
                .sync_sources()
                .iter()
                .map(|source| source.name().to_string())
                .collect(),
            None => {
                error!("{}", Error::BackendUnavailable("no engine handle configured".into()));
                return 0;
            }
        };

        for name in names {
            let mut t = match self.init(options) {
                Ok(t) => t,
                Err(e) => {
                    warn!("Cannot open transaction to update {}: {}", name, e);
                    continue;
                }
            };
            match t.update_source(&name, true) {
                Ok(true) => info!("Updated sync database {}", name),
                Ok(false) => debug!("Sync database {} is up to date", name),
                Err(e) => warn!("Failed to update {}: {}", name, e),
            }
            if let Err(e) = t.release() {
                warn!("Failed to release transaction: {}", e);
            }
        }
        0
    }

    /// Resolves `names` against the sync sources and installs them.
    ///
    /// Names that are neither a package nor a group are logged and skipped.
    /// Group members listed in `conflicts` are left out.
    pub fn install(
        &mut self,
        names: &[String],
        conflicts: &ConflictSet,
        options: &TransactionOptions,
    ) -> ExitCode {
        debug!("Install a list of packages like pacman -S");
        if names.is_empty() {
            error!("{}", Error::EmptyTargetList);
            return 1;
        }

        let targets = match self.resolve_targets(names, conflicts) {
            Ok(targets) => targets,
            Err(e) => {
                error!("{}", e);
                return 1;
            }
        };

        let mut t = match self.init(options) {
            Ok(t) => t,
            Err(e) => {
                error!("Cannot open transaction: {}", e);
                return 1;
            }
        };
        for pkg in &targets {
            if let Err(e) = t.add_package(pkg) {
                error!("Cannot add {} to the transaction: {}", pkg, e);
                return 1;
            }
        }

        if Self::finalize(t) {
            0
        } else {
            1
        }
    }

    /// Targets for `names`, in request order.
    pub fn resolve_targets(&self, names: &[String], conflicts: &ConflictSet) -> Result<Vec<Package>> {
        let engine = self
            .engine
            .as_deref()
            .ok_or_else(|| Error::BackendUnavailable("no engine handle configured".into()))?;
        let sources = engine.sync_sources();
        let resolver = PackageResolver::new(&sources);

        let mut targets = Vec::new();
        for name in names {
            match resolver.resolve(name, conflicts) {
                Ok(found) => {
                    debug!("Added {} for {}", found.len(), name);
                    targets.extend(found);
                }
                Err(e) => error!("{}", e),
            }
        }

        if targets.is_empty() {
            return Err(Error::NoResolvedTargets);
        }
        Ok(targets)
    }

    /// Queues a fatal error event. The caller must hand the result to the
    /// top-level driver.
    pub fn fail(&self, message: &str, origin: Origin) -> Fatal {
        self.dispatcher.borrow_mut().raise(message, origin)
    }

    /// Waits for the consumer to drain the queue.
    pub fn wait_drained(&self) {
        self.dispatcher.borrow().wait_drained();
    }

    pub fn versions(&self) -> Option<EngineVersions> {
        self.engine.as_ref().map(|engine| engine.versions())
    }

    pub fn version_string(&self) -> Option<String> {
        self.versions()
            .map(|v| format!("pacbridge running on {} - {}", v.binding, v.engine))
    }
}

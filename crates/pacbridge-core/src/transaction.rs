//! Transaction lifecycle.

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::options::TransactionFlags;
use crate::package::Package;
use tracing::{debug, warn};

/// Where a transaction is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Initialized,
    Prepared,
    Committed,
    Failed,
    Released,
}

/// An open engine transaction.
///
/// Borrows the engine for its whole lifetime, so only one can be open at a
/// time. Released exactly once: by [`Transaction::release`], or on drop if
/// the owner never released it.
pub struct Transaction<'e> {
    engine: &'e mut dyn Engine,
    flags: TransactionFlags,
    state: TransactionState,
}

impl<'e> Transaction<'e> {
    /// Opens a transaction on `engine`. Callbacks must already be registered.
    pub fn open(engine: &'e mut dyn Engine, flags: TransactionFlags) -> Result<Self> {
        engine.init_transaction(flags)?;
        debug!("Transaction initialized with flags {:?}", flags);
        Ok(Self {
            engine,
            flags,
            state: TransactionState::Initialized,
        })
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn flags(&self) -> TransactionFlags {
        self.flags
    }

    pub fn add_package(&mut self, package: &Package) -> Result<()> {
        self.expect_state(TransactionState::Initialized, "add packages")?;
        let result = self.engine.add_package(package);
        if result.is_err() {
            self.state = TransactionState::Failed;
        }
        result
    }

    /// Updates one sync source inside this transaction.
    pub fn update_source(&mut self, source: &str, force: bool) -> Result<bool> {
        self.expect_state(TransactionState::Initialized, "update")?;
        self.engine.update_source(source, force)
    }

    pub fn prepare(&mut self) -> Result<()> {
        self.expect_state(TransactionState::Initialized, "prepare")?;
        match self.engine.prepare() {
            Ok(()) => {
                self.state = TransactionState::Prepared;
                Ok(())
            }
            Err(e) => {
                self.state = TransactionState::Failed;
                Err(e)
            }
        }
    }

    pub fn commit(&mut self) -> Result<()> {
        self.expect_state(TransactionState::Prepared, "commit")?;
        match self.engine.commit() {
            Ok(()) => {
                self.state = TransactionState::Committed;
                Ok(())
            }
            Err(e) => {
                self.state = TransactionState::Failed;
                Err(e)
            }
        }
    }

    /// Releases the transaction.
    pub fn release(mut self) -> Result<()> {
        self.release_once()
    }

    fn release_once(&mut self) -> Result<()> {
        if self.state == TransactionState::Released {
            return Ok(());
        }
        self.state = TransactionState::Released;
        self.engine.release()
    }

    fn expect_state(&self, expected: TransactionState, action: &str) -> Result<()> {
        if self.state == expected {
            return Ok(());
        }
        Err(Error::TransactionError(format!(
            "cannot {} a transaction in state {:?}",
            action, self.state
        )))
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.state != TransactionState::Released {
            warn!("Transaction dropped in state {:?}, releasing", self.state);
            if let Err(e) = self.release_once() {
                warn!("Failed to release transaction: {}", e);
            }
        }
    }
}

//! Transaction options and the engine flags derived from them.

use crate::error::{Error, Result};
use crate::package::InstallReason;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Engine-level transaction flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TransactionFlags: u32 {
        const CASCADE = 1 << 0;
        const NO_DEPS = 1 << 1;
        const FORCE = 1 << 2;
        const DB_ONLY = 1 << 3;
        const DOWNLOAD_ONLY = 1 << 4;
        const NO_SAVE = 1 << 5;
        const RECURSE = 1 << 6;
        const RECURSE_ALL = 1 << 7;
        const UNNEEDED = 1 << 8;
        const ALL_DEPS = 1 << 9;
        const ALL_EXPLICIT = 1 << 10;
    }
}

/// Options for a transaction. Every field defaults when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionOptions {
    /// Also remove packages that depend on the targets.
    pub cascade: bool,
    /// Skip dependency checks.
    pub nodeps: bool,
    pub force: bool,
    /// Only touch the database, not the files.
    pub dbonly: bool,
    pub downloadonly: bool,
    /// Do not keep `.pacsave` backups.
    pub nosave: bool,
    /// 1 removes unneeded dependencies, 2 and above also explicit ones.
    pub recursive: u8,
    pub unneeded: bool,
    /// Install reason to force on every package of the transaction.
    pub mode: Option<InstallReason>,
}

impl TransactionOptions {
    /// Reads options from a generic key/value source such as a JSON object.
    pub fn from_source(source: &serde_json::Value) -> Result<Self> {
        if source.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(source.clone())
            .map_err(|e| Error::ConfigError(format!("transaction options: {}", e)))
    }

    /// Engine flags for these options.
    pub fn flags(&self) -> TransactionFlags {
        let mut flags = TransactionFlags::empty();
        flags.set(TransactionFlags::CASCADE, self.cascade);
        flags.set(TransactionFlags::NO_DEPS, self.nodeps);
        flags.set(TransactionFlags::FORCE, self.force);
        flags.set(TransactionFlags::DB_ONLY, self.dbonly);
        flags.set(TransactionFlags::DOWNLOAD_ONLY, self.downloadonly);
        flags.set(TransactionFlags::NO_SAVE, self.nosave);
        flags.set(TransactionFlags::RECURSE, self.recursive > 0);
        flags.set(TransactionFlags::RECURSE_ALL, self.recursive > 1);
        flags.set(TransactionFlags::UNNEEDED, self.unneeded);
        flags.set(
            TransactionFlags::ALL_DEPS,
            self.mode == Some(InstallReason::Dependency),
        );
        flags.set(
            TransactionFlags::ALL_EXPLICIT,
            self.mode == Some(InstallReason::Explicit),
        );
        flags
    }
}

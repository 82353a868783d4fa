//! Configuration file for the pacbridge binary.

use pacbridge_alpm::AlpmConfig;
use pacbridge_core::event::DEFAULT_QUEUE_CAPACITY;
use pacbridge_core::{Error, Result, TransactionOptions};
use serde::Deserialize;
use std::path::Path;

/// Top-level configuration, read from a TOML file.
///
/// ```toml
/// queue_capacity = 512
/// log_level = "debug"
///
/// [engine]
/// dbpath = "/mnt/var/lib/pacman"
///
/// [transaction]
/// nodeps = true
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Capacity of the event queue. Events beyond it are dropped.
    pub queue_capacity: usize,
    /// Default tracing filter, overridden by `RUST_LOG`.
    pub log_level: String,
    pub engine: AlpmConfig,
    /// Transaction options applied to every operation.
    pub transaction: TransactionOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            log_level: "info".to_string(),
            engine: AlpmConfig::default(),
            transaction: TransactionOptions::default(),
        }
    }
}

impl AppConfig {
    /// Loads `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                Self::parse(&text)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::ConfigError(e.to_string()))?;
        if config.queue_capacity == 0 {
            return Err(Error::ConfigError("queue_capacity must be at least 1".into()));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pacbridge_core::InstallReason;
    use std::io::Write;

    #[test]
    fn test_missing_path_gives_defaults() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.engine, AlpmConfig::default());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
queue_capacity = 8

[engine]
dbpath = "/mnt/var/lib/pacman"

[[engine.repositories]]
name = "core"
servers = ["https://mirror.example/$repo/os/$arch"]

[transaction]
nodeps = true
mode = "depend"
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.queue_capacity, 8);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.engine.dbpath, "/mnt/var/lib/pacman");
        assert_eq!(config.engine.root, "/");
        assert_eq!(config.engine.repositories.len(), 1);
        assert!(config.transaction.nodeps);
        assert_eq!(config.transaction.mode, Some(InstallReason::Dependency));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            AppConfig::parse("queue_capacity = 0"),
            Err(Error::ConfigError(_))
        ));
    }

    #[test]
    fn test_unreadable_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            AppConfig::load(Some(&missing)),
            Err(Error::IoError(_))
        ));
    }
}

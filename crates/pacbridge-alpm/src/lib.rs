//! Pacman/libalpm engine for pacbridge.
//!
//! The configuration types are always available. The engine itself links
//! against the system libalpm and is only built with the `alpm` feature.

pub mod config;

#[cfg(feature = "alpm")]
pub mod backend;

pub use config::{AlpmConfig, RepositoryConfig};

#[cfg(feature = "alpm")]
pub use backend::AlpmEngine;

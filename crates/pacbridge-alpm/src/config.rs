//! Configuration of the libalpm handle.

use serde::{Deserialize, Serialize};

/// Default paths for Arch Linux.
const DEFAULT_ROOT: &str = "/";
const DEFAULT_DBPATH: &str = "/var/lib/pacman";
const DEFAULT_ARCH: &str = "x86_64";

/// A sync repository to register on the handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub name: String,
    /// Mirror URLs. `$repo` and `$arch` are substituted.
    #[serde(default)]
    pub servers: Vec<String>,
}

impl RepositoryConfig {
    pub fn new(name: impl Into<String>, servers: &[&str]) -> Self {
        Self {
            name: name.into(),
            servers: servers.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Server URLs with `$repo` and `$arch` expanded.
    pub fn expanded_servers(&self, arch: &str) -> Vec<String> {
        self.servers
            .iter()
            .map(|server| server.replace("$repo", &self.name).replace("$arch", arch))
            .collect()
    }
}

/// Configuration for the ALPM engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlpmConfig {
    /// Root directory for package installation.
    pub root: String,
    /// Database path.
    pub dbpath: String,
    /// Architecture substituted into server URLs.
    pub arch: String,
    /// Cache directories.
    pub cache_dirs: Vec<String>,
    /// Hook directories.
    pub hook_dirs: Vec<String>,
    /// GPG directory.
    pub gpgdir: String,
    /// Log file path.
    pub logfile: String,
    /// Sync repositories, in priority order.
    pub repositories: Vec<RepositoryConfig>,
}

impl Default for AlpmConfig {
    fn default() -> Self {
        let arch_mirror = "https://geo.mirror.pkgbuild.com/$repo/os/$arch";
        Self {
            root: DEFAULT_ROOT.to_string(),
            dbpath: DEFAULT_DBPATH.to_string(),
            arch: DEFAULT_ARCH.to_string(),
            cache_dirs: vec!["/var/cache/pacman/pkg".to_string()],
            hook_dirs: vec![
                "/etc/pacman.d/hooks".to_string(),
                "/usr/share/libalpm/hooks".to_string(),
            ],
            gpgdir: "/etc/pacman.d/gnupg".to_string(),
            logfile: "/var/log/pacman.log".to_string(),
            repositories: vec![
                RepositoryConfig::new("core", &[arch_mirror]),
                RepositoryConfig::new("extra", &[arch_mirror]),
                RepositoryConfig::new("multilib", &[arch_mirror]),
            ],
        }
    }
}

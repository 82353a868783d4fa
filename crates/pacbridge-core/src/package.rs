//! Package and group types returned by sync sources.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A resolved package, tagged with the sync source it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Package {
    /// Package name.
    pub name: String,
    /// Available version (e.g. "1:2.3.4-5").
    pub version: String,
    /// Repository name (e.g. "core", "extra").
    pub repository: String,
}

impl Package {
    /// Creates a new Package.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        repository: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            repository: repository.into(),
        }
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} {}", self.repository, self.name, self.version)
    }
}

/// A named collection of packages as recorded by one sync source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub packages: Vec<Package>,
}

/// Why a package was installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallReason {
    /// Explicitly installed by user.
    Explicit,
    /// Installed as a dependency.
    #[serde(alias = "depend")]
    Dependency,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_display() {
        let pkg = Package::new("linux", "6.9.1-1", "core");
        assert_eq!(pkg.to_string(), "core/linux 6.9.1-1");
    }

    #[test]
    fn test_install_reason_parsing() {
        let reason: InstallReason = serde_json::from_str("\"depend\"").unwrap();
        assert_eq!(reason, InstallReason::Dependency);
        let reason: InstallReason = serde_json::from_str("\"explicit\"").unwrap();
        assert_eq!(reason, InstallReason::Explicit);
    }
}

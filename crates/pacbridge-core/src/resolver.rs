//! Resolution of requested names to sync packages.
//!
//! Sources are always scanned in registration order and the first hit wins,
//! the same precedence pacman gives its repositories.

use crate::engine::SyncSource;
use crate::error::{Error, Result};
use crate::package::Package;
use std::collections::HashSet;

/// Package names left out when a group is expanded.
pub type ConflictSet = HashSet<String>;

/// Looks names up across an ordered list of sync sources.
pub struct PackageResolver<'a> {
    sources: &'a [Box<dyn SyncSource + 'a>],
}

impl<'a> PackageResolver<'a> {
    pub fn new(sources: &'a [Box<dyn SyncSource + 'a>]) -> Self {
        Self { sources }
    }

    /// Finds `name` in the first source that carries it.
    pub fn find_sync_package(&self, name: &str) -> Result<Package> {
        self.sources
            .iter()
            .find_map(|source| source.package(name))
            .ok_or_else(|| Error::PackageNotFound(name.to_string()))
    }

    /// Members of group `name` from the first source that defines it, minus
    /// `conflicts`.
    ///
    /// Group definitions are not merged: a later source with the same group
    /// name is never consulted once one matched.
    pub fn expand_group(&self, name: &str, conflicts: &ConflictSet) -> Option<Vec<Package>> {
        let group = self.sources.iter().find_map(|source| source.group(name))?;
        Some(
            group
                .packages
                .into_iter()
                .filter(|pkg| !conflicts.contains(&pkg.name))
                .collect(),
        )
    }

    /// Resolves `name` as a package first, then as a group.
    pub fn resolve(&self, name: &str, conflicts: &ConflictSet) -> Result<Vec<Package>> {
        match self.find_sync_package(name) {
            Ok(pkg) => Ok(vec![pkg]),
            Err(not_found) => self.expand_group(name, conflicts).ok_or(not_found),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySource;

    fn sources() -> Vec<Box<dyn SyncSource>> {
        vec![
            Box::new(
                MemorySource::new("core")
                    .with_package("bash", "5.2-1")
                    .with_group("base", &["bash", "coreutils", "openresolv"]),
            ),
            Box::new(
                MemorySource::new("extra")
                    .with_package("bash", "5.3-1")
                    .with_package("firefox", "130.0-1")
                    .with_group("base", &["systemd"])
                    .with_group("gnome", &["gdm", "mutter"]),
            ),
        ]
    }

    #[test]
    fn test_first_source_wins() {
        let sources = sources();
        let resolver = PackageResolver::new(&sources);

        let pkg = resolver.find_sync_package("bash").unwrap();
        assert_eq!(pkg.repository, "core");
        assert_eq!(pkg.version, "5.2-1");

        let pkg = resolver.find_sync_package("firefox").unwrap();
        assert_eq!(pkg.repository, "extra");
    }

    #[test]
    fn test_missing_package() {
        let sources = sources();
        let resolver = PackageResolver::new(&sources);

        let err = resolver.find_sync_package("nonexistent").unwrap_err();
        assert_eq!(err.to_string(), "package 'nonexistent' was not found");
    }

    #[test]
    fn test_group_from_first_source_only() {
        let sources = sources();
        let resolver = PackageResolver::new(&sources);

        let members: Vec<_> = resolver
            .expand_group("base", &ConflictSet::new())
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(members, vec!["bash", "coreutils", "openresolv"]);
    }

    #[test]
    fn test_group_excludes_conflicts() {
        let sources = sources();
        let resolver = PackageResolver::new(&sources);
        let conflicts: ConflictSet = ["openresolv".to_string()].into_iter().collect();

        let members: Vec<_> = resolver
            .expand_group("base", &conflicts)
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(members, vec!["bash", "coreutils"]);
    }

    #[test]
    fn test_resolve_falls_back_to_group() {
        let sources = sources();
        let resolver = PackageResolver::new(&sources);

        assert_eq!(resolver.resolve("gnome", &ConflictSet::new()).unwrap().len(), 2);
        assert!(resolver.expand_group("kde", &ConflictSet::new()).is_none());
        assert!(matches!(
            resolver.resolve("kde", &ConflictSet::new()),
            Err(Error::PackageNotFound(_))
        ));
    }
}

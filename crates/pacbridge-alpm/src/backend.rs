//! ALPM engine implementation.

use crate::config::AlpmConfig;
use alpm::{
    Alpm, AnyDownloadEvent, AnyEvent, AnyQuestion, Db, DownloadEvent, Event, LogLevel as AlpmLogLevel,
    PackageOperation, Progress, Question as AlpmQuestion, SigLevel, TransFlag,
};
use pacbridge_core::{
    engine::Hooks,
    error::{Error, Result},
    Engine, EngineEvent, EngineVersions, Group, LogLevel, Package, Question, SyncSource,
    TransactionFlags,
};
use std::path::Path;
use tracing::{debug, warn};

/// Binding version reported alongside libalpm's.
const BINDING_VERSION: &str = "alpm-rs v4";

/// The pacman/libalpm engine.
pub struct AlpmEngine {
    handle: Alpm,
    config: AlpmConfig,
    hooks: Option<Hooks>,
}

impl AlpmEngine {
    /// Creates a new ALPM engine with default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(AlpmConfig::default())
    }

    /// Creates a new ALPM engine with custom configuration.
    pub fn with_config(config: AlpmConfig) -> Result<Self> {
        // Verify the database path exists.
        if !Path::new(&config.dbpath).exists() {
            return Err(Error::DatabaseError(format!(
                "Database path does not exist: {}",
                config.dbpath
            )));
        }

        let handle = Self::create_handle(&config)?;
        Ok(Self {
            handle,
            config,
            hooks: None,
        })
    }

    pub fn config(&self) -> &AlpmConfig {
        &self.config
    }

    /// Creates an ALPM handle with the configured sync databases.
    fn create_handle(config: &AlpmConfig) -> Result<Alpm> {
        let mut handle = Alpm::new(config.root.as_str(), config.dbpath.as_str())
            .map_err(|e| Error::DatabaseError(format!("Failed to initialize ALPM: {}", e)))?;

        for dir in &config.cache_dirs {
            if let Err(e) = handle.add_cachedir(dir.as_str()) {
                warn!("Failed to add cache dir {}: {}", dir, e);
            }
        }
        for dir in &config.hook_dirs {
            if let Err(e) = handle.add_hookdir(dir.as_str()) {
                warn!("Failed to add hook dir {}: {}", dir, e);
            }
        }
        if let Err(e) = handle.set_gpgdir(config.gpgdir.as_str()) {
            warn!("Failed to set gpg dir: {}", e);
        }
        if let Err(e) = handle.set_logfile(config.logfile.as_str()) {
            warn!("Failed to set log file: {}", e);
        }

        let siglevel = SigLevel::PACKAGE_OPTIONAL | SigLevel::DATABASE_OPTIONAL;
        for repo in &config.repositories {
            match handle.register_syncdb_mut(repo.name.as_str(), siglevel) {
                Ok(db) => {
                    for server in repo.expanded_servers(&config.arch) {
                        if let Err(e) = db.add_server(server.as_str()) {
                            warn!("Failed to add server {} to {}: {}", server, repo.name, e);
                        }
                    }
                    debug!("Registered sync database: {}", repo.name);
                }
                Err(e) => warn!("Failed to register {}: {}", repo.name, e),
            }
        }

        Ok(handle)
    }

    /// Looks up the sync package a resolved target refers to.
    fn sync_package(&self, package: &Package) -> Result<&alpm::Package> {
        self.handle
            .syncdbs()
            .iter()
            .find(|db| db.name() == package.repository)
            .and_then(|db| db.pkg(package.name.as_str()).ok())
            .ok_or_else(|| Error::PackageNotFound(package.name.clone()))
    }

    fn register_callbacks(&mut self, hooks: Hooks) {
        self.handle
            .set_log_cb(hooks.clone(), |level: AlpmLogLevel, msg: &str, hooks: &mut Hooks| {
                let level = if level.contains(AlpmLogLevel::ERROR) {
                    LogLevel::Error
                } else if level.contains(AlpmLogLevel::WARNING) {
                    LogLevel::Warning
                } else if level.contains(AlpmLogLevel::DEBUG) {
                    LogLevel::Debug
                } else {
                    LogLevel::Function
                };
                with_hooks(hooks, |cb| cb.on_log(level, msg));
            });

        self.handle
            .set_event_cb(hooks.clone(), |event: AnyEvent, hooks: &mut Hooks| {
                let event = convert_event(&event);
                with_hooks(hooks, |cb| cb.on_event(event));
            });

        self.handle
            .set_question_cb(hooks.clone(), |question: AnyQuestion, hooks: &mut Hooks| {
                let question = convert_question(&question);
                with_hooks(hooks, |cb| cb.on_question(&question));
            });

        self.handle.set_progress_cb(
            hooks.clone(),
            |_progress: Progress,
             target: &str,
             percent: i32,
             total: usize,
             index: usize,
             hooks: &mut Hooks| {
                with_hooks(hooks, |cb| cb.on_progress(target, percent, total, index));
            },
        );

        self.handle.set_dl_cb(
            hooks,
            |filename: &str, event: AnyDownloadEvent, hooks: &mut Hooks| {
                if let DownloadEvent::Progress(progress) = event.event() {
                    let transferred = progress.downloaded.max(0) as u64;
                    with_hooks(hooks, |cb| cb.on_download(filename, transferred, progress.total));
                }
            },
        );
    }

    /// libalpm no longer reports the total download size itself, so it is
    /// summed from the packages queued for installation.
    fn report_total_download_size(&self) {
        let Some(hooks) = &self.hooks else {
            return;
        };
        let size: i64 = self
            .handle
            .trans_add()
            .iter()
            .map(|pkg| pkg.download_size())
            .sum();
        with_hooks(hooks, |cb| cb.on_total_download_size(size));
    }
}

/// Runs `f` on the callbacks unless they are already in use.
///
/// Never panics: a re-entrant callback is skipped.
fn with_hooks(hooks: &Hooks, f: impl FnOnce(&mut dyn pacbridge_core::EngineCallbacks)) {
    match hooks.try_borrow_mut() {
        Ok(mut cb) => f(&mut *cb),
        Err(_) => debug!("Callbacks busy, dropping engine callback"),
    }
}

fn convert_flags(flags: TransactionFlags) -> TransFlag {
    let mut out = TransFlag::NONE;
    let pairs = [
        (TransactionFlags::CASCADE, TransFlag::CASCADE),
        (TransactionFlags::NO_DEPS, TransFlag::NO_DEPS),
        (TransactionFlags::DB_ONLY, TransFlag::DB_ONLY),
        (TransactionFlags::DOWNLOAD_ONLY, TransFlag::DOWNLOAD_ONLY),
        (TransactionFlags::NO_SAVE, TransFlag::NO_SAVE),
        (TransactionFlags::RECURSE, TransFlag::RECURSE),
        (TransactionFlags::RECURSE_ALL, TransFlag::RECURSE_ALL),
        (TransactionFlags::UNNEEDED, TransFlag::UNNEEDED),
        (TransactionFlags::ALL_DEPS, TransFlag::ALL_DEPS),
        (TransactionFlags::ALL_EXPLICIT, TransFlag::ALL_EXPLICIT),
    ];
    for (ours, theirs) in pairs {
        if flags.contains(ours) {
            out |= theirs;
        }
    }
    // libalpm dropped its force flag; overwriting files is configured per path.
    if flags.contains(TransactionFlags::FORCE) {
        debug!("Ignoring force flag, not supported by libalpm");
    }
    out
}

fn convert_event(event: &AnyEvent) -> EngineEvent {
    match event.event() {
        Event::CheckDepsStart => EngineEvent::CheckDepsStart,
        Event::FileConflictsStart => EngineEvent::FileConflictsStart,
        Event::ResolveDepsStart => EngineEvent::ResolveDepsStart,
        Event::InterConflictsStart => EngineEvent::InterConflictsStart,
        Event::PackageOperationStart(op) => match op.operation() {
            PackageOperation::Install(_) => EngineEvent::AddStart,
            PackageOperation::Remove(_) => EngineEvent::RemoveStart,
            _ => EngineEvent::UpgradeStart,
        },
        Event::IntegrityStart => EngineEvent::IntegrityStart,
        Event::LoadStart => EngineEvent::LoadStart,
        Event::ScriptletInfo(_) => EngineEvent::ScriptletInfo,
        Event::PkgRetrieveStart(_) | Event::DbRetrieveStart => EngineEvent::RetrieveStart,
        _ => EngineEvent::Other,
    }
}

fn convert_question(question: &AnyQuestion) -> Question {
    match question.question() {
        AlpmQuestion::InstallIgnorepkg(q) => Question::InstallIgnorePkg(q.pkg().name().to_string()),
        AlpmQuestion::Replace(q) => Question::Replace {
            old: q.oldpkg().name().to_string(),
            new: q.newpkg().name().to_string(),
        },
        AlpmQuestion::Conflict(q) => {
            let conflict = q.conflict();
            Question::Conflict {
                package: conflict.package1().name().to_string(),
                conflict: conflict.package2().name().to_string(),
            }
        }
        AlpmQuestion::Corrupted(q) => Question::Corrupted(q.filepath().to_string()),
        AlpmQuestion::RemovePkgs(q) => {
            Question::RemovePkgs(q.packages().iter().map(|pkg| pkg.name().to_string()).collect())
        }
        AlpmQuestion::SelectProvider(q) => Question::SelectProvider(q.depend().name().to_string()),
        AlpmQuestion::ImportKey(q) => Question::ImportKey(q.fingerprint().to_string()),
        #[allow(unreachable_patterns)]
        _ => Question::Other,
    }
}

/// A sync database seen through [`SyncSource`].
struct AlpmSource<'h> {
    db: &'h Db,
}

impl SyncSource for AlpmSource<'_> {
    fn name(&self) -> &str {
        self.db.name()
    }

    fn package(&self, name: &str) -> Option<Package> {
        self.db
            .pkg(name)
            .ok()
            .map(|pkg| Package::new(pkg.name(), pkg.version().as_str(), self.db.name()))
    }

    fn group(&self, name: &str) -> Option<Group> {
        let group = self.db.group(name).ok()?;
        Some(Group {
            name: group.name().to_string(),
            packages: group
                .packages()
                .iter()
                .map(|pkg| Package::new(pkg.name(), pkg.version().as_str(), self.db.name()))
                .collect(),
        })
    }
}

impl Engine for AlpmEngine {
    fn sync_sources(&self) -> Vec<Box<dyn SyncSource + '_>> {
        self.handle
            .syncdbs()
            .iter()
            .map(|db| Box::new(AlpmSource { db }) as Box<dyn SyncSource + '_>)
            .collect()
    }

    fn set_hooks(&mut self, hooks: Hooks) {
        self.register_callbacks(hooks.clone());
        self.hooks = Some(hooks);
    }

    fn init_transaction(&mut self, flags: TransactionFlags) -> Result<()> {
        self.handle
            .trans_init(convert_flags(flags))
            .map_err(|e| Error::TransactionError(e.to_string()))
    }

    fn add_package(&mut self, package: &Package) -> Result<()> {
        let pkg = self.sync_package(package)?;
        self.handle
            .trans_add_pkg(pkg)
            .map_err(|e| Error::TransactionError(e.to_string()))
    }

    fn prepare(&mut self) -> Result<()> {
        self.handle
            .trans_prepare()
            .map_err(|e| Error::TransactionError(e.to_string()))
    }

    fn commit(&mut self) -> Result<()> {
        self.report_total_download_size();
        self.handle
            .trans_commit()
            .map_err(|e| Error::TransactionError(e.to_string()))
    }

    fn release(&mut self) -> Result<()> {
        self.handle
            .trans_release()
            .map_err(|e| Error::TransactionError(e.to_string()))
    }

    fn update_source(&mut self, source: &str, force: bool) -> Result<bool> {
        for db in self.handle.syncdbs_mut() {
            if db.name() == source {
                return db
                    .update(force)
                    .map_err(|e| Error::DatabaseError(format!("failed to update {}: {}", source, e)));
            }
        }
        Err(Error::DatabaseError(format!("unknown sync database: {}", source)))
    }

    fn versions(&self) -> EngineVersions {
        EngineVersions {
            binding: BINDING_VERSION.to_string(),
            engine: format!("libalpm v{}", alpm::version()),
        }
    }
}

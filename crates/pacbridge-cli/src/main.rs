//! pacbridge - drives pacman transactions and streams their progress.
//!
//! Events are written to stdout as JSON lines for a UI process to consume.
//! Logs go to stderr.

mod config;

use clap::{Args, Parser, Subcommand};
use config::AppConfig;
use pacbridge_alpm::AlpmConfig;
use pacbridge_core::{
    origin, ChannelQueue, ConflictSet, Engine, Event, ExitCode, Fatal, InstallReason,
    TransactionManager, TransactionOptions,
};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "pacbridge", version, about)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Force-refresh every sync database (pacman -Syy).
    Refresh {
        #[command(flatten)]
        options: OptionArgs,
    },
    /// Install packages or groups from the sync databases (pacman -S).
    Install {
        /// Package or group names.
        names: Vec<String>,

        /// Group members to leave out. May be repeated.
        #[arg(long = "conflict", value_name = "NAME")]
        conflicts: Vec<String>,

        #[command(flatten)]
        options: OptionArgs,
    },
    /// Print the engine and binding versions.
    Version,
}

/// Transaction flags. Each one set here adds to the config file's options.
#[derive(Args, Debug, Default)]
struct OptionArgs {
    #[arg(long)]
    cascade: bool,
    #[arg(long)]
    nodeps: bool,
    #[arg(long)]
    force: bool,
    #[arg(long)]
    dbonly: bool,
    #[arg(long)]
    downloadonly: bool,
    #[arg(long)]
    nosave: bool,
    /// Once for unneeded dependencies, twice to include explicit ones too.
    #[arg(long, action = clap::ArgAction::Count)]
    recursive: u8,
    #[arg(long)]
    unneeded: bool,
    #[arg(long, conflicts_with = "asexplicit")]
    asdeps: bool,
    #[arg(long)]
    asexplicit: bool,
}

impl OptionArgs {
    fn apply(&self, base: &TransactionOptions) -> TransactionOptions {
        let mode = if self.asdeps {
            Some(InstallReason::Dependency)
        } else if self.asexplicit {
            Some(InstallReason::Explicit)
        } else {
            base.mode
        };
        TransactionOptions {
            cascade: base.cascade || self.cascade,
            nodeps: base.nodeps || self.nodeps,
            force: base.force || self.force,
            dbonly: base.dbonly || self.dbonly,
            downloadonly: base.downloadonly || self.downloadonly,
            nosave: base.nosave || self.nosave,
            recursive: base.recursive.max(self.recursive),
            unneeded: base.unneeded || self.unneeded,
            mode,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("pacbridge: {}", e);
            std::process::exit(2);
        }
    };

    // Initialize logging.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    let (queue, receiver) = ChannelQueue::bounded(config.queue_capacity);
    let consumer = runtime.spawn(forward_events(receiver));

    let mut manager = TransactionManager::new(queue);
    match build_engine(&config.engine) {
        Ok(engine) => manager.set_engine(engine),
        Err(e) => error!("{}", e),
    }

    let outcome = run(&mut manager, cli.command, &config);
    let code = match outcome {
        Ok(code) => code,
        Err(fatal) => {
            info!("Waiting for the event queue to drain");
            manager.wait_drained();
            error!("{}", fatal);
            1
        }
    };

    // Dropping the last sender closes the queue and lets the consumer finish.
    drop(manager);
    if let Err(e) = runtime.block_on(consumer) {
        error!("Event consumer failed: {}", e);
    }
    std::process::exit(code);
}

/// Runs one command. Returns a fatal signal when an error event was queued.
fn run(
    manager: &mut TransactionManager<ChannelQueue>,
    command: Command,
    config: &AppConfig,
) -> Result<ExitCode, Fatal> {
    match command {
        Command::Refresh { options } => {
            let options = options.apply(&config.transaction);
            Ok(manager.refresh(&options))
        }
        Command::Install {
            names,
            conflicts,
            options,
        } => {
            let options = options.apply(&config.transaction);
            let conflicts: ConflictSet = conflicts.into_iter().collect();
            match manager.install(&names, &conflicts, &options) {
                0 => Ok(0),
                _ => Err(manager.fail("Can't install the requested packages", origin!())),
            }
        }
        Command::Version => {
            match manager.version_string() {
                Some(line) => println!("{}", line),
                None => println!("pacbridge v{} (no engine)", env!("CARGO_PKG_VERSION")),
            }
            Ok(0)
        }
    }
}

#[cfg(feature = "alpm")]
fn build_engine(config: &AlpmConfig) -> pacbridge_core::Result<Box<dyn Engine>> {
    let engine = pacbridge_alpm::AlpmEngine::with_config(config.clone())?;
    Ok(Box::new(engine))
}

#[cfg(not(feature = "alpm"))]
fn build_engine(_config: &AlpmConfig) -> pacbridge_core::Result<Box<dyn Engine>> {
    Err(pacbridge_core::Error::BackendUnavailable(
        "pacbridge was built without the alpm feature".into(),
    ))
}

/// Writes every event to stdout as one JSON object per line.
async fn forward_events(receiver: async_channel::Receiver<Event>) {
    let mut stdout = tokio::io::stdout();
    while let Ok(event) = receiver.recv().await {
        let line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to encode event: {}", e);
                continue;
            }
        };
        if let Err(e) = stdout.write_all(format!("{}\n", line).as_bytes()).await {
            error!("Failed to write event: {}", e);
            return;
        }
    }
    if let Err(e) = stdout.flush().await {
        error!("Failed to flush events: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_install() {
        let cli = Cli::try_parse_from([
            "pacbridge",
            "install",
            "base",
            "connman",
            "--conflict",
            "openresolv",
            "--nodeps",
            "--recursive",
            "--recursive",
        ])
        .unwrap();

        match cli.command {
            Command::Install {
                names,
                conflicts,
                options,
            } => {
                assert_eq!(names, vec!["base", "connman"]);
                assert_eq!(conflicts, vec!["openresolv"]);
                assert!(options.nodeps);
                assert_eq!(options.recursive, 2);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_flags_add_to_config_options() {
        let base = TransactionOptions {
            dbonly: true,
            mode: Some(InstallReason::Explicit),
            ..Default::default()
        };
        let args = OptionArgs {
            nodeps: true,
            asdeps: true,
            ..Default::default()
        };

        let options = args.apply(&base);
        assert!(options.dbonly);
        assert!(options.nodeps);
        assert_eq!(options.mode, Some(InstallReason::Dependency));
    }

    #[test]
    fn test_asdeps_and_asexplicit_conflict() {
        assert!(Cli::try_parse_from(["pacbridge", "install", "x", "--asdeps", "--asexplicit"]).is_err());
    }

    #[cfg(not(feature = "alpm"))]
    #[test]
    fn test_install_without_engine_is_fatal() {
        let (queue, receiver) = ChannelQueue::bounded(4);
        let mut manager = TransactionManager::new(queue);
        if let Ok(engine) = build_engine(&AlpmConfig::default()) {
            manager.set_engine(engine);
        }

        let command = Command::Install {
            names: vec!["linux".into()],
            conflicts: Vec::new(),
            options: OptionArgs::default(),
        };
        let fatal = run(&mut manager, command, &AppConfig::default()).unwrap_err();

        let event = receiver.try_recv().unwrap();
        assert_eq!(event.kind, pacbridge_core::EventKind::Error);
        assert_eq!(event.text, fatal.message);
    }

    #[test]
    fn test_refresh_with_memory_engine() {
        use pacbridge_core::memory::{MemoryEngine, MemorySource};

        let engine = MemoryEngine::new().with_source(MemorySource::new("core"));
        let journal = engine.journal();
        let (queue, _receiver) = ChannelQueue::bounded(4);
        let mut manager = TransactionManager::with_engine(queue, Box::new(engine));

        let command = Command::Refresh {
            options: OptionArgs::default(),
        };
        assert_eq!(run(&mut manager, command, &AppConfig::default()), Ok(0));
        assert_eq!(journal.borrow().updated, vec!["core"]);
    }
}

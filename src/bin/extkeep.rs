//! Command-line entry point for extkeep.
//!
//! `extkeep fetch` is the standalone download: it installs one extension
//! version and exits with status 1 on any failure. Diagnostics go to stderr.

use anyhow::Context;
use clap::{Parser, Subcommand};
use extkeep::update::{
    JsonStateStore, LAST_UPDATE_CHECK_KEY, LogNotifier, StateStore, UpdateChecker, UpdatePoller,
};
use extkeep::{ArtifactFetcher, ArtifactStore, Config, Platform, build_config, install_version};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Manage the bundled browser extension and check for updates.
#[derive(Parser)]
#[command(name = "extkeep", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Download an extension version and replace the installed copy.
    Fetch {
        /// Version to install (defaults to the configured version).
        #[arg(long)]
        version: Option<String>,
    },

    /// Check GitHub for newer extension and app releases.
    Check {
        /// Do not emit update notifications.
        #[arg(long)]
        silent: bool,

        /// Check even if the last check is recent.
        #[arg(long)]
        force: bool,
    },

    /// Show the install path and installed version.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("extkeep=info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => Config::from_file(path)
            .with_context(|| format!("cannot load config {}", path.display()))?,
        None => {
            let path = Config::default_config_path();
            if path.is_file() {
                Config::from_file(&path)?
            } else {
                build_config(&host_locale(), Platform::current())
            }
        }
    };

    match cli.command {
        Command::Fetch { version } => run_fetch(&config, version).await,
        Command::Check { silent, force } => run_check(&config, silent, force).await,
        Command::Status => run_status(&config),
    }
}

async fn run_fetch(config: &Config, version: Option<String>) -> anyhow::Result<()> {
    let version = version.unwrap_or_else(|| config.extension.version.clone());
    let store = ArtifactStore::from_config(config)?;
    let fetcher = ArtifactFetcher::from_config(config)?;

    info!("downloading extension v{version}");
    info!("destination: {}", store.install_path().display());

    let outcome = install_version(&store, &fetcher, &version)
        .await
        .with_context(|| format!("failed to download extension v{version}"))?;

    if outcome.replaced {
        println!("Extension v{} installed at {}", outcome.version, outcome.install_path.display());
    } else {
        println!(
            "Extension v{} downloaded, but the archive layout was unexpected; install left unchanged",
            outcome.version
        );
    }
    Ok(())
}

async fn run_check(config: &Config, silent: bool, force: bool) -> anyhow::Result<()> {
    let store = Arc::new(ArtifactStore::from_config(config)?);
    let checker = UpdateChecker::from_config(config)?;
    let state = Arc::new(JsonStateStore::open_default());
    let poller =
        UpdatePoller::new(config, store, checker, state).with_notifier(Arc::new(LogNotifier));

    if !force && !poller.should_check() {
        println!("Last update check is recent; use --force to check anyway");
        return Ok(());
    }

    let result = poller.check_for_updates(silent).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn run_status(config: &Config) -> anyhow::Result<()> {
    let store = ArtifactStore::from_config(config)?;
    println!("Install path: {}", store.install_path().display());
    match store.read_installed_version() {
        Some(v) => println!("Installed version: {v}"),
        None => println!("Installed version: (none)"),
    }
    if let Some(v) = store.pending_replace() {
        println!("Interrupted replace detected for v{v}; run `extkeep fetch --version {v}`");
    }

    let state = JsonStateStore::open_default();
    let last = state.get_i64(LAST_UPDATE_CHECK_KEY)?;
    match last.and_then(chrono::DateTime::from_timestamp_millis) {
        Some(ts) => println!("Last update check: {}", ts.to_rfc3339()),
        None => println!("Last update check: never"),
    }
    Ok(())
}

/// Host locale from `LANG` (`pt_BR.UTF-8` → `pt-BR`), defaulting to `en-US`.
fn host_locale() -> String {
    std::env::var("LANG")
        .ok()
        .and_then(|lang| {
            let base = lang.split('.').next()?.replace('_', "-");
            if base.is_empty() || base == "C" || base == "POSIX" {
                None
            } else {
                Some(base)
            }
        })
        .unwrap_or_else(|| "en-US".to_owned())
}

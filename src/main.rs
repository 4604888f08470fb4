// transferd-client - Transfer orchestration client
// Main entry point

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::prelude::*;

use transferd_client::auth::AuthTokenProvider;
use transferd_client::client::RestClient;
use transferd_client::config::{load_settings, Settings};
use transferd_client::daemon::DaemonSupervisor;
use transferd_client::errors::user_message;
use transferd_client::transfer::{TransferOrchestrator, TransferSpec};

#[derive(Parser, Debug)]
#[command(name = "transferd-client")]
#[command(about = "Drive file transfers through a local transfer daemon", version)]
struct Args {
    /// Settings file (default: $TRANSFERD_CLIENT_CONFIG or ~/.transferd-client/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Parser, Debug)]
enum Command {
    /// Run a transfer spec (JSON file) and wait for it to finish
    Transfer {
        /// Transfer spec document
        spec: PathBuf,
    },
    /// Issue a bearer token from the [auth] settings
    Token {
        /// Scope to request instead of auth.scope
        #[arg(long)]
        scope: Option<String>,
    },
    /// GET a path of the [api] REST endpoint with a bearer token
    Get {
        /// Path relative to api.url
        path: String,
        #[arg(long)]
        scope: Option<String>,
    },
    /// Start the daemon, wait until it is reachable, then stop it
    DaemonCheck,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let settings = load_settings(args.config.as_deref()).map_err(report)?;

    match args.command {
        Command::Transfer { spec } => run_transfer(settings, &spec).await,
        Command::Token { scope } => run_token(settings, scope.as_deref()).await,
        Command::Get { path, scope } => run_get(settings, &path, scope.as_deref()).await,
        Command::DaemonCheck => run_daemon_check(settings).await,
    }
}

/// Initialize tracing on stderr
///
/// Default level is INFO (DEBUG with --verbose), RUST_LOG overrides both.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Bridge log crate → tracing (for dependencies using log crate)
    tracing_log::LogTracer::init().ok();
}

/// Attach the remediation hint to a library error
fn report(error: transferd_client::Error) -> anyhow::Error {
    anyhow!(user_message(&error))
}

/// Token cancelled by Ctrl-C; installing the handler keeps SIGINT from killing
/// the process, so every long wait must watch this token
fn interrupt_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping");
            ctrl_c.cancel();
        }
    });
    cancel
}

fn token_provider(settings: &Settings) -> Result<AuthTokenProvider> {
    let auth = settings
        .auth
        .clone()
        .context("No [auth] table in settings")?;
    let verify_tls = settings.api.as_ref().map_or(true, |api| api.verify_tls);
    Ok(AuthTokenProvider::new(auth)
        .map_err(report)?
        .with_tls_verification(verify_tls))
}

async fn run_transfer(settings: Settings, spec_path: &Path) -> Result<()> {
    let spec = TransferSpec::from_file(spec_path)
        .map_err(report)
        .with_context(|| format!("Failed to load transfer spec {}", spec_path.display()))?;

    let supervisor = DaemonSupervisor::new(settings.daemon).map_err(report)?;
    let mut orchestrator = TransferOrchestrator::new(supervisor);

    let cancel = interrupt_token();
    let result = orchestrator.run_with_cancel(&spec, &cancel).await;
    orchestrator.shutdown().await;

    let transfer_id = result.map_err(report)?;
    println!("Transfer {} completed", transfer_id);
    Ok(())
}

async fn run_token(settings: Settings, scope: Option<&str>) -> Result<()> {
    let provider = token_provider(&settings)?;
    let token = provider.issue_token(scope).await.map_err(report)?;
    println!("{}", token);
    Ok(())
}

async fn run_get(settings: Settings, path: &str, scope: Option<&str>) -> Result<()> {
    let api = settings
        .api
        .clone()
        .context("No [api] table in settings")?;
    let provider = token_provider(&settings)?;

    let mut rest = RestClient::new(&api.url, api.verify_tls).map_err(report)?;
    rest.set_bearer(Arc::new(provider));
    rest.set_default_scope(scope).await.map_err(report)?;

    let value = rest.read(path, &[]).await.map_err(report)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

async fn run_daemon_check(settings: Settings) -> Result<()> {
    let mut supervisor = DaemonSupervisor::new(settings.daemon).map_err(report)?;

    let cancel = interrupt_token();
    let result = tokio::select! {
        ready = supervisor.ensure_ready() => ready.map(|handle| (handle.port(), handle.pid())),
        _ = cancel.cancelled() => Err(transferd_client::Error::Cancelled),
    };
    supervisor.shutdown().await;

    let (port, pid) = result.map_err(report)?;
    println!(
        "Daemon reachable on port {} (pid {})",
        port,
        pid.map_or_else(|| "?".to_string(), |pid| pid.to_string())
    );
    Ok(())
}

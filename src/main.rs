#![allow(missing_docs)]

//! Toleration defaults CLI entry point.
//!
//! Provides `serve`, `review`, and `check-config` subcommands for running the
//! webhook, answering a single admission review offline, or validating
//! configuration.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use json_patch::Patch;
use kube::core::admission::AdmissionReview;
use kube::core::DynamicObject;
use tokio::sync::Notify;
use tracing::{info, warn};

use toleration_defaults::config::{self, Config};
use toleration_defaults::{logging, server};

/// Toleration defaults — admission webhook for node condition tolerations.
#[derive(Parser)]
#[command(name = "toleration-defaults", version, about)]
struct Cli {
    /// Config file (defaults to `$TOLERATION_DEFAULTS_CONFIG` or
    /// `./toleration-defaults.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Run the admission webhook.
    Serve,
    /// Answer one AdmissionReview read from a file or stdin.
    Review {
        /// Review JSON file. Reads stdin when omitted.
        file: Option<PathBuf>,
        /// Print the patched object instead of the response review.
        #[arg(long)]
        patched: bool,
    },
    /// Load and validate configuration, then print the effective settings.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => handle_serve(cli.config.as_deref()).await,
        Command::Review { file, patched } => {
            logging::init_cli()?;
            handle_review(cli.config.as_deref(), file.as_deref(), patched)
        }
        Command::CheckConfig => {
            logging::init_cli()?;
            handle_check_config(cli.config.as_deref())
        }
    }
}

fn load(explicit: Option<&Path>) -> anyhow::Result<Config> {
    config::load_effective(explicit, |key| std::env::var(key).ok())
        .context("failed to load configuration")
}

/// Run the webhook until ctrl-c.
async fn handle_serve(explicit: Option<&Path>) -> anyhow::Result<()> {
    // Logging comes first so config loading is visible; the logs dir is
    // therefore read from the file before the full load.
    let _logging_guard = logging::init(peek_logs_dir(explicit).as_deref())?;

    let config = load(explicit)?;
    let addr = config.server.socket_addr()?;
    let plugin = config.admission.plugin();
    let grace = plugin.reconciler().grace_periods();
    info!(
        not_ready_seconds = grace.not_ready,
        unreachable_seconds = grace.unreachable,
        storage = %config.admission.tolerations_storage,
        "starting toleration defaults webhook"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let stop = Arc::new(Notify::new());
    let trigger = Arc::clone(&stop);
    let mut server = tokio::spawn(server::serve(listener, plugin, async move {
        trigger.notified().await;
    }));

    tokio::select! {
        joined = &mut server => {
            joined
                .context("webhook server task panicked")?
                .context("webhook server failed")?;
            return Ok(());
        }
        () = shutdown_signal() => {}
    }

    info!("received shutdown signal, draining connections");
    stop.notify_one();
    let drain = config.server.shutdown_timeout();
    match tokio::time::timeout(drain, server).await {
        Ok(joined) => joined
            .context("webhook server task panicked")?
            .context("webhook server failed")?,
        Err(_) => {
            warn!(
                timeout_secs = drain.as_secs(),
                "connections still open after shutdown timeout"
            );
            return Ok(());
        }
    }

    info!("toleration defaults webhook shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

fn peek_logs_dir(explicit: Option<&Path>) -> Option<PathBuf> {
    let (path, _) = config::resolve_config_path(explicit, |key| std::env::var(key).ok());
    config::load_config(&path).ok()?.logging.logs_dir
}

/// Answer a single review offline.
fn handle_review(explicit: Option<&Path>, file: Option<&Path>, patched: bool) -> anyhow::Result<()> {
    let config = load(explicit)?;
    let plugin = config.admission.plugin();

    let raw = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            buf
        }
    };
    let review: AdmissionReview<DynamicObject> =
        serde_json::from_str(&raw).context("input is not an AdmissionReview")?;
    let object = review
        .request
        .as_ref()
        .and_then(|r| r.object.as_ref())
        .map(serde_json::to_value)
        .transpose()?;

    let answer = plugin.review(review);

    if !patched {
        println!("{}", serde_json::to_string_pretty(&answer)?);
        return Ok(());
    }

    let response = answer
        .response
        .context("review produced no response")?;
    if !response.allowed {
        anyhow::bail!("request denied: {}", response.result.message);
    }
    let mut object = object.context("request carried no object")?;
    if let Some(bytes) = &response.patch {
        let patch: Patch = serde_json::from_slice(bytes).context("response patch is not JSON")?;
        json_patch::patch(&mut object, &patch.0).context("failed to apply response patch")?;
    }
    println!("{}", serde_json::to_string_pretty(&object)?);
    Ok(())
}

/// Validate config and print the effective values.
fn handle_check_config(explicit: Option<&Path>) -> anyhow::Result<()> {
    let config = load(explicit)?;
    let admission = &config.admission;
    println!(
        "default_not_ready_toleration_seconds = {}",
        admission.default_not_ready_toleration_seconds
    );
    println!(
        "default_unreachable_toleration_seconds = {}",
        admission.default_unreachable_toleration_seconds
    );
    println!("tolerations_storage = {}", admission.tolerations_storage);
    println!("on_decode_error = {:?}", admission.on_decode_error);
    println!("listen_addr = {}", config.server.listen_addr);
    println!(
        "shutdown_timeout_secs = {}",
        config.server.shutdown_timeout_secs
    );
    Ok(())
}

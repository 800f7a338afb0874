//! `vitrinectl`: drive a gallery root from the command line.
//!
//! Logs go to stderr; stdout carries one JSON object per line (snapshots,
//! progress events, command results) so it can be piped into other tools.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vitrine_config::{ConfigLoad, ConfigSource, GalleryConfigLoader, apply_guard_rails, loader};
use vitrine_core::{GalleryConfig, GalleryService, GallerySnapshot, ProgressEvent, ProgressSubscription};

#[derive(Parser, Debug)]
#[command(name = "vitrinectl", version)]
#[command(about = "Scan a media root, maintain its thumbnail cache, and stream progress as JSON lines")]
struct Cli {
    /// Configuration file (TOML or JSON). Takes precedence over
    /// $VITRINE_CONFIG_PATH, $VITRINE_CONFIG_JSON, and vitrine.toml.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan the root, print the snapshot, and generate missing thumbnails.
    Scan(ScanArgs),
    /// Keep the snapshot current as files change; prints a snapshot after
    /// every invalidation.
    Watch(RootArgs),
    /// Delete thumbnails whose source media no longer exists.
    Cleanup(RootArgs),
    /// Print the effective configuration and where it came from.
    Config,
}

#[derive(Args, Debug)]
struct RootArgs {
    /// Gallery root. Falls back to `root` in the configuration.
    root: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ScanArgs {
    #[command(flatten)]
    root: RootArgs,
    /// Print the snapshot and exit without waiting for generation.
    #[arg(long)]
    no_wait: bool,
    /// Relative paths to generate first, with tiny previews.
    #[arg(long = "viewport", value_name = "RELATIVE_PATH")]
    viewport: Vec<String>,
}

/// Non-event lines written to stdout.
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
enum Output<'a> {
    Snapshot {
        snapshot: &'a GallerySnapshot,
    },
    Cleanup {
        removed: usize,
    },
    Config {
        source: String,
        config: &'a GalleryConfig,
        warnings: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,vitrine::scheduler=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let load = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Config => emit(&Output::Config {
            source: load.source.to_string(),
            config: &load.config,
            warnings: load.warnings.iter().map(|w| w.message.clone()).collect(),
        }),
        Command::Scan(args) => {
            let service = open_service(args.root.root, load.config)?;
            run_scan(&service, args.no_wait, &args.viewport).await
        }
        Command::Watch(args) => {
            let service = open_service(args.root, load.config)?;
            run_watch(&service).await
        }
        Command::Cleanup(args) => {
            let service = open_service(args.root, load.config)?;
            let removed = service
                .cleanup_orphans()
                .await
                .context("orphan cleanup failed")?;
            info!(removed, root = %service.root().display(), "orphan cleanup finished");
            emit(&Output::Cleanup { removed })
        }
    }
}

fn load_config(explicit: Option<&Path>) -> Result<ConfigLoad> {
    let Some(path) = explicit else {
        return GalleryConfigLoader::new()
            .load()
            .context("failed to load configuration");
    };
    let config = loader::load_from_file(path)?;
    let warnings = apply_guard_rails(&config)
        .with_context(|| format!("configuration from {} rejected", path.display()))?;
    for warning in warnings.iter() {
        warn!(message = %warning.message, hint = ?warning.hint, "configuration warning");
    }
    Ok(ConfigLoad {
        config,
        source: ConfigSource::File(path.to_path_buf()),
        warnings,
    })
}

fn open_service(root: Option<PathBuf>, config: GalleryConfig) -> Result<GalleryService> {
    let Some(root) = root.or_else(|| config.root.clone()) else {
        bail!("no gallery root given on the command line or in the configuration");
    };
    if !root.is_dir() {
        bail!("gallery root {} is not a directory", root.display());
    }
    info!(root = %root.display(), "opening gallery");
    Ok(GalleryService::new(root, config))
}

async fn run_scan(service: &GalleryService, no_wait: bool, viewport: &[String]) -> Result<()> {
    let mut events = service.subscribe_progress();
    let snapshot = service.get_snapshot().await;
    if !viewport.is_empty() {
        let moved = service.report_viewport(viewport).await;
        info!(moved, requested = viewport.len(), "viewport prioritised");
    }
    flush_pending(&mut events)?;
    emit(&Output::Snapshot {
        snapshot: &snapshot,
    })?;

    let pending = snapshot.total_count.saturating_sub(snapshot.ready_count());
    if no_wait || pending == 0 {
        service.shutdown().await;
        return flush_pending(&mut events);
    }

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                emit(&event)?;
                if matches!(event, ProgressEvent::GenerationFinished { .. }) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupted; queued thumbnails abandoned");
                break;
            }
        }
    }
    service.shutdown().await;
    Ok(())
}

async fn run_watch(service: &GalleryService) -> Result<()> {
    let mut events = service.subscribe_progress();
    service
        .start_watching()
        .await
        .with_context(|| format!("failed to watch {}", service.root().display()))?;
    let snapshot = service.get_snapshot().await;
    flush_pending(&mut events)?;
    emit(&Output::Snapshot {
        snapshot: &snapshot,
    })?;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                emit(&event)?;
                if matches!(event, ProgressEvent::CacheInvalidated { .. }) {
                    let snapshot = service.get_snapshot().await;
                    emit(&Output::Snapshot { snapshot: &snapshot })?;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    service.shutdown().await;
    Ok(())
}

fn flush_pending(events: &mut ProgressSubscription) -> Result<()> {
    while let Some(event) = events.try_recv() {
        emit(&event)?;
    }
    Ok(())
}

fn emit<T: Serialize>(value: &T) -> Result<()> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer(&mut out, value).context("failed to encode output")?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

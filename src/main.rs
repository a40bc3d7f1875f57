use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use slide_frame::config::{Configuration, config_search_path, locate_config};
use slide_frame::events::{SelectorRequest, SelectorUpdate};
use slide_frame::tasks::{selector, viewer};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "slide-frame", version, about = "Fullscreen photo slideshow")]
struct Args {
    /// YAML config file, or a directory holding config.yaml. Falls back to
    /// ~/.config/slide-frame and then /etc/slide-frame
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if verbosity > 0 {
        let level = if verbosity == 1 {
            Level::DEBUG
        } else {
            Level::TRACE
        };
        filter = filter.add_directive(
            format!("slide_frame={level}")
                .parse()
                .context("invalid log directive")?,
        );
    }
    filter = filter.add_directive("winit=warn".parse().context("invalid log directive")?);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args { config, verbose } = Args::parse();
    init_tracing(verbose)?;

    let home = std::env::var_os("HOME").map(PathBuf::from);
    let candidates = config_search_path(config.as_deref(), home.as_deref());
    let Some(config) = locate_config(&candidates) else {
        anyhow::bail!("no configuration found; looked in {candidates:?}");
    };

    let cfg = Configuration::from_yaml_file(config)
        .with_context(|| format!("failed to load configuration from {}", config.display()))?
        .validated()
        .context("invalid configuration values")?;
    tracing::info!("Loaded configuration from {}:\n{:#?}", config.display(), cfg);

    let (update_tx, update_rx) = mpsc::channel::<SelectorUpdate>(8); // Selector -> Viewer
    let (request_tx, request_rx) = mpsc::channel::<SelectorRequest>(8); // Viewer -> Selector

    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    let mut tasks = JoinSet::new();

    tasks.spawn({
        let cfg = cfg.clone();
        let cancel = cancel.clone();
        async move {
            selector::run(cfg, update_tx, request_rx, cancel)
                .await
                .context("selector task failed")
        }
    });

    // The viewer owns the main thread until the window closes or shutdown starts
    if let Err(e) = viewer::run_windowed(cfg, update_rx, request_tx, cancel.clone())
        .context("viewer failed")
    {
        tracing::error!("{e:?}");
    }
    cancel.cancel();

    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
    }

    Ok(())
}

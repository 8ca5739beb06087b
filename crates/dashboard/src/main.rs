use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

mod config;
mod frame;
mod poller;
mod renderer;
mod snapshot;
mod source;
mod supervisor;

use config::{DashboardConfig, Profile};
use frame::FrameBuilder;
use poller::Poller;
use renderer::{ConsoleRenderer, OutputFormat};
use source::FileSource;
use supervisor::supervise;

/// Inference server dashboard: stage breakdown and metric history
#[derive(Debug, Parser)]
#[command(name = "dashboard")]
struct Command {
    /// Snapshot file rewritten by the metrics source
    #[arg(short, long)]
    source: PathBuf,

    /// Built-in dashboard layout
    #[arg(short, long, value_enum, default_value = "full")]
    profile: Profile,

    /// JSON layout file (takes precedence over --profile)
    #[arg(long)]
    profile_file: Option<PathBuf>,

    /// Maximum named stages in the breakdown before folding into "Other"
    #[arg(long)]
    max_visible: Option<usize>,

    /// Poll interval in milliseconds
    #[arg(short, long, default_value = "500", value_parser = clap::value_parser!(u64).range(1..))]
    interval_ms: u64,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Render a single frame and exit
    #[arg(long)]
    once: bool,

    /// Run duration in seconds (0 = unlimited)
    #[arg(short, long, default_value = "0")]
    duration: u64,

    /// Verbose debug output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let opts = Command::parse();

    let level = if opts.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config =
        DashboardConfig::resolve(opts.profile, opts.profile_file.as_deref(), opts.max_visible)?;
    let builder = FrameBuilder::new(config)?;
    log::debug!(
        "Profile: {} stages, {} charts, {} instance charts, max_visible={}",
        builder.config().stages.len(),
        builder.config().charts.len(),
        builder.config().instance_charts.len(),
        builder.config().max_visible
    );

    let token = CancellationToken::new();
    let renderer = ConsoleRenderer::new(std::io::stdout(), opts.format);
    let mut poller = Poller::new(
        FileSource::new(&opts.source),
        renderer,
        builder,
        Duration::from_millis(opts.interval_ms),
        token.clone(),
    );
    if opts.once {
        poller = poller.with_max_cycles(1);
    }

    // Stop on Ctrl-C
    let signal_token = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    log::warn!("Failed to listen for Ctrl-C: {}", e);
                    return;
                }
                log::info!("Interrupted, stopping");
                signal_token.cancel();
            }
            _ = signal_token.cancelled() => {}
        }
    });

    if opts.duration > 0 {
        let timer_token = token.clone();
        let duration = Duration::from_secs(opts.duration);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => timer_token.cancel(),
                _ = timer_token.cancelled() => {}
            }
        });
    }

    log::info!(
        "Polling {} every {} ms",
        opts.source.display(),
        opts.interval_ms
    );

    let Some(stats) = supervise(poller.run(), token, "poller").await else {
        bail!("Dashboard stopped with an error");
    };

    log::info!(
        "Rendered {} frames, skipped {} cycles",
        stats.rendered,
        stats.skipped
    );
    if opts.once {
        stats
            .ensure_rendered()
            .with_context(|| format!("No frame rendered from {}", opts.source.display()))?;
    }

    Ok(())
}

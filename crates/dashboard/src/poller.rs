use std::time::Duration;

use anyhow::{bail, Result};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::frame::FrameBuilder;
use crate::renderer::Renderer;
use crate::source::SnapshotSource;

/// Result of a single poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A new frame replaced the previous one
    Rendered,
    /// Fetch or decode failed; the previous frame was left in place
    Skipped,
}

/// Counters reported when the poll loop stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    pub rendered: u64,
    pub skipped: u64,
}

impl PollStats {
    pub fn cycles(&self) -> u64 {
        self.rendered + self.skipped
    }

    /// Fails if every cycle was skipped
    pub fn ensure_rendered(&self) -> Result<()> {
        if self.rendered == 0 {
            bail!("all {} poll cycles were skipped", self.cycles());
        }
        Ok(())
    }
}

/// Drives the fetch, build, render cycle at a fixed interval
pub struct Poller<S, R> {
    source: S,
    renderer: R,
    builder: FrameBuilder,
    interval: Duration,
    max_cycles: Option<u64>,
    token: CancellationToken,
}

impl<S: SnapshotSource, R: Renderer> Poller<S, R> {
    /// Creates a poller. `interval` must be non-zero.
    pub fn new(
        source: S,
        renderer: R,
        builder: FrameBuilder,
        interval: Duration,
        token: CancellationToken,
    ) -> Self {
        Self {
            source,
            renderer,
            builder,
            interval,
            max_cycles: None,
            token,
        }
    }

    /// Stops the loop after `max_cycles` cycles, successful or not
    pub fn with_max_cycles(mut self, max_cycles: u64) -> Self {
        self.max_cycles = Some(max_cycles);
        self
    }

    /// Runs one cycle: fetch a snapshot, build its frame, render it.
    ///
    /// Both the breakdown and the charts come from the same snapshot, and
    /// nothing is rendered until the whole frame is built. Renderer errors
    /// are returned; fetch and decode errors only skip the cycle.
    pub async fn poll_once(&mut self) -> Result<CycleOutcome> {
        let frame = match self.source.fetch().await {
            Ok(text) => self.builder.decode(&text),
            Err(e) => Err(e),
        };

        match frame {
            Ok(frame) => {
                self.renderer.set_connected(true)?;
                self.renderer.render(&frame)?;
                log::debug!(
                    "Rendered frame: {} buckets, {} charts, {} instance charts",
                    frame.breakdown.len(),
                    frame.charts.len(),
                    frame.instance_charts.len()
                );
                Ok(CycleOutcome::Rendered)
            }
            Err(e) => {
                log::warn!("Skipping poll cycle for {}: {:#}", self.source.describe(), e);
                self.renderer.set_connected(false)?;
                Ok(CycleOutcome::Skipped)
            }
        }
    }

    /// Polls until the token is cancelled or the cycle limit is reached.
    ///
    /// Each cycle completes before the next tick is awaited, so cycles
    /// never overlap; ticks missed by a slow cycle are delayed, not bunched.
    pub async fn run(mut self) -> Result<PollStats> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stats = PollStats::default();
        let token = self.token.clone();

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    log::debug!("Poller cancelled after {} cycles", stats.cycles());
                    break;
                }
                _ = ticker.tick() => {
                    match self.poll_once().await? {
                        CycleOutcome::Rendered => stats.rendered += 1,
                        CycleOutcome::Skipped => stats.skipped += 1,
                    }
                    if self.max_cycles.map_or(false, |max| stats.cycles() >= max) {
                        break;
                    }
                }
            }
        }

        Ok(stats)
    }
}

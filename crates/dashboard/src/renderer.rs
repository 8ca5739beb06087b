use std::io::Write;

use anyhow::{Context, Result};
use time::macros::format_description;
use time::OffsetDateTime;

use crate::frame::{Chart, Frame, InstanceChart};

const BAR_WIDTH: usize = 40;

/// Visual side of the dashboard.
///
/// A renderer is created once at startup and handed to the poller; it owns
/// whatever view state it needs between frames.
pub trait Renderer: Send {
    /// Replaces the displayed data with `frame`
    fn render(&mut self, frame: &Frame) -> Result<()>;

    /// Updates the connectivity indicator. The previous frame stays on screen.
    fn set_connected(&mut self, connected: bool) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human readable text view
    Text,
    /// One JSON document per frame
    Json,
}

/// Renders frames to a text stream
pub struct ConsoleRenderer<W> {
    out: W,
    format: OutputFormat,
    connected: Option<bool>,
}

impl<W: Write + Send> ConsoleRenderer<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self {
            out,
            format,
            connected: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_text(&mut self, frame: &Frame) -> Result<()> {
        let status = if frame.is_running { "Running" } else { "Ready" };
        writeln!(
            self.out,
            "{} {} [{}] {}",
            format_time(),
            frame.experiment_name,
            status,
            frame.experiment_description
        )?;

        if frame.breakdown.is_empty() {
            writeln!(self.out, "  (no stage data)")?;
        }
        for bucket in &frame.breakdown {
            writeln!(
                self.out,
                "  {:<22} {} {:>5.1}%  (raw {:.1}%)",
                bucket.label,
                bar(bucket.normalized_percentage),
                bucket.normalized_percentage,
                bucket.raw_percentage
            )?;
        }

        for chart in frame.charts.iter().filter(|c| !c.series.is_empty()) {
            writeln!(self.out, "  {}", chart_line(chart))?;
        }
        for chart in frame.instance_charts.iter().filter(|c| !c.series.is_empty()) {
            writeln!(self.out, "  {}", instance_chart_line(chart))?;
        }

        writeln!(self.out, "{}", "-".repeat(60))?;
        Ok(())
    }
}

impl<W: Write + Send> Renderer for ConsoleRenderer<W> {
    fn render(&mut self, frame: &Frame) -> Result<()> {
        match self.format {
            OutputFormat::Text => self.write_text(frame)?,
            OutputFormat::Json => {
                let line = serde_json::to_string(frame).context("Failed to serialize frame")?;
                writeln!(self.out, "{}", line)?;
            }
        }
        self.out.flush().context("Failed to flush renderer output")
    }

    fn set_connected(&mut self, connected: bool) -> Result<()> {
        let previous = self.connected.replace(connected);
        if previous == Some(connected) {
            return Ok(());
        }
        // Only transitions are shown; a first successful frame says enough
        if !connected || previous == Some(false) {
            let status = if connected { "Connected" } else { "Disconnected" };
            match self.format {
                OutputFormat::Text => writeln!(self.out, "{} {}", format_time(), status)?,
                OutputFormat::Json => writeln!(
                    self.out,
                    "{}",
                    serde_json::json!({ "status": status.to_lowercase() })
                )?,
            }
            self.out.flush()?;
        }
        Ok(())
    }
}

fn bar(normalized_percentage: f64) -> String {
    let filled = ((normalized_percentage / 100.0 * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
    format!("{}{}", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled))
}

fn chart_line(chart: &Chart) -> String {
    let series = &chart.series;
    let last = series.last().unwrap_or(0.0);
    let peak = series.values.iter().copied().fold(f64::MIN, f64::max);
    format!(
        "{:<26} last={:<10.2} max={:<10.2} points={:<4} {}",
        title_or_key(&chart.title, &chart.key),
        last,
        peak,
        series.values.len(),
        span(&series.labels)
    )
}

fn instance_chart_line(chart: &InstanceChart) -> String {
    let series = &chart.series;
    let latest: Vec<String> = series
        .instance_names
        .iter()
        .zip(&series.per_instance_values)
        .map(|(name, values)| format!("{}={:.1}", name, values.last().copied().unwrap_or(0.0)))
        .collect();
    format!(
        "{:<26} {} {}",
        title_or_key(&chart.title, &chart.key),
        latest.join(" "),
        span(&series.labels)
    )
}

fn title_or_key<'a>(title: &'a str, key: &'a str) -> &'a str {
    if title.is_empty() {
        key
    } else {
        title
    }
}

fn span(labels: &[String]) -> String {
    match (labels.first(), labels.last()) {
        (Some(first), Some(last)) => format!("[{}..{}]", first, last),
        _ => String::new(),
    }
}

fn format_time() -> String {
    if let Ok(now) = OffsetDateTime::now_local() {
        let format = format_description!("[hour]:[minute]:[second].[subsecond digits:3]");
        now.format(&format)
            .unwrap_or_else(|_| "00:00:00.000".to_string())
    } else {
        "00:00:00.000".to_string()
    }
}

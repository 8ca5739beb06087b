use serde::Serialize;

use crate::series::{finite_or_zero, HistoryBundle, InstanceMatrix, Series, TimePoint};

/// Labels and values of one single-line chart
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

impl ChartSeries {
    /// An empty chart has no data and should be skipped by the renderer
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Most recent value, if any
    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }
}

/// Labels and one line per instance of a multi-instance chart
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceChartSeries {
    pub labels: Vec<String>,
    pub instance_names: Vec<String>,
    pub per_instance_values: Vec<Vec<f64>>,
}

impl InstanceChartSeries {
    pub fn is_empty(&self) -> bool {
        self.per_instance_values.is_empty()
    }
}

/// Output of [`SeriesAligner::align`]: requested channels over one label axis
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AlignedHistory {
    /// x-axis labels shared by every channel of this bundle
    pub labels: Vec<String>,
    /// Channels in the order they were requested
    pub channels: Vec<(String, Series)>,
}

impl AlignedHistory {
    pub fn get(&self, name: &str) -> Option<&Series> {
        self.channels
            .iter()
            .find(|(channel, _)| channel == name)
            .map(|(_, series)| series)
    }

    /// Builds the chart data for one channel.
    ///
    /// Absent or unrequested channels yield an empty chart rather than `None`,
    /// so the caller can treat both the same way.
    pub fn chart(&self, name: &str) -> ChartSeries {
        ChartSeries {
            labels: self.labels.clone(),
            values: self.get(name).map(Series::values).unwrap_or_default(),
        }
    }
}

/// Aligns history channels to a shared, labelled time axis.
///
/// # Examples
///
/// ```
/// use breakdown::{HistoryBundle, SeriesAligner};
///
/// let mut bundle = HistoryBundle::new(vec![0.4, 1.5, 2.49]);
/// bundle.insert_channel("latencies", vec![12.0, 14.0, 13.0]);
///
/// let aligned = SeriesAligner::default().align(&bundle, &["latencies", "throughput"]);
///
/// assert_eq!(aligned.labels, ["0s", "2s", "2s"]);
/// assert_eq!(aligned.chart("latencies").values, [12.0, 14.0, 13.0]);
/// assert!(aligned.chart("throughput").is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesAligner {
    unit: String,
}

impl Default for SeriesAligner {
    fn default() -> Self {
        Self::new("s")
    }
}

impl SeriesAligner {
    /// Creates an aligner whose labels end with `unit`
    pub fn new(unit: impl Into<String>) -> Self {
        Self { unit: unit.into() }
    }

    /// Formats one timestamp as whole seconds plus the unit suffix.
    ///
    /// Halves round away from zero; non-finite timestamps label as 0.
    pub fn label(&self, time_s: f64) -> String {
        let seconds = if time_s.is_finite() {
            time_s.round() as i64
        } else {
            0
        };
        format!("{}{}", seconds, self.unit)
    }

    pub fn labels(&self, timestamps: &[f64]) -> Vec<String> {
        timestamps.iter().map(|&t| self.label(t)).collect()
    }

    /// Looks up each requested scalar channel.
    ///
    /// Channels missing from the bundle come back as empty series. The label
    /// axis is derived once and shared by every channel.
    pub fn align(&self, bundle: &HistoryBundle, channel_names: &[&str]) -> AlignedHistory {
        let labels = self.labels(bundle.timestamps());
        let channels = channel_names
            .iter()
            .map(|&name| (name.to_string(), bundle.series(name).unwrap_or_default()))
            .collect();

        AlignedHistory { labels, channels }
    }

    /// Splits a multi-instance channel into one series per instance.
    ///
    /// Output series `i` holds the `i`-th value of every input point, or 0
    /// where a point has fewer than `i + 1` values. Every output series has
    /// the same length as the input.
    pub fn transpose(matrix: &InstanceMatrix, instance_count: usize) -> Vec<Series> {
        (0..instance_count)
            .map(|i| {
                matrix
                    .points()
                    .iter()
                    .map(|p| TimePoint::new(p.time_s, finite_or_zero(p.values.get(i).copied())))
                    .collect()
            })
            .collect()
    }

    /// Builds the multi-instance charts for the requested channels.
    ///
    /// Returns nothing unless the bundle knows more than one instance. A
    /// requested channel that is absent yields an empty chart.
    pub fn align_instances(
        &self,
        bundle: &HistoryBundle,
        channel_names: &[&str],
    ) -> Vec<(String, InstanceChartSeries)> {
        let instance_names = bundle.instance_names();
        if instance_names.len() <= 1 {
            return Vec::new();
        }

        let labels = self.labels(bundle.timestamps());
        channel_names
            .iter()
            .map(|&name| {
                let per_instance_values = bundle
                    .matrix(name)
                    .map(|matrix| {
                        Self::transpose(&matrix, instance_names.len())
                            .iter()
                            .map(Series::values)
                            .collect()
                    })
                    .unwrap_or_default();

                let chart = InstanceChartSeries {
                    labels: labels.clone(),
                    instance_names: instance_names.to_vec(),
                    per_instance_values,
                };
                (name.to_string(), chart)
            })
            .collect()
    }
}

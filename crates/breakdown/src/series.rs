use serde::Serialize;
use std::collections::HashMap;

/// One scalar sample on the shared time axis
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TimePoint {
    /// Elapsed time offset in seconds
    pub time_s: f64,
    pub value: f64,
}

impl TimePoint {
    pub fn new(time_s: f64, value: f64) -> Self {
        Self { time_s, value }
    }
}

/// Ordered samples of one channel; the order is the x-axis
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Series {
    points: Vec<TimePoint>,
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, point: TimePoint) {
        self.points.push(point);
    }

    pub fn points(&self) -> &[TimePoint] {
        &self.points
    }

    /// Values in time order, without their timestamps
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl FromIterator<TimePoint> for Series {
    fn from_iter<I: IntoIterator<Item = TimePoint>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

/// One sample of a multi-instance channel: a value per instance
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InstancePoint {
    pub time_s: f64,
    /// Per-instance values, ordered like the bundle's instance names.
    /// May be shorter than the instance count.
    pub values: Vec<f64>,
}

/// Time-ordered per-instance samples of one multi-instance channel
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InstanceMatrix {
    points: Vec<InstancePoint>,
}

impl InstanceMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, point: InstancePoint) {
        self.points.push(point);
    }

    pub fn points(&self) -> &[InstancePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl FromIterator<InstancePoint> for InstanceMatrix {
    fn from_iter<I: IntoIterator<Item = InstancePoint>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

/// Rolling history window supplied by the metrics source.
///
/// All channels share one timestamp axis of length W. Raw channel arrays are
/// kept as received; they are paired with the axis when read back through
/// [`HistoryBundle::series`] or [`HistoryBundle::matrix`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoryBundle {
    timestamps: Vec<f64>,
    channels: HashMap<String, Vec<f64>>,
    matrices: HashMap<String, Vec<Vec<f64>>>,
    instance_names: Vec<String>,
}

impl HistoryBundle {
    /// Creates an empty bundle over the given timestamp axis (seconds)
    pub fn new(timestamps: Vec<f64>) -> Self {
        Self {
            timestamps,
            ..Self::default()
        }
    }

    /// Adds a scalar channel, replacing any channel of the same name
    pub fn insert_channel(&mut self, name: impl Into<String>, values: Vec<f64>) {
        let name = name.into();
        self.matrices.remove(&name);
        self.channels.insert(name, values);
    }

    /// Adds a multi-instance channel, one row of per-instance values per timestamp
    pub fn insert_matrix(&mut self, name: impl Into<String>, rows: Vec<Vec<f64>>) {
        let name = name.into();
        self.channels.remove(&name);
        self.matrices.insert(name, rows);
    }

    pub fn set_instance_names(&mut self, names: Vec<String>) {
        self.instance_names = names;
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    pub fn instance_names(&self) -> &[String] {
        &self.instance_names
    }

    /// Length W of the shared time axis
    pub fn window_len(&self) -> usize {
        self.timestamps.len()
    }

    /// Returns a scalar channel paired with the time axis.
    ///
    /// The result always has length W: values past the end of the axis are
    /// dropped and missing values read as 0. Returns `None` if the channel
    /// is absent.
    pub fn series(&self, name: &str) -> Option<Series> {
        let values = self.channels.get(name)?;
        Some(
            self.timestamps
                .iter()
                .enumerate()
                .map(|(i, &time_s)| TimePoint::new(time_s, finite_or_zero(values.get(i).copied())))
                .collect(),
        )
    }

    /// Returns a multi-instance channel paired with the time axis.
    ///
    /// The result has length W; a timestamp without a row gets an empty row.
    pub fn matrix(&self, name: &str) -> Option<InstanceMatrix> {
        let rows = self.matrices.get(name)?;
        Some(
            self.timestamps
                .iter()
                .enumerate()
                .map(|(i, &time_s)| InstancePoint {
                    time_s,
                    values: rows.get(i).cloned().unwrap_or_default(),
                })
                .collect(),
        )
    }
}

pub(crate) fn finite_or_zero(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_pairs_values_with_timestamps() {
        let mut bundle = HistoryBundle::new(vec![0.0, 0.5, 1.0]);
        bundle.insert_channel("latencies", vec![10.0, 12.0, 11.0]);

        let series = bundle.series("latencies").unwrap();

        assert_eq!(
            series.points(),
            &[
                TimePoint::new(0.0, 10.0),
                TimePoint::new(0.5, 12.0),
                TimePoint::new(1.0, 11.0)
            ]
        );
    }

    #[test]
    fn test_short_channel_padded_long_channel_truncated() {
        let mut bundle = HistoryBundle::new(vec![1.0, 2.0, 3.0]);
        bundle.insert_channel("short", vec![4.0]);
        bundle.insert_channel("long", vec![1.0, 2.0, 3.0, 4.0, 5.0]);

        assert_eq!(bundle.series("short").unwrap().values(), vec![4.0, 0.0, 0.0]);
        assert_eq!(bundle.series("long").unwrap().values(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_non_finite_values_read_as_zero() {
        let mut bundle = HistoryBundle::new(vec![1.0, 2.0]);
        bundle.insert_channel("cpu_percent", vec![f64::NAN, f64::INFINITY]);

        assert_eq!(bundle.series("cpu_percent").unwrap().values(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_absent_channel_is_none() {
        let bundle = HistoryBundle::new(vec![1.0]);
        assert!(bundle.series("queries").is_none());
        assert!(bundle.matrix("instance_utilization").is_none());
    }

    #[test]
    fn test_matrix_rows_follow_axis() {
        let mut bundle = HistoryBundle::new(vec![1.0, 2.0, 3.0]);
        bundle.insert_matrix("instance_utilization", vec![vec![50.0, 60.0], vec![70.0]]);

        let matrix = bundle.matrix("instance_utilization").unwrap();

        assert_eq!(matrix.len(), 3);
        assert_eq!(matrix.points()[1].values, vec![70.0]);
        assert!(matrix.points()[2].values.is_empty());
        assert_eq!(matrix.points()[2].time_s, 3.0);
    }

    #[test]
    fn test_channel_kinds_replace_each_other() {
        let mut bundle = HistoryBundle::new(vec![1.0]);
        bundle.insert_matrix("instance_idle", vec![vec![1.0]]);
        bundle.insert_channel("instance_idle", vec![2.0]);

        assert!(bundle.matrix("instance_idle").is_none());
        assert_eq!(bundle.series("instance_idle").unwrap().values(), vec![2.0]);
    }
}

use serde::Serialize;

/// Name of the catch-all bucket that absorbs every stage outside the top N
pub const OTHER_STAGE: &str = "other";

/// Label used when the catch-all bucket is synthesized by the reducer
pub const OTHER_LABEL: &str = "Other";

/// Share of total request latency attributed to one processing stage
#[derive(Debug, Clone, PartialEq)]
pub struct StageMetric {
    /// Stable identifier, e.g. `tokenize`
    pub name: String,
    /// Human readable label, e.g. `Tokenize`
    pub label: String,
    /// Non-negative percentage of total latency
    pub percentage: f64,
}

impl StageMetric {
    /// Creates a stage metric, coercing negative or non-finite percentages to 0
    pub fn new(name: impl Into<String>, label: impl Into<String>, percentage: f64) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            percentage: coerce_percentage(percentage),
        }
    }
}

/// Stage percentages for one snapshot, unique by name, in insertion order.
///
/// Insertion order matters: the reducer breaks ties between equal
/// percentages in favour of the stage that was inserted first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageSet {
    stages: Vec<StageMetric>,
}

impl StageSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a stage, or replaces the percentage and label of an existing
    /// stage with the same name while keeping its original position.
    pub fn insert(&mut self, metric: StageMetric) {
        match self.stages.iter_mut().find(|s| s.name == metric.name) {
            Some(existing) => *existing = metric,
            None => self.stages.push(metric),
        }
    }

    /// Looks up a stage by name
    pub fn get(&self, name: &str) -> Option<&StageMetric> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Iterates stages in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &StageMetric> {
        self.stages.iter()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl FromIterator<StageMetric> for StageSet {
    fn from_iter<I: IntoIterator<Item = StageMetric>>(iter: I) -> Self {
        let mut set = StageSet::new();
        for metric in iter {
            set.insert(metric);
        }
        set
    }
}

/// Builds a set from `(name, percentage)` pairs, using the name as the label
impl<N: Into<String>> FromIterator<(N, f64)> for StageSet {
    fn from_iter<I: IntoIterator<Item = (N, f64)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(name, percentage)| {
                let name = name.into();
                StageMetric::new(name.clone(), name, percentage)
            })
            .collect()
    }
}

/// One display-ready entry of a normalized stage breakdown
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayBucket {
    pub name: String,
    pub label: String,
    /// Percentage as reported by the metrics source, unscaled
    pub raw_percentage: f64,
    /// Percentage rescaled so that all buckets of one breakdown sum to 100
    pub normalized_percentage: f64,
    /// 0-based position in the breakdown
    pub rank: usize,
}

impl DisplayBucket {
    /// Whether this is the catch-all bucket
    pub fn is_other(&self) -> bool {
        self.name == OTHER_STAGE
    }
}

fn coerce_percentage(percentage: f64) -> f64 {
    if percentage.is_finite() && percentage > 0.0 {
        percentage
    } else {
        0.0
    }
}

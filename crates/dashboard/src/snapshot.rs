use anyhow::{anyhow, Context, Result};
use breakdown::{HistoryBundle, StageMetric, StageSet};
use serde_json::{Map, Value};

use crate::config::DashboardConfig;

const DEFAULT_EXPERIMENT_NAME: &str = "ML Inference Dashboard";
const DEFAULT_EXPERIMENT_DESCRIPTION: &str = "Real-time Stage Breakdown";

/// One polled metrics snapshot, decoded against a dashboard profile
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub experiment_name: String,
    pub experiment_description: String,
    pub is_running: bool,
    /// Recognized stages in profile order; missing stages read as 0
    pub stages: StageSet,
    pub history: HistoryBundle,
}

impl Snapshot {
    /// Decodes a snapshot document.
    ///
    /// Only a document that is not a JSON object is rejected. Missing or
    /// non-numeric fields inside it degrade to zero or empty values.
    pub fn decode(text: &str, config: &DashboardConfig) -> Result<Self> {
        let value: Value = serde_json::from_str(text).context("Failed to parse metrics snapshot")?;
        let root = value
            .as_object()
            .ok_or_else(|| anyhow!("Metrics snapshot is not a JSON object"))?;

        Ok(Self {
            experiment_name: string_field(root, "experiment_name", DEFAULT_EXPERIMENT_NAME),
            experiment_description: string_field(
                root,
                "experiment_description",
                DEFAULT_EXPERIMENT_DESCRIPTION,
            ),
            is_running: root
                .get("is_running")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            stages: decode_stages(root.get("stage_percentages"), config),
            history: decode_history(root.get("history"), config),
        })
    }
}

fn string_field(root: &Map<String, Value>, key: &str, default: &str) -> String {
    root.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
        .to_string()
}

fn decode_stages(percentages: Option<&Value>, config: &DashboardConfig) -> StageSet {
    config
        .stages
        .iter()
        .map(|spec| {
            let percentage = percentages
                .and_then(|p| p.get(&spec.key))
                .map(number_or_zero)
                .unwrap_or(0.0);
            StageMetric::new(spec.name.as_str(), spec.label.as_str(), percentage)
        })
        .collect()
}

fn decode_history(history: Option<&Value>, config: &DashboardConfig) -> HistoryBundle {
    let Some(history) = history.and_then(Value::as_object) else {
        return HistoryBundle::default();
    };

    let timestamps = history
        .get("timestamps")
        .map(number_array)
        .unwrap_or_default();
    let mut bundle = HistoryBundle::new(timestamps);

    for channel in config.chart_channels() {
        if let Some(values) = history.get(channel).filter(|v| v.is_array()) {
            bundle.insert_channel(channel, number_array(values));
        }
    }

    for channel in config.instance_channels() {
        if let Some(rows) = history.get(channel).and_then(Value::as_array) {
            bundle.insert_matrix(channel, rows.iter().map(number_array).collect());
        }
    }

    if let Some(names) = history.get("instance_names").and_then(Value::as_array) {
        bundle.set_instance_names(
            names
                .iter()
                .map(|n| n.as_str().map(str::to_string).unwrap_or_else(|| n.to_string()))
                .collect(),
        );
    }

    bundle
}

fn number_or_zero(value: &Value) -> f64 {
    value.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// Reads an array of numbers; non-numeric elements become 0 and a
/// non-array value becomes an empty array
fn number_array(value: &Value) -> Vec<f64> {
    value
        .as_array()
        .map(|items| items.iter().map(number_or_zero).collect())
        .unwrap_or_default()
}

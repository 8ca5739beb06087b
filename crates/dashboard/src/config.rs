use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use breakdown::{StageBreakdownReducer, DEFAULT_MAX_VISIBLE};
use serde::{Deserialize, Serialize};

/// A latency stage recognized in `stage_percentages`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    /// Key in the snapshot, e.g. `tokenize_pct`
    pub key: String,
    /// Bucket name, e.g. `tokenize`
    pub name: String,
    pub label: String,
}

/// A chart fed from one history channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    /// Chart identifier in rendered frames
    pub key: String,
    /// History channel the chart reads
    pub channel: String,
    #[serde(default)]
    pub title: String,
}

/// Built-in dashboard layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Profile {
    /// Pipeline server: queue-separated stages, eleven charts, per-instance charts
    Full,
    /// Single-process server: tokenize/inference/other, seven charts
    Basic,
}

/// Which stages and channels one dashboard variant recognizes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_max_visible")]
    pub max_visible: usize,
    pub stages: Vec<StageSpec>,
    pub charts: Vec<ChartSpec>,
    /// Multi-instance charts, shown only when more than one instance reports
    #[serde(default)]
    pub instance_charts: Vec<ChartSpec>,
}

fn default_max_visible() -> usize {
    DEFAULT_MAX_VISIBLE
}

fn stage(key: &str, label: &str) -> StageSpec {
    StageSpec {
        key: key.to_string(),
        name: key.trim_end_matches("_pct").to_string(),
        label: label.to_string(),
    }
}

fn chart(key: &str, channel: &str, title: &str) -> ChartSpec {
    ChartSpec {
        key: key.to_string(),
        channel: channel.to_string(),
        title: title.to_string(),
    }
}

impl DashboardConfig {
    pub fn from_profile(profile: Profile) -> Self {
        match profile {
            Profile::Full => Self::full(),
            Profile::Basic => Self::basic(),
        }
    }

    fn full() -> Self {
        Self {
            max_visible: DEFAULT_MAX_VISIBLE,
            stages: vec![
                stage("tokenize_pct", "Tokenize"),
                stage("tokenizer_queue_wait_pct", "Tokenizer Queue Wait"),
                stage("model_queue_wait_pct", "Model Queue Wait"),
                stage("queue_wait_pct", "Queue Wait"),
                stage("inference_pct", "Inference"),
                stage("overhead_pct", "Overhead"),
                stage("mp_queue_send_pct", "MP Queue Send"),
                stage("mp_queue_receive_pct", "MP Queue Receive"),
                stage("grpc_serialize_pct", "gRPC Serialize"),
                stage("grpc_deserialize_pct", "gRPC Deserialize"),
                stage("scheduler_pct", "Scheduler"),
                stage("other_pct", "Other"),
            ],
            charts: vec![
                chart("latency", "latencies", "Latency (ms)"),
                chart("throughput", "throughput", "Throughput (q/s)"),
                chart("queue", "queue_wait_ms", "Queue Wait (ms)"),
                chart("tokenize", "tokenize_ms", "Tokenize (ms)"),
                chart("inference", "inference_ms", "Inference (ms)"),
                chart("cpu", "cpu_percent", "CPU (%)"),
                chart("gpu", "gpu_memory_mb", "GPU Memory (MB)"),
                chart("queries", "queries", "Queries"),
                chart("padding", "padding_pct", "Padding (%)"),
                chart("utilization", "gpu_utilization_pct", "GPU Utilization (%)"),
                chart("overhead", "overhead_ms", "Overhead (ms)"),
            ],
            instance_charts: vec![
                chart("instance_util", "instance_utilization", "Instance Utilization (%)"),
                chart("instance_idle", "instance_idle", "Instance Idle Time"),
            ],
        }
    }

    fn basic() -> Self {
        Self {
            max_visible: DEFAULT_MAX_VISIBLE,
            stages: vec![
                stage("tokenize_pct", "Tokenize"),
                stage("inference_pct", "Inference"),
                stage("other_pct", "Other"),
            ],
            charts: vec![
                chart("latency", "latencies", "Latency (ms)"),
                chart("throughput", "throughput", "Throughput (q/s)"),
                chart("tokenize", "tokenize_ms", "Tokenize (ms)"),
                chart("inference", "inference_ms", "Inference (ms)"),
                chart("cpu", "cpu_percent", "CPU (%)"),
                chart("gpu", "gpu_memory_mb", "GPU Memory (MB)"),
                chart("queries", "queries", "Queries"),
            ],
            instance_charts: Vec::new(),
        }
    }

    /// Picks the profile for a run: the JSON file when given, the built-in
    /// profile otherwise, then applies the `max_visible` override.
    ///
    /// The override is not validated here; `FrameBuilder::new` rejects 0.
    pub fn resolve(
        profile: Profile,
        profile_file: Option<&Path>,
        max_visible: Option<usize>,
    ) -> Result<Self> {
        let mut config = match profile_file {
            Some(path) => Self::load(path)?,
            None => Self::from_profile(profile),
        };
        if let Some(max_visible) = max_visible {
            log::debug!("Overriding max_visible {} -> {}", config.max_visible, max_visible);
            config.max_visible = max_visible;
        }
        Ok(config)
    }

    /// Loads and validates a profile from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse profile file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the profile can drive a dashboard
    pub fn validate(&self) -> Result<()> {
        if self.max_visible == 0 {
            bail!("max_visible must be at least 1");
        }

        let mut stage_keys = HashSet::new();
        for spec in &self.stages {
            if !stage_keys.insert(spec.key.as_str()) {
                bail!("Duplicate stage key: {}", spec.key);
            }
        }

        let mut chart_keys = HashSet::new();
        for spec in self.charts.iter().chain(&self.instance_charts) {
            if !chart_keys.insert(spec.key.as_str()) {
                bail!("Duplicate chart key: {}", spec.key);
            }
        }

        Ok(())
    }

    pub fn reducer(&self) -> Result<StageBreakdownReducer> {
        StageBreakdownReducer::new(self.max_visible).context("Invalid stage breakdown settings")
    }

    pub fn chart_channels(&self) -> Vec<&str> {
        self.charts.iter().map(|c| c.channel.as_str()).collect()
    }

    pub fn instance_channels(&self) -> Vec<&str> {
        self.instance_charts.iter().map(|c| c.channel.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameBuilder;
    use rstest::rstest;

    #[rstest]
    #[case(Profile::Full, 12, 11, 2)]
    #[case(Profile::Basic, 3, 7, 0)]
    fn test_builtin_profiles(
        #[case] profile: Profile,
        #[case] stages: usize,
        #[case] charts: usize,
        #[case] instance_charts: usize,
    ) {
        let config = DashboardConfig::from_profile(profile);

        assert!(config.validate().is_ok());
        assert_eq!(config.max_visible, 3);
        assert_eq!(config.stages.len(), stages);
        assert_eq!(config.charts.len(), charts);
        assert_eq!(config.instance_charts.len(), instance_charts);
    }

    #[test]
    fn test_stage_names_drop_pct_suffix() {
        let config = DashboardConfig::from_profile(Profile::Full);
        let other = config.stages.iter().find(|s| s.key == "other_pct").unwrap();
        assert_eq!(other.name, "other");
        assert_eq!(config.stages[0].name, "tokenize");
    }

    #[test]
    fn test_zero_max_visible_rejected() {
        let mut config = DashboardConfig::from_profile(Profile::Basic);
        config.max_visible = 0;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_visible"));
        assert!(config.reducer().is_err());
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let mut config = DashboardConfig::from_profile(Profile::Basic);
        config.stages.push(stage("tokenize_pct", "Tokenize again"));
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("Duplicate stage key: tokenize_pct"));

        let mut config = DashboardConfig::from_profile(Profile::Full);
        config
            .instance_charts
            .push(chart("latency", "instance_latency", "Latency"));
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("Duplicate chart key: latency"));
    }

    #[test]
    fn test_profile_from_json_defaults() {
        let json = r#"{
            "stages": [{"key": "tokenize_pct", "name": "tokenize", "label": "Tokenize"}],
            "charts": [{"key": "latency", "channel": "latencies"}]
        }"#;

        let config: DashboardConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.max_visible, DEFAULT_MAX_VISIBLE);
        assert!(config.instance_charts.is_empty());
        assert_eq!(config.charts[0].title, "");
        assert_eq!(config.chart_channels(), ["latencies"]);
    }

    #[test]
    fn test_load_missing_file() {
        let err = DashboardConfig::load(Path::new("/nonexistent/profile.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read profile file"));
    }

    #[rstest]
    #[case(Profile::Full, None, 3)]
    #[case(Profile::Full, Some(5), 5)]
    #[case(Profile::Basic, Some(1), 1)]
    fn test_resolve_applies_max_visible_override(
        #[case] profile: Profile,
        #[case] max_visible: Option<usize>,
        #[case] expected: usize,
    ) {
        let config = DashboardConfig::resolve(profile, None, max_visible).unwrap();

        assert_eq!(config.max_visible, expected);
        assert_eq!(
            FrameBuilder::new(config).unwrap().config().max_visible,
            expected
        );
    }

    #[test]
    fn test_resolve_zero_override_rejected_by_builder() {
        let config = DashboardConfig::resolve(Profile::Basic, None, Some(0)).unwrap();

        let err = FrameBuilder::new(config).err().unwrap();
        assert!(err.to_string().contains("max_visible must be at least 1"));
    }

    #[test]
    fn test_resolve_prefers_profile_file() {
        let path = std::env::temp_dir().join(format!("dashboard-profile-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{"max_visible": 2, "stages": [], "charts": [{"key": "latency", "channel": "latencies"}]}"#,
        )
        .unwrap();

        let config = DashboardConfig::resolve(Profile::Full, Some(&path), Some(4)).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert!(config.stages.is_empty());
        assert_eq!(config.chart_channels(), ["latencies"]);
        assert_eq!(config.max_visible, 4);
    }

    #[test]
    fn test_resolve_missing_profile_file() {
        let err = DashboardConfig::resolve(
            Profile::Full,
            Some(Path::new("/nonexistent/profile.json")),
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Failed to read profile file"));
    }
}

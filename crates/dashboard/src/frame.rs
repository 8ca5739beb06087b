use anyhow::Result;
use breakdown::{ChartSeries, DisplayBucket, InstanceChartSeries, SeriesAligner, StageBreakdownReducer};
use serde::Serialize;

use crate::config::DashboardConfig;
use crate::snapshot::Snapshot;

/// Data for one single-line chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chart {
    pub key: String,
    pub title: String,
    #[serde(flatten)]
    pub series: ChartSeries,
}

/// Data for one multi-instance chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceChart {
    pub key: String,
    pub title: String,
    #[serde(flatten)]
    pub series: InstanceChartSeries,
}

/// Everything the renderer needs for one refresh, derived from one snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub experiment_name: String,
    pub experiment_description: String,
    pub is_running: bool,
    pub breakdown: Vec<DisplayBucket>,
    pub charts: Vec<Chart>,
    pub instance_charts: Vec<InstanceChart>,
}

/// Builds frames for one dashboard profile
pub struct FrameBuilder {
    config: DashboardConfig,
    reducer: StageBreakdownReducer,
    aligner: SeriesAligner,
}

impl FrameBuilder {
    pub fn new(config: DashboardConfig) -> Result<Self> {
        config.validate()?;
        let reducer = config.reducer()?;
        Ok(Self {
            config,
            reducer,
            aligner: SeriesAligner::default(),
        })
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Decodes a snapshot document and builds its frame
    pub fn decode(&self, text: &str) -> Result<Frame> {
        let snapshot = Snapshot::decode(text, &self.config)?;
        Ok(self.build(&snapshot))
    }

    pub fn build(&self, snapshot: &Snapshot) -> Frame {
        let breakdown = self.reducer.reduce(&snapshot.stages);

        let aligned = self
            .aligner
            .align(&snapshot.history, &self.config.chart_channels());
        let charts = self
            .config
            .charts
            .iter()
            .map(|spec| Chart {
                key: spec.key.clone(),
                title: spec.title.clone(),
                series: aligned.chart(&spec.channel),
            })
            .collect();

        let instance_charts = self
            .aligner
            .align_instances(&snapshot.history, &self.config.instance_channels())
            .into_iter()
            .zip(&self.config.instance_charts)
            .map(|((_, series), spec)| InstanceChart {
                key: spec.key.clone(),
                title: spec.title.clone(),
                series,
            })
            .collect();

        Frame {
            experiment_name: snapshot.experiment_name.clone(),
            experiment_description: snapshot.experiment_description.clone(),
            is_running: snapshot.is_running,
            breakdown,
            charts,
            instance_charts,
        }
    }
}

//! Pipeline configuration resolved from the environment.

use std::env;
use std::path::PathBuf;

use crate::features::{FeatureConfig, FeatureLayout, WindowJoin};
use crate::output::OutputPaths;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub orders_file: String,
    pub polling_file: String,
    pub output_dir: PathBuf,
    pub features: FeatureConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("appEventProcessingDataset/dataset"),
            orders_file: "orders.csv".to_string(),
            polling_file: "polling.csv".to_string(),
            output_dir: PathBuf::from("."),
            features: FeatureConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn orders_path(&self) -> PathBuf {
        self.data_dir.join(&self.orders_file)
    }

    pub fn polling_path(&self) -> PathBuf {
        self.data_dir.join(&self.polling_file)
    }

    pub fn output_paths(&self) -> OutputPaths {
        OutputPaths::in_dir(&self.output_dir)
    }
}

pub fn pipeline_config_from_env() -> PipelineConfig {
    let mut config = PipelineConfig::default();

    if let Some(dir) = non_empty_var("POLLING_FEATURES_DATA_DIR") {
        config.data_dir = PathBuf::from(dir);
    }
    if let Some(file) = non_empty_var("POLLING_FEATURES_ORDERS_FILE") {
        config.orders_file = file;
    }
    if let Some(file) = non_empty_var("POLLING_FEATURES_POLLING_FILE") {
        config.polling_file = file;
    }
    if let Some(dir) = non_empty_var("POLLING_FEATURES_OUTPUT_DIR") {
        config.output_dir = PathBuf::from(dir);
    }
    if let Some(parsed) = non_empty_var("POLLING_FEATURES_WINDOW_JOIN")
        .as_deref()
        .and_then(parse_window_join)
    {
        config.features.window_join = parsed;
    }
    if let Some(parsed) = non_empty_var("POLLING_FEATURES_LAYOUT")
        .as_deref()
        .and_then(parse_layout)
    {
        config.features.layout = parsed;
    }

    config
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

fn parse_window_join(raw: &str) -> Option<WindowJoin> {
    match raw.to_ascii_lowercase().as_str() {
        "inner" => Some(WindowJoin::Inner),
        "outer" => Some(WindowJoin::Outer),
        _ => None,
    }
}

fn parse_layout(raw: &str) -> Option<FeatureLayout> {
    match raw.to_ascii_lowercase().as_str() {
        "wide" => Some(FeatureLayout::Wide),
        "long" => Some(FeatureLayout::Long),
        _ => None,
    }
}

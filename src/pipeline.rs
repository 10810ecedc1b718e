//! End-to-end batch run: load, prepare, label, aggregate, merge, persist.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::aggregate::ORDER_ID;
use crate::config::PipelineConfig;
use crate::features::{merge_features, FeatureError, FeatureLayout, WindowEventCount, WindowJoin};
use crate::loader::{
    add_hour_date_fields, fill_missing_forward_backward, join_polling_with_orders, read_csv_table,
    LoadError, DEVICE_ID,
};
use crate::table::{Table, TableError};
use crate::windows::{label_windows, ORDER_CREATION_TIME, POLLING_CREATION_TIME};

pub const POLLING_RAW_TIME: &str = "creation_time";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to load input: {0}")]
    Load(#[from] LoadError),
    #[error("failed to prepare input: {0}")]
    Prepare(#[from] TableError),
    #[error("failed to build features: {0}")]
    Features(#[from] FeatureError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub orders: u64,
    pub joined_events: u64,
    pub window_events: Vec<WindowEventCount>,
    pub feature_rows: u64,
    pub feature_columns: u64,
    pub layout: FeatureLayout,
    pub window_join: WindowJoin,
    pub schema_fingerprint: String,
    pub input_data_path: PathBuf,
    pub output_data_path: PathBuf,
}

pub fn run_pipeline(cfg: &PipelineConfig) -> Result<RunReport, PipelineError> {
    // Join keys stay text so both files agree on their type.
    let mut orders = read_csv_table(&cfg.orders_path(), &[ORDER_CREATION_TIME], &[DEVICE_ID])?;
    let mut polling = read_csv_table(&cfg.polling_path(), &[POLLING_RAW_TIME], &[DEVICE_ID])?;

    let events = prepare_events(&mut orders, &mut polling)?;
    let outputs = cfg.output_paths();
    let features = merge_features(&orders, &events, &cfg.features, &outputs)?;

    let report = RunReport {
        orders: orders.len() as u64,
        joined_events: events.len() as u64,
        window_events: features.window_events,
        feature_rows: features.table.len() as u64,
        feature_columns: features.table.width() as u64,
        layout: features.schema.layout,
        window_join: features.schema.window_join,
        schema_fingerprint: features.schema.fingerprint,
        input_data_path: outputs.input_data,
        output_data_path: outputs.output_data,
    };

    info!(
        component = "pipeline",
        event = "pipeline.run.finish",
        orders = report.orders,
        joined_events = report.joined_events,
        feature_rows = report.feature_rows
    );

    Ok(report)
}

pub fn prepare_events(orders: &mut Table, polling: &mut Table) -> Result<Table, TableError> {
    orders.require_columns(&[ORDER_ID, ORDER_CREATION_TIME, DEVICE_ID])?;
    fill_missing_forward_backward(orders, DEVICE_ID)?;
    polling.rename_column(POLLING_RAW_TIME, POLLING_CREATION_TIME)?;

    add_hour_date_fields(orders, ORDER_CREATION_TIME)?;
    add_hour_date_fields(polling, POLLING_CREATION_TIME)?;

    let joined = join_polling_with_orders(polling, orders)?;
    label_windows(&joined)
}

//! Merge of the per-window aggregates into one feature table per order.

use std::collections::HashSet;

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};

use crate::aggregate::{aggregate, Facet, ERROR_CODE, ORDER_ID, STATUS_CODE};
use crate::output::{persist_tables, OutputError, OutputPaths};
use crate::relational::{join, join_all, pivot_wider, JoinKind};
use crate::table::{SortOrder, Table, TableError, Value};
use crate::windows::Window;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowJoin {
    Inner,
    Outer,
}

impl WindowJoin {
    fn join_kind(self) -> JoinKind {
        match self {
            Self::Inner => JoinKind::Inner,
            Self::Outer => JoinKind::Outer,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inner => "inner",
            Self::Outer => "outer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureLayout {
    Wide,
    Long,
}

impl FeatureLayout {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wide => "wide",
            Self::Long => "long",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureConfig {
    pub window_join: WindowJoin,
    pub layout: FeatureLayout,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            window_join: WindowJoin::Outer,
            layout: FeatureLayout::Wide,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureSchema {
    pub layout: FeatureLayout,
    pub window_join: WindowJoin,
    pub fingerprint: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowEventCount {
    pub window: &'static str,
    pub events: u64,
    pub orders: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureTable {
    pub table: Table,
    pub schema: FeatureSchema,
    pub window_events: Vec<WindowEventCount>,
}

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("failed to persist feature tables: {0}")]
    Output(#[from] OutputError),
}

pub fn merge_features(
    orders: &Table,
    labeled: &Table,
    cfg: &FeatureConfig,
    outputs: &OutputPaths,
) -> Result<FeatureTable, FeatureError> {
    let features = compute_features(orders, labeled, cfg)?;
    persist_tables(&[
        (outputs.input_data.as_path(), labeled),
        (outputs.output_data.as_path(), &features.table),
    ])?;
    Ok(features)
}

pub fn compute_features(
    orders: &Table,
    labeled: &Table,
    cfg: &FeatureConfig,
) -> Result<FeatureTable, FeatureError> {
    info!(
        component = "features",
        event = "features.merge.start",
        orders = orders.len(),
        events = labeled.len(),
        window_join = cfg.window_join.as_str(),
        layout = cfg.layout.as_str()
    );

    let kind = cfg.window_join.join_kind();

    let total_tables = facet_tables(labeled, Facet::TotalEvents)?;
    let window_events = window_event_counts(&total_tables)?;
    let totals = merge_window_tables(total_tables, Facet::TotalEvents, kind)?;

    let status = merge_window_tables(
        facet_tables(labeled, Facet::StatusCode)?,
        Facet::StatusCode,
        kind,
    )?;

    let errors = merge_window_tables(
        facet_tables(labeled, Facet::ErrorCode)?,
        Facet::ErrorCode,
        kind,
    )?;
    let no_errors = merge_window_tables(
        facet_tables(labeled, Facet::NoErrorCode)?,
        Facet::NoErrorCode,
        kind,
    )?;
    let error_codes = join(&errors, &no_errors, &[ORDER_ID, ERROR_CODE], kind)?;
    warn_on_dropped_keys(
        "error_codes",
        distinct_keys(&[&errors, &no_errors], &[ORDER_ID, ERROR_CODE])?,
        error_codes.len(),
    );

    let (status, error_codes) = match cfg.layout {
        FeatureLayout::Wide => {
            let status_columns = count_columns(&[Facet::StatusCode]);
            let error_columns = count_columns(&[Facet::ErrorCode, Facet::NoErrorCode]);
            (
                pivot_wider(&status, ORDER_ID, STATUS_CODE, &as_strs(&status_columns))?,
                pivot_wider(&error_codes, ORDER_ID, ERROR_CODE, &as_strs(&error_columns))?,
            )
        }
        FeatureLayout::Long => (status, error_codes),
    };

    let base = orders.select(&[ORDER_ID])?;
    let mut table = join_all(
        vec![base, totals, status, error_codes],
        &[ORDER_ID],
        JoinKind::Left,
    )?;
    table.fill_null(&Value::Int(0));
    table.sort_by_columns(&[(ORDER_ID, SortOrder::Ascending)])?;

    let schema = build_feature_schema(cfg, table.columns());

    info!(
        component = "features",
        event = "features.merge.finish",
        rows = table.len(),
        column_count = schema.columns.len(),
        fingerprint = %schema.fingerprint
    );

    Ok(FeatureTable {
        table,
        schema,
        window_events,
    })
}

pub fn build_feature_schema(cfg: &FeatureConfig, columns: &[String]) -> FeatureSchema {
    let mut hasher = Sha256::new();
    hasher.update(format!("layout:{};", cfg.layout.as_str()));
    hasher.update(format!("window_join:{};", cfg.window_join.as_str()));
    hasher.update("columns:");
    for column in columns {
        hasher.update(column.as_bytes());
        hasher.update(";");
    }

    FeatureSchema {
        layout: cfg.layout,
        window_join: cfg.window_join,
        fingerprint: hex::encode(hasher.finalize()),
        columns: columns.to_vec(),
    }
}

fn facet_tables(labeled: &Table, facet: Facet) -> Result<Vec<Table>, TableError> {
    Window::ALL
        .iter()
        .map(|window| aggregate(labeled, *window, facet))
        .collect()
}

fn merge_window_tables(
    tables: Vec<Table>,
    facet: Facet,
    kind: JoinKind,
) -> Result<Table, TableError> {
    let keys = facet.keys();
    let refs: Vec<&Table> = tables.iter().collect();
    let input_keys = distinct_keys(&refs, keys)?;
    let merged = join_all(tables, keys, kind)?;
    warn_on_dropped_keys(facet_name(facet), input_keys, merged.len());
    Ok(merged)
}

fn distinct_keys(tables: &[&Table], keys: &[&str]) -> Result<usize, TableError> {
    let mut seen: HashSet<Vec<Value>> = HashSet::new();
    for table in tables {
        let idx = table.column_indices(keys)?;
        for row in table.rows() {
            seen.insert(idx.iter().map(|&i| row[i].clone()).collect());
        }
    }
    Ok(seen.len())
}

fn warn_on_dropped_keys(merge: &str, input_keys: usize, merged_rows: usize) {
    if merged_rows < input_keys {
        warn!(
            component = "features",
            event = "features.merge.keys_dropped",
            merge,
            input_keys,
            merged_rows,
            dropped = input_keys - merged_rows
        );
    }
}

fn facet_name(facet: Facet) -> &'static str {
    match facet {
        Facet::TotalEvents => "total_events",
        Facet::StatusCode => "status_codes",
        Facet::ErrorCode => "error_codes_per_window",
        Facet::NoErrorCode => "no_error_codes_per_window",
    }
}

fn count_columns(facets: &[Facet]) -> Vec<String> {
    facets
        .iter()
        .flat_map(|facet| Window::ALL.iter().map(|window| facet.count_column(*window)))
        .collect()
}

fn as_strs(columns: &[String]) -> Vec<&str> {
    columns.iter().map(String::as_str).collect()
}

fn window_event_counts(total_tables: &[Table]) -> Result<Vec<WindowEventCount>, TableError> {
    Window::ALL
        .iter()
        .zip(total_tables)
        .map(|(window, table)| {
            let column = Facet::TotalEvents.count_column(*window);
            let events = table
                .column_values(&column)?
                .into_iter()
                .filter_map(Value::as_int)
                .sum::<i64>();
            Ok(WindowEventCount {
                window: window.label(),
                events: u64::try_from(events).unwrap_or_default(),
                orders: table.len() as u64,
            })
        })
        .collect()
}

//! Polling-event features per order.
//!
//! Joins device polling telemetry onto orders and counts events in three
//! windows around each order's creation time:
//! - `pre_3min`: the 3 minutes before creation
//! - `post_3min`: the 3 minutes after creation
//! - `pre_1hr`: the hour before creation
//!
//! Counts are produced per order, per status code, per error code and for
//! responses without an error code, then merged into one feature table.

mod aggregate;
mod config;
mod features;
mod loader;
mod observability;
mod output;
mod pipeline;
mod relational;
mod table;
mod windows;

pub use aggregate::{
    aggregate, count_in_window, error_code_count, no_error_code_count, no_error_code_rows,
    status_code_count, total_event_count, Facet, ERROR_CODE, NO_ERROR_SENTINEL, ORDER_ID,
    STATUS_CODE,
};
pub use config::{pipeline_config_from_env, PipelineConfig};
pub use features::{
    build_feature_schema, compute_features, merge_features, FeatureConfig, FeatureError,
    FeatureLayout, FeatureSchema, FeatureTable, WindowEventCount, WindowJoin,
};
pub use loader::{
    add_hour_date_fields, fill_missing_forward_backward, join_polling_with_orders,
    parse_csv_table, parse_timestamp, read_csv_table, LoadError, DATE, DEVICE_ID, HOUR,
};
pub use observability::{
    init_logging, log_app_finish, log_app_start, logging_config_from_env, LogFormat,
    LoggingConfig, LoggingInitError,
};
pub use output::{
    persist_tables, table_to_csv_bytes, write_csv, OutputError, OutputPaths, INPUT_DATA_FILE,
    OUTPUT_DATA_FILE,
};
pub use pipeline::{prepare_events, run_pipeline, PipelineError, RunReport, POLLING_RAW_TIME};
pub use relational::{group_count, join, join_all, pivot_wider, JoinKind};
pub use table::{SortOrder, Table, TableError, Value, TIMESTAMP_OUTPUT_FORMAT};
pub use windows::{
    filter_window, label_windows, Direction, Window, ORDER_CREATION_TIME, POLLING_CREATION_TIME,
};

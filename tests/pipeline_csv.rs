use std::fs;
use std::path::Path;

use polling_features::{
    run_pipeline, FeatureConfig, FeatureLayout, LoadError, PipelineConfig, PipelineError,
    WindowJoin,
};
use tempfile::tempdir;

const ORDERS_CSV: &str = "\
,order_id,device_id,order_creation_time
0,1,dev-1,2024-01-01 10:10:00
1,2,,2024-01-01 10:40:00
2,3,dev-2,2024-01-01 12:00:00
";

const POLLING_CSV: &str = "\
,device_id,creation_time,status_code,error_code
0,dev-1,2024-01-01 10:08:00,200,
1,dev-1,2024-01-01 10:12:00,500,E1
2,dev-1,2024-01-01 10:39:00,200,
3,dev-1,2024-01-01 10:41:30,404,E2
4,dev-2,2024-01-01 13:00:00,200,
";

fn config_in(dir: &Path) -> PipelineConfig {
    fs::write(dir.join("orders.csv"), ORDERS_CSV).expect("orders fixture should be written");
    fs::write(dir.join("polling.csv"), POLLING_CSV).expect("polling fixture should be written");
    PipelineConfig {
        data_dir: dir.to_path_buf(),
        output_dir: dir.join("out"),
        ..PipelineConfig::default()
    }
}

#[test]
fn run_writes_wide_features_for_every_order() {
    let dir = tempdir().expect("temp dir should be created");
    let cfg = config_in(dir.path());
    fs::create_dir_all(&cfg.output_dir).expect("output dir should be created");

    let report = run_pipeline(&cfg).expect("pipeline should succeed");

    assert_eq!(report.orders, 3);
    // The dev-2 event falls in hour 13 and never meets its order.
    assert_eq!(report.joined_events, 8);
    assert_eq!(report.feature_rows, 3);
    assert_eq!(report.feature_columns, 14);
    assert_eq!(report.layout, FeatureLayout::Wide);
    assert_eq!(report.window_join, WindowJoin::Outer);
    assert_eq!(report.schema_fingerprint.len(), 64);

    let output = fs::read_to_string(&report.output_data_path).expect("output should exist");
    let expected = "\
order_id,total_polling_event_pre_3min,total_polling_event_post_3min,total_polling_event_pre_1hr,\
status_code_count_pre_3min_200,status_code_count_post_3min_404,status_code_count_post_3min_500,\
status_code_count_pre_1hr_200,status_code_count_pre_1hr_500,error_code_count_post_3min_E1,\
error_code_count_post_3min_E2,error_code_count_pre_1hr_E1,\
no_error_code_count_pre_3min_NOERRORRESPONSE,no_error_code_count_pre_1hr_NOERRORRESPONSE
1,1,1,1,1,0,1,1,0,1,0,0,1,1
2,1,1,3,1,1,0,2,1,0,1,1,1,2
3,0,0,0,0,0,0,0,0,0,0,0,0,0
";
    assert_eq!(output, expected);

    let dump = fs::read_to_string(&report.input_data_path).expect("input dump should exist");
    let mut lines = dump.lines();
    assert_eq!(
        lines.next(),
        Some(
            "device_id,polling_creation_time,status_code,error_code,hour,date,order_id,\
order_creation_time,three_minutes_b4_order_creation_time,\
three_minutes_after_order_creation_time,one_hour_before_order_creation_time"
        )
    );
    assert_eq!(
        lines.next(),
        Some(
            "dev-1,2024-01-01 10:08:00,200,,10,2024-01-01,1,2024-01-01 10:10:00,\
2024-01-01 10:07:00,2024-01-01 10:13:00,2024-01-01 09:10:00"
        )
    );
    assert_eq!(lines.count(), 7);
}

#[test]
fn window_counts_are_reported_per_window() {
    let dir = tempdir().expect("temp dir should be created");
    let cfg = config_in(dir.path());
    fs::create_dir_all(&cfg.output_dir).expect("output dir should be created");

    let report = run_pipeline(&cfg).expect("pipeline should succeed");
    let summary: Vec<(&str, u64, u64)> = report
        .window_events
        .iter()
        .map(|count| (count.window, count.events, count.orders))
        .collect();

    assert_eq!(
        summary,
        vec![("pre_3min", 2, 2), ("post_3min", 2, 2), ("pre_1hr", 4, 2)]
    );
}

#[test]
fn long_layout_with_inner_merges_reproduces_legacy_shape() {
    let dir = tempdir().expect("temp dir should be created");
    let mut cfg = config_in(dir.path());
    cfg.features = FeatureConfig {
        window_join: WindowJoin::Inner,
        layout: FeatureLayout::Long,
    };
    fs::create_dir_all(&cfg.output_dir).expect("output dir should be created");

    let report = run_pipeline(&cfg).expect("pipeline should succeed");
    let output = fs::read_to_string(&report.output_data_path).expect("output should exist");
    let header = output.lines().next().expect("header should exist");

    assert_eq!(
        header,
        "order_id,total_polling_event_pre_3min,total_polling_event_post_3min,\
total_polling_event_pre_1hr,status_code,status_code_count_pre_3min,\
status_code_count_post_3min,status_code_count_pre_1hr,error_code,\
error_code_count_pre_3min,error_code_count_post_3min,error_code_count_pre_1hr,\
no_error_code_count_pre_3min,no_error_code_count_post_3min,no_error_code_count_pre_1hr"
    );
    // Every order keeps exactly one row once the code-level merges come back empty.
    assert_eq!(report.feature_rows, 3);
}

#[test]
fn missing_polling_file_is_an_open_error() {
    let dir = tempdir().expect("temp dir should be created");
    fs::write(dir.path().join("orders.csv"), ORDERS_CSV).expect("orders fixture should be written");
    let cfg = PipelineConfig {
        data_dir: dir.path().to_path_buf(),
        output_dir: dir.path().to_path_buf(),
        ..PipelineConfig::default()
    };

    let err = run_pipeline(&cfg).expect_err("missing polling.csv should fail");

    assert!(matches!(err, PipelineError::Load(LoadError::Open { .. })));
    assert!(!dir.path().join("output_data.csv").exists());
}

#[test]
fn orders_without_device_id_column_fail_before_writing() {
    let dir = tempdir().expect("temp dir should be created");
    fs::write(
        dir.path().join("orders.csv"),
        "order_id,order_creation_time\n1,2024-01-01 10:00:00\n",
    )
    .expect("orders fixture should be written");
    fs::write(dir.path().join("polling.csv"), POLLING_CSV).expect("polling fixture should be written");
    let cfg = PipelineConfig {
        data_dir: dir.path().to_path_buf(),
        output_dir: dir.path().to_path_buf(),
        ..PipelineConfig::default()
    };

    let err = run_pipeline(&cfg).expect_err("missing device_id should fail");

    assert!(matches!(err, PipelineError::Prepare(_)));
    assert!(!dir.path().join("input_data.csv").exists());
}

#[test]
fn numeric_device_ids_join_when_the_other_file_has_text_ids() {
    let dir = tempdir().expect("temp dir should be created");
    fs::write(
        dir.path().join("orders.csv"),
        "order_id,device_id,order_creation_time\n1,1001,2024-01-01 10:10:00\n",
    )
    .expect("orders fixture should be written");
    fs::write(
        dir.path().join("polling.csv"),
        "device_id,creation_time,status_code,error_code\n\
         1001,2024-01-01 10:08:00,200,\n\
         abc,2024-01-01 10:09:00,200,\n",
    )
    .expect("polling fixture should be written");
    let cfg = PipelineConfig {
        data_dir: dir.path().to_path_buf(),
        output_dir: dir.path().to_path_buf(),
        ..PipelineConfig::default()
    };

    let report = run_pipeline(&cfg).expect("pipeline should succeed");

    assert_eq!(report.joined_events, 1);
    assert_eq!(report.window_events[0].events, 1);
    let output = fs::read_to_string(&report.output_data_path).expect("output should exist");
    assert_eq!(output.lines().nth(1), Some("1,1,0,1,1,1,1,1"));
}

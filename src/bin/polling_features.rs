use polling_features::{
    init_logging, log_app_finish, log_app_start, logging_config_from_env, pipeline_config_from_env,
    run_pipeline,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;

    let pipeline_cfg = pipeline_config_from_env();
    log_app_start(&logging_cfg, &pipeline_cfg);

    let report = run_pipeline(&pipeline_cfg)?;
    log_app_finish(&report);

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

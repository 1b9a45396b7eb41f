use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn};

use crate::config::Config;
use crate::pipeline::parser::{load_step_file, validate_step, StepFile};
use crate::plugins::{initialize_task_plugin, AckFn, TaskPlugin};
use crate::task::StepTask;
use crate::util::generate_job_name;

/// Public entry used by main.rs
pub async fn run_step_file(path: &Path, config: &Config) -> anyhow::Result<StepTask> {
    let f = load_step_file(path)?;
    validate_step(&f)?;

    // Ctrl+C cancels the running step
    let ctx = CancellationToken::new();
    {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            eprintln!("Received Ctrl+C, cancelling step");
            ctx.cancel();
        });
    }

    let file_name = path.to_string_lossy().to_string();
    run_step(&f, &file_name, config, ctx).await
}

/// Drive one step through the full plugin lifecycle and return its final record.
pub async fn run_step(
    f: &StepFile,
    file_name: &str,
    config: &Config,
    ctx: CancellationToken,
) -> anyhow::Result<StepTask> {
    let task_type = f.step_type()?;
    let mut plugin = initialize_task_plugin(task_type, config);
    plugin
        .set_task(f.step.clone())
        .with_context(|| format!("failed to decode {} step from {}", task_type, file_name))?;
    plugin.set_ack_func(log_ack());

    let job_name = f
        .job_name
        .clone()
        .unwrap_or_else(|| generate_job_name(task_type.as_str()));
    let span = info_span!("step", job = %job_name, kind = %task_type);
    plugin.init(&job_name, file_name, span);

    if !plugin.is_task_enabled() {
        info!("Step {} is disabled, skipping", job_name);
        return Ok(plugin.get_task());
    }

    let service_name = f.service_name();
    info!("Starting step: {} ({})", job_name, task_type);

    plugin.set_start_time();
    plugin.run(&ctx, &f.pipeline_task, &f.pipeline_ctx, service_name).await;
    plugin.wait(&ctx).await;
    plugin.complete(&ctx, &f.pipeline_task, service_name).await;
    plugin.set_end_time();

    let result = plugin.get_task();
    if plugin.is_task_failed() {
        warn!("Step {} finished as {}: {}", job_name, result.status(), result.error());
    } else {
        info!("Step {} finished as {}", job_name, result.status());
    }
    Ok(result)
}

/// Ack hook for a standalone run: there is no store, so snapshots are logged.
fn log_ack() -> AckFn {
    Arc::new(|snapshot: StepTask| match serde_json::to_string(&snapshot) {
        Ok(json) => debug!("ack {}", json),
        Err(e) => warn!("failed to encode ack snapshot: {}", e),
    })
}

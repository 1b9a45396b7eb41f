use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

use crate::config::Config;
use crate::plugins::{initialize_task_plugin, TaskType};
use crate::task::{PipelineCtx, PipelineTask};

/// One step plus the pipeline task it belongs to, as written in a YAML file.
///
/// `step` stays untyped; the plugin projects it when the step is loaded.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StepFile {
    #[serde(default)]
    pub job_name: Option<String>,
    pub pipeline_task: PipelineTask,
    #[serde(default)]
    pub pipeline_ctx: PipelineCtx,
    #[serde(default)]
    pub service_name: Option<String>,
    pub step: Map<String, Value>,
}

impl StepFile {
    pub fn step_type(&self) -> anyhow::Result<TaskType> {
        let raw = self
            .step
            .get("type")
            .and_then(Value::as_str)
            .context("step has no 'type'")?;
        TaskType::parse(raw).with_context(|| format!("unknown step type '{}'", raw))
    }

    /// Service the step acts on; falls back to the pipeline task's service.
    pub fn service_name(&self) -> &str {
        self.service_name
            .as_deref()
            .unwrap_or(&self.pipeline_task.service_name)
    }
}

/// Load YAML file into StepFile
pub fn load_step_file(path: &Path) -> anyhow::Result<StepFile> {
    let content = std::fs::read_to_string(path).with_context(|| format!("failed to read {:?}", path))?;
    let f: StepFile = serde_yaml::from_str(&content).with_context(|| format!("failed to parse YAML {:?}", path))?;
    Ok(f)
}

/// Validate: known step type, payload projects onto the typed record
pub fn validate_step(f: &StepFile) -> anyhow::Result<()> {
    let task_type = f.step_type()?;
    let mut plugin = initialize_task_plugin(task_type, &Config::default());
    plugin
        .set_task(f.step.clone())
        .with_context(|| format!("invalid {} step", task_type))?;
    if f.pipeline_task.pipeline_name.is_empty() {
        anyhow::bail!("pipeline_task.pipeline_name is empty");
    }
    Ok(())
}

/// Helper: validate step file path (for main)
pub fn validate_step_file(path: &Path) -> anyhow::Result<()> {
    let f = load_step_file(path)?;
    validate_step(&f)?;
    println!(
        "Step '{}' validated",
        f.job_name.clone().unwrap_or_else(|| "<unnamed>".to_string())
    );
    Ok(())
}

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Span;

use crate::config::Config;
use crate::errors::DecodeError;
use crate::task::{PipelineCtx, PipelineTask, Status, StepTask};
use crate::taskplugin::TriggerTaskPlugin;

pub use crate::task::TaskType;

/// Persistence hook registered by the engine; receives a snapshot of the step record.
pub type AckFn = Arc<dyn Fn(StepTask) + Send + Sync>;

/// Capabilities the engine drives on every step plugin.
///
/// Call order is `set_task`, `init`, `set_start_time`, `run`, `wait`,
/// `complete`, `set_end_time`. Failures land in the record's status and
/// error; only `set_task` can fail out of band.
#[async_trait]
pub trait TaskPlugin: Send + Sync {
    fn task_type(&self) -> TaskType;

    /// Project an untyped attribute map onto the typed record.
    fn set_task(&mut self, payload: Map<String, Value>) -> Result<(), DecodeError>;

    fn get_task(&self) -> StepTask;

    fn init(&mut self, job_name: &str, file_name: &str, span: Span);

    fn set_ack_func(&mut self, ack: AckFn);

    fn status(&self) -> Status;

    fn set_status(&mut self, status: Status);

    /// Effective timeout in seconds. Memoised after the first call.
    fn task_timeout(&mut self) -> u64;

    async fn run(
        &mut self,
        ctx: &CancellationToken,
        pipeline_task: &PipelineTask,
        pipeline_ctx: &PipelineCtx,
        service_name: &str,
    );

    /// Block until the step is terminal, cancelled or timed out.
    async fn wait(&mut self, ctx: &CancellationToken);

    async fn complete(&mut self, ctx: &CancellationToken, pipeline_task: &PipelineTask, service_name: &str);

    fn set_start_time(&mut self);

    fn set_end_time(&mut self);

    fn is_task_enabled(&self) -> bool;

    fn reset_error(&mut self);

    fn is_task_done(&self) -> bool {
        self.status().is_done()
    }

    fn is_task_failed(&self) -> bool {
        self.status().is_failed()
    }
}

/// Build the plugin that drives steps of `task_type`.
pub fn initialize_task_plugin(task_type: TaskType, config: &Config) -> Box<dyn TaskPlugin> {
    match task_type {
        TaskType::Trigger => Box::new(TriggerTaskPlugin::new(task_type, config)),
    }
}

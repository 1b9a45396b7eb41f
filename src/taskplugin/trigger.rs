use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt::Display;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Span};

use super::callback::{CallbackFetcher, CallbackOutcome, CallbackQuery};
use super::storage::StorageResolver;
use super::webhook::WebhookDispatcher;
use crate::config::Config;
use crate::errors::{DecodeError, FetchError};
use crate::plugins::{AckFn, TaskPlugin};
use crate::task::{
    CallbackPayloadObj, PipelineCtx, PipelineTask, Status, StepTask, TaskType, Trigger, WebhookPayload,
};
use crate::util::unix_now;

/// Default trigger timeout: one hour, in seconds
pub const TRIGGER_TASK_TIMEOUT: u64 = 60 * 60;
pub const TIMEOUT_ERROR: &str = "timeout";

/// Project an untyped task map onto a [`Trigger`].
pub fn to_trigger_task(payload: Map<String, Value>) -> Result<Trigger, DecodeError> {
    if let Some(found) = payload.get("type") {
        let found = match found {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if TaskType::parse(&found) != Some(TaskType::Trigger) {
            return Err(DecodeError::TypeMismatch {
                expected: TaskType::Trigger.to_string(),
                found,
            });
        }
    }
    Ok(serde_json::from_value(Value::Object(payload))?)
}

/// Posts a workflow webhook and, for callback steps, waits for the peer to
/// report back through the control plane.
pub struct TriggerTaskPlugin {
    name: TaskType,
    job_name: String,
    file_name: String,
    task: Trigger,
    span: Span,
    resolver: StorageResolver,
    dispatcher: WebhookDispatcher,
    fetcher: CallbackFetcher,
    poll_interval: Duration,
    cancel: Option<CancellationToken>,
    callback_query: Option<CallbackQuery>,
    timeout_secs: Option<u64>,
    ack: Option<AckFn>,
}

impl TriggerTaskPlugin {
    pub fn new(task_type: TaskType, config: &Config) -> Self {
        Self {
            name: task_type,
            job_name: String::new(),
            file_name: String::new(),
            task: Trigger::default(),
            span: Span::none(),
            resolver: StorageResolver::from_encoding(config.uri_encoding),
            dispatcher: WebhookDispatcher,
            fetcher: CallbackFetcher::new(config.aslan_address.clone()),
            poll_interval: config.poll_interval,
            cancel: None,
            callback_query: None,
            timeout_secs: None,
            ack: None,
        }
    }

    pub fn with_resolver(mut self, resolver: StorageResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn task(&self) -> &Trigger {
        &self.task
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    fn ack(&self) {
        if let Some(ack) = &self.ack {
            ack(StepTask::Trigger(self.task.clone()));
        }
    }

    fn set_trigger_status_completed(&mut self, status: Status) {
        self.task.task_status = status;
        self.task.end_time = unix_now();
        info!(parent: &self.span, "trigger task {} finished: {}", self.job_name, status);
        self.ack();
    }

    fn fail(&mut self, err: impl Display) {
        error!(parent: &self.span, "trigger task {} failed: {}", self.job_name, err);
        self.task.task_status = Status::Failed;
        self.task.error = err.to_string();
        self.ack();
    }

    /// A terminal status written earlier wins over cancellation.
    fn mark_cancelled(&mut self) {
        if self.task.task_status.is_done() {
            return;
        }
        warn!(parent: &self.span, "trigger task {} cancelled", self.job_name);
        self.task.task_status = Status::Cancelled;
        self.ack();
    }

    fn mark_timeout(&mut self) {
        if self.task.task_status.is_done() {
            return;
        }
        warn!(parent: &self.span, "trigger task {} timed out", self.job_name);
        self.task.task_status = Status::Timeout;
        self.task.error = TIMEOUT_ERROR.to_string();
        self.ack();
    }

    fn apply_callback(&mut self, fetched: Result<CallbackPayloadObj, FetchError>) {
        let obj = match fetched {
            Ok(obj) => obj,
            Err(e) => {
                warn!(parent: &self.span, "callback for {} not available: {}", self.job_name, e);
                return;
            }
        };

        let outcome = CallbackOutcome::of(&obj);
        if outcome == CallbackOutcome::Pending {
            debug!(parent: &self.span, "callback for {} still pending ({:?})", self.job_name, obj.status);
            return;
        }

        self.task.callback_type = obj.kind;
        self.task.callback_payload = obj.payload;
        match outcome {
            CallbackOutcome::Passed => self.set_trigger_status_completed(Status::Passed),
            CallbackOutcome::Failed(message) => {
                self.task.error = message;
                self.set_trigger_status_completed(Status::Failed);
            }
            CallbackOutcome::Pending => {}
        }
    }
}

#[async_trait]
impl TaskPlugin for TriggerTaskPlugin {
    fn task_type(&self) -> TaskType {
        self.name
    }

    fn set_task(&mut self, payload: Map<String, Value>) -> Result<(), DecodeError> {
        self.task = to_trigger_task(payload)?;
        self.timeout_secs = None;
        self.callback_query = None;
        Ok(())
    }

    fn get_task(&self) -> StepTask {
        StepTask::Trigger(self.task.clone())
    }

    fn init(&mut self, job_name: &str, file_name: &str, span: Span) {
        self.job_name = job_name.to_string();
        self.file_name = file_name.to_string();
        self.span = span;
    }

    fn set_ack_func(&mut self, ack: AckFn) {
        self.ack = Some(ack);
    }

    fn status(&self) -> Status {
        self.task.task_status
    }

    fn set_status(&mut self, status: Status) {
        self.task.task_status = status;
    }

    fn task_timeout(&mut self) -> u64 {
        if let Some(secs) = self.timeout_secs {
            return secs;
        }
        let secs = if self.task.timeout == 0 {
            TRIGGER_TASK_TIMEOUT
        } else if self.task.is_restart {
            self.task.timeout
        } else {
            self.task.timeout.saturating_mul(60)
        };
        // persisted form is seconds from here on
        self.task.timeout = secs;
        self.timeout_secs = Some(secs);
        secs
    }

    async fn run(
        &mut self,
        ctx: &CancellationToken,
        pipeline_task: &PipelineTask,
        _pipeline_ctx: &PipelineCtx,
        _service_name: &str,
    ) {
        if self.is_task_done() {
            warn!(parent: &self.span, "trigger task {} already {}, not running again", self.job_name, self.task.task_status);
            return;
        }

        let cancel = ctx.child_token();
        self.cancel = Some(cancel.clone());
        self.task.task_status = Status::Running;
        self.ack();
        info!(parent: &self.span, "started trigger task {}", self.job_name);

        let resolved = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            res = self.resolver.artifact_path(pipeline_task) => Some(res),
        };
        let artifact_path = match resolved {
            None => return self.mark_cancelled(),
            Some(Err(e)) => return self.fail(e),
            Some(Ok(path)) => path,
        };
        info!(parent: &self.span, "artifact path: {}", artifact_path);

        let payload = WebhookPayload::for_artifact(pipeline_task, &artifact_path);
        let dispatched = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            res = self.dispatcher.dispatch(&self.task.url, &self.task.path, &payload) => Some(res),
        };
        match dispatched {
            None => self.mark_cancelled(),
            Some(Err(e)) => self.fail(e),
            Some(Ok(())) if !self.task.is_callback => {
                self.set_trigger_status_completed(Status::Passed);
            }
            Some(Ok(())) => {
                info!(parent: &self.span, "webhook delivered, waiting for callback of {}", self.job_name);
                self.callback_query = Some(CallbackQuery::from(pipeline_task));
            }
        }
    }

    async fn wait(&mut self, ctx: &CancellationToken) {
        let timeout = Duration::from_secs(self.task_timeout());
        let cancel = self.cancel.take().unwrap_or_else(|| ctx.child_token());
        let _release = cancel.clone().drop_guard();

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);
        let mut ticker = tokio::time::interval(self.poll_interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            if self.is_task_done() {
                break;
            }
            tokio::select! {
                biased;
                _ = ctx.cancelled() => {
                    self.mark_cancelled();
                    break;
                }
                _ = cancel.cancelled() => {
                    self.mark_cancelled();
                    break;
                }
                _ = &mut deadline => {
                    self.mark_timeout();
                    break;
                }
                _ = ticker.tick() => {
                    let Some(query) = self.callback_query.clone() else {
                        continue;
                    };
                    let fetcher = self.fetcher.clone();
                    tokio::select! {
                        biased;
                        _ = ctx.cancelled() => {}
                        _ = cancel.cancelled() => {}
                        _ = &mut deadline => {
                            self.mark_timeout();
                            break;
                        }
                        fetched = fetcher.fetch(&query) => self.apply_callback(fetched),
                    }
                }
            }
        }
        debug!(parent: &self.span, "trigger task {} left wait as {}", self.job_name, self.task.task_status);
    }

    async fn complete(&mut self, _ctx: &CancellationToken, _pipeline_task: &PipelineTask, _service_name: &str) {}

    fn set_start_time(&mut self) {
        self.task.start_time = unix_now();
    }

    fn set_end_time(&mut self) {
        self.task.end_time = unix_now();
    }

    fn is_task_enabled(&self) -> bool {
        self.task.enabled
    }

    fn reset_error(&mut self) {
        self.task.error.clear();
    }
}

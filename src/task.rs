use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const EVENT_NAME_WORKFLOW: &str = "workflow";
pub const OUTPUT_TYPE_OBJECT_STORAGE: &str = "object_storage";

/// Status vocabulary shared with the engine; persisted in lower case.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Created,
    Running,
    Passed,
    Failed,
    Timeout,
    Cancelled,
}

impl Status {
    pub fn is_done(&self) -> bool {
        !matches!(self, Status::Created | Status::Running)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Status::Failed | Status::Timeout | Status::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Created => "created",
            Status::Running => "running",
            Status::Passed => "passed",
            Status::Failed => "failed",
            Status::Timeout => "timeout",
            Status::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step kinds the engine knows how to drive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    #[default]
    Trigger,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Trigger => "trigger",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "trigger" => Some(TaskType::Trigger),
            _ => None,
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-step record of a webhook trigger.
///
/// `url` and `path` are required when decoding; everything else defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(rename = "type", default)]
    pub task_type: TaskType,
    #[serde(default)]
    pub enabled: bool,
    #[serde(rename = "status", default)]
    pub task_status: Status,
    pub url: String,
    pub path: String,
    #[serde(default)]
    pub is_callback: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub callback_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_payload: Option<CallbackPayload>,
    /// Minutes as authored; seconds once scaled or on restart. 0 means unset.
    #[serde(default)]
    pub timeout: u64,
    #[serde(default)]
    pub is_restart: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(default)]
    pub start_time: i64,
    #[serde(default)]
    pub end_time: i64,
}

/// Snapshot of a step record, tagged by kind through the record's own `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepTask {
    Trigger(Trigger),
}

impl StepTask {
    pub fn task_type(&self) -> TaskType {
        match self {
            StepTask::Trigger(_) => TaskType::Trigger,
        }
    }

    pub fn status(&self) -> Status {
        match self {
            StepTask::Trigger(t) => t.task_status,
        }
    }

    pub fn error(&self) -> &str {
        match self {
            StepTask::Trigger(t) => &t.error,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskArgs {
    #[serde(default)]
    pub build_args: BTreeMap<String, String>,
}

/// The enclosing unit of work a step runs inside.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineTask {
    pub product_name: String,
    pub pipeline_name: String,
    pub task_id: i64,
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub storage_uri: String,
    #[serde(default)]
    pub task_args: TaskArgs,
}

/// Filesystem and docker context of the running pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineCtx {
    #[serde(default)]
    pub workspace: String,
    #[serde(default)]
    pub dist_dir: String,
    #[serde(default)]
    pub docker_host: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutput {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

/// Body of the outbound workflow webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    #[serde(rename = "eventName")]
    pub event_name: String,
    #[serde(rename = "projectName")]
    pub project_name: String,
    #[serde(rename = "taskName")]
    pub task_name: String,
    #[serde(rename = "taskID")]
    pub task_id: i64,
    #[serde(rename = "taskOutput")]
    pub task_output: Vec<TaskOutput>,
    #[serde(rename = "taskEnvs")]
    pub task_envs: BTreeMap<String, String>,
}

impl WebhookPayload {
    pub fn for_artifact(pipeline_task: &PipelineTask, artifact_path: &str) -> Self {
        Self {
            event_name: EVENT_NAME_WORKFLOW.to_string(),
            project_name: pipeline_task.product_name.clone(),
            task_name: pipeline_task.pipeline_name.clone(),
            task_id: pipeline_task.task_id,
            task_output: vec![TaskOutput {
                kind: OUTPUT_TYPE_OBJECT_STORAGE.to_string(),
                value: artifact_path.to_string(),
            }],
            task_envs: pipeline_task.task_args.build_args.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallbackPayload {
    #[serde(rename = "QR_code_URL", default)]
    pub qr_code_url: String,
}

/// Response of the callback endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallbackPayloadObj {
    pub task_name: String,
    pub project_name: String,
    pub task_id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    pub status_message: String,
    pub payload: Option<CallbackPayload>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_sets() {
        assert!(!Status::Created.is_done());
        assert!(!Status::Running.is_done());
        for s in [Status::Passed, Status::Failed, Status::Timeout, Status::Cancelled] {
            assert!(s.is_done(), "{s} should be done");
        }
        assert!(!Status::Passed.is_failed());
        assert!(Status::Cancelled.is_failed());
        assert_eq!(serde_json::to_value(Status::Cancelled).unwrap(), json!("cancelled"));
    }

    #[test]
    fn webhook_payload_wire_names() {
        let mut task = PipelineTask {
            product_name: "shop".into(),
            pipeline_name: "shop-build".into(),
            task_id: 42,
            ..Default::default()
        };
        task.task_args.build_args.insert("BRANCH".into(), "main".into());

        let body = serde_json::to_value(WebhookPayload::for_artifact(&task, "minio/a.tar.gz")).unwrap();
        assert_eq!(
            body,
            json!({
                "eventName": "workflow",
                "projectName": "shop",
                "taskName": "shop-build",
                "taskID": 42,
                "taskOutput": [{"type": "object_storage", "value": "minio/a.tar.gz"}],
                "taskEnvs": {"BRANCH": "main"}
            })
        );
    }

    #[test]
    fn step_task_serialises_as_its_record() {
        let trigger = Trigger {
            url: "http://hook".into(),
            path: "/x".into(),
            ..Default::default()
        };
        let value = serde_json::to_value(StepTask::Trigger(trigger)).unwrap();
        assert_eq!(value["type"], "trigger");
        assert_eq!(value["status"], "created");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn callback_object_tolerates_partial_bodies() {
        let obj: CallbackPayloadObj =
            serde_json::from_value(json!({"status": "passed", "payload": {"QR_code_URL": "https://qr"}}))
                .unwrap();
        assert_eq!(obj.status, "passed");
        assert_eq!(obj.payload.unwrap().qr_code_url, "https://qr");
    }
}

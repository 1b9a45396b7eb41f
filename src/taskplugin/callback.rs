use tracing::debug;

use crate::errors::FetchError;
use crate::task::{CallbackPayloadObj, PipelineTask};
use crate::util::join_url;

pub const CALLBACK_PATH: &str = "/api/";
const FAILURE_FALLBACK_MESSAGE: &str = "callback reported failure";

/// Identifies the pipeline task a callback belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackQuery {
    pub name: String,
    pub task_id: i64,
    pub project_name: String,
}

impl From<&PipelineTask> for CallbackQuery {
    fn from(task: &PipelineTask) -> Self {
        Self {
            name: task.pipeline_name.clone(),
            task_id: task.task_id,
            project_name: task.product_name.clone(),
        }
    }
}

/// What a fetched callback means for the waiting step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Passed,
    Failed(String),
    Pending,
}

impl CallbackOutcome {
    pub fn of(obj: &CallbackPayloadObj) -> Self {
        match obj.status.trim().to_ascii_lowercase().as_str() {
            "passed" | "success" => CallbackOutcome::Passed,
            "failed" => {
                let message = obj.status_message.trim();
                if message.is_empty() {
                    CallbackOutcome::Failed(FAILURE_FALLBACK_MESSAGE.to_string())
                } else {
                    CallbackOutcome::Failed(message.to_string())
                }
            }
            _ => CallbackOutcome::Pending,
        }
    }
}

/// Reads callback payloads from the control-plane service.
#[derive(Debug, Clone)]
pub struct CallbackFetcher {
    base_url: String,
}

impl CallbackFetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub async fn fetch(&self, query: &CallbackQuery) -> Result<CallbackPayloadObj, FetchError> {
        let url = join_url(&self.base_url, CALLBACK_PATH);
        let task_id = query.task_id.to_string();
        debug!("polling callback {} for {}#{}", url, query.name, task_id);

        let response = reqwest::Client::new()
            .get(&url)
            .query(&[
                ("name", query.name.as_str()),
                ("taskId", task_id.as_str()),
                ("projectName", query.project_name.as_str()),
            ])
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
            });
        }
        response.json().await.map_err(FetchError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn query() -> CallbackQuery {
        CallbackQuery {
            name: "shop-build".into(),
            task_id: 12,
            project_name: "shop".into(),
        }
    }

    #[tokio::test]
    async fn fetches_with_task_identity() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/"))
            .and(query_param("name", "shop-build"))
            .and(query_param("taskId", "12"))
            .and(query_param("projectName", "shop"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "task_name": "shop-build",
                "project_name": "shop",
                "task_id": 12,
                "type": "wechat_callback",
                "status": "passed",
                "payload": {"QR_code_URL": "https://qr.example/1"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let obj = CallbackFetcher::new(server.uri()).fetch(&query()).await.unwrap();
        assert_eq!(obj.kind, "wechat_callback");
        assert_eq!(CallbackOutcome::of(&obj), CallbackOutcome::Passed);
    }

    #[tokio::test]
    async fn missing_callback_is_a_status_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = CallbackFetcher::new(server.uri()).fetch(&query()).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }), "got: {err}");
    }

    #[tokio::test]
    async fn garbage_body_is_a_decode_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = CallbackFetcher::new(server.uri()).fetch(&query()).await.unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)), "got: {err}");
    }

    #[test]
    fn outcomes() {
        let mut obj = CallbackPayloadObj::default();
        assert_eq!(CallbackOutcome::of(&obj), CallbackOutcome::Pending);
        obj.status = "Running".into();
        assert_eq!(CallbackOutcome::of(&obj), CallbackOutcome::Pending);
        obj.status = "failed".into();
        assert_eq!(
            CallbackOutcome::of(&obj),
            CallbackOutcome::Failed("callback reported failure".into())
        );
        obj.status_message = "approval rejected".into();
        assert_eq!(
            CallbackOutcome::of(&obj),
            CallbackOutcome::Failed("approval rejected".into())
        );
    }
}

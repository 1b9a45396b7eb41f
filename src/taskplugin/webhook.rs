use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::errors::DispatchError;
use crate::task::WebhookPayload;
use crate::util::join_url;

pub const EVENT_HEADER: &str = "X-Zadig-Event";
pub const EVENT_HEADER_VALUE: &str = "Workflow";

/// Posts workflow webhooks. Holds no state between calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebhookDispatcher;

impl WebhookDispatcher {
    /// Single attempt; any non-2xx answer is an error.
    pub async fn dispatch(
        &self,
        base_url: &str,
        path: &str,
        payload: &WebhookPayload,
    ) -> Result<(), DispatchError> {
        let body = serde_json::to_vec(payload).map_err(DispatchError::Encode)?;
        let url = join_url(base_url, path);
        debug!("posting workflow webhook to {} ({} bytes)", url, body.len());

        let response = reqwest::Client::new()
            .post(&url)
            .header(EVENT_HEADER, EVENT_HEADER_VALUE)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|source| DispatchError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Status {
                url,
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

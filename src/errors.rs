//! Error types for the trigger plugin and its collaborators.
//!
//! Only [`DecodeError`] crosses the plugin boundary. The others are folded
//! into the step's status and error string by the plugin.

use thiserror::Error;

/// Errors from projecting an untyped task map onto a typed step record.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid task payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("task type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },
}

/// Errors from resolving the encrypted storage URI.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to decrypt storage uri {uri}: {reason}")]
    Decrypt { uri: String, reason: String },
    #[error("failed to parse storage uri {uri}: {reason}")]
    Parse { uri: String, reason: String },
    #[error("storage uri {uri} has no endpoint")]
    MissingEndpoint { uri: String },
}

/// Errors from posting the webhook.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to encode webhook payload: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("webhook request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("webhook {url} responded with HTTP {status}")]
    Status { url: String, status: u16 },
}

/// Errors from polling the callback endpoint. Never fatal on their own.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("callback request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("callback endpoint {url} responded with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("failed to decode callback response: {0}")]
    Decode(#[source] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_names_the_uri() {
        let err = StorageError::MissingEndpoint {
            uri: "s3://ak:***@/bucket".into(),
        };
        assert_eq!(err.to_string(), "storage uri s3://ak:***@/bucket has no endpoint");
    }

    #[test]
    fn type_mismatch_message() {
        let err = DecodeError::TypeMismatch {
            expected: "trigger".into(),
            found: "build".into(),
        };
        assert!(err.to_string().contains("expected trigger, found build"));
    }
}

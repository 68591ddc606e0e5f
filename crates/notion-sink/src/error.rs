//! Notion API error type.

use serde::Deserialize;

/// Errors returned by the Notion API or the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum NotionError {
    /// Non-success status with the API's error object
    #[error("Notion API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// HTTP 429; `retry_after` is the server's hint in seconds
    #[error("Notion API rate limited (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    #[error("Notion request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected Notion response: {0}")]
    UnexpectedResponse(String),
}

/// Error object in a failed Notion response body.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl NotionError {
    /// Build an error from a failed response's status, headers and body.
    pub(crate) fn from_response(status: u16, retry_after: Option<u64>, body: &str) -> Self {
        if status == 429 {
            return NotionError::RateLimited { retry_after };
        }
        match serde_json::from_str::<ApiErrorBody>(body) {
            Ok(parsed) => NotionError::Api {
                status,
                code: parsed.code,
                message: parsed.message,
            },
            Err(_) => NotionError::Api {
                status,
                code: "unknown".to_string(),
                message: body.chars().take(200).collect(),
            },
        }
    }
}

use reqwest::StatusCode;

use crate::transport::TransportError;

/// Every way a single fetch can fail.
///
/// The machine never returns these to its caller; it converts them into the
/// `Error` state using their `Display` output as the message.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The transport could not complete the call.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The server answered with a non-success status, containing response
    /// text.
    #[error("{}", status_message(.0, .1))]
    Status(StatusCode, String),
    #[error("Failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),
}

fn status_message(status: &StatusCode, text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        format!("Request failed with status {status}")
    } else {
        format!("Request failed with status {status}: {text}")
    }
}

impl FetchError {
    /// The message stored in the `Error` state. Never empty.
    pub fn state_message(&self) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            "request failed".to_string()
        } else {
            message
        }
    }
}

//! API request and response models

use crate::error::DispatchError;
use pf_common::{DispatchRequest, Notification, TokenSource};
use serde::{Deserialize, Serialize};

/// Submission body for POST /api/send-notifications
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendNotificationsRequest {
    pub message: Option<Notification>,
    pub device_tokens: Option<Vec<String>>,
    pub device_tokens_file: Option<String>,
    pub server_key: Option<String>,
}

impl SendNotificationsRequest {
    /// Convert the wire request into a dispatch request
    ///
    /// Inline tokens win when both token fields are present. A missing
    /// message, missing tokens, or missing server key is a validation error.
    pub fn into_dispatch_request(self) -> Result<DispatchRequest, DispatchError> {
        let notification = self
            .message
            .ok_or_else(|| DispatchError::Validation("message is required".to_string()))?;

        let tokens = match (self.device_tokens, self.device_tokens_file) {
            (Some(tokens), _) => TokenSource::Inline(tokens),
            (None, Some(encoded)) => TokenSource::EncodedFile(encoded),
            (None, None) => {
                return Err(DispatchError::Validation(
                    "deviceTokens or deviceTokensFile is required".to_string(),
                ))
            }
        };

        let server_key = self
            .server_key
            .ok_or_else(|| DispatchError::Validation("server key is required".to_string()))?;

        Ok(DispatchRequest {
            notification,
            tokens,
            server_key,
        })
    }
}

/// Acceptance body for POST /api/send-notifications
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendNotificationsResponse {
    pub message: String,
    pub job_id: String,
}

/// Progress body for GET /api/notifications-progress/:job_id
#[derive(Debug, Serialize, Deserialize)]
pub struct ProgressResponse {
    pub progress: u64,
    pub total: u64,
    pub error: Option<String>,
}

/// Error body for rejected requests
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub mod logging;

// ============================================================================
// Notification Payload
// ============================================================================

/// The notification payload fanned out to every recipient of a job.
///
/// All fields are optional; absent fields are omitted from the gateway
/// payload. `description` maps onto the gateway's `body` field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub icon: Option<String>,
    pub link: Option<String>,
}

// ============================================================================
// Recipient Tokens
// ============================================================================

/// Where a job's recipient list comes from.
#[derive(Debug, Clone)]
pub enum TokenSource {
    /// Tokens supplied inline with the submission
    Inline(Vec<String>),
    /// Base64-encoded uploaded file content, parsed when the job runs
    EncodedFile(String),
}

impl TokenSource {
    /// Resolve the source into the ordered recipient list.
    ///
    /// Inline tokens never fail. Encoded files are decoded and parsed as
    /// either a JSON string array or a newline/comma-separated list.
    pub fn resolve(&self) -> Result<Vec<String>, TokenParseError> {
        match self {
            TokenSource::Inline(tokens) => Ok(tokens.clone()),
            TokenSource::EncodedFile(content) => parse_token_file(content),
        }
    }
}

fn parse_token_file(encoded: &str) -> Result<Vec<String>, TokenParseError> {
    use base64::Engine;

    let bytes = base64::engine::general_purpose::STANDARD.decode(encoded.trim())?;
    let text = String::from_utf8(bytes)?;
    let trimmed = text.trim();

    let tokens: Vec<String> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed)?
    } else {
        trimmed
            .split(|c| c == '\n' || c == ',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    };

    debug!(token_count = tokens.len(), "Parsed device token file");
    Ok(tokens)
}

/// Error decoding or parsing an uploaded recipient token file.
#[derive(Error, Debug)]
pub enum TokenParseError {
    #[error("Invalid base64 content: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Token file is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Invalid token array: {0}")]
    Json(#[from] serde_json::Error),
}

/// A validated dispatch submission handed to the engine.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub notification: Notification,
    pub tokens: TokenSource,
    /// Opaque gateway credential, forwarded as `Authorization: key=<value>`
    pub server_key: String,
}

// ============================================================================
// Job State
// ============================================================================

/// Lifecycle state of a dispatch job.
///
/// Transitions only move forward: `Pending -> Running -> Succeeded | Failed`.
/// A parse failure may take `Pending -> Failed` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    /// Terminal states accept no further mutation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

/// Classification of a job's terminal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Recipient list could not be decoded or parsed
    Parse,
    /// A batch exhausted its retry budget against the gateway
    Gateway,
    /// Unexpected fault inside the job task
    Internal,
}

/// Terminal failure recorded on a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl JobFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Point-in-time view of a job's counters and terminal error.
///
/// The zero value doubles as the response for unknown job ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub status: JobStatus,
    pub progress: u64,
    pub total: u64,
    pub error: Option<JobFailure>,
}

impl Default for JobSnapshot {
    fn default() -> Self {
        Self {
            status: JobStatus::Pending,
            progress: 0,
            total: 0,
            error: None,
        }
    }
}

//! FCM Client - batch delivery over the FCM legacy HTTP API
//!
//! One `send` call issues one POST to the gateway endpoint with:
//! - the notification payload (absent fields omitted)
//! - the batch of registration ids
//! - the per-job server key as `Authorization: key=<value>`
//!
//! Failures are classified into timeout, connection, HTTP status, and
//! request errors. Retry is the caller's responsibility.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use pf_common::Notification;

use crate::error::GatewayError;
use crate::{DispatchClient, Result};

/// Default gateway endpoint (FCM legacy send API).
pub const DEFAULT_FCM_ENDPOINT: &str = "https://fcm.googleapis.com/fcm/send";

/// Cap on response body length captured into status errors.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Configuration for the FCM client
#[derive(Debug, Clone)]
pub struct FcmClientConfig {
    /// Gateway endpoint URL
    pub endpoint: String,
    /// Request timeout for one gateway call
    pub timeout: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
}

impl Default for FcmClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_FCM_ENDPOINT.to_string(),
            timeout: Duration::from_secs(20),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Batch payload sent to the gateway.
///
/// The notification's `description` travels as the gateway's `body` field.
#[derive(Debug, Serialize)]
struct FcmRequest<'a> {
    notification: FcmNotification<'a>,
    data: FcmData,
    registration_ids: &'a [String],
}

#[derive(Debug, Serialize)]
struct FcmNotification<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    link: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct FcmData {
    actions: Vec<serde_json::Value>,
}

/// HTTP client for the FCM legacy send endpoint
pub struct FcmClient {
    client: Client,
    config: FcmClientConfig,
}

impl FcmClient {
    pub fn new() -> Self {
        Self::with_config(FcmClientConfig::default())
    }

    pub fn with_config(config: FcmClientConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(10)
            .build()
            .expect("Failed to build HTTP client");

        info!(
            endpoint = %config.endpoint,
            timeout_secs = config.timeout.as_secs(),
            "FcmClient initialized"
        );

        Self { client, config }
    }
}

impl Default for FcmClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DispatchClient for FcmClient {
    async fn send(
        &self,
        tokens: &[String],
        notification: &Notification,
        server_key: &str,
    ) -> Result<()> {
        let payload = FcmRequest {
            notification: FcmNotification {
                title: notification.title.as_deref(),
                body: notification.description.as_deref(),
                image: notification.image.as_deref(),
                icon: notification.icon.as_deref(),
                link: notification.link.as_deref(),
            },
            data: FcmData {
                actions: Vec::new(),
            },
            registration_ids: tokens,
        };

        debug!(
            recipients = tokens.len(),
            endpoint = %self.config.endpoint,
            "Sending batch to push gateway"
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Authorization", format!("key={}", server_key))
            .json(&payload)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if status.is_success() {
            debug!(
                recipients = tokens.len(),
                status = status.as_u16(),
                "Batch accepted by gateway"
            );
            return Ok(());
        }

        let body = truncate_body(&response.text().await.unwrap_or_default());
        warn!(
            status = status.as_u16(),
            body = %body,
            "Gateway rejected batch"
        );

        Err(GatewayError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

fn classify_request_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else if e.is_connect() {
        GatewayError::Connection(e.to_string())
    } else {
        GatewayError::Request(e.to_string())
    }
}

fn truncate_body(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

//! PushFan Gateway Client
//!
//! Delivery seam between the dispatch engine and the external push gateway:
//! - DispatchClient: trait for sending one batch plus payload to the gateway
//! - FcmClient: reqwest-based implementation speaking the FCM legacy HTTP API
//! - GatewayError: typed failure classification (timeout, connection, status)
//!
//! Clients never retry internally; retry policy belongs to the caller.

use async_trait::async_trait;
use pf_common::Notification;

pub mod error;
pub mod fcm;

pub use error::GatewayError;
pub use fcm::{FcmClient, FcmClientConfig, DEFAULT_FCM_ENDPOINT};

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Trait for delivering one batch of recipients to the push gateway.
#[async_trait]
pub trait DispatchClient: Send + Sync {
    /// Send `notification` to every token in `tokens` in a single gateway
    /// call, authorized by `server_key`.
    ///
    /// One invocation maps to exactly one gateway request. A failed call is
    /// reported as an error and never retried here.
    async fn send(
        &self,
        tokens: &[String],
        notification: &Notification,
        server_key: &str,
    ) -> Result<()>;
}

//! PushFan Dispatch Engine
//!
//! This crate provides the core batch-dispatch job engine:
//! - chunker: splits recipient lists into gateway-sized batches
//! - RetryPolicy: bounded retries with exponential backoff
//! - ProgressStore: concurrent job progress tracking with retention sweeps
//! - JobExecutor: drives one job through chunked, retried dispatch
//! - JobSubmitter: validates submissions and schedules background execution
//! - API: HTTP endpoints for submission, progress polling, and health

pub mod api;
pub mod chunker;
pub mod error;
pub mod executor;
pub mod progress;
pub mod retry;
pub mod submitter;

pub use error::DispatchError;
pub use executor::{JobExecutor, JobExecutorConfig, GATEWAY_FAILURE_MESSAGE};
pub use progress::{spawn_retention_sweeper, ProgressStore, ProgressStoreConfig};
pub use retry::{RetryConfig, RetryPolicy};
pub use submitter::{JobSubmitter, SubmitTicket};

pub type Result<T> = std::result::Result<T, DispatchError>;

//! Job Executor - drives a dispatch job from token list to terminal state
//!
//! Features:
//! - Resolves the token source, failing the job on parse errors
//! - Splits tokens into gateway-sized batches
//! - Sends batches sequentially, each under the retry policy
//! - Fails fast: remaining batches are skipped once one is exhausted

use crate::chunker;
use crate::error::DispatchError;
use crate::progress::ProgressStore;
use crate::retry::RetryPolicy;
use crate::Result;
use pf_common::{DispatchRequest, FailureKind};
use pf_gateway::DispatchClient;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Error message recorded when a batch exhausts its retry budget
pub const GATEWAY_FAILURE_MESSAGE: &str = "Failed to send notifications";

const DEFAULT_BATCH_SIZE: NonZeroUsize = match NonZeroUsize::new(150) {
    Some(n) => n,
    None => unreachable!(),
};

/// Configuration for job execution
#[derive(Debug, Clone)]
pub struct JobExecutorConfig {
    /// Maximum tokens per gateway request
    pub batch_size: NonZeroUsize,
}

impl Default for JobExecutorConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Executes dispatch jobs against a push gateway
pub struct JobExecutor {
    store: Arc<ProgressStore>,
    client: Arc<dyn DispatchClient>,
    retry: RetryPolicy,
    config: JobExecutorConfig,
}

impl JobExecutor {
    pub fn new(
        store: Arc<ProgressStore>,
        client: Arc<dyn DispatchClient>,
        retry: RetryPolicy,
        config: JobExecutorConfig,
    ) -> Self {
        Self {
            store,
            client,
            retry,
            config,
        }
    }

    /// Run a job to completion, recording every transition in the store
    ///
    /// The job must already be registered as Pending. All failure modes end
    /// in a Failed record rather than an error return, since the caller has
    /// already detached.
    pub async fn run(&self, job_id: &str, request: DispatchRequest) {
        if let Err(e) = self.execute(job_id, &request).await {
            match e {
                DispatchError::Parse(cause) => {
                    warn!(job_id = %job_id, error = %cause, "Token source could not be parsed");
                    self.store.fail(job_id, FailureKind::Parse, cause.to_string());
                }
                _ => {
                    self.store
                        .fail(job_id, FailureKind::Gateway, GATEWAY_FAILURE_MESSAGE);
                }
            }
        }
    }

    async fn execute(&self, job_id: &str, request: &DispatchRequest) -> Result<()> {
        let tokens = request.tokens.resolve()?;

        let total = tokens.len() as u64;
        self.store.start(job_id, total);
        info!(job_id = %job_id, total = total, "Job started");

        if tokens.is_empty() {
            self.store.succeed(job_id);
            info!(job_id = %job_id, "Job completed with no tokens to dispatch");
            return Ok(());
        }

        let batches = chunker::chunk(&tokens, self.config.batch_size);
        let batch_count = batches.len();

        for (index, batch) in batches.iter().enumerate() {
            let result = self
                .retry
                .run(|| {
                    self.client
                        .send(batch, &request.notification, &request.server_key)
                })
                .await;

            if let Err(e) = result {
                error!(
                    job_id = %job_id,
                    batch = index + 1,
                    batches = batch_count,
                    error = %e,
                    "Batch failed after retries, abandoning job"
                );
                return Err(e.into());
            }

            self.store.record_batch(job_id, batch.len() as u64);
            debug!(
                job_id = %job_id,
                batch = index + 1,
                batches = batch_count,
                delivered = batch.len(),
                "Batch dispatched"
            );
        }

        self.store.succeed(job_id);
        info!(job_id = %job_id, total = total, "Job completed");
        Ok(())
    }
}

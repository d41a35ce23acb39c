//! Job Submitter - validates requests and schedules background execution
//!
//! Features:
//! - Rejects requests with no usable server key before any work starts
//! - Assigns a UUID job id and registers it as Pending
//! - Spawns the executor as a detached tokio task
//! - Converts task panics into a Failed job record

use crate::error::DispatchError;
use crate::executor::JobExecutor;
use crate::progress::ProgressStore;
use crate::Result;
use futures::FutureExt;
use pf_common::{DispatchRequest, FailureKind};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

/// Receipt for an accepted job
///
/// The handle joins the background task; callers that only need
/// fire-and-forget semantics drop it, tests await it to observe the
/// terminal state deterministically.
pub struct SubmitTicket {
    pub job_id: String,
    pub handle: JoinHandle<()>,
}

/// Accepts dispatch requests and runs them in the background
pub struct JobSubmitter {
    store: Arc<ProgressStore>,
    executor: Arc<JobExecutor>,
}

impl JobSubmitter {
    pub fn new(store: Arc<ProgressStore>, executor: Arc<JobExecutor>) -> Self {
        Self { store, executor }
    }

    /// Validate a request and schedule it for execution
    ///
    /// Returns immediately once the job is registered; dispatch happens on a
    /// spawned task. A panic in that task marks the job Failed instead of
    /// leaving it stuck in Running.
    pub fn submit(&self, request: DispatchRequest) -> Result<SubmitTicket> {
        validate(&request)?;

        let job_id = Uuid::new_v4().to_string();
        self.store.create(&job_id);
        info!(job_id = %job_id, "Job accepted");

        let executor = Arc::clone(&self.executor);
        let store = Arc::clone(&self.store);
        let task_id = job_id.clone();

        let handle = tokio::spawn(async move {
            let outcome = AssertUnwindSafe(executor.run(&task_id, request))
                .catch_unwind()
                .await;

            if let Err(panic) = outcome {
                let detail = panic_detail(panic.as_ref());
                error!(job_id = %task_id, detail = %detail, "Job task panicked");
                store.fail(&task_id, FailureKind::Internal, detail);
            }
        });

        Ok(SubmitTicket { job_id, handle })
    }
}

fn validate(request: &DispatchRequest) -> Result<()> {
    if request.server_key.trim().is_empty() {
        return Err(DispatchError::Validation(
            "server key must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn panic_detail(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "job task panicked".to_string()
    }
}

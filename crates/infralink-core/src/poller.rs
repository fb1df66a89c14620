//! Work request poller
//!
//! Drives a work request to a terminal status:
//!
//! ```text
//! ACCEPTED ─► IN_PROGRESS ─┬─► SUCCEEDED
//!                          ├─► FAILED
//!                          └─► CANCELING ─► CANCELED
//! ```
//!
//! The deadline is a hard ceiling. Reaching it yields [`CloudError::Timeout`],
//! never [`CloudError::AsyncOperationFailed`]: the remote operation may still
//! complete after we stop watching it.

use crate::error::{CloudError, Result};
use crate::pagination::collect_all;
use crate::retry::{RetryPolicy, retry};
use crate::work_request::{WorkRequest, WorkRequestClient, WorkRequestError, WorkRequestHandle};
use infralink_config::PollSettings;
use tokio::time::{Instant, sleep_until};

/// Polls one service's work requests
pub struct WorkRequestPoller<'a> {
    client: &'a dyn WorkRequestClient,
    policy: RetryPolicy,
    poll: &'a PollSettings,
}

impl<'a> WorkRequestPoller<'a> {
    /// `policy` governs each individual status fetch
    pub fn new(client: &'a dyn WorkRequestClient, policy: RetryPolicy, poll: &'a PollSettings) -> Self {
        Self {
            client,
            policy,
            poll,
        }
    }

    /// Wait until the work request succeeds, fails or the deadline passes
    pub async fn wait(&self, handle: &WorkRequestHandle, deadline: Instant) -> Result<WorkRequest> {
        let mut polls = 0u32;

        loop {
            if Instant::now() >= deadline {
                return Err(timeout(handle, polls));
            }

            let work_request = retry(&self.policy, Some(deadline), || {
                self.client.get_work_request(&handle.id)
            })
            .await?;
            polls += 1;

            tracing::debug!(
                "Work request {} is {} ({:?}% complete, poll {})",
                work_request.id,
                work_request.status,
                work_request.percent_complete,
                polls
            );

            if work_request.status.is_failure() {
                let errors = self.fetch_errors(&work_request.id, deadline).await;
                return Err(CloudError::AsyncOperationFailed {
                    work_request_id: work_request.id,
                    status: work_request.status,
                    errors,
                });
            }
            if work_request.status.is_terminal() {
                tracing::info!("Work request {} succeeded after {} polls", work_request.id, polls);
                return Ok(work_request);
            }

            let wake = Instant::now() + self.poll.interval_for_attempt(polls - 1);
            sleep_until(wake.min(deadline)).await;
        }
    }

    /// Every error reported by the work request, in service order
    ///
    /// The status is already known to be a failure, so a failure to list the
    /// details is logged rather than allowed to mask it.
    async fn fetch_errors(&self, id: &str, deadline: Instant) -> Vec<WorkRequestError> {
        let listed = collect_all(|cursor| {
            retry(&self.policy, Some(deadline), move || {
                self.client.list_work_request_errors(id, cursor.clone())
            })
        })
        .await;

        match listed {
            Ok(errors) => errors,
            Err(err) => {
                tracing::warn!("Could not list errors of work request {}: {}", id, err);
                Vec::new()
            }
        }
    }
}

fn timeout(handle: &WorkRequestHandle, polls: u32) -> CloudError {
    CloudError::Timeout(format!(
        "work request {} did not reach a terminal status after {} polls; its outcome is unknown",
        handle.id, polls
    ))
}

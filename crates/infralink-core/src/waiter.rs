//! Lifecycle-state waiter
//!
//! After a mutation some resources report completion only through their own
//! lifecycle state ("PROVISIONING" → "RUNNING"). The waiter re-reads the
//! resource until that state reaches the adapter's target set.

use crate::capability::{Operation, ResourceCapability};
use crate::error::{CloudError, Result};
use crate::retry::{RetryPolicy, retrying};
use infralink_config::PollSettings;
use tokio::time::{Instant, sleep_until};

/// How a wait ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The resource reached this target state
    Reached(String),
    /// The resource disappeared while waiting for a delete
    Gone,
}

/// Re-read `adapter` until its lifecycle state is a target state of `op`
///
/// A not-found read ends a delete wait as [`WaitOutcome::Gone`]; for other
/// operations it is treated as not yet visible and polled again. A state that
/// is neither pending nor target is an error.
pub async fn wait_for_state<A>(
    adapter: &mut A,
    op: Operation,
    policy: &RetryPolicy,
    poll: &PollSettings,
    deadline: Instant,
) -> Result<WaitOutcome>
where
    A: ResourceCapability + ?Sized,
{
    let targets = adapter.target_states(op);
    let pending = adapter.pending_states(op);
    let mut polls = 0u32;

    loop {
        if Instant::now() >= deadline {
            return Err(CloudError::Timeout(format!(
                "{} did not reach {:?} after {} reads",
                adapter.state().resource_type,
                targets,
                polls
            )));
        }

        let fetched: Result<()> = retrying!(policy, Some(deadline), adapter.get());
        polls += 1;

        match fetched {
            Ok(()) => {
                let state = adapter.lifecycle_state().unwrap_or_default();
                if targets.contains(&state.as_str()) {
                    tracing::debug!(
                        "{} reached {} after {} reads",
                        adapter.state().resource_type,
                        state,
                        polls
                    );
                    return Ok(WaitOutcome::Reached(state));
                }
                if !pending.contains(&state.as_str()) {
                    return Err(CloudError::UnexpectedState {
                        resource_type: adapter.state().resource_type.clone(),
                        state,
                        expected: targets.iter().map(|s| s.to_string()).collect(),
                    });
                }
                tracing::debug!("{} is {}, waiting", adapter.state().resource_type, state);
            }
            Err(err) if err.is_not_found() => {
                if op == Operation::Delete {
                    return Ok(WaitOutcome::Gone);
                }
                tracing::debug!(
                    "{} not visible yet, waiting",
                    adapter.state().resource_type
                );
            }
            Err(err) => return Err(err),
        }

        let wake = Instant::now() + poll.interval_for_attempt(polls - 1);
        sleep_until(wake.min(deadline)).await;
    }
}

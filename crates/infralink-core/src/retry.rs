//! Retry policy engine
//!
//! Policies are looked up by `(service, is_async)`. The lookup is a pure
//! function of that key: the table is built once and never mutated.
//!
//! A [`Retrier`] tracks one call's attempts against its policy and the
//! caller's deadline. Exhausting the policy returns the last error unchanged;
//! crossing the deadline returns [`CloudError::Timeout`].

use crate::error::{CloudError, ErrorKind, Result};
use infralink_config::{PolicySettings, RetrySettings};
use rand::Rng;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Which failure kinds a policy retries
///
/// Terminal, not-found and async-operation failures are never retried,
/// whatever the flags say.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RetryOn {
    pub throttled: bool,
    pub server_errors: bool,
    pub transport: bool,
}

impl Default for RetryOn {
    fn default() -> Self {
        Self {
            throttled: true,
            server_errors: true,
            transport: true,
        }
    }
}

impl RetryOn {
    pub fn should_retry(&self, err: &CloudError) -> bool {
        match err.kind() {
            ErrorKind::Throttled => self.throttled,
            ErrorKind::Retryable => match err {
                CloudError::Transport(_) => self.transport,
                _ => self.server_errors,
            },
            ErrorKind::NotFound
            | ErrorKind::Terminal
            | ErrorKind::AsyncOperationFailed
            | ErrorKind::Timeout => false,
        }
    }
}

/// Backoff and retry parameters for one (service, operation-kind)
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,

    /// Delay before the first retry
    pub initial_backoff: Duration,

    /// Upper bound of a single delay, before jitter
    pub max_backoff: Duration,

    /// Backoff multiplier
    pub multiplier: f64,

    /// Jitter as a fraction of the delay (0.25 = ±25%)
    pub jitter_fraction: f64,

    /// Ceiling on the total time spent retrying one call
    pub max_elapsed: Duration,

    pub retry_on: RetryOn,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&PolicySettings::default())
    }
}

impl From<&PolicySettings> for RetryPolicy {
    fn from(settings: &PolicySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_backoff: settings.initial_backoff(),
            max_backoff: settings.max_backoff(),
            multiplier: settings.multiplier,
            jitter_fraction: settings.jitter_fraction,
            max_elapsed: settings.max_elapsed(),
            retry_on: RetryOn {
                throttled: settings.retry_throttled,
                server_errors: settings.retry_server_errors,
                transport: settings.retry_transport,
            },
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based), without jitter
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.initial_backoff.as_secs_f64() * self.multiplier.powi(attempt as i32);
        Duration::from_secs_f64(delay.min(self.max_backoff.as_secs_f64()))
    }

    /// Delay before retry number `attempt`, with jitter applied
    pub fn jittered_backoff(&self, attempt: u32) -> Duration {
        let base = self.backoff_for_attempt(attempt);
        if self.jitter_fraction <= 0.0 {
            return base;
        }
        let spread = rand::thread_rng().gen_range(-self.jitter_fraction..=self.jitter_fraction);
        base.mul_f64((1.0 + spread).max(0.0))
    }
}

/// Resolves retry policies by logical service name
#[derive(Debug, Clone)]
pub struct RetryPolicyEngine {
    sync_default: RetryPolicy,
    async_default: RetryPolicy,
    overrides: HashMap<(String, bool), RetryPolicy>,
}

impl Default for RetryPolicyEngine {
    fn default() -> Self {
        Self::new(&RetrySettings::default())
    }
}

impl RetryPolicyEngine {
    pub fn new(settings: &RetrySettings) -> Self {
        let mut overrides = HashMap::new();
        for (service, config) in &settings.services {
            if let Some(policy) = &config.sync {
                overrides.insert((service.clone(), false), RetryPolicy::from(policy));
            }
            if let Some(policy) = &config.async_op {
                overrides.insert((service.clone(), true), RetryPolicy::from(policy));
            }
        }

        tracing::debug!("Retry policy engine built with {} overrides", overrides.len());

        Self {
            sync_default: RetryPolicy::from(&settings.default),
            async_default: RetryPolicy::from(&settings.async_default),
            overrides,
        }
    }

    /// Policy for a call to `service`
    ///
    /// `is_async` selects the policy for calls that start a work request.
    pub fn policy_for(&self, service: &str, is_async: bool) -> RetryPolicy {
        self.overrides
            .get(&(service.to_string(), is_async))
            .cloned()
            .unwrap_or_else(|| {
                if is_async {
                    self.async_default.clone()
                } else {
                    self.sync_default.clone()
                }
            })
    }
}

/// Attempt bookkeeping for a single call
pub struct Retrier<'a> {
    policy: &'a RetryPolicy,
    deadline: Option<Instant>,
    started: Instant,
    attempts: u32,
}

impl<'a> Retrier<'a> {
    pub fn new(policy: &'a RetryPolicy, deadline: Option<Instant>) -> Self {
        Self {
            policy,
            deadline,
            started: Instant::now(),
            attempts: 0,
        }
    }

    /// Number of failed attempts seen so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Decide what to do after a failed attempt
    ///
    /// Returns the delay to wait before the next attempt, or the error to
    /// surface: the original one when it is not retryable or the policy is
    /// exhausted, a timeout when the delay would cross the deadline.
    pub fn on_error(&mut self, err: CloudError) -> Result<Duration> {
        self.attempts += 1;

        if !self.policy.retry_on.should_retry(&err) {
            return Err(err);
        }

        if self.attempts >= self.policy.max_attempts {
            tracing::warn!(
                "Giving up after {} attempts: {}",
                self.attempts,
                err
            );
            return Err(err);
        }

        let mut delay = self.policy.jittered_backoff(self.attempts - 1);
        if err.kind() == ErrorKind::Throttled {
            // throttled calls wait at least half the base delay
            delay = delay.max(self.policy.backoff_for_attempt(self.attempts - 1) / 2);
        }
        if let Some(retry_after) = err.retry_after() {
            delay = delay.max(retry_after);
        }

        if self.started.elapsed() + delay > self.policy.max_elapsed {
            tracing::warn!(
                "Retry budget of {:?} exhausted after {} attempts: {}",
                self.policy.max_elapsed,
                self.attempts,
                err
            );
            return Err(err);
        }

        if let Some(deadline) = self.deadline {
            if Instant::now() + delay >= deadline {
                return Err(CloudError::Timeout(format!(
                    "deadline reached while retrying after {} attempts, last error: {}",
                    self.attempts, err
                )));
            }
        }

        tracing::warn!(
            kind = %err.kind(),
            attempt = self.attempts,
            "Retrying in {:?}: {}",
            delay,
            err
        );
        Ok(delay)
    }

    /// [`Retrier::on_error`], then sleep through the delay
    pub async fn backoff(&mut self, err: CloudError) -> Result<()> {
        let delay = self.on_error(err)?;
        sleep(delay).await;
        Ok(())
    }
}

/// Run a remote call, abandoning it if the deadline passes first
pub async fn with_deadline<T, F>(deadline: Option<Instant>, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match deadline {
        Some(deadline) => match tokio::time::timeout_at(deadline, call).await {
            Ok(result) => result,
            Err(_) => Err(CloudError::Timeout(
                "deadline reached before the remote call completed".to_string(),
            )),
        },
        None => call.await,
    }
}

/// Run `call` under `policy` until it succeeds or the policy gives up
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, deadline: Option<Instant>, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut retrier = Retrier::new(policy, deadline);
    loop {
        match with_deadline(deadline, call()).await {
            Ok(value) => return Ok(value),
            Err(err) => retrier.backoff(err).await?,
        }
    }
}

/// Retry loop for calls that borrow their receiver mutably
///
/// Re-evaluates `$call` for every attempt, which a closure cannot do when the
/// call needs `&mut` access to an adapter.
macro_rules! retrying {
    ($policy:expr, $deadline:expr, $call:expr) => {{
        let deadline: Option<tokio::time::Instant> = $deadline;
        let mut retrier = $crate::retry::Retrier::new($policy, deadline);
        loop {
            match $crate::retry::with_deadline(deadline, $call).await {
                Ok(value) => break Ok(value),
                Err(err) => {
                    if let Err(err) = retrier.backoff(err).await {
                        break Err(err);
                    }
                }
            }
        }
    }};
}

pub(crate) use retrying;

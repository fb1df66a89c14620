//! Lifecycle driver
//!
//! Runs one create/read/update/delete invocation against an adapter:
//!
//! ```text
//! capability call (under retry policy)
//!   ├─ not found ──► clear identity, succeed
//!   ├─ other error ─► propagate unchanged
//!   └─ ok ─► work request? ─► poll ─► re-read ─► set_data
//! ```
//!
//! The driver never retries on its own; that is the retry engine's job.

use crate::capability::{
    ListDataSource, Operation, ResourceCapability, ResourceCreator, ResourceDeleter,
    ResourceUpdater,
};
use crate::error::{CloudError, Result};
use crate::filter::apply_filters;
use crate::identity::synthesize_id;
use crate::poller::WorkRequestPoller;
use crate::retry::{RetryPolicyEngine, retrying};
use crate::waiter::{WaitOutcome, wait_for_state};
use crate::work_request::{WorkRequest, WorkRequestAction, WorkRequestClient, WorkRequestHandle};
use infralink_config::{PollSettings, RetrySettings, TimeoutSettings};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Per-operation time limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::from(&TimeoutSettings::default())
    }
}

impl From<&TimeoutSettings> for Timeouts {
    fn from(settings: &TimeoutSettings) -> Self {
        Self {
            create: Duration::from_millis(settings.create_ms),
            read: Duration::from_millis(settings.read_ms),
            update: Duration::from_millis(settings.update_ms),
            delete: Duration::from_millis(settings.delete_ms),
        }
    }
}

impl Timeouts {
    pub fn for_operation(&self, op: Operation) -> Duration {
        match op {
            Operation::Create => self.create,
            Operation::Read => self.read,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        }
    }
}

/// Orchestrates adapter calls, retries, polling and waiting
#[derive(Clone)]
pub struct LifecycleDriver {
    engine: Arc<RetryPolicyEngine>,
    work_requests: Option<Arc<dyn WorkRequestClient>>,
    poll: PollSettings,
    timeouts: Timeouts,
}

impl LifecycleDriver {
    pub fn new(engine: Arc<RetryPolicyEngine>, poll: PollSettings, timeouts: Timeouts) -> Self {
        Self {
            engine,
            work_requests: None,
            poll,
            timeouts,
        }
    }

    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self::new(
            Arc::new(RetryPolicyEngine::new(settings)),
            settings.poll.clone(),
            Timeouts::from(&settings.timeouts),
        )
    }

    /// Client used to follow work requests returned by mutations
    pub fn with_work_request_client(mut self, client: Arc<dyn WorkRequestClient>) -> Self {
        self.work_requests = Some(client);
        self
    }

    /// Build a driver from the settings file found by [`RetrySettings::load`]
    pub fn load() -> Result<Self> {
        let settings = RetrySettings::load()?;
        Ok(Self::from_settings(&settings))
    }

    pub fn engine(&self) -> &RetryPolicyEngine {
        &self.engine
    }

    fn deadline(&self, op: Operation) -> Instant {
        Instant::now() + self.timeouts.for_operation(op)
    }

    /// Refresh the adapter's state from the remote entity
    ///
    /// A not-found read clears the identity and still succeeds.
    pub async fn read<A>(&self, adapter: &mut A) -> Result<()>
    where
        A: ResourceCapability + ?Sized,
    {
        let deadline = self.deadline(Operation::Read);
        match self.fetch(adapter, deadline).await {
            Ok(()) => adapter.set_data(),
            Err(err) if err.is_not_found() => {
                tracing::info!(
                    "{} {} no longer exists, removing from state",
                    adapter.state().resource_type,
                    adapter.state().id().unwrap_or("<unknown>")
                );
                adapter.void_state();
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Read a listing data source, filter it and give it a synthetic identity
    pub async fn read_list<A>(&self, adapter: &mut A) -> Result<()>
    where
        A: ListDataSource + ?Sized,
    {
        let deadline = self.deadline(Operation::Read);
        match self.fetch(adapter, deadline).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                adapter.void_state();
                return Ok(());
            }
            Err(err) => return Err(err),
        }

        let items = std::mem::take(adapter.items_mut());
        let filtered = apply_filters(items, adapter.filters())?;
        *adapter.items_mut() = filtered;

        let id = synthesize_id(adapter.type_name(), &adapter.arguments());
        adapter.state_mut().set_id(id);
        adapter.set_data()
    }

    /// Create the remote entity and capture its final state
    ///
    /// Not-found during create is a real error (e.g. a missing parent) and is
    /// propagated.
    pub async fn create<A>(&self, adapter: &mut A) -> Result<()>
    where
        A: ResourceCreator + ?Sized,
    {
        let deadline = self.deadline(Operation::Create);
        let policy = self
            .engine
            .policy_for(adapter.service(), adapter.is_async(Operation::Create));

        let handle = retrying!(&policy, Some(deadline), adapter.create())?;

        if let Some(handle) = &handle {
            let work_request = self.await_work_request(adapter.service(), handle, deadline).await?;
            if !adapter.state().has_identity() {
                let created = adapter
                    .entity_type()
                    .and_then(|t| work_request.identifier_for(t, WorkRequestAction::Created))
                    .map(str::to_string);
                if let Some(id) = created {
                    adapter.state_mut().set_id(id);
                }
            }
        }

        tracing::info!(
            "Created {} {}",
            adapter.state().resource_type,
            adapter.state().id().unwrap_or("<pending>")
        );

        self.settle(adapter, Operation::Create, handle.is_some(), deadline)
            .await?;
        adapter.set_data()
    }

    /// Apply the adapter's desired changes to the remote entity
    ///
    /// Not-found at any step, including the work request and the re-read,
    /// clears the identity and still succeeds.
    pub async fn update<A>(&self, adapter: &mut A) -> Result<()>
    where
        A: ResourceUpdater + ?Sized,
    {
        let deadline = self.deadline(Operation::Update);
        match self.apply_update(adapter, deadline).await {
            Err(err) if err.is_not_found() => {
                tracing::info!(
                    "{} vanished during update, removing from state",
                    adapter.state().resource_type
                );
                adapter.void_state();
                Ok(())
            }
            result => result,
        }
    }

    async fn apply_update<A>(&self, adapter: &mut A, deadline: Instant) -> Result<()>
    where
        A: ResourceUpdater + ?Sized,
    {
        let policy = self
            .engine
            .policy_for(adapter.service(), adapter.is_async(Operation::Update));

        let handle = retrying!(&policy, Some(deadline), adapter.update())?;

        if let Some(handle) = &handle {
            self.await_work_request(adapter.service(), handle, deadline).await?;
        }

        self.settle(adapter, Operation::Update, handle.is_some(), deadline)
            .await?;
        adapter.set_data()
    }

    /// Delete the remote entity and clear the identity
    ///
    /// An entity that is already gone, or disappears together with its work
    /// request, counts as deleted.
    pub async fn delete<A>(&self, adapter: &mut A) -> Result<()>
    where
        A: ResourceDeleter + ?Sized,
    {
        let deadline = self.deadline(Operation::Delete);
        match self.apply_delete(adapter, deadline).await {
            Ok(()) => {
                tracing::info!(
                    "Deleted {} {}",
                    adapter.state().resource_type,
                    adapter.state().id().unwrap_or("<unknown>")
                );
            }
            Err(err) if err.is_not_found() => {
                tracing::info!(
                    "{} {} already gone",
                    adapter.state().resource_type,
                    adapter.state().id().unwrap_or("<unknown>")
                );
            }
            Err(err) => return Err(err),
        }
        adapter.void_state();
        Ok(())
    }

    async fn apply_delete<A>(&self, adapter: &mut A, deadline: Instant) -> Result<()>
    where
        A: ResourceDeleter + ?Sized,
    {
        let policy = self
            .engine
            .policy_for(adapter.service(), adapter.is_async(Operation::Delete));

        let handle = retrying!(&policy, Some(deadline), adapter.delete())?;

        if let Some(handle) = &handle {
            self.await_work_request(adapter.service(), handle, deadline).await?;
        }

        if !adapter.target_states(Operation::Delete).is_empty() {
            let policy = self.engine.policy_for(adapter.service(), false);
            let outcome =
                wait_for_state(adapter, Operation::Delete, &policy, &self.poll, deadline).await?;
            tracing::debug!("Delete wait ended: {:?}", outcome);
        }
        Ok(())
    }

    /// Bring the adapter's response up to date after a mutation
    ///
    /// Waits for the lifecycle target state when the adapter declares one,
    /// otherwise re-reads once if the mutation went through a work request.
    async fn settle<A>(
        &self,
        adapter: &mut A,
        op: Operation,
        was_async: bool,
        deadline: Instant,
    ) -> Result<()>
    where
        A: ResourceCapability + ?Sized,
    {
        if !adapter.target_states(op).is_empty() {
            let policy = self.engine.policy_for(adapter.service(), false);
            if let WaitOutcome::Reached(state) =
                wait_for_state(adapter, op, &policy, &self.poll, deadline).await?
            {
                tracing::debug!("{} settled in {}", adapter.state().resource_type, state);
            }
            return Ok(());
        }
        if was_async {
            self.fetch(adapter, deadline).await?;
        }
        Ok(())
    }

    /// The adapter's `get` under the service's sync retry policy
    async fn fetch<A>(&self, adapter: &mut A, deadline: Instant) -> Result<()>
    where
        A: ResourceCapability + ?Sized,
    {
        let policy = self
            .engine
            .policy_for(adapter.service(), adapter.is_async(Operation::Read));
        retrying!(&policy, Some(deadline), adapter.get())
    }

    async fn await_work_request(
        &self,
        service: &str,
        handle: &WorkRequestHandle,
        deadline: Instant,
    ) -> Result<WorkRequest> {
        let client = self.work_requests.as_deref().ok_or_else(|| {
            CloudError::InvalidConfig(format!(
                "work request {} returned but no work request client is configured",
                handle.id
            ))
        })?;

        tracing::debug!("Waiting for work request {} ({})", handle.id, service);
        let poller = WorkRequestPoller::new(client, self.engine.policy_for(service, false), &self.poll);
        poller.wait(handle, deadline).await
    }
}

//! Capability interface implemented by per-resource adapters
//!
//! Adapters own request construction and the mapping between responses and
//! [`ResourceState`]. The engine only ever talks to them through these traits.

use crate::error::Result;
use crate::filter::FilterSpec;
use crate::state::ResourceState;
use crate::work_request::WorkRequestHandle;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Lifecycle operation being driven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Read => write!(f, "read"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

/// Read capability, shared by resources and data sources
#[async_trait]
pub trait ResourceCapability: Send {
    /// Logical service name used to look up the retry policy
    fn service(&self) -> &str;

    fn state(&self) -> &ResourceState;

    fn state_mut(&mut self) -> &mut ResourceState;

    /// Whether `op` starts an asynchronous operation on the service
    fn is_async(&self, _op: Operation) -> bool {
        false
    }

    /// Mark the entity as absent
    fn void_state(&mut self) {
        self.state_mut().clear_identity();
    }

    /// Perform the remote read or list, keeping the response internally
    async fn get(&mut self) -> Result<()>;

    /// Map the last response into the state
    ///
    /// Must succeed without doing anything when no response was kept.
    fn set_data(&mut self) -> Result<()>;

    /// Lifecycle state reported by the last response (e.g. "PROVISIONING")
    fn lifecycle_state(&self) -> Option<String> {
        None
    }

    /// States in which `op` is still in progress
    fn pending_states(&self, _op: Operation) -> &'static [&'static str] {
        &[]
    }

    /// States in which `op` is complete; empty means no waiting
    fn target_states(&self, _op: Operation) -> &'static [&'static str] {
        &[]
    }
}

#[async_trait]
pub trait ResourceCreator: ResourceCapability {
    /// Entity type under which a work request reports the created identifier
    fn entity_type(&self) -> Option<&str> {
        None
    }

    /// Issue the create call. A synchronous create assigns the identity itself.
    async fn create(&mut self) -> Result<Option<WorkRequestHandle>>;
}

#[async_trait]
pub trait ResourceUpdater: ResourceCapability {
    async fn update(&mut self) -> Result<Option<WorkRequestHandle>>;
}

#[async_trait]
pub trait ResourceDeleter: ResourceCapability {
    async fn delete(&mut self) -> Result<Option<WorkRequestHandle>>;
}

/// A resource with the full create/read/update/delete lifecycle
pub trait ManagedResource: ResourceCreator + ResourceUpdater + ResourceDeleter {}

impl<T> ManagedResource for T where T: ResourceCreator + ResourceUpdater + ResourceDeleter {}

/// A data source whose read returns a listing
pub trait ListDataSource: ResourceCapability {
    /// Type name the synthetic identity is derived from
    fn type_name(&self) -> &str {
        &self.state().resource_type
    }

    /// Input arguments of the query, as configured by the user
    fn arguments(&self) -> Map<String, Value>;

    fn filters(&self) -> &[FilterSpec];

    /// Entries gathered by the last `get`
    fn items_mut(&mut self) -> &mut Vec<Value>;
}

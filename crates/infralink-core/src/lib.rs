//! infralink core
//!
//! The resource-lifecycle orchestration engine shared by every adapter of a
//! cloud control-plane provider: retry policy selection, work request
//! polling, pagination, result filtering and synthetic identifiers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │          declarative IaC engine (caller)         │
//! └─────────────────┬───────────────────────────────┘
//!                   │ create / read / update / delete
//! ┌─────────────────▼───────────────────────────────┐
//! │                 LifecycleDriver                  │
//! │  ┌──────────────┐ ┌──────────────┐ ┌─────────┐  │
//! │  │ RetryPolicy  │ │  WorkRequest │ │  State  │  │
//! │  │    Engine    │ │    Poller    │ │  Waiter │  │
//! │  └──────────────┘ └──────────────┘ └─────────┘  │
//! │  ┌──────────────┐ ┌──────────────┐ ┌─────────┐  │
//! │  │  Pagination  │ │    Filter    │ │ Synth.  │  │
//! │  │  Aggregator  │ │              │ │   Id    │  │
//! │  └──────────────┘ └──────────────┘ └─────────┘  │
//! └───────┬─────────────────┬───────────────────────┘
//!         │ capability      │ work requests
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │   adapters    │ │   transport   │
//! │ (per resource)│ │  (per service)│
//! └───────────────┘ └───────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use infralink_core::{LifecycleDriver, RetrySettings};
//!
//! let settings = RetrySettings::load()?;
//! let driver = LifecycleDriver::from_settings(&settings)
//!     .with_work_request_client(client);
//!
//! driver.create(&mut instance_adapter).await?;
//! driver.read(&mut instance_adapter).await?;
//! ```

pub mod capability;
pub mod error;
pub mod filter;
pub mod identity;
pub mod lifecycle;
pub mod pagination;
pub mod poller;
pub mod registry;
pub mod request;
pub mod retry;
pub mod state;
pub mod waiter;
pub mod work_request;

// Re-exports
pub use capability::{
    ListDataSource, ManagedResource, Operation, ResourceCapability, ResourceCreator,
    ResourceDeleter, ResourceUpdater,
};
pub use error::{CloudError, ErrorKind, Result, ServiceError};
pub use filter::{FilterSpec, apply_filters};
pub use identity::synthesize_id;
pub use infralink_config::{PollSettings, RetrySettings, TimeoutSettings};
pub use lifecycle::{LifecycleDriver, Timeouts};
pub use pagination::{Page, collect_all};
pub use poller::WorkRequestPoller;
pub use registry::{Adapter, Registry, RegistryBuilder};
pub use request::{Request, Response, Transport, list_all, send};
pub use retry::{Retrier, RetryOn, RetryPolicy, RetryPolicyEngine, retry, with_deadline};
pub use state::ResourceState;
pub use waiter::{WaitOutcome, wait_for_state};
pub use work_request::{
    WorkRequest, WorkRequestAction, WorkRequestClient, WorkRequestError, WorkRequestHandle,
    WorkRequestResource, WorkRequestStatus,
};

//! Request / response boundary with the control-plane transport

use crate::error::{CloudError, Result};
use crate::pagination::{Page, collect_all};
use crate::retry::{RetryPolicy, RetryPolicyEngine, retry};
use crate::work_request::WorkRequestHandle;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::time::Instant;

/// Immutable description of one remote call
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    service: String,
    operation: String,
    params: Map<String, Value>,
    page: Option<String>,
    retry_policy: RetryPolicy,
}

impl Request {
    pub fn new(
        service: impl Into<String>,
        operation: impl Into<String>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            service: service.into(),
            operation: operation.into(),
            params: Map::new(),
            page: None,
            retry_policy,
        }
    }

    /// Build a request whose retry policy is assigned by `engine`
    pub fn for_service(
        engine: &RetryPolicyEngine,
        service: impl Into<String>,
        operation: impl Into<String>,
        is_async: bool,
    ) -> Self {
        let service = service.into();
        let policy = engine.policy_for(&service, is_async);
        Self::new(service, operation, policy)
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Copy of this request pointing at another page
    pub fn with_page(&self, page: Option<String>) -> Self {
        Self {
            page,
            ..self.clone()
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    pub fn page(&self) -> Option<&str> {
        self.page.as_deref()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }
}

/// Decoded response of one remote call
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Response {
    pub payload: Value,
    pub next_page: Option<String>,
    pub work_request: Option<WorkRequestHandle>,
}

impl Response {
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            ..Default::default()
        }
    }

    pub fn with_next_page(mut self, next_page: impl Into<String>) -> Self {
        self.next_page = Some(next_page.into());
        self
    }

    pub fn with_work_request(mut self, handle: WorkRequestHandle) -> Self {
        self.work_request = Some(handle);
        self
    }

    /// Interpret the payload as one page of a listing
    ///
    /// Accepts a bare array or an object with an `items` array.
    pub fn into_page(self) -> Result<Page<Value>> {
        let items = match self.payload {
            Value::Array(items) => items,
            Value::Object(mut object) => match object.remove("items") {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(CloudError::MalformedResponse(
                        "list payload has no items array".to_string(),
                    ));
                }
            },
            Value::Null => Vec::new(),
            other => {
                return Err(CloudError::MalformedResponse(format!(
                    "expected a list payload, got {}",
                    other
                )));
            }
        };
        Ok(Page::new(items, self.next_page))
    }
}

/// Wire transport to the control plane (signing and auth live behind it)
///
/// Implementations classify failures with [`CloudError::from_service_error`]
/// or [`CloudError::transport`] before returning them.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &Request) -> Result<Response>;
}

/// Send a request under its assigned retry policy
pub async fn send(
    transport: &dyn Transport,
    request: &Request,
    deadline: Option<Instant>,
) -> Result<Response> {
    tracing::debug!(
        "Sending {}.{} (page: {:?})",
        request.service(),
        request.operation(),
        request.page()
    );
    retry(request.retry_policy(), deadline, || transport.send(request)).await
}

/// Send a list request and aggregate every page of its result
pub async fn list_all(
    transport: &dyn Transport,
    request: &Request,
    deadline: Option<Instant>,
) -> Result<Vec<Value>> {
    collect_all(move |cursor| async move {
        let page_request = request.with_page(cursor);
        send(transport, &page_request, deadline).await?.into_page()
    })
    .await
}

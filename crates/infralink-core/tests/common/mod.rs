#![allow(dead_code)]

use async_trait::async_trait;
use infralink_core::{
    CloudError, FilterSpec, LifecycleDriver, ListDataSource, Operation, Page, PollSettings,
    Request, ResourceCapability, ResourceCreator, ResourceDeleter, ResourceState,
    ResourceUpdater, Response, Result, RetryPolicy, RetrySettings, ServiceError, Transport,
    WorkRequest, WorkRequestClient, WorkRequestError, WorkRequestHandle, list_all,
};
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

pub fn service_error(status: u16) -> CloudError {
    let code = match status {
        404 => "NotAuthorizedOrNotFound",
        409 => "Conflict",
        429 => "TooManyRequests",
        s if s >= 500 => "InternalServerError",
        _ => "InvalidParameter",
    };
    CloudError::from_service_error(ServiceError::new(status, code, format!("status {}", status)))
}

/// Settings with deterministic timing: no jitter, one-second polls
pub fn test_settings() -> RetrySettings {
    let mut settings = RetrySettings::default();
    settings.default.jitter_fraction = 0.0;
    settings.async_default.jitter_fraction = 0.0;
    settings.poll = PollSettings {
        initial_interval_ms: 1000,
        max_interval_ms: 1000,
        multiplier: 1.0,
    };
    settings
}

pub fn driver(client: Option<Arc<FakeWorkRequests>>) -> LifecycleDriver {
    let driver = LifecycleDriver::from_settings(&test_settings());
    match client {
        Some(client) => driver.with_work_request_client(client),
        None => driver,
    }
}

/// Scripted answer to a read
#[derive(Debug, Clone)]
pub enum Reply {
    Body(Value),
    Status(u16),
}

/// Scripted answer to a mutation
#[derive(Debug, Clone)]
pub enum Mutation {
    /// Completes synchronously and assigns this id
    Sync(String),
    /// Starts this work request
    Async(String),
    Status(u16),
}

/// Pops the next scripted entry; the last one repeats forever
fn next<T: Clone>(queue: &mut VecDeque<T>) -> T {
    if queue.len() > 1 {
        queue.pop_front().unwrap()
    } else {
        queue.front().cloned().expect("script exhausted")
    }
}

/// In-memory adapter for an "instance" resource of the "core" service
pub struct FakeInstance {
    pub state: ResourceState,
    pub gets: VecDeque<Reply>,
    pub creates: VecDeque<Mutation>,
    pub updates: VecDeque<Mutation>,
    pub deletes: VecDeque<Mutation>,
    pub calls: Vec<&'static str>,
    pub response: Option<Value>,
    pub pending: HashMap<Operation, &'static [&'static str]>,
    pub targets: HashMap<Operation, &'static [&'static str]>,
}

impl FakeInstance {
    pub fn new() -> Self {
        Self {
            state: ResourceState::new("core_instance"),
            gets: VecDeque::new(),
            creates: VecDeque::new(),
            updates: VecDeque::new(),
            deletes: VecDeque::new(),
            calls: Vec::new(),
            response: None,
            pending: HashMap::new(),
            targets: HashMap::new(),
        }
    }

    pub fn existing(id: &str) -> Self {
        let mut fake = Self::new();
        fake.state.set_id(id);
        fake.state.set_attribute("display_name", serde_json::json!("web-1"));
        fake
    }

    pub fn with_gets(mut self, replies: Vec<Reply>) -> Self {
        self.gets = replies.into();
        self
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.iter().filter(|c| **c == call).count()
    }

    fn mutate(&mut self, op: &'static str, mutation: Mutation) -> Result<Option<WorkRequestHandle>> {
        self.calls.push(op);
        match mutation {
            Mutation::Sync(id) => {
                if op == "create" {
                    self.state.set_id(id);
                }
                Ok(None)
            }
            Mutation::Async(wr) => Ok(Some(WorkRequestHandle::new(wr))),
            Mutation::Status(status) => Err(service_error(status)),
        }
    }
}

#[async_trait]
impl ResourceCapability for FakeInstance {
    fn service(&self) -> &str {
        "core"
    }

    fn state(&self) -> &ResourceState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ResourceState {
        &mut self.state
    }

    fn is_async(&self, op: Operation) -> bool {
        op != Operation::Read
    }

    async fn get(&mut self) -> Result<()> {
        self.calls.push("get");
        match next(&mut self.gets) {
            Reply::Body(body) => {
                self.response = Some(body);
                Ok(())
            }
            Reply::Status(status) => Err(service_error(status)),
        }
    }

    fn set_data(&mut self) -> Result<()> {
        self.calls.push("set_data");
        let Some(Value::Object(body)) = self.response.take() else {
            return Ok(());
        };
        self.state.lifecycle_state = body
            .get("lifecycle_state")
            .and_then(Value::as_str)
            .map(str::to_string);
        for (key, value) in body {
            self.state.set_attribute(key, value);
        }
        Ok(())
    }

    fn lifecycle_state(&self) -> Option<String> {
        self.response
            .as_ref()
            .and_then(|r| r.get("lifecycle_state"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn pending_states(&self, op: Operation) -> &'static [&'static str] {
        self.pending.get(&op).copied().unwrap_or(&[])
    }

    fn target_states(&self, op: Operation) -> &'static [&'static str] {
        self.targets.get(&op).copied().unwrap_or(&[])
    }
}

#[async_trait]
impl ResourceCreator for FakeInstance {
    fn entity_type(&self) -> Option<&str> {
        Some("instance")
    }

    async fn create(&mut self) -> Result<Option<WorkRequestHandle>> {
        let mutation = next(&mut self.creates);
        self.mutate("create", mutation)
    }
}

#[async_trait]
impl ResourceUpdater for FakeInstance {
    async fn update(&mut self) -> Result<Option<WorkRequestHandle>> {
        let mutation = next(&mut self.updates);
        self.mutate("update", mutation)
    }
}

#[async_trait]
impl ResourceDeleter for FakeInstance {
    async fn delete(&mut self) -> Result<Option<WorkRequestHandle>> {
        let mutation = next(&mut self.deletes);
        self.mutate("delete", mutation)
    }
}

/// Work request service backed by scripted status sequences
#[derive(Default)]
pub struct FakeWorkRequests {
    scripts: Mutex<HashMap<String, VecDeque<WorkRequest>>>,
    errors: Mutex<HashMap<String, Vec<WorkRequestError>>>,
    polls: Mutex<HashMap<String, u32>>,
}

impl FakeWorkRequests {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, id: &str, sequence: Vec<WorkRequest>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(id.to_string(), sequence.into());
    }

    pub fn fail_with(&self, id: &str, errors: Vec<WorkRequestError>) {
        self.errors.lock().unwrap().insert(id.to_string(), errors);
    }

    pub fn polls(&self, id: &str) -> u32 {
        self.polls.lock().unwrap().get(id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl WorkRequestClient for FakeWorkRequests {
    async fn get_work_request(&self, id: &str) -> Result<WorkRequest> {
        *self.polls.lock().unwrap().entry(id.to_string()).or_default() += 1;
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(id) {
            Some(sequence) => Ok(next(sequence)),
            None => Err(service_error(404)),
        }
    }

    /// Serves one error per page so that pagination is exercised
    async fn list_work_request_errors(
        &self,
        id: &str,
        page: Option<String>,
    ) -> Result<Page<WorkRequestError>> {
        let errors = self.errors.lock().unwrap();
        let all = errors.get(id).cloned().unwrap_or_default();
        let index: usize = page.map(|p| p.parse().unwrap()).unwrap_or(0);
        let items: Vec<WorkRequestError> = all.get(index).cloned().into_iter().collect();
        let next_page = (index + 1 < all.len()).then(|| (index + 1).to_string());
        Ok(Page::new(items, next_page))
    }
}

/// Transport serving a fixed listing split into pages of `page_size`
pub struct FakeListTransport {
    pub items: Vec<Value>,
    pub page_size: usize,
    pub requests: Mutex<Vec<Request>>,
}

impl FakeListTransport {
    pub fn new(items: Vec<Value>, page_size: usize) -> Arc<Self> {
        Arc::new(Self {
            items,
            page_size,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for FakeListTransport {
    async fn send(&self, request: &Request) -> Result<Response> {
        self.requests.lock().unwrap().push(request.clone());
        let start: usize = request.page().map(|p| p.parse().unwrap()).unwrap_or(0);
        let end = (start + self.page_size).min(self.items.len());
        let mut response = Response::new(Value::Array(self.items[start..end].to_vec()));
        if end < self.items.len() {
            response = response.with_next_page(end.to_string());
        }
        Ok(response)
    }
}

/// "core_shapes" list data source over a [`FakeListTransport`]
pub struct FakeShapes {
    pub state: ResourceState,
    pub transport: Arc<FakeListTransport>,
    pub arguments: Map<String, Value>,
    pub filters: Vec<FilterSpec>,
    pub items: Vec<Value>,
    pub fetched: bool,
}

impl FakeShapes {
    pub fn new(transport: Arc<FakeListTransport>, compartment: &str) -> Self {
        let mut arguments = Map::new();
        arguments.insert("compartment_id".to_string(), Value::String(compartment.to_string()));
        Self {
            state: ResourceState::new("core_shapes"),
            transport,
            arguments,
            filters: Vec::new(),
            items: Vec::new(),
            fetched: false,
        }
    }
}

#[async_trait]
impl ResourceCapability for FakeShapes {
    fn service(&self) -> &str {
        "core"
    }

    fn state(&self) -> &ResourceState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ResourceState {
        &mut self.state
    }

    async fn get(&mut self) -> Result<()> {
        let mut request = Request::new("core", "ListShapes", RetryPolicy::no_retry());
        for (key, value) in &self.arguments {
            request = request.with_param(key.clone(), value.clone());
        }
        self.items = list_all(self.transport.as_ref(), &request, None).await?;
        self.fetched = true;
        Ok(())
    }

    fn set_data(&mut self) -> Result<()> {
        if !self.fetched {
            return Ok(());
        }
        self.state
            .set_attribute("shapes", Value::Array(self.items.clone()));
        Ok(())
    }
}

impl ListDataSource for FakeShapes {
    fn arguments(&self) -> Map<String, Value> {
        let mut arguments = self.arguments.clone();
        if !self.filters.is_empty() {
            arguments.insert(
                "filter".to_string(),
                serde_json::to_value(&self.filters).unwrap_or(Value::Null),
            );
        }
        arguments
    }

    fn filters(&self) -> &[FilterSpec] {
        &self.filters
    }

    fn items_mut(&mut self) -> &mut Vec<Value> {
        &mut self.items
    }
}

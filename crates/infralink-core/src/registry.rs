//! Adapter registry
//!
//! Maps resource and data source type names to adapter constructors. Built
//! once through [`RegistryBuilder`] during provider initialization; the
//! resulting [`Registry`] is immutable.

use crate::capability::{ListDataSource, ManagedResource, ResourceCapability};
use crate::error::{CloudError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

type ResourceFactory = Arc<dyn Fn() -> Box<dyn ManagedResource> + Send + Sync>;
type DataSourceFactory = Arc<dyn Fn() -> Box<dyn ResourceCapability> + Send + Sync>;
type ListFactory = Arc<dyn Fn() -> Box<dyn ListDataSource> + Send + Sync>;

/// A freshly constructed adapter
pub enum Adapter {
    Resource(Box<dyn ManagedResource>),
    DataSource(Box<dyn ResourceCapability>),
    ListDataSource(Box<dyn ListDataSource>),
}

impl std::fmt::Debug for Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (kind, state) = match self {
            Adapter::Resource(a) => ("Resource", a.state()),
            Adapter::DataSource(a) => ("DataSource", a.state()),
            Adapter::ListDataSource(a) => ("ListDataSource", a.state()),
        };
        write!(f, "Adapter::{}({})", kind, state.resource_type)
    }
}

#[derive(Clone)]
enum Entry {
    Resource(ResourceFactory),
    DataSource(DataSourceFactory),
    ListDataSource(ListFactory),
}

/// Collects registrations; rejects duplicate names
#[derive(Default)]
pub struct RegistryBuilder {
    resources: BTreeMap<String, Entry>,
    data_sources: BTreeMap<String, Entry>,
}

impl std::fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("resources", &self.resources.keys().collect::<Vec<_>>())
            .field("data_sources", &self.data_sources.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_resource<F>(self, name: impl Into<String>, factory: F) -> Result<Self>
    where
        F: Fn() -> Box<dyn ManagedResource> + Send + Sync + 'static,
    {
        self.insert(true, name.into(), Entry::Resource(Arc::new(factory)))
    }

    pub fn register_data_source<F>(self, name: impl Into<String>, factory: F) -> Result<Self>
    where
        F: Fn() -> Box<dyn ResourceCapability> + Send + Sync + 'static,
    {
        self.insert(false, name.into(), Entry::DataSource(Arc::new(factory)))
    }

    pub fn register_list_data_source<F>(self, name: impl Into<String>, factory: F) -> Result<Self>
    where
        F: Fn() -> Box<dyn ListDataSource> + Send + Sync + 'static,
    {
        self.insert(false, name.into(), Entry::ListDataSource(Arc::new(factory)))
    }

    fn insert(mut self, resource: bool, name: String, entry: Entry) -> Result<Self> {
        let table = if resource {
            &mut self.resources
        } else {
            &mut self.data_sources
        };
        if table.contains_key(&name) {
            return Err(CloudError::InvalidConfig(format!(
                "{} {} is registered twice",
                if resource { "resource" } else { "data source" },
                name
            )));
        }
        table.insert(name, entry);
        Ok(self)
    }

    pub fn build(self) -> Registry {
        tracing::debug!(
            "Registry built with {} resources and {} data sources",
            self.resources.len(),
            self.data_sources.len()
        );
        Registry {
            resources: Arc::new(self.resources),
            data_sources: Arc::new(self.data_sources),
        }
    }
}

/// Immutable name → adapter constructor map
#[derive(Clone)]
pub struct Registry {
    resources: Arc<BTreeMap<String, Entry>>,
    data_sources: Arc<BTreeMap<String, Entry>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Registered resource names, sorted
    pub fn resource_names(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    /// Registered data source names, sorted
    pub fn data_source_names(&self) -> impl Iterator<Item = &str> {
        self.data_sources.keys().map(String::as_str)
    }

    /// Construct a new adapter for a resource type
    pub fn resource(&self, name: &str) -> Option<Adapter> {
        self.resources.get(name).map(instantiate)
    }

    /// Construct a new adapter for a data source type
    pub fn data_source(&self, name: &str) -> Option<Adapter> {
        self.data_sources.get(name).map(instantiate)
    }
}

fn instantiate(entry: &Entry) -> Adapter {
    match entry {
        Entry::Resource(factory) => Adapter::Resource(factory()),
        Entry::DataSource(factory) => Adapter::DataSource(factory()),
        Entry::ListDataSource(factory) => Adapter::ListDataSource(factory()),
    }
}

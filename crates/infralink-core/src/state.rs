//! Generic resource state
//!
//! A [`ResourceState`] is the attribute bag an adapter maps remote responses
//! into. Its identity is empty exactly when the entity is known not to exist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// State of a single resource or data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Resource type name (e.g. "core_instance")
    pub resource_type: String,

    /// Remote identity; `None` when the entity does not exist
    id: Option<String>,

    /// Last observed lifecycle state reported by the service (e.g. "ACTIVE")
    pub lifecycle_state: Option<String>,

    /// Resource attributes keyed by field name
    pub attributes: HashMap<String, serde_json::Value>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl ResourceState {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: None,
            lifecycle_state: None,
            attributes: HashMap::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.set_id(id);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn has_identity(&self) -> bool {
        self.id.is_some()
    }

    /// Assign the remote identity. An empty string clears it.
    pub fn set_id(&mut self, id: impl Into<String>) {
        let id = id.into();
        self.id = if id.is_empty() { None } else { Some(id) };
        self.updated_at = Utc::now();
    }

    /// Mark the entity as absent remotely
    ///
    /// Attributes and lifecycle state are dropped along with the identity.
    pub fn clear_identity(&mut self) {
        self.id = None;
        self.lifecycle_state = None;
        self.attributes.clear();
        self.updated_at = Utc::now();
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.attributes.insert(key.into(), value);
        self.updated_at = Utc::now();
    }

    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

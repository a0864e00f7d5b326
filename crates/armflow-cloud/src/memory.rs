//! In-memory resource client
//!
//! A [`ResourceClient`] backed by a map, for dry runs and tests. It records
//! every call in an ordered journal, can script the provisioning states an
//! object reports on successive reads, and can inject transport failures.

use crate::client::ResourceClient;
use crate::error::{CloudError, Result};
use crate::id::ResourceId;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// Kind of client call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    List,
    CreateOrUpdate,
    Update,
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Get => write!(f, "get"),
            Operation::List => write!(f, "list"),
            Operation::CreateOrUpdate => write!(f, "create_or_update"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

/// One journal entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub operation: Operation,
    /// Target id; for `List`, the parent id followed by `/{child_type}`
    pub target: String,
}

#[derive(Default)]
struct Inner {
    objects: BTreeMap<String, (ResourceId, Value)>,
    scripts: HashMap<String, VecDeque<String>>,
    failures: HashMap<(Operation, String), String>,
    journal: Vec<Call>,
}

/// In-memory [`ResourceClient`]
#[derive(Default)]
pub struct MemoryClient {
    inner: Mutex<Inner>,
    latency: Duration,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn inner(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store an object as-is
    pub fn insert(&self, id: &ResourceId, object: Value) {
        let object = with_identity(id, object);
        self.inner().objects.insert(id.lock_key(), (id.clone(), object));
    }

    /// Fetch a stored object without recording a call
    pub fn object(&self, id: &ResourceId) -> Option<Value> {
        self.inner()
            .objects
            .get(&id.lock_key())
            .map(|(_, object)| object.clone())
    }

    /// Provisioning states `id` reports on successive reads; the last one sticks
    pub fn script_states<I, S>(&self, id: &ResourceId, states: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let states = states.into_iter().map(Into::into).collect();
        self.inner().scripts.insert(id.lock_key(), states);
    }

    /// Make the next `operation` on `id` fail with a transport error
    pub fn fail_next(&self, operation: Operation, id: &ResourceId, message: impl Into<String>) {
        self.inner()
            .failures
            .insert((operation, id.lock_key()), message.into());
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.inner().journal.clone()
    }

    pub fn count(&self, operation: Operation) -> usize {
        self.inner()
            .journal
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    async fn enter(&self, operation: Operation, key: &str, target: String) -> Result<()> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let mut inner = self.inner();
        inner.journal.push(Call { operation, target });
        match inner.failures.remove(&(operation, key.to_string())) {
            Some(message) => Err(CloudError::Transport(message)),
            None => Ok(()),
        }
    }
}

fn with_identity(id: &ResourceId, mut object: Value) -> Value {
    if let Some(map) = object.as_object_mut() {
        map.insert("id".to_string(), json!(id.to_string()));
        map.insert("name".to_string(), json!(id.name()));
    }
    object
}

fn set_provisioning_state(object: &mut Value, state: &str) {
    if let Some(map) = object.as_object_mut() {
        let properties = map.entry("properties").or_insert_with(|| json!({}));
        if let Some(properties) = properties.as_object_mut() {
            properties.insert("provisioningState".to_string(), json!(state));
        }
    }
}

/// JSON merge patch (RFC 7396)
fn merge(target: &mut Value, patch: &Value) {
    match (target.as_object_mut(), patch.as_object()) {
        (Some(target), Some(patch)) => {
            for (key, value) in patch {
                if value.is_null() {
                    target.remove(key);
                } else {
                    merge(target.entry(key.clone()).or_insert(Value::Null), value);
                }
            }
        }
        _ => *target = patch.clone(),
    }
}

#[async_trait]
impl ResourceClient for MemoryClient {
    async fn get(&self, id: &ResourceId) -> Result<Value> {
        let key = id.lock_key();
        self.enter(Operation::Get, &key, id.to_string()).await?;

        let mut inner = self.inner();
        if !inner.objects.contains_key(&key) {
            return Err(CloudError::NotFound(id.to_string()));
        }
        let next_state = match inner.scripts.get_mut(&key) {
            Some(states) if states.len() > 1 => states.pop_front(),
            Some(states) => states.front().cloned(),
            None => None,
        };
        let Some((_, object)) = inner.objects.get_mut(&key) else {
            return Err(CloudError::NotFound(id.to_string()));
        };
        if let Some(state) = next_state {
            set_provisioning_state(object, &state);
        }
        Ok(object.clone())
    }

    async fn list(&self, parent: &ResourceId, child_type: &str) -> Result<Vec<Value>> {
        let key = parent.lock_key();
        self.enter(Operation::List, &key, format!("{}/{}", parent, child_type))
            .await?;

        let inner = self.inner();
        if !inner.objects.contains_key(&key) {
            return Err(CloudError::NotFound(parent.to_string()));
        }
        Ok(inner
            .objects
            .values()
            .filter(|(id, _)| {
                id.parent().as_ref() == Some(parent)
                    && id
                        .segments()
                        .last()
                        .is_some_and(|s| s.resource_type.eq_ignore_ascii_case(child_type))
            })
            .map(|(_, object)| object.clone())
            .collect())
    }

    async fn create_or_update(&self, id: &ResourceId, body: &Value) -> Result<Value> {
        let key = id.lock_key();
        self.enter(Operation::CreateOrUpdate, &key, id.to_string())
            .await?;

        let mut object = with_identity(id, body.clone());
        let mut inner = self.inner();
        let initial = inner.scripts.get(&key).and_then(|s| s.front().cloned());
        set_provisioning_state(&mut object, initial.as_deref().unwrap_or("Succeeded"));
        inner.objects.insert(key, (id.clone(), object.clone()));
        Ok(object)
    }

    async fn update(&self, id: &ResourceId, patch: &Value) -> Result<Value> {
        let key = id.lock_key();
        self.enter(Operation::Update, &key, id.to_string()).await?;

        let mut inner = self.inner();
        let Some((_, object)) = inner.objects.get_mut(&key) else {
            return Err(CloudError::NotFound(id.to_string()));
        };
        merge(object, patch);
        Ok(object.clone())
    }

    async fn delete(&self, id: &ResourceId) -> Result<()> {
        let key = id.lock_key();
        self.enter(Operation::Delete, &key, id.to_string()).await?;

        let prefix = format!("{}/", key);
        let mut inner = self.inner();
        inner
            .objects
            .retain(|k, _| *k != key && !k.starts_with(&prefix));
        inner.scripts.remove(&key);
        Ok(())
    }
}

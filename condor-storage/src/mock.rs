//! In-memory remote for tests and local runs.

use crate::{record_id, EntityStore, Filter, IdentityService};
use ::async_trait::async_trait;
use condor_core::{new_record_id, CondorError, CondorResult, Principal, RemoteError};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

/// Remote operations counted and scriptable on [`MockRemote`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    WhoAmI,
    SignOut,
    List,
    Filter,
    Get,
    Create,
    Update,
    Delete,
}

#[derive(Debug, Default)]
struct MockState {
    records: RwLock<HashMap<String, Vec<Value>>>,
    principal: RwLock<Option<Principal>>,
    failures: Mutex<HashMap<MockOp, VecDeque<CondorError>>>,
    calls: Mutex<HashMap<MockOp, usize>>,
    latency: Mutex<Duration>,
}

/// Entity and identity capability backed by in-process maps.
///
/// Clones share state. Failures can be queued per operation and are consumed
/// one per call before the normal behaviour resumes.
#[derive(Debug, Clone, Default)]
pub struct MockRemote {
    state: Arc<MockState>,
}

impl MockRemote {
    /// Create a new mock remote with no signed-in principal.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_principal(principal: Principal) -> Self {
        let remote = Self::new();
        remote.set_principal(Some(principal));
        remote
    }

    pub fn set_principal(&self, principal: Option<Principal>) {
        *self.state.principal.write().unwrap_or_else(|err| err.into_inner()) = principal;
    }

    /// Delay applied to every call before it is answered.
    pub fn set_latency(&self, latency: Duration) {
        *self.state.latency.lock().unwrap_or_else(|err| err.into_inner()) = latency;
    }

    /// Seed a record, assigning an id when missing.
    pub fn insert(&self, entity: &str, mut record: Value) -> Value {
        ensure_id(&mut record);
        let mut records = self.state.records.write().unwrap_or_else(|err| err.into_inner());
        records.entry(entity.to_string()).or_default().push(record.clone());
        record
    }

    pub fn records(&self, entity: &str) -> Vec<Value> {
        let records = self.state.records.read().unwrap_or_else(|err| err.into_inner());
        records.get(entity).cloned().unwrap_or_default()
    }

    pub fn fail_next(&self, op: MockOp, err: impl Into<CondorError>) {
        let mut failures = self.state.failures.lock().unwrap_or_else(|err| err.into_inner());
        failures.entry(op).or_default().push_back(err.into());
    }

    /// Number of calls made to `op`, failed ones included.
    pub fn calls(&self, op: MockOp) -> usize {
        let calls = self.state.calls.lock().unwrap_or_else(|err| err.into_inner());
        calls.get(&op).copied().unwrap_or(0)
    }

    async fn enter(&self, op: MockOp) -> CondorResult<()> {
        {
            let mut calls = self.state.calls.lock().unwrap_or_else(|err| err.into_inner());
            *calls.entry(op).or_default() += 1;
        }
        let latency = *self.state.latency.lock().unwrap_or_else(|err| err.into_inner());
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        let scripted = {
            let mut failures = self.state.failures.lock().unwrap_or_else(|err| err.into_inner());
            failures.get_mut(&op).and_then(VecDeque::pop_front)
        };
        match scripted {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn ensure_id(record: &mut Value) {
    if let Value::Object(map) = record {
        if !map.contains_key("id") {
            map.insert("id".to_string(), Value::String(new_record_id()));
        }
    }
}

fn not_found(entity: &str, id: &str) -> CondorError {
    RemoteError::NotFound {
        entity: entity.to_string(),
        id: id.to_string(),
    }
    .into()
}

#[async_trait]
impl EntityStore for MockRemote {
    async fn list(&self, entity: &str) -> CondorResult<Vec<Value>> {
        self.enter(MockOp::List).await?;
        Ok(self.records(entity))
    }

    async fn filter(&self, entity: &str, filter: &Filter) -> CondorResult<Vec<Value>> {
        self.enter(MockOp::Filter).await?;
        Ok(self
            .records(entity)
            .into_iter()
            .filter(|record| filter.matches(record))
            .collect())
    }

    async fn get(&self, entity: &str, id: &str) -> CondorResult<Value> {
        self.enter(MockOp::Get).await?;
        self.records(entity)
            .into_iter()
            .find(|record| record_id(record) == Some(id))
            .ok_or_else(|| not_found(entity, id))
    }

    async fn create(&self, entity: &str, data: Value) -> CondorResult<Value> {
        self.enter(MockOp::Create).await?;
        if !data.is_object() {
            return Err(RemoteError::Remote {
                status: 400,
                message: "record must be an object".to_string(),
            }
            .into());
        }
        Ok(self.insert(entity, data))
    }

    async fn update(&self, entity: &str, id: &str, patch: Value) -> CondorResult<Value> {
        self.enter(MockOp::Update).await?;
        let mut records = self.state.records.write().unwrap_or_else(|err| err.into_inner());
        let record = records
            .get_mut(entity)
            .and_then(|items| items.iter_mut().find(|record| record_id(record) == Some(id)))
            .ok_or_else(|| not_found(entity, id))?;
        if let (Value::Object(target), Value::Object(changes)) = (&mut *record, patch) {
            for (key, value) in changes {
                if key != "id" {
                    target.insert(key, value);
                }
            }
        }
        Ok(record.clone())
    }

    async fn delete(&self, entity: &str, id: &str) -> CondorResult<()> {
        self.enter(MockOp::Delete).await?;
        let mut records = self.state.records.write().unwrap_or_else(|err| err.into_inner());
        let items = records.get_mut(entity).ok_or_else(|| not_found(entity, id))?;
        let before = items.len();
        items.retain(|record| record_id(record) != Some(id));
        if items.len() == before {
            return Err(not_found(entity, id));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityService for MockRemote {
    async fn who_am_i(&self) -> CondorResult<Principal> {
        self.enter(MockOp::WhoAmI).await?;
        self.state
            .principal
            .read()
            .unwrap_or_else(|err| err.into_inner())
            .clone()
            .ok_or_else(|| {
                RemoteError::Unauthenticated {
                    reason: "no active session".to_string(),
                }
                .into()
            })
    }

    async fn sign_out(&self) -> CondorResult<()> {
        self.enter(MockOp::SignOut).await?;
        self.set_principal(None);
        Ok(())
    }
}

//! In-memory stand-ins for the watch stream and the admin interface.

use async_trait::async_trait;
use pkg_nginx::{AdminError, UpstreamAdmin};
use pkg_types::endpoint::{EndpointAddress, EndpointSnapshot, EndpointSubset};
use pkg_types::upstream::{Backend, UpstreamStatus};
use pkg_watch::{EndpointWatch, WatchError};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCall {
    Add(String, String),
    Remove(String, u64),
}

#[derive(Default)]
struct AdminState {
    upstreams: HashMap<String, Vec<Backend>>,
    next_id: u64,
    calls: Vec<AdminCall>,
    status_calls: usize,
    failing_status: usize,
    failing_adds: HashSet<String>,
    failing_removes: HashSet<u64>,
}

/// Load balancer that applies mutations to an in-memory upstream map.
#[derive(Clone, Default)]
pub struct FakeAdmin {
    state: Arc<Mutex<AdminState>>,
}

fn rejected(what: String) -> AdminError {
    AdminError::Status {
        url: "http://fake/upstream_conf".to_string(),
        status: 500,
        body: what,
    }
}

impl FakeAdmin {
    pub fn with_upstream(name: &str, backends: Vec<Backend>) -> Self {
        let admin = Self::default();
        {
            let mut state = admin.state.lock().unwrap();
            state.next_id = backends.iter().map(|b| b.id + 1).max().unwrap_or(0);
            state.upstreams.insert(name.to_string(), backends);
        }
        admin
    }

    pub fn fail_add(&self, server: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_adds
            .insert(server.to_string());
    }

    pub fn fail_remove(&self, id: u64) {
        self.state.lock().unwrap().failing_removes.insert(id);
    }

    /// Make the next `n` status queries fail.
    pub fn fail_status(&self, n: usize) {
        self.state.lock().unwrap().failing_status = n;
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock().unwrap();
        state.failing_status = 0;
        state.failing_adds.clear();
        state.failing_removes.clear();
    }

    pub fn calls(&self) -> Vec<AdminCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn status_calls(&self) -> usize {
        self.state.lock().unwrap().status_calls
    }

    /// Servers currently configured in `upstream`, sorted.
    pub fn servers(&self, upstream: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut servers: Vec<String> = state
            .upstreams
            .get(upstream)
            .map(|b| b.iter().map(|b| b.server.clone()).collect())
            .unwrap_or_default();
        servers.sort();
        servers
    }
}

#[async_trait]
impl UpstreamAdmin for FakeAdmin {
    async fn status(&self) -> Result<UpstreamStatus, AdminError> {
        let mut state = self.state.lock().unwrap();
        state.status_calls += 1;
        if state.failing_status > 0 {
            state.failing_status -= 1;
            return Err(AdminError::Status {
                url: "http://fake/status".to_string(),
                status: 502,
                body: "bad gateway".to_string(),
            });
        }
        Ok(UpstreamStatus {
            upstreams: state.upstreams.clone(),
        })
    }

    async fn add_backend(&self, upstream: &str, server: &str) -> Result<(), AdminError> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(AdminCall::Add(upstream.to_string(), server.to_string()));
        if state.failing_adds.contains(server) {
            return Err(rejected(format!("cannot add {}", server)));
        }
        let id = state.next_id;
        state.next_id += 1;
        state
            .upstreams
            .entry(upstream.to_string())
            .or_default()
            .push(Backend::new(id, server));
        Ok(())
    }

    async fn remove_backend(&self, upstream: &str, id: u64) -> Result<(), AdminError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(AdminCall::Remove(upstream.to_string(), id));
        if state.failing_removes.contains(&id) {
            return Err(rejected(format!("cannot remove #{}", id)));
        }
        if let Some(backends) = state.upstreams.get_mut(upstream) {
            backends.retain(|b| b.id != id);
        }
        Ok(())
    }
}

#[derive(Default)]
struct WatchState {
    events: VecDeque<Result<EndpointSnapshot, WatchError>>,
    received_at: Vec<Instant>,
}

/// Scripted watch stream. Once the script runs out it reports a lost connection.
#[derive(Clone, Default)]
pub struct FakeWatch {
    state: Arc<Mutex<WatchState>>,
}

impl FakeWatch {
    pub fn new(events: Vec<Result<EndpointSnapshot, WatchError>>) -> Self {
        let watch = Self::default();
        watch.state.lock().unwrap().events = events.into();
        watch
    }

    /// Instants at which `next_snapshot` was called.
    pub fn received_at(&self) -> Vec<Instant> {
        self.state.lock().unwrap().received_at.clone()
    }
}

#[async_trait]
impl EndpointWatch for FakeWatch {
    async fn next_snapshot(&mut self) -> Result<EndpointSnapshot, WatchError> {
        let mut state = self.state.lock().unwrap();
        state.received_at.push(Instant::now());
        state
            .events
            .pop_front()
            .unwrap_or_else(|| Err(connection_lost()))
    }
}

pub fn snapshot(service: &str, ips: &[&str]) -> EndpointSnapshot {
    EndpointSnapshot {
        service_name: service.to_string(),
        namespace: Some("default".to_string()),
        event_type: Some("MODIFIED".to_string()),
        subsets: vec![EndpointSubset {
            addresses: ips
                .iter()
                .map(|ip| EndpointAddress { ip: ip.to_string() })
                .collect(),
            ports: vec![],
        }],
    }
}

pub fn decode_error() -> WatchError {
    WatchError::Decode(serde_json::from_str::<serde_json::Value>("{").unwrap_err())
}

pub fn connection_lost() -> WatchError {
    WatchError::ConnectionLost {
        url: "ws://fake/api/v1/watch/endpoints".to_string(),
        attempts: 10,
        reason: "script exhausted".to_string(),
    }
}

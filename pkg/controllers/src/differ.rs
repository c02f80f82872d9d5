use pkg_types::endpoint::{EndpointSnapshot, join_host_port};
use pkg_types::upstream::Backend;
use std::collections::BTreeSet;

/// Server strings an upstream should contain for `snapshot`.
/// Addresses of all subsets are unioned; every address gets `port`.
pub fn desired_set(snapshot: &EndpointSnapshot, port: u16) -> BTreeSet<String> {
    snapshot
        .subsets
        .iter()
        .flat_map(|subset| subset.addresses.iter())
        .map(|addr| join_host_port(&addr.ip, port))
        .collect()
}

/// Changes needed to turn an upstream's backends into the desired set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendDiff {
    /// Servers to register, sorted.
    pub add: Vec<String>,
    /// Backends to remove, in the order the load balancer reported them.
    pub remove: Vec<Backend>,
}

impl BackendDiff {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// Compare desired servers against the backends currently configured.
///
/// A server is added when no backend carries it; a backend is removed when
/// its server is not desired. Matching is exact string equality.
pub fn diff(desired: &BTreeSet<String>, actual: &[Backend]) -> BackendDiff {
    let add = desired
        .iter()
        .filter(|server| !actual.iter().any(|b| &b.server == *server))
        .cloned()
        .collect();
    let remove = actual
        .iter()
        .filter(|b| !desired.contains(&b.server))
        .cloned()
        .collect();
    BackendDiff { add, remove }
}

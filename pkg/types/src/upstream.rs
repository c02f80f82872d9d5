use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One server entry of an upstream group on the load balancer.
///
/// `id` is assigned by the load balancer and only meaningful for removal;
/// `server` is the `ip:port` string used to match desired state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Backend {
    pub id: u64,
    pub server: String,
}

impl Backend {
    pub fn new(id: u64, server: impl Into<String>) -> Self {
        Self {
            id,
            server: server.into(),
        }
    }
}

/// Response of the admin status endpoint: upstream name → backends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamStatus {
    #[serde(default)]
    pub upstreams: HashMap<String, Vec<Backend>>,
}

impl UpstreamStatus {
    /// Backends of the upstream named exactly `name`, if it exists.
    pub fn backends(&self, name: &str) -> Option<&[Backend]> {
        self.upstreams.get(name).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_status_ignores_extra_fields() {
        let raw = r#"{"upstreams":{"web":[
            {"id":0,"server":"10.0.0.1:80","weight":1,"state":"up"},
            {"id":3,"server":"10.0.0.2:80","backup":false}]}}"#;
        let status: UpstreamStatus = serde_json::from_str(raw).unwrap();
        let backends = status.backends("web").unwrap();
        assert_eq!(
            backends,
            &[Backend::new(0, "10.0.0.1:80"), Backend::new(3, "10.0.0.2:80")]
        );
    }

    #[test]
    fn upstream_lookup_is_exact() {
        let raw = r#"{"upstreams":{"web":[]}}"#;
        let status: UpstreamStatus = serde_json::from_str(raw).unwrap();
        assert!(status.backends("web").is_some());
        assert!(status.backends("Web").is_none());
        assert!(status.backends("web ").is_none());
    }

    #[test]
    fn decode_empty_status() {
        let status: UpstreamStatus = serde_json::from_str("{}").unwrap();
        assert!(status.upstreams.is_empty());
    }
}

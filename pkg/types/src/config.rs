use crate::policy::{FailurePolicy, ReconnectPolicy};
use crate::validate::validate_host_port;
use pkg_constants::network::DEFAULT_BACKEND_PORT;
use serde::{Deserialize, Serialize};

/// Sync controller configuration file (YAML).
///
/// Example `config.yaml`:
/// ```yaml
/// watch-server: 127.0.0.1:8080
/// admin-server: 10.0.0.5:9090
/// backend-port: 80
/// reconnect:
///   initial-delay-ms: 500
///   max-delay-ms: 30000
///   max-attempts: 10
/// policy:
///   add-backend: { action: abort }
///   remove-backend: { action: skip }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfigFile {
    #[serde(default, alias = "watch-server")]
    pub watch_server: Option<String>,
    #[serde(default, alias = "admin-server")]
    pub admin_server: Option<String>,
    #[serde(default, alias = "backend-port")]
    pub backend_port: Option<u16>,
    #[serde(default)]
    pub reconnect: Option<ReconnectPolicy>,
    #[serde(default)]
    pub policy: Option<FailurePolicy>,
}

/// Load a YAML config file, returning the default if the file doesn't exist.
pub fn load_config_file<T: serde::de::DeserializeOwned + Default>(path: &str) -> anyhow::Result<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(T::default());
        }
        Err(e) => return Err(e.into()),
    };
    let config: T = serde_yaml::from_str(&content)?;
    Ok(config)
}

/// Resolved configuration handed to the controller. Built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// `host:port` of the orchestrator API serving the endpoints watch.
    pub watch_addr: String,
    /// `host:port` of the load balancer admin interface (status, add, remove).
    pub admin_addr: String,
    pub backend_port: u16,
    pub reconnect: ReconnectPolicy,
    pub policy: FailurePolicy,
}

impl SyncConfig {
    pub fn new(watch_addr: impl Into<String>, admin_addr: impl Into<String>) -> Self {
        Self {
            watch_addr: watch_addr.into(),
            admin_addr: admin_addr.into(),
            backend_port: DEFAULT_BACKEND_PORT,
            reconnect: ReconnectPolicy::default(),
            policy: FailurePolicy::default(),
        }
    }

    /// Check both addresses and the backend port.
    pub fn validate(&self) -> anyhow::Result<()> {
        validate_host_port(&self.watch_addr)
            .map_err(|e| anyhow::anyhow!("invalid watch server: {}", e))?;
        validate_host_port(&self.admin_addr)
            .map_err(|e| anyhow::anyhow!("invalid admin server: {}", e))?;
        if self.backend_port == 0 {
            anyhow::bail!("backend port must not be 0");
        }
        Ok(())
    }
}

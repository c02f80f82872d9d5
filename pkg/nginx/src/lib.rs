//! Client for the load balancer's upstream admin interface.
//!
//! Three operations, all against the same configured `host:port`:
//! - `GET /status` → current upstream → backends mapping
//! - `GET /upstream_conf?add=&upstream=<name>&server=<ip:port>`
//! - `GET /upstream_conf?remove=&upstream=<name>&id=<id>`

use async_trait::async_trait;
use pkg_constants::network::{ADMIN_STATUS_PATH, ADMIN_UPSTREAM_CONF_PATH};
use pkg_types::upstream::UpstreamStatus;
use reqwest::Url;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("invalid admin address '{addr}': {reason}")]
    InvalidAddress { addr: String, reason: String },
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// The admin operations the sync loop needs from the load balancer.
#[async_trait]
pub trait UpstreamAdmin: Send + Sync {
    /// Fetch the current upstream → backends mapping.
    async fn status(&self) -> Result<UpstreamStatus, AdminError>;

    /// Register `server` in `upstream`.
    async fn add_backend(&self, upstream: &str, server: &str) -> Result<(), AdminError>;

    /// Remove the backend with load-balancer id `id` from `upstream`.
    async fn remove_backend(&self, upstream: &str, id: u64) -> Result<(), AdminError>;
}

/// HTTP implementation of [`UpstreamAdmin`]. Each call is an independent request.
#[derive(Clone)]
pub struct NginxAdmin {
    client: reqwest::Client,
    base: Url,
}

impl NginxAdmin {
    /// Create a client for the admin interface at `admin_addr` (`host:port`).
    pub fn new(admin_addr: &str) -> Result<Self, AdminError> {
        let base = Url::parse(&format!("http://{}", admin_addr)).map_err(|e| {
            AdminError::InvalidAddress {
                addr: admin_addr.to_string(),
                reason: e.to_string(),
            }
        })?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(AdminError::Client)?;
        Ok(Self { client, base })
    }

    /// Build `<base><path>?<k>=<v>&...`. Only the query delimiters are escaped
    /// in values, so `ip:port` reaches the admin interface unencoded.
    fn url(&self, path: &str, query: &[(&str, &str)]) -> Url {
        let mut url = self.base.clone();
        url.set_path(path);
        if !query.is_empty() {
            let query = query
                .iter()
                .map(|(key, value)| format!("{}={}", key, escape_value(value)))
                .collect::<Vec<_>>()
                .join("&");
            url.set_query(Some(&query));
        }
        url
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response, AdminError> {
        debug!("GET {}", url);
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| AdminError::Request {
                url: url.to_string(),
                source,
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(AdminError::Status {
                url: url.to_string(),
                status,
                body: body.trim().to_string(),
            });
        }
        Ok(resp)
    }
}

fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '%' => out.push_str("%25"),
            '&' => out.push_str("%26"),
            '+' => out.push_str("%2B"),
            '=' => out.push_str("%3D"),
            '#' => out.push_str("%23"),
            _ => out.push(c),
        }
    }
    out
}

#[async_trait]
impl UpstreamAdmin for NginxAdmin {
    async fn status(&self) -> Result<UpstreamStatus, AdminError> {
        let url = self.url(ADMIN_STATUS_PATH, &[]);
        let resp = self.get(url.clone()).await?;
        resp.json::<UpstreamStatus>()
            .await
            .map_err(|source| AdminError::Decode {
                url: url.to_string(),
                source,
            })
    }

    async fn add_backend(&self, upstream: &str, server: &str) -> Result<(), AdminError> {
        let url = self.url(
            ADMIN_UPSTREAM_CONF_PATH,
            &[("add", ""), ("upstream", upstream), ("server", server)],
        );
        self.get(url).await?;
        Ok(())
    }

    async fn remove_backend(&self, upstream: &str, id: u64) -> Result<(), AdminError> {
        let id = id.to_string();
        let url = self.url(
            ADMIN_UPSTREAM_CONF_PATH,
            &[("remove", ""), ("upstream", upstream), ("id", &id)],
        );
        self.get(url).await?;
        Ok(())
    }
}

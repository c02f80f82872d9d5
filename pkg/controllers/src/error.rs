use pkg_nginx::AdminError;
use pkg_watch::WatchError;

/// Errors that stop the sync loop.
///
/// Whether a given failure becomes one of these is decided by the
/// [`FailurePolicy`](pkg_types::policy::FailurePolicy); only `abort`
/// actions and an exhausted watch reconnect budget get here.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("endpoint watch failed: {0}")]
    Watch(#[source] WatchError),
    #[error("upstream status query failed: {0}")]
    Status(#[source] AdminError),
    #[error("failed to add backend {server} to upstream {upstream}: {source}")]
    AddBackend {
        upstream: String,
        server: String,
        #[source]
        source: AdminError,
    },
    #[error("failed to remove backend #{id} ({server}) from upstream {upstream}: {source}")]
    RemoveBackend {
        upstream: String,
        id: u64,
        server: String,
        #[source]
        source: AdminError,
    },
}

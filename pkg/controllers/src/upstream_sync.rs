use crate::differ::{desired_set, diff};
use crate::error::SyncError;
use crate::reconciler::Reconciler;
use pkg_nginx::UpstreamAdmin;
use pkg_types::config::SyncConfig;
use pkg_types::policy::{FailureAction, FailurePolicy, Operation};
use pkg_watch::EndpointWatch;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How a single reconciliation cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The diff was applied (possibly with skipped failures).
    Reconciled {
        upstream: String,
        added: usize,
        removed: usize,
        skipped: usize,
    },
    /// The load balancer has no upstream named after the service.
    NoMatchingUpstream { service: String },
    /// An operation failed under a `backoff` policy; wait before the next cycle.
    Backoff { operation: Operation, delay: Duration },
    /// An operation failed under a `skip` policy; the next cycle starts immediately.
    Skipped { operation: Operation },
}

/// Keeps one load balancer's upstreams in sync with the endpoints watch.
///
/// Each cycle: receive a snapshot → query upstream status → diff → add
/// missing servers → remove stale backends. Cycles run strictly one after
/// another; the only waits are the I/O calls and policy backoffs.
pub struct UpstreamSyncController<W, A> {
    watch: W,
    admin: A,
    policy: FailurePolicy,
    backend_port: u16,
}

impl<W: EndpointWatch, A: UpstreamAdmin> UpstreamSyncController<W, A> {
    pub fn new(watch: W, admin: A, config: &SyncConfig) -> Self {
        Self {
            watch,
            admin,
            policy: config.policy,
            backend_port: config.backend_port,
        }
    }

    /// Run cycles until a fatal error occurs.
    pub async fn run(mut self) -> Result<(), SyncError> {
        info!(
            "UpstreamSyncController started (backend port {}, add failures: {}, remove failures: {})",
            self.backend_port, self.policy.add_backend, self.policy.remove_backend
        );
        if !self.policy.add_backend.is_fatal() {
            warn!("Add failures are not fatal; upstreams may stay partially registered");
        }
        loop {
            if let CycleOutcome::Backoff { delay, .. } = self.run_cycle().await? {
                tokio::time::sleep(delay).await;
            }
        }
    }

    /// One pass: receive → query → diff → reconcile.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, SyncError> {
        let snapshot = match self.watch.next_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) if e.is_transient() => {
                return self.cycle_failure(Operation::WatchDecode, SyncError::Watch(e));
            }
            Err(e) => {
                error!("Endpoint watch lost: {}", e);
                return Err(SyncError::Watch(e));
            }
        };
        let upstream = snapshot.service_name.as_str();
        debug!(
            "Snapshot for {} with {} addresses",
            upstream,
            snapshot.address_count()
        );

        let status = match self.admin.status().await {
            Ok(status) => status,
            Err(e) => return self.cycle_failure(Operation::StatusQuery, SyncError::Status(e)),
        };

        let Some(actual) = status.backends(upstream) else {
            info!("No matching upstream for service {}, skipping", upstream);
            return Ok(CycleOutcome::NoMatchingUpstream {
                service: upstream.to_string(),
            });
        };

        let desired = desired_set(&snapshot, self.backend_port);
        let changes = diff(&desired, actual);
        if changes.is_empty() {
            debug!("Upstream {} in sync ({} backends)", upstream, actual.len());
        }

        let reconciler = Reconciler::new(&self.admin, &self.policy);

        let adds = reconciler.apply_adds(upstream, &changes.add).await?;
        if let Some(delay) = adds.backoff {
            return Ok(CycleOutcome::Backoff {
                operation: Operation::AddBackend,
                delay,
            });
        }

        let removals = reconciler.apply_removals(upstream, &changes.remove).await?;
        if let Some(delay) = removals.backoff {
            return Ok(CycleOutcome::Backoff {
                operation: Operation::RemoveBackend,
                delay,
            });
        }

        if !changes.is_empty() {
            info!(
                "Upstream {} reconciled: {} added, {} removed, {} failed",
                upstream,
                adds.applied,
                removals.applied,
                adds.skipped + removals.skipped
            );
        }
        Ok(CycleOutcome::Reconciled {
            upstream: upstream.to_string(),
            added: adds.applied,
            removed: removals.applied,
            skipped: adds.skipped + removals.skipped,
        })
    }

    /// Apply the policy for a failure that ends the cycle before any mutation.
    fn cycle_failure(&self, op: Operation, err: SyncError) -> Result<CycleOutcome, SyncError> {
        match self.policy.action(op) {
            FailureAction::Abort => {
                error!("{} failed, aborting: {}", op, err);
                Err(err)
            }
            FailureAction::Skip => {
                warn!("{} failed, skipping cycle: {}", op, err);
                Ok(CycleOutcome::Skipped { operation: op })
            }
            FailureAction::Backoff { delay_ms } => {
                warn!("{} failed, retrying in {}ms: {}", op, delay_ms, err);
                Ok(CycleOutcome::Backoff {
                    operation: op,
                    delay: Duration::from_millis(delay_ms),
                })
            }
        }
    }
}

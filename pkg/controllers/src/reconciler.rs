use crate::error::SyncError;
use pkg_nginx::{AdminError, UpstreamAdmin};
use pkg_types::policy::{FailureAction, FailurePolicy, Operation};
use pkg_types::upstream::Backend;
use std::time::Duration;
use tracing::{error, info, warn};

/// Outcome of one reconcile phase (all adds, or all removals).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseReport {
    /// Mutations the admin interface accepted.
    pub applied: usize,
    /// Failed mutations the policy chose to skip.
    pub skipped: usize,
    /// Set when a failure's policy is `backoff`: the phase stopped early and
    /// the rest of the cycle must be abandoned after waiting this long.
    pub backoff: Option<Duration>,
}

/// What to do with the rest of a phase after one failed mutation.
enum Next {
    Continue,
    Stop(Duration),
    Abort,
}

/// Applies add/remove mutations for one upstream, consulting the policy
/// table on every failure.
pub struct Reconciler<'a, A: UpstreamAdmin + ?Sized> {
    admin: &'a A,
    policy: &'a FailurePolicy,
}

impl<'a, A: UpstreamAdmin + ?Sized> Reconciler<'a, A> {
    pub fn new(admin: &'a A, policy: &'a FailurePolicy) -> Self {
        Self { admin, policy }
    }

    /// Register every server in `servers`, in order.
    pub async fn apply_adds(
        &self,
        upstream: &str,
        servers: &[String],
    ) -> Result<PhaseReport, SyncError> {
        let mut report = PhaseReport::default();
        for server in servers {
            info!("Registering backend {} with {}", server, upstream);
            match self.admin.add_backend(upstream, server).await {
                Ok(()) => report.applied += 1,
                Err(source) => match self.on_failure(Operation::AddBackend, &source) {
                    Next::Continue => report.skipped += 1,
                    Next::Stop(delay) => {
                        report.backoff = Some(delay);
                        return Ok(report);
                    }
                    Next::Abort => {
                        return Err(SyncError::AddBackend {
                            upstream: upstream.to_string(),
                            server: server.clone(),
                            source,
                        });
                    }
                },
            }
        }
        Ok(report)
    }

    /// Remove every backend in `backends`, in order.
    pub async fn apply_removals(
        &self,
        upstream: &str,
        backends: &[Backend],
    ) -> Result<PhaseReport, SyncError> {
        let mut report = PhaseReport::default();
        for backend in backends {
            info!(
                "Removing backend {} [#{}] from {}",
                backend.server, backend.id, upstream
            );
            match self.admin.remove_backend(upstream, backend.id).await {
                Ok(()) => report.applied += 1,
                Err(source) => match self.on_failure(Operation::RemoveBackend, &source) {
                    Next::Continue => report.skipped += 1,
                    Next::Stop(delay) => {
                        report.backoff = Some(delay);
                        return Ok(report);
                    }
                    Next::Abort => {
                        return Err(SyncError::RemoveBackend {
                            upstream: upstream.to_string(),
                            id: backend.id,
                            server: backend.server.clone(),
                            source,
                        });
                    }
                },
            }
        }
        Ok(report)
    }

    fn on_failure(&self, op: Operation, source: &AdminError) -> Next {
        match self.policy.action(op) {
            FailureAction::Abort => {
                error!("{} failed, aborting: {}", op, source);
                Next::Abort
            }
            FailureAction::Skip => {
                warn!("{} failed, skipping: {}", op, source);
                Next::Continue
            }
            FailureAction::Backoff { delay_ms } => {
                warn!(
                    "{} failed, abandoning cycle for {}ms: {}",
                    op, delay_ms, source
                );
                Next::Stop(Duration::from_millis(delay_ms))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{AdminCall, FakeAdmin};

    fn servers(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_adds_in_order() {
        let admin = FakeAdmin::with_upstream("web", vec![]);
        let policy = FailurePolicy::default();
        let reconciler = Reconciler::new(&admin, &policy);

        let report = reconciler
            .apply_adds("web", &servers(&["10.0.0.1:80", "10.0.0.2:80"]))
            .await
            .unwrap();

        assert_eq!(report.applied, 2);
        assert_eq!(report.skipped, 0);
        assert_eq!(
            admin.calls(),
            vec![
                AdminCall::Add("web".into(), "10.0.0.1:80".into()),
                AdminCall::Add("web".into(), "10.0.0.2:80".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_add_failure_aborts_by_default() {
        let admin = FakeAdmin::with_upstream("web", vec![]);
        admin.fail_add("10.0.0.1:80");
        let policy = FailurePolicy::default();
        let reconciler = Reconciler::new(&admin, &policy);

        let err = reconciler
            .apply_adds("web", &servers(&["10.0.0.1:80", "10.0.0.2:80"]))
            .await
            .unwrap_err();

        match err {
            SyncError::AddBackend {
                upstream, server, ..
            } => {
                assert_eq!(upstream, "web");
                assert_eq!(server, "10.0.0.1:80");
            }
            other => panic!("unexpected error: {}", other),
        }
        // Nothing after the failed add was attempted
        assert_eq!(admin.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_add_failure_skip_policy() {
        let admin = FakeAdmin::with_upstream("web", vec![]);
        admin.fail_add("10.0.0.1:80");
        let policy = FailurePolicy {
            add_backend: FailureAction::Skip,
            ..Default::default()
        };
        let reconciler = Reconciler::new(&admin, &policy);

        let report = reconciler
            .apply_adds("web", &servers(&["10.0.0.1:80", "10.0.0.2:80"]))
            .await
            .unwrap();

        assert_eq!(report.applied, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.backoff, None);
        assert_eq!(admin.servers("web"), vec!["10.0.0.2:80".to_string()]);
    }

    #[tokio::test]
    async fn test_add_failure_backoff_policy_stops_phase() {
        let admin = FakeAdmin::with_upstream("web", vec![]);
        admin.fail_add("10.0.0.1:80");
        let policy = FailurePolicy {
            add_backend: FailureAction::Backoff { delay_ms: 750 },
            ..Default::default()
        };
        let reconciler = Reconciler::new(&admin, &policy);

        let report = reconciler
            .apply_adds("web", &servers(&["10.0.0.1:80", "10.0.0.2:80"]))
            .await
            .unwrap();

        assert_eq!(report.applied, 0);
        assert_eq!(report.backoff, Some(Duration::from_millis(750)));
        assert_eq!(admin.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_failure_skipped_by_default() {
        let admin = FakeAdmin::with_upstream(
            "web",
            vec![
                Backend::new(1, "10.0.0.1:80"),
                Backend::new(2, "10.0.0.2:80"),
                Backend::new(3, "10.0.0.3:80"),
            ],
        );
        admin.fail_remove(2);
        let policy = FailurePolicy::default();
        let reconciler = Reconciler::new(&admin, &policy);

        let remove = vec![
            Backend::new(1, "10.0.0.1:80"),
            Backend::new(2, "10.0.0.2:80"),
            Backend::new(3, "10.0.0.3:80"),
        ];
        let report = reconciler.apply_removals("web", &remove).await.unwrap();

        assert_eq!(report.applied, 2);
        assert_eq!(report.skipped, 1);
        // The stale backend stays until a later cycle succeeds
        assert_eq!(admin.servers("web"), vec!["10.0.0.2:80".to_string()]);
        assert_eq!(
            admin.calls(),
            vec![
                AdminCall::Remove("web".into(), 1),
                AdminCall::Remove("web".into(), 2),
                AdminCall::Remove("web".into(), 3),
            ]
        );
    }

    #[tokio::test]
    async fn test_remove_failure_abort_policy() {
        let admin = FakeAdmin::with_upstream("web", vec![Backend::new(7, "10.0.0.7:80")]);
        admin.fail_remove(7);
        let policy = FailurePolicy {
            remove_backend: FailureAction::Abort,
            ..Default::default()
        };
        let reconciler = Reconciler::new(&admin, &policy);

        let err = reconciler
            .apply_removals("web", &[Backend::new(7, "10.0.0.7:80")])
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::RemoveBackend { id: 7, .. }));
    }

    #[tokio::test]
    async fn test_empty_phases_issue_no_calls() {
        let admin = FakeAdmin::with_upstream("web", vec![]);
        let policy = FailurePolicy::default();
        let reconciler = Reconciler::new(&admin, &policy);

        assert_eq!(
            reconciler.apply_adds("web", &[]).await.unwrap(),
            PhaseReport::default()
        );
        assert_eq!(
            reconciler.apply_removals("web", &[]).await.unwrap(),
            PhaseReport::default()
        );
        assert!(admin.calls().is_empty());
    }
}

//! Execution engine - fetches state, invokes the planned mutation, verifies
//! ambiguous failures and runs independent requests in parallel

use crate::context::{AccessBackend, ProgressCallback};
use crate::diff::AccessDiff;
use crate::error::{ErrorKind, InvokeError};
use crate::planner::{Plan, plan, resolve_targets};
use crate::report::ReportBase;
use crate::types::{
    AccessState, Annotation, DesiredState, ReconcileOptions, ReconciliationResult, UserStatus,
};
use anyhow::Result;
use rayon::prelude::*;
use std::thread;
use std::time::Duration;

/// Outcome of invoking one mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// The remote reported success
    Applied,
    /// The remote reported an ambiguous error, but re-reading state showed progress
    Confirmed(Annotation),
    /// Genuine failure
    Failed(InvokeError),
}

/// Read a user's current access, treating any failure as "no access"
///
/// Read-side errors are safe to swallow: an empty state only ever leads to
/// a full-target mutation, which is idempotent on the remote.
pub fn fetch_access_state<B: AccessBackend + ?Sized>(backend: &B, user: &str) -> AccessState {
    match backend.fetch_access(user) {
        Ok(state) => {
            log::info!(
                "User {} has access to {} libraries on {}: {}",
                user,
                state.len(),
                backend.server_name(),
                state
            );
            state
        }
        Err(e) => {
            log::warn!(
                "Could not read current access for {} on {}: {}",
                user,
                backend.server_name(),
                e
            );
            AccessState::empty()
        }
    }
}

/// Run the single mutation of a plan, verifying ambiguous failures
///
/// Only [`ErrorKind::AmbiguousRemoteError`] triggers verification; every
/// other error is returned as-is without touching the remote again.
pub fn invoke<B: AccessBackend + ?Sized>(
    backend: &B,
    user: &str,
    plan: &Plan,
    original: &AccessState,
    opts: &ReconcileOptions,
) -> Invocation {
    let outcome = match plan {
        Plan::Invite { target } => backend.invite(user, target),
        Plan::Update { target } => backend.update(user, target),
        other => {
            return Invocation::Failed(InvokeError::new(
                ErrorKind::IllegalStateTransition,
                format!("plan {other:?} has no mutation to invoke"),
            ));
        }
    };

    match outcome {
        Ok(()) => Invocation::Applied,
        Err(e) if e.kind.needs_verification() => {
            log::info!(
                "Got ambiguous error from {}, verifying: {}",
                backend.server_name(),
                e
            );
            // target() is Some for both mutation plans matched above
            let target = plan.target().cloned().unwrap_or_default();
            match verify_after_ambiguous(backend, user, &target, original, opts.verify_delay) {
                Some(annotation) => Invocation::Confirmed(annotation),
                None => {
                    log::error!("No access change detected, ambiguous error was a real failure");
                    Invocation::Failed(e)
                }
            }
        }
        Err(e) => {
            log::error!("Remote error on {}: {}", backend.server_name(), e);
            Invocation::Failed(e)
        }
    }
}

/// Re-read state after an ambiguous error and decide whether progress happened
fn verify_after_ambiguous<B: AccessBackend + ?Sized>(
    backend: &B,
    user: &str,
    target: &DesiredState,
    original: &AccessState,
    delay: Duration,
) -> Option<Annotation> {
    if !delay.is_zero() {
        log::info!(
            "Waiting {}s for changes to propagate...",
            delay.as_secs_f64()
        );
        thread::sleep(delay);
    }

    // A failed re-read confirms nothing, so the original error stands
    let observed = match backend.fetch_access(user) {
        Ok(state) => state,
        Err(e) => {
            log::warn!(
                "Could not re-read access for {} on {}: {}",
                user,
                backend.server_name(),
                e
            );
            return None;
        }
    };
    log::info!(
        "Verification: original {}, expected {}, actual {}",
        original,
        target,
        observed
    );

    if observed.matches(target) {
        Some(Annotation::AmbiguousErrorSuppressed)
    } else if observed != *original {
        log::warn!("Libraries changed but not exactly as expected");
        Some(Annotation::Partial)
    } else {
        None
    }
}

/// Reconcile one user's access on one server
///
/// Never returns an error: every failure is represented in the result.
pub fn reconcile_user<B: AccessBackend + ?Sized>(
    backend: &B,
    user: &str,
    desired: &DesiredState,
    opts: &ReconcileOptions,
) -> ReconciliationResult {
    let server = backend.server_name();
    log::info!("Processing {user} on {server} with libraries {desired}");

    let status = match backend.probe_user(user) {
        Ok(status) => status,
        Err(e) => {
            log::error!("Could not determine status of {user} on {server}: {e}");
            UserStatus::Unknown
        }
    };
    log::debug!("User {user} is {status} on {server}");

    let current = fetch_access_state(backend, user);
    let mut report = ReportBase::new(server, current.clone(), desired.clone());

    let planned = match plan(status, &current, desired) {
        Plan::NoChange => return report.no_change("user already has the requested access"),
        Plan::Pending => return report.pending(),
        Plan::Fail { kind, detail } => return report.failed(kind, &detail),
        mutation => mutation,
    };

    let planned = match planned.target() {
        Some(target) if !target.is_empty() => {
            let available = match backend.list_resources() {
                Ok(available) => available,
                Err(e) => return report.failed(e.kind, &e.message),
            };
            match resolve_targets(target, &available) {
                Ok(resolution) => {
                    if !resolution.dropped.is_empty() {
                        report.annotate(Annotation::UnresolvedDropped);
                    }
                    if current.matches(&resolution.target) {
                        return report.no_change("user already has every valid requested library");
                    }
                    planned.with_target(resolution.target)
                }
                Err(e) => return report.failed(e.kind, &e.message),
            }
        }
        _ => planned,
    };

    let target = planned.target().cloned().unwrap_or_default();
    let diff = AccessDiff::between(&current, &target);
    log::info!(
        "Changes needed for {user}: {} -> {} ({})",
        current,
        target,
        diff.summary()
    );

    if opts.dry_run {
        return report.planned(&planned);
    }

    match invoke(backend, user, &planned, &current, opts) {
        Invocation::Applied => {
            let detail = if diff.is_revoke_only() {
                format!("removed {} libraries from {user}", diff.revoke.len())
            } else {
                format!("shared {} libraries with {user}", target.len())
            };
            report.applied(&planned, detail)
        }
        Invocation::Confirmed(annotation) => {
            report.annotate(annotation);
            let detail = match annotation {
                Annotation::Partial => {
                    format!("shared libraries with {user} (ambiguous error, partial change)")
                }
                _ => format!(
                    "shared {} libraries with {user} (ambiguous error suppressed)",
                    target.len()
                ),
            };
            report.applied(&planned, detail)
        }
        Invocation::Failed(e) => report.failed(e.kind, &e.message),
    }
}

/// One independent (user, server) reconciliation
#[derive(Debug, Clone)]
pub struct ReconcileRequest<B> {
    pub backend: B,
    pub user: String,
    pub desired: DesiredState,
}

/// Reconcile many independent requests with at most `jobs` in flight
///
/// Results are returned in input order.
pub fn reconcile_all<B, P>(
    requests: &[ReconcileRequest<B>],
    jobs: usize,
    opts: &ReconcileOptions,
    progress: &mut P,
) -> Result<Vec<ReconciliationResult>>
where
    B: AccessBackend,
    P: ProgressCallback,
{
    progress.on_batch_start(requests.len());

    let results: Vec<ReconciliationResult> = if jobs <= 1 || requests.len() <= 1 {
        requests
            .iter()
            .map(|r| reconcile_user(&r.backend, &r.user, &r.desired, opts))
            .collect()
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create thread pool: {}", e))?;

        pool.install(|| {
            requests
                .par_iter()
                .map(|r| reconcile_user(&r.backend, &r.user, &r.desired, opts))
                .collect()
        })
    };

    for (request, result) in requests.iter().zip(&results) {
        progress.on_request_complete(&request.user, result);
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NoProgress;
    use crate::mock::{MockBackend, MockCall};
    use crate::types::Action;

    fn opts() -> ReconcileOptions {
        ReconcileOptions {
            verify_delay: Duration::ZERO,
            dry_run: false,
        }
    }

    #[test]
    fn test_fetch_failure_is_empty_state() {
        let backend = MockBackend::new("Plex 1").with_libraries(["1"]);
        backend.fail_fetches(InvokeError::network("timed out"));
        assert!(fetch_access_state(&backend, "a@example.com").is_empty());
    }

    #[test]
    fn test_invoke_rejects_non_mutation_plan() {
        let backend = MockBackend::new("Plex 1");
        let outcome = invoke(
            &backend,
            "a",
            &Plan::Pending,
            &AccessState::empty(),
            &opts(),
        );
        match outcome {
            Invocation::Failed(e) => assert_eq!(e.kind, ErrorKind::IllegalStateTransition),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(backend.mutation_count(), 0);
    }

    #[test]
    fn test_non_ambiguous_error_skips_verification() {
        let backend = MockBackend::new("Plex 1").with_libraries(["1", "2"]);
        backend.set_user("a", UserStatus::Existing, ["1"]);
        backend.fail_next_mutation(InvokeError::network("connection reset"), false);

        let result = reconcile_user(&backend, "a", &["1", "2"].into_iter().collect(), &opts());
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::TransientNetwork));
        // probe + fetch + list + update; no second fetch
        let fetches = backend
            .calls()
            .iter()
            .filter(|c| matches!(c, MockCall::FetchAccess(_)))
            .count();
        assert_eq!(fetches, 1);
        assert_eq!(backend.mutation_count(), 1);
    }

    #[test]
    fn test_failed_reread_keeps_ambiguous_error() {
        let backend = MockBackend::new("Plex 1").with_libraries(["1", "2", "3"]);
        backend.set_user("a", UserStatus::Existing, ["1", "2"]);
        backend.fail_next_mutation(InvokeError::ambiguous("(404) not_found"), false);
        backend.fail_fetches_after(1, InvokeError::network("connection reset"));

        let result = reconcile_user(&backend, "a", &["3"].into_iter().collect(), &opts());
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::AmbiguousRemoteError));
        assert!(result.annotations.is_empty());
        assert_eq!(
            backend.access_of("a"),
            ["1", "2"].into_iter().collect::<AccessState>()
        );
    }

    #[test]
    fn test_partial_change_is_success() {
        let backend = MockBackend::new("Plex 1").with_libraries(["1", "2", "3"]);
        backend.set_user("a", UserStatus::Existing, ["1"]);
        backend.fail_next_mutation_with_state(InvokeError::ambiguous("(404) not_found"), ["2"]);

        let target: DesiredState = ["2", "3"].into_iter().collect();
        let result = reconcile_user(&backend, "a", &target, &opts());
        assert!(result.success);
        assert!(result.has_annotation(Annotation::Partial));
        assert_eq!(result.action, Action::Updated);
    }

    #[test]
    fn test_dry_run_plans_without_mutation() {
        let backend = MockBackend::new("Plex 1").with_libraries(["5"]);
        let options = ReconcileOptions {
            dry_run: true,
            ..opts()
        };
        let desired: DesiredState = ["5"].into_iter().collect();
        let result = reconcile_user(&backend, "new@example.com", &desired, &options);
        assert_eq!(result.action, Action::Invited);
        assert_eq!(result.detail, "dry run");
        assert_eq!(backend.mutation_count(), 0);
    }

    #[test]
    fn test_partially_invalid_request_drops_and_annotates() {
        let backend = MockBackend::new("Plex 1").with_libraries(["1", "2"]);
        backend.set_user("a", UserStatus::Existing, ["1"]);

        let desired: DesiredState = ["1", "2", "99"].into_iter().collect();
        let result = reconcile_user(&backend, "a", &desired, &opts());
        assert!(result.success);
        assert_eq!(result.libraries, vec!["1", "2"]);
        assert!(result.has_annotation(Annotation::UnresolvedDropped));
    }

    #[test]
    fn test_resolution_to_current_state_is_no_change() {
        let backend = MockBackend::new("Plex 1").with_libraries(["1"]);
        backend.set_user("a", UserStatus::Existing, ["1"]);

        let result = reconcile_user(&backend, "a", &["1", "99"].into_iter().collect(), &opts());
        assert_eq!(result.action, Action::NoChange);
        assert_eq!(backend.mutation_count(), 0);
    }

    #[test]
    fn test_probe_failure_reports_unknown() {
        let backend = MockBackend::new("Plex 1").with_libraries(["1"]);
        backend.fail_probes(InvokeError::network("dns failure"));

        let result = reconcile_user(&backend, "a", &["1"].into_iter().collect(), &opts());
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::Unknown));
    }

    #[test]
    fn test_reconcile_all_preserves_order() {
        let backends: Vec<MockBackend> = (0..6)
            .map(|i| MockBackend::new(format!("Plex {i}")).with_libraries(["1"]))
            .collect();
        let requests: Vec<ReconcileRequest<&MockBackend>> = backends
            .iter()
            .enumerate()
            .map(|(i, b)| ReconcileRequest {
                backend: b,
                user: format!("user{i}@example.com"),
                desired: ["1"].into_iter().collect(),
            })
            .collect();

        let results = reconcile_all(&requests, 3, &opts(), &mut NoProgress).unwrap();
        assert_eq!(results.len(), 6);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.server, format!("Plex {i}"));
            assert_eq!(result.action, Action::Invited);
        }
    }
}

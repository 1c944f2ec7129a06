//! End-to-end reconciliation scenarios against the in-memory backend

use reconcile::{
    AccessBackend, Action, Annotation, DesiredState, ErrorKind, InvokeError, MockBackend,
    MockCall, NoProgress, ProgressCallback, ReconcileOptions, ReconcileRequest,
    ReconciliationResult, UserStatus, reconcile_all, reconcile_user,
};
use std::time::Duration;

const USER: &str = "friend@example.com";

fn opts() -> ReconcileOptions {
    ReconcileOptions {
        verify_delay: Duration::ZERO,
        dry_run: false,
    }
}

fn desired<const N: usize>(ids: [&str; N]) -> DesiredState {
    ids.into_iter().collect()
}

fn server() -> MockBackend {
    MockBackend::new("Plex 1").with_libraries(["1", "2", "3", "5"])
}

#[test]
fn converged_user_makes_no_mutation() {
    let backend = server();
    backend.set_user(USER, UserStatus::Existing, ["1", "2"]);

    let result = reconcile_user(&backend, USER, &desired(["1", "2"]), &opts());

    assert!(result.success);
    assert_eq!(result.action, Action::NoChange);
    assert_eq!(result.libraries, vec!["1", "2"]);
    assert_eq!(backend.mutation_count(), 0);
    // no library listing needed when nothing changes
    assert!(!backend.calls().contains(&MockCall::ListResources));
}

#[test]
fn new_user_is_invited_with_target() {
    let backend = server();

    let result = reconcile_user(&backend, USER, &desired(["5"]), &opts());

    assert!(result.success);
    assert_eq!(result.action, Action::Invited);
    assert_eq!(result.libraries, vec!["5"]);
    assert!(result.previous.is_empty());
    assert_eq!(
        backend
            .calls()
            .into_iter()
            .filter(MockCall::is_mutation)
            .collect::<Vec<_>>(),
        vec![MockCall::Invite(USER.to_string(), desired(["5"]))]
    );
}

#[test]
fn empty_target_revokes_everything_with_one_update() {
    let backend = server();
    backend.set_user(USER, UserStatus::Existing, ["1", "2", "3"]);

    let result = reconcile_user(&backend, USER, &DesiredState::default(), &opts());

    assert!(result.success);
    assert_eq!(result.action, Action::Updated);
    assert!(result.libraries.is_empty());
    assert_eq!(backend.mutation_count(), 1);
    assert!(
        backend
            .calls()
            .contains(&MockCall::Update(USER.to_string(), DesiredState::default()))
    );
    assert!(backend.access_of(USER).is_empty());
    assert_eq!(result.detail, format!("removed 3 libraries from {USER}"));
}

#[test]
fn existing_user_gets_full_target_in_single_update() {
    let backend = server();
    backend.set_user(USER, UserStatus::Existing, ["1", "2"]);

    let result = reconcile_user(&backend, USER, &desired(["2", "3", "5"]), &opts());

    assert!(result.success);
    assert_eq!(result.action, Action::Updated);
    assert_eq!(backend.mutation_count(), 1);
    // full target, not a diff
    assert!(
        backend
            .calls()
            .contains(&MockCall::Update(USER.to_string(), desired(["2", "3", "5"])))
    );
}

#[test]
fn existing_user_without_access_is_granted() {
    let backend = server();
    backend.set_user(USER, UserStatus::Existing, Vec::<String>::new());

    let result = reconcile_user(&backend, USER, &desired(["1"]), &opts());

    assert_eq!(result.action, Action::Granted);
}

#[test]
fn unresolvable_request_fails_without_mutation() {
    let backend = server();

    let result = reconcile_user(&backend, USER, &desired(["99"]), &opts());

    assert!(!result.success);
    assert_eq!(result.action, Action::Error);
    assert_eq!(result.error_kind, Some(ErrorKind::InvalidResourceSet));
    assert_eq!(backend.mutation_count(), 0);
}

#[test]
fn ambiguous_error_with_applied_change_is_success() {
    let backend = server();
    backend.set_user(USER, UserStatus::Existing, ["1"]);
    backend.fail_next_mutation(InvokeError::ambiguous("(404) not_found"), true);

    let result = reconcile_user(&backend, USER, &desired(["1", "2"]), &opts());

    assert!(result.success);
    assert_eq!(result.action, Action::Updated);
    assert!(result.has_annotation(Annotation::AmbiguousErrorSuppressed));
    assert!(result.error_kind.is_none());
}

#[test]
fn ambiguous_error_without_change_is_failure() {
    let backend = server();
    backend.set_user(USER, UserStatus::Existing, ["1"]);
    backend.fail_next_mutation(InvokeError::ambiguous("(404) not_found"), false);

    let result = reconcile_user(&backend, USER, &desired(["1", "2"]), &opts());

    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::AmbiguousRemoteError));
    assert!(result.annotations.is_empty());
    // one fetch before the mutation, one to verify
    let fetches = backend
        .calls()
        .iter()
        .filter(|c| matches!(c, MockCall::FetchAccess(_)))
        .count();
    assert_eq!(fetches, 2);
}

#[test]
fn unreadable_state_after_ambiguous_revoke_is_failure() {
    let backend = server();
    backend.set_user(USER, UserStatus::Existing, ["1", "2"]);
    backend.fail_next_mutation(InvokeError::ambiguous("(404) not_found"), false);
    backend.fail_fetches_after(1, InvokeError::network("connection reset"));

    let result = reconcile_user(&backend, USER, &DesiredState::default(), &opts());

    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::AmbiguousRemoteError));
    assert!(!result.has_annotation(Annotation::AmbiguousErrorSuppressed));
    assert_eq!(backend.mutation_count(), 1);
}

#[test]
fn pending_invite_is_never_mutated() {
    let backend = server();
    backend.set_user(USER, UserStatus::PendingInvite, Vec::<String>::new());

    let result = reconcile_user(&backend, USER, &desired(["1", "2"]), &opts());

    assert!(result.success);
    assert_eq!(result.action, Action::Pending);
    assert_eq!(backend.mutation_count(), 0);
}

#[test]
fn listing_failure_reports_error_kind() {
    let backend = server();
    backend.set_user(USER, UserStatus::Existing, ["1"]);
    backend.fail_listing(InvokeError::network("connection refused"));

    let result = reconcile_user(&backend, USER, &desired(["1", "2"]), &opts());

    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::TransientNetwork));
    assert_eq!(backend.mutation_count(), 0);
}

#[test]
fn second_run_after_convergence_is_no_change() {
    let backend = server();
    backend.set_user(USER, UserStatus::Existing, ["1"]);

    let first = reconcile_user(&backend, USER, &desired(["2", "3"]), &opts());
    let second = reconcile_user(&backend, USER, &desired(["2", "3"]), &opts());

    assert_eq!(first.action, Action::Updated);
    assert_eq!(second.action, Action::NoChange);
    assert_eq!(backend.mutation_count(), 1);
}

#[derive(Default)]
struct Recorder {
    expected: usize,
    seen: Vec<(String, Action)>,
}

impl ProgressCallback for Recorder {
    fn on_batch_start(&mut self, count: usize) {
        self.expected = count;
    }

    fn on_request_complete(&mut self, user: &str, result: &ReconciliationResult) {
        self.seen.push((user.to_string(), result.action));
    }
}

#[test]
fn two_servers_reconcile_independently() {
    let regular = server();
    let fourk = MockBackend::new("Plex 4K").with_libraries(["7", "8"]);
    regular.set_user(USER, UserStatus::Existing, ["1"]);
    fourk.set_user(USER, UserStatus::PendingInvite, Vec::<String>::new());

    let backends: Vec<Box<dyn AccessBackend>> = vec![Box::new(regular), Box::new(fourk)];
    let requests: Vec<ReconcileRequest<&dyn AccessBackend>> = backends
        .iter()
        .zip([desired(["1", "2"]), desired(["7"])])
        .map(|(backend, target)| ReconcileRequest {
            backend: backend.as_ref(),
            user: USER.to_string(),
            desired: target,
        })
        .collect();

    let mut recorder = Recorder::default();
    let results = reconcile_all(&requests, 2, &opts(), &mut recorder).unwrap();

    assert_eq!(results[0].server, "Plex 1");
    assert_eq!(results[0].action, Action::Updated);
    assert_eq!(results[1].server, "Plex 4K");
    assert_eq!(results[1].action, Action::Pending);
    assert_eq!(recorder.expected, 2);
    assert_eq!(recorder.seen.len(), 2);
}

#[test]
fn sequential_batch_matches_parallel() {
    let backend = server();
    let requests: Vec<ReconcileRequest<&MockBackend>> = ["a@example.com", "b@example.com"]
        .iter()
        .map(|user| ReconcileRequest {
            backend: &backend,
            user: (*user).to_string(),
            desired: desired(["1"]),
        })
        .collect();

    let results = reconcile_all(&requests, 1, &opts(), &mut NoProgress).unwrap();

    assert!(results.iter().all(|r| r.action == Action::Invited));
    assert_eq!(backend.mutation_count(), 2);
}

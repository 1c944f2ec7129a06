//! In-memory backend for testing without network access.
//!
//! Records every call and can be scripted to fail, including the
//! "error reported but change applied" behavior of real sharing endpoints.
//!
//! ```
//! use reconcile::{MockBackend, ReconcileOptions, UserStatus, reconcile_user};
//!
//! let backend = MockBackend::new("Plex 1").with_libraries(["1", "2"]);
//! backend.set_user("friend@example.com", UserStatus::Existing, ["1"]);
//!
//! let desired = ["1", "2"].into_iter().collect();
//! let result = reconcile_user(&backend, "friend@example.com", &desired, &ReconcileOptions::default());
//! assert!(result.success);
//! assert_eq!(backend.mutation_count(), 1);
//! ```

use crate::context::AccessBackend;
use crate::error::InvokeError;
use crate::types::{AccessState, DesiredState, ResourceId, UserStatus};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A call observed by [`MockBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Probe(String),
    FetchAccess(String),
    ListResources,
    Invite(String, DesiredState),
    Update(String, DesiredState),
}

impl MockCall {
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::Invite(..) | Self::Update(..))
    }
}

/// What a scripted mutation failure leaves behind on the "server".
#[derive(Debug, Clone)]
enum Effect {
    /// Nothing changed
    None,
    /// The full target was applied
    Target,
    /// Some other state resulted
    State(AccessState),
}

#[derive(Debug, Clone)]
struct MockUser {
    status: UserStatus,
    access: AccessState,
}

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<String, MockUser>,
    calls: Vec<MockCall>,
    mutation_failure: Option<(InvokeError, Effect)>,
    /// Fetches left before failing, and the error to fail with
    fetch_failure: Option<(usize, InvokeError)>,
    probe_failure: Option<InvokeError>,
    list_failure: Option<InvokeError>,
}

/// Mock backend bound to a single fake server.
#[derive(Debug)]
pub struct MockBackend {
    name: String,
    libraries: Vec<ResourceId>,
    inner: Mutex<Inner>,
}

impl MockBackend {
    /// Create a backend for a server with no libraries and no users.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            libraries: Vec::new(),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Set the libraries that exist on the server.
    pub fn with_libraries<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ResourceId>,
    {
        self.libraries = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Register a user with a status and current access.
    pub fn set_user<I, S>(&self, user: &str, status: UserStatus, access: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<ResourceId>,
    {
        let mut inner = self.lock();
        inner.users.insert(
            user.to_lowercase(),
            MockUser {
                status,
                access: access.into_iter().collect(),
            },
        );
    }

    /// Make the next mutation fail; `applied` controls whether it took effect anyway.
    pub fn fail_next_mutation(&self, error: InvokeError, applied: bool) {
        let effect = if applied { Effect::Target } else { Effect::None };
        self.lock().mutation_failure = Some((error, effect));
    }

    /// Make the next mutation fail while leaving the user with `state`.
    pub fn fail_next_mutation_with_state<I, S>(&self, error: InvokeError, state: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<ResourceId>,
    {
        let effect = Effect::State(state.into_iter().collect());
        self.lock().mutation_failure = Some((error, effect));
    }

    /// Make every access fetch fail.
    pub fn fail_fetches(&self, error: InvokeError) {
        self.fail_fetches_after(0, error);
    }

    /// Let `ok` access fetches succeed, then fail every later one.
    pub fn fail_fetches_after(&self, ok: usize, error: InvokeError) {
        self.lock().fetch_failure = Some((ok, error));
    }

    /// Make every status probe fail.
    pub fn fail_probes(&self, error: InvokeError) {
        self.lock().probe_failure = Some(error);
    }

    /// Make the library listing fail.
    pub fn fail_listing(&self, error: InvokeError) {
        self.lock().list_failure = Some(error);
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    /// Number of invite/update calls made so far.
    pub fn mutation_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.is_mutation())
            .count()
    }

    /// Current access of a user as the fake server sees it.
    pub fn access_of(&self, user: &str) -> AccessState {
        self.lock()
            .users
            .get(&user.to_lowercase())
            .map(|u| u.access.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mutate(
        &self,
        user: &str,
        target: &DesiredState,
        call: MockCall,
        status_after: UserStatus,
    ) -> Result<(), InvokeError> {
        let mut inner = self.lock();
        inner.calls.push(call);

        let (result, new_state) = match inner.mutation_failure.take() {
            None => (Ok(()), Some(target.as_access())),
            Some((error, Effect::None)) => (Err(error), None),
            Some((error, Effect::Target)) => (Err(error), Some(target.as_access())),
            Some((error, Effect::State(state))) => (Err(error), Some(state)),
        };

        if let Some(access) = new_state {
            let entry = inner
                .users
                .entry(user.to_lowercase())
                .or_insert_with(|| MockUser {
                    status: status_after,
                    access: AccessState::empty(),
                });
            entry.access = access;
        }

        result
    }
}

impl AccessBackend for MockBackend {
    fn server_name(&self) -> String {
        self.name.clone()
    }

    fn probe_user(&self, user: &str) -> Result<UserStatus, InvokeError> {
        let mut inner = self.lock();
        inner.calls.push(MockCall::Probe(user.to_string()));
        if let Some(e) = &inner.probe_failure {
            return Err(e.clone());
        }
        Ok(inner
            .users
            .get(&user.to_lowercase())
            .map_or(UserStatus::New, |u| u.status))
    }

    fn fetch_access(&self, user: &str) -> Result<AccessState, InvokeError> {
        let mut inner = self.lock();
        inner.calls.push(MockCall::FetchAccess(user.to_string()));
        if let Some((ok, e)) = &mut inner.fetch_failure {
            if *ok == 0 {
                return Err(e.clone());
            }
            *ok -= 1;
        }
        Ok(inner
            .users
            .get(&user.to_lowercase())
            .map(|u| u.access.clone())
            .unwrap_or_default())
    }

    fn list_resources(&self) -> Result<Vec<ResourceId>, InvokeError> {
        let mut inner = self.lock();
        inner.calls.push(MockCall::ListResources);
        if let Some(e) = &inner.list_failure {
            return Err(e.clone());
        }
        Ok(self.libraries.clone())
    }

    fn invite(&self, user: &str, target: &DesiredState) -> Result<(), InvokeError> {
        self.mutate(
            user,
            target,
            MockCall::Invite(user.to_string(), target.clone()),
            UserStatus::PendingInvite,
        )
    }

    fn update(&self, user: &str, target: &DesiredState) -> Result<(), InvokeError> {
        self.mutate(
            user,
            target,
            MockCall::Update(user.to_string(), target.clone()),
            UserStatus::Existing,
        )
    }
}

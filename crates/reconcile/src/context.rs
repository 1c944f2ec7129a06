//! Backend and progress traits
//!
//! These traits keep the reconciler independent of any particular remote
//! client or terminal UI.

use crate::error::InvokeError;
use crate::types::{AccessState, DesiredState, ReconciliationResult, ResourceId, UserStatus};

/// Remote system holding one server's sharing state
///
/// One backend instance is bound to one server. Every method is a single
/// blocking remote call; timeouts are the implementation's responsibility
/// and must surface as [`ErrorKind::TransientNetwork`](crate::ErrorKind).
pub trait AccessBackend: Send + Sync {
    /// Display name of the server, copied into result records
    fn server_name(&self) -> String;

    /// Determine whether the user is new, an accepted friend, or invited
    fn probe_user(&self, user: &str) -> Result<UserStatus, InvokeError>;

    /// Read the libraries currently shared with the user
    fn fetch_access(&self, user: &str) -> Result<AccessState, InvokeError>;

    /// List the library ids that exist on the server
    fn list_resources(&self) -> Result<Vec<ResourceId>, InvokeError>;

    /// Invite a new user with the given libraries
    fn invite(&self, user: &str, target: &DesiredState) -> Result<(), InvokeError>;

    /// Replace an existing user's libraries with the given set
    ///
    /// The whole target is sent; an empty target revokes everything.
    fn update(&self, user: &str, target: &DesiredState) -> Result<(), InvokeError>;
}

impl<B: AccessBackend + ?Sized> AccessBackend for &B {
    fn server_name(&self) -> String {
        (**self).server_name()
    }

    fn probe_user(&self, user: &str) -> Result<UserStatus, InvokeError> {
        (**self).probe_user(user)
    }

    fn fetch_access(&self, user: &str) -> Result<AccessState, InvokeError> {
        (**self).fetch_access(user)
    }

    fn list_resources(&self) -> Result<Vec<ResourceId>, InvokeError> {
        (**self).list_resources()
    }

    fn invite(&self, user: &str, target: &DesiredState) -> Result<(), InvokeError> {
        (**self).invite(user, target)
    }

    fn update(&self, user: &str, target: &DesiredState) -> Result<(), InvokeError> {
        (**self).update(user, target)
    }
}

/// Progress callback for batch reconciliation
///
/// Called from the thread that drives the batch, after all requests finish.
pub trait ProgressCallback: Send {
    /// Called before a batch starts
    fn on_batch_start(&mut self, count: usize);

    /// Called once per finished request, in input order
    fn on_request_complete(&mut self, user: &str, result: &ReconciliationResult);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_batch_start(&mut self, _count: usize) {}
    fn on_request_complete(&mut self, _user: &str, _result: &ReconciliationResult) {}
}

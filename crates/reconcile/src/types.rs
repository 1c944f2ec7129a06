//! Core types for access reconciliation

use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

/// Opaque key identifying one shareable library on a server
pub type ResourceId = String;

/// Libraries currently granted to one user on one server
///
/// A snapshot taken at fetch time. It is never cached; callers re-fetch
/// whenever they need the current view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessState(BTreeSet<ResourceId>);

impl AccessState {
    /// Create an empty state (no access)
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> &BTreeSet<ResourceId> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Set equality against a desired state
    pub fn matches(&self, desired: &DesiredState) -> bool {
        self.0 == desired.0
    }
}

impl<S: Into<ResourceId>> FromIterator<S> for AccessState {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for AccessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_set(f, &self.0)
    }
}

/// Libraries the caller wants one user to have on one server
///
/// An empty desired state means "revoke everything".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DesiredState(BTreeSet<ResourceId>);

impl DesiredState {
    pub fn ids(&self) -> &BTreeSet<ResourceId> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Keep only ids for which the predicate holds, returning the dropped ones
    pub fn partition<F>(&self, mut keep: F) -> (Self, Vec<ResourceId>)
    where
        F: FnMut(&str) -> bool,
    {
        let mut kept = BTreeSet::new();
        let mut dropped = Vec::new();
        for id in &self.0 {
            if keep(id) {
                kept.insert(id.clone());
            } else {
                dropped.push(id.clone());
            }
        }
        (Self(kept), dropped)
    }

    /// View the target as the access state it would produce
    pub fn as_access(&self) -> AccessState {
        AccessState(self.0.clone())
    }
}

impl<S: Into<ResourceId>> FromIterator<S> for DesiredState {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for DesiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_set(f, &self.0)
    }
}

fn write_set(f: &mut fmt::Formatter<'_>, ids: &BTreeSet<ResourceId>) -> fmt::Result {
    write!(f, "[")?;
    for (i, id) in ids.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{id}")?;
    }
    write!(f, "]")
}

/// Relationship between a user and a server, as probed remotely
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    /// No friendship and no outstanding invitation
    New,
    /// Accepted friend; access is changed with an update
    Existing,
    /// Invitation sent but not accepted; access cannot be changed
    PendingInvite,
    /// The probe failed
    Unknown,
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::New => "new",
            Self::Existing => "existing",
            Self::PendingInvite => "pending_invite",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Outcome label of one reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Current state already matched
    NoChange,
    /// An existing user with no access was given access
    Granted,
    /// An existing user's access was replaced
    Updated,
    /// Access was removed entirely
    Revoked,
    /// A new user was invited
    Invited,
    /// The user has an unaccepted invitation; nothing was changed
    Pending,
    /// Reconciliation failed
    Error,
}

impl Action {
    /// Whether this action represents a remote mutation
    pub fn is_change(&self) -> bool {
        matches!(
            self,
            Self::Granted | Self::Updated | Self::Revoked | Self::Invited
        )
    }
}

/// Extra facts attached to a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Annotation {
    /// Mutation reported an ambiguous error but the target state was observed
    AmbiguousErrorSuppressed,
    /// Mutation reported an ambiguous error and the state moved, but not to the target
    Partial,
    /// Some requested ids did not exist on the server and were dropped
    UnresolvedDropped,
}

/// The single output record of a reconciliation
///
/// Built once by one of the constructors below and never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub success: bool,
    pub server: String,
    pub action: Action,
    pub previous: AccessState,
    pub requested: DesiredState,
    /// Target set sent to (or confirmed on) the server
    pub libraries: Vec<ResourceId>,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
}

impl ReconciliationResult {
    pub fn has_annotation(&self, annotation: Annotation) -> bool {
        self.annotations.contains(&annotation)
    }
}

/// Options for a reconciliation run
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Wait before re-reading state after an ambiguous error
    pub verify_delay: Duration,
    /// Plan only, never mutate
    pub dry_run: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            verify_delay: Duration::from_secs(5),
            dry_run: false,
        }
    }
}

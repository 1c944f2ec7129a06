//! Reconciler - decides which single remote operation, if any, to run

use crate::error::{ErrorKind, InvokeError};
use crate::types::{AccessState, DesiredState, ResourceId, UserStatus};

/// The decision for one (user, server) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Current access already matches; nothing to call
    NoChange,
    /// The user has an unaccepted invitation; mutation is not allowed
    Pending,
    /// Invite a new user with these libraries
    Invite { target: DesiredState },
    /// Replace an existing user's libraries with these
    Update { target: DesiredState },
    /// Planning failed before any mutation
    Fail { kind: ErrorKind, detail: String },
}

impl Plan {
    /// Whether executing this plan issues a mutation
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::Invite { .. } | Self::Update { .. })
    }

    pub fn target(&self) -> Option<&DesiredState> {
        match self {
            Self::Invite { target } | Self::Update { target } => Some(target),
            _ => None,
        }
    }

    /// Same verb, different target
    pub fn with_target(&self, target: DesiredState) -> Self {
        match self {
            Self::Invite { .. } => Self::Invite { target },
            Self::Update { .. } => Self::Update { target },
            other => other.clone(),
        }
    }
}

/// Decide what to do for a user given their status and access sets
///
/// Equality is checked first so an already-converged user never triggers
/// any further remote call, whatever their status.
pub fn plan(status: UserStatus, current: &AccessState, desired: &DesiredState) -> Plan {
    if current.matches(desired) {
        return Plan::NoChange;
    }

    match status {
        UserStatus::PendingInvite => Plan::Pending,
        UserStatus::Unknown => Plan::Fail {
            kind: ErrorKind::Unknown,
            detail: "could not determine user status".to_string(),
        },
        UserStatus::New if desired.is_empty() => Plan::NoChange,
        UserStatus::New => Plan::Invite {
            target: desired.clone(),
        },
        UserStatus::Existing => Plan::Update {
            target: desired.clone(),
        },
    }
}

/// Result of matching requested ids against the server's libraries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub target: DesiredState,
    pub dropped: Vec<ResourceId>,
}

/// Drop requested ids that do not exist on the server
///
/// Fails with [`ErrorKind::InvalidResourceSet`] when a non-empty request
/// resolves to nothing.
pub fn resolve_targets(
    desired: &DesiredState,
    available: &[ResourceId],
) -> Result<Resolution, InvokeError> {
    let (target, dropped) = desired.partition(|id| available.iter().any(|a| a == id));

    for id in &dropped {
        log::warn!("Library {id} not found on server, dropping it");
    }

    if target.is_empty() && !desired.is_empty() {
        return Err(InvokeError::new(
            ErrorKind::InvalidResourceSet,
            format!("no valid libraries found among {desired}"),
        ));
    }

    Ok(Resolution { target, dropped })
}

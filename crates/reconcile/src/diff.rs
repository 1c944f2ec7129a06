//! Diff computation between current and desired access

use crate::types::{AccessState, DesiredState, ResourceId};
use serde::{Deserialize, Serialize};

/// Libraries that would be granted and revoked by moving to a target
///
/// Used for logging and reporting only. Mutations always send the full
/// target, never this diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDiff {
    pub grant: Vec<ResourceId>,
    pub revoke: Vec<ResourceId>,
}

impl AccessDiff {
    pub fn between(current: &AccessState, desired: &DesiredState) -> Self {
        Self {
            grant: desired.ids().difference(current.ids()).cloned().collect(),
            revoke: current.ids().difference(desired.ids()).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.grant.is_empty() && self.revoke.is_empty()
    }

    /// Whether the change only removes access
    pub fn is_revoke_only(&self) -> bool {
        self.grant.is_empty() && !self.revoke.is_empty()
    }

    /// Short human-readable summary, e.g. `+[5] -[1, 2]`
    pub fn summary(&self) -> String {
        format!("+[{}] -[{}]", self.grant.join(", "), self.revoke.join(", "))
    }
}

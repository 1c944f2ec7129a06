//! Result reporter - pure constructors for [`ReconciliationResult`]

use crate::error::{ErrorKind, truncate_detail};
use crate::planner::Plan;
use crate::types::{AccessState, Action, Annotation, DesiredState, ReconciliationResult};

/// Shared inputs of every result for one (user, server) pair
#[derive(Debug, Clone)]
pub struct ReportBase {
    pub server: String,
    pub previous: AccessState,
    pub requested: DesiredState,
    pub annotations: Vec<Annotation>,
}

impl ReportBase {
    pub fn new(server: impl Into<String>, previous: AccessState, requested: DesiredState) -> Self {
        Self {
            server: server.into(),
            previous,
            requested,
            annotations: Vec::new(),
        }
    }

    pub fn annotate(&mut self, annotation: Annotation) {
        if !self.annotations.contains(&annotation) {
            self.annotations.push(annotation);
        }
    }

    /// Nothing to do; the user already has the requested access
    pub fn no_change(self, detail: impl Into<String>) -> ReconciliationResult {
        let libraries = self.previous.ids().iter().cloned().collect();
        self.finish(true, Action::NoChange, libraries, detail.into(), None)
    }

    /// The user has an outstanding invitation
    pub fn pending(self) -> ReconciliationResult {
        self.finish(
            true,
            Action::Pending,
            Vec::new(),
            "user has pending invite - cannot update library access".to_string(),
            None,
        )
    }

    /// A mutation was applied (or confirmed after an ambiguous error)
    pub fn applied(self, plan: &Plan, detail: impl Into<String>) -> ReconciliationResult {
        let action = applied_action(plan, &self.previous);
        let libraries = plan
            .target()
            .map(|t| t.ids().iter().cloned().collect())
            .unwrap_or_default();
        self.finish(true, action, libraries, detail.into(), None)
    }

    /// The plan was computed but not executed
    pub fn planned(self, plan: &Plan) -> ReconciliationResult {
        let action = applied_action(plan, &self.previous);
        let libraries = plan
            .target()
            .map(|t| t.ids().iter().cloned().collect())
            .unwrap_or_default();
        self.finish(true, action, libraries, "dry run".to_string(), None)
    }

    /// All access was removed, friendship or invitation included
    pub fn revoked(self, detail: impl Into<String>) -> ReconciliationResult {
        self.finish(true, Action::Revoked, Vec::new(), detail.into(), None)
    }

    /// Reconciliation failed
    pub fn failed(self, kind: ErrorKind, detail: &str) -> ReconciliationResult {
        self.finish(
            false,
            Action::Error,
            Vec::new(),
            truncate_detail(detail),
            Some(kind),
        )
    }

    fn finish(
        self,
        success: bool,
        action: Action,
        libraries: Vec<String>,
        detail: String,
        error_kind: Option<ErrorKind>,
    ) -> ReconciliationResult {
        ReconciliationResult {
            success,
            server: self.server,
            action,
            previous: self.previous,
            requested: self.requested,
            libraries,
            detail,
            error_kind,
            annotations: self.annotations,
        }
    }
}

/// Action label for a mutation plan
///
/// An update for a user who had nothing on this server is a grant.
fn applied_action(plan: &Plan, previous: &AccessState) -> Action {
    match plan {
        Plan::Invite { .. } => Action::Invited,
        Plan::Update { .. } if previous.is_empty() => Action::Granted,
        Plan::Update { .. } => Action::Updated,
        Plan::NoChange => Action::NoChange,
        Plan::Pending => Action::Pending,
        Plan::Fail { .. } => Action::Error,
    }
}

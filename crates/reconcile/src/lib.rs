//! # Reconcile
//!
//! Desired-state reconciliation of per-user library access on media servers.
//!
//! Given the set of libraries a user *should* have on a server, this crate
//! reads what they *do* have, decides on at most one remote mutation, runs it,
//! and returns a single [`ReconciliationResult`] describing what happened.
//!
//! ## Core Concepts
//!
//! - **AccessState**: libraries currently granted, as read from the remote
//! - **DesiredState**: libraries the caller wants granted
//! - **Plan**: the single decision (no change, invite, update, pending, fail)
//! - **Invocation**: running the mutation, with verification when the remote
//!   reports an error that may not mean failure
//!
//! ## Example
//!
//! ```
//! use reconcile::{Action, MockBackend, ReconcileOptions, UserStatus, reconcile_user};
//!
//! let backend = MockBackend::new("Plex 1").with_libraries(["1", "2", "3"]);
//! backend.set_user("friend@example.com", UserStatus::Existing, ["1", "2"]);
//!
//! let desired = ["1", "2"].into_iter().collect();
//! let result = reconcile_user(&backend, "friend@example.com", &desired, &ReconcileOptions::default());
//! assert_eq!(result.action, Action::NoChange);
//! assert_eq!(backend.mutation_count(), 0);
//! ```
//!
//! ## Backend Trait
//!
//! Remote access goes through [`AccessBackend`], one instance per server.
//! [`MockBackend`] is an in-memory implementation for tests.

pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod mock;
pub mod planner;
pub mod report;
pub mod types;

// Re-export main types at crate root
pub use context::{AccessBackend, NoProgress, ProgressCallback};
pub use diff::AccessDiff;
pub use error::{ErrorKind, InvokeError, MAX_DETAIL_LEN, truncate_detail};
pub use executor::{
    Invocation, ReconcileRequest, fetch_access_state, invoke, reconcile_all, reconcile_user,
};
pub use mock::{MockBackend, MockCall};
pub use planner::{Plan, Resolution, plan, resolve_targets};
pub use report::ReportBase;
pub use types::{
    AccessState, Action, Annotation, DesiredState, ReconcileOptions, ReconciliationResult,
    ResourceId, UserStatus,
};

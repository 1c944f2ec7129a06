//! # plexkit
//!
//! Blocking client for Plex: the plex.tv account API (friends, invitations,
//! library sharing) and the HTTP API of individual media servers (sections,
//! sessions, history, host statistics).
//!
//! ## Example
//!
//! ```no_run
//! use plexkit::{ClientOptions, HttpClient, PlexTv, PLEX_TV_URL};
//!
//! let http = HttpClient::new(&ClientOptions::default());
//! let account = PlexTv::new(http, PLEX_TV_URL, "token");
//!
//! for share in account.shared_servers("machine-id").unwrap() {
//!     println!("{}: {:?}", share.email, share.shared_keys());
//! }
//! ```
//!
//! ## Timeouts
//!
//! Every client cloned from one [`HttpClient`] shares a [`Deadline`]. Each
//! call is bounded by the per-call timeout and by what is left of the
//! operation budget.
//!
//! ## Sharing errors
//!
//! plex.tv sometimes answers a shared-server mutation with 404 even though
//! the change was applied. Such responses surface as
//! [`Error::SharingRejected`]; see [`Error::is_ambiguous_sharing_failure`].

#![warn(clippy::all)]

pub mod account;
pub mod client;
pub mod deadline;
pub mod error;
pub mod models;
pub mod server;
pub mod types;

pub use account::{PLEX_TV_URL, PlexTv};
pub use client::{ClientOptions, HttpClient};
pub use deadline::Deadline;
pub use error::{Error, ErrorCategory, Result};
pub use models::{
    Account, AccountSection, HistoryEntry, Identity, Invite, LibrarySection, PlexUser, Resource,
    ResourceSample, Session, SessionSummary, SharedServer, StatisticsFormat, latest_sample,
};
pub use server::{HISTORY_PAGE_SIZE, MediaServer};
pub use types::{LibraryType, SharingSettings};

//! plex.tv sharing as a reconcile backend
//!
//! One [`PlexAccessBackend`] is bound to one server. Library ids on the
//! reconcile side are the server's section keys; plex.tv mutations take the
//! account-wide section ids, so keys are mapped through the server's section
//! listing, fetched once per backend.

use plexkit::{AccountSection, ErrorCategory, Invite, PlexTv, SharingSettings};
use reconcile::{
    AccessBackend, AccessState, DesiredState, ErrorKind, InvokeError, ReconciliationResult,
    ReportBase, ResourceId, UserStatus, fetch_access_state,
};
use std::sync::{Mutex, PoisonError};

pub struct PlexAccessBackend {
    name: String,
    machine_id: String,
    friendly_name: Option<String>,
    account: PlexTv,
    settings: SharingSettings,
    sections: Mutex<Option<Vec<AccountSection>>>,
}

impl PlexAccessBackend {
    pub fn new(
        name: impl Into<String>,
        machine_id: impl Into<String>,
        account: PlexTv,
        settings: SharingSettings,
    ) -> Self {
        Self {
            name: name.into(),
            machine_id: machine_id.into(),
            friendly_name: None,
            account,
            settings,
            sections: Mutex::new(None),
        }
    }

    /// Restrict invitation matching to invites naming this server
    pub fn with_friendly_name(mut self, friendly_name: Option<String>) -> Self {
        self.friendly_name = friendly_name.filter(|n| !n.is_empty());
        self
    }

    fn sections(&self) -> Result<Vec<AccountSection>, plexkit::Error> {
        let mut cache = self.sections.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sections) = cache.as_ref() {
            return Ok(sections.clone());
        }
        let sections = self.account.server_sections(&self.machine_id)?;
        log::debug!("{}: {} library sections", self.name, sections.len());
        *cache = Some(sections.clone());
        Ok(sections)
    }

    /// Map section keys to plex.tv section ids
    fn section_ids(&self, target: &DesiredState) -> Result<Vec<u64>, InvokeError> {
        let sections = self.sections().map_err(invoke_error)?;
        target
            .ids()
            .iter()
            .map(|key| {
                sections
                    .iter()
                    .find(|s| &s.key == key)
                    .map(|s| s.id)
                    .ok_or_else(|| {
                        InvokeError::new(
                            ErrorKind::InvalidResourceSet,
                            format!("library {key} does not exist on {}", self.name),
                        )
                    })
            })
            .collect()
    }

    /// Pending invite for this user that concerns this server
    fn pending_invite(&self, user: &str) -> Result<Option<Invite>, plexkit::Error> {
        let invite = self.account.find_invite(user)?;
        Ok(invite.filter(|invite| self.invite_targets_server(invite)))
    }

    fn invite_targets_server(&self, invite: &Invite) -> bool {
        match &self.friendly_name {
            Some(name) if !invite.servers.is_empty() => {
                invite.servers.iter().any(|s| s.name.eq_ignore_ascii_case(name))
            }
            _ => true,
        }
    }

    fn apply_settings(&self, user_id: u64) {
        if let Err(e) = self.account.update_friend_settings(user_id, &self.settings) {
            log::warn!(
                "{}: could not update sharing settings for {user_id}: {e}",
                self.name
            );
        }
    }

    /// Remove a user from the server's account
    ///
    /// Friends are removed outright. A pending invitation is reported, or
    /// withdrawn when `cancel_invite` is set.
    pub fn remove_user(&self, user: &str, cancel_invite: bool) -> ReconciliationResult {
        let previous = fetch_access_state(self, user);
        let report = ReportBase::new(self.name.clone(), previous, DesiredState::default());

        match self.account.find_user(user) {
            Ok(Some(friend)) => {
                return match self.account.remove_friend(friend.id) {
                    Ok(()) => {
                        log::info!("{}: removed friend {user}", self.name);
                        report.revoked(format!("removed {user} from {}", self.name))
                    }
                    Err(e) => {
                        let e = invoke_error(e);
                        report.failed(e.kind, &e.message)
                    }
                };
            }
            Ok(None) => {}
            Err(e) => {
                let e = invoke_error(e);
                return report.failed(e.kind, &e.message);
            }
        }

        match self.pending_invite(user) {
            Ok(Some(invite)) if cancel_invite => match self.account.cancel_invite(&invite) {
                Ok(()) => report.revoked(format!("cancelled pending invite for {user}")),
                Err(e) => {
                    let e = invoke_error(e);
                    report.failed(e.kind, &e.message)
                }
            },
            Ok(Some(_)) => report.pending(),
            Ok(None) => report.no_change("user not found"),
            Err(e) => {
                let e = invoke_error(e);
                report.failed(e.kind, &e.message)
            }
        }
    }
}

impl AccessBackend for PlexAccessBackend {
    fn server_name(&self) -> String {
        self.name.clone()
    }

    fn probe_user(&self, user: &str) -> Result<UserStatus, InvokeError> {
        if self.account.find_user(user).map_err(invoke_error)?.is_some() {
            return Ok(UserStatus::Existing);
        }

        match self.pending_invite(user) {
            Ok(Some(_)) => Ok(UserStatus::PendingInvite),
            Ok(None) => Ok(UserStatus::New),
            Err(e) => {
                log::warn!(
                    "{}: could not read pending invites, treating {user} as new: {e}",
                    self.name
                );
                Ok(UserStatus::New)
            }
        }
    }

    fn fetch_access(&self, user: &str) -> Result<AccessState, InvokeError> {
        let share = self
            .account
            .find_shared_server(&self.machine_id, user)
            .map_err(invoke_error)?;
        Ok(share
            .map(|s| s.shared_keys().into_iter().collect())
            .unwrap_or_default())
    }

    fn list_resources(&self) -> Result<Vec<ResourceId>, InvokeError> {
        let sections = self.sections().map_err(invoke_error)?;
        Ok(sections.into_iter().map(|s| s.key).collect())
    }

    fn invite(&self, user: &str, target: &DesiredState) -> Result<(), InvokeError> {
        let ids = self.section_ids(target)?;
        self.account
            .invite_friend(&self.machine_id, user, &ids, &self.settings)
            .map_err(invoke_error)?;
        log::info!("{}: invited {user} with {} libraries", self.name, ids.len());
        Ok(())
    }

    fn update(&self, user: &str, target: &DesiredState) -> Result<(), InvokeError> {
        let ids = self.section_ids(target)?;
        let share = self
            .account
            .find_shared_server(&self.machine_id, user)
            .map_err(invoke_error)?;

        let user_id = match share {
            Some(share) => {
                self.account
                    .update_shared_server(&self.machine_id, share.id, &ids)
                    .map_err(invoke_error)?;
                share.user_id
            }
            // Nothing shared and nothing wanted
            None if ids.is_empty() => return Ok(()),
            None => {
                let friend = self
                    .account
                    .find_user(user)
                    .map_err(invoke_error)?
                    .ok_or_else(|| {
                        InvokeError::new(
                            ErrorKind::IllegalStateTransition,
                            format!("{user} is not a friend of this account"),
                        )
                    })?;
                self.account
                    .share_with_friend(&self.machine_id, friend.id, &ids, &self.settings)
                    .map_err(invoke_error)?;
                friend.id
            }
        };

        log::info!("{}: shared {} libraries with {user}", self.name, ids.len());
        if !ids.is_empty() {
            self.apply_settings(user_id);
        }
        Ok(())
    }
}

/// Classify a client error for the reconciler
pub fn invoke_error(e: plexkit::Error) -> InvokeError {
    let kind = if e.is_ambiguous_sharing_failure() {
        ErrorKind::AmbiguousRemoteError
    } else {
        match e.category() {
            ErrorCategory::Network | ErrorCategory::Timeout => ErrorKind::TransientNetwork,
            _ => ErrorKind::Unknown,
        }
    };
    InvokeError::new(kind, e.to_string())
}

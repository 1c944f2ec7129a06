//! plex.tv account API.
//!
//! Sharing lives on plex.tv, not on the media server: friends, invitations
//! and per-server library shares are all account-level objects addressed by
//! the server's machine identifier.

use crate::client::{Accept, HttpClient, join_url};
use crate::error::{Error, Result};
use crate::models::{
    AccountSection, Invite, InviteContainer, PlexUser, Resource, ServerDetailContainer,
    SharedServer, SharedServerContainer, UserContainer, from_xml,
};
use crate::types::SharingSettings;
use serde_json::json;

/// Default plex.tv base URL.
pub const PLEX_TV_URL: &str = "https://plex.tv";

/// Client for one plex.tv account, identified by its token.
#[derive(Clone)]
pub struct PlexTv {
    http: HttpClient,
    base_url: String,
    token: String,
}

impl PlexTv {
    pub fn new(http: HttpClient, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    fn get_xml<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self.http.get(&self.url(path), &self.token, Accept::Xml, &[])?;
        from_xml(&body)
    }

    /// Devices registered to the account.
    pub fn resources(&self) -> Result<Vec<Resource>> {
        let body = self.http.get(
            &self.url("/api/v2/resources"),
            &self.token,
            Accept::Json,
            &[("includeHttps", "1".to_string())],
        )?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Find a media server of the account by machine identifier.
    pub fn find_server(&self, machine_id: &str) -> Result<Resource> {
        self.resources()?
            .into_iter()
            .find(|r| r.is_server() && r.client_identifier == machine_id)
            .ok_or_else(|| {
                Error::NotFound(format!("server {machine_id} not found in account resources"))
            })
    }

    /// Accepted friends of the account.
    pub fn users(&self) -> Result<Vec<PlexUser>> {
        let container: UserContainer = self.get_xml("/api/users")?;
        Ok(container.users)
    }

    /// Find a friend by email, username or title.
    pub fn find_user(&self, ident: &str) -> Result<Option<PlexUser>> {
        Ok(self.users()?.into_iter().find(|u| u.matches(ident)))
    }

    /// Invitations sent by the account and not yet accepted.
    pub fn pending_invites(&self) -> Result<Vec<Invite>> {
        let container: InviteContainer = self.get_xml("/api/invites/requested")?;
        Ok(container.invites)
    }

    pub fn find_invite(&self, ident: &str) -> Result<Option<Invite>> {
        Ok(self.pending_invites()?.into_iter().find(|i| i.matches(ident)))
    }

    /// Withdraw a pending invitation.
    pub fn cancel_invite(&self, invite: &Invite) -> Result<()> {
        let path = format!("/api/invites/requested/{}", invite.id);
        self.http
            .delete(&self.url(&path), &self.token, &invite.cancel_query())?;
        log::info!("Cancelled invite {} for {}", invite.id, invite.email);
        Ok(())
    }

    /// Library sections of a server, with their account-wide ids.
    pub fn server_sections(&self, machine_id: &str) -> Result<Vec<AccountSection>> {
        let container: ServerDetailContainer = self.get_xml(&format!("/api/servers/{machine_id}"))?;
        Ok(container
            .servers
            .into_iter()
            .flat_map(|s| s.sections)
            .collect())
    }

    /// Every friend's share of a server.
    pub fn shared_servers(&self, machine_id: &str) -> Result<Vec<SharedServer>> {
        let container: SharedServerContainer =
            self.get_xml(&format!("/api/servers/{machine_id}/shared_servers"))?;
        Ok(container.shared_servers)
    }

    pub fn find_shared_server(
        &self,
        machine_id: &str,
        ident: &str,
    ) -> Result<Option<SharedServer>> {
        Ok(self
            .shared_servers(machine_id)?
            .into_iter()
            .find(|s| s.matches(ident)))
    }

    /// Invite someone who is not yet a friend, sharing the given sections.
    pub fn invite_friend(
        &self,
        machine_id: &str,
        email: &str,
        section_ids: &[u64],
        settings: &SharingSettings,
    ) -> Result<()> {
        let body = invite_body(machine_id, email, section_ids, settings);
        self.http
            .post_json(
                &self.shared_servers_url(machine_id),
                &self.token,
                &[],
                &body,
            )
            .map_err(Error::into_sharing_failure)?;
        Ok(())
    }

    /// Share a server with an existing friend who has no share on it yet.
    pub fn share_with_friend(
        &self,
        machine_id: &str,
        user_id: u64,
        section_ids: &[u64],
        settings: &SharingSettings,
    ) -> Result<()> {
        let body = json!({
            "server_id": machine_id,
            "shared_server": {
                "library_section_ids": section_ids,
                "invited_id": user_id,
            },
            "sharing_settings": settings.to_json(),
        });
        self.http
            .post_json(
                &self.shared_servers_url(machine_id),
                &self.token,
                &[],
                &body,
            )
            .map_err(Error::into_sharing_failure)?;
        Ok(())
    }

    /// Replace the sections of an existing share.
    ///
    /// The full list is sent; an empty list leaves the friend with no libraries.
    pub fn update_shared_server(
        &self,
        machine_id: &str,
        shared_id: u64,
        section_ids: &[u64],
    ) -> Result<()> {
        let url = format!("{}/{shared_id}", self.shared_servers_url(machine_id));
        let body = update_body(machine_id, section_ids);
        self.http
            .put_json(&url, &self.token, &[], &body)
            .map_err(Error::into_sharing_failure)?;
        Ok(())
    }

    /// Apply sync/camera/channel permissions to a friend.
    pub fn update_friend_settings(&self, user_id: u64, settings: &SharingSettings) -> Result<()> {
        let url = self.url(&format!("/api/friends/{user_id}"));
        self.http.put(&url, &self.token, &settings.to_query())?;
        Ok(())
    }

    /// Remove a friend and every share they had.
    pub fn remove_friend(&self, user_id: u64) -> Result<()> {
        let url = self.url(&format!("/api/friends/{user_id}"));
        self.http.delete(&url, &self.token, &[])?;
        Ok(())
    }

    fn shared_servers_url(&self, machine_id: &str) -> String {
        self.url(&format!("/api/servers/{machine_id}/shared_servers"))
    }
}

fn invite_body(
    machine_id: &str,
    email: &str,
    section_ids: &[u64],
    settings: &SharingSettings,
) -> serde_json::Value {
    json!({
        "server_id": machine_id,
        "shared_server": {
            "library_section_ids": section_ids,
            "invited_email": email,
        },
        "sharing_settings": settings.to_json(),
    })
}

fn update_body(machine_id: &str, section_ids: &[u64]) -> serde_json::Value {
    json!({
        "server_id": machine_id,
        "shared_server": {
            "library_section_ids": section_ids,
        },
    })
}

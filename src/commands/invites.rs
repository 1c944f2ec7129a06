//! `invites` - pending invitations across every configured account

use anyhow::Result;
use plexkit::{Invite, PlexTv};
use serde::Serialize;
use serde_json::{Value, json};

use super::Runtime;
use crate::Context;
use crate::config::{Config, ServerConfig};

/// One pending invitation in the output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InviteRecord {
    pub email: String,
    pub server_group: String,
    pub id: String,
    pub created_at: String,
}

/// Servers reachable with one account token
struct Account<'a> {
    token: String,
    servers: Vec<(&'a str, &'a ServerConfig)>,
}

fn accounts(config: &Config) -> Result<Vec<Account<'_>>> {
    let mut accounts: Vec<Account<'_>> = Vec::new();
    for (group, _, server) in config.servers() {
        let token = server.token()?;
        match accounts.iter_mut().find(|a| a.token == token) {
            Some(account) => account.servers.push((group, server)),
            None => accounts.push(Account {
                token,
                servers: vec![(group, server)],
            }),
        }
    }
    Ok(accounts)
}

/// plex.tv name of each server, by group
///
/// Configured friendly names win. Other servers are looked up in the
/// account's registered devices; a failed lookup leaves the name unknown.
fn server_names<'a>(
    plex: &PlexTv,
    servers: &[(&'a str, &'a ServerConfig)],
    api_calls: &mut usize,
) -> Vec<(&'a str, Option<String>)> {
    servers
        .iter()
        .map(|(group, server)| {
            let name = server.friendly_name.clone().or_else(|| {
                *api_calls += 1;
                match plex.find_server(&server.machine_id) {
                    Ok(resource) => Some(resource.name),
                    Err(e) => {
                        log::debug!("{}: no plex.tv name: {e}", server.name);
                        None
                    }
                }
            });
            (*group, name)
        })
        .collect()
}

/// Group an invitation belongs to
///
/// Matched on the server names the invite lists; falls back to the first
/// group using the account.
fn group_of<'a>(invite: &Invite, servers: &[(&'a str, Option<String>)]) -> &'a str {
    let by_name = servers.iter().find(|(_, name)| {
        name.as_deref().is_some_and(|name| {
            invite
                .servers
                .iter()
                .any(|s| s.name.eq_ignore_ascii_case(name))
        })
    });
    by_name
        .or_else(|| servers.first())
        .map_or("unknown", |(group, _)| *group)
}

fn record(invite: &Invite, group: &str) -> InviteRecord {
    let email = if invite.email.is_empty() {
        invite.username.clone()
    } else {
        invite.email.clone()
    };
    InviteRecord {
        email,
        server_group: group.to_string(),
        id: invite.id.clone(),
        created_at: invite
            .created()
            .map_or_else(|| invite.created_at.clone(), |t| t.to_rfc3339()),
    }
}

pub fn run(ctx: &Context) -> Result<Value> {
    let runtime = Runtime::load(ctx)?;
    let accounts = accounts(&runtime.config)?;

    let mut invites = Vec::new();
    let mut errors = Vec::new();
    let mut api_calls = 0usize;

    for account in &accounts {
        let Some((_, first)) = account.servers.first() else {
            continue;
        };
        let plex = runtime.account(first)?;
        api_calls += 1;
        match plex.pending_invites() {
            Ok(pending) => {
                log::info!(
                    "{} pending invites on {}'s account",
                    pending.len(),
                    first.name
                );
                if pending.is_empty() {
                    continue;
                }
                let names = server_names(&plex, &account.servers, &mut api_calls);
                invites.extend(
                    pending
                        .iter()
                        .map(|invite| record(invite, group_of(invite, &names))),
                );
            }
            Err(e) => {
                log::warn!("Could not list invites for {}: {e}", first.name);
                errors.push(format!("{}: {e}", first.name));
            }
        }
    }

    let mut doc = json!({
        "success": errors.is_empty(),
        "total_invites": invites.len(),
        "api_calls": api_calls,
        "invites": invites,
    });
    if !errors.is_empty() {
        doc["errors"] = json!(errors);
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use plexkit::models::InviteServer;

    const CONFIG: &str = r#"
[groups.plex1.regular]
name = "Plex 1"
machine_id = "a"
token = "token-1"
friendly_name = "JohnsonFlix"

[groups.plex1.fourk]
name = "Plex 1 4K"
machine_id = "b"
token = "token-1"
friendly_name = "JohnsonFlix 4K"

[groups.plex2.regular]
name = "Plex 2"
machine_id = "c"
token = "token-2"
friendly_name = "Plex 2"

[groups.plex3.regular]
name = "Plex 3"
machine_id = "d"
token = "token-1"
friendly_name = "Plex Three"
"#;

    fn invite(email: &str, servers: &[&str]) -> Invite {
        Invite {
            id: "42".to_string(),
            email: email.to_string(),
            username: "someone".to_string(),
            friendly_name: String::new(),
            created_at: "1700000000".to_string(),
            friend: "1".to_string(),
            server: "1".to_string(),
            home: "0".to_string(),
            servers: servers
                .iter()
                .map(|name| InviteServer {
                    name: (*name).to_string(),
                    num_libraries: 1,
                })
                .collect(),
        }
    }

    #[test]
    fn test_one_account_per_token() {
        let config = Config::parse(CONFIG).unwrap();
        let accounts = accounts(&config).unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].servers.len(), 3);
        assert_eq!(accounts[1].servers.len(), 1);
    }

    fn configured_names<'a>(
        servers: &[(&'a str, &'a ServerConfig)],
    ) -> Vec<(&'a str, Option<String>)> {
        servers
            .iter()
            .map(|(group, server)| (*group, server.friendly_name.clone()))
            .collect()
    }

    #[test]
    fn test_group_matched_by_server_name() {
        let config = Config::parse(CONFIG).unwrap();
        let accounts = accounts(&config).unwrap();
        let shared = &configured_names(&accounts[0].servers);

        assert_eq!(
            group_of(&invite("a@example.com", &["Plex Three"]), shared),
            "plex3"
        );
        assert_eq!(
            group_of(&invite("a@example.com", &["JohnsonFlix 4K"]), shared),
            "plex1"
        );
        assert_eq!(
            group_of(&invite("a@example.com", &["Elsewhere"]), shared),
            "plex1"
        );
        assert_eq!(group_of(&invite("a@example.com", &[]), shared), "plex1");
    }

    #[test]
    fn test_configured_names_need_no_lookup() {
        let config = Config::parse(CONFIG).unwrap();
        let accounts = accounts(&config).unwrap();
        let plex = PlexTv::new(
            plexkit::HttpClient::new(&plexkit::ClientOptions::default()),
            "http://127.0.0.1:9",
            "token-1",
        );
        let mut api_calls = 0;
        let names = server_names(&plex, &accounts[0].servers, &mut api_calls);
        assert_eq!(api_calls, 0);
        assert_eq!(names[2], ("plex3", Some("Plex Three".to_string())));
    }

    #[test]
    fn test_unknown_name_falls_back_to_first_group() {
        let names = vec![("plex1", None), ("plex3", Some("Plex Three".to_string()))];
        assert_eq!(
            group_of(&invite("a@example.com", &["Plex Three"]), &names),
            "plex3"
        );
        assert_eq!(
            group_of(&invite("a@example.com", &["Mystery"]), &names),
            "plex1"
        );
    }

    #[test]
    fn test_record_formats_created_at() {
        let rec = record(&invite("a@example.com", &[]), "plex1");
        assert_eq!(rec.email, "a@example.com");
        assert_eq!(rec.id, "42");
        assert_eq!(rec.created_at, "2023-11-14T22:13:20+00:00");

        let by_username = record(&invite("", &[]), "plex1");
        assert_eq!(by_username.email, "someone");
    }
}

//! `last-watched` - most recent watch of every account
//!
//! Only the regular server of each group is read; 4K servers share the same
//! accounts and would report duplicates.

use anyhow::Result;
use chrono::{DateTime, Utc};
use plexkit::{Account, HISTORY_PAGE_SIZE, HistoryEntry};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashMap};

use super::{Runtime, Target, insert_slot};
use crate::Context;
use crate::config::Slot;
use crate::{output, ui};

/// Watch summary for one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserWatch {
    pub account_id: u64,
    pub name: String,
    pub has_watch_history: bool,
    pub last_watched_date: Option<String>,
    pub last_watched_title: Option<String>,
    pub last_watched_type: Option<String>,
    pub last_watched_year: Option<u32>,
    pub days_since_last_watch: Option<i64>,
}

impl UserWatch {
    fn new(
        account_id: u64,
        name: String,
        last: Option<(&HistoryEntry, DateTime<Utc>)>,
        now: DateTime<Utc>,
    ) -> Self {
        match last {
            Some((entry, viewed)) => Self {
                account_id,
                name,
                has_watch_history: true,
                last_watched_date: Some(viewed.to_rfc3339()),
                last_watched_title: Some(entry.title.clone()),
                last_watched_type: Some(entry.kind.clone()),
                last_watched_year: entry.year,
                days_since_last_watch: Some((now - viewed).num_days()),
            },
            None => Self {
                account_id,
                name,
                has_watch_history: false,
                last_watched_date: None,
                last_watched_title: None,
                last_watched_type: None,
                last_watched_year: None,
                days_since_last_watch: None,
            },
        }
    }
}

/// Latest entry per account, keyed by account id as a string
///
/// Accounts that appear only in history are reported as `Unknown User {id}`.
/// Entries without an account or a view time are ignored.
pub fn summarize(
    accounts: &[Account],
    history: &[HistoryEntry],
    now: DateTime<Utc>,
) -> BTreeMap<String, UserWatch> {
    let mut latest: HashMap<u64, (&HistoryEntry, DateTime<Utc>)> = HashMap::new();
    for entry in history {
        let (Some(account_id), Some(viewed)) = (entry.account_id, entry.viewed()) else {
            continue;
        };
        latest
            .entry(account_id)
            .and_modify(|current| {
                if viewed > current.1 {
                    *current = (entry, viewed);
                }
            })
            .or_insert((entry, viewed));
    }

    let mut users = BTreeMap::new();
    for account in accounts {
        let name = if account.name.is_empty() {
            format!("User {}", account.id)
        } else {
            account.name.clone()
        };
        let watch = UserWatch::new(account.id, name, latest.remove(&account.id), now);
        users.insert(account.id.to_string(), watch);
    }
    for (account_id, last) in latest {
        let name = format!("Unknown User {account_id}");
        let watch = UserWatch::new(account_id, name, Some(last), now);
        users.insert(account_id.to_string(), watch);
    }
    users
}

fn server_report(runtime: &Runtime, target: &Target<'_>) -> Result<Value> {
    let server = runtime.media_server(target.server)?;
    let accounts = server.accounts()?;
    let history = server.history(HISTORY_PAGE_SIZE)?;
    let users = summarize(&accounts, &history, Utc::now());

    let with_history = users.values().filter(|u| u.has_watch_history).count();
    log::info!(
        "{}: {} users, {with_history} with watch history, {} history items",
        target.server.name,
        users.len(),
        history.len()
    );

    Ok(json!({
        "success": true,
        "server_name": target.server.name,
        "server_url": server.base_url(),
        "users": users,
        "total_history_items": history.len(),
    }))
}

pub fn run(ctx: &Context) -> Result<Value> {
    let runtime = Runtime::load(ctx)?;
    let targets: Vec<Target<'_>> = runtime
        .config
        .servers()
        .filter(|(_, slot, _)| *slot == Slot::Regular)
        .map(|(group, slot, server)| Target {
            group,
            slot,
            server,
        })
        .collect();

    let reports = runtime.each_server(&targets, |target| {
        server_report(&runtime, target).unwrap_or_else(|e| {
            log::error!("{}: {e:#}", target.server.name);
            let mut value = output::error(&e);
            value["server_name"] = json!(target.server.name);
            value["users"] = json!({});
            value
        })
    })?;

    let mut groups = Map::new();
    let mut success = true;
    for (target, report) in targets.iter().zip(reports) {
        if report["success"] != true {
            success = false;
        } else if !ctx.quiet {
            ui::success(&format!(
                "{}: {} history items",
                target.server.name, report["total_history_items"]
            ));
        }
        insert_slot(&mut groups, target, report);
    }

    Ok(json!({
        "success": success,
        "groups": groups,
    }))
}

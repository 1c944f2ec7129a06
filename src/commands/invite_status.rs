//! `invite-status` - how a user relates to each configured server

use anyhow::Result;
use reconcile::{AccessBackend, UserStatus};
use serde_json::{Map, Value, json};

use super::{Runtime, Target, insert_slot};
use crate::Context;

pub fn run(ctx: &Context, user: &str) -> Result<Value> {
    let runtime = Runtime::load(ctx)?;
    let targets: Vec<Target<'_>> = runtime
        .config
        .servers()
        .map(|(group, slot, server)| Target {
            group,
            slot,
            server,
        })
        .collect();

    let statuses = runtime.each_server(&targets, |target| -> Result<UserStatus> {
        let backend = runtime.access_backend(target.server)?;
        Ok(backend.probe_user(user).unwrap_or_else(|e| {
            log::warn!("Could not probe {user} on {}: {e}", target.server.name);
            UserStatus::Unknown
        }))
    })?;

    let mut servers = Map::new();
    for (target, status) in targets.iter().zip(statuses) {
        insert_slot(&mut servers, target, json!(status?));
    }

    Ok(json!({
        "success": true,
        "user": user,
        "servers": servers,
    }))
}

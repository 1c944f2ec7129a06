//! `share` - reconcile a user's libraries on every server of a group

use anyhow::{Context as AnyhowContext, Result};
use reconcile::{Action, DesiredState, ReconcileRequest, ReconciliationResult, reconcile_all};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::io::Read;

use super::Runtime;
use crate::Context;
use crate::cli::ShareArgs;
use crate::config::Slot;
use crate::output;
use crate::progress::UiProgress;

/// Libraries requested per server slot
///
/// A missing slot leaves that server alone; an empty list revokes everything
/// on it.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Selection {
    #[serde(default)]
    regular: Option<Vec<LibraryId>>,
    #[serde(default)]
    fourk: Option<Vec<LibraryId>>,
}

/// Section keys arrive as strings or bare numbers
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum LibraryId {
    Text(String),
    Number(u64),
}

impl LibraryId {
    fn into_key(self) -> String {
        match self {
            Self::Text(s) => s.trim().to_string(),
            Self::Number(n) => n.to_string(),
        }
    }
}

impl Selection {
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Invalid library selection JSON")
    }

    /// Read the selection argument, `-` meaning stdin
    pub fn from_arg(arg: &str) -> Result<Self> {
        if arg == "-" {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read selection from stdin")?;
            Self::parse(&text)
        } else {
            Self::parse(arg)
        }
    }

    pub fn desired(&self, slot: Slot) -> Option<DesiredState> {
        let ids = match slot {
            Slot::Regular => self.regular.as_ref(),
            Slot::Fourk => self.fourk.as_ref(),
        }?;
        Some(
            ids.iter()
                .cloned()
                .map(LibraryId::into_key)
                .filter(|key| !key.is_empty())
                .collect(),
        )
    }
}

pub fn run(ctx: &Context, args: ShareArgs) -> Result<Value> {
    let runtime = Runtime::load(ctx)?;
    let selection = Selection::from_arg(&args.selection)?;

    let Some(group) = runtime.config.group(&args.group) else {
        return Ok(output::failure(format!("Unknown server group: {}", args.group)));
    };

    let mut slots = Vec::new();
    let mut requests = Vec::new();
    for (slot, server) in group.servers() {
        let Some(desired) = selection.desired(slot) else {
            log::debug!("No {slot} selection, leaving {} untouched", server.name);
            continue;
        };
        slots.push(slot);
        requests.push(ReconcileRequest {
            backend: runtime.access_backend(server)?,
            user: args.user.clone(),
            desired,
        });
    }

    for slot in Slot::ALL {
        if selection.desired(slot).is_some() && group.server(slot).is_none() {
            log::warn!(
                "Group {} has no {slot} server, ignoring its selection",
                args.group
            );
        }
    }

    let jobs = args
        .jobs
        .unwrap_or(runtime.config.settings.max_concurrency)
        .max(1);
    let opts = runtime.config.reconcile_options(args.dry_run);
    let mut progress = UiProgress::new(ctx.quiet);
    let results = reconcile_all(&requests, jobs, &opts, &mut progress)?;

    Ok(summarize(&args.group, &slots, &results))
}

/// Aggregate per-server results into the command's output document
pub fn summarize(group: &str, slots: &[Slot], results: &[ReconciliationResult]) -> Value {
    let changes_made = results
        .iter()
        .filter(|r| matches!(r.action, Action::Granted | Action::Updated | Action::Invited))
        .count();

    json!({
        "success": results.iter().all(|r| r.success),
        "server_group": group,
        "changes_made": changes_made,
        "details": details(slots, results),
    })
}

/// Results keyed by slot name
pub fn details(slots: &[Slot], results: &[ReconciliationResult]) -> Map<String, Value> {
    slots
        .iter()
        .zip(results)
        .map(|(slot, result)| {
            let value = serde_json::to_value(result)
                .unwrap_or_else(|e| output::failure(e.to_string()));
            (slot.to_string(), value)
        })
        .collect()
}

//! `remove` - take a user off every server of a group

use anyhow::Result;
use reconcile::ProgressCallback;
use serde_json::{Value, json};

use super::Runtime;
use super::share::details;
use crate::Context;
use crate::cli::RemoveArgs;
use crate::output;
use crate::progress::UiProgress;

pub fn run(ctx: &Context, args: RemoveArgs) -> Result<Value> {
    let runtime = Runtime::load(ctx)?;
    let Some(group) = runtime.config.group(&args.group) else {
        return Ok(output::failure(format!("Unknown server group: {}", args.group)));
    };

    let mut progress = UiProgress::new(ctx.quiet);
    let servers: Vec<_> = group.servers().collect();
    progress.on_batch_start(servers.len());

    // Servers of one group usually share an account, so removals run in
    // order: the first removal makes the friend disappear for the rest.
    let mut slots = Vec::new();
    let mut results = Vec::new();
    for (slot, server) in servers {
        let backend = runtime.access_backend(server)?;
        let result = backend.remove_user(&args.user, args.cancel_invite);
        progress.on_request_complete(&args.user, &result);
        slots.push(slot);
        results.push(result);
    }

    Ok(json!({
        "success": results.iter().all(|r| r.success),
        "server_group": args.group,
        "details": details(&slots, &results),
    }))
}

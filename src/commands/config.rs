use anyhow::Result;
use serde_json::{Value, json};

use crate::Context;
use crate::cli::ConfigCommand;
use crate::config::Config;
use crate::paths;

pub fn run(ctx: &Context, cmd: ConfigCommand) -> Result<Value> {
    let path = paths::config_file(ctx.config_path.as_deref())?;
    match cmd {
        ConfigCommand::Show => {
            let config = Config::load(&path)?;
            Ok(json!({
                "success": true,
                "path": path,
                "config": config.redacted(),
            }))
        }
        ConfigCommand::Validate => {
            let config = Config::parse_file(&path)?;
            Ok(validation_report(&config))
        }
        ConfigCommand::Path => Ok(json!({
            "success": true,
            "path": path,
            "exists": path.exists(),
        })),
    }
}

fn validation_report(config: &Config) -> Value {
    let problems: Vec<String> = config.problems().iter().map(ToString::to_string).collect();
    json!({
        "success": problems.is_empty(),
        "groups": config.groups.len(),
        "servers": config.servers().count(),
        "problems": problems,
    })
}

//! JSON documents written to stdout
//!
//! Every command prints exactly one document. Failures that still produce a
//! structured record use [`failure`] or [`error`].

use serde_json::{Value, json};
use std::io::{self, Write};

/// Write a document to stdout, pretty-printed
pub fn print(value: &Value) -> io::Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{text}")?;
    stdout.flush()
}

/// `{"success": false, "error": message}`
pub fn failure(message: impl Into<String>) -> Value {
    json!({
        "success": false,
        "error": message.into(),
    })
}

/// Hint for the first Plex client error in the chain
pub fn advice(e: &anyhow::Error) -> Option<&'static str> {
    e.chain()
        .find_map(|cause| cause.downcast_ref::<plexkit::Error>())
        .map(|cause| cause.category().advice())
}

/// [`failure`] for an error, with `advice` when a Plex call caused it
pub fn error(e: &anyhow::Error) -> Value {
    let mut value = failure(format!("{e:#}"));
    if let Some(advice) = advice(e) {
        value["advice"] = json!(advice);
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_failure_shape() {
        let value = failure("Unknown server group: plex9");
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "Unknown server group: plex9");
    }

    #[test]
    fn test_error_carries_advice_for_client_errors() {
        let e = Err::<(), _>(plexkit::Error::from_status(401, "https://plex.tv/api/users", ""))
            .context("Plex 1")
            .unwrap_err();
        let value = error(&e);
        assert_eq!(value["success"], false);
        assert_eq!(value["advice"], plexkit::ErrorCategory::Auth.advice());
        assert!(value["error"].as_str().unwrap().starts_with("Plex 1: "));
    }

    #[test]
    fn test_error_without_client_cause_has_no_advice() {
        let value = error(&anyhow::anyhow!("bad config"));
        assert_eq!(value["error"], "bad config");
        assert!(value.get("advice").is_none());
    }
}

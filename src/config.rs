//! plexshare configuration
//!
//! A single TOML file describes the plex.tv settings, the sharing
//! permissions applied to friends, and the server groups. Each group has up
//! to two servers: `regular` and `fourk`.
//!
//! ```toml
//! [settings]
//! max_concurrency = 4
//!
//! [groups.plex1]
//! stats = true
//!
//! [groups.plex1.regular]
//! name = "Plex 1"
//! machine_id = "3ad72e19d4509a15d9f8253666a03efa78baac44"
//! token_env = "PLEX1_TOKEN"
//! url = "http://192.168.10.90:32400"
//! ```

use anyhow::{Context, Result};
use plexkit::{ClientOptions, PLEX_TV_URL, SharingSettings};
use reconcile::ReconcileOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

const REDACTED: &str = "********";

/// Root config
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,

    #[serde(default)]
    pub sharing: SharingSettings,

    #[serde(default)]
    pub groups: BTreeMap<String, GroupConfig>,
}

/// Client and reconciliation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub plex_tv_url: String,
    pub client_identifier: String,
    pub call_timeout_secs: u64,
    pub operation_timeout_secs: u64,
    /// Wait before re-reading access after an ambiguous sharing error
    pub verify_delay_secs: u64,
    pub max_concurrency: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            plex_tv_url: PLEX_TV_URL.to_string(),
            client_identifier: "plexshare".to_string(),
            call_timeout_secs: 60,
            operation_timeout_secs: 120,
            verify_delay_secs: 5,
            max_concurrency: 4,
        }
    }
}

/// A named pair of servers shared together
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Include this group in `stats`
    #[serde(default)]
    pub stats: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regular: Option<ServerConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fourk: Option<ServerConfig>,
}

/// Position of a server inside its group
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Slot {
    Regular,
    Fourk,
}

impl Slot {
    pub const ALL: [Self; 2] = [Self::Regular, Self::Fourk];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Fourk => "fourk",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl GroupConfig {
    pub fn server(&self, slot: Slot) -> Option<&ServerConfig> {
        match slot {
            Slot::Regular => self.regular.as_ref(),
            Slot::Fourk => self.fourk.as_ref(),
        }
    }

    /// Configured servers, regular first
    pub fn servers(&self) -> impl Iterator<Item = (Slot, &ServerConfig)> {
        Slot::ALL
            .into_iter()
            .filter_map(|slot| self.server(slot).map(|s| (slot, s)))
    }
}

/// One media server and the account token that owns it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Display name used in output
    pub name: String,

    /// Machine identifier of the server on plex.tv
    pub machine_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Environment variable holding the token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,

    /// Local URL of the server, needed by stats, resources and last-watched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Name the server has on plex.tv, used to match invitations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
}

impl ServerConfig {
    /// Resolve the account token, inline value first
    pub fn token(&self) -> Result<String> {
        if let Some(token) = self.token.as_deref().filter(|t| !t.is_empty()) {
            return Ok(token.to_string());
        }
        let var = self
            .token_env
            .as_deref()
            .with_context(|| format!("No token configured for server '{}'", self.name))?;
        std::env::var(var)
            .ok()
            .filter(|t| !t.is_empty())
            .with_context(|| format!("Token variable {var} for server '{}' is not set", self.name))
    }

    pub fn url(&self) -> Result<&str> {
        self.url
            .as_deref()
            .filter(|u| !u.is_empty())
            .with_context(|| format!("No url configured for server '{}'", self.name))
    }
}

/// A config that parses but cannot be used
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("no server groups configured")]
    NoGroups,

    #[error("group '{0}' has no servers")]
    EmptyGroup(String),

    #[error("server '{group}.{slot}' has an empty machine_id")]
    MissingMachineId { group: String, slot: Slot },

    #[error("server '{group}.{slot}' needs token or token_env")]
    MissingToken { group: String, slot: Slot },

    #[error("max_concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("call_timeout_secs ({call}) exceeds operation_timeout_secs ({operation})")]
    CallTimeoutTooLong { call: u64, operation: u64 },
}

impl Config {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let config = Self::parse_file(path)?;
        config
            .validate()
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Parse a config file without validating it
    pub fn parse_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid TOML in {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.problems().into_iter().next() {
            Some(problem) => Err(problem),
            None => Ok(()),
        }
    }

    /// Every validation problem, in file order
    pub fn problems(&self) -> Vec<ConfigError> {
        let mut problems = Vec::new();

        if self.settings.max_concurrency == 0 {
            problems.push(ConfigError::ZeroConcurrency);
        }
        if self.settings.call_timeout_secs > self.settings.operation_timeout_secs {
            problems.push(ConfigError::CallTimeoutTooLong {
                call: self.settings.call_timeout_secs,
                operation: self.settings.operation_timeout_secs,
            });
        }
        if self.groups.is_empty() {
            problems.push(ConfigError::NoGroups);
        }

        for (name, group) in &self.groups {
            if group.servers().next().is_none() {
                problems.push(ConfigError::EmptyGroup(name.clone()));
            }
            for (slot, server) in group.servers() {
                if server.machine_id.trim().is_empty() {
                    problems.push(ConfigError::MissingMachineId {
                        group: name.clone(),
                        slot,
                    });
                }
                let has_token = server.token.as_deref().is_some_and(|t| !t.is_empty())
                    || server.token_env.as_deref().is_some_and(|t| !t.is_empty());
                if !has_token {
                    problems.push(ConfigError::MissingToken {
                        group: name.clone(),
                        slot,
                    });
                }
            }
        }

        problems
    }

    pub fn group(&self, name: &str) -> Option<&GroupConfig> {
        self.groups.get(name)
    }

    /// Every (group, slot, server), in group order
    pub fn servers(&self) -> impl Iterator<Item = (&str, Slot, &ServerConfig)> {
        self.groups.iter().flat_map(|(name, group)| {
            group
                .servers()
                .map(move |(slot, server)| (name.as_str(), slot, server))
        })
    }

    /// Copy with inline tokens masked
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for group in copy.groups.values_mut() {
            for server in [group.regular.as_mut(), group.fourk.as_mut()]
                .into_iter()
                .flatten()
            {
                if server.token.is_some() {
                    server.token = Some(REDACTED.to_string());
                }
            }
        }
        copy
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            client_identifier: self.settings.client_identifier.clone(),
            call_timeout: Duration::from_secs(self.settings.call_timeout_secs),
            operation_timeout: Duration::from_secs(self.settings.operation_timeout_secs),
            ..ClientOptions::default()
        }
    }

    pub fn reconcile_options(&self, dry_run: bool) -> ReconcileOptions {
        ReconcileOptions {
            verify_delay: Duration::from_secs(self.settings.verify_delay_secs),
            dry_run,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[settings]
verify_delay_secs = 2
max_concurrency = 2

[sharing]
allow_sync = false

[groups.plex1]
stats = true

[groups.plex1.regular]
name = "Plex 1"
machine_id = "3ad72e19d4509a15d9f8253666a03efa78baac44"
token = "secret-token"
url = "http://192.168.10.90:32400"
friendly_name = "JohnsonFlix"

[groups.plex1.fourk]
name = "Plex 1 4K"
machine_id = "90244d9a956da3afad32f85d6b24a9c24649d681"
token_env = "PLEXSHARE_TEST_TOKEN_UNSET"
url = "http://192.168.10.92:32400"

[groups.plex2.regular]
name = "Plex 2"
machine_id = "c6448117a95874f18274f31495ff5118fd291089"
token = "other-token"
"#;

    #[test]
    fn test_parse_sample() {
        let config = Config::parse(SAMPLE).unwrap();
        assert_eq!(config.settings.verify_delay_secs, 2);
        assert_eq!(config.settings.call_timeout_secs, 60);
        assert_eq!(config.settings.plex_tv_url, PLEX_TV_URL);
        assert!(!config.sharing.allow_sync);
        assert!(!config.sharing.allow_channels);

        let plex1 = config.group("plex1").unwrap();
        assert!(plex1.stats);
        let slots: Vec<Slot> = plex1.servers().map(|(slot, _)| slot).collect();
        assert_eq!(slots, vec![Slot::Regular, Slot::Fourk]);

        let plex2 = config.group("plex2").unwrap();
        assert!(!plex2.stats);
        assert!(plex2.fourk.is_none());
        assert_eq!(config.servers().count(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.groups.len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(err.to_string().contains("Could not read config file"));
    }

    #[test]
    fn test_load_rejects_invalid_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[settings]\nmax_concurrency = 1\n").unwrap();
        let err = Config::load(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("no server groups configured"));
    }

    #[test]
    fn test_validation_problems() {
        let mut config = Config::parse(SAMPLE).unwrap();
        config.settings.max_concurrency = 0;
        config.settings.call_timeout_secs = 300;
        config.groups.insert("empty".to_string(), GroupConfig::default());
        if let Some(regular) = config.groups.get_mut("plex2").and_then(|g| g.regular.as_mut()) {
            regular.machine_id = " ".to_string();
            regular.token = None;
        }

        let problems = config.problems();
        assert!(problems.contains(&ConfigError::ZeroConcurrency));
        assert!(problems.contains(&ConfigError::CallTimeoutTooLong {
            call: 300,
            operation: 120
        }));
        assert!(problems.contains(&ConfigError::EmptyGroup("empty".to_string())));
        assert!(problems.contains(&ConfigError::MissingMachineId {
            group: "plex2".to_string(),
            slot: Slot::Regular
        }));
        assert!(problems.contains(&ConfigError::MissingToken {
            group: "plex2".to_string(),
            slot: Slot::Regular
        }));
        assert_eq!(config.validate(), Err(ConfigError::ZeroConcurrency));
    }

    #[test]
    fn test_token_resolution() {
        let config = Config::parse(SAMPLE).unwrap();
        let plex1 = config.group("plex1").unwrap();
        assert_eq!(
            plex1.regular.as_ref().unwrap().token().unwrap(),
            "secret-token"
        );

        let err = plex1.fourk.as_ref().unwrap().token().unwrap_err();
        assert!(err.to_string().contains("PLEXSHARE_TEST_TOKEN_UNSET"));
    }

    #[test]
    fn test_url_required() {
        let config = Config::parse(SAMPLE).unwrap();
        let plex2 = config.group("plex2").unwrap().regular.as_ref().unwrap();
        assert!(plex2.url().is_err());
    }

    #[test]
    fn test_redacted_masks_inline_tokens() {
        let config = Config::parse(SAMPLE).unwrap().redacted();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret-token"));
        assert!(!json.contains("other-token"));
        assert!(json.contains("PLEXSHARE_TEST_TOKEN_UNSET"));
    }

    #[test]
    fn test_options_from_settings() {
        let config = Config::parse(SAMPLE).unwrap();
        let client = config.client_options();
        assert_eq!(client.call_timeout, Duration::from_secs(60));
        assert_eq!(client.operation_timeout, Duration::from_secs(120));

        let opts = config.reconcile_options(true);
        assert_eq!(opts.verify_delay, Duration::from_secs(2));
        assert!(opts.dry_run);
    }
}

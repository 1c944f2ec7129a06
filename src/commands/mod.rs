// Sharing
pub mod invite_status;
pub mod invites;
pub mod remove;
pub mod share;

// Server reports
pub mod resources;
pub mod stats;
pub mod watched;

pub mod config;

use anyhow::{Context as AnyhowContext, Result};
use plexkit::{ClientOptions, HttpClient, MediaServer, PlexTv};
use rayon::prelude::*;

use crate::Context;
use crate::access::PlexAccessBackend;
use crate::config::{Config, ServerConfig, Slot};
use crate::paths;

/// Loaded config plus the client settings derived from it
pub struct Runtime {
    pub config: Config,
    client: ClientOptions,
}

impl Runtime {
    pub fn load(ctx: &Context) -> Result<Self> {
        let path = paths::config_file(ctx.config_path.as_deref())?;
        let config = Config::load(&path)?;
        log::debug!(
            "Loaded {} groups from {}",
            config.groups.len(),
            path.display()
        );
        Ok(Self::new(config))
    }

    pub fn new(config: Config) -> Self {
        let client = config.client_options();
        Self { config, client }
    }

    /// Fresh HTTP client; its deadline starts now
    fn http(&self) -> HttpClient {
        HttpClient::new(&self.client)
    }

    pub fn account(&self, server: &ServerConfig) -> Result<PlexTv> {
        Ok(PlexTv::new(
            self.http(),
            self.config.settings.plex_tv_url.clone(),
            server.token()?,
        ))
    }

    pub fn media_server(&self, server: &ServerConfig) -> Result<MediaServer> {
        Ok(MediaServer::new(self.http(), server.url()?, server.token()?))
    }

    pub fn access_backend(&self, server: &ServerConfig) -> Result<PlexAccessBackend> {
        Ok(PlexAccessBackend::new(
            server.name.clone(),
            server.machine_id.clone(),
            self.account(server)?,
            self.config.sharing,
        )
        .with_friendly_name(server.friendly_name.clone()))
    }

    /// Run `f` for each server with at most `max_concurrency` in flight
    ///
    /// Results keep the order of `servers`.
    pub fn each_server<'a, T, F>(&self, servers: &[Target<'a>], f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(&Target<'a>) -> T + Send + Sync,
    {
        let jobs = self.config.settings.max_concurrency.max(1);
        if jobs == 1 || servers.len() <= 1 {
            return Ok(servers.iter().map(f).collect());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .context("Failed to create thread pool")?;
        Ok(pool.install(|| servers.par_iter().map(f).collect()))
    }
}

/// One configured server and where it sits in the config
#[derive(Debug, Clone, Copy)]
pub struct Target<'a> {
    pub group: &'a str,
    pub slot: Slot,
    pub server: &'a ServerConfig,
}

/// Insert `value` at `doc[group][slot]`
pub fn insert_slot(
    doc: &mut serde_json::Map<String, serde_json::Value>,
    target: &Target<'_>,
    value: serde_json::Value,
) {
    let group = doc
        .entry(target.group.to_string())
        .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
    if let Some(group) = group.as_object_mut() {
        group.insert(target.slot.to_string(), value);
    }
}

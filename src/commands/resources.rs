//! `resources` - server health, sessions and host utilization

use anyhow::Result;
use plexkit::{MediaServer, ResourceSample, SessionSummary, StatisticsFormat, latest_sample};
use serde::Serialize;
use serde_json::{Map, Value, json};

use super::{Runtime, Target, insert_slot};
use crate::Context;
use crate::ui;

/// Counters reported for one server
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResourceUsage {
    pub server_status: String,
    pub active_sessions: usize,
    pub transcoding_sessions: usize,
    pub direct_play_sessions: usize,
    pub library_count: usize,
    pub total_media_items: u64,
    pub cpu_usage_percent: f64,
    pub memory_usage_percent: f64,
    pub monitoring_source: String,
    pub found_real_data: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitoring_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ResourceUsage {
    /// Zeroed counters for a server that could not be reached
    pub fn unreachable(message: &str) -> Self {
        Self {
            server_status: "error".to_string(),
            monitoring_source: "error".to_string(),
            error_message: Some(message.to_string()),
            ..Self::default()
        }
    }

    fn apply_sessions(&mut self, summary: SessionSummary) {
        self.active_sessions = summary.active;
        self.transcoding_sessions = summary.transcoding;
        self.direct_play_sessions = summary.direct_play;
    }

    /// Record the outcome of `/statistics/resources`
    pub fn apply_statistics(
        &mut self,
        statistics: plexkit::Result<(Vec<ResourceSample>, StatisticsFormat)>,
    ) {
        match statistics {
            Ok((samples, format)) => match latest_sample(&samples) {
                Some(sample) => {
                    self.cpu_usage_percent = round1(sample.host_cpu_utilization);
                    self.memory_usage_percent = round1(sample.host_memory_utilization);
                    self.monitoring_source = format.source_label().to_string();
                    self.found_real_data = true;
                }
                None => {
                    self.monitoring_source = "not_available".to_string();
                    self.found_real_data = false;
                }
            },
            Err(e) => {
                self.monitoring_source = "error".to_string();
                self.monitoring_error = Some(e.to_string());
                self.found_real_data = false;
            }
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn server_report(server: &MediaServer, name: &str) -> plexkit::Result<Value> {
    let identity = server.identity()?;
    let mut usage = ResourceUsage {
        server_status: "online".to_string(),
        ..ResourceUsage::default()
    };

    match server.sessions() {
        Ok(sessions) => usage.apply_sessions(SessionSummary::from_sessions(&sessions)),
        Err(e) => log::warn!("{name}: session monitoring failed: {e}"),
    }

    match server.sections() {
        Ok(sections) => {
            usage.library_count = sections.len();
            usage.total_media_items = sections
                .iter()
                .filter_map(|s| match server.count(&s.key, None) {
                    Ok(n) => Some(n),
                    Err(e) => {
                        log::debug!("{name}: could not count {}: {e}", s.title);
                        None
                    }
                })
                .sum();
        }
        Err(e) => log::warn!("{name}: library listing failed: {e}"),
    }

    usage.apply_statistics(server.statistics_resources());

    Ok(json!({
        "success": true,
        "server_name": name,
        "server_url": server.base_url(),
        "server_version": identity.version,
        "platform": identity.platform,
        "platform_version": identity.platform_version,
        "machine_identifier": identity.machine_identifier,
        "resources": usage,
    }))
}

fn failure(name: &str, url: Option<&str>, message: &str) -> Value {
    json!({
        "success": false,
        "server_name": name,
        "server_url": url,
        "error": message,
        "resources": ResourceUsage::unreachable(message),
    })
}

pub fn run(ctx: &Context) -> Result<Value> {
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

    let reports = runtime.each_server(&targets, |target| {
        let name = &target.server.name;
        let report = runtime
            .media_server(target.server)
            .and_then(|server| server_report(&server, name).map_err(Into::into));
        report.unwrap_or_else(|e| {
            log::error!("{name}: {e:#}");
            failure(name, target.server.url.as_deref(), &format!("{e:#}"))
        })
    })?;

    let mut groups = Map::new();
    let mut online = 0usize;
    for (target, report) in targets.iter().zip(reports) {
        if report["success"] == true {
            online += 1;
        }
        insert_slot(&mut groups, target, report);
    }

    if !ctx.quiet {
        ui::info(&format!("{online}/{} servers online", targets.len()));
    }

    Ok(json!({
        "success": online == targets.len(),
        "groups": groups,
    }))
}

//! Response models for plex.tv and media server endpoints.
//!
//! Most endpoints answer with a `MediaContainer` XML document; the v2
//! resources API and the statistics endpoint answer in JSON.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// Decode an XML `MediaContainer` document.
pub(crate) fn from_xml<T: DeserializeOwned>(body: &str) -> Result<T> {
    Ok(quick_xml::de::from_str(body)?)
}

/// Epoch seconds as a UTC timestamp.
pub(crate) fn epoch(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    !a.is_empty() && a.eq_ignore_ascii_case(b)
}

// ============================================================================
// plex.tv
// ============================================================================

/// Device registered to an account (`/api/v2/resources`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub name: String,
    pub client_identifier: String,
    #[serde(default)]
    pub provides: String,
    #[serde(default)]
    pub owned: bool,
    #[serde(default)]
    pub presence: bool,
    #[serde(default)]
    pub product_version: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl Resource {
    /// Whether the device is a media server.
    pub fn is_server(&self) -> bool {
        self.provides.split(',').any(|p| p.trim() == "server")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub uri: String,
    #[serde(default)]
    pub local: bool,
    #[serde(default)]
    pub relay: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserContainer {
    #[serde(rename = "User", default)]
    pub users: Vec<PlexUser>,
}

/// Friend of the account (`/api/users`).
#[derive(Debug, Clone, Deserialize)]
pub struct PlexUser {
    #[serde(rename = "@id")]
    pub id: u64,
    #[serde(rename = "@title", default)]
    pub title: String,
    #[serde(rename = "@username", default)]
    pub username: String,
    #[serde(rename = "@email", default)]
    pub email: String,
    #[serde(rename = "Server", default)]
    pub servers: Vec<UserServer>,
}

impl PlexUser {
    /// Match on email, username or title, ignoring case.
    pub fn matches(&self, ident: &str) -> bool {
        eq_ignore_case(&self.email, ident)
            || eq_ignore_case(&self.username, ident)
            || eq_ignore_case(&self.title, ident)
    }
}

/// Server shared with a friend, as listed under the friend.
#[derive(Debug, Clone, Deserialize)]
pub struct UserServer {
    #[serde(rename = "@id", default)]
    pub id: u64,
    #[serde(rename = "@machineIdentifier", default)]
    pub machine_identifier: String,
    #[serde(rename = "@name", default)]
    pub name: String,
    #[serde(rename = "@numLibraries", default)]
    pub num_libraries: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InviteContainer {
    #[serde(rename = "Invite", default)]
    pub invites: Vec<Invite>,
}

/// Outstanding invitation sent by the account (`/api/invites/requested`).
#[derive(Debug, Clone, Deserialize)]
pub struct Invite {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@email", default)]
    pub email: String,
    #[serde(rename = "@username", default)]
    pub username: String,
    #[serde(rename = "@friendlyName", default)]
    pub friendly_name: String,
    #[serde(rename = "@createdAt", default)]
    pub created_at: String,
    #[serde(rename = "@friend", default)]
    pub friend: String,
    #[serde(rename = "@server", default)]
    pub server: String,
    #[serde(rename = "@home", default)]
    pub home: String,
    #[serde(rename = "Server", default)]
    pub servers: Vec<InviteServer>,
}

impl Invite {
    pub fn matches(&self, ident: &str) -> bool {
        eq_ignore_case(&self.email, ident) || eq_ignore_case(&self.username, ident)
    }

    /// Creation time, when the server reported one.
    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.created_at.parse().ok().and_then(epoch)
    }

    /// Flags echoed back when cancelling the invitation.
    pub(crate) fn cancel_query(&self) -> Vec<(&'static str, String)> {
        let bit = |v: &str| if v == "1" { "1" } else { "0" }.to_string();
        vec![
            ("friend", bit(&self.friend)),
            ("server", bit(&self.server)),
            ("home", bit(&self.home)),
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InviteServer {
    #[serde(rename = "@name", default)]
    pub name: String,
    #[serde(rename = "@numLibraries", default)]
    pub num_libraries: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServerDetailContainer {
    #[serde(rename = "Server", default)]
    pub servers: Vec<ServerDetail>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServerDetail {
    #[serde(rename = "Section", default)]
    pub sections: Vec<AccountSection>,
}

/// Library section as plex.tv knows it (`/api/servers/{machine}`).
///
/// `key` matches the local server's section key; `id` is the account-wide
/// identifier that sharing requests expect.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountSection {
    #[serde(rename = "@id")]
    pub id: u64,
    #[serde(rename = "@key")]
    pub key: String,
    #[serde(rename = "@title", default)]
    pub title: String,
    #[serde(rename = "@type", default)]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SharedServerContainer {
    #[serde(rename = "SharedServer", default)]
    pub shared_servers: Vec<SharedServer>,
}

/// One friend's share of a server (`/api/servers/{machine}/shared_servers`).
#[derive(Debug, Clone, Deserialize)]
pub struct SharedServer {
    #[serde(rename = "@id")]
    pub id: u64,
    #[serde(rename = "@userID", default)]
    pub user_id: u64,
    #[serde(rename = "@username", default)]
    pub username: String,
    #[serde(rename = "@email", default)]
    pub email: String,
    #[serde(rename = "@acceptedAt", default)]
    pub accepted_at: String,
    #[serde(rename = "Section", default)]
    pub sections: Vec<SharedSection>,
}

impl SharedServer {
    pub fn matches(&self, ident: &str) -> bool {
        eq_ignore_case(&self.email, ident) || eq_ignore_case(&self.username, ident)
    }

    /// Keys of the sections currently shared.
    pub fn shared_keys(&self) -> Vec<String> {
        self.sections
            .iter()
            .filter(|s| s.shared == "1")
            .map(|s| s.key.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SharedSection {
    #[serde(rename = "@id", default)]
    pub id: u64,
    #[serde(rename = "@key", default)]
    pub key: String,
    #[serde(rename = "@title", default)]
    pub title: String,
    #[serde(rename = "@shared", default)]
    pub shared: String,
}

// ============================================================================
// Local media server
// ============================================================================

/// Root endpoint of a media server (`/`).
#[derive(Debug, Clone, Deserialize)]
pub struct Identity {
    #[serde(rename = "@friendlyName", default)]
    pub friendly_name: String,
    #[serde(rename = "@machineIdentifier", default)]
    pub machine_identifier: String,
    #[serde(rename = "@version", default)]
    pub version: String,
    #[serde(rename = "@platform", default)]
    pub platform: String,
    #[serde(rename = "@platformVersion", default)]
    pub platform_version: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SectionContainer {
    #[serde(rename = "Directory", default)]
    pub sections: Vec<LibrarySection>,
}

/// Library section on the local server (`/library/sections`).
#[derive(Debug, Clone, Deserialize)]
pub struct LibrarySection {
    #[serde(rename = "@key")]
    pub key: String,
    #[serde(rename = "@title", default)]
    pub title: String,
    #[serde(rename = "@type", default)]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CountContainer {
    #[serde(rename = "@size", default)]
    pub size: u64,
    #[serde(rename = "@totalSize")]
    pub total_size: Option<u64>,
}

impl CountContainer {
    pub fn total(&self) -> u64 {
        self.total_size.unwrap_or(self.size)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SessionContainer {
    #[serde(rename = "Video", default)]
    pub videos: Vec<Session>,
    #[serde(rename = "Track", default)]
    pub tracks: Vec<Session>,
    #[serde(rename = "Photo", default)]
    pub photos: Vec<Session>,
}

impl SessionContainer {
    pub fn into_sessions(self) -> Vec<Session> {
        self.videos
            .into_iter()
            .chain(self.tracks)
            .chain(self.photos)
            .collect()
    }
}

/// Active playback (`/status/sessions`).
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    #[serde(rename = "@title", default)]
    pub title: String,
    #[serde(rename = "@type", default)]
    pub kind: String,
    #[serde(rename = "User")]
    pub user: Option<SessionUser>,
    #[serde(rename = "TranscodeSession")]
    pub transcode: Option<TranscodeSession>,
}

impl Session {
    pub fn is_transcoding(&self) -> bool {
        self.transcode.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionUser {
    #[serde(rename = "@id", default)]
    pub id: String,
    #[serde(rename = "@title", default)]
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscodeSession {
    #[serde(rename = "@key", default)]
    pub key: String,
    #[serde(rename = "@videoDecision", default)]
    pub video_decision: String,
}

/// Session counts derived from `/status/sessions`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub active: usize,
    pub transcoding: usize,
    pub direct_play: usize,
}

impl SessionSummary {
    pub fn from_sessions(sessions: &[Session]) -> Self {
        let transcoding = sessions.iter().filter(|s| s.is_transcoding()).count();
        Self {
            active: sessions.len(),
            transcoding,
            direct_play: sessions.len() - transcoding,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccountContainer {
    #[serde(rename = "Account", default)]
    pub accounts: Vec<Account>,
}

/// Local account known to the server (`/accounts`).
#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    #[serde(rename = "@id")]
    pub id: u64,
    #[serde(rename = "@name", default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryContainer {
    #[serde(rename = "@totalSize")]
    pub total_size: Option<u64>,
    #[serde(rename = "Video", default)]
    pub videos: Vec<HistoryEntry>,
    #[serde(rename = "Track", default)]
    pub tracks: Vec<HistoryEntry>,
    #[serde(rename = "Photo", default)]
    pub photos: Vec<HistoryEntry>,
}

impl HistoryContainer {
    pub fn into_entries(self) -> Vec<HistoryEntry> {
        self.videos
            .into_iter()
            .chain(self.tracks)
            .chain(self.photos)
            .collect()
    }
}

/// Watch history item (`/status/sessions/history/all`).
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "@title", default)]
    pub title: String,
    #[serde(rename = "@grandparentTitle", default)]
    pub grandparent_title: String,
    #[serde(rename = "@type", default)]
    pub kind: String,
    #[serde(rename = "@ratingKey", default)]
    pub rating_key: String,
    #[serde(rename = "@year")]
    pub year: Option<u32>,
    #[serde(rename = "@viewedAt")]
    pub viewed_at: Option<i64>,
    #[serde(rename = "@accountID")]
    pub account_id: Option<u64>,
}

impl HistoryEntry {
    pub fn viewed(&self) -> Option<DateTime<Utc>> {
        self.viewed_at.and_then(epoch)
    }
}

/// Where host utilization figures came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatisticsFormat {
    Json,
    Xml,
}

impl StatisticsFormat {
    pub fn source_label(self) -> &'static str {
        match self {
            Self::Json => "statistics_resources_json",
            Self::Xml => "statistics_resources_xml",
        }
    }
}

/// Host utilization sample (`/statistics/resources`).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSample {
    #[serde(default)]
    pub at: i64,
    #[serde(default)]
    pub host_cpu_utilization: f64,
    #[serde(default)]
    pub host_memory_utilization: f64,
    #[serde(default)]
    pub process_cpu_utilization: f64,
    #[serde(default)]
    pub process_memory_utilization: f64,
}

#[derive(Debug, Deserialize)]
struct StatisticsJson {
    #[serde(rename = "MediaContainer")]
    container: StatisticsJsonContainer,
}

#[derive(Debug, Deserialize)]
struct StatisticsJsonContainer {
    #[serde(rename = "StatisticsResources", default)]
    samples: Vec<ResourceSample>,
}

#[derive(Debug, Deserialize)]
struct StatisticsXmlContainer {
    #[serde(rename = "StatisticsResources", default)]
    samples: Vec<StatisticsXmlSample>,
}

#[derive(Debug, Deserialize)]
struct StatisticsXmlSample {
    #[serde(rename = "@at", default)]
    at: i64,
    #[serde(rename = "@hostCpuUtilization", default)]
    host_cpu_utilization: f64,
    #[serde(rename = "@hostMemoryUtilization", default)]
    host_memory_utilization: f64,
    #[serde(rename = "@processCpuUtilization", default)]
    process_cpu_utilization: f64,
    #[serde(rename = "@processMemoryUtilization", default)]
    process_memory_utilization: f64,
}

impl From<StatisticsXmlSample> for ResourceSample {
    fn from(s: StatisticsXmlSample) -> Self {
        Self {
            at: s.at,
            host_cpu_utilization: s.host_cpu_utilization,
            host_memory_utilization: s.host_memory_utilization,
            process_cpu_utilization: s.process_cpu_utilization,
            process_memory_utilization: s.process_memory_utilization,
        }
    }
}

/// Parse a statistics body, trying JSON first and XML second.
pub fn parse_statistics(body: &str) -> Result<(Vec<ResourceSample>, StatisticsFormat)> {
    match serde_json::from_str::<StatisticsJson>(body) {
        Ok(parsed) => Ok((parsed.container.samples, StatisticsFormat::Json)),
        Err(json_err) => {
            log::debug!("Statistics body is not JSON ({json_err}), trying XML");
            let parsed: StatisticsXmlContainer = from_xml(body).map_err(|xml_err| {
                Error::InvalidResponse(format!(
                    "statistics are neither JSON ({json_err}) nor XML ({xml_err})"
                ))
            })?;
            Ok((
                parsed.samples.into_iter().map(Into::into).collect(),
                StatisticsFormat::Xml,
            ))
        }
    }
}

/// Most recent sample by timestamp.
pub fn latest_sample(samples: &[ResourceSample]) -> Option<ResourceSample> {
    samples.iter().copied().max_by_key(|s| s.at)
}

#[cfg(test)]
mod tests {
    use super::*;

    const USERS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<MediaContainer friendlyName="myPlex" identifier="com.plexapp.plugins.myplex" size="2">
  <User id="1001" title="Friend" username="friend" email="Friend@Example.com" home="0">
    <Server id="77" serverId="5" machineIdentifier="abc" name="Plex 1" numLibraries="3" allLibraries="0" owned="1" pending="0"/>
  </User>
  <User id="1002" title="other" username="" email="other@example.com"/>
</MediaContainer>"#;

    const SHARED: &str = r#"<MediaContainer friendlyName="myPlex" size="1">
  <SharedServer id="555" username="friend" email="friend@example.com" userID="1001" acceptedAt="1690000000" invitedAt="1680000000" allowSync="1" owned="0" allLibraries="0">
    <Section id="9001" key="1" title="Movies" type="movie" shared="1"/>
    <Section id="9002" key="2" title="TV" type="show" shared="0"/>
    <Section id="9003" key="22" title="Anime" type="show" shared="1"/>
  </SharedServer>
</MediaContainer>"#;

    #[test]
    fn test_parse_users() {
        let container: UserContainer = from_xml(USERS).unwrap();
        assert_eq!(container.users.len(), 2);
        let friend = &container.users[0];
        assert_eq!(friend.id, 1001);
        assert!(friend.matches("friend@example.com"));
        assert!(friend.matches("FRIEND"));
        assert_eq!(friend.servers[0].machine_identifier, "abc");
        assert_eq!(friend.servers[0].num_libraries, 3);
        assert!(!container.users[1].matches(""));
    }

    #[test]
    fn test_parse_shared_servers() {
        let container: SharedServerContainer = from_xml(SHARED).unwrap();
        let share = &container.shared_servers[0];
        assert_eq!(share.id, 555);
        assert_eq!(share.user_id, 1001);
        assert!(share.matches("FRIEND@example.com"));
        assert_eq!(share.shared_keys(), vec!["1", "22"]);
    }

    #[test]
    fn test_parse_empty_shared_servers() {
        let container: SharedServerContainer =
            from_xml(r#"<MediaContainer size="0"></MediaContainer>"#).unwrap();
        assert!(container.shared_servers.is_empty());
    }

    #[test]
    fn test_parse_invites() {
        let xml = r#"<MediaContainer size="1">
  <Invite id="4242" createdAt="1700000000" friend="1" home="0" server="1" username="" email="new@example.com" friendlyName="new@example.com">
    <Server name="Plex 1" numLibraries="2"/>
  </Invite>
</MediaContainer>"#;
        let container: InviteContainer = from_xml(xml).unwrap();
        let invite = &container.invites[0];
        assert!(invite.matches("NEW@example.com"));
        assert_eq!(invite.created().unwrap().timestamp(), 1_700_000_000);
        assert_eq!(invite.servers[0].name, "Plex 1");
        assert_eq!(
            invite.cancel_query(),
            vec![
                ("friend", "1".to_string()),
                ("server", "1".to_string()),
                ("home", "0".to_string())
            ]
        );
    }

    #[test]
    fn test_parse_server_sections() {
        let xml = r#"<MediaContainer size="1">
  <Server name="Plex 1" machineIdentifier="abc" owned="1">
    <Section id="9001" key="1" type="movie" title="Movies"/>
    <Section id="9003" key="22" type="show" title="Anime"/>
  </Server>
</MediaContainer>"#;
        let container: ServerDetailContainer = from_xml(xml).unwrap();
        let sections = &container.servers[0].sections;
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1].id, 9003);
        assert_eq!(sections[1].key, "22");
        assert_eq!(sections[1].kind, "show");
    }

    #[test]
    fn test_parse_resources_json() {
        let json = r#"[
  {"name":"Plex 1","clientIdentifier":"abc","provides":"server","owned":true,"presence":true,
   "productVersion":"1.40.0","platform":"Linux",
   "connections":[{"uri":"http://10.0.0.2:32400","local":true,"relay":false}]},
  {"name":"Phone","clientIdentifier":"p","provides":"client,player","productVersion":null}
]"#;
        let resources: Vec<Resource> = serde_json::from_str(json).unwrap();
        assert!(resources[0].is_server());
        assert!(!resources[1].is_server());
        assert_eq!(resources[0].connections[0].uri, "http://10.0.0.2:32400");
        assert!(resources[1].product_version.is_none());
    }

    #[test]
    fn test_parse_identity_and_counts() {
        let identity: Identity = from_xml(
            r#"<MediaContainer size="0" friendlyName="JohnsonFlix" machineIdentifier="abc" version="1.40.1" platform="Linux" platformVersion="6.1"/>"#,
        )
        .unwrap();
        assert_eq!(identity.friendly_name, "JohnsonFlix");
        assert_eq!(identity.platform_version, "6.1");

        let count: CountContainer =
            from_xml(r#"<MediaContainer size="0" totalSize="1234" offset="0"/>"#).unwrap();
        assert_eq!(count.total(), 1234);
        let count: CountContainer = from_xml(r#"<MediaContainer size="7"/>"#).unwrap();
        assert_eq!(count.total(), 7);
    }

    #[test]
    fn test_parse_sessions_mixed_elements() {
        let xml = r#"<MediaContainer size="3">
  <Video title="Movie A" type="movie"><User id="1" title="alice"/><TranscodeSession key="/t/1" videoDecision="transcode"/></Video>
  <Track title="Song" type="track"><User id="2" title="bob"/></Track>
  <Video title="Movie B" type="movie"><User id="3" title="carol"/></Video>
</MediaContainer>"#;
        let container: SessionContainer = from_xml(xml).unwrap();
        let sessions = container.into_sessions();
        let summary = SessionSummary::from_sessions(&sessions);
        assert_eq!(
            summary,
            SessionSummary {
                active: 3,
                transcoding: 1,
                direct_play: 2
            }
        );
    }

    #[test]
    fn test_parse_history() {
        let xml = r#"<MediaContainer size="3" totalSize="3">
  <Video historyKey="/h/1" ratingKey="10" title="Pilot" grandparentTitle="Show" type="episode" viewedAt="1700000000" accountID="1"/>
  <Track historyKey="/h/2" ratingKey="11" title="Song" type="track" viewedAt="1700000500" accountID="2"/>
  <Video historyKey="/h/3" ratingKey="12" title="Film" type="movie" year="1999" viewedAt="1600000000" accountID="1"/>
</MediaContainer>"#;
        let container: HistoryContainer = from_xml(xml).unwrap();
        assert_eq!(container.total_size, Some(3));
        let entries = container.into_entries();
        assert_eq!(entries.len(), 3);
        let film = entries.iter().find(|e| e.title == "Film").unwrap();
        assert_eq!(film.year, Some(1999));
        assert_eq!(film.viewed().unwrap().timestamp(), 1_600_000_000);
    }

    #[test]
    fn test_parse_accounts() {
        let container: AccountContainer = from_xml(
            r#"<MediaContainer size="2"><Account id="0" key="/accounts/0" name=""/><Account id="1" name="alice"/></MediaContainer>"#,
        )
        .unwrap();
        assert_eq!(container.accounts.len(), 2);
        assert_eq!(container.accounts[1].name, "alice");
    }

    #[test]
    fn test_statistics_json() {
        let body = r#"{"MediaContainer":{"size":2,"StatisticsResources":[
            {"timespan":6,"at":100,"hostCpuUtilization":12.5,"hostMemoryUtilization":40.0},
            {"timespan":6,"at":200,"hostCpuUtilization":20.0,"hostMemoryUtilization":41.5}]}}"#;
        let (samples, format) = parse_statistics(body).unwrap();
        assert_eq!(format, StatisticsFormat::Json);
        let latest = latest_sample(&samples).unwrap();
        assert_eq!(latest.at, 200);
        assert!((latest.host_memory_utilization - 41.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_statistics_xml_fallback() {
        let body =
            r#"<MediaContainer size="1"><StatisticsResources timespan="6" at="300" hostCpuUtilization="5.5" hostMemoryUtilization="30.25"/></MediaContainer>"#;
        let (samples, format) = parse_statistics(body).unwrap();
        assert_eq!(format, StatisticsFormat::Xml);
        assert_eq!(format.source_label(), "statistics_resources_xml");
        assert_eq!(samples[0].at, 300);
    }

    #[test]
    fn test_statistics_garbage_is_format_error() {
        let err = parse_statistics("").unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }
}

//! Local media server API.

use crate::client::{Accept, HttpClient, join_url};
use crate::error::Result;
use crate::models::{
    Account, AccountContainer, CountContainer, HistoryContainer, HistoryEntry, Identity,
    LibrarySection, ResourceSample, SectionContainer, Session, SessionContainer,
    StatisticsFormat, from_xml, parse_statistics,
};
use crate::types::LibraryType;

/// Default page size for history requests.
pub const HISTORY_PAGE_SIZE: u64 = 1000;

/// Statistics timespan code for the most recent samples.
const STATISTICS_TIMESPAN: &str = "6";

/// Client for one media server reached over its local URL.
#[derive(Clone)]
pub struct MediaServer {
    http: HttpClient,
    base_url: String,
    token: String,
}

impl MediaServer {
    pub fn new(http: HttpClient, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get_xml<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = join_url(&self.base_url, path);
        let body = self.http.get(&url, &self.token, Accept::Xml, query)?;
        from_xml(&body)
    }

    /// Name, version and platform of the server.
    pub fn identity(&self) -> Result<Identity> {
        self.get_xml("/", &[])
    }

    pub fn sections(&self) -> Result<Vec<LibrarySection>> {
        let container: SectionContainer = self.get_xml("/library/sections", &[])?;
        Ok(container.sections)
    }

    /// Number of items in a section, optionally of a specific type.
    ///
    /// Asks for an empty page so only the total is transferred.
    pub fn count(&self, section_key: &str, kind: Option<LibraryType>) -> Result<u64> {
        let mut query = vec![
            ("X-Plex-Container-Start", "0".to_string()),
            ("X-Plex-Container-Size", "0".to_string()),
        ];
        if let Some(kind) = kind {
            query.push(("type", kind.code().to_string()));
        }
        let container: CountContainer =
            self.get_xml(&format!("/library/sections/{section_key}/all"), &query)?;
        Ok(container.total())
    }

    /// Current playback sessions.
    pub fn sessions(&self) -> Result<Vec<Session>> {
        let container: SessionContainer = self.get_xml("/status/sessions", &[])?;
        Ok(container.into_sessions())
    }

    /// Accounts that have used this server.
    pub fn accounts(&self) -> Result<Vec<Account>> {
        let container: AccountContainer = self.get_xml("/accounts", &[])?;
        Ok(container.accounts)
    }

    /// Complete watch history, newest first, fetched page by page.
    pub fn history(&self, page_size: u64) -> Result<Vec<HistoryEntry>> {
        let page_size = page_size.max(1);
        let mut entries = Vec::new();
        let mut start = 0u64;

        loop {
            let query = [
                ("sort", "viewedAt:desc".to_string()),
                ("X-Plex-Container-Start", start.to_string()),
                ("X-Plex-Container-Size", page_size.to_string()),
            ];
            let container: HistoryContainer =
                self.get_xml("/status/sessions/history/all", &query)?;
            let total = container.total_size;
            let page = container.into_entries();
            let fetched = page.len() as u64;
            entries.extend(page);
            start += fetched;

            log::debug!(
                "Fetched {} history items from {}",
                entries.len(),
                self.base_url
            );

            if fetched < page_size || total.is_some_and(|t| start >= t) {
                break;
            }
        }

        Ok(entries)
    }

    /// Recent host utilization samples and the format they arrived in.
    pub fn statistics_resources(&self) -> Result<(Vec<ResourceSample>, StatisticsFormat)> {
        let url = join_url(&self.base_url, "/statistics/resources");
        let body = self.http.get(
            &url,
            &self.token,
            Accept::Json,
            &[("timespan", STATISTICS_TIMESPAN.to_string())],
        )?;
        parse_statistics(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientOptions;

    #[test]
    fn test_base_url_kept() {
        let server = MediaServer::new(
            HttpClient::new(&ClientOptions::default()),
            "http://192.168.10.90:32400",
            "tok",
        );
        assert_eq!(server.base_url(), "http://192.168.10.90:32400");
    }
}

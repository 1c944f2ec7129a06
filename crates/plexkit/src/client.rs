//! Shared HTTP transport.
//!
//! One [`HttpClient`] is created per command run and cloned into every
//! plex.tv and media-server client. Clones share the connection pool and the
//! operation [`Deadline`].

use crate::deadline::Deadline;
use crate::error::{Error, Result};
use std::time::Duration;
use ureq::http::Response;
use ureq::{Agent, Body, RequestBuilder};

/// Maximum response size (history pages on large servers can be several MB).
const MAX_BODY_SIZE: u64 = 32 * 1024 * 1024;

/// Product name sent with every request.
pub const DEFAULT_PRODUCT: &str = "plexshare";

/// Options for building an [`HttpClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Value of `X-Plex-Client-Identifier`.
    pub client_identifier: String,
    /// Value of `X-Plex-Product`.
    pub product: String,
    /// Timeout for a single call.
    pub call_timeout: Duration,
    /// Budget for the whole operation.
    pub operation_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            client_identifier: DEFAULT_PRODUCT.to_string(),
            product: DEFAULT_PRODUCT.to_string(),
            call_timeout: crate::deadline::DEFAULT_CALL_TIMEOUT,
            operation_timeout: crate::deadline::DEFAULT_OPERATION_TIMEOUT,
        }
    }
}

/// Content type requested from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accept {
    Xml,
    Json,
}

impl Accept {
    fn header(self) -> &'static str {
        match self {
            Self::Xml => "application/xml",
            Self::Json => "application/json",
        }
    }
}

/// Blocking HTTP client carrying the Plex identification headers.
#[derive(Clone)]
pub struct HttpClient {
    agent: Agent,
    client_identifier: String,
    product: String,
    deadline: Deadline,
}

impl HttpClient {
    /// Create a client and start its operation deadline.
    #[must_use]
    pub fn new(options: &ClientOptions) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(options.call_timeout))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            client_identifier: options.client_identifier.clone(),
            product: options.product.clone(),
            deadline: Deadline::new(options.operation_timeout, options.call_timeout),
        }
    }

    /// The deadline shared by every clone of this client.
    #[must_use]
    pub fn deadline(&self) -> Deadline {
        self.deadline
    }

    pub(crate) fn get(
        &self,
        url: &str,
        token: &str,
        accept: Accept,
        query: &[(&str, String)],
    ) -> Result<String> {
        log::debug!("GET {url}");
        let request = self.prepare(self.agent.get(url), token, accept, query)?;
        let response = request.call()?;
        read_body(url, response)
    }

    pub(crate) fn post_json(
        &self,
        url: &str,
        token: &str,
        query: &[(&str, String)],
        body: &serde_json::Value,
    ) -> Result<String> {
        log::debug!("POST {url}");
        let request = self.prepare(self.agent.post(url), token, Accept::Json, query)?;
        let response = request.send_json(body)?;
        read_body(url, response)
    }

    pub(crate) fn put_json(
        &self,
        url: &str,
        token: &str,
        query: &[(&str, String)],
        body: &serde_json::Value,
    ) -> Result<String> {
        log::debug!("PUT {url}");
        let request = self.prepare(self.agent.put(url), token, Accept::Json, query)?;
        let response = request.send_json(body)?;
        read_body(url, response)
    }

    pub(crate) fn put(&self, url: &str, token: &str, query: &[(&str, String)]) -> Result<String> {
        log::debug!("PUT {url}");
        let request = self.prepare(self.agent.put(url), token, Accept::Xml, query)?;
        let response = request.send_empty()?;
        read_body(url, response)
    }

    pub(crate) fn delete(
        &self,
        url: &str,
        token: &str,
        query: &[(&str, String)],
    ) -> Result<String> {
        log::debug!("DELETE {url}");
        let request = self.prepare(self.agent.delete(url), token, Accept::Xml, query)?;
        let response = request.call()?;
        read_body(url, response)
    }

    /// Attach headers, query and the deadline-bounded timeout.
    fn prepare<B>(
        &self,
        request: RequestBuilder<B>,
        token: &str,
        accept: Accept,
        query: &[(&str, String)],
    ) -> Result<RequestBuilder<B>> {
        let timeout = self.deadline.call_timeout()?;

        let mut request = request
            .header("X-Plex-Token", token)
            .header("X-Plex-Client-Identifier", &self.client_identifier)
            .header("X-Plex-Product", &self.product)
            .header("Accept", accept.header());

        for (key, value) in query {
            request = request.query(key, value);
        }

        Ok(request.config().timeout_global(Some(timeout)).build())
    }
}

/// Read a response body, turning non-2xx statuses into classified errors.
fn read_body(url: &str, mut response: Response<Body>) -> Result<String> {
    let status = response.status().as_u16();
    let body = response
        .body_mut()
        .with_config()
        .limit(MAX_BODY_SIZE)
        .read_to_string()?;

    if (200..300).contains(&status) {
        Ok(body)
    } else {
        log::debug!("HTTP {status} from {url}");
        Err(Error::from_status(status, url, &body))
    }
}

/// Join a base URL and an absolute path without doubling slashes.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("https://plex.tv", "/api/users"),
            "https://plex.tv/api/users"
        );
        assert_eq!(
            join_url("https://plex.tv/", "api/users"),
            "https://plex.tv/api/users"
        );
        assert_eq!(
            join_url("http://10.0.0.2:32400/", "/library/sections"),
            "http://10.0.0.2:32400/library/sections"
        );
    }

    #[test]
    fn test_accept_headers() {
        assert_eq!(Accept::Xml.header(), "application/xml");
        assert_eq!(Accept::Json.header(), "application/json");
    }

    #[test]
    fn test_client_starts_deadline() {
        let client = HttpClient::new(&ClientOptions {
            operation_timeout: Duration::from_secs(30),
            call_timeout: Duration::from_secs(60),
            ..ClientOptions::default()
        });
        let timeout = client.deadline().call_timeout().unwrap();
        assert!(timeout <= Duration::from_secs(30));
    }

    #[test]
    fn test_expired_client_refuses_requests() {
        let client = HttpClient::new(&ClientOptions {
            operation_timeout: Duration::ZERO,
            ..ClientOptions::default()
        });
        // fails before any connection is attempted
        let err = client
            .get("http://127.0.0.1:9/", "t", Accept::Xml, &[])
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }
}

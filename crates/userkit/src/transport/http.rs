//! Blocking HTTP transport.
//!
//! [`HttpTransport`] sends requests with a [`ureq::Agent`] configured to hand
//! back error statuses as ordinary responses, so the client generations can
//! read the error bodies they know how to parse.

use std::fmt;

use crate::transport::{Error, HttpResponse, Method, Transport};

/// Maximum response size (user documents are small).
const MAX_BODY_SIZE: u64 = 10 * 1024 * 1024;

/// HTTP transport for a single cluster endpoint.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use userkit::transport::http::HttpTransport;
/// use userkit::ClientHandle;
///
/// let transport = Arc::new(HttpTransport::new("http://localhost:9200"));
/// let client = ClientHandle::connect(transport, Some("7.17.0")).unwrap();
/// ```
pub struct HttpTransport {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// Cluster URL without a trailing slash.
    base_url: String,
}

impl HttpTransport {
    /// Create a transport for the cluster at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build();
        let base_url: String = base_url.into();

        Self {
            agent: ureq::Agent::new_with_config(config),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Get the cluster URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the full URL for a request path.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl Transport for HttpTransport {
    fn send(&self, method: Method, path: &str, body: Option<&[u8]>) -> Result<HttpResponse, Error> {
        let url = self.url(path);
        log::debug!("{method} {url}");

        let result = match (method, body) {
            (Method::Get, _) => self
                .agent
                .get(&url)
                .header("Accept", "application/json")
                .call(),
            (Method::Delete, _) => self
                .agent
                .delete(&url)
                .header("Accept", "application/json")
                .call(),
            (Method::Put, Some(body)) => self
                .agent
                .put(&url)
                .header("Accept", "application/json")
                .header("Content-Type", "application/json")
                .send(body),
            (Method::Put, None) => self.agent.put(&url).send_empty(),
        };

        let mut response = result.map_err(|e| Error::new(method, path, e.to_string()))?;
        let status = response.status().as_u16();

        let bytes = response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_SIZE)
            .read_to_vec()
            .map_err(|e| Error::new(method, path, e.to_string()))?;

        log::debug!("{method} {url} -> {status}");
        Ok(HttpResponse::new(status, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_trimmed() {
        let transport = HttpTransport::new("http://localhost:9200/");
        assert_eq!(transport.base_url(), "http://localhost:9200");
    }

    #[test]
    fn test_url_joins_path() {
        let transport = HttpTransport::new("https://es.internal:9243");
        assert_eq!(
            transport.url("/_security/user/alice"),
            "https://es.internal:9243/_security/user/alice"
        );
    }

    #[test]
    fn test_debug_hides_agent() {
        let transport = HttpTransport::new("http://localhost:9200");
        let debug = format!("{transport:?}");
        assert!(debug.contains("localhost:9200"));
    }

    #[test]
    fn test_unreachable_host_is_an_error() {
        // Port 9 (discard) on localhost is not expected to serve HTTP.
        let transport = HttpTransport::new("http://127.0.0.1:9");
        let result = transport.send(Method::Get, "/", None);
        assert!(result.is_err());
    }
}

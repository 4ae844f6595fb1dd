//! Elasticsearch 7.x client.
//!
//! Users live under `/_security/user/{username}`. Error responses carry a
//! structured body:
//!
//! ```json
//! {"error": {"type": "resource_not_found_exception", "reason": "..."}, "status": 404}
//! ```
//!
//! A missing user is reported as a bare `404 {}` on get.

use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result, TransportError};
use crate::family::{ApiFamily, UserApi};
use crate::model::RemoteUser;
use crate::transport::{self, HttpResponse, Method, Transport};
use crate::wire::{self, GetUserResponse};

const USER_PATH: &str = "/_security/user";

/// `type` and `reason` from a 7.x error body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorDetails {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetails,
}

/// A failure reported by the 7.x client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The cluster answered with a non-2xx status.
    #[error("elasticsearch v7 returned {status}: {}", DetailsDisplay(.details.as_ref()))]
    Status {
        status: u16,
        details: Option<ErrorDetails>,
    },

    /// No response was received.
    #[error(transparent)]
    Request(#[from] transport::Error),
}

impl ApiError {
    fn from_response(response: &HttpResponse) -> Self {
        let details = serde_json::from_slice::<ErrorEnvelope>(&response.body)
            .ok()
            .map(|envelope| envelope.error);
        Self::Status {
            status: response.status,
            details,
        }
    }

    /// Whether this error means the requested user does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

struct DetailsDisplay<'a>(Option<&'a ErrorDetails>);

impl fmt::Display for DetailsDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(details) if details.reason.is_empty() => f.write_str(&details.kind),
            Some(details) => write!(f, "{} ({})", details.reason, details.kind),
            None => f.write_str("no error details"),
        }
    }
}

/// Client for a 7.x cluster.
#[derive(Debug, Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
}

impl Client {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Get the transport this client sends requests through.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    fn user_path(username: &str) -> String {
        format!("{USER_PATH}/{}", urlencoding::encode(username))
    }

    /// Send a request, turning non-2xx statuses into [`ApiError::Status`].
    fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&[u8]>,
    ) -> std::result::Result<Vec<u8>, ApiError> {
        let response = self.transport.send(method, path, body)?;
        if response.is_success() {
            Ok(response.body)
        } else {
            Err(ApiError::from_response(&response))
        }
    }
}

impl UserApi for Client {
    fn family(&self) -> ApiFamily {
        ApiFamily::V7
    }

    fn put_user(&self, username: &str, body: &[u8]) -> Result<()> {
        let result = self.call(Method::Put, &Self::user_path(username), Some(body));
        if let Err(err) = &result {
            log::info!("put user {username} failed: {err}");
        }
        result?;
        Ok(())
    }

    fn get_user(&self, username: &str) -> Result<RemoteUser> {
        let body = self.call(Method::Get, &Self::user_path(username), None)?;
        let response: GetUserResponse = serde_json::from_slice(&body)?;
        wire::decode(response, username)
    }

    fn delete_user(&self, username: &str) -> Result<()> {
        self.call(Method::Delete, &Self::user_path(username), None)?;
        Ok(())
    }

    fn is_not_found(&self, err: &Error) -> bool {
        matches!(err, Error::Transport(TransportError::V7(err)) if err.is_not_found())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::v6;
    use crate::transport::MockTransport;
    use serde_json::json;

    fn client() -> (Client, MockTransport) {
        let mock = MockTransport::new();
        (Client::new(Arc::new(mock.clone())), mock)
    }

    #[test]
    fn test_user_path_escapes_username() {
        assert_eq!(Client::user_path("alice"), "/_security/user/alice");
        assert_eq!(Client::user_path("j doe/ops"), "/_security/user/j%20doe%2Fops");
    }

    #[test]
    fn test_put_user_sends_body() {
        let (client, mock) = client();
        mock.push_json(200, &json!({"created": true}));

        client.put_user("alice", br#"{"roles":["admin"]}"#).unwrap();

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::Put);
        assert_eq!(requests[0].path, "/_security/user/alice");
        assert_eq!(requests[0].json(), Some(json!({"roles": ["admin"]})));
    }

    #[test]
    fn test_get_user_reshapes_response() {
        let (client, mock) = client();
        mock.push_json(
            200,
            &json!({
                "alice": {
                    "username": "alice",
                    "roles": ["admin"],
                    "full_name": "Alice Liddell",
                    "email": null,
                    "metadata": {"team": "search"},
                    "enabled": true
                }
            }),
        );

        let user = client.get_user("alice").unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.full_name.as_deref(), Some("Alice Liddell"));
        assert_eq!(user.metadata, r#"{"team":"search"}"#);
        assert_eq!(mock.requests()[0].method, Method::Get);
    }

    #[test]
    fn test_get_user_not_found() {
        let (client, mock) = client();
        mock.push_response(404, "{}");

        let err = client.get_user("ghost").unwrap_err();
        assert!(client.is_not_found(&err));
    }

    #[test]
    fn test_error_details_parsed() {
        let (client, mock) = client();
        mock.push_json(
            403,
            &json!({
                "error": {"type": "security_exception", "reason": "action is unauthorized"},
                "status": 403
            }),
        );

        let err = client.delete_user("alice").unwrap_err();
        assert!(!client.is_not_found(&err));
        match err {
            Error::Transport(TransportError::V7(ApiError::Status { status, details })) => {
                assert_eq!(status, 403);
                assert_eq!(details.unwrap().kind, "security_exception");
            }
            other => panic!("Expected v7 status error, got {other:?}"),
        }
    }

    #[test]
    fn test_connection_failure_is_not_not_found() {
        let (client, mock) = client();
        mock.push_failure("connection refused");

        let err = client.delete_user("alice").unwrap_err();
        assert!(!client.is_not_found(&err));
    }

    #[test]
    fn test_foreign_family_error_is_not_not_found() {
        let (client, _) = client();
        let foreign: Error = v6::ResponseError::Status {
            status_code: 404,
            body: "{}".to_string(),
        }
        .into();
        assert!(!client.is_not_found(&foreign));
    }

    #[test]
    fn test_malformed_get_body_is_encoding_error() {
        let (client, mock) = client();
        mock.push_response(200, "not json");

        let err = client.get_user("alice").unwrap_err();
        assert!(matches!(err, Error::Encoding { .. }));
    }
}

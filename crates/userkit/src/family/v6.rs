//! Elasticsearch 6.x client.
//!
//! Users live under the X-Pack prefix, `/_xpack/security/user/{username}`.
//! Errors are kept as the raw status code and body text.

use std::sync::Arc;

use crate::error::{Error, Result, TransportError};
use crate::family::{ApiFamily, UserApi};
use crate::model::RemoteUser;
use crate::transport::{self, Method, Transport};
use crate::wire::{self, GetUserResponse};

const USER_PATH: &str = "/_xpack/security/user";

/// A failure reported by the 6.x client.
#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    /// The cluster answered with a non-2xx status.
    #[error("elasticsearch v6 responded with HTTP {status_code}: {body}")]
    Status { status_code: u16, body: String },

    /// No response was received.
    #[error(transparent)]
    Connection(#[from] transport::Error),
}

impl ResponseError {
    /// Whether this error means the requested user does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status_code: 404, .. })
    }
}

/// Client for a 6.x cluster.
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

    fn perform(
        &self,
        method: Method,
        username: &str,
        body: Option<&[u8]>,
    ) -> std::result::Result<Vec<u8>, ResponseError> {
        let response = self.transport.send(method, &Self::user_path(username), body)?;
        if !response.is_success() {
            return Err(ResponseError::Status {
                status_code: response.status,
                body: response.body_str(),
            });
        }
        Ok(response.body)
    }
}

impl UserApi for Client {
    fn family(&self) -> ApiFamily {
        ApiFamily::V6
    }

    fn put_user(&self, username: &str, body: &[u8]) -> Result<()> {
        let result = self.perform(Method::Put, username, Some(body));
        if let Err(err) = &result {
            log::info!("put user {username} failed: {err}");
        }
        result?;
        Ok(())
    }

    fn get_user(&self, username: &str) -> Result<RemoteUser> {
        let body = self.perform(Method::Get, username, None)?;
        let response: GetUserResponse = serde_json::from_slice(&body)?;
        wire::decode(response, username)
    }

    fn delete_user(&self, username: &str) -> Result<()> {
        self.perform(Method::Delete, username, None)?;
        Ok(())
    }

    fn is_not_found(&self, err: &Error) -> bool {
        matches!(err, Error::Transport(TransportError::V6(err)) if err.is_not_found())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::v7;
    use crate::transport::MockTransport;
    use serde_json::json;

    fn client() -> (Client, MockTransport) {
        let mock = MockTransport::new();
        (Client::new(Arc::new(mock.clone())), mock)
    }

    #[test]
    fn test_uses_xpack_prefix() {
        let (client, mock) = client();
        mock.push_json(200, &json!({"user": {"created": true}}));
        mock.push_json(200, &json!({"found": true}));

        client.put_user("bob", b"{}").unwrap();
        client.delete_user("bob").unwrap();

        let requests = mock.requests();
        assert_eq!(requests[0].path, "/_xpack/security/user/bob");
        assert_eq!(requests[1].method, Method::Delete);
        assert_eq!(requests[1].path, "/_xpack/security/user/bob");
    }

    #[test]
    fn test_get_user_reshapes_response() {
        let (client, mock) = client();
        mock.push_json(
            200,
            &json!({
                "bob": {
                    "username": "bob",
                    "roles": ["viewer", "editor"],
                    "full_name": "",
                    "email": "bob@example.com",
                    "metadata": {},
                    "enabled": false
                }
            }),
        );

        let user = client.get_user("bob").unwrap();
        assert_eq!(user.roles.len(), 2);
        assert_eq!(user.full_name, None);
        assert!(!user.enabled);
    }

    #[test]
    fn test_delete_not_found() {
        let (client, mock) = client();
        mock.push_json(404, &json!({"found": false}));

        let err = client.delete_user("bob").unwrap_err();
        assert!(client.is_not_found(&err));
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn test_server_error_kept_verbatim() {
        let (client, mock) = client();
        mock.push_response(503, "cluster unavailable");

        let err = client.put_user("bob", b"{}").unwrap_err();
        assert!(!client.is_not_found(&err));
        assert!(err.to_string().contains("cluster unavailable"));
    }

    #[test]
    fn test_foreign_family_error_is_not_not_found() {
        let (client, _) = client();
        let foreign: Error = v7::ApiError::Status {
            status: 404,
            details: None,
        }
        .into();
        assert!(!client.is_not_found(&foreign));
    }
}

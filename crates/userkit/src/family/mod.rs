//! Client generations and the user API they share.
//!
//! Elasticsearch moved the security API between major versions, and each
//! client generation reports failures in its own shape:
//!
//! | Generation | Module   | Users API                  | Not found          |
//! |------------|----------|----------------------------|--------------------|
//! | 7.x        | [`v7`]   | `/_security/user/`         | `ApiError` 404     |
//! | 6.x        | [`v6`]   | `/_xpack/security/user/`   | `ResponseError` 404|
//! | 5.x        | [`v5`]   | none                       | never              |
//!
//! [`ClientHandle`] is the closed set of the three and forwards every call to
//! the matching adapter.

pub mod v5;
pub mod v6;
pub mod v7;

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::RemoteUser;
use crate::transport::{self, Method, Transport};

/// A client generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiFamily {
    /// Elasticsearch 7.x (newest).
    V7,
    /// Elasticsearch 6.x.
    V6,
    /// Elasticsearch 5.x (oldest); has no user API.
    V5,
}

impl ApiFamily {
    /// Pick the generation for a cluster version such as `"7.17.3"`.
    pub fn from_version(version: &str) -> Result<Self> {
        let major = version
            .trim()
            .trim_start_matches('v')
            .split('.')
            .next()
            .and_then(|major| major.parse::<u32>().ok());

        match major {
            Some(7) => Ok(Self::V7),
            Some(6) => Ok(Self::V6),
            Some(5) => Ok(Self::V5),
            _ => Err(Error::UnsupportedClient {
                found: format!("Elasticsearch version {version:?}"),
            }),
        }
    }

    /// Short name, e.g. `"v7"`.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::V7 => "v7",
            Self::V6 => "v6",
            Self::V5 => "v5",
        }
    }

    /// Get all generations, newest first.
    pub fn all() -> &'static [ApiFamily] {
        &[ApiFamily::V7, ApiFamily::V6, ApiFamily::V5]
    }
}

impl fmt::Display for ApiFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The user operations one client generation offers.
///
/// Adapters pass transport failures through unmodified. Whether a failure
/// means "not found" is answered by the same adapter via
/// [`is_not_found`](Self::is_not_found), so callers never need to know which
/// generation they are talking to.
pub trait UserApi: Send + Sync {
    /// The generation behind this client.
    fn family(&self) -> ApiFamily;

    /// Create or replace `username` with an encoded body.
    fn put_user(&self, username: &str, body: &[u8]) -> Result<()>;

    /// Fetch `username`.
    fn get_user(&self, username: &str) -> Result<RemoteUser>;

    /// Remove `username`.
    fn delete_user(&self, username: &str) -> Result<()>;

    /// Whether `err`, raised by this client, means the user does not exist.
    ///
    /// Errors from another generation are never "not found" here.
    fn is_not_found(&self, err: &Error) -> bool;
}

/// A client of exactly one of the supported generations.
#[derive(Debug, Clone)]
pub enum ClientHandle {
    V7(v7::Client),
    V6(v6::Client),
    V5(v5::Client),
}

impl ClientHandle {
    /// Build the client for `family` over `transport`.
    pub fn for_family(family: ApiFamily, transport: Arc<dyn Transport>) -> Self {
        match family {
            ApiFamily::V7 => Self::V7(v7::Client::new(transport)),
            ApiFamily::V6 => Self::V6(v6::Client::new(transport)),
            ApiFamily::V5 => Self::V5(v5::Client::new(transport)),
        }
    }

    /// Build a client for a cluster, detecting its version when none is given.
    pub fn connect(transport: Arc<dyn Transport>, version: Option<&str>) -> Result<Self> {
        let family = match version {
            Some(version) => ApiFamily::from_version(version)?,
            None => detect(transport.as_ref())?,
        };
        log::debug!("using Elasticsearch {family} client");
        Ok(Self::for_family(family, transport))
    }

    /// Recognize an opaque client object by its concrete type.
    ///
    /// Anything other than [`v7::Client`], [`v6::Client`] or [`v5::Client`]
    /// is rejected with [`Error::UnsupportedClient`].
    pub fn from_client(client: Box<dyn Any + Send + Sync>) -> Result<Self> {
        let client = match client.downcast::<v7::Client>() {
            Ok(client) => return Ok(Self::V7(*client)),
            Err(other) => other,
        };
        let client = match client.downcast::<v6::Client>() {
            Ok(client) => return Ok(Self::V6(*client)),
            Err(other) => other,
        };
        match client.downcast::<v5::Client>() {
            Ok(client) => Ok(Self::V5(*client)),
            Err(_) => Err(Error::UnsupportedClient {
                found: "unrecognized client type".to_string(),
            }),
        }
    }

    fn adapter(&self) -> &dyn UserApi {
        match self {
            Self::V7(client) => client,
            Self::V6(client) => client,
            Self::V5(client) => client,
        }
    }
}

impl UserApi for ClientHandle {
    fn family(&self) -> ApiFamily {
        self.adapter().family()
    }

    fn put_user(&self, username: &str, body: &[u8]) -> Result<()> {
        self.adapter().put_user(username, body)
    }

    fn get_user(&self, username: &str) -> Result<RemoteUser> {
        self.adapter().get_user(username)
    }

    fn delete_user(&self, username: &str) -> Result<()> {
        self.adapter().delete_user(username)
    }

    fn is_not_found(&self, err: &Error) -> bool {
        self.adapter().is_not_found(err)
    }
}

#[derive(Debug, Deserialize)]
struct ClusterInfo {
    version: ClusterVersion,
}

#[derive(Debug, Deserialize)]
struct ClusterVersion {
    number: String,
}

/// Ask the cluster for its version and pick the matching generation.
pub fn detect(transport: &dyn Transport) -> Result<ApiFamily> {
    let response = transport.send(Method::Get, "/", None)?;
    if !response.is_success() {
        return Err(transport::Error::new(
            Method::Get,
            "/",
            format!("cluster info returned HTTP {}", response.status),
        )
        .into());
    }

    let info: ClusterInfo = serde_json::from_slice(&response.body)?;
    log::debug!("cluster reports version {}", info.version.number);
    ApiFamily::from_version(&info.version.number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Operation;
    use crate::transport::MockTransport;
    use serde_json::json;

    fn handle(family: ApiFamily) -> (ClientHandle, MockTransport) {
        let mock = MockTransport::new();
        (ClientHandle::for_family(family, Arc::new(mock.clone())), mock)
    }

    #[test]
    fn test_from_version() {
        assert_eq!(ApiFamily::from_version("7.17.3").unwrap(), ApiFamily::V7);
        assert_eq!(ApiFamily::from_version("6.8.0").unwrap(), ApiFamily::V6);
        assert_eq!(ApiFamily::from_version("v5.6").unwrap(), ApiFamily::V5);
        assert_eq!(ApiFamily::from_version("7").unwrap(), ApiFamily::V7);
    }

    #[test]
    fn test_from_version_unsupported() {
        for version in ["8.11.0", "2.4.6", "", "latest"] {
            let err = ApiFamily::from_version(version).unwrap_err();
            assert!(matches!(err, Error::UnsupportedClient { .. }), "{version}");
        }
    }

    #[test]
    fn test_for_family_matches() {
        for family in ApiFamily::all() {
            let (client, _) = handle(*family);
            assert_eq!(client.family(), *family);
        }
    }

    #[test]
    fn test_from_client_recognizes_each_generation() {
        let transport: Arc<dyn Transport> = Arc::new(MockTransport::new());

        let v7 = ClientHandle::from_client(Box::new(v7::Client::new(transport.clone()))).unwrap();
        let v6 = ClientHandle::from_client(Box::new(v6::Client::new(transport.clone()))).unwrap();
        let v5 = ClientHandle::from_client(Box::new(v5::Client::new(transport))).unwrap();

        assert_eq!(v7.family(), ApiFamily::V7);
        assert_eq!(v6.family(), ApiFamily::V6);
        assert_eq!(v5.family(), ApiFamily::V5);
    }

    #[test]
    fn test_from_client_rejects_unknown_handle() {
        let mock = MockTransport::new();
        let err = ClientHandle::from_client(Box::new(mock.clone())).unwrap_err();
        assert!(matches!(err, Error::UnsupportedClient { .. }));

        let err = ClientHandle::from_client(Box::new("http://localhost:9200".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedClient { .. }));
        assert_eq!(mock.request_count(), 0);
    }

    #[test]
    fn test_dispatch_forwards_errors_unchanged() {
        let (client, mock) = handle(ApiFamily::V7);
        mock.push_json(500, &json!({"error": {"type": "exception", "reason": "boom"}, "status": 500}));

        let err = client.delete_user("alice").unwrap_err();
        assert!(!client.is_not_found(&err));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_dispatch_v5_is_unsupported() {
        let (client, mock) = handle(ApiFamily::V5);
        let err = client.get_user("alice").unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedOperation {
                family: ApiFamily::V5,
                operation: Operation::Get
            }
        ));
        assert_eq!(mock.request_count(), 0);
    }

    #[test]
    fn test_detect() {
        let mock = MockTransport::new();
        mock.push_json(200, &json!({"name": "node-1", "version": {"number": "6.8.23"}}));
        assert_eq!(detect(&mock).unwrap(), ApiFamily::V6);
        assert_eq!(mock.requests()[0].path, "/");
    }

    #[test]
    fn test_detect_http_error() {
        let mock = MockTransport::new();
        mock.push_response(401, "");
        assert!(detect(&mock).is_err());
    }

    #[test]
    fn test_connect_with_explicit_version_skips_detection() {
        let mock = MockTransport::new();
        let client = ClientHandle::connect(Arc::new(mock.clone()), Some("7.10.2")).unwrap();
        assert_eq!(client.family(), ApiFamily::V7);
        assert_eq!(mock.request_count(), 0);
    }

    #[test]
    fn test_connect_detects_version() {
        let mock = MockTransport::new();
        mock.push_json(200, &json!({"version": {"number": "5.6.16"}}));
        let client = ClientHandle::connect(Arc::new(mock), None).unwrap();
        assert_eq!(client.family(), ApiFamily::V5);
    }
}

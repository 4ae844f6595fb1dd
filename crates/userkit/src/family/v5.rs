//! Elasticsearch 5.x client.
//!
//! The 5.x client has no security user API. Every user operation fails with
//! [`Error::UnsupportedOperation`] before anything is sent.

use std::sync::Arc;

use crate::error::{Error, Operation, Result};
use crate::family::{ApiFamily, UserApi};
use crate::model::RemoteUser;
use crate::transport::Transport;

/// Client for a 5.x cluster.
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
}

impl UserApi for Client {
    fn family(&self) -> ApiFamily {
        ApiFamily::V5
    }

    fn put_user(&self, _username: &str, _body: &[u8]) -> Result<()> {
        Err(Error::unsupported(ApiFamily::V5, Operation::Put))
    }

    fn get_user(&self, _username: &str) -> Result<RemoteUser> {
        Err(Error::unsupported(ApiFamily::V5, Operation::Get))
    }

    fn delete_user(&self, _username: &str) -> Result<()> {
        Err(Error::unsupported(ApiFamily::V5, Operation::Delete))
    }

    fn is_not_found(&self, _err: &Error) -> bool {
        false
    }
}

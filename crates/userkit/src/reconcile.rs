//! Create, read, update and delete a user, converging local state.
//!
//! A user is either [`UserState::Absent`] or [`UserState::Present`]. Every
//! write is followed by a read, so the observed snapshot always reflects
//! what the cluster reports rather than what was sent. "Not found" is
//! convergent: a read clears local identity, and a delete succeeds.

use crate::error::{Error, Result};
use crate::family::UserApi;
use crate::model::{ChangeSet, DeclaredUser, RemoteUser};
use crate::wire;

/// Local knowledge of one user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum UserState {
    /// No identity; the user is not believed to exist.
    #[default]
    Absent,
    /// The user is believed to exist under `id`.
    Present {
        id: String,
        /// Snapshot from the most recent successful read.
        observed: Option<RemoteUser>,
    },
}

impl UserState {
    /// State with an identity but no snapshot yet.
    pub fn present(id: impl Into<String>) -> Self {
        Self::Present {
            id: id.into(),
            observed: None,
        }
    }

    /// Local identity, if any.
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Present { id, .. } => Some(id),
            Self::Absent => None,
        }
    }

    /// Snapshot from the most recent successful read.
    pub fn observed(&self) -> Option<&RemoteUser> {
        match self {
            Self::Present { observed, .. } => observed.as_ref(),
            Self::Absent => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present { .. })
    }

    /// Forget the user.
    pub fn clear(&mut self) {
        *self = Self::Absent;
    }

    fn observe(&mut self, user: RemoteUser) {
        if let Self::Present { observed, .. } = self {
            *observed = Some(user);
        }
    }
}

/// Drives one user through its lifecycle against a client.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use userkit::transport::MockTransport;
/// use userkit::{ApiFamily, ClientHandle, DeclaredUser, Reconciler, UserState};
///
/// let mock = MockTransport::new();
/// mock.push_response(200, r#"{"created":true}"#);
/// mock.push_response(200, r#"{"alice":{"username":"alice","roles":["admin"],"enabled":true}}"#);
///
/// let client = ClientHandle::for_family(ApiFamily::V7, Arc::new(mock));
/// let desired = DeclaredUser::new("alice").with_roles(["admin"]).with_password("secret1");
///
/// let mut state = UserState::Absent;
/// Reconciler::new(&client).create(&mut state, &desired).unwrap();
/// assert_eq!(state.id(), Some("alice"));
/// ```
pub struct Reconciler<'a, C: UserApi + ?Sized> {
    client: &'a C,
}

impl<'a, C: UserApi + ?Sized> Reconciler<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Create the declared user, then read it back.
    ///
    /// All fields are sent, credentials included. If the put fails the state
    /// is left untouched.
    pub fn create(&self, state: &mut UserState, desired: &DeclaredUser) -> Result<()> {
        let body = wire::encode(desired, &ChangeSet::all())?;
        self.client.put_user(&desired.username, &body)?;

        log::info!("created user {}", desired.username);
        *state = UserState::present(desired.username.clone());
        self.read(state)
    }

    /// Refresh the observed snapshot.
    ///
    /// A user the cluster no longer has is dropped from local state and the
    /// read succeeds. Other failures leave the state as it was.
    pub fn read(&self, state: &mut UserState) -> Result<()> {
        let Some(id) = state.id().map(str::to_owned) else {
            return Ok(());
        };

        match self.client.get_user(&id) {
            Ok(user) => {
                state.observe(user);
                Ok(())
            }
            Err(err) if self.client.is_not_found(&err) => {
                log::warn!("User {id} not found. Removing from state");
                state.clear();
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Apply `changes` to an existing user, then read it back.
    ///
    /// The user is addressed by its stored identity; only credentials listed
    /// in `changes` are sent.
    pub fn update(
        &self,
        state: &mut UserState,
        desired: &DeclaredUser,
        changes: &ChangeSet,
    ) -> Result<()> {
        let id = match state.id() {
            Some(id) if id != desired.username => {
                return Err(Error::UsernameChanged {
                    current: id.to_string(),
                    desired: desired.username.clone(),
                });
            }
            Some(id) => id.to_string(),
            None => desired.username.clone(),
        };

        let body = wire::encode(desired, changes)?;
        self.client.put_user(&id, &body)?;

        log::info!("updated user {id} ({changes})");
        if !state.is_present() {
            *state = UserState::present(id);
        }
        self.read(state)
    }

    /// Delete the user.
    ///
    /// Local identity is cleared whatever the outcome. A user that is already
    /// gone is not an error; any other failure is returned after clearing.
    pub fn delete(&self, state: &mut UserState) -> Result<()> {
        let Some(id) = state.id().map(str::to_owned) else {
            return Ok(());
        };

        let result = self.client.delete_user(&id);
        state.clear();

        match result {
            Ok(()) => {
                log::info!("deleted user {id}");
                Ok(())
            }
            Err(err) if self.client.is_not_found(&err) => {
                log::warn!("User {id} not found. Resource removed from state");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Adopt an existing user by name and read it.
    pub fn import(&self, state: &mut UserState, username: &str) -> Result<()> {
        *state = UserState::present(username);
        self.read(state)
    }
}

//! Declared and observed user records, and the change sets between them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

fn default_enabled() -> bool {
    true
}

fn default_metadata() -> String {
    "{}".to_string()
}

/// Desired state of a security user.
///
/// `metadata` is JSON text; it is parsed when the user is encoded. At most one
/// of `password` and `password_hash` should be supplied.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct DeclaredUser {
    /// Identity of the user; also the key in the cluster's API paths.
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub roles: BTreeSet<String>,
    #[serde(default = "default_metadata")]
    pub metadata: String,
    /// Plaintext password, at least 6 characters.
    #[serde(default)]
    pub password: Option<String>,
    /// Hash produced with the cluster's configured password hashing algorithm.
    #[serde(default)]
    pub password_hash: Option<String>,
}

impl DeclaredUser {
    /// Create an enabled user with no roles and empty metadata.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            full_name: None,
            email: None,
            enabled: default_enabled(),
            roles: BTreeSet::new(),
            metadata: default_metadata(),
            password: None,
            password_hash: None,
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = metadata.into();
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_password_hash(mut self, password_hash: impl Into<String>) -> Self {
        self.password_hash = Some(password_hash.into());
        self
    }
}

// Credentials never end up in logs.
impl fmt::Debug for DeclaredUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |secret: &Option<String>| secret.as_ref().map(|_| "<redacted>");
        f.debug_struct("DeclaredUser")
            .field("username", &self.username)
            .field("full_name", &self.full_name)
            .field("email", &self.email)
            .field("enabled", &self.enabled)
            .field("roles", &self.roles)
            .field("metadata", &self.metadata)
            .field("password", &redact(&self.password))
            .field("password_hash", &redact(&self.password_hash))
            .finish()
    }
}

/// A user as read back from the cluster.
///
/// The cluster never returns credentials. `metadata` is canonical JSON text
/// (object keys sorted).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUser {
    pub username: String,
    #[serde(default)]
    pub roles: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub enabled: bool,
    #[serde(default = "default_metadata")]
    pub metadata: String,
}

/// A user attribute that can change between reconciliations.
///
/// `username` is absent: renaming a user creates a different user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    FullName,
    Email,
    Enabled,
    Roles,
    Metadata,
    Password,
    PasswordHash,
}

impl Field {
    /// Every field, in wire order.
    pub fn all() -> &'static [Field] {
        &[
            Field::FullName,
            Field::Email,
            Field::Enabled,
            Field::Roles,
            Field::Metadata,
            Field::Password,
            Field::PasswordHash,
        ]
    }

    /// The field's name in the wire body.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FullName => "full_name",
            Self::Email => "email",
            Self::Enabled => "enabled",
            Self::Roles => "roles",
            Self::Metadata => "metadata",
            Self::Password => "password",
            Self::PasswordHash => "password_hash",
        }
    }

    /// Whether the field holds a credential.
    #[must_use]
    pub fn is_credential(self) -> bool {
        matches!(self, Self::Password | Self::PasswordHash)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attributes whose declared value differs from the last-known state.
///
/// Credentials are only transmitted when they appear here, so an unchanged
/// password is never rotated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    fields: BTreeSet<Field>,
}

impl ChangeSet {
    /// An empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every field changed, as for a user created from nothing.
    #[must_use]
    pub fn all() -> Self {
        Field::all().iter().copied().collect()
    }

    /// Non-credential differences between an observed user and its declaration.
    ///
    /// Metadata is compared as parsed JSON, so key order and whitespace do
    /// not count as changes. Credentials are never observed; callers add
    /// [`Field::Password`] and [`Field::PasswordHash`] themselves.
    pub fn diff(observed: &RemoteUser, desired: &DeclaredUser) -> Self {
        let mut changes = Self::new();

        if non_empty(observed.full_name.as_deref()) != non_empty(desired.full_name.as_deref()) {
            changes.insert(Field::FullName);
        }
        if non_empty(observed.email.as_deref()) != non_empty(desired.email.as_deref()) {
            changes.insert(Field::Email);
        }
        if observed.enabled != desired.enabled {
            changes.insert(Field::Enabled);
        }
        if observed.roles != desired.roles {
            changes.insert(Field::Roles);
        }
        if !json_equivalent(&observed.metadata, &desired.metadata) {
            changes.insert(Field::Metadata);
        }

        changes
    }

    pub fn insert(&mut self, field: Field) {
        self.fields.insert(field);
    }

    #[must_use]
    pub fn contains(&self, field: Field) -> bool {
        self.fields.contains(&field)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Field> + '_ {
        self.fields.iter().copied()
    }
}

impl FromIterator<Field> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for ChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(Field::as_str).collect();
        f.write_str(&names.join(", "))
    }
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Compare two JSON texts structurally; empty text counts as `{}`.
///
/// Falls back to text comparison when either side is not valid JSON.
fn json_equivalent(left: &str, right: &str) -> bool {
    fn parse(text: &str) -> Option<serde_json::Value> {
        if text.trim().is_empty() {
            return Some(serde_json::Value::Object(serde_json::Map::new()));
        }
        serde_json::from_str(text).ok()
    }

    match (parse(left), parse(right)) {
        (Some(l), Some(r)) => l == r,
        _ => left == right,
    }
}

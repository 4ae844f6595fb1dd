use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use userkit::{DeclaredUser, Field, RemoteUser, UserState};

// ============================================================================
// State Structures
// ============================================================================

/// Everything esuser remembers between runs
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StateFile {
    /// Last time the state was updated
    pub last_updated: DateTime<Utc>,

    /// Tracked users, keyed by username
    #[serde(default)]
    pub users: BTreeMap<String, StoredUser>,
}

/// What is known about one tracked user
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct StoredUser {
    /// blake3 digest of the last password sent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_digest: Option<String>,

    /// blake3 digest of the last password hash sent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash_digest: Option<String>,

    /// Snapshot from the most recent read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed: Option<RemoteUser>,
}

/// Digests of the credentials a declared user carries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialDigests {
    pub password: Option<String>,
    pub password_hash: Option<String>,
}

impl CredentialDigests {
    pub fn of(user: &DeclaredUser) -> Self {
        Self {
            password: user.password.as_deref().map(digest),
            password_hash: user.password_hash.as_deref().map(digest),
        }
    }

    /// Credential fields whose declared value differs from what was last sent
    pub fn changed_fields(&self, stored: &StoredUser) -> Vec<Field> {
        let mut fields = Vec::new();
        if self.password.is_some() && self.password != stored.password_digest {
            fields.push(Field::Password);
        }
        if self.password_hash.is_some() && self.password_hash != stored.password_hash_digest {
            fields.push(Field::PasswordHash);
        }
        fields
    }
}

/// Hex blake3 digest of a secret
pub fn digest(secret: &str) -> String {
    blake3::hash(secret.as_bytes()).to_hex().to_string()
}

// ============================================================================
// StateFile Implementation
// ============================================================================

impl StateFile {
    /// Get the state directory path (~/.local/state/esuser)
    pub fn state_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".local").join("state").join("esuser"))
    }

    /// Default state file path
    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::state_dir()?.join("state.toml"))
    }

    /// Load state from disk, or return default if file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file does not exist, using default state");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        let state: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!("Loaded state from {}", path.display());
        Ok(state)
    }

    /// Update the timestamp and save state to disk
    pub fn save(&mut self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        self.last_updated = Utc::now();
        let content = toml::to_string_pretty(&*self).context("Failed to serialize state to TOML")?;

        fs::write(path, &content)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    // ========================================================================
    // User State Helpers
    // ========================================================================

    /// Reconciliation state of a user
    pub fn user_state(&self, username: &str) -> UserState {
        match self.users.get(username) {
            Some(stored) => UserState::Present {
                id: username.to_string(),
                observed: stored.observed.clone(),
            },
            None => UserState::Absent,
        }
    }

    /// Record the outcome of reconciling a user.
    ///
    /// An absent state forgets the user. Credential digests are replaced
    /// only when `credentials` is given, that is, when they were sent.
    pub fn record(
        &mut self,
        username: &str,
        state: &UserState,
        credentials: Option<CredentialDigests>,
    ) {
        if !state.is_present() {
            self.users.remove(username);
            return;
        }

        let stored = self.users.entry(username.to_string()).or_default();
        stored.observed = state.observed().cloned();
        if let Some(credentials) = credentials {
            stored.password_digest = credentials.password;
            stored.password_hash_digest = credentials.password_hash;
        }
    }

    /// Tracked usernames
    pub fn usernames(&self) -> Vec<String> {
        self.users.keys().cloned().collect()
    }
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            last_updated: Utc::now(),
            users: BTreeMap::new(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

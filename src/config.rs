use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use userkit::transport::http::HttpTransport;
use userkit::{ClientHandle, DeclaredUser};

const MAX_USERNAME_LEN: usize = 1024;
const MIN_PASSWORD_LEN: usize = 6;

/// Get the config directory path (~/.config/esuser)
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("esuser"))
}

/// Default config file path
pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

// ============================================================================
// Config
// ============================================================================

/// The cluster to manage and the users it should have.
///
/// ```toml
/// [cluster]
/// url = "http://localhost:9200"
/// version = "7.17.0"
///
/// [[users]]
/// username = "alice"
/// roles = ["admin"]
/// password = "secret1"
/// metadata = '{"team": "search"}'
/// ```
#[derive(Debug, Deserialize)]
pub struct Config {
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub users: Vec<DeclaredUser>,
}

#[derive(Debug, Deserialize)]
pub struct ClusterConfig {
    pub url: String,
    /// Cluster version; detected from the root endpoint when absent.
    #[serde(default)]
    pub version: Option<String>,
}

impl Config {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for user in &self.users {
            validate_username(&user.username)?;
            if !seen.insert(user.username.as_str()) {
                bail!("User '{}' is declared more than once", user.username);
            }
            if user.password.is_some() && user.password_hash.is_some() {
                bail!(
                    "User '{}' sets both password and password_hash",
                    user.username
                );
            }
            if let Some(password) = &user.password
                && password.chars().count() < MIN_PASSWORD_LEN
            {
                bail!(
                    "Password for '{}' must be at least {MIN_PASSWORD_LEN} characters",
                    user.username
                );
            }
        }
        Ok(())
    }

    /// Find a declared user by name
    pub fn find_user(&self, username: &str) -> Option<&DeclaredUser> {
        self.users.iter().find(|u| u.username == username)
    }

    /// Connect to the configured cluster
    pub fn client(&self) -> Result<ClientHandle> {
        let transport = Arc::new(HttpTransport::new(self.cluster.url.as_str()));
        ClientHandle::connect(transport, self.cluster.version.as_deref())
            .with_context(|| format!("Could not connect to {}", self.cluster.url))
    }
}

/// Usernames are 1 to 1024 printable ASCII characters with no leading or
/// trailing whitespace.
fn validate_username(username: &str) -> Result<()> {
    if username.is_empty() || username.len() > MAX_USERNAME_LEN {
        bail!("Username must be 1 to {MAX_USERNAME_LEN} characters: '{username}'");
    }
    if !username.chars().all(|c| c.is_ascii_graphic() || c == ' ') {
        bail!("Username must be printable ASCII: '{username}'");
    }
    if username.trim() != username {
        bail!("Username must not start or end with whitespace: '{username}'");
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[cluster]
url = "http://localhost:9200"
version = "6.8.23"

[[users]]
username = "alice"
roles = ["admin"]
password = "secret1"
metadata = '{"team": "search"}'

[[users]]
username = "bob"
full_name = "Bob Builder"
enabled = false
"#;

    #[test]
    fn test_parse_sample() {
        let config = Config::parse(SAMPLE).unwrap();
        assert_eq!(config.cluster.url, "http://localhost:9200");
        assert_eq!(config.cluster.version.as_deref(), Some("6.8.23"));
        assert_eq!(config.users.len(), 2);

        let alice = config.find_user("alice").unwrap();
        assert!(alice.enabled);
        assert!(alice.roles.contains("admin"));
        assert_eq!(alice.metadata, r#"{"team": "search"}"#);

        let bob = config.find_user("bob").unwrap();
        assert!(!bob.enabled);
        assert!(bob.roles.is_empty());
        assert_eq!(bob.metadata, "{}");
        assert!(config.find_user("carol").is_none());
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let config = r#"
[cluster]
url = "http://localhost:9200"

[[users]]
username = "alice"

[[users]]
username = "alice"
"#;
        let err = Config::parse(config).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_both_credentials_rejected() {
        let config = r#"
[cluster]
url = "http://localhost:9200"

[[users]]
username = "alice"
password = "secret1"
password_hash = "$2a$10$abc"
"#;
        assert!(Config::parse(config).is_err());
    }

    #[test]
    fn test_short_password_rejected() {
        let config = r#"
[cluster]
url = "http://localhost:9200"

[[users]]
username = "alice"
password = "abc"
"#;
        let err = Config::parse(config).unwrap_err();
        assert!(err.to_string().contains("at least 6"));
    }

    #[test]
    fn test_username_rules() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("j doe").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username(" alice").is_err());
        assert!(validate_username("alice\t").is_err());
        assert!(validate_username("ålice").is_err());
        assert!(validate_username(&"a".repeat(1025)).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(err.to_string().contains("Could not read"));
    }
}

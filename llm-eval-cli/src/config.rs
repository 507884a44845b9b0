//! CLI configuration management

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use llm_eval_core::domain::UserId;
use llm_eval_sdk::{Session, User, DEFAULT_BASE_URL};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Default identity provider URL when running locally
pub const DEFAULT_IDENTITY_URL: &str = "http://localhost:54321/auth/v1";

/// Overrides the directory holding `config.toml` and `credentials.toml`
pub const CONFIG_DIR_ENV: &str = "LLM_EVAL_CONFIG_DIR";

/// Keyring service under which refresh tokens are stored
pub const KEYRING_SERVICE: &str = "llm-eval-cli";

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CliConfig {
    /// Default profile to use
    #[serde(default)]
    pub default_profile: Option<String>,

    /// Named profiles
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,

    /// Global settings
    #[serde(default)]
    pub settings: Settings,
}

impl CliConfig {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config from {:?}", path))
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).with_context(|| format!("Failed to write config to {:?}", path))
    }

    /// Directory holding the configuration files
    pub fn config_dir() -> Result<PathBuf> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
            return Ok(PathBuf::from(dir));
        }
        let dirs = ProjectDirs::from("com", "llm-eval", "llm-eval")
            .context("Could not determine config directory")?;
        Ok(dirs.config_dir().to_path_buf())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Get the credentials file path
    pub fn credentials_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("credentials.toml"))
    }

    pub fn get_or_create_profile(&mut self, name: &str) -> &mut Profile {
        self.profiles.entry(name.to_string()).or_default()
    }

    pub fn set_default_profile(&mut self, name: &str) {
        self.default_profile = Some(name.to_string());
    }

    pub fn remove_profile(&mut self, name: &str) -> Option<Profile> {
        if self.default_profile.as_deref() == Some(name) {
            self.default_profile = None;
        }
        self.profiles.remove(name)
    }

    /// Profile names in alphabetical order
    pub fn list_profiles(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.profiles.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// A configuration profile: one backend plus its identity provider
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Profile {
    /// Backend functions base URL
    #[serde(default)]
    pub api_url: Option<String>,

    /// Identity provider token API URL
    #[serde(default)]
    pub identity_url: Option<String>,

    /// Public key sent to the identity provider
    #[serde(default)]
    pub identity_key: Option<String>,

    /// Project commands operate on when none is given
    #[serde(default)]
    pub default_project: Option<String>,

    /// Additional headers sent to the backend
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Profile {
    /// Get the API URL, falling back to default
    pub fn api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    /// The configured identity URL, or one derived from the API URL when it
    /// follows the `<host>/functions/v1` layout.
    pub fn identity_url(&self) -> String {
        if let Some(url) = &self.identity_url {
            return url.clone();
        }
        match self.api_url().trim_end_matches('/').strip_suffix("/functions/v1") {
            Some(host) => format!("{}/auth/v1", host),
            None => DEFAULT_IDENTITY_URL.to_string(),
        }
    }
}

/// Global settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Default output format
    #[serde(default = "default_output_format")]
    pub output_format: String,

    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,

    /// Enable verbose output by default
    #[serde(default)]
    pub verbose: bool,

    /// Request timeout in seconds. Unset waits for as long as the backend
    /// takes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_format: default_output_format(),
            color: true,
            verbose: false,
            timeout_secs: None,
        }
    }
}

fn default_output_format() -> String {
    "table".to_string()
}

fn default_true() -> bool {
    true
}

/// Credential storage
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Credentials {
    /// Stored sessions by profile name
    #[serde(default)]
    pub profiles: HashMap<String, ProfileCredentials>,
}

impl Credentials {
    /// Load credentials from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&CliConfig::credentials_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read credentials from {:?}", path))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse credentials from {:?}", path))
    }

    /// Save credentials to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&CliConfig::credentials_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create credentials directory {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize credentials")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write credentials to {:?}", path))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(path, perms)?;
        }

        Ok(())
    }

    pub fn get(&self, profile: &str) -> Option<&ProfileCredentials> {
        self.profiles.get(profile)
    }

    pub fn set(&mut self, profile: &str, creds: ProfileCredentials) {
        self.profiles.insert(profile.to_string(), creds);
    }

    pub fn remove(&mut self, profile: &str) -> Option<ProfileCredentials> {
        self.profiles.remove(profile)
    }
}

/// A persisted session for a single profile.
///
/// With `use_keyring` the refresh token lives in the system keyring and is
/// not written to disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileCredentials {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub use_keyring: bool,
}

impl ProfileCredentials {
    pub fn from_session(session: &Session, use_keyring: bool) -> Self {
        Self {
            access_token: session.access_token.clone(),
            refresh_token: (!use_keyring).then(|| session.refresh_token.clone()),
            expires_at: session.expires_at,
            user_id: session.user.id,
            email: session.user.email.clone(),
            use_keyring,
        }
    }

    /// Rebuilds the session. `refresh_token` is supplied by the caller when
    /// it is kept in the keyring.
    pub fn into_session(self, keyring_token: Option<String>) -> Session {
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(keyring_token).unwrap_or_default(),
            expires_at: self.expires_at,
            user: User {
                id: self.user_id,
                email: self.email,
            },
        }
    }
}

fn keyring_entry(profile: &str) -> Result<keyring::Entry> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{}-refresh-token", profile))
        .context("Failed to access keyring")
}

/// Stores a refresh token in the system keyring
pub fn store_refresh_token(profile: &str, token: &str) -> Result<()> {
    keyring_entry(profile)?
        .set_password(token)
        .context("Failed to store refresh token in keyring")
}

/// Reads a refresh token from the system keyring
pub fn load_refresh_token(profile: &str) -> Result<String> {
    keyring_entry(profile)?.get_password().context(
        "Refresh token not found in keyring. Run 'llm-eval auth login' to sign in again.",
    )
}

/// Removes a stored refresh token, ignoring a missing entry
pub fn clear_refresh_token(profile: &str) {
    let _ = keyring_entry(profile).and_then(|e| e.delete_credential().map_err(Into::into));
}

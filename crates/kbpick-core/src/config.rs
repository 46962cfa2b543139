//! Configuration types for kbpick.
//!
//! The configuration lives in `~/.kbpick/config.yaml`. A missing file yields
//! the defaults below; environment variables override individual fields.
//!
//! # Example YAML
//!
//! ```yaml
//! backend_url: https://api.stack-ai.com
//! auth:
//!   url: https://sb.stack-ai.com
//!   anon_key: eyJhbGciOi...
//!   email: me@example.com
//! connection:
//!   provider: gdrive
//! indexing:
//!   chunk_size: 1500
//!   chunk_overlap: 500
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{KbError, KbResult};

/// Default knowledge-base backend.
pub const DEFAULT_BACKEND_URL: &str = "https://api.stack-ai.com";

/// Default identity provider.
pub const DEFAULT_AUTH_URL: &str = "https://sb.stack-ai.com";

/// Default connection provider.
pub const DEFAULT_CONNECTION_PROVIDER: &str = "gdrive";

/// Timeout for the token request, in seconds.
pub const AUTH_TIMEOUT_SECS: u64 = 10;

/// Default timeout for backend requests, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_CHUNK_SIZE: u32 = 1500;
pub const DEFAULT_CHUNK_OVERLAP: u32 = 500;
pub const DEFAULT_CHUNKER: &str = "sentence";

/// Environment variable names.
pub const ENV_BACKEND_URL: &str = "KBPICK_BACKEND_URL";
pub const ENV_EMAIL: &str = "KBPICK_EMAIL";
pub const ENV_PASSWORD: &str = "KBPICK_PASSWORD";
pub const ENV_ANON_KEY: &str = "KBPICK_ANON_KEY";

// ============================================================================
// Config
// ============================================================================

/// User-level configuration for kbpick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the knowledge-base backend.
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Identity provider settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Which drive connection to browse.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Parameters sent when a knowledge base is created.
    #[serde(default)]
    pub indexing: IndexingConfig,

    /// Timeout for backend requests, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_backend_url() -> String {
    DEFAULT_BACKEND_URL.to_string()
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            auth: AuthConfig::default(),
            connection: ConnectionConfig::default(),
            indexing: IndexingConfig::default(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load the configuration from `~/.kbpick/config.yaml`.
    ///
    /// If the home directory cannot be determined, returns defaults.
    pub fn load_default() -> KbResult<Self> {
        match Self::default_path() {
            Some(path) => Self::from_path(&path),
            None => {
                tracing::debug!("Could not determine home directory, using default config");
                Ok(Self::default())
            }
        }
    }

    /// Load the configuration from a specific path.
    ///
    /// If the file does not exist, returns a default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`KbError::InvalidConfig`] if the file cannot be parsed and
    /// [`KbError::InvalidConfiguration`] if validation fails.
    pub fn from_path(path: &Path) -> KbResult<Self> {
        if !path.exists() {
            tracing::debug!("Config not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| KbError::ConfigIo {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Self::from_yaml(&content)
            .map_err(|e| match e {
                KbError::Yaml(e) => {
                    KbError::InvalidConfig(format!("Failed to parse {}: {}", path.display(), e))
                }
                other => other,
            })
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml(content: &str) -> KbResult<Self> {
        let config: Self = serde_yaml::from_str(content)?;

        let warnings = config.validate()?;
        for warning in warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok(config)
    }

    /// Get the default config directory (`~/.kbpick`).
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".kbpick"))
    }

    /// Get the default config file path (`~/.kbpick/config.yaml`).
    pub fn default_path() -> Option<PathBuf> {
        Self::default_dir().map(|d| d.join("config.yaml"))
    }

    /// Validate the configuration.
    ///
    /// Returns non-fatal warnings; hard errors are returned as `Err`.
    pub fn validate(&self) -> KbResult<Vec<String>> {
        let mut warnings = Vec::new();

        if self.backend_url.trim().is_empty() {
            return Err(KbError::InvalidConfiguration {
                message: "backend_url is empty".to_string(),
                hint: "Set `backend_url` to the knowledge-base API base URL".to_string(),
            });
        }
        if self.auth.url.trim().is_empty() {
            return Err(KbError::InvalidConfiguration {
                message: "auth.url is empty".to_string(),
                hint: "Set `auth.url` to the identity provider base URL".to_string(),
            });
        }
        if self.indexing.chunk_size == 0 {
            return Err(KbError::InvalidConfiguration {
                message: "indexing.chunk_size must be greater than 0".to_string(),
                hint: format!("The default is {}", DEFAULT_CHUNK_SIZE),
            });
        }
        if self.indexing.chunk_overlap >= self.indexing.chunk_size {
            return Err(KbError::InvalidConfiguration {
                message: format!(
                    "indexing.chunk_overlap ({}) must be smaller than indexing.chunk_size ({})",
                    self.indexing.chunk_overlap, self.indexing.chunk_size
                ),
                hint: "Lower `chunk_overlap` or raise `chunk_size`".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            warnings.push("request_timeout_secs is 0; requests will not time out".to_string());
        }
        if self.auth.anon_key.is_empty() {
            warnings.push(format!(
                "auth.anon_key is empty; the identity provider will likely reject requests (or set {})",
                ENV_ANON_KEY
            ));
        }

        Ok(warnings)
    }

    /// Apply environment variable overrides.
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok());
        self
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_BACKEND_URL).filter(|v| !v.is_empty()) {
            self.backend_url = url;
        }
        if let Some(email) = lookup(ENV_EMAIL).filter(|v| !v.is_empty()) {
            self.auth.email = Some(email);
        }
        if let Some(password) = lookup(ENV_PASSWORD).filter(|v| !v.is_empty()) {
            self.auth.password = Some(password);
        }
        if let Some(key) = lookup(ENV_ANON_KEY).filter(|v| !v.is_empty()) {
            self.auth.anon_key = key;
        }
    }

    /// Return the configured credentials.
    ///
    /// # Errors
    ///
    /// Returns [`KbError::MissingCredentials`] when email or password is unset.
    pub fn credentials(&self) -> KbResult<Credentials> {
        let email = self
            .auth
            .email
            .clone()
            .filter(|e| !e.is_empty())
            .ok_or(KbError::MissingCredentials {
                field: "email",
                env: "EMAIL",
            })?;
        let password = self
            .auth
            .password
            .clone()
            .filter(|p| !p.is_empty())
            .ok_or(KbError::MissingCredentials {
                field: "password",
                env: "PASSWORD",
            })?;
        Ok(Credentials { email, password })
    }

    /// Copy of this config with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.auth.password.is_some() {
            copy.auth.password = Some("********".to_string());
        }
        if !copy.auth.anon_key.is_empty() {
            copy.auth.anon_key = "********".to_string();
        }
        copy
    }

    /// Backend URL without a trailing slash.
    pub fn backend_base(&self) -> &str {
        self.backend_url.trim_end_matches('/')
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Identity provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Base URL of the identity provider.
    #[serde(default = "default_auth_url")]
    pub url: String,

    /// Public API key sent as the `Apikey` header.
    #[serde(default)]
    pub anon_key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

fn default_auth_url() -> String {
    DEFAULT_AUTH_URL.to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            url: default_auth_url(),
            anon_key: String::new(),
            email: None,
            password: None,
        }
    }
}

/// Email/password pair for the password grant.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"********")
            .finish()
    }
}

/// Drive connection selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Connection provider to list (e.g. `gdrive`).
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Pin a specific connection. When unset, the first listed connection is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
}

fn default_provider() -> String {
    DEFAULT_CONNECTION_PROVIDER.to_string()
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            connection_id: None,
        }
    }
}

/// Knowledge base creation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    #[serde(default)]
    pub ocr: bool,
    #[serde(default = "default_true")]
    pub unstructured: bool,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: u32,
    #[serde(default = "default_chunker")]
    pub chunker: String,
}

fn default_true() -> bool {
    true
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_chunk_size() -> u32 {
    DEFAULT_CHUNK_SIZE
}

fn default_chunk_overlap() -> u32 {
    DEFAULT_CHUNK_OVERLAP
}

fn default_chunker() -> String {
    DEFAULT_CHUNKER.to_string()
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            ocr: false,
            unstructured: true,
            embedding_model: default_embedding_model(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            chunker: default_chunker(),
        }
    }
}

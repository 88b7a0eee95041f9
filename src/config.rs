//! Credentials for sealing and opening notes.
//!
//! The codec never reads these itself; callers load a [`Credentials`] value
//! and pass its fields to [`crate::container::encode`] / [`crate::container::decode`].
//!
//! ```toml
//! [user]
//! identity = "20250313017Z"
//!
//! [security]
//! secret = "BIGC_AI_2025_KEY"
//! ```

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use zeroize::Zeroizing;

/// Default configuration file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "mynote.toml";
pub const IDENTITY_MIN_LEN: usize = 5;
pub const IDENTITY_MAX_LEN: usize = 20;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

#[derive(Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    user: RawUser,
    #[serde(default)]
    security: RawSecurity,
}

#[derive(Deserialize, Default)]
struct RawUser {
    #[serde(default)]
    identity: String,
}

#[derive(Deserialize, Default)]
struct RawSecurity {
    #[serde(default)]
    secret: String,
}

/// A validated identity and shared secret.
#[derive(Clone)]
pub struct Credentials {
    identity: String,
    secret:   Zeroizing<String>,
}

impl Credentials {
    /// Trim and validate both values.
    pub fn new(identity: &str, secret: &str) -> Result<Self, ConfigError> {
        let identity = identity.trim();
        let secret   = secret.trim();

        if identity.is_empty() {
            return Err(ConfigError::Validation("identity must not be empty".into()));
        }
        if secret.is_empty() {
            return Err(ConfigError::Validation("secret must not be empty".into()));
        }
        let chars = identity.chars().count();
        if chars < IDENTITY_MIN_LEN {
            return Err(ConfigError::Validation(format!(
                "identity must be at least {IDENTITY_MIN_LEN} characters"
            )));
        }
        if chars > IDENTITY_MAX_LEN {
            return Err(ConfigError::Validation(format!(
                "identity must be at most {IDENTITY_MAX_LEN} characters"
            )));
        }
        if !identity.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::Validation(
                "identity may contain only ASCII letters and digits".into(),
            ));
        }

        Ok(Self {
            identity: identity.to_owned(),
            secret:   Zeroizing::new(secret.to_owned()),
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(content)?;
        Self::new(&raw.user.identity, &raw.security.secret)
    }

    /// Load from `path` when it exists, then apply per-field overrides.
    ///
    /// With both overrides present the file is not read at all.
    pub fn resolve(
        path:     &Path,
        identity: Option<&str>,
        secret:   Option<&str>,
    ) -> Result<Self, ConfigError> {
        let (file_identity, file_secret) = if identity.is_some() && secret.is_some() {
            (String::new(), String::new())
        } else if path.exists() {
            let raw: RawConfig = toml::from_str(&std::fs::read_to_string(path)?)?;
            (raw.user.identity, raw.security.secret)
        } else {
            return Err(ConfigError::Validation(format!(
                "configuration file not found: {} (or pass --identity and --secret)",
                path.display()
            )));
        };
        let file_secret = Zeroizing::new(file_secret);
        Self::new(identity.unwrap_or(&file_identity), secret.unwrap_or(file_secret.as_str()))
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Secret bytes as handed to the codec.
    pub fn secret(&self) -> &[u8] {
        self.secret.as_bytes()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

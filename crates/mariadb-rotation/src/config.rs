//! Rotation configuration.
//!
//! Loaded from a TOML file, then overlaid with environment variables:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `EXCLUDE_CHARACTERS` | `exclude_characters` |
//! | `SECRETS_MANAGER_ENDPOINT` | `secrets_manager_endpoint` |
//! | `ROTATION_CONNECT_TIMEOUT_SECS` | `connect_timeout_secs` |

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RotationError};

/// Characters excluded from generated passwords unless configured otherwise.
pub const DEFAULT_EXCLUDE_CHARACTERS: &str = "/@\"'\\";

/// Length of generated passwords unless configured otherwise.
pub const DEFAULT_PASSWORD_LENGTH: usize = 32;

/// Statement run by testSecret unless configured otherwise.
pub const DEFAULT_PROBE_STATEMENT: &str = "SELECT NOW()";

/// Settings shared by every step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Characters generated passwords must not contain.
    pub exclude_characters: String,
    /// Endpoint of the secret store, if not the default.
    pub secrets_manager_endpoint: Option<String>,
    /// Login timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Read-only statement proving a session is usable. Its rows are ignored;
    /// the in-memory database answers any `SELECT`.
    pub probe_statement: String,
    /// Length of generated passwords.
    pub password_length: usize,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            exclude_characters: DEFAULT_EXCLUDE_CHARACTERS.to_string(),
            secrets_manager_endpoint: None,
            connect_timeout_secs: 5,
            probe_statement: DEFAULT_PROBE_STATEMENT.to_string(),
            password_length: DEFAULT_PASSWORD_LENGTH,
        }
    }
}

impl RotationConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| RotationError::Config {
            reason: format!(
                "failed to read config file '{}': {e}",
                path.as_ref().display()
            ),
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| RotationError::Config {
            reason: format!("invalid TOML: {e}"),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Overlays values found through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be parsed or the result is invalid.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(exclude) = lookup("EXCLUDE_CHARACTERS") {
            self.exclude_characters = exclude;
        }
        if let Some(endpoint) = lookup("SECRETS_MANAGER_ENDPOINT") {
            self.secrets_manager_endpoint = Some(endpoint);
        }
        if let Some(timeout) = lookup("ROTATION_CONNECT_TIMEOUT_SECS") {
            self.connect_timeout_secs =
                timeout.trim().parse().map_err(|_| RotationError::Config {
                    reason: format!("ROTATION_CONNECT_TIMEOUT_SECS must be an integer, got {timeout:?}"),
                })?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any value is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout_secs == 0 {
            return Err(RotationError::Config {
                reason: "connect_timeout_secs must be greater than zero".to_string(),
            });
        }

        if self.probe_statement.trim().is_empty() {
            return Err(RotationError::Config {
                reason: "probe_statement cannot be empty".to_string(),
            });
        }

        if !(8..=4096).contains(&self.password_length) {
            return Err(RotationError::Config {
                reason: "password_length must be between 8 and 4096".to_string(),
            });
        }

        Ok(())
    }

    /// Login timeout.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

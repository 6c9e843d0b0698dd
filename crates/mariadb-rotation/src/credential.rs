//! Typed credential records parsed from secret payloads.
//!
//! A payload is validated once, at [`CredentialRecord::parse`]. Everything
//! downstream works with the typed record and never re-inspects raw JSON.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, RotationError};
use crate::types::SecretId;

/// A database password that zeroizes on drop and never prints.
#[derive(Clone, Zeroize, ZeroizeOnDrop, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Password(String);

impl Password {
    /// Wraps a plaintext password.
    #[must_use]
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    /// Returns the plaintext. Callers must not log it.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl PartialEq for Password {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl Eq for Password {}

/// A validated MariaDB credential as stored in one secret version.
///
/// Keys the rotation does not understand are kept in `extra` and written back
/// unchanged when the record is cloned into a new version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Always `"mariadb"` after validation.
    pub engine: String,
    /// Database endpoint host name.
    pub host: String,
    /// Database user.
    pub username: String,
    /// Database password.
    pub password: Password,
    /// Default schema to connect to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dbname: Option<String>,
    /// Port, defaulting to 3306.
    #[serde(
        default,
        deserialize_with = "deserialize_port",
        skip_serializing_if = "Option::is_none"
    )]
    pub port: Option<u16>,
    /// Identifier of the secret holding the master (administrative) credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masterarn: Option<String>,
    /// Unrecognized payload keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CredentialRecord {
    /// The only engine this rotation supports.
    pub const ENGINE: &'static str = "mariadb";

    /// Port used when the payload does not name one.
    pub const DEFAULT_PORT: u16 = 3306;

    const REQUIRED_FIELDS: [&'static str; 3] = ["host", "username", "password"];

    /// Parses and validates a raw secret payload.
    ///
    /// # Errors
    ///
    /// Returns [`RotationError::MalformedSecret`] if the payload is not a JSON
    /// object, the engine is not `mariadb`, a required field is missing or not
    /// a string, or an optional field has the wrong type.
    pub fn parse(secret_string: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(secret_string)
            .map_err(|e| RotationError::malformed(format!("secret is not valid JSON: {e}")))?;

        let Value::Object(fields) = value else {
            return Err(RotationError::malformed("secret JSON must be an object"));
        };

        if fields.get("engine").and_then(Value::as_str) != Some(Self::ENGINE) {
            return Err(RotationError::malformed(
                "database engine must be set to 'mariadb' in order to use this rotation",
            ));
        }

        for field in Self::REQUIRED_FIELDS {
            match fields.get(field) {
                Some(Value::String(_)) => {}
                Some(_) => {
                    return Err(RotationError::malformed(format!(
                        "{field} key must be a string"
                    )));
                }
                None => {
                    return Err(RotationError::malformed(format!(
                        "{field} key is missing from secret JSON"
                    )));
                }
            }
        }

        serde_json::from_value(Value::Object(fields))
            .map_err(|e| RotationError::malformed(e.to_string()))
    }

    /// Serializes the record back into a secret payload.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_secret_string(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| RotationError::Store {
            reason: format!("failed to serialize secret: {e}"),
        })
    }

    /// Effective port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(Self::DEFAULT_PORT)
    }

    /// Identifier of the master secret.
    ///
    /// # Errors
    ///
    /// Returns [`RotationError::MalformedSecret`] when `masterarn` is absent.
    pub fn master_secret_id(&self) -> Result<SecretId> {
        let arn = self
            .masterarn
            .as_deref()
            .ok_or_else(|| RotationError::malformed("masterarn key is missing from secret JSON"))?;
        SecretId::new(arn)
    }

    /// Returns a copy of this record with a different identity.
    #[must_use]
    pub fn with_identity(&self, username: impl Into<String>, password: Password) -> Self {
        Self {
            username: username.into(),
            password,
            ..self.clone()
        }
    }
}

fn deserialize_port<'de, D>(deserializer: D) -> std::result::Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortRepr {
        Number(u16),
        Text(String),
    }

    match Option::<PortRepr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(PortRepr::Number(port)) => Ok(Some(port)),
        Some(PortRepr::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid port {text:?}"))),
    }
}

//! Core types for the rotation protocol.
//!
//! - [`SecretId`]: opaque identifier (name or ARN) of a secret
//! - [`VersionToken`]: the request token naming one secret version
//! - [`StageLabel`]: labels such as `AWSCURRENT` attached to versions
//! - [`SecretDescription`]: the version-to-stage mapping read before every step
//! - [`RotationRequest`]: one externally-invoked step
//! - [`StepOutcome`]: what a step did, including idempotent no-ops

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{Result, RotationError};

/// Opaque identifier of a secret, either a friendly name or a full ARN.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SecretId(String);

impl SecretId {
    /// Maximum length of a secret identifier.
    pub const MAX_LENGTH: usize = 2048;

    /// Creates a new `SecretId` after validating the input.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is empty, too long, or contains
    /// whitespace or control characters.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(RotationError::InvalidSecretId {
                reason: "identifier cannot be empty".to_string(),
            });
        }
        if id.len() > Self::MAX_LENGTH {
            return Err(RotationError::InvalidSecretId {
                reason: format!(
                    "identifier exceeds maximum length of {} characters",
                    Self::MAX_LENGTH
                ),
            });
        }
        if let Some(c) = id.chars().find(|c| c.is_whitespace() || c.is_control()) {
            return Err(RotationError::InvalidSecretId {
                reason: format!("identifier contains invalid character {c:?}"),
            });
        }
        Ok(Self(id))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SecretId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SecretId {
    type Error = RotationError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<SecretId> for String {
    fn from(id: SecretId) -> Self {
        id.0
    }
}

/// Opaque token identifying one secret version (the client request token).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    /// Wraps an existing token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Generates a fresh random token.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stage label attached to a secret version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StageLabel {
    /// The live version. Exactly one version carries it.
    Current,
    /// The version being rotated in.
    Pending,
    /// The version that was CURRENT before the last promotion.
    Previous,
    /// Any other caller-defined label.
    Custom(String),
}

impl StageLabel {
    /// Wire name of the label.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Current => "AWSCURRENT",
            Self::Pending => "AWSPENDING",
            Self::Previous => "AWSPREVIOUS",
            Self::Custom(label) => label,
        }
    }
}

impl From<String> for StageLabel {
    fn from(value: String) -> Self {
        match value.as_str() {
            "AWSCURRENT" => Self::Current,
            "AWSPENDING" => Self::Pending,
            "AWSPREVIOUS" => Self::Previous,
            _ => Self::Custom(value),
        }
    }
}

impl From<StageLabel> for String {
    fn from(label: StageLabel) -> Self {
        label.as_str().to_string()
    }
}

impl fmt::Display for StageLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Version-to-stage mapping of a secret, as returned by the secret store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretDescription {
    /// Rotation flag. `None` means the store did not report one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_enabled: Option<bool>,
    /// Stage labels keyed by version token.
    #[serde(default)]
    pub versions: BTreeMap<VersionToken, BTreeSet<StageLabel>>,
}

impl SecretDescription {
    /// Rotation counts as disabled only when the store says so explicitly.
    #[must_use]
    pub fn rotation_disabled(&self) -> bool {
        self.rotation_enabled == Some(false)
    }

    /// Returns the stages attached to a version, if the version is known.
    #[must_use]
    pub fn stages_for(&self, token: &VersionToken) -> Option<&BTreeSet<StageLabel>> {
        self.versions.get(token)
    }

    /// Returns the version carrying `stage`, if any.
    #[must_use]
    pub fn version_with(&self, stage: &StageLabel) -> Option<&VersionToken> {
        self.versions
            .iter()
            .find(|(_, stages)| stages.contains(stage))
            .map(|(token, _)| token)
    }
}

/// The four rotation steps, invoked in order by the secret authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RotationStep {
    /// Generate and store the PENDING credential.
    CreateSecret,
    /// Apply the PENDING credential to the database.
    SetSecret,
    /// Verify the PENDING credential works.
    TestSecret,
    /// Promote PENDING to CURRENT.
    FinishSecret,
}

impl RotationStep {
    /// All steps in invocation order.
    pub const ALL: [Self; 4] = [
        Self::CreateSecret,
        Self::SetSecret,
        Self::TestSecret,
        Self::FinishSecret,
    ];

    /// Parses a step name as sent by the invoker.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|step| step.as_str() == name)
    }

    /// Wire name of the step.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateSecret => "createSecret",
            Self::SetSecret => "setSecret",
            Self::TestSecret => "testSecret",
            Self::FinishSecret => "finishSecret",
        }
    }
}

impl fmt::Display for RotationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One invocation of the rotation protocol.
///
/// The step stays a raw string so that an unknown step is reported only after
/// the stage gate has run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationRequest {
    /// The secret being rotated.
    #[serde(rename = "SecretId")]
    pub secret_id: SecretId,
    /// Token of the version being rotated in.
    #[serde(rename = "ClientRequestToken")]
    pub token: VersionToken,
    /// Step name, one of `createSecret`, `setSecret`, `testSecret`, `finishSecret`.
    #[serde(rename = "Step")]
    pub step: String,
}

impl RotationRequest {
    /// Builds a request for a known step.
    #[must_use]
    pub fn new(secret_id: SecretId, token: VersionToken, step: RotationStep) -> Self {
        Self {
            secret_id,
            token,
            step: step.as_str().to_string(),
        }
    }

    /// Parses a request from the JSON invocation event.
    ///
    /// # Errors
    ///
    /// Returns an error if the event is not valid JSON or lacks a field.
    pub fn from_event(event: &str) -> Result<Self> {
        serde_json::from_str(event).map_err(|e| RotationError::Config {
            reason: format!("invalid rotation event: {e}"),
        })
    }
}

/// What a successful invocation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// The token's version is already CURRENT; nothing to do.
    AlreadyCurrent,
    /// A new PENDING credential was generated and stored.
    Created,
    /// A PENDING credential already existed for the token.
    AlreadyCreated,
    /// Grants and password were applied to the PENDING identity.
    PasswordSet,
    /// The PENDING credential could already log in.
    AlreadySet,
    /// The PENDING credential logged in and ran the probe.
    Tested,
    /// CURRENT was moved onto the token's version.
    Promoted,
    /// The token's version already held CURRENT.
    AlreadyPromoted,
}

impl StepOutcome {
    /// Whether the invocation changed any external state.
    #[must_use]
    pub const fn is_noop(self) -> bool {
        matches!(
            self,
            Self::AlreadyCurrent | Self::AlreadyCreated | Self::AlreadySet | Self::AlreadyPromoted
        )
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::AlreadyCurrent => "version already current",
            Self::Created => "pending secret created",
            Self::AlreadyCreated => "pending secret already exists",
            Self::PasswordSet => "pending password set in database",
            Self::AlreadySet => "pending password already set in database",
            Self::Tested => "pending secret verified",
            Self::Promoted => "pending secret promoted to current",
            Self::AlreadyPromoted => "version already promoted",
        };
        f.write_str(text)
    }
}

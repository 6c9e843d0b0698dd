//! Error types for the rotation protocol.

use thiserror::Error;

use crate::database::DatabaseError;

/// Errors surfaced by a rotation step.
///
/// Every variant aborts the current step. The caller decides whether to
/// re-invoke the same step based on [`RotationError::is_retryable`].
#[derive(Debug, Error)]
pub enum RotationError {
    /// Rotation has been explicitly disabled on the secret.
    #[error("secret {secret_id} is not enabled for rotation")]
    RotationNotEnabled {
        /// The secret being rotated.
        secret_id: String,
    },

    /// The request token has no stage mapping on the secret.
    #[error("secret version {token} has no stage for rotation of secret {secret_id}")]
    UnknownToken {
        /// The secret being rotated.
        secret_id: String,
        /// The request token supplied by the caller.
        token: String,
    },

    /// The request token's version is neither CURRENT nor PENDING.
    #[error("secret version {token} not set as AWSPENDING for rotation of secret {secret_id}")]
    StageMismatch {
        /// The secret being rotated.
        secret_id: String,
        /// The request token supplied by the caller.
        token: String,
    },

    /// The step name is not one of the four rotation steps.
    #[error("invalid step parameter {step} for secret {secret_id}")]
    InvalidStep {
        /// The secret being rotated.
        secret_id: String,
        /// The unrecognized step name.
        step: String,
    },

    /// The secret payload is missing a required field or names the wrong engine.
    #[error("malformed secret: {reason}")]
    MalformedSecret {
        /// What is wrong with the payload.
        reason: String,
    },

    /// The pending username is not the alternate of the current username.
    #[error("attempting to modify user {pending} other than current user or clone {current}")]
    IdentityMismatch {
        /// Username held by the PENDING version.
        pending: String,
        /// Username held by the CURRENT version.
        current: String,
    },

    /// The pending host differs from the current host.
    #[error("attempting to modify user for host {pending} other than current host {current}")]
    HostMismatch {
        /// Host held by the PENDING version.
        pending: String,
        /// Host held by the CURRENT version.
        current: String,
    },

    /// The CURRENT credential could not log in.
    #[error("unable to log into database using current credentials for secret {secret_id}")]
    CurrentCredentialInvalid {
        /// The secret being rotated.
        secret_id: String,
    },

    /// The current host is neither the master host nor a confirmed replica of it.
    #[error(
        "current database host {current_host} is not the same host as/rds replica of master {master_host}"
    )]
    UntrustedHost {
        /// Host held by the CURRENT version.
        current_host: String,
        /// Host held by the master secret.
        master_host: String,
    },

    /// The master credential could not log in.
    #[error("unable to log into database using credentials in master secret {master_arn}")]
    MasterCredentialInvalid {
        /// Identifier of the master secret.
        master_arn: String,
    },

    /// The PENDING credential could not log in during testSecret.
    #[error("unable to log into database with pending secret of secret {secret_id}")]
    PendingCredentialInvalid {
        /// The secret being rotated.
        secret_id: String,
    },

    /// Appending the clone suffix would exceed the username length limit.
    #[error(
        "unable to clone user {username}, username length with _clone appended would exceed {max} characters"
    )]
    UsernameTooLong {
        /// The username that could not be cloned.
        username: String,
        /// The maximum allowed username length.
        max: usize,
    },

    /// A secret version could not be found at the requested stage.
    #[error("secret {secret_id} has no version at stage {stage}")]
    SecretNotFound {
        /// The secret that was looked up.
        secret_id: String,
        /// The stage label that was requested.
        stage: String,
    },

    /// Invalid secret identifier.
    #[error("invalid secret id: {reason}")]
    InvalidSecretId {
        /// The reason the identifier is invalid.
        reason: String,
    },

    /// A grant statement returned by the database could not be rewritten.
    #[error("malformed grant statement: {statement}")]
    MalformedGrant {
        /// The statement text as returned by the database.
        statement: String,
    },

    /// The secret store rejected or failed an operation.
    #[error("secret store error: {reason}")]
    Store {
        /// The reason the store operation failed.
        reason: String,
    },

    /// A statement or commit failed on an open session.
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// Invalid configuration.
    #[error("configuration error: {reason}")]
    Config {
        /// The reason the configuration is invalid.
        reason: String,
    },
}

impl RotationError {
    /// Stable machine-readable code for the error condition.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::RotationNotEnabled { .. } => "rotation_not_enabled",
            Self::UnknownToken { .. } => "unknown_token",
            Self::StageMismatch { .. } => "stage_mismatch",
            Self::InvalidStep { .. } => "invalid_step",
            Self::MalformedSecret { .. } => "malformed_secret",
            Self::IdentityMismatch { .. } => "identity_mismatch",
            Self::HostMismatch { .. } => "host_mismatch",
            Self::CurrentCredentialInvalid { .. } => "current_credential_invalid",
            Self::UntrustedHost { .. } => "untrusted_host",
            Self::MasterCredentialInvalid { .. } => "master_credential_invalid",
            Self::PendingCredentialInvalid { .. } => "pending_credential_invalid",
            Self::UsernameTooLong { .. } => "username_too_long",
            Self::SecretNotFound { .. } => "secret_not_found",
            Self::InvalidSecretId { .. } => "invalid_secret_id",
            Self::MalformedGrant { .. } => "malformed_grant",
            Self::Store { .. } => "store_error",
            Self::Database(_) => "database_error",
            Self::Config { .. } => "config_error",
        }
    }

    /// Whether re-invoking the same step could succeed without operator action.
    ///
    /// Login failures count as retryable since an unreachable host and a bad
    /// password are indistinguishable at this layer.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CurrentCredentialInvalid { .. }
                | Self::MasterCredentialInvalid { .. }
                | Self::PendingCredentialInvalid { .. }
                | Self::Store { .. }
                | Self::Database(_)
        )
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedSecret {
            reason: reason.into(),
        }
    }
}

/// Result type alias for rotation operations.
pub type Result<T> = std::result::Result<T, RotationError>;

//! Alternate-identity resolution for the two-user rotation scheme.
//!
//! A rotated login alternates between a base user and its clone. The clone
//! is the base name with [`CLONE_SUFFIX`] appended.

use crate::error::{Result, RotationError};

/// Suffix distinguishing the clone identity from its base.
pub const CLONE_SUFFIX: &str = "_clone";

/// Longest username the database accepts for a clone identity.
pub const MAX_USERNAME_LENGTH: usize = 80;

/// Returns the identity that should receive the next credential.
///
/// Strips [`CLONE_SUFFIX`] when present, otherwise appends it.
///
/// # Errors
///
/// Returns [`RotationError::UsernameTooLong`] if appending the suffix would
/// exceed [`MAX_USERNAME_LENGTH`] characters.
pub fn alternate_username(username: &str) -> Result<String> {
    if let Some(base) = username.strip_suffix(CLONE_SUFFIX) {
        return Ok(base.to_string());
    }

    let clone = format!("{username}{CLONE_SUFFIX}");
    if clone.chars().count() > MAX_USERNAME_LENGTH {
        return Err(RotationError::UsernameTooLong {
            username: username.to_string(),
            max: MAX_USERNAME_LENGTH,
        });
    }
    Ok(clone)
}

/// A base identity and its clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlternateIdentityPair {
    base: String,
    clone: String,
}

impl AlternateIdentityPair {
    /// Builds the pair that `username` belongs to, whichever side it is.
    ///
    /// # Errors
    ///
    /// Returns [`RotationError::UsernameTooLong`] if `username` is a base
    /// name whose clone would be too long.
    pub fn for_username(username: &str) -> Result<Self> {
        let other = alternate_username(username)?;
        let pair = if username.ends_with(CLONE_SUFFIX) {
            Self {
                base: other,
                clone: username.to_string(),
            }
        } else {
            Self {
                base: username.to_string(),
                clone: other,
            }
        };
        Ok(pair)
    }

    /// The identity without the suffix.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The identity with the suffix.
    #[must_use]
    pub fn clone_name(&self) -> &str {
        &self.clone
    }

    /// Whether `username` is one of the two identities.
    #[must_use]
    pub fn contains(&self, username: &str) -> bool {
        self.base == username || self.clone == username
    }

    /// Whether a credential for `from` may be succeeded by one for `to`:
    /// both belong to the pair and they differ.
    #[must_use]
    pub fn is_handover(&self, from: &str, to: &str) -> bool {
        from != to && self.contains(from) && self.contains(to)
    }
}

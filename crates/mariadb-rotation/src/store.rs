//! Secret store contract and an in-process implementation.
//!
//! The rotation only needs five operations from the secret authority:
//! describe the version-to-stage mapping, fetch a payload by stage, write a
//! payload under PENDING, move CURRENT atomically, and generate passwords.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::credential::Password;
use crate::error::{Result, RotationError};
use crate::types::{SecretDescription, SecretId, StageLabel, VersionToken};

/// Operations consumed from the secret authority.
pub trait SecretStoreClient {
    /// Returns the rotation flag and version-to-stage mapping.
    fn describe_secret(&self, secret_id: &SecretId) -> Result<SecretDescription>;

    /// Fetches the payload of the version carrying `stage`.
    ///
    /// When `token` is given, the payload is returned only if that exact
    /// version carries `stage`. `Ok(None)` means no such payload exists.
    fn get_secret_string(
        &self,
        secret_id: &SecretId,
        stage: &StageLabel,
        token: Option<&VersionToken>,
    ) -> Result<Option<String>>;

    /// Writes a payload at `token` and labels it PENDING, leaving every other
    /// label where it is.
    fn put_pending_secret(
        &self,
        secret_id: &SecretId,
        token: &VersionToken,
        secret_string: &str,
    ) -> Result<()>;

    /// Moves CURRENT from `from` to `token` in one atomic step.
    fn promote_to_current(
        &self,
        secret_id: &SecretId,
        token: &VersionToken,
        from: Option<&VersionToken>,
    ) -> Result<()>;

    /// Generates a random password of `length` characters without any of
    /// `exclude_characters`.
    fn random_password(&self, exclude_characters: &str, length: usize) -> Result<Password>;
}

impl<T: SecretStoreClient + ?Sized> SecretStoreClient for &T {
    fn describe_secret(&self, secret_id: &SecretId) -> Result<SecretDescription> {
        (**self).describe_secret(secret_id)
    }

    fn get_secret_string(
        &self,
        secret_id: &SecretId,
        stage: &StageLabel,
        token: Option<&VersionToken>,
    ) -> Result<Option<String>> {
        (**self).get_secret_string(secret_id, stage, token)
    }

    fn put_pending_secret(
        &self,
        secret_id: &SecretId,
        token: &VersionToken,
        secret_string: &str,
    ) -> Result<()> {
        (**self).put_pending_secret(secret_id, token, secret_string)
    }

    fn promote_to_current(
        &self,
        secret_id: &SecretId,
        token: &VersionToken,
        from: Option<&VersionToken>,
    ) -> Result<()> {
        (**self).promote_to_current(secret_id, token, from)
    }

    fn random_password(&self, exclude_characters: &str, length: usize) -> Result<Password> {
        (**self).random_password(exclude_characters, length)
    }
}

/// One stored version of a secret.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoredVersion {
    /// The payload. `None` for a version reserved by `begin_rotation` but not
    /// written yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_string: Option<String>,
    /// Labels attached to the version.
    #[serde(default)]
    pub stages: BTreeSet<StageLabel>,
    /// When the version was created.
    pub created_at: DateTime<Utc>,
}

impl StoredVersion {
    fn new(secret_string: Option<String>, stage: StageLabel) -> Self {
        Self {
            secret_string,
            stages: BTreeSet::from([stage]),
            created_at: Utc::now(),
        }
    }
}

impl fmt::Debug for StoredVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Payloads hold passwords
        f.debug_struct("StoredVersion")
            .field("secret_string", &self.secret_string.as_ref().map(|_| "[REDACTED]"))
            .field("stages", &self.stages)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// A secret with all of its versions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredSecret {
    /// Rotation flag as reported by `describe_secret`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_enabled: Option<bool>,
    /// Versions keyed by token.
    #[serde(default)]
    pub versions: BTreeMap<VersionToken, StoredVersion>,
}

impl StoredSecret {
    fn strip_label(&mut self, label: &StageLabel) {
        for version in self.versions.values_mut() {
            version.stages.remove(label);
        }
    }

    fn holder_of(&self, label: &StageLabel) -> Option<VersionToken> {
        self.versions
            .iter()
            .find(|(_, version)| version.stages.contains(label))
            .map(|(token, _)| token.clone())
    }
}

/// Serializable state of an [`InMemorySecretStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// Secrets keyed by identifier.
    #[serde(default)]
    pub secrets: BTreeMap<SecretId, StoredSecret>,
}

/// An in-process secret store with stage-label semantics.
///
/// Every label is held by at most one version of a secret. CURRENT moves are
/// done under a single write lock, so readers never observe zero or two
/// CURRENT versions.
pub struct InMemorySecretStore {
    secrets: RwLock<BTreeMap<SecretId, StoredSecret>>,
    writes: AtomicU64,
}

impl InMemorySecretStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::from_snapshot(StoreSnapshot::default())
    }

    /// Restores a store from a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            secrets: RwLock::new(snapshot.secrets),
            writes: AtomicU64::new(0),
        }
    }

    /// Captures the current state.
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            secrets: self.read().clone(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<SecretId, StoredSecret>> {
        self.secrets.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<SecretId, StoredSecret>> {
        self.secrets.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn not_found(secret_id: &SecretId) -> RotationError {
        RotationError::Store {
            reason: format!("secret {secret_id} not found"),
        }
    }

    /// Creates a secret whose first version is CURRENT.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret already exists.
    pub fn create_secret(&self, secret_id: &SecretId, secret_string: &str) -> Result<VersionToken> {
        let mut secrets = self.write();
        if secrets.contains_key(secret_id) {
            return Err(RotationError::Store {
                reason: format!("secret {secret_id} already exists"),
            });
        }

        let token = VersionToken::generate();
        let mut secret = StoredSecret::default();
        secret.versions.insert(
            token.clone(),
            StoredVersion::new(Some(secret_string.to_string()), StageLabel::Current),
        );
        secrets.insert(secret_id.clone(), secret);
        Ok(token)
    }

    /// Reserves a new version labeled PENDING with a fresh token.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret does not exist.
    pub fn begin_rotation(&self, secret_id: &SecretId) -> Result<VersionToken> {
        let token = VersionToken::generate();
        self.begin_rotation_with(secret_id, &token)?;
        Ok(token)
    }

    /// Reserves `token` as a new PENDING version, moving the label off any
    /// abandoned attempt.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret does not exist or the token is taken.
    pub fn begin_rotation_with(&self, secret_id: &SecretId, token: &VersionToken) -> Result<()> {
        let mut secrets = self.write();
        let secret = secrets
            .get_mut(secret_id)
            .ok_or_else(|| Self::not_found(secret_id))?;
        if secret.versions.contains_key(token) {
            return Err(RotationError::Store {
                reason: format!("version {token} already exists on secret {secret_id}"),
            });
        }

        secret.strip_label(&StageLabel::Pending);
        secret
            .versions
            .insert(token.clone(), StoredVersion::new(None, StageLabel::Pending));
        Ok(())
    }

    /// Sets the rotation flag reported by `describe_secret`.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret does not exist.
    pub fn set_rotation_enabled(&self, secret_id: &SecretId, enabled: Option<bool>) -> Result<()> {
        let mut secrets = self.write();
        let secret = secrets
            .get_mut(secret_id)
            .ok_or_else(|| Self::not_found(secret_id))?;
        secret.rotation_enabled = enabled;
        Ok(())
    }

    /// Number of payload writes and label moves performed.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }
}

impl Default for InMemorySecretStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InMemorySecretStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemorySecretStore")
            .field("secrets_count", &self.read().len())
            .field("writes", &self.write_count())
            .finish_non_exhaustive()
    }
}

impl SecretStoreClient for InMemorySecretStore {
    fn describe_secret(&self, secret_id: &SecretId) -> Result<SecretDescription> {
        let secrets = self.read();
        let secret = secrets
            .get(secret_id)
            .ok_or_else(|| Self::not_found(secret_id))?;

        Ok(SecretDescription {
            rotation_enabled: secret.rotation_enabled,
            versions: secret
                .versions
                .iter()
                .map(|(token, version)| (token.clone(), version.stages.clone()))
                .collect(),
        })
    }

    fn get_secret_string(
        &self,
        secret_id: &SecretId,
        stage: &StageLabel,
        token: Option<&VersionToken>,
    ) -> Result<Option<String>> {
        let secrets = self.read();
        let Some(secret) = secrets.get(secret_id) else {
            return Ok(None);
        };

        let version = match token {
            Some(token) => secret.versions.get(token),
            None => secret
                .versions
                .values()
                .find(|version| version.stages.contains(stage)),
        };

        Ok(version
            .filter(|version| version.stages.contains(stage))
            .and_then(|version| version.secret_string.clone()))
    }

    fn put_pending_secret(
        &self,
        secret_id: &SecretId,
        token: &VersionToken,
        secret_string: &str,
    ) -> Result<()> {
        let mut secrets = self.write();
        let secret = secrets
            .get_mut(secret_id)
            .ok_or_else(|| Self::not_found(secret_id))?;

        if let Some(existing) = secret
            .versions
            .get(token)
            .and_then(|version| version.secret_string.as_deref())
        {
            if existing == secret_string {
                return Ok(());
            }
            return Err(RotationError::Store {
                reason: format!(
                    "version {token} of secret {secret_id} already holds a different value"
                ),
            });
        }

        secret.strip_label(&StageLabel::Pending);
        let version = secret
            .versions
            .entry(token.clone())
            .or_insert_with(|| StoredVersion::new(None, StageLabel::Pending));
        version.secret_string = Some(secret_string.to_string());
        version.stages.insert(StageLabel::Pending);

        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn promote_to_current(
        &self,
        secret_id: &SecretId,
        token: &VersionToken,
        from: Option<&VersionToken>,
    ) -> Result<()> {
        let mut secrets = self.write();
        let secret = secrets
            .get_mut(secret_id)
            .ok_or_else(|| Self::not_found(secret_id))?;

        if !secret.versions.contains_key(token) {
            return Err(RotationError::Store {
                reason: format!("version {token} not found on secret {secret_id}"),
            });
        }

        let holder = secret.holder_of(&StageLabel::Current);
        if holder.as_ref() == Some(token) {
            return Ok(());
        }
        if holder.as_ref() != from {
            return Err(RotationError::Store {
                reason: format!(
                    "AWSCURRENT on secret {secret_id} is attached to {}, not {}",
                    holder.as_ref().map_or("no version", VersionToken::as_str),
                    from.map_or("no version", VersionToken::as_str),
                ),
            });
        }

        secret.strip_label(&StageLabel::Previous);
        if let Some(old) = holder.and_then(|old| secret.versions.get_mut(&old)) {
            old.stages.remove(&StageLabel::Current);
            old.stages.insert(StageLabel::Previous);
        }
        if let Some(new) = secret.versions.get_mut(token) {
            new.stages.remove(&StageLabel::Pending);
            new.stages.insert(StageLabel::Current);
        }

        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn random_password(&self, exclude_characters: &str, length: usize) -> Result<Password> {
        let alphabet: Vec<char> = (b'!'..=b'~')
            .map(char::from)
            .filter(|c| !exclude_characters.contains(*c))
            .collect();
        if alphabet.is_empty() {
            return Err(RotationError::Store {
                reason: "every printable character is excluded".to_string(),
            });
        }

        let mut rng = rand::thread_rng();
        let password: String = (0..length)
            .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
            .collect();
        Ok(Password::new(password))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn secret_id() -> SecretId {
        SecretId::new("app/db").expect("valid id")
    }

    fn seeded() -> (InMemorySecretStore, VersionToken) {
        let store = InMemorySecretStore::new();
        let token = store
            .create_secret(&secret_id(), r#"{"v":1}"#)
            .expect("create");
        (store, token)
    }

    fn current_holders(store: &InMemorySecretStore) -> usize {
        store
            .describe_secret(&secret_id())
            .expect("describe")
            .versions
            .values()
            .filter(|stages| stages.contains(&StageLabel::Current))
            .count()
    }

    #[test]
    fn create_secret_labels_first_version_current() {
        let (store, token) = seeded();
        let description = store.describe_secret(&secret_id()).expect("describe");
        assert_eq!(description.version_with(&StageLabel::Current), Some(&token));
        assert_eq!(
            store
                .get_secret_string(&secret_id(), &StageLabel::Current, None)
                .expect("get"),
            Some(r#"{"v":1}"#.to_string())
        );
        assert!(store.create_secret(&secret_id(), "{}").is_err());
    }

    #[test]
    fn reserved_version_has_no_payload_until_written() {
        let (store, _) = seeded();
        let pending = store.begin_rotation(&secret_id()).expect("begin");

        assert_eq!(
            store
                .get_secret_string(&secret_id(), &StageLabel::Pending, Some(&pending))
                .expect("get"),
            None
        );

        store
            .put_pending_secret(&secret_id(), &pending, r#"{"v":2}"#)
            .expect("put");
        assert_eq!(
            store
                .get_secret_string(&secret_id(), &StageLabel::Pending, Some(&pending))
                .expect("get"),
            Some(r#"{"v":2}"#.to_string())
        );
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn token_lookup_requires_matching_stage() {
        let (store, current) = seeded();
        assert_eq!(
            store
                .get_secret_string(&secret_id(), &StageLabel::Pending, Some(&current))
                .expect("get"),
            None
        );
    }

    #[test]
    fn put_pending_is_idempotent_and_never_overwrites() {
        let (store, _) = seeded();
        let pending = store.begin_rotation(&secret_id()).expect("begin");

        store
            .put_pending_secret(&secret_id(), &pending, "a")
            .expect("first put");
        store
            .put_pending_secret(&secret_id(), &pending, "a")
            .expect("same value again");
        assert_eq!(store.write_count(), 1);

        let err = store
            .put_pending_secret(&secret_id(), &pending, "b")
            .expect_err("different value");
        assert!(matches!(err, RotationError::Store { .. }));
    }

    #[test]
    fn promotion_moves_current_and_previous() {
        let (store, first) = seeded();
        let second = store.begin_rotation(&secret_id()).expect("begin");
        store
            .put_pending_secret(&secret_id(), &second, "two")
            .expect("put");

        store
            .promote_to_current(&secret_id(), &second, Some(&first))
            .expect("promote");

        let description = store.describe_secret(&secret_id()).expect("describe");
        assert_eq!(
            description.stages_for(&second),
            Some(&BTreeSet::from([StageLabel::Current]))
        );
        assert_eq!(
            description.stages_for(&first),
            Some(&BTreeSet::from([StageLabel::Previous]))
        );
        assert_eq!(current_holders(&store), 1);
    }

    #[test]
    fn promotion_rejects_stale_source() {
        let (store, _) = seeded();
        let second = store.begin_rotation(&secret_id()).expect("begin");
        let bogus = VersionToken::new("bogus");

        let err = store
            .promote_to_current(&secret_id(), &second, Some(&bogus))
            .expect_err("stale source");
        assert!(matches!(err, RotationError::Store { .. }));
        assert_eq!(current_holders(&store), 1);
    }

    #[test]
    fn previous_label_moves_on_second_promotion() {
        let (store, first) = seeded();
        let second = store.begin_rotation(&secret_id()).expect("begin");
        store
            .promote_to_current(&secret_id(), &second, Some(&first))
            .expect("promote");
        let third = store.begin_rotation(&secret_id()).expect("begin");
        store
            .promote_to_current(&secret_id(), &third, Some(&second))
            .expect("promote");

        let description = store.describe_secret(&secret_id()).expect("describe");
        assert!(description.stages_for(&first).expect("first").is_empty());
        assert_eq!(
            description.version_with(&StageLabel::Previous),
            Some(&second)
        );
    }

    #[test]
    fn random_password_rejects_empty_alphabet() {
        let store = InMemorySecretStore::new();
        let everything: String = (b'!'..=b'~').map(char::from).collect();
        assert!(store.random_password(&everything, 32).is_err());
    }

    #[test]
    fn snapshot_round_trip() {
        let (store, token) = seeded();
        let json = serde_json::to_string(&store.snapshot()).expect("serialize");
        let restored =
            InMemorySecretStore::from_snapshot(serde_json::from_str(&json).expect("deserialize"));
        assert_eq!(
            restored
                .describe_secret(&secret_id())
                .expect("describe")
                .version_with(&StageLabel::Current),
            Some(&token)
        );
    }

    #[test]
    fn debug_redacts_payloads() {
        let (store, _) = seeded();
        let snapshot = store.snapshot();
        let debug = format!("{snapshot:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains(r#""v":1"#));
    }

    proptest! {
        #[test]
        fn random_password_avoids_excluded(exclude in "[!-~]{0,40}", length in 8usize..=128) {
            let store = InMemorySecretStore::new();
            prop_assume!((b'!'..=b'~').any(|b| !exclude.contains(char::from(b))));
            let password = store.random_password(&exclude, length).expect("password");
            prop_assert_eq!(password.expose().len(), length);
            prop_assert!(password.expose().chars().all(|c| !exclude.contains(c)));
        }
    }
}

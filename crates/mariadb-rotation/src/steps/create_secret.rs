//! createSecret: generate the PENDING credential.

use tracing::info;

use crate::coordinator::RotationCoordinator;
use crate::database::DatabaseConnector;
use crate::error::Result;
use crate::identity::alternate_username;
use crate::store::SecretStoreClient;
use crate::topology::InstanceInventory;
use crate::types::{SecretId, StageLabel, StepOutcome, VersionToken};

impl<S, C, I> RotationCoordinator<S, C, I>
where
    S: SecretStoreClient,
    C: DatabaseConnector,
    I: InstanceInventory,
{
    /// Stores a copy of CURRENT with the alternate user and a fresh password
    /// as the PENDING version at `token`, unless one is already there.
    pub(crate) fn create_secret(
        &self,
        secret_id: &SecretId,
        token: &VersionToken,
    ) -> Result<StepOutcome> {
        let current = self.require_credential(secret_id, &StageLabel::Current, None)?;

        if self
            .fetch_credential(secret_id, &StageLabel::Pending, Some(token))?
            .is_some()
        {
            info!(version = %token, "createSecret: successfully retrieved secret");
            return Ok(StepOutcome::AlreadyCreated);
        }

        // Resolve before generating anything so an over-long name writes nothing
        let username = alternate_username(&current.username)?;
        let password = self
            .store
            .random_password(&self.config.exclude_characters, self.config.password_length)?;
        let pending = current.with_identity(username, password);

        self.store
            .put_pending_secret(secret_id, token, &pending.to_secret_string()?)?;
        info!(
            version = %token,
            user = %pending.username,
            "createSecret: successfully put secret"
        );
        Ok(StepOutcome::Created)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use crate::config::RotationConfig;
    use crate::coordinator::RotationCoordinator;
    use crate::credential::{CredentialRecord, Password};
    use crate::error::{Result, RotationError};
    use crate::memory_db::InMemoryDatabase;
    use crate::store::{InMemorySecretStore, SecretStoreClient};
    use crate::topology::StaticInventory;
    use crate::types::{
        RotationStep, SecretDescription, SecretId, StageLabel, StepOutcome, VersionToken,
    };

    /// Counts password generation requests on top of an in-memory store.
    struct CountingStore<'a> {
        inner: &'a InMemorySecretStore,
        generated: Cell<usize>,
    }

    impl<'a> CountingStore<'a> {
        fn new(inner: &'a InMemorySecretStore) -> Self {
            Self {
                inner,
                generated: Cell::new(0),
            }
        }
    }

    impl SecretStoreClient for CountingStore<'_> {
        fn describe_secret(&self, secret_id: &SecretId) -> Result<SecretDescription> {
            self.inner.describe_secret(secret_id)
        }

        fn get_secret_string(
            &self,
            secret_id: &SecretId,
            stage: &StageLabel,
            token: Option<&VersionToken>,
        ) -> Result<Option<String>> {
            self.inner.get_secret_string(secret_id, stage, token)
        }

        fn put_pending_secret(
            &self,
            secret_id: &SecretId,
            token: &VersionToken,
            secret_string: &str,
        ) -> Result<()> {
            self.inner.put_pending_secret(secret_id, token, secret_string)
        }

        fn promote_to_current(
            &self,
            secret_id: &SecretId,
            token: &VersionToken,
            from: Option<&VersionToken>,
        ) -> Result<()> {
            self.inner.promote_to_current(secret_id, token, from)
        }

        fn random_password(&self, exclude_characters: &str, length: usize) -> Result<Password> {
            self.generated.set(self.generated.get() + 1);
            self.inner.random_password(exclude_characters, length)
        }
    }

    fn id() -> SecretId {
        SecretId::new("app/db").expect("valid id")
    }

    fn store_with_user(username: &str) -> (InMemorySecretStore, VersionToken) {
        let store = InMemorySecretStore::new();
        store
            .create_secret(
                &id(),
                &format!(
                    r#"{{"engine":"mariadb","host":"db1","username":"{username}","password":"old","masterarn":"master"}}"#
                ),
            )
            .expect("create");
        let token = store.begin_rotation(&id()).expect("begin");
        (store, token)
    }

    fn pending(store: &InMemorySecretStore, token: &VersionToken) -> Option<CredentialRecord> {
        store
            .get_secret_string(&id(), &StageLabel::Pending, Some(token))
            .expect("get")
            .map(|payload| CredentialRecord::parse(&payload).expect("valid payload"))
    }

    fn coordinator(
        store: &InMemorySecretStore,
    ) -> RotationCoordinator<&InMemorySecretStore, InMemoryDatabase, StaticInventory> {
        RotationCoordinator::new(
            store,
            InMemoryDatabase::new(),
            StaticInventory::new(),
            RotationConfig::default(),
        )
    }

    #[test]
    fn creates_clone_identity_with_fresh_password() {
        let (store, token) = store_with_user("app_user");
        let outcome = coordinator(&store)
            .run_step(&id(), &token, RotationStep::CreateSecret)
            .expect("create");
        assert_eq!(outcome, StepOutcome::Created);

        let record = pending(&store, &token).expect("pending written");
        assert_eq!(record.username, "app_user_clone");
        assert_ne!(record.password.expose(), "old");
        assert!(
            record
                .password
                .expose()
                .chars()
                .all(|c| !"/@\"'\\".contains(c))
        );
        assert_eq!(record.masterarn.as_deref(), Some("master"));
    }

    #[test]
    fn strips_suffix_from_clone_identity() {
        let (store, token) = store_with_user("app_user_clone");
        coordinator(&store)
            .run_step(&id(), &token, RotationStep::CreateSecret)
            .expect("create");
        assert_eq!(
            pending(&store, &token).expect("pending").username,
            "app_user"
        );
    }

    #[test]
    fn rerun_writes_nothing() {
        let (store, token) = store_with_user("app_user");
        let coordinator = coordinator(&store);
        coordinator
            .run_step(&id(), &token, RotationStep::CreateSecret)
            .expect("create");
        let first = pending(&store, &token).expect("pending");
        let writes = store.write_count();

        let outcome = coordinator
            .run_step(&id(), &token, RotationStep::CreateSecret)
            .expect("rerun");
        assert_eq!(outcome, StepOutcome::AlreadyCreated);
        assert_eq!(store.write_count(), writes);
        assert_eq!(pending(&store, &token).expect("pending"), first);
    }

    #[test]
    fn too_long_username_generates_and_writes_nothing() {
        let (store, token) = store_with_user(&"u".repeat(75));
        let counting = CountingStore::new(&store);
        let result = RotationCoordinator::new(
            &counting,
            InMemoryDatabase::new(),
            StaticInventory::new(),
            RotationConfig::default(),
        )
        .run_step(&id(), &token, RotationStep::CreateSecret);

        assert!(matches!(result, Err(RotationError::UsernameTooLong { .. })));
        assert_eq!(counting.generated.get(), 0);
        assert_eq!(store.write_count(), 0);
        assert!(pending(&store, &token).is_none());
    }

    #[test]
    fn existing_pending_skips_generation() {
        let (store, token) = store_with_user("app_user");
        coordinator(&store)
            .run_step(&id(), &token, RotationStep::CreateSecret)
            .expect("create");

        let counting = CountingStore::new(&store);
        let outcome = RotationCoordinator::new(
            &counting,
            InMemoryDatabase::new(),
            StaticInventory::new(),
            RotationConfig::default(),
        )
        .run_step(&id(), &token, RotationStep::CreateSecret)
        .expect("rerun");

        assert_eq!(outcome, StepOutcome::AlreadyCreated);
        assert_eq!(counting.generated.get(), 0);
    }

    #[test]
    fn password_length_comes_from_config() {
        let (store, token) = store_with_user("app_user");
        let config = RotationConfig::from_toml("password_length = 48").expect("config");
        RotationCoordinator::new(&store, InMemoryDatabase::new(), StaticInventory::new(), config)
            .run_step(&id(), &token, RotationStep::CreateSecret)
            .expect("create");

        let record = pending(&store, &token).expect("pending");
        assert_eq!(record.password.expose().chars().count(), 48);
    }

    #[test]
    fn new_attempt_leaves_abandoned_payload_alone() {
        let (store, first) = store_with_user("app_user");
        let coordinator = coordinator(&store);
        coordinator
            .run_step(&id(), &first, RotationStep::CreateSecret)
            .expect("first attempt");
        let payload_at = |token: &VersionToken| {
            store.snapshot().secrets[&id()].versions[token]
                .secret_string
                .clone()
        };
        let abandoned = payload_at(&first).expect("first payload");

        let second = store.begin_rotation(&id()).expect("begin again");
        let outcome = coordinator
            .run_step(&id(), &second, RotationStep::CreateSecret)
            .expect("second attempt");
        assert_eq!(outcome, StepOutcome::Created);

        assert_eq!(payload_at(&first).as_deref(), Some(abandoned.as_str()));
        assert_ne!(payload_at(&second), Some(abandoned));

        let stale = coordinator.run_step(&id(), &first, RotationStep::CreateSecret);
        assert!(matches!(stale, Err(RotationError::StageMismatch { .. })));
    }

    #[test]
    fn malformed_current_secret_is_rejected() {
        let store = InMemorySecretStore::new();
        store
            .create_secret(&id(), r#"{"engine":"postgres","host":"h","username":"u","password":"p"}"#)
            .expect("create");
        let token = store.begin_rotation(&id()).expect("begin");

        let result = coordinator(&store).run_step(&id(), &token, RotationStep::CreateSecret);
        assert!(matches!(result, Err(RotationError::MalformedSecret { .. })));
        assert_eq!(store.write_count(), 0);
    }
}

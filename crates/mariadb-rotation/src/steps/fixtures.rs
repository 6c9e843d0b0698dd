//! Shared setup for step tests.

use crate::config::RotationConfig;
use crate::coordinator::RotationCoordinator;
use crate::credential::CredentialRecord;
use crate::error::Result;
use crate::memory_db::InMemoryDatabase;
use crate::store::{InMemorySecretStore, SecretStoreClient};
use crate::topology::StaticInventory;
use crate::types::{RotationStep, SecretId, StageLabel, StepOutcome, VersionToken};

pub(crate) const MASTER_HOST: &str = "db1.abc.us-east-1.rds.amazonaws.com";
pub(crate) const APP_GRANTS: [&str; 2] = [
    "GRANT USAGE ON *.*",
    "GRANT SELECT, INSERT ON `orders`.*",
];

pub(crate) fn app_id() -> SecretId {
    SecretId::new("app/db").expect("valid id")
}

pub(crate) fn master_id() -> SecretId {
    SecretId::new("app/master").expect("valid id")
}

pub(crate) struct Fixture {
    pub(crate) store: InMemorySecretStore,
    pub(crate) db: InMemoryDatabase,
    pub(crate) inventory: StaticInventory,
    pub(crate) config: RotationConfig,
    pub(crate) token: VersionToken,
}

impl Fixture {
    /// CURRENT is `app_user` on the master host.
    pub(crate) fn new() -> Self {
        Self::on_host(MASTER_HOST, StaticInventory::new())
    }

    /// CURRENT is `app_user` on `host`, which may differ from the master host.
    pub(crate) fn on_host(host: &str, inventory: StaticInventory) -> Self {
        let store = InMemorySecretStore::new();
        store
            .create_secret(
                &master_id(),
                &format!(
                    r#"{{"engine":"mariadb","host":"{MASTER_HOST}","username":"admin","password":"root-pw"}}"#
                ),
            )
            .expect("create master");
        store
            .create_secret(
                &app_id(),
                &format!(
                    r#"{{"engine":"mariadb","host":"{host}","username":"app_user","password":"app-pw","dbname":"orders","masterarn":"app/master"}}"#
                ),
            )
            .expect("create app");
        let token = store.begin_rotation(&app_id()).expect("begin");

        let db = InMemoryDatabase::new();
        db.add_admin(MASTER_HOST, "admin", "root-pw");
        db.add_user(MASTER_HOST, "app_user", "app-pw", &APP_GRANTS);
        if host != MASTER_HOST {
            db.add_user(host, "app_user", "app-pw", &APP_GRANTS);
        }

        Self {
            store,
            db,
            inventory,
            config: RotationConfig::default(),
            token,
        }
    }

    pub(crate) fn coordinator(
        &self,
    ) -> RotationCoordinator<&InMemorySecretStore, &InMemoryDatabase, &StaticInventory> {
        RotationCoordinator::new(
            &self.store,
            &self.db,
            &self.inventory,
            self.config.clone(),
        )
    }

    pub(crate) fn run(&self, step: RotationStep) -> Result<StepOutcome> {
        self.coordinator().run_step(&app_id(), &self.token, step)
    }

    pub(crate) fn current(&self) -> CredentialRecord {
        let payload = self
            .store
            .get_secret_string(&app_id(), &StageLabel::Current, None)
            .expect("get")
            .expect("current exists");
        CredentialRecord::parse(&payload).expect("valid current")
    }

    pub(crate) fn pending(&self) -> CredentialRecord {
        let payload = self
            .store
            .get_secret_string(&app_id(), &StageLabel::Pending, Some(&self.token))
            .expect("get")
            .expect("pending exists");
        CredentialRecord::parse(&payload).expect("valid pending")
    }

    /// Writes a PENDING version derived from CURRENT by `edit`.
    pub(crate) fn write_pending(&self, edit: impl FnOnce(&mut CredentialRecord)) {
        let mut record = self.current();
        record.username = "app_user_clone".to_string();
        edit(&mut record);
        self.store
            .put_pending_secret(
                &app_id(),
                &self.token,
                &record.to_secret_string().expect("serialize"),
            )
            .expect("put pending");
    }

    pub(crate) fn assert_sessions_released(&self) {
        let stats = self.db.stats();
        assert_eq!(stats.opened, stats.closed, "leaked session: {stats:?}");
    }
}

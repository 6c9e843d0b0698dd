//! # MariaDB Rotation
//!
//! Rotates the credential held in a MariaDB secret by alternating between two
//! database users, `name` and `name_clone`. While one is live, the other gets
//! a fresh password and the live user's grants, so applications holding the
//! old credential keep working until the new one is promoted.
//!
//! A rotation runs as four externally triggered steps:
//!
//! 1. `createSecret` stores the alternate user with a new password as PENDING
//! 2. `setSecret` grants that user the same privileges through the master credential
//! 3. `testSecret` logs in with the PENDING credential
//! 4. `finishSecret` moves CURRENT onto the new version
//!
//! Every step can be re-run safely.
//!
//! ## Example
//!
//! ```rust
//! use mariadb_rotation::{
//!     InMemoryDatabase, InMemorySecretStore, RotationConfig, RotationCoordinator,
//!     RotationStep, SecretId, StaticInventory, StepOutcome,
//! };
//!
//! let store = InMemorySecretStore::new();
//! let id = SecretId::new("app/db").expect("valid id");
//! store
//!     .create_secret(
//!         &id,
//!         r#"{"engine":"mariadb","host":"db1","username":"app","password":"pw"}"#,
//!     )
//!     .expect("create");
//! let token = store.begin_rotation(&id).expect("begin");
//!
//! let coordinator = RotationCoordinator::new(
//!     &store,
//!     InMemoryDatabase::new(),
//!     StaticInventory::new(),
//!     RotationConfig::default(),
//! );
//! let outcome = coordinator
//!     .run_step(&id, &token, RotationStep::CreateSecret)
//!     .expect("create step");
//! assert_eq!(outcome, StepOutcome::Created);
//! ```
//!
//! ## Security Considerations
//!
//! - Passwords are zeroized on drop and redacted from `Debug` output
//! - Password comparison is constant-time
//! - The master credential is only used against the secret's own host or a
//!   confirmed read replica of the master host

pub mod config;
pub mod coordinator;
pub mod credential;
pub mod database;
pub mod error;
pub mod grants;
pub mod identity;
pub mod memory_db;
pub mod store;
pub mod topology;
pub mod types;

mod steps;

// Re-export commonly used types
pub use error::{Result, RotationError};
pub use types::{
    RotationRequest, RotationStep, SecretDescription, SecretId, StageLabel, StepOutcome,
    VersionToken,
};

pub use config::RotationConfig;

pub use coordinator::RotationCoordinator;

pub use credential::{CredentialRecord, Password};

pub use database::{
    ConnectError, ConnectParams, DatabaseConnector, DatabaseError, DatabaseSession, ScopedSession,
};

pub use grants::{GrantStatement, GrantSynchronizer};

pub use identity::{AlternateIdentityPair, alternate_username};

pub use memory_db::{DatabaseSnapshot, InMemoryDatabase, SessionStats};

pub use store::{InMemorySecretStore, SecretStoreClient, StoreSnapshot};

pub use topology::{InstanceInventory, ReplicaTopologyChecker, StaticInventory};

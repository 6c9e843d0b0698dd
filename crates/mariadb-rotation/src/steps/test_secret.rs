//! testSecret: prove the PENDING credential logs in and can run a query.

use tracing::info;

use crate::coordinator::RotationCoordinator;
use crate::database::{DatabaseConnector, DatabaseSession};
use crate::error::{Result, RotationError};
use crate::store::SecretStoreClient;
use crate::topology::InstanceInventory;
use crate::types::{SecretId, StageLabel, StepOutcome, VersionToken};

impl<S, C, I> RotationCoordinator<S, C, I>
where
    S: SecretStoreClient,
    C: DatabaseConnector,
    I: InstanceInventory,
{
    pub(crate) fn test_secret(
        &self,
        secret_id: &SecretId,
        token: &VersionToken,
    ) -> Result<StepOutcome> {
        let pending = self.require_credential(secret_id, &StageLabel::Pending, Some(token))?;

        let mut session =
            self.login(&pending)
                .ok_or_else(|| RotationError::PendingCredentialInvalid {
                    secret_id: secret_id.to_string(),
                })?;

        session.query(&self.config.probe_statement, &[])?;
        session.commit()?;
        session.close();

        info!(
            user = %pending.username,
            "testSecret: successfully signed into MariaDB DB with AWSPENDING secret"
        );
        Ok(StepOutcome::Tested)
    }
}

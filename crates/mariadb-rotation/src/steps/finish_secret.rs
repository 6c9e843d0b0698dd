//! finishSecret: move CURRENT onto the rotated version.

use tracing::info;

use crate::coordinator::RotationCoordinator;
use crate::database::DatabaseConnector;
use crate::error::Result;
use crate::store::SecretStoreClient;
use crate::topology::InstanceInventory;
use crate::types::{SecretId, StageLabel, StepOutcome, VersionToken};

impl<S, C, I> RotationCoordinator<S, C, I>
where
    S: SecretStoreClient,
    C: DatabaseConnector,
    I: InstanceInventory,
{
    pub(crate) fn finish_secret(
        &self,
        secret_id: &SecretId,
        token: &VersionToken,
    ) -> Result<StepOutcome> {
        let description = self.store.describe_secret(secret_id)?;
        let current = description.version_with(&StageLabel::Current);

        if current == Some(token) {
            info!(version = %token, "finishSecret: version already marked as AWSCURRENT");
            return Ok(StepOutcome::AlreadyPromoted);
        }

        self.store.promote_to_current(secret_id, token, current)?;
        info!(
            version = %token,
            previous = ?current.map(VersionToken::as_str),
            "finishSecret: successfully set AWSCURRENT stage"
        );
        Ok(StepOutcome::Promoted)
    }
}

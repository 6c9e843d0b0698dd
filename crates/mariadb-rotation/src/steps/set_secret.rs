//! setSecret: make the PENDING credential valid in the database.
//!
//! Before the master credential is used, the step proves that the PENDING
//! user is the alternate of the CURRENT user on the same host, that the
//! CURRENT credential itself still logs in, and that the CURRENT host is the
//! master host or a confirmed read replica of it.

use tracing::info;

use crate::coordinator::RotationCoordinator;
use crate::database::DatabaseConnector;
use crate::error::{Result, RotationError};
use crate::grants::GrantSynchronizer;
use crate::identity::AlternateIdentityPair;
use crate::store::SecretStoreClient;
use crate::topology::InstanceInventory;
use crate::types::{SecretId, StageLabel, StepOutcome, VersionToken};

impl<S, C, I> RotationCoordinator<S, C, I>
where
    S: SecretStoreClient,
    C: DatabaseConnector,
    I: InstanceInventory,
{
    pub(crate) fn set_secret(
        &self,
        secret_id: &SecretId,
        token: &VersionToken,
    ) -> Result<StepOutcome> {
        let current = self.require_credential(secret_id, &StageLabel::Current, None)?;
        let pending = self.require_credential(secret_id, &StageLabel::Pending, Some(token))?;

        if let Some(session) = self.login(&pending) {
            session.close();
            info!("setSecret: AWSPENDING secret is already set as password in database");
            return Ok(StepOutcome::AlreadySet);
        }

        if !AlternateIdentityPair::for_username(&current.username)?
            .is_handover(&current.username, &pending.username)
        {
            return Err(RotationError::IdentityMismatch {
                pending: pending.username.clone(),
                current: current.username.clone(),
            });
        }

        if current.host != pending.host {
            return Err(RotationError::HostMismatch {
                pending: pending.host.clone(),
                current: current.host.clone(),
            });
        }

        // The CURRENT credential must work before it is trusted as the source of grants
        match self.login(&current) {
            Some(session) => session.close(),
            None => {
                return Err(RotationError::CurrentCredentialInvalid {
                    secret_id: secret_id.to_string(),
                });
            }
        }

        let master_id = current.master_secret_id()?;
        let master = self.require_credential(&master_id, &StageLabel::Current, None)?;
        if current.host != master.host
            && !self.topology.is_replica_of(&current.host, &master.host)
        {
            return Err(RotationError::UntrustedHost {
                current_host: current.host.clone(),
                master_host: master.host.clone(),
            });
        }

        let mut session =
            self.login(&master)
                .ok_or_else(|| RotationError::MasterCredentialInvalid {
                    master_arn: master_id.to_string(),
                })?;

        let replicated = GrantSynchronizer::new(&mut *session).replicate(
            &current.username,
            &pending.username,
            &pending.password,
        )?;
        session.close();

        info!(
            user = %pending.username,
            grants = replicated,
            "setSecret: successfully set password in database"
        );
        Ok(StepOutcome::PasswordSet)
    }
}

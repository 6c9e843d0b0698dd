//! The four rotation step handlers and the helpers they share.
//!
//! Every handler checks for its own already-applied effect before touching
//! anything, so the invoker can re-run any step.

mod create_secret;
mod finish_secret;
mod set_secret;
mod test_secret;

#[cfg(test)]
pub(crate) mod fixtures;

use tracing::debug;

use crate::coordinator::RotationCoordinator;
use crate::credential::CredentialRecord;
use crate::database::{ConnectParams, DatabaseConnector, ScopedSession};
use crate::error::{Result, RotationError};
use crate::store::SecretStoreClient;
use crate::topology::InstanceInventory;
use crate::types::{SecretId, StageLabel, VersionToken};

impl<S, C, I> RotationCoordinator<S, C, I>
where
    S: SecretStoreClient,
    C: DatabaseConnector,
    I: InstanceInventory,
{
    /// Fetches and validates the credential at `stage`, or `None` if absent.
    pub(crate) fn fetch_credential(
        &self,
        secret_id: &SecretId,
        stage: &StageLabel,
        token: Option<&VersionToken>,
    ) -> Result<Option<CredentialRecord>> {
        self.store
            .get_secret_string(secret_id, stage, token)?
            .map(|payload| CredentialRecord::parse(&payload))
            .transpose()
    }

    /// Like [`Self::fetch_credential`], but absence is an error.
    pub(crate) fn require_credential(
        &self,
        secret_id: &SecretId,
        stage: &StageLabel,
        token: Option<&VersionToken>,
    ) -> Result<CredentialRecord> {
        self.fetch_credential(secret_id, stage, token)?
            .ok_or_else(|| RotationError::SecretNotFound {
                secret_id: secret_id.to_string(),
                stage: stage.to_string(),
            })
    }

    /// Attempts a login. A failed login is an outcome, not an error.
    pub(crate) fn login(&self, record: &CredentialRecord) -> Option<ScopedSession<C::Session>> {
        let params = ConnectParams::from_record(record, self.config.connect_timeout());
        match self.connector.connect(&params) {
            Ok(session) => Some(ScopedSession::new(session)),
            Err(e) => {
                debug!(
                    host = %record.host,
                    user = %record.username,
                    error = %e,
                    "login attempt failed"
                );
                None
            }
        }
    }
}

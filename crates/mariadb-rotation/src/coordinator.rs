//! The rotation state machine.
//!
//! Each invocation reads the version-to-stage mapping fresh, checks that the
//! request token is the version under rotation, and dispatches to one of the
//! four step handlers.

use tracing::{error, info, info_span, Dispatch};

use crate::config::RotationConfig;
use crate::database::DatabaseConnector;
use crate::error::{Result, RotationError};
use crate::store::SecretStoreClient;
use crate::topology::{InstanceInventory, ReplicaTopologyChecker};
use crate::types::{
    RotationRequest, RotationStep, SecretDescription, SecretId, StageLabel, StepOutcome,
    VersionToken,
};

/// Result of the stage gate that runs before every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StageGate {
    /// The token's version is already CURRENT.
    AlreadyCurrent,
    /// The token's version is PENDING; the step may run.
    Pending,
}

/// Checks the token's stages against the secret's mapping.
pub(crate) fn check_stage(
    description: &SecretDescription,
    secret_id: &SecretId,
    token: &VersionToken,
) -> Result<StageGate> {
    if description.rotation_disabled() {
        return Err(RotationError::RotationNotEnabled {
            secret_id: secret_id.to_string(),
        });
    }

    let stages = description
        .stages_for(token)
        .ok_or_else(|| RotationError::UnknownToken {
            secret_id: secret_id.to_string(),
            token: token.to_string(),
        })?;

    if stages.contains(&StageLabel::Current) {
        return Ok(StageGate::AlreadyCurrent);
    }
    if !stages.contains(&StageLabel::Pending) {
        return Err(RotationError::StageMismatch {
            secret_id: secret_id.to_string(),
            token: token.to_string(),
        });
    }
    Ok(StageGate::Pending)
}

/// Drives one secret through the alternating-user rotation.
///
/// The coordinator holds no state between invocations. Logging goes to the
/// [`Dispatch`] it was built with, never to a process-wide subscriber it
/// installed itself.
pub struct RotationCoordinator<S, C, I> {
    pub(crate) store: S,
    pub(crate) connector: C,
    pub(crate) topology: ReplicaTopologyChecker<I>,
    pub(crate) config: RotationConfig,
    dispatch: Dispatch,
}

impl<S, C, I> RotationCoordinator<S, C, I>
where
    S: SecretStoreClient,
    C: DatabaseConnector,
    I: InstanceInventory,
{
    /// Creates a coordinator that logs to the dispatcher active on the
    /// calling thread.
    pub fn new(store: S, connector: C, inventory: I, config: RotationConfig) -> Self {
        Self {
            store,
            connector,
            topology: ReplicaTopologyChecker::new(inventory),
            config,
            dispatch: tracing::dispatcher::get_default(Dispatch::clone),
        }
    }

    /// Sends this coordinator's logs to `dispatch`.
    #[must_use]
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Runs one rotation step.
    ///
    /// # Errors
    ///
    /// Returns the first failure encountered; nothing is retried internally.
    pub fn rotate(&self, request: &RotationRequest) -> Result<StepOutcome> {
        tracing::dispatcher::with_default(&self.dispatch, || {
            let span = info_span!(
                "rotation",
                secret_id = %request.secret_id,
                step = %request.step,
                endpoint = self
                    .config
                    .secrets_manager_endpoint
                    .as_deref()
                    .unwrap_or("default")
            );
            let _entered = span.enter();

            let result = self.run(request);
            match &result {
                Ok(outcome) => info!(outcome = %outcome, "rotation step finished"),
                Err(e) => error!(code = e.code(), error = %e, "rotation step failed"),
            }
            result
        })
    }

    /// Runs one step for a known step name.
    ///
    /// # Errors
    ///
    /// See [`RotationCoordinator::rotate`].
    pub fn run_step(
        &self,
        secret_id: &SecretId,
        token: &VersionToken,
        step: RotationStep,
    ) -> Result<StepOutcome> {
        self.rotate(&RotationRequest::new(secret_id.clone(), token.clone(), step))
    }

    fn run(&self, request: &RotationRequest) -> Result<StepOutcome> {
        let secret_id = &request.secret_id;
        let token = &request.token;

        let description = self.store.describe_secret(secret_id)?;
        if check_stage(&description, secret_id, token)? == StageGate::AlreadyCurrent {
            info!(version = %token, "secret version already set as AWSCURRENT");
            return Ok(StepOutcome::AlreadyCurrent);
        }

        let step = RotationStep::parse(&request.step).ok_or_else(|| RotationError::InvalidStep {
            secret_id: secret_id.to_string(),
            step: request.step.clone(),
        })?;

        match step {
            RotationStep::CreateSecret => self.create_secret(secret_id, token),
            RotationStep::SetSecret => self.set_secret(secret_id, token),
            RotationStep::TestSecret => self.test_secret(secret_id, token),
            RotationStep::FinishSecret => self.finish_secret(secret_id, token),
        }
    }
}

//! Command implementations.

use std::fs;
use std::io::Write;
use std::path::Path;

use mariadb_rotation::{
    CredentialRecord, InMemoryDatabase, InMemorySecretStore, RotationConfig,
    RotationCoordinator, RotationRequest, RotationStep, SecretId, StaticInventory, VersionToken,
    alternate_username,
};
use tracing::info;

use crate::cli::{Commands, RotateArgs, StepArgs};
use crate::error::{CliError, Result};
use crate::output::{AlternateReport, OutputFormat, PayloadReport, RotationReport, StepReport};
use crate::state::{LiveState, LocalState};

/// Loads the rotation configuration: file if given, then environment.
///
/// # Errors
///
/// Returns an error if the file is unreadable or any value is invalid.
pub fn load_config(path: Option<&Path>) -> Result<RotationConfig> {
    let base = match path {
        Some(path) => RotationConfig::from_file(path)?,
        None => RotationConfig::default(),
    };
    base.with_env_overrides(|key| std::env::var(key).ok())
        .map_err(CliError::from)
}

/// Executes one subcommand.
///
/// # Errors
///
/// Returns the first failure; state changes made before it are persisted.
pub fn execute<W: Write>(
    out: &mut W,
    format: &OutputFormat,
    config: RotationConfig,
    command: &Commands,
) -> Result<()> {
    match command {
        Commands::Alternate { username } => {
            let report = AlternateReport {
                alternate: alternate_username(username)?,
                username: username.clone(),
            };
            format.write(out, &report)
        }
        Commands::Validate { file } => {
            let content = fs::read_to_string(file).map_err(|source| CliError::File {
                path: file.clone(),
                source,
            })?;
            let record = CredentialRecord::parse(&content)?;
            format.write(out, &PayloadReport::from(&record))
        }
        Commands::Step(args) => step(out, format, config, args),
        Commands::Rotate(args) => rotate(out, format, config, args),
    }
}

type LocalCoordinator<'a> =
    RotationCoordinator<&'a InMemorySecretStore, &'a InMemoryDatabase, &'a StaticInventory>;

fn coordinator(live: &LiveState, config: RotationConfig) -> LocalCoordinator<'_> {
    RotationCoordinator::new(&live.store, &live.database, &live.inventory, config)
}

/// Runs `work` against the state at `path` and saves the state whatever the outcome.
fn with_state<T>(path: &Path, work: impl FnOnce(&LiveState) -> Result<T>) -> Result<T> {
    let live = LocalState::load(path)?.into_live();
    let result = work(&live);
    live.snapshot().save(path)?;
    result
}

fn step<W: Write>(
    out: &mut W,
    format: &OutputFormat,
    config: RotationConfig,
    args: &StepArgs,
) -> Result<()> {
    let request = RotationRequest {
        secret_id: SecretId::new(args.secret_id.as_str())?,
        token: VersionToken::new(args.token.as_str()),
        step: args.step.clone(),
    };

    let outcome = with_state(&args.state, |live| {
        Ok(coordinator(live, config).rotate(&request)?)
    })?;

    format.write(
        out,
        &StepReport::new(&args.secret_id, &args.token, &args.step, outcome),
    )
}

fn rotate<W: Write>(
    out: &mut W,
    format: &OutputFormat,
    config: RotationConfig,
    args: &RotateArgs,
) -> Result<()> {
    let secret_id = SecretId::new(args.secret_id.as_str())?;

    let report = with_state(&args.state, |live| {
        let token = live.store.begin_rotation(&secret_id)?;
        info!(secret_id = %secret_id, version = %token, "rotation started");

        let coordinator = coordinator(live, config);
        let mut steps = Vec::with_capacity(RotationStep::ALL.len());
        for step in RotationStep::ALL {
            let outcome = coordinator.run_step(&secret_id, &token, step)?;
            steps.push(StepReport::new(
                secret_id.as_str(),
                token.as_str(),
                step.as_str(),
                outcome,
            ));
        }

        Ok(RotationReport {
            secret_id: secret_id.to_string(),
            token: token.to_string(),
            steps,
        })
    })?;

    format.write(out, &report)
}

//! # mariadb-rotation-cli
//!
//! The `mariadb-rotate` command-line tool.
//!
//! Provides commands for:
//! - Resolving the alternate identity of a database user
//! - Validating a secret payload
//! - Running single rotation steps or a whole rotation
//!
//! # Architecture
//!
//! Rotations run against a local JSON state file holding a simulated secret
//! store, database servers and instance inventory. Each command loads the
//! file, drives a [`mariadb_rotation::RotationCoordinator`] over it and writes
//! the resulting state back.
//!
//! ```text
//! ┌────────────────┐   load / save   ┌──────────────┐
//! │ mariadb-rotate │◄───────────────►│  state.json  │
//! └────────────────┘                 └──────────────┘
//! ```

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;
pub mod state;

pub use cli::{Cli, Commands, Format, RotateArgs, StepArgs};
pub use error::CliError;
pub use output::OutputFormat;
pub use state::LocalState;

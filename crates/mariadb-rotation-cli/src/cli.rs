//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Alternating-user credential rotation for MariaDB secrets.
#[derive(Parser, Debug, Clone)]
#[command(name = "mariadb-rotate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// TOML configuration file.
    #[arg(short, long, env = "ROTATION_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Text)]
    pub format: Format,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, env = "ROTATION_LOG_JSON")]
    pub log_json: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// Human-readable text.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Print the alternate identity of a database user.
    Alternate {
        /// Current database user name.
        username: String,
    },

    /// Validate a secret payload file.
    Validate {
        /// JSON file holding the secret payload.
        file: PathBuf,
    },

    /// Run a single rotation step against a state file.
    Step(StepArgs),

    /// Begin a rotation and run all four steps.
    Rotate(RotateArgs),
}

/// Arguments for the step command.
#[derive(Parser, Debug, Clone)]
pub struct StepArgs {
    /// Local state file (secret store, servers and inventory).
    #[arg(short, long)]
    pub state: PathBuf,

    /// Secret to rotate.
    #[arg(long)]
    pub secret_id: String,

    /// Token of the version under rotation.
    #[arg(long)]
    pub token: String,

    /// Step name, e.g. `createSecret`.
    #[arg(long)]
    pub step: String,
}

/// Arguments for the rotate command.
#[derive(Parser, Debug, Clone)]
pub struct RotateArgs {
    /// Local state file (secret store, servers and inventory).
    #[arg(short, long)]
    pub state: PathBuf,

    /// Secret to rotate.
    #[arg(long)]
    pub secret_id: String,
}

//! `mariadb-rotate` binary entrypoint.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use mariadb_rotation_cli::cli::Cli;
use mariadb_rotation_cli::commands;
use mariadb_rotation_cli::output::OutputFormat;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), mariadb_rotation_cli::CliError> {
    let config = commands::load_config(cli.config.as_deref())?;
    let format = OutputFormat::new(cli.format);
    let mut stdout = io::stdout().lock();
    commands::execute(&mut stdout, &format, config, &cli.command)
}

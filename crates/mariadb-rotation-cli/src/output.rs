//! Output formatting for CLI commands.
//!
//! Supports text (human-readable) and JSON output formats.

use std::io::Write;

use mariadb_rotation::{CredentialRecord, StepOutcome};
use serde::Serialize;

use crate::cli::Format;
use crate::error::{CliError, Result};

/// Output formatter that handles both text and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Write a value in the selected format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<()>
    where
        W: Write,
        T: Serialize + TextDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Text => value.write_text(writer)?,
        }
        Ok(())
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Text)
    }
}

/// Trait for types that can be displayed as plain text.
pub trait TextDisplay {
    /// Write the value as human-readable text.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_text<W: Write>(&self, writer: &mut W) -> Result<()>;
}

/// Result of `alternate`.
#[derive(Debug, Clone, Serialize)]
pub struct AlternateReport {
    /// Name given on the command line.
    pub username: String,
    /// The other half of the pair.
    pub alternate: String,
}

impl TextDisplay for AlternateReport {
    fn write_text<W: Write>(&self, writer: &mut W) -> Result<()> {
        writeln!(writer, "{}", self.alternate)?;
        Ok(())
    }
}

/// Result of `validate`, with the password withheld.
#[derive(Debug, Clone, Serialize)]
pub struct PayloadReport {
    /// Engine name.
    pub engine: String,
    /// Database host.
    pub host: String,
    /// Effective port.
    pub port: u16,
    /// Database user.
    pub username: String,
    /// Default database, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dbname: Option<String>,
    /// Master secret reference, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub masterarn: Option<String>,
    /// Always `[REDACTED]`.
    pub password: &'static str,
    /// Names of keys carried through untouched.
    pub extra_keys: Vec<String>,
}

impl From<&CredentialRecord> for PayloadReport {
    fn from(record: &CredentialRecord) -> Self {
        Self {
            engine: record.engine.clone(),
            host: record.host.clone(),
            port: record.port(),
            username: record.username.clone(),
            dbname: record.dbname.clone(),
            masterarn: record.masterarn.clone(),
            password: "[REDACTED]",
            extra_keys: record.extra.keys().cloned().collect(),
        }
    }
}

impl TextDisplay for PayloadReport {
    fn write_text<W: Write>(&self, writer: &mut W) -> Result<()> {
        writeln!(writer, "Secret payload is valid")?;
        writeln!(writer, "  Engine:     {}", self.engine)?;
        writeln!(writer, "  Host:       {}:{}", self.host, self.port)?;
        writeln!(writer, "  Username:   {}", self.username)?;
        writeln!(writer, "  Password:   {}", self.password)?;
        if let Some(dbname) = &self.dbname {
            writeln!(writer, "  Database:   {dbname}")?;
        }
        if let Some(masterarn) = &self.masterarn {
            writeln!(writer, "  Master:     {masterarn}")?;
        }
        if !self.extra_keys.is_empty() {
            writeln!(writer, "  Extra keys: {}", self.extra_keys.join(", "))?;
        }
        Ok(())
    }
}

/// Result of one step invocation.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    /// Secret rotated.
    pub secret_id: String,
    /// Version token.
    pub token: String,
    /// Step name.
    pub step: String,
    /// What the step did.
    pub outcome: StepOutcome,
    /// Whether the step changed nothing.
    pub noop: bool,
}

impl StepReport {
    /// Builds a report from an outcome.
    #[must_use]
    pub fn new(secret_id: &str, token: &str, step: &str, outcome: StepOutcome) -> Self {
        Self {
            secret_id: secret_id.to_string(),
            token: token.to_string(),
            step: step.to_string(),
            outcome,
            noop: outcome.is_noop(),
        }
    }
}

impl TextDisplay for StepReport {
    fn write_text<W: Write>(&self, writer: &mut W) -> Result<()> {
        writeln!(writer, "{:<13} {}", self.step, self.outcome)?;
        Ok(())
    }
}

/// Result of a full rotation.
#[derive(Debug, Clone, Serialize)]
pub struct RotationReport {
    /// Secret rotated.
    pub secret_id: String,
    /// Token of the version rotated in.
    pub token: String,
    /// Each step in order.
    pub steps: Vec<StepReport>,
}

impl TextDisplay for RotationReport {
    fn write_text<W: Write>(&self, writer: &mut W) -> Result<()> {
        writeln!(writer, "Rotation of {}", self.secret_id)?;
        writeln!(writer, "Version: {}", self.token)?;
        for step in &self.steps {
            step.write_text(writer)?;
        }
        Ok(())
    }
}

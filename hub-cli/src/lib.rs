//! Drift validation command shared by hub services.
//!
//! Methods live in code, so a service binary registers its methods and then
//! hands the registry to [`run_validation`] together with the parsed
//! [`ValidateArgs`]. Exit codes: `0` pass, `1` errors in strict mode, `2` the
//! validator could not run.

#![warn(missing_docs, clippy::pedantic)]

use std::error::Error as _;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgAction, Parser, ValueEnum};
use hub_config::{ConfigError, load_file, resolve_path};
use hub_registry::{
    DriftValidator, MethodRegistry, ValidationMode, ValidationOptions, ValidationReport,
};
use hub_telemetry::{Verbosity, log_report};
use tracing::debug;

/// Exit code when the validator could not run.
pub const EXIT_UNUSABLE: u8 = 2;

/// Report rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One line per finding plus a summary.
    #[default]
    Text,
    /// The full report as JSON.
    Json,
}

/// Flags for the `validate` command.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "validate", about = "Check tool configuration against registered methods")]
pub struct ValidateArgs {
    /// Configuration file (defaults to `$TOOLHUB_CONFIG`, then `config/tools.yaml`).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Fail on any error; orphaned methods become errors.
    #[arg(long, conflicts_with = "warn")]
    pub strict: bool,

    /// Report only; always exit 0 when the validator runs.
    #[arg(long)]
    pub warn: bool,

    /// Skip parameter and classification drift checks.
    #[arg(long = "no-drift")]
    pub no_drift: bool,

    /// Increase log verbosity (repeatable).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

impl ValidateArgs {
    /// Log verbosity implied by `-v`.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_occurrences(self.verbose)
    }

    /// Applies the flags on top of the file settings.
    #[must_use]
    pub fn options(&self, base: ValidationOptions) -> ValidationOptions {
        let mut options = base;
        if self.strict {
            options.mode = ValidationMode::Strict;
        }
        if self.warn {
            options.mode = ValidationMode::Warning;
        }
        if self.no_drift {
            options.drift_detection = false;
        }
        options
    }
}

/// Outcome of one validation command.
#[derive(Debug)]
pub struct ValidationRun {
    /// Report, when the validator ran.
    pub report: Option<ValidationReport>,
    /// Text for stdout (or the error message for stderr when the run failed).
    pub output: String,
    /// Process exit code.
    pub exit_code: u8,
}

/// Loads configuration, validates it against `methods`, and renders the result.
#[must_use]
pub fn run_validation(args: &ValidateArgs, methods: Arc<MethodRegistry>) -> ValidationRun {
    let path = resolve_path(args.config.as_deref());
    debug!(path = %path.display(), "validating configuration");

    let config = match load_file(&path) {
        Ok(config) => config,
        Err(err) => return unusable(&err),
    };
    let tools = match config.tool_registry(methods) {
        Ok(tools) => tools,
        Err(err) => return unusable(&err),
    };

    let options = args.options(config.validation.options());
    let report = DriftValidator::new(&tools, options).validate_with(&config.methods);
    log_report(&report);

    let output = match args.format {
        OutputFormat::Text => render_text(&report),
        OutputFormat::Json => match report.to_json() {
            Ok(json) => json,
            Err(err) => {
                return ValidationRun {
                    report: Some(report),
                    output: format!("error: failed to render report: {err}"),
                    exit_code: EXIT_UNUSABLE,
                };
            }
        },
    };

    let exit_code = u8::from(report.exit_code() != 0);
    ValidationRun {
        report: Some(report),
        output,
        exit_code,
    }
}

/// Human-readable report.
#[must_use]
pub fn render_text(report: &ValidationReport) -> String {
    let mode = match report.mode() {
        ValidationMode::Strict => "strict",
        ValidationMode::Warning => "warning",
    };
    let drift = if report.drift_detection() { "on" } else { "off" };

    let mut out = String::new();
    let _ = writeln!(out, "validation mode: {mode}, drift detection: {drift}");
    let _ = writeln!(
        out,
        "checked {} method(s) and {} tool(s)",
        report.methods_checked(),
        report.tools_checked()
    );
    for finding in report.findings() {
        let _ = writeln!(out, "{finding}");
    }

    let errors = report.errors().count();
    let warnings = report.warnings().count();
    let verdict = if report.exit_code() == 0 { "passed" } else { "FAILED" };
    let _ = writeln!(out, "{verdict}: {errors} error(s), {warnings} warning(s)");
    out
}

fn unusable(err: &ConfigError) -> ValidationRun {
    let mut output = format!("error: {err}");
    let mut source = err.source();
    while let Some(cause) = source {
        let _ = write!(output, "\n  caused by: {cause}");
        source = cause.source();
    }
    ValidationRun {
        report: None,
        output,
        exit_code: EXIT_UNUSABLE,
    }
}

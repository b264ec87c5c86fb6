//! # Validate Subcommand
//!
//! Loads a schema, a document and an optional [`ModelConfig`], validates
//! the document (or one path of it), and prints the state of every path
//! the run visited.
//!
//! Exit codes: 0 when the target is valid, 1 when it is invalid, 2 on an
//! operational error (unreadable file, schema that does not compile, rule
//! that could not produce an outcome).

use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use serde_json::Value;

use reval_model::{Model, ModelConfig, Ref, State};
use reval_schema::Compiler;

use crate::load_document;

/// Arguments for the `reval validate` subcommand.
#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Schema file (JSON or YAML).
    #[arg(long, value_name = "FILE")]
    pub schema: PathBuf,

    /// Document to validate (JSON or YAML).
    #[arg(long, value_name = "FILE")]
    pub data: PathBuf,

    /// Path inside the document to validate.
    #[arg(long, default_value = "/")]
    pub path: String,

    /// Model configuration file (message maps and option defaults).
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Convert values into their declared type.
    #[arg(long)]
    pub coerce_types: bool,

    /// Delete properties rejected by `additionalProperties: false`.
    #[arg(long)]
    pub remove_additional: bool,

    /// Commit only explicitly set references.
    #[arg(long)]
    pub only_dirty: bool,

    /// Print a JSON report instead of text.
    #[arg(long)]
    pub json: bool,
}

/// State of one path in a [`Report`].
#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    /// Canonical path.
    pub path: String,
    /// Committed state.
    #[serde(flatten)]
    pub state: State,
}

impl ReportEntry {
    fn of(reference: &Ref) -> Self {
        Self {
            path: reference.path().to_string(),
            state: reference.state(),
        }
    }
}

/// Outcome of one `reval validate` invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Validated path.
    pub path: String,
    /// Validity of the validated path.
    pub valid: bool,
    /// Earliest failing path at or under the target.
    pub first_error: Option<ReportEntry>,
    /// Every cached path, in path order.
    pub states: Vec<ReportEntry>,
    /// The document after validation side effects.
    pub value: Option<Value>,
}

impl Report {
    /// Collect the report for `target` after a run.
    pub fn collect(model: &Model, target: &Ref, valid: bool) -> Self {
        Self {
            path: target.path().to_string(),
            valid,
            first_error: target.first_error().as_ref().map(ReportEntry::of),
            states: model
                .paths()
                .iter()
                .map(|path| ReportEntry::of(&model.reference(path)))
                .collect(),
            value: model.value(),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.states {
            write!(f, "{:<10} {}", entry.state.status, entry.path)?;
            if let Some(message) = &entry.state.message {
                write!(f, "  {message}")?;
            }
            writeln!(f)?;
        }
        match (&self.first_error, self.valid) {
            (_, true) => writeln!(f, "OK: {}", self.path),
            (Some(first), false) => writeln!(
                f,
                "FAIL: {} (first error at {}: {})",
                self.path,
                first.path,
                first.state.message.as_deref().unwrap_or("invalid")
            ),
            (None, false) => writeln!(f, "FAIL: {}", self.path),
        }
    }
}

/// Execute the validate subcommand.
///
/// Returns exit code: 0 on success, 1 on validation failure.
pub async fn run_validate(args: &ValidateArgs) -> Result<u8> {
    let report = validate(args).await?;
    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to serialize report")?
        );
    } else {
        print!("{report}");
    }
    Ok(if report.valid { 0 } else { 1 })
}

/// Build the model described by `args`, validate it and collect the report.
pub async fn validate(args: &ValidateArgs) -> Result<Report> {
    let schema: Value = load_document(&args.schema)?;
    let data: Value = load_document(&args.data)?;
    let config: ModelConfig = match &args.config {
        Some(path) => load_document(path)?,
        None => ModelConfig::default(),
    };

    let mut options = config.validate_options();
    options.coerce_types |= args.coerce_types;
    options.remove_additional |= args.remove_additional;
    options.only_dirty_refs |= args.only_dirty;

    let model = Model::compile(&Compiler::with_builtins(), &schema, Some(data), config)
        .with_context(|| format!("failed to compile schema {}", args.schema.display()))?;
    tracing::info!(
        schema = %args.schema.display(),
        data = %args.data.display(),
        path = %args.path,
        "validating document"
    );

    let target = model.reference(&args.path);
    let valid = target
        .validate(options)
        .await
        .with_context(|| format!("validation of {} aborted", target.path()))?;
    Ok(Report::collect(&model, &target, valid))
}

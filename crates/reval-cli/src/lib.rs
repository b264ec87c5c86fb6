//! # reval-cli: Command-Line Interface
//!
//! ## Subcommands
//!
//! - `validate`: validate a JSON or YAML document against a schema and
//!   print the state of every visited path
//!
//! ## Crate Policy
//!
//! - Argument parsing lives in `main.rs`; handlers live in modules here.
//! - Handlers delegate to `reval-model`; no validation logic here.

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

pub mod validate;

/// Load a JSON or YAML file, chosen by extension (`.yaml`/`.yml` are YAML).
pub fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    );
    if is_yaml {
        serde_yaml::from_str(&content)
            .with_context(|| format!("invalid YAML in {}", path.display()))
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("invalid JSON in {}", path.display()))
    }
}

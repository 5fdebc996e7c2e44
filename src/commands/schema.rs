//! Command: print the manifest JSON Schema.
use anyhow::{Context as _, Result};

use crate::modules::manifest_schema;

/// Print the manifest schema as pretty JSON to stdout.
///
/// # Errors
///
/// Returns an error if the schema cannot be serialized.
pub fn run() -> Result<()> {
    let json =
        serde_json::to_string_pretty(&manifest_schema()).context("serializing manifest schema")?;
    println!("{json}");
    Ok(())
}

// src/output.rs

//! File-based JSON output for scraped records.
//!
//! Records serialize field-for-field via serde, independent of the
//! storage schema. Writes go to a temp file first, then rename.

use std::path::Path;

use tokio::io::AsyncWriteExt;

use crate::error::Result;
use crate::models::NormalizationOutcome;

/// Serialize outcomes as pretty-printed JSON.
pub fn to_json_string(outcomes: &[NormalizationOutcome]) -> Result<String> {
    Ok(serde_json::to_string_pretty(outcomes)?)
}

/// Write outcomes to a file atomically.
pub async fn write_json(path: impl AsRef<Path>, outcomes: &[NormalizationOutcome]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let bytes = serde_json::to_vec_pretty(outcomes)?;
    let tmp = path.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(&bytes).await?;
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

use anyhow::{Context, Result};
use schemars::JsonSchema;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Deserialize, JsonSchema)]
pub struct WriteFileArgs {
    /// File path, relative to the work directory
    pub path: String,
    /// Full content to write; an existing file is overwritten
    pub content: String,
}

pub fn write_file(path: &Path, content: &str) -> Result<String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(format!("Successfully wrote {} bytes to {}", content.len(), path.display()))
}

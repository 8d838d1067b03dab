use anyhow::{Context, Result};
use schemars::JsonSchema;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Deserialize, JsonSchema)]
pub struct ListDirArgs {
    /// Directory, relative to the work directory. Defaults to the work directory itself.
    #[serde(default)]
    pub path: Option<String>,
}

/// Sorted entry names; directories carry a trailing `/`.
pub fn list_dir(path: &Path) -> Result<Vec<String>> {
    let items = fs::read_dir(path).with_context(|| format!("Error reading directory {}", path.display()))?;
    let mut entries = Vec::new();
    for item in items {
        let item = item?;
        let mut name = item.file_name().to_string_lossy().into_owned();
        if item.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            name.push('/');
        }
        entries.push(name);
    }
    entries.sort();
    Ok(entries)
}

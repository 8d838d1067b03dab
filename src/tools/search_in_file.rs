use anyhow::{Context, Result, bail};
use schemars::JsonSchema;
use serde::Deserialize;
use std::fs;
use std::path::Path;

const MAX_MATCHES: usize = 10_000;
const MAX_FILES: usize = 100;

#[derive(Deserialize, JsonSchema)]
pub struct SearchArgs {
    /// Regular expression to look for
    pub pattern: String,
    /// File or directory to search, relative to the work directory
    #[serde(default)]
    pub path: Option<String>,
    /// Match case exactly (default true)
    #[serde(default)]
    pub case_sensitive: Option<bool>,
}

// Search a file or a directory tree (hidden entries skipped) for `pattern`.
// Hits are reported as `path:line:text`, paths relative to `base`.
pub fn search_in_files(pattern: &str, root: &Path, base: &Path, case_sensitive: Option<bool>) -> Result<String> {
    let regex = regex::RegexBuilder::new(pattern)
        .case_insensitive(case_sensitive == Some(false))
        .build()
        .context("Invalid regex")?;

    let mut hits = Vec::new();
    let mut checked = 0usize;

    for entry in walkdir::WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
    {
        if checked >= MAX_FILES || hits.len() >= MAX_MATCHES {
            break;
        }
        let entry = entry.context("walk error")?;
        if !entry.file_type().is_file() {
            continue;
        }
        // Binary files are skipped, not fatal.
        let Ok(buf) = fs::read_to_string(entry.path()) else {
            continue;
        };
        checked += 1;
        let shown = entry.path().strip_prefix(base).unwrap_or(entry.path());
        for (idx, line) in buf.lines().enumerate() {
            if regex.is_match(line) {
                hits.push(format!("{}:{}:{}", shown.display(), idx + 1, line.trim_end()));
                if hits.len() >= MAX_MATCHES {
                    break;
                }
            }
        }
    }

    if hits.is_empty() {
        bail!("no matches found");
    }
    Ok(format!("Found {} matches in {} files:\n{}", hits.len(), checked, hits.join("\n")))
}

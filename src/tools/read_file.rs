use anyhow::{Context, Result, bail};
use schemars::JsonSchema;
use serde::Deserialize;
use std::fs::{File, metadata};
use std::io::{BufRead, BufReader};
use std::path::Path;

const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024; //10MB
const DEFAULT_MAX_LINES: usize = 200;

#[derive(Deserialize, JsonSchema)]
pub struct ReadFileArgs {
    /// File path, relative to the work directory
    pub path: String,
    /// First line to return (1-based)
    #[serde(default)]
    pub start_line: Option<usize>,
    /// Last line to return (inclusive)
    #[serde(default)]
    pub end_line: Option<usize>,
}

/// Numbered lines `start..=end` of a text file. Without an end, at most
/// 200 lines are returned.
pub fn read_file(path: &Path, start_line: Option<usize>, end_line: Option<usize>) -> Result<String> {
    let meta = metadata(path).with_context(|| format!("Failed to get metadata for {}", path.display()))?;
    if meta.len() > MAX_FILE_SIZE {
        bail!("File too large: {} bytes (max: {} bytes)", meta.len(), MAX_FILE_SIZE);
    }
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;

    let start = start_line.unwrap_or(1).max(1);
    let end = end_line.unwrap_or(start + DEFAULT_MAX_LINES - 1);
    if end < start {
        bail!("Invalid line range {}-{}", start, end);
    }

    let mut lines = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line_num = idx + 1;
        if line_num > end {
            break;
        }
        let line = line.context("Binary or invalid UTF-8 content detected")?;
        if line_num >= start {
            lines.push(format!("{}: {}", line_num, line));
        }
    }

    if lines.is_empty() {
        bail!("No lines found in range {}-{}", start, end);
    }
    Ok(lines.join("\n"))
}

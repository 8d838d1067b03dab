//! Built-in toolkits.
//!
//! File and shell tools are confined to a work directory: relative paths are
//! resolved against it and anything escaping it is rejected.

pub use self::calculator::calculator;
pub use self::list_dir::list_dir;
pub use self::read_file::read_file;
pub use self::run_shell::run_shell;
pub use self::search_in_file::search_in_files;
pub use self::write_file::write_file;

mod calculator;
mod list_dir;
mod read_file;
mod run_shell;
mod search_in_file;
mod write_file;

use crate::function::{Function, Toolkit};
use anyhow::{Result, bail};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Resolve `path` inside `base`, lexically. Absolute paths are accepted only
/// when they already point inside `base`.
pub fn resolve_in(base: &Path, path: &str) -> Result<PathBuf> {
    let requested = Path::new(path);
    let relative = if requested.is_absolute() {
        match requested.strip_prefix(base) {
            Ok(rest) => rest,
            Err(_) => bail!("Path {} is outside the work directory", path),
        }
    } else {
        requested
    };

    let mut resolved = base.to_path_buf();
    let mut depth = 0usize;
    for component in relative.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    bail!("Path {} is outside the work directory", path);
                }
                depth -= 1;
                resolved.pop();
            }
            Component::Normal(part) => {
                depth += 1;
                resolved.push(part);
            }
            Component::RootDir | Component::Prefix(_) => {
                bail!("Path {} is outside the work directory", path)
            }
        }
    }
    Ok(resolved)
}

/// list_dir, read_file, write_file and search_in_files over `work_dir`.
pub fn file_tools(work_dir: impl Into<PathBuf>) -> Toolkit {
    let base = Arc::new(work_dir.into());

    let list_base = base.clone();
    let read_base = base.clone();
    let write_base = base.clone();
    let search_base = base;

    Toolkit::new("file_tools")
        .register(Function::typed(
            "list_dir",
            "List the entries of a directory. Directories end with '/'.",
            move |args: list_dir::ListDirArgs| {
                let dir = resolve_in(&list_base, args.path.as_deref().unwrap_or("."))?;
                let entries = list_dir(&dir)?;
                if entries.is_empty() {
                    return Ok("Directory is empty".to_string());
                }
                Ok(entries.join("\n"))
            },
        ))
        .register(Function::typed(
            "read_file",
            "Read a text file with line numbers, optionally restricted to a line range.",
            move |args: read_file::ReadFileArgs| {
                read_file(&resolve_in(&read_base, &args.path)?, args.start_line, args.end_line)
            },
        ))
        .register(Function::typed(
            "write_file",
            "Write content to a file, creating parent directories as needed.",
            move |args: write_file::WriteFileArgs| write_file(&resolve_in(&write_base, &args.path)?, &args.content),
        ))
        .register(Function::typed(
            "search_in_files",
            "Search a file or directory tree for lines matching a regular expression.",
            move |args: search_in_file::SearchArgs| {
                let root = resolve_in(&search_base, args.path.as_deref().unwrap_or("."))?;
                search_in_files(&args.pattern, &root, &search_base, args.case_sensitive)
            },
        ))
}

/// run_shell inside `work_dir`.
pub fn shell_tools(work_dir: impl Into<PathBuf>) -> Toolkit {
    let base: PathBuf = work_dir.into();
    Toolkit::new("shell_tools").register(Function::typed(
        "run_shell",
        "Run a shell command in the work directory and return its output.",
        move |args: run_shell::RunShellArgs| {
            run_shell(
                &args.command,
                &base,
                Duration::from_secs(run_shell::TIMEOUT_SECONDS),
            )
        },
    ))
}

use anyhow::{Context, Result, anyhow, bail};
use schemars::JsonSchema;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use wait_timeout::ChildExt;

pub const TIMEOUT_SECONDS: u64 = 30;
const DENIED_COMMANDS: &[&str] = &["rm", "dd", "mkfs", ":(", "sudo", "su", "shutdown", "reboot"];

#[derive(Deserialize, JsonSchema)]
pub struct RunShellArgs {
    /// Command line passed to `sh -c`
    pub command: String,
}

fn denied(command: &str) -> Option<&str> {
    command
        .split(|c: char| c == ';' || c == '|' || c == '&' || c == '\n')
        .filter_map(|segment| segment.split_whitespace().next())
        .find(|name| DENIED_COMMANDS.contains(name))
}

// Pipes are read on their own threads so a chatty child never blocks on a
// full pipe while we wait on it.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn collect(reader: JoinHandle<Vec<u8>>) -> Result<String> {
    let bytes = reader.join().map_err(|_| anyhow!("Output reader panicked"))?;
    Ok(String::from_utf8_lossy(&bytes).to_string())
}

/// Run `command` in `work_dir`, returning stdout. A non-zero exit returns
/// stderr as the error.
pub fn run_shell(command: &str, work_dir: &Path, timeout: Duration) -> Result<String> {
    if command.trim().is_empty() {
        bail!("Empty command");
    }
    if let Some(name) = denied(command) {
        bail!("Denied command: {}", name);
    }

    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(work_dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("Failed to spawn")?;
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    match child.wait_timeout(timeout).context("Wait error")? {
        Some(status) => {
            let stdout = collect(stdout)?;
            let stderr = collect(stderr)?;
            if status.success() {
                Ok(stdout)
            } else {
                Err(anyhow!("exit status {}: {}", status.code().unwrap_or(-1), stderr.trim_end()))
            }
        }
        None => {
            // Readers are left detached: a grandchild may still hold the pipes open.
            child.kill().context("Failed to kill")?;
            let _ = child.wait();
            bail!("Command timed out after {} seconds", timeout.as_secs())
        }
    }
}

pub mod commits;
pub mod files;
pub mod typecheck;

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Run a shell command with a timeout, capturing stdout/stderr. Returns
/// `Ok(None)` on timeout so callers can report it distinctly from a
/// non-zero exit.
pub(crate) async fn run_with_timeout(
    dir: &Path,
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> std::io::Result<Option<std::process::Output>> {
    let child = Command::new(program)
        .args(args)
        .current_dir(dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output();

    match tokio::time::timeout(timeout, child).await {
        Ok(result) => result.map(Some),
        Err(_) => Ok(None),
    }
}

/// Parse a shell-style command string into `(program, args)` for
/// subprocess execution. Detected/configured commands here are simple
/// space-separated invocations (`"npm test"`, `"go build ./..."`), not
/// arbitrary shell syntax.
pub(crate) fn split_command(command: &str) -> Option<(String, Vec<String>)> {
    let mut parts = command.split_whitespace();
    let program = parts.next()?.to_string();
    let args = parts.map(str::to_string).collect();
    Some((program, args))
}

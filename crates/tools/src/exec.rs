//! `run_command` and `run_python` (§4.5, §4.6): direct process execution,
//! no shell interpreter, bounded by a wall-clock timeout and an output cap.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::command_policy;

const ALLOWED_ENV_VARS: &[&str] = &["PATH", "HOME", "LANG"];

pub struct ExecOutcome {
    pub output: String,
    pub timed_out: bool,
}

/// Run a whitelisted command (§4.5) with working directory fixed to the
/// agent workspace and a minimal inherited environment.
pub async fn run_command(
    workspace_root: &Path,
    command: &str,
    timeout_secs: u64,
    output_cap_bytes: usize,
) -> Result<ExecOutcome, String> {
    let tokens = command_policy::authorize(command)?;
    let (program, args) = tokens.split_first().expect("authorize guarantees a non-empty token list");
    spawn_and_capture(workspace_root, program, args, timeout_secs, output_cap_bytes).await
}

/// Run `python3 -c <code>` (§4.6); not subject to the command whitelist
/// since the program is fixed, but shares the same sandbox/timeout/cap.
pub async fn run_python(
    workspace_root: &Path,
    code: &str,
    timeout_secs: u64,
    output_cap_bytes: usize,
) -> Result<ExecOutcome, String> {
    spawn_and_capture(workspace_root, "python3", &["-c".to_string(), code.to_string()], timeout_secs, output_cap_bytes).await
}

async fn spawn_and_capture(
    workspace_root: &Path,
    program: &str,
    args: &[String],
    timeout_secs: u64,
    output_cap_bytes: usize,
) -> Result<ExecOutcome, String> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.current_dir(workspace_root);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    cmd.env_clear();
    for var in ALLOWED_ENV_VARS {
        if let Ok(value) = std::env::var(var) {
            cmd.env(var, value);
        }
    }

    let mut child = cmd.spawn().map_err(|e| format!("failed to spawn '{program}': {e}"))?;
    let mut stdout = child.stdout.take().expect("stdout piped");
    let mut stderr = child.stderr.take().expect("stderr piped");

    // Read on their own tasks, not inside the `select!` branch, so a
    // timeout that wins the race doesn't drop whatever was already read —
    // the buffers live in these tasks and are collected after the kill.
    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stdout.read_to_end(&mut buf).await;
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stderr.read_to_end(&mut buf).await;
        buf
    });

    tokio::select! {
        status = child.wait() => {
            let status = status.map_err(|e| format!("failed to wait on '{program}': {e}"))?;
            let out_buf = stdout_task.await.unwrap_or_default();
            let err_buf = stderr_task.await.unwrap_or_default();
            let mut combined = String::from_utf8_lossy(&out_buf).into_owned();
            combined.push_str(&String::from_utf8_lossy(&err_buf));
            combined.push_str(&format!("\n[exit code: {}]", status.code().unwrap_or(-1)));
            Ok(ExecOutcome { output: cap_output(combined, output_cap_bytes), timed_out: false })
        }
        _ = tokio::time::sleep(Duration::from_secs(timeout_secs)) => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            // The pipes close once the process is killed, so these tasks
            // finish promptly with whatever was captured up to the kill.
            let out_buf = stdout_task.await.unwrap_or_default();
            let err_buf = stderr_task.await.unwrap_or_default();
            let mut combined = String::from_utf8_lossy(&out_buf).into_owned();
            combined.push_str(&String::from_utf8_lossy(&err_buf));
            combined.push_str(&format!("\n[timed out after {timeout_secs}s]"));
            Ok(ExecOutcome { output: cap_output(combined, output_cap_bytes), timed_out: true })
        }
    }
}

fn cap_output(mut output: String, cap_bytes: usize) -> String {
    if output.len() > cap_bytes {
        let mut boundary = cap_bytes;
        while boundary > 0 && !output.is_char_boundary(boundary) {
            boundary -= 1;
        }
        output.truncate(boundary);
        output.push_str("\n[output truncated at size cap]");
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn run_command_executes_whitelisted_program() {
        let ws = TempDir::new().unwrap();
        std::fs::write(ws.path().join("a.txt"), "hello\n").unwrap();
        let outcome = run_command(ws.path(), "cat a.txt", 5, 1024 * 1024).await.unwrap();
        assert!(outcome.output.contains("hello"));
        assert!(!outcome.timed_out);
    }

    #[tokio::test]
    async fn run_command_rejects_non_whitelisted_program() {
        let ws = TempDir::new().unwrap();
        let result = run_command(ws.path(), "rm -rf /", 5, 1024).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn run_command_caps_output_size() {
        let ws = TempDir::new().unwrap();
        let huge = "x".repeat(5000);
        std::fs::write(ws.path().join("big.txt"), &huge).unwrap();
        let outcome = run_command(ws.path(), "cat big.txt", 5, 100).await.unwrap();
        assert!(outcome.output.contains("truncated"));
        assert!(outcome.output.len() < 5000);
    }

    #[tokio::test]
    async fn run_python_times_out() {
        let ws = TempDir::new().unwrap();
        let outcome = run_python(ws.path(), "import time; time.sleep(5)", 1, 1024 * 1024).await.unwrap();
        assert!(outcome.timed_out);
    }

    #[tokio::test]
    async fn timeout_captures_partial_output_before_killing() {
        let ws = TempDir::new().unwrap();
        let outcome = run_python(
            ws.path(),
            "import sys, time; print('partial output'); sys.stdout.flush(); time.sleep(5)",
            1,
            1024 * 1024,
        )
        .await
        .unwrap();
        assert!(outcome.timed_out);
        assert!(outcome.output.contains("partial output"));
        assert!(outcome.output.contains("timed out after"));
    }

    #[tokio::test]
    async fn run_python_executes_code() {
        let ws = TempDir::new().unwrap();
        let outcome = run_python(ws.path(), "print('hi from python')", 5, 1024 * 1024).await.unwrap();
        assert!(outcome.output.contains("hi from python"));
    }
}

//! Shell exec tool.
//!
//! Runs one command to completion under a timeout (default 5 minutes, per
//! the kernel's per-tool timeout policy) with cooperative cancellation.
//! Grounded on the teacher's `exec.rs`: same dangerous-env-var blocklist and
//! the same truncating output buffer idiom, but single-shot — the teacher's
//! background-process-session machinery (`ProcessManager`, auto-backgrounding
//! on a yield deadline) has no counterpart here, since tools dispatch
//! synchronously within one turn and there is no `process` tool to poll them.

use std::collections::HashMap;
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

const DEFAULT_TIMEOUT_SECS: u64 = 300;
const MAX_OUTPUT_CHARS: usize = 64 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct ExecRequest {
    pub command: String,
    #[serde(default)]
    pub workdir: Option<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub timeout_sec: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecStatus {
    Exited,
    Killed,
    TimedOut,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecResponse {
    pub status: ExecStatus,
    pub exit_code: Option<i32>,
    pub output: String,
}

fn is_dangerous_env_var(name: &str) -> bool {
    const BLOCKED: &[&str] = &[
        "LD_PRELOAD",
        "LD_LIBRARY_PATH",
        "LD_AUDIT",
        "DYLD_INSERT_LIBRARIES",
        "DYLD_LIBRARY_PATH",
        "DYLD_FRAMEWORK_PATH",
        "PATH",
        "HOME",
        "USER",
        "SHELL",
        "SSH_AUTH_SOCK",
        "SSH_AGENT_PID",
        "BASH_ENV",
        "ENV",
        "CDPATH",
        "IFS",
    ];
    BLOCKED.contains(&name.to_ascii_uppercase().as_str())
}

fn push_truncating(buf: &mut String, text: &str) {
    buf.push_str(text);
    buf.push('\n');
    if buf.len() > MAX_OUTPUT_CHARS {
        let keep = MAX_OUTPUT_CHARS * 3 / 4;
        let mut boundary = buf.len() - keep;
        while boundary < buf.len() && !buf.is_char_boundary(boundary) {
            boundary += 1;
        }
        buf.drain(..boundary);
    }
}

/// Run `req.command` under `sh -c`, merging stdout/stderr into one
/// truncated buffer, honouring both a hard timeout and cooperative
/// cancellation (whichever fires first kills the child).
pub async fn exec(req: ExecRequest, cancel: &CancellationToken) -> Result<ExecResponse, String> {
    for key in req.env.keys() {
        if is_dangerous_env_var(key) {
            return Err(format!(
                "environment variable '{key}' is blocked by security policy"
            ));
        }
    }

    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(&req.command);
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.stdin(Stdio::null());
    if let Some(ref workdir) = req.workdir {
        cmd.current_dir(workdir);
    }
    for (k, v) in &req.env {
        cmd.env(k, v);
    }

    let mut child = cmd.spawn().map_err(|e| format!("failed to spawn: {e}"))?;
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let mut output = String::new();
    let mut stdout_lines = stdout.map(|s| BufReader::new(s).lines());
    let mut stderr_lines = stderr.map(|s| BufReader::new(s).lines());

    let timeout = std::time::Duration::from_secs(req.timeout_sec.unwrap_or(DEFAULT_TIMEOUT_SECS));

    let run = async {
        loop {
            tokio::select! {
                line = async {
                    match stdout_lines.as_mut() {
                        Some(l) => l.next_line().await,
                        None => std::future::pending().await,
                    }
                } => {
                    match line {
                        Ok(Some(l)) => push_truncating(&mut output, &l),
                        _ => stdout_lines = None,
                    }
                }
                line = async {
                    match stderr_lines.as_mut() {
                        Some(l) => l.next_line().await,
                        None => std::future::pending().await,
                    }
                } => {
                    match line {
                        Ok(Some(l)) => push_truncating(&mut output, &l),
                        _ => stderr_lines = None,
                    }
                }
                status = child.wait() => {
                    return status;
                }
            }
        }
    };

    tokio::select! {
        status = run => {
            let status = status.map_err(|e| format!("wait failed: {e}"))?;
            Ok(ExecResponse {
                status: ExecStatus::Exited,
                exit_code: status.code(),
                output,
            })
        }
        _ = tokio::time::sleep(timeout) => {
            let _ = child.kill().await;
            output.push_str("\n[timed out]");
            Ok(ExecResponse {
                status: ExecStatus::TimedOut,
                exit_code: None,
                output,
            })
        }
        _ = cancel.cancelled() => {
            let _ = child.kill().await;
            output.push_str("\n[cancelled]");
            Ok(ExecResponse {
                status: ExecStatus::Killed,
                exit_code: None,
                output,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exec_runs_and_captures_output() {
        let cancel = CancellationToken::new();
        let req = ExecRequest {
            command: "echo hello".into(),
            workdir: None,
            env: HashMap::new(),
            timeout_sec: None,
        };
        let resp = exec(req, &cancel).await.unwrap();
        assert_eq!(resp.status, ExecStatus::Exited);
        assert_eq!(resp.exit_code, Some(0));
        assert!(resp.output.contains("hello"));
    }

    #[tokio::test]
    async fn exec_rejects_dangerous_env_var() {
        let cancel = CancellationToken::new();
        let mut env = HashMap::new();
        env.insert("LD_PRELOAD".to_string(), "evil.so".to_string());
        let req = ExecRequest {
            command: "echo hi".into(),
            workdir: None,
            env,
            timeout_sec: None,
        };
        let result = exec(req, &cancel).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn exec_reports_nonzero_exit_code() {
        let cancel = CancellationToken::new();
        let req = ExecRequest {
            command: "exit 7".into(),
            workdir: None,
            env: HashMap::new(),
            timeout_sec: None,
        };
        let resp = exec(req, &cancel).await.unwrap();
        assert_eq!(resp.exit_code, Some(7));
    }

    #[tokio::test]
    async fn exec_honours_cancellation() {
        let cancel = CancellationToken::new();
        let child_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            let req = ExecRequest {
                command: "sleep 30".into(),
                workdir: None,
                env: HashMap::new(),
                timeout_sec: None,
            };
            exec(req, &child_cancel).await
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        cancel.cancel();
        let resp = handle.await.unwrap().unwrap();
        assert_eq!(resp.status, ExecStatus::Killed);
    }
}

use crate::error::ToolRunnerError;
use crate::tools::context::ToolExecutionContext;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time;

const WORKER_SCRIPT: &str = include_str!("../../assets/tool_worker.js");
const ALLOWED_COMMANDS: [&str; 3] = ["node", "bun", "deno"];

/// Constructor arguments for `ToolRunner`.
pub struct ToolRunnerConfig {
    pub command: String,
    pub env_allowlist: Vec<String>,
    pub timeout_ms: u64,
    pub max_tool_calls_per_case: usize,
}

/// Spawns a fresh worker subprocess per tool invocation, enforcing the
/// timeout/allow-list/network-block policy. Holds the materialized worker
/// script for the lifetime of a run.
pub struct ToolRunner {
    base_args: Vec<String>,
    env_allowlist: Vec<String>,
    timeout: Duration,
    max_tool_calls_per_case: usize,
    cwd: PathBuf,
    worker_script: NamedTempFile,
}

impl ToolRunner {
    pub fn new(config: ToolRunnerConfig, cwd: impl Into<PathBuf>) -> Result<Self, ToolRunnerError> {
        let tokens = shell_words::split(&config.command)
            .map_err(|err| ToolRunnerError::InvalidCommand(format!("{}: {err}", config.command)))?;
        let first = tokens
            .first()
            .ok_or_else(|| ToolRunnerError::InvalidCommand(config.command.clone()))?;
        let basename = Path::new(first)
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(first.as_str());
        if !ALLOWED_COMMANDS.contains(&basename) {
            return Err(ToolRunnerError::CommandNotAllowlisted(config.command.clone()));
        }

        let worker_script = tempfile::Builder::new()
            .prefix("tool_worker")
            .suffix(".js")
            .tempfile()
            .map_err(|err| {
                ToolRunnerError::ToolProcessError(format!("failed to materialize worker script: {err}"))
            })?;
        std::fs::write(worker_script.path(), WORKER_SCRIPT).map_err(|err| {
            ToolRunnerError::ToolProcessError(format!("failed to write worker script: {err}"))
        })?;

        Ok(Self {
            base_args: tokens,
            env_allowlist: config.env_allowlist,
            timeout: Duration::from_millis(config.timeout_ms),
            max_tool_calls_per_case: config.max_tool_calls_per_case,
            cwd: cwd.into(),
            worker_script,
        })
    }

    pub fn max_tool_calls_per_case(&self) -> usize {
        self.max_tool_calls_per_case
    }

    /// Runs one tool handler to completion in a fresh child process.
    pub async fn execute(
        &self,
        tool_name: &str,
        tools_module_path: &str,
        args: Value,
        context: &ToolExecutionContext,
    ) -> Result<Value, ToolRunnerError> {
        let mut argv = self.base_args.clone();
        argv.push(self.worker_script.path().to_string_lossy().into_owned());
        argv.push("--tools-module".to_string());
        argv.push(tools_module_path.to_string());
        argv.push("--tool".to_string());
        argv.push(tool_name.to_string());

        let mut command = Command::new(&argv[0]);
        command
            .args(&argv[1..])
            .current_dir(&self.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .env_clear();
        if let Ok(path) = std::env::var("PATH") {
            command.env("PATH", path);
        }
        command.env("PROMPTMGR_BLOCK_NETWORK", "true");
        for key in &self.env_allowlist {
            if let Ok(value) = std::env::var(key) {
                command.env(key, value);
            }
        }

        let mut child = command
            .spawn()
            .map_err(|err| ToolRunnerError::ToolProcessError(err.to_string()))?;

        let payload = serde_json::json!({ "args": args, "context": context });
        let payload =
            serde_json::to_vec(&payload).map_err(|err| ToolRunnerError::ToolInputError(err.to_string()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&payload)
                .await
                .map_err(|err| ToolRunnerError::ToolInputError(err.to_string()))?;
        }

        let timeout_ms = self.timeout.as_millis() as u64;
        let output = match time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|err| ToolRunnerError::ToolProcessError(err.to_string()))?,
            Err(_) => return Err(ToolRunnerError::ToolTimeout(timeout_ms)),
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if stdout.trim().is_empty() {
            let head: String = stderr.chars().take(200).collect();
            return Err(ToolRunnerError::ToolEmptyResponse(head));
        }

        let line = stdout.lines().next().unwrap_or("");
        let envelope: Value = serde_json::from_str(line).map_err(|_| {
            let head: String = stdout.chars().take(200).collect();
            ToolRunnerError::ToolInvalidResponse(head)
        })?;

        let ok = envelope.get("ok").and_then(Value::as_bool).unwrap_or(false);
        if !ok {
            let error = envelope.get("error");
            let code = error
                .and_then(|e| e.get("code"))
                .and_then(Value::as_str)
                .unwrap_or("TOOL_EXECUTION_ERROR");
            let message = error
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("tool execution failed")
                .to_string();
            return Err(ToolRunnerError::from_worker_code(code, message));
        }

        Ok(envelope.get("result").cloned().unwrap_or(Value::Null))
    }
}

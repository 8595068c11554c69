//! Runtime execution of a handler under Node.js or LLRT.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

use crate::config::{CheckerConfig, LambdaEnvConfig};
use crate::emulator::InvocationEmulator;

/// Which runtime a pass runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    /// Node.js, the reference runtime.
    Baseline,
    /// LLRT, the runtime under test.
    Target,
}

/// How the invocation payload reaches the wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadDelivery {
    /// JSON written to the child's stdin, which is then closed.
    Stdin,
    /// Queued on the Runtime API emulator and fetched by the child.
    RuntimeApi,
}

/// Per-runtime spawn strategy.
#[derive(Debug)]
pub struct RuntimeStrategy {
    pub label: &'static str,
    pub delivery: PayloadDelivery,
    /// Inject the `AWS_LAMBDA_*` environment.
    pub lambda_env: bool,
}

static BASELINE: RuntimeStrategy = RuntimeStrategy {
    label: "Node.js",
    delivery: PayloadDelivery::Stdin,
    lambda_env: false,
};

static TARGET: RuntimeStrategy = RuntimeStrategy {
    label: "LLRT",
    delivery: PayloadDelivery::RuntimeApi,
    lambda_env: true,
};

impl RuntimeKind {
    pub fn strategy(self) -> &'static RuntimeStrategy {
        match self {
            RuntimeKind::Baseline => &BASELINE,
            RuntimeKind::Target => &TARGET,
        }
    }

    pub fn label(self) -> &'static str {
        self.strategy().label
    }
}

impl fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Why a pass produced no exit code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "lowercase")]
pub enum ExecutionFailure {
    /// The runtime binary could not be started.
    Spawn(String),
    /// The Runtime API emulator could not be started.
    Emulator(String),
    /// The process was killed after the timeout (milliseconds).
    Timeout(u64),
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionFailure::Spawn(msg) => write!(f, "failed to spawn runtime: {}", msg),
            ExecutionFailure::Emulator(msg) => write!(f, "Runtime API emulator failed: {}", msg),
            ExecutionFailure::Timeout(ms) => write!(f, "Execution timeout after {}ms", ms),
        }
    }
}

/// Observable outcome of one runtime pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub runtime: RuntimeKind,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed_ms: u64,
    /// `exit_code == Some(0)`.
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ExecutionFailure>,
}

impl ExecutionResult {
    fn exited(
        runtime: RuntimeKind,
        exit_code: Option<i32>,
        stdout: &[u8],
        stderr: &[u8],
        elapsed: Duration,
    ) -> Self {
        Self {
            runtime,
            exit_code,
            stdout: String::from_utf8_lossy(stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(stderr).trim().to_string(),
            elapsed_ms: elapsed.as_millis() as u64,
            success: exit_code == Some(0),
            failure: None,
        }
    }

    fn failed(runtime: RuntimeKind, failure: ExecutionFailure, elapsed: Duration) -> Self {
        Self {
            runtime,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            elapsed_ms: elapsed.as_millis() as u64,
            success: false,
            failure: Some(failure),
        }
    }

    pub fn timed_out(&self) -> bool {
        matches!(self.failure, Some(ExecutionFailure::Timeout(_)))
    }
}

/// Spawns the wrapper under each runtime.
#[derive(Debug, Clone)]
pub struct RuntimeExecutor {
    baseline_binary: PathBuf,
    target_binary: PathBuf,
    wrapper: PathBuf,
    handler_export: String,
    timeout: Duration,
    lambda: LambdaEnvConfig,
}

impl RuntimeExecutor {
    pub fn new(
        baseline_binary: impl Into<PathBuf>,
        target_binary: impl Into<PathBuf>,
        wrapper: impl Into<PathBuf>,
    ) -> Self {
        let defaults = CheckerConfig::default();
        Self {
            baseline_binary: baseline_binary.into(),
            target_binary: target_binary.into(),
            wrapper: wrapper.into(),
            timeout: defaults.timeout(),
            handler_export: defaults.handler_export,
            lambda: defaults.lambda,
        }
    }

    /// Executor configured from `config` (binary, export, timeout, Lambda env).
    pub fn from_config(
        config: &CheckerConfig,
        target_binary: impl Into<PathBuf>,
        wrapper: impl Into<PathBuf>,
    ) -> Self {
        Self {
            baseline_binary: config.node_binary.clone(),
            target_binary: target_binary.into(),
            wrapper: wrapper.into(),
            handler_export: config.handler_export.clone(),
            timeout: config.timeout(),
            lambda: config.lambda.clone(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_handler_export(mut self, export: impl Into<String>) -> Self {
        self.handler_export = export.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn binary(&self, runtime: RuntimeKind) -> &Path {
        match runtime {
            RuntimeKind::Baseline => &self.baseline_binary,
            RuntimeKind::Target => &self.target_binary,
        }
    }

    /// Run `handler` under `runtime` with `payload` as the invocation event.
    ///
    /// Never fails: spawn errors and timeouts are reported in the result.
    /// When the payload goes through the Runtime API, `emulator` is stopped
    /// before this returns.
    pub async fn execute(
        &self,
        handler: &Path,
        runtime: RuntimeKind,
        payload: &Value,
        emulator: &mut InvocationEmulator,
    ) -> ExecutionResult {
        let strategy = runtime.strategy();
        let result = self.execute_inner(handler, runtime, payload, emulator).await;

        if strategy.delivery == PayloadDelivery::RuntimeApi {
            emulator.stop().await;
        }
        result
    }

    async fn execute_inner(
        &self,
        handler: &Path,
        runtime: RuntimeKind,
        payload: &Value,
        emulator: &mut InvocationEmulator,
    ) -> ExecutionResult {
        let strategy = runtime.strategy();
        let setup = Instant::now();

        let mut cmd = Command::new(self.binary(runtime));
        cmd.arg(&self.wrapper)
            .arg(handler_arg(handler))
            .arg(&self.handler_export)
            .env("NODE_ENV", "test")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match strategy.delivery {
            PayloadDelivery::RuntimeApi => {
                let addr = match emulator.start().await {
                    Ok(addr) => addr,
                    Err(e) => {
                        let failure = ExecutionFailure::Emulator(e.to_string());
                        return ExecutionResult::failed(runtime, failure, setup.elapsed());
                    }
                };
                // Queued before spawn so the first poll never sees 204.
                emulator.set_invocation(payload.clone());
                cmd.env("AWS_LAMBDA_RUNTIME_API", addr.to_string()).stdin(Stdio::null());
            }
            PayloadDelivery::Stdin => {
                cmd.stdin(Stdio::piped());
            }
        }

        if strategy.lambda_env {
            cmd.env("AWS_LAMBDA_FUNCTION_NAME", &self.lambda.function_name)
                .env("AWS_LAMBDA_FUNCTION_MEMORY_SIZE", self.lambda.memory_size.to_string())
                .env("AWS_LAMBDA_FUNCTION_VERSION", &self.lambda.function_version)
                .env("AWS_LAMBDA_LOG_GROUP_NAME", &self.lambda.log_group_name)
                .env("AWS_LAMBDA_LOG_STREAM_NAME", &self.lambda.log_stream_name);
        }

        tracing::debug!(
            "spawning {}: {} {} {}",
            runtime,
            self.binary(runtime).display(),
            self.wrapper.display(),
            handler.display()
        );

        let stdin_body = match serde_json::to_vec(payload) {
            Ok(body) => body,
            Err(e) => {
                let failure = ExecutionFailure::Spawn(format!("failed to encode payload: {}", e));
                return ExecutionResult::failed(runtime, failure, setup.elapsed());
            }
        };

        let start = Instant::now();
        let deadline = tokio::time::Instant::from_std(start) + self.timeout;
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let failure = ExecutionFailure::Spawn(e.to_string());
                return ExecutionResult::failed(runtime, failure, start.elapsed());
            }
        };

        if let Some(mut stdin) = child.stdin.take() {
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&stdin_body).await {
                    tracing::debug!("stdin write failed: {}", e);
                }
                // stdin is closed on drop
            });
        }

        let mut stdout_task = collect(child.stdout.take());
        let mut stderr_task = collect(child.stderr.take());

        // The deadline covers the exit and the output drain: a background
        // process that inherited the pipes keeps the readers open.
        let completed = tokio::time::timeout_at(deadline, async {
            let status = child.wait().await?;
            let elapsed = start.elapsed();
            let stdout = (&mut stdout_task).await.unwrap_or_default();
            let stderr = (&mut stderr_task).await.unwrap_or_default();
            Ok::<_, std::io::Error>((status, elapsed, stdout, stderr))
        })
        .await;

        match completed {
            Ok(Ok((status, elapsed, stdout, stderr))) => {
                tracing::debug!(
                    "{} exited with {:?} after {}ms",
                    runtime,
                    status.code(),
                    elapsed.as_millis()
                );
                ExecutionResult::exited(runtime, status.code(), &stdout, &stderr, elapsed)
            }
            Ok(Err(e)) => {
                stdout_task.abort();
                stderr_task.abort();
                let failure = ExecutionFailure::Spawn(e.to_string());
                ExecutionResult::failed(runtime, failure, start.elapsed())
            }
            Err(_) => {
                // Fails if the child already exited and only its pipes were held.
                if let Err(e) = child.kill().await {
                    tracing::debug!("failed to kill {} process: {}", runtime, e);
                }
                stdout_task.abort();
                stderr_task.abort();
                let timeout_ms = self.timeout.as_millis() as u64;
                tracing::warn!("{} execution timed out after {}ms", runtime, timeout_ms);
                let failure = ExecutionFailure::Timeout(timeout_ms);
                ExecutionResult::failed(runtime, failure, start.elapsed())
            }
        }
    }
}

/// Handler path as passed to the wrapper: relative to the working directory
/// when possible.
fn handler_arg(handler: &Path) -> PathBuf {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| handler.strip_prefix(&cwd).ok().map(Path::to_path_buf))
        .unwrap_or_else(|| handler.to_path_buf())
}

fn collect<R>(reader: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut reader) = reader
            && let Err(e) = reader.read_to_end(&mut buf).await
        {
            tracing::debug!("output read failed: {}", e);
        }
        buf
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_table_is_closed_over_runtime_kind() {
        assert_eq!(RuntimeKind::Baseline.strategy().delivery, PayloadDelivery::Stdin);
        assert!(!RuntimeKind::Baseline.strategy().lambda_env);
        assert_eq!(RuntimeKind::Target.strategy().delivery, PayloadDelivery::RuntimeApi);
        assert!(RuntimeKind::Target.strategy().lambda_env);
        assert_eq!(RuntimeKind::Target.to_string(), "LLRT");
    }

    #[test]
    fn success_requires_zero_exit() {
        let elapsed = Duration::from_millis(5);
        let ok = ExecutionResult::exited(RuntimeKind::Baseline, Some(0), b" out \n", b"", elapsed);
        assert!(ok.success);
        assert_eq!(ok.stdout, "out");

        let failed =
            ExecutionResult::exited(RuntimeKind::Baseline, Some(1), b"", b"boom", Duration::ZERO);
        assert!(!failed.success);

        let signalled =
            ExecutionResult::exited(RuntimeKind::Target, None, b"", b"", Duration::ZERO);
        assert!(!signalled.success);
    }

    #[test]
    fn timeout_result_has_no_exit_code() {
        let result = ExecutionResult::failed(
            RuntimeKind::Target,
            ExecutionFailure::Timeout(30_000),
            Duration::from_secs(30),
        );
        assert!(result.timed_out());
        assert!(!result.success);
        assert_eq!(result.exit_code, None);
        assert_eq!(result.failure.unwrap().to_string(), "Execution timeout after 30000ms");
    }

    #[test]
    fn handler_arg_is_relative_to_cwd() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(handler_arg(&cwd.join("src/hello.js")), PathBuf::from("src/hello.js"));
        assert_eq!(handler_arg(Path::new("/elsewhere/h.js")), PathBuf::from("/elsewhere/h.js"));
    }
}

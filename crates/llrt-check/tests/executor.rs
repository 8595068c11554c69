#![cfg(unix)]

use llrt_check::{ExecutionFailure, InvocationEmulator, RuntimeExecutor, RuntimeKind};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::time::Duration;

const SH: &str = "/bin/sh";

/// Shell script standing in for the wrapper; the runtime binary is `sh`.
fn wrapper(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("wrapper.sh");
    std::fs::write(&path, body).unwrap();
    path
}

fn handler(dir: &Path) -> PathBuf {
    let path = dir.join("handler.js");
    std::fs::write(&path, "export const handler = async () => ({ statusCode: 200 })\n").unwrap();
    path
}

fn emulator() -> InvocationEmulator {
    InvocationEmulator::new("127.0.0.1:0")
}

#[tokio::test]
async fn test_baseline_receives_payload_on_stdin() {
    let dir = tempfile::tempdir().unwrap();
    let executor = RuntimeExecutor::new(SH, SH, wrapper(dir.path(), "cat\n"));
    let payload = json!({ "rawPath": "/", "body": "hi" });

    let result = executor
        .execute(&handler(dir.path()), RuntimeKind::Baseline, &payload, &mut emulator())
        .await;

    assert!(result.success, "stderr: {}", result.stderr);
    assert_eq!(result.exit_code, Some(0));
    assert_eq!(result.runtime, RuntimeKind::Baseline);
    let echoed: Value = serde_json::from_str(&result.stdout).unwrap();
    assert_eq!(echoed, payload);
}

#[tokio::test]
async fn test_wrapper_receives_handler_and_export() {
    let dir = tempfile::tempdir().unwrap();
    let handler = handler(dir.path());
    let script = wrapper(dir.path(), "printf '%s %s' \"$1\" \"$2\"\n");
    let executor = RuntimeExecutor::new(SH, SH, script).with_handler_export("main");

    let result = executor
        .execute(&handler, RuntimeKind::Baseline, &json!({}), &mut emulator())
        .await;

    assert_eq!(result.stdout, format!("{} main", handler.display()));
}

#[tokio::test]
async fn test_target_gets_runtime_api_environment() {
    let dir = tempfile::tempdir().unwrap();
    let script = "printf '%s|%s|%s|%s' \"$AWS_LAMBDA_RUNTIME_API\" \"$AWS_LAMBDA_FUNCTION_NAME\" \
                  \"$AWS_LAMBDA_FUNCTION_MEMORY_SIZE\" \"$NODE_ENV\"\n";
    let executor = RuntimeExecutor::new(SH, SH, wrapper(dir.path(), script));
    let mut emulator = emulator();

    let result = executor
        .execute(&handler(dir.path()), RuntimeKind::Target, &json!({ "n": 1 }), &mut emulator)
        .await;

    assert!(result.success, "stderr: {}", result.stderr);
    let fields: Vec<&str> = result.stdout.split('|').collect();
    assert!(fields[0].starts_with("127.0.0.1:"));
    assert_eq!(&fields[1..], ["test-function", "128", "test"]);

    // Queued before spawn, and the emulator is stopped afterwards.
    let pending = emulator.pending_invocation().unwrap();
    assert_eq!(pending.payload, json!({ "n": 1 }));
    assert!(!emulator.is_running());
}

#[tokio::test]
async fn test_baseline_has_no_lambda_environment() {
    let dir = tempfile::tempdir().unwrap();
    let script = "printf '[%s]' \"$AWS_LAMBDA_RUNTIME_API\"\n";
    let executor = RuntimeExecutor::new(SH, SH, wrapper(dir.path(), script));

    let result = executor
        .execute(&handler(dir.path()), RuntimeKind::Baseline, &json!({}), &mut emulator())
        .await;

    assert_eq!(result.stdout, "[]");
}

#[tokio::test]
async fn test_nonzero_exit_is_captured() {
    let dir = tempfile::tempdir().unwrap();
    let script = "echo 'ReferenceError: require is not defined' >&2\nexit 3\n";
    let executor = RuntimeExecutor::new(SH, SH, wrapper(dir.path(), script));

    let result = executor
        .execute(&handler(dir.path()), RuntimeKind::Baseline, &json!({}), &mut emulator())
        .await;

    assert!(!result.success);
    assert_eq!(result.exit_code, Some(3));
    assert_eq!(result.stderr, "ReferenceError: require is not defined");
    assert!(result.failure.is_none());
}

#[tokio::test]
async fn test_timeout_kills_process() {
    let dir = tempfile::tempdir().unwrap();
    let executor = RuntimeExecutor::new(SH, SH, wrapper(dir.path(), "exec sleep 5\n"))
        .with_timeout(Duration::from_millis(200));
    let mut emulator = emulator();

    let result = executor
        .execute(&handler(dir.path()), RuntimeKind::Target, &json!({}), &mut emulator)
        .await;

    assert!(result.timed_out());
    assert!(!result.success);
    assert_eq!(result.exit_code, None);
    assert_eq!(result.failure, Some(ExecutionFailure::Timeout(200)));
    assert!(result.elapsed_ms < 5_000);
    assert!(!emulator.is_running());
}

#[tokio::test]
async fn test_timeout_covers_background_output_holders() {
    let dir = tempfile::tempdir().unwrap();
    let executor = RuntimeExecutor::new(SH, SH, wrapper(dir.path(), "sleep 4 &\nprintf ok\n"))
        .with_timeout(Duration::from_millis(500));
    let mut emulator = emulator();

    let started = std::time::Instant::now();
    let result = executor
        .execute(&handler(dir.path()), RuntimeKind::Target, &json!({}), &mut emulator)
        .await;

    assert!(started.elapsed() < Duration::from_secs(3), "took {:?}", started.elapsed());
    assert!(result.timed_out());
    assert!(!result.success);
    assert_eq!(result.failure, Some(ExecutionFailure::Timeout(500)));
    assert!(!emulator.is_running());
}

#[tokio::test]
async fn test_missing_binary_is_spawn_failure() {
    let dir = tempfile::tempdir().unwrap();
    let executor = RuntimeExecutor::new("/nonexistent/node", SH, wrapper(dir.path(), "cat\n"));

    let result = executor
        .execute(&handler(dir.path()), RuntimeKind::Baseline, &json!({}), &mut emulator())
        .await;

    assert!(!result.success);
    assert!(matches!(result.failure, Some(ExecutionFailure::Spawn(_))));
}

#[tokio::test]
async fn test_emulator_bind_failure_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let executor = RuntimeExecutor::new(SH, SH, wrapper(dir.path(), "true\n"));

    let mut holder = emulator();
    let addr = holder.start().await.unwrap();
    let mut conflicting = InvocationEmulator::new(addr.to_string());

    let result = executor
        .execute(&handler(dir.path()), RuntimeKind::Target, &json!({}), &mut conflicting)
        .await;

    assert!(!result.success);
    assert!(matches!(result.failure, Some(ExecutionFailure::Emulator(_))));
    holder.stop().await;
}

//! Runs the embedded wrapper under a real Node.js. Skipped when `node` is not
//! on PATH.

use llrt_check::harness::WrapperScript;
use llrt_check::{InvocationEmulator, RuntimeExecutor, RuntimeKind};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

fn node() -> Option<PathBuf> {
    match which::which("node") {
        Ok(path) => Some(path),
        Err(_) => {
            eprintln!("node not found in PATH, skipping");
            None
        }
    }
}

fn write(dir: &Path, name: &str, source: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, source).unwrap();
    path
}

const ESM_HANDLER: &str =
    "export const handler = async (event) => ({ statusCode: 200, path: event.rawPath })\n";
const CJS_HANDLER: &str =
    "exports.main = async (event) => ({ name: event.queryStringParameters.name })\n";
const THROWING_HANDLER: &str =
    "export const handler = async () => { throw new Error('boom') }\n";

#[tokio::test]
async fn test_wrapper_on_stdin() {
    let Some(node) = node() else { return };
    let dir = tempfile::tempdir().unwrap();
    let wrapper = WrapperScript::materialize().unwrap();
    let handler = write(dir.path(), "handler.mjs", ESM_HANDLER);
    let executor = RuntimeExecutor::new(&node, &node, wrapper.path());

    let mut emulator = InvocationEmulator::new("127.0.0.1:0");
    let payload = json!({ "rawPath": "/hello" });

    let result = executor
        .execute(&handler, RuntimeKind::Baseline, &payload, &mut emulator)
        .await;

    assert!(result.success, "stderr: {}", result.stderr);
    let output: Value = serde_json::from_str(&result.stdout).unwrap();
    assert_eq!(output, json!({ "statusCode": 200, "path": "/hello" }));
}

#[tokio::test]
async fn test_wrapper_polls_runtime_api() {
    let Some(node) = node() else { return };
    let dir = tempfile::tempdir().unwrap();
    let wrapper = WrapperScript::materialize().unwrap();
    let handler = write(dir.path(), "handler.cjs", CJS_HANDLER);
    let executor = RuntimeExecutor::new(&node, &node, wrapper.path()).with_handler_export("main");
    let mut emulator = InvocationEmulator::new("127.0.0.1:0");
    let payload = json!({ "queryStringParameters": { "name": "Test" } });

    let result = executor
        .execute(&handler, RuntimeKind::Target, &payload, &mut emulator)
        .await;

    assert!(result.success, "stderr: {}", result.stderr);
    let output: Value = serde_json::from_str(&result.stdout).unwrap();
    assert_eq!(output, json!({ "name": "Test" }));
    // The invocation was fetched from `next`.
    assert!(emulator.pending_invocation().is_none());
    assert!(!emulator.is_running());
}

#[tokio::test]
async fn test_wrapper_reports_handler_error() {
    let Some(node) = node() else { return };
    let dir = tempfile::tempdir().unwrap();
    let wrapper = WrapperScript::materialize().unwrap();
    let handler = write(dir.path(), "handler.mjs", THROWING_HANDLER);
    let executor = RuntimeExecutor::new(&node, &node, wrapper.path());
    let mut emulator = InvocationEmulator::new("127.0.0.1:0");

    let result = executor
        .execute(&handler, RuntimeKind::Target, &json!({}), &mut emulator)
        .await;

    assert!(!result.success);
    assert_eq!(result.exit_code, Some(1));
    assert!(result.stderr.contains("Handler threw error"), "stderr: {}", result.stderr);
    assert!(result.stderr.contains("boom"));
    assert!(emulator.pending_invocation().is_none());
}

#[tokio::test]
async fn test_wrapper_missing_export() {
    let Some(node) = node() else { return };
    let dir = tempfile::tempdir().unwrap();
    let wrapper = WrapperScript::materialize().unwrap();
    let handler = write(dir.path(), "handler.mjs", ESM_HANDLER);
    let executor =
        RuntimeExecutor::new(&node, &node, wrapper.path()).with_handler_export("missing");
    let mut emulator = InvocationEmulator::new("127.0.0.1:0");

    let result = executor
        .execute(&handler, RuntimeKind::Baseline, &json!({}), &mut emulator)
        .await;

    assert!(!result.success);
    assert!(result.stderr.contains("Export 'missing' not found"), "stderr: {}", result.stderr);
}

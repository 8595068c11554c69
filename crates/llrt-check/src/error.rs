//! Error types for llrt-check
//!
//! Only configuration-class failures surface as [`CheckError`]. Runtime
//! failures of the handler itself are folded into
//! [`ExecutionResult`](crate::executor::ExecutionResult) instead.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a compatibility check before a verdict exists
#[derive(Error, Debug)]
pub enum CheckError {
    /// Handler file does not exist
    #[error("File not found: {}", .0.display())]
    HandlerNotFound(PathBuf),

    /// No usable LLRT binary could be located
    #[error("LLRT binary not found (searched: {searched}). Build LLRT first or pass --llrt")]
    RuntimeBinaryNotFound { searched: String },

    /// LLRT binary exists but cannot be executed
    #[error("LLRT binary at {} is not executable (try `chmod +x`)", .0.display())]
    RuntimeBinaryNotExecutable(PathBuf),

    /// Compatibility matrix could not be loaded or generated
    #[error("Compatibility matrix error: {0}")]
    Matrix(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Errors raised by the Runtime API emulator lifecycle
#[derive(Error, Debug)]
pub enum EmulatorError {
    /// `start()` called while a listener is still up
    #[error("Runtime API emulator is already listening on {0}")]
    AlreadyRunning(std::net::SocketAddr),

    /// Listener could not bind
    #[error("Failed to bind Runtime API emulator on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for checker operations
pub type CheckResult<T> = Result<T, CheckError>;

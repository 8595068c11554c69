//! Configuration for the compatibility checker.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "llrt_check.toml";

/// Top-level config (from llrt_check.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    /// Per-runtime execution timeout in seconds (default: 30).
    pub timeout_secs: u64,

    /// Host the Runtime API emulator binds to.
    pub host: String,

    /// Port the Runtime API emulator binds to (default: 9001, 0 = ephemeral).
    pub port: u16,

    /// Baseline interpreter (looked up on PATH when not absolute).
    pub node_binary: PathBuf,

    /// Explicit LLRT binary. When unset, well-known locations and PATH are searched.
    pub llrt_binary: Option<PathBuf>,

    /// Compatibility matrix JSON.
    pub matrix_path: PathBuf,

    /// Export name invoked on the handler module.
    pub handler_export: String,

    /// Replace the embedded wrapper entry point with a script on disk.
    pub wrapper_path: Option<PathBuf>,

    /// Lambda identity exposed to the target runtime.
    pub lambda: LambdaEnvConfig,
}

/// Values for the `AWS_LAMBDA_*` environment of the target runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LambdaEnvConfig {
    pub function_name: String,
    pub memory_size: u32,
    pub function_version: String,
    pub log_group_name: String,
    pub log_stream_name: String,
}

impl Default for LambdaEnvConfig {
    fn default() -> Self {
        Self {
            function_name: "test-function".to_string(),
            memory_size: 128,
            function_version: "$LATEST".to_string(),
            log_group_name: "/aws/lambda/test-function".to_string(),
            log_stream_name: "test-stream".to_string(),
        }
    }
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            host: "127.0.0.1".to_string(),
            port: 9001,
            node_binary: PathBuf::from("node"),
            llrt_binary: None,
            matrix_path: PathBuf::from("llrt-compatibility.json"),
            handler_export: "handler".to_string(),
            wrapper_path: None,
            lambda: LambdaEnvConfig::default(),
        }
    }
}

impl CheckerConfig {
    /// Load from a TOML file, or return defaults.
    ///
    /// A missing file silently yields defaults; a broken one is reported and
    /// then ignored.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let config_path = path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));

        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(contents) => match Self::from_toml(&contents) {
                    Ok(cfg) => return cfg,
                    Err(e) => {
                        tracing::warn!("failed to parse {}: {}", config_path.display(), e);
                    }
                },
                Err(e) => {
                    tracing::warn!("failed to read {}: {}", config_path.display(), e);
                }
            }
        }

        Self::default()
    }

    /// Parse a TOML document; missing keys fall back to defaults.
    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Execution timeout as a `Duration`.
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }

    /// `host:port` the emulator should bind.
    pub fn emulator_bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

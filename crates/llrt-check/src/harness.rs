//! Wrapper entry point shared by both runtimes.
//!
//! The wrapper is embedded in the binary and written to a private temp
//! directory, so the checker works from any working directory.

use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Source of the embedded wrapper.
pub const WRAPPER_SOURCE: &str = include_str!("../harness/lambda-wrapper.js");

/// File name the embedded wrapper is written under.
pub const WRAPPER_FILE_NAME: &str = "lambda-wrapper.mjs";

/// Location of the wrapper script for one checker instance.
#[derive(Debug)]
pub enum WrapperScript {
    /// Embedded wrapper materialized into a temp dir, removed on drop.
    Embedded { _dir: TempDir, path: PathBuf },
    /// User-supplied script.
    External(PathBuf),
}

impl WrapperScript {
    /// Write the embedded wrapper to a fresh temp directory.
    pub fn materialize() -> std::io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("llrt-check-").tempdir()?;
        let path = dir.path().join(WRAPPER_FILE_NAME);
        std::fs::write(&path, WRAPPER_SOURCE)?;
        tracing::debug!("wrapper written to {}", path.display());
        Ok(Self::Embedded { _dir: dir, path })
    }

    /// Use an existing script instead of the embedded one.
    pub fn external(path: impl Into<PathBuf>) -> Self {
        Self::External(path.into())
    }

    /// Embedded wrapper, or `path` when one is configured.
    pub fn resolve(path: Option<&Path>) -> std::io::Result<Self> {
        match path {
            Some(p) => Ok(Self::external(p)),
            None => Self::materialize(),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Embedded { path, .. } => path,
            Self::External(path) => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_wrapper_is_written_and_cleaned_up() {
        let wrapper = WrapperScript::materialize().unwrap();
        let path = wrapper.path().to_path_buf();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), WRAPPER_SOURCE);
        drop(wrapper);
        assert!(!path.exists());
    }

    #[test]
    fn wrapper_talks_to_runtime_api() {
        assert!(WRAPPER_SOURCE.contains("AWS_LAMBDA_RUNTIME_API"));
        assert!(WRAPPER_SOURCE.contains("/runtime/invocation/next"));
    }

    #[test]
    fn external_wrapper_is_used_verbatim() {
        let wrapper = WrapperScript::resolve(Some(Path::new("/opt/wrapper.js"))).unwrap();
        assert_eq!(wrapper.path(), Path::new("/opt/wrapper.js"));
    }
}

//! LLRT binary discovery.
//!
//! Search order:
//! 1. Explicitly configured path
//! 2. Local upstream build at `llrt-upstream/target/release/llrt`
//! 3. Lambda `bootstrap` in the working directory
//! 4. `llrt` in PATH
//!
//! Downloading or building LLRT is left to the user.

use std::path::{Path, PathBuf};

use crate::error::{CheckError, CheckResult};

/// Relative location of a local `cargo build --release` of LLRT.
pub const UPSTREAM_BUILD: &str = "llrt-upstream/target/release/llrt";

/// Bootstrap produced by the Lambda layer setup.
pub const BOOTSTRAP: &str = "bootstrap";

fn binary_name() -> &'static str {
    #[cfg(windows)]
    {
        "llrt.exe"
    }
    #[cfg(not(windows))]
    {
        "llrt"
    }
}

/// Locate a usable LLRT binary.
///
/// A configured path is authoritative: if it is missing or not executable
/// the search stops there.
pub fn find_llrt(configured: Option<&Path>, cwd: &Path) -> CheckResult<PathBuf> {
    if let Some(path) = configured {
        if !path.is_file() {
            return Err(CheckError::RuntimeBinaryNotFound {
                searched: path.display().to_string(),
            });
        }
        ensure_executable(path)?;
        tracing::debug!("using configured LLRT at {:?}", path);
        return Ok(path.to_path_buf());
    }

    let mut searched = Vec::new();
    for candidate in [cwd.join(UPSTREAM_BUILD), cwd.join(BOOTSTRAP)] {
        if candidate.is_file() && is_executable(&candidate) {
            tracing::debug!("found LLRT at {:?}", candidate);
            return Ok(candidate);
        }
        searched.push(candidate.display().to_string());
    }

    if let Ok(path) = which::which(binary_name()) {
        tracing::debug!("found LLRT in PATH at {:?}", path);
        return Ok(path);
    }
    searched.push(format!("{} in PATH", binary_name()));

    Err(CheckError::RuntimeBinaryNotFound {
        searched: searched.join(", "),
    })
}

fn ensure_executable(path: &Path) -> CheckResult<()> {
    if is_executable(path) {
        Ok(())
    } else {
        Err(CheckError::RuntimeBinaryNotExecutable(path.to_path_buf()))
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn write_binary(path: &Path, mode: u32) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).unwrap();
    }

    #[test]
    fn configured_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("custom-llrt");
        write_binary(&bin, 0o755);
        assert_eq!(find_llrt(Some(&bin), dir.path()).unwrap(), bin);
    }

    #[test]
    fn configured_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_llrt(Some(&dir.path().join("missing")), dir.path()).unwrap_err();
        assert!(matches!(err, CheckError::RuntimeBinaryNotFound { .. }));
    }

    #[test]
    fn configured_path_must_be_executable() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("llrt");
        write_binary(&bin, 0o644);
        let err = find_llrt(Some(&bin), dir.path()).unwrap_err();
        assert!(matches!(err, CheckError::RuntimeBinaryNotExecutable(_)));
    }

    #[test]
    fn finds_upstream_build_before_bootstrap() {
        let dir = tempfile::tempdir().unwrap();
        write_binary(&dir.path().join(BOOTSTRAP), 0o755);
        assert_eq!(
            find_llrt(None, dir.path()).unwrap(),
            dir.path().join(BOOTSTRAP)
        );

        write_binary(&dir.path().join(UPSTREAM_BUILD), 0o755);
        assert_eq!(
            find_llrt(None, dir.path()).unwrap(),
            dir.path().join(UPSTREAM_BUILD)
        );
    }

    #[test]
    fn non_executable_bootstrap_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_binary(&dir.path().join(BOOTSTRAP), 0o644);
        assert!(find_llrt(None, dir.path()).map_or(true, |p| p != dir.path().join(BOOTSTRAP)));
    }
}

//! Pre-flight checks for prompt
//!
//! Validates the session inputs before a channel is reserved or anything is
//! launched. Provides clear, actionable error messages when requirements
//! aren't met.

#![allow(unsafe_code)] // access() requires unsafe

use anyhow::{bail, Context, Result};
use object::{Object, ObjectKind};
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use crate::config::SessionConfig;
use crate::domain::Role;

/// Run all pre-flight checks for a session
pub fn run_preflight_checks(config: &SessionConfig, quiet: bool) -> Result<()> {
    check_executable(&config.consumer, Role::Consumer)?;
    check_executable(&config.producer, Role::Producer)?;
    check_object_format(&config.producer, quiet)?;
    check_thread_support(config)?;
    check_channel_namespace(&config.channel.namespace)?;
    Ok(())
}

/// Check that `path` is an existing, executable regular file
fn check_executable(path: &Path, role: Role) -> Result<()> {
    if !path.exists() {
        bail!(
            "{role} executable not found: {}\n\n\
             Make sure the path is correct and the binary has been built.",
            path.display()
        );
    }
    if !path.is_file() {
        bail!(
            "Not a file: {}\n\n\
             The {role} must be an executable file, not a directory.",
            path.display()
        );
    }
    if !access(path, libc::X_OK)? {
        bail!(
            "Permission denied: {} is not executable.\n\n\
             Fix with: chmod +x {}",
            path.display(),
            path.display()
        );
    }
    Ok(())
}

/// Warn when the producer doesn't look like an instrumented native binary
fn check_object_format(path: &Path, quiet: bool) -> Result<()> {
    let file_data =
        std::fs::read(path).with_context(|| format!("Failed to read binary: {}", path.display()))?;

    let Ok(obj) = object::File::parse(&*file_data) else {
        // Wrapper scripts are fine, the consumer doesn't care how events arrive
        if !quiet {
            eprintln!("warning: producer is not a native executable, launching it anyway");
        }
        return Ok(());
    };

    if !matches!(obj.kind(), ObjectKind::Executable | ObjectKind::Dynamic) {
        bail!(
            "{} is an object file, not an executable.\n\n\
             Link the instrumented object before running a session.",
            path.display()
        );
    }

    let has_symtab = obj.symbols().next().is_some();
    if !has_symtab && !quiet {
        eprintln!("warning: producer binary stripped, consumer reports will lack symbol names");
    }

    Ok(())
}

/// Modules that keep global state in one thread reject `--threads > 1`
fn check_thread_support(config: &SessionConfig) -> Result<()> {
    if config.threads == 0 {
        bail!("--threads must be at least 1");
    }
    if config.threads > 1 && !config.module.supports_threads() {
        bail!(
            "Module {} only supports 1 thread (got --threads {}).",
            config.module,
            config.threads
        );
    }
    if !config.threads.is_power_of_two() {
        // The consumer shards addresses with `threads - 1` as a mask
        bail!("--threads must be a power of two (got {})", config.threads);
    }
    Ok(())
}

/// Check that channel markers can be created in the namespace directory
fn check_channel_namespace(namespace: &Path) -> Result<()> {
    if !namespace.is_dir() {
        bail!(
            "Shared-memory namespace {} does not exist.\n\n\
             Is /dev/shm mounted? Override with --channel-dir.",
            namespace.display()
        );
    }
    if !access(namespace, libc::W_OK)? {
        bail!("Permission denied: cannot create channel markers in {}", namespace.display());
    }
    Ok(())
}

fn access(path: &Path, mode: libc::c_int) -> Result<bool> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .with_context(|| format!("Path contains a NUL byte: {}", path.display()))?;
    Ok(unsafe { libc::access(c_path.as_ptr(), mode) } == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prompt_protocol::ProfilingModule;

    #[test]
    fn test_executable_not_found() {
        let result = check_executable(Path::new("/nonexistent/path/to/binary"), Role::Producer);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("producer executable not found"));
    }

    #[test]
    fn test_directory_is_not_executable() {
        let dir = tempfile::tempdir().unwrap();
        let err = check_executable(dir.path(), Role::Consumer).unwrap_err().to_string();
        assert!(err.contains("Not a file"));
    }

    #[test]
    fn test_sh_is_executable() {
        assert!(check_executable(Path::new("/bin/sh"), Role::Producer).is_ok());
    }

    #[test]
    fn test_script_producer_passes_format_check() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("run.sh");
        std::fs::write(&script, "#!/bin/sh\nexec ./app\n").unwrap();
        assert!(check_object_format(&script, true).is_ok());
    }

    #[test]
    fn test_single_thread_modules() {
        let mut config = SessionConfig::new(ProfilingModule::ObjectLifetime, "c", "p");
        config.threads = 2;
        assert!(check_thread_support(&config).is_err());

        config.module = ProfilingModule::Dep;
        assert!(check_thread_support(&config).is_ok());

        config.threads = 3;
        assert!(check_thread_support(&config).is_err());
    }

    #[test]
    fn test_namespace_missing() {
        let err = check_channel_namespace(Path::new("/nonexistent/shm")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_tempdir_namespace_ok() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check_channel_namespace(dir.path()).is_ok());
    }
}

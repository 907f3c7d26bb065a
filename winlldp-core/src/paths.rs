//! Runtime path resolution
//!
//! All runtime files (neighbor table, PID file, capture log) live next to
//! the executable, never in OS temp directories.

use std::path::{Path, PathBuf};

/// Worker PID sidecar file name
pub const PID_FILE_NAME: &str = "capture.pid";

/// Capture worker log file name
pub const CAPTURE_LOG_NAME: &str = "winlldp_capture.log";

/// Directory runtime files are stored in: the executable's directory,
/// falling back to the current directory when that cannot be determined.
pub fn runtime_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Resolve a possibly-relative configured path against the runtime directory.
pub fn resolve_runtime_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        runtime_dir().join(path)
    }
}

/// Path of the capture worker PID file
pub fn pid_file() -> PathBuf {
    runtime_dir().join(PID_FILE_NAME)
}

/// Path of the capture worker log file
pub fn capture_log_file() -> PathBuf {
    runtime_dir().join(CAPTURE_LOG_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_path_untouched() {
        let p = Path::new("/var/lib/winlldp/neighbors.json");
        assert_eq!(resolve_runtime_path(p), p);
    }

    #[test]
    fn test_relative_path_lands_in_runtime_dir() {
        let resolved = resolve_runtime_path(Path::new("neighbors.json"));
        assert!(resolved.is_absolute() || resolved.starts_with("."));
        assert!(resolved.ends_with("neighbors.json"));
        assert_eq!(resolved.parent().unwrap(), runtime_dir());
    }

    #[test]
    fn test_sidecar_files_share_directory() {
        assert_eq!(pid_file().parent(), capture_log_file().parent());
    }
}

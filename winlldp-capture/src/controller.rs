//! Receiver controller
//!
//! Thin lifecycle manager for the capture worker process. The worker owns
//! its PID sidecar; the controller reads it, checks liveness against the
//! OS, and tolerates stale files left behind by a crashed worker.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use winlldp_core::{paths, Error, Result};

/// How long `stop` waits for a graceful exit before killing
const STOP_DEADLINE: Duration = Duration::from_secs(5);

/// Reported state of the worker
#[derive(Debug, Clone)]
pub struct WorkerStatus {
    pub running: bool,
    pub pid: Option<u32>,
    pub uptime: Option<Duration>,
}

/// Capture worker lifecycle manager
pub struct ReceiverController {
    pid_file: PathBuf,
    log_file: PathBuf,
}

impl Default for ReceiverController {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiverController {
    pub fn new() -> Self {
        ReceiverController {
            pid_file: paths::pid_file(),
            log_file: paths::capture_log_file(),
        }
    }

    /// Controller over explicit paths (used by tests).
    pub fn with_paths(pid_file: PathBuf, log_file: PathBuf) -> Self {
        ReceiverController { pid_file, log_file }
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Spawn the worker detached, stdout/stderr appended to the capture
    /// log. Refuses while a live worker exists; stale PID files are cleaned
    /// up and ignored.
    ///
    /// `env_file` is forwarded so the worker loads the same configuration.
    pub fn start(&self, env_file: Option<&Path>) -> Result<u32> {
        if let Some(pid) = self.live_pid() {
            return Err(Error::WorkerAlreadyRunning(pid));
        }
        self.remove_stale_pid_file();

        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)?;
        let log_err = log.try_clone()?;

        let exe = std::env::current_exe()?;
        let mut command = Command::new(exe);
        command
            .arg("capture-worker")
            .stdin(Stdio::null())
            .stdout(log)
            .stderr(log_err);
        if let Some(path) = env_file {
            command.arg("--env-file").arg(path);
        }
        // Detach from the controlling terminal so the worker survives the
        // frontend.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command.spawn()?;
        let pid = child.id();

        // Catch immediate startup failures (bad config, missing pcap).
        std::thread::sleep(Duration::from_millis(500));
        if let Ok(Some(status)) = child.try_wait() {
            return Err(Error::Capture(format!(
                "worker exited immediately with {}; see {}",
                status,
                self.log_file.display()
            )));
        }

        info!(pid, "capture worker spawned");
        Ok(pid)
    }

    /// Terminate the worker: SIGTERM, up to 5 seconds of grace, then
    /// SIGKILL. The PID file is removed either way.
    pub fn stop(&self) -> Result<u32> {
        let pid = match self.live_pid() {
            Some(pid) => pid,
            None => {
                self.remove_stale_pid_file();
                return Err(Error::WorkerNotRunning);
            }
        };

        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }

        let deadline = Instant::now() + STOP_DEADLINE;
        while Instant::now() < deadline {
            if !pid_alive(pid) {
                self.remove_stale_pid_file();
                info!(pid, "capture worker stopped");
                return Ok(pid);
            }
            std::thread::sleep(Duration::from_millis(100));
        }

        warn!(pid, "worker did not exit in time, killing");
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGKILL);
        }
        self.remove_stale_pid_file();
        Ok(pid)
    }

    /// Current worker state.
    pub fn status(&self) -> WorkerStatus {
        match self.live_pid() {
            Some(pid) => {
                let uptime = fs::metadata(&self.pid_file)
                    .and_then(|meta| meta.modified())
                    .ok()
                    .and_then(|started| started.elapsed().ok());
                WorkerStatus {
                    running: true,
                    pid: Some(pid),
                    uptime,
                }
            }
            None => WorkerStatus {
                running: false,
                pid: None,
                uptime: None,
            },
        }
    }

    /// Last `n` lines of the capture log; `n == 0` streams the whole file.
    pub fn log_lines(&self, n: usize) -> Result<Vec<String>> {
        let content = match fs::read_to_string(&self.log_file) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let lines: Vec<String> = content.lines().map(str::to_string).collect();
        if n == 0 || lines.len() <= n {
            Ok(lines)
        } else {
            Ok(lines[lines.len() - n..].to_vec())
        }
    }

    /// PID from the sidecar, only when that process is still alive.
    fn live_pid(&self) -> Option<u32> {
        let pid = self.read_pid()?;
        pid_alive(pid).then_some(pid)
    }

    fn read_pid(&self) -> Option<u32> {
        let raw = fs::read_to_string(&self.pid_file).ok()?;
        raw.trim().parse().ok()
    }

    fn remove_stale_pid_file(&self) {
        if self.pid_file.exists() {
            let _ = fs::remove_file(&self.pid_file);
        }
    }
}

/// Whether a process with this PID exists.
fn pid_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{}", pid)).exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn controller_in(dir: &tempfile::TempDir) -> ReceiverController {
        ReceiverController::with_paths(
            dir.path().join("capture.pid"),
            dir.path().join("winlldp_capture.log"),
        )
    }

    #[test]
    fn test_status_without_pid_file() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller_in(&dir);
        let status = controller.status();
        assert!(!status.running);
        assert_eq!(status.pid, None);
    }

    #[test]
    fn test_stale_pid_file_reads_as_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller_in(&dir);

        // A PID far above any real process on the test machine.
        fs::write(dir.path().join("capture.pid"), "4194304").unwrap();
        assert!(!controller.status().running);

        // Stop treats it as not running and cleans the file up.
        assert!(matches!(controller.stop(), Err(Error::WorkerNotRunning)));
        assert!(!dir.path().join("capture.pid").exists());
    }

    #[test]
    fn test_status_reports_own_pid_as_running() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller_in(&dir);

        // The test process itself is certainly alive.
        fs::write(
            dir.path().join("capture.pid"),
            std::process::id().to_string(),
        )
        .unwrap();
        let status = controller.status();
        assert!(status.running);
        assert_eq!(status.pid, Some(std::process::id()));
        assert!(status.uptime.is_some());
    }

    #[test]
    fn test_garbage_pid_file_reads_as_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller_in(&dir);
        fs::write(dir.path().join("capture.pid"), "not-a-pid").unwrap();
        assert!(!controller.status().running);
    }

    #[test]
    fn test_log_tail() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller_in(&dir);

        assert!(controller.log_lines(20).unwrap().is_empty());

        let mut log = fs::File::create(controller.log_file()).unwrap();
        for i in 0..30 {
            writeln!(log, "line {}", i).unwrap();
        }
        drop(log);

        let tail = controller.log_lines(5).unwrap();
        assert_eq!(tail.len(), 5);
        assert_eq!(tail[0], "line 25");
        assert_eq!(tail[4], "line 29");

        assert_eq!(controller.log_lines(0).unwrap().len(), 30);
    }
}

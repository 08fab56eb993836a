//! Consumer process lifecycle: spawn, request a stop, wait.
//!
//! Unix only: graceful stop is delivered as `SIGTERM`, escalation as
//! `SIGKILL`.

use std::ffi::OsStr;
use std::path::Path;
use std::process::{Child, Command, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tracing::{debug, warn};

use crate::{Error, Result, TransferConfig};

/// Interval between liveness checks while waiting out a stop grace.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Handle to a launched consumer process.
#[derive(Debug)]
pub struct ConsumerHandle {
    /// The spawned child.
    child: Child,
}

/// Spawns `program` configured for this run.
///
/// The parameters the consumer must agree on (port, capacity, worker
/// count, accept window) are forwarded as flags; `report`, if given,
/// tells the consumer where to write its JSON report. Stdio is
/// inherited, so both processes share one terminal.
pub fn spawn(
    program: impl AsRef<OsStr>,
    cfg: &TransferConfig,
    report: Option<&Path>,
) -> Result<ConsumerHandle> {
    let program = program.as_ref();
    let mut command = Command::new(program);
    command
        .arg("--port")
        .arg(cfg.port.to_string())
        .arg("--capacity")
        .arg(cfg.capacity.to_string())
        .arg("--workers")
        .arg(cfg.consumer_workers.to_string())
        .arg("--accept-timeout-ms")
        .arg(cfg.accept_timeout.as_millis().to_string());
    if let Some(path) = report {
        command.arg("--report").arg(path);
    }

    let child = command.spawn().map_err(|source| Error::Spawn {
        program: program.to_string_lossy().into_owned(),
        source,
    })?;
    debug!(pid = child.id(), "consumer launched");
    Ok(ConsumerHandle { child })
}

impl ConsumerHandle {
    /// OS process id of the consumer.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// `true` while the consumer is still running.
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Asks the consumer to stop (`SIGTERM`). Succeeds even if the
    /// process has already exited.
    #[allow(clippy::cast_possible_wrap)]
    pub fn request_stop(&self) -> Result<()> {
        let pid = Pid::from_raw(self.child.id() as i32);
        match kill(pid, Signal::SIGTERM) {
            Ok(()) | Err(nix::errno::Errno::ESRCH) => Ok(()),
            Err(e) => Err(std::io::Error::from(e).into()),
        }
    }

    /// Blocks until the consumer exits and returns its status.
    pub fn wait(&mut self) -> Result<ExitStatus> {
        Ok(self.child.wait()?)
    }

    /// Requests a stop, waits up to `grace`, then kills outright.
    pub fn stop(&mut self, grace: Duration) -> Result<ExitStatus> {
        self.request_stop()?;
        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            if let Some(status) = self.child.try_wait()? {
                debug!(pid = self.child.id(), %status, "consumer stopped");
                return Ok(status);
            }
            thread::sleep(STOP_POLL_INTERVAL);
        }
        warn!(pid = self.child.id(), "consumer ignored SIGTERM; killing it");
        self.child.kill()?;
        Ok(self.child.wait()?)
    }
}

#[cfg(test)]
mod tests {
    use std::process::{Command, Stdio};

    use super::*;

    /// Wraps an arbitrary command so the handle logic can be driven by
    /// plain system binaries.
    fn spawn_cmd(program: &str, args: &[&str]) -> ConsumerHandle {
        let child = Command::new(program)
            .args(args)
            .stdout(Stdio::null())
            .spawn()
            .unwrap();
        ConsumerHandle { child }
    }

    #[test]
    fn wait_reaps_a_short_lived_process() {
        let mut handle = spawn_cmd("true", &[]);
        let status = handle.wait().unwrap();
        assert!(status.success());
    }

    #[test]
    fn stop_terminates_a_sleeper_quickly() {
        let mut handle = spawn_cmd("sleep", &["30"]);
        assert!(handle.is_alive());
        let started = Instant::now();
        let status = handle.stop(Duration::from_secs(5)).unwrap();
        assert!(!status.success());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn stop_escalates_to_kill_when_term_is_ignored() {
        let mut handle = spawn_cmd("sh", &["-c", "trap '' TERM; exec sleep 30"]);
        // Give the shell a moment to install the trap before signalling.
        thread::sleep(Duration::from_millis(200));
        assert!(handle.is_alive());
        let started = Instant::now();
        let status = handle.stop(Duration::from_millis(500)).unwrap();
        assert!(!status.success());
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(!handle.is_alive());
    }

    #[test]
    fn request_stop_after_exit_is_not_an_error() {
        let mut handle = spawn_cmd("true", &[]);
        handle.wait().unwrap();
        assert!(handle.request_stop().is_ok());
    }

    #[test]
    fn spawn_reports_a_missing_program() {
        let err = spawn(
            "/nonexistent/ferry-consumer",
            &TransferConfig::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
    }
}

use std::fs::File;
use std::io;
use std::path::Path;
use std::process::Stdio;

use log::{debug, info, warn};
use tokio::process::{Child, Command};

use crate::config::CHANNEL_ENV_VAR;
use crate::domain::{ChannelId, ExitInfo, Role, SessionError};

/// A launched producer or consumer
///
/// Output goes to a per-process log file. The child is killed if the handle
/// is dropped while it is still running.
#[derive(Debug)]
pub struct ProcessHandle {
    role: Role,
    child: Child,
    exit: Option<ExitInfo>,
}

impl ProcessHandle {
    /// Launch `program` bound to `channel`
    ///
    /// # Errors
    /// Returns [`SessionError::LaunchFailed`] if the log file cannot be
    /// created or the program cannot be started
    pub fn spawn(
        role: Role,
        program: &Path,
        args: &[String],
        channel: ChannelId,
        log_path: &Path,
    ) -> Result<Self, SessionError> {
        let launch_failed =
            |source| SessionError::LaunchFailed { role, program: program.to_path_buf(), source };

        let log = File::create(log_path).map_err(launch_failed)?;
        let log_err = log.try_clone().map_err(launch_failed)?;

        let child = Command::new(program)
            .args(args)
            .env(CHANNEL_ENV_VAR, channel.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .kill_on_drop(true)
            .spawn()
            .map_err(launch_failed)?;

        info!(
            "Launched {role} {} (pid {}, log {})",
            program.display(),
            child.id().unwrap_or_default(),
            log_path.display()
        );

        Ok(Self { role, child, exit: None })
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Exit status, if the process has been reaped
    #[must_use]
    pub fn exit(&self) -> Option<ExitInfo> {
        self.exit
    }

    /// Wait for the process to exit (cancel safe)
    ///
    /// # Errors
    /// Returns an error if waiting on the child fails
    pub async fn wait(&mut self) -> io::Result<ExitInfo> {
        if let Some(exit) = self.exit {
            return Ok(exit);
        }
        let exit = ExitInfo::from(self.child.wait().await?);
        debug!("{} exited: {exit}", self.role);
        self.exit = Some(exit);
        Ok(exit)
    }

    /// Non-blocking exit check
    ///
    /// # Errors
    /// Returns an error if querying the child fails
    pub fn try_exit(&mut self) -> io::Result<Option<ExitInfo>> {
        if self.exit.is_none() {
            self.exit = self.child.try_wait()?.map(ExitInfo::from);
        }
        Ok(self.exit)
    }

    /// Force-terminate the process if it is still running and reap it
    ///
    /// Returns the final exit status when it could be collected.
    pub async fn terminate(&mut self) -> Option<ExitInfo> {
        match self.try_exit() {
            Ok(Some(exit)) => return Some(exit),
            Ok(None) => {}
            Err(e) => warn!("Failed to query {}: {e}", self.role),
        }

        warn!("Killing {}", self.role);
        if let Err(e) = self.child.kill().await {
            warn!("Failed to kill {}: {e}", self.role);
        }
        match self.wait().await {
            Ok(exit) => Some(exit),
            Err(e) => {
                warn!("Failed to reap {}: {e}", self.role);
                None
            }
        }
    }
}

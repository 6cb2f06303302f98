use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use prompt_protocol::ProfilingModule;
use serde::{Serialize, Serializer};

use crate::domain::{ChannelId, ExitInfo, SessionError, TimeoutPhase};

/// Orchestration phases, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Init,
    ConsumerStarting,
    ProducerStarting,
    Running,
    Draining,
    Finished,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::ConsumerStarting => "consumer-starting",
            Self::ProducerStarting => "producer-starting",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    /// Both processes exited with the success code
    Succeeded,
    /// A deadline expired; live processes were killed
    TimedOut { phase: TimeoutPhase },
    /// The consumer exited while the producer was still running
    OrderViolation,
    /// Both processes exited, at least one unsuccessfully
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => f.write_str("succeeded"),
            Self::TimedOut { phase } => write!(f, "timed out ({phase})"),
            Self::OrderViolation => f.write_str("order violation"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Outcome of one session, written to the session record
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub channel: ChannelId,
    pub module: ProfilingModule,
    #[serde(flatten)]
    pub state: SessionState,
    /// `None` if the producer was never launched
    pub producer: Option<ExitInfo>,
    pub consumer: Option<ExitInfo>,
    /// Time from producer launch to the end of supervision
    #[serde(rename = "run_time_secs", serialize_with = "as_secs")]
    pub run_time: Duration,
}

impl SessionReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.state == SessionState::Succeeded
    }

    /// Turn a non-successful outcome into the matching [`SessionError`]
    ///
    /// # Errors
    /// - [`SessionError::TimedOut`] for either deadline
    /// - [`SessionError::OrderViolation`] if the consumer exited first
    /// - [`SessionError::NonZeroExit`] if either process failed
    pub fn into_result(self) -> Result<Self, SessionError> {
        let unknown = ExitInfo { code: None, signal: None };
        match self.state {
            SessionState::Succeeded => Ok(self),
            SessionState::TimedOut { phase } => {
                Err(SessionError::TimedOut { phase, elapsed: self.run_time })
            }
            SessionState::OrderViolation => Err(SessionError::OrderViolation {
                consumer: self.consumer.unwrap_or(unknown),
                elapsed: self.run_time,
            }),
            SessionState::Failed => Err(SessionError::NonZeroExit {
                producer: self.producer.unwrap_or(unknown),
                consumer: self.consumer.unwrap_or(unknown),
            }),
        }
    }

    /// Write the report as pretty JSON
    ///
    /// # Errors
    /// Returns an error if the file cannot be written
    pub fn write_record(&self, path: &Path) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer)?;
        writer.flush()
    }
}

fn as_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

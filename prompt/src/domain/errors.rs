//! Structured error types for prompt
//!
//! Using thiserror for automatic Display implementation and error chaining.

use std::path::PathBuf;
use std::time::Duration;

use super::types::{ExitInfo, Role, TimeoutPhase};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("No free channel id in {low}..={high} after {attempts} attempts")]
    AllocationExhausted { low: u32, high: u32, attempts: u32 },

    #[error("Cannot reserve channel marker {}: {source}", path.display())]
    Namespace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Allocation(#[from] ChannelError),

    #[error("Failed to launch {role} {}: {source}", program.display())]
    LaunchFailed {
        role: Role,
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Consumer did not publish the channel within {0:?}")]
    ConsumerNotReady(Duration),

    #[error("Consumer finished ({consumer}) while the producer was still running")]
    OrderViolation { consumer: ExitInfo, elapsed: Duration },

    #[error("Timed out after {elapsed:?} ({phase})")]
    TimedOut { phase: TimeoutPhase, elapsed: Duration },

    #[error("Session failed: producer {producer}, consumer {consumer}")]
    NonZeroExit { producer: ExitInfo, consumer: ExitInfo },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum CollectError {
    #[error("Failed to move {} to {}: {source}", from.display(), to.display())]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

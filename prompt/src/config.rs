//! Session configuration
//!
//! Typed view of everything the orchestrator needs, built from the CLI
//! arguments (see [`crate::cli::RunArgs`]) or directly by library users.

use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use prompt_protocol::ProfilingModule;

use crate::channel::{ChannelAllocator, DEFAULT_MAX_ATTEMPTS, DEFAULT_NAMESPACE, DEFAULT_RANGE};

/// Environment variable carrying the channel id to both processes
pub const CHANNEL_ENV_VAR: &str = "SLAMP_QUEUE_ID";

/// Default global session timeout (2 hours)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(7200);

/// Default time the consumer gets to drain after the producer exits
pub const DEFAULT_DRAIN_GRACE: Duration = Duration::from_secs(10);

/// Default bound on waiting for the consumer to publish the channel
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(30);

/// How the orchestrator decides the consumer is ready for the producer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Wait until the consumer has created the channel segment
    Channel { timeout: Duration },
    /// Sleep a fixed delay and assume the consumer is ready
    WarmUp(Duration),
}

impl Default for Readiness {
    fn default() -> Self {
        Self::Channel { timeout: DEFAULT_READY_TIMEOUT }
    }
}

/// Where channel ids come from
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub namespace: PathBuf,
    pub range: RangeInclusive<u32>,
    pub max_attempts: u32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            namespace: PathBuf::from(DEFAULT_NAMESPACE),
            range: DEFAULT_RANGE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ChannelConfig {
    #[must_use]
    pub fn allocator(&self) -> ChannelAllocator {
        ChannelAllocator::new(&self.namespace)
            .with_range(self.range.clone())
            .with_max_attempts(self.max_attempts)
    }
}

/// One producer/consumer session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub module: ProfilingModule,
    /// Consumer worker threads
    pub threads: u32,
    /// Global deadline, measured from the producer launch
    pub timeout: Duration,
    pub drain_grace: Duration,
    pub readiness: Readiness,
    pub consumer: PathBuf,
    pub producer: PathBuf,
    /// Pass-through producer arguments
    pub producer_args: Vec<String>,
    /// Directory receiving `consumer.log` and `producer.log`
    pub log_dir: PathBuf,
    pub channel: ChannelConfig,
}

impl SessionConfig {
    pub fn new(
        module: ProfilingModule,
        consumer: impl Into<PathBuf>,
        producer: impl Into<PathBuf>,
    ) -> Self {
        Self {
            module,
            threads: 1,
            timeout: DEFAULT_TIMEOUT,
            drain_grace: DEFAULT_DRAIN_GRACE,
            readiness: Readiness::default(),
            consumer: consumer.into(),
            producer: producer.into(),
            producer_args: Vec::new(),
            log_dir: PathBuf::from("."),
            channel: ChannelConfig::default(),
        }
    }

    /// Arguments for the consumer binary
    #[must_use]
    pub fn consumer_args(&self) -> Vec<String> {
        vec![
            "--module".to_string(),
            self.module.consumer_index().to_string(),
            "--threads".to_string(),
            self.threads.to_string(),
        ]
    }

    #[must_use]
    pub fn consumer_log(&self) -> PathBuf {
        self.log_dir.join("consumer.log")
    }

    #[must_use]
    pub fn producer_log(&self) -> PathBuf {
        self.log_dir.join("producer.log")
    }
}

//! # Producer/Consumer Orchestration
//!
//! Runs one profiling session:
//!
//! ```text
//! Init ──▶ ConsumerStarting ──▶ ProducerStarting ──▶ Running ──▶ Draining
//!  │ acquire slot │ wait for channel     │ launch producer │ producer   │ consumer
//!  │ launch       │ segment (or warm-up) │                 │ exited     │ drains
//!  ▼ consumer     ▼                      ▼                 ▼            ▼
//!                          Succeeded | TimedOut | OrderViolation | Failed
//! ```
//!
//! ## Invariants
//!
//! - The producer never starts before the consumer is ready.
//! - The producer must not outlive the consumer. A consumer that exits while
//!   the producer runs means lost events; the session is an
//!   `OrderViolation` whatever either process would have reported.
//! - Every terminal state other than `Succeeded` kills whatever is still
//!   running, and the channel slot is released on every path.
//!
//! Supervision is event-driven: both `Child::wait` futures and the deadline
//! are raced with `tokio::select!`, so the timeout has no poll-interval
//! granularity.

pub mod process;
pub mod session;

pub use process::ProcessHandle;
pub use session::{Phase, SessionReport, SessionState};

use std::io;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::channel::ChannelSlot;
use crate::config::{Readiness, SessionConfig};
use crate::domain::{ExitInfo, Role, SessionError, TimeoutPhase};
use crate::status;

/// How often the readiness wait looks for the channel segment
const READY_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// Runs producer/consumer sessions
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: SessionConfig,
}

/// What the readiness wait observed
enum Startup {
    Ready,
    ConsumerExited(ExitInfo),
}

/// The first thing that happened while both processes ran
enum FirstEvent {
    ProducerExited(io::Result<ExitInfo>),
    ConsumerExited(io::Result<ExitInfo>),
    Deadline,
}

impl Orchestrator {
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Run one session to a terminal state
    ///
    /// Terminal states are reported in the returned [`SessionReport`]; use
    /// [`SessionReport::into_result`] to treat anything but success as an
    /// error.
    ///
    /// # Errors
    /// - [`SessionError::Allocation`] if no channel id could be reserved
    /// - [`SessionError::LaunchFailed`] if either process fails to start
    /// - [`SessionError::ConsumerNotReady`] if the consumer never publishes
    ///   the channel
    /// - [`SessionError::Io`] if waiting on a child fails
    pub async fn run(&self) -> Result<SessionReport, SessionError> {
        let slot = self.config.channel.allocator().acquire()?;
        status::info("Channel", &format!("running with channel id {}", slot.id()));

        let result = self.supervise(&slot).await;

        // Both processes are reaped by now; the segment is no longer in use
        if let Err(e) = slot.release() {
            warn!("Failed to release channel: {e}");
        }
        result
    }

    async fn supervise(&self, slot: &ChannelSlot) -> Result<SessionReport, SessionError> {
        let config = &self.config;
        let mut phase = Phase::Init;

        advance(&mut phase, Phase::ConsumerStarting);
        let mut consumer = ProcessHandle::spawn(
            Role::Consumer,
            &config.consumer,
            &config.consumer_args(),
            slot.id(),
            &config.consumer_log(),
        )?;

        match self.await_consumer(slot, &mut consumer).await {
            Ok(Startup::Ready) => {}
            Ok(Startup::ConsumerExited(exit)) => {
                advance(&mut phase, Phase::Finished);
                warn!("Consumer exited ({exit}) before the producer was launched");
                return Ok(self.report(slot, SessionState::OrderViolation, None, Some(exit), Duration::ZERO));
            }
            Err(e) => {
                consumer.terminate().await;
                return Err(e);
            }
        }

        advance(&mut phase, Phase::ProducerStarting);
        let mut producer = match ProcessHandle::spawn(
            Role::Producer,
            &config.producer,
            &config.producer_args,
            slot.id(),
            &config.producer_log(),
        ) {
            Ok(producer) => producer,
            Err(e) => {
                consumer.terminate().await;
                return Err(e);
            }
        };
        let started = Instant::now();

        advance(&mut phase, Phase::Running);
        let first = tokio::select! {
            exit = producer.wait() => FirstEvent::ProducerExited(exit),
            exit = consumer.wait() => FirstEvent::ConsumerExited(exit),
            () = tokio::time::sleep(config.timeout) => FirstEvent::Deadline,
        };

        let outcome = match first {
            FirstEvent::ProducerExited(Ok(_)) => {
                advance(&mut phase, Phase::Draining);
                match tokio::time::timeout(config.drain_grace, consumer.wait()).await {
                    Ok(Ok(_)) => Ok(both_exited(&producer, &consumer)),
                    Ok(Err(e)) => Err(e),
                    Err(_) => {
                        warn!("Consumer did not drain within {:?}", config.drain_grace);
                        Ok(SessionState::TimedOut { phase: TimeoutPhase::Drain })
                    }
                }
            }
            FirstEvent::ConsumerExited(Ok(exit)) => match producer.try_exit() {
                // Both gone by the time we looked: not an ordering problem
                Ok(Some(_)) => Ok(both_exited(&producer, &consumer)),
                Ok(None) => {
                    warn!("Consumer exited ({exit}) while the producer was still running");
                    Ok(SessionState::OrderViolation)
                }
                Err(e) => Err(e),
            },
            FirstEvent::Deadline => {
                warn!("Neither process finished within {:?}", config.timeout);
                Ok(SessionState::TimedOut { phase: TimeoutPhase::Global })
            }
            FirstEvent::ProducerExited(Err(e)) | FirstEvent::ConsumerExited(Err(e)) => Err(e),
        };
        let run_time = started.elapsed();

        let state = match outcome {
            Ok(state) => state,
            Err(e) => {
                producer.terminate().await;
                consumer.terminate().await;
                return Err(e.into());
            }
        };

        if state != SessionState::Succeeded {
            producer.terminate().await;
            consumer.terminate().await;
        }
        advance(&mut phase, Phase::Finished);
        info!("Session on channel {} {state} after {run_time:?}", slot.id());

        Ok(self.report(slot, state, producer.exit(), consumer.exit(), run_time))
    }

    /// Block until the consumer is ready for the producer
    async fn await_consumer(
        &self,
        slot: &ChannelSlot,
        consumer: &mut ProcessHandle,
    ) -> Result<Startup, SessionError> {
        match self.config.readiness {
            Readiness::WarmUp(delay) => {
                tokio::select! {
                    exit = consumer.wait() => Ok(Startup::ConsumerExited(exit?)),
                    () = tokio::time::sleep(delay) => Ok(Startup::Ready),
                }
            }
            Readiness::Channel { timeout } => {
                let segment = slot.segment_path();
                let published = async {
                    let mut interval = tokio::time::interval(READY_CHECK_INTERVAL);
                    loop {
                        interval.tick().await;
                        if tokio::fs::try_exists(segment).await.unwrap_or(false) {
                            break;
                        }
                    }
                };

                tokio::select! {
                    exit = consumer.wait() => Ok(Startup::ConsumerExited(exit?)),
                    () = published => {
                        debug!("Consumer published {}", segment.display());
                        Ok(Startup::Ready)
                    }
                    () = tokio::time::sleep(timeout) => Err(SessionError::ConsumerNotReady(timeout)),
                }
            }
        }
    }

    fn report(
        &self,
        slot: &ChannelSlot,
        state: SessionState,
        producer: Option<ExitInfo>,
        consumer: Option<ExitInfo>,
        run_time: Duration,
    ) -> SessionReport {
        SessionReport { channel: slot.id(), module: self.config.module, state, producer, consumer, run_time }
    }
}

fn advance(phase: &mut Phase, next: Phase) {
    debug!("Session phase {phase} -> {next}");
    *phase = next;
}

fn both_exited(producer: &ProcessHandle, consumer: &ProcessHandle) -> SessionState {
    let ok = |p: &ProcessHandle| p.exit().is_some_and(|e| e.success());
    if ok(producer) && ok(consumer) {
        SessionState::Succeeded
    } else {
        SessionState::Failed
    }
}

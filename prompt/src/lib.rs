//! # prompt - Producer/Consumer Profiling Session Driver
//!
//! Runs an instrumented program (the *producer*) next to an analysis process
//! (the *consumer*) that reads the producer's events from a shared-memory
//! channel and computes a profile.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  api.yaml + <Module>Events.yaml        (prompt-protocol crate)  │
//! │        │ schema::load_*  ──▶  compiler::compile                 │
//! │        ▼                                                        │
//! │  slamp_produce.h  ──▶  external instrumentation + build         │
//! └─────────────────────────────────────────────────────────────────┘
//!                         │ instrumented executable
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     prompt (This Crate)                         │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │   Channel    │──▶│ Orchestrator │──▶│  Collector   │         │
//! │  │  Allocator   │   │ (tokio)      │   │ (deplog.txt) │         │
//! │  └──────────────┘   └──────┬───────┘   └──────────────┘         │
//! │                      spawn │ supervise                          │
//! │                  ┌─────────┴─────────┐                          │
//! │                  ▼                   ▼                          │
//! │            consumer_custom      producer.exe                    │
//! │                  ▲ SLAMP_QUEUE_ID=<id> │                        │
//! │                  └──── /dev/shm/slamp_queue_<id> ◀──┘           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`channel`]: Race-free channel id reservation with guaranteed release
//! - [`orchestrator`]: Startup ordering, supervision, timeouts, termination
//! - [`collector`]: Moves the raw profile to its final location
//! - [`generate`]: Producer header generation from event specifications
//! - [`preflight`]: Input validation before anything is launched
//! - [`config`]: Typed session configuration and defaults
//! - [`cli`]: Command-line argument parsing
//! - [`status`]: Color/tag-coded status lines
//! - [`domain`]: Core domain types (`ChannelId`, `ExitInfo`, `Role`) and errors
//!
//! ## Session Guarantees
//!
//! - The producer only starts once the consumer has published the channel.
//! - The producer never outlives the consumer; if it would, the session is
//!   an ordering violation and both processes are killed.
//! - The channel reservation is released on every exit path.
//! - Overall success requires both processes to exit with code 0.
//!
//! ## Typical Usage
//!
//! ```bash
//! # Regenerate the producer header for the dependence module
//! prompt generate -m dep --config-dir config
//!
//! # Run a session and collect the profile
//! SLAMP_INSTALL_DIR=/opt/slamp prompt run bench.bc -m dep -t 4
//! ```

pub mod channel;
pub mod cli;
pub mod collector;
pub mod config;
pub mod domain;
pub mod generate;
pub mod orchestrator;
pub mod preflight;
pub mod status;

//! # Event Protocol (Producer ↔ Consumer)
//!
//! Declarative description of the fixed-width events an instrumented program
//! (the *producer*) pushes into the shared-memory channel read by the
//! analysis process (the *consumer*), and the compiler that turns that
//! description into the producer-side emission macros.
//!
//! ## Pipeline
//!
//! ```text
//!  api.yaml ──┐
//!             ├─▶ schema::load_api_spec ──▶ ApiSpec ──┐
//!  <mod>.yaml ┘   schema::load_module_spec ─▶ ModuleSpec ─┤
//!                                                       ▼
//!                                        compiler::compile ──▶ Vec<Declaration>
//!                                                       │
//!                                                       ▼
//!                                        compiler::render_header ──▶ slamp_produce.h
//! ```
//!
//! Loading and rendering are separate stages: a schema is fully validated
//! (or rejected as a whole) before anything is emitted, and rendering is a
//! pure function of the validated model.
//!
//! ## Wire Layout
//!
//! Every event starts with an 8-bit tag followed by its parameters in API
//! order. Each parameter is a whole number of bytes, so the emission helper
//! for an event is named after the widths it packs, e.g. `produce_8_32_64`.
//!
//! ## Key Types
//!
//! - [`ApiSpec`] - Full catalog of events and their parameter layouts
//! - [`ModuleSpec`] - Events/parameters one profiling module consumes
//! - [`Declaration`] - One compiled `#define PRODUCE_*` line
//! - [`ProfilingModule`] - Consumer-side analysis modules and their event files

pub mod compiler;
mod document;
pub mod error;
pub mod module;
pub mod schema;

pub use compiler::{compile, render_header, Declaration, EVENT_TAG_BITS};
pub use error::SchemaError;
pub use module::ProfilingModule;
pub use schema::{
    load_api_spec, load_module_spec, ApiSpec, DocumentFormat, EventSpec, ModuleEvent, ModuleSpec,
    Param,
};

/// Name of the API catalog inside a configuration directory
pub const API_FILE_NAME: &str = "api.yaml";

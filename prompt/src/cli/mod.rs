//! Command-line interface for prompt
//!
//! This module contains CLI argument parsing and configuration

pub mod args;

pub use args::{Args, Command, GenerateArgs, RunArgs};

//! # prompt - Main Entry Point
//!
//! Supports two operations:
//! - **Run** (`prompt run <TARGET>`): optional header regeneration, a
//!   producer/consumer session, then artifact collection
//! - **Generate** (`prompt generate --config-dir <DIR>`): write the producer
//!   header only

use anyhow::{Context, Result};
use clap::Parser;
use log::warn;

use prompt::cli::{Args, Command, GenerateArgs, RunArgs};
use prompt::collector::{collect, CollectOutcome};
use prompt::domain::SessionError;
use prompt::generate::generate_frontend;
use prompt::orchestrator::Orchestrator;
use prompt::preflight::run_preflight_checks;
use prompt::status;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_SESSION_FAILED: i32 = 3;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            status::failure("error", &format!("{e:#}"));
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<SessionError>() {
        Some(
            SessionError::OrderViolation { .. }
            | SessionError::TimedOut { .. }
            | SessionError::NonZeroExit { .. },
        ) => EXIT_SESSION_FAILED,
        _ if err.to_string().to_lowercase().contains("missing required argument") => EXIT_USAGE,
        _ => EXIT_ERROR,
    }
}

#[tokio::main]
async fn run() -> Result<()> {
    let args = Args::parse();
    let quiet = args.quiet;

    match args.command {
        Command::Run(run) => run_session(&run, quiet).await,
        Command::Generate(generate) => run_generate(&generate, quiet),
    }
}

fn run_generate(args: &GenerateArgs, quiet: bool) -> Result<()> {
    let request = args.request();
    let count = generate_frontend(&request)?;
    if !quiet {
        status::info("Generated", &format!("{count} declarations in {}", request.output.display()));
    }
    Ok(())
}

async fn run_session(args: &RunArgs, quiet: bool) -> Result<()> {
    // ── Phase 1: Producer header ────────────────────────────────────────
    if let Some(request) = args.frontend_request() {
        let count = generate_frontend(&request)?;
        if !quiet {
            status::info(
                "Generated",
                &format!("{count} declarations in {}", request.output.display()),
            );
        }
    }

    // ── Phase 2: Session ────────────────────────────────────────────────
    let mut session_result = Ok(());
    if args.skip_run {
        if !quiet {
            println!("skipping run");
        }
    } else {
        let config = args.session_config()?;
        run_preflight_checks(&config, quiet)?;

        if !quiet {
            println!("prompt v{}", env!("CARGO_PKG_VERSION"));
            println!("module: {} (consumer index {})", config.module, config.module.consumer_index());
            println!("producer: {}", config.producer.display());
            println!("consumer: {}", config.consumer.display());
        }

        let report = Orchestrator::new(config).run().await?;
        status::report(&report);

        if let Err(e) = report.write_record(&args.record) {
            warn!("Failed to write session record {}: {e}", args.record.display());
        }
        session_result = report.into_result().map(|_| ());
    }

    // ── Phase 3: Collect whatever the consumer left behind ──────────────
    let output = args.output_path();
    match collect(&args.artifact, &output).context("Failed to collect profile")? {
        CollectOutcome::Moved(path) if !quiet => println!("saved: {}", path.display()),
        CollectOutcome::Moved(_) => {}
        CollectOutcome::Missing if !quiet => {
            println!("no {} produced by this module", args.artifact.display());
        }
        CollectOutcome::Missing => {}
    }

    session_result.map_err(Into::into)
}

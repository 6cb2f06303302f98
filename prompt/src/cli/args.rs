//! CLI argument definitions

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use prompt_protocol::ProfilingModule;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::channel::DEFAULT_NAMESPACE;
use crate::collector::{DEFAULT_ARTIFACT, DEFAULT_OUTPUT};
use crate::config::{ChannelConfig, Readiness, SessionConfig};
use crate::generate::{FrontendRequest, DEFAULT_HEADER};

/// Consumer binary inside `SLAMP_INSTALL_DIR`
const CONSUMER_BINARY: &str = "bin/consumer_custom";

#[derive(Parser)]
#[command(
    name = "prompt",
    about = "Run producer/consumer profiling sessions over a shared-memory channel",
    after_help = "\
EXAMPLES:
    prompt run bench.bc                         Profile ./bench.named.slamp.exe with the dep module
    prompt run --exe ./app -m lv -t 4 -- -n 10  Explicit executable, pass-through arguments
    prompt generate -m dep --config-dir cfg     Regenerate slamp_produce.h"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a profiling session and collect its profile
    Run(RunArgs),
    /// Generate the producer header from the event specifications
    Generate(GenerateArgs),
}

#[derive(clap::Args)]
pub struct RunArgs {
    /// Bitcode the producer was built from (`x.bc` runs `./x.named.slamp.exe`) or the producer itself
    #[arg(value_name = "TARGET", required_unless_present = "exe")]
    pub target: Option<PathBuf>,

    /// Profiling module
    #[arg(short, long, default_value = "dep")]
    pub module: ProfilingModule,

    /// Consumer threads
    #[arg(short, long, default_value_t = 1)]
    pub threads: u32,

    /// Global timeout in seconds, from producer launch
    #[arg(long, value_name = "SECS", default_value_t = 7200)]
    pub timeout: u64,

    /// Seconds the consumer gets to drain after the producer exits
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    pub drain_grace: u64,

    /// Seconds to wait for the consumer to publish the channel
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub ready_timeout: u64,

    /// Sleep this many milliseconds instead of waiting for the channel
    #[arg(long, value_name = "MS", conflicts_with = "ready_timeout")]
    pub warm_up: Option<u64>,

    /// Where to put the collected profile
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Raw artifact the consumer writes
    #[arg(long, value_name = "FILE", default_value = DEFAULT_ARTIFACT)]
    pub artifact: PathBuf,

    /// Producer executable (overrides the one derived from TARGET)
    #[arg(long, value_name = "FILE")]
    pub exe: Option<PathBuf>,

    /// Consumer executable (default: $SLAMP_INSTALL_DIR/bin/consumer_custom)
    #[arg(long, value_name = "FILE")]
    pub consumer: Option<PathBuf>,

    /// Installation prefix of the profiling runtime
    #[arg(long, env = "SLAMP_INSTALL_DIR", value_name = "DIR")]
    pub install_dir: Option<PathBuf>,

    /// Directory holding shared-memory channels
    #[arg(long, value_name = "DIR", default_value = DEFAULT_NAMESPACE)]
    pub channel_dir: PathBuf,

    /// Directory for consumer.log and producer.log
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub log_dir: PathBuf,

    /// Session record (JSON)
    #[arg(long, value_name = "FILE", default_value = "prompt.session.json")]
    pub record: PathBuf,

    /// Don't regenerate the producer header
    #[arg(long)]
    pub skip_build: bool,

    /// Don't run the session, only collect an existing artifact
    #[arg(long)]
    pub skip_run: bool,

    /// Event specification directory; regenerates the producer header before running
    #[arg(long, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Prelude for the generated header
    #[arg(long, value_name = "FILE", requires = "config_dir")]
    pub template: Option<PathBuf>,

    /// Generated header path
    #[arg(long, value_name = "FILE", default_value = DEFAULT_HEADER)]
    pub header: PathBuf,

    /// Producer arguments used when none follow `--`
    #[arg(long, env = "PROFILEARGS", value_name = "ARGS", default_value = "")]
    pub profile_args: String,

    /// Arguments passed through to the producer
    #[arg(last = true, value_name = "ARGS")]
    pub producer_args: Vec<String>,
}

impl RunArgs {
    /// Producer executable: `--exe`, else derived from TARGET
    pub fn producer_path(&self) -> Result<PathBuf> {
        if let Some(exe) = &self.exe {
            return Ok(exe.clone());
        }
        match &self.target {
            Some(target) => Ok(derive_producer(target)),
            None => bail!("Missing required argument: TARGET or --exe"),
        }
    }

    /// Consumer executable: `--consumer`, else inside the install dir
    pub fn consumer_path(&self) -> Result<PathBuf> {
        if let Some(consumer) = &self.consumer {
            return Ok(consumer.clone());
        }
        match &self.install_dir {
            Some(dir) => Ok(dir.join(CONSUMER_BINARY)),
            None => bail!(
                "Missing required argument: --consumer or SLAMP_INSTALL_DIR\n\n\
                 Point SLAMP_INSTALL_DIR at the profiling runtime installation."
            ),
        }
    }

    /// Trailing arguments win over `PROFILEARGS`
    #[must_use]
    pub fn producer_arguments(&self) -> Vec<String> {
        if self.producer_args.is_empty() {
            self.profile_args.split_whitespace().map(str::to_string).collect()
        } else {
            self.producer_args.clone()
        }
    }

    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT))
    }

    /// Header generation request, if a config directory was given and the
    /// build step isn't skipped
    #[must_use]
    pub fn frontend_request(&self) -> Option<FrontendRequest> {
        if self.skip_build {
            return None;
        }
        self.config_dir.as_ref().map(|dir| FrontendRequest {
            module: Some(self.module),
            config_dir: dir.clone(),
            template: self.template.clone(),
            output: self.header.clone(),
        })
    }

    /// Build the session configuration
    pub fn session_config(&self) -> Result<SessionConfig> {
        let mut config =
            SessionConfig::new(self.module, self.consumer_path()?, self.producer_path()?);
        config.threads = self.threads;
        config.timeout = Duration::from_secs(self.timeout);
        config.drain_grace = Duration::from_secs(self.drain_grace);
        config.readiness = match self.warm_up {
            Some(ms) => Readiness::WarmUp(Duration::from_millis(ms)),
            None => Readiness::Channel { timeout: Duration::from_secs(self.ready_timeout) },
        };
        config.producer_args = self.producer_arguments();
        config.log_dir.clone_from(&self.log_dir);
        config.channel =
            ChannelConfig { namespace: self.channel_dir.clone(), ..ChannelConfig::default() };
        Ok(config)
    }
}

#[derive(clap::Args)]
pub struct GenerateArgs {
    /// Restrict to one module's events (default: the whole API)
    #[arg(short, long)]
    pub module: Option<ProfilingModule>,

    /// Directory holding api.yaml and the module event files
    #[arg(long, value_name = "DIR")]
    pub config_dir: PathBuf,

    /// Prelude copied ahead of the declarations
    #[arg(short, long, value_name = "FILE")]
    pub template: Option<PathBuf>,

    /// Output header
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_HEADER)]
    pub output: PathBuf,
}

impl GenerateArgs {
    #[must_use]
    pub fn request(&self) -> FrontendRequest {
        FrontendRequest {
            module: self.module,
            config_dir: self.config_dir.clone(),
            template: self.template.clone(),
            output: self.output.clone(),
        }
    }
}

/// `dir/bench.bc` → `./bench.named.slamp.exe`; anything else is the producer itself
fn derive_producer(target: &Path) -> PathBuf {
    if target.extension().is_some_and(|e| e == "bc") {
        let stem = target.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
        let stem = stem.strip_suffix(".named").unwrap_or(&*stem);
        PathBuf::from(".").join(format!("{stem}.named.slamp.exe"))
    } else {
        target.to_path_buf()
    }
}

use anyhow::{Context, Result};
use clap::Parser;
use prompt_protocol::{compile, render_header, ApiSpec, ModuleSpec, ProfilingModule, API_FILE_NAME};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Parser)]
enum Cmd {
    /// Generate one producer header per profiling module
    GenFrontend {
        #[arg(long, default_value = "config")]
        config_dir: PathBuf,
        #[arg(long)]
        template: Option<PathBuf>,
        #[arg(long, default_value = "target/frontends")]
        out_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Cmd::GenFrontend { config_dir, template, out_dir } => {
            gen_frontend(&config_dir, template.as_deref(), &out_dir)?;
        }
    }

    Ok(())
}

fn gen_frontend(config_dir: &Path, template: Option<&Path>, out_dir: &Path) -> Result<()> {
    let api_path = config_dir.join(API_FILE_NAME);
    let api = ApiSpec::from_path(&api_path)
        .with_context(|| format!("Failed to load {}", api_path.display()))?;

    let prelude = template
        .map(|t| fs::read_to_string(t).with_context(|| format!("Failed to read {}", t.display())))
        .transpose()?;

    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    for module in ProfilingModule::ALL {
        let spec_path = config_dir.join(module.events_file());
        if !spec_path.exists() {
            println!("- {module}: no {} (skipped)", module.events_file());
            continue;
        }
        let spec = ModuleSpec::from_path(&api, &spec_path)
            .with_context(|| format!("Failed to load {}", spec_path.display()))?;
        let declarations = compile(&api, Some(&spec))?;

        let out = out_dir.join(format!("slamp_produce_{}.h", module.name()));
        fs::write(&out, render_header(prelude.as_deref(), &declarations))
            .with_context(|| format!("Failed to write {}", out.display()))?;
        println!("✓ {module}: {} declarations → {}", declarations.len(), out.display());
    }

    Ok(())
}

//! Producer header generation
//!
//! Loads `api.yaml` plus the selected module's events file from a
//! configuration directory, compiles them and writes the header the
//! instrumented build includes.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};
use prompt_protocol::{compile, render_header, ApiSpec, ModuleSpec, ProfilingModule, API_FILE_NAME};

/// Default header name
pub const DEFAULT_HEADER: &str = "slamp_produce.h";

/// Inputs for one header
#[derive(Debug, Clone)]
pub struct FrontendRequest {
    /// Restrict to this module's events; `None` compiles the whole API
    pub module: Option<ProfilingModule>,
    pub config_dir: PathBuf,
    /// Prelude copied verbatim ahead of the declarations
    pub template: Option<PathBuf>,
    pub output: PathBuf,
}

/// Generate the header described by `request`
///
/// Returns the number of declarations written.
///
/// # Errors
/// Returns an error if a schema document is missing or invalid, or if the
/// template or output cannot be accessed
pub fn generate_frontend(request: &FrontendRequest) -> Result<usize> {
    if !request.config_dir.is_dir() {
        anyhow::bail!("Config directory {} does not exist", request.config_dir.display());
    }

    let api_path = request.config_dir.join(API_FILE_NAME);
    let api = ApiSpec::from_path(&api_path)
        .with_context(|| format!("Invalid API specification {}", api_path.display()))?;

    let module = request
        .module
        .map(|m| load_module(&api, &request.config_dir, m))
        .transpose()?;

    let declarations = compile(&api, module.as_ref())?;
    for decl in &declarations {
        debug!("{}: {} bytes per record", decl.macro_name(), decl.record_bytes());
    }

    let prelude = request
        .template
        .as_deref()
        .map(|t| {
            fs::read_to_string(t)
                .with_context(|| format!("Template file {} does not exist", t.display()))
        })
        .transpose()?;

    let header = render_header(prelude.as_deref(), &declarations);
    fs::write(&request.output, header)
        .with_context(|| format!("Failed to write {}", request.output.display()))?;

    info!(
        "Wrote {} declarations to {}",
        declarations.len(),
        request.output.display()
    );
    Ok(declarations.len())
}

fn load_module(api: &ApiSpec, config_dir: &Path, module: ProfilingModule) -> Result<ModuleSpec> {
    let path = config_dir.join(module.events_file());
    ModuleSpec::from_path(api, &path)
        .with_context(|| format!("Invalid {module} module specification {}", path.display()))
}

//! One compilation run: entry script in, native artefact and depfile out.

use std::fs;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info};

use crate::backend::{BackendError, EmitOptions};
use crate::build::{self, DepfileError};
use crate::config::{ConfigError, RunConfig};
use crate::module::{ImportContext, ModuleError, ModuleResolver};
use crate::runtime::{Export, Interpreter, Toolkit};

#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("script error: {0}")]
    Script(#[from] ModuleError),
    #[error("failed to save output: {0}")]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Depfile(#[from] DepfileError),
}

impl DriverError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            DriverError::Config(_) => 2,
            DriverError::Script(_) | DriverError::Backend(_) => 1,
            DriverError::Depfile(_) => 3,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    /// Every file the run depended on, in the order it was recorded.
    pub dependencies: Vec<PathBuf>,
    /// Symbols written to the output, empty when no output was requested.
    pub exports: Vec<Export>,
}

/// Run `config` with the built-in interpreter.
pub fn run(config: &RunConfig) -> Result<RunOutcome, DriverError> {
    let mut interpreter = Interpreter::default();
    run_with(config, &mut interpreter)
}

/// Run `config` on `toolkit`.
///
/// A failed save still produces the depfile; if writing the depfile fails
/// too, that error is the one returned.
pub fn run_with<T>(config: &RunConfig, toolkit: &mut T) -> Result<RunOutcome, DriverError>
where
    T: Toolkit,
{
    config.validate()?;

    let search_paths = config.search_paths();
    for dir in &search_paths {
        debug!("module search path: {}", dir.display());
    }
    let mut imports = ImportContext::new(ModuleResolver::new(search_paths));
    toolkit.inject_flags(&config.flags());

    let entry = fs::canonicalize(&config.filename)
        .map_err(|e| ModuleError::io_error(config.filename.clone(), e.to_string()))?;
    let chunk = toolkit.load_chunk(&entry)?;
    toolkit.execute(&chunk, &mut imports)?;

    let mut exports = Vec::new();
    let mut saved = Ok(());
    if let Some(output) = &config.output {
        exports = toolkit.exports();
        for export in &exports {
            info!("export: {}", export.name);
        }
        info!("exporting public symbols to {}", output.display());

        let link_flags = toolkit.link_flags();
        let options = EmitOptions {
            optimize: !config.debug,
        };
        saved = toolkit.save_obj(output, &exports, &link_flags, &options);
    }

    let dependencies = imports.into_dependencies();
    if let Some(depfile) = &config.depfile {
        build::emit(
            depfile,
            config.depfile_target(),
            &dependencies,
            config.depfile_root.as_deref(),
        )?;
    }

    saved?;
    Ok(RunOutcome {
        dependencies,
        exports,
    })
}

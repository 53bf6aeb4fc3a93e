//! Run configuration
//!
//! A [`RunConfig`] is assembled once from the command line and the
//! environment and is read-only for the rest of the run.

use std::env;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::module::parse_path_list;

/// Environment variable holding extra module directories, as a platform
/// path list. Searched before any directory given on the command line.
pub const MODULE_PATH_ENV: &str = "SCRIPTC_PATH";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("input file name is empty")]
    EmptyInput,
}

#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    pub filename: PathBuf,
    pub output: Option<PathBuf>,
    pub depfile: Option<PathBuf>,
    /// Directory every depfile path is made relative to.
    pub depfile_root: Option<PathBuf>,
    pub include_dirs: Vec<PathBuf>,
    pub lib_dirs: Vec<PathBuf>,
    pub libs: Vec<String>,
    pub module_dirs: Vec<PathBuf>,
    pub no_default_module_dirs: bool,
    pub debug: bool,
}

/// Compiler and linker flags handed to the runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagSet {
    pub c_flags: Vec<String>,
    pub link_flags: Vec<String>,
}

impl RunConfig {
    pub fn new(filename: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.filename.as_os_str().is_empty() {
            return Err(ConfigError::EmptyInput);
        }
        Ok(())
    }

    /// Module search directories for this run, read from the environment.
    pub fn search_paths(&self) -> Vec<PathBuf> {
        let from_env = env::var(MODULE_PATH_ENV).ok();
        self.search_paths_with(from_env.as_deref())
    }

    /// Module search directories in priority order: the path list in
    /// `env_value`, then `-M` directories, then the default install
    /// directories unless suppressed.
    pub fn search_paths_with(&self, env_value: Option<&str>) -> Vec<PathBuf> {
        let mut paths = env_value.map(parse_path_list).unwrap_or_default();
        paths.extend(self.module_dirs.iter().cloned());
        if !self.no_default_module_dirs {
            paths.extend(default_module_dirs());
        }
        paths
    }

    pub fn flags(&self) -> FlagSet {
        let mut c_flags = Vec::with_capacity(self.include_dirs.len() * 2);
        for dir in &self.include_dirs {
            c_flags.push("-I".to_string());
            c_flags.push(dir.display().to_string());
        }

        let mut link_flags = Vec::with_capacity(self.lib_dirs.len() * 2 + self.libs.len());
        for dir in &self.lib_dirs {
            link_flags.push("-L".to_string());
            link_flags.push(dir.display().to_string());
        }
        for lib in &self.libs {
            link_flags.push(format!("-l{}", lib));
        }

        FlagSet { c_flags, link_flags }
    }

    /// The depfile's target: the output if one is produced, otherwise the
    /// input script.
    pub fn depfile_target(&self) -> &Path {
        self.output.as_deref().unwrap_or(&self.filename)
    }
}

/// Built-in module directories: `share/scriptc/modules` next to the
/// installed binary, then the per-user data directory.
pub fn default_module_dirs() -> Vec<PathBuf> {
    let mut found = Vec::new();

    if let Some(prefix) = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().and_then(Path::parent).map(Path::to_path_buf))
    {
        found.push(prefix.join("share").join("scriptc").join("modules"));
    }

    if let Some(data) = dirs::data_dir() {
        found.push(data.join("scriptc").join("modules"));
    }

    found
}

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, trace};

use crate::module::path::{self, ModulePath};

/// File extension of script modules.
pub const MODULE_EXTENSION: &str = "t";

/// File that stands for a directory module (`pkg/init.t`).
pub const PACKAGE_INIT: &str = "init";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    /// `<name>.t`
    File,
    /// `<name>/init.t`
    Package,
}

/// Where a candidate's directory came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateBase {
    Origin(PathBuf),
    SearchPath(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionCandidate {
    pub path: PathBuf,
    pub kind: CandidateKind,
    pub base: CandidateBase,
}

impl fmt::Display for ResolutionCandidate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self.kind {
            CandidateKind::File => "module file",
            CandidateKind::Package => "package init",
        };
        match &self.base {
            CandidateBase::Origin(origin) => write!(
                f,
                "{} ({} relative to {})",
                self.path.display(),
                kind,
                origin.display()
            ),
            CandidateBase::SearchPath(dir) => write!(
                f,
                "{} ({} in search path {})",
                self.path.display(),
                kind,
                dir.display()
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolutionFailure {
    pub specifier: String,
    pub origin: Option<PathBuf>,
    pub attempted: Vec<ResolutionCandidate>,
}

/// Why the search-path resolver produced no file. `Malformed` and
/// `MissingOrigin` are rejected before any filesystem access.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error("specifier '{0}' is not a plain dotted module name")]
    Malformed(String),
    #[error("relative specifier '{0}' has no originating file")]
    MissingOrigin(String),
    #[error("no file found for '{}' ({} paths tried)", .0.specifier, .0.attempted.len())]
    Exhausted(ResolutionFailure),
}

impl ResolveError {
    pub fn attempted(&self) -> &[ResolutionCandidate] {
        match self {
            ResolveError::Exhausted(failure) => &failure.attempted,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedModule {
    /// Canonical path, symlinks resolved.
    pub path: PathBuf,
    pub specifier: String,
    pub attempted: Vec<ResolutionCandidate>,
}

pub struct ModuleResolver {
    extension: String,
    search_paths: Vec<PathBuf>,
}

impl Default for ModuleResolver {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ModuleResolver {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self {
            extension: MODULE_EXTENSION.to_string(),
            search_paths,
        }
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    pub fn resolve(
        &self,
        specifier: &str,
        origin: Option<&Path>,
    ) -> Result<ResolvedModule, ResolveError> {
        if !path::is_valid_specifier(specifier) {
            return Err(ResolveError::Malformed(specifier.to_string()));
        }

        let module = path::parse_specifier(specifier);
        if module.is_empty() {
            return Err(ResolveError::Malformed(specifier.to_string()));
        }

        if module.is_relative() {
            match origin {
                Some(origin) => self.resolve_relative(specifier, &module, origin),
                None => Err(ResolveError::MissingOrigin(specifier.to_string())),
            }
        } else {
            self.resolve_qualified(specifier, &module, origin)
        }
    }

    fn resolve_relative(
        &self,
        specifier: &str,
        module: &ModulePath,
        origin: &Path,
    ) -> Result<ResolvedModule, ResolveError> {
        let origin_dir = origin.parent().unwrap_or(Path::new("/"));
        let target = path::normalize_lexically(&origin_dir.join(module.to_path()));

        let file = self.candidate(&target, CandidateKind::File, CandidateBase::Origin(origin.to_path_buf()));
        let package = self.candidate(&target, CandidateKind::Package, CandidateBase::Origin(origin.to_path_buf()));

        let found = probe(&file.path).or_else(|| probe(&package.path));
        let attempted = vec![file, package];

        match found {
            Some(path) => {
                debug!("resolved {} -> {}", specifier, path.display());
                Ok(ResolvedModule {
                    path,
                    specifier: specifier.to_string(),
                    attempted,
                })
            }
            None => Err(ResolveError::Exhausted(ResolutionFailure {
                specifier: specifier.to_string(),
                origin: Some(origin.to_path_buf()),
                attempted,
            })),
        }
    }

    fn resolve_qualified(
        &self,
        specifier: &str,
        module: &ModulePath,
        origin: Option<&Path>,
    ) -> Result<ResolvedModule, ResolveError> {
        let relative = module.to_path();
        let mut attempted = Vec::new();

        for dir in &self.search_paths {
            let target = dir.join(&relative);
            for kind in [CandidateKind::File, CandidateKind::Package] {
                let candidate = self.candidate(&target, kind, CandidateBase::SearchPath(dir.clone()));
                let found = probe(&candidate.path);
                attempted.push(candidate);

                if let Some(path) = found {
                    debug!("resolved {} -> {}", specifier, path.display());
                    return Ok(ResolvedModule {
                        path,
                        specifier: specifier.to_string(),
                        attempted,
                    });
                }
            }
        }

        Err(ResolveError::Exhausted(ResolutionFailure {
            specifier: specifier.to_string(),
            origin: origin.map(Path::to_path_buf),
            attempted,
        }))
    }

    fn candidate(&self, target: &Path, kind: CandidateKind, base: CandidateBase) -> ResolutionCandidate {
        let path = match kind {
            CandidateKind::File => append_extension(target, &self.extension),
            CandidateKind::Package => append_extension(&target.join(PACKAGE_INIT), &self.extension),
        };
        ResolutionCandidate { path, kind, base }
    }
}

/// `foo` -> `foo.t`, without treating anything in `foo` as an existing
/// extension.
fn append_extension(path: &Path, extension: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

/// Canonical path of `candidate` if it names an existing regular file.
fn probe(candidate: &Path) -> Option<PathBuf> {
    trace!("trying {}", candidate.display());
    fs::canonicalize(candidate).ok().filter(|p| p.is_file())
}

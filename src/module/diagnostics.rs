use std::fmt;
use std::path::PathBuf;

use crate::module::resolver::ResolutionCandidate;

#[derive(Debug, Clone)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

/// One step of the import chain that led to an error.
#[derive(Debug, Clone)]
pub struct DependencyInfo {
    pub path: PathBuf,
    pub specifier: String,
}

impl DependencyInfo {
    pub fn new(path: PathBuf, specifier: String) -> Self {
        Self { path, specifier }
    }
}

#[derive(Debug)]
pub enum ModuleErrorKind {
    /// Neither the search-path resolver nor the runtime's own loader found
    /// the module.
    Unresolved {
        specifier: String,
        origin: Option<PathBuf>,
        tried_paths: Vec<ResolutionCandidate>,
        skipped_reason: Option<String>,
        fallback_message: String,
    },
    CycleDetected {
        cycle: Vec<String>,
    },
    ParseError {
        message: String,
        line: usize,
        column: usize,
    },
    RuntimeError {
        message: String,
    },
    IOError {
        path: PathBuf,
        message: String,
    },
}

#[derive(Debug)]
pub struct ModuleError {
    pub kind: ModuleErrorKind,
    pub source_location: Option<SourceLocation>,
    pub dependency_chain: Vec<DependencyInfo>,
    pub suggestion: Option<String>,
}

impl ModuleError {
    pub fn unresolved(
        specifier: String,
        origin: Option<PathBuf>,
        tried_paths: Vec<ResolutionCandidate>,
        skipped_reason: Option<String>,
        fallback_message: String,
    ) -> Self {
        Self {
            kind: ModuleErrorKind::Unresolved {
                specifier,
                origin,
                tried_paths,
                skipped_reason,
                fallback_message,
            },
            source_location: None,
            dependency_chain: Vec::new(),
            suggestion: Some(
                "Check the module name, or add its directory with -M or SCRIPTC_PATH".to_string(),
            ),
        }
    }

    pub fn cycle_detected(cycle: Vec<String>) -> Self {
        Self {
            kind: ModuleErrorKind::CycleDetected { cycle },
            source_location: None,
            dependency_chain: Vec::new(),
            suggestion: Some(
                "Review your require statements to break the circular dependency".to_string(),
            ),
        }
    }

    pub fn parse_error(message: String, file: PathBuf, line: usize, column: usize) -> Self {
        Self {
            kind: ModuleErrorKind::ParseError {
                message,
                line,
                column,
            },
            source_location: Some(SourceLocation { file, line, column }),
            dependency_chain: Vec::new(),
            suggestion: None,
        }
    }

    pub fn runtime_error(message: String, location: Option<SourceLocation>) -> Self {
        Self {
            kind: ModuleErrorKind::RuntimeError { message },
            source_location: location,
            dependency_chain: Vec::new(),
            suggestion: None,
        }
    }

    pub fn io_error(path: PathBuf, message: String) -> Self {
        Self {
            kind: ModuleErrorKind::IOError { path, message },
            source_location: None,
            dependency_chain: Vec::new(),
            suggestion: None,
        }
    }

    /// Record that this error surfaced while `path` was requiring
    /// `specifier`. Called innermost first, so the chain reads from the
    /// failing module outwards.
    pub fn imported_from(mut self, path: PathBuf, specifier: String) -> Self {
        self.dependency_chain.push(DependencyInfo::new(path, specifier));
        self
    }

    pub fn with_source_location(mut self, loc: SourceLocation) -> Self {
        self.source_location = Some(loc);
        self
    }
}

impl fmt::Display for ModuleError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            ModuleErrorKind::Unresolved {
                specifier,
                origin,
                tried_paths,
                skipped_reason,
                fallback_message,
            } => {
                match origin {
                    Some(origin) => writeln!(
                        f,
                        "Module '{}' not found (required from {})",
                        specifier,
                        origin.display()
                    )?,
                    None => writeln!(f, "Module '{}' not found", specifier)?,
                }
                if let Some(ref loc) = self.source_location {
                    writeln!(f, "  at {}", loc)?;
                }
                if let Some(reason) = skipped_reason {
                    writeln!(f, "Search paths not consulted: {}", reason)?;
                }
                if !tried_paths.is_empty() {
                    writeln!(f, "\nAttempted paths:")?;
                    for candidate in tried_paths {
                        writeln!(f, "  - {}", candidate)?;
                    }
                }
                if !fallback_message.is_empty() {
                    writeln!(f, "\nDefault loader:")?;
                    for line in fallback_message.lines() {
                        writeln!(f, "  {}", line)?;
                    }
                }
            }
            ModuleErrorKind::CycleDetected { cycle } => {
                match self.source_location {
                    Some(ref loc) => writeln!(f, "Circular dependency detected at {}:", loc)?,
                    None => writeln!(f, "Circular dependency detected:")?,
                }
                writeln!(f, "{}", cycle.join(" -> "))?;
            }
            ModuleErrorKind::ParseError {
                message,
                line,
                column,
            } => {
                if let Some(ref loc) = self.source_location {
                    writeln!(
                        f,
                        "Parse error at {}:{}:{}",
                        loc.file.display(),
                        line,
                        column
                    )?;
                } else {
                    writeln!(f, "Parse error at line {}, column {}", line, column)?;
                }
                writeln!(f, "{}", message)?;
            }
            ModuleErrorKind::RuntimeError { message } => {
                if let Some(ref loc) = self.source_location {
                    writeln!(f, "Runtime error at {}", loc)?;
                } else {
                    writeln!(f, "Runtime error")?;
                }
                writeln!(f, "{}", message)?;
            }
            ModuleErrorKind::IOError { path, message } => {
                writeln!(f, "IO error reading '{}': {}", path.display(), message)?;
            }
        }

        if !self.dependency_chain.is_empty() {
            writeln!(f, "\nDependency chain:")?;
            for (i, dep) in self.dependency_chain.iter().enumerate() {
                writeln!(
                    f,
                    "  {}. {} (required as '{}')",
                    i + 1,
                    dep.path.display(),
                    dep.specifier
                )?;
            }
        }

        if let Some(ref suggestion) = self.suggestion {
            writeln!(f, "\nSuggestion: {}", suggestion)?;
        }

        Ok(())
    }
}

impl std::error::Error for ModuleError {}

pub type ModuleResult<T> = Result<T, ModuleError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::resolver::{CandidateBase, CandidateKind};

    #[test]
    fn test_unresolved_report() {
        let err = ModuleError::unresolved(
            "net.http".to_string(),
            Some(PathBuf::from("/src/main.t")),
            vec![ResolutionCandidate {
                path: PathBuf::from("/mods/net/http.t"),
                kind: CandidateKind::File,
                base: CandidateBase::SearchPath(PathBuf::from("/mods")),
            }],
            None,
            "no file './net/http.t'".to_string(),
        )
        .with_source_location(SourceLocation {
            file: PathBuf::from("/src/main.t"),
            line: 3,
            column: 1,
        })
        .imported_from(PathBuf::from("/src/app.t"), "main".to_string());

        let text = err.to_string();
        assert!(text.starts_with("Module 'net.http' not found (required from /src/main.t)\n  at /src/main.t:3:1\n"));
        assert!(text.contains("  - /mods/net/http.t (module file in search path /mods)\n"));
        assert!(text.contains("Default loader:\n  no file './net/http.t'\n"));
        assert!(text.contains("  1. /src/app.t (required as 'main')\n"));
        assert!(text.contains("Suggestion: "));
    }

    #[test]
    fn test_cycle_report() {
        let err = ModuleError::cycle_detected(vec!["a".into(), "b".into(), "a".into()]);
        assert!(err.to_string().starts_with("Circular dependency detected:\na -> b -> a\n"));
    }
}

//! Native code backend for scriptc
//!
//! Turns the exported symbols of a run into a native artefact.
//!
//! Architecture:
//! - `object.rs` - exported symbols to a relocatable object via Cranelift
//! - `linker.rs` - objects to executables and libraries via the system toolchain

pub mod linker;
pub mod object;

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::runtime::Export;

/// Artefact kind, chosen from the output file name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Object file (.o)
    Object,
    /// Static library (.a)
    StaticLib,
    /// Shared library (.so/.dylib/.dll)
    SharedLib,
    /// Executable
    #[default]
    Executable,
}

impl OutputFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("o") | Some("obj") => OutputFormat::Object,
            Some("a") | Some("lib") => OutputFormat::StaticLib,
            Some("so") | Some("dylib") | Some("dll") => OutputFormat::SharedLib,
            _ => OutputFormat::Executable,
        }
    }
}

/// Options for one emission
#[derive(Debug, Clone)]
pub struct EmitOptions {
    /// Run Cranelift's optimizer (off for debug builds)
    pub optimize: bool,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self { optimize: true }
    }
}

/// Errors that can occur during native emission
#[derive(Debug, Error)]
pub enum BackendError {
    /// Cranelift setup or code generation error
    #[error("Cranelift error: {0}")]
    Cranelift(String),
    /// Symbol declaration or definition error
    #[error("module error: {0}")]
    Module(#[from] cranelift_module::ModuleError),
    /// External linker failure
    #[error("link error: {0}")]
    Link(String),
    /// Writing the artefact failed
    #[error("failed to write '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Emit `exports` into `output`, linking with `link_flags` unless the
/// output is a plain object file.
pub fn save_obj(
    output: &Path,
    exports: &[Export],
    link_flags: &[String],
    options: &EmitOptions,
) -> Result<(), BackendError> {
    let name = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("scriptc");
    let bytes = object::emit_object(name, exports, options)?;
    let format = OutputFormat::from_path(output);
    debug!("emitting {:?} to {}", format, output.display());

    if format == OutputFormat::Object {
        return fs::write(output, bytes).map_err(|source| BackendError::Io {
            path: output.to_path_buf(),
            source,
        });
    }

    let temp = tempfile::Builder::new()
        .prefix("scriptc-")
        .suffix(".o")
        .tempfile()
        .map_err(|source| BackendError::Io {
            path: std::env::temp_dir(),
            source,
        })?;
    fs::write(temp.path(), bytes).map_err(|source| BackendError::Io {
        path: temp.path().to_path_buf(),
        source,
    })?;

    linker::link_object_files(&[temp.path().to_path_buf()], output, format, link_flags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_from_extension() {
        assert_eq!(OutputFormat::from_path(Path::new("a.o")), OutputFormat::Object);
        assert_eq!(OutputFormat::from_path(Path::new("libx.a")), OutputFormat::StaticLib);
        assert_eq!(OutputFormat::from_path(Path::new("libx.so")), OutputFormat::SharedLib);
        assert_eq!(OutputFormat::from_path(Path::new("bin/tool")), OutputFormat::Executable);
    }

    #[test]
    fn test_object_output_is_written_directly() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("answer.o");
        let exports = vec![Export {
            name: "answer".into(),
            value: crate::runtime::ExportValue::Integer(42),
        }];

        save_obj(&out, &exports, &[], &EmitOptions::default()).unwrap();
        assert!(fs::metadata(&out).unwrap().len() > 0);
    }
}

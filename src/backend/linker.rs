//! Linking support
//!
//! Turns emitted objects into executables and libraries using the system C
//! compiler driver (`$CC`, falling back to `cc`) and `ar`.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

use target_lexicon::{BinaryFormat, HOST};
use tracing::debug;

use super::{BackendError, OutputFormat};

/// Link object files into `output`, appending `link_flags` after the
/// objects so `-l` flags resolve against them.
pub fn link_object_files(
    objects: &[PathBuf],
    output: &Path,
    format: OutputFormat,
    link_flags: &[String],
) -> Result<(), BackendError> {
    let linker = detect_linker();
    let mut cmd = Command::new(&linker);

    match format {
        OutputFormat::Executable => {}
        OutputFormat::SharedLib => {
            if HOST.binary_format == BinaryFormat::Macho {
                cmd.arg("-dynamiclib");
            } else {
                cmd.arg("-shared");
            }
        }
        OutputFormat::StaticLib => {
            return create_static_library(objects, output);
        }
        OutputFormat::Object => {
            // No linking needed for object files
            return Ok(());
        }
    }

    cmd.args(objects);
    cmd.args(link_flags);
    cmd.arg("-o").arg(output);

    debug!("executing linker: {:?}", cmd);

    let result = cmd
        .output()
        .map_err(|e| BackendError::Link(format!("Failed to execute linker {}: {}", linker, e)))?;

    if !result.status.success() {
        return Err(BackendError::Link(format!(
            "{} failed with exit code {:?}: {}",
            linker,
            result.status.code(),
            String::from_utf8_lossy(&result.stderr).trim()
        )));
    }

    Ok(())
}

/// Create a static library from object files
pub fn create_static_library(objects: &[PathBuf], output: &Path) -> Result<(), BackendError> {
    let mut cmd = Command::new("ar");
    cmd.arg("rcs").arg(output);

    for obj in objects {
        cmd.arg(obj);
    }

    let status = cmd
        .status()
        .map_err(|e| BackendError::Link(format!("Failed to execute ar: {}", e)))?;

    if !status.success() {
        return Err(BackendError::Link(format!(
            "ar failed with exit code: {:?}",
            status.code()
        )));
    }

    Ok(())
}

/// `$CC` when set and non-empty, otherwise `cc`.
pub fn detect_linker() -> String {
    match env::var("CC") {
        Ok(cc) if !cc.trim().is_empty() => cc,
        _ => "cc".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_format_needs_no_linker() {
        let result = link_object_files(&[], Path::new("x.o"), OutputFormat::Object, &[]);
        assert!(result.is_ok());
    }
}

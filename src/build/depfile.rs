//! Makefile-style dependency records
//!
//! A depfile is one `target: dep dep ...` line, the format `make` and `ninja`
//! read back to decide whether the target needs rebuilding.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::module::path::relative_to;

#[derive(Debug, Error)]
pub enum DepfileError {
    #[error("failed to open depfile '{}' for writing: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot make '{}' absolute: {source}", path.display())]
    Absolute {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Render the depfile record. With `relativize_to`, the target and every
/// dependency are rewritten relative to that directory first.
pub fn format_depfile(
    target: &Path,
    deps: &[PathBuf],
    relativize_to: Option<&Path>,
) -> Result<String, DepfileError> {
    let root = relativize_to.map(absolute).transpose()?;
    let render = |path: &Path| -> Result<String, DepfileError> {
        let shown = match &root {
            Some(root) => relative_to(&absolute(path)?, root),
            None => path.to_path_buf(),
        };
        Ok(escape(&shown.to_string_lossy()))
    };

    let mut out = render(target)?;
    out.push(':');
    for dep in deps {
        out.push(' ');
        out.push_str(&render(dep)?);
    }
    out.push('\n');
    Ok(out)
}

/// Write the record for `target` to `depfile`, replacing any previous
/// contents.
pub fn emit(
    depfile: &Path,
    target: &Path,
    deps: &[PathBuf],
    relativize_to: Option<&Path>,
) -> Result<(), DepfileError> {
    let record = format_depfile(target, deps, relativize_to)?;
    debug!("writing depfile {} ({} dependencies)", depfile.display(), deps.len());
    fs::write(depfile, record).map_err(|source| DepfileError::Write {
        path: depfile.to_path_buf(),
        source,
    })
}

fn absolute(path: &Path) -> Result<PathBuf, DepfileError> {
    std::path::absolute(path).map_err(|source| DepfileError::Absolute {
        path: path.to_path_buf(),
        source,
    })
}

/// Escape the characters make and ninja treat specially in a depfile.
fn escape(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            ' ' => out.push_str("\\ "),
            '#' => out.push_str("\\#"),
            '$' => out.push_str("$$"),
            c => out.push(c),
        }
    }
    out
}

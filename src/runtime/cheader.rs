//! C header import for `includec` and `includecstring`.
//!
//! Only object-like `#define` constants are imported: integers (decimal,
//! hex, octal, with or without `U`/`L` suffixes) and string literals. A
//! define whose body is another known constant takes that constant's value.
//! Function-like macros and anything else are skipped. `#include` lines are
//! followed so constants from nested headers show up too.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, trace};

use super::value::Value;

#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("header '{name}' not found (searched: {})", display_paths(.searched))]
    NotFound { name: String, searched: Vec<PathBuf> },
    #[error("failed to read header '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "no include directories".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Constants collected from a header and the files read to get them.
#[derive(Debug, Default)]
pub struct HeaderScan {
    pub defines: BTreeMap<String, Value>,
    /// Every header file read, in the order it was opened.
    pub files: Vec<PathBuf>,
}

impl HeaderScan {
    pub fn into_table(self) -> Value {
        Value::table(self.defines)
    }
}

/// Include directories named by `-I dir` and `-Idir` flags, in order.
/// Other flags are ignored.
pub fn include_dirs(flags: &[String]) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    let mut flags = flags.iter();
    while let Some(flag) = flags.next() {
        if flag == "-I" {
            if let Some(dir) = flags.next() {
                dirs.push(PathBuf::from(dir));
            }
        } else if let Some(dir) = flag.strip_prefix("-I") {
            dirs.push(PathBuf::from(dir));
        }
    }
    dirs
}

/// Find `name` in `dirs`, then in `fallback`.
pub fn find_header(
    name: &str,
    dirs: &[PathBuf],
    fallback: Option<&Path>,
) -> Result<PathBuf, HeaderError> {
    let candidate = Path::new(name);
    if candidate.is_absolute() {
        if candidate.is_file() {
            return Ok(candidate.to_path_buf());
        }
        return Err(HeaderError::NotFound {
            name: name.to_string(),
            searched: vec![candidate.to_path_buf()],
        });
    }

    let mut searched = Vec::new();
    for dir in dirs.iter().map(PathBuf::as_path).chain(fallback) {
        let path = dir.join(name);
        trace!("looking for header {}", path.display());
        if path.is_file() {
            return Ok(path);
        }
        searched.push(path);
    }
    Err(HeaderError::NotFound {
        name: name.to_string(),
        searched,
    })
}

pub struct HeaderScanner<'a> {
    dirs: &'a [PathBuf],
    visited: HashSet<PathBuf>,
    scan: HeaderScan,
}

impl<'a> HeaderScanner<'a> {
    pub fn new(dirs: &'a [PathBuf]) -> Self {
        Self {
            dirs,
            visited: HashSet::new(),
            scan: HeaderScan::default(),
        }
    }

    /// Scan the header file at `path` and everything it includes.
    pub fn scan_file(mut self, path: &Path) -> Result<HeaderScan, HeaderError> {
        self.file(path)?;
        Ok(self.scan)
    }

    /// Scan header text. Quoted includes are looked up next to `base_dir`
    /// before the include directories.
    pub fn scan_source(mut self, source: &str, base_dir: Option<&Path>) -> Result<HeaderScan, HeaderError> {
        self.source(source, base_dir)?;
        Ok(self.scan)
    }

    fn file(&mut self, path: &Path) -> Result<(), HeaderError> {
        let path = fs::canonicalize(path).map_err(|source| HeaderError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if !self.visited.insert(path.clone()) {
            return Ok(());
        }

        debug!("reading header {}", path.display());
        let source = fs::read_to_string(&path).map_err(|source| HeaderError::Read {
            path: path.clone(),
            source,
        })?;
        self.scan.files.push(path.clone());
        self.source(&source, path.parent())
    }

    fn source(&mut self, source: &str, base_dir: Option<&Path>) -> Result<(), HeaderError> {
        for line in source.lines() {
            let Some(directive) = line.trim_start().strip_prefix('#') else {
                continue;
            };
            let directive = directive.trim_start();

            if let Some(rest) = directive.strip_prefix("include") {
                self.include(rest.trim(), base_dir)?;
            } else if let Some(rest) = directive.strip_prefix("define") {
                if rest.starts_with(char::is_whitespace) {
                    self.define(rest.trim_start());
                }
            }
        }
        Ok(())
    }

    fn include(&mut self, target: &str, base_dir: Option<&Path>) -> Result<(), HeaderError> {
        let (name, quoted) = if let Some(rest) = target.strip_prefix('"') {
            (rest.split('"').next().unwrap_or_default(), true)
        } else if let Some(rest) = target.strip_prefix('<') {
            (rest.split('>').next().unwrap_or_default(), false)
        } else {
            return Ok(());
        };

        // quoted includes look next to the including file first
        let found = if quoted {
            base_dir
                .map(|dir| dir.join(name))
                .filter(|path| path.is_file())
                .map(Ok)
                .unwrap_or_else(|| find_header(name, self.dirs, None))
        } else {
            find_header(name, self.dirs, None)
        };

        match found {
            Ok(path) => self.file(&path),
            // system headers outside the include directories
            Err(_) => {
                trace!("skipping unresolved include {}", name);
                Ok(())
            }
        }
    }

    fn define(&mut self, rest: &str) {
        let name_len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        let (name, body) = rest.split_at(name_len);
        if name.is_empty() || body.starts_with('(') {
            return;
        }

        let body = strip_comment(body).trim();
        let value = parse_constant(body).or_else(|| self.scan.defines.get(body).cloned());
        match value {
            Some(value) => {
                trace!("define {} = {}", name, value);
                self.scan.defines.insert(name.to_string(), value);
            }
            None => trace!("skipping define {}", name),
        }
    }
}

fn strip_comment(body: &str) -> &str {
    let end = [body.find("//"), body.find("/*")]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(body.len());
    &body[..end]
}

fn parse_constant(body: &str) -> Option<Value> {
    if let Some(inner) = body.strip_prefix('(').and_then(|b| b.strip_suffix(')')) {
        return parse_constant(inner.trim());
    }
    if let Some(text) = body.strip_prefix('"').and_then(|b| b.strip_suffix('"')) {
        return (!text.contains('"')).then(|| Value::string(text));
    }
    parse_integer(body).map(Value::Int)
}

fn parse_integer(body: &str) -> Option<i64> {
    let (negative, digits) = match body.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, body),
    };
    let digits = digits.trim_end_matches(['u', 'U', 'l', 'L']);

    let magnitude = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else if digits.len() > 1 && digits.starts_with('0') {
        i64::from_str_radix(&digits[1..], 8).ok()?
    } else if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        digits.parse().ok()?
    } else {
        return None;
    };

    Some(if negative { -magnitude } else { magnitude })
}

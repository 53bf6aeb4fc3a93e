//! Embedded script runtime
//!
//! The interception layer in `crate::module::loader` talks to the runtime
//! only through the [`Runtime`] trait, and the driver adds the compile half
//! of the contract through [`Toolkit`]. [`Interpreter`] is the concrete
//! runtime shipped with `scriptc`.
//!
//! - `chunk.rs` - lexer and parser for `.t` chunks
//! - `cheader.rs` - `#define` constants for `includec` and `includecstring`
//! - `value.rs` - runtime values
//! - `interp.rs` - chunk execution, built-in modules and exports

pub mod cheader;
pub mod chunk;
pub mod interp;
pub mod value;

use std::path::{Path, PathBuf};

use crate::backend::{BackendError, EmitOptions};
use crate::config::FlagSet;
use crate::module::{ImportContext, ModuleResult};

pub use chunk::{Chunk, Expr, Stmt};
pub use interp::{Interpreter, RuntimeOptions};
pub use value::Value;

/// Outcome of the runtime's own import mechanism.
#[derive(Debug, Clone)]
pub enum HostImport<V> {
    Loaded(V),
    /// Nothing matched; the text lists where the runtime looked.
    NotFound(String),
}

/// Module-loading half of the runtime contract.
pub trait Runtime {
    type Chunk;
    type Value: Clone;

    /// Load a file as an executable chunk. The chunk remembers the file it
    /// came from; that path is the origin of every `require` it evaluates.
    fn load_chunk(&mut self, path: &Path) -> ModuleResult<Self::Chunk>;

    /// Run a chunk, routing each `require` through `imports`.
    fn execute(
        &mut self,
        chunk: &Self::Chunk,
        imports: &mut ImportContext<Self::Value>,
    ) -> ModuleResult<Self::Value>;

    /// The runtime's built-in import mechanism, tried after the search-path
    /// resolver.
    fn default_import(
        &mut self,
        specifier: &str,
        _imports: &mut ImportContext<Self::Value>,
    ) -> ModuleResult<HostImport<Self::Value>> {
        Ok(HostImport::NotFound(format!(
            "no default loader available for '{}'",
            specifier
        )))
    }

    /// Locate the file behind a module name using the runtime's own search
    /// templates, without loading it.
    fn search_path(&self, name: &str) -> Option<PathBuf>;
}

/// A symbol the compiled artefact exports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub name: String,
    pub value: ExportValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportValue {
    Integer(i64),
    Bytes(Vec<u8>),
}

/// Compile half of the runtime contract.
pub trait Toolkit: Runtime {
    fn inject_flags(&mut self, flags: &FlagSet);

    /// Exported symbols in definition order.
    fn exports(&self) -> Vec<Export>;

    /// Link flags after scripts had their say.
    fn link_flags(&self) -> Vec<String>;

    fn save_obj(
        &mut self,
        output: &Path,
        exports: &[Export],
        link_flags: &[String],
        options: &EmitOptions,
    ) -> Result<(), BackendError>;
}

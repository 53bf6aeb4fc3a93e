//! `scriptc` compiles a `.t` script to a native object, library or
//! executable, resolving its imports against configurable search paths and
//! optionally writing a depfile listing every module the build read.

pub mod backend;
pub mod build;
pub mod config;
pub mod driver;
pub mod module;
pub mod runtime;

#[cfg(test)]
mod tests;

pub use config::{FlagSet, RunConfig};
pub use driver::{run, run_with, DriverError, RunOutcome};

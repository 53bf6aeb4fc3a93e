//! Build-system integration
//!
//! - `depfile.rs` - make/ninja dependency records

pub mod depfile;

pub use depfile::{emit, format_depfile, DepfileError};

//! Module resolution and dependency tracking
//!
//! Every `require` evaluated by the runtime is routed through
//! [`ImportContext::require`], which tries the search-path resolver before the
//! runtime's own loader and records each file the run depended on.
//!
//! - `path.rs` - specifier and path-list parsing
//! - `resolver.rs` - candidate generation and existence checks
//! - `cache.rs` - insert-if-absent module cache
//! - `tracker.rs` - ordered dependency record
//! - `loader.rs` - the import strategy chain
//! - `diagnostics.rs` - errors with attempted paths and import chains

pub mod cache;
pub mod diagnostics;
pub mod loader;
pub mod path;
pub mod resolver;
pub mod tracker;

pub use cache::{CachedModule, LoadSource, ModuleCache};
pub use diagnostics::{DependencyInfo, ModuleError, ModuleErrorKind, ModuleResult, SourceLocation};
pub use loader::{cache_key, ImportContext, ImportStrategy, IMPORT_STRATEGIES};
pub use path::{parse_path_list, specifier_to_path};
pub use resolver::{ModuleResolver, ResolutionCandidate, ResolveError, ResolvedModule};
pub use tracker::DependencyTracker;

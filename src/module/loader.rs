//! Import interception.
//!
//! Every `require` evaluated by the runtime lands in
//! [`ImportContext::require`]. A request is served from the module cache
//! when possible; otherwise the strategies in [`IMPORT_STRATEGIES`] are tried
//! in order and the first one that produces a module wins. The context is
//! created fresh for each compilation run and handed to the runtime
//! explicitly, so nothing about interception lives in global state.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, trace, warn};

use crate::module::cache::{LoadSource, ModuleCache};
use crate::module::diagnostics::{ModuleError, ModuleResult};
use crate::module::path;
use crate::module::resolver::{ModuleResolver, ResolutionCandidate, ResolveError};
use crate::module::tracker::DependencyTracker;
use crate::runtime::{HostImport, Runtime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStrategy {
    /// Search-path resolver: relative specifiers against the origin file,
    /// qualified ones against the configured search directories.
    Resolver,
    /// Whatever import mechanism the runtime provides itself.
    RuntimeDefault,
}

pub const IMPORT_STRATEGIES: [ImportStrategy; 2] =
    [ImportStrategy::Resolver, ImportStrategy::RuntimeDefault];

enum Attempt<V> {
    Loaded(V, LoadSource),
    Unresolved {
        reason: Option<String>,
        tried: Vec<ResolutionCandidate>,
    },
    NotFound(String),
}

/// Cache key of an import request. Relative specifiers only mean something
/// next to their origin, so the origin is part of the key.
pub fn cache_key(specifier: &str, origin: Option<&Path>) -> String {
    match origin {
        Some(origin) if path::is_relative_specifier(specifier) => {
            format!("{}@{}", specifier, origin.display())
        }
        _ => specifier.to_string(),
    }
}

pub struct ImportContext<V> {
    resolver: ModuleResolver,
    cache: ModuleCache<V>,
    tracker: DependencyTracker,
    loading: Vec<String>,
}

impl<V: Clone> ImportContext<V> {
    pub fn new(resolver: ModuleResolver) -> Self {
        Self {
            resolver,
            cache: ModuleCache::new(),
            tracker: DependencyTracker::new(),
            loading: Vec::new(),
        }
    }

    pub fn cache(&self) -> &ModuleCache<V> {
        &self.cache
    }

    pub fn tracker(&self) -> &DependencyTracker {
        &self.tracker
    }

    /// Record a non-module file the run read, such as an imported C header.
    pub fn record_dependency(&mut self, path: impl Into<PathBuf>) {
        self.tracker.record(path);
    }

    pub fn into_dependencies(self) -> Vec<PathBuf> {
        self.tracker.into_paths()
    }

    /// Serve one `require(specifier)` issued by the chunk loaded from
    /// `origin`. `origin` is `None` for chunks that were not loaded from a
    /// file; those skip the search-path resolver.
    pub fn require<R>(
        &mut self,
        runtime: &mut R,
        specifier: &str,
        origin: Option<&Path>,
    ) -> ModuleResult<V>
    where
        R: Runtime<Value = V> + ?Sized,
    {
        let key = cache_key(specifier, origin);

        if let Some(cached) = self.cache.get(&key) {
            trace!("cache hit: {}", key);
            return Ok(cached.value.clone());
        }

        if self.loading.contains(&key) {
            let mut cycle = self.loading.clone();
            cycle.push(key);
            return Err(ModuleError::cycle_detected(cycle));
        }

        self.loading.push(key.clone());
        let loaded = self.load(runtime, specifier, origin);
        self.loading.pop();

        let (value, source) = loaded?;
        self.register_module(&*runtime, &key, specifier, value.clone(), source);
        Ok(value)
    }

    /// The single write path into the module cache. On the first
    /// registration of `key`, a module produced by the runtime's own loader
    /// is located by looking `specifier` up in the runtime's search
    /// templates and recorded as a dependency.
    pub fn register_module<R>(
        &mut self,
        runtime: &R,
        key: &str,
        specifier: &str,
        value: V,
        source: LoadSource,
    ) -> bool
    where
        R: Runtime<Value = V> + ?Sized,
    {
        let tracker = &mut self.tracker;
        self.cache.register(key, value, source, |key, source| {
            info!("detected module: {}", key);
            if *source != LoadSource::Runtime {
                return;
            }

            let found = runtime
                .search_path(specifier)
                .and_then(|p| fs::canonicalize(p).ok());
            match found {
                Some(path) => {
                    info!("resolved {} -> {}", specifier, path.display());
                    tracker.record(path);
                }
                None => warn!("could not resolve module (skipping): {}", specifier),
            }
        })
    }

    fn load<R>(
        &mut self,
        runtime: &mut R,
        specifier: &str,
        origin: Option<&Path>,
    ) -> ModuleResult<(V, LoadSource)>
    where
        R: Runtime<Value = V> + ?Sized,
    {
        let mut skipped_reason = None;
        let mut tried_paths = Vec::new();
        let mut fallback_message = String::new();

        for strategy in IMPORT_STRATEGIES {
            match self.attempt(strategy, runtime, specifier, origin)? {
                Attempt::Loaded(value, source) => return Ok((value, source)),
                Attempt::Unresolved { reason, tried } => {
                    debug!(
                        "search paths did not resolve '{}' ({} candidates), falling back",
                        specifier,
                        tried.len()
                    );
                    skipped_reason = reason;
                    tried_paths = tried;
                }
                Attempt::NotFound(message) => fallback_message = message,
            }
        }

        Err(ModuleError::unresolved(
            specifier.to_string(),
            origin.map(Path::to_path_buf),
            tried_paths,
            skipped_reason,
            fallback_message,
        ))
    }

    fn attempt<R>(
        &mut self,
        strategy: ImportStrategy,
        runtime: &mut R,
        specifier: &str,
        origin: Option<&Path>,
    ) -> ModuleResult<Attempt<V>>
    where
        R: Runtime<Value = V> + ?Sized,
    {
        match strategy {
            ImportStrategy::Resolver => {
                let Some(origin) = origin else {
                    return Ok(Attempt::Unresolved {
                        reason: Some("requesting chunk was not loaded from a file".to_string()),
                        tried: Vec::new(),
                    });
                };

                match self.resolver.resolve(specifier, Some(origin)) {
                    Ok(resolved) => {
                        info!("resolved {} -> {}", specifier, resolved.path.display());
                        let value = self.run_module(runtime, &resolved.path, specifier)?;
                        self.tracker.record(resolved.path.clone());
                        Ok(Attempt::Loaded(value, LoadSource::Resolver(resolved.path)))
                    }
                    Err(ResolveError::Exhausted(failure)) => Ok(Attempt::Unresolved {
                        reason: None,
                        tried: failure.attempted,
                    }),
                    Err(err) => Ok(Attempt::Unresolved {
                        reason: Some(err.to_string()),
                        tried: Vec::new(),
                    }),
                }
            }
            ImportStrategy::RuntimeDefault => match runtime.default_import(specifier, self)? {
                HostImport::Loaded(value) => Ok(Attempt::Loaded(value, LoadSource::Runtime)),
                HostImport::NotFound(message) => Ok(Attempt::NotFound(message)),
            },
        }
    }

    fn run_module<R>(&mut self, runtime: &mut R, path: &Path, specifier: &str) -> ModuleResult<V>
    where
        R: Runtime<Value = V> + ?Sized,
    {
        let chunk = runtime
            .load_chunk(path)
            .map_err(|e| e.imported_from(path.to_path_buf(), specifier.to_string()))?;
        runtime
            .execute(&chunk, self)
            .map_err(|e| e.imported_from(path.to_path_buf(), specifier.to_string()))
    }
}

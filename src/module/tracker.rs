use std::path::PathBuf;

/// Files a compilation run depended on, in the order they were first
/// recorded.
///
/// The tracker does not deduplicate. Paths arriving through the module
/// cache hook are unique per cache key already; paths recorded by the
/// search-path resolver are appended every time that branch loads a module,
/// so a relative module required from two different origins appears twice.
#[derive(Debug, Default, Clone)]
pub struct DependencyTracker {
    paths: Vec<PathBuf>,
}

impl DependencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }

    pub fn snapshot(&self) -> Vec<PathBuf> {
        self.paths.clone()
    }

    pub fn into_paths(self) -> Vec<PathBuf> {
        self.paths
    }
}

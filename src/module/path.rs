//! Path composition for module specifiers
//!
//! Pure helpers that turn a dotted specifier into a relative filesystem path
//! and a platform path-list string into an ordered list of directories. No
//! function in this file touches the filesystem.

use std::path::{Component, Path, PathBuf};

/// Separator between the segments of a module specifier (`a.b.c`).
pub const SPECIFIER_SEPARATOR: char = '.';

/// Separator between entries of a path-list environment variable.
#[cfg(windows)]
pub const PATH_LIST_SEPARATOR: char = ';';
#[cfg(not(windows))]
pub const PATH_LIST_SEPARATOR: char = ':';

/// A module specifier split into its parent-directory climb and its tail.
///
/// `..net.http` becomes two parent levels followed by `net/http`; the
/// qualified `net.http` has no parent levels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModulePath {
    pub parents: usize,
    pub segments: Vec<String>,
}

impl ModulePath {
    pub fn is_relative(&self) -> bool {
        self.parents > 0
    }

    /// Malformed separator sequences (`a..b`, a trailing dot, a bare `..`)
    /// leave no usable segments.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Relative filesystem path, one `..` per parent marker followed by the
    /// tail segments.
    pub fn to_path(&self) -> PathBuf {
        let mut path = PathBuf::new();
        for _ in 0..self.parents {
            path.push("..");
        }
        for segment in &self.segments {
            path.push(segment);
        }
        path
    }
}

/// Characters a specifier may contain before the custom resolver will look
/// at it.
pub fn is_valid_specifier(spec: &str) -> bool {
    !spec.is_empty()
        && spec
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

pub fn is_relative_specifier(spec: &str) -> bool {
    spec.starts_with(SPECIFIER_SEPARATOR)
}

/// Split a specifier into parent markers and dotted tail segments.
pub fn parse_specifier(spec: &str) -> ModulePath {
    let tail = spec.trim_start_matches(SPECIFIER_SEPARATOR);
    let parents = spec.len() - tail.len();

    let segments: Vec<String> = tail.split(SPECIFIER_SEPARATOR).map(str::to_string).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return ModulePath {
            parents,
            segments: Vec::new(),
        };
    }

    ModulePath { parents, segments }
}

pub fn specifier_to_path(spec: &str) -> PathBuf {
    parse_specifier(spec).to_path()
}

/// Split a path-list value (`PATH`-style) into directories, dropping empty
/// entries.
pub fn parse_path_list(env_value: &str) -> Vec<PathBuf> {
    env_value
        .split(PATH_LIST_SEPARATOR)
        .filter(|entry| !entry.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Collapse `.` and `..` components without consulting the filesystem.
/// `..` at the root stays at the root.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Express `path` relative to `base`. Both should be absolute; the result
/// climbs out of `base` with `..` as far as needed.
pub fn relative_to(path: &Path, base: &Path) -> PathBuf {
    let path = normalize_lexically(path);
    let base = normalize_lexically(base);

    let path_parts: Vec<Component> = path.components().collect();
    let base_parts: Vec<Component> = base.components().collect();

    let common = path_parts
        .iter()
        .zip(base_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for _ in common..base_parts.len() {
        rel.push("..");
    }
    for part in &path_parts[common..] {
        rel.push(part.as_os_str());
    }

    if rel.as_os_str().is_empty() {
        rel.push(".");
    }
    rel
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_specifier() {
        assert_eq!(specifier_to_path("net.http"), PathBuf::from("net/http"));
        assert_eq!(specifier_to_path("core"), PathBuf::from("core"));
    }

    #[test]
    fn test_relative_specifier_climbs_once_per_marker() {
        assert_eq!(specifier_to_path(".util"), PathBuf::from("../util"));
        assert_eq!(specifier_to_path("..lib.math"), PathBuf::from("../../lib/math"));

        let parsed = parse_specifier("...x");
        assert_eq!(parsed.parents, 3);
        assert_eq!(parsed.segments, vec!["x".to_string()]);
    }

    #[test]
    fn test_malformed_separators_yield_no_segments() {
        assert!(parse_specifier("a..b").is_empty());
        assert!(parse_specifier("a.").is_empty());
        assert!(parse_specifier("..").is_empty());
        assert!(!parse_specifier("a.b").is_empty());
    }

    #[test]
    fn test_specifier_character_set() {
        assert!(is_valid_specifier("my-mod_2.sub"));
        assert!(!is_valid_specifier("a/b"));
        assert!(!is_valid_specifier("a b"));
        assert!(!is_valid_specifier(""));
    }

    #[cfg(not(windows))]
    #[test]
    fn test_parse_path_list_drops_empty_entries() {
        assert_eq!(
            parse_path_list("/a::/b:"),
            vec![PathBuf::from("/a"), PathBuf::from("/b")]
        );
        assert!(parse_path_list("").is_empty());
        assert!(parse_path_list(":::").is_empty());
    }

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(normalize_lexically(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
        assert_eq!(normalize_lexically(Path::new("/a/../..")), PathBuf::from("/"));
        assert_eq!(normalize_lexically(Path::new("../x")), PathBuf::from("../x"));
    }

    #[test]
    fn test_relative_to() {
        assert_eq!(
            relative_to(Path::new("/out/a.o"), Path::new("/src")),
            PathBuf::from("../out/a.o")
        );
        assert_eq!(
            relative_to(Path::new("/src/a.t"), Path::new("/src")),
            PathBuf::from("a.t")
        );
        assert_eq!(relative_to(Path::new("/src"), Path::new("/src")), PathBuf::from("."));
    }
}

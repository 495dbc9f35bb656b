//! Example registry: curated snippets keyed by declaring type, method, and arity.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::error::Error;

/// Lookup key for an example snippet.
///
/// Overloads are told apart only by parameter count, so two overloads with
/// the same arity share one entry and variadic methods match a single arity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExampleKey {
    /// Method name.
    pub method: String,
    /// Number of parameters.
    pub parameter_count: usize,
    /// Fully qualified declaring type.
    pub qualified_type: String,
}

impl ExampleKey {
    /// Registry key string: `<type>.<method><count>`.
    pub fn lookup_key(&self) -> String {
        return format!("{}.{}{}", self.qualified_type, self.method, self.parameter_count);
    }
}

/// Registered entries: lookup key to resource path.
static REGISTRY: LazyLock<BTreeMap<&'static str, &'static str>> = LazyLock::new(|| {
    return BTreeMap::from([
        ("java.util.stream.Collectors.groupingBy1", "/examples/Collectors/Collectors.groupingBy.html"),
        ("java.util.stream.Collectors.groupingBy2", "/examples/Collectors/Collectors.groupingBy.html"),
        ("java.util.stream.Collectors.groupingBy3", "/examples/Collectors/Collectors.groupingBy.html"),
        ("java.util.stream.Stream.allMatch1", "/examples/Stream/Stream.allMatch1.html"),
        ("java.util.stream.Stream.anyMatch1", "/examples/Stream/Stream.anyMatch1.html"),
        ("java.util.stream.Stream.flatMap1", "/examples/Stream/Stream.flatMap1.html"),
        ("java.util.stream.Stream.map1", "/examples/Stream/Stream.map1.html"),
        ("java.util.stream.Stream.noneMatch1", "/examples/Stream/Stream.noneMatch1.html"),
    ]);
});

/// Resource path registered for a key. Exact match only.
pub fn lookup(key: &ExampleKey) -> Option<&'static str> {
    return REGISTRY.get(key.lookup_key().as_str()).copied();
}

/// Every registered `(lookup key, resource path)` pair, sorted by key.
pub fn entries() -> impl Iterator<Item = (&'static str, &'static str)> {
    return REGISTRY.iter().map(|(k, v)| return (*k, *v));
}

/// Loads snippet resources by registry path.
pub trait SnippetLoader: Send + Sync {
    /// Resource contents, verbatim.
    ///
    /// # Errors
    ///
    /// Returns `Error::ResourceNotFound` for unknown paths, or `Error::Io` on read failure.
    fn load(&self, path: &str) -> Result<String, Error>;
}

/// Snippets compiled into the binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedSnippets;

/// Embedded resource table.
const EMBEDDED: &[(&str, &str)] = &[
    (
        "/examples/Collectors/Collectors.groupingBy.html",
        include_str!("../resources/examples/Collectors/Collectors.groupingBy.html"),
    ),
    (
        "/examples/Stream/Stream.allMatch1.html",
        include_str!("../resources/examples/Stream/Stream.allMatch1.html"),
    ),
    (
        "/examples/Stream/Stream.anyMatch1.html",
        include_str!("../resources/examples/Stream/Stream.anyMatch1.html"),
    ),
    (
        "/examples/Stream/Stream.flatMap1.html",
        include_str!("../resources/examples/Stream/Stream.flatMap1.html"),
    ),
    (
        "/examples/Stream/Stream.map1.html",
        include_str!("../resources/examples/Stream/Stream.map1.html"),
    ),
    (
        "/examples/Stream/Stream.noneMatch1.html",
        include_str!("../resources/examples/Stream/Stream.noneMatch1.html"),
    ),
];

impl SnippetLoader for EmbeddedSnippets {
    fn load(&self, path: &str) -> Result<String, Error> {
        return EMBEDDED
            .iter()
            .find(|(p, _)| return *p == path)
            .map(|(_, text)| return (*text).to_string())
            .ok_or_else(|| return Error::ResourceNotFound { path: path.to_string() });
    }
}

/// Snippets read from a directory laid out like the resource tree.
#[derive(Debug, Clone)]
pub struct DirectorySnippets {
    /// Directory the `/examples/...` paths are resolved against.
    root: PathBuf,
}

impl DirectorySnippets {
    /// Loader rooted at a resource directory.
    pub fn new(root: &Path) -> Self {
        return Self {
            root: root.to_path_buf(),
        };
    }
}

impl SnippetLoader for DirectorySnippets {
    fn load(&self, path: &str) -> Result<String, Error> {
        let full = self.root.join(path.trim_start_matches('/'));
        return match std::fs::read_to_string(&full) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::ResourceNotFound { path: path.to_string() })
            },
            Err(e) => Err(Error::Io(e)),
            Ok(text) => Ok(text),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grouping_by(count: usize) -> ExampleKey {
        return ExampleKey {
            method: "groupingBy".to_string(),
            parameter_count: count,
            qualified_type: "java.util.stream.Collectors".to_string(),
        };
    }

    #[test]
    fn lookup_key_appends_arity() {
        assert_eq!(grouping_by(2).lookup_key(), "java.util.stream.Collectors.groupingBy2");
    }

    #[test]
    fn registered_arities_hit_and_others_miss() {
        for count in 1..=3 {
            assert_eq!(
                lookup(&grouping_by(count)),
                Some("/examples/Collectors/Collectors.groupingBy.html")
            );
        }
        assert_eq!(lookup(&grouping_by(4)), None);
        assert_eq!(lookup(&grouping_by(0)), None);
    }

    #[test]
    fn every_registered_path_is_embedded() {
        for (key, path) in entries() {
            let text = EmbeddedSnippets.load(path).unwrap_or_else(|e| panic!("{key}: {e}"));
            assert!(text.starts_with("<h3>"), "{path} is not an html fragment");
        }
    }

    #[test]
    fn unknown_resource_is_reported() {
        assert!(matches!(
            EmbeddedSnippets.load("/examples/Nope.html"),
            Err(Error::ResourceNotFound { .. })
        ));
    }

    #[test]
    fn directory_loader_reads_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("examples/Stream")).unwrap();
        std::fs::write(dir.path().join("examples/Stream/Stream.map1.html"), "<p>map</p>\n").unwrap();
        let loader = DirectorySnippets::new(dir.path());
        assert_eq!(loader.load("/examples/Stream/Stream.map1.html").unwrap(), "<p>map</p>\n");
        assert!(matches!(
            loader.load("/examples/Stream/Stream.filter1.html"),
            Err(Error::ResourceNotFound { .. })
        ));
    }
}

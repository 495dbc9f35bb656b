use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;

/// Default debounce between a fetch trigger and its execution.
const DEFAULT_DEBOUNCE_MS: u64 = 10;

/// Default synchronous wait for target resolution before falling back to a callback.
const DEFAULT_RESOLVE_TIMEOUT_MS: u64 = 50;

/// Default upper bound a worker waits for a still-pending target.
const DEFAULT_FETCH_WAIT_MS: u64 = 5_000;

/// Default auto-update tick interval while the tool window is visible.
const DEFAULT_AUTO_UPDATE_INTERVAL_MS: u64 = 500;

/// Default number of background workers.
const DEFAULT_WORKER_THREADS: usize = 2;

/// Maximum source file size (16 MiB).
const DEFAULT_MAX_FILE_BYTES: u64 = 16 * 1024 * 1024;

/// Path prefixes skipped when loading a project unless `exclude` is set.
const DEFAULT_EXCLUDE: &[&str] = &["target/", ".git/"];

/// Runtime configuration loaded from `.quickdoc.toml`.
/// Every key is optional; missing keys keep their defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Interval between auto-update ticks.
    pub auto_update_interval: Duration,
    /// Debounce delay applied to every scheduled fetch.
    pub debounce: Duration,
    /// Path prefixes never loaded as project sources.
    pub exclude: Vec<String>,
    /// Upper bound a worker waits for a pending target element.
    pub fetch_wait: Duration,
    /// Path prefixes loaded as project sources. Empty means everything.
    pub include: Vec<String>,
    /// Source files larger than this are rejected.
    pub max_file_bytes: u64,
    /// Synchronous wait for target resolution on the UI thread.
    pub resolve_timeout: Duration,
    /// Directory of snippet overrides, relative to the project root.
    pub snippets_dir: Option<PathBuf>,
    /// Identifier of the documentation tool window.
    pub tool_window_id: String,
    /// Size of the background worker pool.
    pub worker_threads: usize,
}

/// Raw TOML structure for `.quickdoc.toml`.
#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct QuickdocTomlConfig {
    /// See `Config::auto_update_interval`.
    auto_update_interval_ms: Option<u64>,
    /// See `Config::debounce`.
    debounce_ms: Option<u64>,
    /// See `Config::exclude`. Replaces the default list when set.
    exclude: Option<Vec<String>>,
    /// See `Config::fetch_wait`.
    fetch_wait_ms: Option<u64>,
    /// See `Config::include`.
    #[serde(default)]
    pub include: Vec<String>,
    /// See `Config::max_file_bytes`.
    max_file_bytes: Option<u64>,
    /// See `Config::resolve_timeout`.
    resolve_timeout_ms: Option<u64>,
    /// See `Config::snippets_dir`.
    snippets_dir: Option<PathBuf>,
    /// See `Config::tool_window_id`.
    tool_window_id: Option<String>,
    /// See `Config::worker_threads`.
    worker_threads: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        return Self {
            auto_update_interval: Duration::from_millis(DEFAULT_AUTO_UPDATE_INTERVAL_MS),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            exclude: DEFAULT_EXCLUDE.iter().map(|p| return (*p).to_string()).collect(),
            fetch_wait: Duration::from_millis(DEFAULT_FETCH_WAIT_MS),
            include: Vec::new(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            resolve_timeout: Duration::from_millis(DEFAULT_RESOLVE_TIMEOUT_MS),
            snippets_dir: None,
            tool_window_id: "Documentation".to_string(),
            worker_threads: DEFAULT_WORKER_THREADS,
        };
    }
}

impl Config {
    /// Load config from `.quickdoc.toml` in the given root directory.
    /// Returns defaults if the file doesn't exist.
    /// Returns an error if the file exists but is malformed: never silently
    /// falls back to defaults when the user wrote a config file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading fails (other than not-found),
    /// or `Error::TomlDe` if the TOML is malformed.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let path = root.join(".quickdoc.toml");
        let content = match std::fs::read_to_string(&path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(Error::Io(e)),
            Ok(c) => c,
        };
        return Self::parse(&content);
    }

    /// Parse config from TOML content, filling unset keys with defaults.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlDe` if the TOML is malformed or has unknown keys.
    pub fn parse(content: &str) -> Result<Self, Error> {
        let raw: QuickdocTomlConfig = toml::from_str(content)?;
        let defaults = Self::default();
        return Ok(Self {
            auto_update_interval: raw
                .auto_update_interval_ms
                .map_or(defaults.auto_update_interval, Duration::from_millis),
            debounce: raw.debounce_ms.map_or(defaults.debounce, Duration::from_millis),
            exclude: raw.exclude.unwrap_or(defaults.exclude),
            fetch_wait: raw.fetch_wait_ms.map_or(defaults.fetch_wait, Duration::from_millis),
            include: raw.include,
            max_file_bytes: raw.max_file_bytes.unwrap_or(defaults.max_file_bytes),
            resolve_timeout: raw
                .resolve_timeout_ms
                .map_or(defaults.resolve_timeout, Duration::from_millis),
            snippets_dir: raw.snippets_dir,
            tool_window_id: raw.tool_window_id.unwrap_or(defaults.tool_window_id),
            // A pool of zero would never run anything.
            worker_threads: raw.worker_threads.unwrap_or(defaults.worker_threads).max(1),
        });
    }

    /// Whether a project-relative path is loaded as a source file.
    ///
    /// With include prefixes set, a path must start with one of them.
    /// An included path is then dropped if it starts with any exclude prefix.
    pub fn should_load(&self, relative_path: &str) -> bool {
        let included = self.include.is_empty()
            || self.include.iter().any(|p| return relative_path.starts_with(p.as_str()));
        if !included {
            return false;
        }
        return !self.exclude.iter().any(|p| return relative_path.starts_with(p.as_str()));
    }
}

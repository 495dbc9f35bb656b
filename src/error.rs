/// Crate-level error types for quickdoc.
use std::path::PathBuf;

/// All errors in quickdoc carry enough context to produce a useful message
/// without a debugger. Each variant names the file, resource, or reason for failure.
#[allow(clippy::error_impl_error, reason = "crate-level error type")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A referenced source file does not exist on disk.
    #[error("file not found: {}", path.display())]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// Source file exceeds the configured size limit.
    #[error("file too large ({size_bytes} bytes, max {max_bytes}): {}", file.display())]
    FileTooLarge {
        /// File that exceeded the size limit.
        file: PathBuf,
        /// Maximum allowed file size in bytes.
        max_bytes: u64,
        /// Actual file size in bytes.
        size_bytes: u64,
    },

    /// The project index is still being built; cross-file lookups are unavailable.
    #[error("index not ready")]
    IndexNotReady,

    /// Underlying I/O error from the filesystem or thread spawning.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// Tree-sitter failed to parse a source file.
    #[error("parse failed: {}: {reason}", file.display())]
    ParseFailed {
        /// File that failed to parse.
        file: PathBuf,
        /// Description of the parse failure.
        reason: String,
    },

    /// A documentation provider failed while generating text.
    #[error("provider `{provider}` failed: {reason}")]
    Provider {
        /// Name of the failing provider.
        provider: &'static str,
        /// Description of the failure.
        reason: String,
    },

    /// An example snippet resource is registered but cannot be loaded.
    #[error("example resource not found: {path}")]
    ResourceNotFound {
        /// Classpath-style resource path that was requested.
        path: String,
    },

    /// Settings file exists but holds an unusable value.
    #[error("settings corrupt: {reason}")]
    SettingsCorrupt {
        /// Description of the corruption.
        reason: String,
    },

    /// TOML deserialization failed.
    #[error("toml deserialize: {0}")]
    TomlDe(
        /// The wrapped TOML deserialization error.
        #[from]
        toml::de::Error,
    ),

    /// TOML serialization failed.
    #[error("toml serialize: {0}")]
    TomlSer(
        /// The wrapped TOML serialization error.
        #[from]
        toml::ser::Error,
    ),

    /// A file id or path is not part of the source tree.
    #[error("unknown file: {}", path.display())]
    UnknownFile {
        /// Path (or id rendering) that was not found in the tree.
        path: PathBuf,
    },

    /// No tree-sitter grammar registered for this file extension.
    #[error("no grammar for extension: .{ext}")]
    UnsupportedLanguage {
        /// File extension without the leading dot.
        ext: String,
    },
}

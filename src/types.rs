/// Core domain types: ids, languages, element keys, and revalidatable element handles.
use std::fmt;
use std::sync::Arc;

/// Identifies the project a source tree belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProjectId(
    /// Raw project number.
    pub u32,
);

/// Index of a file inside its `SourceTree`. Stable across edits of that file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(
    /// Raw position in the tree's file table.
    pub u32,
);

/// Identifies one display surface (popup or tool window) owned by a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(
    /// Raw surface number, unique per manager.
    pub u64,
);

/// Identifies one scheduled fetch. Later jobs always have larger ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(
    /// Raw monotonically increasing job number.
    pub u64,
);

/// Source languages with a grammar and documentation provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Language {
    /// Java sources (`.java`).
    Java,
    /// Rust sources (`.rs`).
    Rust,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return match self {
            Language::Java => f.write_str("Java"),
            Language::Rust => f.write_str("Rust"),
        };
    }
}

/// Stable logical identity of a program element.
///
/// Structural keys (declarations, externals, files) survive re-parsing as long
/// as the symbol still exists. Positional keys (calls, comments) are only valid
/// for the file generation they were minted against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementKey {
    /// A call expression, keyed by the byte offset where it starts.
    Call {
        /// File containing the call.
        file: FileId,
        /// Start byte of the call expression.
        start: usize,
    },
    /// A comment, keyed by the byte offset where it starts.
    Comment {
        /// File containing the comment.
        file: FileId,
        /// Start byte of the comment.
        start: usize,
    },
    /// A declaration inside a project file.
    Declaration {
        /// File declaring the element.
        file: FileId,
        /// Parameter count for callables, `None` for types and fields.
        parameter_count: Option<usize>,
        /// Dot-qualified name, e.g. `com.acme.Words.byLength`.
        qualified_name: String,
    },
    /// A member of a type that lives outside the project (JDK, std, libraries).
    External {
        /// Qualified declaring type, e.g. `java.util.stream.Collectors`.
        declaring_type: String,
        /// Language the external member belongs to.
        language: Language,
        /// Member name.
        name: String,
        /// Number of parameters at the call site.
        parameter_count: usize,
    },
    /// A whole source file.
    File(FileId),
}

impl ElementKey {
    /// Positional keys go stale as soon as their file is re-parsed.
    pub const fn is_positional(&self) -> bool {
        return matches!(self, ElementKey::Call { .. } | ElementKey::Comment { .. });
    }

    /// The project file this key points into, if any.
    pub const fn file(&self) -> Option<FileId> {
        return match self {
            ElementKey::Call { file, .. }
            | ElementKey::Comment { file, .. }
            | ElementKey::Declaration { file, .. }
            | ElementKey::File(file) => Some(*file),
            ElementKey::External { .. } => None,
        };
    }
}

impl fmt::Display for ElementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return match self {
            ElementKey::Call { file, start } => write!(f, "call:{}@{start}", file.0),
            ElementKey::Comment { file, start } => write!(f, "comment:{}@{start}", file.0),
            ElementKey::Declaration {
                file,
                parameter_count: Some(count),
                qualified_name,
            } => write!(f, "decl:{}#{qualified_name}/{count}", file.0),
            ElementKey::Declaration {
                file,
                parameter_count: None,
                qualified_name,
            } => write!(f, "decl:{}#{qualified_name}", file.0),
            ElementKey::External {
                declaring_type,
                language,
                name,
                parameter_count,
            } => write!(f, "ext:{language}:{declaring_type}.{name}/{parameter_count}"),
            ElementKey::File(file) => write!(f, "file:{}", file.0),
        };
    }
}

/// Revalidatable handle to a program element.
///
/// Holds only the logical key plus the generation it was minted against; the
/// element itself is re-looked-up in the current tree on every use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef {
    /// File generation (positional keys) or tree generation (others) at mint time.
    pub generation: u64,
    /// Stable logical id of the element.
    pub key: ElementKey,
    /// Context element that led to this target, used for call-site documentation.
    pub original: Option<Arc<ElementRef>>,
    /// Project that owns the element.
    pub project: ProjectId,
}

impl ElementRef {
    /// Attach (or clear) the context element that led to this target.
    #[must_use]
    pub fn with_original(mut self, original: Option<ElementRef>) -> Self {
        if let Some(original) = original {
            // Never chain originals: the context is always a leaf handle.
            self.original = Some(Arc::new(original.without_original()));
        }
        return self;
    }

    /// Copy of this handle without its original-element back reference.
    #[must_use]
    pub fn without_original(mut self) -> Self {
        self.original = None;
        return self;
    }

    /// The context element that led to this target, if recorded.
    pub fn original(&self) -> Option<&ElementRef> {
        return self.original.as_deref();
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "{}@{}", self.key, self.generation);
    }
}

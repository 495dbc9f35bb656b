//! In-memory source model: parsed files, per-file element index, and the
//! generation counters that make element handles revalidatable.

mod java;
mod rust;

use std::collections::HashMap;
use std::ops::Range;
use std::path::{Path, PathBuf};

use tree_sitter::{Node, Parser};

use crate::error::Error;
use crate::examples::ExampleKey;
use crate::grammar;
use crate::types::{ElementKey, ElementRef, FileId, Language, ProjectId};

pub use java::{resolve_type_name as resolve_java_type, STREAM_PRODUCERS};

/// What kind of thing a declaration declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    /// A field, constant, or static.
    Field,
    /// A method, constructor, or function.
    Member {
        /// Declared parameter count, excluding any receiver.
        parameter_count: usize,
    },
    /// A class, interface, enum, record, struct, or trait.
    Type,
}

/// A named declaration found while walking the syntax tree.
#[derive(Debug, Clone)]
pub struct Declaration {
    /// Byte range of the whole declaration node.
    pub byte_range: Range<usize>,
    /// Qualified name of the enclosing type, if any.
    pub declaring_type: Option<String>,
    /// Raw text of the attached doc comment(s).
    pub doc: Option<String>,
    /// Kind of declaration.
    pub kind: DeclarationKind,
    /// Simple name.
    pub name: String,
    /// Byte range of the name identifier.
    pub name_range: Range<usize>,
    /// Dot-qualified name, e.g. `com.acme.Words.byLength`.
    pub qualified_name: String,
    /// Declaration header with whitespace collapsed, without the body.
    pub signature: String,
}

impl Declaration {
    /// Parameter count for callables.
    pub const fn parameter_count(&self) -> Option<usize> {
        return match self.kind {
            DeclarationKind::Member { parameter_count } => Some(parameter_count),
            DeclarationKind::Field | DeclarationKind::Type => None,
        };
    }
}

/// What a call is invoked on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Receiver {
    /// Any other expression; `last_call` names the call ending the receiver chain.
    Expression {
        /// Name of the call the receiver ends with, e.g. `stream` in `words.stream().map(f)`.
        last_call: Option<String>,
        /// Source text of the receiver.
        text: String,
    },
    /// Unqualified call such as `foo(x)`.
    None,
    /// `this`, `super`, `self`, or `Self`.
    SelfRef,
    /// A type name or path such as `Collectors` or `std::fs`.
    Type(String),
}

/// A call expression found while walking the syntax tree.
#[derive(Debug, Clone)]
pub struct CallSite {
    /// Number of arguments at the call site.
    pub argument_count: usize,
    /// Byte range of the argument list, parentheses included.
    pub arguments_range: Range<usize>,
    /// Byte range of the whole call expression.
    pub byte_range: Range<usize>,
    /// Qualified name of the type the call appears in.
    pub enclosing_type: Option<String>,
    /// Called name.
    pub name: String,
    /// Byte range of the called name.
    pub name_range: Range<usize>,
    /// What the call is invoked on.
    pub receiver: Receiver,
}

/// A comment found while walking the syntax tree.
#[derive(Debug, Clone)]
pub struct CommentSpan {
    /// Byte range of the comment.
    pub byte_range: Range<usize>,
    /// Documentation comment (`/** */`, `///`) rather than a plain one.
    pub doc: bool,
    /// Declaration this doc comment documents.
    pub owner: Option<usize>,
    /// Start byte of the node following the comment, used to link `owner`.
    owner_start: Option<usize>,
    /// Innermost declaration containing the comment.
    pub parent: Option<usize>,
}

/// An import or use declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// Static (member) import.
    pub is_static: bool,
    /// Imported path without the trailing `.*`.
    pub path: String,
    /// Imports everything under `path`.
    pub wildcard: bool,
}

/// Everything the resolver needs to know about one parsed file.
#[derive(Debug, Clone, Default)]
pub struct FileIndex {
    /// Call expressions in source order.
    pub calls: Vec<CallSite>,
    /// Comments in source order.
    pub comments: Vec<CommentSpan>,
    /// Declarations in source order.
    pub declarations: Vec<Declaration>,
    /// Imports in source order.
    pub imports: Vec<Import>,
    /// Package declaration, if the language has one.
    pub package: Option<String>,
}

/// One file of the source tree.
#[derive(Debug)]
pub struct SourceFile {
    /// Bumped every time this file's text changes.
    pub generation: u64,
    /// Position in the tree.
    pub id: FileId,
    /// Element index built from the last parse.
    pub index: FileIndex,
    /// Language of the file.
    pub language: Language,
    /// Path relative to the project root.
    pub path: PathBuf,
    /// Set once the file leaves the project; its elements are invalid from then on.
    removed: bool,
    /// Current text.
    pub text: String,
}

impl SourceFile {
    /// Language of the file's view provider. Files here are single-language.
    pub const fn base_language(&self) -> Language {
        return self.language;
    }

    /// The full line of text containing `offset`, trimmed.
    pub fn line_at(&self, offset: usize) -> Option<&str> {
        let offset = offset.min(self.text.len());
        let start = self.text.get(..offset)?.rfind('\n').map_or(0, |i| return i.saturating_add(1));
        let rest = self.text.get(start..)?;
        let line = rest.split('\n').next()?;
        return Some(line.trim());
    }
}

/// What kind of element a handle resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementKind {
    /// A call expression; a reference in documentation terms.
    Call {
        /// Number of arguments at the call site.
        argument_count: usize,
        /// What the call is invoked on.
        receiver: Receiver,
    },
    /// A comment.
    Comment {
        /// Documentation comment rather than a plain one.
        doc: bool,
    },
    /// A field, constant, or static.
    Field {
        /// Qualified enclosing type.
        declaring_type: Option<String>,
    },
    /// A whole file.
    File,
    /// A method, constructor, or function, either in the project or external.
    Member {
        /// Qualified enclosing type, `None` for free functions.
        declaring_type: Option<String>,
        /// Raw doc comment text.
        doc: Option<String>,
        /// Declared outside the project.
        external: bool,
        /// Parameter count.
        parameter_count: usize,
        /// Declaration header.
        signature: String,
    },
    /// A type declaration.
    Type {
        /// Raw doc comment text.
        doc: Option<String>,
        /// Dot-qualified name.
        qualified_name: String,
    },
}

/// A snapshot of one element, looked up from an `ElementRef` in the current tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Containing file; `None` for external elements.
    pub file: Option<FileId>,
    /// Logical id.
    pub key: ElementKey,
    /// Shape of the element.
    pub kind: ElementKind,
    /// Language of the element itself.
    pub language: Language,
    /// Simple name, used for titles.
    pub name: String,
    /// Byte range in the containing file.
    pub range: Option<Range<usize>>,
}

impl Element {
    /// Call expressions are references: their documentation comes from a provider.
    pub const fn is_reference(&self) -> bool {
        return matches!(self.kind, ElementKind::Call { .. });
    }

    /// Example lookup key for a member with an enclosing declaring type.
    pub fn example_key(&self) -> Option<ExampleKey> {
        let ElementKind::Member {
            declaring_type: Some(declaring_type),
            parameter_count,
            ..
        } = &self.kind
        else {
            return None;
        };
        return Some(ExampleKey {
            method: self.name.clone(),
            parameter_count: *parameter_count,
            qualified_type: declaring_type.clone(),
        });
    }
}

/// All parsed files of one project plus the modification counters.
///
/// Shared between the UI thread and background workers behind a read-write lock.
#[derive(Debug)]
pub struct SourceTree {
    /// Path lookup.
    by_path: HashMap<PathBuf, FileId>,
    /// File table indexed by `FileId`.
    files: Vec<SourceFile>,
    /// Project-wide modification stamp; bumped on every edit.
    generation: u64,
    /// Set while the project index is being (re)built.
    indexing: bool,
    /// Files larger than this are rejected.
    max_file_bytes: u64,
    /// Owning project.
    project: ProjectId,
}

impl SourceTree {
    /// Empty tree for a project.
    pub fn new(project: ProjectId, max_file_bytes: u64) -> Self {
        return Self {
            by_path: HashMap::new(),
            files: Vec::new(),
            generation: 0,
            indexing: false,
            max_file_bytes,
            project,
        };
    }

    /// Project that owns this tree.
    pub const fn project(&self) -> ProjectId {
        return self.project;
    }

    /// Current modification stamp. Any edit anywhere in the project changes it.
    pub const fn modification_stamp(&self) -> u64 {
        return self.generation;
    }

    /// Mark the project index as being rebuilt; cross-file lookups fail with `IndexNotReady`.
    pub fn begin_indexing(&mut self) {
        self.indexing = true;
    }

    /// Mark the project index as ready.
    pub fn finish_indexing(&mut self) {
        self.indexing = false;
    }

    /// Whether cross-file lookups are currently unavailable.
    pub const fn is_indexing(&self) -> bool {
        return self.indexing;
    }

    /// Add a file, or replace the text of an existing file at the same path.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedLanguage`, `Error::FileTooLarge`, or `Error::ParseFailed`.
    pub fn add_file(&mut self, path: &Path, text: &str) -> Result<FileId, Error> {
        if let Some(id) = self.by_path.get(path).copied() {
            self.edit_file(id, text)?;
            return Ok(id);
        }
        let language = grammar::language_for_path(path)?;
        let index = self.parse(path, text, language)?;
        let raw = u32::try_from(self.files.len()).map_err(|_err| {
            return Error::ParseFailed {
                file: path.to_path_buf(),
                reason: "too many files in project".to_string(),
            };
        })?;
        let id = FileId(raw);
        self.generation = self.generation.saturating_add(1);
        self.files.push(SourceFile {
            generation: self.generation,
            id,
            index,
            language,
            path: path.to_path_buf(),
            removed: false,
            text: text.to_string(),
        });
        self.by_path.insert(path.to_path_buf(), id);
        return Ok(id);
    }

    /// Replace a file's text and re-index it.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownFile` for removed or unknown ids,
    /// `Error::FileTooLarge`, or `Error::ParseFailed`.
    pub fn edit_file(&mut self, id: FileId, text: &str) -> Result<(), Error> {
        let (path, language) = {
            let file = self.file(id).ok_or_else(|| return unknown_file(id))?;
            (file.path.clone(), file.language)
        };
        let index = self.parse(&path, text, language)?;
        self.generation = self.generation.saturating_add(1);
        let generation = self.generation;
        let file = self.file_mut(id).ok_or_else(|| return unknown_file(id))?;
        file.text = text.to_string();
        file.index = index;
        file.generation = generation;
        return Ok(());
    }

    /// Remove a file. Every element inside it becomes invalid.
    pub fn remove_file(&mut self, id: FileId) {
        let Some(file) = self.file_mut(id) else {
            return;
        };
        file.removed = true;
        let path = file.path.clone();
        self.by_path.remove(&path);
        self.generation = self.generation.saturating_add(1);
    }

    /// A live file by id.
    pub fn file(&self, id: FileId) -> Option<&SourceFile> {
        let idx = usize::try_from(id.0).ok()?;
        return self.files.get(idx).filter(|f| return !f.removed);
    }

    /// Mutable access to a live file.
    fn file_mut(&mut self, id: FileId) -> Option<&mut SourceFile> {
        let idx = usize::try_from(id.0).ok()?;
        return self.files.get_mut(idx).filter(|f| return !f.removed);
    }

    /// A live file by path.
    pub fn file_by_path(&self, path: &Path) -> Option<FileId> {
        return self.by_path.get(path).copied();
    }

    /// All live files.
    pub fn files(&self) -> impl Iterator<Item = &SourceFile> {
        return self.files.iter().filter(|f| return !f.removed);
    }

    /// Parse and index source text.
    ///
    /// # Errors
    ///
    /// Returns `Error::FileTooLarge` or `Error::ParseFailed`.
    fn parse(&self, path: &Path, text: &str, language: Language) -> Result<FileIndex, Error> {
        let len: u64 = text.len().try_into().unwrap_or(u64::MAX);
        if len > self.max_file_bytes {
            return Err(Error::FileTooLarge {
                file: path.to_path_buf(),
                max_bytes: self.max_file_bytes,
                size_bytes: len,
            });
        }

        let mut parser = Parser::new();
        parser
            .set_language(&grammar::tree_sitter_language(language))
            .map_err(|e| {
                return Error::ParseFailed {
                    file: path.to_path_buf(),
                    reason: e.to_string(),
                };
            })?;
        let tree = parser.parse(text, None).ok_or_else(|| {
            return Error::ParseFailed {
                file: path.to_path_buf(),
                reason: "tree-sitter returned None".to_string(),
            };
        })?;

        let mut builder = IndexBuilder::new(text);
        match language {
            Language::Java => java::index(tree.root_node(), &mut builder),
            Language::Rust => rust::index(tree.root_node(), &mut builder),
        }
        return Ok(builder.finish());
    }

    // ── Handles ────────────────────────────────────────────────────────

    /// Mint a handle for a key against the current generation.
    pub fn mint(&self, key: ElementKey) -> ElementRef {
        let generation = if key.is_positional() {
            key.file()
                .and_then(|f| return self.file(f))
                .map_or(self.generation, |f| return f.generation)
        } else {
            self.generation
        };
        return ElementRef {
            generation,
            key,
            original: None,
            project: self.project,
        };
    }

    /// Re-look-up a handle in the current tree. `None` once the element is gone or stale.
    pub fn element(&self, handle: &ElementRef) -> Option<Element> {
        if handle.project != self.project {
            return None;
        }
        return match &handle.key {
            ElementKey::Call { file, start } => {
                let file = self.file(*file).filter(|f| return f.generation == handle.generation)?;
                let call = file.index.calls.iter().find(|c| return c.byte_range.start == *start)?;
                Some(Element {
                    file: Some(file.id),
                    key: handle.key.clone(),
                    kind: ElementKind::Call {
                        argument_count: call.argument_count,
                        receiver: call.receiver.clone(),
                    },
                    language: file.language,
                    name: call.name.clone(),
                    range: Some(call.byte_range.clone()),
                })
            },
            ElementKey::Comment { file, start } => {
                let file = self.file(*file).filter(|f| return f.generation == handle.generation)?;
                let comment = file.index.comments.iter().find(|c| return c.byte_range.start == *start)?;
                Some(Element {
                    file: Some(file.id),
                    key: handle.key.clone(),
                    kind: ElementKind::Comment { doc: comment.doc },
                    language: file.language,
                    name: String::new(),
                    range: Some(comment.byte_range.clone()),
                })
            },
            ElementKey::Declaration {
                file,
                parameter_count,
                qualified_name,
            } => {
                let file = self.file(*file)?;
                let decl = file.index.declarations.iter().find(|d| {
                    return d.qualified_name == *qualified_name && d.parameter_count() == *parameter_count;
                })?;
                Some(declaration_element(file, decl, handle.key.clone()))
            },
            ElementKey::External {
                declaring_type,
                language,
                name,
                parameter_count,
            } => Some(Element {
                file: None,
                key: handle.key.clone(),
                kind: ElementKind::Member {
                    declaring_type: Some(declaring_type.clone()),
                    doc: None,
                    external: true,
                    parameter_count: *parameter_count,
                    signature: format!("{declaring_type}.{name}({parameter_count} parameters)"),
                },
                language: *language,
                name: name.clone(),
                range: None,
            }),
            ElementKey::File(id) => {
                let file = self.file(*id)?;
                Some(Element {
                    file: Some(file.id),
                    key: handle.key.clone(),
                    kind: ElementKind::File,
                    language: file.language,
                    name: file
                        .path
                        .file_name()
                        .map_or_else(String::new, |n| return n.to_string_lossy().into_owned()),
                    range: Some(0..file.text.len()),
                })
            },
        };
    }

    /// Whether a handle still resolves in the current tree.
    pub fn is_valid(&self, handle: &ElementRef) -> bool {
        return self.element(handle).is_some();
    }

    /// Structural equivalence: both handles are live and name the same logical element,
    /// even if they were minted against different generations.
    pub fn are_equivalent(&self, a: &ElementRef, b: &ElementRef) -> bool {
        return a.project == b.project && a.key == b.key && self.is_valid(a) && self.is_valid(b);
    }

    // ── Offset queries ─────────────────────────────────────────────────

    /// The leaf-most element at an offset: comment, call, declaration name, enclosing
    /// declaration, or the file itself. Used as the "original" context element.
    pub fn context_element(&self, file_id: FileId, offset: usize) -> Option<ElementRef> {
        let file = self.file(file_id)?;
        if let Some(comment) = self.comment_at(file_id, offset) {
            return Some(self.mint(ElementKey::Comment {
                file: file_id,
                start: comment.byte_range.start,
            }));
        }
        if let Some(call) = innermost(file.index.calls.iter(), offset, |c| return &c.byte_range) {
            return Some(self.mint(ElementKey::Call {
                file: file_id,
                start: call.byte_range.start,
            }));
        }
        if let Some(key) = self.declaration_at(file_id, offset) {
            return Some(self.mint(key));
        }
        if let Some(decl) = innermost(file.index.declarations.iter(), offset, |d| return &d.byte_range) {
            return Some(self.mint(declaration_key(file_id, decl)));
        }
        return Some(self.mint(ElementKey::File(file_id)));
    }

    /// Declaration whose name is under the caret.
    pub fn declaration_at(&self, file_id: FileId, offset: usize) -> Option<ElementKey> {
        let file = self.file(file_id)?;
        let decl = file
            .index
            .declarations
            .iter()
            .find(|d| return contains_inclusive(&d.name_range, offset))?;
        return Some(declaration_key(file_id, decl));
    }

    /// Declaration whose header (modifiers, return type, name) contains the caret.
    pub fn declaration_header_at(&self, file_id: FileId, offset: usize) -> Option<ElementKey> {
        let file = self.file(file_id)?;
        let decl = file
            .index
            .declarations
            .iter()
            .filter(|d| return d.byte_range.start <= offset && offset <= d.name_range.end)
            .min_by_key(|d| return d.name_range.end.saturating_sub(d.byte_range.start))?;
        return Some(declaration_key(file_id, decl));
    }

    /// Call whose name is under the caret.
    pub fn call_at(&self, file_id: FileId, offset: usize) -> Option<&CallSite> {
        let file = self.file(file_id)?;
        return file.index.calls.iter().find(|c| return contains_inclusive(&c.name_range, offset));
    }

    /// Innermost call whose argument list strictly contains the caret.
    pub fn enclosing_call_arguments(&self, file_id: FileId, offset: usize) -> Option<&CallSite> {
        let file = self.file(file_id)?;
        return file
            .index
            .calls
            .iter()
            .filter(|c| return c.arguments_range.start < offset && offset < c.arguments_range.end)
            .min_by_key(|c| return c.arguments_range.len());
    }

    /// Comment containing the caret.
    pub fn comment_at(&self, file_id: FileId, offset: usize) -> Option<&CommentSpan> {
        let file = self.file(file_id)?;
        return file
            .index
            .comments
            .iter()
            .find(|c| return c.byte_range.start <= offset && offset < c.byte_range.end);
    }

    /// Key of a file's declaration by index.
    pub fn declaration_key_at_index(&self, file_id: FileId, idx: usize) -> Option<ElementKey> {
        let decl = self.file(file_id)?.index.declarations.get(idx)?;
        return Some(declaration_key(file_id, decl));
    }

    // ── Resolution ─────────────────────────────────────────────────────

    /// Generic target resolution at an offset: a declaration name resolves to itself,
    /// a call name resolves to the declaration it invokes.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownFile` for dead files, or `Error::IndexNotReady`
    /// if resolving the call needs the project index while it is being built.
    pub fn find_target_element(&self, file_id: FileId, offset: usize) -> Result<Option<ElementKey>, Error> {
        if self.file(file_id).is_none() {
            return Err(unknown_file(file_id));
        }
        if let Some(key) = self.declaration_at(file_id, offset) {
            return Ok(Some(key));
        }
        let Some(call) = self.call_at(file_id, offset) else {
            return Ok(None);
        };
        return self.resolve_call(file_id, call);
    }

    /// Resolve what a call invokes, per the file's language rules.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownFile` or `Error::IndexNotReady`.
    pub fn resolve_call(&self, file_id: FileId, call: &CallSite) -> Result<Option<ElementKey>, Error> {
        let file = self.file(file_id).ok_or_else(|| return unknown_file(file_id))?;
        return match file.language {
            Language::Java => java::resolve_call(self, file, call),
            Language::Rust => rust::resolve_call(self, file, call),
        };
    }

    /// Fail fast when a lookup needs the project index and it is not ready.
    ///
    /// # Errors
    ///
    /// Returns `Error::IndexNotReady` while indexing.
    fn require_index(&self) -> Result<(), Error> {
        if self.indexing {
            return Err(Error::IndexNotReady);
        }
        return Ok(());
    }

    /// Project-wide lookup of a type by qualified name.
    ///
    /// # Errors
    ///
    /// Returns `Error::IndexNotReady` while indexing.
    pub fn find_type(&self, qualified_name: &str) -> Result<Option<ElementKey>, Error> {
        self.require_index()?;
        for file in self.files() {
            let found = file
                .index
                .declarations
                .iter()
                .find(|d| return d.kind == DeclarationKind::Type && d.qualified_name == qualified_name);
            if let Some(decl) = found {
                return Ok(Some(declaration_key(file.id, decl)));
            }
        }
        return Ok(None);
    }

    /// Project-wide lookup of a member of a type by name and parameter count.
    ///
    /// # Errors
    ///
    /// Returns `Error::IndexNotReady` while indexing.
    pub fn find_member(
        &self,
        declaring_type: &str,
        name: &str,
        parameter_count: usize,
    ) -> Result<Option<ElementKey>, Error> {
        self.require_index()?;
        for file in self.files() {
            let found = file.index.declarations.iter().find(|d| {
                return d.declaring_type.as_deref() == Some(declaring_type)
                    && d.name == name
                    && d.parameter_count() == Some(parameter_count);
            });
            if let Some(decl) = found {
                return Ok(Some(declaration_key(file.id, decl)));
            }
        }
        return Ok(None);
    }

    /// Project-wide lookup of every member with a name and parameter count.
    ///
    /// # Errors
    ///
    /// Returns `Error::IndexNotReady` while indexing.
    pub fn find_members_named(&self, name: &str, parameter_count: usize) -> Result<Vec<ElementKey>, Error> {
        self.require_index()?;
        let mut found = Vec::new();
        for file in self.files() {
            for decl in &file.index.declarations {
                if decl.name == name && decl.parameter_count() == Some(parameter_count) {
                    found.push(declaration_key(file.id, decl));
                }
            }
        }
        return Ok(found);
    }
}

/// Error for an id that is not a live file.
fn unknown_file(id: FileId) -> Error {
    return Error::UnknownFile {
        path: PathBuf::from(format!("#{}", id.0)),
    };
}

/// `start <= offset <= end`: a caret right after an identifier still targets it.
const fn contains_inclusive(range: &Range<usize>, offset: usize) -> bool {
    return range.start <= offset && offset <= range.end;
}

/// Smallest item whose range contains the offset.
fn innermost<'a, T, I, F>(items: I, offset: usize, range: F) -> Option<&'a T>
where
    I: Iterator<Item = &'a T>,
    F: Fn(&T) -> &Range<usize>,
    T: 'a,
{
    return items
        .filter(|item| return contains_inclusive(range(item), offset))
        .min_by_key(|item| return range(item).len());
}

/// Structural key for a declaration.
fn declaration_key(file: FileId, decl: &Declaration) -> ElementKey {
    return ElementKey::Declaration {
        file,
        parameter_count: decl.parameter_count(),
        qualified_name: decl.qualified_name.clone(),
    };
}

/// Element snapshot for a declaration.
fn declaration_element(file: &SourceFile, decl: &Declaration, key: ElementKey) -> Element {
    let kind = match decl.kind {
        DeclarationKind::Field => ElementKind::Field {
            declaring_type: decl.declaring_type.clone(),
        },
        DeclarationKind::Member { parameter_count } => ElementKind::Member {
            declaring_type: decl.declaring_type.clone(),
            doc: decl.doc.clone(),
            external: false,
            parameter_count,
            signature: decl.signature.clone(),
        },
        DeclarationKind::Type => ElementKind::Type {
            doc: decl.doc.clone(),
            qualified_name: decl.qualified_name.clone(),
        },
    };
    return Element {
        file: Some(file.id),
        key,
        kind,
        language: file.language,
        name: decl.name.clone(),
        range: Some(decl.byte_range.clone()),
    };
}

/// Accumulates one file's index during a syntax walk.
pub(crate) struct IndexBuilder<'s> {
    /// Index under construction.
    index: FileIndex,
    /// Source text being indexed.
    source: &'s str,
}

impl<'s> IndexBuilder<'s> {
    /// Start indexing a source text.
    const fn new(source: &'s str) -> Self {
        return Self {
            index: FileIndex {
                calls: Vec::new(),
                comments: Vec::new(),
                declarations: Vec::new(),
                imports: Vec::new(),
                package: None,
            },
            source,
        };
    }

    /// UTF-8 text of a node; empty on invalid ranges.
    fn text(&self, node: Node<'_>) -> &'s str {
        return node.utf8_text(self.source.as_bytes()).unwrap_or("");
    }

    /// Header text from the node start up to `end`, whitespace collapsed.
    fn signature(&self, start: usize, end: usize) -> String {
        let raw = self.source.get(start..end).unwrap_or("");
        return raw.split_whitespace().collect::<Vec<_>>().join(" ");
    }

    /// Record a declaration.
    fn push_declaration(&mut self, decl: Declaration) {
        self.index.declarations.push(decl);
    }

    /// Record a call.
    fn push_call(&mut self, call: CallSite) {
        self.index.calls.push(call);
    }

    /// Record a comment; `owner_start` is the start of the node it documents.
    fn push_comment(&mut self, byte_range: Range<usize>, doc: bool, owner_start: Option<usize>) {
        self.index.comments.push(CommentSpan {
            byte_range,
            doc,
            owner: None,
            owner_start,
            parent: None,
        });
    }

    /// Record an import.
    fn push_import(&mut self, import: Import) {
        self.index.imports.push(import);
    }

    /// Record the package declaration.
    fn set_package(&mut self, package: String) {
        self.index.package = Some(package);
    }

    /// Link comments to their owners and parents, attach doc text to declarations.
    fn finish(mut self) -> FileIndex {
        let declarations = &self.index.declarations;
        for comment in &mut self.index.comments {
            comment.owner = comment.owner_start.and_then(|start| {
                return declarations.iter().position(|d| return d.byte_range.start == start);
            });
            comment.parent = declarations
                .iter()
                .enumerate()
                .filter(|(_, d)| {
                    return d.byte_range.start <= comment.byte_range.start
                        && comment.byte_range.end <= d.byte_range.end;
                })
                .min_by_key(|(_, d)| return d.byte_range.len())
                .map(|(i, _)| return i);
        }

        let mut docs: Vec<Option<String>> = vec![None; self.index.declarations.len()];
        for comment in &self.index.comments {
            let (true, Some(owner)) = (comment.doc, comment.owner) else {
                continue;
            };
            let text = self.source.get(comment.byte_range.clone()).unwrap_or("");
            if let Some(slot) = docs.get_mut(owner) {
                match slot {
                    Some(existing) => {
                        existing.push('\n');
                        existing.push_str(text);
                    },
                    None => *slot = Some(text.to_string()),
                }
            }
        }
        for (decl, doc) in self.index.declarations.iter_mut().zip(docs) {
            decl.doc = doc;
        }
        return self.index;
    }
}

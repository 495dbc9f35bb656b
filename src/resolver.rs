//! Target resolution: an editing context becomes the single element to document.

use crate::error::Error;
use crate::providers::{CompositeProvider, DocumentationProvider, ProviderRegistry};
use crate::source::SourceTree;
use crate::types::{ElementKey, ElementRef, FileId, ProjectId};

/// The highlighted entry of an active completion list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupItem {
    /// Parameter count of the proposed callable, if it is one.
    pub arity: Option<usize>,
    /// Proposed name.
    pub label: String,
    /// Type the proposal is qualified with, e.g. `Collectors`.
    pub qualifier: Option<String>,
    /// Element the completion engine attached to the item.
    pub target: Option<ElementRef>,
}

/// Where the user is: file, caret offset, and the active completion item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorContext {
    /// File being edited.
    pub file: FileId,
    /// Highlighted completion item, when a completion list is active.
    pub lookup: Option<LookupItem>,
    /// Caret byte offset.
    pub offset: usize,
}

impl EditorContext {
    /// Context without an active completion list.
    pub const fn at(file: FileId, offset: usize) -> Self {
        return Self {
            file,
            lookup: None,
            offset,
        };
    }
}

/// Outcome of one resolution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The project index is being built; try again later.
    NotReady,
    /// Nothing documentable at the caret.
    Nothing,
    /// The element to document, carrying the context element it was found from.
    Target(ElementRef),
}

impl Resolution {
    /// The resolved element, if any.
    pub const fn target(&self) -> Option<&ElementRef> {
        return match self {
            Resolution::Target(element) => Some(element),
            Resolution::NotReady | Resolution::Nothing => None,
        };
    }
}

/// Resolves editing contexts against one project's source tree.
#[derive(Debug, Clone)]
pub struct TargetResolver {
    /// Project every resolved element must belong to.
    project: ProjectId,
    /// Documentation providers by language.
    providers: ProviderRegistry,
}

impl TargetResolver {
    /// Resolver for a project.
    pub const fn new(project: ProjectId, providers: ProviderRegistry) -> Self {
        return Self { project, providers };
    }

    /// Registered providers.
    pub const fn providers(&self) -> &ProviderRegistry {
        return &self.providers;
    }

    /// Resolve a context. Never fails: a missing index is reported as `NotReady`,
    /// anything else unexpected as `Nothing`.
    ///
    /// # Panics
    ///
    /// Panics if a provider hands back an element from another project.
    pub fn resolve(&self, tree: &SourceTree, context: &EditorContext) -> Resolution {
        return match self.try_resolve(tree, context) {
            Ok(Some(element)) => Resolution::Target(element),
            Ok(None) => Resolution::Nothing,
            Err(Error::IndexNotReady) => {
                tracing::warn!(file = context.file.0, offset = context.offset, "resolve.index_not_ready");
                Resolution::NotReady
            },
            Err(e) => {
                tracing::warn!(file = context.file.0, offset = context.offset, error = %e, "resolve.failed");
                Resolution::Nothing
            },
        };
    }

    /// Resolve a `psi_element://` reference: context providers first, then every provider.
    ///
    /// # Errors
    ///
    /// Returns `Error::IndexNotReady` while indexing.
    pub fn resolve_link(
        &self,
        tree: &SourceTree,
        reference: &str,
        context: Option<&ElementRef>,
    ) -> Result<Option<ElementRef>, Error> {
        let context_element = context.and_then(|c| return tree.element(c));
        let scoped = self.providers.for_element(tree, context_element.as_ref(), None);
        let key = match scoped.element_for_link(tree, reference, context)? {
            Some(key) => Some(key),
            None => self.providers.all().element_for_link(tree, reference, context)?,
        };
        return Ok(key.map(|k| {
            let element = tree.mint(k).with_original(context.cloned());
            return self.assert_same_project(element);
        }));
    }

    /// Full resolution chain.
    ///
    /// # Errors
    ///
    /// Returns `Error::IndexNotReady` or `Error::UnknownFile`.
    fn try_resolve(&self, tree: &SourceTree, context: &EditorContext) -> Result<Option<ElementRef>, Error> {
        let original = tree.context_element(context.file, context.offset);
        let providers = self.providers.for_file(tree, context.file);
        let key = Self::find_key(tree, context, original.as_ref(), &providers)?;
        return Ok(key.map(|k| return self.assert_same_project(tree.mint(k).with_original(original))));
    }

    /// First match wins: lookup item, provider custom element, generic target
    /// (adjusted by providers), the call itself, the call whose arguments hold
    /// the caret, then the declaration a comment belongs to.
    fn find_key(
        tree: &SourceTree,
        context: &EditorContext,
        original: Option<&ElementRef>,
        providers: &CompositeProvider,
    ) -> Result<Option<ElementKey>, Error> {
        let (file, offset) = (context.file, context.offset);

        if let Some(item) = &context.lookup {
            let from_provider = match original {
                Some(c) => providers.element_for_lookup_item(tree, item, c)?,
                None => None,
            };
            let own = item
                .target
                .as_ref()
                .filter(|t| return tree.is_valid(t))
                .map(|t| return t.key.clone());
            return Ok(from_provider.or(own));
        }

        if let Some(key) = providers.custom_element(tree, file, offset, original)? {
            return Ok(Some(key));
        }

        let raw = tree.find_target_element(file, offset)?;
        if (raw.is_some() || original.is_some())
            && let Some(adjusted) = providers.adjust_element(tree, file, offset, raw.as_ref())
        {
            return Ok(Some(adjusted));
        }
        if raw.is_some() {
            return Ok(raw);
        }

        if let Some(call) = tree.call_at(file, offset) {
            return Ok(Some(ElementKey::Call {
                file,
                start: call.byte_range.start,
            }));
        }

        if let Some(call) = tree.enclosing_call_arguments(file, offset) {
            let start = call.byte_range.start;
            let key = match providers.custom_element(tree, file, call.name_range.start, original)? {
                Some(key) => Some(key),
                None => tree.resolve_call(file, call)?,
            };
            return Ok(Some(key.unwrap_or(ElementKey::Call { file, start })));
        }

        if let Some(comment) = tree.comment_at(file, offset) {
            let idx = if comment.doc {
                comment.owner.or(comment.parent)
            } else {
                comment.parent
            };
            return Ok(idx.and_then(|i| return tree.declaration_key_at_index(file, i)));
        }

        return Ok(None);
    }

    /// Elements from another project mean the host wired managers up wrong.
    fn assert_same_project(&self, element: ElementRef) -> ElementRef {
        assert!(
            element.project == self.project,
            "element {element} belongs to project {} but this resolver serves project {}",
            element.project.0,
            self.project.0
        );
        return element;
    }
}

//! Language documentation providers and their composition.

pub mod java;
pub mod rust;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::Error;
use crate::resolver::LookupItem;
use crate::source::{CallSite, Element, Receiver, SourceTree};
use crate::types::{ElementKey, ElementRef, FileId, Language};

/// Per-language hooks used by target resolution and documentation generation.
///
/// Every hook has a neutral default so a provider only implements what its
/// language needs.
pub trait DocumentationProvider: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Provider-specific target at the caret, consulted before generic resolution.
    ///
    /// # Errors
    ///
    /// Returns `Error::IndexNotReady` if the hook needs the project index during indexing.
    fn custom_element(
        &self,
        _tree: &SourceTree,
        _file: FileId,
        _offset: usize,
        _context: Option<&ElementRef>,
    ) -> Result<Option<ElementKey>, Error> {
        return Ok(None);
    }

    /// Replace or supply the generic resolution result.
    ///
    /// With nothing resolved, a caret inside a declaration header documents that declaration.
    fn adjust_element(
        &self,
        tree: &SourceTree,
        file: FileId,
        offset: usize,
        raw: Option<&ElementKey>,
    ) -> Option<ElementKey> {
        if raw.is_some() {
            return None;
        }
        return tree.declaration_header_at(file, offset);
    }

    /// Element documented for the highlighted completion item.
    ///
    /// # Errors
    ///
    /// Returns `Error::IndexNotReady` if the hook needs the project index during indexing.
    fn element_for_lookup_item(
        &self,
        _tree: &SourceTree,
        _item: &LookupItem,
        _context: &ElementRef,
    ) -> Result<Option<ElementKey>, Error> {
        return Ok(None);
    }

    /// Element a `psi_element://` link reference points at.
    ///
    /// # Errors
    ///
    /// Returns `Error::IndexNotReady` if the hook needs the project index during indexing.
    fn element_for_link(
        &self,
        _tree: &SourceTree,
        _reference: &str,
        _context: Option<&ElementRef>,
    ) -> Result<Option<ElementKey>, Error> {
        return Ok(None);
    }

    /// Full documentation for an element, with the call site that led to it.
    ///
    /// # Errors
    ///
    /// Returns `Error::IndexNotReady` or `Error::Provider` when generation fails.
    fn generate_doc(
        &self,
        _tree: &SourceTree,
        _element: &Element,
        _original: Option<&Element>,
    ) -> Result<Option<String>, Error> {
        return Ok(None);
    }

    /// Documentation shown while hovering; full documentation unless overridden.
    ///
    /// # Errors
    ///
    /// Same as `generate_doc`.
    fn generate_hover_doc(
        &self,
        tree: &SourceTree,
        element: &Element,
        original: Option<&Element>,
    ) -> Result<Option<String>, Error> {
        return self.generate_doc(tree, element, original);
    }
}

/// Several providers viewed as one: each hook returns the first non-empty answer.
#[derive(Clone, Default)]
pub struct CompositeProvider {
    /// Providers in priority order.
    providers: Vec<Arc<dyn DocumentationProvider>>,
}

impl std::fmt::Debug for CompositeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.providers.iter().map(|p| return p.name()).collect();
        return f.debug_struct("CompositeProvider").field("providers", &names).finish();
    }
}

impl CompositeProvider {
    /// Compose providers, keeping their order.
    pub fn new(providers: Vec<Arc<dyn DocumentationProvider>>) -> Self {
        return Self { providers };
    }

    /// Names of the composed providers, in priority order.
    pub fn names(&self) -> Vec<&'static str> {
        return self.providers.iter().map(|p| return p.name()).collect();
    }

    /// Whether no provider is composed.
    pub fn is_empty(&self) -> bool {
        return self.providers.is_empty();
    }
}

impl DocumentationProvider for CompositeProvider {
    fn name(&self) -> &'static str {
        return "composite";
    }

    fn custom_element(
        &self,
        tree: &SourceTree,
        file: FileId,
        offset: usize,
        context: Option<&ElementRef>,
    ) -> Result<Option<ElementKey>, Error> {
        for provider in &self.providers {
            if let Some(key) = provider.custom_element(tree, file, offset, context)? {
                return Ok(Some(key));
            }
        }
        return Ok(None);
    }

    fn adjust_element(
        &self,
        tree: &SourceTree,
        file: FileId,
        offset: usize,
        raw: Option<&ElementKey>,
    ) -> Option<ElementKey> {
        return self
            .providers
            .iter()
            .find_map(|p| return p.adjust_element(tree, file, offset, raw));
    }

    fn element_for_lookup_item(
        &self,
        tree: &SourceTree,
        item: &LookupItem,
        context: &ElementRef,
    ) -> Result<Option<ElementKey>, Error> {
        for provider in &self.providers {
            if let Some(key) = provider.element_for_lookup_item(tree, item, context)? {
                return Ok(Some(key));
            }
        }
        return Ok(None);
    }

    fn element_for_link(
        &self,
        tree: &SourceTree,
        reference: &str,
        context: Option<&ElementRef>,
    ) -> Result<Option<ElementKey>, Error> {
        for provider in &self.providers {
            if let Some(key) = provider.element_for_link(tree, reference, context)? {
                return Ok(Some(key));
            }
        }
        return Ok(None);
    }

    fn generate_doc(
        &self,
        tree: &SourceTree,
        element: &Element,
        original: Option<&Element>,
    ) -> Result<Option<String>, Error> {
        for provider in &self.providers {
            if let Some(text) = provider.generate_doc(tree, element, original)? {
                return Ok(Some(text));
            }
        }
        return Ok(None);
    }

    fn generate_hover_doc(
        &self,
        tree: &SourceTree,
        element: &Element,
        original: Option<&Element>,
    ) -> Result<Option<String>, Error> {
        for provider in &self.providers {
            if let Some(text) = provider.generate_hover_doc(tree, element, original)? {
                return Ok(Some(text));
            }
        }
        return Ok(None);
    }
}

/// Providers registered per language.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    /// Provider for each language.
    by_language: BTreeMap<Language, Arc<dyn DocumentationProvider>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return f
            .debug_map()
            .entries(self.by_language.iter().map(|(l, p)| return (l, p.name())))
            .finish();
    }
}

impl ProviderRegistry {
    /// Registry with the built-in Java and Rust providers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::default();
        registry.register(Language::Java, Arc::new(java::JavaProvider));
        registry.register(Language::Rust, Arc::new(rust::RustProvider));
        return registry;
    }

    /// Register (or replace) the provider for a language.
    pub fn register(&mut self, language: Language, provider: Arc<dyn DocumentationProvider>) {
        self.by_language.insert(language, provider);
    }

    /// Provider registered for a language.
    pub fn for_language(&self, language: Language) -> Option<Arc<dyn DocumentationProvider>> {
        return self.by_language.get(&language).cloned();
    }

    /// Every registered provider, used as the last resort for link resolution.
    pub fn all(&self) -> CompositeProvider {
        return CompositeProvider::new(self.by_language.values().cloned().collect());
    }

    /// Providers for an element: the element's own language when it differs from
    /// its containing file, then the containing file's language, then the file's
    /// base language. The containing file is taken from `original` when given.
    pub fn for_element(&self, tree: &SourceTree, element: Option<&Element>, original: Option<&Element>) -> CompositeProvider {
        let containing = original
            .and_then(|o| return o.file)
            .or_else(|| return element.and_then(|e| return e.file))
            .and_then(|id| return tree.file(id));
        let file_language = containing.map(|f| return f.language);

        let mut languages: Vec<Language> = Vec::new();
        if let Some(element) = element {
            if file_language != Some(element.language) {
                languages.push(element.language);
            }
        }
        if let Some(file) = containing {
            languages.push(file.language);
            languages.push(file.base_language());
        }

        let mut providers: Vec<Arc<dyn DocumentationProvider>> = Vec::new();
        let mut seen: Vec<Language> = Vec::new();
        for language in languages {
            if seen.contains(&language) {
                continue;
            }
            seen.push(language);
            if let Some(provider) = self.for_language(language) {
                providers.push(provider);
            }
        }
        return CompositeProvider::new(providers);
    }

    /// Providers for a file.
    pub fn for_file(&self, tree: &SourceTree, file: FileId) -> CompositeProvider {
        let handle = tree.mint(ElementKey::File(file));
        let element = tree.element(&handle);
        return self.for_element(tree, element.as_ref(), None);
    }
}

/// A parsed `psi_element://` reference: `Type`, `Type.member`, or `Type.member/arity`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTarget {
    /// Parameter count, when the link names one.
    pub arity: Option<usize>,
    /// Member name, when the link names one.
    pub member: Option<String>,
    /// Type part as written.
    pub type_name: String,
}

impl LinkTarget {
    /// Split a reference. `::` separators are accepted as `.`.
    pub fn parse(reference: &str) -> Option<Self> {
        let normalized = reference.trim().replace("::", ".");
        let (path, arity) = match normalized.split_once('/') {
            Some((path, arity)) => (path.to_string(), Some(arity.parse::<usize>().ok()?)),
            None => (normalized, None),
        };
        if path.is_empty() {
            return None;
        }
        let Some((type_name, last)) = path.rsplit_once('.') else {
            return Some(Self {
                arity,
                member: None,
                type_name: path,
            });
        };
        if last.chars().next().is_some_and(char::is_lowercase) {
            return Some(Self {
                arity,
                member: Some(last.to_string()),
                type_name: type_name.to_string(),
            });
        }
        return Some(Self {
            arity,
            member: None,
            type_name: path.clone(),
        });
    }
}

/// Resolve `Type.member(arity)` through a file's language rules, as if it were a call.
///
/// # Errors
///
/// Returns `Error::IndexNotReady` while indexing.
pub fn resolve_qualified_member(
    tree: &SourceTree,
    file: FileId,
    type_name: &str,
    member: &str,
    arity: usize,
) -> Result<Option<ElementKey>, Error> {
    let call = CallSite {
        argument_count: arity,
        arguments_range: 0..0,
        byte_range: 0..0,
        enclosing_type: None,
        name: member.to_string(),
        name_range: 0..0,
        receiver: Receiver::Type(type_name.to_string()),
    };
    return tree.resolve_call(file, &call);
}

/// Escape text for inclusion in an HTML fragment.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    return out;
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::types::ProjectId;

    /// Provider that answers every hook with a fixed value.
    struct Fixed(&'static str);

    impl DocumentationProvider for Fixed {
        fn name(&self) -> &'static str {
            return self.0;
        }

        fn generate_doc(
            &self,
            _tree: &SourceTree,
            _element: &Element,
            _original: Option<&Element>,
        ) -> Result<Option<String>, Error> {
            return Ok(Some(self.0.to_string()));
        }
    }

    /// Provider that never answers.
    struct Silent;

    impl DocumentationProvider for Silent {
        fn name(&self) -> &'static str {
            return "silent";
        }
    }

    #[test]
    fn composite_returns_first_answer() {
        let mut tree = SourceTree::new(ProjectId(1), 1024);
        let id = tree.add_file(Path::new("a.rs"), "fn a() {}").unwrap();
        let element = tree.element(&tree.mint(ElementKey::File(id))).unwrap();
        let composite = CompositeProvider::new(vec![Arc::new(Silent), Arc::new(Fixed("first")), Arc::new(Fixed("second"))]);
        assert_eq!(composite.generate_doc(&tree, &element, None).unwrap().as_deref(), Some("first"));
        assert_eq!(composite.generate_hover_doc(&tree, &element, None).unwrap().as_deref(), Some("first"));
    }

    #[test]
    fn element_language_comes_before_file_language() {
        let mut tree = SourceTree::new(ProjectId(1), 1024);
        let rust_file = tree.add_file(Path::new("a.rs"), "fn a() {}").unwrap();
        let registry = ProviderRegistry::with_defaults();

        let java_external = tree
            .element(&tree.mint(ElementKey::External {
                declaring_type: "java.util.List".to_string(),
                language: Language::Java,
                name: "size".to_string(),
                parameter_count: 0,
            }))
            .unwrap();
        let context = tree.element(&tree.mint(ElementKey::File(rust_file))).unwrap();

        let composite = registry.for_element(&tree, Some(&java_external), Some(&context));
        assert_eq!(composite.names(), vec!["java", "rust"]);

        let same_language = registry.for_file(&tree, rust_file);
        assert_eq!(same_language.names(), vec!["rust"]);
    }

    #[test]
    fn link_targets_split_type_member_and_arity() {
        assert_eq!(
            LinkTarget::parse("java.util.stream.Collectors.groupingBy/2"),
            Some(LinkTarget {
                arity: Some(2),
                member: Some("groupingBy".to_string()),
                type_name: "java.util.stream.Collectors".to_string(),
            })
        );
        assert_eq!(
            LinkTarget::parse("java.util.List"),
            Some(LinkTarget {
                arity: None,
                member: None,
                type_name: "java.util.List".to_string(),
            })
        );
        assert_eq!(
            LinkTarget::parse("Circle::area").and_then(|l| l.member),
            Some("area".to_string())
        );
        assert_eq!(LinkTarget::parse("Foo.bar/x"), None);
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_html("Map<K, V> & \"x\""), "Map&lt;K, V&gt; &amp; &quot;x&quot;");
    }
}

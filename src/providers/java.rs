//! Java documentation: stream-pipeline targets, lookup items, links, and Javadoc rendering.

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::{escape_html, resolve_qualified_member, DocumentationProvider, LinkTarget};
use crate::error::Error;
use crate::link::element_url;
use crate::resolver::LookupItem;
use crate::source::{resolve_java_type, CallSite, Element, ElementKind, Receiver, SourceTree, STREAM_PRODUCERS};
use crate::types::{ElementKey, ElementRef, FileId, Language};

/// Declaring type of every stream pipeline stage.
const STREAM_TYPE: &str = "java.util.stream.Stream";

/// `{@code text}`.
static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| return Regex::new(r"\{@code\s+([^}]*)\}").expect("valid regex"));

/// `{@link Type#member label}` and `{@linkplain ...}`.
static INLINE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r"\{@link(?:plain)?\s+([^\s}(]+(?:\([^)]*\))?)(?:\s+([^}]*))?\}").expect("valid regex");
});

/// Documentation provider for Java sources.
#[derive(Debug, Default, Clone, Copy)]
pub struct JavaProvider;

impl DocumentationProvider for JavaProvider {
    fn name(&self) -> &'static str {
        return "java";
    }

    fn custom_element(
        &self,
        tree: &SourceTree,
        file: FileId,
        offset: usize,
        _context: Option<&ElementRef>,
    ) -> Result<Option<ElementKey>, Error> {
        if !is_java_file(tree, file) {
            return Ok(None);
        }
        let Some(call) = tree.call_at(file, offset) else {
            return Ok(None);
        };
        return Ok(stream_stage(call));
    }

    fn element_for_lookup_item(
        &self,
        tree: &SourceTree,
        item: &LookupItem,
        context: &ElementRef,
    ) -> Result<Option<ElementKey>, Error> {
        let Some(file) = context.key.file().filter(|f| return is_java_file(tree, *f)) else {
            return Ok(None);
        };
        let Some(arity) = item.arity else {
            return Ok(None);
        };
        if let Some(qualifier) = &item.qualifier {
            return resolve_qualified_member(tree, file, qualifier, &item.label, arity);
        }
        // Completing a stage after `words.stream().`
        let Some(element) = tree.element(context) else {
            return Ok(None);
        };
        if let ElementKind::Call { receiver, .. } = &element.kind
            && is_stream_receiver(receiver)
        {
            return Ok(Some(stream_member(&item.label, arity)));
        }
        return Ok(None);
    }

    fn element_for_link(
        &self,
        tree: &SourceTree,
        reference: &str,
        context: Option<&ElementRef>,
    ) -> Result<Option<ElementKey>, Error> {
        let Some(link) = LinkTarget::parse(reference) else {
            return Ok(None);
        };
        let context_file = context
            .and_then(|c| return c.key.file())
            .and_then(|f| return tree.file(f))
            .filter(|f| return f.language == Language::Java);
        let qualified = match context_file {
            Some(file) => resolve_java_type(tree, file, &link.type_name)?.unwrap_or_else(|| return link.type_name.clone()),
            None => link.type_name.clone(),
        };

        let Some(member) = link.member else {
            return tree.find_type(&qualified);
        };
        let in_project = tree.find_type(&qualified)?.is_some();
        return match (in_project, link.arity) {
            (true, Some(arity)) => tree.find_member(&qualified, &member, arity),
            (true, None) => Ok(first_member_named(tree, &qualified, &member)),
            (false, Some(arity)) => Ok(Some(ElementKey::External {
                declaring_type: qualified,
                language: Language::Java,
                name: member,
                parameter_count: arity,
            })),
            (false, None) => Ok(None),
        };
    }

    fn generate_doc(
        &self,
        tree: &SourceTree,
        element: &Element,
        original: Option<&Element>,
    ) -> Result<Option<String>, Error> {
        if element.language != Language::Java {
            return Ok(None);
        }
        return match &element.kind {
            ElementKind::Call { .. } => Ok(Some(call_doc(tree, element, original)?)),
            ElementKind::Member { .. } | ElementKind::Type { .. } | ElementKind::Field { .. } => {
                Ok(Some(declaration_doc(element)))
            },
            ElementKind::Comment { .. } | ElementKind::File => Ok(None),
        };
    }

    fn generate_hover_doc(
        &self,
        _tree: &SourceTree,
        element: &Element,
        _original: Option<&Element>,
    ) -> Result<Option<String>, Error> {
        if element.language != Language::Java {
            return Ok(None);
        }
        return Ok(Some(definition(element)));
    }
}

/// Whether a file exists and is Java.
fn is_java_file(tree: &SourceTree, file: FileId) -> bool {
    return tree.file(file).is_some_and(|f| return f.language == Language::Java);
}

/// Whether a receiver is the result of a stream-producing call.
fn is_stream_receiver(receiver: &Receiver) -> bool {
    let Receiver::Expression {
        last_call: Some(last),
        text,
    } = receiver
    else {
        return false;
    };
    if STREAM_PRODUCERS.contains(&last.as_str()) {
        return true;
    }
    return last == "of" && (text.starts_with("Stream.of") || text.starts_with("java.util.stream.Stream.of"));
}

/// `Stream.<name>` with the call's arity.
fn stream_member(name: &str, arity: usize) -> ElementKey {
    return ElementKey::External {
        declaring_type: STREAM_TYPE.to_string(),
        language: Language::Java,
        name: name.to_string(),
        parameter_count: arity,
    };
}

/// The `Stream` member a pipeline call invokes, if its receiver is a stream.
fn stream_stage(call: &CallSite) -> Option<ElementKey> {
    if !is_stream_receiver(&call.receiver) {
        return None;
    }
    return Some(stream_member(&call.name, call.argument_count));
}

/// Any member of a project type with the given name.
fn first_member_named(tree: &SourceTree, qualified_type: &str, name: &str) -> Option<ElementKey> {
    for file in tree.files() {
        let found = file.index.declarations.iter().position(|d| {
            return d.declaring_type.as_deref() == Some(qualified_type) && d.name == name;
        });
        if let Some(idx) = found {
            return tree.declaration_key_at_index(file.id, idx);
        }
    }
    return None;
}

/// Documentation for an unresolved or pipeline call: its target (when known) plus the call site.
fn call_doc(tree: &SourceTree, element: &Element, original: Option<&Element>) -> Result<String, Error> {
    let call = element.file.and_then(|file| {
        let start = element.range.as_ref()?.start;
        let source = tree.file(file)?;
        return source.index.calls.iter().find(|c| return c.byte_range.start == start);
    });

    let mut html = String::new();
    let target = match (call, element.file) {
        (Some(call), Some(file)) => match stream_stage(call) {
            Some(key) => Some(key),
            None => tree.resolve_call(file, call)?,
        },
        _ => None,
    };
    match target.and_then(|key| return tree.element(&tree.mint(key))) {
        Some(target) => html.push_str(&declaration_doc(&target)),
        None => {
            let count = match &element.kind {
                ElementKind::Call { argument_count, .. } => *argument_count,
                _ => 0,
            };
            let _ = write!(
                html,
                "<div class=\"definition\"><pre>{}(…)</pre></div><p>Unresolved call with {count} argument(s).</p>",
                escape_html(&element.name)
            );
        },
    }

    let site = original.unwrap_or(element);
    let line = site
        .file
        .zip(site.range.as_ref())
        .and_then(|(file, range)| return tree.file(file)?.line_at(range.start));
    if let Some(line) = line {
        let _ = write!(html, "<p>Called as <code>{}</code></p>", escape_html(line));
    }
    return Ok(html);
}

/// Header block for an element.
fn definition(element: &Element) -> String {
    let header = match &element.kind {
        ElementKind::Member {
            declaring_type,
            external: true,
            parameter_count,
            ..
        } => format!(
            "{}.{}({parameter_count} parameter{})",
            declaring_type.as_deref().unwrap_or(""),
            element.name,
            if *parameter_count == 1 { "" } else { "s" }
        ),
        ElementKind::Member { signature, .. } => signature.clone(),
        ElementKind::Type { qualified_name, .. } => qualified_name.clone(),
        ElementKind::Field { declaring_type } => match declaring_type {
            Some(t) => format!("{t}.{}", element.name),
            None => element.name.clone(),
        },
        ElementKind::Call { .. } | ElementKind::Comment { .. } | ElementKind::File => element.name.clone(),
    };
    return format!("<div class=\"definition\"><pre>{}</pre></div>", escape_html(&header));
}

/// Header plus rendered Javadoc.
fn declaration_doc(element: &Element) -> String {
    let doc = match &element.kind {
        ElementKind::Member { doc, .. } | ElementKind::Type { doc, .. } => doc.as_deref(),
        _ => None,
    };
    let mut html = definition(element);
    if let Some(doc) = doc {
        html.push_str(&render_javadoc(doc));
    }
    return html;
}

/// Render a `/** ... */` comment as an HTML fragment.
pub fn render_javadoc(raw: &str) -> String {
    let body = raw.trim().trim_start_matches("/**").trim_end_matches("*/");
    let lines: Vec<&str> = body
        .lines()
        .map(|line| {
            let line = line.trim();
            let line = line.strip_prefix('*').unwrap_or(line);
            return line.strip_prefix(' ').unwrap_or(line);
        })
        .collect();

    let mut description: Vec<&str> = Vec::new();
    let mut tags: Vec<(String, String)> = Vec::new();
    for line in lines {
        if let Some(tag_line) = line.strip_prefix('@') {
            let (tag, text) = tag_line.split_once(char::is_whitespace).unwrap_or((tag_line, ""));
            tags.push((tag.to_string(), text.trim().to_string()));
        } else if let Some((_, text)) = tags.last_mut() {
            if !line.is_empty() {
                text.push(' ');
                text.push_str(line.trim());
            }
        } else {
            description.push(line);
        }
    }

    let mut html = String::from("<div class=\"content\">");
    html.push_str(&render_inline(description.join(" ").trim()));
    html.push_str("</div>");
    if tags.is_empty() {
        return html;
    }

    html.push_str("<table class=\"sections\">");
    for (tag, text) in &tags {
        let (label, body) = match tag.as_str() {
            "param" => {
                let (name, rest) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
                ("Params:", format!("<code>{}</code> - {}", escape_html(name), render_inline(rest.trim())))
            },
            "return" => ("Returns:", render_inline(text)),
            "throws" | "exception" => ("Throws:", render_inline(text)),
            "see" => ("See Also:", render_inline(text)),
            "since" => ("Since:", render_inline(text)),
            _ => ("", render_inline(text)),
        };
        let label = if label.is_empty() { format!("@{tag}:") } else { label.to_string() };
        let _ = write!(html, "<tr><td>{}</td><td>{body}</td></tr>", escape_html(&label));
    }
    html.push_str("</table>");
    return html;
}

/// Escape text and expand inline `{@code}` and `{@link}` tags.
fn render_inline(text: &str) -> String {
    let escaped = escape_html(text);
    let with_code = INLINE_CODE.replace_all(&escaped, |caps: &Captures<'_>| {
        return format!("<code>{}</code>", caps.get(1).map_or("", |m| return m.as_str()));
    });
    let with_links = INLINE_LINK.replace_all(&with_code, |caps: &Captures<'_>| {
        let target = caps.get(1).map_or("", |m| return m.as_str());
        let label = caps.get(2).map_or(target, |m| return m.as_str());
        return format!(
            "<a href=\"{}\"><code>{}</code></a>",
            element_url(&link_reference(target)),
            label.replace('#', ".")
        );
    });
    return with_links.into_owned();
}

/// `Type#member(A, B)` becomes `Type.member/2`; `#member()` becomes `member/0`.
fn link_reference(target: &str) -> String {
    let (head, params) = match target.split_once('(') {
        Some((head, rest)) => (head, Some(rest.trim_end_matches(')'))),
        None => (target, None),
    };
    let path = head.trim_start_matches('#').replace('#', ".");
    return match params {
        Some(params) if params.trim().is_empty() => format!("{path}/0"),
        Some(params) => format!("{path}/{}", params.split(',').count()),
        None => path,
    };
}

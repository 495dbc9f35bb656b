//! Rust documentation: `Type::method` links and `///` doc rendering.

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::{escape_html, DocumentationProvider, LinkTarget};
use crate::error::Error;
use crate::link::element_url;
use crate::source::{Element, ElementKind, SourceTree};
use crate::types::{ElementKey, ElementRef, Language};

/// Intra-doc link: [`Path`].
static DOC_LINK: LazyLock<Regex> = LazyLock::new(|| return Regex::new(r"\[`([^`\]]+)`\]").expect("valid regex"));

/// Inline code span.
static CODE_SPAN: LazyLock<Regex> = LazyLock::new(|| return Regex::new(r"`([^`]+)`").expect("valid regex"));

/// Documentation provider for Rust sources.
#[derive(Debug, Default, Clone, Copy)]
pub struct RustProvider;

impl DocumentationProvider for RustProvider {
    fn name(&self) -> &'static str {
        return "rust";
    }

    fn element_for_link(
        &self,
        tree: &SourceTree,
        reference: &str,
        _context: Option<&ElementRef>,
    ) -> Result<Option<ElementKey>, Error> {
        let Some(link) = LinkTarget::parse(reference) else {
            return Ok(None);
        };
        let type_name = link.type_name.rsplit('.').next().unwrap_or(&link.type_name).to_string();
        let Some(member) = link.member else {
            return tree.find_type(&type_name);
        };
        if tree.find_type(&type_name)?.is_some()
            && let Some(arity) = link.arity
        {
            return tree.find_member(&type_name, &member, arity);
        }
        let Some(arity) = link.arity else {
            return Ok(None);
        };
        return Ok(Some(ElementKey::External {
            declaring_type: link.type_name.replace('.', "::"),
            language: Language::Rust,
            name: member,
            parameter_count: arity,
        }));
    }

    fn generate_doc(
        &self,
        tree: &SourceTree,
        element: &Element,
        original: Option<&Element>,
    ) -> Result<Option<String>, Error> {
        if element.language != Language::Rust {
            return Ok(None);
        }
        let html = match &element.kind {
            ElementKind::Member { .. } | ElementKind::Type { .. } | ElementKind::Field { .. } => item_doc(element),
            ElementKind::Call { argument_count, .. } => {
                let mut html = format!(
                    "<div class=\"definition\"><pre>{}(…)</pre></div><p>Unresolved call with {argument_count} argument(s).</p>",
                    escape_html(&element.name)
                );
                let site = original.unwrap_or(element);
                let line = site
                    .file
                    .zip(site.range.as_ref())
                    .and_then(|(file, range)| return tree.file(file)?.line_at(range.start));
                if let Some(line) = line {
                    let _ = write!(html, "<p>Called as <code>{}</code></p>", escape_html(line));
                }
                html
            },
            ElementKind::Comment { .. } | ElementKind::File => return Ok(None),
        };
        return Ok(Some(html));
    }
}

/// Header plus rendered doc comment for an item.
fn item_doc(element: &Element) -> String {
    let (header, doc) = match &element.kind {
        ElementKind::Member {
            declaring_type: Some(declaring_type),
            external: true,
            parameter_count,
            ..
        } => (format!("{declaring_type}::{}(/* {parameter_count} */)", element.name), None),
        ElementKind::Member { signature, doc, .. } => (signature.clone(), doc.as_deref()),
        ElementKind::Type { qualified_name, doc } => (qualified_name.clone(), doc.as_deref()),
        _ => (element.name.clone(), None),
    };
    let mut html = format!("<div class=\"definition\"><pre>{}</pre></div>", escape_html(&header));
    if let Some(doc) = doc {
        html.push_str(&render_doc_comment(doc));
    }
    return html;
}

/// Render `///` lines or a `/** */` block as an HTML fragment.
///
/// Blank lines separate paragraphs; fenced code blocks become `<pre>`.
pub fn render_doc_comment(raw: &str) -> String {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut code: Option<Vec<String>> = None;

    for line in strip_markers(raw) {
        if line.trim_start().starts_with("```") {
            match code.take() {
                Some(lines) => {
                    paragraphs.push(format!("<pre>{}</pre>", escape_html(&lines.join("\n"))));
                },
                None => {
                    flush(&mut current, &mut paragraphs);
                    code = Some(Vec::new());
                },
            }
            continue;
        }
        if let Some(lines) = code.as_mut() {
            lines.push(line);
            continue;
        }
        if line.trim().is_empty() {
            flush(&mut current, &mut paragraphs);
        } else {
            current.push(line.trim().to_string());
        }
    }
    if let Some(lines) = code {
        paragraphs.push(format!("<pre>{}</pre>", escape_html(&lines.join("\n"))));
    }
    flush(&mut current, &mut paragraphs);
    return format!("<div class=\"content\">{}</div>", paragraphs.concat());
}

/// Close the current paragraph, if any.
fn flush(current: &mut Vec<String>, paragraphs: &mut Vec<String>) {
    if current.is_empty() {
        return;
    }
    paragraphs.push(format!("<p>{}</p>", render_inline(&current.join(" "))));
    current.clear();
}

/// Comment text without `///`, `/**`, `*/`, or leading `*`.
fn strip_markers(raw: &str) -> Vec<String> {
    return raw
        .lines()
        .map(|line| {
            let line = line.trim();
            if let Some(rest) = line.strip_prefix("///") {
                return rest.strip_prefix(' ').unwrap_or(rest).to_string();
            }
            let line = line.strip_prefix("/**").unwrap_or(line);
            let line = line.strip_suffix("*/").unwrap_or(line);
            let line = line.trim_start().strip_prefix('*').unwrap_or(line);
            return line.strip_prefix(' ').unwrap_or(line).to_string();
        })
        .collect();
}

/// Escape text and expand intra-doc links and code spans.
fn render_inline(text: &str) -> String {
    let escaped = escape_html(text);
    let linked = DOC_LINK.replace_all(&escaped, |caps: &Captures<'_>| {
        let path = caps.get(1).map_or("", |m| return m.as_str());
        return format!("<a href=\"{}\"><code>{path}</code></a>", element_url(path));
    });
    let coded = CODE_SPAN.replace_all(&linked, |caps: &Captures<'_>| {
        return format!("<code>{}</code>", caps.get(1).map_or("", |m| return m.as_str()));
    });
    return coded.into_owned();
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::types::ProjectId;

    #[test]
    fn doc_comments_become_paragraphs_and_code() {
        let html = render_doc_comment(
            "/// Area of the shape.\n/// Uses [`Circle::radius`] and `PI`.\n///\n/// ```\n/// let a = c.area();\n/// ```",
        );
        assert!(html.contains("<p>Area of the shape. Uses"));
        assert!(html.contains("<a href=\"psi_element://Circle::radius\"><code>Circle::radius</code></a>"));
        assert!(html.contains("<code>PI</code>"));
        assert!(html.contains("<pre>let a = c.area();</pre>"));
    }

    #[test]
    fn links_resolve_project_methods_and_external_paths() {
        let mut tree = SourceTree::new(ProjectId(1), 1024 * 1024);
        tree.add_file(
            Path::new("shapes.rs"),
            "struct Circle;\nimpl Circle {\n    fn area(&self) -> f64 { 0.0 }\n}\n",
        )
        .unwrap();

        assert!(matches!(
            RustProvider.element_for_link(&tree, "Circle::area/0", None).unwrap(),
            Some(ElementKey::Declaration { qualified_name, .. }) if qualified_name == "Circle.area"
        ));
        assert_eq!(
            RustProvider.element_for_link(&tree, "std::fs::read_to_string/1", None).unwrap(),
            Some(ElementKey::External {
                declaring_type: "std::fs".to_string(),
                language: Language::Rust,
                name: "read_to_string".to_string(),
                parameter_count: 1,
            })
        );
    }

    #[test]
    fn member_docs_include_signature() {
        let mut tree = SourceTree::new(ProjectId(1), 1024 * 1024);
        let text = "/// Adds two numbers.\nfn add(a: i32, b: i32) -> i32 { a + b }\n";
        let id = tree.add_file(Path::new("math.rs"), text).unwrap();
        let key = tree.declaration_at(id, text.find("add(").unwrap()).unwrap();
        let element = tree.element(&tree.mint(key)).unwrap();
        let html = RustProvider.generate_doc(&tree, &element, None).unwrap().unwrap();
        assert!(html.contains("<pre>fn add(a: i32, b: i32) -&gt; i32</pre>"));
        assert!(html.contains("<p>Adds two numbers.</p>"));
    }
}

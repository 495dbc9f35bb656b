//! Hyperlinks inside rendered documentation.

use crate::providers::escape_html;

/// Scheme of links that point at another program element.
pub const ELEMENT_SCHEME: &str = "psi_element://";

/// Separates an element reference from the anchor to scroll to.
const ANCHOR_SEPARATOR: char = '#';

/// Link that opens the external documentation browser; handled by the host.
const EXTERNAL_DOC: &str = "external_doc";

/// What clicking a link in a documentation surface does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link {
    /// Show documentation for another element.
    Element {
        /// Anchor inside that element's documentation.
        anchor: Option<String>,
        /// Provider-specific reference text, e.g. `java.util.List.add/1`.
        reference: String,
    },
    /// Handled elsewhere; the manager ignores it.
    External,
    /// Open a settings page; the payload is the full link.
    OpenSettings(String),
    /// Anything else; rendered as an explanation.
    Unresolved(String),
}

impl Link {
    /// Classify a link target.
    pub fn parse(url: &str) -> Self {
        if url == EXTERNAL_DOC {
            return Link::External;
        }
        if url.starts_with("open") {
            return Link::OpenSettings(url.to_string());
        }
        let Some(rest) = url.strip_prefix(ELEMENT_SCHEME) else {
            return Link::Unresolved(url.to_string());
        };
        return match rest.rsplit_once(ANCHOR_SEPARATOR) {
            Some((reference, anchor)) => Link::Element {
                anchor: Some(anchor.to_string()),
                reference: reference.to_string(),
            },
            None => Link::Element {
                anchor: None,
                reference: rest.to_string(),
            },
        };
    }
}

/// `psi_element://` link for a reference.
pub fn element_url(reference: &str) -> String {
    return format!("{ELEMENT_SCHEME}{reference}");
}

/// Text shown for a link nothing knows how to follow.
pub fn unresolved_message(url: &str) -> String {
    return format!(
        "Couldn't resolve URL <i>{}</i> <p>Configuring paths to API docs in <a href=\"open://Project Settings\">project settings</a> might help",
        escape_html(url)
    );
}

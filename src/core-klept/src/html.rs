//! Locating the HTML subtree that holds a page's content.

use html5ever::{
    parse_document,
    serialize::{SerializeOpts, TraversalScope, serialize},
    tendril::TendrilSink,
};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};

use crate::errors::{Error, Result};

/// Selects the first element with a given tag that carries a given attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSelector {
    tag: String,
    attribute_key: String,
    attribute_value: String,
}

impl NodeSelector {
    /// Builds a selector when all three parts are non-empty.
    ///
    /// Tag and attribute names are lower-cased to match how HTML parsing normalizes
    /// them. The attribute value is matched exactly.
    pub fn new(tag: &str, attribute_key: &str, attribute_value: &str) -> Option<Self> {
        let (tag, attribute_key, attribute_value) = (tag.trim(), attribute_key.trim(), attribute_value.trim());
        if tag.is_empty() || attribute_key.is_empty() || attribute_value.is_empty() {
            return None;
        }
        Some(Self {
            tag: tag.to_ascii_lowercase(),
            attribute_key: attribute_key.to_ascii_lowercase(),
            attribute_value: attribute_value.to_string(),
        })
    }

    /// Builds a selector from optional configuration parts.
    ///
    /// A partially specified selector is ambiguous, so it is treated as absent and
    /// a warning is logged.
    pub fn from_parts(tag: Option<&str>, attribute_key: Option<&str>, attribute_value: Option<&str>) -> Option<Self> {
        let parts = [tag, attribute_key, attribute_value].map(|p| p.map(str::trim).filter(|p| !p.is_empty()));
        match parts {
            [Some(tag), Some(key), Some(value)] => Self::new(tag, key, value),
            [None, None, None] => None,
            _ => {
                tracing::warn!(
                    "Ignoring partial HTML selector (tag: {:?}, attribute key: {:?}, attribute value: {:?}); \
                     all three parts are required",
                    tag,
                    attribute_key,
                    attribute_value
                );
                None
            }
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attribute_key(&self) -> &str {
        &self.attribute_key
    }

    pub fn attribute_value(&self) -> &str {
        &self.attribute_value
    }

    fn matches(&self, node: &NodeData) -> bool {
        match node {
            NodeData::Element { name, attrs, .. } => {
                &*name.local == self.tag
                    && attrs
                        .borrow()
                        .iter()
                        .any(|attr| &*attr.name.local == self.attribute_key && &*attr.value == self.attribute_value)
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for NodeSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}=\"{}\"]", self.tag, self.attribute_key, self.attribute_value)
    }
}

/// Narrows an HTML document to the subtree matched by `selector`.
///
/// Without a selector the input is returned unchanged. With one, the document is
/// searched pre-order depth-first and the first matching element is serialized
/// together with its whole subtree.
///
/// # Errors
///
/// `Error::HtmlParse` if the document cannot be read or re-serialized, and
/// `Error::SelectorNotFound` if no element matches.
pub fn locate(html: &[u8], selector: Option<&NodeSelector>) -> Result<Vec<u8>> {
    let Some(selector) = selector else {
        return Ok(html.to_vec());
    };

    let dom: RcDom = parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut &html[..])
        .map_err(|e| Error::HtmlParse(e.to_string()))?;

    let found = find_first(&dom.document, selector).ok_or_else(|| Error::SelectorNotFound(selector.to_string()))?;

    let subtree: SerializableHandle = found.into();
    let mut output: Vec<u8> = Vec::new();
    serialize(
        &mut output,
        &subtree,
        SerializeOpts {
            traversal_scope: TraversalScope::IncludeNode,
            ..Default::default()
        },
    )
    .map_err(|e| Error::HtmlParse(e.to_string()))?;
    Ok(output)
}

fn find_first(node: &Handle, selector: &NodeSelector) -> Option<Handle> {
    if selector.matches(&node.data) {
        return Some(node.clone());
    }
    node.children
        .borrow()
        .iter()
        .find_map(|child| find_first(child, selector))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Post</title></head>
<body>
  <nav><a href="/">Home</a></nav>
  <div id="SITE_CONTAINER"><h1>Hello</h1><p>World</p></div>
  <div id="SITE_CONTAINER"><p>Second match</p></div>
  <footer>Footer text</footer>
</body>
</html>"#;

    fn container() -> NodeSelector {
        NodeSelector::new("div", "id", "SITE_CONTAINER").unwrap()
    }

    #[test]
    fn test_locate_without_selector_is_identity() {
        let malformed = b"<html><body><h1>Unclosed";
        assert_eq!(locate(PAGE.as_bytes(), None).unwrap(), PAGE.as_bytes());
        assert_eq!(locate(malformed, None).unwrap(), malformed);
    }

    #[test]
    fn test_locate_returns_first_match_only() {
        let located = String::from_utf8(locate(PAGE.as_bytes(), Some(&container())).unwrap()).unwrap();
        assert_eq!(located, r#"<div id="SITE_CONTAINER"><h1>Hello</h1><p>World</p></div>"#);
    }

    #[test]
    fn test_located_subtree_reparses_without_siblings() {
        let located = locate(PAGE.as_bytes(), Some(&container())).unwrap();

        // Re-parsing the fragment must still find the selector, and nothing from outside it.
        let again = locate(&located, Some(&container())).unwrap();
        let again = String::from_utf8(again).unwrap();
        assert!(again.contains("Hello"));
        assert!(!again.contains("Footer text"));
        assert!(!again.contains("Home"));
        assert!(!again.contains("Second match"));
    }

    #[test]
    fn test_locate_nested_match_in_document_order() {
        let html = r#"<div class="outer"><section><span data-role="body">deep</span></section></div>
<span data-role="body">later</span>"#;
        let selector = NodeSelector::new("span", "data-role", "body").unwrap();
        let located = String::from_utf8(locate(html.as_bytes(), Some(&selector)).unwrap()).unwrap();
        assert_eq!(located, r#"<span data-role="body">deep</span>"#);
    }

    #[test]
    fn test_locate_ancestor_wins_over_descendant() {
        let html = r#"<div id="x"><div id="x">inner</div></div>"#;
        let selector = NodeSelector::new("div", "id", "x").unwrap();
        let located = String::from_utf8(locate(html.as_bytes(), Some(&selector)).unwrap()).unwrap();
        assert_eq!(located, r#"<div id="x"><div id="x">inner</div></div>"#);
    }

    #[test]
    fn test_locate_no_match_is_distinct_error() {
        let selector = NodeSelector::new("div", "id", "MISSING").unwrap();
        let result = locate(PAGE.as_bytes(), Some(&selector));
        match result {
            Err(Error::SelectorNotFound(s)) => assert_eq!(s, r#"div[id="MISSING"]"#),
            other => panic!("expected SelectorNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_locate_attribute_value_is_case_sensitive() {
        let selector = NodeSelector::new("DIV", "ID", "site_container").unwrap();
        assert!(matches!(
            locate(PAGE.as_bytes(), Some(&selector)),
            Err(Error::SelectorNotFound(_))
        ));
    }

    #[test]
    fn test_selector_requires_all_parts() {
        assert!(NodeSelector::new("div", "id", "").is_none());
        assert!(NodeSelector::from_parts(Some("div"), Some("id"), None).is_none());
        assert!(NodeSelector::from_parts(Some("div"), None, None).is_none());
        assert!(NodeSelector::from_parts(None, None, None).is_none());
        assert!(NodeSelector::from_parts(Some(" "), Some(""), None).is_none());

        let selector = NodeSelector::from_parts(Some("DIV"), Some("Id"), Some("SITE_CONTAINER")).unwrap();
        assert_eq!(selector.tag(), "div");
        assert_eq!(selector.attribute_key(), "id");
        assert_eq!(selector.attribute_value(), "SITE_CONTAINER");
    }
}

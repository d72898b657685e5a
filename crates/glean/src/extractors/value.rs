// ABOUTME: Turns selector matches into output values: raw markup, node values, attributes or trimmed text.
// ABOUTME: Single mode takes the first match; multiple mode collects every match, dropping empties by default.

use serde_json::Value;

use crate::extractors::report;
use crate::select::{HtmlDocument, MatchedNode, NodeKind, SelectorKind};

/// How a list of matches becomes a value.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueMode<'a> {
    /// Read this attribute from element matches instead of their text.
    pub attribute: Option<&'a str>,
    /// Serialize matches as markup.
    pub raw: bool,
    /// Collect every match into an array.
    pub multiple: bool,
    /// Keep empty strings (and missing attributes as null) in arrays.
    pub keep_empty: bool,
}

/// Run a selector, treating an invalid selector as no matches.
pub(crate) fn select_nodes<'a>(
    doc: &'a HtmlDocument,
    selector: &str,
    kind: SelectorKind,
    verbose: bool,
) -> Vec<MatchedNode<'a>> {
    match doc.select(selector, kind) {
        Ok(nodes) => nodes,
        Err(err) => {
            report(verbose, "selector", &err);
            Vec::new()
        }
    }
}

/// String form of a single match.
///
/// Precedence: raw markup, then the node's own value for text and attribute
/// nodes, then the requested attribute, then the element's text.
pub fn represent(node: &MatchedNode<'_>, attribute: Option<&str>, raw: bool) -> Option<String> {
    if raw {
        return Some(node.outer_html());
    }
    match node.kind() {
        NodeKind::Attribute | NodeKind::Text | NodeKind::Scalar => {
            node.node_value().map(|v| v.trim().to_string())
        }
        NodeKind::Element => match attribute {
            Some(name) => node.attribute(name).map(|v| v.trim().to_string()),
            None => Some(node.text_content().trim().to_string()),
        },
    }
}

/// First non-empty representation of the first match.
pub fn extract_first(nodes: &[MatchedNode<'_>], attribute: Option<&str>, raw: bool) -> Option<String> {
    nodes
        .first()
        .and_then(|node| represent(node, attribute, raw))
        .filter(|v| !v.is_empty())
}

/// Representations of every match in document order.
pub fn extract_all(
    nodes: &[MatchedNode<'_>],
    attribute: Option<&str>,
    raw: bool,
    keep_empty: bool,
) -> Vec<Value> {
    nodes
        .iter()
        .filter_map(|node| match represent(node, attribute, raw) {
            Some(v) if !v.is_empty() => Some(Value::String(v)),
            Some(v) if keep_empty => Some(Value::String(v)),
            None if keep_empty => Some(Value::Null),
            _ => None,
        })
        .collect()
}

/// Extract according to `mode`: a string or null in single mode, an array in multiple mode.
pub fn extract(nodes: &[MatchedNode<'_>], mode: ValueMode<'_>) -> Value {
    if mode.multiple {
        Value::Array(extract_all(nodes, mode.attribute, mode.raw, mode.keep_empty))
    } else {
        extract_first(nodes, mode.attribute, mode.raw).map_or(Value::Null, Value::String)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const LIST: &str = r#"<ul><li> a </li><li>  </li><li><b>c</b></li></ul><img src=" /i.png ">"#;

    #[test]
    fn single_mode_uses_first_match_only() {
        let doc = HtmlDocument::parse(LIST);
        let nodes = doc.select("//li", SelectorKind::XPath).unwrap();
        assert_eq!(extract(&nodes, ValueMode::default()), json!("a"));
    }

    #[test]
    fn single_mode_empty_first_match_is_null() {
        let doc = HtmlDocument::parse(LIST);
        let nodes = doc.select("//li[2]", SelectorKind::XPath).unwrap();
        assert_eq!(extract(&nodes, ValueMode::default()), Value::Null);
        assert_eq!(extract(&[], ValueMode::default()), Value::Null);
    }

    #[test]
    fn multiple_mode_skips_empties_unless_kept() {
        let doc = HtmlDocument::parse(LIST);
        let nodes = doc.select("li", SelectorKind::Css).unwrap();
        let mode = ValueMode {
            multiple: true,
            ..Default::default()
        };
        assert_eq!(extract(&nodes, mode), json!(["a", "c"]));

        let keep = ValueMode {
            multiple: true,
            keep_empty: true,
            ..Default::default()
        };
        assert_eq!(extract(&nodes, keep), json!(["a", "", "c"]));
    }

    #[test]
    fn attribute_is_read_and_trimmed() {
        let doc = HtmlDocument::parse(LIST);
        let nodes = doc.select("img", SelectorKind::Css).unwrap();
        let mode = ValueMode {
            attribute: Some("src"),
            ..Default::default()
        };
        assert_eq!(extract(&nodes, mode), json!("/i.png"));

        let missing = ValueMode {
            attribute: Some("alt"),
            multiple: true,
            keep_empty: true,
            ..Default::default()
        };
        assert_eq!(extract(&nodes, missing), json!([null]));
    }

    #[test]
    fn attribute_nodes_ignore_requested_attribute() {
        let doc = HtmlDocument::parse(LIST);
        let nodes = doc.select("//img/@src", SelectorKind::XPath).unwrap();
        assert_eq!(extract_first(&nodes, Some("alt"), false).as_deref(), Some("/i.png"));
    }

    #[test]
    fn raw_wins_over_everything() {
        let doc = HtmlDocument::parse(LIST);
        let nodes = doc.select("//li[3]", SelectorKind::XPath).unwrap();
        assert_eq!(
            extract_first(&nodes, Some("class"), true).as_deref(),
            Some("<li><b>c</b></li>")
        );
    }

    #[test]
    fn invalid_selector_yields_no_nodes() {
        let doc = HtmlDocument::parse(LIST);
        assert!(select_nodes(&doc, "//li[", SelectorKind::XPath, false).is_empty());
    }
}

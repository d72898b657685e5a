// ABOUTME: XPath backend: mirrors the html5ever tree into an sxd-document package and runs sxd-xpath on it.
// ABOUTME: Also serializes sxd elements back to HTML for raw extraction.

use ego_tree::{NodeId, NodeRef};
use scraper::{Html, Node};
use sxd_document::dom::{self, ChildOfElement};
use sxd_document::Package;
use sxd_xpath::nodeset::Node as XNode;
use sxd_xpath::{Context, Factory, Value};

use crate::error::SelectError;
use crate::select::{MatchedNode, NodeKind};

/// Copy the parsed HTML tree into an XPath-queryable package.
///
/// With a scope, only the scope element's subtree is copied and it becomes
/// the document element; otherwise every element and comment under the
/// document node is copied.
pub(super) fn build_package(html: &Html, scope: Option<NodeId>) -> Package {
    let package = Package::new();
    {
        let document = package.as_document();
        let root = document.root();
        match scope.and_then(|id| html.tree.get(id)) {
            Some(node) => {
                if let Some(element) = copy_element(&document, node) {
                    root.append_child(element);
                }
            }
            None => {
                for child in html.tree.root().children() {
                    match child.value() {
                        Node::Element(_) => {
                            if let Some(element) = copy_element(&document, child) {
                                root.append_child(element);
                            }
                        }
                        Node::Comment(comment) => {
                            root.append_child(document.create_comment(&**comment));
                        }
                        _ => {}
                    }
                }
            }
        }
    }
    package
}

fn copy_element<'d>(document: &dom::Document<'d>, node: NodeRef<'_, Node>) -> Option<dom::Element<'d>> {
    let el = node.value().as_element()?;
    let element = document.create_element(el.name());
    for (name, value) in el.attrs() {
        element.set_attribute_value(name, value);
    }
    for child in node.children() {
        match child.value() {
            Node::Element(_) => {
                if let Some(copied) = copy_element(document, child) {
                    element.append_child(copied);
                }
            }
            Node::Text(text) => element.append_child(document.create_text(&**text)),
            Node::Comment(comment) => element.append_child(document.create_comment(&**comment)),
            _ => {}
        }
    }
    Some(element)
}

/// The document element, used as context node for scoped fragments.
fn document_element<'d>(document: &dom::Document<'d>) -> Option<dom::Element<'d>> {
    document.root().children().into_iter().find_map(|child| match child {
        dom::ChildOfRoot::Element(el) => Some(el),
        _ => None,
    })
}

pub(super) fn select<'d>(
    package: &'d Package,
    selector: &str,
    scoped: bool,
) -> Result<Vec<MatchedNode<'d>>, SelectError> {
    let invalid = |reason: String| SelectError::InvalidSelector {
        kind: "xpath",
        selector: selector.to_string(),
        reason,
    };

    let factory = Factory::new();
    let xpath = factory
        .build(selector)
        .map_err(|e| invalid(e.to_string()))?
        .ok_or_else(|| invalid("empty expression".to_string()))?;

    let document = package.as_document();
    let context = Context::new();
    let evaluated = match document_element(&document).filter(|_| scoped) {
        Some(scope) => xpath.evaluate(&context, scope),
        None => xpath.evaluate(&context, document.root()),
    };
    let value = evaluated.map_err(|e| SelectError::Evaluation {
        selector: selector.to_string(),
        reason: e.to_string(),
    })?;

    Ok(match value {
        Value::Nodeset(nodes) => nodes
            .document_order()
            .into_iter()
            .map(MatchedNode::XPath)
            .collect(),
        Value::String(s) => vec![MatchedNode::Scalar(s)],
        Value::Number(n) => vec![MatchedNode::Scalar(format_number(n))],
        Value::Boolean(b) => vec![MatchedNode::Scalar(b.to_string())],
    })
}

/// XPath numbers are doubles; integral values print without a fraction.
fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

pub(super) fn node_kind(node: &XNode<'_>) -> NodeKind {
    match node {
        XNode::Root(_) | XNode::Element(_) => NodeKind::Element,
        XNode::Attribute(_) => NodeKind::Attribute,
        XNode::Text(_)
        | XNode::Comment(_)
        | XNode::Namespace(_)
        | XNode::ProcessingInstruction(_) => NodeKind::Text,
    }
}

pub(super) fn attribute(node: &XNode<'_>, name: &str) -> Option<String> {
    match node {
        XNode::Element(el) => el.attribute_value(name).map(str::to_string),
        _ => None,
    }
}

pub(super) fn node_value(node: &XNode<'_>) -> Option<String> {
    match node {
        XNode::Attribute(attr) => Some(attr.value().to_string()),
        XNode::Text(text) => Some(text.text().to_string()),
        XNode::Comment(comment) => Some(comment.text().to_string()),
        _ => None,
    }
}

pub(super) fn outer_html(node: &XNode<'_>) -> String {
    let mut output = String::new();
    match node {
        XNode::Element(el) => serialize_element(*el, &mut output),
        XNode::Root(root) => {
            for child in root.children() {
                if let dom::ChildOfRoot::Element(el) = child {
                    serialize_element(el, &mut output);
                }
            }
        }
        _ => {
            if let Some(XNode::Element(parent)) = node.parent() {
                serialize_element(parent, &mut output);
            }
        }
    }
    output
}

fn serialize_element(element: dom::Element<'_>, output: &mut String) {
    let name = element.name().local_part();

    output.push('<');
    output.push_str(name);
    for attr in element.attributes() {
        output.push(' ');
        output.push_str(attr.name().local_part());
        output.push_str("=\"");
        output.push_str(&escape_attr(attr.value()));
        output.push('"');
    }
    output.push('>');

    if is_void_element(name) {
        return;
    }

    let raw_text = is_raw_text_element(name);
    for child in element.children() {
        match child {
            ChildOfElement::Element(el) => serialize_element(el, output),
            ChildOfElement::Text(text) if raw_text => output.push_str(text.text()),
            ChildOfElement::Text(text) => output.push_str(&escape_text(text.text())),
            ChildOfElement::Comment(comment) => {
                output.push_str("<!--");
                output.push_str(comment.text());
                output.push_str("-->");
            }
            ChildOfElement::ProcessingInstruction(_) => {}
        }
    }

    output.push_str("</");
    output.push_str(name);
    output.push('>');
}

/// Escapes special characters in attribute values.
fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Checks if a tag is a void element (no closing tag in HTML5).
fn is_void_element(tag: &str) -> bool {
    matches!(
        tag.to_lowercase().as_str(),
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

fn is_raw_text_element(tag: &str) -> bool {
    matches!(tag.to_lowercase().as_str(), "script" | "style")
}

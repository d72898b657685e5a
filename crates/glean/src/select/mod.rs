// ABOUTME: Selector backend adapter: parses HTML and evaluates XPath or CSS selectors against it.
// ABOUTME: Matched nodes borrow the parsed document and expose text, attribute, value and outer HTML.

//! Selector backends.
//!
//! Every extraction call parses its own [`HtmlDocument`] and queries it with
//! [`HtmlDocument::select`]. Two backends sit behind the same call:
//!
//! - `css`: `scraper` selectors evaluated on the html5ever tree.
//! - `xpath`: `sxd-xpath` expressions evaluated on an `sxd-document` copy of
//!   the same tree, built lazily on the first XPath query.
//!
//! A document parsed with [`HtmlDocument::parse_fragment`] is scoped to the
//! fragment's top element: XPath expressions use it as the context node (so
//! `a/@href` and `.//a` are relative to it) and CSS selectors match it and its
//! descendants.

pub mod compiled;
mod css;
mod xpath;

use std::fmt;
use std::str::FromStr;

use ego_tree::NodeId;
use once_cell::sync::Lazy;
use once_cell::unsync::OnceCell;
use regex::Regex;
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};

use crate::error::SelectError;

/// The selector language of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorKind {
    #[default]
    XPath,
    Css,
}

impl fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SelectorKind::XPath => "xpath",
            SelectorKind::Css => "css",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for SelectorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "xpath" | "x" => Ok(SelectorKind::XPath),
            "css" => Ok(SelectorKind::Css),
            other => Err(format!("unknown selector kind {:?} (expected xpath or css)", other)),
        }
    }
}

/// What a matched node is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    Attribute,
    /// A non-node XPath result such as `count(//li)` or `string(//h1)`.
    Scalar,
}

/// One node of a selector result set.
#[derive(Debug, Clone)]
pub enum MatchedNode<'a> {
    Css(ElementRef<'a>),
    XPath(sxd_xpath::nodeset::Node<'a>),
    Scalar(String),
}

impl<'a> MatchedNode<'a> {
    pub fn kind(&self) -> NodeKind {
        match self {
            MatchedNode::Css(_) => NodeKind::Element,
            MatchedNode::XPath(node) => xpath::node_kind(node),
            MatchedNode::Scalar(_) => NodeKind::Scalar,
        }
    }

    /// Concatenated text of the node and its descendants, untrimmed.
    pub fn text_content(&self) -> String {
        match self {
            MatchedNode::Css(el) => el.text().collect(),
            MatchedNode::XPath(node) => node.string_value(),
            MatchedNode::Scalar(s) => s.clone(),
        }
    }

    /// Attribute lookup on an element node; `None` for other kinds or when absent.
    pub fn attribute(&self, name: &str) -> Option<String> {
        match self {
            MatchedNode::Css(el) => el.value().attr(name).map(str::to_string),
            MatchedNode::XPath(node) => xpath::attribute(node, name),
            MatchedNode::Scalar(_) => None,
        }
    }

    /// The node's own value: attribute value, text node data or scalar result.
    pub fn node_value(&self) -> Option<String> {
        match self {
            MatchedNode::Css(_) => None,
            MatchedNode::XPath(node) => xpath::node_value(node),
            MatchedNode::Scalar(s) => Some(s.clone()),
        }
    }

    /// Serialized markup of the node; text and attribute nodes serialize their owning element.
    pub fn outer_html(&self) -> String {
        match self {
            MatchedNode::Css(el) => el.html(),
            MatchedNode::XPath(node) => xpath::outer_html(node),
            MatchedNode::Scalar(s) => s.clone(),
        }
    }
}

/// A parsed HTML document or fragment, ready to be queried.
pub struct HtmlDocument {
    html: Html,
    scope: Option<NodeId>,
    xml: OnceCell<sxd_document::Package>,
}

impl fmt::Debug for HtmlDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HtmlDocument")
            .field("scope", &self.scope)
            .field("xml_built", &self.xml.get().is_some())
            .finish()
    }
}

/// Opening tag name at the start of a fragment.
static LEADING_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*<([A-Za-z][A-Za-z0-9-]*)").expect("valid leading tag regex"));

/// Table parts are dropped by the HTML parser outside a table, so they are
/// reparsed inside synthetic wrappers.
fn table_wrapper(tag: &str) -> Option<(&'static str, &'static str)> {
    match tag {
        "tr" => Some(("<table><tbody>", "</tbody></table>")),
        "td" | "th" => Some(("<table><tbody><tr>", "</tr></tbody></table>")),
        "thead" | "tbody" | "tfoot" | "caption" | "colgroup" => Some(("<table>", "</table>")),
        "col" => Some(("<table><colgroup>", "</colgroup></table>")),
        _ => None,
    }
}

impl HtmlDocument {
    /// Parse a complete HTML document. Queries run against the whole tree.
    pub fn parse(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
            scope: None,
            xml: OnceCell::new(),
        }
    }

    /// Parse a standalone fragment and scope queries to its top element.
    pub fn parse_fragment(fragment: &str) -> Self {
        let leading = LEADING_TAG_RE
            .captures(fragment)
            .map(|caps| caps[1].to_lowercase());

        let html = match leading.as_deref().and_then(table_wrapper) {
            Some((open, close)) => Html::parse_fragment(&format!("{}{}{}", open, fragment, close)),
            None => Html::parse_fragment(fragment),
        };

        let scope = leading.and_then(|tag| {
            html.root_element()
                .descendants()
                .skip(1)
                .filter_map(ElementRef::wrap)
                .find(|el| el.value().name() == tag)
                .map(|el| el.id())
        });

        Self {
            html,
            scope,
            xml: OnceCell::new(),
        }
    }

    /// The element queries are scoped to, if this is a fragment.
    pub fn scope(&self) -> Option<ElementRef<'_>> {
        self.scope
            .and_then(|id| self.html.tree.get(id))
            .and_then(ElementRef::wrap)
    }

    /// Evaluate a selector and return matches in document order.
    pub fn select(&self, selector: &str, kind: SelectorKind) -> Result<Vec<MatchedNode<'_>>, SelectError> {
        match kind {
            SelectorKind::Css => css::select(self, selector),
            SelectorKind::XPath => {
                let package = self
                    .xml
                    .get_or_init(|| xpath::build_package(&self.html, self.scope));
                xpath::select(package, selector, self.scope.is_some())
            }
        }
    }

    pub(crate) fn html(&self) -> &Html {
        &self.html
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
            <h1 id="t">  Main   Title </h1>
            <ul>
                <li class="p"><a href="/a">1</a></li>
                <li class="p"><a href="/b">2</a></li>
            </ul>
        </body></html>
    "#;

    #[test]
    fn css_and_xpath_agree_on_element_matches() {
        let doc = HtmlDocument::parse(PAGE);
        let css = doc.select("li.p a", SelectorKind::Css).unwrap();
        let xp = doc
            .select("//li[@class='p']/a", SelectorKind::XPath)
            .unwrap();
        assert_eq!(css.len(), 2);
        assert_eq!(xp.len(), 2);
        assert_eq!(css[1].text_content(), xp[1].text_content());
        assert_eq!(css[0].attribute("href").as_deref(), Some("/a"));
        assert_eq!(xp[0].attribute("href").as_deref(), Some("/a"));
    }

    #[test]
    fn xpath_attribute_and_text_nodes_report_their_kind() {
        let doc = HtmlDocument::parse(PAGE);
        let attrs = doc.select("//a/@href", SelectorKind::XPath).unwrap();
        assert_eq!(attrs[0].kind(), NodeKind::Attribute);
        assert_eq!(attrs[0].node_value().as_deref(), Some("/a"));

        let texts = doc.select("//a/text()", SelectorKind::XPath).unwrap();
        assert_eq!(texts[1].kind(), NodeKind::Text);
        assert_eq!(texts[1].node_value().as_deref(), Some("2"));
    }

    #[test]
    fn text_node_outer_html_is_owning_element() {
        let doc = HtmlDocument::parse(PAGE);
        let texts = doc.select("//a/text()", SelectorKind::XPath).unwrap();
        assert_eq!(texts[0].outer_html(), r#"<a href="/a">1</a>"#);
    }

    #[test]
    fn scalar_xpath_results() {
        let doc = HtmlDocument::parse(PAGE);
        let count = doc.select("count(//li)", SelectorKind::XPath).unwrap();
        assert_eq!(count.len(), 1);
        assert_eq!(count[0].kind(), NodeKind::Scalar);
        assert_eq!(count[0].node_value().as_deref(), Some("2"));
    }

    #[test]
    fn malformed_selectors_are_errors_not_panics() {
        let doc = HtmlDocument::parse(PAGE);
        assert!(doc.select("//li[", SelectorKind::XPath).is_err());
        assert!(doc.select("li[[", SelectorKind::Css).is_err());
    }

    #[test]
    fn fragment_scope_makes_relative_xpath_work() {
        let doc = HtmlDocument::parse_fragment(r#"<li class="p"><a href="/a">1</a></li>"#);
        assert_eq!(doc.scope().map(|el| el.value().name().to_string()).as_deref(), Some("li"));

        let href = doc.select("a/@href", SelectorKind::XPath).unwrap();
        assert_eq!(href[0].node_value().as_deref(), Some("/a"));
        let dotted = doc.select(".//a", SelectorKind::XPath).unwrap();
        assert_eq!(dotted.len(), 1);
    }

    #[test]
    fn fragment_css_matches_scope_element_itself() {
        let doc = HtmlDocument::parse_fragment(r#"<a class="page" href="/2">2</a>"#);
        let hits = doc.select("a.page", SelectorKind::Css).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].attribute("href").as_deref(), Some("/2"));
    }

    #[test]
    fn table_row_fragment_survives_reparse() {
        let doc = HtmlDocument::parse_fragment("<tr><td>Ann</td><td>42</td></tr>");
        assert_eq!(doc.scope().map(|el| el.value().name().to_string()).as_deref(), Some("tr"));
        let cells = doc.select("td", SelectorKind::XPath).unwrap();
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[1].text_content(), "42");
        let css_cells = doc.select("td:nth-child(2)", SelectorKind::Css).unwrap();
        assert_eq!(css_cells[0].text_content(), "42");
    }

    #[test]
    fn col_fragment_survives_reparse() {
        let doc = HtmlDocument::parse_fragment(r#"<col span="2">"#);
        assert_eq!(doc.scope().map(|el| el.value().name().to_string()).as_deref(), Some("col"));
        let span = doc.select("@span", SelectorKind::XPath).unwrap();
        assert_eq!(span[0].node_value().as_deref(), Some("2"));
    }

    #[test]
    fn selector_kind_parses_and_displays() {
        assert_eq!("CSS".parse::<SelectorKind>().unwrap(), SelectorKind::Css);
        assert_eq!("xpath".parse::<SelectorKind>().unwrap(), SelectorKind::XPath);
        assert!("jsonpath".parse::<SelectorKind>().is_err());
        assert_eq!(SelectorKind::XPath.to_string(), "xpath");
    }
}

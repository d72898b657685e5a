// ABOUTME: Single-selector query functions: first value, all values, text, attributes, existence and count.
// ABOUTME: None of them return errors; failures degrade to None, empty vectors, false or zero.

use serde_json::Value;

use crate::extractors::report;
use crate::extractors::value::{extract_all, extract_first, select_nodes};
use crate::options::ExtractOptions;
use crate::select::{HtmlDocument, MatchedNode, NodeKind, SelectorKind};

/// The first match's value, run through `opts.transform` when set.
///
/// ```
/// use digests_glean::{extract_single, ExtractOptions, SelectorKind};
///
/// let html = "<h1> Hello </h1>";
/// let title = extract_single(html, "//h1", SelectorKind::XPath, None, &ExtractOptions::default());
/// assert_eq!(title, Some("Hello".into()));
/// ```
pub fn extract_single(
    html: &str,
    selector: &str,
    kind: SelectorKind,
    attribute: Option<&str>,
    opts: &ExtractOptions,
) -> Option<Value> {
    let doc = HtmlDocument::parse(html);
    let nodes = select_nodes(&doc, selector, kind, opts.verbose);
    let value = Value::String(extract_first(&nodes, attribute, opts.raw)?);
    apply_transform(value, opts)
}

/// Every match's value, each run through `opts.transform` when set.
pub fn extract_multiple(
    html: &str,
    selector: &str,
    kind: SelectorKind,
    attribute: Option<&str>,
    opts: &ExtractOptions,
) -> Vec<Value> {
    let doc = HtmlDocument::parse(html);
    let nodes = select_nodes(&doc, selector, kind, opts.verbose);
    let values = extract_all(&nodes, attribute, opts.raw, opts.keep_empty);

    let Some(spec) = &opts.transform else {
        return values;
    };
    match spec.compile().apply_each(values, &opts.context()) {
        Ok(values) => values,
        Err(err) => {
            report(opts.verbose, selector, &err);
            Vec::new()
        }
    }
}

/// Text of the first match with whitespace collapsed.
pub fn extract_text(html: &str, selector: &str, kind: SelectorKind, opts: &ExtractOptions) -> Option<String> {
    let doc = HtmlDocument::parse(html);
    let nodes = select_nodes(&doc, selector, kind, opts.verbose);
    let text = nodes.first().map(text_of).filter(|t| !t.is_empty())?;
    apply_transform(Value::String(text), opts).map(into_text)
}

/// Values of `attribute` on every matched element, skipping elements without it.
pub fn extract_attributes(
    html: &str,
    selector: &str,
    kind: SelectorKind,
    attribute: &str,
    opts: &ExtractOptions,
) -> Vec<String> {
    let doc = HtmlDocument::parse(html);
    select_nodes(&doc, selector, kind, opts.verbose)
        .iter()
        .filter_map(|node| node.attribute(attribute))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .filter_map(|value| apply_transform(Value::String(value), opts).map(into_text))
        .collect()
}

/// Whether the selector matches anything.
///
/// A scalar XPath result such as `boolean(//table)` or `count(//li)` answers
/// by its value: `false`, `0`, `NaN` and the empty string mean absent.
pub fn exists(html: &str, selector: &str, kind: SelectorKind, opts: &ExtractOptions) -> bool {
    let doc = HtmlDocument::parse(html);
    let nodes = select_nodes(&doc, selector, kind, opts.verbose);
    match scalar_of(&nodes) {
        Some(value) => !matches!(value.as_str(), "" | "false" | "0" | "-0" | "NaN"),
        None => !nodes.is_empty(),
    }
}

/// Number of matches.
///
/// A scalar XPath result is read as the count itself when it is a
/// non-negative integer, so `count(//li)` agrees with `//li`. Any other
/// scalar counts as zero.
pub fn count(html: &str, selector: &str, kind: SelectorKind, opts: &ExtractOptions) -> usize {
    let doc = HtmlDocument::parse(html);
    let nodes = select_nodes(&doc, selector, kind, opts.verbose);
    match scalar_of(&nodes) {
        Some(value) => value.trim().parse::<usize>().unwrap_or(0),
        None => nodes.len(),
    }
}

fn scalar_of(nodes: &[MatchedNode<'_>]) -> Option<String> {
    match nodes {
        [node] if node.kind() == NodeKind::Scalar => node.node_value(),
        _ => None,
    }
}

fn text_of(node: &MatchedNode<'_>) -> String {
    let text = match node.kind() {
        NodeKind::Element => node.text_content(),
        _ => node.node_value().unwrap_or_default(),
    };
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn apply_transform(value: Value, opts: &ExtractOptions) -> Option<Value> {
    let Some(spec) = &opts.transform else {
        return Some(value);
    };
    match spec.compile().apply(value, &opts.context()) {
        Ok(Value::Null) => None,
        Ok(value) => Some(value),
        Err(err) => {
            report(opts.verbose, "transform", &err);
            None
        }
    }
}

fn into_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::TransformSpec;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const PAGE: &str = r#"
        <div class="post"><h2>  First
            post </h2><a href="/one">one</a></div>
        <div class="post"><h2>Second</h2><a>two</a></div>
    "#;

    fn opts() -> ExtractOptions {
        ExtractOptions::default()
    }

    #[test]
    fn single_and_multiple() {
        assert_eq!(
            extract_single(PAGE, "//h2", SelectorKind::XPath, None, &opts()),
            Some(json!("First\n            post"))
        );
        assert_eq!(
            extract_multiple(PAGE, "div.post a", SelectorKind::Css, Some("href"), &opts()),
            vec![json!("/one")]
        );
    }

    #[test]
    fn missing_text_node_is_none() {
        assert_eq!(
            extract_single(PAGE, "//nonexistent/text()", SelectorKind::XPath, None, &opts()),
            None
        );
    }

    #[test]
    fn text_collapses_whitespace() {
        assert_eq!(
            extract_text(PAGE, "h2", SelectorKind::Css, &opts()).as_deref(),
            Some("First post")
        );
    }

    #[test]
    fn attributes_skip_elements_without_them() {
        assert_eq!(
            extract_attributes(PAGE, "//a", SelectorKind::XPath, "href", &opts()),
            vec!["/one".to_string()]
        );
    }

    #[test]
    fn attributes_resolve_with_transform_and_base() {
        let opts = opts()
            .with_base_url("https://x.com/blog/")
            .with_transform(
                crate::transform::builtin::BuiltinTransform::AbsoluteUrl
                    .into_spec()
                    .unwrap(),
            );
        assert_eq!(
            extract_attributes(PAGE, "a", SelectorKind::Css, "href", &opts),
            vec!["https://x.com/one".to_string()]
        );
    }

    #[test]
    fn exists_and_count() {
        assert!(exists(PAGE, "div.post", SelectorKind::Css, &opts()));
        assert!(!exists(PAGE, "//table", SelectorKind::XPath, &opts()));
        assert_eq!(count(PAGE, "//div[@class='post']", SelectorKind::XPath, &opts()), 2);
        assert_eq!(count(PAGE, "div[[", SelectorKind::Css, &opts()), 0);
    }

    #[test]
    fn scalar_results_answer_by_value() {
        let list = "<ul><li>a</li><li>b</li></ul>";
        assert!(!exists(list, "boolean(//table)", SelectorKind::XPath, &opts()));
        assert!(!exists(list, "count(//table)", SelectorKind::XPath, &opts()));
        assert!(!exists(list, "string(//table)", SelectorKind::XPath, &opts()));
        assert!(exists(list, "boolean(//li)", SelectorKind::XPath, &opts()));
        assert!(exists(list, "count(//li)", SelectorKind::XPath, &opts()));

        assert_eq!(count(list, "count(//li)", SelectorKind::XPath, &opts()), 2);
        assert_eq!(count(list, "count(//table)", SelectorKind::XPath, &opts()), 0);
        assert_eq!(count(list, "boolean(//li)", SelectorKind::XPath, &opts()), 0);
        assert_eq!(count(list, "1 div 2", SelectorKind::XPath, &opts()), 0);
    }

    #[test]
    fn keep_empty_placeholders_skip_the_transform() {
        let html = r#"<div><img data-id="1"><img><img data-id="3"></div>"#;
        let opts = opts()
            .keep_empty(true)
            .with_transform(
                crate::transform::builtin::BuiltinTransform::ParseInt
                    .into_spec()
                    .unwrap(),
            );
        assert_eq!(
            extract_multiple(html, "img", SelectorKind::Css, Some("data-id"), &opts),
            vec![json!(1), Value::Null, json!(3)]
        );
    }

    #[test]
    fn failing_transform_degrades() {
        let opts = opts().with_transform(TransformSpec::func(|_| Err(anyhow::anyhow!("x"))));
        assert_eq!(extract_single(PAGE, "//h2", SelectorKind::XPath, None, &opts), None);
        assert!(extract_multiple(PAGE, "//h2", SelectorKind::XPath, None, &opts).is_empty());
    }

    #[test]
    fn raw_option_returns_markup() {
        let opts = opts().raw(true);
        assert_eq!(
            extract_single(PAGE, "(//a)[2]", SelectorKind::XPath, None, &opts),
            Some(json!("<a>two</a>"))
        );
    }
}

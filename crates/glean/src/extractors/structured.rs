// ABOUTME: Schema-driven extraction of records, lists of records and pagination links from HTML.
// ABOUTME: Each field is isolated: a failing field becomes null or an empty array and extraction continues.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TransformError;
use crate::extractors::report;
use crate::extractors::schema::{FieldSpec, Schema, SchemaField};
use crate::extractors::value::{extract, select_nodes};
use crate::options::ExtractOptions;
use crate::select::{HtmlDocument, SelectorKind};
use crate::transform::builtin::AbsoluteUrl;
use crate::transform::{TransformContext, TransformSpec};

/// One extracted record, keyed by schema field name in schema order.
pub type Record = Map<String, Value>;

/// A pagination link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationPage {
    pub href: String,
    pub text: String,
}

/// Extract one record from `html` according to `schema`.
///
/// Every schema field is present in the result.
pub fn extract_structured(html: &str, schema: &Schema, opts: &ExtractOptions) -> Record {
    let doc = HtmlDocument::parse(html);
    extract_record(&doc, schema, opts)
}

/// Extract one record per container matched by `container_selector`.
///
/// Each container is serialized and reparsed on its own, so field selectors
/// are evaluated relative to the container element.
pub fn extract_structured_list(
    html: &str,
    container_selector: &str,
    container_kind: SelectorKind,
    schema: &Schema,
    opts: &ExtractOptions,
) -> Vec<Record> {
    let doc = HtmlDocument::parse(html);
    let containers = select_nodes(&doc, container_selector, container_kind, opts.verbose);
    tracing::debug!(
        selector = container_selector,
        count = containers.len(),
        "matched containers"
    );

    containers
        .iter()
        .map(|container| {
            let fragment = HtmlDocument::parse_fragment(&container.outer_html());
            extract_record(&fragment, schema, opts)
        })
        .collect()
}

/// Extract the links inside every pagination container.
///
/// With a base URL in `opts`, relative hrefs are resolved against it. Pages
/// with an empty href or text are dropped.
pub fn extract_pagination(
    html: &str,
    container_selector: &str,
    container_kind: SelectorKind,
    opts: &ExtractOptions,
) -> Vec<PaginationPage> {
    let schema = pagination_schema(opts.base_url.is_some());
    extract_structured_list(html, container_selector, container_kind, &schema, opts)
        .into_iter()
        .filter_map(|record| {
            let href = string_field(&record, "href")?;
            let text = string_field(&record, "text")?;
            Some(PaginationPage { href, text })
        })
        .collect()
}

fn pagination_schema(absolute: bool) -> Schema {
    let mut href = FieldSpec::xpath("descendant-or-self::a/@href");
    if absolute {
        href = href.with_transform(TransformSpec::class::<AbsoluteUrl>(()));
    }
    Schema::new()
        .field("href", href)
        .field("text", FieldSpec::xpath("descendant-or-self::a"))
}

fn string_field(record: &Record, name: &str) -> Option<String> {
    record
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub(crate) fn extract_record(doc: &HtmlDocument, schema: &Schema, opts: &ExtractOptions) -> Record {
    let ctx = opts.context();
    let mut record = Record::new();
    for field in schema.fields() {
        let value = match extract_field(doc, field, &ctx, opts.verbose) {
            Ok(value) => value,
            Err(err) => {
                report(opts.verbose, &format!("field {:?}", field.name), &err);
                field.spec.empty_value()
            }
        };
        record.insert(field.name.clone(), value);
    }
    record
}

fn extract_field(
    doc: &HtmlDocument,
    field: &SchemaField,
    ctx: &TransformContext,
    verbose: bool,
) -> Result<Value, TransformError> {
    let nodes = select_nodes(doc, &field.spec.selector, field.spec.kind, verbose);
    let value = extract(&nodes, field.spec.mode());

    if field.pipeline.is_empty() {
        return Ok(value);
    }
    match value {
        Value::Null => Ok(Value::Null),
        Value::Array(items) => field.pipeline.apply_each(items, ctx).map(Value::Array),
        other => field.pipeline.apply(other, ctx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn failing_transform_only_nulls_its_field() {
        let schema = Schema::new()
            .field(
                "bad",
                FieldSpec::xpath("//h1").with_transform(TransformSpec::func(|_| {
                    Err(anyhow::anyhow!("nope"))
                })),
            )
            .field(
                "bad_many",
                FieldSpec::xpath("//li").multiple().with_transform(TransformSpec::func(|_| {
                    Err(anyhow::anyhow!("nope"))
                })),
            )
            .field("good", FieldSpec::css("h1"));

        let record = extract_structured(
            "<h1>Hi</h1><ul><li>a</li></ul>",
            &schema,
            &ExtractOptions::default(),
        );
        assert_eq!(
            Value::Object(record),
            json!({"bad": null, "bad_many": [], "good": "Hi"})
        );
    }

    #[test]
    fn transform_is_skipped_for_missing_values() {
        let schema = Schema::new().field(
            "n",
            FieldSpec::xpath("//missing").with_transform(TransformSpec::func(|_| {
                Err(anyhow::anyhow!("should not run"))
            })),
        );
        let record = extract_structured("<p>x</p>", &schema, &ExtractOptions::default());
        assert_eq!(record.get("n"), Some(&Value::Null));
    }

    #[test]
    fn pagination_schema_absolutizes_only_with_base() {
        assert!(pagination_schema(false).fields()[0].pipeline.is_empty());
        assert_eq!(pagination_schema(true).fields()[0].pipeline.len(), 1);
    }

    #[test]
    fn list_of_table_rows() {
        let html = r#"<table><tr class="r"><td>Ann</td><td>42</td></tr><tr class="r"><td>Bo</td><td>7</td></tr></table>"#;
        let schema = Schema::new()
            .field("name", FieldSpec::xpath("td[1]"))
            .field("age", FieldSpec::css("td:nth-child(2)"));
        let records = extract_structured_list(
            html,
            "tr.r",
            SelectorKind::Css,
            &schema,
            &ExtractOptions::default(),
        );
        assert_eq!(
            Value::Array(records.into_iter().map(Value::Object).collect()),
            json!([{"name": "Ann", "age": "42"}, {"name": "Bo", "age": "7"}])
        );
    }
}

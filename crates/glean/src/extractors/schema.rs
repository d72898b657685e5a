// ABOUTME: Field specifications and ordered schemas describing a record to extract from one HTML fragment.
// ABOUTME: Schemas preserve field order, compile each field's transform once and load from JSON files.

use std::fmt;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::Value;

use crate::error::SchemaError;
use crate::extractors::value::ValueMode;
use crate::select::compiled::precompile_selectors;
use crate::select::SelectorKind;
use crate::transform::{Pipeline, TransformSpec};

/// How to extract one field of a record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    pub selector: String,
    #[serde(default, alias = "type")]
    pub kind: SelectorKind,
    #[serde(default)]
    pub attribute: Option<String>,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default)]
    pub raw: bool,
    #[serde(default)]
    pub keep_empty: bool,
    #[serde(default)]
    pub transform: Option<TransformSpec>,
}

impl FieldSpec {
    pub fn new(selector: impl Into<String>, kind: SelectorKind) -> Self {
        Self {
            selector: selector.into(),
            kind,
            ..Default::default()
        }
    }

    pub fn xpath(selector: impl Into<String>) -> Self {
        Self::new(selector, SelectorKind::XPath)
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Self::new(selector, SelectorKind::Css)
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    pub fn with_transform(mut self, transform: TransformSpec) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    pub fn raw(mut self) -> Self {
        self.raw = true;
        self
    }

    pub fn keep_empty(mut self) -> Self {
        self.keep_empty = true;
        self
    }

    pub(crate) fn mode(&self) -> ValueMode<'_> {
        ValueMode {
            attribute: self.attribute.as_deref(),
            raw: self.raw,
            multiple: self.multiple,
            keep_empty: self.keep_empty,
        }
    }

    /// Value recorded when the field fails.
    pub(crate) fn empty_value(&self) -> Value {
        if self.multiple {
            Value::Array(Vec::new())
        } else {
            Value::Null
        }
    }
}

/// A schema field with its transform compiled.
#[derive(Debug, Clone)]
pub struct SchemaField {
    pub name: String,
    pub spec: FieldSpec,
    pub(crate) pipeline: Pipeline,
}

/// Ordered mapping from output field names to field specs.
///
/// Output records list their keys in schema order.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<SchemaField>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Schema::insert`].
    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.insert(name, spec);
        self
    }

    /// Add a field, replacing any field of the same name in place.
    ///
    /// The field's transform is compiled and a CSS selector is parsed into the
    /// shared cache here, not per document.
    pub fn insert(&mut self, name: impl Into<String>, spec: FieldSpec) {
        let name = name.into();
        if spec.kind == SelectorKind::Css {
            precompile_selectors([spec.selector.as_str()]);
        }
        let pipeline = spec
            .transform
            .as_ref()
            .map(TransformSpec::compile)
            .unwrap_or_default();
        let field = SchemaField {
            name,
            spec,
            pipeline,
        };
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.spec)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parse a schema from its JSON form.
    ///
    /// ```
    /// use digests_glean::Schema;
    ///
    /// let schema = Schema::from_json(r#"{
    ///     "title": { "selector": "//h1" },
    ///     "links": { "selector": "a", "kind": "css", "attribute": "href", "multiple": true }
    /// }"#).unwrap();
    /// assert_eq!(schema.names().collect::<Vec<_>>(), ["title", "links"]);
    /// ```
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl<'de> Deserialize<'de> for Schema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SchemaVisitor;

        impl<'de> Visitor<'de> for SchemaVisitor {
            type Value = Schema;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of field names to field specs")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Schema, A::Error> {
                let mut schema = Schema::new();
                while let Some((name, spec)) = map.next_entry::<String, FieldSpec>()? {
                    if schema.contains(&name) {
                        return Err(de::Error::custom(format!("duplicate field {:?}", name)));
                    }
                    schema.insert(name, spec);
                }
                Ok(schema)
            }
        }

        deserializer.deserialize_map(SchemaVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn json_order_is_preserved() {
        let schema = Schema::from_json(
            r#"{"zeta": {"selector": "//b"}, "alpha": {"selector": "i", "type": "css"}}"#,
        )
        .unwrap();
        assert_eq!(schema.names().collect::<Vec<_>>(), vec!["zeta", "alpha"]);
        assert_eq!(schema.get("alpha").unwrap().kind, SelectorKind::Css);
        assert_eq!(schema.get("zeta").unwrap().kind, SelectorKind::XPath);
    }

    #[test]
    fn duplicate_json_fields_are_rejected() {
        let err = Schema::from_json(r#"{"a": {"selector": "//b"}, "a": {"selector": "//i"}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("duplicate field"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Schema::from_json(r#"{"a": {"selector": "//b", "selectr": "x"}}"#).is_err());
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut schema = Schema::new()
            .field("a", FieldSpec::xpath("//a"))
            .field("b", FieldSpec::xpath("//b"));
        schema.insert("a", FieldSpec::css("a").multiple());
        assert_eq!(schema.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(schema.get("a").unwrap().multiple);
    }

    #[test]
    fn transforms_compile_on_insert() {
        let schema = Schema::from_json(
            r#"{"n": {"selector": "//b", "transform": [{"type": "trim"}, {"type": "parse_int"}]}}"#,
        )
        .unwrap();
        assert_eq!(schema.fields()[0].pipeline.len(), 2);
    }

    #[test]
    fn empty_value_depends_on_multiplicity() {
        assert_eq!(FieldSpec::xpath("//a").empty_value(), Value::Null);
        assert_eq!(
            FieldSpec::xpath("//a").multiple().empty_value(),
            Value::Array(vec![])
        );
    }
}

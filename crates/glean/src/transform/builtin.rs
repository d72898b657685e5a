// ABOUTME: Builtin transform stages usable from schema files (trim, parse_int, regex, absolute_url, ...).
// ABOUTME: Configurable stages are ConfiguredTransform types so they are built per value like any class stage.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use url::Url;

use crate::error::{SchemaError, TransformError};
use crate::transform::{ConfiguredTransform, Transform, TransformContext, TransformSpec};

/// A named, serializable transform stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BuiltinTransform {
    /// Strip leading and trailing whitespace
    Trim,
    /// Collapse runs of whitespace into single spaces and trim
    CollapseWhitespace,
    Lowercase,
    Uppercase,
    /// Parse the leading integer of a string ("12px" -> 12)
    ParseInt,
    /// Parse the leading decimal number of a string ("3.5 stars" -> 3.5)
    ParseFloat,
    /// Keep one capture group of the first regex match; no match yields null
    Regex {
        pattern: String,
        #[serde(default)]
        group: usize,
    },
    /// Replace every regex match with `with` (supports $1-style group references)
    Replace { pattern: String, with: String },
    /// Split on a literal separator into an array of trimmed, non-empty parts
    Split { separator: String },
    /// Resolve a relative URL against the caller's base URL
    AbsoluteUrl,
}

impl BuiltinTransform {
    /// Build the stage, compiling any regex up front.
    pub fn into_spec(self) -> Result<TransformSpec, SchemaError> {
        let spec = match self {
            BuiltinTransform::Trim => {
                TransformSpec::func(|v| map_text(v, |s| s.trim().to_string()))
            }
            BuiltinTransform::CollapseWhitespace => TransformSpec::func(|v| {
                map_text(v, |s| s.split_whitespace().collect::<Vec<_>>().join(" "))
            }),
            BuiltinTransform::Lowercase => TransformSpec::func(|v| map_text(v, |s| s.to_lowercase())),
            BuiltinTransform::Uppercase => TransformSpec::func(|v| map_text(v, |s| s.to_uppercase())),
            BuiltinTransform::ParseInt => TransformSpec::func(|v| Ok(parse_int(&v)?)),
            BuiltinTransform::ParseFloat => TransformSpec::func(|v| Ok(parse_float(&v)?)),
            BuiltinTransform::Regex { pattern, group } => {
                let regex = compile(&pattern)?;
                TransformSpec::class::<RegexCapture>(RegexPayload { regex, group })
            }
            BuiltinTransform::Replace { pattern, with } => {
                let regex = compile(&pattern)?;
                TransformSpec::class::<RegexReplace>(ReplacePayload { regex, with })
            }
            BuiltinTransform::Split { separator } => {
                TransformSpec::func(move |v| Ok(split(&v, &separator)?))
            }
            BuiltinTransform::AbsoluteUrl => TransformSpec::class::<AbsoluteUrl>(()),
        };
        Ok(spec)
    }
}

fn compile(pattern: &str) -> Result<Regex, SchemaError> {
    Regex::new(pattern).map_err(|source| SchemaError::Regex {
        pattern: pattern.to_string(),
        source,
    })
}

/// Text view of a scalar value; strings pass through, numbers and booleans are stringified.
fn text_of(value: &Value) -> Result<String, TransformError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(TransformError::NotAString(other.to_string())),
    }
}

fn map_text(value: Value, f: impl Fn(&str) -> String) -> anyhow::Result<Value> {
    let text = text_of(&value)?;
    Ok(Value::String(f(&text)))
}

static LEADING_INT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?\d+").expect("valid integer regex"));

static LEADING_FLOAT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?").expect("valid float regex")
});

fn parse_int(value: &Value) -> Result<Value, TransformError> {
    if let Some(n) = value.as_i64() {
        return Ok(Value::from(n));
    }
    let text = text_of(value)?;
    let trimmed = text.trim();
    LEADING_INT_RE
        .find(trimmed)
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .map(Value::from)
        .ok_or_else(|| TransformError::Parse {
            input: text.clone(),
            target: "integer",
        })
}

fn parse_float(value: &Value) -> Result<Value, TransformError> {
    let text = text_of(value)?;
    let trimmed = text.trim();
    LEADING_FLOAT_RE
        .find(trimmed)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| TransformError::Parse {
            input: text.clone(),
            target: "number",
        })
}

fn split(value: &Value, separator: &str) -> Result<Value, TransformError> {
    let text = text_of(value)?;
    let parts = text
        .split(separator)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| Value::String(part.to_string()))
        .collect();
    Ok(Value::Array(parts))
}

pub struct RegexPayload {
    pub regex: Regex,
    pub group: usize,
}

/// Keeps one capture group of the first match.
pub struct RegexCapture {
    regex: Regex,
    group: usize,
}

impl Transform for RegexCapture {
    fn transform(&self, value: Value) -> Result<Value, TransformError> {
        let text = text_of(&value)?;
        Ok(self
            .regex
            .captures(&text)
            .and_then(|caps| caps.get(self.group))
            .map(|m| Value::String(m.as_str().to_string()))
            .unwrap_or(Value::Null))
    }
}

impl ConfiguredTransform for RegexCapture {
    type Payload = RegexPayload;

    fn construct(payload: &RegexPayload, _ctx: &TransformContext) -> Self {
        RegexCapture {
            regex: payload.regex.clone(),
            group: payload.group,
        }
    }
}

pub struct ReplacePayload {
    pub regex: Regex,
    pub with: String,
}

pub struct RegexReplace {
    regex: Regex,
    with: String,
}

impl Transform for RegexReplace {
    fn transform(&self, value: Value) -> Result<Value, TransformError> {
        let text = text_of(&value)?;
        Ok(Value::String(
            self.regex.replace_all(&text, self.with.as_str()).into_owned(),
        ))
    }
}

impl ConfiguredTransform for RegexReplace {
    type Payload = ReplacePayload;

    fn construct(payload: &ReplacePayload, _ctx: &TransformContext) -> Self {
        RegexReplace {
            regex: payload.regex.clone(),
            with: payload.with.clone(),
        }
    }
}

/// Resolves relative URLs against the base URL of the extraction call.
pub struct AbsoluteUrl {
    base_url: Option<String>,
}

impl Transform for AbsoluteUrl {
    fn transform(&self, value: Value) -> Result<Value, TransformError> {
        let href = text_of(&value)?;
        Ok(Value::String(match &self.base_url {
            Some(base) => resolve_url(base, &href),
            None => href,
        }))
    }
}

impl ConfiguredTransform for AbsoluteUrl {
    type Payload = ();

    fn construct(_: &(), ctx: &TransformContext) -> Self {
        AbsoluteUrl {
            base_url: ctx.base_url().map(str::to_string),
        }
    }
}

/// Resolve `href` against `base`.
///
/// Hrefs that already carry a scheme separator are returned untouched, and any
/// resolution failure (bad base, unjoinable href) returns `href` unchanged.
pub fn resolve_url(base: &str, href: &str) -> String {
    if href.contains("://") {
        return href.to_string();
    }
    Url::parse(base)
        .and_then(|base| base.join(href))
        .map(|joined| joined.to_string())
        .unwrap_or_else(|_| href.to_string())
}

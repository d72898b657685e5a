// ABOUTME: Main library entry point for glean, an HTML data-extraction toolkit with a retrying fetcher.
// ABOUTME: Re-exports the public API: query and schema extractors, transforms, options, Fetcher and errors.

//! Glean - extract structured data from HTML with XPath or CSS selectors.
//!
//! Extraction functions take raw HTML, parse it per call and never fail:
//! missing or malformed input degrades to `None`, empty vectors, `false` or
//! zero. Fetching HTML is separate and returns a typed [`FetchError`] once
//! retries are exhausted.
//!
//! # Example
//!
//! ```
//! use digests_glean::{extract_structured_list, ExtractOptions, FieldSpec, Schema, SelectorKind};
//! use digests_glean::transform::builtin::BuiltinTransform;
//!
//! let html = r#"<ul><li class="p"><a href="/a">1</a></li><li class="p"><a href="/b">2</a></li></ul>"#;
//! let schema = Schema::new()
//!     .field(
//!         "href",
//!         FieldSpec::xpath("a/@href").with_transform(BuiltinTransform::AbsoluteUrl.into_spec().unwrap()),
//!     )
//!     .field("text", FieldSpec::xpath("a"));
//! let opts = ExtractOptions::new().with_base_url("https://x.com");
//!
//! let records = extract_structured_list(html, "li.p", SelectorKind::Css, &schema, &opts);
//! assert_eq!(records[0]["href"], "https://x.com/a");
//! assert_eq!(records[1]["text"], "2");
//! ```

pub mod error;
pub mod extractors;
pub mod fetch;
pub mod options;
pub mod select;
pub mod transform;

pub use crate::error::{ErrorKind, FetchError, SchemaError, SelectError, TransformError, TransportError};
pub use crate::extractors::query::{
    count, exists, extract_attributes, extract_multiple, extract_single, extract_text,
};
pub use crate::extractors::schema::{FieldSpec, Schema};
pub use crate::extractors::structured::{
    extract_pagination, extract_structured, extract_structured_list, PaginationPage, Record,
};
pub use crate::fetch::{fetch_html, FetchResponse, Fetcher};
pub use crate::options::{ExtractOptions, FetchOptions, FetcherBuilder, ProxyConfig, RetryOn};
pub use crate::select::{HtmlDocument, SelectorKind};
pub use crate::transform::{ConfiguredTransform, Pipeline, Transform, TransformContext, TransformSpec};

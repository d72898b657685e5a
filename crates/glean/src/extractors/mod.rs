// ABOUTME: Extraction layer: value extraction, schemas, structured/list/pagination extractors and the query API.
// ABOUTME: Hosts the shared helper that logs swallowed failures at debug or, when verbose, warn level.

//! Extraction module.
//!
//! Submodules:
//! - `value`: turns selector matches into strings, arrays or null.
//! - `schema`: `FieldSpec` and the ordered `Schema`.
//! - `structured`: schema, list and pagination extractors.
//! - `query`: single-selector convenience functions.

pub mod query;
pub mod schema;
pub mod structured;
pub mod value;

use std::fmt::Display;

/// Log a failure that extraction recovers from.
pub(crate) fn report(verbose: bool, context: &str, err: &dyn Display) {
    if verbose {
        tracing::warn!(context, error = %err, "extraction step failed");
    } else {
        tracing::debug!(context, error = %err, "extraction step failed");
    }
}

// ABOUTME: Pre-compiled CSS selector cache shared by every extraction call.
// ABOUTME: Caches parse failures too, so a bad selector is only reported once per process.

//! Selector caching for efficient repeated CSS queries.
//!
//! Schemas are applied to many documents (and to every container of a list),
//! so the same selector strings are parsed over and over. This cache compiles
//! each string once and hands out clones afterwards.

use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;
use scraper::Selector;

type Compiled = Result<Selector, String>;

/// Thread-safe cache of compiled CSS selectors, keyed by selector text.
static SELECTOR_CACHE: Lazy<RwLock<HashMap<String, Compiled>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

fn compile(css: &str) -> Compiled {
    Selector::parse(css).map_err(|e| e.to_string())
}

/// Gets or compiles a CSS selector, caching the result.
///
/// Returns the parse error message for invalid selectors. A poisoned lock is
/// recovered rather than propagated; the map only ever grows with complete
/// entries.
pub fn get_or_compile(css: &str) -> Compiled {
    {
        let cache = SELECTOR_CACHE.read().unwrap_or_else(|e| e.into_inner());
        if let Some(cached) = cache.get(css) {
            return cached.clone();
        }
    }

    let compiled = compile(css);
    let mut cache = SELECTOR_CACHE.write().unwrap_or_else(|e| e.into_inner());
    // Another thread may have inserted while we compiled.
    if let Some(cached) = cache.get(css) {
        return cached.clone();
    }
    cache.insert(css.to_string(), compiled.clone());
    compiled
}

/// Precompiles the CSS selectors of a batch up front.
pub fn precompile_selectors<I, S>(selectors: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut cache = SELECTOR_CACHE.write().unwrap_or_else(|e| e.into_inner());
    for css in selectors {
        let css = css.as_ref();
        if !cache.contains_key(css) {
            cache.insert(css.to_string(), compile(css));
        }
    }
}

// ABOUTME: CSS backend: evaluates cached scraper selectors over the parsed html5ever tree.
// ABOUTME: Fragment documents match the scope element itself plus its descendants.

use crate::error::SelectError;
use crate::select::compiled::get_or_compile;
use crate::select::{HtmlDocument, MatchedNode};

pub(super) fn select<'a>(
    doc: &'a HtmlDocument,
    selector: &str,
) -> Result<Vec<MatchedNode<'a>>, SelectError> {
    let compiled = get_or_compile(selector).map_err(|reason| SelectError::InvalidSelector {
        kind: "css",
        selector: selector.to_string(),
        reason,
    })?;

    let matches = match doc.scope() {
        Some(scope) => {
            let mut hits = Vec::new();
            if compiled.matches(&scope) {
                hits.push(MatchedNode::Css(scope));
            }
            hits.extend(scope.select(&compiled).map(MatchedNode::Css));
            hits
        }
        None => doc.html().select(&compiled).map(MatchedNode::Css).collect(),
    };
    Ok(matches)
}

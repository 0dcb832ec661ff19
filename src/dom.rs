//! Markup parsing for the structure engine.

use scraper::Html;

/// Parse markup into a read-only tree. html5ever recovers from broken markup,
/// so this never fails; an empty input yields a document with an empty body.
pub fn parse_document(markup: &str) -> Html {
    Html::parse_document(markup)
}

/// Whether the markup has anything worth parsing
pub fn has_markup(markup: &str) -> bool {
    !markup.trim().is_empty()
}

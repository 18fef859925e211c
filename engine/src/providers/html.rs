//! Page text extraction

use scraper::{Html, Node, Selector};

const SKIPPED_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Visible text of the document `<body>`, one text node per line, blank
/// lines dropped.
pub fn extract_body_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let Ok(body_selector) = Selector::parse("body") else {
        return String::new();
    };
    let Some(body) = document.select(&body_selector).next() else {
        return String::new();
    };

    let mut lines = Vec::new();
    for node in body.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };

        let skipped = node
            .parent()
            .and_then(|p| p.value().as_element())
            .map(|el| SKIPPED_ELEMENTS.contains(&el.name()))
            .unwrap_or(false);
        if skipped {
            continue;
        }

        lines.extend(
            text.split('\n')
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string),
        );
    }

    lines.join("\n")
}

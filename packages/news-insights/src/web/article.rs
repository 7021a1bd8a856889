//! Article body text extraction.

use scraper::{ElementRef, Html, Node, Selector};

use crate::traits::web::ContentExtractor;

/// Everything from this marker on is teaser or related-content chrome.
const CUTOFF_MARKER: &str = "Story continues";

/// Lines shorter than this are glued onto the previous line.
const MIN_LINE_CHARS: usize = 10;

/// Text of the page's `<main>` element.
///
/// Script and style contents are dropped, text after "Story continues" is
/// cut, and fragments split off by inline markup (short lines, or lines
/// opening with `)`) are rejoined with a space.
#[derive(Debug, Clone, Copy, Default)]
pub struct MainTextExtractor;

impl MainTextExtractor {
    fn collect_text(element: ElementRef<'_>, out: &mut Vec<String>) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => {
                    let text = text.trim();
                    if !text.is_empty() {
                        out.push(text.to_string());
                    }
                }
                Node::Element(el) if matches!(el.name(), "script" | "style" | "noscript") => {}
                Node::Element(_) => {
                    if let Some(child) = ElementRef::wrap(child) {
                        Self::collect_text(child, out);
                    }
                }
                _ => {}
            }
        }
    }

    fn join_lines(text: &str) -> String {
        let mut joined = String::new();
        for line in text.split('\n') {
            if joined.is_empty() {
                joined.push_str(line);
            } else if line.starts_with(')') || line.chars().count() < MIN_LINE_CHARS {
                joined.push(' ');
                joined.push_str(line);
            } else {
                joined.push('\n');
                joined.push_str(line);
            }
        }
        joined
    }
}

impl ContentExtractor for MainTextExtractor {
    fn extract(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let selector = Selector::parse("main").ok()?;
        let main = document.select(&selector).next()?;

        let mut pieces = Vec::new();
        Self::collect_text(main, &mut pieces);
        let text = pieces.join("\n");

        let body = text.split(CUTOFF_MARKER).next().unwrap_or_default();
        let content = Self::join_lines(body.trim()).trim().to_string();
        (!content.is_empty()).then_some(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_main_text_without_scripts() {
        let html = r##"
            <html><body>
              <nav>Menu items here</nav>
              <main>
                <h1>Apple reports record quarter</h1>
                <script>var tracking = "ignored";</script>
                <style>.x { color: red }</style>
                <p>Revenue rose sharply on strong services demand.</p>
                <p>Shares of Apple (<a href="#">AAPL</a>) climbed in after-hours trading.</p>
                <p>Story continues</p>
                <p>Related: other stories you might like.</p>
              </main>
            </body></html>
        "##;

        let text = MainTextExtractor.extract(html).unwrap();
        assert!(text.starts_with("Apple reports record quarter"));
        assert!(text.contains("Revenue rose sharply on strong services demand."));
        assert!(text.contains("Shares of Apple ( AAPL ) climbed in after-hours trading."));
        assert!(!text.contains("tracking"));
        assert!(!text.contains("color"));
        assert!(!text.contains("Related"));
        assert!(!text.contains("Menu"));
    }

    #[test]
    fn rejoins_parenthesis_fragments() {
        let joined = MainTextExtractor::join_lines("Apple Inc. (\nAAPL\n) gained 3% today on the news");
        assert_eq!(joined, "Apple Inc. ( AAPL ) gained 3% today on the news");
    }

    #[test]
    fn page_without_main_is_unrecognized() {
        assert!(MainTextExtractor
            .extract("<html><body><p>No main here at all</p></body></html>")
            .is_none());
        assert!(MainTextExtractor
            .extract("<html><body><main><script>x()</script></main></body></html>")
            .is_none());
    }
}

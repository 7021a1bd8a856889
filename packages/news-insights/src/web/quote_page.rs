//! Yahoo Finance quote page parser.

use scraper::{Html, Selector};

use crate::traits::web::{ArticleLink, QuoteListing, QuoteParser};

pub const DEFAULT_QUOTE_BASE: &str = "https://sg.finance.yahoo.com/quote/";

/// Article hrefs must contain this to count as news.
const NEWS_PATH_MARKER: &str = "finance.yahoo.com/news";

/// Reads the organization name and news links off a quote page.
///
/// The org comes from the `title` attribute of `div.name`; links are the
/// `a.titles` anchors pointing at the news section.
#[derive(Debug, Clone)]
pub struct QuotePageParser {
    base_url: String,
}

impl Default for QuotePageParser {
    fn default() -> Self {
        Self::new(DEFAULT_QUOTE_BASE)
    }
}

impl QuotePageParser {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self { base_url }
    }

    fn org(document: &Html) -> Option<String> {
        let selector = Selector::parse("div.name[title]").ok()?;
        document
            .select(&selector)
            .filter_map(|el| el.value().attr("title"))
            .map(str::trim)
            .find(|title| !title.is_empty())
            .map(str::to_string)
    }

    fn links(document: &Html) -> Vec<ArticleLink> {
        let Ok(selector) = Selector::parse("a.titles[href]") else {
            return Vec::new();
        };
        document
            .select(&selector)
            .filter_map(|el| {
                let href = el.value().attr("href")?.trim();
                if !href.contains(NEWS_PATH_MARKER) {
                    return None;
                }
                let title = el
                    .value()
                    .attr("title")
                    .map(str::to_string)
                    .unwrap_or_else(|| el.text().collect::<String>());
                let title = title.trim();
                (!title.is_empty()).then(|| ArticleLink::new(href, title))
            })
            .collect()
    }
}

impl QuoteParser for QuotePageParser {
    fn quote_url(&self, ticker: &str) -> String {
        format!("{}{}/", self.base_url, ticker)
    }

    fn parse(&self, html: &str) -> QuoteListing {
        let document = Html::parse_document(html);
        QuoteListing {
            org: Self::org(&document),
            links: Self::links(&document),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <div class="name yf-1c9i0iv" title="Apple Inc. (AAPL)"><h1>Apple Inc.</h1></div>
          <ul>
            <li><a class="subtle-link titles" title="Apple beats estimates"
                   href="https://sg.finance.yahoo.com/news/apple-beats-estimates.html">x</a></li>
            <li><a class="titles" href="https://sg.finance.yahoo.com/news/iphone-sales.html">
                   <h3>iPhone sales climb</h3></a></li>
            <li><a class="titles" title="Ad" href="https://ads.example.com/promo">Ad</a></li>
            <li><a class="other" title="Not a title link"
                   href="https://sg.finance.yahoo.com/news/other.html">o</a></li>
          </ul>
        </body></html>
    "#;

    #[test]
    fn quote_url_for_ticker() {
        let parser = QuotePageParser::default();
        assert_eq!(
            parser.quote_url("AAPL"),
            "https://sg.finance.yahoo.com/quote/AAPL/"
        );
        assert_eq!(
            QuotePageParser::new("http://localhost:8080/q").quote_url("MSFT"),
            "http://localhost:8080/q/MSFT/"
        );
    }

    #[test]
    fn parses_org_and_news_links() {
        let listing = QuotePageParser::default().parse(PAGE);
        assert_eq!(listing.org.as_deref(), Some("Apple Inc. (AAPL)"));
        assert_eq!(
            listing.links,
            vec![
                ArticleLink::new(
                    "https://sg.finance.yahoo.com/news/apple-beats-estimates.html",
                    "Apple beats estimates"
                ),
                ArticleLink::new(
                    "https://sg.finance.yahoo.com/news/iphone-sales.html",
                    "iPhone sales climb"
                ),
            ]
        );
    }

    #[test]
    fn unrecognized_page_is_empty() {
        let listing = QuotePageParser::default().parse("<html><body>nothing</body></html>");
        assert_eq!(listing, QuoteListing::default());
    }
}

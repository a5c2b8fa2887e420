use scraper::{Html, Selector};
use std::sync::LazyLock;

static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("anchor selector is valid"));

/// Pulls raw, unresolved href values out of a page body.
pub trait LinkExtractor: Send + Sync + 'static {
    fn extract_hrefs(&self, html: &str) -> Vec<String>;
}

/// Anchor extraction backed by `scraper`'s html5ever parser.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlLinkExtractor;

impl LinkExtractor for HtmlLinkExtractor {
    fn extract_hrefs(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        document
            .select(&ANCHOR_SELECTOR)
            .filter_map(|element| element.value().attr("href"))
            .map(str::to_string)
            .collect()
    }
}

use scraper::{Html, Selector};
use url::Url;

/// Pull every `<a href>` out of an HTML page and resolve it against
/// `base_url`, dropping anything that doesn't parse as a URL (`spec.md`
/// §4.6, link extraction step of the Crawl Pipeline).
pub fn extract_links(base_url: &Url, body: &str) -> Vec<String> {
    let document = Html::parse_document(body);
    // `scraper::Selector::parse` only fails on malformed selector syntax,
    // never on this constant string.
    let selector = Selector::parse("a[href]").expect("constant selector is valid");

    document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| base_url.join(href).ok())
        .map(|url| url.to_string())
        .collect()
}

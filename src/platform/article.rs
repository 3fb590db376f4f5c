//! Single article page parsing

use scraper::{Html, Selector};
use serde::Serialize;

/// Content extracted from an article page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleDetail {
    pub url: String,
    pub title: Option<String>,
    pub account: Option<String>,
    pub content: String,
}

/// Extracts title, account name and body text from an article page
///
/// The title comes from `#activity-name`, falling back to the `og:title`
/// meta tag and then `<title>`. Body text is the whitespace-normalized text
/// of `#js_content`.
pub fn parse_article_html(html: &str, url: &str) -> ArticleDetail {
    let document = Html::parse_document(html);

    let title = select_text(&document, "#activity-name")
        .or_else(|| select_attr(&document, "meta[property='og:title']", "content"))
        .or_else(|| select_text(&document, "title"));

    ArticleDetail {
        url: url.to_string(),
        title,
        account: select_text(&document, "#js_name"),
        content: select_text(&document, "#js_content").unwrap_or_default(),
    }
}

fn select_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;

    document
        .select(&selector)
        .next()
        .map(|element| normalize_whitespace(&element.text().collect::<Vec<_>>().join(" ")))
        .filter(|s| !s.is_empty())
}

fn select_attr(document: &Html, selector: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;

    document
        .select(&selector)
        .next()
        .and_then(|element| element.value().attr(attr))
        .map(normalize_whitespace)
        .filter(|s| !s.is_empty())
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

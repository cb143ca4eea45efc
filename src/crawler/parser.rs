//! HTML helpers shared by sessions and sources
//!
//! Parsed documents never outlive the function that parsed them, so nothing
//! here is held across an `.await`.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// Compiles a CSS selector, turning the borrowed parse error into a message
pub fn parse_selector(selector: &str) -> Result<Selector, String> {
    Selector::parse(selector).map_err(|e| format!("invalid selector '{}': {}", selector, e))
}

/// Returns true if `selector` matches at least one element of `html`
///
/// # Example
///
/// ```
/// use gleaner::crawler::has_match;
///
/// assert!(has_match("<div class='job'>x</div>", "div.job").unwrap());
/// assert!(!has_match("<div></div>", "h1").unwrap());
/// ```
pub fn has_match(html: &str, selector: &str) -> Result<bool, String> {
    let selector = parse_selector(selector)?;
    let document = Html::parse_document(html);
    let found = document.select(&selector).next().is_some();
    Ok(found)
}

/// Text content of an element with runs of whitespace collapsed
pub fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Largest integer among the given texts, ignoring anything non-numeric
///
/// Pagination controls mix page numbers with arrows and ellipses.
pub fn max_page_number<'a>(texts: impl IntoIterator<Item = &'a str>) -> Option<u32> {
    texts
        .into_iter()
        .filter_map(|t| t.trim().parse::<u32>().ok())
        .max()
}

/// Number captured by the first group of `pattern` (or the whole match)
///
/// Thousands separators (`.` `,` and spaces) inside the capture are ignored so
/// that "1.250 việc làm" reads as 1250.
pub fn capture_number(text: &str, pattern: &Regex) -> Option<u64> {
    let caps = pattern.captures(text)?;
    let matched = caps.get(1).or_else(|| caps.get(0))?.as_str();
    let digits: String = matched
        .chars()
        .filter(|c| !matches!(c, '.' | ',' | ' ' | '\u{a0}'))
        .collect();
    digits.parse().ok()
}

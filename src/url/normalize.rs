use crate::UrlError;
use url::Url;

/// Tracking query parameters dropped from listing links
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid"];

/// Prefix shared by campaign-tagging parameters (`utm_source`, `utm_medium`, ...)
const TRACKING_PREFIX: &str = "utm_";

/// Turns a link found on a listing page into its canonical absolute form
///
/// # Canonicalization Steps
///
/// 1. Resolve `href` against the page URL it was found on
/// 2. Reject anything that is not HTTP or HTTPS, or has no host
/// 3. Lowercase the host
/// 4. Remove the fragment
/// 5. Remove tracking query parameters, keeping the others in their order
/// 6. Remove an empty query string
///
/// Identifiers are derived from the canonical form, so two cards pointing at
/// the same item through different tracking links collapse to one identifier.
///
/// # Arguments
///
/// * `href` - Link as written in the page (absolute or relative)
/// * `base` - URL of the page the link was found on
///
/// # Returns
///
/// * `Ok(Url)` - Canonical absolute URL
/// * `Err(UrlError)` - The link could not be resolved or is not a web URL
///
/// # Examples
///
/// ```
/// use gleaner::url::canonicalize_link;
/// use url::Url;
///
/// let base = Url::parse("https://Jobs.Example.com/it?page=2").unwrap();
/// let url = canonicalize_link("/job/123.html?utm_source=x#apply", &base).unwrap();
/// assert_eq!(url.as_str(), "https://jobs.example.com/job/123.html");
/// ```
pub fn canonicalize_link(href: &str, base: &Url) -> Result<Url, UrlError> {
    let href = href.trim();
    if href.is_empty() {
        return Err(UrlError::Parse("empty link".to_string()));
    }

    let mut url = base
        .join(href)
        .map_err(|e| UrlError::Parse(format!("{}: {}", href, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    let host = url.host_str().ok_or(UrlError::MissingHost)?.to_lowercase();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Parse(format!("invalid host '{}': {}", host, e)))?;

    url.set_fragment(None);

    if url.query().is_some() {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| !is_tracking_param(k))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let total = url.query_pairs().count();
        if kept.is_empty() {
            url.set_query(None);
        } else if kept.len() != total {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    Ok(url)
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with(TRACKING_PREFIX) || TRACKING_PARAMS.contains(&key)
}

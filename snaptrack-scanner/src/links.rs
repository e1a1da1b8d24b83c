use crate::error::{Result, ScanError};
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

/// Extract every anchor target in `html` that stays inside `scope`.
///
/// Hrefs are resolved against `current_url` and stripped of their fragment. Results keep
/// document order and are not deduplicated.
pub fn extract_links(html: &str, scope: &Url, current_url: &str) -> Result<Vec<String>> {
    let base_url = Url::parse(current_url)
        .map_err(|e| ScanError::ParseError(format!("Invalid page URL {}: {}", current_url, e)))?;

    let document = Html::parse_document(html);
    let link_selector = Selector::parse("a[href]")
        .map_err(|e| ScanError::ParseError(format!("Invalid selector: {:?}", e)))?;

    let mut links = Vec::new();
    for element in document.select(&link_selector) {
        if let Some(href) = element.value().attr("href")
            && let Some(absolute_url) = resolve_url(&base_url, href)
        {
            if in_scope(&absolute_url, scope) {
                debug!("Found link: {} (in scope)", absolute_url);
                links.push(absolute_url.to_string());
            } else {
                debug!("Found link: {} (out of scope, skipping)", absolute_url);
            }
        }
    }

    Ok(links)
}

/// Resolve `href` against `base`, dropping non-navigational schemes and fragments
pub fn resolve_url(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with('#')
    {
        return None;
    }

    let mut resolved = base.join(href).ok()?;
    resolved.set_fragment(None);
    Some(resolved)
}

/// Same scheme, host and port as `scope`.
///
/// This is a structured origin comparison, so `http://a.test.evil.com/` and
/// `http://a.test:8080/` are both outside `http://a.test/`.
pub fn in_scope(url: &Url, scope: &Url) -> bool {
    matches!(url.scheme(), "http" | "https") && url.origin() == scope.origin()
}

/// Normalized form of a URL as kept in the visited set
pub fn normalize_url(url: &str) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;
    parsed.set_fragment(None);
    Some(parsed.to_string())
}

//! Shopify cursor-based pagination via the `Link` response header.
//!
//! The Admin API carries pagination cursors as `page_info` query parameters
//! inside `Link` header URLs:
//!
//! ```text
//! <https://shop.myshopify.com/admin/api/2024-01/orders.json?limit=250&page_info=CURSOR>; rel="next"
//! ```
//!
//! Completion is signaled solely by the absence of a `rel="next"` relation.
//! A final page that happens to contain exactly `limit` records still omits
//! the relation, so callers must never infer "more pages" from a full page.

/// Extracts the `page_info` cursor for the next page from a `Link` header
/// value.
///
/// Returns `None` if the header is absent, carries no `rel="next"` segment
/// (last page), or the next URL has no `page_info` parameter.
#[must_use]
pub fn next_page_cursor(link_header: Option<&str>) -> Option<String> {
    let header = link_header?;

    for segment in header.split(',') {
        let segment = segment.trim();
        if !segment.contains(r#"rel="next""#) {
            continue;
        }
        let url = angle_bracket_url(segment)?;
        return query_param(url, "page_info");
    }

    None
}

/// The URL between `<` and `>` in a link directive segment.
fn angle_bracket_url(segment: &str) -> Option<&str> {
    let start = segment.find('<')? + 1;
    let end = segment.find('>')?;
    if start >= end {
        return None;
    }
    Some(&segment[start..end])
}

/// The value of a named query parameter in a URL string. Cursors are
/// base64url-encoded and need no percent-decoding.
fn query_param(url: &str, param: &str) -> Option<String> {
    let query = &url[url.find('?')? + 1..];
    let needle = format!("{param}=");
    for pair in query.split('&') {
        if let Some(value) = pair.strip_prefix(needle.as_str()) {
            let value = value.split('#').next().unwrap_or(value);
            if !value.is_empty() {
                return Some(value.to_owned());
            }
        }
    }
    None
}

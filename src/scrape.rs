//! Public URL extraction from tunnel client output.
//!
//! Tunnel clients print their public address somewhere in a stream of log
//! text. localtunnel announces it with `your url is: https://...`, serveo
//! with `Forwarding HTTP traffic from https://...`. The scraper prefers a
//! URL that follows the marker phrase and otherwise takes the first
//! `https://` URL in the text.

/// Marker phrase printed by localtunnel in front of the public URL.
pub const SUCCESS_MARKER: &str = "your url is";

/// Return the public URL found in `text`, if any.
///
/// The marker phrase is matched case-insensitively; the URL itself is
/// returned exactly as written.
pub fn scrape(text: &str) -> Option<String> {
    scrape_after_marker(text).or_else(|| find_url(text, "https://"))
}

fn scrape_after_marker(text: &str) -> Option<String> {
    // ASCII lowercasing keeps byte offsets aligned with `text`.
    let lowered = text.to_ascii_lowercase();
    let mut from = 0;
    while let Some(pos) = lowered[from..].find(SUCCESS_MARKER) {
        let after = from + pos + SUCCESS_MARKER.len();
        let rest = text[after..].trim_start_matches(|c: char| c == ':' || c.is_whitespace());
        if rest.starts_with("https://") || rest.starts_with("http://") {
            return Some(take_url(rest));
        }
        from = after;
    }
    None
}

/// Find the first URL starting with `scheme` in `text`.
pub(crate) fn find_url(text: &str, scheme: &str) -> Option<String> {
    let mut from = 0;
    while let Some(pos) = text[from..].find(scheme) {
        let start = from + pos;
        let url = take_url(&text[start..]);
        if url.len() > scheme.len() {
            return Some(url);
        }
        from = start + scheme.len();
    }
    None
}

/// Cut a URL at the first whitespace or quote and drop trailing punctuation.
fn take_url(rest: &str) -> String {
    let end = rest
        .find(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | '<' | '>' | '|'))
        .unwrap_or(rest.len());
    rest[..end]
        .trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ')' | ']'))
        .to_string()
}

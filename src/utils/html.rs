use ammonia;

/// Clean HTML content using the ammonia library.
///
/// Question statements and presentation titles are authored by presenters
/// and rendered verbatim on every spectator's screen, so they pass through
/// whitelist-based sanitization on write: safe tags (like <b>, <p>) are
/// preserved while dangerous tags (like <script>, <iframe>) and malicious
/// attributes (like onclick) are stripped.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

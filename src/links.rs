use std::sync::OnceLock;

use regex::Regex;

/// Canonical prefix of a Telegram gift link
pub const GIFT_LINK_PREFIX: &str = "https://t.me/giftcode/";

fn gift_link() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?:https?://)?t\.me/giftcode/([A-Za-z0-9_-]+)").expect("valid gift link regex")
    })
}

/// Rewrite any gift link form to `https://t.me/giftcode/<code>`; other text is returned unchanged.
pub fn normalize_link(link: &str) -> String {
    match gift_link().captures(link) {
        Some(caps) => format!("{}{}", GIFT_LINK_PREFIX, &caps[1]),
        None => link.to_string(),
    }
}

/// Every gift link found in free text, normalized, in order of appearance.
pub fn extract_links(text: &str) -> Vec<String> {
    gift_link()
        .captures_iter(text)
        .map(|caps| format!("{}{}", GIFT_LINK_PREFIX, &caps[1]))
        .collect()
}

/// Listings sometimes store only the code; show them as full links.
pub fn with_gift_prefix(login: &str) -> String {
    if login.is_empty() || login.starts_with(GIFT_LINK_PREFIX) {
        login.to_string()
    } else {
        format!("{}{}", GIFT_LINK_PREFIX, login)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_mixed_text() {
        let text = "first t.me/giftcode/abc123\nhttps://t.me/giftcode/xyz-789 and\
                    http://t.me/giftcode/def_456, also https://example.com/giftcode/nope";
        assert_eq!(
            extract_links(text),
            vec![
                "https://t.me/giftcode/abc123",
                "https://t.me/giftcode/xyz-789",
                "https://t.me/giftcode/def_456",
            ]
        );
    }

    #[test]
    fn test_no_links() {
        assert!(extract_links("nothing to see here").is_empty());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_link("t.me/giftcode/abc"), "https://t.me/giftcode/abc");
        assert_eq!(normalize_link("plain-login"), "plain-login");
    }

    #[test]
    fn test_with_gift_prefix() {
        assert_eq!(with_gift_prefix("abc"), "https://t.me/giftcode/abc");
        assert_eq!(
            with_gift_prefix("https://t.me/giftcode/abc"),
            "https://t.me/giftcode/abc"
        );
        assert_eq!(with_gift_prefix(""), "");
    }
}

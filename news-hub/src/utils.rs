/// Text helpers for summaries
pub mod text {
    /// Collapse runs of whitespace (including newlines) into single spaces.
    pub fn collapse_whitespace(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Truncate to at most `max_chars` characters, appending `…` when cut.
    /// Never splits a UTF-8 sequence.
    pub fn truncate_chars(text: &str, max_chars: usize) -> String {
        if text.chars().count() <= max_chars {
            return text.to_string();
        }
        let keep = max_chars.saturating_sub(1);
        let mut truncated: String = text.chars().take(keep).collect();
        // Prefer a word boundary when one is reasonably close
        if let Some(last_space) = truncated.rfind(' ') {
            if truncated[..last_space].chars().count() * 4 >= keep * 3 {
                truncated.truncate(last_space);
            }
        }
        truncated.push('…');
        truncated
    }
}

/// HTML helpers
pub mod html {
    /// Drop tags and decode the handful of entities feeds commonly carry.
    pub fn strip_tags(html: &str) -> String {
        let text = html
            .chars()
            .fold((String::new(), false), |(mut text, in_tag), c| match c {
                '<' => (text, true),
                '>' if in_tag => {
                    text.push(' ');
                    (text, false)
                }
                _ if !in_tag => {
                    text.push(c);
                    (text, in_tag)
                }
                _ => (text, in_tag),
            })
            .0;

        text.replace("&nbsp;", " ")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&amp;", "&")
    }

    pub fn escape(text: &str) -> String {
        let mut escaped = String::with_capacity(text.len());
        for c in text.chars() {
            match c {
                '&' => escaped.push_str("&amp;"),
                '<' => escaped.push_str("&lt;"),
                '>' => escaped.push_str("&gt;"),
                '"' => escaped.push_str("&quot;"),
                '\'' => escaped.push_str("&#39;"),
                _ => escaped.push(c),
            }
        }
        escaped
    }
}

/// URL utilities
pub mod url {
    use url::Url;

    /// Extract domain from URL
    pub fn extract_domain(url_str: &str) -> Option<String> {
        Url::parse(url_str)
            .ok()
            .and_then(|url| url.domain().map(|d| d.to_string()))
    }

    pub fn is_http_url(url_str: &str) -> bool {
        match Url::parse(url_str) {
            Ok(url) => (url.scheme() == "http" || url.scheme() == "https") && url.host().is_some(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        let text = "東京証券取引所が新しい市場区分を発表しました";
        let cut = text::truncate_chars(text, 10);
        assert_eq!(cut.chars().count(), 10);
        assert!(cut.ends_with('…'));
        assert_eq!(text::truncate_chars("short", 10), "short");
    }

    #[test]
    fn strip_tags_and_escape() {
        assert_eq!(
            text::collapse_whitespace(&html::strip_tags("<p>Rates <b>rise</b></p>&amp; more")),
            "Rates rise & more"
        );
        assert_eq!(html::escape("<a href=\"x\">&</a>"), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
    }

    #[test]
    fn http_urls_only() {
        assert!(url::is_http_url("https://www.jpx.co.jp/rss/index.xml"));
        assert!(!url::is_http_url("javascript:alert(1)"));
        assert!(!url::is_http_url("not a url"));
        assert_eq!(url::extract_domain("https://www.jpx.co.jp/x"), Some("www.jpx.co.jp".to_string()));
    }
}

//! Markup escaping for configuration-sourced strings.
//!
//! Only strings that end up inside markup (the header title) go through here.
//! Conversation text is always displayed as plain text and is never escaped.

/// Escape `& < > " '` so `input` can be embedded in markup verbatim.
pub fn escape_markup(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_all_five_characters() {
        assert_eq!(
            escape_markup(r#"<b class="x">Tom & Jerry's</b>"#),
            "&lt;b class=&quot;x&quot;&gt;Tom &amp; Jerry&#039;s&lt;/b&gt;"
        );
    }

    #[test]
    fn ampersand_is_not_double_escaped_by_later_rules() {
        assert_eq!(escape_markup("&lt;"), "&amp;lt;");
    }

    #[test]
    fn plain_and_arabic_text_pass_through() {
        assert_eq!(escape_markup("مُخَطّط"), "مُخَطّط");
        assert_eq!(escape_markup(""), "");
    }
}

// src/utils/html.rs

/// Strips unsafe markup from rich-text fields (descriptions, remarks) before
/// they are stored. The output is HTML: `&` becomes `&amp;`, so plain-text
/// fields such as names and answer options must not go through here.
///
/// Whitelist based: harmless tags such as `<b>` survive, `<script>` and event
/// handler attributes are removed.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

/// Sanitizes an optional rich-text field, turning blank input into `None`.
pub fn clean_optional(input: Option<String>) -> Option<String> {
    input
        .map(|s| clean_html(s.trim()))
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_script_tags() {
        let cleaned = clean_html("<b>Algebra</b><script>alert(1)</script>");
        assert_eq!(cleaned, "<b>Algebra</b>");
    }

    #[test]
    fn blank_optional_becomes_none() {
        assert_eq!(clean_optional(Some("   ".to_string())), None);
        assert_eq!(clean_optional(None), None);
        assert_eq!(
            clean_optional(Some(" Linear equations ".to_string())),
            Some("Linear equations".to_string())
        );
    }
}

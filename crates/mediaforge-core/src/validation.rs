//! Input sanitation helpers.

/// Maximum length of a stored SEO title, in characters.
pub const SEO_TITLE_MAX_CHARS: usize = 160;

/// Sanitize an SEO title: strip control characters, trim whitespace and
/// leading/trailing punctuation, bound to [`SEO_TITLE_MAX_CHARS`] on a char
/// boundary. Returns None when nothing usable remains.
pub fn sanitize_seo_title(input: &str) -> Option<String> {
    let cleaned: String = input.chars().filter(|c| !c.is_control()).collect();
    let trimmed = cleaned
        .trim()
        .trim_matches(|c: char| c.is_ascii_punctuation())
        .trim();
    if trimmed.is_empty() {
        return None;
    }
    let bounded: String = trimmed.chars().take(SEO_TITLE_MAX_CHARS).collect();
    let bounded = bounded.trim_end();
    if bounded.is_empty() {
        None
    } else {
        Some(bounded.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_control_characters() {
        assert_eq!(
            sanitize_seo_title("Red\u{0000} Chair\n").as_deref(),
            Some("Red Chair")
        );
    }

    #[test]
    fn trims_edge_punctuation_but_keeps_inner() {
        assert_eq!(
            sanitize_seo_title("...Best chair - ever!!!").as_deref(),
            Some("Best chair - ever")
        );
    }

    #[test]
    fn bounds_to_160_chars_on_char_boundary() {
        let long = "ä".repeat(300);
        let out = sanitize_seo_title(&long).unwrap();
        assert_eq!(out.chars().count(), SEO_TITLE_MAX_CHARS);
    }

    #[test]
    fn empty_or_punctuation_only_is_none() {
        assert_eq!(sanitize_seo_title(""), None);
        assert_eq!(sanitize_seo_title("   "), None);
        assert_eq!(sanitize_seo_title("!!!"), None);
    }
}

//! Slugs and HTML sanitizing for user-supplied content.

use regex::Regex;

lazy_static::lazy_static! {
    /// Valid slug pattern: lowercase letters, numbers, and hyphens
    static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();
}

pub const MAX_SLUG_LEN: usize = 120;

pub fn is_valid_slug(slug: &str) -> bool {
    slug.len() <= MAX_SLUG_LEN && SLUG_REGEX.is_match(slug)
}

/// Lowercase ASCII words joined by single hyphens. Common accented Latin
/// letters are folded; other characters separate words. May return an
/// empty string.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for ch in text.chars().flat_map(char::to_lowercase) {
        let folded = match ch {
            'a'..='z' | '0'..='9' => Some(ch),
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => Some('a'),
            'ç' => Some('c'),
            'è' | 'é' | 'ê' | 'ë' => Some('e'),
            'ì' | 'í' | 'î' | 'ï' => Some('i'),
            'ñ' => Some('n'),
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => Some('o'),
            'ù' | 'ú' | 'û' | 'ü' => Some('u'),
            'ý' | 'ÿ' => Some('y'),
            '\'' | '’' => None,
            _ => {
                pending_dash = true;
                continue;
            }
        };
        if let Some(c) = folded {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        }
    }

    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
        while slug.ends_with('-') {
            slug.pop();
        }
    }
    slug
}

/// Sanitize HTML content using ammonia
pub fn sanitize_html(html: &str) -> String {
    ammonia::clean(html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_titles() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("  Budget 2025: What's next?  "), "budget-2025-whats-next");
        assert_eq!(slugify("Café Société"), "cafe-societe");
        assert_eq!(slugify("a -- b"), "a-b");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_slugify_output_is_valid() {
        for title in ["Hello World", "Mixed CASE and 123", "Ünïcode everywhere"] {
            assert!(is_valid_slug(&slugify(title)), "{title}");
        }
    }

    #[test]
    fn test_long_titles_are_truncated() {
        let title = "word ".repeat(60);
        let slug = slugify(&title);
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(is_valid_slug(&slug));
    }

    #[test]
    fn test_is_valid_slug() {
        assert!(is_valid_slug("local-news"));
        assert!(!is_valid_slug("Local-News"));
        assert!(!is_valid_slug("-news"));
        assert!(!is_valid_slug("news--today"));
        assert!(!is_valid_slug(""));
    }

    #[test]
    fn test_sanitize_strips_scripts() {
        let clean = sanitize_html("<p>Hi</p><script>alert(1)</script>");
        assert_eq!(clean, "<p>Hi</p>");
    }
}

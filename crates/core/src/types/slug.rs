//! URL slug generation for catalog entries.

/// Turn a display name into a lowercase, hyphen-separated ASCII slug.
///
/// Runs of non-alphanumeric characters collapse into a single hyphen and
/// leading or trailing hyphens are dropped.
///
/// ```
/// use spareline_core::slugify;
///
/// assert_eq!(slugify("Bosch  Brake Pads (Front)"), "bosch-brake-pads-front");
/// ```
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// Whether `s` already has slug shape.
#[must_use]
pub fn is_valid_slug(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 200
        && !s.starts_with('-')
        && !s.ends_with('-')
        && !s.contains("--")
        && s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Oil Filter"), "oil-filter");
        assert_eq!(slugify("  NGK / Spark-Plug #4  "), "ngk-spark-plug-4");
        assert_eq!(slugify("Öl"), "l");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn test_slugify_output_is_valid() {
        for name in ["Timing Belt Kit", "A/C Compressor", "12V Battery 70Ah"] {
            assert!(is_valid_slug(&slugify(name)), "{name}");
        }
    }

    #[test]
    fn test_is_valid_slug() {
        assert!(is_valid_slug("brake-pads"));
        assert!(!is_valid_slug("Brake-Pads"));
        assert!(!is_valid_slug("-brake"));
        assert!(!is_valid_slug("brake--pads"));
        assert!(!is_valid_slug(""));
    }
}

//! Key/value site settings.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Key prefixes readable without logging in.
pub const PUBLIC_PREFIXES: &[&str] = &["site.", "cms.", "contact.", "legal.", "social."];

/// Longest allowed setting key.
pub const MAX_KEY_LENGTH: usize = 100;

/// One row of the settings table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Setting {
    pub key: String,
    pub value: JsonValue,
    pub updated_at: DateTime<Utc>,
}

/// Whether a key may be served to anonymous visitors.
#[must_use]
pub fn is_public_key(key: &str) -> bool {
    PUBLIC_PREFIXES.iter().any(|prefix| key.starts_with(prefix))
}

/// Keys are 1-100 chars of `[a-z0-9_.-]`.
#[must_use]
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_KEY_LENGTH
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_keys() {
        assert!(is_public_key("site.name"));
        assert!(is_public_key("cms.hero_slides"));
        assert!(is_public_key("legal.terms"));
        assert!(!is_public_key("smtp.password"));
        assert!(!is_public_key("payment.bank_iban"));
        assert!(!is_public_key("sitemap"));
    }

    #[test]
    fn test_key_validation() {
        assert!(is_valid_key("cms.banner-1"));
        assert!(!is_valid_key("CMS.banner"));
        assert!(!is_valid_key("has space"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key(&"k".repeat(MAX_KEY_LENGTH + 1)));
    }
}

//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Password login, TOTP second factor, account security
//! - `quotes` - RFQ submission, review and pricing
//! - `orders` - Quote acceptance and order fulfilment
//! - `chat` - Live chat persistence and event fan-out
//! - `mail` - Transactional email (lettre + Askama)
//! - `settings` - Site settings with a cached public view
//! - `sweeper` - Background expiry of stale priced quotes

pub mod auth;
pub mod chat;
pub mod mail;
pub mod orders;
pub mod quotes;
pub mod settings;
pub mod sweeper;

use chrono::{DateTime, Utc};
use rand::Rng;

/// Characters used in public references. No 0/O or 1/I.
const REFERENCE_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Human-friendly reference such as `RFQ-20261019-7K2Q9P`.
#[must_use]
pub fn generate_reference(prefix: &str, now: DateTime<Utc>) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..6)
        .map(|_| char::from(REFERENCE_CHARSET[rng.random_range(0..REFERENCE_CHARSET.len())]))
        .collect();
    format!("{prefix}-{}-{suffix}", now.format("%Y%m%d"))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_reference_format() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).single().unwrap_or_default();
        let reference = generate_reference("RFQ", now);
        assert!(reference.starts_with("RFQ-20261019-"));
        assert_eq!(reference.len(), "RFQ-20261019-".len() + 6);
        assert!(
            reference[13..]
                .bytes()
                .all(|b| REFERENCE_CHARSET.contains(&b))
        );
    }
}

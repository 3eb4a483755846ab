//! Time-based one-time passwords (RFC 6238, HMAC-SHA1, 6 digits, 30 s step).
//!
//! Secrets are stored base32-encoded, which is what authenticator apps expect
//! in the `otpauth://` URI.

use hmac::{Hmac, Mac};
use rand::Rng;
use sha1::Sha1;

/// Seconds per TOTP step.
pub const STEP_SECONDS: u64 = 30;
/// Digits in a code.
pub const DIGITS: u32 = 6;
/// Steps accepted either side of the current one.
const SKEW_STEPS: i64 = 1;
/// Random bytes in a new secret (160 bits, as RFC 4226 recommends).
const SECRET_BYTES: usize = 20;

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Generate a fresh base32 secret.
#[must_use]
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::rng().fill(&mut bytes);
    base32_encode(&bytes)
}

/// URI for QR codes in authenticator apps.
#[must_use]
pub fn otpauth_uri(issuer: &str, account: &str, secret: &str) -> String {
    let label = urlencoding::encode(&format!("{issuer}:{account}")).into_owned();
    format!(
        "otpauth://totp/{label}?secret={secret}&issuer={}&algorithm=SHA1&digits={DIGITS}&period={STEP_SECONDS}",
        urlencoding::encode(issuer)
    )
}

/// Check `code` against `secret` at `unix_time`, allowing one step of clock skew.
///
/// Malformed secrets and codes simply fail verification.
#[must_use]
pub fn verify(secret: &str, code: &str, unix_time: u64) -> bool {
    let code = code.trim();
    if code.len() != DIGITS as usize || !code.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let Ok(expected) = code.parse::<u32>() else {
        return false;
    };
    let Some(key) = base32_decode(secret) else {
        return false;
    };

    let current = i64::try_from(unix_time / STEP_SECONDS).unwrap_or(i64::MAX);
    (-SKEW_STEPS..=SKEW_STEPS).any(|offset| {
        u64::try_from(current + offset).is_ok_and(|counter| code_at(&key, counter) == Some(expected))
    })
}

/// HOTP value for `counter` (RFC 4226 dynamic truncation).
fn code_at(key: &[u8], counter: u64) -> Option<u32> {
    let mut mac = Hmac::<Sha1>::new_from_slice(key).ok()?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = usize::from(digest[digest.len() - 1] & 0x0f);
    let binary = (u32::from(digest[offset] & 0x7f) << 24)
        | (u32::from(digest[offset + 1]) << 16)
        | (u32::from(digest[offset + 2]) << 8)
        | u32::from(digest[offset + 3]);
    Some(binary % 10u32.pow(DIGITS))
}

/// RFC 4648 base32 without padding.
fn base32_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(5) * 8);
    let mut buffer: u32 = 0;
    let mut bits = 0;
    for &byte in data {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(char::from(BASE32_ALPHABET[((buffer >> bits) & 0x1f) as usize]));
        }
    }
    if bits > 0 {
        out.push(char::from(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize]));
    }
    out
}

/// Decode base32, ignoring case, spaces and padding.
fn base32_decode(input: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits = 0;
    for c in input.chars().filter(|c| !c.is_whitespace() && *c != '=') {
        let upper = c.to_ascii_uppercase();
        let value = BASE32_ALPHABET.iter().position(|&a| char::from(a) == upper)?;
        buffer = (buffer << 5) | u32::try_from(value).ok()?;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push(u8::try_from((buffer >> bits) & 0xff).ok()?);
        }
    }
    if out.is_empty() { None } else { Some(out) }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // RFC 6238 appendix B seed for SHA-1.
    const RFC_SEED: &[u8] = b"12345678901234567890";

    #[test]
    fn test_base32_known_value() {
        assert_eq!(base32_encode(RFC_SEED), "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ");
        assert_eq!(
            base32_decode("gezd gnbv gy3t qojq gezd gnbv gy3t qojq").unwrap(),
            RFC_SEED
        );
        assert!(base32_decode("not base32!").is_none());
    }

    #[test]
    fn test_rfc6238_vectors() {
        // Last six digits of the published 8-digit values.
        assert_eq!(code_at(RFC_SEED, 59 / STEP_SECONDS), Some(287_082));
        assert_eq!(code_at(RFC_SEED, 1_111_111_109 / STEP_SECONDS), Some(81_804));
        assert_eq!(code_at(RFC_SEED, 1_234_567_890 / STEP_SECONDS), Some(5_924));
    }

    #[test]
    fn test_verify_allows_one_step_of_skew() {
        let secret = base32_encode(RFC_SEED);
        assert!(verify(&secret, "005924", 1_234_567_890));
        assert!(verify(&secret, "005924", 1_234_567_890 + STEP_SECONDS));
        assert!(!verify(&secret, "005924", 1_234_567_890 + 3 * STEP_SECONDS));
    }

    #[test]
    fn test_verify_rejects_malformed_codes() {
        let secret = base32_encode(RFC_SEED);
        assert!(!verify(&secret, "5924", 1_234_567_890));
        assert!(!verify(&secret, "00592a", 1_234_567_890));
        assert!(!verify("", "005924", 1_234_567_890));
    }

    #[test]
    fn test_generated_secret_is_base32() {
        let secret = generate_secret();
        assert_eq!(secret.len(), 32);
        assert_eq!(base32_decode(&secret).unwrap().len(), SECRET_BYTES);
    }

    #[test]
    fn test_otpauth_uri() {
        let uri = otpauth_uri("Spareline", "ana@example.com", "ABC");
        assert!(uri.starts_with("otpauth://totp/Spareline%3Aana%40example.com?secret=ABC"));
        assert!(uri.contains("digits=6"));
        assert!(uri.contains("period=30"));
    }
}

//! Entry identifiers derived from content, session and creation instant

use crate::memory_db::schema::format_timestamp;
use chrono::{DateTime, Utc};

/// Number of hex characters kept from the digest.
pub const ID_LEN: usize = 16;

/// Derive the 16-hex-character id for an entry.
///
/// The creation instant is part of the hash input, so identical content in
/// the same session only collides when written within the same microsecond.
/// This is not content-addressed deduplication.
pub fn generate_id(content: &str, session_id: &str, now: &DateTime<Utc>) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(content.as_bytes());
    hasher.update(session_id.as_bytes());
    hasher.update(format_timestamp(now).as_bytes());
    let digest = hasher.finalize().to_hex();
    digest.as_str()[..ID_LEN].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_id_shape() {
        let id = generate_id("Hello, robot!", "s1", &instant());
        assert_eq!(id.len(), ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_id_is_deterministic() {
        let a = generate_id("Hello, robot!", "s1", &instant());
        let b = generate_id("Hello, robot!", "s1", &instant());
        assert_eq!(a, b);
    }

    #[test]
    fn test_id_depends_on_instant() {
        let t = instant();
        let a = generate_id("same", "s1", &t);
        let b = generate_id("same", "s1", &(t + Duration::microseconds(1)));
        assert_ne!(a, b);
    }

    #[test]
    fn test_id_depends_on_session_and_content() {
        let t = instant();
        let base = generate_id("same", "s1", &t);
        assert_ne!(base, generate_id("same", "s2", &t));
        assert_ne!(base, generate_id("other", "s1", &t));
    }

    #[test]
    fn test_id_matches_concatenated_digest() {
        let t = instant();
        let input = format!("abs1{}", format_timestamp(&t));
        let expected = blake3::hash(input.as_bytes()).to_hex().as_str()[..ID_LEN].to_string();
        assert_eq!(generate_id("ab", "s1", &t), expected);
    }
}

use sha2::{Digest, Sha256};
use time::OffsetDateTime;

/// Current wall-clock time as Unix epoch milliseconds
pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Hex-encoded SHA-256 of the given parts, separated by `:`
///
/// Used to correlate validations of the same purchase without storing the
/// receipt or purchase token itself.
pub fn fingerprint(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update(b":");
        }
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

use chrono::{DateTime, Utc};
use rand::Rng;

/// Generate a six digit one-time code, uniformly distributed over
/// 100000..=999999.
pub fn generate() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

/// Check a candidate code against the stored one. True only when the
/// strings match exactly and the current time is strictly before
/// `expires_at`. Plain string equality, not a constant-time compare.
pub fn verify(stored: &str, candidate: &str, expires_at: DateTime<Utc>) -> bool {
    stored == candidate && Utc::now() < expires_at
}

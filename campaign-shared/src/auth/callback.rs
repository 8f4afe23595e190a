/// Webhook callback token verification
///
/// Payment providers authenticate their callbacks with a static shared token
/// sent in a header. Both sides are hashed to SHA-256 before a constant-time
/// comparison so neither the token length nor its prefix leaks through timing.

use sha2::{Digest, Sha256};

/// Header carrying the provider's callback token
pub const CALLBACK_TOKEN_HEADER: &str = "x-callback-token";

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

/// Compares byte slices without short-circuiting on the first difference
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Returns true when `presented` matches the configured callback token
pub fn verify_callback_token(expected: &str, presented: &str) -> bool {
    constant_time_eq(&digest(expected), &digest(presented))
}

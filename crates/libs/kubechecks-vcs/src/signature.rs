//! HMAC webhook signature verification (§6, §7), shared by every provider
//! adapter — GitHub, GitLab, and friends all use some flavor of
//! `sha256=<hex hmac>` over the raw request body.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verifies a `sha256=<hex>`-style signature header against `body` using
/// `secret`. Constant-time comparison via `hmac::Mac::verify_slice` guards
/// against timing attacks on the shared secret.
pub fn verify_hmac_sha256(body: &[u8], header_value: &str, secret: &str) -> bool {
    let Some(hex_digest) = header_value.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

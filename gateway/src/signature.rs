//! Webhook signature verification
//!
//! Paystack signs the raw request body with HMAC-SHA512 keyed by the
//! account secret and sends the hex digest in `x-paystack-signature`.
//! Verification must consume the exact bytes that arrived on the wire.

use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// Hex HMAC-SHA512 digest of `payload`
pub fn sign(payload: &[u8], secret: &[u8]) -> String {
    let mut mac = HmacSha512::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a hex signature against `payload`
pub fn verify(payload: &[u8], signature_hex: &str, secret: &[u8]) -> bool {
    let Ok(signature) = hex::decode(signature_hex.trim()) else {
        return false;
    };

    let mut mac = HmacSha512::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(payload);
    mac.verify_slice(&signature).is_ok()
}

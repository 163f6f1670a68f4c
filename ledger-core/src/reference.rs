//! Identifier generation
//!
//! References and wallet numbers are generated collision-resistant and
//! checked by the store's uniqueness constraints — never trusted blindly,
//! and never derived from an in-memory sequence, so correctness holds
//! across concurrent server instances.

use chrono::Utc;
use rand::Rng;

/// Generate a deposit reference: time prefix plus 128 bits of randomness.
pub fn deposit_reference() -> String {
    format!("dep_{}_{}", Utc::now().timestamp_millis(), random_suffix())
}

/// Generate a transfer reference.
pub fn transfer_reference() -> String {
    format!("trf_{}_{}", Utc::now().timestamp_millis(), random_suffix())
}

/// Generate a 10-digit wallet number.
///
/// The space is small enough that collisions are plausible; callers retry
/// on the store's uniqueness constraint.
pub fn wallet_number() -> String {
    let mut rng = rand::thread_rng();
    (0..10).map(|_| char::from(b'0' + rng.gen_range(0..10u8))).collect()
}

fn random_suffix() -> String {
    let bytes: [u8; 16] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

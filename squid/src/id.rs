//! Random identifier generation.
//!
//! Asset and agreement identifiers are 256 bits of entropy rendered as
//! lowercase hex. There is no central registry checking for collisions;
//! the entropy alone makes them negligible.

/// Number of random bytes in a generated identifier.
pub const ID_BYTES: usize = 32;

/// Returns a fresh identifier: [`ID_BYTES`] random bytes as lowercase hex.
pub fn generate_id() -> String {
    let bytes: [u8; ID_BYTES] = rand::random();
    hex::encode(bytes)
}

/// Same as [`generate_id`] but with a literal `0x` prefix, for contexts
/// that expect address-shaped strings (agreement ids passed to the ledger).
pub fn generate_prefixed_id() -> String {
    format!("0x{}", generate_id())
}

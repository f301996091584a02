// crates/browserscope-core/src/core/hashing.rs
// ============================================================================
// Module: Browserscope Hashing
// Description: SHA-256 digests for user-agent dedupe keys and submitter IPs.
// Purpose: Provide stable content keys without leaking raw inputs into storage.
// Dependencies: sha2
// ============================================================================

//! ## Overview
//! User agents are deduplicated by the digest of their canonical string, and
//! submitter addresses are stored as digests only. Both use lowercase hex
//! SHA-256.

// ============================================================================
// SECTION: Imports
// ============================================================================

use sha2::Digest;
use sha2::Sha256;

// ============================================================================
// SECTION: Hashing Helpers
// ============================================================================

/// Hashes raw bytes with SHA-256 and returns the lowercase hex digest.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_encode(&hasher.finalize())
}

/// Hashes a submitter IP address for storage.
#[must_use]
pub fn hash_ip(ip: &str) -> String {
    sha256_hex(ip.trim().as_bytes())
}

// ============================================================================
// SECTION: Hex Encoding
// ============================================================================

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(char::from(HEX[usize::from(byte >> 4)]));
        out.push(char::from(HEX[usize::from(byte & 0x0f)]));
    }
    out
}

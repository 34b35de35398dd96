// Cryptographic utilities

use serde::Serialize;
use sha2::{Digest, Sha256};

/// SHA-256 hex digest (lowercase).
pub fn sha256_hex(input: &[u8]) -> String {
    let digest = Sha256::digest(input);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Fingerprint of a request payload as it goes on the wire.
///
/// Two submissions with the same fingerprint sent byte-identical bodies. Logged instead of the
/// body itself, which holds customer data.
pub fn payload_fingerprint<T: Serialize>(payload: &T) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(payload)?;
    Ok(sha256_hex(&bytes))
}

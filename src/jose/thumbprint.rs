//! JWK Thumbprint computation (RFC 7638)

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

use crate::jose::jwk::PublicKey;

/// Canonical JSON of the required members: lexicographic order, no whitespace.
pub fn canonical_json(key: &PublicKey) -> String {
    // Member names and values are base64url or fixed ASCII, so nothing needs escaping.
    let members = key
        .required_members()
        .into_iter()
        .map(|(name, value)| format!("\"{}\":\"{}\"", name, value))
        .collect::<Vec<_>>()
        .join(",");

    format!("{{{}}}", members)
}

/// base64url(SHA-256(canonical JSON)), without padding.
pub fn compute_thumbprint(key: &PublicKey) -> String {
    let digest = Sha256::digest(canonical_json(key).as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

use serde_json::Value;

use crate::error::{DpopError, Result};
use crate::jose::{JoseHeader, PublicKey};

/// Key lookup handed to the JWS layer.
///
/// A DPoP proof is self-certifying: the verification key is the `jwk` header
/// member of the proof itself, never a key store.
pub fn resolve_key(header: &JoseHeader) -> Result<PublicKey> {
    let jwk = header
        .get("jwk")
        .and_then(Value::as_object)
        .ok_or(DpopError::MissingJwk)?;

    PublicKey::from_jwk(jwk)
}

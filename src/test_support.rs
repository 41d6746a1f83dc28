//! Key material, signing helpers and a signature-free verifier for unit tests.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::{Value, json};

use crate::error::DpopError;
use crate::jose::{JoseHeader, JwsError, JwsVerifier, PublicKey, VerifiedJws};

pub fn b64url_json(value: &Value) -> String {
    URL_SAFE_NO_PAD.encode(serde_json::to_vec(value).unwrap())
}

pub fn es256_key() -> p256::ecdsa::SigningKey {
    p256::ecdsa::SigningKey::from_slice(&[0x11; 32]).unwrap()
}

pub fn es256_jwk(key: &p256::ecdsa::SigningKey) -> Value {
    let point = key.verifying_key().to_encoded_point(false);
    json!({
        "kty": "EC",
        "crv": "P-256",
        "x": URL_SAFE_NO_PAD.encode(point.x().unwrap()),
        "y": URL_SAFE_NO_PAD.encode(point.y().unwrap()),
    })
}

pub fn sign_es256(header: &Value, claims: &Value, key: &p256::ecdsa::SigningKey) -> String {
    use p256::ecdsa::{Signature, signature::Signer};

    let input = format!("{}.{}", b64url_json(header), b64url_json(claims));
    let sig: Signature = key.sign(input.as_bytes());
    format!("{}.{}", input, URL_SAFE_NO_PAD.encode(sig.to_bytes()))
}

pub fn es512_key() -> p521::ecdsa::SigningKey {
    // Leading 0x01 keeps the scalar below the P-521 group order.
    let mut scalar = [0x33; 66];
    scalar[0] = 0x01;
    p521::ecdsa::SigningKey::from_slice(&scalar).unwrap()
}

pub fn es512_jwk(key: &p521::ecdsa::SigningKey) -> Value {
    let point = p521::ecdsa::VerifyingKey::from(key).to_encoded_point(false);
    json!({
        "kty": "EC",
        "crv": "P-521",
        "x": URL_SAFE_NO_PAD.encode(point.x().unwrap()),
        "y": URL_SAFE_NO_PAD.encode(point.y().unwrap()),
    })
}

pub fn sign_es512(header: &Value, claims: &Value, key: &p521::ecdsa::SigningKey) -> String {
    use p521::ecdsa::{Signature, signature::Signer};

    let input = format!("{}.{}", b64url_json(header), b64url_json(claims));
    let sig: Signature = key.sign(input.as_bytes());
    format!("{}.{}", input, URL_SAFE_NO_PAD.encode(sig.to_bytes()))
}

/// Signs with a `jsonwebtoken` key, for algorithms the other helpers lack.
pub fn sign_with(
    header: &Value,
    claims: &Value,
    key: &jsonwebtoken::EncodingKey,
    alg: jsonwebtoken::Algorithm,
) -> String {
    let input = format!("{}.{}", b64url_json(header), b64url_json(claims));
    let sig = jsonwebtoken::crypto::sign(input.as_bytes(), key, alg).unwrap();
    format!("{}.{}", input, sig)
}

pub fn ed25519_key() -> ed25519_dalek::SigningKey {
    ed25519_dalek::SigningKey::from_bytes(&[0x22; 32])
}

pub fn ed25519_jwk(key: &ed25519_dalek::SigningKey) -> Value {
    json!({
        "kty": "OKP",
        "crv": "Ed25519",
        "x": URL_SAFE_NO_PAD.encode(key.verifying_key().as_bytes()),
    })
}

pub fn sign_ed25519(header: &Value, claims: &Value, key: &ed25519_dalek::SigningKey) -> String {
    use ed25519_dalek::Signer;

    let input = format!("{}.{}", b64url_json(header), b64url_json(claims));
    let sig = key.sign(input.as_bytes());
    format!("{}.{}", input, URL_SAFE_NO_PAD.encode(sig.to_bytes()))
}

/// Accepts any signature. Lets tests reach later checks without cryptography.
pub struct FakeJws;

impl JwsVerifier for FakeJws {
    fn verify(
        &self,
        compact: &str,
        resolve: &dyn Fn(&JoseHeader) -> Result<PublicKey, DpopError>,
    ) -> Result<VerifiedJws, JwsError> {
        let parts: Vec<&str> = compact.split('.').collect();
        if parts.len() != 3 {
            return Err(JwsError::Malformed);
        }

        let header: JoseHeader = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[0])?)?;
        let payload: Value = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1])?)?;
        let key = resolve(&header).map_err(|e| JwsError::KeyResolution(Box::new(e)))?;

        Ok(VerifiedJws {
            header,
            payload,
            key,
        })
    }
}

/// Compact token with a placeholder signature, for `FakeJws`.
pub fn unsigned(header: &Value, claims: &Value) -> String {
    format!("{}.{}.c2ln", b64url_json(header), b64url_json(claims))
}

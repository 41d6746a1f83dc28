//! Compact JWS verification port.
//!
//! The proof validator only needs "parse this compact token, ask me for the
//! key, check the signature". `JwsVerifier` is that seam; `JsonWebTokenVerifier`
//! fills it with `jsonwebtoken`.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::Value;
use tracing::warn;

use crate::error::DpopError;
use crate::jose::{Curve, JoseHeader, PublicKey};

#[derive(Debug, thiserror::Error)]
pub enum JwsError {
    #[error("not a compact JWS")]
    Malformed,
    #[error("invalid base64url segment: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid protected header: {0}")]
    Header(#[from] serde_json::Error),
    #[error("invalid payload: {0}")]
    Payload(#[source] serde_json::Error),
    #[error("key resolution failed: {0}")]
    KeyResolution(#[source] Box<DpopError>),
    #[error("no supported signing algorithm for {0} key")]
    UnsupportedKey(&'static str),
    #[error("algorithm {0:?} does not match the key")]
    AlgorithmMismatch(Option<String>),
    #[error("signature verification failed")]
    InvalidSignature,
    #[error("jwt verification failed: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

/// A token whose signature checked out against `key`.
#[derive(Debug, Clone)]
pub struct VerifiedJws {
    pub header: JoseHeader,
    pub payload: Value,
    pub key: PublicKey,
}

pub trait JwsVerifier {
    /// Parse `compact`, obtain the key through `resolve` and verify the signature.
    fn verify(
        &self,
        compact: &str,
        resolve: &dyn Fn(&JoseHeader) -> Result<PublicKey, DpopError>,
    ) -> Result<VerifiedJws, JwsError>;
}

/// `jsonwebtoken`-backed verifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonWebTokenVerifier;

impl JwsVerifier for JsonWebTokenVerifier {
    fn verify(
        &self,
        compact: &str,
        resolve: &dyn Fn(&JoseHeader) -> Result<PublicKey, DpopError>,
    ) -> Result<VerifiedJws, JwsError> {
        let mut segments = compact.split('.');
        let (Some(encoded_header), Some(encoded_payload), Some(encoded_signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(JwsError::Malformed);
        };

        // The raw header is kept untyped: the resolver reads `jwk` as plain JSON.
        let header: JoseHeader = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(encoded_header)?)?;

        let key = resolve(&header).map_err(|e| JwsError::KeyResolution(Box::new(e)))?;

        if let PublicKey::Ec {
            curve: Curve::P521, ..
        } = key
        {
            let signing_input = format!("{encoded_header}.{encoded_payload}");
            verify_es512(&header, &key, &signing_input, encoded_signature)?;

            let payload = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(encoded_payload)?)
                .map_err(JwsError::Payload)?;
            return Ok(VerifiedJws {
                header,
                payload,
                key,
            });
        }

        let algorithms = signing_algorithms(&key);
        let Some(first) = algorithms.first().copied() else {
            return Err(JwsError::UnsupportedKey(key.kty()));
        };

        let decoding_key = decoding_key(&key).map_err(|e| {
            warn!(error = ?e, kty = key.kty(), "unusable DPoP jwk");
            JwsError::Jwt(e)
        })?;

        // A proof is not an access token: it carries `iat` only, no `exp`/`aud`.
        let mut validation = Validation::new(first);
        validation.algorithms = algorithms;
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = jsonwebtoken::decode::<Value>(compact, &decoding_key, &validation)?;

        Ok(VerifiedJws {
            header,
            payload: data.claims,
            key,
        })
    }
}

/// Algorithms a key of this family may sign with.
fn signing_algorithms(key: &PublicKey) -> Vec<Algorithm> {
    match key {
        PublicKey::Ec {
            curve: Curve::P256, ..
        } => vec![Algorithm::ES256],
        PublicKey::Ec {
            curve: Curve::P384, ..
        } => vec![Algorithm::ES384],
        // jsonwebtoken has no ES512; see `verify_es512`.
        PublicKey::Ec {
            curve: Curve::P521, ..
        } => Vec::new(),
        PublicKey::Rsa { .. } => vec![
            Algorithm::RS256,
            Algorithm::RS384,
            Algorithm::RS512,
            Algorithm::PS256,
            Algorithm::PS384,
            Algorithm::PS512,
        ],
        PublicKey::Ed25519(_) => vec![Algorithm::EdDSA],
    }
}

/// ES512 over `signing_input`, checked with `p521` directly.
fn verify_es512(
    header: &JoseHeader,
    key: &PublicKey,
    signing_input: &str,
    encoded_signature: &str,
) -> Result<(), JwsError> {
    use p521::ecdsa::{Signature, VerifyingKey, signature::Verifier};

    match header.get("alg").and_then(Value::as_str) {
        Some("ES512") => {}
        other => return Err(JwsError::AlgorithmMismatch(other.map(str::to_string))),
    }

    let point = key.sec1_point().ok_or(JwsError::UnsupportedKey(key.kty()))?;
    let verifying_key = VerifyingKey::from_sec1_bytes(&point).map_err(|_| {
        warn!(kty = key.kty(), "unusable DPoP jwk");
        JwsError::InvalidSignature
    })?;

    // r || s, 66 bytes each.
    let signature = Signature::from_slice(&URL_SAFE_NO_PAD.decode(encoded_signature)?)
        .map_err(|_| JwsError::InvalidSignature)?;

    verifying_key
        .verify(signing_input.as_bytes(), &signature)
        .map_err(|_| JwsError::InvalidSignature)
}

fn decoding_key(key: &PublicKey) -> Result<DecodingKey, jsonwebtoken::errors::Error> {
    let members = key.required_members();
    let get = |name: &str| {
        members
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
            .unwrap_or_default()
    };

    match key {
        PublicKey::Ec { .. } => DecodingKey::from_ec_components(get("x"), get("y")),
        PublicKey::Rsa { .. } => DecodingKey::from_rsa_components(get("n"), get("e")),
        PublicKey::Ed25519(_) => DecodingKey::from_ed_components(get("x")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jose::resolve_key;
    use crate::test_support::{
        b64url_json, ed25519_jwk, ed25519_key, es256_jwk, es256_key, es512_jwk, es512_key,
        sign_ed25519, sign_es256, sign_es512, sign_with,
    };
    use jsonwebtoken::EncodingKey;
    use serde_json::json;

    #[test]
    fn verifies_es256_proof() {
        let key = es256_key();
        let header = json!({"typ": "dpop+jwt", "alg": "ES256", "jwk": es256_jwk(&key)});
        let token = sign_es256(&header, &json!({"htm": "GET", "iat": 1}), &key);

        let verified = JsonWebTokenVerifier.verify(&token, &resolve_key).unwrap();
        assert!(matches!(verified.key, PublicKey::Ec { .. }));
        assert_eq!(verified.payload["htm"], "GET");
        assert_eq!(verified.header["typ"], "dpop+jwt");
    }

    #[test]
    fn verifies_eddsa_proof() {
        let key = ed25519_key();
        let header = json!({"typ": "dpop+jwt", "alg": "EdDSA", "jwk": ed25519_jwk(&key)});
        let token = sign_ed25519(&header, &json!({"jti": "a"}), &key);

        let verified = JsonWebTokenVerifier.verify(&token, &resolve_key).unwrap();
        assert_eq!(
            verified.key,
            PublicKey::Ed25519(key.verifying_key().to_bytes().to_vec())
        );
    }

    #[test]
    fn rejects_tampered_payload() {
        let key = es256_key();
        let header = json!({"typ": "dpop+jwt", "alg": "ES256", "jwk": es256_jwk(&key)});
        let token = sign_es256(&header, &json!({"htm": "GET"}), &key);

        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = b64url_json(&json!({"htm": "POST"}));
        parts[1] = &forged;

        let err = JsonWebTokenVerifier
            .verify(&parts.join("."), &resolve_key)
            .unwrap_err();
        assert!(matches!(err, JwsError::Jwt(_)));
    }

    #[test]
    fn rejects_key_from_another_family() {
        // Signed with Ed25519 but the header advertises an EC key.
        let ec = es256_key();
        let ed = ed25519_key();
        let header = json!({"typ": "dpop+jwt", "alg": "EdDSA", "jwk": es256_jwk(&ec)});
        let token = sign_ed25519(&header, &json!({}), &ed);

        assert!(JsonWebTokenVerifier.verify(&token, &resolve_key).is_err());
    }

    #[test]
    fn malformed_compact_form() {
        for token in ["", "a.b", "a.b.c.d"] {
            assert!(matches!(
                JsonWebTokenVerifier.verify(token, &resolve_key),
                Err(JwsError::Malformed)
            ));
        }
        assert!(matches!(
            JsonWebTokenVerifier.verify("!!.b.c", &resolve_key),
            Err(JwsError::Base64(_))
        ));
    }

    #[test]
    fn resolver_failure_is_reported_as_key_resolution() {
        let header = json!({"typ": "dpop+jwt", "alg": "ES256"});
        let token = format!("{}.{}.sig", b64url_json(&header), b64url_json(&json!({})));

        match JsonWebTokenVerifier.verify(&token, &resolve_key) {
            Err(JwsError::KeyResolution(e)) => assert!(matches!(*e, DpopError::MissingJwk)),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn verifies_es512_proof() {
        let key = es512_key();
        let header = json!({"typ": "dpop+jwt", "alg": "ES512", "jwk": es512_jwk(&key)});
        let token = sign_es512(&header, &json!({"htm": "GET"}), &key);

        let verified = JsonWebTokenVerifier.verify(&token, &resolve_key).unwrap();
        assert!(matches!(
            verified.key,
            PublicKey::Ec {
                curve: Curve::P521,
                ..
            }
        ));
        assert_eq!(verified.payload["htm"], "GET");
    }

    #[test]
    fn es512_rejects_tampering_and_wrong_alg() {
        let key = es512_key();
        let header = json!({"typ": "dpop+jwt", "alg": "ES512", "jwk": es512_jwk(&key)});
        let token = sign_es512(&header, &json!({"htm": "GET"}), &key);

        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = b64url_json(&json!({"htm": "POST"}));
        parts[1] = &forged;
        assert!(matches!(
            JsonWebTokenVerifier.verify(&parts.join("."), &resolve_key),
            Err(JwsError::InvalidSignature)
        ));

        let header = json!({"typ": "dpop+jwt", "alg": "ES256", "jwk": es512_jwk(&key)});
        let token = sign_es512(&header, &json!({"htm": "GET"}), &key);
        assert!(matches!(
            JsonWebTokenVerifier.verify(&token, &resolve_key),
            Err(JwsError::AlgorithmMismatch(Some(alg))) if alg == "ES256"
        ));
    }

    const RSA_N: &str = "jOz0mdKvvCc4GVR7AqljDH2pJH94djq2IwAi6h1TTphSTQj8j5Buv9IpetqP9RcKUpPl0gVTAFUD3zixGJBccDLPmbJ7oGNfw2bX_5Frj3SsI9eoOq3r157wQsgXrzspPG4Jvck_kg-yKJyG6TqRvZcCN4O2mu5gK2wW-Lzardj9Alo94Fy5eLqzi4utR2ggrEf7Ucil8A4ggBqCgeJAbyl3qb66m7axgGlMZRUStwdVm-G2-oB6bl69Qc0vACOL1jU4OqgyH8Rx2dxJqHg1RXU1Cn38jcmdDOF33ExftqHdiv94Han2uAZ1jKXjnp1wBVteHiECPi4yK86IKTMMUw";
    const P384_X: &str = "qFHarcgP14qFJvSAm7_pEtYSAhx_D2FzRnFd0fcz-7axkWBa-6AZjia7EXZRBI7I";
    const P384_Y: &str = "gwsoRpYbEs4ApBG-o40vMURRuLQ-gyFzECOM6G8cMla96gUOkHvdoGH3keFwvBCM";

    #[test]
    fn verifies_rs256_proof() {
        let key = EncodingKey::from_rsa_pem(include_bytes!("testdata/rsa-2048.pem")).unwrap();
        let header = json!({
            "typ": "dpop+jwt",
            "alg": "RS256",
            "jwk": {"kty": "RSA", "n": RSA_N, "e": "AQAB"}
        });
        let token = sign_with(&header, &json!({"htm": "GET"}), &key, Algorithm::RS256);

        let verified = JsonWebTokenVerifier.verify(&token, &resolve_key).unwrap();
        assert!(matches!(verified.key, PublicKey::Rsa { .. }));
        assert_eq!(verified.payload["htm"], "GET");

        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = b64url_json(&json!({"htm": "POST"}));
        parts[1] = &forged;
        assert!(matches!(
            JsonWebTokenVerifier.verify(&parts.join("."), &resolve_key),
            Err(JwsError::Jwt(_))
        ));
    }

    #[test]
    fn verifies_es384_proof() {
        let key = EncodingKey::from_ec_pem(include_bytes!("testdata/ec-p384.pem")).unwrap();
        let jwk = json!({"kty": "EC", "crv": "P-384", "x": P384_X, "y": P384_Y});
        let header = json!({"typ": "dpop+jwt", "alg": "ES384", "jwk": jwk});
        let token = sign_with(&header, &json!({"htm": "GET"}), &key, Algorithm::ES384);

        let verified = JsonWebTokenVerifier.verify(&token, &resolve_key).unwrap();
        assert!(matches!(
            verified.key,
            PublicKey::Ec {
                curve: Curve::P384,
                ..
            }
        ));
        assert_eq!(verified.payload["htm"], "GET");

        // A P-384 key only signs ES384.
        let header = json!({"typ": "dpop+jwt", "alg": "ES256", "jwk": jwk});
        let token = sign_es256(&header, &json!({"htm": "GET"}), &es256_key());
        assert!(matches!(
            JsonWebTokenVerifier.verify(&token, &resolve_key),
            Err(JwsError::Jwt(_))
        ));
    }
}

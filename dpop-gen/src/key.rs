use std::{fs, path::Path};

use anyhow::{Context, Result, bail};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use dpop_proof::PublicKey;
use serde_json::{Value, json};

/// Client key used to sign proofs.
pub enum ProofKey {
    Ed25519(ed25519_dalek::SigningKey),
    Es256(p256::ecdsa::SigningKey),
}

impl ProofKey {
    /// Load a PKCS#8 PEM private key for `alg` (EdDSA or ES256).
    pub fn load(alg: &str, path: &Path) -> Result<Self> {
        let pem = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;

        match alg {
            "EdDSA" => {
                use ed25519_dalek::pkcs8::DecodePrivateKey;
                let key = ed25519_dalek::SigningKey::from_pkcs8_pem(&pem)
                    .context("invalid Ed25519 PKCS#8 PEM")?;
                Ok(Self::Ed25519(key))
            }
            "ES256" => {
                use p256::pkcs8::DecodePrivateKey;
                let key = p256::ecdsa::SigningKey::from_pkcs8_pem(&pem)
                    .context("invalid P-256 PKCS#8 PEM")?;
                Ok(Self::Es256(key))
            }
            other => bail!("unsupported alg {other}, expected EdDSA or ES256"),
        }
    }

    pub fn alg(&self) -> &'static str {
        match self {
            Self::Ed25519(_) => "EdDSA",
            Self::Es256(_) => "ES256",
        }
    }

    pub fn jwk(&self) -> Value {
        match self {
            Self::Ed25519(key) => json!({
                "kty": "OKP",
                "crv": "Ed25519",
                "x": URL_SAFE_NO_PAD.encode(key.verifying_key().as_bytes()),
            }),
            Self::Es256(key) => {
                let point = key.verifying_key().to_encoded_point(false);
                let (Some(x), Some(y)) = (point.x(), point.y()) else {
                    unreachable!("uncompressed point has both coordinates");
                };
                json!({
                    "kty": "EC",
                    "crv": "P-256",
                    "x": URL_SAFE_NO_PAD.encode(x),
                    "y": URL_SAFE_NO_PAD.encode(y),
                })
            }
        }
    }

    /// Public half, as the validator will see it.
    pub fn public_key(&self) -> Result<PublicKey> {
        let jwk = self.jwk();
        let jwk = jwk.as_object().context("jwk is not an object")?;
        Ok(PublicKey::from_jwk(jwk)?)
    }

    pub fn sign(&self, input: &[u8]) -> Vec<u8> {
        match self {
            Self::Ed25519(key) => {
                use ed25519_dalek::Signer;
                key.sign(input).to_bytes().to_vec()
            }
            Self::Es256(key) => {
                use p256::ecdsa::{Signature, signature::Signer};
                let sig: Signature = key.sign(input);
                sig.to_bytes().to_vec()
            }
        }
    }
}

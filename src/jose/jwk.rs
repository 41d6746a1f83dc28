//! JWK decoding restricted to the key families DPoP accepts.
//!
//! The decoder keeps only the members RFC 7638 needs for a thumbprint, so
//! `alg`, `kid`, `use` and friends never reach the canonical form.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::{Map, Value};

use crate::error::{DpopError, ProofDefect, Result};

/// Curves accepted for `kty = "EC"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    P256,
    P384,
    P521,
}

impl Curve {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "P-256" => Some(Self::P256),
            "P-384" => Some(Self::P384),
            "P-521" => Some(Self::P521),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::P256 => "P-256",
            Self::P384 => "P-384",
            Self::P521 => "P-521",
        }
    }

    pub fn bit_size(&self) -> usize {
        match self {
            Self::P256 => 256,
            Self::P384 => 384,
            Self::P521 => 521,
        }
    }

    /// Byte length of a coordinate: ceil(bits / 8).
    pub fn coordinate_len(&self) -> usize {
        self.bit_size().div_ceil(8)
    }
}

/// Public key embedded in a DPoP proof header.
///
/// Integers (`x`, `y`, `n`, `e`) are big-endian and stored without leading
/// zero bytes. The Ed25519 point is kept exactly as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    Ec { curve: Curve, x: Vec<u8>, y: Vec<u8> },
    Rsa { n: Vec<u8>, e: Vec<u8> },
    Ed25519(Vec<u8>),
}

impl PublicKey {
    /// Decode an untrusted JWK object.
    pub fn from_jwk(jwk: &Map<String, Value>) -> Result<Self> {
        let kty = member(jwk, "kty")?;

        match kty {
            "EC" => {
                let x = decode_b64url(member(jwk, "x")?)?;
                let y = decode_b64url(member(jwk, "y")?)?;
                let crv = member(jwk, "crv")?;

                let curve = Curve::from_name(crv)
                    .ok_or_else(|| DpopError::UnsupportedCurve(crv.to_string()))?;

                let x = strip_leading_zeros(x);
                let y = strip_leading_zeros(y);
                if x.len() > curve.coordinate_len() {
                    return Err(ProofDefect::CoordinateTooLong("x").into());
                }
                if y.len() > curve.coordinate_len() {
                    return Err(ProofDefect::CoordinateTooLong("y").into());
                }

                Ok(Self::Ec { curve, x, y })
            }
            "RSA" => {
                let e = decode_b64url(member(jwk, "e")?)?;
                let n = decode_b64url(member(jwk, "n")?)?;

                Ok(Self::Rsa {
                    n: strip_leading_zeros(n),
                    e: strip_leading_zeros(e),
                })
            }
            // `crv` is not checked here: any OKP key is treated as Ed25519.
            "OKP" => {
                let x = decode_b64url(member(jwk, "x")?)?;
                Ok(Self::Ed25519(x))
            }
            other => Err(DpopError::UnsupportedKeyAlgorithm(other.to_string())),
        }
    }

    pub fn kty(&self) -> &'static str {
        match self {
            Self::Ec { .. } => "EC",
            Self::Rsa { .. } => "RSA",
            Self::Ed25519(_) => "OKP",
        }
    }

    /// Required members in lexicographic order, values already base64url encoded.
    ///
    /// EC coordinates are padded to the curve width; RSA integers use their
    /// minimal encoding.
    pub fn required_members(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Ec { curve, x, y } => {
                let len = curve.coordinate_len();
                vec![
                    ("crv", curve.name().to_string()),
                    ("kty", self.kty().to_string()),
                    ("x", URL_SAFE_NO_PAD.encode(fixed_width(x, len))),
                    ("y", URL_SAFE_NO_PAD.encode(fixed_width(y, len))),
                ]
            }
            Self::Rsa { n, e } => vec![
                ("e", URL_SAFE_NO_PAD.encode(e)),
                ("kty", self.kty().to_string()),
                ("n", URL_SAFE_NO_PAD.encode(n)),
            ],
            Self::Ed25519(x) => vec![
                ("crv", "Ed25519".to_string()),
                ("kty", self.kty().to_string()),
                ("x", URL_SAFE_NO_PAD.encode(x)),
            ],
        }
    }

    /// Uncompressed SEC1 point (`04 || x || y`) of an EC key.
    pub fn sec1_point(&self) -> Option<Vec<u8>> {
        let Self::Ec { curve, x, y } = self else {
            return None;
        };
        let len = curve.coordinate_len();

        let mut point = Vec::with_capacity(1 + 2 * len);
        point.push(0x04);
        point.extend(fixed_width(x, len));
        point.extend(fixed_width(y, len));
        Some(point)
    }

    /// Minimal JWK object for this key.
    pub fn to_jwk(&self) -> Map<String, Value> {
        self.required_members()
            .into_iter()
            .map(|(k, v)| (k.to_string(), Value::String(v)))
            .collect()
    }
}

fn member<'a>(jwk: &'a Map<String, Value>, name: &'static str) -> Result<&'a str> {
    jwk.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| ProofDefect::JwkMember(name).into())
}

/// Some producers pad base64url values even though RFC 7515 forbids it.
fn decode_b64url(s: &str) -> Result<Vec<u8>> {
    let trimmed = s.trim_end_matches('=');
    URL_SAFE_NO_PAD
        .decode(trimmed)
        .map_err(|e| ProofDefect::Base64(e).into())
}

fn strip_leading_zeros(mut bytes: Vec<u8>) -> Vec<u8> {
    let zeros = bytes.iter().take_while(|b| **b == 0).count();
    bytes.drain(..zeros);
    bytes
}

fn fixed_width(bytes: &[u8], len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len.saturating_sub(bytes.len())];
    out.extend_from_slice(bytes);
    out
}

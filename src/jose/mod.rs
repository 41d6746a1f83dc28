//! JOSE building blocks used by the proof validator.

pub mod jwk;
pub mod jws;
pub mod resolver;
pub mod thumbprint;

/// Protected JOSE header as received, before any typing.
pub type JoseHeader = serde_json::Map<String, serde_json::Value>;

pub use jwk::{Curve, PublicKey};
pub use jws::{JsonWebTokenVerifier, JwsError, JwsVerifier, VerifiedJws};
pub use resolver::resolve_key;
pub use thumbprint::{canonical_json, compute_thumbprint};

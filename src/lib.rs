//! OAuth 2.0 DPoP proof validation (RFC 9449).
//!
//! ```ignore
//! use dpop_proof::{HttpVerb, ValidationOptions, parse};
//!
//! let url = url::Url::parse("https://as.example.com/token?x=1")?;
//! let proof = parse(dpop_header, HttpVerb::Post, &url, &ValidationOptions::default())?;
//! // proof.id() / proof.issued_at() feed the replay cache,
//! // proof.hashed_public_key() becomes cnf.jkt.
//! ```

pub mod config;
pub mod dpop;
pub mod error;
pub mod jose;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{ConfigError, DpopConfig};
pub use dpop::{
    HtuMatching, HttpVerb, ProofClaims, ProofValidator, ValidatedProof, ValidationOptions,
    compute_ath, parse,
};
pub use error::{DpopError, ProofDefect};
pub use jose::{PublicKey, compute_thumbprint};

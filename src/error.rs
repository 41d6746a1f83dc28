/*
 * Responsibility
 * - DPoP validation error kinds (one per RFC 9449 check)
 * - the low-level causes wrapped by `InvalidProof`
 * - mapping to the RFC 9449 / RFC 6750 error codes a server answers with
 */
use thiserror::Error;

use crate::jose::jws::JwsError;

pub type Result<T> = std::result::Result<T, DpopError>;

#[derive(Debug, Error)]
pub enum DpopError {
    #[error("invalid DPoP proof: {0}")]
    InvalidProof(#[source] ProofDefect),
    #[error("missing required claims: {}", .0.join(", "))]
    MissingClaims(Vec<&'static str>),
    #[error("unsupported DPoP typ: {0:?}")]
    UnsupportedJwtType(Option<String>),
    #[error("htm/htu do not match the request")]
    IncorrectHttpTarget,
    #[error("nonce mismatch")]
    IncorrectNonce,
    #[error("proof is too old")]
    Expired,
    #[error("proof is issued in the future")]
    Future,
    #[error("missing jwk in DPoP header")]
    MissingJwk,
    #[error("unsupported curve: {0}")]
    UnsupportedCurve(String),
    #[error("unsupported key algorithm: {0}")]
    UnsupportedKeyAlgorithm(String),
    #[error("jkt mismatch")]
    IncorrectJkt,
    #[error("ath mismatch")]
    IncorrectAth,
}

/// Low-level reason a proof is structurally unusable.
#[derive(Debug, Error)]
pub enum ProofDefect {
    #[error("jwk member `{0}` is missing or not a string")]
    JwkMember(&'static str),
    #[error("jwk coordinate `{0}` is wider than the curve")]
    CoordinateTooLong(&'static str),
    #[error("invalid base64url: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid claims: {0}")]
    Claims(#[from] serde_json::Error),
    #[error(transparent)]
    Jws(#[from] JwsError),
}

impl From<ProofDefect> for DpopError {
    fn from(e: ProofDefect) -> Self {
        Self::InvalidProof(e)
    }
}

impl DpopError {
    /// `true` when the caller should answer with a fresh `DPoP-Nonce` header.
    pub fn is_nonce_challenge(&self) -> bool {
        matches!(self, Self::IncorrectNonce)
    }

    /// Error code for the `WWW-Authenticate` / token endpoint response.
    pub fn error_code(&self) -> &'static str {
        if self.is_nonce_challenge() {
            "use_dpop_nonce"
        } else {
            "invalid_dpop_proof"
        }
    }
}

//! Resource-server follow-up: bind a validated proof to the access token it
//! was presented with (RFC 9449 section 4.3 point 12, section 6.1).

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::dpop::types::ValidatedProof;
use crate::error::{DpopError, Result};

/// `ath` value for an access token: base64url(SHA-256(token)).
pub fn compute_ath(access_token: &str) -> String {
    let digest = Sha256::digest(access_token.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

impl ValidatedProof {
    /// Check `ath` against `access_token` and the token's `cnf.jkt` against the proof key.
    pub fn validate_token_binding(&self, access_token: &str, cnf_jkt: &str) -> Result<()> {
        let expected_ath = compute_ath(access_token);
        if self.claims().ath.as_deref() != Some(expected_ath.as_str()) {
            warn!(jti = %self.id(), "DPoP ath mismatch");
            return Err(DpopError::IncorrectAth);
        }

        if cnf_jkt != self.hashed_public_key() {
            warn!(jti = %self.id(), "DPoP cnf.jkt mismatch");
            return Err(DpopError::IncorrectJkt);
        }

        Ok(())
    }
}

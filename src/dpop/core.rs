//! DPoP proof validation (RFC 9449 section 4.3) - core logic.
//!
//! No storage, no HTTP framework: the caller passes the request method and
//! URL, gets back a `ValidatedProof`, and does replay and access-token
//! binding checks on top of it.

use chrono::{DateTime, Utc};
use tracing::warn;
use url::Url;

use crate::dpop::types::{
    HtuMatching, HttpVerb, ProofClaims, RawClaims, ValidatedProof, ValidationOptions,
};
use crate::error::{DpopError, ProofDefect, Result};
use crate::jose::{
    JoseHeader, JsonWebTokenVerifier, JwsError, JwsVerifier, compute_thumbprint, resolve_key,
};

pub const DPOP_JWT_TYPE: &str = "dpop+jwt";

/// Everything the ordered checks look at.
struct Candidate<'a> {
    header: &'a JoseHeader,
    claims: &'a ProofClaims,
    method: HttpVerb,
    url: &'a Url,
    options: &'a ValidationOptions,
    now: DateTime<Utc>,
    thumbprint: &'a str,
}

type Check = fn(&Candidate<'_>) -> Result<()>;

/// Evaluated in this order after signature and claim presence; first failure wins.
const PROOF_CHECKS: &[(&str, Check)] = &[
    ("typ", check_type),
    ("http_target", check_http_target),
    ("nonce", check_nonce),
    ("iat_window", check_issued_at),
    ("jkt", check_jkt),
];

/// Validator over an injected JWS implementation.
#[derive(Debug, Clone)]
pub struct ProofValidator<V = JsonWebTokenVerifier> {
    verifier: V,
}

impl<V: JwsVerifier> ProofValidator<V> {
    pub fn new(verifier: V) -> Self {
        Self { verifier }
    }

    pub fn validate(
        &self,
        proof: &str,
        method: HttpVerb,
        url: &Url,
        options: &ValidationOptions,
    ) -> Result<ValidatedProof> {
        self.validate_at(proof, method, url, options, Utc::now())
    }

    /// Same as `validate`, with `now` supplied by the caller.
    pub fn validate_at(
        &self,
        proof: &str,
        method: HttpVerb,
        url: &Url,
        options: &ValidationOptions,
        now: DateTime<Utc>,
    ) -> Result<ValidatedProof> {
        // Well-formed JWS, supported algorithm, embedded key, valid signature.
        let verified = self
            .verifier
            .verify(proof, &resolve_key)
            .map_err(|e| match e {
                JwsError::KeyResolution(inner) => {
                    warn!(error = %inner, "DPoP key resolution failed");
                    *inner
                }
                other => {
                    warn!(error = ?other, "invalid DPoP proof signature");
                    DpopError::InvalidProof(ProofDefect::Jws(other))
                }
            })?;

        let raw: RawClaims = serde_json::from_value(verified.payload).map_err(|e| {
            warn!(error = ?e, "invalid DPoP claims");
            ProofDefect::Claims(e)
        })?;
        let claims = require_claims(raw)?;

        let thumbprint = compute_thumbprint(&verified.key);

        let candidate = Candidate {
            header: &verified.header,
            claims: &claims,
            method,
            url,
            options,
            now,
            thumbprint: &thumbprint,
        };

        for (name, check) in PROOF_CHECKS {
            if let Err(err) = check(&candidate) {
                warn!(check = *name, jti = %claims.jti, error = %err, "DPoP proof rejected");
                return Err(err);
            }
        }

        Ok(ValidatedProof::new(
            verified.header,
            claims,
            verified.key,
            thumbprint,
        ))
    }
}

/// Validate `proof` with `jsonwebtoken` and the system clock.
pub fn parse(
    proof: &str,
    method: HttpVerb,
    url: &Url,
    options: &ValidationOptions,
) -> Result<ValidatedProof> {
    ProofValidator::new(JsonWebTokenVerifier).validate(proof, method, url, options)
}

fn require_claims(raw: RawClaims) -> Result<ProofClaims> {
    let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());

    let mut missing = Vec::new();
    if !present(&raw.htm) {
        missing.push("htm");
    }
    if !present(&raw.htu) {
        missing.push("htu");
    }
    if !present(&raw.jti) {
        missing.push("jti");
    }
    if raw.iat.is_none() {
        missing.push("iat");
    }

    match (raw.htm, raw.htu, raw.jti, raw.iat) {
        (Some(htm), Some(htu), Some(jti), Some(iat)) if missing.is_empty() => Ok(ProofClaims {
            htm,
            htu,
            jti,
            iat,
            nonce: raw.nonce,
            ath: raw.ath,
        }),
        _ => {
            warn!(missing = ?missing, "DPoP proof missing claims");
            Err(DpopError::MissingClaims(missing))
        }
    }
}

fn check_type(c: &Candidate<'_>) -> Result<()> {
    match c.header.get("typ").and_then(|v| v.as_str()) {
        Some(DPOP_JWT_TYPE) => Ok(()),
        other => Err(DpopError::UnsupportedJwtType(other.map(str::to_string))),
    }
}

fn check_http_target(c: &Candidate<'_>) -> Result<()> {
    if c.claims.htm != c.method.as_str() {
        return Err(DpopError::IncorrectHttpTarget);
    }

    let expected = strip_query_and_fragment(c.url.clone());

    let mut claimed = Url::parse(&c.claims.htu).map_err(|_| DpopError::IncorrectHttpTarget)?;
    if c.options.htu_matching == HtuMatching::Lenient {
        claimed = strip_query_and_fragment(claimed);
    }

    if expected.as_str() != claimed.as_str() {
        return Err(DpopError::IncorrectHttpTarget);
    }
    Ok(())
}

fn strip_query_and_fragment(mut url: Url) -> Url {
    url.set_query(None);
    url.set_fragment(None);
    url
}

fn check_nonce(c: &Candidate<'_>) -> Result<()> {
    match c.options.expected_nonce() {
        Some(expected) if c.claims.nonce.as_deref() != Some(expected) => {
            Err(DpopError::IncorrectNonce)
        }
        _ => Ok(()),
    }
}

fn check_issued_at(c: &Candidate<'_>) -> Result<()> {
    // Freshness is the authorization server's job when the nonce is timestamped.
    if c.options.nonce_has_timestamp {
        return Ok(());
    }

    // A bound outside chrono's range leaves that side open.
    let oldest = c.now.checked_sub_signed(c.options.allowed_proof_age());
    if oldest.is_some_and(|oldest| c.claims.iat < oldest) {
        return Err(DpopError::Expired);
    }
    let latest = c.now.checked_add_signed(c.options.time_window());
    if latest.is_some_and(|latest| c.claims.iat > latest) {
        return Err(DpopError::Future);
    }
    Ok(())
}

fn check_jkt(c: &Candidate<'_>) -> Result<()> {
    match c.options.expected_jkt() {
        Some(expected) if expected != c.thumbprint => Err(DpopError::IncorrectJkt),
        _ => Ok(()),
    }
}

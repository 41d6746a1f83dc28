use std::{fmt, str::FromStr};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Deserializer};

use crate::jose::{JoseHeader, PublicKey};

pub const DEFAULT_ALLOWED_PROOF_AGE_SECONDS: i64 = 300;
pub const DEFAULT_TIME_WINDOW_SECONDS: i64 = 0;

/// HTTP methods a proof can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Trace,
    Connect,
}

impl HttpVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Trace => "TRACE",
            Self::Connect => "CONNECT",
        }
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown HTTP method: {0}")]
pub struct UnknownVerb(pub String);

/// Case-sensitive, like the `htm` comparison.
impl FromStr for HttpVerb {
    type Err = UnknownVerb;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            "PATCH" => Ok(Self::Patch),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            "TRACE" => Ok(Self::Trace),
            "CONNECT" => Ok(Self::Connect),
            other => Err(UnknownVerb(other.to_string())),
        }
    }
}

/// How the `htu` claim is compared with the request URL.
///
/// RFC 9449 only strips query and fragment from the request URL. `Lenient`
/// strips them from the claim too, so proofs from clients that put the full
/// request URL (query included) into `htu` are still accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HtuMatching {
    #[default]
    Lenient,
    Strict,
}

/// Per-call validation policy.
#[derive(Debug, Clone, Default)]
pub struct ValidationOptions {
    /// Nonce the server issued. `None` or empty: no nonce required.
    pub nonce: Option<String>,
    /// The nonce carries a server timestamp; the `iat` window is not checked.
    pub nonce_has_timestamp: bool,
    /// Allowed clock skew into the future. Default: none.
    pub time_window: Option<TimeDelta>,
    /// Maximum proof age. Default: 5 minutes.
    pub allowed_proof_age: Option<TimeDelta>,
    /// `dpop_jkt` sent on the authorization request. `None` or empty: not checked.
    pub jkt: Option<String>,
    pub htu_matching: HtuMatching,
}

impl ValidationOptions {
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    pub fn with_jkt(mut self, jkt: impl Into<String>) -> Self {
        self.jkt = Some(jkt.into());
        self
    }

    pub fn expected_nonce(&self) -> Option<&str> {
        self.nonce.as_deref().filter(|n| !n.is_empty())
    }

    pub fn expected_jkt(&self) -> Option<&str> {
        self.jkt.as_deref().filter(|j| !j.is_empty())
    }

    pub fn allowed_proof_age(&self) -> TimeDelta {
        self.allowed_proof_age
            .unwrap_or_else(|| TimeDelta::seconds(DEFAULT_ALLOWED_PROOF_AGE_SECONDS))
    }

    pub fn time_window(&self) -> TimeDelta {
        self.time_window
            .unwrap_or_else(|| TimeDelta::seconds(DEFAULT_TIME_WINDOW_SECONDS))
    }
}

/// Payload as received; every member may be absent.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawClaims {
    #[serde(default)]
    pub htm: Option<String>,
    #[serde(default)]
    pub htu: Option<String>,
    #[serde(default)]
    pub jti: Option<String>,
    #[serde(default, deserialize_with = "numeric_date")]
    pub iat: Option<DateTime<Utc>>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub ath: Option<String>,
}

/// Claims of a proof that passed the presence check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofClaims {
    pub htm: String,
    pub htu: String,
    pub jti: String,
    pub iat: DateTime<Utc>,
    pub nonce: Option<String>,
    pub ath: Option<String>,
}

/// Result of a successful validation.
#[derive(Debug, Clone)]
pub struct ValidatedProof {
    header: JoseHeader,
    claims: ProofClaims,
    public_key: PublicKey,
    hashed_public_key: String,
}

impl ValidatedProof {
    pub(crate) fn new(
        header: JoseHeader,
        claims: ProofClaims,
        public_key: PublicKey,
        hashed_public_key: String,
    ) -> Self {
        Self {
            header,
            claims,
            public_key,
            hashed_public_key,
        }
    }

    pub fn header(&self) -> &JoseHeader {
        &self.header
    }

    pub fn claims(&self) -> &ProofClaims {
        &self.claims
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// base64url SHA-256 JWK thumbprint of the proof key.
    pub fn hashed_public_key(&self) -> &str {
        &self.hashed_public_key
    }

    /// `jti`, for the caller's replay cache.
    pub fn id(&self) -> &str {
        &self.claims.jti
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.claims.iat
    }
}

/// NumericDate: integer or fractional seconds, kept to the microsecond.
fn numeric_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Numeric {
        Int(i64),
        Float(f64),
    }

    let value = Option::<Numeric>::deserialize(deserializer)?;
    let date = match value {
        None => return Ok(None),
        Some(Numeric::Int(secs)) => DateTime::from_timestamp(secs, 0),
        Some(Numeric::Float(secs)) if secs.is_finite() => {
            DateTime::from_timestamp_micros((secs * 1_000_000.0).round() as i64)
        }
        Some(Numeric::Float(_)) => None,
    };

    date.map(Some)
        .ok_or_else(|| serde::de::Error::custom("iat out of range"))
}

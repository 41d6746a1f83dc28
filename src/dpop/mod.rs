pub mod binding;
pub mod core;
pub mod types;

pub use self::binding::compute_ath;
pub use self::core::{DPOP_JWT_TYPE, ProofValidator, parse};
pub use self::types::{
    DEFAULT_ALLOWED_PROOF_AGE_SECONDS, DEFAULT_TIME_WINDOW_SECONDS, HtuMatching, HttpVerb,
    ProofClaims, UnknownVerb, ValidatedProof, ValidationOptions,
};

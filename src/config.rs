/*
 * Responsibility
 * - DPoP validation policy from environment variables (.env supported)
 * - value validation (invalid settings fail at startup, not per request)
 * - per-request values (nonce, dpop_jkt) are NOT configured here
 */
use std::fmt;

use chrono::TimeDelta;

use crate::dpop::types::{
    DEFAULT_ALLOWED_PROOF_AGE_SECONDS, DEFAULT_TIME_WINDOW_SECONDS, HtuMatching,
    ValidationOptions,
};

#[derive(Debug)]
pub enum ConfigError {
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DpopConfig {
    pub allowed_proof_age: TimeDelta,
    pub time_window: TimeDelta,
    pub nonce_has_timestamp: bool,
    pub htu_matching: HtuMatching,
}

impl Default for DpopConfig {
    fn default() -> Self {
        Self {
            allowed_proof_age: TimeDelta::seconds(DEFAULT_ALLOWED_PROOF_AGE_SECONDS),
            time_window: TimeDelta::seconds(DEFAULT_TIME_WINDOW_SECONDS),
            nonce_has_timestamp: false,
            htu_matching: HtuMatching::Lenient,
        }
    }
}

impl DpopConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let allowed_proof_age = read_seconds(
            &lookup,
            "DPOP_ALLOWED_PROOF_AGE_SECONDS",
            DEFAULT_ALLOWED_PROOF_AGE_SECONDS,
            1,
        )?;
        let time_window = read_seconds(
            &lookup,
            "DPOP_TIME_WINDOW_SECONDS",
            DEFAULT_TIME_WINDOW_SECONDS,
            0,
        )?;

        let nonce_has_timestamp = match lookup("DPOP_NONCE_HAS_TIMESTAMP")
            .map(|v| v.trim().to_ascii_lowercase())
            .as_deref()
        {
            None | Some("") | Some("false") | Some("0") => false,
            Some("true") | Some("1") => true,
            Some(_) => return Err(ConfigError::Invalid("DPOP_NONCE_HAS_TIMESTAMP")),
        };

        let htu_matching = match lookup("DPOP_HTU_MATCHING")
            .map(|v| v.trim().to_ascii_lowercase())
            .as_deref()
        {
            None | Some("") | Some("lenient") => HtuMatching::Lenient,
            Some("strict") => HtuMatching::Strict,
            Some(_) => return Err(ConfigError::Invalid("DPOP_HTU_MATCHING")),
        };

        Ok(Self {
            allowed_proof_age,
            time_window,
            nonce_has_timestamp,
            htu_matching,
        })
    }

    /// Options template; callers add the per-request nonce and `dpop_jkt`.
    pub fn validation_options(&self) -> ValidationOptions {
        ValidationOptions {
            nonce_has_timestamp: self.nonce_has_timestamp,
            time_window: Some(self.time_window),
            allowed_proof_age: Some(self.allowed_proof_age),
            htu_matching: self.htu_matching,
            ..Default::default()
        }
    }
}

/// Whole seconds, at least `min`, and small enough for `TimeDelta`.
fn read_seconds<F>(
    lookup: &F,
    key: &'static str,
    default: i64,
    min: i64,
) -> Result<TimeDelta, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let seconds = match lookup(key) {
        Some(v) => v
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|s| *s >= min)
            .ok_or(ConfigError::Invalid(key))?,
        None => default,
    };

    TimeDelta::try_seconds(seconds).ok_or(ConfigError::Invalid(key))
}

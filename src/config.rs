//! Typed configuration from environment variables.
//!
//! Loads once at startup and fails fast on malformed values. Nothing is
//! required; every variable has a default.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::lock::DEFAULT_LEASE;
use crate::lock::sweeper::interval_for_lease;
use crate::policy::TriagePolicy;

#[derive(Debug, Clone)]
pub struct Config {
    /// Review lock lease. `TRIAGE_LOCK_LEASE_SECS`.
    pub lock_lease: Duration,
    /// Sweep interval. `TRIAGE_SWEEP_INTERVAL_SECS`, default half the lease.
    pub sweep_interval: Duration,
    /// Optional TOML policy file. `TRIAGE_POLICY_PATH`.
    pub policy_path: Option<PathBuf>,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let lock_lease = secs_var("TRIAGE_LOCK_LEASE_SECS")?.unwrap_or(DEFAULT_LEASE);
        let sweep_interval =
            secs_var("TRIAGE_SWEEP_INTERVAL_SECS")?.unwrap_or_else(|| interval_for_lease(lock_lease));

        Ok(Self {
            lock_lease,
            sweep_interval,
            policy_path: std::env::var("TRIAGE_POLICY_PATH").ok().map(PathBuf::from),
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// The configured policy file, or the built-in defaults.
    pub fn load_policy(&self) -> Result<TriagePolicy> {
        match self.policy_path {
            Some(ref path) => TriagePolicy::load(path),
            None => Ok(TriagePolicy::default()),
        }
    }
}

fn secs_var(name: &str) -> Result<Option<Duration>> {
    let Ok(raw) = std::env::var(name) else {
        return Ok(None);
    };
    let secs: u64 = raw
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{name} must be a whole number of seconds, got {raw:?}")))?;
    if secs == 0 {
        return Err(Error::Config(format!("{name} must be at least 1")));
    }
    Ok(Some(Duration::from_secs(secs)))
}

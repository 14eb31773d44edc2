//! Core data types for domain verification.
//!
//! This module defines the main data structures used throughout the library:
//! persisted check and ban records, verdict codes, in-memory verification
//! results, and engine configuration.

use crate::error::GatherError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Verdict codes written to the `checks` table.
///
/// The set is closed; `200` and `404` are final, everything else marks an
/// attempted-but-unsettled row that stays eligible for future batches.
pub mod code {
    /// DNS resolved the name, or RDAP found the registration object.
    pub const TAKEN: u16 = 200;
    /// RDAP authoritatively reports the object does not exist.
    pub const AVAILABLE: u16 = 404;
    /// Malformed input rejected by the RDAP layer.
    pub const INVALID: u16 = 400;
    /// Client-side timeout before the query could run.
    pub const CLIENT_TIMEOUT: u16 = 408;
    /// Caller cancelled while the query was in flight.
    pub const CLIENT_CLOSED: u16 = 499;
    /// Upstream rate-limited the request.
    pub const RATE_LIMITED: u16 = 429;
    /// DNS probe failed with a non-NXDOMAIN error.
    pub const DNS_FAILURE: u16 = 500;
    /// The TLD has no RDAP service in the bootstrap registry.
    pub const BOOTSTRAP_UNSUPPORTED: u16 = 501;
    /// Upstream produced a wrong or server-side error response.
    pub const UPSTREAM_ERROR: u16 = 502;
    /// No working RDAP server / transient network failure.
    pub const NO_WORKING_SERVERS: u16 = 503;
    /// Upstream deadline exceeded.
    pub const UPSTREAM_TIMEOUT: u16 = 504;

    /// True when the code settles the row (no further batches pick it up).
    pub fn is_final(code: u16) -> bool {
        code == TAKEN || code == AVAILABLE
    }
}

/// One row of the `checks` table.
///
/// `code` and `checked_at` are `None` for rows that were enqueued but never
/// attempted.
#[derive(Debug, Clone, Serialize)]
pub struct CheckRecord {
    pub domain: String,
    pub code: Option<u16>,
    pub checked_at: Option<DateTime<Utc>>,
}

/// One row of the `banned` table.
#[derive(Debug, Clone, Serialize)]
pub struct BanRecord {
    pub domain: String,
    pub reason: String,
    pub banned_at: DateTime<Utc>,
}

/// Why a domain was banned from future batches.
///
/// Stored as its string form so external tooling keeps seeing the original
/// free-form reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanReason {
    /// The DNS resolver reported a transient failure (timeout or temporary).
    TemporaryDnsFailure,
    /// The per-domain deadline expired before a verdict was reached.
    Timeout,
}

impl BanReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TemporaryDnsFailure => "temporary DNS failure",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for BanReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of verifying one domain. In-memory only.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    /// The check record as it was (or would have been) persisted.
    pub checked: CheckRecord,
    /// Error encountered along the way, if any. A non-final persisted code
    /// and a populated error can coexist (e.g. banned-and-recorded paths).
    pub err: Option<GatherError>,
}

/// Configuration for the verify engine.
///
/// Defaults are tuned so a full retry sequence against the shared RDAP
/// limiter fits inside the per-domain deadline.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum RDAP attempts per domain.
    /// Default: 5
    pub max_attempts: u32,

    /// Number of concurrent verification workers.
    /// Default: 16
    pub max_parallel: usize,

    /// Per-domain deadline layered on the caller's context.
    ///
    /// Must exceed `max_attempts / rdap_rate` plus worst-case cumulative
    /// backoff, or a well-behaved retry sequence truncates itself.
    /// Default: 75 seconds
    pub domain_timeout: Duration,

    /// Token refill rate of the shared RDAP limiter, in tokens per second.
    /// Default: 0.1 (one request per 10 seconds)
    pub rdap_rate: f64,

    /// Burst capacity of the shared RDAP limiter.
    /// Default: 1
    pub rdap_burst: u32,

    /// Base delay of the full-jitter backoff.
    /// Default: 250 ms
    pub backoff_base: Duration,

    /// Cap on any single backoff delay.
    /// Default: 8 seconds
    pub backoff_cap: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            max_parallel: 16,
            domain_timeout: Duration::from_secs(75),
            rdap_rate: 0.1,
            rdap_burst: 1,
            backoff_base: Duration::from_millis(250),
            backoff_cap: Duration::from_secs(8),
        }
    }
}

impl EngineConfig {
    /// Set the maximum RDAP attempts per domain (at least 1).
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the worker pool size (clamped to 1..=100).
    pub fn with_max_parallel(mut self, parallel: usize) -> Self {
        self.max_parallel = parallel.clamp(1, 100);
        self
    }

    /// Set the per-domain deadline.
    pub fn with_domain_timeout(mut self, timeout: Duration) -> Self {
        self.domain_timeout = timeout;
        self
    }

    /// Set the shared RDAP limiter rate and burst.
    pub fn with_rdap_limit(mut self, rate_per_sec: f64, burst: u32) -> Self {
        self.rdap_rate = rate_per_sec;
        self.rdap_burst = burst.max(1);
        self
    }

    /// Set the backoff base and cap.
    pub fn with_backoff(mut self, base: Duration, cap: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_cap = cap;
        self
    }
}

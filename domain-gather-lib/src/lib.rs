//! # Domain Gather Library
//!
//! A library for discovering registrable short domain names by enumerating
//! candidates and verifying each one against two independent sources: DNS
//! resolution (fast, indicative) and RDAP (authoritative, rate-limited).
//!
//! Verdicts are persisted in SQLite so enumeration is resumable and
//! idempotent across crashes: re-running a batch only touches domains that
//! never reached a final verdict.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use domain_gather_lib::{
//!     Ctx, HickoryDnsProbe, RdapClient, Store, VerifyEngine,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Store::open("domains.sqlite")?;
//!     let engine = VerifyEngine::new(
//!         store.checks(),
//!         store.bans(),
//!         Arc::new(HickoryDnsProbe::new()),
//!         Arc::new(RdapClient::new("domain-gather/0.1")?),
//!     );
//!
//!     let result = engine.verify_one(&Ctx::background(), "example.com").await;
//!     println!("{}: {:?}", result.checked.domain, result.checked.code);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Two-stage verification**: DNS answers "taken" cheaply, RDAP confirms
//!   "available" authoritatively
//! - **Shared rate limiting**: one token bucket across all RDAP calls
//! - **Jittered retries**: full-jitter exponential backoff per attempt
//! - **Bounded concurrency**: fixed worker pool with cancellable jobs
//! - **Durable queue**: insert-if-absent enqueue over SQLite

// Re-export main public API types and functions
pub use backoff::FullJitter;
pub use candidates::{filter_candidates, generate_candidates, DEFAULT_MAX_LABEL_LEN};
pub use ctx::{CancellationToken, Ctx};
pub use error::{GatherError, RdapErrorKind};
pub use limiter::RdapLimiter;
pub use probes::{DnsOutcome, DnsProbe, HickoryDnsProbe, RdapClient, RdapProbe};
pub use store::{BanRepository, CheckRepository, Store};
pub use types::{
    code, BanReason, BanRecord, CheckRecord, EngineConfig, VerificationResult,
};
pub use useragent::AppMeta;

// Public modules
pub mod backoff;
pub mod candidates;
pub mod ctx;
pub mod engine;
pub mod error;
pub mod limiter;
pub mod probes;
pub mod store;
pub mod types;
pub mod useragent;

pub use engine::VerifyEngine;

// Type alias for convenience
pub type Result<T> = std::result::Result<T, GatherError>;

// Library version metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

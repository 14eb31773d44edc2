//! DNS resolution probe.
//!
//! Answers "does this name resolve?" with a trinary outcome. A positive
//! answer is trustworthy (the name is in use); a negative answer is not
//! sufficient to call a domain unregistered, so the engine follows up with
//! RDAP. Errors keep the resolver's timeout/temporary signaling intact for
//! the verify engine's ban decisions.

use crate::ctx::Ctx;
use crate::error::GatherError;
use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::TokioAsyncResolver;
use std::time::Duration;
use tracing::warn;

/// Outcome of a DNS probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnsOutcome {
    /// The name yields at least one host record.
    Resolves,
    /// The authoritative answer is "no such host".
    NotFound,
}

/// Pluggable DNS probe.
#[async_trait]
pub trait DnsProbe: Send + Sync {
    /// Probe `domain`, honoring the context's deadline and cancellation.
    async fn probe(&self, ctx: &Ctx, domain: &str) -> Result<DnsOutcome, GatherError>;
}

/// Default deadline applied when the caller supplies none.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// DNS probe backed by the host resolver configuration.
pub struct HickoryDnsProbe {
    resolver: TokioAsyncResolver,
    timeout: Duration,
}

impl HickoryDnsProbe {
    /// Create a probe using the system DNS configuration, falling back to
    /// the library defaults when it cannot be read.
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a probe with a custom internal deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        let resolver = match TokioAsyncResolver::tokio_from_system_conf() {
            Ok(resolver) => resolver,
            Err(e) => {
                warn!(error = %e, "failed to load system DNS configuration, using defaults");
                TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
            }
        };
        Self { resolver, timeout }
    }
}

impl Default for HickoryDnsProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DnsProbe for HickoryDnsProbe {
    async fn probe(&self, ctx: &Ctx, domain: &str) -> Result<DnsOutcome, GatherError> {
        let ctx = ctx.with_timeout(self.timeout);

        let lookup = match ctx.bound(self.resolver.lookup_ip(domain)).await {
            Ok(result) => result,
            // the probe's own deadline counts as a resolver timeout; caller
            // cancellation stays a cancellation
            Err(GatherError::DeadlineExceeded) => {
                return Err(GatherError::dns(domain, "lookup deadline exceeded", true, false));
            }
            Err(err) => return Err(err),
        };

        match lookup {
            Ok(addresses) => {
                if addresses.iter().next().is_some() {
                    Ok(DnsOutcome::Resolves)
                } else {
                    Ok(DnsOutcome::NotFound)
                }
            }
            Err(e) => match e.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => Ok(DnsOutcome::NotFound),
                ResolveErrorKind::Timeout => {
                    Err(GatherError::dns(domain, e.to_string(), true, false))
                }
                ResolveErrorKind::Io(_)
                | ResolveErrorKind::Proto(_)
                | ResolveErrorKind::NoConnections => {
                    Err(GatherError::dns(domain, e.to_string(), false, true))
                }
                _ => Err(GatherError::dns(domain, e.to_string(), false, false)),
            },
        }
    }
}

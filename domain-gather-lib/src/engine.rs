//! The verification engine.
//!
//! Composes the two probes into a final verdict per domain and persists it:
//!
//! 1. DNS answers the cheap positive case (a resolving name is taken).
//! 2. RDAP confirms the negative case, behind the shared rate limiter and a
//!    jittered retry loop.
//! 3. The verdict lands in the `checks` table; certain DNS failures also ban
//!    the domain from future batches.
//!
//! Batches run on a bounded worker pool with a per-batch shuffle so no single
//! RDAP server is hammered by lexicographic runs of similar labels.

use crate::backoff::FullJitter;
use crate::ctx::Ctx;
use crate::error::GatherError;
use crate::limiter::RdapLimiter;
use crate::probes::dns::{DnsOutcome, DnsProbe};
use crate::probes::rdap::RdapProbe;
use crate::store::{BanRepository, CheckRepository};
use crate::types::{code, BanReason, CheckRecord, EngineConfig, VerificationResult};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Orchestrates verification of candidate domains.
pub struct VerifyEngine {
    checks: CheckRepository,
    bans: BanRepository,
    dns: Arc<dyn DnsProbe>,
    rdap: Arc<dyn RdapProbe>,
    limiter: Arc<RdapLimiter>,
    config: EngineConfig,
}

impl VerifyEngine {
    /// Create an engine with the default configuration.
    pub fn new(
        checks: CheckRepository,
        bans: BanRepository,
        dns: Arc<dyn DnsProbe>,
        rdap: Arc<dyn RdapProbe>,
    ) -> Self {
        Self::with_config(checks, bans, dns, rdap, EngineConfig::default())
    }

    /// Create an engine with a custom configuration.
    ///
    /// The RDAP limiter is instantiated here, once, and shared by every
    /// worker this engine spawns.
    pub fn with_config(
        checks: CheckRepository,
        bans: BanRepository,
        dns: Arc<dyn DnsProbe>,
        rdap: Arc<dyn RdapProbe>,
        config: EngineConfig,
    ) -> Self {
        let limiter = Arc::new(RdapLimiter::new(config.rdap_rate, config.rdap_burst));
        Self {
            checks,
            bans,
            dns,
            rdap,
            limiter,
            config,
        }
    }

    /// The engine's configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Verify a single domain with a fresh backoff strategy.
    pub async fn verify_one(&self, ctx: &Ctx, domain: &str) -> VerificationResult {
        let backoff = FullJitter::new(self.config.backoff_base, self.config.backoff_cap, 0);
        self.verify_one_raw(ctx, backoff, domain).await
    }

    /// Verify a single domain using the supplied backoff strategy.
    ///
    /// Repeating this for the same domain is safe: the last write wins.
    pub async fn verify_one_raw(
        &self,
        ctx: &Ctx,
        mut backoff: FullJitter,
        domain: &str,
    ) -> VerificationResult {
        let t = Utc::now();

        // per-domain deadline layered on the caller's context. Must exceed
        // max_attempts / rdap_rate plus cumulative backoff, or a well-behaved
        // retry sequence is truncated by its own wrapper.
        let ctx = ctx.with_timeout(self.config.domain_timeout);

        let (verdict, err) = self.check_domain(&ctx, &mut backoff, domain).await;
        let checked = CheckRecord {
            domain: domain.to_string(),
            code: Some(verdict),
            checked_at: Some(t),
        };

        if let Some(e) = &err {
            match e {
                GatherError::Dns {
                    not_found: true, ..
                } => {
                    // availability was already RDAP-confirmed by the
                    // classifier; nothing extra to do
                }
                GatherError::Dns {
                    timeout, temporary, ..
                } if *timeout || *temporary => {
                    // transient resolver issue: ban (defer) and still record
                    // the attempt below
                    if let Err(ban_err) =
                        self.bans.ban(domain, BanReason::TemporaryDnsFailure, t)
                    {
                        warn!(name = %domain, error = %ban_err, "failed to ban domain");
                    }
                }
                GatherError::DeadlineExceeded => {
                    if let Err(ban_err) = self.bans.ban(domain, BanReason::Timeout, t) {
                        warn!(name = %domain, error = %ban_err, "failed to ban domain");
                    }
                }
                _ => {
                    warn!(name = %domain, error = %e, "check failed with unexpected error");
                    return VerificationResult { checked, err };
                }
            }
        }

        if let Err(save_err) = self.checks.save(domain, verdict, t) {
            error!(name = %domain, error = %save_err, "failed to save domain check");
            return VerificationResult {
                checked,
                err: Some(save_err),
            };
        }

        VerificationResult { checked, err }
    }

    /// Verify a batch of domains on the worker pool.
    ///
    /// `domains` is shuffled in place; the returned results align
    /// positionally with the shuffled order. Cancellation never drops a
    /// slot: affected jobs complete with a cancellation error.
    pub async fn verify_batch(&self, ctx: &Ctx, domains: &mut [String]) -> Vec<VerificationResult> {
        let mut rng = StdRng::from_entropy();
        domains.shuffle(&mut rng);

        let total = domains.len();
        let jobs: Vec<(usize, String)> = domains.iter().cloned().enumerate().collect();

        let mut indexed: Vec<(usize, VerificationResult)> = stream::iter(jobs)
            .map(|(i, domain)| {
                // salt magnified so per-job RNG sequences stay distinct
                let backoff = FullJitter::new(
                    self.config.backoff_base,
                    self.config.backoff_cap,
                    (i as u64).wrapping_mul(10_000),
                );
                async move {
                    info!(i = i + 1, n = total, name = %domain, "verifying");
                    let result = self.verify_one_raw(ctx, backoff, &domain).await;
                    if let Some(verdict) = result.checked.code {
                        info!(name = %domain, code = verdict, "verified");
                    }
                    (i, result)
                }
            })
            .buffer_unordered(self.config.max_parallel)
            .collect()
            .await;

        indexed.sort_by_key(|(i, _)| *i);
        indexed.into_iter().map(|(_, result)| result).collect()
    }

    /// Fuse the probes into a verdict: trust DNS for "taken", require RDAP
    /// confirmation for "available".
    ///
    /// Absence of DNS records does not imply the domain is unregistered
    /// (parked names, missing host records), hence the RDAP double-check.
    async fn check_domain(
        &self,
        ctx: &Ctx,
        backoff: &mut FullJitter,
        domain: &str,
    ) -> (u16, Option<GatherError>) {
        match self.dns.probe(ctx, domain).await {
            Ok(DnsOutcome::Resolves) => (code::TAKEN, None),
            Ok(DnsOutcome::NotFound) => self.rdap_with_retry(ctx, backoff, domain).await,
            Err(e) => (code::DNS_FAILURE, Some(e)),
        }
    }

    /// Drive the RDAP probe through the shared limiter with bounded,
    /// jitter-backed retries.
    async fn rdap_with_retry(
        &self,
        ctx: &Ctx,
        backoff: &mut FullJitter,
        domain: &str,
    ) -> (u16, Option<GatherError>) {
        let mut last: (u16, Option<GatherError>) = (0, None);

        for attempt in 0..self.config.max_attempts {
            // reserve a token and check the projected wait against the
            // deadline before committing to it
            let reservation = self.limiter.reserve();
            let delay = reservation.delay();
            if let Some(deadline) = ctx.deadline() {
                if tokio::time::Instant::now() + delay > deadline {
                    reservation.cancel();
                    return (code::CLIENT_TIMEOUT, Some(GatherError::DeadlineExceeded));
                }
            }

            // wait for the token or for the context to finish
            if let Err(ctx_err) = ctx.sleep(delay).await {
                reservation.cancel();
                return (code::CLIENT_TIMEOUT, Some(ctx_err));
            }
            // the token is consumed from here on

            let (verdict, err) = self.rdap.query(ctx, domain).await;
            let retry = should_retry_rdap(verdict, err.as_ref());
            last = (verdict, err);
            if !retry {
                return last;
            }

            warn!(
                name = %domain,
                attempt = attempt + 1,
                code = last.0,
                "rdap check failed, will retry"
            );

            // jittered delay exponentially scaled by failed attempts;
            // attempt 0 still waits a little to avoid stampedes
            if let Err(ctx_err) = ctx.sleep(backoff.next(attempt)).await {
                return (last.0, Some(ctx_err));
            }
        }

        warn!(
            name = %domain,
            attempts = self.config.max_attempts,
            last_code = last.0,
            "rdap retries exhausted"
        );
        last
    }
}

/// Whether an RDAP outcome is worth another attempt.
fn should_retry_rdap(verdict: u16, err: Option<&GatherError>) -> bool {
    // 429 is rate limiting, 502/503/504 are upstream or transient conditions
    if matches!(verdict, 429 | 502 | 503 | 504) {
        return true;
    }

    match err {
        // respect the caller's context: don't keep retrying locally
        Some(e) if e.is_cancellation() => false,
        // transport layer hiccups (lookup timeout, reset) are retryable
        Some(e) if e.is_transient_network() => true,
        // transport error without a code is retryable
        Some(_) if verdict == 0 => true,
        _ => false,
    }
}

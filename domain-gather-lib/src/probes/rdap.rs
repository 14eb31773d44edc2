//! RDAP (Registration Data Access Protocol) probe.
//!
//! Queries the authoritative registry for a domain's registration object and
//! normalizes the outcome to a verdict code plus a typed error. RDAP is
//! preferred over DNS for the negative direction because it answers from the
//! registry itself, but it is slower and rate-limited, so the engine wraps
//! this probe in the shared limiter and retry controller.

use crate::ctx::Ctx;
use crate::error::{GatherError, RdapErrorKind};
use crate::probes::registry;
use crate::types::code;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Pluggable RDAP probe.
///
/// Returns `(code, err)` where `code` is one of the verdict codes and `err`
/// is absent for the two conclusive answers (taken / available).
#[async_trait]
pub trait RdapProbe: Send + Sync {
    async fn query(&self, ctx: &Ctx, domain: &str) -> (u16, Option<GatherError>);
}

/// Default deadline applied when the caller supplies none.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// RDAP client for domain registration lookups.
pub struct RdapClient {
    http: reqwest::Client,
    timeout: Duration,
    cache_dir: Option<PathBuf>,
}

impl RdapClient {
    /// Create a client sending the given User-Agent, with the default
    /// timeout and bootstrap cache location (`~/.domain-gather`).
    pub fn new(user_agent: &str) -> Result<Self, GatherError> {
        Self::with_config(user_agent, DEFAULT_TIMEOUT, default_cache_dir())
    }

    /// Create a client with a custom timeout and bootstrap cache directory.
    pub fn with_config(
        user_agent: &str,
        timeout: Duration,
        cache_dir: Option<PathBuf>,
    ) -> Result<Self, GatherError> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            // buffer over the logical deadline so the context, not the
            // transport, decides when to give up
            .timeout(timeout + Duration::from_secs(2))
            .build()
            .map_err(|e| {
                GatherError::network_with_source(
                    "Failed to create RDAP HTTP client",
                    false,
                    e.to_string(),
                )
            })?;

        Ok(Self {
            http,
            timeout,
            cache_dir,
        })
    }

    async fn query_inner(&self, ctx: &Ctx, domain: &str) -> (u16, Option<GatherError>) {
        let Some(tld) = extract_tld(domain) else {
            return (
                code::INVALID,
                Some(GatherError::rdap(
                    domain,
                    RdapErrorKind::InputError,
                    "domain has no TLD",
                )),
            );
        };

        let endpoint =
            match registry::rdap_endpoint(&self.http, ctx, tld, self.cache_dir.as_deref()).await {
                Ok(endpoint) => endpoint,
                Err(err) => return (classify_error(&err), Some(err)),
            };

        let url = format!("{}{}", endpoint, domain);
        debug!(domain, url = %url, "rdap query");

        let response = match ctx.bound(self.http.get(&url).send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                let err = GatherError::from(e);
                return (classify_error(&err), Some(err));
            }
            Err(err) => return (classify_error(&err), Some(err)),
        };

        match response.status() {
            StatusCode::OK => match ctx.bound(response.json::<serde_json::Value>()).await {
                Ok(Ok(body)) => {
                    if body.get("objectClassName").and_then(|v| v.as_str()) == Some("domain") {
                        (code::TAKEN, None)
                    } else {
                        (
                            code::UPSTREAM_ERROR,
                            Some(GatherError::rdap(
                                domain,
                                RdapErrorKind::WrongResponseType,
                                "response is not an RDAP domain object",
                            )),
                        )
                    }
                }
                Ok(Err(e)) => (
                    code::UPSTREAM_ERROR,
                    Some(GatherError::rdap(
                        domain,
                        RdapErrorKind::WrongResponseType,
                        format!("failed to parse RDAP response: {}", e),
                    )),
                ),
                Err(err) => (classify_error(&err), Some(err)),
            },
            StatusCode::NOT_FOUND => (code::AVAILABLE, None),
            StatusCode::BAD_REQUEST => (
                code::INVALID,
                Some(GatherError::rdap(
                    domain,
                    RdapErrorKind::InputError,
                    "RDAP server rejected the query input",
                )),
            ),
            StatusCode::TOO_MANY_REQUESTS => (
                code::RATE_LIMITED,
                Some(GatherError::rdap(
                    domain,
                    RdapErrorKind::RdapServerError,
                    "RDAP server rate limited the request",
                )),
            ),
            status => (
                code::UPSTREAM_ERROR,
                Some(GatherError::rdap(
                    domain,
                    RdapErrorKind::RdapServerError,
                    format!("RDAP server returned HTTP {}", status),
                )),
            ),
        }
    }
}

#[async_trait]
impl RdapProbe for RdapClient {
    async fn query(&self, ctx: &Ctx, domain: &str) -> (u16, Option<GatherError>) {
        let ctx = ctx.with_timeout(self.timeout);
        self.query_inner(&ctx, domain).await
    }
}

/// Map a typed error to its verdict code.
///
/// The precedence is: RDAP kinds, then context classification, then network
/// classification, then "the upstream did something wrong".
fn classify_error(err: &GatherError) -> u16 {
    if let Some(kind) = err.rdap_kind() {
        return match kind {
            RdapErrorKind::ObjectDoesNotExist => code::AVAILABLE,
            RdapErrorKind::InputError => code::INVALID,
            RdapErrorKind::BootstrapNotSupported => code::BOOTSTRAP_UNSUPPORTED,
            RdapErrorKind::BootstrapNoMatch
            | RdapErrorKind::WrongResponseType
            | RdapErrorKind::RdapServerError => code::UPSTREAM_ERROR,
            RdapErrorKind::NoWorkingServers => code::NO_WORKING_SERVERS,
        };
    }

    // context classification first so a deadline is not masked by the
    // transport error it caused
    match err {
        GatherError::DeadlineExceeded => code::UPSTREAM_TIMEOUT,
        GatherError::Cancelled => code::CLIENT_CLOSED,
        GatherError::Network { timeout: true, .. } => code::UPSTREAM_TIMEOUT,
        GatherError::Network { .. } => code::NO_WORKING_SERVERS,
        _ => code::UPSTREAM_ERROR,
    }
}

/// The final label of a domain name, if it has one.
fn extract_tld(domain: &str) -> Option<&str> {
    let tld = domain.rsplit('.').next()?;
    if tld.is_empty() || tld == domain {
        return None;
    }
    Some(tld)
}

fn default_cache_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".domain-gather"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_tld() {
        assert_eq!(extract_tld("example.com"), Some("com"));
        assert_eq!(extract_tld("a.b.co.uk"), Some("uk"));
        assert_eq!(extract_tld("nodots"), None);
        assert_eq!(extract_tld("trailing."), None);
    }

    #[test]
    fn test_classify_rdap_kinds() {
        let cases = [
            (RdapErrorKind::ObjectDoesNotExist, code::AVAILABLE),
            (RdapErrorKind::InputError, code::INVALID),
            (RdapErrorKind::BootstrapNotSupported, code::BOOTSTRAP_UNSUPPORTED),
            (RdapErrorKind::BootstrapNoMatch, code::UPSTREAM_ERROR),
            (RdapErrorKind::WrongResponseType, code::UPSTREAM_ERROR),
            (RdapErrorKind::RdapServerError, code::UPSTREAM_ERROR),
            (RdapErrorKind::NoWorkingServers, code::NO_WORKING_SERVERS),
        ];
        for (kind, expected) in cases {
            let err = GatherError::rdap("a.net", kind, "x");
            assert_eq!(classify_error(&err), expected, "{:?}", kind);
        }
    }

    #[test]
    fn test_classify_context_and_network() {
        assert_eq!(classify_error(&GatherError::DeadlineExceeded), code::UPSTREAM_TIMEOUT);
        assert_eq!(classify_error(&GatherError::Cancelled), code::CLIENT_CLOSED);
        assert_eq!(
            classify_error(&GatherError::network("slow", true)),
            code::UPSTREAM_TIMEOUT
        );
        assert_eq!(
            classify_error(&GatherError::network("reset", false)),
            code::NO_WORKING_SERVERS
        );
        assert_eq!(
            classify_error(&GatherError::internal("weird")),
            code::UPSTREAM_ERROR
        );
    }

    #[tokio::test]
    async fn test_client_creation() {
        let client = RdapClient::new("domain-gather-test/0");
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_query_rejects_tldless_input() {
        let client = RdapClient::new("domain-gather-test/0").unwrap();
        let ctx = Ctx::background();
        let (status, err) = client.query(&ctx, "nodots").await;
        assert_eq!(status, code::INVALID);
        assert_eq!(err.unwrap().rdap_kind(), Some(RdapErrorKind::InputError));
    }
}

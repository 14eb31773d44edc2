//! RDAP registry mappings and IANA bootstrap discovery.
//!
//! This module maps TLDs to their RDAP service endpoints: a built-in table
//! covers the common registries, and the IANA bootstrap registry fills in the
//! rest. The bootstrap document is cached both in-process and on disk so
//! repeated runs do not re-download the authoritative mapping.

use crate::ctx::Ctx;
use crate::error::{GatherError, RdapErrorKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// The IANA bootstrap registry for the DNS namespace.
pub const IANA_BOOTSTRAP_URL: &str = "https://data.iana.org/rdap/dns.json";

/// Bootstrap cache TTL: 24 hours (RDAP endpoints rarely change)
const BOOTSTRAP_TTL: Duration = Duration::from_secs(24 * 3600);

/// File name of the on-disk bootstrap cache inside the cache directory.
const DISK_CACHE_FILE: &str = "bootstrap.json";

/// In-process bootstrap cache.
struct BootstrapCache {
    /// TLD -> RDAP endpoint base ending in `/domain/`
    endpoints: HashMap<String, String>,
    /// TLDs known to have no RDAP service (negative cache)
    no_rdap: HashSet<String>,
    /// Whether the full IANA bootstrap has been loaded
    loaded: bool,
    /// When the bootstrap was last loaded
    last_fetch: Option<Instant>,
}

impl BootstrapCache {
    fn new() -> Self {
        Self {
            endpoints: HashMap::new(),
            no_rdap: HashSet::new(),
            loaded: false,
            last_fetch: None,
        }
    }

    fn is_fresh(&self) -> bool {
        self.loaded
            && match self.last_fetch {
                Some(t) => t.elapsed() <= BOOTSTRAP_TTL,
                None => false,
            }
    }

    fn install(&mut self, endpoints: HashMap<String, String>) {
        self.endpoints = endpoints;
        self.no_rdap.clear();
        self.loaded = true;
        self.last_fetch = Some(Instant::now());
    }
}

lazy_static::lazy_static! {
    static ref BOOTSTRAP_CACHE: Mutex<BootstrapCache> = Mutex::new(BootstrapCache::new());
}

/// On-disk form of the bootstrap cache.
#[derive(Debug, Serialize, Deserialize)]
struct DiskCache {
    fetched_at: DateTime<Utc>,
    endpoints: HashMap<String, String>,
}

/// Get the built-in RDAP registry mappings.
///
/// Known registry endpoints for the common TLDs; anything else goes through
/// the IANA bootstrap.
pub fn builtin_rdap_map() -> HashMap<&'static str, &'static str> {
    HashMap::from([
        // Verisign gTLDs
        ("com", "https://rdap.verisign.com/com/v1/domain/"),
        ("net", "https://rdap.verisign.com/net/v1/domain/"),
        (
            "org",
            "https://rdap.publicinterestregistry.org/rdap/domain/",
        ),
        ("info", "https://rdap.identitydigital.services/rdap/domain/"),
        ("biz", "https://rdap.nic.biz/domain/"),
        // Google registry
        ("app", "https://pubapi.registry.google/rdap/domain/"),
        ("dev", "https://pubapi.registry.google/rdap/domain/"),
        ("page", "https://pubapi.registry.google/rdap/domain/"),
        // CentralNic managed gTLDs
        ("xyz", "https://rdap.centralnic.com/xyz/domain/"),
        ("tech", "https://rdap.centralnic.com/tech/domain/"),
        ("online", "https://rdap.centralnic.com/online/domain/"),
        ("site", "https://rdap.centralnic.com/site/domain/"),
        // Identity Digital managed TLDs
        ("ai", "https://rdap.identitydigital.services/rdap/domain/"),
        ("io", "https://rdap.identitydigital.services/rdap/domain/"),
        ("me", "https://rdap.identitydigital.services/rdap/domain/"),
        // Verisign managed ccTLDs
        ("tv", "https://rdap.nic.tv/domain/"),
        ("cc", "https://tld-rdap.verisign.com/cc/v1/domain/"),
        // ccTLDs with working RDAP endpoints
        ("us", "https://rdap.nic.us/domain/"),
        ("uk", "https://rdap.nominet.uk/domain/"),
        ("de", "https://rdap.denic.de/domain/"),
        ("fr", "https://rdap.nic.fr/domain/"),
        ("nl", "https://rdap.sidn.nl/domain/"),
    ])
}

/// Resolve the RDAP endpoint base URL (ending in `/domain/`) for a TLD.
///
/// Lookup order: built-in table, in-process bootstrap cache, on-disk cache,
/// then a fresh IANA fetch. A TLD absent from a fresh bootstrap document is
/// negative-cached and reported as `BootstrapNotSupported`.
pub async fn rdap_endpoint(
    http: &reqwest::Client,
    ctx: &Ctx,
    tld: &str,
    cache_dir: Option<&Path>,
) -> Result<String, GatherError> {
    let tld = tld.to_ascii_lowercase();

    if let Some(endpoint) = builtin_rdap_map().get(tld.as_str()) {
        return Ok((*endpoint).to_string());
    }

    if let Some(result) = cached_lookup(&tld) {
        return result;
    }

    // cache is cold or stale: disk first, then the network
    let endpoints = match load_disk_cache(cache_dir) {
        Some(endpoints) => endpoints,
        None => {
            let endpoints = fetch_bootstrap(http, ctx).await?;
            write_disk_cache(cache_dir, &endpoints);
            endpoints
        }
    };

    {
        let mut cache = lock_cache();
        cache.install(endpoints);
    }

    cached_lookup(&tld).unwrap_or_else(|| {
        Err(GatherError::rdap(
            tld.clone(),
            RdapErrorKind::BootstrapNoMatch,
            "bootstrap lookup produced no endpoint",
        ))
    })
}

/// Look the TLD up in the in-process cache, if the cache can answer.
fn cached_lookup(tld: &str) -> Option<Result<String, GatherError>> {
    let mut cache = lock_cache();
    // negative answers outlive freshness; a refetch clears them
    if cache.no_rdap.contains(tld) {
        return Some(Err(GatherError::rdap(
            tld,
            RdapErrorKind::BootstrapNotSupported,
            "TLD has no RDAP service in the IANA bootstrap registry",
        )));
    }
    if !cache.is_fresh() {
        return None;
    }
    if let Some(endpoint) = cache.endpoints.get(tld) {
        return Some(Ok(endpoint.clone()));
    }
    cache.no_rdap.insert(tld.to_string());
    Some(Err(GatherError::rdap(
        tld,
        RdapErrorKind::BootstrapNotSupported,
        "TLD has no RDAP service in the IANA bootstrap registry",
    )))
}

fn lock_cache() -> std::sync::MutexGuard<'static, BootstrapCache> {
    BOOTSTRAP_CACHE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Fetch and parse the IANA bootstrap document.
async fn fetch_bootstrap(
    http: &reqwest::Client,
    ctx: &Ctx,
) -> Result<HashMap<String, String>, GatherError> {
    debug!(url = IANA_BOOTSTRAP_URL, "fetching IANA bootstrap registry");

    let response = ctx
        .bound(http.get(IANA_BOOTSTRAP_URL).send())
        .await?
        .map_err(GatherError::from)?;

    if !response.status().is_success() {
        return Err(GatherError::rdap(
            "",
            RdapErrorKind::NoWorkingServers,
            format!("IANA bootstrap returned HTTP {}", response.status()),
        ));
    }

    let body: BootstrapDocument = ctx
        .bound(response.json())
        .await?
        .map_err(GatherError::from)?;

    Ok(parse_bootstrap(&body))
}

/// Wire format of the IANA bootstrap document.
#[derive(Debug, Deserialize)]
struct BootstrapDocument {
    services: Vec<(Vec<String>, Vec<String>)>,
}

/// Flatten a bootstrap document into a TLD -> endpoint map.
///
/// Prefers HTTPS service URLs; entries without any URL are skipped.
fn parse_bootstrap(document: &BootstrapDocument) -> HashMap<String, String> {
    let mut endpoints = HashMap::new();
    for (tlds, urls) in &document.services {
        let url = urls
            .iter()
            .find(|u| u.starts_with("https://"))
            .or_else(|| urls.first());
        let Some(url) = url else { continue };
        let base = normalize_service_url(url);
        for tld in tlds {
            endpoints.insert(tld.to_ascii_lowercase(), base.clone());
        }
    }
    endpoints
}

/// Turn a bootstrap service URL into a domain-query base ending in `/domain/`.
fn normalize_service_url(url: &str) -> String {
    if url.ends_with('/') {
        format!("{}domain/", url)
    } else {
        format!("{}/domain/", url)
    }
}

fn disk_cache_path(cache_dir: Option<&Path>) -> Option<PathBuf> {
    cache_dir.map(|dir| dir.join(DISK_CACHE_FILE))
}

/// Load the on-disk cache if present and fresh.
fn load_disk_cache(cache_dir: Option<&Path>) -> Option<HashMap<String, String>> {
    let path = disk_cache_path(cache_dir)?;
    let content = std::fs::read_to_string(&path).ok()?;
    let cache: DiskCache = match serde_json::from_str(&content) {
        Ok(cache) => cache,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable bootstrap cache");
            return None;
        }
    };

    let age = Utc::now().signed_duration_since(cache.fetched_at);
    if age.to_std().map_or(true, |age| age > BOOTSTRAP_TTL) {
        debug!(path = %path.display(), "bootstrap disk cache is stale");
        return None;
    }

    debug!(path = %path.display(), entries = cache.endpoints.len(), "loaded bootstrap disk cache");
    Some(cache.endpoints)
}

/// Persist the bootstrap mapping. Failures only cost a re-download later.
fn write_disk_cache(cache_dir: Option<&Path>, endpoints: &HashMap<String, String>) {
    let Some(path) = disk_cache_path(cache_dir) else {
        return;
    };
    let cache = DiskCache {
        fetched_at: Utc::now(),
        endpoints: endpoints.clone(),
    };
    let result = path
        .parent()
        .map_or(Ok(()), std::fs::create_dir_all)
        .and_then(|_| std::fs::write(&path, serde_json::to_string(&cache).unwrap_or_default()));
    if let Err(e) = result {
        warn!(path = %path.display(), error = %e, "failed to write bootstrap cache");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_map_covers_common_tlds() {
        let map = builtin_rdap_map();
        assert!(map.contains_key("com"));
        assert!(map.contains_key("net"));
        assert!(map.contains_key("org"));
        for endpoint in map.values() {
            assert!(endpoint.ends_with("/domain/"), "bad endpoint {}", endpoint);
        }
    }

    #[test]
    fn test_normalize_service_url() {
        assert_eq!(
            normalize_service_url("https://rdap.example.org/"),
            "https://rdap.example.org/domain/"
        );
        assert_eq!(
            normalize_service_url("https://rdap.example.org"),
            "https://rdap.example.org/domain/"
        );
    }

    #[test]
    fn test_parse_bootstrap_prefers_https() {
        let document = BootstrapDocument {
            services: vec![
                (
                    vec!["foo".to_string(), "BAR".to_string()],
                    vec![
                        "http://insecure.example/".to_string(),
                        "https://rdap.example/".to_string(),
                    ],
                ),
                (vec!["empty".to_string()], vec![]),
            ],
        };

        let endpoints = parse_bootstrap(&document);
        assert_eq!(
            endpoints.get("foo"),
            Some(&"https://rdap.example/domain/".to_string())
        );
        assert_eq!(
            endpoints.get("bar"),
            Some(&"https://rdap.example/domain/".to_string())
        );
        assert!(!endpoints.contains_key("empty"));
    }

    #[test]
    fn test_bootstrap_document_wire_format() {
        let body = r#"{
            "description": "RDAP bootstrap file for Domain Name System registrations",
            "version": "1.0",
            "services": [
                [["museum"], ["https://rdap.nic.museum/"]]
            ]
        }"#;
        let document: BootstrapDocument = serde_json::from_str(body).unwrap();
        let endpoints = parse_bootstrap(&document);
        assert_eq!(
            endpoints.get("museum"),
            Some(&"https://rdap.nic.museum/domain/".to_string())
        );
    }

    #[test]
    fn test_disk_cache_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut endpoints = HashMap::new();
        endpoints.insert("museum".to_string(), "https://rdap.nic.museum/domain/".to_string());

        write_disk_cache(Some(dir.path()), &endpoints);
        let loaded = load_disk_cache(Some(dir.path())).unwrap();
        assert_eq!(loaded, endpoints);
    }

    #[test]
    fn test_stale_disk_cache_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache {
            fetched_at: Utc::now() - chrono::Duration::days(2),
            endpoints: HashMap::new(),
        };
        let path = dir.path().join(DISK_CACHE_FILE);
        std::fs::write(&path, serde_json::to_string(&cache).unwrap()).unwrap();

        assert!(load_disk_cache(Some(dir.path())).is_none());
    }
}

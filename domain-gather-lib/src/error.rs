//! Error handling for domain verification operations.
//!
//! This module defines a comprehensive error type that covers all the different
//! ways verification can fail, from DNS and RDAP lookups to persistence.
//! Classification data (timeout/temporary flags, RDAP error kinds) is carried
//! directly on the variants so retry decisions never inspect message strings.

use std::fmt;

/// Typed classification of RDAP-layer failures.
///
/// Mirrors the failure modes an RDAP query can hit between bootstrap
/// discovery and response parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RdapErrorKind {
    /// Malformed query input (HTTP 400 from the server).
    InputError,

    /// The server authoritatively reports the object does not exist.
    ObjectDoesNotExist,

    /// The TLD has no RDAP service in the IANA bootstrap registry.
    BootstrapNotSupported,

    /// Bootstrap data was fetched but yielded no usable service URL.
    BootstrapNoMatch,

    /// The server answered with something that is not an RDAP domain object.
    WrongResponseType,

    /// The server returned a server-side error response.
    RdapServerError,

    /// No RDAP server could be reached for the query.
    NoWorkingServers,
}

impl fmt::Display for RdapErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InputError => "input error",
            Self::ObjectDoesNotExist => "object does not exist",
            Self::BootstrapNotSupported => "bootstrap not supported",
            Self::BootstrapNoMatch => "bootstrap no match",
            Self::WrongResponseType => "wrong response type",
            Self::RdapServerError => "RDAP server error",
            Self::NoWorkingServers => "no working servers",
        };
        write!(f, "{}", s)
    }
}

/// Main error type for domain verification operations.
#[derive(Debug, Clone)]
pub enum GatherError {
    /// Invalid domain name format
    InvalidDomain { domain: String, reason: String },

    /// DNS resolution failed.
    ///
    /// The `timeout` and `temporary` flags preserve the resolver's own
    /// signaling so the verify engine can distinguish transient resolver
    /// trouble from hard failures. `not_found` marks an NXDOMAIN-equivalent
    /// answer that leaked through as an error.
    Dns {
        domain: String,
        message: String,
        not_found: bool,
        timeout: bool,
        temporary: bool,
    },

    /// RDAP protocol failure with its typed kind.
    Rdap {
        domain: String,
        kind: RdapErrorKind,
        message: String,
    },

    /// Transport-level failure (connect, reset, TLS, HTTP timeout).
    Network {
        message: String,
        timeout: bool,
        source: Option<String>,
    },

    /// The caller's cancellation signal fired.
    Cancelled,

    /// The caller's deadline expired.
    DeadlineExceeded,

    /// Persistence layer failure.
    Storage {
        message: String,
        source: Option<String>,
    },

    /// File I/O failure (bootstrap cache, output files).
    File { path: String, message: String },

    /// Generic internal errors that don't fit other categories
    Internal { message: String },
}

impl GatherError {
    /// Create a new invalid domain error.
    pub fn invalid_domain<D: Into<String>, R: Into<String>>(domain: D, reason: R) -> Self {
        Self::InvalidDomain {
            domain: domain.into(),
            reason: reason.into(),
        }
    }

    /// Create a DNS error carrying the resolver's classification flags.
    pub fn dns<D: Into<String>, M: Into<String>>(
        domain: D,
        message: M,
        timeout: bool,
        temporary: bool,
    ) -> Self {
        Self::Dns {
            domain: domain.into(),
            message: message.into(),
            not_found: false,
            timeout,
            temporary,
        }
    }

    /// Create a DNS error for an NXDOMAIN answer that surfaced as an error.
    pub fn dns_not_found<D: Into<String>>(domain: D) -> Self {
        Self::Dns {
            domain: domain.into(),
            message: "no such host".to_string(),
            not_found: true,
            timeout: false,
            temporary: false,
        }
    }

    /// Create an RDAP error of the given kind.
    pub fn rdap<D: Into<String>, M: Into<String>>(
        domain: D,
        kind: RdapErrorKind,
        message: M,
    ) -> Self {
        Self::Rdap {
            domain: domain.into(),
            kind,
            message: message.into(),
        }
    }

    /// Create a network error.
    pub fn network<M: Into<String>>(message: M, timeout: bool) -> Self {
        Self::Network {
            message: message.into(),
            timeout,
            source: None,
        }
    }

    /// Create a network error with source information.
    pub fn network_with_source<M: Into<String>, S: Into<String>>(
        message: M,
        timeout: bool,
        source: S,
    ) -> Self {
        Self::Network {
            message: message.into(),
            timeout,
            source: Some(source.into()),
        }
    }

    /// Create a storage error.
    pub fn storage<M: Into<String>>(message: M) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Create a storage error with source information.
    pub fn storage_with_source<M: Into<String>, S: Into<String>>(message: M, source: S) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a file error.
    pub fn file<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::File {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// True when the error is a cancellation or deadline signal.
    ///
    /// These are never retried locally: the caller asked us to stop.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }

    /// True when the error exposes a transient network signal.
    ///
    /// Transport hiccups (lookup timeout, TCP reset, connect failure) are
    /// generally worth retrying.
    pub fn is_transient_network(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::Dns {
                timeout, temporary, ..
            } => *timeout || *temporary,
            _ => false,
        }
    }

    /// RDAP error kind, when this is an RDAP error.
    pub fn rdap_kind(&self) -> Option<RdapErrorKind> {
        match self {
            Self::Rdap { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl fmt::Display for GatherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDomain { domain, reason } => {
                write!(f, "Invalid domain '{}': {}", domain, reason)
            }
            Self::Dns {
                domain,
                message,
                not_found,
                timeout,
                temporary,
            } => {
                write!(f, "DNS error for '{}': {}", domain, message)?;
                if *not_found {
                    write!(f, " (not found)")?;
                }
                if *timeout {
                    write!(f, " (timeout)")?;
                }
                if *temporary {
                    write!(f, " (temporary)")?;
                }
                Ok(())
            }
            Self::Rdap {
                domain,
                kind,
                message,
            } => {
                write!(f, "RDAP error for '{}' ({}): {}", domain, kind, message)
            }
            Self::Network {
                message,
                timeout,
                source,
            } => {
                write!(f, "Network error: {}", message)?;
                if *timeout {
                    write!(f, " (timeout)")?;
                }
                if let Some(source) = source {
                    write!(f, " (source: {})", source)?;
                }
                Ok(())
            }
            Self::Cancelled => write!(f, "operation cancelled"),
            Self::DeadlineExceeded => write!(f, "deadline exceeded"),
            Self::Storage { message, source } => {
                if let Some(source) = source {
                    write!(f, "Storage error: {} (source: {})", message, source)
                } else {
                    write!(f, "Storage error: {}", message)
                }
            }
            Self::File { path, message } => {
                write!(f, "File error at '{}': {}", path, message)
            }
            Self::Internal { message } => write!(f, "Internal error: {}", message),
        }
    }
}

impl std::error::Error for GatherError {}

// Implement From conversions for common error types
impl From<reqwest::Error> for GatherError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network_with_source("HTTP request timed out", true, err.to_string())
        } else if err.is_connect() {
            Self::network_with_source("Connection failed", false, err.to_string())
        } else {
            Self::network_with_source("HTTP request failed", false, err.to_string())
        }
    }
}

impl From<rusqlite::Error> for GatherError {
    fn from(err: rusqlite::Error) -> Self {
        Self::storage_with_source("SQLite operation failed", err.to_string())
    }
}

impl From<serde_json::Error> for GatherError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal {
            message: format!("JSON parsing failed: {}", err),
        }
    }
}

impl From<std::io::Error> for GatherError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal {
            message: format!("I/O error: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_classification() {
        assert!(GatherError::Cancelled.is_cancellation());
        assert!(GatherError::DeadlineExceeded.is_cancellation());
        assert!(!GatherError::internal("boom").is_cancellation());
    }

    #[test]
    fn test_transient_network_classification() {
        assert!(GatherError::network("reset", false).is_transient_network());
        assert!(GatherError::network("slow", true).is_transient_network());
        assert!(GatherError::dns("a.net", "servfail", true, false).is_transient_network());
        assert!(GatherError::dns("a.net", "servfail", false, true).is_transient_network());
        assert!(!GatherError::dns("a.net", "bad name", false, false).is_transient_network());
        assert!(!GatherError::Cancelled.is_transient_network());
    }

    #[test]
    fn test_rdap_kind_accessor() {
        let err = GatherError::rdap("a.net", RdapErrorKind::NoWorkingServers, "down");
        assert_eq!(err.rdap_kind(), Some(RdapErrorKind::NoWorkingServers));
        assert_eq!(GatherError::Cancelled.rdap_kind(), None);
    }
}

//! Probe implementations for domain verification.
//!
//! This module contains the two registration-status probes the engine
//! composes: a fast DNS resolution probe and the authoritative RDAP probe,
//! plus the bootstrap registry that maps TLDs to RDAP services.

/// DNS resolution probe
pub mod dns;

/// RDAP (Registration Data Access Protocol) probe
pub mod rdap;

/// Registry mappings and IANA bootstrap discovery
pub mod registry;

// Re-export core types that external users might need
pub use dns::{DnsOutcome, DnsProbe, HickoryDnsProbe};
pub use rdap::{RdapClient, RdapProbe};

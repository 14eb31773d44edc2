//! Candidate generation and filtering.
//!
//! Candidates are the Cartesian product of short `[a-z]` labels and the
//! configured TLD list. Generation is only the front half of the queue: the
//! set is persisted with insert-if-absent semantics and future runs work
//! from whatever is still pending in the store.

use std::collections::HashSet;

/// Default upper bound on the label length kept by [`filter_candidates`].
pub const DEFAULT_MAX_LABEL_LEN: usize = 3;

/// Generate every `label.tld` candidate with `min_len <= |label| <= max_len`
/// over the lowercase ASCII alphabet.
///
/// The output is finite and ordered: by TLD, then by label length, then
/// lexicographically.
pub fn generate_candidates(tlds: &[String], min_len: usize, max_len: usize) -> Vec<String> {
    let mut candidates = Vec::new();
    for tld in tlds {
        let tld = tld.trim().trim_start_matches('.').to_ascii_lowercase();
        if tld.is_empty() {
            continue;
        }
        for len in min_len..=max_len {
            push_labels(len, &tld, &mut candidates);
        }
    }
    candidates
}

/// Append all `[a-z]^len` labels joined with `tld`, in lexicographic order.
fn push_labels(len: usize, tld: &str, out: &mut Vec<String>) {
    if len == 0 {
        return;
    }
    // odometer over base-26 digits
    let mut digits = vec![0u8; len];
    loop {
        let label: String = digits.iter().map(|&d| (b'a' + d) as char).collect();
        out.push(format!("{}.{}", label, tld));

        let mut pos = len;
        loop {
            if pos == 0 {
                return;
            }
            pos -= 1;
            digits[pos] += 1;
            if digits[pos] < 26 {
                break;
            }
            digits[pos] = 0;
        }
    }
}

/// The label portion of a candidate (everything before the first dot).
pub fn label_of(domain: &str) -> &str {
    domain.split('.').next().unwrap_or(domain)
}

/// Drop candidates that are banned or whose label exceeds `max_label_len`.
///
/// The length rule applies to the label only, not the TLD, so `abc.museum`
/// passes with the default limit while `abcd.io` does not.
pub fn filter_candidates(
    domains: Vec<String>,
    banned: &HashSet<String>,
    max_label_len: usize,
) -> Vec<String> {
    domains
        .into_iter()
        .filter(|d| !banned.contains(d))
        .filter(|d| label_of(d).len() <= max_label_len)
        .collect()
}

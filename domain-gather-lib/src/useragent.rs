//! Descriptive User-Agent assembly for RDAP requests.
//!
//! Registries want to know who is querying them. The builder produces
//! `<name>/<version> (+<url>; commit=<sha>; built=<rfc3339>; os=<os>;
//! arch=<arch>; ...)` with every field scrubbed down to RFC 9110 token
//! characters.

use chrono::{DateTime, SecondsFormat, Utc};

/// Application metadata baked into the User-Agent string.
#[derive(Debug, Clone, Default)]
pub struct AppMeta {
    pub name: String,
    pub version: String,
    pub url: String,
    /// Short or full commit SHA.
    pub commit: String,
    /// Build time; rendered as RFC 3339 UTC.
    pub built: Option<DateTime<Utc>>,
    /// Optional extra key/value pairs, e.g. `service=rdap`. Rendered in
    /// order.
    pub extra: Vec<(String, String)>,
}

/// Build the User-Agent string from application metadata.
pub fn build(meta: &AppMeta) -> String {
    let built = meta
        .built
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| "unknown".to_string());

    let mut ua = format!("{}/{}", token(&meta.name, "app"), token(&meta.version, "0"));
    ua.push_str(" (+");
    ua.push_str(&token(&meta.url, "n/a"));
    ua.push_str(&format!(
        "; commit={}; built={}; os={}; arch={}",
        token(&meta.commit, "unknown"),
        token(&built, "unknown"),
        token(std::env::consts::OS, ""),
        token(std::env::consts::ARCH, ""),
    ));
    for (key, value) in &meta.extra {
        ua.push_str(&format!("; {}={}", token(key, ""), token(value, "")));
    }
    ua.push(')');
    ua
}

/// Scrub a string down to RFC 9110 token characters, substituting `default`
/// when empty.
///
/// Spaces, parentheses, semicolons, slashes, backslashes and quotes would
/// break the comment syntax, so they become dashes.
fn token(s: &str, default: &str) -> String {
    let s = s.trim();
    let s = if s.is_empty() { default } else { s };
    s.chars()
        .map(|c| match c {
            ' ' | '(' | ')' | ';' | '/' | '\\' | '"' | '\'' => '-',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_build_full_string() {
        let meta = AppMeta {
            name: "domain-gather".to_string(),
            version: "0.1.0".to_string(),
            url: "https://example.com/domain-gather".to_string(),
            commit: "abc1234".to_string(),
            built: Some(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()),
            extra: vec![("service".to_string(), "rdap".to_string())],
        };

        let ua = build(&meta);
        assert!(ua.starts_with("domain-gather/0.1.0 (+https:--example.com-domain-gather;"));
        assert!(ua.contains("commit=abc1234"));
        assert!(ua.contains("built=2025-06-01T12:00:00Z"));
        assert!(ua.contains("service=rdap"));
        assert!(ua.ends_with(')'));
    }

    #[test]
    fn test_empty_fields_get_defaults() {
        let ua = build(&AppMeta::default());
        assert!(ua.starts_with("app/0 (+n-a;"));
        assert!(ua.contains("commit=unknown"));
        assert!(ua.contains("built=unknown"));
    }

    #[test]
    fn test_token_scrubbing() {
        assert_eq!(token("evil (input); rm -rf /", "x"), "evil--input---rm--rf--");
        assert_eq!(token("   ", "fallback"), "fallback");
        assert_eq!(token("clean-token", "x"), "clean-token");
    }
}

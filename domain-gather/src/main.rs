//! Domain Gather CLI
//!
//! Enumerates short domain candidates for a set of TLDs, verifies their
//! registration status via DNS and RDAP, and exports the RDAP-confirmed
//! available ones. Verdicts live in SQLite, so interrupted runs pick up where
//! they left off.

use clap::Parser;
use domain_gather_lib::{
    code, filter_candidates, generate_candidates, useragent, AppMeta, BanRepository,
    CancellationToken, CheckRepository, Ctx, GatherError, HickoryDnsProbe, RdapClient, Store,
    VerifyEngine,
};
use std::collections::HashSet;
use std::process;
use std::sync::Arc;
use tracing::{info, warn};

/// CLI arguments for domain-gather
#[derive(Parser, Debug)]
#[command(name = "domain-gather")]
#[command(version)]
#[command(about = "Discover registrable short domains via DNS and RDAP verification")]
#[command(long_about = "Enumerates short [a-z] labels under the given TLDs, verifies each \
candidate against DNS and the authoritative RDAP registry, and writes the available ones to a \
file. Progress is persisted in SQLite so runs are resumable.")]
pub struct Args {
    /// SQLite database path
    #[arg(long = "db", value_name = "FILE", default_value = "domains.sqlite")]
    pub db: String,

    /// TLDs to enumerate (comma-separated or multiple -t flags)
    #[arg(short = 't', long = "tld", value_name = "TLD", value_delimiter = ',', action = clap::ArgAction::Append, default_value = "net")]
    pub tlds: Vec<String>,

    /// Shortest label length to generate
    #[arg(long = "min-len", value_name = "N", default_value = "1")]
    pub min_len: usize,

    /// Longest label length to generate
    #[arg(long = "max-len", value_name = "N", default_value = "2")]
    pub max_len: usize,

    /// Longest label length admitted to verification
    #[arg(long = "max-label-len", value_name = "N", default_value = "3")]
    pub max_label_len: usize,

    /// Output file for available domains (one per line)
    #[arg(short = 'o', long = "out", value_name = "FILE", default_value = "available-domains.txt")]
    pub out: String,

    /// Skip verification and only export already-confirmed available domains
    #[arg(long = "skip-check")]
    pub skip_check: bool,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Validate command line arguments
fn validate_args(args: &Args) -> Result<(), String> {
    if args.tlds.iter().all(|t| t.trim().is_empty()) {
        return Err("At least one TLD is required".to_string());
    }

    if args.min_len == 0 {
        return Err("--min-len must be at least 1".to_string());
    }

    if args.min_len > args.max_len {
        return Err("--min-len cannot exceed --max-len".to_string());
    }

    Ok(())
}

async fn run(args: Args) -> Result<(), GatherError> {
    let store = Store::open(&args.db)?;
    let checks = store.checks();
    let bans = store.bans();

    if !args.skip_check {
        verify_pending(&args, &checks, &bans).await?;
    }

    export_available(&checks, &args.out)
}

/// Enqueue the generated candidate set, then verify batches until the
/// pending set drains or stops making progress.
async fn verify_pending(
    args: &Args,
    checks: &CheckRepository,
    bans: &BanRepository,
) -> Result<(), GatherError> {
    let candidates = generate_candidates(&args.tlds, args.min_len, args.max_len);
    info!(count = candidates.len(), "generated candidates");
    checks.bulk_ensure(&candidates)?;

    let engine = VerifyEngine::new(
        checks.clone(),
        bans.clone(),
        Arc::new(HickoryDnsProbe::new()),
        Arc::new(RdapClient::new(&user_agent())?),
    );

    let token = CancellationToken::new();
    let ctx = Ctx::with_token(token.clone());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling in-flight checks");
            token.cancel();
        }
    });

    loop {
        let pending: Vec<String> = checks
            .load_pending()?
            .into_iter()
            .map(|r| r.domain)
            .collect();
        let banned: HashSet<String> = bans.list_all()?.into_iter().map(|b| b.domain).collect();
        let mut batch = filter_candidates(pending, &banned, args.max_label_len);
        if batch.is_empty() {
            info!("pending set is empty");
            break;
        }

        info!(count = batch.len(), "verifying pending candidates");
        let results = engine.verify_batch(&ctx, &mut batch).await;

        let settled = results
            .iter()
            .filter(|r| r.checked.code.map_or(false, code::is_final))
            .count();
        info!(settled, total = results.len(), "batch complete");

        if ctx.is_done() {
            warn!("cancelled, leaving remaining candidates for a later run");
            break;
        }
        if settled == 0 {
            // everything left is stuck on transient codes; a later run can
            // retry them
            warn!("no candidate reached a final verdict, stopping");
            break;
        }
    }

    Ok(())
}

/// Write all RDAP-confirmed available domains to `path`, one per line.
fn export_available(checks: &CheckRepository, path: &str) -> Result<(), GatherError> {
    let available = checks.load_available()?;

    let mut content = String::new();
    for record in &available {
        content.push_str(&record.domain);
        content.push('\n');
    }
    std::fs::write(path, content).map_err(|e| GatherError::file(path, e.to_string()))?;

    info!(count = available.len(), path, "wrote available domains");
    Ok(())
}

fn user_agent() -> String {
    useragent::build(&AppMeta {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        url: env!("CARGO_PKG_REPOSITORY").to_string(),
        commit: option_env!("GIT_COMMIT").unwrap_or("unknown").to_string(),
        built: None,
        extra: vec![("service".to_string(), "rdap".to_string())],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args::parse_from(["domain-gather"])
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_args(&base_args()).is_ok());
    }

    #[test]
    fn test_zero_min_len_rejected() {
        let mut args = base_args();
        args.min_len = 0;
        assert!(validate_args(&args).is_err());
    }

    #[test]
    fn test_inverted_length_range_rejected() {
        let mut args = base_args();
        args.min_len = 3;
        args.max_len = 2;
        assert!(validate_args(&args).is_err());
    }

    #[test]
    fn test_user_agent_is_scrubbed() {
        let ua = user_agent();
        assert!(ua.starts_with("domain-gather/"));
        assert!(ua.contains("service=rdap"));
    }
}

//! Feature Gate Sync
//!
//! Refreshes the feature gate store from the schedule wiki and the devnet and
//! testnet feature accounts. Prints newly listed features; exits non-zero
//! without touching the store on any fatal error.

use anyhow::{Context, Result};
use clap::Parser;
use feature_gates::config::{DEFAULT_PROPOSALS_URL, DEFAULT_STORE_PATH, DEFAULT_WIKI_URL};
use feature_gates::{Cluster, ProbeFailurePolicy, Reconciler, SyncConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "feature-gate-sync")]
#[command(about = "Sync the feature gate store with the upstream schedule and cluster state")]
struct Args {
    /// Feature gate store to update
    #[arg(long, env = "FEATURE_GATES_STORE", default_value = DEFAULT_STORE_PATH)]
    store: PathBuf,

    /// Raw markdown of the schedule wiki
    #[arg(long, env = "FEATURE_GATES_WIKI_URL", default_value = DEFAULT_WIKI_URL)]
    wiki_url: String,

    /// GitHub contents listing of SIMD proposals
    #[arg(long, env = "FEATURE_GATES_PROPOSALS_URL", default_value = DEFAULT_PROPOSALS_URL)]
    proposals_url: String,

    #[arg(long, env = "DEVNET_RPC_URL", default_value = Cluster::Devnet.default_rpc_url())]
    devnet_rpc_url: String,

    #[arg(long, env = "TESTNET_RPC_URL", default_value = Cluster::Testnet.default_rpc_url())]
    testnet_rpc_url: String,

    /// Maximum concurrent account probes
    #[arg(long, env = "PROBE_CONCURRENCY", default_value = "8")]
    probe_concurrency: usize,

    /// `abort` fails the run on any probe error; `keep-fallback` keeps the stored epoch
    #[arg(long, env = "PROBE_FAILURE_POLICY", default_value = "abort")]
    probe_failure_policy: ProbeFailurePolicy,

    /// HTTP timeout in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value = "30")]
    http_timeout_secs: u64,
}

impl Args {
    fn into_config(self) -> SyncConfig {
        SyncConfig {
            wiki_url: self.wiki_url,
            proposals_url: self.proposals_url,
            store_path: self.store,
            devnet_rpc_url: self.devnet_rpc_url,
            testnet_rpc_url: self.testnet_rpc_url,
            probe_concurrency: self.probe_concurrency,
            http_timeout: Duration::from_secs(self.http_timeout_secs),
            probe_failure_policy: self.probe_failure_policy,
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,feature_gates=info,feature_gate_sync=info".into()),
        )
        .init();

    let config = Args::parse().into_config();
    info!("Store: {}", config.store_path.display());
    info!("Devnet RPC: {}", config.devnet_rpc_url);
    info!("Testnet RPC: {}", config.testnet_rpc_url);

    let reconciler = Reconciler::from_config(config)?;
    let report = reconciler
        .run()
        .await
        .with_context(|| format!("sync of {} failed", reconciler.config().store_path.display()))?;

    print!("{report}");
    if !report.keyless.is_empty() {
        warn!("{} upstream row(s) have no key and were not stored", report.keyless.len());
    }
    if !report.rejected.is_empty() {
        warn!("{} malformed row(s) skipped", report.rejected.len());
    }
    info!(
        "Done: {} new, {} epoch change(s)",
        report.new_features.len(),
        report.epoch_changes.len()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_flags_uses_defaults() {
        let config = Args::try_parse_from(["feature-gate-sync"])
            .unwrap()
            .into_config();
        let defaults = SyncConfig::default();

        assert_eq!(config.store_path, defaults.store_path);
        assert_eq!(config.wiki_url, defaults.wiki_url);
        assert_eq!(config.proposals_url, defaults.proposals_url);
        assert_eq!(config.devnet_rpc_url, "https://api.devnet.solana.com");
        assert_eq!(config.testnet_rpc_url, "https://api.testnet.solana.com");
        assert_eq!(config.probe_concurrency, 8);
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.probe_failure_policy, ProbeFailurePolicy::Abort);
        assert_eq!(config.table_indices, vec![1, 2, 3]);
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = Args::try_parse_from([
            "feature-gate-sync",
            "--store",
            "/tmp/gates.json",
            "--devnet-rpc-url",
            "http://127.0.0.1:8899",
            "--probe-concurrency",
            "2",
            "--probe-failure-policy",
            "keep-fallback",
        ])
        .unwrap()
        .into_config();

        assert_eq!(config.store_path, PathBuf::from("/tmp/gates.json"));
        assert_eq!(config.devnet_rpc_url, "http://127.0.0.1:8899");
        assert_eq!(config.probe_concurrency, 2);
        assert_eq!(config.probe_failure_policy, ProbeFailurePolicy::KeepFallback);
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let err = Args::try_parse_from(["feature-gate-sync", "--probe-failure-policy", "retry"]);
        assert!(err.is_err());
    }
}

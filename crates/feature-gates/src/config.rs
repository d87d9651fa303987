//! Sync configuration

use crate::prober::Cluster;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_WIKI_URL: &str =
    "https://raw.githubusercontent.com/wiki/anza-xyz/agave/Feature-Gate-Tracker-Schedule.md";
pub const DEFAULT_PROPOSALS_URL: &str =
    "https://api.github.com/repos/solana-foundation/solana-improvement-documents/contents/proposals";
pub const DEFAULT_STORE_PATH: &str = "app/utils/feature-gate/featureGates.json";

/// Schedule tables consumed from the wiki, by position in the document.
/// Table 0 is the legend.
pub const SCHEDULE_TABLES: [(usize, &str); 3] =
    [(1, "pending mainnet"), (2, "devnet"), (3, "testnet")];

/// What to do when a chain probe fails
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProbeFailurePolicy {
    /// Fail the run; nothing is written
    #[default]
    Abort,
    /// Keep the persisted epoch for the failed field and carry on
    KeepFallback,
}

impl FromStr for ProbeFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "keep-fallback" | "keep_fallback" | "keep" => Ok(Self::KeepFallback),
            other => Err(format!(
                "unknown probe failure policy {other:?} (expected `abort` or `keep-fallback`)"
            )),
        }
    }
}

/// Everything a sync run needs to know about the outside world
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Raw markdown of the schedule wiki page
    pub wiki_url: String,
    /// Directory listing of SIMD proposals
    pub proposals_url: String,
    /// Persisted store, read and rewritten in place
    pub store_path: PathBuf,
    pub devnet_rpc_url: String,
    pub testnet_rpc_url: String,
    /// Table positions to read from the wiki
    pub table_indices: Vec<usize>,
    /// Maximum in-flight probes per run
    pub probe_concurrency: usize,
    /// Timeout for every HTTP request
    pub http_timeout: Duration,
    pub probe_failure_policy: ProbeFailurePolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            wiki_url: DEFAULT_WIKI_URL.to_string(),
            proposals_url: DEFAULT_PROPOSALS_URL.to_string(),
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            devnet_rpc_url: Cluster::Devnet.default_rpc_url().to_string(),
            testnet_rpc_url: Cluster::Testnet.default_rpc_url().to_string(),
            table_indices: SCHEDULE_TABLES.iter().map(|(i, _)| *i).collect(),
            probe_concurrency: 8,
            http_timeout: Duration::from_secs(30),
            probe_failure_policy: ProbeFailurePolicy::Abort,
        }
    }
}

impl SyncConfig {
    pub fn rpc_url(&self, cluster: Cluster) -> &str {
        match cluster {
            Cluster::Devnet => &self.devnet_rpc_url,
            Cluster::Testnet => &self.testnet_rpc_url,
            Cluster::Mainnet => cluster.default_rpc_url(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_reads_schedule_tables() {
        let config = SyncConfig::default();
        assert_eq!(config.table_indices, vec![1, 2, 3]);
        assert_eq!(config.probe_failure_policy, ProbeFailurePolicy::Abort);
        assert_eq!(
            config.store_path,
            PathBuf::from("app/utils/feature-gate/featureGates.json")
        );
    }

    #[test]
    fn test_rpc_url_per_cluster() {
        let config = SyncConfig {
            devnet_rpc_url: "http://localhost:8899".to_string(),
            ..Default::default()
        };
        assert_eq!(config.rpc_url(Cluster::Devnet), "http://localhost:8899");
        assert_eq!(
            config.rpc_url(Cluster::Testnet),
            "https://api.testnet.solana.com"
        );
    }

    #[test]
    fn test_probe_failure_policy_parse() {
        assert_eq!("abort".parse(), Ok(ProbeFailurePolicy::Abort));
        assert_eq!("Keep-Fallback".parse(), Ok(ProbeFailurePolicy::KeepFallback));
        assert!("retry".parse::<ProbeFailurePolicy>().is_err());
    }
}

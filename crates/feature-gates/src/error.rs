use crate::prober::ProbeFailure;
use crate::source::FetchError;
use crate::store::SnapshotError;
use crate::table::MissingTable;
use std::path::PathBuf;
use thiserror::Error;

/// Conditions that abort a sync run before anything is written
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to fetch schedule document {url}: {source}")]
    Document {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("schedule {0}")]
    TableNotFound(#[from] MissingTable),

    #[error("store {}: {source}", .path.display())]
    Snapshot {
        path: PathBuf,
        #[source]
        source: SnapshotError,
    },

    #[error("{} activation probe(s) failed:\n{}", .failures.len(), format_failures(.failures))]
    Probe { failures: Vec<ProbeFailure> },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

fn format_failures(failures: &[ProbeFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("  {f}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prober::{Cluster, ProbeError};
    use crate::rpc::RpcError;

    #[test]
    fn test_probe_error_lists_every_failure() {
        let err = SyncError::Probe {
            failures: vec![
                ProbeFailure {
                    key: "A".to_string(),
                    cluster: Cluster::Devnet,
                    error: ProbeError::Rpc(RpcError::Status {
                        endpoint: "http://devnet".to_string(),
                        status: 429,
                    }),
                },
                ProbeFailure {
                    key: "B".to_string(),
                    cluster: Cluster::Testnet,
                    error: ProbeError::MalformedAccount {
                        key: "B".to_string(),
                        reason: "unexpected activation flag 9".to_string(),
                    },
                },
            ],
        };

        let message = err.to_string();
        assert!(message.starts_with("2 activation probe(s) failed"));
        assert!(message.contains("A on devnet: HTTP 429 from http://devnet"));
        assert!(message.contains("B on testnet"));
    }

    #[test]
    fn test_table_not_found_message() {
        let err = SyncError::from(MissingTable { index: 3, found: 2 });
        assert_eq!(
            err.to_string(),
            "schedule table 3 not found (document has 2 tables)"
        );
    }
}

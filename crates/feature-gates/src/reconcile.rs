//! Reconciliation engine
//!
//! One run:
//! 1. fetch the schedule document and normalize the rows of its schedule tables
//! 2. load the persisted store
//! 3. re-probe devnet/testnet epochs of every stored feature still listed upstream
//! 4. append features seen for the first time
//! 5. atomically rewrite the store
//!
//! Every fatal condition is raised before the write, so a failed run leaves
//! the store exactly as it was.

use crate::config::{ProbeFailurePolicy, SyncConfig};
use crate::error::SyncError;
use crate::normalize::{columns, normalize_row, RowRejection};
use crate::prober::{ActivationProber, Cluster, ProbeError, ProbeFailure};
use crate::proposals::fetch_proposal_index;
use crate::record::FeatureRecord;
use crate::rpc::{ChainClient, RpcClient};
use crate::source::{DocumentSource, HttpDocumentSource};
use crate::store::{load_snapshot, write_snapshot};
use crate::table::extract_tables;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A feature appended to the store by this run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewFeature {
    pub key: String,
    pub title: String,
}

/// A stored epoch this run changed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EpochChange {
    pub key: String,
    pub cluster: Cluster,
    pub before: Option<u64>,
    pub after: Option<u64>,
}

/// An upstream row that was left out of the store
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RejectedRow {
    /// Table position in the document
    pub table: usize,
    pub key: Option<String>,
    pub title: String,
    pub reason: RowRejection,
}

/// Outcome of a successful run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub new_features: Vec<NewFeature>,
    pub epoch_changes: Vec<EpochChange>,
    /// Rows skipped as malformed
    pub rejected: Vec<RejectedRow>,
    /// Titles of upstream rows without a key
    pub keyless: Vec<String>,
    /// Probes that failed and kept the stored value
    pub probe_failures: Vec<String>,
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.new_features.is_empty() {
            writeln!(f, "New features:")?;
            for feature in &self.new_features {
                writeln!(f, "{} - {}", feature.key, feature.title)?;
            }
        }
        if !self.epoch_changes.is_empty() {
            writeln!(f, "Epoch changes:")?;
            for change in &self.epoch_changes {
                writeln!(
                    f,
                    "{} {}: {} -> {}",
                    change.key,
                    change.cluster,
                    display_epoch(change.before),
                    display_epoch(change.after)
                )?;
            }
        }
        Ok(())
    }
}

fn display_epoch(epoch: Option<u64>) -> String {
    epoch.map_or_else(|| "none".to_string(), |e| e.to_string())
}

/// Upstream records keyed by feature account, in first-seen order
#[derive(Default)]
struct Observed {
    records: Vec<FeatureRecord>,
    positions: HashMap<String, usize>,
    keyless: Vec<String>,
}

impl Observed {
    fn collect(records: Vec<FeatureRecord>) -> Self {
        let mut observed = Self::default();
        for record in records {
            let Some(key) = record.key.clone() else {
                warn!(title = %record.title, "Upstream row has no key");
                observed.keyless.push(record.title);
                continue;
            };
            match observed.positions.get(&key) {
                Some(&position) => {
                    debug!(key = %key, "Feature listed in more than one table, keeping latest row");
                    observed.records[position] = record;
                }
                None => {
                    observed.positions.insert(key, observed.records.len());
                    observed.records.push(record);
                }
            }
        }
        observed
    }
}

struct ProbeJob<'a> {
    seq: usize,
    index: usize,
    key: String,
    prober: &'a ActivationProber,
    fallback: Option<u64>,
}

/// Drives one sync run against a document source and two clusters
pub struct Reconciler {
    config: SyncConfig,
    source: Arc<dyn DocumentSource>,
    devnet: ActivationProber,
    testnet: ActivationProber,
}

impl Reconciler {
    pub fn new(
        config: SyncConfig,
        source: Arc<dyn DocumentSource>,
        devnet: Arc<dyn ChainClient>,
        testnet: Arc<dyn ChainClient>,
    ) -> Self {
        Self {
            config,
            source,
            devnet: ActivationProber::new(Cluster::Devnet, devnet),
            testnet: ActivationProber::new(Cluster::Testnet, testnet),
        }
    }

    /// Wire up HTTP collaborators from `config`.
    pub fn from_config(config: SyncConfig) -> Result<Self, SyncError> {
        let source = HttpDocumentSource::new(config.http_timeout)?;
        let devnet = RpcClient::new(config.rpc_url(Cluster::Devnet), config.http_timeout)?;
        let testnet = RpcClient::new(config.rpc_url(Cluster::Testnet), config.http_timeout)?;
        Ok(Self::new(
            config,
            Arc::new(source),
            Arc::new(devnet),
            Arc::new(testnet),
        ))
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub async fn run(&self) -> Result<ReconcileReport, SyncError> {
        let mut report = ReconcileReport::default();

        let observed = self.observe(&mut report).await?;
        report.keyless = observed.keyless.clone();

        let path = &self.config.store_path;
        let mut snapshot = load_snapshot(path).map_err(|source| SyncError::Snapshot {
            path: path.clone(),
            source,
        })?;
        info!(
            stored = snapshot.len(),
            observed = observed.records.len(),
            "Loaded feature gate store"
        );

        let mut consumed = vec![false; observed.records.len()];
        for record in &snapshot {
            if let Some(&position) = record.key().and_then(|k| observed.positions.get(k)) {
                consumed[position] = true;
            }
        }

        self.refresh_epochs(&mut snapshot, &observed, &mut report)
            .await?;

        for (record, seen) in observed.records.into_iter().zip(consumed) {
            if seen {
                continue;
            }
            let key = record.key.clone().unwrap_or_default();
            info!(key = %key, title = %record.title, "New feature");
            report.new_features.push(NewFeature {
                key,
                title: record.title.clone(),
            });
            snapshot.push(record);
        }

        write_snapshot(path, &snapshot).map_err(|source| SyncError::Snapshot {
            path: path.clone(),
            source,
        })?;
        info!(
            path = %path.display(),
            features = snapshot.len(),
            added = report.new_features.len(),
            changed = report.epoch_changes.len(),
            "Wrote feature gate store"
        );

        Ok(report)
    }

    /// Fetch and normalize the upstream schedule.
    async fn observe(&self, report: &mut ReconcileReport) -> Result<Observed, SyncError> {
        let url = &self.config.wiki_url;
        let document =
            self.source
                .text_document(url)
                .await
                .map_err(|source| SyncError::Document {
                    url: url.clone(),
                    source,
                })?;

        let indices = &self.config.table_indices;
        let tables = extract_tables(&document, indices)?;

        let proposals = fetch_proposal_index(self.source.as_ref(), &self.config.proposals_url).await;

        let mut records = Vec::new();
        for (&index, rows) in indices.iter().zip(tables) {
            for (row_number, row) in rows.iter().enumerate() {
                match normalize_row(row, &proposals) {
                    Ok(record) => records.push(record),
                    Err(reason) => {
                        let cell = |column: &str| {
                            row.get(column)
                                .map(|v| v.trim().to_string())
                                .filter(|v| !v.is_empty())
                        };
                        let rejected = RejectedRow {
                            table: index,
                            key: cell(columns::KEY),
                            title: cell(columns::DESCRIPTION).unwrap_or_default(),
                            reason,
                        };
                        warn!(
                            table = index,
                            row = row_number,
                            key = ?rejected.key,
                            title = %rejected.title,
                            error = %rejected.reason,
                            "Skipping malformed schedule row, feature will not be tracked"
                        );
                        report.rejected.push(rejected);
                    }
                }
            }
        }
        debug!(
            rows = records.len(),
            rejected = report.rejected.len(),
            "Normalized schedule rows"
        );

        Ok(Observed::collect(records))
    }

    /// Probe every stored feature still listed upstream and write the
    /// chain's answer back into `snapshot`.
    async fn refresh_epochs(
        &self,
        snapshot: &mut [FeatureRecord],
        observed: &Observed,
        report: &mut ReconcileReport,
    ) -> Result<(), SyncError> {
        let mut jobs = Vec::new();
        for (index, record) in snapshot.iter().enumerate() {
            let Some(key) = record.key() else { continue };
            if !observed.positions.contains_key(key) {
                continue;
            }
            for prober in [&self.devnet, &self.testnet] {
                jobs.push(ProbeJob {
                    seq: jobs.len(),
                    index,
                    key: key.to_string(),
                    prober,
                    fallback: stored_epoch(record, prober.cluster()),
                });
            }
        }
        debug!(probes = jobs.len(), "Probing activation epochs");

        let mut results: Vec<(ProbeJob<'_>, Result<Option<u64>, ProbeError>)> =
            stream::iter(jobs)
                .map(|job| async move {
                    let result = job.prober.probe(&job.key, job.fallback).await;
                    (job, result)
                })
                .buffer_unordered(self.config.probe_concurrency.max(1))
                .collect()
                .await;
        results.sort_by_key(|(job, _)| job.seq);

        let mut failures = Vec::new();
        let mut resolved = Vec::with_capacity(results.len());
        for (job, result) in results {
            match result {
                Ok(epoch) => resolved.push((job, epoch)),
                Err(error) => failures.push(ProbeFailure {
                    key: job.key,
                    cluster: job.prober.cluster(),
                    error,
                }),
            }
        }

        if !failures.is_empty() {
            match self.config.probe_failure_policy {
                ProbeFailurePolicy::Abort => return Err(SyncError::Probe { failures }),
                ProbeFailurePolicy::KeepFallback => {
                    for failure in &failures {
                        warn!(
                            key = %failure.key,
                            cluster = %failure.cluster,
                            error = %failure.error,
                            "Probe failed, keeping stored epoch"
                        );
                        report.probe_failures.push(failure.to_string());
                    }
                }
            }
        }

        for (job, probed) in resolved {
            let cluster = job.prober.cluster();
            let field = stored_epoch_mut(&mut snapshot[job.index], cluster);
            let before = *field;
            // inactive or absent accounts already resolved to the stored value
            let after = probed;
            if matches!((before, after), (Some(b), Some(a)) if a < b) {
                warn!(
                    key = %job.key,
                    cluster = %cluster,
                    stored = ?before,
                    probed = ?after,
                    "Chain reports an earlier activation than stored, using chain epoch"
                );
            }
            if after != before {
                debug!(key = %job.key, cluster = %cluster, ?before, ?after, "Epoch updated");
                *field = after;
                report.epoch_changes.push(EpochChange {
                    key: job.key,
                    cluster,
                    before,
                    after,
                });
            }
        }

        Ok(())
    }
}

fn stored_epoch(record: &FeatureRecord, cluster: Cluster) -> Option<u64> {
    match cluster {
        Cluster::Devnet => record.devnet_activation_epoch,
        Cluster::Testnet => record.testnet_activation_epoch,
        Cluster::Mainnet => record.mainnet_activation_epoch,
    }
}

fn stored_epoch_mut(record: &mut FeatureRecord, cluster: Cluster) -> &mut Option<u64> {
    match cluster {
        Cluster::Devnet => &mut record.devnet_activation_epoch,
        Cluster::Testnet => &mut record.testnet_activation_epoch,
        Cluster::Mainnet => &mut record.mainnet_activation_epoch,
    }
}

//! Chain activation prober
//!
//! A feature account holds `Option<u64>` in bincode layout: one tag byte,
//! then the activation slot little-endian when the tag is 1. Gates take
//! effect the epoch after the one containing that slot.

use crate::epoch::{epoch_for_slot, EpochSchedule};
use crate::rpc::{ChainClient, RpcError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Clusters with independent activation timelines
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cluster {
    Devnet,
    Testnet,
    Mainnet,
}

impl Cluster {
    pub fn default_rpc_url(self) -> &'static str {
        match self {
            Cluster::Devnet => "https://api.devnet.solana.com",
            Cluster::Testnet => "https://api.testnet.solana.com",
            Cluster::Mainnet => "https://api.mainnet-beta.solana.com",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Cluster::Devnet => "devnet",
            Cluster::Testnet => "testnet",
            Cluster::Mainnet => "mainnet",
        }
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded feature account state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeatureState {
    /// Account missing or empty
    Unknown,
    /// Account exists, feature not yet activated
    Pending,
    /// Activated at this slot
    Activated { slot: u64 },
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("feature account {key} is malformed: {reason}")]
    MalformedAccount { key: String, reason: String },
}

/// A probe that could not produce an epoch
#[derive(Debug)]
pub struct ProbeFailure {
    pub key: String,
    pub cluster: Cluster,
    pub error: ProbeError,
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}: {}", self.key, self.cluster, self.error)
    }
}

/// Decode the raw bytes of a feature account.
pub fn decode_activation(data: &[u8]) -> Result<FeatureState, String> {
    match data.first() {
        None => Ok(FeatureState::Unknown),
        Some(0) => Ok(FeatureState::Pending),
        Some(1) => {
            let slot_bytes: [u8; 8] = data
                .get(1..9)
                .and_then(|b| b.try_into().ok())
                .ok_or_else(|| format!("activation flag set but only {} bytes", data.len()))?;
            Ok(FeatureState::Activated {
                slot: u64::from_le_bytes(slot_bytes),
            })
        }
        Some(tag) => Err(format!("unexpected activation flag {tag}")),
    }
}

/// Resolves activation epochs for one cluster
#[derive(Clone)]
pub struct ActivationProber {
    cluster: Cluster,
    client: Arc<dyn ChainClient>,
    schedule: Arc<RwLock<Option<EpochSchedule>>>,
}

impl ActivationProber {
    pub fn new(cluster: Cluster, client: Arc<dyn ChainClient>) -> Self {
        Self {
            cluster,
            client,
            schedule: Arc::new(RwLock::new(None)),
        }
    }

    pub fn cluster(&self) -> Cluster {
        self.cluster
    }

    /// Epoch schedule, fetched on first use.
    pub async fn schedule(&self) -> Result<EpochSchedule, RpcError> {
        let cached = *self.schedule.read();
        if let Some(schedule) = cached {
            return Ok(schedule);
        }
        // Concurrent first callers may both fetch; the schedule is immutable
        // so either answer is fine.
        let schedule = self.client.epoch_schedule().await?;
        *self.schedule.write() = Some(schedule);
        Ok(schedule)
    }

    /// Activation epoch of `key`, or `fallback` when the chain does not know
    /// better.
    pub async fn probe(&self, key: &str, fallback: Option<u64>) -> Result<Option<u64>, ProbeError> {
        let data = self.client.account(key).await?;
        let state = match data {
            Some(data) => decode_activation(&data).map_err(|reason| {
                ProbeError::MalformedAccount {
                    key: key.to_string(),
                    reason,
                }
            })?,
            None => FeatureState::Unknown,
        };

        match state {
            FeatureState::Unknown | FeatureState::Pending => {
                debug!(key, cluster = %self.cluster, state = ?state, "Feature not active");
                Ok(fallback)
            }
            FeatureState::Activated { slot } => {
                let schedule = self.schedule().await?;
                let epoch = epoch_for_slot(&schedule, slot) + 1;
                debug!(key, cluster = %self.cluster, slot, epoch, "Feature active");
                Ok(Some(epoch))
            }
        }
    }
}

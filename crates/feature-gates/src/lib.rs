//! Feature Gate Tracker
//!
//! Keeps a persisted list of Solana feature gates in step with the upstream
//! schedule wiki and with what devnet and testnet report on chain.
//!
//! - [`table`] and [`normalize`] turn the wiki's markdown tables into
//!   [`FeatureRecord`]s
//! - [`proposals`] resolves SIMD numbers to proposal documents
//! - [`prober`] reads feature accounts over [`rpc`] and converts activation
//!   slots to epochs via [`epoch`]
//! - [`reconcile`] merges everything into the [`store`]
//!
//! The store is only rewritten when every step succeeded.

pub mod config;
pub mod epoch;
pub mod error;
pub mod normalize;
pub mod prober;
pub mod proposals;
pub mod reconcile;
pub mod record;
pub mod rpc;
pub mod source;
pub mod store;
pub mod table;

pub use config::{ProbeFailurePolicy, SyncConfig};
pub use epoch::{epoch_for_slot, EpochSchedule};
pub use error::SyncError;
pub use normalize::{normalize_row, RowRejection};
pub use prober::{ActivationProber, Cluster, FeatureState, ProbeError, ProbeFailure};
pub use proposals::ProposalIndex;
pub use reconcile::{EpochChange, NewFeature, ReconcileReport, Reconciler, RejectedRow};
pub use record::{FeatureRecord, ProposalRef};
pub use rpc::{ChainClient, RpcClient, RpcError};
pub use source::{DocumentSource, FetchError, HttpDocumentSource};
pub use store::SnapshotError;
pub use table::MissingTable;

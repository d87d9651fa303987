//! Wiki row normalization
//!
//! Turns one row of the schedule tables into a [`FeatureRecord`]. Every
//! failure is a [`RowRejection`]; one bad row never stops the batch.

use crate::proposals::ProposalIndex;
use crate::record::{FeatureRecord, ProposalRef};
use crate::table::TableRow;
use thiserror::Error;

/// Wiki column names
pub mod columns {
    pub const KEY: &str = "Key";
    pub const SIMD: &str = "SIMD";
    pub const AGAVE_VERSION: &str = "Agave Version";
    pub const FD_VERSION: &str = "FD Version";
    pub const JITO_VERSION: &str = "Jito Version";
    pub const TESTNET: &str = "Testnet";
    pub const DEVNET: &str = "Devnet";
    pub const DESCRIPTION: &str = "Description";
    pub const OWNER: &str = "Owner";
}

/// Rows with fewer populated columns are not schedule entries.
pub const MIN_COLUMNS: usize = 6;

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Why a row was not turned into a record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowRejection {
    #[error("row has {found} columns, expected at least {min}", min = MIN_COLUMNS)]
    TooFewColumns { found: usize },
    #[error("column `{column}` is not a non-negative integer: {value:?}")]
    InvalidInteger { column: &'static str, value: String },
    #[error("key {0:?} is not a base58 account address")]
    InvalidKey(String),
}

/// A schedule row in the wiki's own vocabulary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WikiRow {
    pub key: Option<String>,
    pub simd: Vec<String>,
    pub agave_versions: Vec<String>,
    pub fd_versions: Vec<String>,
    pub jito_versions: Vec<String>,
    pub testnet_activation_epoch: Option<u64>,
    pub devnet_activation_epoch: Option<u64>,
    pub description: Option<String>,
    pub owners: Vec<String>,
}

impl TryFrom<&TableRow> for WikiRow {
    type Error = RowRejection;

    fn try_from(row: &TableRow) -> Result<Self, Self::Error> {
        if row.len() < MIN_COLUMNS {
            return Err(RowRejection::TooFewColumns { found: row.len() });
        }

        let key = text(row, columns::KEY);
        if let Some(key) = &key {
            if !is_address(key) {
                return Err(RowRejection::InvalidKey(key.clone()));
            }
        }

        Ok(Self {
            key,
            simd: split_list(row, columns::SIMD),
            agave_versions: split_list(row, columns::AGAVE_VERSION),
            fd_versions: split_list(row, columns::FD_VERSION),
            jito_versions: split_list(row, columns::JITO_VERSION),
            testnet_activation_epoch: epoch(row, columns::TESTNET)?,
            devnet_activation_epoch: epoch(row, columns::DEVNET)?,
            description: text(row, columns::DESCRIPTION),
            owners: split_list(row, columns::OWNER),
        })
    }
}

impl WikiRow {
    /// Convert into the canonical record, resolving proposal links.
    ///
    /// The wiki's description becomes the record title; the curated
    /// description and mainnet epoch are filled in by hand later.
    pub fn into_record(self, proposals: &ProposalIndex) -> FeatureRecord {
        let proposals = self
            .simd
            .into_iter()
            .map(|id| {
                let link = proposals.link_for(&id).map(str::to_string);
                ProposalRef::new(id, link)
            })
            .collect();

        FeatureRecord {
            key: self.key,
            title: self.description.unwrap_or_default(),
            description: Some(String::new()),
            proposals,
            owners: self.owners,
            min_agave_versions: self.agave_versions,
            min_fd_versions: self.fd_versions,
            min_jito_versions: self.jito_versions,
            planned_testnet_order: None,
            testnet_activation_epoch: self.testnet_activation_epoch,
            devnet_activation_epoch: self.devnet_activation_epoch,
            mainnet_activation_epoch: None,
            comms_required: None,
        }
    }
}

/// Normalize one table row into a record.
pub fn normalize_row(
    row: &TableRow,
    proposals: &ProposalIndex,
) -> Result<FeatureRecord, RowRejection> {
    WikiRow::try_from(row).map(|wiki| wiki.into_record(proposals))
}

/// Trimmed cell text, `None` when absent or blank.
fn text(row: &TableRow, column: &str) -> Option<String> {
    row.get(column)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Comma separated cell, trimmed per element, empty elements dropped.
fn split_list(row: &TableRow, column: &str) -> Vec<String> {
    row.get(column)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn epoch(row: &TableRow, column: &'static str) -> Result<Option<u64>, RowRejection> {
    parse_optional_u64(row.get(column).map(String::as_str)).map_err(|value| {
        RowRejection::InvalidInteger { column, value }
    })
}

/// Parse blank or absent text as `None`, anything else as a `u64`.
///
/// Returns the offending text on failure.
pub fn parse_optional_u64(value: Option<&str>) -> Result<Option<u64>, String> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v.parse::<u64>().map(Some).map_err(|_| v.to_string()),
    }
}

fn is_address(key: &str) -> bool {
    (32..=44).contains(&key.len()) && key.chars().all(|c| BASE58_ALPHABET.contains(c))
}

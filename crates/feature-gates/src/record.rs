//! Canonical feature gate record
//!
//! In memory each proposal is paired with its link. The persisted form keeps
//! the historical parallel `simds` / `simd_links` arrays; the conversion
//! between the two is where their equal length is enforced.

use serde::{Deserialize, Serialize};

/// A proposal identifier and the document it resolved to, if any.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProposalRef {
    pub id: String,
    pub link: Option<String>,
}

impl ProposalRef {
    pub fn new(id: impl Into<String>, link: Option<String>) -> Self {
        Self {
            id: id.into(),
            link: link.filter(|l| !l.is_empty()),
        }
    }
}

/// One feature gate, as tracked in the persisted store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredFeature", into = "StoredFeature")]
pub struct FeatureRecord {
    /// On-chain feature account address
    pub key: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub proposals: Vec<ProposalRef>,
    pub owners: Vec<String>,
    pub min_agave_versions: Vec<String>,
    pub min_fd_versions: Vec<String>,
    pub min_jito_versions: Vec<String>,
    pub planned_testnet_order: Option<u64>,
    pub testnet_activation_epoch: Option<u64>,
    pub devnet_activation_epoch: Option<u64>,
    pub mainnet_activation_epoch: Option<u64>,
    pub comms_required: Option<String>,
}

impl FeatureRecord {
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Proposal identifiers in order.
    pub fn simds(&self) -> Vec<String> {
        self.proposals.iter().map(|p| p.id.clone()).collect()
    }

    /// Proposal links in order, empty where no document matched.
    pub fn simd_links(&self) -> Vec<String> {
        self.proposals
            .iter()
            .map(|p| p.link.clone().unwrap_or_default())
            .collect()
    }
}

/// Persisted shape of a [`FeatureRecord`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct StoredFeature {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default, alias = "simd_link")]
    simd_links: Vec<String>,
    #[serde(default)]
    simds: Vec<String>,
    #[serde(default)]
    owners: Vec<String>,
    #[serde(default)]
    min_agave_versions: Vec<String>,
    #[serde(default)]
    min_fd_versions: Vec<String>,
    #[serde(default)]
    min_jito_versions: Vec<String>,
    #[serde(default)]
    planned_testnet_order: Option<u64>,
    #[serde(default)]
    testnet_activation_epoch: Option<u64>,
    #[serde(default)]
    devnet_activation_epoch: Option<u64>,
    #[serde(default)]
    comms_required: Option<String>,
    #[serde(default)]
    mainnet_activation_epoch: Option<u64>,
    #[serde(default)]
    description: Option<String>,
}

impl TryFrom<StoredFeature> for FeatureRecord {
    type Error = String;

    fn try_from(stored: StoredFeature) -> Result<Self, Self::Error> {
        if stored.simds.len() != stored.simd_links.len() {
            return Err(format!(
                "simds has {} entries but simd_links has {}",
                stored.simds.len(),
                stored.simd_links.len()
            ));
        }
        if matches!(stored.key.as_deref(), Some(k) if k.trim().is_empty()) {
            return Err("key is present but empty".to_string());
        }

        let proposals = stored
            .simds
            .into_iter()
            .zip(stored.simd_links)
            .map(|(id, link)| ProposalRef::new(id, Some(link)))
            .collect();

        Ok(Self {
            key: stored.key,
            title: stored.title,
            description: stored.description,
            proposals,
            owners: stored.owners,
            min_agave_versions: stored.min_agave_versions,
            min_fd_versions: stored.min_fd_versions,
            min_jito_versions: stored.min_jito_versions,
            planned_testnet_order: stored.planned_testnet_order,
            testnet_activation_epoch: stored.testnet_activation_epoch,
            devnet_activation_epoch: stored.devnet_activation_epoch,
            mainnet_activation_epoch: stored.mainnet_activation_epoch,
            comms_required: stored.comms_required,
        })
    }
}

impl From<FeatureRecord> for StoredFeature {
    fn from(record: FeatureRecord) -> Self {
        let simds = record.simds();
        let simd_links = record.simd_links();
        Self {
            key: record.key,
            title: record.title,
            description: record.description,
            simd_links,
            simds,
            owners: record.owners,
            min_agave_versions: record.min_agave_versions,
            min_fd_versions: record.min_fd_versions,
            min_jito_versions: record.min_jito_versions,
            planned_testnet_order: record.planned_testnet_order,
            testnet_activation_epoch: record.testnet_activation_epoch,
            devnet_activation_epoch: record.devnet_activation_epoch,
            comms_required: record.comms_required,
            mainnet_activation_epoch: record.mainnet_activation_epoch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FeatureRecord {
        FeatureRecord {
            key: Some("7txXZZD6Um59YoLMF7XUNimbMjsqsWhc7g2EniiTrmp1".to_string()),
            title: "Enable loader v4".to_string(),
            description: Some(String::new()),
            proposals: vec![
                ProposalRef::new("167", Some("https://example.org/0167.md".to_string())),
                ProposalRef::new("abc", None),
            ],
            owners: vec!["alice".to_string()],
            min_agave_versions: vec!["v2.1.0".to_string()],
            devnet_activation_epoch: Some(812),
            ..Default::default()
        }
    }

    #[test]
    fn test_serializes_parallel_arrays() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["simds"], serde_json::json!(["167", "abc"]));
        assert_eq!(
            value["simd_links"],
            serde_json::json!(["https://example.org/0167.md", ""])
        );
        assert!(value["testnet_activation_epoch"].is_null());
        assert_eq!(value["devnet_activation_epoch"], 812);
    }

    #[test]
    fn test_json_roundtrip_preserves_record() {
        let record = sample();
        let json = serde_json::to_string(&record).unwrap();
        let back: FeatureRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_mismatched_parallel_arrays_rejected() {
        let json = r#"{"key":"k","title":"t","simds":["1","2"],"simd_links":[""]}"#;
        let err = serde_json::from_str::<FeatureRecord>(json).unwrap_err();
        assert!(err.to_string().contains("simd_links has 1"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let json = r#"{"key":"k","title":"t","notes":"hand edited"}"#;
        assert!(serde_json::from_str::<FeatureRecord>(json).is_err());
    }

    #[test]
    fn test_singular_simd_link_field_accepted() {
        let json = r#"{"key":"k","title":"t","simds":["12"],"simd_link":["https://x/0012.md"]}"#;
        let record: FeatureRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.simd_links(), vec!["https://x/0012.md".to_string()]);

        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("simd_link").is_none());
        assert_eq!(value["simd_links"], serde_json::json!(["https://x/0012.md"]));
    }

    #[test]
    fn test_string_epoch_rejected() {
        let json = r#"{"key":"k","title":"t","devnet_activation_epoch":"soon"}"#;
        assert!(serde_json::from_str::<FeatureRecord>(json).is_err());
    }

    #[test]
    fn test_negative_epoch_rejected() {
        let json = r#"{"key":"k","title":"t","testnet_activation_epoch":-1}"#;
        assert!(serde_json::from_str::<FeatureRecord>(json).is_err());
    }

    #[test]
    fn test_absent_and_null_optionals_load_as_none() {
        let json = r#"{"key":"k","title":"t","devnet_activation_epoch":null}"#;
        let record: FeatureRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.devnet_activation_epoch, None);
        assert_eq!(record.testnet_activation_epoch, None);
        assert!(record.proposals.is_empty());
    }

    #[test]
    fn test_zero_epoch_is_distinct_from_absent() {
        let json = r#"{"key":"k","title":"t","devnet_activation_epoch":0}"#;
        let record: FeatureRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.devnet_activation_epoch, Some(0));
    }

    #[test]
    fn test_empty_key_rejected() {
        let json = r#"{"key":"  ","title":"t"}"#;
        assert!(serde_json::from_str::<FeatureRecord>(json).is_err());
    }
}

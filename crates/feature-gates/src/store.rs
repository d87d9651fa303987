//! Persisted feature gate store
//!
//! A pretty-printed JSON array of [`FeatureRecord`]s, rewritten in full on
//! every run through a temp file in the same directory.

use crate::record::FeatureRecord;
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read store: {0}")]
    Read(#[source] std::io::Error),
    #[error("store is not a JSON array of features: {0}")]
    Format(#[source] serde_json::Error),
    #[error("entry {index} does not match the feature schema: {reason}")]
    InvalidEntry { index: usize, reason: String },
    #[error("key {key} appears more than once (entries {first} and {second})")]
    DuplicateKey {
        key: String,
        first: usize,
        second: usize,
    },
    #[error("failed to serialize store: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("failed to write store: {0}")]
    Write(#[source] std::io::Error),
}

/// Load the snapshot at `path`. A missing file is an empty snapshot.
pub fn load_snapshot(path: &Path) -> Result<Vec<FeatureRecord>, SnapshotError> {
    match fs::read(path) {
        Ok(bytes) => parse_snapshot(&bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(SnapshotError::Read(e)),
    }
}

/// Parse and validate a snapshot; every entry must conform.
pub fn parse_snapshot(bytes: &[u8]) -> Result<Vec<FeatureRecord>, SnapshotError> {
    let entries: Vec<serde_json::Value> =
        serde_json::from_slice(bytes).map_err(SnapshotError::Format)?;

    let mut records = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let record: FeatureRecord =
            serde_json::from_value(entry).map_err(|e| SnapshotError::InvalidEntry {
                index,
                reason: e.to_string(),
            })?;
        records.push(record);
    }

    ensure_unique_keys(&records)?;
    Ok(records)
}

/// Render a snapshot exactly as it is written to disk.
pub fn render_snapshot(records: &[FeatureRecord]) -> Result<String, SnapshotError> {
    let mut out = serde_json::to_string_pretty(records).map_err(SnapshotError::Serialize)?;
    out.push('\n');
    Ok(out)
}

/// Atomically replace the snapshot at `path`.
pub fn write_snapshot(path: &Path, records: &[FeatureRecord]) -> Result<(), SnapshotError> {
    ensure_unique_keys(records)?;
    let contents = render_snapshot(records)?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(SnapshotError::Write)?;

    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(SnapshotError::Write)?;
    temp.write_all(contents.as_bytes())
        .map_err(SnapshotError::Write)?;
    temp.as_file().sync_all().map_err(SnapshotError::Write)?;
    temp.persist(path).map_err(|e| SnapshotError::Write(e.error))?;
    Ok(())
}

fn ensure_unique_keys(records: &[FeatureRecord]) -> Result<(), SnapshotError> {
    let mut seen: HashSet<&str> = HashSet::new();
    for (index, record) in records.iter().enumerate() {
        let Some(key) = record.key() else { continue };
        if !seen.insert(key) {
            let first = records
                .iter()
                .position(|r| r.key() == Some(key))
                .unwrap_or(index);
            return Err(SnapshotError::DuplicateKey {
                key: key.to_string(),
                first,
                second: index,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ProposalRef;
    use tempfile::TempDir;

    fn record(key: &str, devnet: Option<u64>) -> FeatureRecord {
        FeatureRecord {
            key: Some(key.to_string()),
            title: format!("Feature {key}"),
            description: Some(String::new()),
            proposals: vec![ProposalRef::new("1", None)],
            devnet_activation_epoch: devnet,
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let records = load_snapshot(&dir.path().join("featureGates.json")).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_write_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/featureGates.json");
        let records = vec![record("A", Some(3)), record("B", None)];

        write_snapshot(&path, &records).unwrap();

        assert_eq!(load_snapshot(&path).unwrap(), records);
    }

    #[test]
    fn test_render_is_stable() {
        let records = vec![record("A", Some(3))];
        let first = render_snapshot(&records).unwrap();
        let reparsed = parse_snapshot(first.as_bytes()).unwrap();
        assert_eq!(render_snapshot(&reparsed).unwrap(), first);
        assert!(first.ends_with("]\n"));
        assert!(first.contains("\n  {\n    \"key\": \"A\""));
    }

    #[test]
    fn test_invalid_entry_reports_index() {
        let json = r#"[
            {"key": "A", "title": "ok"},
            {"key": "B", "title": "bad", "devnet_activation_epoch": "twelve"}
        ]"#;
        let err = parse_snapshot(json.as_bytes()).unwrap_err();
        assert!(matches!(err, SnapshotError::InvalidEntry { index: 1, .. }));
    }

    #[test]
    fn test_non_array_rejected() {
        let err = parse_snapshot(br#"{"key": "A"}"#).unwrap_err();
        assert!(matches!(err, SnapshotError::Format(_)));
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let json = r#"[{"key": "A"}, {"key": "B"}, {"key": "A"}]"#;
        let err = parse_snapshot(json.as_bytes()).unwrap_err();
        match err {
            SnapshotError::DuplicateKey { key, first, second } => {
                assert_eq!(key, "A");
                assert_eq!(first, 0);
                assert_eq!(second, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_keyless_entries_allowed() {
        let json = r#"[{"title": "untracked"}, {"key": null, "title": "also"}]"#;
        let records = parse_snapshot(json.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_write_refuses_duplicate_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("featureGates.json");
        let err = write_snapshot(&path, &[record("A", None), record("A", Some(1))]).unwrap_err();
        assert!(matches!(err, SnapshotError::DuplicateKey { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_write_replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("featureGates.json");
        fs::write(&path, "[]").unwrap();

        write_snapshot(&path, &[record("A", Some(9))]).unwrap();

        let loaded = load_snapshot(&path).unwrap();
        assert_eq!(loaded[0].devnet_activation_epoch, Some(9));
    }
}

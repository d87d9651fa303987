//! SIMD proposal index

use crate::source::{DocumentSource, ListingEntry};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Maps a 4-digit proposal number (`"0167"`) to its browsable URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProposalIndex {
    links: HashMap<String, String>,
}

impl ProposalIndex {
    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Look up a proposal identifier as written in the wiki.
    ///
    /// Purely numeric identifiers are zero-padded to four digits first;
    /// anything else never matches.
    pub fn link_for(&self, id: &str) -> Option<&str> {
        let id = id.trim();
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        self.links.get(&format!("{id:0>4}")).map(String::as_str)
    }

    pub fn insert(&mut self, number: impl Into<String>, url: impl Into<String>) {
        self.links.insert(number.into(), url.into());
    }
}

/// Build the index from a directory listing.
///
/// Only `NNNN*.md` entries count; later entries win on duplicate numbers.
pub fn build_proposal_index(entries: &[ListingEntry]) -> ProposalIndex {
    let mut index = ProposalIndex::default();
    for entry in entries {
        let Some(number) = proposal_number(&entry.name) else {
            continue;
        };
        if let Some(previous) = index.links.get(number) {
            debug!(number, previous = %previous, "Duplicate proposal number in listing");
        }
        index.insert(number, entry.browsable_url.clone());
    }
    index
}

/// Fetch the listing at `url` and build the index.
///
/// Links are enrichment only, so any failure degrades to an empty index.
pub async fn fetch_proposal_index(source: &dyn DocumentSource, url: &str) -> ProposalIndex {
    match source.listing(url).await {
        Ok(entries) => {
            let index = build_proposal_index(&entries);
            debug!(proposals = index.len(), "Built proposal index");
            index
        }
        Err(e) => {
            warn!(error = %e, "Failed to fetch proposals, SIMD links will be empty");
            ProposalIndex::default()
        }
    }
}

fn proposal_number(name: &str) -> Option<&str> {
    if !name.ends_with(".md") {
        return None;
    }
    let prefix = name.get(..4)?;
    prefix.bytes().all(|b| b.is_ascii_digit()).then_some(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{FetchError, HttpDocumentSource};
    use std::time::Duration;

    fn entry(name: &str) -> ListingEntry {
        ListingEntry {
            name: name.to_string(),
            browsable_url: format!("https://github.com/simd/{name}"),
        }
    }

    #[test]
    fn test_build_index_keeps_numbered_markdown_only() {
        let index = build_proposal_index(&[
            entry("0001-simd-process.md"),
            entry("0167-loader-v4.md"),
            entry("README.md"),
            entry("0200-draft.txt"),
            entry("12-short.md"),
        ]);

        assert_eq!(index.len(), 2);
        assert_eq!(
            index.link_for("0167"),
            Some("https://github.com/simd/0167-loader-v4.md")
        );
    }

    #[test]
    fn test_link_for_zero_pads_numeric_ids() {
        let index = build_proposal_index(&[entry("0001-simd-process.md"), entry("0167-loader-v4.md")]);

        assert_eq!(
            index.link_for("167"),
            Some("https://github.com/simd/0167-loader-v4.md")
        );
        assert_eq!(
            index.link_for(" 1 "),
            Some("https://github.com/simd/0001-simd-process.md")
        );
        assert_eq!(index.link_for("SIMD-0167"), None);
        assert_eq!(index.link_for(""), None);
        assert_eq!(index.link_for("999"), None);
    }

    #[test]
    fn test_duplicate_numbers_last_writer_wins() {
        let index = build_proposal_index(&[entry("0042-first.md"), entry("0042-second.md")]);
        assert_eq!(index.len(), 1);
        assert_eq!(
            index.link_for("42"),
            Some("https://github.com/simd/0042-second.md")
        );
    }

    #[tokio::test]
    async fn test_fetch_index_degrades_on_error_status() {
        let (addr, handle) = crate::source::tests::spawn_http_server(
            "403 Forbidden",
            "application/json",
            r#"{"message":"API rate limit exceeded"}"#,
        )
        .await;
        let source = HttpDocumentSource::new(Duration::from_secs(5)).unwrap();

        let index = fetch_proposal_index(&source, &format!("http://{addr}/proposals")).await;

        assert!(index.is_empty());
        handle.await.expect("server finished");
    }

    #[tokio::test]
    async fn test_fetch_index_from_listing() {
        let body = r#"[{"name":"0096-reward-collected.md","html_url":"https://github.com/simd/0096.md"}]"#;
        let (addr, handle) =
            crate::source::tests::spawn_http_server("200 OK", "application/json", body).await;
        let source = HttpDocumentSource::new(Duration::from_secs(5)).unwrap();

        let index = fetch_proposal_index(&source, &format!("http://{addr}/proposals")).await;

        assert_eq!(index.link_for("96"), Some("https://github.com/simd/0096.md"));
        handle.await.expect("server finished");
    }

    #[test]
    fn test_fetch_error_display_names_url() {
        let err = FetchError::Status {
            url: "https://api.github.com/x".to_string(),
            status: 500,
        };
        assert_eq!(err.to_string(), "HTTP 500 from https://api.github.com/x");
    }
}

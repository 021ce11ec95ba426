use std::path::PathBuf;

use crate::error::Result;
use crate::rag::types::{RagSource, RagSources};

/// Durable record of every ingested source, persisted as one JSON file.
/// The whole list is loaded and saved atomically; last writer wins.
/// Chunk ids held here are weak references into the vector store.
pub struct SourceRegistry {
    path: PathBuf,
}

impl SourceRegistry {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Missing file is an empty collection, not an error.
    pub fn read(&self) -> Result<RagSources> {
        if !self.path.exists() {
            return Ok(RagSources::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn write(&self, sources: &RagSources) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(sources)?)?;
        Ok(())
    }

    pub fn append(&self, source: RagSource) -> Result<()> {
        let mut sources = self.read()?;
        sources.sources.push(source);
        self.write(&sources)
    }

    /// Remove every record for `url`, persist the filtered list, and return
    /// the removed records. The caller is responsible for deleting their
    /// chunk ids from the vector store.
    pub fn remove(&self, url: &str) -> Result<Vec<RagSource>> {
        let sources = self.read()?;
        let (removed, kept): (Vec<RagSource>, Vec<RagSource>) = sources
            .sources
            .into_iter()
            .partition(|s| s.source_url == url);
        if !removed.is_empty() {
            self.write(&RagSources { sources: kept })?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::types::SourceType;

    fn registry(dir: &tempfile::TempDir) -> SourceRegistry {
        SourceRegistry::new(dir.path().join("rag_sources.json"))
    }

    fn source(url: &str, ids: &[&str]) -> RagSource {
        RagSource {
            source_type: SourceType::WebPage,
            source_url: url.to_string(),
            max_crawl_depth: 0,
            chunk_ids: ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn read_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let sources = registry(&dir).read().unwrap();
        assert!(sources.sources.is_empty());
    }

    #[test]
    fn append_persists_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(&dir);
        reg.append(source("https://a.example", &["1"])).unwrap();
        reg.append(source("https://b.example", &["2", "3"])).unwrap();

        let sources = reg.read().unwrap();
        assert_eq!(sources.sources.len(), 2);
        assert_eq!(sources.sources[0].source_url, "https://a.example");
        assert_eq!(sources.sources[1].chunk_ids, vec!["2", "3"]);
    }

    #[test]
    fn remove_filters_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(&dir);
        reg.append(source("https://a.example", &["1"])).unwrap();
        reg.append(source("https://b.example", &["2"])).unwrap();

        let removed = reg.remove("https://a.example").unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].chunk_ids, vec!["1"]);

        // Removal must be visible to a subsequent read
        let sources = reg.read().unwrap();
        assert_eq!(sources.sources.len(), 1);
        assert_eq!(sources.sources[0].source_url, "https://b.example");
    }

    #[test]
    fn remove_unknown_url_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(&dir);
        reg.append(source("https://a.example", &["1"])).unwrap();
        let removed = reg.remove("https://missing.example").unwrap();
        assert!(removed.is_empty());
        assert_eq!(reg.read().unwrap().sources.len(), 1);
    }

    #[test]
    fn duplicate_urls_are_kept_and_removed_together() {
        // Re-ingesting a URL appends a second record; delete drops both
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(&dir);
        reg.append(source("https://a.example", &["1"])).unwrap();
        reg.append(source("https://a.example", &["2"])).unwrap();

        let removed = reg.remove("https://a.example").unwrap();
        assert_eq!(removed.len(), 2);
        assert!(reg.read().unwrap().sources.is_empty());
    }
}

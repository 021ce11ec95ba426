use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::llm::ChatProvider;
use crate::rag::chunker::{self, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::rag::loader::{validate_url, PageLoader};
use crate::rag::sources::SourceRegistry;
use crate::rag::store::VectorStore;
use crate::rag::types::{Document, RagSource, RagSources, SourceType};

/// Orchestrates the ingest pipeline (crawl, split, embed, insert, record)
/// and keeps the source registry and vector store in sync. Sources and
/// chunks are only ever mutated through explicit ingest/delete calls,
/// never on the per-request chat path.
pub struct RagManager {
    store: VectorStore,
    registry: SourceRegistry,
    provider: Arc<dyn ChatProvider>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RagManager {
    pub async fn new(
        provider: Arc<dyn ChatProvider>,
        store_dir: &Path,
        registry_path: PathBuf,
    ) -> Result<Self> {
        // Probe the embedding dimension once; the store schema is fixed to it
        let probe = provider.embed(&["dimension probe".to_string()]).await?;
        let vector_dim = probe
            .first()
            .map(|v| v.len())
            .ok_or_else(|| Error::store("embedding probe returned no vector"))?;

        let store = VectorStore::open(store_dir, vector_dim).await?;
        let registry = SourceRegistry::new(registry_path);

        Ok(Self {
            store,
            registry,
            provider,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        })
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Ingest a web source: crawl, split, embed, insert, then record the
    /// source with its chunk ids. Returns the number of chunks created.
    pub async fn create_source(&self, url: &str, max_depth: usize) -> Result<usize> {
        validate_url(url)?;
        let loader = PageLoader::new()?;
        let docs = loader.load(url, max_depth).await?;
        self.ingest_documents(url, max_depth, &docs).await
    }

    /// Pipeline tail shared with `create_source`; separated so ingest logic
    /// can run on documents that did not come from the crawler.
    pub async fn ingest_documents(
        &self,
        url: &str,
        max_depth: usize,
        docs: &[Document],
    ) -> Result<usize> {
        let candidates = chunker::split_documents(docs, self.chunk_size, self.chunk_overlap)?;
        let chunk_ids = if candidates.is_empty() {
            Vec::new()
        } else {
            let texts: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
            let embeddings = self.provider.embed(&texts).await?;
            self.store.insert(&candidates, &embeddings).await?
        };

        let record = RagSource {
            source_type: SourceType::WebPage,
            source_url: url.to_string(),
            max_crawl_depth: max_depth,
            chunk_ids: chunk_ids.clone(),
        };

        // Two-phase: if the registry append fails the inserted chunks would
        // be orphaned, so roll the insert back before surfacing the error.
        if let Err(append_err) = self.registry.append(record) {
            if let Err(rollback_err) = self.store.delete(&chunk_ids).await {
                tracing::error!(
                    "rollback after failed registry append also failed, {} chunks orphaned: {}",
                    chunk_ids.len(),
                    rollback_err
                );
            }
            return Err(append_err);
        }

        tracing::info!("ingested {} with {} chunks", url, chunk_ids.len());
        Ok(chunk_ids.len())
    }

    pub fn read_sources(&self) -> Result<RagSources> {
        self.registry.read()
    }

    /// Delete a source and its chunks. Returns false when the url was not
    /// registered (a no-op, not an error). The registry record is only
    /// dropped once the store delete succeeded, so a registered chunk id
    /// always exists in the store.
    pub async fn delete_source(&self, url: &str) -> Result<bool> {
        let sources = self.registry.read()?;
        let chunk_ids: Vec<String> = sources
            .sources
            .iter()
            .filter(|s| s.source_url == url)
            .flat_map(|s| s.chunk_ids.iter().cloned())
            .collect();
        let found = sources.sources.iter().any(|s| s.source_url == url);
        if !found {
            return Ok(false);
        }

        self.store.delete(&chunk_ids).await?;
        self.registry.remove(url)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockProvider;
    use std::collections::HashMap;

    fn page(url: &str, len: usize) -> Document {
        Document {
            source_url: url.to_string(),
            text: "b".repeat(len),
            metadata: HashMap::new(),
        }
    }

    async fn manager(dir: &tempfile::TempDir) -> RagManager {
        RagManager::new(
            Arc::new(MockProvider::new()),
            &dir.path().join("rag"),
            dir.path().join("rag_sources.json"),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn ingest_records_source_with_chunk_ids() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(&dir).await;

        // 1200 chars at the default 500/0 split into exactly 3 chunks
        let created = mgr
            .ingest_documents("https://example.com", 0, &[page("https://example.com", 1200)])
            .await
            .unwrap();
        assert_eq!(created, 3);

        let sources = mgr.read_sources().unwrap();
        assert_eq!(sources.sources.len(), 1);
        assert_eq!(sources.sources[0].source_url, "https://example.com");
        assert_eq!(sources.sources[0].chunk_ids.len(), 3);
        assert_eq!(mgr.store().count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn delete_removes_record_and_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(&dir).await;
        mgr.ingest_documents("https://example.com", 0, &[page("https://example.com", 1200)])
            .await
            .unwrap();

        let deleted = mgr.delete_source("https://example.com").await.unwrap();
        assert!(deleted);

        // Removal is a verified postcondition on both sides
        assert!(mgr.read_sources().unwrap().sources.is_empty());
        assert_eq!(mgr.store().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_unknown_url_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(&dir).await;
        let deleted = mgr.delete_source("https://nobody.example").await.unwrap();
        assert!(!deleted);
    }

    #[tokio::test]
    async fn reingest_appends_second_record() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(&dir).await;
        let doc = page("https://example.com", 600);
        mgr.ingest_documents("https://example.com", 0, &[doc.clone()])
            .await
            .unwrap();
        mgr.ingest_documents("https://example.com", 0, &[doc])
            .await
            .unwrap();

        assert_eq!(mgr.read_sources().unwrap().sources.len(), 2);
        assert_eq!(mgr.store().count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn failed_registry_append_rolls_back_inserted_chunks() {
        let dir = tempfile::tempdir().unwrap();
        // Registry path is a directory, so every write to it fails
        let registry_dir = dir.path().join("registry_as_dir");
        std::fs::create_dir_all(&registry_dir).unwrap();

        let mgr = RagManager::new(
            Arc::new(MockProvider::new()),
            &dir.path().join("rag"),
            registry_dir,
        )
        .await
        .unwrap();

        let result = mgr
            .ingest_documents("https://example.com", 0, &[page("https://example.com", 1200)])
            .await;
        assert!(result.is_err());
        assert_eq!(mgr.store().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn create_source_validates_url_before_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(&dir).await;
        let result = mgr.create_source("not-a-url", 0).await;
        assert!(matches!(result, Err(Error::Validation(_))));
        assert!(mgr.read_sources().unwrap().sources.is_empty());
    }
}

use arrow_array::{Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use futures::TryStreamExt;
use lancedb::{
    connect,
    query::{ExecutableQuery, QueryBase},
    Connection, DistanceType,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::rag::types::{ChunkCandidate, SearchResult, StoredChunk};

const TABLE_NAME: &str = "rag_chunks";

/// Durable on-disk embedding index. Entries are immutable once inserted;
/// the only mutations are insert and delete-by-id. One store per install.
pub struct VectorStore {
    db: Connection,
    vector_dim: usize,
}

fn store_err(e: impl std::fmt::Display) -> Error {
    Error::store(e)
}

impl VectorStore {
    fn quote_filter_string(input: &str) -> String {
        input.replace('\'', "''")
    }

    fn chunk_schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("source_url", DataType::Utf8, false),
            Field::new("chunk_index", DataType::Int32, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("metadata", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.vector_dim as i32,
                ),
                false,
            ),
        ]))
    }

    pub async fn open(dir: &Path, vector_dim: usize) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir
            .to_str()
            .ok_or_else(|| Error::store("non-UTF-8 store path"))?;
        let db = connect(path).execute().await.map_err(store_err)?;

        let store = Self { db, vector_dim };
        store.initialize_table().await?;
        Ok(store)
    }

    async fn initialize_table(&self) -> Result<()> {
        let table_names = self.db.table_names().execute().await.map_err(store_err)?;
        if !table_names.contains(&TABLE_NAME.to_string()) {
            use arrow::record_batch::RecordBatchIterator;
            use std::iter::once;
            let schema = self.chunk_schema();
            let empty_batch = RecordBatch::new_empty(schema.clone());
            let batch_reader = RecordBatchIterator::new(once(Ok(empty_batch)), schema);
            self.db
                .create_table(TABLE_NAME, batch_reader)
                .execute()
                .await
                .map_err(store_err)?;
        }
        Ok(())
    }

    /// Persist candidates with their embeddings, assigning a fresh id to
    /// each. Every returned id is immediately retrievable.
    pub async fn insert(
        &self,
        candidates: &[ChunkCandidate],
        embeddings: &[Vec<f32>],
    ) -> Result<Vec<String>> {
        if candidates.len() != embeddings.len() {
            return Err(Error::validation(format!(
                "got {} embeddings for {} chunks",
                embeddings.len(),
                candidates.len()
            )));
        }
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        for embedding in embeddings {
            if embedding.len() != self.vector_dim {
                return Err(Error::validation(format!(
                    "embedding dimension {} does not match store dimension {}",
                    embedding.len(),
                    self.vector_dim
                )));
            }
        }

        let ids: Vec<String> = candidates
            .iter()
            .map(|_| uuid::Uuid::new_v4().to_string())
            .collect();
        let source_urls: Vec<&str> = candidates.iter().map(|c| c.source_url.as_str()).collect();
        let chunk_indices: Vec<i32> = candidates.iter().map(|c| c.chunk_index).collect();
        let contents: Vec<&str> = candidates.iter().map(|c| c.text.as_str()).collect();
        let metadatas: Vec<String> = candidates
            .iter()
            .map(|c| serde_json::to_string(&c.metadata).unwrap_or_else(|_| "{}".to_string()))
            .collect();

        let embedding_values: Vec<f32> = embeddings.iter().flat_map(|e| e.iter().copied()).collect();
        let embedding_array = FixedSizeListArray::try_new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            self.vector_dim as i32,
            Arc::new(Float32Array::from(embedding_values)),
            None,
        )
        .map_err(store_err)?;

        let schema = self.chunk_schema();
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(
                    ids.iter().map(|s| s.as_str()).collect::<Vec<&str>>(),
                )),
                Arc::new(StringArray::from(source_urls)),
                Arc::new(Int32Array::from(chunk_indices)),
                Arc::new(StringArray::from(contents)),
                Arc::new(StringArray::from(
                    metadatas.iter().map(|s| s.as_str()).collect::<Vec<&str>>(),
                )),
                Arc::new(embedding_array),
            ],
        )
        .map_err(store_err)?;

        let table = self
            .db
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(store_err)?;

        use arrow::record_batch::RecordBatchIterator;
        use std::iter::once;
        let batch_reader = RecordBatchIterator::new(once(Ok(batch.clone())), batch.schema());
        table.add(batch_reader).execute().await.map_err(store_err)?;

        Ok(ids)
    }

    /// Top-k nearest chunks by cosine distance, best first. Returns fewer
    /// than k when the store holds fewer entries.
    pub async fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        let table = self
            .db
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(store_err)?;

        let query = table
            .vector_search(query_embedding)
            .map_err(store_err)?
            .distance_type(DistanceType::Cosine)
            .limit(k);

        let mut results = query.execute().await.map_err(store_err)?;
        let mut search_results = Vec::new();

        while let Some(batch) = results.try_next().await.map_err(store_err)? {
            if batch.num_rows() == 0 {
                continue;
            }

            let ids = string_column(&batch, "id")?;
            let source_urls = string_column(&batch, "source_url")?;
            let chunk_indices = batch
                .column_by_name("chunk_index")
                .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
                .ok_or_else(|| Error::store("missing chunk_index column"))?;
            let contents = string_column(&batch, "content")?;
            let metadatas = string_column(&batch, "metadata")?;
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| Error::store("missing _distance column"))?;

            for i in 0..batch.num_rows() {
                let metadata: HashMap<String, serde_json::Value> =
                    serde_json::from_str(metadatas.value(i)).unwrap_or_default();
                search_results.push(SearchResult {
                    chunk: StoredChunk {
                        id: ids.value(i).to_string(),
                        source_url: source_urls.value(i).to_string(),
                        chunk_index: chunk_indices.value(i),
                        content: contents.value(i).to_string(),
                        metadata,
                    },
                    relevance_score: 1.0 - distances.value(i),
                });
            }
        }

        Ok(search_results)
    }

    /// Delete entries by id. Idempotent: absent ids are not an error.
    pub async fn delete(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let table = self
            .db
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(store_err)?;

        let quoted: Vec<String> = ids
            .iter()
            .map(|id| format!("'{}'", Self::quote_filter_string(id)))
            .collect();
        table
            .delete(&format!("id IN ({})", quoted.join(", ")))
            .await
            .map_err(store_err)?;
        Ok(())
    }

    pub async fn count(&self) -> Result<usize> {
        let table = self
            .db
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(store_err)?;
        table.count_rows(None).await.map_err(store_err)
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| Error::store(format!("missing {name} column")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::{MockProvider, MOCK_EMBEDDING_DIM};

    fn candidate(text: &str, index: i32) -> ChunkCandidate {
        ChunkCandidate {
            text: text.to_string(),
            source_url: "https://example.com".to_string(),
            chunk_index: index,
            metadata: HashMap::new(),
        }
    }

    async fn open_store(dir: &tempfile::TempDir) -> VectorStore {
        VectorStore::open(dir.path(), MOCK_EMBEDDING_DIM).await.unwrap()
    }

    #[tokio::test]
    async fn insert_then_search_returns_matching_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let texts = ["the quick brown fox", "rust borrow checker", "vector search"];
        let candidates: Vec<ChunkCandidate> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| candidate(t, i as i32))
            .collect();
        let embeddings: Vec<Vec<f32>> =
            texts.iter().map(|t| MockProvider::embedding_for(t)).collect();

        let ids = store.insert(&candidates, &embeddings).await.unwrap();
        assert_eq!(ids.len(), 3);

        for (i, text) in texts.iter().enumerate() {
            let results = store
                .search(&MockProvider::embedding_for(text), 1)
                .await
                .unwrap();
            assert_eq!(results.len(), 1);
            assert_eq!(results[0].chunk.id, ids[i]);
            assert_eq!(results[0].chunk.content, *text);
        }
    }

    #[tokio::test]
    async fn search_returns_fewer_than_k_when_store_is_small() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let embeddings = vec![MockProvider::embedding_for("only entry")];
        store
            .insert(&[candidate("only entry", 0)], &embeddings)
            .await
            .unwrap();

        let results = store
            .search(&MockProvider::embedding_for("only entry"), 10)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let embeddings = vec![MockProvider::embedding_for("to delete")];
        let ids = store
            .insert(&[candidate("to delete", 0)], &embeddings)
            .await
            .unwrap();

        store.delete(&ids).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        // Deleting an already-absent id is not an error
        store.delete(&ids).await.unwrap();
        store.delete(&["never-existed".to_string()]).await.unwrap();
    }

    #[tokio::test]
    async fn insert_rejects_mismatched_embeddings() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let result = store.insert(&[candidate("text", 0)], &[]).await;
        assert!(matches!(result, Err(Error::Validation(_))));

        let wrong_dim = vec![vec![0.5f32; MOCK_EMBEDDING_DIM + 1]];
        let result = store.insert(&[candidate("text", 0)], &wrong_dim).await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let ids = {
            let store = open_store(&dir).await;
            store
                .insert(
                    &[candidate("persistent", 0)],
                    &[MockProvider::embedding_for("persistent")],
                )
                .await
                .unwrap()
        };

        let store = open_store(&dir).await;
        assert_eq!(store.count().await.unwrap(), 1);
        let results = store
            .search(&MockProvider::embedding_for("persistent"), 1)
            .await
            .unwrap();
        assert_eq!(results[0].chunk.id, ids[0]);
    }
}

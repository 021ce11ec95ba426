//! History-aware retrieval chain. A request walks four stages in order:
//! contextualize the question against prior turns, retrieve matching
//! chunks, generate the answer grounded in them, then append the turn to
//! history. History is only written after a successful generation.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::history::{ChatHistory, ChatMessage};
use crate::llm::{ChatProvider, RequestOptions, TokenEvent};
use crate::rag::store::VectorStore;

pub const DEFAULT_TOP_K: usize = 4;

pub struct RetrievalChain {
    provider: Arc<dyn ChatProvider>,
    contextualize_prompt: String,
    system_prompt: String,
    top_k: usize,
}

impl RetrievalChain {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        contextualize_prompt: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            contextualize_prompt: contextualize_prompt.into(),
            system_prompt: system_prompt.into(),
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Run one request through the chain. When `tx` is given the answer is
    /// streamed token by token; the full answer is returned either way.
    pub async fn ask(
        &self,
        store: &VectorStore,
        history: &mut ChatHistory,
        input: &str,
        options: &RequestOptions,
        tx: Option<mpsc::Sender<TokenEvent>>,
    ) -> Result<String> {
        let standalone = self.contextualize(history, input, options).await?;
        let context = self.retrieve(store, &standalone).await?;
        let answer = self.generate(history, input, &context, options, tx).await?;

        // Only the successful turn reaches persistent history, and only the
        // original input, never the rewritten question or the context.
        history.append(ChatMessage::human(input))?;
        history.append(ChatMessage::ai(&answer))?;
        Ok(answer)
    }

    /// Rewrite the question to stand alone. With no prior turns there is
    /// nothing to resolve, so the input passes through without a model call.
    async fn contextualize(
        &self,
        history: &ChatHistory,
        input: &str,
        options: &RequestOptions,
    ) -> Result<String> {
        if history.all().is_empty() {
            return Ok(input.to_string());
        }
        self.provider
            .chat(&self.contextualize_prompt, history.all(), input, options)
            .await
            .map_err(|e| Error::generation(format!("contextualize stage failed: {}", e)))
    }

    async fn retrieve(&self, store: &VectorStore, standalone: &str) -> Result<String> {
        let query = self
            .provider
            .embed(&[standalone.to_string()])
            .await
            .map_err(|e| Error::generation(format!("query embedding failed: {}", e)))?;
        let query = query
            .into_iter()
            .next()
            .ok_or_else(|| Error::generation("query embedding returned no vector"))?;

        let results = store.search(&query, self.top_k).await?;
        let context: Vec<String> = results.into_iter().map(|r| r.chunk.content).collect();
        Ok(context.join("\n\n"))
    }

    async fn generate(
        &self,
        history: &ChatHistory,
        input: &str,
        context: &str,
        options: &RequestOptions,
        tx: Option<mpsc::Sender<TokenEvent>>,
    ) -> Result<String> {
        let system = self.system_prompt.replace("{context}", context);
        let result = match tx {
            Some(tx) => {
                self.provider
                    .stream_chat(&system, history.all(), input, options, tx)
                    .await
            }
            None => self.provider.chat(&system, history.all(), input, options).await,
        };
        result.map_err(|e| Error::generation(format!("generation failed: {}", e)))
    }
}

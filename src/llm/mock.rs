//! Scripted in-process provider used by tests. No network, deterministic
//! embeddings, optional failure injection.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::history::ChatMessage;
use crate::llm::{AiService, ChatProvider, RequestOptions, TokenEvent};

pub const MOCK_EMBEDDING_DIM: usize = 8;

#[derive(Default)]
pub struct MockProvider {
    /// Answers popped front-first; when empty, chat echoes its input.
    pub scripted: Mutex<VecDeque<String>>,
    /// When true, every chat call fails.
    pub fail_chat: bool,
    /// When true, every embed call fails.
    pub fail_embed: bool,
    /// Record of (system, input) pairs for every chat call made.
    pub calls: Mutex<Vec<(String, String)>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_answers(answers: &[&str]) -> Self {
        Self {
            scripted: Mutex::new(answers.iter().map(|s| s.to_string()).collect()),
            ..Self::default()
        }
    }

    pub fn failing_chat() -> Self {
        Self {
            fail_chat: true,
            ..Self::default()
        }
    }

    pub fn chat_call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn next_answer(&self, input: &str) -> String {
        self.scripted
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| input.to_string())
    }

    /// Same text always maps to the same vector; distinct texts diverge.
    pub fn embedding_for(text: &str) -> Vec<f32> {
        let mut vector = Vec::with_capacity(MOCK_EMBEDDING_DIM);
        for i in 0..MOCK_EMBEDDING_DIM {
            let mut hash: u64 = 0xcbf29ce484222325 ^ (i as u64);
            for byte in text.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(0x100000001b3);
            }
            // Map to [-1.0, 1.0]
            vector.push((hash % 2000) as f32 / 1000.0 - 1.0);
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt().max(1e-6);
        vector.iter().map(|v| v / norm).collect()
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    fn service(&self) -> AiService {
        AiService::Ollama
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(vec!["mock-model".to_string(), "mock-model-2".to_string()])
    }

    async fn chat(
        &self,
        system: &str,
        _history: &[ChatMessage],
        input: &str,
        _options: &RequestOptions,
    ) -> Result<String> {
        if self.fail_chat {
            return Err(Error::provider("mock", "chat failure injected"));
        }
        self.calls
            .lock()
            .unwrap()
            .push((system.to_string(), input.to_string()));
        Ok(self.next_answer(input))
    }

    async fn stream_chat(
        &self,
        system: &str,
        history: &[ChatMessage],
        input: &str,
        options: &RequestOptions,
        tx: mpsc::Sender<TokenEvent>,
    ) -> Result<String> {
        let answer = self.chat(system, history, input, options).await?;
        for word in answer.split_inclusive(' ') {
            let _ = tx.send(TokenEvent::Token(word.to_string())).await;
        }
        let _ = tx.send(TokenEvent::Done).await;
        Ok(answer)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.fail_embed {
            return Err(Error::provider("mock", "embed failure injected"));
        }
        Ok(texts.iter().map(|t| Self::embedding_for(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeddings_are_deterministic_and_distinct() {
        let a1 = MockProvider::embedding_for("alpha");
        let a2 = MockProvider::embedding_for("alpha");
        let b = MockProvider::embedding_for("beta");
        assert_eq!(a1, a2);
        assert_ne!(a1, b);
        assert_eq!(a1.len(), MOCK_EMBEDDING_DIM);
    }

    #[tokio::test]
    async fn scripted_answers_pop_in_order() {
        let provider = MockProvider::with_answers(&["one", "two"]);
        let options = RequestOptions {
            max_tokens: 16,
            model_kwargs: Default::default(),
        };
        assert_eq!(provider.chat("s", &[], "x", &options).await.unwrap(), "one");
        assert_eq!(provider.chat("s", &[], "y", &options).await.unwrap(), "two");
        // Exhausted script falls back to echo
        assert_eq!(provider.chat("s", &[], "z", &options).await.unwrap(), "z");
    }
}

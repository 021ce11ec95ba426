use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::history::{ChatMessage, Role};
use crate::llm::{AiService, ChatProvider, RequestOptions, TokenEvent};

const DEFAULT_HOST: &str = "http://localhost:11434";

pub struct OllamaProvider {
    model: String,
    host: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
}

#[derive(Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaProvider {
    pub fn new(model: String) -> Result<Self> {
        let host = std::env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(|e| Error::provider("ollama", e))?;

        Ok(Self {
            model,
            host,
            client,
        })
    }

    fn build_body(
        &self,
        system: &str,
        history: &[ChatMessage],
        input: &str,
        options: &RequestOptions,
        stream: bool,
    ) -> serde_json::Value {
        let mut messages = vec![serde_json::json!({ "role": "system", "content": system })];
        for msg in history {
            let role = match msg.role {
                Role::Human => "user",
                Role::Ai => "assistant",
            };
            messages.push(serde_json::json!({ "role": role, "content": msg.content }));
        }
        messages.push(serde_json::json!({ "role": "user", "content": input }));

        let mut opts = serde_json::json!({ "num_predict": options.max_tokens });
        for (key, value) in &options.model_kwargs {
            opts[key] = value.clone();
        }

        serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": stream,
            "options": opts,
        })
    }

    async fn post_chat(&self, body: &serde_json::Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}/api/chat", self.host))
            .json(body)
            .send()
            .await
            .map_err(|e| Error::provider("ollama", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::provider("ollama", format!("HTTP {status}: {text}")));
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatProvider for OllamaProvider {
    fn service(&self) -> AiService {
        AiService::Ollama
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.host))
            .send()
            .await
            .map_err(|e| Error::provider("ollama", e))?;

        if !response.status().is_success() {
            return Err(Error::provider(
                "ollama",
                format!("HTTP {}", response.status()),
            ));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| Error::provider("ollama", e))?;
        let mut names: Vec<String> = tags.models.into_iter().map(|m| m.name).collect();
        names.sort();
        Ok(names)
    }

    async fn chat(
        &self,
        system: &str,
        history: &[ChatMessage],
        input: &str,
        options: &RequestOptions,
    ) -> Result<String> {
        let body = self.build_body(system, history, input, options, false);
        let response = self.post_chat(&body).await?;
        let chunk: ChatChunk = response
            .json()
            .await
            .map_err(|e| Error::provider("ollama", e))?;
        Ok(chunk.message.map(|m| m.content).unwrap_or_default())
    }

    async fn stream_chat(
        &self,
        system: &str,
        history: &[ChatMessage],
        input: &str,
        options: &RequestOptions,
        tx: mpsc::Sender<TokenEvent>,
    ) -> Result<String> {
        let body = self.build_body(system, history, input, options, true);
        let response = self.post_chat(&body).await?;

        // Streaming responses are newline-delimited JSON objects
        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        let mut answer = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::provider("ollama", e))?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(newline) = buffer.find('\n') {
                let line = buffer[..newline].trim().to_string();
                buffer.drain(..=newline);
                if line.is_empty() {
                    continue;
                }
                let parsed: ChatChunk = match serde_json::from_str(&line) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        tracing::debug!("skipping unparseable stream line: {}", e);
                        continue;
                    }
                };
                if let Some(message) = parsed.message {
                    if !message.content.is_empty() {
                        answer.push_str(&message.content);
                        let _ = tx.send(TokenEvent::Token(message.content)).await;
                    }
                }
                if parsed.done {
                    break;
                }
            }
        }

        let _ = tx.send(TokenEvent::Done).await;
        Ok(answer)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let response = self
            .client
            .post(format!("{}/api/embed", self.host))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::provider("ollama", e))?;

        if !response.status().is_success() {
            return Err(Error::provider(
                "ollama",
                format!("HTTP {}", response.status()),
            ));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::provider("ollama", e))?;

        if parsed.embeddings.len() != texts.len() {
            return Err(Error::provider(
                "ollama",
                format!(
                    "embedding count mismatch: requested {}, got {}",
                    texts.len(),
                    parsed.embeddings.len()
                ),
            ));
        }
        Ok(parsed.embeddings)
    }
}

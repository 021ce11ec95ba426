use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::history::{ChatMessage, Role};
use crate::llm::{AiService, ChatProvider, RequestOptions, TokenEvent};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const EMBEDDING_MODEL: &str = "text-embedding-3-small";

pub struct OpenAiProvider {
    model: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct ModelsResponse {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Deserialize)]
struct EmbeddingEntry {
    embedding: Vec<f32>,
}

impl OpenAiProvider {
    pub fn new(model: String) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| Error::provider("openai", "OPENAI_API_KEY is not set"))?;
        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| Error::provider("openai", e))?;

        Ok(Self {
            model,
            base_url,
            api_key,
            client,
        })
    }

    fn build_messages(system: &str, history: &[ChatMessage], input: &str) -> Vec<serde_json::Value> {
        let mut messages = vec![serde_json::json!({ "role": "system", "content": system })];
        for msg in history {
            let role = match msg.role {
                Role::Human => "user",
                Role::Ai => "assistant",
            };
            messages.push(serde_json::json!({ "role": role, "content": msg.content }));
        }
        messages.push(serde_json::json!({ "role": "user", "content": input }));
        messages
    }

    fn build_body(
        &self,
        system: &str,
        history: &[ChatMessage],
        input: &str,
        options: &RequestOptions,
        stream: bool,
    ) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": Self::build_messages(system, history, input),
            "max_tokens": options.max_tokens,
            "stream": stream,
        });
        for (key, value) in &options.model_kwargs {
            body[key] = value.clone();
        }
        body
    }

    async fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::provider("openai", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::provider("openai", format!("HTTP {status}: {text}")));
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn service(&self) -> AiService {
        AiService::OpenAi
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| Error::provider("openai", e))?;

        if !response.status().is_success() {
            return Err(Error::provider(
                "openai",
                format!("HTTP {}", response.status()),
            ));
        }

        let models: ModelsResponse = response
            .json()
            .await
            .map_err(|e| Error::provider("openai", e))?;
        let mut ids: Vec<String> = models.data.into_iter().map(|m| m.id).collect();
        ids.sort();
        Ok(ids)
    }

    async fn chat(
        &self,
        system: &str,
        history: &[ChatMessage],
        input: &str,
        options: &RequestOptions,
    ) -> Result<String> {
        let body = self.build_body(system, history, input, options, false);
        let response = self.post_json("/chat/completions", &body).await?;
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::provider("openai", e))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::provider("openai", "empty completion response"))
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
        let response = self.post_json("/chat/completions", &body).await?;

        // Server-sent events: `data: {json}` lines, terminated by [DONE]
        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        let mut answer = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::provider("openai", e))?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(newline) = buffer.find('\n') {
                let line = buffer[..newline].trim().to_string();
                buffer.drain(..=newline);

                let Some(data) = line.strip_prefix("data: ") else {
                    continue;
                };
                if data == "[DONE]" {
                    continue;
                }
                let parsed: StreamChunk = match serde_json::from_str(data) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        tracing::debug!("skipping unparseable stream chunk: {}", e);
                        continue;
                    }
                };
                if let Some(token) = parsed
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.delta.content)
                {
                    answer.push_str(&token);
                    let _ = tx.send(TokenEvent::Token(token)).await;
                }
            }
        }

        let _ = tx.send(TokenEvent::Done).await;
        Ok(answer)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": EMBEDDING_MODEL,
            "input": texts,
        });
        let response = self.post_json("/embeddings", &body).await?;
        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| Error::provider("openai", e))?;

        if parsed.data.len() != texts.len() {
            return Err(Error::provider(
                "openai",
                format!(
                    "embedding count mismatch: requested {}, got {}",
                    texts.len(),
                    parsed.data.len()
                ),
            ));
        }
        Ok(parsed.data.into_iter().map(|e| e.embedding).collect())
    }
}

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_bedrockruntime::primitives::Blob;
use aws_sdk_bedrockruntime::types::{
    ContentBlock, ContentBlockDelta, ConversationRole, ConverseStreamOutput,
    InferenceConfiguration, Message, SystemContentBlock,
};
use serde::Deserialize;
use tokio::sync::{mpsc, OnceCell};

use crate::error::{Error, Result};
use crate::history::{ChatMessage, Role};
use crate::llm::{AiService, ChatProvider, RequestOptions, TokenEvent};

const EMBEDDING_MODEL: &str = "amazon.titan-embed-text-v2:0";

pub struct BedrockProvider {
    model: String,
    // SDK config resolution hits the instance metadata service, so it is
    // deferred until the first call and shared afterwards.
    config: OnceCell<aws_config::SdkConfig>,
}

#[derive(Deserialize)]
struct TitanEmbedResponse {
    embedding: Vec<f32>,
}

impl BedrockProvider {
    pub fn new(model: String) -> Self {
        Self {
            model,
            config: OnceCell::new(),
        }
    }

    async fn sdk_config(&self) -> &aws_config::SdkConfig {
        self.config
            .get_or_init(|| async { aws_config::load_defaults(BehaviorVersion::latest()).await })
            .await
    }

    fn build_messages(history: &[ChatMessage], input: &str) -> Result<Vec<Message>> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        for msg in history {
            let role = match msg.role {
                Role::Human => ConversationRole::User,
                Role::Ai => ConversationRole::Assistant,
            };
            messages.push(
                Message::builder()
                    .role(role)
                    .content(ContentBlock::Text(msg.content.clone()))
                    .build()
                    .map_err(|e| Error::provider("bedrock", e))?,
            );
        }
        messages.push(
            Message::builder()
                .role(ConversationRole::User)
                .content(ContentBlock::Text(input.to_string()))
                .build()
                .map_err(|e| Error::provider("bedrock", e))?,
        );
        Ok(messages)
    }

    fn inference_config(options: &RequestOptions) -> InferenceConfiguration {
        let mut builder = InferenceConfiguration::builder().max_tokens(options.max_tokens as i32);
        if let Some(temperature) = options.model_kwargs.get("temperature").and_then(|v| v.as_f64()) {
            builder = builder.temperature(temperature as f32);
        }
        if let Some(top_p) = options.model_kwargs.get("top_p").and_then(|v| v.as_f64()) {
            builder = builder.top_p(top_p as f32);
        }
        builder.build()
    }
}

#[async_trait]
impl ChatProvider for BedrockProvider {
    fn service(&self) -> AiService {
        AiService::Bedrock
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let client = aws_sdk_bedrock::Client::new(self.sdk_config().await);
        let response = client
            .list_foundation_models()
            .by_output_modality(aws_sdk_bedrock::types::ModelModality::Text)
            .send()
            .await
            .map_err(|e| Error::provider("bedrock", e))?;

        let mut ids: Vec<String> = response
            .model_summaries()
            .iter()
            .map(|summary| summary.model_id().to_string())
            .collect();
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
        let client = aws_sdk_bedrockruntime::Client::new(self.sdk_config().await);
        let response = client
            .converse()
            .model_id(&self.model)
            .system(SystemContentBlock::Text(system.to_string()))
            .set_messages(Some(Self::build_messages(history, input)?))
            .inference_config(Self::inference_config(options))
            .send()
            .await
            .map_err(|e| Error::provider("bedrock", e))?;

        let message = response
            .output()
            .and_then(|output| output.as_message().ok())
            .ok_or_else(|| Error::provider("bedrock", "empty converse response"))?;

        let mut answer = String::new();
        for block in message.content() {
            if let Ok(text) = block.as_text() {
                answer.push_str(text);
            }
        }
        Ok(answer)
    }

    async fn stream_chat(
        &self,
        system: &str,
        history: &[ChatMessage],
        input: &str,
        options: &RequestOptions,
        tx: mpsc::Sender<TokenEvent>,
    ) -> Result<String> {
        let client = aws_sdk_bedrockruntime::Client::new(self.sdk_config().await);
        let response = client
            .converse_stream()
            .model_id(&self.model)
            .system(SystemContentBlock::Text(system.to_string()))
            .set_messages(Some(Self::build_messages(history, input)?))
            .inference_config(Self::inference_config(options))
            .send()
            .await
            .map_err(|e| Error::provider("bedrock", e))?;

        let mut stream = response.stream;
        let mut answer = String::new();

        loop {
            let event = stream
                .recv()
                .await
                .map_err(|e| Error::provider("bedrock", e))?;
            match event {
                Some(ConverseStreamOutput::ContentBlockDelta(delta)) => {
                    if let Some(ContentBlockDelta::Text(token)) = delta.delta() {
                        answer.push_str(token);
                        let _ = tx.send(TokenEvent::Token(token.clone())).await;
                    }
                }
                Some(_) => {}
                None => break,
            }
        }

        let _ = tx.send(TokenEvent::Done).await;
        Ok(answer)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let client = aws_sdk_bedrockruntime::Client::new(self.sdk_config().await);
        let mut embeddings = Vec::with_capacity(texts.len());

        // Titan embedding models take one input text per invocation
        for text in texts {
            let body = serde_json::to_vec(&serde_json::json!({ "inputText": text }))?;
            let response = client
                .invoke_model()
                .model_id(EMBEDDING_MODEL)
                .content_type("application/json")
                .accept("application/json")
                .body(Blob::new(body))
                .send()
                .await
                .map_err(|e| Error::provider("bedrock", e))?;

            let parsed: TitanEmbedResponse = serde_json::from_slice(response.body().as_ref())
                .map_err(|e| Error::provider("bedrock", format!("bad embedding payload: {e}")))?;
            embeddings.push(parsed.embedding);
        }

        Ok(embeddings)
    }
}

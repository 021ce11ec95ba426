// Copyright 2026 Jussi Kettu
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

pub mod bedrock;
#[cfg(test)]
pub mod mock;
pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use std::str::FromStr;
use tokio::sync::mpsc;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::history::ChatMessage;

/// Supported AI backends. A closed set: adding a service is a compile-time
/// exhaustiveness concern, not a string comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiService {
    Bedrock,
    OpenAi,
    Ollama,
}

impl AiService {
    pub const ALL: [AiService; 3] = [AiService::Bedrock, AiService::OpenAi, AiService::Ollama];
}

impl std::fmt::Display for AiService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AiService::Bedrock => write!(f, "bedrock"),
            AiService::OpenAi => write!(f, "openai"),
            AiService::Ollama => write!(f, "ollama"),
        }
    }
}

impl FromStr for AiService {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "bedrock" | "aws bedrock" => Ok(AiService::Bedrock),
            "openai" | "openai chatgpt" => Ok(AiService::OpenAi),
            "ollama" => Ok(AiService::Ollama),
            other => Err(Error::validation(format!(
                "unknown AI service: {other} (expected one of: bedrock, openai, ollama)"
            ))),
        }
    }
}

/// Streaming event delivered over a channel while an answer is generated.
/// Errors are not an event: they propagate through the call's `Result`.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenEvent {
    Token(String),
    Done,
}

/// Tunables forwarded with each chat call, derived from Settings.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub max_tokens: usize,
    pub model_kwargs: std::collections::HashMap<String, serde_json::Value>,
}

impl RequestOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_tokens: settings.max_tokens,
            model_kwargs: settings.model_kwargs.clone(),
        }
    }
}

/// Capability interface every backend implements: model listing, chat
/// completion (buffered and streaming) and text embeddings. No internal
/// retries; the caller decides.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn service(&self) -> AiService;

    fn model(&self) -> &str;

    async fn list_models(&self) -> Result<Vec<String>>;

    /// Full-answer completion over the given history.
    async fn chat(
        &self,
        system: &str,
        history: &[ChatMessage],
        input: &str,
        options: &RequestOptions,
    ) -> Result<String>;

    /// Streaming completion: tokens are sent over `tx` as they arrive,
    /// terminated by `TokenEvent::Done`. The full answer is also returned.
    async fn stream_chat(
        &self,
        system: &str,
        history: &[ChatMessage],
        input: &str,
        options: &RequestOptions,
        tx: mpsc::Sender<TokenEvent>,
    ) -> Result<String>;

    /// One embedding per input text, order preserved.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Construct the provider for the configured (service, model) pair.
pub fn provider_for(service: AiService, settings: &Settings) -> Result<Box<dyn ChatProvider>> {
    let model = settings
        .ai_model
        .clone()
        .ok_or_else(|| Error::validation("no ai_model configured; run `takki settings set ai_model <id>`"))?;

    Ok(match service {
        AiService::Bedrock => Box::new(bedrock::BedrockProvider::new(model)),
        AiService::OpenAi => Box::new(openai::OpenAiProvider::new(model)?),
        AiService::Ollama => Box::new(ollama::OllamaProvider::new(model)?),
    })
}

/// Provider with no model bound. Only good for `list_models`; chat and
/// embedding calls need a real model id.
pub fn listing_provider(service: AiService) -> Result<Box<dyn ChatProvider>> {
    Ok(match service {
        AiService::Bedrock => Box::new(bedrock::BedrockProvider::new(String::new())),
        AiService::OpenAi => Box::new(openai::OpenAiProvider::new(String::new())?),
        AiService::Ollama => Box::new(ollama::OllamaProvider::new(String::new())?),
    })
}

/// Parse the configured service or fail with a validation error.
pub fn configured_service(settings: &Settings) -> Result<AiService> {
    settings
        .ai_service
        .as_deref()
        .ok_or_else(|| Error::validation("no ai_service configured; run `takki settings set ai_service <name>`"))?
        .parse()
}

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

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};

pub const DEFAULT_PERSONA: &str =
    "You are a helpful assistant. Answer all questions to the best of your ability.";

pub const DEFAULT_CONTEXTUALIZE_PROMPT: &str = "Given a chat history and the latest user question \
which might reference context in the chat history, formulate a standalone question \
which can be understood without the chat history. Do NOT answer the question, \
just reformulate it if needed and otherwise return it as is.";

pub const DEFAULT_RAG_SYSTEM_PROMPT: &str = "You are an assistant for question-answering tasks. \
Use the following pieces of retrieved context to answer the question. \
If you don't know the answer, just say that you don't know. \
Use two sentences maximum and keep the answer concise.\n\n{context}";

/// User settings, one record per install. Loaded at startup and replaced
/// wholesale on save; there are no partial updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub version: f32,
    pub ai_service: Option<String>,
    pub ai_model: Option<String>,
    pub persona: String,
    pub streaming: bool,
    pub model_kwargs: HashMap<String, serde_json::Value>,
    pub history_depth: usize,
    pub max_tokens: usize,
    pub rag_enabled: bool,
    pub rag_vector_store_type: String,
    pub rag_contextualize_prompt: String,
    pub rag_system_prompt: String,
    pub rag_source_max_depth: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: 0.2,
            ai_service: None,
            ai_model: None,
            persona: DEFAULT_PERSONA.to_string(),
            streaming: true,
            model_kwargs: HashMap::new(),
            history_depth: 20,
            max_tokens: 2048,
            rag_enabled: false,
            rag_vector_store_type: "lance".to_string(),
            rag_contextualize_prompt: DEFAULT_CONTEXTUALIZE_PROMPT.to_string(),
            rag_system_prompt: DEFAULT_RAG_SYSTEM_PROMPT.to_string(),
            rag_source_max_depth: 1,
        }
    }
}

impl Settings {
    /// Load settings from the application directory.
    /// Missing file means first run: defaults are written back so the user
    /// has a file to edit.
    pub fn load() -> Result<Self> {
        let path = crate::storage::settings_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let settings: Self = serde_json::from_str(&content)?;
            Ok(settings)
        } else {
            let settings = Self::default();
            settings.save_to(path)?;
            Ok(settings)
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = crate::storage::settings_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Set a single field by key, as used by `takki settings set`.
    /// Unknown keys and unparseable values are validation errors and leave
    /// the record untouched.
    pub fn set_field(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "ai_service" => {
                // Reject unknown services before anything is persisted
                value.parse::<crate::llm::AiService>()?;
                self.ai_service = Some(value.to_string());
            }
            "ai_model" => self.ai_model = Some(value.to_string()),
            "persona" => self.persona = value.to_string(),
            "streaming" => {
                self.streaming = value
                    .parse()
                    .map_err(|_| Error::validation(format!("streaming must be a bool, got {value}")))?
            }
            "history_depth" => {
                self.history_depth = value
                    .parse()
                    .map_err(|_| Error::validation(format!("history_depth must be an integer, got {value}")))?
            }
            "max_tokens" => {
                self.max_tokens = value
                    .parse()
                    .map_err(|_| Error::validation(format!("max_tokens must be an integer, got {value}")))?
            }
            "rag_enabled" => {
                self.rag_enabled = value
                    .parse()
                    .map_err(|_| Error::validation(format!("rag_enabled must be a bool, got {value}")))?
            }
            "rag_contextualize_prompt" => self.rag_contextualize_prompt = value.to_string(),
            "rag_system_prompt" => self.rag_system_prompt = value.to_string(),
            "rag_source_max_depth" => {
                self.rag_source_max_depth = value.parse().map_err(|_| {
                    Error::validation(format!("rag_source_max_depth must be an integer, got {value}"))
                })?
            }
            other => return Err(Error::validation(format!("unknown settings key: {other}"))),
        }
        Ok(())
    }
}

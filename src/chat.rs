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

//! One conversation against one provider. Requests run one at a time;
//! history is trimmed to the configured depth before every request and
//! only successful turns are appended.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::Settings;
use crate::error::Result;
use crate::history::{ChatHistory, ChatMessage};
use crate::llm::{ChatProvider, RequestOptions, TokenEvent};
use crate::rag::{RagManager, RetrievalChain};

pub struct ChatSession {
    provider: Arc<dyn ChatProvider>,
    settings: Settings,
    history: ChatHistory,
    rag: Option<RagManager>,
}

impl ChatSession {
    pub fn new(
        settings: Settings,
        provider: Arc<dyn ChatProvider>,
        history: ChatHistory,
        rag: Option<RagManager>,
    ) -> Self {
        Self {
            provider,
            settings,
            history,
            rag,
        }
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    /// Send one request and return the full answer. When `tx` is given the
    /// answer is also streamed over it token by token.
    pub async fn send(
        &mut self,
        input: &str,
        tx: Option<mpsc::Sender<TokenEvent>>,
    ) -> Result<String> {
        // Old turns fall off before the request so the prompt and the file
        // both stay within the configured depth.
        self.history.trim(self.settings.history_depth)?;

        let options = RequestOptions::from_settings(&self.settings);
        match &self.rag {
            Some(rag) => {
                let chain = RetrievalChain::new(
                    self.provider.clone(),
                    self.settings.rag_contextualize_prompt.clone(),
                    self.settings.rag_system_prompt.clone(),
                );
                chain
                    .ask(rag.store(), &mut self.history, input, &options, tx)
                    .await
            }
            None => self.direct(input, &options, tx).await,
        }
    }

    async fn direct(
        &mut self,
        input: &str,
        options: &RequestOptions,
        tx: Option<mpsc::Sender<TokenEvent>>,
    ) -> Result<String> {
        let persona = &self.settings.persona;
        let answer = match tx {
            Some(tx) => {
                self.provider
                    .stream_chat(persona, self.history.all(), input, options, tx)
                    .await?
            }
            None => {
                self.provider
                    .chat(persona, self.history.all(), input, options)
                    .await?
            }
        };

        self.history.append(ChatMessage::human(input))?;
        self.history.append(ChatMessage::ai(&answer))?;
        Ok(answer)
    }
}

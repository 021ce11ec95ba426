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
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Human,
    Ai,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            role: Role::Ai,
            content: content.into(),
        }
    }
}

/// Append-only conversation log backed by a JSON-lines file. Every append and
/// clear commits to disk before returning, so the log survives process
/// restarts. Trimming keeps the most recent entries and is invoked before
/// each request so the model never sees more than `history_depth` messages.
pub struct ChatHistory {
    path: PathBuf,
    messages: Vec<ChatMessage>,
}

impl ChatHistory {
    pub fn open(path: PathBuf) -> Result<Self> {
        let messages = if path.exists() {
            let file = File::open(&path)?;
            let reader = BufReader::new(file);
            let mut messages = Vec::new();
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<ChatMessage>(&line) {
                    Ok(msg) => messages.push(msg),
                    Err(e) => {
                        tracing::warn!("skipping malformed history line: {}", e);
                    }
                }
            }
            messages
        } else {
            Vec::new()
        };

        Ok(Self { path, messages })
    }

    pub fn append(&mut self, message: ChatMessage) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        serde_json::to_writer(&mut file, &message)?;
        file.write_all(b"\n")?;
        file.flush()?;
        self.messages.push(message);
        Ok(())
    }

    pub fn all(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Keep only the most recent `max_len` messages, discarding the oldest
    /// first, and persist the shortened log.
    pub fn trim(&mut self, max_len: usize) -> Result<()> {
        if self.messages.len() <= max_len {
            return Ok(());
        }
        let start = self.messages.len() - max_len;
        self.messages.drain(..start);
        self.rewrite()
    }

    pub fn clear(&mut self) -> Result<()> {
        self.messages.clear();
        self.rewrite()
    }

    fn rewrite(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = File::create(&self.path)?;
        for message in &self.messages {
            serde_json::to_writer(&mut file, message)?;
            file.write_all(b"\n")?;
        }
        file.flush()?;
        Ok(())
    }
}

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

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::Result;

/// Tag namespace for cached provider model listings
pub const TAG_AI_MODELS: &str = "ai_models";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    value: serde_json::Value,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    // tag -> key -> entry
    entries: HashMap<String, HashMap<String, CacheEntry>>,
}

/// On-disk key/value cache with TTL and tag semantics, used for model-list
/// caching. Constructed once by the application context and passed by
/// reference; never global state.
pub struct DiskCache {
    path: PathBuf,
}

impl DiskCache {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_file(&self) -> Result<CacheFile> {
        if !self.path.exists() {
            return Ok(CacheFile::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        // A corrupt cache is not worth failing a request over
        Ok(serde_json::from_str(&content).unwrap_or_default())
    }

    fn write_file(&self, file: &CacheFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string(file)?)?;
        Ok(())
    }

    /// Get a value, dropping it when its TTL has passed.
    pub fn get(&self, tag: &str, key: &str) -> Result<Option<serde_json::Value>> {
        let file = self.read_file()?;
        let entry = match file.entries.get(tag).and_then(|m| m.get(key)) {
            Some(entry) => entry,
            None => return Ok(None),
        };
        if let Some(expires_at) = entry.expires_at {
            if Utc::now() > expires_at {
                return Ok(None);
            }
        }
        Ok(Some(entry.value.clone()))
    }

    /// Set a value under (tag, key), overwriting any existing entry.
    pub fn set(
        &self,
        tag: &str,
        key: &str,
        value: serde_json::Value,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let mut file = self.read_file()?;
        let entry = CacheEntry {
            value,
            expires_at: ttl.map(|d| Utc::now() + d),
        };
        file.entries
            .entry(tag.to_string())
            .or_default()
            .insert(key.to_string(), entry);
        self.write_file(&file)
    }

    /// All live keys under a tag.
    pub fn keys(&self, tag: &str) -> Result<Vec<String>> {
        let file = self.read_file()?;
        let now = Utc::now();
        let mut keys: Vec<String> = file
            .entries
            .get(tag)
            .map(|m| {
                m.iter()
                    .filter(|(_, e)| e.expires_at.map(|t| now <= t).unwrap_or(true))
                    .map(|(k, _)| k.clone())
                    .collect()
            })
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }

    pub fn clear(&self) -> Result<()> {
        self.write_file(&CacheFile::default())
    }
}

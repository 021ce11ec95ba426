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

use std::fs;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Get the system-wide application directory for takki
/// Following XDG Base Directory specification on Unix-like systems
/// and proper conventions on other systems
pub fn get_app_dir() -> Result<PathBuf> {
    let base_dir = if cfg!(target_os = "macos") {
        // macOS: ~/.local/share/takki
        dirs::home_dir()
            .ok_or_else(|| Error::validation("unable to determine home directory"))?
            .join(".local")
            .join("share")
            .join("takki")
    } else if cfg!(target_os = "windows") {
        // Windows: %APPDATA%/takki
        dirs::data_dir()
            .ok_or_else(|| Error::validation("unable to determine data directory"))?
            .join("takki")
    } else {
        // Linux and other Unix-like: $XDG_DATA_HOME/takki or ~/.local/share/takki
        if let Ok(xdg_data_home) = std::env::var("XDG_DATA_HOME") {
            PathBuf::from(xdg_data_home).join("takki")
        } else {
            dirs::home_dir()
                .ok_or_else(|| Error::validation("unable to determine home directory"))?
                .join(".local")
                .join("share")
                .join("takki")
        }
    };

    if !base_dir.exists() {
        fs::create_dir_all(&base_dir)?;
    }

    Ok(base_dir)
}

/// Settings record, replaced wholesale on save
pub fn settings_path() -> Result<PathBuf> {
    Ok(get_app_dir()?.join("settings.json"))
}

/// Durable registry of ingested RAG sources
pub fn rag_sources_path() -> Result<PathBuf> {
    Ok(get_app_dir()?.join("rag_sources.json"))
}

/// Vector store directory, opaque to callers beyond insert/search/delete
pub fn vector_store_dir() -> Result<PathBuf> {
    Ok(get_app_dir()?.join("rag"))
}

/// Append log of conversation turns
pub fn chat_history_path() -> Result<PathBuf> {
    Ok(get_app_dir()?.join("chat_history.jsonl"))
}

/// Disk cache for provider model listings
pub fn models_cache_path() -> Result<PathBuf> {
    Ok(get_app_dir()?.join("models_cache.json"))
}

/// Log file directory for tracing-appender
pub fn logs_dir() -> Result<PathBuf> {
    let dir = get_app_dir()?.join("logs");
    if !dir.exists() {
        fs::create_dir_all(&dir)?;
    }
    Ok(dir)
}

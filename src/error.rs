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

use thiserror::Error;

/// Error taxonomy for the chat core. Lower layers never retry; the caller
/// decides on retry policy. None of these crash the session: the worst case
/// is a single failed request the user can re-issue.
#[derive(Debug, Error)]
pub enum Error {
    /// Root URL unreachable or returned a non-success status during ingest.
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// Chat or embedding backend unreachable, or the model id is unknown.
    #[error("{service} unavailable: {reason}")]
    ProviderUnavailable { service: String, reason: String },

    /// Vector store directory corrupt or inaccessible. Fatal to RAG requests,
    /// plain chat keeps working.
    #[error("vector store unavailable: {0}")]
    StoreUnavailable(String),

    /// Any failure inside the retrieval chain. History is left unmodified.
    #[error("generation failed: {0}")]
    Generation(String),

    /// Malformed URL, unknown service name, bad settings field. Rejected
    /// before any side effect.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn fetch(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn provider(service: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::ProviderUnavailable {
            service: service.into(),
            reason: reason.to_string(),
        }
    }

    pub fn store(reason: impl std::fmt::Display) -> Self {
        Error::StoreUnavailable(reason.to_string())
    }

    pub fn generation(reason: impl std::fmt::Display) -> Self {
        Error::Generation(reason.to_string())
    }

    pub fn validation(reason: impl std::fmt::Display) -> Self {
        Error::Validation(reason.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_format() {
        let err = Error::fetch("https://example.com", "connection refused");
        assert_eq!(
            err.to_string(),
            "failed to fetch https://example.com: connection refused"
        );
    }

    #[test]
    fn validation_error_is_transparent_message() {
        let err = Error::validation("URL must start with http:// or https://");
        assert_eq!(err.to_string(), "URL must start with http:// or https://");
    }
}

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

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "takki")]
#[command(version, author = "Jussi Kettu")]
#[command(about = "Terminal chat client for AI services with local RAG", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive chat session
    Chat,
    /// Send a single question and print the answer
    Ask {
        /// The question to send
        question: String,
    },
    /// List available models for an AI service
    Models {
        /// Service to list models for (defaults to the configured one)
        #[arg(short, long)]
        service: Option<String>,

        /// Bypass the cached model list and query the service
        #[arg(long)]
        refresh: bool,
    },
    /// Manage RAG sources
    Source {
        #[command(subcommand)]
        command: SourceCommand,
    },
    /// Inspect or clear the conversation history
    History {
        #[command(subcommand)]
        command: HistoryCommand,
    },
    /// Show or change settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum SourceCommand {
    /// Crawl a web page and add it as a RAG source
    Add {
        /// URL of the page to ingest
        url: String,

        /// How many link levels below the page to follow (same origin only)
        #[arg(long)]
        max_depth: Option<usize>,
    },
    /// List registered sources and their chunk counts
    List,
    /// Remove a source and its stored chunks
    Remove {
        /// URL of the source to remove
        url: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum HistoryCommand {
    /// Print stored messages
    Show {
        /// Only print the last N messages
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Delete all stored messages
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    /// Print the current settings as JSON
    Show,
    /// Set one settings field
    Set {
        /// Field name, e.g. ai_service, ai_model, rag_enabled
        key: String,
        /// New value
        value: String,
    },
}

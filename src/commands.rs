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

use std::io::Write as _;
use std::sync::Arc;

use chrono::Duration;
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::cache::{DiskCache, TAG_AI_MODELS};
use crate::chat::ChatSession;
use crate::cli::{Commands, HistoryCommand, SettingsCommand, SourceCommand};
use crate::config::Settings;
use crate::error::Result;
use crate::history::{ChatHistory, Role};
use crate::llm::{self, AiService, ChatProvider, TokenEvent};
use crate::rag::sources::SourceRegistry;
use crate::rag::RagManager;
use crate::storage;

fn models_cache_ttl() -> Duration {
    Duration::hours(1)
}

pub async fn execute(settings: Settings, command: Commands) -> Result<()> {
    match command {
        Commands::Chat => chat_loop(settings).await,
        Commands::Ask { question } => ask(settings, &question).await,
        Commands::Models { service, refresh } => models(&settings, service, refresh).await,
        Commands::Source { command } => match command {
            SourceCommand::Add { url, max_depth } => source_add(&settings, &url, max_depth).await,
            SourceCommand::List => source_list(),
            SourceCommand::Remove { url } => source_remove(&settings, &url).await,
        },
        Commands::History { command } => match command {
            HistoryCommand::Show { limit } => history_show(limit),
            HistoryCommand::Clear => history_clear(),
        },
        Commands::Settings { command } => match command {
            SettingsCommand::Show => settings_show(&settings),
            SettingsCommand::Set { key, value } => settings_set(settings, &key, &value),
        },
    }
}

async fn build_session(settings: &Settings) -> Result<ChatSession> {
    let service = llm::configured_service(settings)?;
    let provider: Arc<dyn ChatProvider> = Arc::from(llm::provider_for(service, settings)?);

    let history = ChatHistory::open(storage::chat_history_path()?)?;
    let rag = if settings.rag_enabled {
        Some(
            RagManager::new(
                provider.clone(),
                &storage::vector_store_dir()?,
                storage::rag_sources_path()?,
            )
            .await?,
        )
    } else {
        None
    };

    Ok(ChatSession::new(settings.clone(), provider, history, rag))
}

async fn build_rag(settings: &Settings) -> Result<RagManager> {
    let service = llm::configured_service(settings)?;
    let provider: Arc<dyn ChatProvider> = Arc::from(llm::provider_for(service, settings)?);
    RagManager::new(
        provider,
        &storage::vector_store_dir()?,
        storage::rag_sources_path()?,
    )
    .await
}

/// Send one request through the session, printing tokens as they arrive
/// when streaming is enabled.
async fn send_and_print(session: &mut ChatSession, streaming: bool, input: &str) -> Result<()> {
    if streaming {
        let (tx, mut rx) = mpsc::channel::<TokenEvent>(32);
        let printer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    TokenEvent::Token(token) => {
                        print!("{}", token);
                        let _ = std::io::stdout().flush();
                    }
                    TokenEvent::Done => break,
                }
            }
        });
        let result = session.send(input, Some(tx)).await;
        let _ = printer.await;
        result?;
        println!();
    } else {
        let answer = session.send(input, None).await?;
        println!("{}", answer);
    }
    Ok(())
}

async fn chat_loop(settings: Settings) -> Result<()> {
    let streaming = settings.streaming;
    let mut session = build_session(&settings).await?;

    println!(
        "{}",
        "Chat started. Type 'exit' or press Ctrl+D to leave.".dimmed()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", "you>".green().bold());
        let _ = std::io::stdout().flush();

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }

        print!("{} ", "ai>".cyan().bold());
        let _ = std::io::stdout().flush();
        if let Err(e) = send_and_print(&mut session, streaming, input).await {
            println!("{} {}", "error:".red(), e);
        }
    }

    Ok(())
}

async fn ask(settings: Settings, question: &str) -> Result<()> {
    let streaming = settings.streaming;
    let mut session = build_session(&settings).await?;
    send_and_print(&mut session, streaming, question).await
}

async fn models(settings: &Settings, service: Option<String>, refresh: bool) -> Result<()> {
    let service: AiService = match service {
        Some(name) => name.parse()?,
        None => llm::configured_service(settings)?,
    };

    let cache = DiskCache::new(storage::models_cache_path()?);
    let cache_key = service.to_string();

    let cached: Option<Vec<String>> = if refresh {
        None
    } else {
        cache
            .get(TAG_AI_MODELS, &cache_key)?
            .and_then(|v| serde_json::from_value(v).ok())
    };

    let models = match cached {
        Some(models) => models,
        None => {
            let provider = llm::listing_provider(service)?;
            let models = provider.list_models().await?;
            cache.set(
                TAG_AI_MODELS,
                &cache_key,
                serde_json::to_value(&models)?,
                Some(models_cache_ttl()),
            )?;
            models
        }
    };

    println!("{} models for {}:", models.len(), service.to_string().bold());
    for model in models {
        println!("  {}", model);
    }
    Ok(())
}

async fn source_add(settings: &Settings, url: &str, max_depth: Option<usize>) -> Result<()> {
    let depth = max_depth.unwrap_or(settings.rag_source_max_depth);
    let rag = build_rag(settings).await?;
    let chunks = rag.create_source(url, depth).await?;
    println!(
        "{} {} ({} chunks, depth {})",
        "added".green(),
        url,
        chunks,
        depth
    );
    Ok(())
}

fn source_list() -> Result<()> {
    let registry = SourceRegistry::new(storage::rag_sources_path()?);
    let sources = registry.read()?;
    if sources.sources.is_empty() {
        println!("No sources registered.");
        return Ok(());
    }
    for source in sources.sources {
        println!(
            "{} ({} chunks, depth {})",
            source.source_url.bold(),
            source.chunk_ids.len(),
            source.max_crawl_depth
        );
    }
    Ok(())
}

async fn source_remove(settings: &Settings, url: &str) -> Result<()> {
    let rag = build_rag(settings).await?;
    if rag.delete_source(url).await? {
        println!("{} {}", "removed".green(), url);
    } else {
        println!("{} no source registered for {}", "warning:".yellow(), url);
    }
    Ok(())
}

fn history_show(limit: Option<usize>) -> Result<()> {
    let history = ChatHistory::open(storage::chat_history_path()?)?;
    let messages = history.all();
    let start = limit
        .map(|n| messages.len().saturating_sub(n))
        .unwrap_or(0);
    for message in &messages[start..] {
        let label = match message.role {
            Role::Human => "you>".green().bold(),
            Role::Ai => "ai>".cyan().bold(),
        };
        println!("{} {}", label, message.content);
    }
    Ok(())
}

fn history_clear() -> Result<()> {
    let mut history = ChatHistory::open(storage::chat_history_path()?)?;
    history.clear()?;
    println!("History cleared.");
    Ok(())
}

fn settings_show(settings: &Settings) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(settings)?);
    Ok(())
}

fn settings_set(mut settings: Settings, key: &str, value: &str) -> Result<()> {
    settings.set_field(key, value)?;
    settings.save()?;
    println!("{} {} = {}", "set".green(), key, value);
    Ok(())
}

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

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod cache;
mod chat;
mod cli;
mod commands;
mod config;
mod error;
mod history;
mod llm;
mod rag;
mod storage;

use cli::Cli;
use config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    // Logs go to a rolling file so they never interleave with chat output
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("takki=info"));
    let _guard = match storage::logs_dir() {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "takki.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer)
                .init();
            Some(guard)
        }
        Err(_) => {
            fmt().with_env_filter(filter).with_target(false).init();
            None
        }
    };

    // Parse command line arguments
    let cli = Cli::parse();

    // Load settings, writing defaults on first run
    let settings = Settings::load()?;

    // Execute the command
    if let Err(e) = commands::execute(settings, cli.command).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

// Copyright 2026 The moonshot-rs Project
// SPDX-License-Identifier: Apache-2.0

// moonshot: command-line client for the Moonshot API.
//
// Usage:
//   moonshot chat "Hello" --stream
//   moonshot tokens "How many tokens is this?"
//   moonshot files upload report.pdf
//   moonshot files list --purpose file-extract
//   moonshot --config moonshot.yaml models

use std::io::Write as _;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use moonshot::config::{self, FileSource};
use moonshot::types::purpose;
use moonshot::{
    BoxError, Client, CompletionRequest, FileListParams, Message, Model, TokenCountRequest,
};

#[derive(Parser)]
#[command(name = "moonshot", version, about = "Command-line client for the Moonshot chat API")]
struct Cli {
    /// Path to a moonshot.yaml config file
    #[arg(long, global = true, env = "MOONSHOT_CONFIG")]
    config: Option<PathBuf>,

    /// Override the API base URL
    #[arg(long, global = true, env = "MOONSHOT_BASE_URL")]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send a chat completion and print the reply
    Chat {
        prompt: String,
        #[arg(long, default_value = "moonshot-v1-8k")]
        model: String,
        /// System prompt placed before the user message
        #[arg(long)]
        system: Option<String>,
        #[arg(long)]
        temperature: Option<f64>,
        #[arg(long)]
        max_tokens: Option<u32>,
        /// Print the reply as it is generated
        #[arg(long)]
        stream: bool,
    },
    /// Estimate the token count of a prompt
    Tokens {
        prompt: String,
        #[arg(long, default_value = "moonshot-v1-8k")]
        model: String,
    },
    /// Manage uploaded files
    #[command(subcommand)]
    Files(FilesCommand),
    /// List known models and their context windows
    Models,
}

#[derive(Subcommand)]
enum FilesCommand {
    List {
        #[arg(long)]
        purpose: Option<String>,
    },
    Upload {
        path: PathBuf,
        #[arg(long, default_value = purpose::FILE_EXTRACT)]
        purpose: String,
    },
    Get {
        id: String,
    },
    Delete {
        id: String,
    },
    /// Write the extracted content of a file to stdout
    Content {
        id: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .json()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupted");
                cancel.cancel();
            }
        }
    });

    if let Err(e) = run(cli, cancel).await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

fn build_client(cli: &Cli) -> Result<Client, BoxError> {
    let mut builder = Client::builder();
    if let Some(path) = &cli.config {
        let file = config::load_config(&FileSource { path: path.clone() })?;
        tracing::debug!(path = %path.display(), "config loaded");
        builder = builder.config(file);
    }
    if let Some(base_url) = &cli.base_url {
        builder = builder.base_url(base_url.clone());
    }
    Ok(builder.build()?)
}

async fn run(cli: Cli, cancel: CancellationToken) -> Result<(), BoxError> {
    if let Command::Models = cli.command {
        for model in Model::ALL {
            println!(
                "{:<20} {:>7} tokens  tools={} vision={}",
                model.as_str(),
                model.max_tokens(),
                model.supports_tools(),
                model.supports_vision()
            );
        }
        return Ok(());
    }

    let client = build_client(&cli)?;

    match cli.command {
        Command::Chat {
            prompt,
            model,
            system,
            temperature,
            max_tokens,
            stream,
        } => {
            let mut messages = Vec::new();
            if let Some(system) = system {
                messages.push(Message::system(system));
            }
            messages.push(Message::user(prompt));
            let mut request = CompletionRequest::new(model, messages);
            request.temperature = temperature;
            request.max_tokens = max_tokens;

            let chat = client.chat().with_cancellation(cancel);
            if stream {
                let mut stdout = std::io::stdout();
                chat.create_completion_with_callback(&request, |event| {
                    if let Some(content) = event.content() {
                        stdout.write_all(content.as_bytes())?;
                        stdout.flush()?;
                    }
                    Ok::<(), std::io::Error>(())
                })
                .await?;
                println!();
            } else {
                let response = chat.create_completion(&request).await?;
                println!("{}", response.text().unwrap_or_default());
                if let Some(usage) = response.usage {
                    tracing::info!(
                        prompt_tokens = usage.prompt_tokens,
                        completion_tokens = usage.completion_tokens,
                        "usage"
                    );
                }
            }
        }
        Command::Tokens { prompt, model } => {
            let request = TokenCountRequest::new(model, vec![Message::user(prompt)]);
            let response = client
                .chat()
                .with_cancellation(cancel)
                .count_tokens(&request)
                .await?;
            println!("{}", response.token_count);
        }
        Command::Files(command) => {
            let files = client.files().with_cancellation(cancel);
            match command {
                FilesCommand::List { purpose } => {
                    let list = files.list(Some(&FileListParams { purpose })).await?;
                    println!("{}", serde_json::to_string_pretty(&list)?);
                }
                FilesCommand::Upload { path, purpose } => {
                    let file = files.upload_file(&path, &purpose).await?;
                    println!("{}", serde_json::to_string_pretty(&file)?);
                }
                FilesCommand::Get { id } => {
                    let file = files.get(&id).await?;
                    println!("{}", serde_json::to_string_pretty(&file)?);
                }
                FilesCommand::Delete { id } => {
                    files.delete(&id).await?;
                    tracing::info!(file_id = %id, "deleted");
                }
                FilesCommand::Content { id } => {
                    let content = files.content(&id).await?;
                    let mut stdout = std::io::stdout();
                    stdout.write_all(&content)?;
                    stdout.flush()?;
                }
            }
        }
        Command::Models => {}
    }

    Ok(())
}

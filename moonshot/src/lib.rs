// Copyright 2026 The moonshot-rs Project
// SPDX-License-Identifier: Apache-2.0

//! Client for the Moonshot chat completion API.
//!
//! ```no_run
//! use moonshot::{Client, CompletionRequest, Message};
//!
//! # async fn run() -> Result<(), moonshot::Error> {
//! let client = Client::from_env()?;
//! let request = CompletionRequest::new("moonshot-v1-8k", vec![Message::user("Hello")]);
//!
//! let mut stream = client.chat().create_completion_stream(&request).await?;
//! while let Some(event) = stream.next_event().await? {
//!     print!("{}", event.content().unwrap_or_default());
//! }
//! # Ok(())
//! # }
//! ```

pub mod chat;
pub mod client;
pub mod config;
pub mod error;
pub mod files;
pub mod message;
pub mod models;
pub mod stream;
pub mod transport;
pub mod types;

pub use chat::{prepare_request, ChatService, TEMPERATURE_SCALE};
pub use client::{Client, ClientBuilder};
pub use error::{codes, ApiError, BoxError, Error, Result};
pub use files::FilesService;
pub use message::{Content, ContentPart, FunctionCall, ImageUrl, Message, Role, Tool, ToolCall};
pub use models::Model;
pub use stream::{StreamAccumulator, StreamDecoder};
pub use types::{
    CompletionRequest, CompletionResponse, File, FileList, FileListParams, StreamEvent, Stop,
    TokenCountRequest, TokenCountResponse, ToolChoice, Usage,
};

/// Library version, sent in the default User-Agent.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

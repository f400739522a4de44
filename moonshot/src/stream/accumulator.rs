// Copyright 2026 The moonshot-rs Project
// SPDX-License-Identifier: Apache-2.0

// Folds stream events back into a complete response.
//
// Content fragments concatenate per choice index in arrival order. Tool
// call fragments are grouped by their own index within the choice; the
// first fragment carries id and name, later ones only argument text.

use std::collections::BTreeMap;

use crate::message::{Content, FunctionCall, Message, Role, ToolCall};
use crate::types::{Choice, CompletionResponse, StreamEvent, Usage};

/// Maximum distinct tool calls tracked per choice.
pub const MAX_TOOL_CALLS: usize = 100;

/// Maximum accumulated argument text for a single tool call.
pub const MAX_TOOL_CALL_ARGUMENT_BYTES: usize = 1_048_576; // 1 MB

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccumulateError {
    #[error("tool call '{name}' (id: {id}) exceeded {limit} byte argument limit")]
    ArgumentsTooLarge {
        id: String,
        name: String,
        limit: usize,
    },
}

#[derive(Debug, Default)]
struct ToolCallBuffer {
    id: String,
    kind: String,
    name: String,
    arguments: String,
}

impl ToolCallBuffer {
    fn append_arguments(&mut self, delta: &str) -> Result<(), AccumulateError> {
        if self.arguments.len() + delta.len() > MAX_TOOL_CALL_ARGUMENT_BYTES {
            return Err(AccumulateError::ArgumentsTooLarge {
                id: self.id.clone(),
                name: self.name.clone(),
                limit: MAX_TOOL_CALL_ARGUMENT_BYTES,
            });
        }
        self.arguments.push_str(delta);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct ChoiceBuffer {
    role: Option<Role>,
    content: String,
    tool_calls: BTreeMap<u32, ToolCallBuffer>,
    finish_reason: Option<String>,
}

/// Rebuilds a [`CompletionResponse`] from a sequence of [`StreamEvent`]s.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    id: String,
    model: String,
    created: i64,
    system_fingerprint: Option<String>,
    usage: Option<Usage>,
    choices: BTreeMap<u32, ChoiceBuffer>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: &StreamEvent) -> Result<(), AccumulateError> {
        if self.id.is_empty() {
            self.id.clone_from(&event.id);
            self.model.clone_from(&event.model);
            self.created = event.created;
        }
        if event.system_fingerprint.is_some() {
            self.system_fingerprint.clone_from(&event.system_fingerprint);
        }
        if event.usage.is_some() {
            self.usage.clone_from(&event.usage);
        }

        for choice in &event.choices {
            let buffer = self.choices.entry(choice.index).or_default();
            if buffer.role.is_none() {
                buffer.role = choice.delta.role;
            }
            if let Some(content) = &choice.delta.content {
                buffer.content.push_str(content);
            }
            for (position, delta) in choice.delta.tool_calls.iter().enumerate() {
                let index = delta.index.unwrap_or(position as u32);
                if !buffer.tool_calls.contains_key(&index) && buffer.tool_calls.len() >= MAX_TOOL_CALLS {
                    tracing::warn!(index, limit = MAX_TOOL_CALLS, "tool call limit reached, skipping");
                    continue;
                }
                let call = buffer.tool_calls.entry(index).or_default();
                if let Some(id) = &delta.id {
                    call.id.clone_from(id);
                }
                if let Some(kind) = &delta.kind {
                    call.kind.clone_from(kind);
                }
                if let Some(function) = &delta.function {
                    if let Some(name) = &function.name {
                        call.name.push_str(name);
                    }
                    if let Some(arguments) = &function.arguments {
                        call.append_arguments(arguments)?;
                    }
                }
            }
            if choice.finish_reason.is_some() {
                buffer.finish_reason.clone_from(&choice.finish_reason);
            }
        }
        Ok(())
    }

    /// Concatenated content of choice 0 so far.
    pub fn content(&self) -> &str {
        self.choices.get(&0).map(|c| c.content.as_str()).unwrap_or("")
    }

    pub fn finish(self) -> CompletionResponse {
        let choices = self
            .choices
            .into_iter()
            .map(|(index, buffer)| {
                let tool_calls: Vec<ToolCall> = buffer
                    .tool_calls
                    .into_values()
                    .map(|call| ToolCall {
                        id: call.id,
                        kind: if call.kind.is_empty() {
                            "function".to_string()
                        } else {
                            call.kind
                        },
                        function: FunctionCall {
                            name: call.name,
                            arguments: call.arguments,
                        },
                    })
                    .collect();
                let content = if buffer.content.is_empty() && !tool_calls.is_empty() {
                    None
                } else {
                    Some(Content::Text(buffer.content))
                };
                Choice {
                    index,
                    message: Message {
                        role: buffer.role.unwrap_or(Role::Assistant),
                        content,
                        name: None,
                        tool_calls,
                        tool_call_id: None,
                    },
                    finish_reason: buffer.finish_reason,
                    logprobs: None,
                }
            })
            .collect();

        CompletionResponse {
            id: self.id,
            object: "chat.completion".to_string(),
            created: self.created,
            model: self.model,
            choices,
            usage: self.usage,
            system_fingerprint: self.system_fingerprint,
        }
    }
}

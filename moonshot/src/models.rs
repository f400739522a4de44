// Copyright 2026 The moonshot-rs Project
// SPDX-License-Identifier: Apache-2.0

// Known model identifiers and their capabilities.
//
// Requests take the model as a plain string so new server-side models work
// without a library release; this catalogue is for lookups only.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Model {
    MoonshotV1_8k,
    MoonshotV1_32k,
    MoonshotV1_128k,
    KimiK2,
    KimiK2Base,
    KimiK2Instruct,
}

impl Model {
    pub const ALL: [Model; 6] = [
        Model::MoonshotV1_8k,
        Model::MoonshotV1_32k,
        Model::MoonshotV1_128k,
        Model::KimiK2,
        Model::KimiK2Base,
        Model::KimiK2Instruct,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Model::MoonshotV1_8k => "moonshot-v1-8k",
            Model::MoonshotV1_32k => "moonshot-v1-32k",
            Model::MoonshotV1_128k => "moonshot-v1-128k",
            Model::KimiK2 => "kimi-k2",
            Model::KimiK2Base => "kimi-k2-base",
            Model::KimiK2Instruct => "kimi-k2-instruct",
        }
    }

    /// Context window in tokens.
    pub fn max_tokens(self) -> u32 {
        match self {
            Model::MoonshotV1_8k => 8_192,
            Model::MoonshotV1_32k => 32_768,
            Model::MoonshotV1_128k
            | Model::KimiK2
            | Model::KimiK2Base
            | Model::KimiK2Instruct => 131_072,
        }
    }

    pub fn supports_tools(self) -> bool {
        true
    }

    pub fn supports_vision(self) -> bool {
        matches!(self, Model::KimiK2 | Model::KimiK2Instruct)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Model> for String {
    fn from(model: Model) -> Self {
        model.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown model \"{0}\"")]
pub struct UnknownModel(pub String);

impl FromStr for Model {
    type Err = UnknownModel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Model::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownModel(s.to_string()))
    }
}

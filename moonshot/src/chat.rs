// Copyright 2026 The moonshot-rs Project
// SPDX-License-Identifier: Apache-2.0

// Chat completion service
//
// Responsibilities:
// - Derive the transmitted request: stream flag per call mode, scaled
//   temperature, caller's request untouched
// - Synchronous completion: one JSON body
// - Streaming completion: hand the response body to a `StreamDecoder`
// - Callback mode: drive the decoder and release it on every exit path
// - Token counting

use reqwest::Method;
use tokio_util::sync::CancellationToken;

use crate::client::{new_request_id, Client};
use crate::error::{BoxError, Error, Result};
use crate::stream::StreamDecoder;
use crate::types::{
    CompletionRequest, CompletionResponse, StreamEvent, TokenCountRequest, TokenCountResponse,
};

const COMPLETIONS_PATH: &str = "/chat/completions";
const TOKEN_COUNT_PATH: &str = "/tokenizers/estimate_token_count";

/// Factor applied to the requested temperature before sending.
pub const TEMPERATURE_SCALE: f64 = 0.6;

/// The request actually transmitted for `request` in the given mode.
pub fn prepare_request(request: &CompletionRequest, stream: bool) -> CompletionRequest {
    let mut prepared = request.clone();
    prepared.stream = Some(stream);
    prepared.temperature = request.temperature.map(|t| t * TEMPERATURE_SCALE);
    prepared
}

#[derive(Debug, Clone)]
pub struct ChatService {
    client: Client,
    cancel: Option<CancellationToken>,
}

impl ChatService {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            client,
            cancel: None,
        }
    }

    /// Abort in-flight requests and stream reads when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Send a completion request and wait for the whole response.
    pub async fn create_completion(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let prepared = prepare_request(request, false);
        let req = self
            .client
            .json_request(Method::POST, COMPLETIONS_PATH, &prepared)?;
        self.client
            .send_json(req, self.cancel.as_ref(), "completion response")
            .await
    }

    /// Send a streaming completion request.
    ///
    /// On a non-2xx status the body is read for classification and released
    /// before the error is returned.
    pub async fn create_completion_stream(&self, request: &CompletionRequest) -> Result<StreamDecoder> {
        let prepared = prepare_request(request, true);
        let mut req = self
            .client
            .json_request(Method::POST, COMPLETIONS_PATH, &prepared)?;
        req.stream = true;

        let request_id = new_request_id();
        let response = self
            .client
            .send(req, self.cancel.as_ref(), &request_id)
            .await?;

        tracing::debug!(request_id = %request_id, model = %prepared.model, "stream opened");

        let mut decoder = StreamDecoder::from_body(response.body).with_request_id(request_id);
        if let Some(token) = &self.cancel {
            decoder = decoder.with_cancellation(token.clone());
        }
        Ok(decoder)
    }

    /// Stream a completion, calling `handler` for each event.
    ///
    /// Returns once the stream ends cleanly. A handler error aborts the
    /// stream and is returned as [`Error::Handler`]; decode and transport
    /// errors abort it as well.
    pub async fn create_completion_with_callback<F, E>(
        &self,
        request: &CompletionRequest,
        mut handler: F,
    ) -> Result<()>
    where
        F: FnMut(&StreamEvent) -> std::result::Result<(), E>,
        E: Into<BoxError>,
    {
        let mut decoder = self.create_completion_stream(request).await?;
        let result = loop {
            match decoder.next_event().await {
                Ok(Some(event)) => {
                    if let Err(e) = handler(&event) {
                        break Err(Error::Handler(e.into()));
                    }
                }
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        decoder.close();
        result
    }

    /// Estimate the number of prompt tokens `request` would use.
    pub async fn count_tokens(&self, request: &TokenCountRequest) -> Result<TokenCountResponse> {
        let req = self
            .client
            .json_request(Method::POST, TOKEN_COUNT_PATH, request)?;
        self.client
            .send_json(req, self.cancel.as_ref(), "token count response")
            .await
    }
}

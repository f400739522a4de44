// Copyright 2026 The moonshot-rs Project
// SPDX-License-Identifier: Apache-2.0

// HTTP transport seam
//
// Responsibilities:
// - Describe one outbound request and its response (full or streamed body)
// - Abstract the sender behind a trait so tests can substitute doubles
// - Default reqwest implementation with per-call timeout and cancellation

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt, TryStreamExt};
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use std::pin::Pin;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sends HTTP requests to the API.
#[async_trait]
pub trait HttpSender: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

// ---------------------------------------------------------------------------
// Transport types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub timeout: Option<Duration>,
    /// Return the body as a stream instead of buffering it.
    pub stream: bool,
    pub cancel: Option<CancellationToken>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            timeout: None,
            stream: false,
            cancel: None,
        }
    }
}

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, HttpError>> + Send>>;

pub enum HttpBody {
    Full(Bytes),
    Stream(ByteStream),
}

impl HttpBody {
    /// Collect the whole body into memory.
    pub async fn collect(self) -> Result<Bytes, HttpError> {
        match self {
            HttpBody::Full(b) => Ok(b),
            HttpBody::Stream(mut s) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = s.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(buf.freeze())
            }
        }
    }
}

impl std::fmt::Debug for HttpBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpBody::Full(b) => f.debug_tuple("Full").field(&b.len()).finish(),
            HttpBody::Stream(_) => f.write_str("Stream"),
        }
    }
}

#[derive(Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: HttpBody,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HttpError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("request cancelled")]
    Cancelled,
}

// ---------------------------------------------------------------------------
// Reqwest HTTP sender
// ---------------------------------------------------------------------------

pub struct ReqwestHttpSender {
    client: reqwest::Client,
}

impl ReqwestHttpSender {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestHttpSender {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

fn map_reqwest_error(e: reqwest::Error) -> HttpError {
    if e.is_timeout() {
        HttpError::Timeout(e.to_string())
    } else {
        HttpError::Transport(e.to_string())
    }
}

#[async_trait]
impl HttpSender for ReqwestHttpSender {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut req = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers)
            .body(request.body);

        // A streamed body may outlive the timeout; only the wait for
        // response headers is bounded.
        let header_timeout = match request.timeout {
            Some(timeout) if request.stream => Some(timeout),
            Some(timeout) => {
                req = req.timeout(timeout);
                None
            }
            None => None,
        };

        let cancel = request.cancel.unwrap_or_default();

        let send = async {
            match header_timeout {
                Some(timeout) => tokio::time::timeout(timeout, req.send())
                    .await
                    .map_err(|_| HttpError::Timeout(format!("no response within {timeout:?}")))?
                    .map_err(map_reqwest_error),
                None => req.send().await.map_err(map_reqwest_error),
            }
        };

        let resp = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(HttpError::Cancelled),
            resp = send => resp?,
        };

        let status = resp.status();
        let headers = resp.headers().clone();

        if request.stream {
            let stream = resp.bytes_stream().map_err(map_reqwest_error);
            Ok(HttpResponse {
                status,
                headers,
                body: HttpBody::Stream(Box::pin(stream)),
            })
        } else {
            let body = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(HttpError::Cancelled),
                body = resp.bytes() => body.map_err(map_reqwest_error)?,
            };
            Ok(HttpResponse {
                status,
                headers,
                body: HttpBody::Full(body),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn collect_concatenates_stream_chunks() {
        let chunks: Vec<Result<Bytes, HttpError>> = vec![Ok(Bytes::from("ab")), Ok(Bytes::from("cd"))];
        let body = HttpBody::Stream(Box::pin(futures_util::stream::iter(chunks)));
        assert_eq!(body.collect().await.unwrap(), Bytes::from("abcd"));
    }

    #[tokio::test]
    async fn collect_surfaces_stream_errors() {
        let chunks: Vec<Result<Bytes, HttpError>> = vec![
            Ok(Bytes::from("ab")),
            Err(HttpError::Transport("connection reset".into())),
        ];
        let body = HttpBody::Stream(Box::pin(futures_util::stream::iter(chunks)));
        let err = body.collect().await.unwrap_err();
        assert_eq!(err, HttpError::Transport("connection reset".into()));
    }

    #[test]
    fn http_error_display() {
        let err = HttpError::Timeout("after 30s".to_string());
        assert_eq!(err.to_string(), "request timed out: after 30s");
        assert_eq!(HttpError::Cancelled.to_string(), "request cancelled");
    }

    #[tokio::test]
    async fn cancelled_token_aborts_send() {
        let sender = ReqwestHttpSender::default();
        let token = CancellationToken::new();
        token.cancel();
        let mut req = HttpRequest::new(Method::GET, "http://127.0.0.1:9/unreachable");
        req.cancel = Some(token);
        let err = sender.send(req).await.unwrap_err();
        assert_eq!(err, HttpError::Cancelled);
    }
}

// Copyright 2026 The moonshot-rs Project
// SPDX-License-Identifier: Apache-2.0

// Incremental SSE decoder for streaming completions.

use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use super::frame::{classify_line, Frame, LineBuffer};
use crate::error::{Error, Result};
use crate::transport::{ByteStream, HttpBody, HttpError};
use crate::types::StreamEvent;

/// Lazy, finite sequence of [`StreamEvent`]s read from an SSE body.
///
/// `next_event` returns `Ok(Some(event))` per data line, `Ok(None)` once on
/// clean end of stream (the `[DONE]` sentinel or the body ending), and
/// [`Error::StreamClosed`] for any read after that. A malformed payload is
/// returned as [`Error::Decode`] and the stream stays readable.
///
/// The response body is released exactly once: on clean end, on a
/// transport error or cancellation, on `close`, or on drop.
pub struct StreamDecoder {
    body: Option<ByteStream>,
    lines: LineBuffer,
    /// The body has ended; only buffered lines remain.
    eof: bool,
    /// No further events will be produced.
    terminated: bool,
    cancel: Option<CancellationToken>,
    request_id: String,
}

enum Read {
    Chunk(Option<std::result::Result<bytes::Bytes, HttpError>>),
    Cancelled,
}

impl StreamDecoder {
    pub fn new(body: ByteStream) -> Self {
        Self {
            body: Some(body),
            lines: LineBuffer::default(),
            eof: false,
            terminated: false,
            cancel: None,
            request_id: String::new(),
        }
    }

    /// Decoder over a response body. A fully buffered body is read as a
    /// single chunk.
    pub fn from_body(body: HttpBody) -> Self {
        match body {
            HttpBody::Stream(s) => Self::new(s),
            HttpBody::Full(bytes) => {
                Self::new(Box::pin(futures_util::stream::once(async move { Ok(bytes) })))
            }
        }
    }

    /// Abort pending reads when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Maximum bytes buffered for a single line before the stream fails
    /// with [`Error::LineTooLong`]. Defaults to [`MAX_LINE_BYTES`].
    ///
    /// [`MAX_LINE_BYTES`]: super::MAX_LINE_BYTES
    pub fn with_max_line_bytes(mut self, limit: usize) -> Self {
        self.lines = LineBuffer::new(limit);
        self
    }

    /// Correlation id included in log lines.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Read the next event.
    pub async fn next_event(&mut self) -> Result<Option<StreamEvent>> {
        if self.terminated {
            return Err(Error::StreamClosed);
        }

        loop {
            if let Some(line) = self.lines.next_line() {
                match classify_line(line) {
                    Frame::Skip => continue,
                    Frame::Done => {
                        self.finish("done");
                        return Ok(None);
                    }
                    Frame::Data(payload) => return decode(&self.request_id, payload).map(Some),
                }
            }

            if self.eof {
                if let Some(rest) = self.lines.take_remaining() {
                    if let Frame::Data(payload) = classify_line(&rest) {
                        return decode(&self.request_id, payload).map(Some);
                    }
                }
                self.finish("eof");
                return Ok(None);
            }

            match self.read_chunk().await {
                Read::Chunk(Some(Ok(chunk))) => {
                    if let Err(overflow) = self.lines.push(&chunk) {
                        tracing::warn!(request_id = %self.request_id, limit = overflow.limit, "stream line too long");
                        self.finish("line too long");
                        return Err(Error::LineTooLong {
                            limit: overflow.limit,
                        });
                    }
                }
                Read::Chunk(Some(Err(e))) => {
                    tracing::warn!(request_id = %self.request_id, error = %e, "stream read failed");
                    self.finish("transport error");
                    return Err(Error::Transport(e));
                }
                Read::Chunk(None) => {
                    self.eof = true;
                    self.release("eof");
                }
                Read::Cancelled => {
                    self.finish("cancelled");
                    return Err(Error::Transport(HttpError::Cancelled));
                }
            }
        }
    }

    async fn read_chunk(&mut self) -> Read {
        let Some(body) = self.body.as_mut() else {
            return Read::Chunk(None);
        };
        match &self.cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Read::Cancelled,
                item = body.next() => Read::Chunk(item),
            },
            None => Read::Chunk(body.next().await),
        }
    }

    fn finish(&mut self, reason: &'static str) {
        self.terminated = true;
        self.release(reason);
    }

    fn release(&mut self, reason: &'static str) {
        if self.body.take().is_some() {
            tracing::debug!(request_id = %self.request_id, reason, "stream body released");
        }
    }

    /// Stop reading and release the body. Safe to call more than once.
    pub fn close(&mut self) {
        self.finish("closed");
    }

    /// True once no more events will be produced.
    pub fn is_closed(&self) -> bool {
        self.terminated
    }

    /// Adapt into a `Stream` of events. The stream ends on clean
    /// termination or after yielding a transport error; decode errors are
    /// yielded and reading continues.
    pub fn into_stream(self) -> impl Stream<Item = Result<StreamEvent>> + Send {
        futures_util::stream::unfold(self, |mut decoder| async move {
            match decoder.next_event().await {
                Ok(Some(event)) => Some((Ok(event), decoder)),
                Ok(None) | Err(Error::StreamClosed) => None,
                Err(e) => Some((Err(e), decoder)),
            }
        })
    }
}

fn decode(request_id: &str, payload: &[u8]) -> Result<StreamEvent> {
    serde_json::from_slice(payload).map_err(|source| {
        tracing::warn!(request_id, error = %source, "malformed stream event");
        Error::Decode {
            what: "stream event",
            source,
        }
    })
}

impl Drop for StreamDecoder {
    fn drop(&mut self) {
        self.release("dropped");
    }
}

impl std::fmt::Debug for StreamDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDecoder")
            .field("request_id", &self.request_id)
            .field("eof", &self.eof)
            .field("terminated", &self.terminated)
            .finish_non_exhaustive()
    }
}

// Copyright 2026 The moonshot-rs Project
// SPDX-License-Identifier: Apache-2.0

// Stream decoder tests
//
// Tests cover:
//  1. Two events then the sentinel -> exactly two events, then clean end
//  2. Blank, comment and non-data lines are skipped
//  3. Body ends without the sentinel -> clean end
//  4. Malformed payload -> decode error, stream stays readable
//  5. Lines and UTF-8 sequences split across chunks
//  6. Unterminated final line is decoded
//  7. Reads after the end -> StreamClosed
//  8. close() is idempotent and releases the body once
//  9. Drop releases the body once
// 10. Transport error mid-stream releases the body
// 11. Cancellation aborts a pending read and releases the body once
// 12. Stream adapter and accumulator
// 13. A line that never ends is cut off at the limit

use super::*;
use crate::error::Error;
use crate::transport::{ByteStream, HttpBody, HttpError};
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

/// Body that counts how many times it is dropped.
struct TrackedBody<S> {
    inner: S,
    releases: Arc<AtomicUsize>,
}

impl<S> Stream for TrackedBody<S>
where
    S: Stream<Item = Result<Bytes, HttpError>> + Unpin,
{
    type Item = Result<Bytes, HttpError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl<S> Drop for TrackedBody<S> {
    fn drop(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// One chunk per string.
fn chunks(parts: &[&str]) -> Vec<Result<Bytes, HttpError>> {
    parts.iter().map(|p| Ok(Bytes::from(p.to_string()))).collect()
}

fn sse_body(parts: &[&str]) -> ByteStream {
    Box::pin(futures_util::stream::iter(chunks(parts)))
}

fn tracked(items: Vec<Result<Bytes, HttpError>>) -> (ByteStream, Arc<AtomicUsize>) {
    let releases = Arc::new(AtomicUsize::new(0));
    let body = TrackedBody {
        inner: futures_util::stream::iter(items),
        releases: releases.clone(),
    };
    (Box::pin(body), releases)
}

/// Tracked body that yields `items` and then never completes.
fn tracked_pending(items: Vec<Result<Bytes, HttpError>>) -> (ByteStream, Arc<AtomicUsize>) {
    let releases = Arc::new(AtomicUsize::new(0));
    let body = TrackedBody {
        inner: futures_util::stream::iter(items).chain(futures_util::stream::pending()),
        releases: releases.clone(),
    };
    (Box::pin(body), releases)
}

fn content_event(content: &str) -> String {
    format!(
        "data: {{\"id\":\"cmpl-1\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"moonshot-v1-8k\",\"choices\":[{{\"index\":0,\"delta\":{{\"content\":\"{content}\"}}}}]}}\n\n"
    )
}

async fn drain(decoder: &mut StreamDecoder) -> Vec<String> {
    let mut out = Vec::new();
    while let Some(event) = decoder.next_event().await.unwrap() {
        out.push(event.content().unwrap_or_default().to_string());
    }
    out
}

// ---------------------------------------------------------------------------
// Test 1: sentinel terminates after exactly two events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn two_events_then_done() {
    let hello = content_event("Hello");
    let world = content_event(" world");
    let mut decoder = StreamDecoder::new(sse_body(&[&hello, &world, "data: [DONE]\n\n"]));

    let first = decoder.next_event().await.unwrap().unwrap();
    assert_eq!(first.content(), Some("Hello"));
    assert_eq!(first.id, "cmpl-1");
    let second = decoder.next_event().await.unwrap().unwrap();
    assert_eq!(second.content(), Some(" world"));
    assert!(decoder.next_event().await.unwrap().is_none());
    assert!(decoder.is_closed());
}

#[tokio::test]
async fn data_after_sentinel_is_ignored() {
    let hello = content_event("Hello");
    let late = content_event("late");
    let mut decoder = StreamDecoder::new(sse_body(&[&hello, "data: [DONE]\n\n", &late]));
    assert_eq!(drain(&mut decoder).await, vec!["Hello"]);
}

// ---------------------------------------------------------------------------
// Test 2: non-data lines skipped
// ---------------------------------------------------------------------------

#[tokio::test]
async fn non_data_lines_skipped() {
    let hello = content_event("Hello");
    let world = content_event(" world");
    let mut decoder = StreamDecoder::new(sse_body(&[
        "\n\n",
        ": keep-alive\n",
        "event: message\n",
        "id: 1\n",
        "retry: 3000\n",
        &hello,
        "   \r\n",
        "event: message\n",
        &world,
        "data: [DONE]\n\n",
    ]));
    assert_eq!(drain(&mut decoder).await, vec!["Hello", " world"]);
}

// ---------------------------------------------------------------------------
// Test 3: connection close without sentinel
// ---------------------------------------------------------------------------

#[tokio::test]
async fn eof_without_sentinel_is_clean_end() {
    let hello = content_event("Hello");
    let world = content_event(" world");
    let mut decoder = StreamDecoder::new(sse_body(&[&hello, &world]));
    assert_eq!(drain(&mut decoder).await, vec!["Hello", " world"]);
    assert!(decoder.is_closed());
}

#[tokio::test]
async fn empty_body_is_clean_end() {
    let mut decoder = StreamDecoder::new(sse_body(&[]));
    assert!(decoder.next_event().await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Test 4: malformed payload
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_payload_is_decode_error() {
    let world = content_event(" world");
    let mut decoder = StreamDecoder::new(sse_body(&[
        "data: {not json\n\n",
        &world,
        "data: [DONE]\n\n",
    ]));

    let err = decoder.next_event().await.unwrap_err();
    assert!(matches!(err, Error::Decode { what: "stream event", .. }), "{err}");
    assert!(!decoder.is_closed());

    let next = decoder.next_event().await.unwrap().unwrap();
    assert_eq!(next.content(), Some(" world"));
    assert!(decoder.next_event().await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Test 5: split chunks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lines_split_across_chunks() {
    let event = content_event("Hello");
    let (a, b) = event.split_at(20);
    let mut decoder = StreamDecoder::new(sse_body(&[a, b, "data: [D", "ONE]\n\n"]));
    assert_eq!(drain(&mut decoder).await, vec!["Hello"]);
}

#[tokio::test]
async fn multibyte_utf8_split_across_chunks() {
    let event = content_event("你好");
    let bytes = event.as_bytes();
    let split = event.find('你').unwrap() + 1;
    let items = vec![
        Ok(Bytes::copy_from_slice(&bytes[..split])),
        Ok(Bytes::copy_from_slice(&bytes[split..])),
    ];
    let mut decoder = StreamDecoder::new(Box::pin(futures_util::stream::iter(items)));
    assert_eq!(drain(&mut decoder).await, vec!["你好"]);
}

#[tokio::test]
async fn crlf_line_endings() {
    let event = content_event("Hi").replace("\n\n", "\r\n\r\n");
    let mut decoder = StreamDecoder::new(sse_body(&[&event, "data: [DONE]\r\n\r\n"]));
    assert_eq!(drain(&mut decoder).await, vec!["Hi"]);
}

// ---------------------------------------------------------------------------
// Test 6: unterminated final line
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unterminated_final_line_decoded() {
    let event = content_event("tail");
    let mut decoder = StreamDecoder::new(sse_body(&[event.trim_end()]));
    assert_eq!(drain(&mut decoder).await, vec!["tail"]);
}

#[tokio::test]
async fn unterminated_final_sentinel_is_clean_end() {
    let event = content_event("a");
    let mut decoder = StreamDecoder::new(sse_body(&[&event, "data: [DONE]"]));
    assert_eq!(drain(&mut decoder).await, vec!["a"]);
}

// ---------------------------------------------------------------------------
// Test 7: not restartable
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reads_after_end_are_stream_closed() {
    let mut decoder = StreamDecoder::new(sse_body(&["data: [DONE]\n\n"]));
    assert!(decoder.next_event().await.unwrap().is_none());
    assert!(matches!(decoder.next_event().await, Err(Error::StreamClosed)));
    assert!(matches!(decoder.next_event().await, Err(Error::StreamClosed)));
}

// ---------------------------------------------------------------------------
// Tests 8-9: release
// ---------------------------------------------------------------------------

#[tokio::test]
async fn close_is_idempotent() {
    let hello = content_event("Hello");
    let (body, releases) = tracked_pending(chunks(&[&hello]));
    let mut decoder = StreamDecoder::new(body);
    assert!(decoder.next_event().await.unwrap().is_some());

    decoder.close();
    decoder.close();
    assert_eq!(releases.load(Ordering::SeqCst), 1);
    assert!(decoder.is_closed());
    assert!(matches!(decoder.next_event().await, Err(Error::StreamClosed)));

    drop(decoder);
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn drop_releases_body_once() {
    let (body, releases) = tracked_pending(Vec::new());
    let decoder = StreamDecoder::new(body);
    assert_eq!(releases.load(Ordering::SeqCst), 0);
    drop(decoder);
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn sentinel_releases_before_drop() {
    let (body, releases) = tracked_pending(chunks(&["data: [DONE]\n\n"]));
    let mut decoder = StreamDecoder::new(body);
    assert!(decoder.next_event().await.unwrap().is_none());
    assert_eq!(releases.load(Ordering::SeqCst), 1);
    decoder.close();
    drop(decoder);
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn eof_releases_once() {
    let hello = content_event("Hello");
    let (body, releases) = tracked(chunks(&[&hello]));
    let mut decoder = StreamDecoder::new(body);
    assert_eq!(drain(&mut decoder).await, vec!["Hello"]);
    drop(decoder);
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// Test 10: transport error
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transport_error_releases_body() {
    let hello = content_event("Hello");
    let mut items = chunks(&[&hello]);
    items.push(Err(HttpError::Transport("connection reset".into())));
    let (body, releases) = tracked(items);
    let mut decoder = StreamDecoder::new(body);

    assert!(decoder.next_event().await.unwrap().is_some());
    let err = decoder.next_event().await.unwrap_err();
    assert!(matches!(err, Error::Transport(HttpError::Transport(_))));
    assert_eq!(releases.load(Ordering::SeqCst), 1);
    assert!(matches!(decoder.next_event().await, Err(Error::StreamClosed)));
}

// ---------------------------------------------------------------------------
// Test 11: cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancellation_aborts_pending_read() {
    let hello = content_event("Hello");
    let (body, releases) = tracked_pending(chunks(&[&hello]));
    let token = CancellationToken::new();
    let mut decoder = StreamDecoder::new(body).with_cancellation(token.clone());

    assert!(decoder.next_event().await.unwrap().is_some());

    let canceller = tokio::spawn({
        let token = token.clone();
        async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            token.cancel();
        }
    });

    let err = decoder.next_event().await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(releases.load(Ordering::SeqCst), 1);

    decoder.close();
    drop(decoder);
    assert_eq!(releases.load(Ordering::SeqCst), 1);
    canceller.await.unwrap();
}

#[tokio::test]
async fn buffered_events_still_read_before_cancel_checked() {
    let hello = content_event("Hello");
    let world = content_event(" world");
    let token = CancellationToken::new();
    let mut decoder = StreamDecoder::new(sse_body(&[&format!("{hello}{world}")]))
        .with_cancellation(token.clone());
    assert!(decoder.next_event().await.unwrap().is_some());
    token.cancel();
    // The second event is already buffered.
    assert!(decoder.next_event().await.unwrap().is_some());
    assert!(decoder.next_event().await.unwrap_err().is_cancelled());
}

// ---------------------------------------------------------------------------
// Test 12: adapters
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_body_decoded_as_single_chunk() {
    let body = format!("{}{}data: [DONE]\n\n", content_event("a"), content_event("b"));
    let mut decoder = StreamDecoder::from_body(HttpBody::Full(Bytes::from(body)));
    assert_eq!(drain(&mut decoder).await, vec!["a", "b"]);
}

#[tokio::test]
async fn into_stream_yields_decode_errors_and_ends() {
    let hello = content_event("Hello");
    let decoder = StreamDecoder::new(sse_body(&["data: {bad\n\n", &hello, "data: [DONE]\n\n"]));
    let items: Vec<_> = decoder.into_stream().collect().await;
    assert_eq!(items.len(), 2);
    assert!(matches!(items[0], Err(Error::Decode { .. })));
    assert_eq!(items[1].as_ref().unwrap().content(), Some("Hello"));
}

#[tokio::test]
async fn into_stream_ends_after_transport_error() {
    let mut items = chunks(&[&content_event("a")]);
    items.push(Err(HttpError::Timeout("read".into())));
    let decoder = StreamDecoder::new(Box::pin(futures_util::stream::iter(items)));
    let results: Vec<_> = decoder.into_stream().collect().await;
    assert_eq!(results.len(), 2);
    assert!(results[1].as_ref().unwrap_err().is_timeout());
}

#[tokio::test]
async fn accumulator_rebuilds_streamed_message() {
    let mut decoder = StreamDecoder::new(sse_body(&[
        &content_event("Hel"),
        &content_event("lo"),
        "data: {\"id\":\"cmpl-1\",\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}],\"usage\":{\"prompt_tokens\":1,\"completion_tokens\":2,\"total_tokens\":3}}\n\n",
        "data: [DONE]\n\n",
    ]));
    let mut acc = StreamAccumulator::new();
    while let Some(event) = decoder.next_event().await.unwrap() {
        acc.push(&event).unwrap();
    }
    let resp = acc.finish();
    assert_eq!(resp.text().as_deref(), Some("Hello"));
    assert_eq!(resp.choices[0].finish_reason.as_deref(), Some("stop"));
    assert_eq!(resp.usage.unwrap().total_tokens, 3);
}

// ---------------------------------------------------------------------------
// Test 13: line limit
// ---------------------------------------------------------------------------

#[tokio::test]
async fn endless_line_aborts_stream_and_releases_body() {
    let hello = content_event("Hello");
    let filler = "x".repeat(64);
    let mut items = chunks(&[&hello, "data: {\"id\":\""]);
    for _ in 0..8 {
        items.push(Ok(Bytes::from(filler.clone())));
    }
    let (body, releases) = tracked_pending(items);
    let mut decoder = StreamDecoder::new(body).with_max_line_bytes(256);

    assert_eq!(decoder.next_event().await.unwrap().unwrap().content(), Some("Hello"));
    let err = decoder.next_event().await.unwrap_err();
    assert!(matches!(err, Error::LineTooLong { limit: 256 }), "{err}");
    assert_eq!(releases.load(Ordering::SeqCst), 1);
    assert!(matches!(decoder.next_event().await, Err(Error::StreamClosed)));
}

#[tokio::test]
async fn long_lines_within_limit_decode() {
    let long = "y".repeat(1000);
    let event = content_event(&long);
    let (a, b) = event.split_at(500);
    let mut decoder = StreamDecoder::new(sse_body(&[a, b, "data: [DONE]\n\n"]))
        .with_max_line_bytes(2048);
    assert_eq!(drain(&mut decoder).await, vec![long]);
}

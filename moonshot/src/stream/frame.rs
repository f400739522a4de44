// Copyright 2026 The moonshot-rs Project
// SPDX-License-Identifier: Apache-2.0

// SSE line framing
//
// Splits a byte stream into lines and classifies each line. Works on bytes
// so that multi-byte UTF-8 sequences split across chunks are reassembled
// before anything is decoded.

/// Field marker of a data line. Only the spaced form is recognised.
pub(crate) const DATA_PREFIX: &[u8] = b"data: ";

/// Payload that ends the stream.
pub(crate) const DONE_SENTINEL: &[u8] = b"[DONE]";

/// What a single SSE line means to the decoder.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Frame<'a> {
    /// Blank line, comment, or a field other than `data`.
    Skip,
    /// The `[DONE]` sentinel.
    Done,
    /// A data payload to decode.
    Data(&'a [u8]),
}

pub(crate) fn classify_line(line: &[u8]) -> Frame<'_> {
    let line = trim_ascii(line);
    if line.is_empty() {
        return Frame::Skip;
    }
    match line.strip_prefix(DATA_PREFIX) {
        Some(payload) if payload == DONE_SENTINEL => Frame::Done,
        Some(payload) => Frame::Data(payload),
        None => Frame::Skip,
    }
}

fn trim_ascii(mut bytes: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = bytes {
        if first.is_ascii_whitespace() {
            bytes = rest;
        } else {
            break;
        }
    }
    while let [rest @ .., last] = bytes {
        if last.is_ascii_whitespace() {
            bytes = rest;
        } else {
            break;
        }
    }
    bytes
}

// ---------------------------------------------------------------------------
// Line buffer
// ---------------------------------------------------------------------------

/// Longest line accepted before a newline arrives.
pub const MAX_LINE_BYTES: usize = 4 * 1024 * 1024; // 4 MB

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LineTooLong {
    pub(crate) limit: usize,
}

/// Accumulates chunks and yields complete `\n`-terminated lines.
#[derive(Debug)]
pub(crate) struct LineBuffer {
    buf: Vec<u8>,
    /// Start of the first unread byte in `buf`.
    pos: usize,
    /// Bytes after the last newline seen.
    partial: usize,
    max_line: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new(MAX_LINE_BYTES)
    }
}

impl LineBuffer {
    pub(crate) fn new(max_line: usize) -> Self {
        Self {
            buf: Vec::new(),
            pos: 0,
            partial: 0,
            max_line,
        }
    }

    /// Append a chunk. Fails once the unterminated tail exceeds the line
    /// limit; the chunk is not buffered in that case.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Result<(), LineTooLong> {
        let partial = match chunk.iter().rposition(|&b| b == b'\n') {
            Some(i) => chunk.len() - i - 1,
            None => self.partial + chunk.len(),
        };
        if partial > self.max_line {
            return Err(LineTooLong {
                limit: self.max_line,
            });
        }
        self.partial = partial;

        if self.pos > 0 && self.pos == self.buf.len() {
            self.buf.clear();
            self.pos = 0;
        } else if self.pos > 4096 && self.pos * 2 > self.buf.len() {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
        self.buf.extend_from_slice(chunk);
        Ok(())
    }

    /// Next complete line without its terminator.
    pub(crate) fn next_line(&mut self) -> Option<&[u8]> {
        let unread = &self.buf[self.pos..];
        let newline = unread.iter().position(|&b| b == b'\n')?;
        let start = self.pos;
        self.pos += newline + 1;
        Some(&self.buf[start..start + newline])
    }

    /// Whatever is left after the last newline. Used once the body ends.
    pub(crate) fn take_remaining(&mut self) -> Option<Vec<u8>> {
        if self.pos >= self.buf.len() {
            return None;
        }
        let rest = self.buf[self.pos..].to_vec();
        self.buf.clear();
        self.pos = 0;
        self.partial = 0;
        Some(rest)
    }
}

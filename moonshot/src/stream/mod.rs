// Copyright 2026 The moonshot-rs Project
// SPDX-License-Identifier: Apache-2.0

// Streaming completion decoding
//
// Responsibilities:
// - Frame an SSE byte stream into lines, across chunk boundaries
// - Skip blank lines and non-data fields, stop at the `[DONE]` sentinel
// - Decode each data payload into a typed event, reporting malformed ones
// - Release the response body exactly once, including on cancellation
// - Fold events back into a complete response

mod accumulator;
mod decoder;
mod frame;

pub use accumulator::{
    AccumulateError, StreamAccumulator, MAX_TOOL_CALLS, MAX_TOOL_CALL_ARGUMENT_BYTES,
};
pub use decoder::StreamDecoder;
pub use frame::MAX_LINE_BYTES;

#[cfg(test)]
mod tests;

//! Payload decoding
//!
//! The payload schema (content, optional per-frame content, optional
//! request/response trace) is owned by the capture script; this side only
//! requires a single well-formed JSON value. All-or-nothing: a truncated
//! payload is a failure, never a partial result.

use serde_json::Value;

/// Decode the sanitized payload. The caller maps errors to
/// [`FetchError::InvalidOutput`](crate::FetchError::InvalidOutput) together
/// with the raw process output.
pub fn parse_payload(payload: &str) -> serde_json::Result<Value> {
    serde_json::from_str(payload)
}

//! Marker-based stdout cleanup
//!
//! PhantomJS and page-injected scripts can write arbitrary diagnostics to
//! stdout before the capture script prints its payload. The script prints
//! the marker immediately before the JSON, so everything up to and
//! including the first marker occurrence is noise.

/// Split `output` at the first occurrence of `marker`.
///
/// Returns the payload (text after the marker) and the number of noise
/// bytes discarded. When the marker is absent the whole input is returned
/// as a best-effort payload with a zero count; deciding whether that
/// payload is usable is the parser's job.
pub fn strip_noise<'a>(output: &'a str, marker: &str) -> (&'a str, usize) {
    match output.find(marker) {
        Some(i) => (&output[i + marker.len()..], i),
        None => (output, 0),
    }
}

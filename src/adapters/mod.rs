//! Built-in adapters
//!
//! - **truncating** — single-call adapter echoing the first `n` characters
//!   of the prompt, with per-character streaming
//! - **batch** — batch adapter returning structured generations and usage

pub mod batch;
pub mod truncating;

pub use batch::TruncatingBatchLlm;
pub use truncating::TruncatingLlm;

use crate::error::{LlmError, Result};
use crate::types::CallOptions;

/// First `n` characters of `text` (the whole string when shorter)
///
/// Counts Unicode scalar values, so a multi-byte character is never split.
pub fn truncate_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Reject stop sequences, which the truncating adapters cannot honor
fn ensure_no_stop(options: &CallOptions) -> Result<()> {
    if options.stop.is_empty() {
        Ok(())
    } else {
        Err(LlmError::InvalidOptions(
            "stop sequences are not supported".to_string(),
        ))
    }
}

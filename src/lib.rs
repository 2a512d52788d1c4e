//! # a3s-llm
//!
//! Custom language-model adapters with callback-driven streaming for the A3S ecosystem.
//!
//! ## Overview
//!
//! `a3s-llm` defines the extension points a custom model implements and the
//! runner that drives it. A model only has to produce text; the runner
//! opens runs, notifies callback handlers, falls back to a single chunk
//! when the model cannot stream, and batches prompts.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_llm::{CallOptions, LlmRunner, TruncatingLlm};
//! use futures::StreamExt;
//!
//! # async fn example() -> a3s_llm::Result<()> {
//! let runner = LlmRunner::from_llm(TruncatingLlm::new(4));
//!
//! let text = runner.invoke("I am an LLM", &CallOptions::default()).await?;
//! assert_eq!(text, "I am");
//!
//! let mut chunks = runner.stream("I am an LLM", CallOptions::default());
//! while let Some(chunk) = chunks.next().await {
//!     print!("{}|", chunk?.text);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Adapters
//!
//! - **TruncatingLlm** — single-call adapter echoing the first `n` characters,
//!   streamed one character at a time
//! - **TruncatingBatchLlm** — batch adapter with per-generation metadata and
//!   aggregate token usage
//!
//! ## Architecture
//!
//! - **Llm** trait — single-call contract, optional streaming
//! - **BaseLlm** trait — batch contract producing `LlmResult`
//! - **CallbackHandler** trait — run lifecycle notifications
//! - **LlmRunner** — invoke / stream / generate / batch / stream_events

pub mod adapters;
pub mod callbacks;
pub mod config;
pub mod error;
pub mod llm;
pub mod runner;
pub mod types;

// Re-export core types
pub use callbacks::{
    CallbackHandler, CallbackManager, ChannelCallbackHandler, LoggingCallbackHandler,
    MemoryCallbackHandler, RunContext, RunEvent, RunEventKind, RunManager,
};
pub use config::{RunConfig, TruncatingConfig};
pub use error::{LlmError, Result};
pub use llm::{BaseLlm, CallAdapter, ChunkStream, Llm};
pub use runner::LlmRunner;
pub use types::{CallOptions, Generation, GenerationChunk, LlmResult, RunInfo, TokenUsage};

// Re-export adapters for convenience
pub use adapters::{TruncatingBatchLlm, TruncatingLlm};

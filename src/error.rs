//! Error types for a3s-llm

use thiserror::Error;

/// Errors that can occur while running a language-model adapter
#[derive(Debug, Error)]
pub enum LlmError {
    /// Call options the adapter does not accept (e.g. stop sequences)
    #[error("Invalid call options: {0}")]
    InvalidOptions(String),

    /// Adapter-specific generation failure
    #[error("Generation failed: {0}")]
    Generation(String),

    /// A callback handler with `raise_error()` set failed
    #[error("Callback handler '{handler}' failed: {reason}")]
    Callback { handler: String, reason: String },

    /// The model returned no generation for an input
    #[error("Model returned no generation for input {0}")]
    EmptyGeneration(usize),

    /// Event channel closed or unavailable
    #[error("Channel error: {0}")]
    Channel(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for adapter operations
pub type Result<T> = std::result::Result<T, LlmError>;

//! Truncating single-call adapter
//!
//! Echoes the first `n` characters of the prompt. Streaming emits the same
//! text one character at a time, reporting each character to the run's
//! handlers before yielding it.

use super::{ensure_no_stop, truncate_chars};
use crate::callbacks::RunManager;
use crate::config::TruncatingConfig;
use crate::error::Result;
use crate::llm::{boxed_chunks, ChunkStream, Llm};
use crate::types::{CallOptions, GenerationChunk};
use async_trait::async_trait;
use serde_json::Value;

/// Single-call adapter returning a prefix of the prompt
#[derive(Debug, Clone, Default)]
pub struct TruncatingLlm {
    config: TruncatingConfig,
}

impl TruncatingLlm {
    pub fn new(n: usize) -> Self {
        Self {
            config: TruncatingConfig::new(n),
        }
    }

    pub fn from_config(config: TruncatingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn n(&self) -> usize {
        self.config.n
    }

    pub fn config(&self) -> &TruncatingConfig {
        &self.config
    }
}

#[async_trait]
impl Llm for TruncatingLlm {
    fn llm_type(&self) -> &str {
        "custom"
    }

    fn identifying_params(&self) -> Value {
        serde_json::json!({ "modelName": self.config.model_name })
    }

    async fn call(
        &self,
        prompt: &str,
        options: &CallOptions,
        _run: Option<&RunManager>,
    ) -> Result<String> {
        ensure_no_stop(options)?;
        Ok(truncate_chars(prompt, self.config.n).to_string())
    }

    fn stream<'a>(
        &'a self,
        prompt: &'a str,
        options: &'a CallOptions,
        run: Option<&'a RunManager>,
    ) -> Option<ChunkStream<'a>> {
        let n = self.config.n;
        Some(boxed_chunks(async_stream::stream! {
            if let Err(e) = ensure_no_stop(options) {
                yield Err(e);
                return;
            }

            for ch in truncate_chars(prompt, n).chars() {
                let chunk = GenerationChunk::new(ch.to_string());
                if let Some(run) = run {
                    if let Err(e) = run.on_llm_new_token(&chunk.text, Some(&chunk)).await {
                        yield Err(e);
                        return;
                    }
                }
                yield Ok(chunk);
            }
        }))
    }
}

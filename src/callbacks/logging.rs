//! Callback handler that reports run lifecycle through `tracing`

use super::{CallbackHandler, RunContext};
use crate::error::{LlmError, Result};
use crate::types::{GenerationChunk, LlmResult};
use async_trait::async_trait;
use serde_json::Value;

/// Emits one `tracing` record per notification
///
/// Start/end/error go out at `info`/`warn`; tokens at `trace` so streaming
/// does not flood the default log level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingCallbackHandler;

#[async_trait]
impl CallbackHandler for LoggingCallbackHandler {
    fn name(&self) -> &str {
        "logging"
    }

    async fn on_llm_start(&self, run: &RunContext, prompt: &str, _serialized: &Value) -> Result<()> {
        tracing::info!(
            run_id = %run.run_id,
            name = %run.name,
            prompt_chars = prompt.chars().count(),
            "LLM run started"
        );
        Ok(())
    }

    async fn on_llm_new_token(
        &self,
        run: &RunContext,
        token: &str,
        _chunk: Option<&GenerationChunk>,
    ) -> Result<()> {
        tracing::trace!(run_id = %run.run_id, token = %token, "LLM token");
        Ok(())
    }

    async fn on_llm_end(&self, run: &RunContext, result: &LlmResult) -> Result<()> {
        tracing::info!(
            run_id = %run.run_id,
            name = %run.name,
            generations = result.generations.iter().map(Vec::len).sum::<usize>(),
            usage = ?result.token_usage(),
            "LLM run finished"
        );
        Ok(())
    }

    async fn on_llm_error(&self, run: &RunContext, error: &LlmError) -> Result<()> {
        tracing::warn!(run_id = %run.run_id, name = %run.name, error = %error, "LLM run failed");
        Ok(())
    }
}

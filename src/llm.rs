//! Language-model adapter traits
//!
//! Two extension points:
//! - [`Llm`] — single-call contract: one prompt in, one completion out.
//!   Optionally streams the completion chunk by chunk.
//! - [`BaseLlm`] — batch contract: a list of prompts in, structured
//!   generations with aggregate metadata out.
//!
//! Any `Llm` becomes a `BaseLlm` through [`CallAdapter`], which is how the
//! runner drives both kinds uniformly.

use crate::callbacks::RunManager;
use crate::error::Result;
use crate::types::{CallOptions, Generation, GenerationChunk, LlmResult};
use async_trait::async_trait;
use futures::stream::{BoxStream, Stream};
use serde_json::Value;

/// Lazily produced completion chunks
pub type ChunkStream<'a> = BoxStream<'a, Result<GenerationChunk>>;

/// Box a chunk stream, pinning its item type
pub fn boxed_chunks<'a, S>(stream: S) -> ChunkStream<'a>
where
    S: Stream<Item = Result<GenerationChunk>> + Send + 'a,
{
    Box::pin(stream)
}

/// Single-call language model
#[async_trait]
pub trait Llm: Send + Sync {
    /// Short type label used for logging and run names
    fn llm_type(&self) -> &str;

    /// Parameters that identify this model instance
    fn identifying_params(&self) -> Value {
        Value::Object(Default::default())
    }

    /// Produce a completion for `prompt`
    ///
    /// `run` is present when the call is tracked; implementations that
    /// produce tokens incrementally may report them through it.
    async fn call(
        &self,
        prompt: &str,
        options: &CallOptions,
        run: Option<&RunManager>,
    ) -> Result<String>;

    /// Stream the completion for `prompt`
    ///
    /// Returns `None` when the model does not support streaming; callers
    /// then fall back to `call`. Implementations must report each chunk
    /// through `run.on_llm_new_token` before yielding it.
    fn stream<'a>(
        &'a self,
        _prompt: &'a str,
        _options: &'a CallOptions,
        _run: Option<&'a RunManager>,
    ) -> Option<ChunkStream<'a>> {
        None
    }
}

/// Batch language model producing structured results
#[async_trait]
pub trait BaseLlm: Send + Sync {
    /// Short type label used for logging and run names
    fn llm_type(&self) -> &str;

    /// Parameters that identify this model instance
    fn identifying_params(&self) -> Value {
        Value::Object(Default::default())
    }

    /// Generate candidates for every prompt
    ///
    /// The result must contain one non-empty generation list per prompt,
    /// in input order. `runs[i]` tracks prompt `i`; `runs` is empty when
    /// the call is untracked.
    async fn generate(
        &self,
        prompts: &[String],
        options: &CallOptions,
        runs: &[RunManager],
    ) -> Result<LlmResult>;

    /// Stream the completion for a single prompt (`None` = unsupported)
    fn stream<'a>(
        &'a self,
        _prompt: &'a str,
        _options: &'a CallOptions,
        _run: Option<&'a RunManager>,
    ) -> Option<ChunkStream<'a>> {
        None
    }

    /// Description passed to `on_llm_start` handlers
    fn serialized(&self) -> Value {
        serde_json::json!({
            "type": self.llm_type(),
            "params": self.identifying_params(),
        })
    }
}

/// Lifts a single-call [`Llm`] into a [`BaseLlm`]
///
/// Prompts are completed one after another; each yields exactly one
/// generation and reports through its own run.
pub struct CallAdapter<L> {
    inner: L,
}

impl<L: Llm> CallAdapter<L> {
    pub fn new(inner: L) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }
}

#[async_trait]
impl<L: Llm> BaseLlm for CallAdapter<L> {
    fn llm_type(&self) -> &str {
        self.inner.llm_type()
    }

    fn identifying_params(&self) -> Value {
        self.inner.identifying_params()
    }

    async fn generate(
        &self,
        prompts: &[String],
        options: &CallOptions,
        runs: &[RunManager],
    ) -> Result<LlmResult> {
        let mut generations = Vec::with_capacity(prompts.len());
        for (i, prompt) in prompts.iter().enumerate() {
            let text = self.inner.call(prompt, options, runs.get(i)).await?;
            generations.push(vec![Generation::new(text)]);
        }
        Ok(LlmResult::new(generations))
    }

    fn stream<'a>(
        &'a self,
        prompt: &'a str,
        options: &'a CallOptions,
        run: Option<&'a RunManager>,
    ) -> Option<ChunkStream<'a>> {
        self.inner.stream(prompt, options, run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::{CallbackManager, MemoryCallbackHandler};
    use crate::error::LlmError;
    use futures::StreamExt;
    use std::sync::Arc;

    struct Upper;

    #[async_trait]
    impl Llm for Upper {
        fn llm_type(&self) -> &str {
            "upper"
        }

        async fn call(
            &self,
            prompt: &str,
            _options: &CallOptions,
            run: Option<&RunManager>,
        ) -> Result<String> {
            if let Some(run) = run {
                run.on_llm_new_token(prompt, None).await?;
            }
            if prompt.is_empty() {
                return Err(LlmError::Generation("empty prompt".to_string()));
            }
            Ok(prompt.to_uppercase())
        }
    }

    #[tokio::test]
    async fn test_call_adapter_one_generation_per_prompt() {
        let model = CallAdapter::new(Upper);
        let prompts = vec!["ab".to_string(), "cd".to_string()];

        let result = model
            .generate(&prompts, &CallOptions::default(), &[])
            .await
            .unwrap();

        assert_eq!(result.generations.len(), 2);
        assert!(result.generations.iter().all(|g| g.len() == 1));
        assert_eq!(result.text(0), Some("AB"));
        assert_eq!(result.text(1), Some("CD"));
        assert!(result.llm_output.is_none());
    }

    #[tokio::test]
    async fn test_call_adapter_propagates_failure() {
        let model = CallAdapter::new(Upper);
        let prompts = vec!["ok".to_string(), String::new()];

        let err = model
            .generate(&prompts, &CallOptions::default(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Generation(_)));
    }

    #[tokio::test]
    async fn test_call_adapter_reports_through_each_prompts_run() {
        let memory = Arc::new(MemoryCallbackHandler::default());
        let manager = CallbackManager::new().with_handler(memory.clone());
        let prompts = vec!["first".to_string(), "second".to_string()];
        let runs = manager
            .on_llm_start("upper", &Value::Null, &prompts)
            .await
            .unwrap();

        CallAdapter::new(Upper)
            .generate(&prompts, &CallOptions::default(), &runs)
            .await
            .unwrap();

        let first: Vec<Option<String>> = memory
            .events_for(runs[0].run_id())
            .await
            .iter()
            .map(|e| e.token().map(str::to_string))
            .collect();
        assert_eq!(first, vec![None, Some("first".to_string())]);

        let second = memory.events_for(runs[1].run_id()).await;
        assert_eq!(second.len(), 2);
        assert_eq!(second[1].token(), Some("second"));
    }

    #[tokio::test]
    async fn test_default_stream_is_unsupported() {
        let model = CallAdapter::new(Upper);
        let opts = CallOptions::default();
        assert!(model.stream("x", &opts, None).is_none());
    }

    #[test]
    fn test_serialized_includes_type_and_params() {
        let model = CallAdapter::new(Upper);
        let serialized = model.serialized();
        assert_eq!(serialized["type"], "upper");
        assert_eq!(serialized["params"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_boxed_chunks() {
        let stream = boxed_chunks(futures::stream::iter(vec![
            Ok(GenerationChunk::new("a")),
            Ok(GenerationChunk::new("b")),
        ]));
        let texts: Vec<String> = stream.map(|c| c.unwrap().text).collect().await;
        assert_eq!(texts, vec!["a", "b"]);
    }
}

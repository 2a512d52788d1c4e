//! Truncating batch adapter with structured output
//!
//! Each prompt yields exactly one generation carrying `{"outputCount": 1}`
//! as generation metadata. The aggregate output reports character-based
//! token usage and the configured model name.

use super::{ensure_no_stop, truncate_chars};
use crate::callbacks::RunManager;
use crate::config::TruncatingConfig;
use crate::error::Result;
use crate::llm::BaseLlm;
use crate::types::{CallOptions, Generation, LlmResult, TokenUsage};
use async_trait::async_trait;
use serde_json::Value;

/// Number of candidates produced per prompt
const OUTPUT_COUNT: usize = 1;

/// Batch adapter returning a prefix of every prompt
#[derive(Debug, Clone, Default)]
pub struct TruncatingBatchLlm {
    config: TruncatingConfig,
}

impl TruncatingBatchLlm {
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
}

#[async_trait]
impl BaseLlm for TruncatingBatchLlm {
    fn llm_type(&self) -> &str {
        "custom_batch"
    }

    fn identifying_params(&self) -> Value {
        serde_json::json!({ "modelName": self.config.model_name, "n": self.config.n })
    }

    async fn generate(
        &self,
        prompts: &[String],
        options: &CallOptions,
        _runs: &[RunManager],
    ) -> Result<LlmResult> {
        ensure_no_stop(options)?;

        let mut prompt_tokens = 0;
        let mut completion_tokens = 0;
        let mut generations = Vec::with_capacity(prompts.len());

        for prompt in prompts {
            let text = truncate_chars(prompt, self.config.n);
            prompt_tokens += prompt.chars().count();
            completion_tokens += text.chars().count();
            generations.push(vec![
                Generation::new(text).with_info("outputCount", serde_json::json!(OUTPUT_COUNT))
            ]);
        }

        let usage = TokenUsage::new(prompt_tokens, completion_tokens);
        tracing::debug!(
            prompts = prompts.len(),
            completion_tokens = usage.completion_tokens,
            "Batch generated"
        );

        Ok(LlmResult::new(generations).with_llm_output(serde_json::json!({
            "tokenUsage": usage,
            "modelName": self.config.model_name,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::TruncatingLlm;
    use crate::error::LlmError;
    use crate::llm::Llm;

    fn prompts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_generate_structured_output() {
        let llm = TruncatingBatchLlm::new(4);
        let result = llm
            .generate(&prompts(&["I am an LLM", "hi"]), &CallOptions::default(), &[])
            .await
            .unwrap();

        assert_eq!(result.generations.len(), 2);
        assert_eq!(result.text(0), Some("I am"));
        assert_eq!(result.text(1), Some("hi"));
        for gens in &result.generations {
            assert_eq!(gens.len(), 1);
            assert_eq!(gens[0].generation_info.as_ref().unwrap()["outputCount"], 1);
        }
    }

    #[tokio::test]
    async fn test_generate_usage() {
        let llm = TruncatingBatchLlm::new(4);
        let result = llm
            .generate(&prompts(&["I am an LLM", "hi"]), &CallOptions::default(), &[])
            .await
            .unwrap();

        assert_eq!(result.token_usage(), Some(TokenUsage::new(13, 6)));
        assert_eq!(result.llm_output.unwrap()["modelName"], "truncating-llm");
    }

    #[tokio::test]
    async fn test_generate_matches_single_call() {
        let batch = TruncatingBatchLlm::new(3);
        let single = TruncatingLlm::new(3);
        let inputs = prompts(&["abcdef", "", "xy", "ünïcode"]);

        let result = batch
            .generate(&inputs, &CallOptions::default(), &[])
            .await
            .unwrap();

        for (i, prompt) in inputs.iter().enumerate() {
            let expected = single.call(prompt, &CallOptions::default(), None).await.unwrap();
            assert_eq!(result.text(i), Some(expected.as_str()));
        }
    }

    #[tokio::test]
    async fn test_generate_empty_batch() {
        let llm = TruncatingBatchLlm::new(4);
        let result = llm.generate(&[], &CallOptions::default(), &[]).await.unwrap();
        assert!(result.generations.is_empty());
        assert_eq!(result.token_usage(), Some(TokenUsage::default()));
    }

    #[tokio::test]
    async fn test_generate_rejects_stop() {
        let llm = TruncatingBatchLlm::new(4);
        let opts = CallOptions::default().with_stop("x");
        let err = llm.generate(&prompts(&["a"]), &opts, &[]).await.unwrap_err();
        assert!(matches!(err, LlmError::InvalidOptions(_)));
    }

    #[test]
    fn test_batch_does_not_stream() {
        let llm = TruncatingBatchLlm::new(4);
        let opts = CallOptions::default();
        assert!(llm.stream("abc", &opts, None).is_none());
        assert_eq!(llm.llm_type(), "custom_batch");
        assert_eq!(llm.identifying_params()["n"], 4);
    }
}

//! Runner driving adapters with callback dispatch
//!
//! `LlmRunner` wraps any [`BaseLlm`] (or any [`Llm`] through
//! [`CallAdapter`]) and takes care of run lifecycle: opening runs,
//! reporting end/error to handlers, falling back to a single chunk for
//! models that cannot stream, bounded-concurrency batching, and turning a
//! streaming run into a stream of [`RunEvent`]s.

use crate::callbacks::{CallbackHandler, CallbackManager, ChannelCallbackHandler, RunEvent, RunManager};
use crate::config::RunConfig;
use crate::error::{LlmError, Result};
use crate::llm::{boxed_chunks, BaseLlm, CallAdapter, ChunkStream, Llm};
use crate::types::{CallOptions, Generation, GenerationChunk, LlmResult, RunInfo};
use futures::{StreamExt, TryStreamExt};
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::Instrument;

/// Capacity of the channel behind `stream_events`
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Executes adapters and reports their runs to callback handlers
#[derive(Clone)]
pub struct LlmRunner {
    model: Arc<dyn BaseLlm>,
    callbacks: CallbackManager,
    config: RunConfig,
}

impl std::fmt::Debug for LlmRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmRunner")
            .field("model", &self.model.llm_type())
            .field("callbacks", &self.callbacks)
            .field("config", &self.config)
            .finish()
    }
}

impl LlmRunner {
    /// Create a runner for a batch model
    pub fn new(model: impl BaseLlm + 'static) -> Self {
        Self {
            model: Arc::new(model),
            callbacks: CallbackManager::new(),
            config: RunConfig::default(),
        }
    }

    /// Create a runner for a single-call model
    pub fn from_llm(llm: impl Llm + 'static) -> Self {
        Self::new(CallAdapter::new(llm))
    }

    pub fn with_callback(mut self, handler: Arc<dyn CallbackHandler>) -> Self {
        self.callbacks.add_handler(handler);
        self
    }

    pub fn with_callbacks(mut self, callbacks: CallbackManager) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn with_config(mut self, config: RunConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn model(&self) -> &dyn BaseLlm {
        self.model.as_ref()
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Name given to runs: the configured run name or the model's type label
    pub fn run_name(&self) -> &str {
        self.config
            .run_name
            .as_deref()
            .unwrap_or_else(|| self.model.llm_type())
    }

    fn manager(&self) -> CallbackManager {
        self.callbacks
            .clone()
            .with_tags(self.config.tags.iter().cloned())
            .with_metadata(self.config.metadata.clone())
    }

    /// Complete one prompt
    pub async fn invoke(&self, prompt: &str, options: &CallOptions) -> Result<String> {
        let span = tracing::info_span!(
            "a3s.llm.invoke",
            "a3s.llm.type" = %self.model.llm_type(),
            "a3s.llm.run_name" = %self.run_name(),
        );
        async {
            let prompts = vec![prompt.to_string()];
            let result = self.execute(&prompts, options).await?;
            let text = result.text(0).ok_or(LlmError::EmptyGeneration(0))?;
            Ok(text.to_string())
        }
        .instrument(span)
        .await
    }

    /// Generate structured results for a list of prompts in one model call
    pub async fn generate(&self, prompts: &[String], options: &CallOptions) -> Result<LlmResult> {
        let span = tracing::info_span!(
            "a3s.llm.generate",
            "a3s.llm.type" = %self.model.llm_type(),
            "a3s.llm.prompts" = prompts.len(),
        );
        self.execute(prompts, options).instrument(span).await
    }

    /// Complete every prompt independently, preserving input order
    ///
    /// At most `max_concurrency` invocations are in flight.
    pub async fn batch(&self, prompts: &[String], options: &CallOptions) -> Result<Vec<String>> {
        let span = tracing::info_span!(
            "a3s.llm.batch",
            "a3s.llm.type" = %self.model.llm_type(),
            "a3s.llm.prompts" = prompts.len(),
        );
        let limit = self
            .config
            .max_concurrency
            .unwrap_or(prompts.len())
            .max(1);

        futures::stream::iter(prompts.iter().map(|p| self.invoke(p, options)))
            .buffered(limit)
            .try_collect()
            .instrument(span)
            .await
    }

    /// Stream the completion for one prompt
    ///
    /// Models without streaming support produce a single chunk holding the
    /// whole completion. Every chunk has been reported to the handlers by
    /// the time it is yielded.
    pub fn stream(&self, prompt: impl Into<String>, options: CallOptions) -> ChunkStream<'static> {
        let runner = self.clone();
        let prompts = vec![prompt.into()];
        let span = tracing::info_span!(
            "a3s.llm.stream",
            "a3s.llm.type" = %self.model.llm_type(),
            "a3s.llm.chunks" = tracing::field::Empty,
        );

        boxed_chunks(async_stream::stream! {
            let runs = match runner
                .manager()
                .on_llm_start(runner.run_name(), &runner.model.serialized(), &prompts)
                .instrument(span.clone())
                .await
            {
                Ok(runs) => runs,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            let run = &runs[0];
            let mut aggregate: Option<GenerationChunk> = None;
            let mut count = 0usize;

            match runner.model.stream(&prompts[0], &options, Some(run)) {
                Some(mut chunks) => {
                    while let Some(item) = chunks.next().instrument(span.clone()).await {
                        match item {
                            Ok(chunk) => {
                                count += 1;
                                aggregate = Some(match aggregate.take() {
                                    Some(agg) => agg + chunk.clone(),
                                    None => chunk.clone(),
                                });
                                yield Ok(chunk);
                            }
                            Err(e) => {
                                report_error(run, &e).await;
                                yield Err(e);
                                return;
                            }
                        }
                    }
                }
                None => {
                    let generated = runner
                        .model
                        .generate(&prompts, &options, std::slice::from_ref(run))
                        .instrument(span.clone())
                        .await
                        .and_then(|result| first_generation(result, 0));
                    let chunk = match generated {
                        Ok(generation) => GenerationChunk {
                            text: generation.text,
                            generation_info: generation.generation_info,
                        },
                        Err(e) => {
                            report_error(run, &e).await;
                            yield Err(e);
                            return;
                        }
                    };
                    if let Err(e) = run.on_llm_new_token(&chunk.text, Some(&chunk)).await {
                        report_error(run, &e).await;
                        yield Err(e);
                        return;
                    }
                    count = 1;
                    aggregate = Some(chunk.clone());
                    yield Ok(chunk);
                }
            }

            span.record("a3s.llm.chunks", count);
            let generation = aggregate.map(Generation::from).unwrap_or_default();
            let mut result = LlmResult::new(vec![vec![generation]]);
            result.run = vec![RunInfo { run_id: run.run_id() }];
            if let Err(e) = run.on_llm_end(&result).await {
                report_error(run, &e).await;
                yield Err(e);
            }
        })
    }

    /// Stream the lifecycle events of a streaming run
    ///
    /// The run executes on a spawned tokio task; the returned stream yields
    /// the start event, one stream event per chunk, and the end (or error)
    /// event, then closes. Must be called from within a tokio runtime.
    pub fn stream_events(&self, prompt: impl Into<String>, options: CallOptions) -> ReceiverStream<RunEvent> {
        let (handler, rx) = ChannelCallbackHandler::channel(EVENT_CHANNEL_CAPACITY);
        let runner = self.clone().with_callback(Arc::new(handler));
        let prompt = prompt.into();

        tokio::spawn(async move {
            let mut chunks = runner.stream(prompt, options);
            while let Some(item) = chunks.next().await {
                if let Err(e) = item {
                    tracing::debug!(error = %e, "Event stream run failed");
                    break;
                }
            }
        });

        ReceiverStream::new(rx)
    }

    /// Open one run per prompt, call the model once, and report the outcome
    ///
    /// Every run is ended even when a handler fails on an earlier one; the
    /// first such failure is returned after all runs have been notified.
    async fn execute(&self, prompts: &[String], options: &CallOptions) -> Result<LlmResult> {
        let runs = self
            .manager()
            .on_llm_start(self.run_name(), &self.model.serialized(), prompts)
            .await?;

        let outcome = self
            .model
            .generate(prompts, options, &runs)
            .await
            .and_then(|result| check_generations(result, prompts.len()));

        let mut result = match outcome {
            Ok(result) => result,
            Err(e) => {
                for run in &runs {
                    report_error(run, &e).await;
                }
                return Err(e);
            }
        };

        result.run = runs.iter().map(|r| RunInfo { run_id: r.run_id() }).collect();
        let mut failure = None;
        for (run, single) in runs.iter().zip(result.flatten()) {
            if let Err(e) = run.on_llm_end(&single).await {
                report_error(run, &e).await;
                if failure.is_none() {
                    failure = Some(e);
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(result),
        }
    }
}

/// Every input must have at least one generation
fn check_generations(result: LlmResult, expected: usize) -> Result<LlmResult> {
    if let Some(index) = (0..expected).find(|&i| result.generations.get(i).map_or(true, Vec::is_empty)) {
        return Err(LlmError::EmptyGeneration(index));
    }
    Ok(result)
}

fn first_generation(result: LlmResult, index: usize) -> Result<Generation> {
    result
        .generations
        .into_iter()
        .nth(index)
        .and_then(|gens| gens.into_iter().next())
        .ok_or(LlmError::EmptyGeneration(index))
}

/// Report a failure to handlers; the model error takes precedence over
/// handler failures.
async fn report_error(run: &RunManager, error: &LlmError) {
    if let Err(e) = run.on_llm_error(error).await {
        tracing::warn!(
            run_id = %run.run_id(),
            error = %e,
            "Callback failed while reporting run error"
        );
    }
}

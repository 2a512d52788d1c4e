//! In-memory callback handler
//!
//! Records every notification as a `RunEvent`. Useful for tests and for
//! inspecting what a run reported after the fact.

use super::{CallbackHandler, RunContext, RunEvent, RunEventKind};
use crate::error::{LlmError, Result};
use crate::types::{GenerationChunk, LlmResult};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Callback handler that keeps recorded events in a bounded `Vec`
pub struct MemoryCallbackHandler {
    events: Arc<RwLock<Vec<RunEvent>>>,
    max_events: usize,
}

impl MemoryCallbackHandler {
    /// Create a handler keeping at most `max_events` (0 = unbounded)
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            max_events,
        }
    }

    async fn record(&self, event: RunEvent) {
        let mut events = self.events.write().await;
        events.push(event);

        // Oldest first out
        if self.max_events > 0 && events.len() > self.max_events {
            let drain_count = events.len() - self.max_events;
            events.drain(..drain_count);
        }
    }

    /// All recorded events in arrival order
    pub async fn events(&self) -> Vec<RunEvent> {
        self.events.read().await.clone()
    }

    /// Events belonging to one run
    pub async fn events_for(&self, run_id: Uuid) -> Vec<RunEvent> {
        let events = self.events.read().await;
        events.iter().filter(|e| e.run_id == run_id).cloned().collect()
    }

    /// Event kinds in arrival order
    pub async fn kinds(&self) -> Vec<RunEventKind> {
        let events = self.events.read().await;
        events.iter().map(|e| e.kind).collect()
    }

    /// Tokens reported through `on_llm_new_token`, in arrival order
    pub async fn tokens(&self) -> Vec<String> {
        let events = self.events.read().await;
        events
            .iter()
            .filter_map(|e| e.token().map(str::to_string))
            .collect()
    }

    pub async fn count(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn clear(&self) {
        self.events.write().await.clear();
    }
}

impl Default for MemoryCallbackHandler {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl CallbackHandler for MemoryCallbackHandler {
    fn name(&self) -> &str {
        "memory"
    }

    async fn on_llm_start(&self, run: &RunContext, prompt: &str, serialized: &Value) -> Result<()> {
        self.record(RunEvent::start(run, prompt, serialized)).await;
        Ok(())
    }

    async fn on_llm_new_token(
        &self,
        run: &RunContext,
        token: &str,
        chunk: Option<&GenerationChunk>,
    ) -> Result<()> {
        self.record(RunEvent::stream(run, token, chunk)).await;
        Ok(())
    }

    async fn on_llm_end(&self, run: &RunContext, result: &LlmResult) -> Result<()> {
        self.record(RunEvent::end(run, result)).await;
        Ok(())
    }

    async fn on_llm_error(&self, run: &RunContext, error: &LlmError) -> Result<()> {
        self.record(RunEvent::error(run, error)).await;
        Ok(())
    }
}

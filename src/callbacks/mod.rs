//! Callback handlers and run tracking
//!
//! Every adapter invocation is a *run* with its own id. Handlers registered
//! on a `CallbackManager` are told when a run starts, when a new token is
//! produced, and when the run ends or fails. Notifications for a run are
//! dispatched to handlers one at a time, in registration order, and each
//! is awaited before the next is sent.

use crate::error::{LlmError, Result};
use crate::types::{GenerationChunk, LlmResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

pub mod channel;
pub mod logging;
pub mod memory;

pub use channel::ChannelCallbackHandler;
pub use logging::LoggingCallbackHandler;
pub use memory::MemoryCallbackHandler;

/// Lifecycle notification for a single run
#[async_trait]
pub trait CallbackHandler: Send + Sync {
    /// Handler name used in logs and errors
    fn name(&self) -> &str;

    /// Whether a failure in this handler aborts the run
    ///
    /// When false (the default), failures are logged and dispatch continues.
    fn raise_error(&self) -> bool {
        false
    }

    async fn on_llm_start(&self, _run: &RunContext, _prompt: &str, _serialized: &Value) -> Result<()> {
        Ok(())
    }

    async fn on_llm_new_token(
        &self,
        _run: &RunContext,
        _token: &str,
        _chunk: Option<&GenerationChunk>,
    ) -> Result<()> {
        Ok(())
    }

    async fn on_llm_end(&self, _run: &RunContext, _result: &LlmResult) -> Result<()> {
        Ok(())
    }

    async fn on_llm_error(&self, _run: &RunContext, _error: &LlmError) -> Result<()> {
        Ok(())
    }
}

/// Identity and inherited attributes of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunContext {
    pub run_id: Uuid,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_run_id: Option<Uuid>,

    /// Run name, usually the adapter's type label
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// Kind of run event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunEventKind {
    #[serde(rename = "on_llm_start")]
    Start,
    #[serde(rename = "on_llm_stream")]
    Stream,
    #[serde(rename = "on_llm_end")]
    End,
    #[serde(rename = "on_llm_error")]
    Error,
}

impl std::fmt::Display for RunEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunEventKind::Start => write!(f, "on_llm_start"),
            RunEventKind::Stream => write!(f, "on_llm_stream"),
            RunEventKind::End => write!(f, "on_llm_end"),
            RunEventKind::Error => write!(f, "on_llm_error"),
        }
    }
}

/// A recorded lifecycle notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunEvent {
    #[serde(rename = "event")]
    pub kind: RunEventKind,

    pub run_id: Uuid,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_run_id: Option<Uuid>,

    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,

    /// Event payload: prompt on start, chunk on stream, output on end,
    /// message on error
    pub data: Value,

    pub timestamp: DateTime<Utc>,
}

impl RunEvent {
    pub fn new(kind: RunEventKind, run: &RunContext, data: Value) -> Self {
        Self {
            kind,
            run_id: run.run_id,
            parent_run_id: run.parent_run_id,
            name: run.name.clone(),
            tags: run.tags.clone(),
            metadata: run.metadata.clone(),
            data,
            timestamp: Utc::now(),
        }
    }

    pub fn start(run: &RunContext, prompt: &str, serialized: &Value) -> Self {
        Self::new(
            RunEventKind::Start,
            run,
            serde_json::json!({ "prompt": prompt, "serialized": serialized }),
        )
    }

    pub fn stream(run: &RunContext, token: &str, chunk: Option<&GenerationChunk>) -> Self {
        let chunk = chunk
            .cloned()
            .unwrap_or_else(|| GenerationChunk::new(token));
        Self::new(
            RunEventKind::Stream,
            run,
            serde_json::json!({ "token": token, "chunk": chunk }),
        )
    }

    pub fn end(run: &RunContext, result: &LlmResult) -> Self {
        Self::new(
            RunEventKind::End,
            run,
            serde_json::json!({ "output": result }),
        )
    }

    pub fn error(run: &RunContext, error: &LlmError) -> Self {
        Self::new(
            RunEventKind::Error,
            run,
            serde_json::json!({ "error": error.to_string() }),
        )
    }

    /// Token carried by a stream event
    pub fn token(&self) -> Option<&str> {
        match self.kind {
            RunEventKind::Stream => self.data.get("token").and_then(Value::as_str),
            _ => None,
        }
    }
}

/// Apply a handler's `raise_error` policy to a dispatch outcome
fn settle(handler: &dyn CallbackHandler, event: &str, outcome: Result<()>) -> Result<()> {
    match outcome {
        Ok(()) => Ok(()),
        Err(e) if handler.raise_error() => Err(LlmError::Callback {
            handler: handler.name().to_string(),
            reason: e.to_string(),
        }),
        Err(e) => {
            tracing::warn!(
                handler = %handler.name(),
                event = %event,
                error = %e,
                "Callback handler failed"
            );
            Ok(())
        }
    }
}

/// Registry of handlers that opens runs
#[derive(Clone, Default)]
pub struct CallbackManager {
    handlers: Vec<Arc<dyn CallbackHandler>>,
    tags: Vec<String>,
    metadata: Map<String, Value>,
    parent_run_id: Option<Uuid>,
}

impl std::fmt::Debug for CallbackManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.handlers.iter().map(|h| h.name()).collect();
        f.debug_struct("CallbackManager")
            .field("handlers", &names)
            .field("tags", &self.tags)
            .field("parent_run_id", &self.parent_run_id)
            .finish()
    }
}

impl CallbackManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_handler(&mut self, handler: Arc<dyn CallbackHandler>) {
        self.handlers.push(handler);
    }

    pub fn with_handler(mut self, handler: Arc<dyn CallbackHandler>) -> Self {
        self.add_handler(handler);
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.tags.extend(tags);
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata.extend(metadata);
        self
    }

    pub fn with_parent_run_id(mut self, parent: Uuid) -> Self {
        self.parent_run_id = Some(parent);
        self
    }

    pub fn handlers(&self) -> &[Arc<dyn CallbackHandler>] {
        &self.handlers
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Open one run per prompt and notify handlers that each has started
    pub async fn on_llm_start(
        &self,
        name: &str,
        serialized: &Value,
        prompts: &[String],
    ) -> Result<Vec<RunManager>> {
        let mut runs = Vec::with_capacity(prompts.len());

        for prompt in prompts {
            let context = RunContext {
                run_id: Uuid::new_v4(),
                parent_run_id: self.parent_run_id,
                name: name.to_string(),
                tags: self.tags.clone(),
                metadata: self.metadata.clone(),
            };

            for handler in &self.handlers {
                let outcome = handler.on_llm_start(&context, prompt, serialized).await;
                settle(handler.as_ref(), "on_llm_start", outcome)?;
            }

            tracing::debug!(run_id = %context.run_id, name = %name, "Run started");
            runs.push(RunManager {
                context,
                handlers: self.handlers.clone(),
            });
        }

        Ok(runs)
    }
}

/// Handle for reporting the lifecycle of one open run
#[derive(Clone)]
pub struct RunManager {
    context: RunContext,
    handlers: Vec<Arc<dyn CallbackHandler>>,
}

impl std::fmt::Debug for RunManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunManager")
            .field("context", &self.context)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl RunManager {
    pub fn run_id(&self) -> Uuid {
        self.context.run_id
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Callback manager whose runs are children of this one
    pub fn child(&self) -> CallbackManager {
        CallbackManager {
            handlers: self.handlers.clone(),
            tags: self.context.tags.clone(),
            metadata: self.context.metadata.clone(),
            parent_run_id: Some(self.context.run_id),
        }
    }

    pub async fn on_llm_new_token(&self, token: &str, chunk: Option<&GenerationChunk>) -> Result<()> {
        for handler in &self.handlers {
            let outcome = handler.on_llm_new_token(&self.context, token, chunk).await;
            settle(handler.as_ref(), "on_llm_new_token", outcome)?;
        }
        Ok(())
    }

    pub async fn on_llm_end(&self, result: &LlmResult) -> Result<()> {
        for handler in &self.handlers {
            let outcome = handler.on_llm_end(&self.context, result).await;
            settle(handler.as_ref(), "on_llm_end", outcome)?;
        }
        tracing::debug!(run_id = %self.context.run_id, "Run ended");
        Ok(())
    }

    pub async fn on_llm_error(&self, error: &LlmError) -> Result<()> {
        for handler in &self.handlers {
            let outcome = handler.on_llm_error(&self.context, error).await;
            settle(handler.as_ref(), "on_llm_error", outcome)?;
        }
        tracing::debug!(run_id = %self.context.run_id, error = %error, "Run failed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingHandler {
        raise: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CallbackHandler for FailingHandler {
        fn name(&self) -> &str {
            "failing"
        }

        fn raise_error(&self) -> bool {
            self.raise
        }

        async fn on_llm_new_token(
            &self,
            _run: &RunContext,
            _token: &str,
            _chunk: Option<&GenerationChunk>,
        ) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(LlmError::Generation("boom".to_string()))
        }
    }

    fn prompts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_start_opens_one_run_per_prompt() {
        let memory = Arc::new(MemoryCallbackHandler::default());
        let manager = CallbackManager::new().with_handler(memory.clone());

        let runs = manager
            .on_llm_start("custom", &serde_json::json!({}), &prompts(&["a", "b", "c"]))
            .await
            .unwrap();

        assert_eq!(runs.len(), 3);
        assert_ne!(runs[0].run_id(), runs[1].run_id());
        assert_eq!(memory.count().await, 3);
    }

    #[tokio::test]
    async fn test_start_inherits_tags_and_parent() {
        let parent = Uuid::new_v4();
        let mut metadata = Map::new();
        metadata.insert("team".to_string(), serde_json::json!("a3s"));
        let manager = CallbackManager::new()
            .with_tags(vec!["demo".to_string()])
            .with_metadata(metadata)
            .with_parent_run_id(parent);

        let runs = manager
            .on_llm_start("custom", &Value::Null, &prompts(&["p"]))
            .await
            .unwrap();

        let ctx = runs[0].context();
        assert_eq!(ctx.parent_run_id, Some(parent));
        assert_eq!(ctx.tags, vec!["demo".to_string()]);
        assert_eq!(ctx.metadata["team"], "a3s");
    }

    #[tokio::test]
    async fn test_child_manager_links_parent_run() {
        let manager = CallbackManager::new();
        let runs = manager
            .on_llm_start("outer", &Value::Null, &prompts(&["p"]))
            .await
            .unwrap();

        let child_runs = runs[0]
            .child()
            .on_llm_start("inner", &Value::Null, &prompts(&["q"]))
            .await
            .unwrap();

        assert_eq!(child_runs[0].context().parent_run_id, Some(runs[0].run_id()));
    }

    #[tokio::test]
    async fn test_swallowed_handler_error_continues_dispatch() {
        let failing = Arc::new(FailingHandler {
            raise: false,
            calls: AtomicUsize::new(0),
        });
        let memory = Arc::new(MemoryCallbackHandler::default());
        let manager = CallbackManager::new()
            .with_handler(failing.clone())
            .with_handler(memory.clone());

        let runs = manager
            .on_llm_start("custom", &Value::Null, &prompts(&["p"]))
            .await
            .unwrap();
        runs[0].on_llm_new_token("x", None).await.unwrap();

        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(memory.tokens().await, vec!["x".to_string()]);
    }

    #[tokio::test]
    async fn test_raising_handler_aborts_dispatch() {
        let failing = Arc::new(FailingHandler {
            raise: true,
            calls: AtomicUsize::new(0),
        });
        let memory = Arc::new(MemoryCallbackHandler::default());
        let manager = CallbackManager::new()
            .with_handler(failing)
            .with_handler(memory.clone());

        let runs = manager
            .on_llm_start("custom", &Value::Null, &prompts(&["p"]))
            .await
            .unwrap();
        let err = runs[0].on_llm_new_token("x", None).await.unwrap_err();

        match err {
            LlmError::Callback { handler, reason } => {
                assert_eq!(handler, "failing");
                assert!(reason.contains("boom"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(memory.tokens().await.is_empty());
    }

    #[test]
    fn test_run_event_kind_serialization() {
        let json = serde_json::to_string(&RunEventKind::Stream).unwrap();
        assert_eq!(json, "\"on_llm_stream\"");
        assert_eq!(RunEventKind::End.to_string(), "on_llm_end");
    }

    #[test]
    fn test_run_event_stream_token() {
        let ctx = RunContext {
            run_id: Uuid::new_v4(),
            parent_run_id: None,
            name: "custom".to_string(),
            tags: Vec::new(),
            metadata: Map::new(),
        };

        let event = RunEvent::stream(&ctx, "a", None);
        assert_eq!(event.token(), Some("a"));
        assert_eq!(event.data["chunk"]["text"], "a");

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"on_llm_stream\""));
        assert!(json.contains("\"runId\""));

        let start = RunEvent::start(&ctx, "prompt", &Value::Null);
        assert_eq!(start.token(), None);
    }
}

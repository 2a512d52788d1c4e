//! Callback handler forwarding run events into a tokio channel

use super::{CallbackHandler, RunContext, RunEvent};
use crate::error::{LlmError, Result};
use crate::types::{GenerationChunk, LlmResult};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

/// Sends every notification as a `RunEvent` on a bounded `mpsc` channel
///
/// Sending awaits channel capacity, so a slow consumer back-pressures the
/// run. Once the receiver is dropped, events are discarded.
#[derive(Debug, Clone)]
pub struct ChannelCallbackHandler {
    tx: mpsc::Sender<RunEvent>,
}

impl ChannelCallbackHandler {
    pub fn new(tx: mpsc::Sender<RunEvent>) -> Self {
        Self { tx }
    }

    /// Create a handler together with the receiving end of its channel
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<RunEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    async fn send(&self, event: RunEvent) -> Result<()> {
        if self.tx.is_closed() {
            tracing::trace!(run_id = %event.run_id, "Event receiver dropped, discarding");
            return Ok(());
        }
        self.tx
            .send(event)
            .await
            .map_err(|e| LlmError::Channel(format!("failed to forward run event: {}", e)))
    }
}

#[async_trait]
impl CallbackHandler for ChannelCallbackHandler {
    fn name(&self) -> &str {
        "channel"
    }

    async fn on_llm_start(&self, run: &RunContext, prompt: &str, serialized: &Value) -> Result<()> {
        self.send(RunEvent::start(run, prompt, serialized)).await
    }

    async fn on_llm_new_token(
        &self,
        run: &RunContext,
        token: &str,
        chunk: Option<&GenerationChunk>,
    ) -> Result<()> {
        self.send(RunEvent::stream(run, token, chunk)).await
    }

    async fn on_llm_end(&self, run: &RunContext, result: &LlmResult) -> Result<()> {
        self.send(RunEvent::end(run, result)).await
    }

    async fn on_llm_error(&self, run: &RunContext, error: &LlmError) -> Result<()> {
        self.send(RunEvent::error(run, error)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::RunEventKind;
    use serde_json::Map;
    use uuid::Uuid;

    fn context() -> RunContext {
        RunContext {
            run_id: Uuid::new_v4(),
            parent_run_id: None,
            name: "custom".to_string(),
            tags: Vec::new(),
            metadata: Map::new(),
        }
    }

    #[tokio::test]
    async fn test_forwards_events() {
        let (handler, mut rx) = ChannelCallbackHandler::channel(4);
        let ctx = context();

        handler.on_llm_start(&ctx, "hi", &Value::Null).await.unwrap();
        handler.on_llm_new_token(&ctx, "h", None).await.unwrap();

        let start = rx.recv().await.unwrap();
        assert_eq!(start.kind, RunEventKind::Start);
        assert_eq!(start.data["prompt"], "hi");

        let token = rx.recv().await.unwrap();
        assert_eq!(token.token(), Some("h"));
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_not_an_error() {
        let (handler, rx) = ChannelCallbackHandler::channel(1);
        drop(rx);

        tokio_test::assert_ok!(handler.on_llm_new_token(&context(), "h", None).await);
    }
}

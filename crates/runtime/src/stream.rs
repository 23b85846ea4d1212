//! Streaming facade over the run state machine.
//!
//! Fragments go into a bounded channel; every send is a cooperative
//! checkpoint, so a slow consumer throttles the run and a dropped
//! receiver cancels it at the next send.

use std::time::Instant;

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::model::{ModelError, ModelEvent, TurnAccumulator};
use crate::orchestrator::{
    check_deadline, ChatRequest, Flow, Orchestrator, OrchestratorError, Terminal,
};

/// What a streaming consumer receives. Exactly one `Done` or `Error`
/// closes every delivered stream; a cancelled run sends neither.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatFragment {
    /// A chunk of assistant text.
    Content(String),
    /// A tool call the run is about to execute.
    ToolStatus { id: String, name: String },
    /// The run failed; fragments already delivered stand.
    Error(String),
    Done(Terminal),
}

enum StreamStop {
    /// Receiver dropped; stop silently.
    Cancelled,
    Failed(OrchestratorError),
}

impl From<OrchestratorError> for StreamStop {
    fn from(e: OrchestratorError) -> Self {
        StreamStop::Failed(e)
    }
}

impl From<ModelError> for StreamStop {
    fn from(e: ModelError) -> Self {
        StreamStop::Failed(OrchestratorError::Model(e))
    }
}

async fn send(tx: &mpsc::Sender<ChatFragment>, fragment: ChatFragment) -> Result<(), StreamStop> {
    tx.send(fragment).await.map_err(|_| StreamStop::Cancelled)
}

impl Orchestrator {
    /// Drive a request while emitting fragments into `tx`. Terminates the
    /// stream with `Done` on success or a trailing `Error` on failure.
    pub async fn run_streaming(&self, request: ChatRequest, tx: mpsc::Sender<ChatFragment>) {
        match self.drive_stream(request, &tx).await {
            Ok(terminal) => {
                let _ = tx.send(ChatFragment::Done(terminal)).await;
            }
            Err(StreamStop::Cancelled) => {
                debug!("stream receiver dropped, run cancelled");
            }
            Err(StreamStop::Failed(e)) => {
                warn!(error = %e, "streaming run failed");
                let _ = tx.send(ChatFragment::Error(e.to_string())).await;
            }
        }
    }

    async fn drive_stream(
        &self,
        request: ChatRequest,
        tx: &mpsc::Sender<ChatFragment>,
    ) -> Result<Terminal, StreamStop> {
        let flow = self.route(&request);
        self.validate(&request, flow)?;
        let deadline = self.deadline.map(|d| Instant::now() + d);
        let (mut conversation, options) = self.prepare(&request, flow).await?;

        match flow {
            // Deltas are forwarded as they arrive.
            Flow::Plain | Flow::Rag => {
                check_deadline(deadline)?;
                let mut stream = self
                    .model
                    .invoke_streaming(
                        conversation.messages().to_vec(),
                        conversation.system_prompt().map(String::from),
                        &options,
                    )
                    .await?;
                while let Some(event) = stream.next().await {
                    if let ModelEvent::TextDelta { text } = event? {
                        send(tx, ChatFragment::Content(text)).await?;
                    }
                }
                Ok(Terminal::Complete)
            }
            // Each turn is buffered until it resolves: a tool-call turn
            // surfaces as ToolStatus fragments, only the final turn's
            // retained deltas reach the consumer.
            Flow::ToolBridge => {
                let mut last_deltas: Vec<String> = Vec::new();
                for iteration in 0..self.max_iterations {
                    check_deadline(deadline)?;
                    let mut stream = self
                        .model
                        .invoke_streaming(
                            conversation.messages().to_vec(),
                            conversation.system_prompt().map(String::from),
                            &options,
                        )
                        .await?;

                    let mut acc = TurnAccumulator::new();
                    let mut deltas: Vec<String> = Vec::new();
                    while let Some(event) = stream.next().await {
                        let event = event?;
                        if let ModelEvent::TextDelta { text } = &event {
                            deltas.push(text.clone());
                        }
                        acc.push(&event);
                    }
                    let turn = acc.finish();

                    if turn.tool_calls.is_empty() {
                        for delta in deltas {
                            send(tx, ChatFragment::Content(delta)).await?;
                        }
                        return Ok(Terminal::Complete);
                    }

                    debug!(iteration, calls = turn.tool_calls.len(), "tool turn buffered");
                    for call in &turn.tool_calls {
                        send(
                            tx,
                            ChatFragment::ToolStatus {
                                id: call.id.clone(),
                                name: call.name.clone(),
                            },
                        )
                        .await?;
                    }

                    conversation.push_assistant_turn(turn.text.clone(), turn.tool_calls.clone());
                    for call in &turn.tool_calls {
                        check_deadline(deadline)?;
                        let result = self.registry.execute(call).await;
                        conversation.push_tool_result(&result);
                    }
                    last_deltas = deltas;
                }

                // Out of budget: deliver what the last turn said.
                for delta in last_deltas {
                    send(tx, ChatFragment::Content(delta)).await?;
                }
                Ok(Terminal::IterationLimit)
            }
        }
    }
}

//! Boundary to the remote chat endpoint.
//!
//! The orchestrator only sees [`ChatEndpoint`]: one call per turn, the
//! system prompt passed fresh every time, and a [`ChatResponse`] that is
//! either plain text or a list of structured function calls. The rig-backed
//! [`ModelEndpoint`] is the production implementation; tests drive the loop
//! with a scripted one.

use crate::history::{ConversationTurn, Role};
use async_trait::async_trait;
use rig::completion::message::AssistantContent;
use rig::completion::{CompletionModel, Message, ToolDefinition};
use thiserror::Error;

/// Transport-level failure. Aborts the active turn; never retried here.
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("chat request failed: {0}")]
    Request(String),
}

/// One structured tool call emitted by a function-calling model.
///
/// Arguments stay JSON-encoded; decoding (and per-call error recovery) is
/// the response parser's job.
#[derive(Debug, Clone)]
pub struct StructuredCall {
    pub name: String,
    pub arguments: String,
}

/// What came back from the endpoint for one completion request.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub content: String,
    pub tool_calls: Vec<StructuredCall>,
}

#[async_trait]
pub trait ChatEndpoint: Send + Sync {
    async fn send(
        &self,
        preamble: &str,
        turns: &[ConversationTurn],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse, EndpointError>;
}

/// [`ChatEndpoint`] backed by a rig completion model.
pub struct ModelEndpoint<M: CompletionModel> {
    model: M,
    context_size: usize,
}

impl<M: CompletionModel> ModelEndpoint<M> {
    pub fn new(model: M, context_size: usize) -> Self {
        Self {
            model,
            context_size,
        }
    }

    fn to_messages(turns: &[ConversationTurn]) -> Vec<Message> {
        turns
            .iter()
            .map(|turn| match turn.role {
                // Mid-conversation system turns (tool summaries, continue
                // nudges) ride as user content; providers reject a system
                // role outside the preamble.
                Role::User | Role::System => Message::user(turn.content.clone()),
                Role::Assistant => Message::assistant(turn.content.clone()),
            })
            .collect()
    }
}

#[async_trait]
impl<M: CompletionModel> ChatEndpoint for ModelEndpoint<M> {
    async fn send(
        &self,
        preamble: &str,
        turns: &[ConversationTurn],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse, EndpointError> {
        let response = self
            .model
            .completion_request(preamble)
            .messages(Self::to_messages(turns))
            .tools(tools.to_vec())
            .max_tokens(32768)
            .additional_params(serde_json::json!({
                "num_ctx": self.context_size
            }))
            .send()
            .await
            .map_err(|e| EndpointError::Request(e.to_string()))?;

        let mut out = ChatResponse::default();
        for content in response.choice.iter() {
            match content {
                AssistantContent::Text(text) => {
                    if !out.content.is_empty() {
                        out.content.push('\n');
                    }
                    out.content.push_str(&text.text);
                }
                AssistantContent::ToolCall(tool_call) => {
                    out.tool_calls.push(StructuredCall {
                        name: tool_call.function.name.clone(),
                        arguments: tool_call.function.arguments.to_string(),
                    });
                }
                // Reasoning and image content have no bearing on the loop
                _ => {}
            }
        }

        Ok(out)
    }
}

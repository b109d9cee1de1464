//! HTTP chat client driving the streaming pipeline.

use std::sync::Arc;

use futures::{StreamExt, pin_mut};
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::dispatcher::{DispatchOutcome, EventDispatcher};
use crate::error::{Result, StreamError};
use crate::event::classify;
use crate::lines::line_stream;
use crate::message::{ChatMessage, ConversationId};
use crate::session::SessionRegistry;
use crate::store::MessageStore;

/// Streaming pipeline configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Path of the message-submission endpoint, relative to the base URL.
    pub submit_path: String,
    /// Response header carrying the server-confirmed user-message id,
    /// used when the id is not delivered in-band as an event.
    pub id_header: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            submit_path: "/api/chat/messages".to_string(),
            id_header: "x-user-message-id".to_string(),
        }
    }
}

/// Terminal outcome of a successfully initiated stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOutcome {
    /// The backend signalled normal completion.
    Completed {
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
    /// The session was cancelled. Not an error; partial state is kept.
    Cancelled,
    /// The body closed without a terminal event. Treated as success, but
    /// kept distinguishable so callers can decide otherwise.
    Disconnected,
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    #[serde(rename = "conversationId")]
    conversation_id: ConversationId,
    text: &'a str,
}

/// Client for the chat submission endpoint and its response stream.
pub struct ChatClient {
    http: Client,
    base_url: String,
    config: StreamConfig,
    store: Arc<dyn MessageStore>,
    registry: Arc<SessionRegistry>,
}

impl ChatClient {
    pub fn new(base_url: impl Into<String>, store: Arc<dyn MessageStore>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            config: StreamConfig::default(),
            store,
            registry: Arc::new(SessionRegistry::new()),
        }
    }

    /// Override the default endpoint/header configuration.
    pub fn with_config(mut self, config: StreamConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Cancel the active stream for a conversation, if any. Idempotent;
    /// safe to call from teardown.
    pub fn cancel(&self, conversation_id: &ConversationId) {
        self.registry.cancel(conversation_id);
    }

    /// Whether a stream is currently in progress for the conversation.
    pub fn is_streaming(&self, conversation_id: &ConversationId) -> bool {
        self.registry.is_streaming(conversation_id)
    }

    /// Submit a user message and consume the response stream to its end.
    ///
    /// Any prior stream for the same conversation is cancelled first. The
    /// provisional user message and an empty assistant message are placed
    /// in the store up front; deltas are applied to them in arrival order.
    ///
    /// Cancellation resolves to `Ok(StreamOutcome::Cancelled)`, never to
    /// an error. Transport and backend-reported failures resolve to `Err`
    /// with the partial assistant text retained. The in-progress indicator
    /// and session slot are released on every exit path.
    pub async fn send_message(
        &self,
        conversation_id: ConversationId,
        text: &str,
    ) -> Result<StreamOutcome> {
        let session = self.registry.begin(conversation_id);

        self.store.write(&conversation_id, &mut |messages| {
            messages.push(ChatMessage::user(
                session.provisional_user_id,
                conversation_id,
                text,
            ));
            messages.push(ChatMessage::assistant_placeholder(
                session.provisional_assistant_id,
                conversation_id,
            ));
        });

        let registry = Arc::clone(&self.registry);
        let seq = session.seq;
        let _release = scopeguard::guard((), move |_| {
            registry.finish(&conversation_id, seq);
        });

        let mut dispatcher = EventDispatcher::new(
            Arc::clone(&self.store),
            Arc::clone(&self.registry),
            session.clone(),
        );

        let request = self
            .http
            .post(format!("{}{}", self.base_url, self.config.submit_path))
            .json(&SubmitRequest {
                conversation_id,
                text,
            });

        let response = tokio::select! {
            biased;
            _ = session.token.cancelled() => {
                debug!(conversation = %conversation_id, "submission cancelled before response");
                return Ok(StreamOutcome::Cancelled);
            }
            response = request.send() => match response {
                Ok(response) => response,
                Err(err) if session.token.is_cancelled() => {
                    debug!(%err, "suppressing submission error after cancellation");
                    return Ok(StreamOutcome::Cancelled);
                }
                Err(err) => return Err(StreamError::Http(err)),
            },
        };

        let status = response.status();
        if !status.is_success() {
            return Err(Self::status_error(status, response).await);
        }

        if let Some(confirmed) = Self::header_id(&response, &self.config.id_header) {
            dispatcher.confirm_user_id(confirmed);
        }

        let lines = line_stream(response.bytes_stream(), session.token.clone());
        pin_mut!(lines);

        while let Some(line) = lines.next().await {
            let Some(event) = classify(&line?) else {
                continue;
            };
            match dispatcher.apply(event) {
                DispatchOutcome::Continue => {}
                DispatchOutcome::Completed {
                    prompt_tokens,
                    completion_tokens,
                } => {
                    debug!(conversation = %conversation_id, "stream completed");
                    return Ok(StreamOutcome::Completed {
                        prompt_tokens,
                        completion_tokens,
                    });
                }
                DispatchOutcome::Failed { reason } => {
                    return Err(StreamError::Backend(reason));
                }
            }
        }

        if session.token.is_cancelled() {
            return Ok(StreamOutcome::Cancelled);
        }

        debug!(conversation = %conversation_id, "stream ended without a terminal event");
        Ok(StreamOutcome::Disconnected)
    }

    fn header_id(response: &Response, header: &str) -> Option<i64> {
        response.headers().get(header)?.to_str().ok()?.parse().ok()
    }

    /// Best-effort extraction of a JSON `message` field from an error
    /// body, falling back to the raw text.
    async fn status_error(status: StatusCode, response: Response) -> StreamError {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|value| {
                value
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or(body);
        StreamError::Status {
            status: status.as_u16(),
            message,
        }
    }
}

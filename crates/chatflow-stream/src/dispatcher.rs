//! Applies classified stream events to the message store.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::event::StreamEvent;
use crate::message::{ConversationId, MessageId};
use crate::session::{SessionRegistry, StreamSession};
use crate::store::MessageStore;

/// What the pipeline should do after applying one event.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Keep consuming the stream.
    Continue,
    /// Normal termination.
    Completed {
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
    /// Backend-reported failure. Already-applied deltas are retained.
    Failed { reason: String },
}

/// Single writer for one session's stream events, applied in arrival
/// order. Events from a superseded session are dropped.
pub struct EventDispatcher {
    store: Arc<dyn MessageStore>,
    registry: Arc<SessionRegistry>,
    session: StreamSession,
    confirmed_user_id: Option<i64>,
}

impl EventDispatcher {
    pub fn new(
        store: Arc<dyn MessageStore>,
        registry: Arc<SessionRegistry>,
        session: StreamSession,
    ) -> Self {
        Self {
            store,
            registry,
            session,
            confirmed_user_id: None,
        }
    }

    /// Confirmed id recorded for the session's user message, if any.
    pub fn confirmed_user_id(&self) -> Option<i64> {
        self.confirmed_user_id
    }

    /// Apply one classified event.
    pub fn apply(&mut self, event: StreamEvent) -> DispatchOutcome {
        if !self
            .registry
            .is_active(&self.session.conversation_id, self.session.seq)
        {
            debug!(
                conversation = %self.session.conversation_id,
                seq = self.session.seq,
                ?event,
                "dropping event from superseded session"
            );
            return DispatchOutcome::Continue;
        }

        match event {
            StreamEvent::IdAssigned { confirmed_id } => {
                self.confirm_user_id(confirmed_id);
                DispatchOutcome::Continue
            }
            StreamEvent::TextDelta { chunk } => {
                self.append_chunk(&chunk);
                DispatchOutcome::Continue
            }
            StreamEvent::Completed {
                prompt_tokens,
                completion_tokens,
            } => {
                self.record_usage(prompt_tokens, completion_tokens);
                DispatchOutcome::Completed {
                    prompt_tokens,
                    completion_tokens,
                }
            }
            StreamEvent::Failed { reason } => DispatchOutcome::Failed { reason },
        }
    }

    /// Rewrite the provisional user-message id in place, under the same
    /// rules as an in-band id event: superseded sessions are dropped and
    /// repeated or conflicting confirmations are no-ops.
    pub fn confirm_user_id(&mut self, confirmed_id: i64) {
        if !self
            .registry
            .is_active(&self.session.conversation_id, self.session.seq)
        {
            debug!(
                conversation = %self.session.conversation_id,
                seq = self.session.seq,
                confirmed_id,
                "dropping id confirmation from superseded session"
            );
            return;
        }
        if let Some(existing) = self.confirmed_user_id {
            if existing != confirmed_id {
                warn!(
                    existing,
                    confirmed_id, "ignoring conflicting user-message id confirmation"
                );
            }
            return;
        }

        let provisional = self.session.provisional_user_id;
        self.store
            .write(&self.session.conversation_id, &mut |messages| {
                if let Some(message) = messages.iter_mut().find(|m| m.id == provisional) {
                    message.id = MessageId::Confirmed(confirmed_id);
                }
            });
        self.confirmed_user_id = Some(confirmed_id);
    }

    fn append_chunk(&self, chunk: &str) {
        let id = self.session.provisional_assistant_id;
        self.store
            .write(&self.session.conversation_id, &mut |messages| {
                if let Some(message) = messages.iter_mut().find(|m| m.id == id) {
                    message.text.push_str(chunk);
                }
            });
    }

    fn record_usage(&self, prompt_tokens: Option<u32>, completion_tokens: Option<u32>) {
        let id = self.session.provisional_assistant_id;
        self.store
            .write(&self.session.conversation_id, &mut |messages| {
                if let Some(message) = messages.iter_mut().find(|m| m.id == id) {
                    message.prompt_tokens = prompt_tokens;
                    message.completion_tokens = completion_tokens;
                }
            });
    }

    pub fn conversation_id(&self) -> &ConversationId {
        &self.session.conversation_id
    }
}

//! Session registry: at most one active stream per conversation.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::message::{ConversationId, MessageId};

/// Identity of one streaming attempt for a conversation.
#[derive(Debug, Clone)]
pub struct StreamSession {
    pub conversation_id: ConversationId,
    /// Registry generation; stale-write guard across superseding sessions.
    pub seq: u64,
    pub token: CancellationToken,
    pub provisional_user_id: MessageId,
    pub provisional_assistant_id: MessageId,
}

#[derive(Debug)]
struct ActiveSession {
    seq: u64,
    token: CancellationToken,
    streaming: bool,
}

/// Tracks the active stream per conversation together with its
/// cancellation token and the in-progress indicator.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    active: DashMap<ConversationId, ActiveSession>,
    next_seq: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new session, cancelling the outstanding token of any prior
    /// session for the same conversation first.
    pub fn begin(&self, conversation_id: ConversationId) -> StreamSession {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let token = CancellationToken::new();

        let prior = self.active.insert(
            conversation_id,
            ActiveSession {
                seq,
                token: token.clone(),
                streaming: true,
            },
        );
        if let Some(prior) = prior {
            debug!(
                conversation = %conversation_id,
                superseded_seq = prior.seq,
                "superseding active stream session"
            );
            prior.token.cancel();
        }

        StreamSession {
            conversation_id,
            seq,
            token,
            provisional_user_id: MessageId::provisional(),
            provisional_assistant_id: MessageId::provisional(),
        }
    }

    /// Whether `seq` is still the active session for the conversation.
    pub fn is_active(&self, conversation_id: &ConversationId, seq: u64) -> bool {
        self.active
            .get(conversation_id)
            .is_some_and(|entry| entry.seq == seq)
    }

    /// Request cancellation of the active session, if any. Idempotent.
    pub fn cancel(&self, conversation_id: &ConversationId) {
        if let Some(entry) = self.active.get(conversation_id) {
            entry.token.cancel();
        }
    }

    /// In-progress indicator for UI consumers.
    pub fn is_streaming(&self, conversation_id: &ConversationId) -> bool {
        self.active
            .get(conversation_id)
            .is_some_and(|entry| entry.streaming)
    }

    /// Release the session slot if `seq` is still the active generation.
    pub fn finish(&self, conversation_id: &ConversationId, seq: u64) {
        self.active
            .remove_if(conversation_id, |_, entry| entry.seq == seq);
    }
}

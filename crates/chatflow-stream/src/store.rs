//! Message store seam.
//!
//! The store is an injected dependency with an explicit read/write
//! interface rather than ambient global state, so the dispatcher can be
//! tested in isolation.

use dashmap::DashMap;

use crate::message::{ChatMessage, ConversationId};

/// Keyed, shared cache of conversation messages.
///
/// `write` runs the updater under the store's own atomicity: back-to-back
/// read-modify-write cycles against the same key never lose updates.
pub trait MessageStore: Send + Sync {
    /// Snapshot of the messages for one conversation.
    fn read(&self, key: &ConversationId) -> Option<Vec<ChatMessage>>;

    /// Mutate the messages for one conversation in place, creating the
    /// entry if absent.
    fn write(&self, key: &ConversationId, updater: &mut dyn FnMut(&mut Vec<ChatMessage>));
}

/// In-memory [`MessageStore`] over a concurrent map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    conversations: DashMap<ConversationId, Vec<ChatMessage>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MessageStore for MemoryStore {
    fn read(&self, key: &ConversationId) -> Option<Vec<ChatMessage>> {
        self.conversations.get(key).map(|entry| entry.clone())
    }

    fn write(&self, key: &ConversationId, updater: &mut dyn FnMut(&mut Vec<ChatMessage>)) {
        let mut entry = self.conversations.entry(*key).or_default();
        updater(&mut entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ChatMessage, MessageId};

    #[test]
    fn write_creates_entry_and_read_snapshots_it() {
        let store = MemoryStore::new();
        let conversation = ConversationId::new();
        assert!(store.read(&conversation).is_none());

        store.write(&conversation, &mut |messages| {
            messages.push(ChatMessage::user(
                MessageId::provisional(),
                conversation,
                "hi",
            ));
        });

        let messages = store.read(&conversation).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "hi");
    }

    #[test]
    fn back_to_back_writes_are_not_lost() {
        let store = MemoryStore::new();
        let conversation = ConversationId::new();
        let id = MessageId::provisional();
        store.write(&conversation, &mut |messages| {
            messages.push(ChatMessage::assistant_placeholder(id, conversation));
        });

        for chunk in ["a", "b", "c"] {
            store.write(&conversation, &mut |messages| {
                if let Some(message) = messages.iter_mut().find(|m| m.id == id) {
                    message.text.push_str(chunk);
                }
            });
        }

        assert_eq!(store.read(&conversation).unwrap()[0].text, "abc");
    }
}

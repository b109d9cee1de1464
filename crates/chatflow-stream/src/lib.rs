//! Chatflow stream - incremental chat-response pipeline
//!
//! This crate provides:
//! - Line decoding over a chunked HTTP response body
//! - Classification of wire payloads into typed stream events
//! - An event dispatcher maintaining the append/reconciliation invariants
//! - A session registry enforcing one active stream per conversation
//! - A chat client driving decode → classify → dispatch in arrival order
//!
//! The pipeline is consumed by a single task per session, so events are
//! applied strictly in arrival order. Cancellation is push-based through
//! a shared token and is a distinct terminal outcome, not an error.

pub mod client;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod lines;
pub mod message;
pub mod session;
pub mod store;

// Re-export commonly used types
pub use client::{ChatClient, StreamConfig, StreamOutcome};
pub use dispatcher::{DispatchOutcome, EventDispatcher};
pub use error::{Result, StreamError};
pub use event::{EVENT_PREFIX, StreamEvent, classify};
pub use lines::{LineDecoder, line_stream};
pub use message::{ChatMessage, ConversationId, MessageId, Sender};
pub use session::{SessionRegistry, StreamSession};
pub use store::{MemoryStore, MessageStore};

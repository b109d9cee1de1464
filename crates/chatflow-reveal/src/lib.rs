//! Chatflow reveal - text-reveal scheduler
//!
//! Given a growing or changing target string, this crate produces a
//! continuously updated visible prefix at a fixed characters-per-second
//! rate. When new text extends what is already shown the reveal
//! *continues* from its current position; when it does not, the reveal
//! *restarts* from an empty visible string.
//!
//! The decision logic lives in a pure state machine ([`RevealState`]);
//! [`RevealScheduler`] drives it on the tokio clock and publishes the
//! visible prefix over a watch channel.

pub mod scheduler;
pub mod state;

pub use scheduler::{RevealHandle, RevealInput, RevealScheduler};
pub use state::{Retarget, RevealConfig, RevealSegment, RevealState};

//! Async driver for the reveal state machine.
//!
//! One task per scheduler drives the reveal on the tokio clock: input
//! changes retarget the state (replacing any in-flight segment), frame
//! ticks advance it, and a cancellation token tears it down.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::state::{Retarget, RevealConfig, RevealSegment, RevealState};

/// Desired reveal input: the full target text plus the enablement flag.
///
/// When `enabled` is false the visible text equals the target immediately,
/// with no animation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RevealInput {
    pub target: String,
    pub enabled: bool,
}

/// Handle to a running reveal driver task.
///
/// Dropping the handle stops the driver; so does [`RevealHandle::shutdown`].
pub struct RevealHandle {
    input_tx: watch::Sender<RevealInput>,
    visible_rx: watch::Receiver<String>,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl RevealHandle {
    /// Replace the target text, keeping the current enablement.
    pub fn set_target(&self, target: impl Into<String>) {
        let target = target.into();
        self.input_tx.send_modify(|input| input.target = target);
    }

    /// Toggle animation. Disabling shows the current target in full.
    pub fn set_enabled(&self, enabled: bool) {
        self.input_tx.send_modify(|input| input.enabled = enabled);
    }

    /// Watch the currently visible prefix.
    pub fn visible(&self) -> watch::Receiver<String> {
        self.visible_rx.clone()
    }

    /// Stop the driver and any in-flight reveal. Idempotent.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Wait for the driver task to exit after a shutdown.
    pub async fn join(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for RevealHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Spawns and owns the reveal driver task.
pub struct RevealScheduler;

impl RevealScheduler {
    pub fn spawn(config: RevealConfig) -> RevealHandle {
        let (input_tx, input_rx) = watch::channel(RevealInput::default());
        let (visible_tx, visible_rx) = watch::channel(String::new());
        let token = CancellationToken::new();
        let task = tokio::spawn(run(config, input_rx, visible_tx, token.clone()));

        RevealHandle {
            input_tx,
            visible_rx,
            token,
            task: Some(task),
        }
    }
}

/// An in-flight reveal segment and when it started.
struct ActiveSegment {
    segment: RevealSegment,
    started: Instant,
}

async fn run(
    config: RevealConfig,
    mut input_rx: watch::Receiver<RevealInput>,
    visible_tx: watch::Sender<String>,
    token: CancellationToken,
) {
    let mut state = RevealState::new();
    let mut active: Option<ActiveSegment> = None;

    loop {
        let frame_deadline = Instant::now() + config.frame_interval;

        tokio::select! {
            _ = token.cancelled() => {
                debug!("reveal driver stopped");
                return;
            }
            changed = input_rx.changed() => {
                if changed.is_err() {
                    // All input handles dropped.
                    return;
                }
                let input = input_rx.borrow_and_update().clone();
                active = apply_input(&mut state, &input, &config);
                publish(&visible_tx, &state);
            }
            _ = sleep_until(frame_deadline), if active.is_some() => {
                if let Some(entry) = active.as_ref() {
                    let done = state.advance(&entry.segment, entry.started.elapsed());
                    publish(&visible_tx, &state);
                    if done {
                        // Back to idle until new target text arrives.
                        active = None;
                    }
                }
            }
        }
    }
}

/// Retarget the state for a new input, returning the replacement in-flight
/// segment, if any. Any previous segment is discarded: there is a single
/// active reveal operation at a time.
fn apply_input(
    state: &mut RevealState,
    input: &RevealInput,
    config: &RevealConfig,
) -> Option<ActiveSegment> {
    if !input.enabled {
        state.show_all(&input.target);
        return None;
    }

    match state.retarget(&input.target, config) {
        Retarget::Instant => None,
        Retarget::Continue(segment) | Retarget::Restart(segment) => Some(ActiveSegment {
            segment,
            started: Instant::now(),
        }),
    }
}

fn publish(visible_tx: &watch::Sender<String>, state: &RevealState) {
    // Receivers may all be gone; the driver keeps running until teardown.
    let _ = visible_tx.send(state.visible().to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn config() -> RevealConfig {
        RevealConfig {
            chars_per_second: 10.0,
            min_duration: Duration::from_millis(100),
            frame_interval: Duration::from_millis(20),
        }
    }

    async fn wait_for(visible: &mut watch::Receiver<String>, expected: &str) {
        timeout(Duration::from_secs(30), async {
            while visible.borrow_and_update().as_str() != expected {
                visible.changed().await.expect("driver alive");
            }
        })
        .await
        .unwrap_or_else(|_| panic!("never revealed {expected:?}"));
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_shows_target_immediately() {
        let handle = RevealScheduler::spawn(config());
        let mut visible = handle.visible();

        handle.set_target("Hello");
        wait_for(&mut visible, "Hello").await;
    }

    #[tokio::test(start_paused = true)]
    async fn reveals_progressively_and_finishes_exactly() {
        let handle = RevealScheduler::spawn(config());
        let mut visible = handle.visible();

        handle.set_enabled(true);
        handle.set_target("Hello");

        let mut seen = Vec::new();
        timeout(Duration::from_secs(30), async {
            loop {
                visible.changed().await.expect("driver alive");
                let current = visible.borrow_and_update().clone();
                seen.push(current.clone());
                if current == "Hello" {
                    break;
                }
            }
        })
        .await
        .expect("reveal finished");

        // Every published value is a growing prefix of the target.
        for window in seen.windows(2) {
            assert!(window[1].starts_with(&window[0]));
        }
        assert_eq!(seen.last().map(String::as_str), Some("Hello"));
    }

    #[tokio::test(start_paused = true)]
    async fn continuation_does_not_reset_revealed_text() {
        let handle = RevealScheduler::spawn(config());
        let mut visible = handle.visible();

        handle.set_enabled(true);
        handle.set_target("Hel");
        wait_for(&mut visible, "Hel").await;

        handle.set_target("Hello");

        let mut seen = Vec::new();
        timeout(Duration::from_secs(30), async {
            loop {
                visible.changed().await.expect("driver alive");
                let current = visible.borrow_and_update().clone();
                seen.push(current.clone());
                if current == "Hello" {
                    break;
                }
            }
        })
        .await
        .expect("continuation finished");

        // The reveal continued from position 3; it never dropped below the
        // already-revealed prefix.
        for value in &seen {
            assert!(value.chars().count() >= 3, "visibly reset to {value:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn non_extension_restarts_from_empty() {
        let handle = RevealScheduler::spawn(config());
        let mut visible = handle.visible();

        handle.set_enabled(true);
        handle.set_target("Hello");
        wait_for(&mut visible, "Hello").await;

        handle.set_target("Goodbye");
        visible.changed().await.expect("driver alive");
        assert_eq!(visible.borrow_and_update().as_str(), "");

        wait_for(&mut visible, "Goodbye").await;
    }

    #[tokio::test(start_paused = true)]
    async fn disabling_mid_reveal_shows_everything() {
        let handle = RevealScheduler::spawn(config());
        let mut visible = handle.visible();

        handle.set_enabled(true);
        handle.set_target("a long target that reveals slowly");
        visible.changed().await.expect("driver alive");

        handle.set_enabled(false);
        wait_for(&mut visible, "a long target that reveals slowly").await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_driver() {
        let handle = RevealScheduler::spawn(config());
        handle.set_enabled(true);
        handle.set_target("Hello");
        handle.join().await;
    }
}

//! Pure reveal state machine.
//!
//! The continuation/restart decision is a pure function of the previous
//! state and the new target text, so it can be tested without a clock.
//! All positions are counted in characters, never bytes.

use std::time::Duration;

/// Timing parameters for the reveal animation.
#[derive(Debug, Clone)]
pub struct RevealConfig {
    /// Fixed reveal rate in characters per second.
    pub chars_per_second: f64,
    /// Floor so very short deltas still animate for a perceptible time.
    pub min_duration: Duration,
    /// How often the driver publishes an updated prefix.
    pub frame_interval: Duration,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            chars_per_second: 60.0,
            min_duration: Duration::from_millis(150),
            frame_interval: Duration::from_millis(30),
        }
    }
}

/// One timed reveal segment from `from_chars` to `to_chars`.
#[derive(Debug, Clone, PartialEq)]
pub struct RevealSegment {
    pub from_chars: usize,
    pub to_chars: usize,
    /// `max(min_duration, chars_to_reveal / chars_per_second)`.
    pub duration: Duration,
}

/// How a new target text changes an in-progress reveal.
#[derive(Debug, Clone, PartialEq)]
pub enum Retarget {
    /// Nothing to animate; the visible text already equals the target.
    Instant,
    /// The new target extends the previous one; revealed progress is kept
    /// and the reveal continues from the current visible length.
    Continue(RevealSegment),
    /// The new target is not an extension; the visible text is cleared
    /// and the reveal restarts from position zero.
    Restart(RevealSegment),
}

/// Mutable reveal progress carried across retargets.
///
/// The visible length never exceeds the target length and only drops to
/// zero on an explicit restart, never on a continuation.
#[derive(Debug, Clone, Default)]
pub struct RevealState {
    target: String,
    previous_target: String,
    visible_chars: usize,
}

impl RevealState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn previous_target(&self) -> &str {
        &self.previous_target
    }

    pub fn visible_chars(&self) -> usize {
        self.visible_chars
    }

    /// Currently visible prefix of the target.
    pub fn visible(&self) -> &str {
        char_prefix(&self.target, self.visible_chars)
    }

    /// Show the target in full, without animation.
    pub fn show_all(&mut self, new_target: &str) {
        self.previous_target = std::mem::replace(&mut self.target, new_target.to_string());
        self.visible_chars = self.target.chars().count();
    }

    /// Point the reveal at a new target, deciding continuation vs restart.
    pub fn retarget(&mut self, new_target: &str, config: &RevealConfig) -> Retarget {
        let continues = new_target.starts_with(self.target.as_str());
        self.previous_target = std::mem::replace(&mut self.target, new_target.to_string());
        if !continues {
            self.visible_chars = 0;
        }

        let total = self.target.chars().count();
        if self.visible_chars >= total {
            self.visible_chars = total;
            return Retarget::Instant;
        }

        let segment = RevealSegment {
            from_chars: self.visible_chars,
            to_chars: total,
            duration: segment_duration(total - self.visible_chars, config),
        };
        if continues {
            Retarget::Continue(segment)
        } else {
            Retarget::Restart(segment)
        }
    }

    /// Advance an in-flight segment by the elapsed fraction of its
    /// duration. Returns `true` when the segment finished, at which point
    /// the visible text equals exactly the segment's end position so
    /// timing drift can never leave a trailing character unrevealed.
    pub fn advance(&mut self, segment: &RevealSegment, elapsed: Duration) -> bool {
        if elapsed >= segment.duration {
            self.visible_chars = segment.to_chars;
            return true;
        }

        let fraction = elapsed.as_secs_f64() / segment.duration.as_secs_f64();
        let span = (segment.to_chars - segment.from_chars) as f64;
        let revealed = segment.from_chars + (span * fraction).floor() as usize;
        // Within one segment the visible length never moves backwards.
        self.visible_chars = self.visible_chars.max(revealed).min(segment.to_chars);
        false
    }
}

fn segment_duration(chars_to_reveal: usize, config: &RevealConfig) -> Duration {
    let rate = config.chars_per_second.max(f64::EPSILON);
    let timed = Duration::from_secs_f64(chars_to_reveal as f64 / rate);
    timed.max(config.min_duration)
}

fn char_prefix(text: &str, chars: usize) -> &str {
    match text.char_indices().nth(chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

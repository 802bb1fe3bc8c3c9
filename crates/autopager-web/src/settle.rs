#![forbid(unsafe_code)]

//! Settle scroll animation.
//!
//! After a fragment is appended, the viewport glides to the new section's top
//! (plus the small nudge) over a short fixed interval. The animation is part
//! of the fetch cycle's critical section: the scroll listener is re-attached
//! only once it reports completion, so the user cannot trigger a second
//! fetch mid-glide.
//!
//! The animation is pure clock-in / position-out: the host samples
//! [`SettleScroll::tick`] once per frame with its own monotonic time and
//! applies the returned position. That keeps it identical under test and
//! under `requestAnimationFrame`.

use core::time::Duration;

/// Sinusoidal ease-in-out over `[0, 1]`.
fn ease(progress: f64) -> f64 {
    0.5 - (core::f64::consts::PI * progress).cos() / 2.0
}

/// One scroll glide from a start position to a target position.
#[derive(Debug, Clone, PartialEq)]
pub struct SettleScroll {
    start_position: f64,
    target: f64,
    started_at: Duration,
    duration: Duration,
    done: bool,
}

impl SettleScroll {
    /// Begin a glide at monotonic time `now`.
    #[must_use]
    pub fn new(start_position: f64, target: f64, now: Duration, duration: Duration) -> Self {
        Self {
            start_position,
            target,
            started_at: now,
            duration,
            done: duration.is_zero(),
        }
    }

    /// Final scroll position of the glide.
    #[must_use]
    pub fn target(&self) -> f64 {
        self.target
    }

    /// Whether the glide has reached its target.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Sample the position for monotonic time `now`.
    ///
    /// Clamps to the target once the duration has elapsed and marks the
    /// glide done; further ticks keep returning the target.
    pub fn tick(&mut self, now: Duration) -> f64 {
        if self.done {
            return self.target;
        }
        let elapsed = now.saturating_sub(self.started_at);
        if elapsed >= self.duration {
            self.done = true;
            return self.target;
        }
        let progress = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        self.start_position + (self.target - self.start_position) * ease(progress)
    }
}

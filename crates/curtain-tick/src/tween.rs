//! Deterministic timed interpolation.
//!
//! A [`Tween`] is the unit of animation time in Curtain: it maps elapsed
//! ticks onto an eased `0.0..=1.0` progress value. It holds no clock of
//! its own — callers feed it `dt` per tick — and it signals completion
//! exactly once, which is the property the transition state machines
//! depend on to never double-fire an acknowledgement.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Easing
// ---------------------------------------------------------------------------

/// Maps linear time progress onto a curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Easing {
    /// Straight interpolation — what a classic fade uses.
    #[default]
    Linear,

    /// Hermite smoothstep: gentle start and end.
    SmoothStep,
}

impl Easing {
    /// Applies the curve to a linear progress value in `0.0..=1.0`.
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::SmoothStep => t * t * (3.0 - 2.0 * t),
        }
    }
}

// ---------------------------------------------------------------------------
// Tween
// ---------------------------------------------------------------------------

/// The result of advancing a tween by one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Eased progress in `0.0..=1.0`.
    pub value: f32,

    /// `true` only on the single advance that crosses the end of the
    /// duration. Never `true` twice for the same tween, and never `true`
    /// after [`Tween::cancel`].
    pub just_completed: bool,
}

/// A cancellable timed task producing eased progress values.
///
/// A zero-duration tween completes on its first advance with value 1.0.
#[derive(Debug, Clone)]
pub struct Tween {
    duration: Duration,
    easing: Easing,
    elapsed: Duration,
    value: f32,
    finished: bool,
}

impl Tween {
    /// Creates a tween that runs for `duration` under `easing`.
    pub fn new(duration: Duration, easing: Easing) -> Self {
        Self {
            duration,
            easing,
            elapsed: Duration::ZERO,
            value: easing.apply(0.0),
            finished: false,
        }
    }

    /// Advances by one tick's worth of time.
    ///
    /// After the tween finishes (or is cancelled), further advances are
    /// no-ops that report the last value with `just_completed == false`.
    pub fn advance(&mut self, dt: Duration) -> Progress {
        if self.finished {
            return Progress {
                value: self.value,
                just_completed: false,
            };
        }

        self.elapsed += dt;

        let raw = if self.duration.is_zero() {
            1.0
        } else {
            (self.elapsed.as_secs_f32() / self.duration.as_secs_f32())
                .min(1.0)
        };
        self.value = self.easing.apply(raw);

        if self.elapsed >= self.duration {
            self.finished = true;
            self.value = self.easing.apply(1.0);
            Progress {
                value: self.value,
                just_completed: true,
            }
        } else {
            Progress {
                value: self.value,
                just_completed: false,
            }
        }
    }

    /// Stops the tween where it is. No completion will ever be reported.
    pub fn cancel(&mut self) {
        self.finished = true;
    }

    /// Whether the tween has finished or been cancelled.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The configured duration.
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

//! The stock fade effect: a linear cover interpolation.

use std::time::Duration;

use curtain_tick::{Easing, Tween};

use crate::{CoverSurface, EffectPlayback, PlaybackStatus, TransitionEffect};

/// Fade to cover and back: cover 0→1 on the way out, 1→0 on the way in.
///
/// This is the default registered effect (index 0 in a registry built
/// with [`EffectRegistry::with_default_fade`](crate::EffectRegistry::with_default_fade)).
#[derive(Debug, Clone)]
pub struct FadeEffect {
    duration: Duration,
    easing: Easing,
}

impl FadeEffect {
    /// The classic quarter-second fade.
    pub const DEFAULT_DURATION: Duration = Duration::from_millis(250);

    /// Creates a linear fade with the given duration.
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            easing: Easing::Linear,
        }
    }

    /// Overrides the easing curve.
    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }
}

impl Default for FadeEffect {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DURATION)
    }
}

impl TransitionEffect for FadeEffect {
    fn name(&self) -> &str {
        "fade"
    }

    fn play_out(&self) -> Box<dyn EffectPlayback> {
        Box::new(FadePlayback {
            tween: Tween::new(self.duration, self.easing),
            direction: Direction::Out,
            done: false,
        })
    }

    fn play_in(&self) -> Box<dyn EffectPlayback> {
        Box::new(FadePlayback {
            tween: Tween::new(self.duration, self.easing),
            direction: Direction::In,
            done: false,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    /// Cover rises 0→1.
    Out,
    /// Cover falls 1→0.
    In,
}

struct FadePlayback {
    tween: Tween,
    direction: Direction,
    done: bool,
}

impl EffectPlayback for FadePlayback {
    fn advance(
        &mut self,
        dt: Duration,
        surface: Option<&mut dyn CoverSurface>,
    ) -> PlaybackStatus {
        if self.done {
            return PlaybackStatus::Complete;
        }

        // No surface: degenerate no-op completion. The animation is lost
        // but the barrier keeps moving.
        let Some(surface) = surface else {
            self.done = true;
            self.tween.cancel();
            return PlaybackStatus::Complete;
        };

        let progress = self.tween.advance(dt);
        let cover = match self.direction {
            Direction::Out => progress.value,
            Direction::In => 1.0 - progress.value,
        };
        surface.set_cover(cover);

        if progress.just_completed {
            self.done = true;
            PlaybackStatus::Complete
        } else {
            PlaybackStatus::Running
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every cover value it is handed.
    struct RecordingSurface {
        covers: Vec<f32>,
    }

    impl RecordingSurface {
        fn new() -> Self {
            Self { covers: Vec::new() }
        }
    }

    impl CoverSurface for RecordingSurface {
        fn set_cover(&mut self, cover: f32) {
            self.covers.push(cover);
        }
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_fade_out_covers_monotonically_to_one() {
        let fade = FadeEffect::new(ms(100));
        let mut playback = fade.play_out();
        let mut surface = RecordingSurface::new();

        let mut status = PlaybackStatus::Running;
        while status == PlaybackStatus::Running {
            status = playback.advance(ms(25), Some(&mut surface));
        }

        assert_eq!(surface.covers.len(), 4);
        assert!(surface.covers.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*surface.covers.last().unwrap(), 1.0);
    }

    #[test]
    fn test_fade_in_reveals_monotonically_to_zero() {
        let fade = FadeEffect::new(ms(100));
        let mut playback = fade.play_in();
        let mut surface = RecordingSurface::new();

        let mut status = PlaybackStatus::Running;
        while status == PlaybackStatus::Running {
            status = playback.advance(ms(50), Some(&mut surface));
        }

        assert!(surface.covers.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(*surface.covers.last().unwrap(), 0.0);
    }

    #[test]
    fn test_missing_surface_completes_immediately() {
        let fade = FadeEffect::new(ms(10_000));
        let mut playback = fade.play_out();

        let status = playback.advance(ms(1), None);
        assert_eq!(status, PlaybackStatus::Complete);
    }

    #[test]
    fn test_surface_vanishing_mid_play_still_completes() {
        let fade = FadeEffect::new(ms(100));
        let mut playback = fade.play_out();
        let mut surface = RecordingSurface::new();

        assert_eq!(
            playback.advance(ms(25), Some(&mut surface)),
            PlaybackStatus::Running
        );
        // Surface torn down between ticks.
        assert_eq!(playback.advance(ms(25), None), PlaybackStatus::Complete);
    }
}

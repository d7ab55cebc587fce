//! Fixed-timestep tick scheduler.

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the tick scheduler.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Tick rate in Hz. 0 = event-driven (the tick never fires and
    /// [`TickScheduler::wait_for_tick`] pends forever).
    pub rate_hz: u32,

    /// Random jitter (0–max µs) added before the *first* tick so that
    /// many nodes started at the same instant don't all wake together.
    pub start_jitter_us: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            rate_hz: 0,
            start_jitter_us: 2_000, // 0–2 ms
        }
    }
}

impl TickConfig {
    /// Maximum supported tick rate.
    pub const MAX_RATE_HZ: u32 = 128;

    /// Creates a config for a specific tick rate with default jitter.
    pub fn with_rate(rate_hz: u32) -> Self {
        Self {
            rate_hz,
            ..Default::default()
        }
    }

    /// Clamps out-of-range values so the config is safe to use.
    /// Called by [`TickScheduler::new`].
    pub fn validated(mut self) -> Self {
        if self.rate_hz > Self::MAX_RATE_HZ {
            warn!(
                rate = self.rate_hz,
                max = Self::MAX_RATE_HZ,
                "tick rate exceeds maximum — clamping"
            );
            self.rate_hz = Self::MAX_RATE_HZ;
        }
        self
    }

    /// Duration of a single tick. `None` in event-driven mode.
    pub fn tick_duration(&self) -> Option<Duration> {
        if self.rate_hz == 0 {
            None
        } else {
            Some(Duration::from_secs_f64(1.0 / self.rate_hz as f64))
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// A completed tick, returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone, Copy)]
pub struct Tick {
    /// Monotonically increasing tick number (starts at 1).
    pub number: u64,

    /// Fixed delta time for this tick (always `1 / rate_hz`). Playback
    /// advances by this, not by wall-clock elapsed time, so a late wakeup
    /// slows the animation down instead of making it jump.
    pub dt: Duration,

    /// `true` if the scheduler woke significantly late for this tick.
    pub overrun: bool,
}

/// Fixed-timestep tick scheduler. One per node event loop.
///
/// Overruns are absorbed by rescheduling from "now" — the scheduler never
/// fires a burst of catch-up ticks, which would fast-forward a transition
/// animation visibly.
pub struct TickScheduler {
    config: TickConfig,
    tick_duration: Option<Duration>,
    tick_count: u64,
    next_tick: Option<TokioInstant>,
}

impl TickScheduler {
    /// Creates a new scheduler from config.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let tick_duration = config.tick_duration();

        let next_tick = tick_duration.map(|d| {
            let jitter = if config.start_jitter_us > 0 {
                let us = rand::rng().random_range(0..config.start_jitter_us);
                Duration::from_micros(us)
            } else {
                Duration::ZERO
            };
            TokioInstant::now() + d + jitter
        });

        if config.rate_hz == 0 {
            debug!("tick scheduler created in event-driven mode");
        } else {
            debug!(rate_hz = config.rate_hz, "tick scheduler created");
        }

        Self {
            config,
            tick_duration,
            tick_count: 0,
            next_tick,
        }
    }

    /// Creates a scheduler for a specific tick rate with default settings.
    pub fn with_rate(rate_hz: u32) -> Self {
        Self::new(TickConfig::with_rate(rate_hz))
    }

    /// Waits until the next tick is due.
    ///
    /// In event-driven mode this future pends forever — it will never
    /// resolve on its own, but `tokio::select!` still serves the loop's
    /// other branches.
    pub async fn wait_for_tick(&mut self) -> Tick {
        let (next, tick_dur) = match (self.next_tick, self.tick_duration) {
            (Some(next), Some(dur)) => (next, dur),
            _ => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        };

        time::sleep_until(next).await;

        let now = TokioInstant::now();
        self.tick_count += 1;

        // >10% late counts as an overrun.
        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > tick_dur / 10;
        if overrun {
            warn!(
                tick = self.tick_count,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "tick overrun — rescheduling from now"
            );
        }

        // Always schedule from now, not from the missed deadline.
        self.next_tick = Some(now + tick_dur);

        trace!(tick = self.tick_count, overrun, "tick fired");

        Tick {
            number: self.tick_count,
            dt: tick_dur,
            overrun,
        }
    }

    /// Whether this scheduler is in event-driven mode (rate 0).
    pub fn is_event_driven(&self) -> bool {
        self.tick_duration.is_none()
    }

    /// Current tick count.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// The configured tick rate in Hz.
    pub fn rate_hz(&self) -> u32 {
        self.config.rate_hz
    }

    /// The fixed tick duration, or `None` for event-driven mode.
    pub fn tick_duration(&self) -> Option<Duration> {
        self.tick_duration
    }
}

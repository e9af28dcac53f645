//! Time sources and frame scheduling for the animation loop

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tokio::time::{Interval, MissedTickBehavior};

/// Source of "now" for the driver
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock. Follows tokio's clock, so paused test runtimes see paused time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}

/// Hand-driven clock for deterministic frame tests
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }

    pub fn advance_secs(&self, secs: f64) {
        self.advance(Duration::from_secs_f64(secs));
    }

    /// Time elapsed since the clock was created
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }
}

/// Waits for the next animation frame
#[async_trait]
pub trait FrameTicker: Send {
    async fn next_frame(&mut self);
}

/// Fixed-rate ticker on top of `tokio::time::Interval`.
/// Late frames are skipped rather than bunched up.
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    /// Must be called within a tokio runtime
    pub fn new(frame_rate: u32) -> Self {
        let period = Duration::from_nanos(1_000_000_000 / u64::from(frame_rate.max(1)));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }
}

#[async_trait]
impl FrameTicker for IntervalTicker {
    async fn next_frame(&mut self) {
        self.interval.tick().await;
    }
}

//! Frame pacing
//!
//! The pacer turns elapsed time into a number of frames to advance. Elapsed
//! time is added to an accumulator; every whole frame interval in it is one
//! frame due, and the remainder carries into the next tick. When a stalled
//! host leaves more than `backlog_ceiling` frames due, the excess is dropped
//! instead of caught up.

use rb_core::config::{self, PacingConfig};
use rb_core::EngineDescriptor;
use std::time::Duration;

/// Frames to run for one scheduler tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaceDecision {
    /// Frames to advance now
    pub frames: u32,
    /// Frames that were due but discarded by the backlog ceiling
    pub dropped: u32,
    /// Whether only the last of `frames` should render video
    pub skip_video: bool,
}

impl PaceDecision {
    /// Whether frame `index` of this tick (0-based) renders video
    pub fn renders(&self, index: u32) -> bool {
        !self.skip_video || index + 1 == self.frames
    }
}

/// Accumulator-based frame pacer
#[derive(Debug, Clone)]
pub struct FramePacer {
    /// Native frame interval
    base_interval: Duration,
    /// Most frames advanced per tick
    backlog_ceiling: u32,
    /// Emulation speed multiplier (1.0 nominal)
    rate: f64,
    /// Render only the last frame of a multi-frame tick
    frame_skip: bool,
    audio_sync: bool,
    max_rate_adjust: f64,
    /// Relative interval correction from audio buffer fill
    correction: f64,
    /// Time owed to frames not yet advanced
    accumulator: Duration,
    last_tick: Option<Duration>,
    ticks: u64,
    frames_due: u64,
    frames_dropped: u64,
}

impl FramePacer {
    pub fn new(descriptor: &EngineDescriptor, config: &PacingConfig) -> Self {
        Self {
            base_interval: descriptor.frame_interval(),
            backlog_ceiling: config.backlog_ceiling.max(1),
            rate: 1.0,
            frame_skip: config.frame_skip,
            audio_sync: config.audio_sync,
            max_rate_adjust: config.max_rate_adjust,
            correction: 0.0,
            accumulator: Duration::ZERO,
            last_tick: None,
            ticks: 0,
            frames_due: 0,
            frames_dropped: 0,
        }
    }

    /// Restart timing from `now`, forgetting any owed time. Used on start
    /// and resume so time spent paused is not caught up.
    pub fn reset(&mut self, now: Duration) {
        self.last_tick = Some(now);
        self.accumulator = Duration::ZERO;
    }

    /// Set the speed multiplier. Rates outside
    /// `config::MIN_RATE..=config::MAX_RATE` are ignored.
    pub fn set_rate(&mut self, rate: f64) {
        if config::rate_in_range(rate) {
            self.rate = rate;
            self.correction = 0.0;
        } else {
            tracing::warn!("Ignoring invalid emulation rate {}", rate);
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    fn nominal_rate(&self) -> bool {
        (self.rate - 1.0).abs() < f64::EPSILON
    }

    /// Feed the audio ring fill level (0.0..=1.0).
    ///
    /// A ring fuller than half means the engine runs ahead of the audio
    /// device, so the interval is lengthened slightly, and vice versa.
    pub fn observe_audio_fill(&mut self, fill: f32) {
        if !self.audio_sync || !self.nominal_rate() {
            self.correction = 0.0;
            return;
        }
        let error = (fill.clamp(0.0, 1.0) as f64 - 0.5) * 2.0;
        self.correction = (error * self.max_rate_adjust)
            .clamp(-self.max_rate_adjust, self.max_rate_adjust);
    }

    pub fn correction(&self) -> f64 {
        self.correction
    }

    /// Interval between frames after rate and drift correction
    pub fn effective_interval(&self) -> Duration {
        let secs = self.base_interval.as_secs_f64() / self.rate * (1.0 + self.correction);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.base_interval)
            .max(Duration::from_nanos(1))
    }

    /// Work out how many frames are due at `now`
    pub fn tick(&mut self, now: Duration) -> PaceDecision {
        let elapsed = match self.last_tick {
            Some(last) => now.saturating_sub(last),
            None => Duration::ZERO,
        };
        self.last_tick = Some(now);
        self.ticks += 1;
        self.accumulator += elapsed;

        let interval = self.effective_interval();
        let interval_nanos = interval.as_nanos();
        let due = self.accumulator.as_nanos() / interval_nanos;
        let remainder = self.accumulator.as_nanos() % interval_nanos;
        self.accumulator = Duration::from_nanos(remainder as u64);

        let due = u32::try_from(due).unwrap_or(u32::MAX);
        let frames = due.min(self.backlog_ceiling);
        let dropped = due - frames;

        self.frames_due += due as u64;
        if dropped > 0 {
            self.frames_dropped += dropped as u64;
            tracing::warn!(
                "Host stalled: {} frames due, dropped {} (ceiling {})",
                due,
                dropped,
                self.backlog_ceiling
            );
        }

        PaceDecision {
            frames,
            dropped,
            skip_video: self.frame_skip && self.nominal_rate() && frames > 1,
        }
    }

    /// Time at which the next frame becomes due
    pub fn next_deadline(&self) -> Duration {
        let last = self.last_tick.unwrap_or_default();
        last + self.effective_interval().saturating_sub(self.accumulator)
    }

    /// Time owed to frames not yet advanced; always below one interval
    /// after a tick
    pub fn drift(&self) -> Duration {
        self.accumulator
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Frames that came due, whether advanced or dropped
    pub fn frames_due(&self) -> u64 {
        self.frames_due
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    pub fn backlog_ceiling(&self) -> u32 {
        self.backlog_ceiling
    }
}

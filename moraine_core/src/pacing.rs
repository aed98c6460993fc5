// Copyright 2026 the Moraine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame pacing for a fixed target framerate.
//!
//! The [`FramePacer`] tracks how long each tick takes and tells the host how
//! long to sleep before the next one, so the player runs at its configured
//! framerate instead of spinning. Observed frame cost is smoothed with an
//! exponential moving average so a single slow frame does not make the pacer
//! oscillate.

use crate::time::{Duration, HostTime};

/// Configuration for the [`FramePacer`].
#[derive(Clone, Copy, Debug)]
pub struct PacerConfig {
    /// Target time between consecutive frame starts, in ticks.
    pub frame_period: Duration,
    /// EMA smoothing factor for frame cost estimation (0.0-1.0).
    /// Smaller values mean more smoothing.
    pub ema_alpha: f32,
}

impl PacerConfig {
    /// Configuration targeting the given framerate with ticks in nanoseconds.
    ///
    /// # Panics
    ///
    /// Panics if `fps` is zero.
    #[must_use]
    pub const fn for_framerate(fps: u32) -> Self {
        Self {
            frame_period: Duration::per_frame(fps, crate::time::Timebase::NANOS),
            ema_alpha: 0.2,
        }
    }
}

/// Exponential moving average tracker.
#[derive(Clone, Copy, Debug)]
struct Ema {
    value: f32,
    alpha: f32,
    initialized: bool,
}

impl Ema {
    const fn new(alpha: f32) -> Self {
        Self {
            value: 0.0,
            alpha,
            initialized: false,
        }
    }

    fn update(&mut self, sample: f32) {
        if self.initialized {
            self.value = self.alpha * sample + (1.0 - self.alpha) * self.value;
        } else {
            self.value = sample;
            self.initialized = true;
        }
    }

    const fn get(&self) -> f32 {
        self.value
    }
}

/// Paces the frame loop to a target framerate.
#[derive(Debug)]
pub struct FramePacer {
    config: PacerConfig,
    frame_start: Option<HostTime>,
    cost_ema: Ema,
    frames_late: u64,
}

impl FramePacer {
    /// Creates a pacer with the given configuration.
    #[must_use]
    pub const fn new(config: PacerConfig) -> Self {
        Self {
            config,
            frame_start: None,
            cost_ema: Ema::new(config.ema_alpha),
            frames_late: 0,
        }
    }

    /// Marks the start of a tick.
    pub fn begin_frame(&mut self, now: HostTime) {
        self.frame_start = Some(now);
    }

    /// Marks the end of a tick and returns how long the host should sleep
    /// before the next one.
    ///
    /// Returns [`Duration::ZERO`] when the frame already overran its period;
    /// overruns are counted rather than compensated, so a slow frame never
    /// causes a burst of catch-up frames.
    #[expect(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "frame costs fit comfortably in f32 mantissa range"
    )]
    pub fn frame_wait(&mut self, now: HostTime) -> Duration {
        let Some(start) = self.frame_start.take() else {
            return Duration::ZERO;
        };
        let cost = now.saturating_duration_since(start);
        self.cost_ema.update(cost.ticks() as f32);
        if cost >= self.config.frame_period {
            self.frames_late += 1;
            return Duration::ZERO;
        }
        self.config.frame_period - cost
    }

    /// Smoothed per-frame cost in ticks.
    #[must_use]
    pub fn mean_frame_cost(&self) -> Duration {
        #[expect(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "EMA of non-negative tick counts"
        )]
        Duration(self.cost_ema.get() as u64)
    }

    /// Number of frames that overran the target period so far.
    #[must_use]
    pub const fn frames_late(&self) -> u64 {
        self.frames_late
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_frame_waits_out_the_period() {
        let mut pacer = FramePacer::new(PacerConfig {
            frame_period: Duration(1000),
            ema_alpha: 0.2,
        });
        pacer.begin_frame(HostTime(0));
        let wait = pacer.frame_wait(HostTime(300));
        assert_eq!(wait, Duration(700));
        assert_eq!(pacer.frames_late(), 0);
    }

    #[test]
    fn slow_frame_does_not_compensate() {
        let mut pacer = FramePacer::new(PacerConfig {
            frame_period: Duration(1000),
            ema_alpha: 0.2,
        });
        pacer.begin_frame(HostTime(0));
        assert_eq!(pacer.frame_wait(HostTime(2500)), Duration::ZERO);
        assert_eq!(pacer.frames_late(), 1);

        pacer.begin_frame(HostTime(2500));
        let wait = pacer.frame_wait(HostTime(2600));
        assert_eq!(wait, Duration(900), "next frame paced normally");
    }

    #[test]
    fn cost_ema_smooths_samples() {
        let mut pacer = FramePacer::new(PacerConfig {
            frame_period: Duration(1000),
            ema_alpha: 0.5,
        });
        pacer.begin_frame(HostTime(0));
        let _ = pacer.frame_wait(HostTime(400));
        assert_eq!(pacer.mean_frame_cost(), Duration(400), "first sample seeds the EMA");

        pacer.begin_frame(HostTime(1000));
        let _ = pacer.frame_wait(HostTime(1800));
        assert_eq!(pacer.mean_frame_cost(), Duration(600));
    }

    #[test]
    fn wait_without_begin_is_zero() {
        let mut pacer = FramePacer::new(PacerConfig::for_framerate(60));
        assert_eq!(pacer.frame_wait(HostTime(123)), Duration::ZERO);
    }

    #[test]
    fn for_framerate_period() {
        let config = PacerConfig::for_framerate(25);
        assert_eq!(config.frame_period, Duration(40_000_000));
    }
}

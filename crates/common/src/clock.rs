//! Clock and timing utilities for the render/capture loop.
//!
//! Two clocks are involved when a tagged clip is exported:
//! - the media playback clock (`PlaybackClock`), which owns `current_time`
//! - the capture pacer (`RateController`), limiting frames fed to the encoder
//!
//! The stop condition compares the playback clock with the trim window, and
//! `StopDrift` reports how far past the window a recording actually ran.

use std::time::Instant;

/// Media playback position that advances with real time while playing.
///
/// Mirrors the semantics of a media element: seeking while paused only moves
/// the position; once the position reaches `duration` the clock reports
/// `ended` and stops advancing.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    duration_secs: f64,
    base_secs: f64,
    playing_since: Option<Instant>,
}

impl PlaybackClock {
    /// Create a paused clock at position zero.
    pub fn new(duration_secs: f64) -> Self {
        Self {
            duration_secs: duration_secs.max(0.0),
            base_secs: 0.0,
            playing_since: None,
        }
    }

    /// Total media duration.
    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    /// Current position at an explicit instant.
    pub fn position_at(&self, now: Instant) -> f64 {
        let advanced = match self.playing_since {
            Some(since) => now.saturating_duration_since(since).as_secs_f64(),
            None => 0.0,
        };
        (self.base_secs + advanced).min(self.duration_secs)
    }

    /// Current position.
    pub fn position(&self) -> f64 {
        self.position_at(Instant::now())
    }

    /// Start advancing from the current position. Restarts from zero when ended.
    pub fn play_at(&mut self, now: Instant) {
        if self.playing_since.is_some() {
            return;
        }
        if self.base_secs >= self.duration_secs {
            self.base_secs = 0.0;
        }
        self.playing_since = Some(now);
    }

    pub fn play(&mut self) {
        self.play_at(Instant::now());
    }

    /// Freeze the position.
    pub fn pause_at(&mut self, now: Instant) {
        self.base_secs = self.position_at(now);
        self.playing_since = None;
    }

    pub fn pause(&mut self) {
        self.pause_at(Instant::now());
    }

    /// Jump to `secs`, keeping the play/pause state.
    pub fn seek_at(&mut self, secs: f64, now: Instant) {
        self.base_secs = secs.clamp(0.0, self.duration_secs);
        if self.playing_since.is_some() {
            self.playing_since = Some(now);
        }
    }

    pub fn seek(&mut self, secs: f64) {
        self.seek_at(secs, Instant::now());
    }

    /// Whether the clock is advancing (and has not run off the end).
    pub fn is_playing_at(&self, now: Instant) -> bool {
        self.playing_since.is_some() && !self.has_ended_at(now)
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing_at(Instant::now())
    }

    /// Whether the position has reached the end of the media.
    pub fn has_ended_at(&self, now: Instant) -> bool {
        self.position_at(now) >= self.duration_secs
    }

    pub fn has_ended(&self) -> bool {
        self.has_ended_at(Instant::now())
    }
}

/// How far a recording ran past the end of its trim window.
#[derive(Debug, Clone, Copy)]
pub struct StopDrift {
    /// Playback position at which the recording was meant to stop.
    pub expected_secs: f64,
    /// Playback position when the stop actually happened.
    pub actual_secs: f64,
}

impl StopDrift {
    /// Drift in milliseconds (positive = stopped late).
    pub fn drift_ms(&self) -> f64 {
        (self.actual_secs - self.expected_secs) * 1000.0
    }

    /// Whether drift exceeds an acceptable threshold.
    pub fn exceeds_threshold_ms(&self, threshold_ms: f64) -> bool {
        self.drift_ms().abs() > threshold_ms
    }
}

/// Frame rate controller for capture sampling.
#[derive(Debug)]
pub struct RateController {
    target_interval_ns: u64,
    last_tick_ns: Option<u64>,
}

impl RateController {
    /// Create a controller targeting the given Hz rate.
    pub fn new(target_hz: u32) -> Self {
        Self {
            target_interval_ns: 1_000_000_000 / target_hz.max(1) as u64,
            last_tick_ns: None,
        }
    }

    /// Check if the next capture slot has been reached.
    ///
    /// Slots sit on a fixed grid anchored at the first call, which always
    /// fires. A tick up to a quarter interval early still takes its slot, so
    /// jitter in the driving loop does not push captures a whole tick late.
    /// After a stall the grid skips ahead to the latest slot already passed.
    pub fn should_tick(&mut self, current_ns: u64) -> bool {
        let interval = self.target_interval_ns;
        let Some(last) = self.last_tick_ns else {
            self.last_tick_ns = Some(current_ns);
            return true;
        };
        let next = last + interval;
        if current_ns + interval / 4 < next {
            return false;
        }
        let behind = current_ns.saturating_sub(next) / interval;
        self.last_tick_ns = Some(next + behind * interval);
        true
    }

    /// Forget the last tick so the next call fires immediately.
    pub fn reset(&mut self) {
        self.last_tick_ns = None;
    }

    /// Target interval in nanoseconds.
    pub fn interval_ns(&self) -> u64 {
        self.target_interval_ns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_playback_clock_advances_only_while_playing() {
        let t0 = Instant::now();
        let mut clock = PlaybackClock::new(10.0);
        assert_eq!(clock.position_at(t0 + Duration::from_secs(3)), 0.0);

        clock.play_at(t0);
        assert!((clock.position_at(t0 + Duration::from_millis(1500)) - 1.5).abs() < 1e-9);

        clock.pause_at(t0 + Duration::from_secs(2));
        assert!((clock.position_at(t0 + Duration::from_secs(5)) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_playback_clock_seek_and_end() {
        let t0 = Instant::now();
        let mut clock = PlaybackClock::new(4.0);
        clock.play_at(t0);
        clock.seek_at(3.0, t0 + Duration::from_secs(1));
        let later = t0 + Duration::from_secs(3);
        assert_eq!(clock.position_at(later), 4.0);
        assert!(clock.has_ended_at(later));
        assert!(!clock.is_playing_at(later));
    }

    #[test]
    fn test_stop_drift() {
        let drift = StopDrift {
            expected_secs: 3.0,
            actual_secs: 3.05,
        };
        assert!((drift.drift_ms() - 50.0).abs() < 1e-6);
        assert!(drift.exceeds_threshold_ms(10.0));
        assert!(!drift.exceeds_threshold_ms(100.0));
    }

    #[test]
    fn test_rate_controller() {
        let mut ctrl = RateController::new(30);
        assert!(ctrl.should_tick(0));
        assert!(!ctrl.should_tick(16_000_000));
        assert!(ctrl.should_tick(34_000_000));
        ctrl.reset();
        assert!(ctrl.should_tick(35_000_000));
    }

    #[test]
    fn test_rate_controller_holds_grid_under_jitter() {
        let mut ctrl = RateController::new(30);
        let fired = (0..60u64)
            .filter(|i| {
                let jitter = (i * 7919) % 2_000_000;
                ctrl.should_tick(i * 16_666_667 + jitter)
            })
            .count();
        assert_eq!(fired, 30);
    }

    #[test]
    fn test_rate_controller_skips_ahead_after_stall() {
        let mut ctrl = RateController::new(10);
        assert!(ctrl.should_tick(0));
        assert!(ctrl.should_tick(350_000_000));
        assert!(!ctrl.should_tick(360_000_000));
        assert!(ctrl.should_tick(400_000_000));
    }
}

//! Audio/video drift estimation.
//!
//! The two capture clocks were never synchronized and drift relative to each other. This tracks
//! the instantaneous desync (audio ahead/behind video, in seconds) with a PI controller and turns
//! it into a target sample rate the resampler can aim for, rather than trying to nudge the
//! resampler's internal ratio directly (resamplers tend to handle a fixed target rate far better
//! than a continuously perturbed one).
//!
//! Video is treated as the reference clock: its PTS advances from the configured frame rate, never
//! from measured drift, and only the audio resample target is corrected against it.

use crate::config::SyncConfig;

/// PI-controlled estimate of audio-vs-video desynchronization.
pub(crate) struct DriftEstimator {
    /// Instantaneous desync estimate, seconds. Positive means audio is ahead of video.
    desync: f64,
    /// Integral term.
    desync_i: f64,
}

impl DriftEstimator {
    pub fn new() -> Self {
        Self {
            desync: 0.0,
            desync_i: 0.0,
        }
    }

    /// Feed a freshly measured instantaneous desync (seconds) and the elapsed time since the last
    /// update (seconds). Returns the new desync estimate and whether it crossed
    /// `desync_error_threshold` (a fault, reported by the caller at most once per session).
    pub fn update(&mut self, measured_desync_secs: f64, dt_secs: f64, config: &SyncConfig) -> (f64, bool) {
        self.desync_i += config.desync_correction_i * measured_desync_secs * dt_secs;
        self.desync = self.desync_i + config.desync_correction_p * measured_desync_secs;

        let exceeded = self.desync.abs() > config.desync_error_threshold;
        if exceeded {
            self.desync = self
                .desync
                .clamp(-config.desync_error_threshold, config.desync_error_threshold);
        }
        (self.desync, exceeded)
    }

    /// Current desync estimate, seconds.
    pub fn desync(&self) -> f64 {
        self.desync
    }

    /// Target sample rate the resampler should aim for to absorb the current desync: a 1 ms/s
    /// clock skew corresponds to a 1 ms/s (1000 ppm) rate adjustment in the opposite direction, so
    /// that sustained drift is corrected by slowly stretching or compressing audio rather than by a
    /// single discontinuous jump.
    pub fn target_sample_rate(&self, required_sample_rate: u32) -> u32 {
        let ratio = 1.0 + self.desync;
        ((required_sample_rate as f64) / ratio).round().max(1.0) as u32
    }

    /// Reset both terms to zero, e.g. on segment boundary.
    pub fn reset(&mut self) {
        self.desync = 0.0;
        self.desync_i = 0.0;
    }
}

impl Default for DriftEstimator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SyncConfig {
        SyncConfig::default()
    }

    #[test]
    fn test_zero_drift_stays_zero() {
        let mut est = DriftEstimator::new();
        let (desync, exceeded) = est.update(0.0, 1.0, &config());
        assert_eq!(desync, 0.0);
        assert!(!exceeded);
    }

    #[test]
    fn test_positive_error_pushes_desync_up() {
        let mut est = DriftEstimator::new();
        let (desync, _) = est.update(0.05, 1.0, &config());
        assert!(desync > 0.0);
    }

    #[test]
    fn test_threshold_exceeded_flag() {
        let mut est = DriftEstimator::new();
        let cfg = SyncConfig {
            desync_error_threshold: 0.01,
            ..config()
        };
        let (desync, exceeded) = est.update(1.0, 1.0, &cfg);
        assert!(exceeded);
        assert!(desync.abs() <= 0.01 + 1e-9);
    }

    #[test]
    fn test_target_sample_rate_tracks_desync() {
        let mut est = DriftEstimator::new();
        est.update(0.0, 1.0, &config());
        assert_eq!(est.target_sample_rate(48_000), 48_000);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut est = DriftEstimator::new();
        est.update(0.5, 1.0, &config());
        est.reset();
        assert_eq!(est.desync(), 0.0);
    }
}

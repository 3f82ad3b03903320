//! Synchronizer configuration.
//!
//! Consolidates the tunables named in the configuration constants table into a single typed
//! struct instead of a scattering of free constants. Unlike an application-level settings store,
//! this is owned by the caller and passed into [`crate::Synchronizer::new`] — a library does not
//! get to plant a process-global singleton under callers that may run more than one synchronizer
//! at once.

use serde::{Deserialize, Serialize};

/// Synchronizer tunables and stream-enable flags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    /// Output video frame rate, in frames per second.
    pub frame_rate: f64,

    /// PI controller proportional gain.
    pub desync_correction_p: f64,

    /// PI controller integral gain.
    pub desync_correction_i: f64,

    /// Absolute desync magnitude, in seconds, past which a fault warning is raised.
    pub desync_error_threshold: f64,

    /// Video ring buffer capacity, in frames.
    pub max_video_frames_buffered: usize,

    /// Audio ring buffer capacity, in samples (per channel).
    pub max_audio_samples_buffered: usize,

    /// Maximum number of duplicated/delayed frames a single flush may insert.
    pub max_frame_delay: u32,

    /// Whether the emit worker may drop late video frames, or must stall instead.
    pub allow_frame_skipping: bool,

    /// Whether a video stream is expected this session.
    pub video_enabled: bool,

    /// Whether an audio stream is expected this session.
    pub audio_enabled: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            frame_rate: 30.0,
            desync_correction_p: 0.3,
            desync_correction_i: 0.05,
            desync_error_threshold: 20.0,
            max_video_frames_buffered: 30,
            max_audio_samples_buffered: 48_000 * 30,
            max_frame_delay: 10,
            allow_frame_skipping: true,
            video_enabled: true,
            audio_enabled: true,
        }
    }
}

impl SyncConfig {
    /// Clamp settings to sane ranges. Mirrors the clamp-on-write policy of application-level
    /// config stores, applied once at construction instead of on every field setter.
    pub fn validate(&mut self) {
        self.frame_rate = self.frame_rate.clamp(1.0, 240.0);
        self.desync_error_threshold = self.desync_error_threshold.max(0.001);
        self.max_video_frames_buffered = self.max_video_frames_buffered.max(1);
        self.max_audio_samples_buffered = self.max_audio_samples_buffered.max(1);
        self.max_frame_delay = self.max_frame_delay.max(1);
    }

    /// Recompute `max_audio_samples_buffered` from a known audio sample rate (30 s of audio,
    /// matching the "sample_rate × 30" typical value).
    pub fn with_audio_sample_rate(mut self, sample_rate: u32) -> Self {
        self.max_audio_samples_buffered = sample_rate as usize * 30;
        self
    }

    /// Duration, in microseconds, of a single output video frame.
    pub fn frame_period_us(&self) -> i64 {
        (1_000_000.0 / self.frame_rate).round() as i64
    }
}

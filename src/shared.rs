//! The single structure protected by the shared-state mutex.
//!
//! Everything the ingest front-end and the emit worker touch under the shared lock lives here:
//! both ring buffers, the segment state machine, the drift estimator, the partial audio frame, the
//! last-frame handle used for gap duplication, and the session-wide output counters. No encoder
//! call is ever made while this is borrowed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::SyncConfig;
use crate::drift::DriftEstimator;
use crate::ring_buffer::{AudioRingBuffer, VideoRingBuffer};
use crate::segment::{Segment, SegmentPhase};
use crate::types::{Micros, VideoFrame};

/// Staging buffer for audio samples pulled out of the ring buffer but not yet a full
/// `required_frame_size` batch.
pub(crate) struct PartialAudioFrame {
    pub data: Vec<u8>,
    pub samples: usize,
}

impl PartialAudioFrame {
    fn new() -> Self {
        Self {
            data: Vec::new(),
            samples: 0,
        }
    }

    fn clear(&mut self) {
        self.data.clear();
        self.samples = 0;
    }
}

pub(crate) struct SharedState {
    pub config: SyncConfig,

    pub segment: Segment,

    pub video_queue: VideoRingBuffer,
    pub audio_queue: AudioRingBuffer,
    pub partial_audio: PartialAudioFrame,
    pub last_video_frame: Option<VideoFrame>,

    pub drift: DriftEstimator,

    /// Total frames handed to the video encoder across the whole session.
    pub video_pts: u64,
    /// Total samples handed to the audio encoder (including the partial frame), whole session.
    pub audio_samples: u64,
    /// Sum of durations of all previously closed segments, microseconds.
    pub time_offset: Micros,

    pub warned_drop_video: bool,
    pub warned_desync: bool,

    /// Audio frame geometry, fixed for the life of the synchronizer.
    pub audio_frame_bytes: usize,
    pub audio_sample_rate: u32,
    pub required_frame_size: usize,
}

impl SharedState {
    pub fn new(config: SyncConfig, audio_sample_rate: u32, audio_frame_bytes: usize, required_frame_size: usize) -> Self {
        let segment = Segment::new(config.video_enabled, config.audio_enabled);
        let max_audio = config.max_audio_samples_buffered;
        let max_video = config.max_video_frames_buffered;
        Self {
            video_queue: VideoRingBuffer::new(max_video),
            audio_queue: AudioRingBuffer::new(audio_sample_rate, audio_frame_bytes, max_audio),
            partial_audio: PartialAudioFrame::new(),
            last_video_frame: None,
            drift: DriftEstimator::new(),
            video_pts: 0,
            audio_samples: 0,
            time_offset: 0,
            warned_drop_video: false,
            warned_desync: false,
            audio_frame_bytes,
            audio_sample_rate,
            required_frame_size,
            config,
            segment,
        }
    }

    /// `GetNextVideoTimestamp`: earliest timestamp the next video frame may legally carry.
    pub fn next_video_timestamp(&self) -> Micros {
        if !self.segment.video_started {
            return 0;
        }
        let frame_period = self.config.frame_period_us();
        (self.segment.video_last_timestamp + frame_period).max(self.segment.video_stop_time)
    }

    /// First video input of a segment: latch start time and flip the waiting flag.
    pub fn start_video_segment(&mut self, timestamp: Micros) {
        self.segment.video_start_time = timestamp;
        self.segment.video_stop_time = timestamp;
        self.segment.video_last_timestamp = timestamp;
        self.segment.video_started = true;
        self.segment.maybe_start_running();
    }

    /// First audio input of a segment: latch start time and flip the waiting flag.
    pub fn start_audio_segment(&mut self, timestamp: Micros) {
        self.segment.audio_start_time = timestamp;
        self.segment.audio_stop_time = timestamp;
        self.segment.audio_last_timestamp = timestamp;
        self.segment.audio_started = true;
        self.audio_queue.set_head_timestamp(timestamp);
        self.segment.maybe_start_running();
    }

    /// `GetTotalTime`: accumulated completed-segment duration plus the live segment's span so far.
    pub fn total_time(&self) -> Micros {
        let live = self
            .segment
            .window()
            .map(|(start, stop)| (stop - start).max(0))
            .unwrap_or(0);
        self.time_offset + live
    }

    /// `NewSegment`: idempotent against an empty segment. Returns the duration (microseconds) of
    /// the segment being closed, if one actually had data, so the caller (which owns the emit
    /// worker's drain) knows how much to add to `time_offset` once draining finishes.
    pub fn begin_new_segment(&mut self) -> bool {
        if !self.segment.has_data() {
            return false;
        }
        self.segment.phase = SegmentPhase::Draining;
        true
    }

    /// Called by the emit worker once a draining segment has been fully flushed: folds the
    /// segment's duration into `time_offset`, clears both buffers and drift state, and opens a
    /// fresh Waiting segment.
    pub fn close_draining_segment(&mut self) {
        if let Some((start, stop)) = self.segment.window() {
            self.time_offset += (stop - start).max(0);
        }
        self.video_queue.clear();
        self.audio_queue.clear();
        self.partial_audio.clear();
        self.drift.reset();
        self.segment = Segment::new(self.config.video_enabled, self.config.audio_enabled);
    }
}

/// Process-wide flags the worker and control surface share lock-free.
pub(crate) struct Flags {
    pub should_stop: Arc<AtomicBool>,
    pub error_occurred: Arc<AtomicBool>,
}

impl Flags {
    pub fn new() -> Self {
        Self {
            should_stop: Arc::new(AtomicBool::new(false)),
            error_occurred: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn stop(&self) {
        self.should_stop.store(true, Ordering::SeqCst);
    }

    pub fn should_stop(&self) -> bool {
        self.should_stop.load(Ordering::SeqCst)
    }

    pub fn set_error(&self) {
        self.error_occurred.store(true, Ordering::SeqCst);
    }

    pub fn has_error(&self) -> bool {
        self.error_occurred.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> SharedState {
        SharedState::new(SyncConfig::default(), 48_000, 4, 960)
    }

    #[test]
    fn test_next_video_timestamp_before_start_is_zero() {
        let s = state();
        assert_eq!(s.next_video_timestamp(), 0);
    }

    #[test]
    fn test_next_video_timestamp_after_start() {
        let mut s = state();
        s.start_video_segment(0);
        let period = s.config.frame_period_us();
        assert_eq!(s.next_video_timestamp(), period);
    }

    #[test]
    fn test_new_segment_idempotent_when_empty() {
        let mut s = state();
        assert!(!s.begin_new_segment());
        assert!(!s.begin_new_segment());
    }

    #[test]
    fn test_new_segment_drains_when_populated() {
        let mut s = state();
        s.start_video_segment(0);
        s.segment.video_stop_time = 1_000_000;
        assert!(s.begin_new_segment());
        assert_eq!(s.segment.phase, SegmentPhase::Draining);
    }

    #[test]
    fn test_close_draining_segment_accumulates_offset() {
        let mut s = state();
        s.start_video_segment(0);
        s.segment.video_stop_time = 1_000_000;
        s.begin_new_segment();
        s.close_draining_segment();
        assert_eq!(s.time_offset, 1_000_000);
        assert_eq!(s.segment.phase, SegmentPhase::WaitingForBothStreams);
    }

    #[test]
    fn test_total_time_before_any_segment() {
        let s = state();
        assert_eq!(s.total_time(), 0);
    }
}

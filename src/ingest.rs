//! Ingest front-end: `ReadVideoFrame`, `ReadAudioSamples`, and their ping/hole cousins.
//!
//! Each call takes the shared lock only for the bookkeeping that needs it, releasing it before the
//! (comparatively expensive) scaler/resampler conversion, then reacquiring it to enqueue the
//! result. The scaler and resampler each have their own mutex and are never touched while the
//! shared lock is held.

use crate::error::{AvSyncError, AvSyncResult};
use crate::sync::Synchronizer;
use crate::types::{Micros, RawAudioBlock, RawVideoFrame};

impl Synchronizer {
    /// `GetNextVideoTimestamp`: earliest timestamp the next video frame may carry.
    pub fn get_next_video_timestamp(&self) -> Micros {
        self.shared.lock().next_video_timestamp()
    }

    /// `ReadVideoFrame`.
    pub fn read_video_frame(&self, raw: RawVideoFrame<'_>) -> AvSyncResult<()> {
        let target = self.video_target.ok_or_else(|| {
            AvSyncError::Misuse("read_video_frame called with video disabled".to_string())
        })?;
        let timestamp = raw.timestamp;

        let (gap_timestamps, last_frame) = {
            let mut state = self.shared.lock();
            if !state.segment.video_started {
                state.start_video_segment(timestamp);
            }
            if timestamp < state.segment.video_last_timestamp {
                log::debug!("[avsync] dropping late video frame at {timestamp}us");
                return Ok(());
            }

            // Charging the delay budget only makes sense for gaps that will actually be filled —
            // with no prior frame there is nothing to duplicate, so skip the whole accounting
            // rather than spend budget on timestamps that read_video_frame below does not enqueue.
            let mut gaps = Vec::new();
            if state.last_video_frame.is_some() {
                let frame_period = state.config.frame_period_us();
                let max_delay = state.config.max_frame_delay as i64;
                // Invariant: video_accumulated_delay <= MAX_FRAME_DELAY * video_pts, with one
                // frame period of headroom so the very first gap (before any frame has reached the
                // encoder and video_pts is still 0) can still be filled.
                let delay_budget_us = frame_period * max_delay * (state.video_pts as i64 + 1);
                if timestamp - state.segment.video_last_timestamp > 2 * frame_period {
                    let mut t = state.segment.video_last_timestamp + frame_period;
                    while t < timestamp
                        && state.segment.video_accumulated_delay + frame_period <= delay_budget_us
                    {
                        gaps.push(t);
                        state.segment.video_accumulated_delay += frame_period;
                        t += frame_period;
                    }
                }
            }
            (gaps, state.last_video_frame.clone())
        };

        if !gap_timestamps.is_empty() {
            if let Some(last) = &last_frame {
                let mut state = self.shared.lock();
                for ts in gap_timestamps {
                    let dup = last.duplicate_at(ts);
                    let dropped = state.video_queue.push(dup);
                    if dropped && !state.warned_drop_video {
                        state.warned_drop_video = true;
                        log::warn!("[avsync] video queue overflow, dropping oldest frame");
                    }
                }
            }
        }

        let scaled = {
            let mut scaler = self.scaler.lock();
            scaler.scale(&raw, target.format, target.width, target.height)?
        };

        let mut state = self.shared.lock();
        let dropped = state.video_queue.push(scaled.clone());
        if dropped && !state.warned_drop_video {
            state.warned_drop_video = true;
            log::warn!("[avsync] video queue overflow, dropping oldest frame");
        }
        state.last_video_frame = Some(scaled);
        state.segment.video_last_timestamp = timestamp;
        state.segment.video_stop_time = state.segment.video_stop_time.max(timestamp);
        drop(state);
        self.condvar.notify_all();
        Ok(())
    }

    /// `ReadVideoPing`: advances the video clock without enqueuing a frame.
    pub fn read_video_ping(&self, timestamp: Micros) {
        let mut state = self.shared.lock();
        if !state.segment.video_started {
            state.start_video_segment(timestamp);
        }
        state.segment.video_stop_time = state.segment.video_stop_time.max(timestamp);
        drop(state);
        self.condvar.notify_all();
    }

    /// `ReadAudioSamples`.
    pub fn read_audio_samples(&self, raw: RawAudioBlock<'_>) -> AvSyncResult<()> {
        let target = self.audio_target.ok_or_else(|| {
            AvSyncError::Misuse("read_audio_samples called with audio disabled".to_string())
        })?;
        let timestamp = raw.timestamp;

        let target_rate = {
            let mut state = self.shared.lock();
            if !state.segment.audio_started {
                state.start_audio_segment(timestamp);
            }

            let expected = state.segment.audio_start_time
                + (state.segment.audio_samples_read as i64 * 1_000_000) / target.sample_rate.max(1) as i64;
            let measured_desync_secs = (timestamp - expected) as f64 / 1_000_000.0;
            let dt_secs = raw.sample_count as f64 / raw.sample_rate.max(1) as f64;
            let config = state.config.clone();
            let (_desync, exceeded) = state.drift.update(measured_desync_secs, dt_secs, &config);
            if exceeded && !state.warned_desync {
                state.warned_desync = true;
                log::warn!("[avsync] audio/video desync exceeded threshold");
            }
            state.drift.target_sample_rate(target.sample_rate)
        };

        let resampled = {
            let mut resampler = self.resampler.lock();
            resampler.resample(&raw, target_rate, target.channels, target.format)?
        };

        let mut state = self.shared.lock();
        let dropped = state.audio_queue.push(&resampled);
        if dropped > 0 {
            state.segment.audio_samples_read += dropped as u64;
        }
        state.segment.audio_last_timestamp = timestamp;
        state.segment.audio_stop_time = state.segment.audio_stop_time.max(timestamp);
        drop(state);
        self.condvar.notify_all();
        Ok(())
    }

    /// `ReadAudioHole`: audio source lost data of unknown size.
    ///
    /// Per design notes: if the segment hasn't emitted any audio yet (`audio_can_drop` still
    /// true) and nothing is buffered (`set_head_timestamp` is only valid on an empty buffer),
    /// this realigns the next sample to the current video position rather than guessing a
    /// silence length; otherwise it only bumps the anomaly-style diagnostics — see
    /// `audio_hole_count`.
    pub fn read_audio_hole(&self) {
        let mut state = self.shared.lock();
        if state.segment.audio_can_drop && state.segment.video_started && state.audio_queue.is_empty() {
            let realign_to = state.segment.video_stop_time.max(state.segment.audio_stop_time);
            state.audio_queue.set_head_timestamp(realign_to);
            state.segment.audio_stop_time = realign_to;
            log::debug!("[avsync] audio hole realigned to video position {realign_to}us");
        } else {
            log::debug!("[avsync] audio hole observed, no realign (audio already committed)");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::error::AvSyncResult;
    use crate::traits::{AudioEncoder, AudioResampler, PixelScaler, VideoEncoder};
    use crate::types::{PixelFormat, SampleFormat, VideoFrame};
    use std::sync::Arc;

    struct NopScaler;
    impl PixelScaler for NopScaler {
        fn scale(
            &mut self,
            frame: &RawVideoFrame<'_>,
            target_format: PixelFormat,
            target_width: u32,
            target_height: u32,
        ) -> AvSyncResult<VideoFrame> {
            Ok(VideoFrame {
                timestamp: frame.timestamp,
                width: target_width,
                height: target_height,
                stride: target_width as usize * 4,
                pixel_format: target_format,
                data: Arc::new(frame.data.to_vec()),
            })
        }
    }

    struct NopResampler;
    impl AudioResampler for NopResampler {
        fn resample(
            &mut self,
            block: &RawAudioBlock<'_>,
            _target_sample_rate: u32,
            _target_channels: u16,
            _target_format: SampleFormat,
        ) -> AvSyncResult<Vec<u8>> {
            Ok(block.data.to_vec())
        }
    }

    struct CountingVideoEncoder {
        count: Arc<std::sync::atomic::AtomicU64>,
    }
    impl VideoEncoder for CountingVideoEncoder {
        fn required_pixel_format(&self) -> PixelFormat {
            PixelFormat::Rgba8
        }
        fn required_dimensions(&self) -> (u32, u32) {
            (4, 4)
        }
        fn encode_frame(&mut self, _frame: crate::traits::EncoderVideoFrame<'_>) -> AvSyncResult<()> {
            self.count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    struct CountingAudioEncoder {
        count: Arc<std::sync::atomic::AtomicU64>,
        frame_size: usize,
    }
    impl AudioEncoder for CountingAudioEncoder {
        fn required_sample_rate(&self) -> u32 {
            48_000
        }
        fn required_channels(&self) -> u16 {
            1
        }
        fn required_sample_format(&self) -> SampleFormat {
            SampleFormat::I16
        }
        fn required_frame_size(&self) -> usize {
            self.frame_size
        }
        fn encode_frame(&mut self, _data: &[u8]) -> AvSyncResult<()> {
            self.count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    fn make_sync(video_frame_rate: f64) -> Synchronizer {
        let config = SyncConfig {
            frame_rate: video_frame_rate,
            ..Default::default()
        };
        let video_count = Arc::new(std::sync::atomic::AtomicU64::new(0));
        let audio_count = Arc::new(std::sync::atomic::AtomicU64::new(0));
        Synchronizer::new(
            config,
            Box::new(NopScaler),
            Box::new(NopResampler),
            Some(Box::new(CountingVideoEncoder { count: video_count })),
            Some(Box::new(CountingAudioEncoder {
                count: audio_count,
                frame_size: 480,
            })),
        )
        .unwrap()
    }

    #[test]
    fn test_get_next_video_timestamp_starts_at_zero() {
        let sync = make_sync(30.0);
        assert_eq!(sync.get_next_video_timestamp(), 0);
    }

    #[test]
    fn test_read_video_frame_disabled_errors() {
        let config = SyncConfig {
            video_enabled: false,
            ..Default::default()
        };
        let audio_count = Arc::new(std::sync::atomic::AtomicU64::new(0));
        let sync = Synchronizer::new(
            config,
            Box::new(NopScaler),
            Box::new(NopResampler),
            None,
            Some(Box::new(CountingAudioEncoder {
                count: audio_count,
                frame_size: 480,
            })),
        )
        .unwrap();
        let data = [0u8; 16];
        let raw = RawVideoFrame {
            width: 4,
            height: 4,
            stride: 16,
            pixel_format: PixelFormat::Rgba8,
            data: &data,
            timestamp: 0,
        };
        assert!(sync.read_video_frame(raw).is_err());
    }

    #[test]
    fn test_read_video_frame_updates_next_timestamp() {
        let sync = make_sync(30.0);
        let data = [0u8; 64];
        let raw = RawVideoFrame {
            width: 4,
            height: 4,
            stride: 16,
            pixel_format: PixelFormat::Rgba8,
            data: &data,
            timestamp: 0,
        };
        sync.read_video_frame(raw).unwrap();
        let period = sync.config.frame_period_us();
        assert_eq!(sync.get_next_video_timestamp(), period);
    }

    #[test]
    fn test_read_audio_samples_accepts_first_block() {
        let sync = make_sync(30.0);
        let data = [0u8; 960];
        let raw = RawAudioBlock {
            sample_rate: 48_000,
            channels: 1,
            sample_count: 480,
            format: SampleFormat::I16,
            data: &data,
            timestamp: 0,
        };
        assert!(sync.read_audio_samples(raw).is_ok());
    }
}

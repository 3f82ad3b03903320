//! Bounded ring buffers for the two media queues.
//!
//! The video ring buffer owns a queue of complete frames; the audio ring buffer is a logical byte
//! FIFO with a single anchor timestamp, since tracking one timestamp per sample would be wasted
//! work — every other sample's wall-clock position is derived from the anchor plus a sample count.

use std::collections::VecDeque;

use crate::types::{Micros, VideoFrame};

/// Queue of owned, scaled video frames awaiting emission.
pub(crate) struct VideoRingBuffer {
    frames: VecDeque<VideoFrame>,
    max_len: usize,
}

impl VideoRingBuffer {
    pub fn new(max_len: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(max_len.min(256)),
            max_len,
        }
    }

    /// Push a frame onto the tail. Returns `true` if an oldest frame had to be dropped to make
    /// room.
    pub fn push(&mut self, frame: VideoFrame) -> bool {
        let dropped = if self.frames.len() >= self.max_len {
            self.frames.pop_front();
            true
        } else {
            false
        };
        self.frames.push_back(frame);
        dropped
    }

    pub fn front(&self) -> Option<&VideoFrame> {
        self.frames.front()
    }

    pub fn pop_front(&mut self) -> Option<VideoFrame> {
        self.frames.pop_front()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

/// Byte FIFO of interleaved PCM samples, anchored to wall-clock by a single head timestamp.
///
/// Trailing samples are positioned by `head_timestamp + samples_consumed / sample_rate`; only the
/// head timestamp is ever stored.
pub(crate) struct AudioRingBuffer {
    data: VecDeque<u8>,
    /// Wall-clock timestamp of the oldest sample currently in `data`.
    head_timestamp: Micros,
    /// Bytes making up one multi-channel sample (sample_size × channels).
    frame_bytes: usize,
    sample_rate: u32,
    max_samples: usize,
}

impl AudioRingBuffer {
    pub fn new(sample_rate: u32, frame_bytes: usize, max_samples: usize) -> Self {
        Self {
            data: VecDeque::new(),
            head_timestamp: 0,
            frame_bytes: frame_bytes.max(1),
            sample_rate,
            max_samples,
        }
    }

    /// Number of whole samples currently buffered.
    pub fn len_samples(&self) -> usize {
        self.data.len() / self.frame_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Timestamp of the oldest buffered sample.
    pub fn head_timestamp(&self) -> Micros {
        self.head_timestamp
    }

    /// Set the anchor timestamp. Only valid when the buffer is empty (first push of a segment, or
    /// after a full drain).
    pub fn set_head_timestamp(&mut self, timestamp: Micros) {
        self.head_timestamp = timestamp;
    }

    /// Append bytes to the tail. If this is the first data since the buffer went empty, the caller
    /// must have already called `set_head_timestamp`.
    ///
    /// Returns the number of samples dropped from the head to respect `max_samples`.
    pub fn push(&mut self, bytes: &[u8]) -> usize {
        self.data.extend(bytes.iter().copied());
        let max_bytes = self.max_samples * self.frame_bytes;
        let mut dropped_samples = 0;
        while self.data.len() > max_bytes {
            for _ in 0..self.frame_bytes {
                self.data.pop_front();
            }
            dropped_samples += 1;
        }
        if dropped_samples > 0 {
            self.head_timestamp +=
                (dropped_samples as i64 * 1_000_000) / self.sample_rate.max(1) as i64;
        }
        dropped_samples
    }

    /// Remove `count` samples from the head without returning them (used to trim leading audio to
    /// align with video start). Advances the head timestamp accordingly.
    pub fn drop_head_samples(&mut self, count: usize) -> usize {
        let available = self.len_samples();
        let count = count.min(available);
        for _ in 0..(count * self.frame_bytes) {
            self.data.pop_front();
        }
        self.head_timestamp += (count as i64 * 1_000_000) / self.sample_rate.max(1) as i64;
        count
    }

    /// Pop up to `count` samples from the head, returning the raw bytes. Advances the head
    /// timestamp. Returns fewer samples than requested if the buffer is short.
    pub fn pop_samples(&mut self, count: usize) -> Vec<u8> {
        let available = self.len_samples();
        let count = count.min(available);
        let mut out = Vec::with_capacity(count * self.frame_bytes);
        for _ in 0..(count * self.frame_bytes) {
            if let Some(b) = self.data.pop_front() {
                out.push(b);
            }
        }
        self.head_timestamp += (count as i64 * 1_000_000) / self.sample_rate.max(1) as i64;
        out
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.head_timestamp = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PixelFormat;
    use std::sync::Arc;

    fn frame(timestamp: Micros) -> VideoFrame {
        VideoFrame {
            timestamp,
            width: 4,
            height: 4,
            stride: 16,
            pixel_format: PixelFormat::Rgba8,
            data: Arc::new(vec![0u8; 64]),
        }
    }

    #[test]
    fn test_video_ring_drops_oldest_on_overflow() {
        let mut ring = VideoRingBuffer::new(2);
        assert!(!ring.push(frame(0)));
        assert!(!ring.push(frame(1000)));
        assert!(ring.push(frame(2000)));
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.front().unwrap().timestamp, 1000);
    }

    #[test]
    fn test_audio_ring_push_and_pop() {
        let mut ring = AudioRingBuffer::new(48_000, 4, 48_000 * 30);
        ring.set_head_timestamp(0);
        ring.push(&[0u8; 4 * 100]);
        assert_eq!(ring.len_samples(), 100);

        let popped = ring.pop_samples(40);
        assert_eq!(popped.len(), 40 * 4);
        assert_eq!(ring.len_samples(), 60);
        assert_eq!(ring.head_timestamp(), (40 * 1_000_000) / 48_000);
    }

    #[test]
    fn test_audio_ring_overflow_drops_head() {
        let mut ring = AudioRingBuffer::new(48_000, 4, 10);
        ring.set_head_timestamp(0);
        let dropped = ring.push(&vec![0u8; 4 * 15]);
        assert_eq!(dropped, 5);
        assert_eq!(ring.len_samples(), 10);
        assert!(ring.head_timestamp() > 0);
    }

    #[test]
    fn test_audio_ring_drop_head_samples() {
        let mut ring = AudioRingBuffer::new(48_000, 4, 48_000 * 30);
        ring.set_head_timestamp(1_000);
        ring.push(&vec![0u8; 4 * 50]);
        let dropped = ring.drop_head_samples(20);
        assert_eq!(dropped, 20);
        assert_eq!(ring.len_samples(), 30);
    }
}

//! Shared value types for the synchronizer core.

use std::sync::Arc;

/// Wall-clock / output-stream timestamp, in microseconds.
pub type Micros = i64;

/// Raw pixel layout a video frame is carried in.
///
/// The synchronizer treats these as opaque tags; the [`PixelScaler`](crate::traits::PixelScaler)
/// collaborator is the only thing that interprets the bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8,
    Bgra8,
    Nv12,
    Yuv420p,
}

/// Raw PCM sample layout an audio block is carried in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    I16,
    F32,
}

impl SampleFormat {
    /// Size in bytes of a single sample in this format.
    pub fn sample_size(self) -> usize {
        match self {
            SampleFormat::I16 => 2,
            SampleFormat::F32 => 4,
        }
    }
}

/// An owned video frame sitting in the ring buffer, or about to be handed to
/// `last_video_frame` for gap duplication.
///
/// `data` is `Arc`-shared rather than cloned on duplication: the worker clones the handle, never
/// the bytes, when padding a gap.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub timestamp: Micros,
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub pixel_format: PixelFormat,
    pub data: Arc<Vec<u8>>,
}

impl VideoFrame {
    pub fn duplicate_at(&self, timestamp: Micros) -> VideoFrame {
        VideoFrame {
            timestamp,
            width: self.width,
            height: self.height,
            stride: self.stride,
            pixel_format: self.pixel_format,
            data: Arc::clone(&self.data),
        }
    }
}

/// A borrowed raw video frame as handed in by the capture source, before the scaler converts it.
pub struct RawVideoFrame<'a> {
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub pixel_format: PixelFormat,
    pub data: &'a [u8],
    pub timestamp: Micros,
}

/// A borrowed raw audio block as handed in by the capture source, before the resampler converts
/// it.
pub struct RawAudioBlock<'a> {
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_count: usize,
    pub format: SampleFormat,
    pub data: &'a [u8],
    pub timestamp: Micros,
}

//! Collaborator interfaces the core consumes.
//!
//! Capture sources, encoders, the pixel scaler and the audio resampler are all external to this
//! crate; it only ever sees them through these traits. A host wires in real implementations
//! (libavcodec-backed encoders, a swscale-style scaler, a libswresample-style resampler); tests in
//! this crate wire in fakes that just record calls.

use crate::error::AvSyncResult;
use crate::types::{PixelFormat, RawAudioBlock, SampleFormat, VideoFrame};

/// A fully decoded/converted video frame in the encoder's required pixel format, ready to encode.
pub struct EncoderVideoFrame<'a> {
    pub timestamp: crate::types::Micros,
    pub data: &'a [u8],
    pub stride: usize,
}

/// Downstream video encoder. Owned exclusively by the emit worker thread; never touched by a
/// producer thread.
pub trait VideoEncoder: Send {
    /// Pixel format frames must already be converted to before `encode_frame` is called.
    fn required_pixel_format(&self) -> PixelFormat;

    /// Output dimensions frames must already be scaled to.
    fn required_dimensions(&self) -> (u32, u32);

    /// Hand one frame to the encoder. Called outside every lock the synchronizer holds.
    fn encode_frame(&mut self, frame: EncoderVideoFrame<'_>) -> AvSyncResult<()>;
}

/// Downstream audio encoder. Owned exclusively by the emit worker thread.
pub trait AudioEncoder: Send {
    fn required_sample_rate(&self) -> u32;
    fn required_channels(&self) -> u16;
    fn required_sample_format(&self) -> SampleFormat;

    /// Number of samples (per channel) every call to `encode_frame` must carry, exactly.
    fn required_frame_size(&self) -> usize;

    /// Hand one exact-size frame to the encoder. `data` is
    /// `required_frame_size * required_channels * sample_size` bytes.
    fn encode_frame(&mut self, data: &[u8]) -> AvSyncResult<()>;
}

/// Pixel-format / dimension scaler. Stateful (cached conversion context), so it lives behind its
/// own mutex rather than the shared-state one — it is driven from the video producer thread while
/// the shared-state mutex is also being taken by the audio producer and the worker.
pub trait PixelScaler: Send {
    fn scale(
        &mut self,
        frame: &crate::types::RawVideoFrame<'_>,
        target_format: PixelFormat,
        target_width: u32,
        target_height: u32,
    ) -> AvSyncResult<VideoFrame>;
}

/// Audio resampler. Stateful for the same reason as the scaler, and lives behind its own mutex.
///
/// `target_sample_rate` is the drift-corrected rate computed by the
/// [`DriftEstimator`](crate::drift::DriftEstimator); resampling to a perturbed rate rather than
/// perturbing the resampler's internal ratio keeps the resampler itself oblivious to drift
/// correction (see design notes on resampler drift control).
pub trait AudioResampler: Send {
    fn resample(
        &mut self,
        block: &RawAudioBlock<'_>,
        target_sample_rate: u32,
        target_channels: u16,
        target_format: SampleFormat,
    ) -> AvSyncResult<Vec<u8>>;
}

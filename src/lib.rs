//! Real-time audio/video synchronizer core.
//!
//! Ingests independently timestamped video frames and audio sample blocks from capture sources
//! whose wall clocks drift relative to each other, corrects that drift with a PI controller driving
//! the audio resample target rate, and hands an aligned stream to an encoder pair on a dedicated
//! background thread. Supports multi-segment recordings (pause/resume) with a continuous output
//! timeline.
//!
//! A caller supplies the four collaborators — [`VideoEncoder`], [`AudioEncoder`], [`PixelScaler`],
//! [`AudioResampler`] — and drives ingest from its own capture threads via
//! [`Synchronizer::read_video_frame`] / [`Synchronizer::read_audio_samples`] and friends.

mod config;
mod drift;
mod emit;
mod error;
mod ingest;
mod ring_buffer;
mod segment;
mod shared;
mod sync;
mod traits;
mod types;

pub use config::SyncConfig;
pub use error::{AvSyncError, AvSyncResult};
pub use sync::Synchronizer;
pub use traits::{AudioEncoder, AudioResampler, EncoderVideoFrame, PixelScaler, VideoEncoder};
pub use types::{Micros, PixelFormat, RawAudioBlock, RawVideoFrame, SampleFormat, VideoFrame};

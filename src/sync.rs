//! The synchronizer's public surface: construction, the control surface (`new_segment`,
//! `total_time_us`, `has_error_occurred`), and teardown.

use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

use crate::config::SyncConfig;
use crate::emit;
use crate::error::{AvSyncError, AvSyncResult};
use crate::shared::{Flags, SharedState};
use crate::traits::{AudioEncoder, AudioResampler, PixelScaler, VideoEncoder};
use crate::types::{Micros, PixelFormat, SampleFormat};

/// Target pixel format/dimensions the scaler must produce, captured at construction from the
/// video encoder before it's moved into the emit worker thread.
#[derive(Clone, Copy)]
pub(crate) struct VideoTarget {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
}

/// Target sample format the resampler must produce, captured the same way.
#[derive(Clone, Copy)]
pub(crate) struct AudioTarget {
    pub sample_rate: u32,
    pub channels: u16,
    pub format: SampleFormat,
}

/// Real-time A/V synchronizer core.
///
/// Owns the shared-state mutex, the scaler and resampler mutexes (held independently per the
/// three-lock model), and a dedicated emit worker thread that is started on construction and
/// joined on drop.
pub struct Synchronizer {
    pub(crate) shared: Arc<Mutex<SharedState>>,
    pub(crate) condvar: Arc<Condvar>,
    pub(crate) scaler: Arc<Mutex<Box<dyn PixelScaler>>>,
    pub(crate) resampler: Arc<Mutex<Box<dyn AudioResampler>>>,
    pub(crate) flags: Arc<Flags>,
    pub(crate) config: SyncConfig,
    pub(crate) video_target: Option<VideoTarget>,
    pub(crate) audio_target: Option<AudioTarget>,
    worker: Option<JoinHandle<()>>,
}

impl Synchronizer {
    /// Construct a synchronizer. `video_encoder`/`audio_encoder` are `None` to disable that
    /// stream entirely (both the corresponding config flag and the encoder option must agree;
    /// mismatches are a construction error).
    pub fn new(
        mut config: SyncConfig,
        scaler: Box<dyn PixelScaler>,
        resampler: Box<dyn AudioResampler>,
        video_encoder: Option<Box<dyn VideoEncoder>>,
        audio_encoder: Option<Box<dyn AudioEncoder>>,
    ) -> AvSyncResult<Self> {
        config.validate();
        if config.video_enabled != video_encoder.is_some() {
            return Err(AvSyncError::FormatMismatch(
                "video_enabled flag disagrees with the presence of a video encoder".to_string(),
            ));
        }
        if config.audio_enabled != audio_encoder.is_some() {
            return Err(AvSyncError::FormatMismatch(
                "audio_enabled flag disagrees with the presence of an audio encoder".to_string(),
            ));
        }

        let (sample_rate, frame_bytes, required_frame_size) = match &audio_encoder {
            Some(enc) => (
                enc.required_sample_rate(),
                enc.required_sample_format().sample_size() * enc.required_channels() as usize,
                enc.required_frame_size(),
            ),
            None => (48_000, 4, 960),
        };
        // Only rescale the audio buffer cap when the caller left it at the default (sized for
        // 48kHz); an explicit value is a deliberate memory bound and must not be overridden.
        if audio_encoder.is_some()
            && config.max_audio_samples_buffered == SyncConfig::default().max_audio_samples_buffered
        {
            config = config.with_audio_sample_rate(sample_rate);
        }

        let video_target = video_encoder.as_ref().map(|enc| {
            let (width, height) = enc.required_dimensions();
            VideoTarget {
                format: enc.required_pixel_format(),
                width,
                height,
            }
        });
        let audio_target = audio_encoder.as_ref().map(|enc| AudioTarget {
            sample_rate: enc.required_sample_rate(),
            channels: enc.required_channels(),
            format: enc.required_sample_format(),
        });

        let shared = Arc::new(Mutex::new(SharedState::new(
            config.clone(),
            sample_rate,
            frame_bytes,
            required_frame_size,
        )));
        let condvar = Arc::new(Condvar::new());
        let flags = Arc::new(Flags::new());
        let scaler = Arc::new(Mutex::new(scaler));
        let resampler = Arc::new(Mutex::new(resampler));

        let worker = emit::spawn_worker(
            Arc::clone(&shared),
            Arc::clone(&condvar),
            Arc::clone(&flags),
            video_encoder,
            audio_encoder,
        );

        Ok(Self {
            shared,
            condvar,
            scaler,
            resampler,
            flags,
            config,
            video_target,
            audio_target,
            worker: Some(worker),
        })
    }

    /// Close the current segment if it has data, and begin a new one. No-op if the current segment
    /// is empty (idempotent).
    pub fn new_segment(&self) {
        let began = {
            let mut state = self.shared.lock();
            state.begin_new_segment()
        };
        if began {
            log::debug!("[avsync] segment marked for draining");
            self.condvar.notify_all();
        }
    }

    /// Total output-stream duration so far, microseconds.
    pub fn total_time_us(&self) -> Micros {
        self.shared.lock().total_time()
    }

    /// Whether the emit worker has hit a fatal encoder error and stopped.
    pub fn has_error_occurred(&self) -> bool {
        self.flags.has_error()
    }
}

impl Drop for Synchronizer {
    fn drop(&mut self) {
        self.flags.stop();
        self.condvar.notify_all();
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

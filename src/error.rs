//! Error type for the synchronizer core.

use thiserror::Error;

/// Errors the synchronizer can report synchronously to a caller.
///
/// Encoder failures observed *inside* the emit worker never unwind across the thread boundary;
/// they are latched into `error_occurred` (see [`crate::Synchronizer::has_error_occurred`]) and
/// surfaced here only when a caller subsequently tries to drive the synchronizer further.
#[derive(Error, Debug)]
pub enum AvSyncError {
    /// Operation attempted after the synchronizer (or its worker) has stopped.
    #[error("synchronizer misuse: {0}")]
    Misuse(String),

    /// Constructed with an encoder pair whose declared formats are internally inconsistent.
    #[error("encoder format mismatch: {0}")]
    FormatMismatch(String),

    /// Internal invariant violation reported by a collaborator.
    #[error("shared state lock poisoned: {context}")]
    LockPoisoned { context: String },

    /// Video encoder rejected a frame.
    #[error("video encoder failed: {0}")]
    VideoEncoderFailed(String),

    /// Audio encoder rejected a frame.
    #[error("audio encoder failed: {0}")]
    AudioEncoderFailed(String),

    /// Pixel scaler could not convert a frame.
    #[error("pixel scaler failed: {0}")]
    ScalerFailed(String),

    /// Audio resampler could not convert a block.
    #[error("audio resampler failed: {0}")]
    ResamplerFailed(String),
}

pub type AvSyncResult<T> = Result<T, AvSyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AvSyncError::Misuse("segment already closed".to_string());
        assert_eq!(err.to_string(), "synchronizer misuse: segment already closed");
    }

    #[test]
    fn test_lock_poisoned_display() {
        let err = AvSyncError::LockPoisoned {
            context: "shared".to_string(),
        };
        assert_eq!(err.to_string(), "shared state lock poisoned: shared");
    }
}

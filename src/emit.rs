//! Emit worker: the background thread that drains both ring buffers into the encoders.
//!
//! Every encoder call happens with the shared lock released — each loop iteration here locks just
//! long enough to decide the next unit of work (drop / duplicate / emit a frame, drop / pull / emit
//! an audio block), releases the lock, calls the encoder, then reacquires the lock only to commit
//! the counters the call succeeded under.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::error::AvSyncResult;
use crate::segment::SegmentPhase;
use crate::shared::{Flags, SharedState};
use crate::traits::{AudioEncoder, EncoderVideoFrame, VideoEncoder};
use crate::types::{Micros, VideoFrame};

const WORKER_WAIT_TIMEOUT: Duration = Duration::from_millis(50);

pub(crate) fn spawn_worker(
    shared: Arc<Mutex<SharedState>>,
    condvar: Arc<Condvar>,
    flags: Arc<Flags>,
    video_encoder: Option<Box<dyn VideoEncoder>>,
    audio_encoder: Option<Box<dyn AudioEncoder>>,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("avsync-emit".to_string())
        .spawn(move || run(shared, condvar, flags, video_encoder, audio_encoder))
        .expect("failed to spawn emit worker thread")
}

fn run(
    shared: Arc<Mutex<SharedState>>,
    condvar: Arc<Condvar>,
    flags: Arc<Flags>,
    mut video_encoder: Option<Box<dyn VideoEncoder>>,
    mut audio_encoder: Option<Box<dyn AudioEncoder>>,
) {
    loop {
        if flags.should_stop() {
            return;
        }

        let window = {
            let mut state = shared.lock();
            loop {
                if flags.should_stop() {
                    return;
                }
                let ready_phase = matches!(
                    state.segment.phase,
                    SegmentPhase::Running | SegmentPhase::Draining
                );
                if ready_phase {
                    if let Some((segment_start, segment_stop)) = state.segment.window() {
                        let safety_margin = state.config.frame_period_us();
                        if segment_stop > segment_start + safety_margin {
                            break Some((segment_start, segment_stop));
                        }
                    }
                }
                condvar.wait_for(&mut state, WORKER_WAIT_TIMEOUT);
                if flags.should_stop() {
                    return;
                }
            }
        };

        let Some((segment_start, segment_stop)) = window else {
            continue;
        };

        let mut flush_err = None;
        if let Some(encoder) = &mut video_encoder {
            if let Err(err) = flush_video(&shared, encoder.as_mut(), segment_stop) {
                flush_err = Some(err);
            }
        }
        if flush_err.is_none() {
            if let Some(encoder) = &mut audio_encoder {
                if let Err(err) = flush_audio(&shared, encoder.as_mut(), segment_start, segment_stop) {
                    flush_err = Some(err);
                }
            }
        }

        if let Some(err) = flush_err {
            log::error!("[avsync] emit worker stopping on encoder failure: {err}");
            flags.set_error();
            return;
        }

        let audio_ref: Option<&mut dyn AudioEncoder> = match &mut audio_encoder {
            Some(encoder) => Some(encoder.as_mut()),
            None => None,
        };
        if let Err(err) = maybe_close_segment(&shared, audio_ref, segment_stop) {
            log::error!("[avsync] emit worker stopping on encoder failure: {err}");
            flags.set_error();
            return;
        }
    }
}

/// If the segment is draining and both buffers are empty through `segment_stop`, pad any partial
/// audio frame out to `required_frame_size` with silence and flush it, then fold the segment's
/// duration into `time_offset` and open a fresh segment.
///
/// Audio that trails past `segment_stop` (the common case when the audio stream ran even
/// slightly longer than video) is left buffered for the next segment rather than treated as
/// undrained — only samples inside the window count.
fn maybe_close_segment(
    shared: &Mutex<SharedState>,
    audio_encoder: Option<&mut dyn AudioEncoder>,
    segment_stop: Micros,
) -> AvSyncResult<()> {
    let mut state = shared.lock();
    if state.segment.phase != SegmentPhase::Draining {
        return Ok(());
    }
    let video_drained = state
        .video_queue
        .front()
        .map(|f| f.timestamp > segment_stop)
        .unwrap_or(true);
    let audio_drained = audio_available_in_window(&state, segment_stop) + state.partial_audio.samples
        < state.required_frame_size;
    if !(video_drained && audio_drained) {
        return Ok(());
    }

    // Pull in any real samples still sitting in the ring buffer within the window before padding,
    // so genuine trailing audio is encoded rather than discarded by `close_draining_segment`'s
    // `audio_queue.clear()` below.
    if state.partial_audio.samples < state.required_frame_size {
        let available = audio_available_in_window(&state, segment_stop);
        if available > 0 {
            let need = (state.required_frame_size - state.partial_audio.samples).min(available);
            let popped = state.audio_queue.pop_samples(need);
            state.segment.audio_samples_read += need as u64;
            state.partial_audio.data.extend_from_slice(&popped);
            state.partial_audio.samples += need;
        }
    }

    // Pad whatever remains out to `required_frame_size` with silence so audio ends flush with
    // video at the segment boundary instead of dropping up to one frame of tail audio.
    if let Some(encoder) = audio_encoder {
        if state.partial_audio.samples > 0 && state.partial_audio.samples < state.required_frame_size {
            let missing = state.required_frame_size - state.partial_audio.samples;
            let pad_bytes = missing * state.audio_frame_bytes;
            let new_len = state.partial_audio.data.len() + pad_bytes;
            state.partial_audio.data.resize(new_len, 0);
            state.partial_audio.samples = state.required_frame_size;
            let bytes = std::mem::take(&mut state.partial_audio.data);
            let required = state.required_frame_size;
            drop(state);
            encoder.encode_frame(&bytes)?;
            state = shared.lock();
            state.partial_audio.samples = 0;
            state.audio_samples += required as u64;
        }
    }

    state.close_draining_segment();
    Ok(())
}

/// Samples currently buffered whose wall-clock position falls at or before `segment_stop`.
fn audio_available_in_window(state: &SharedState, segment_stop: Micros) -> usize {
    let head_ts = state.audio_queue.head_timestamp();
    if head_ts > segment_stop {
        return 0;
    }
    let by_time = (((segment_stop - head_ts) * state.audio_sample_rate as i64) / 1_000_000).max(0) as usize;
    by_time.min(state.audio_queue.len_samples())
}

enum VideoAction {
    Drop,
    Duplicate(VideoFrame),
    Emit(VideoFrame),
}

fn target_video_pts(state: &SharedState, frame_timestamp: Micros) -> i64 {
    let relative = (frame_timestamp - state.segment.video_start_time + state.time_offset) as f64;
    (relative * state.config.frame_rate / 1_000_000.0).round() as i64
}

fn flush_video(
    shared: &Mutex<SharedState>,
    encoder: &mut dyn VideoEncoder,
    segment_stop: Micros,
) -> AvSyncResult<()> {
    let mut duplicated = 0u32;
    loop {
        let action = {
            let mut state = shared.lock();
            let max_delay = state.config.max_frame_delay;
            let allow_skip = state.config.allow_frame_skipping;
            let Some(front_ts) = state.video_queue.front().map(|f| f.timestamp) else {
                return Ok(());
            };
            if front_ts > segment_stop {
                return Ok(());
            }
            let target_pts = target_video_pts(&state, front_ts);
            let video_pts = state.video_pts as i64;
            if target_pts < video_pts {
                if allow_skip {
                    state.video_queue.pop_front();
                    VideoAction::Drop
                } else {
                    return Ok(());
                }
            } else if target_pts > video_pts + 1 && duplicated < max_delay {
                match state.last_video_frame.clone() {
                    Some(last) => VideoAction::Duplicate(last),
                    None => VideoAction::Emit(state.video_queue.pop_front().unwrap()),
                }
            } else {
                VideoAction::Emit(state.video_queue.pop_front().unwrap())
            }
        };

        match action {
            VideoAction::Drop => continue,
            VideoAction::Duplicate(frame) => {
                encoder.encode_frame(EncoderVideoFrame {
                    timestamp: frame.timestamp,
                    data: frame.data.as_slice(),
                    stride: frame.stride,
                })?;
                duplicated += 1;
                let mut state = shared.lock();
                state.video_pts += 1;
                state.last_video_frame = Some(frame);
            }
            VideoAction::Emit(frame) => {
                encoder.encode_frame(EncoderVideoFrame {
                    timestamp: frame.timestamp,
                    data: frame.data.as_slice(),
                    stride: frame.stride,
                })?;
                let mut state = shared.lock();
                state.video_pts += 1;
                state.last_video_frame = Some(frame);
            }
        }
    }
}

fn flush_audio(
    shared: &Mutex<SharedState>,
    encoder: &mut dyn AudioEncoder,
    segment_start: Micros,
    segment_stop: Micros,
) -> AvSyncResult<()> {
    // Trim leading audio to align the first emission with the later of the two stream starts.
    loop {
        let (drop_n, available) = {
            let state = shared.lock();
            if !state.segment.audio_can_drop {
                (0, 0)
            } else {
                let head_ts = state.audio_queue.head_timestamp();
                if head_ts >= segment_start {
                    (0, 0)
                } else {
                    let want = (((segment_start - head_ts) * state.audio_sample_rate as i64)
                        / 1_000_000)
                        .max(0) as usize;
                    (want, state.audio_queue.len_samples())
                }
            }
        };
        if drop_n == 0 {
            let mut state = shared.lock();
            state.segment.audio_can_drop = false;
            break;
        }
        if available == 0 {
            // Nothing buffered yet to trim against a drift-corrected stream that is temporarily
            // producing fewer bytes per real second than the nominal rate assumes; wait for more
            // audio on the next wake instead of spinning with the lock taken and released every
            // iteration. `audio_can_drop` stays set so trimming resumes once data arrives.
            return Ok(());
        }
        let mut state = shared.lock();
        let dropped = state.audio_queue.drop_head_samples(drop_n);
        state.segment.audio_samples_read += dropped as u64;
    }

    loop {
        let required = {
            let state = shared.lock();
            state.required_frame_size
        };

        let ready = {
            let state = shared.lock();
            let need_more = required.saturating_sub(state.partial_audio.samples);
            audio_available_in_window(&state, segment_stop) >= need_more
        };
        if !ready {
            return Ok(());
        }

        let bytes = {
            let mut state = shared.lock();
            let need_more = required - state.partial_audio.samples;
            let popped = state.audio_queue.pop_samples(need_more);
            state.segment.audio_samples_read += need_more as u64;
            state.partial_audio.data.extend_from_slice(&popped);
            state.partial_audio.samples += need_more;
            std::mem::take(&mut state.partial_audio.data)
        };

        encoder.encode_frame(&bytes)?;

        let mut state = shared.lock();
        state.partial_audio.samples = 0;
        state.audio_samples += required as u64;
    }
}

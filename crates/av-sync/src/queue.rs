//! Sample queue between the playback loop and the CPAL callback.
//!
//! The loop pushes interleaved `i16` samples; the real-time callback pops them without
//! blocking. The queue itself is unbounded: the audio consumer keeps its depth near the
//! target fill, so `len_samples` is the depth signal it steers by.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Thread-safe queue of interleaved `i16` samples.
///
/// Samples are stored **interleaved**:
/// `frame0[ch0], frame0[ch1], ..., frame1[ch0], frame1[ch1], ...`
///
/// The `channels` count is fixed for the lifetime of the queue. A `done` flag lives under
/// the same mutex as the samples.
pub struct SampleQueue {
    channels: usize,
    inner: Mutex<QueueInner>,
    low_watermark_samples: usize,
    low_watermark_ms: AtomicU64,
}

struct QueueInner {
    samples: VecDeque<i16>,
    done: bool,
}

impl SampleQueue {
    /// `low_watermark_samples` is the depth below which pops log a (rate limited) warning.
    pub fn new(channels: usize, low_watermark_samples: usize) -> Self {
        Self {
            channels: channels.max(1),
            inner: Mutex::new(QueueInner {
                samples: VecDeque::new(),
                done: false,
            }),
            low_watermark_samples,
            low_watermark_ms: AtomicU64::new(0),
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Current buffered samples (best-effort snapshot).
    pub fn len_samples(&self) -> usize {
        self.lock().samples.len()
    }

    pub fn is_done(&self) -> bool {
        self.lock().done
    }

    /// Mark the queue as finished. Pushes after this are dropped; buffered samples
    /// can still be popped.
    pub fn close(&self) {
        self.lock().done = true;
    }

    /// Append interleaved samples.
    pub fn push_interleaved(&self, samples: &[i16]) {
        let mut g = self.lock();
        if g.done {
            return;
        }
        g.samples.extend(samples.iter().copied());
    }

    /// Return immediately with up to `max_frames` whole frames, or `None` if fewer than
    /// one frame is buffered.
    pub fn pop(&self, max_frames: usize) -> Option<Vec<i16>> {
        let (out, left) = {
            let mut g = self.lock();
            let available_frames = g.samples.len() / self.channels;
            let take_samples = available_frames.min(max_frames) * self.channels;
            if take_samples == 0 {
                return None;
            }
            let out: Vec<i16> = g.samples.drain(..take_samples).collect();
            (out, g.samples.len())
        };
        self.log_low_watermark(left);
        Some(out)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueInner> {
        // Plain samples; a poisoned guard is still consistent.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn log_low_watermark(&self, queued: usize) {
        if queued == 0 || queued >= self.low_watermark_samples {
            return;
        }
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|_| Duration::from_millis(0))
            .as_millis() as u64;
        let last = self.low_watermark_ms.load(Ordering::Relaxed);
        if now.saturating_sub(last) > 1000 {
            self.low_watermark_ms.store(now, Ordering::Relaxed);
            tracing::debug!(
                queued_samples = queued,
                threshold_samples = self.low_watermark_samples,
                "audio queue low watermark"
            );
        }
    }
}

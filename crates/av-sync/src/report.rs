use std::time::Duration;

use crate::audio::AudioStats;
use crate::video::VideoStats;

/// Why the playback loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndReason {
    /// Every stream reached its end and queued audio finished playing.
    Eof,
    /// The event source asked to quit.
    Cancelled,
}

/// Summary of one session run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaybackReport {
    pub end_reason: EndReason,
    /// Running ticks executed.
    pub ticks: u64,
    pub frames_read: u64,
    pub frames_presented: u64,
    pub frames_dropped: u64,
    pub transient_skips: u64,
    pub audio_bytes_enqueued: u64,
    pub audio_enqueue_requests: u64,
    /// Time the wait strategy spent sleeping for early frames.
    pub video_wait: Duration,
    /// Clock reading when the loop terminated.
    pub elapsed: Duration,
}

impl PlaybackReport {
    pub(crate) fn new(
        end_reason: EndReason,
        ticks: u64,
        video: Option<VideoStats>,
        audio: Option<AudioStats>,
        elapsed: Duration,
    ) -> Self {
        let video = video.unwrap_or_default();
        let audio = audio.unwrap_or_default();
        Self {
            end_reason,
            ticks,
            frames_read: video.frames_read,
            frames_presented: video.frames_presented,
            frames_dropped: video.frames_dropped,
            transient_skips: video.transient_skips,
            audio_bytes_enqueued: audio.bytes_enqueued,
            audio_enqueue_requests: audio.enqueue_requests,
            video_wait: video.waited,
            elapsed,
        }
    }

    /// Presented frames per second of playback, when any time has passed.
    pub fn effective_fps(&self) -> Option<f64> {
        let secs = self.elapsed.as_secs_f64();
        (secs > 0.0).then(|| self.frames_presented as f64 / secs)
    }
}

//! Video side of the synchronization engine.
//!
//! [`VideoSyncConsumer`] owns the video source, the single frame buffer and the stream
//! position. Each tick it turns clock time into a frame position using the configured
//! [`SyncStrategy`]:
//!
//! - **Skip to latest**: read (and drop) frames until `frame_index` passes
//!   `floor(elapsed * fps)`, then present only the newest one. Display never lags the
//!   clock; frames are dropped under load.
//! - **Wait then present**: read one frame per tick and, if its timestamp is ahead of the
//!   clock by more than the wait threshold, sleep for the difference before presenting.
//!   No frame is dropped; playback can fall behind under sustained overload.

use std::time::Duration;

use crate::clock::Clock;
use crate::collab::{FrameRead, VideoSource};
use crate::config::SyncStrategy;
use crate::frame::Frame;

/// Counters accumulated across all `advance` calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VideoStats {
    /// Frames successfully read from the source.
    pub frames_read: u64,
    /// Frames handed out for presentation.
    pub frames_presented: u64,
    /// Frames read but overwritten before they could be presented.
    pub frames_dropped: u64,
    /// Reads that failed transiently and were retried on a later tick.
    pub transient_skips: u64,
    /// Time spent waiting for early frames.
    pub waited: Duration,
}

pub struct VideoSyncConsumer {
    source: Box<dyn VideoSource>,
    frame: Frame,
    frame_index: u64,
    done: bool,
    fps: f64,
    strategy: SyncStrategy,
    wait_threshold: Duration,
    stats: VideoStats,
}

impl VideoSyncConsumer {
    pub fn new(
        source: Box<dyn VideoSource>,
        width: u32,
        height: u32,
        fps: f64,
        strategy: SyncStrategy,
        wait_threshold: Duration,
    ) -> Self {
        Self {
            source,
            frame: Frame::new(width, height),
            frame_index: 0,
            done: false,
            fps,
            strategy,
            wait_threshold,
            stats: VideoStats::default(),
        }
    }

    /// Number of frames read so far.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn strategy(&self) -> SyncStrategy {
        self.strategy
    }

    pub fn stats(&self) -> VideoStats {
        self.stats
    }

    /// Frame that should have been read by `elapsed`.
    pub fn expected_frame(&self, elapsed: Duration) -> u64 {
        (elapsed.as_secs_f64() * self.fps).floor() as u64
    }

    /// Advance the stream to `elapsed` and return a frame to present, if a new one was read.
    ///
    /// `clock` is only used to suspend when the wait strategy finds an early frame.
    pub fn advance(&mut self, elapsed: Duration, clock: &dyn Clock) -> Option<&Frame> {
        if self.done {
            return None;
        }
        let presentable = match self.strategy {
            SyncStrategy::SkipToLatest => self.skip_to_latest(elapsed),
            SyncStrategy::WaitThenPresent => self.wait_then_present(elapsed, clock),
        };
        if presentable {
            self.stats.frames_presented += 1;
            Some(&self.frame)
        } else {
            None
        }
    }

    fn skip_to_latest(&mut self, elapsed: Duration) -> bool {
        let expected = self.expected_frame(elapsed);
        let mut read = 0u64;

        while self.frame_index <= expected && !self.done {
            if !self.read_one() {
                break;
            }
            read += 1;
        }

        if read > 1 {
            self.stats.frames_dropped += read - 1;
            tracing::debug!(
                frame_index = self.frame_index,
                expected_frame = expected,
                dropped = read - 1,
                "video caught up"
            );
        }
        read > 0
    }

    fn wait_then_present(&mut self, elapsed: Duration, clock: &dyn Clock) -> bool {
        let index = self.frame_index;
        if !self.read_one() {
            return false;
        }

        let pts = self
            .frame
            .pts
            .unwrap_or_else(|| Duration::from_secs_f64(index as f64 / self.fps));
        let delay = pts.saturating_sub(elapsed);
        if delay > self.wait_threshold {
            tracing::trace!(frame_index = index, delay_ms = delay.as_millis() as u64, "video waiting");
            clock.sleep(delay);
            self.stats.waited += delay;
        }
        true
    }

    /// Read one frame into the owned buffer. `false` when nothing was read.
    fn read_one(&mut self) -> bool {
        match self.source.read_frame(&mut self.frame) {
            Ok(FrameRead::Frame) => {
                self.frame_index += 1;
                self.stats.frames_read += 1;
                true
            }
            Ok(FrameRead::EndOfStream) => {
                self.finish();
                false
            }
            Ok(FrameRead::Skipped) => {
                self.stats.transient_skips += 1;
                tracing::debug!(frame_index = self.frame_index, "video read skipped; retrying next tick");
                false
            }
            Err(e) => {
                tracing::warn!(frame_index = self.frame_index, "video read error, ending stream: {e:#}");
                self.finish();
                false
            }
        }
    }

    fn finish(&mut self) {
        self.done = true;
        tracing::info!(frames = self.frame_index, "video stream ended");
    }
}

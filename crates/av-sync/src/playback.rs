//! The per-tick playback loop.
//!
//! `Running -> Draining -> Terminated`. Each running tick reads the clock once, advances
//! video, then audio, presents the frame video returned (if any), and polls for
//! cancellation. Once every stream is done the loop waits for the audio sink to play out
//! what is queued; cancellation skips straight to `Terminated`.

use crate::audio::AudioSyncConsumer;
use crate::clock::Clock;
use crate::collab::{AudioSink, EventSource, RenderSink};
use crate::config::LoopTiming;
use crate::error::PlaybackError;
use crate::report::{EndReason, PlaybackReport};
use crate::video::VideoSyncConsumer;

pub struct VideoLane<'a> {
    pub consumer: &'a mut VideoSyncConsumer,
    pub sink: &'a mut dyn RenderSink,
}

pub struct AudioLane<'a> {
    pub consumer: &'a mut AudioSyncConsumer,
    pub sink: &'a mut dyn AudioSink,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Draining,
    Terminated(EndReason),
}

pub struct PlaybackLoop<'a> {
    clock: &'a dyn Clock,
    video: Option<VideoLane<'a>>,
    audio: Option<AudioLane<'a>>,
    events: &'a mut dyn EventSource,
    timing: LoopTiming,
    state: LoopState,
    ticks: u64,
}

impl<'a> PlaybackLoop<'a> {
    pub fn new(
        clock: &'a dyn Clock,
        video: Option<VideoLane<'a>>,
        audio: Option<AudioLane<'a>>,
        events: &'a mut dyn EventSource,
        timing: LoopTiming,
    ) -> Self {
        Self {
            clock,
            video,
            audio,
            events,
            timing,
            state: LoopState::Running,
            ticks: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run one step of the state machine and return the new state.
    pub fn step(&mut self) -> Result<LoopState, PlaybackError> {
        self.state = match self.state {
            LoopState::Running => self.tick()?,
            LoopState::Draining => self.drain_step(),
            terminated @ LoopState::Terminated(_) => terminated,
        };
        Ok(self.state)
    }

    /// Step until terminated and summarise the run.
    pub fn run(mut self) -> Result<PlaybackReport, PlaybackError> {
        let reason = loop {
            if let LoopState::Terminated(reason) = self.step()? {
                break reason;
            }
        };
        let report = PlaybackReport::new(
            reason,
            self.ticks,
            self.video.as_ref().map(|lane| lane.consumer.stats()),
            self.audio.as_ref().map(|lane| lane.consumer.stats()),
            self.clock.elapsed(),
        );
        tracing::debug!(
            reason = ?reason,
            ticks = report.ticks,
            frames_presented = report.frames_presented,
            frames_dropped = report.frames_dropped,
            audio_bytes = report.audio_bytes_enqueued,
            "playback finished"
        );
        Ok(report)
    }

    fn tick(&mut self) -> Result<LoopState, PlaybackError> {
        self.ticks += 1;
        let clock = self.clock;
        let elapsed = clock.elapsed();

        let mut presentable = None;
        let mut render = None;
        if let Some(VideoLane { consumer, sink }) = self.video.as_mut() {
            presentable = consumer.advance(elapsed, clock);
            render = Some(sink);
        }

        if let Some(AudioLane { consumer, sink }) = self.audio.as_mut() {
            let queued = sink.queued_bytes();
            consumer
                .advance(queued, &mut **sink)
                .map_err(PlaybackError::AudioSink)?;
        }

        if let (Some(frame), Some(sink)) = (presentable, render) {
            sink.present(frame).map_err(PlaybackError::Render)?;
        }

        if self.events.poll_cancel() {
            tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "playback cancelled");
            return Ok(LoopState::Terminated(EndReason::Cancelled));
        }

        if self.streams_done() {
            tracing::debug!(elapsed_ms = elapsed.as_millis() as u64, "all streams done; draining audio");
            return Ok(LoopState::Draining);
        }

        clock.sleep(self.timing.tick_interval);
        Ok(LoopState::Running)
    }

    fn drain_step(&mut self) -> LoopState {
        let queued = self
            .audio
            .as_ref()
            .map(|lane| lane.sink.queued_bytes())
            .unwrap_or(0);
        if queued == 0 {
            return LoopState::Terminated(EndReason::Eof);
        }
        if self.events.poll_cancel() {
            tracing::info!(queued_bytes = queued, "playback cancelled while draining");
            return LoopState::Terminated(EndReason::Cancelled);
        }
        self.clock.sleep(self.timing.drain_poll_interval);
        LoopState::Draining
    }

    fn streams_done(&self) -> bool {
        let video_done = self
            .video
            .as_ref()
            .is_none_or(|lane| lane.consumer.is_done());
        let audio_done = self
            .audio
            .as_ref()
            .is_none_or(|lane| lane.consumer.is_done());
        video_done && audio_done
    }
}

//! Session lifecycle: scoped acquisition of every collaborator, one playback run, and
//! release in reverse acquisition order.

use crate::audio::AudioSyncConsumer;
use crate::clock::{Clock, MediaClock};
use crate::collab::{AudioSink, EventSource, MediaBackend, RenderSink};
use crate::config::{LoopTiming, SessionConfig, SyncStrategy};
use crate::error::{PlaybackError, Resource};
use crate::playback::{AudioLane, PlaybackLoop, VideoLane};
use crate::report::PlaybackReport;
use crate::video::VideoSyncConsumer;

/// A fully opened playback session.
///
/// Collaborators are acquired in the order video source, audio source, render sink,
/// audio sink, event source, clock. Fields are declared in the reverse of that order so
/// dropping the session releases them last-acquired first.
pub struct PlaybackSession<C: Clock = MediaClock> {
    clock: C,
    events: Box<dyn EventSource>,
    audio_sink: Option<Box<dyn AudioSink>>,
    render_sink: Option<Box<dyn RenderSink>>,
    audio: Option<AudioSyncConsumer>,
    video: Option<VideoSyncConsumer>,
    timing: LoopTiming,
}

impl PlaybackSession<MediaClock> {
    /// Validate `config` and open every collaborator through `backend`.
    ///
    /// The wall clock starts as the last acquisition step, so run the session right away.
    pub fn open(config: &SessionConfig, backend: &mut dyn MediaBackend) -> Result<Self, PlaybackError> {
        Self::open_with_clock(config, backend, MediaClock::start)
    }
}

impl<C: Clock> PlaybackSession<C> {
    /// Like [`PlaybackSession::open`] with a caller-supplied clock, created after every
    /// other collaborator opened.
    pub fn open_with_clock(
        config: &SessionConfig,
        backend: &mut dyn MediaBackend,
        start_clock: impl FnOnce() -> C,
    ) -> Result<Self, PlaybackError> {
        config.validate()?;

        // Locals drop in reverse declaration order, which unwinds a partial open.
        let video_source = match &config.video {
            Some(cfg) => Some(
                backend
                    .open_video_source(cfg)
                    .map_err(open_error(Resource::VideoSource))?,
            ),
            None => None,
        };
        let audio_source = match &config.audio {
            Some(cfg) => Some(
                backend
                    .open_audio_source(cfg)
                    .map_err(open_error(Resource::AudioSource))?,
            ),
            None => None,
        };
        let render_sink = match &config.video {
            Some(cfg) => Some(
                backend
                    .open_render_sink(cfg)
                    .map_err(open_error(Resource::RenderSink))?,
            ),
            None => None,
        };
        let audio_sink = match &config.audio {
            Some(cfg) => Some(
                backend
                    .open_audio_sink(cfg)
                    .map_err(open_error(Resource::AudioSink))?,
            ),
            None => None,
        };
        let events = backend
            .open_event_source(config)
            .map_err(open_error(Resource::EventSource))?;

        let video = match (video_source, &config.video) {
            (Some(source), Some(cfg)) => Some(VideoSyncConsumer::new(
                source,
                cfg.width,
                cfg.height,
                cfg.fps,
                config.strategy,
                config.timing.wait_threshold,
            )),
            _ => None,
        };
        let audio = match (audio_source, config.audio_chunk_bytes(), config.target_fill_bytes()) {
            (Some(source), Some(chunk), Some(target)) => {
                Some(AudioSyncConsumer::new(source, chunk, target))
            }
            _ => None,
        };

        tracing::info!(
            video = config.video.is_some(),
            audio = config.audio.is_some(),
            strategy = ?config.strategy,
            chunk_bytes = ?config.audio_chunk_bytes(),
            target_fill_bytes = ?config.target_fill_bytes(),
            "playback session opened"
        );

        Ok(Self {
            clock: start_clock(),
            events,
            audio_sink,
            render_sink,
            audio,
            video,
            timing: config.timing,
        })
    }

    pub fn strategy(&self) -> Option<SyncStrategy> {
        self.video.as_ref().map(|v| v.strategy())
    }

    /// Run the playback loop until every stream finished and audio drained, or until
    /// cancelled.
    pub fn run(&mut self) -> Result<PlaybackReport, PlaybackError> {
        let video = match (self.video.as_mut(), self.render_sink.as_mut()) {
            (Some(consumer), Some(sink)) => Some(VideoLane {
                consumer,
                sink: &mut **sink,
            }),
            _ => None,
        };
        let audio = match (self.audio.as_mut(), self.audio_sink.as_mut()) {
            (Some(consumer), Some(sink)) => Some(AudioLane {
                consumer,
                sink: &mut **sink,
            }),
            _ => None,
        };

        PlaybackLoop::new(&self.clock, video, audio, &mut *self.events, self.timing).run()
    }
}

impl<C: Clock> Drop for PlaybackSession<C> {
    fn drop(&mut self) {
        tracing::info!("playback session closed");
    }
}

fn open_error(resource: Resource) -> impl FnOnce(anyhow::Error) -> PlaybackError {
    move |source| {
        tracing::error!(%resource, "could not open: {source:#}");
        PlaybackError::Open { resource, source }
    }
}

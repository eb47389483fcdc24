//! Collaborators for local files, the CPAL output device and Ctrl-C.

use std::path::PathBuf;

use anyhow::Result;
use av_sync::collab::{AudioSink, AudioSource, EventSource, MediaBackend, RenderSink, VideoSource};
use av_sync::config::{AudioConfig, AudioFormat, SessionConfig, VideoConfig};
use av_sync::decode::DecodedAudioSource;
use av_sync::output::{CpalAudioSink, UnderrunCounters};
use av_sync::raw::{RawAudioSource, RawVideoSource};
use crossbeam_channel::Receiver;

use crate::events::SignalEvents;
use crate::render::{FrameDumpSink, NullRenderSink};

pub struct LocalBackend {
    device: Option<String>,
    video_out: Option<PathBuf>,
    cancel_rx: Receiver<()>,
    underruns: Option<UnderrunCounters>,
}

impl LocalBackend {
    pub fn new(device: Option<String>, video_out: Option<PathBuf>, cancel_rx: Receiver<()>) -> Self {
        Self {
            device,
            video_out,
            cancel_rx,
            underruns: None,
        }
    }

    /// Underrun counters of the audio sink, once it has been opened.
    pub fn underruns(&self) -> Option<&UnderrunCounters> {
        self.underruns.as_ref()
    }
}

impl MediaBackend for LocalBackend {
    fn open_video_source(&mut self, cfg: &VideoConfig) -> Result<Box<dyn VideoSource>> {
        Ok(Box::new(RawVideoSource::open(cfg)?))
    }

    fn open_audio_source(&mut self, cfg: &AudioConfig) -> Result<Box<dyn AudioSource>> {
        match cfg.resolved_format() {
            AudioFormat::Raw => Ok(Box::new(RawAudioSource::open(&cfg.path)?)),
            _ => Ok(Box::new(DecodedAudioSource::open(cfg)?)),
        }
    }

    fn open_render_sink(&mut self, _cfg: &VideoConfig) -> Result<Box<dyn RenderSink>> {
        match &self.video_out {
            Some(path) => Ok(Box::new(FrameDumpSink::create(path)?)),
            None => Ok(Box::new(NullRenderSink::default())),
        }
    }

    fn open_audio_sink(&mut self, cfg: &AudioConfig) -> Result<Box<dyn AudioSink>> {
        let sink = CpalAudioSink::open(self.device.as_deref(), cfg)?;
        self.underruns = Some(sink.underrun_counters());
        Ok(Box::new(sink))
    }

    fn open_event_source(&mut self, _cfg: &SessionConfig) -> Result<Box<dyn EventSource>> {
        Ok(Box::new(SignalEvents::new(self.cancel_rx.clone())))
    }
}

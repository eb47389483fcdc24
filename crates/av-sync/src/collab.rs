//! Collaborator seams.
//!
//! The core never decodes, renders or talks to an audio device itself. It pulls from
//! sources and pushes to sinks through these traits, and a [`MediaBackend`] opens the
//! concrete implementations for a session.

use anyhow::Result;

use crate::config::{AudioConfig, SessionConfig, VideoConfig};
use crate::frame::Frame;

/// Outcome of one video read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameRead {
    /// The frame buffer holds a new picture.
    Frame,
    /// No more frames.
    EndOfStream,
    /// Transient failure; nothing was read and the next call may succeed.
    Skipped,
}

pub trait VideoSource {
    /// Overwrite `frame` with the next picture.
    ///
    /// A short read is [`FrameRead::EndOfStream`], not an error.
    fn read_frame(&mut self, frame: &mut Frame) -> Result<FrameRead>;
}

pub trait AudioSource {
    /// Fill up to `buf.len()` bytes of interleaved S16LE samples.
    ///
    /// Returns the number of bytes written; `0` means end of stream.
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize>;
}

pub trait RenderSink {
    /// Blit `frame` and display it.
    fn present(&mut self, frame: &Frame) -> Result<()>;
}

/// Queue drained asynchronously by the audio device.
pub trait AudioSink {
    /// Append bytes to the playback queue.
    fn enqueue(&mut self, bytes: &[u8]) -> Result<()>;

    /// Approximate bytes still waiting to be played.
    fn queued_bytes(&self) -> usize;
}

pub trait EventSource {
    /// Drain pending events; `true` if any asked to quit.
    fn poll_cancel(&mut self) -> bool;
}

/// Opens the collaborators a session needs.
///
/// `PlaybackSession::open` calls these in acquisition order and stops at the first
/// failure.
pub trait MediaBackend {
    fn open_video_source(&mut self, cfg: &VideoConfig) -> Result<Box<dyn VideoSource>>;

    fn open_audio_source(&mut self, cfg: &AudioConfig) -> Result<Box<dyn AudioSource>>;

    fn open_render_sink(&mut self, cfg: &VideoConfig) -> Result<Box<dyn RenderSink>>;

    fn open_audio_sink(&mut self, cfg: &AudioConfig) -> Result<Box<dyn AudioSink>>;

    fn open_event_source(&mut self, cfg: &SessionConfig) -> Result<Box<dyn EventSource>>;
}

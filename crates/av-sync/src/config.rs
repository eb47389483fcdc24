//! Session configuration.
//!
//! Everything the session needs is passed in explicitly and validated once in
//! [`SessionConfig::validate`] before any collaborator is opened.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::PlaybackError;

/// Bytes per sample of the interleaved S16LE stream carried to the audio sink.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Nominal chunk used when there is no video frame interval to derive one from.
pub const AUDIO_ONLY_CHUNK_BYTES: usize = 4096;

/// Largest nominal chunk, in seconds of audio.
pub const MAX_CHUNK_SECONDS: usize = 10;

/// Target fill is this many nominal chunks.
pub const TARGET_FILL_CHUNKS: usize = 4;

/// How video catches up with the clock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncStrategy {
    /// Read and discard frames until caught up, present only the latest.
    #[default]
    SkipToLatest,
    /// Present every frame, sleeping until its timestamp when it is early.
    WaitThenPresent,
}

/// Raw planar YUV 4:2:0 input.
#[derive(Clone, Debug)]
pub struct VideoConfig {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

/// How the audio file is read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AudioFormat {
    /// Pick by file extension: `.pcm`/`.raw` are raw, anything else is decoded.
    #[default]
    Auto,
    /// Interleaved S16LE samples without a header.
    Raw,
    /// Any container/codec the decoder can probe.
    Decoded,
}

#[derive(Clone, Debug)]
pub struct AudioConfig {
    pub path: PathBuf,
    pub format: AudioFormat,
    pub sample_rate: u32,
    pub channels: u16,
    /// Nominal bytes read per request. Derived from the video frame interval when unset.
    pub chunk_bytes: Option<usize>,
}

impl AudioConfig {
    /// Bytes in one interleaved sample frame (all channels).
    pub fn frame_bytes(&self) -> usize {
        self.channels as usize * BYTES_PER_SAMPLE
    }

    /// Largest accepted nominal chunk: [`MAX_CHUNK_SECONDS`] of audio, never below
    /// [`AUDIO_ONLY_CHUNK_BYTES`].
    pub fn max_chunk_bytes(&self) -> usize {
        (self.sample_rate as usize)
            .saturating_mul(self.frame_bytes())
            .saturating_mul(MAX_CHUNK_SECONDS)
            .max(AUDIO_ONLY_CHUNK_BYTES)
    }

    /// Resolve the read format, consulting the file extension for [`AudioFormat::Auto`].
    pub fn resolved_format(&self) -> AudioFormat {
        match self.format {
            AudioFormat::Auto => {
                let ext = self
                    .path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.to_ascii_lowercase());
                match ext.as_deref() {
                    Some("pcm") | Some("raw") => AudioFormat::Raw,
                    _ => AudioFormat::Decoded,
                }
            }
            other => other,
        }
    }
}

/// Cooperative suspension granularity of the playback loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopTiming {
    /// Sleep after every running tick.
    pub tick_interval: Duration,
    /// Sleep between queue depth checks while draining.
    pub drain_poll_interval: Duration,
    /// Frames early by no more than this are presented without waiting.
    pub wait_threshold: Duration,
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(1),
            drain_poll_interval: Duration::from_millis(10),
            wait_threshold: Duration::from_millis(1),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SessionConfig {
    pub video: Option<VideoConfig>,
    pub audio: Option<AudioConfig>,
    pub strategy: SyncStrategy,
    pub timing: LoopTiming,
}

impl SessionConfig {
    /// Nominal audio chunk size in bytes.
    ///
    /// Explicit size wins; otherwise one video frame interval worth of samples
    /// (`rate * channels * 2 / fps`), or [`AUDIO_ONLY_CHUNK_BYTES`] without video.
    pub fn audio_chunk_bytes(&self) -> Option<usize> {
        let audio = self.audio.as_ref()?;
        if let Some(bytes) = audio.chunk_bytes {
            return Some(bytes);
        }
        Some(match &self.video {
            Some(video) => {
                let per_second = audio.sample_rate as f64 * audio.frame_bytes() as f64;
                (per_second / video.fps) as usize
            }
            None => AUDIO_ONLY_CHUNK_BYTES,
        })
    }

    /// Queue depth the audio consumer keeps the sink near.
    pub fn target_fill_bytes(&self) -> Option<usize> {
        self.audio_chunk_bytes()
            .map(|chunk| chunk.saturating_mul(TARGET_FILL_CHUNKS))
    }

    /// Check the configuration once at startup.
    pub fn validate(&self) -> Result<(), PlaybackError> {
        if self.video.is_none() && self.audio.is_none() {
            return Err(invalid("at least one of video or audio is required"));
        }

        if let Some(video) = &self.video {
            if video.width == 0 || video.height == 0 {
                return Err(invalid(format!(
                    "frame size {}x{} must be non-zero",
                    video.width, video.height
                )));
            }
            if video.width % 2 != 0 || video.height % 2 != 0 {
                return Err(invalid(format!(
                    "frame size {}x{} must be even for 4:2:0 chroma",
                    video.width, video.height
                )));
            }
            if !video.fps.is_finite() || video.fps <= 0.0 {
                return Err(invalid(format!("fps {} must be positive", video.fps)));
            }
        }

        if let Some(audio) = &self.audio {
            if audio.sample_rate == 0 {
                return Err(invalid("sample rate must be non-zero"));
            }
            if audio.channels == 0 {
                return Err(invalid("channel count must be non-zero"));
            }
            let chunk = self.audio_chunk_bytes().unwrap_or(0);
            if chunk == 0 {
                return Err(invalid("audio chunk size must be non-zero"));
            }
            if chunk > audio.max_chunk_bytes() {
                return Err(invalid(format!(
                    "audio chunk of {chunk} bytes exceeds {MAX_CHUNK_SECONDS} s of audio ({} bytes)",
                    audio.max_chunk_bytes()
                )));
            }
            if audio.chunk_bytes.is_some() && chunk % audio.frame_bytes() != 0 {
                return Err(invalid(format!(
                    "audio chunk of {chunk} bytes is not a multiple of the {}-byte sample frame",
                    audio.frame_bytes()
                )));
            }
        }

        let timing = &self.timing;
        if timing.drain_poll_interval.is_zero() {
            return Err(invalid("drain poll interval must be non-zero"));
        }

        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> PlaybackError {
    PlaybackError::Config(msg.into())
}

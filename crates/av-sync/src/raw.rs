//! Headerless file readers: planar YUV 4:2:0 video and interleaved S16LE audio.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::collab::{AudioSource, FrameRead, VideoSource};
use crate::config::VideoConfig;
use crate::frame::Frame;

/// Reads consecutive Y, U, V planes and stamps `pts = index / fps`.
///
/// A trailing partial frame counts as end of stream.
pub struct RawVideoSource<R> {
    reader: R,
    fps: f64,
    index: u64,
}

impl RawVideoSource<BufReader<File>> {
    pub fn open(cfg: &VideoConfig) -> Result<Self> {
        let file = File::open(&cfg.path).with_context(|| format!("open {:?}", cfg.path))?;
        tracing::info!(
            path = %cfg.path.display(),
            width = cfg.width,
            height = cfg.height,
            fps = cfg.fps,
            "raw video opened"
        );
        Ok(Self::new(BufReader::new(file), cfg.fps))
    }
}

impl<R: Read> RawVideoSource<R> {
    pub fn new(reader: R, fps: f64) -> Self {
        Self {
            reader,
            fps,
            index: 0,
        }
    }
}

impl<R: Read> VideoSource for RawVideoSource<R> {
    fn read_frame(&mut self, frame: &mut Frame) -> Result<FrameRead> {
        for plane in frame.planes_mut() {
            match self.reader.read_exact(plane) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                    tracing::debug!(frames = self.index, "raw video short read");
                    return Ok(FrameRead::EndOfStream);
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("read frame {}", self.index));
                }
            }
        }
        frame.pts = Some(Duration::from_secs_f64(self.index as f64 / self.fps));
        self.index += 1;
        Ok(FrameRead::Frame)
    }
}

/// Interleaved S16LE samples without a header.
pub struct RawAudioSource<R> {
    reader: R,
}

impl RawAudioSource<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("open {:?}", path))?;
        tracing::info!(path = %path.display(), "raw audio opened");
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> RawAudioSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: Read> AudioSource for RawAudioSource<R> {
    /// Fill `buf` until it is full or the file ends.
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e).context("read audio"),
            }
        }
        Ok(filled)
    }
}

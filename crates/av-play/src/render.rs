//! Headless render sinks.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use av_sync::collab::RenderSink;
use av_sync::frame::Frame;

/// Appends every presented frame to a raw planar YUV stream.
///
/// The output holds exactly the frames that were displayed.
pub struct FrameDumpSink<W: Write> {
    writer: W,
    frames: u64,
}

impl FrameDumpSink<BufWriter<File>> {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).with_context(|| format!("create {:?}", path))?;
        tracing::info!(path = %path.display(), "writing presented frames");
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> FrameDumpSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, frames: 0 }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl<W: Write> RenderSink for FrameDumpSink<W> {
    fn present(&mut self, frame: &Frame) -> Result<()> {
        let widths = [frame.width(), frame.width() / 2, frame.width() / 2];
        for (plane, width) in frame.planes().into_iter().zip(widths) {
            if plane.stride == 0 {
                continue;
            }
            for row in plane.data.chunks(plane.stride) {
                self.writer
                    .write_all(&row[..width.min(row.len())])
                    .with_context(|| format!("write frame {}", self.frames))?;
            }
        }
        self.frames += 1;
        Ok(())
    }
}

impl<W: Write> Drop for FrameDumpSink<W> {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            tracing::warn!("flush frame dump: {e}");
        }
        tracing::info!(frames = self.frames, "frame dump closed");
    }
}

/// Discards frames.
#[derive(Debug, Default)]
pub struct NullRenderSink {
    frames: u64,
}

impl RenderSink for NullRenderSink {
    fn present(&mut self, frame: &Frame) -> Result<()> {
        self.frames += 1;
        tracing::trace!(frames = self.frames, pts = ?frame.pts, "present");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(fill: [u8; 3]) -> Frame {
        let mut frame = Frame::new(4, 2);
        for (plane, value) in frame.planes_mut().into_iter().zip(fill) {
            plane.fill(value);
        }
        frame
    }

    #[test]
    fn dump_writes_planes_in_order() {
        let mut out = Vec::new();
        {
            let mut sink = FrameDumpSink::new(&mut out);
            sink.present(&frame([1, 2, 3])).unwrap();
            sink.present(&frame([4, 5, 6])).unwrap();
            assert_eq!(sink.frames(), 2);
        }
        assert_eq!(
            out,
            vec![1, 1, 1, 1, 1, 1, 1, 1, 2, 2, 3, 3, 4, 4, 4, 4, 4, 4, 4, 4, 5, 5, 6, 6]
        );
    }

    #[test]
    fn dump_surfaces_write_errors() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("disk full"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut sink = FrameDumpSink::new(Broken);
        assert!(sink.present(&frame([0, 0, 0])).is_err());
        assert_eq!(sink.frames(), 0);
    }

    #[test]
    fn null_sink_counts_frames() {
        let mut sink = NullRenderSink::default();
        sink.present(&frame([0, 0, 0])).unwrap();
        assert_eq!(sink.frames, 1);
    }
}

//! Audio side of the synchronization engine.
//!
//! The audio device drains its queue on its own schedule. [`AudioSyncConsumer`] keeps
//! that queue near `target_fill_bytes`: enough to ride out a slow tick without an
//! underrun, bounded so latency and memory do not grow. Every byte read is forwarded;
//! only the rate of forwarding is throttled.

use anyhow::Result;

use crate::buffer::AudioChunkBuffer;
use crate::collab::{AudioSink, AudioSource};

/// What one `advance` call pushed to the sink.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AudioAdvance {
    pub requests: u64,
    pub bytes: usize,
}

/// Counters accumulated across all `advance` calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AudioStats {
    pub enqueue_requests: u64,
    pub bytes_enqueued: u64,
}

pub struct AudioSyncConsumer {
    source: Box<dyn AudioSource>,
    buffer: AudioChunkBuffer,
    chunk_bytes: usize,
    target_fill_bytes: usize,
    done: bool,
    stats: AudioStats,
}

impl AudioSyncConsumer {
    pub fn new(source: Box<dyn AudioSource>, chunk_bytes: usize, target_fill_bytes: usize) -> Self {
        Self {
            source,
            buffer: AudioChunkBuffer::with_capacity(chunk_bytes),
            chunk_bytes,
            target_fill_bytes,
            done: false,
            stats: AudioStats::default(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn chunk_bytes(&self) -> usize {
        self.chunk_bytes
    }

    pub fn target_fill_bytes(&self) -> usize {
        self.target_fill_bytes
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn stats(&self) -> AudioStats {
        self.stats
    }

    /// Top the sink up towards the target fill.
    ///
    /// `queued_bytes` is the sink's depth at the start of the call. The running estimate
    /// is advanced locally as chunks are enqueued; it only steers this loop. Reads are
    /// capped so one call never pushes past the target.
    ///
    /// Only a failing `enqueue` is an error. A zero-length read ends the stream.
    pub fn advance(&mut self, queued_bytes: usize, sink: &mut dyn AudioSink) -> Result<AudioAdvance> {
        let mut out = AudioAdvance::default();
        let mut queued = queued_bytes;

        while queued < self.target_fill_bytes && !self.done {
            let want = self.chunk_bytes.min(self.target_fill_bytes - queued);
            let read = match self.source.read_chunk(self.buffer.slice_mut(want)) {
                Ok(n) => n.min(want),
                Err(e) => {
                    tracing::warn!(
                        bytes_enqueued = self.stats.bytes_enqueued,
                        "audio read error, ending stream: {e:#}"
                    );
                    0
                }
            };
            if read == 0 {
                self.done = true;
                tracing::info!(bytes = self.stats.bytes_enqueued, "audio stream ended");
                break;
            }

            sink.enqueue(self.buffer.filled(read))?;
            queued += read;
            out.requests += 1;
            out.bytes += read;
            self.stats.enqueue_requests += 1;
            self.stats.bytes_enqueued += read as u64;
        }

        if out.requests > 0 {
            tracing::trace!(
                queued_bytes = queued,
                target_fill_bytes = self.target_fill_bytes,
                enqueued = out.bytes,
                "audio topped up"
            );
        }
        Ok(out)
    }
}

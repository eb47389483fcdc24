//! CPAL-backed [`AudioSink`].
//!
//! The playback loop enqueues S16LE bytes; they are converted to `i16` samples and pushed
//! into a [`SampleQueue`]. The real-time callback:
//! - refills a small local buffer from the queue without blocking
//! - applies basic channel mapping (mono<->stereo, best-effort otherwise)
//! - converts `i16` samples to the device sample format
//! - fills silence on underrun and counts it

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, StreamTrait};

use crate::collab::AudioSink;
use crate::config::{AudioConfig, BYTES_PER_SAMPLE};
use crate::device::{pick_buffer_size, pick_device, pick_output_config};
use crate::queue::SampleQueue;

/// Max frames pulled from the queue per callback refill.
const REFILL_MAX_FRAMES: usize = 1024;

/// Underrun counters shared with the output callback.
#[derive(Clone, Debug, Default)]
pub struct UnderrunCounters {
    events: Arc<AtomicU64>,
    frames: Arc<AtomicU64>,
}

impl UnderrunCounters {
    /// Callbacks that ran out of samples after playback had started.
    pub fn events(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }

    /// Output frames filled with silence because the queue was empty.
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }
}

pub struct CpalAudioSink {
    stream: cpal::Stream,
    feed: PcmFeed,
    underruns: UnderrunCounters,
}

impl CpalAudioSink {
    /// Open `device` (substring match, or the default device) at the configured rate and
    /// start the output stream.
    pub fn open(device: Option<&str>, cfg: &AudioConfig) -> Result<Self> {
        let host = cpal::default_host();
        let device = pick_device(&host, device)?;
        let supported = pick_output_config(&device, cfg.sample_rate, cfg.channels)?;
        let sample_format = supported.sample_format();
        let mut config: cpal::StreamConfig = supported.config();
        if let Some(buffer_size) = pick_buffer_size(&supported) {
            config.buffer_size = buffer_size;
        }

        let name = device
            .description()
            .map(|d| d.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        tracing::info!(
            device = %name,
            sample_rate = config.sample_rate,
            device_channels = config.channels,
            source_channels = cfg.channels,
            format = ?sample_format,
            buffer = ?config.buffer_size,
            "audio output"
        );

        let channels = cfg.channels as usize;
        let low_watermark = (cfg.sample_rate as usize * channels / 50).max(channels * 16);
        let queue = Arc::new(SampleQueue::new(channels, low_watermark));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let underruns = UnderrunCounters::default();

        let stream = build_output_stream(
            &device,
            &config,
            sample_format,
            &queue,
            in_flight.clone(),
            underruns.clone(),
        )?;
        stream.play().context("start output stream")?;

        Ok(Self {
            stream,
            feed: PcmFeed::new(queue, in_flight),
            underruns,
        })
    }

    /// Handle on the underrun counters that outlives the sink.
    pub fn underrun_counters(&self) -> UnderrunCounters {
        self.underruns.clone()
    }
}

impl AudioSink for CpalAudioSink {
    fn enqueue(&mut self, bytes: &[u8]) -> Result<()> {
        self.feed.push(bytes)
    }

    fn queued_bytes(&self) -> usize {
        self.feed.queued_bytes()
    }
}

impl Drop for CpalAudioSink {
    fn drop(&mut self) {
        if let Err(e) = self.stream.pause() {
            tracing::debug!("pause output stream: {e}");
        }
        self.feed.queue.close();
        tracing::debug!(
            underrun_events = self.underruns.events(),
            underrun_frames = self.underruns.frames(),
            "audio output closed"
        );
    }
}

/// Loop-side half of the sink: S16LE bytes in, playable depth out.
struct PcmFeed {
    queue: Arc<SampleQueue>,
    /// Samples popped by the callback but not yet written to the device.
    in_flight: Arc<AtomicUsize>,
    carry: Option<u8>,
    scratch: Vec<i16>,
}

impl PcmFeed {
    fn new(queue: Arc<SampleQueue>, in_flight: Arc<AtomicUsize>) -> Self {
        Self {
            queue,
            in_flight,
            carry: None,
            scratch: Vec::new(),
        }
    }

    fn push(&mut self, bytes: &[u8]) -> Result<()> {
        if self.queue.is_done() {
            return Err(anyhow!("audio queue closed"));
        }
        self.scratch.clear();
        s16le_to_samples(&mut self.carry, bytes, &mut self.scratch);
        self.queue.push_interleaved(&self.scratch);
        Ok(())
    }

    fn queued_bytes(&self) -> usize {
        playable_bytes(
            self.queue.len_samples(),
            self.in_flight.load(Ordering::Relaxed),
            self.queue.channels(),
        )
    }
}

/// Bytes the device will still play.
///
/// The callback only pops whole frames, so a trailing partial frame (and a carried odd
/// byte) stays put until more data completes it and is not counted.
fn playable_bytes(queued_samples: usize, in_flight_samples: usize, channels: usize) -> usize {
    let whole = queued_samples - queued_samples % channels.max(1);
    (whole + in_flight_samples) * BYTES_PER_SAMPLE
}

/// Decode little-endian `i16` samples from `bytes`, carrying an odd trailing byte over to
/// the next call.
fn s16le_to_samples(carry: &mut Option<u8>, mut bytes: &[u8], out: &mut Vec<i16>) {
    if let Some(lo) = carry.take() {
        match bytes.split_first() {
            Some((&hi, rest)) => {
                out.push(i16::from_le_bytes([lo, hi]));
                bytes = rest;
            }
            None => {
                *carry = Some(lo);
                return;
            }
        }
    }
    let mut pairs = bytes.chunks_exact(2);
    out.extend(pairs.by_ref().map(|p| i16::from_le_bytes([p[0], p[1]])));
    if let [last] = pairs.remainder() {
        *carry = Some(*last);
    }
}

/// Build a CPAL output stream that plays samples from `queue`.
fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    queue: &Arc<SampleQueue>,
    in_flight: Arc<AtomicUsize>,
    underruns: UnderrunCounters,
) -> Result<cpal::Stream> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, queue, in_flight, underruns),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, queue, in_flight, underruns),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, queue, in_flight, underruns),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, queue, in_flight, underruns),
        other => Err(anyhow!("Unsupported sample format: {other:?}")),
    }
}

/// Type-specialized stream builder for CPAL sample formats.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    queue: &Arc<SampleQueue>,
    in_flight: Arc<AtomicUsize>,
    underruns: UnderrunCounters,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<i16> + Send + 'static,
{
    let channels_out = config.channels as usize;
    let silence = <T as cpal::Sample>::from_sample::<i16>(0);

    let mut state = CallbackState {
        pos: 0,
        src_channels: queue.channels(),
        src: Vec::new(),
    };
    let mut started = false;
    let queue_cb = queue.clone();

    let err_fn = |err| tracing::warn!("stream error: {err}");

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [T], _| {
                let frames = data.len() / channels_out;

                for frame in 0..frames {
                    if state.pos >= state.src.len() {
                        state.pos = 0;
                        state.src.clear();
                        match queue_cb.pop(REFILL_MAX_FRAMES) {
                            Some(v) => {
                                state.src = v;
                                started = true;
                            }
                            None => {
                                if started {
                                    underruns.events.fetch_add(1, Ordering::Relaxed);
                                    underruns
                                        .frames
                                        .fetch_add((frames - frame) as u64, Ordering::Relaxed);
                                }
                                data[frame * channels_out..].fill(silence);
                                break;
                            }
                        }
                    }
                    for ch in 0..channels_out {
                        let sample = next_sample_mapped(&mut state, channels_out, ch);
                        data[frame * channels_out + ch] =
                            <T as cpal::Sample>::from_sample::<i16>(sample);
                    }
                }

                in_flight.store(state.src.len() - state.pos.min(state.src.len()), Ordering::Relaxed);
            },
            err_fn,
            None,
        )
        .context("build output stream")?;

    Ok(stream)
}

/// Samples fetched from the queue and not yet written out.
struct CallbackState {
    pos: usize,
    src_channels: usize,
    src: Vec<i16>,
}

/// Read one output sample for `dst_ch`, applying a simple channel mapping.
///
/// Mapping rules:
/// - mono -> stereo: duplicate channel 0
/// - stereo -> mono: average L/R
/// - other layouts: clamp to available channels
///
/// `st.pos` advances once per destination frame (after the last channel).
fn next_sample_mapped(st: &mut CallbackState, dst_channels: usize, dst_ch: usize) -> i16 {
    if st.pos >= st.src.len() {
        return 0;
    }

    let frame_start = st.pos;
    let get_src = |ch: usize, st: &CallbackState| -> i16 {
        if ch < st.src_channels && frame_start + ch < st.src.len() {
            st.src[frame_start + ch]
        } else {
            0
        }
    };

    let out = match (st.src_channels, dst_channels) {
        (2, 1) => ((i32::from(get_src(0, st)) + i32::from(get_src(1, st))) / 2) as i16,
        (1, _) => get_src(0, st),
        _ => get_src(dst_ch.min(st.src_channels.saturating_sub(1)), st),
    };

    if dst_ch + 1 == dst_channels {
        st.pos += st.src_channels;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapped(src_channels: usize, src: Vec<i16>, dst_channels: usize) -> Vec<i16> {
        let mut st = CallbackState {
            pos: 0,
            src_channels,
            src,
        };
        let mut out = Vec::new();
        while st.pos < st.src.len() {
            for ch in 0..dst_channels {
                out.push(next_sample_mapped(&mut st, dst_channels, ch));
            }
        }
        out
    }

    #[test]
    fn even_bytes_decode_without_carry() {
        let mut carry = None;
        let mut out = Vec::new();
        s16le_to_samples(&mut carry, &[0x01, 0x00, 0xff, 0xff], &mut out);
        assert_eq!(out, vec![1, -1]);
        assert!(carry.is_none());
    }

    #[test]
    fn odd_byte_carries_into_next_call() {
        let mut carry = None;
        let mut out = Vec::new();
        s16le_to_samples(&mut carry, &[0x34, 0x12, 0x78], &mut out);
        assert_eq!(out, vec![0x1234]);
        assert_eq!(carry, Some(0x78));

        s16le_to_samples(&mut carry, &[], &mut out);
        assert_eq!(carry, Some(0x78));

        s16le_to_samples(&mut carry, &[0x56, 0x02, 0x00], &mut out);
        assert_eq!(out, vec![0x1234, 0x5678, 2]);
        assert!(carry.is_none());
    }

    #[test]
    fn stereo_passes_through() {
        assert_eq!(mapped(2, vec![1, 2, 3, 4], 2), vec![1, 2, 3, 4]);
    }

    #[test]
    fn mono_duplicates_to_stereo() {
        assert_eq!(mapped(1, vec![5, 6], 2), vec![5, 5, 6, 6]);
    }

    #[test]
    fn stereo_averages_to_mono() {
        assert_eq!(mapped(2, vec![10, 20, -4, 4], 1), vec![15, 0]);
    }

    #[test]
    fn extra_output_channels_clamp_to_last_source_channel() {
        assert_eq!(mapped(2, vec![1, 2], 4), vec![1, 2, 2, 2]);
    }

    fn stereo_feed() -> PcmFeed {
        PcmFeed::new(Arc::new(SampleQueue::new(2, 0)), Arc::new(AtomicUsize::new(0)))
    }

    /// Pop everything the device could play.
    fn play_out(feed: &PcmFeed) {
        while feed.queue.pop(REFILL_MAX_FRAMES).is_some() {}
    }

    #[test]
    fn depth_reaches_zero_after_partial_frame_tail() {
        let mut feed = stereo_feed();
        feed.push(&[0x11; 4098]).unwrap();
        assert_eq!(feed.queued_bytes(), 4096);

        play_out(&feed);
        assert_eq!(feed.queue.len_samples(), 1);
        assert_eq!(feed.queued_bytes(), 0);
    }

    #[test]
    fn depth_reaches_zero_after_odd_byte_tail() {
        let mut feed = stereo_feed();
        feed.push(&[0x22; 4097]).unwrap();
        assert!(feed.carry.is_some());
        assert_eq!(feed.queued_bytes(), 4096);

        play_out(&feed);
        assert_eq!(feed.queued_bytes(), 0);
    }

    #[test]
    fn partial_frame_counts_once_completed() {
        let mut feed = stereo_feed();
        feed.push(&[0; 6]).unwrap();
        assert_eq!(feed.queued_bytes(), 4);
        feed.push(&[0; 2]).unwrap();
        assert_eq!(feed.queued_bytes(), 8);
    }

    #[test]
    fn in_flight_samples_count_towards_depth() {
        let feed = stereo_feed();
        feed.in_flight.store(10, Ordering::Relaxed);
        assert_eq!(feed.queued_bytes(), 20);
        assert_eq!(playable_bytes(5, 4, 2), 16);
    }

    #[test]
    fn push_after_close_fails() {
        let mut feed = stereo_feed();
        feed.queue.close();
        assert!(feed.push(&[0; 4]).is_err());
    }

    /// Device that plays everything queued as soon as the depth is checked.
    struct InstantDevice(PcmFeed);

    impl AudioSink for InstantDevice {
        fn enqueue(&mut self, bytes: &[u8]) -> Result<()> {
            self.0.push(bytes)
        }

        fn queued_bytes(&self) -> usize {
            play_out(&self.0);
            self.0.queued_bytes()
        }
    }

    #[test]
    fn ragged_audio_tail_still_drains() {
        use crate::audio::AudioSyncConsumer;
        use crate::config::LoopTiming;
        use crate::playback::{AudioLane, PlaybackLoop};
        use crate::report::EndReason;
        use crate::testing::{ManualClock, MemAudioSource, ScriptedEvents};

        for len in [4097, 4098, 4099] {
            let clock = ManualClock::new();
            let mut consumer =
                AudioSyncConsumer::new(Box::new(MemAudioSource::new(len)), 4096, 4 * 4096);
            let mut sink = InstantDevice(stereo_feed());
            let mut events = ScriptedEvents::never();

            let report = PlaybackLoop::new(
                &clock,
                None,
                Some(AudioLane { consumer: &mut consumer, sink: &mut sink }),
                &mut events,
                LoopTiming::default(),
            )
            .run()
            .unwrap();

            assert_eq!(report.end_reason, EndReason::Eof, "len {len}");
            assert_eq!(report.audio_bytes_enqueued, len as u64);
        }
    }

    #[test]
    fn underrun_counters_start_at_zero() {
        let counters = UnderrunCounters::default();
        assert_eq!(counters.events(), 0);
        assert_eq!(counters.frames(), 0);
    }
}

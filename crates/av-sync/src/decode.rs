//! Decoded audio source.
//!
//! Uses Symphonia to:
//! - probe the input container/codec
//! - decode packets on demand into interleaved `i16` samples
//! - hand them out as S16LE bytes through [`AudioSource`]
//!
//! The decoded stream must already match the configured rate and channel count.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, Decoder, DecoderOptions};
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::collab::AudioSource;
use crate::config::AudioConfig;

/// Metadata captured while probing the source.
#[derive(Clone, Debug, Default)]
pub struct SourceInfo {
    /// Codec name (best-effort).
    pub codec: Option<String>,
    /// Source bit depth (best-effort).
    pub bit_depth: Option<u16>,
    pub duration_ms: Option<u64>,
    pub sample_rate: u32,
    pub channels: u16,
}

pub struct DecodedAudioSource {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    info: SourceInfo,
    pending: Vec<u8>,
    pos: usize,
    finished: bool,
    skipped_packets: u64,
}

impl DecodedAudioSource {
    /// Open `cfg.path`, using its extension as the probe hint.
    pub fn open(cfg: &AudioConfig) -> Result<Self> {
        let file = File::open(&cfg.path).with_context(|| format!("open {:?}", cfg.path))?;
        let source = Self::from_media_source(
            Box::new(file),
            hint_for(&cfg.path),
            cfg.sample_rate,
            cfg.channels,
        )
        .with_context(|| format!("decode {:?}", cfg.path))?;
        tracing::info!(
            path = %cfg.path.display(),
            codec = source.info.codec.as_deref().unwrap_or("unknown"),
            bit_depth = ?source.info.bit_depth,
            duration_ms = ?source.info.duration_ms,
            "decoded audio opened"
        );
        Ok(source)
    }

    /// Probe `source` and check its rate and channel count against `sample_rate`/`channels`.
    pub fn from_media_source(
        source: Box<dyn MediaSource>,
        hint: Hint,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Self> {
        let mss = MediaSourceStream::new(source, Default::default());
        let probed = symphonia::default::get_probe().format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;
        let format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| anyhow!("No default audio track"))?;
        let track_id = track.id;
        let codec_params: CodecParameters = track.codec_params.clone();

        let rate = codec_params
            .sample_rate
            .ok_or_else(|| anyhow!("Unknown sample rate"))?;
        let source_channels = codec_params
            .channels
            .ok_or_else(|| anyhow!("Unknown channels"))?
            .count();

        if rate != sample_rate {
            return Err(anyhow!(
                "source sample rate {rate} Hz does not match configured {sample_rate} Hz"
            ));
        }
        if source_channels != channels as usize {
            return Err(anyhow!(
                "source has {source_channels} channels, configured {channels}"
            ));
        }

        let info = SourceInfo {
            codec: codec_name_from_params(&codec_params),
            bit_depth: codec_params
                .bits_per_sample
                .or(codec_params.bits_per_coded_sample)
                .and_then(|v| u16::try_from(v).ok()),
            duration_ms: duration_ms_from_codec_params(&codec_params),
            sample_rate: rate,
            channels,
        };

        let decoder =
            symphonia::default::get_codecs().make(&codec_params, &DecoderOptions::default())?;

        Ok(Self {
            format,
            decoder,
            track_id,
            info,
            pending: Vec::new(),
            pos: 0,
            finished: false,
            skipped_packets: 0,
        })
    }

    pub fn info(&self) -> &SourceInfo {
        &self.info
    }

    /// Decode the next packet of our track into `pending`. `false` at end of stream.
    fn refill(&mut self) -> bool {
        loop {
            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(_) => return false, // EOF
            };
            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(d) => d,
                Err(e) => {
                    self.skipped_packets += 1;
                    tracing::debug!(skipped = self.skipped_packets, "skipping packet: {e}");
                    continue;
                }
            };
            if decoded.frames() == 0 {
                continue;
            }

            let mut sample_buf = SampleBuffer::<i16>::new(decoded.frames() as u64, *decoded.spec());
            sample_buf.copy_interleaved_ref(decoded);

            self.pending.clear();
            self.pos = 0;
            self.pending
                .extend(sample_buf.samples().iter().flat_map(|s| s.to_le_bytes()));
            return true;
        }
    }
}

impl AudioSource for DecodedAudioSource {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            if self.pos >= self.pending.len() {
                if self.finished {
                    break;
                }
                if !self.refill() {
                    self.finished = true;
                    tracing::debug!(skipped_packets = self.skipped_packets, "decoded audio ended");
                    break;
                }
            }
            let n = (buf.len() - filled).min(self.pending.len() - self.pos);
            buf[filled..filled + n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
            self.pos += n;
            filled += n;
        }
        Ok(filled)
    }
}

fn hint_for(path: &Path) -> Hint {
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }
    hint
}

/// Best-effort duration in milliseconds from codec metadata.
///
/// Returns `None` if the container does not provide total frames or sample rate.
fn duration_ms_from_codec_params(codec_params: &CodecParameters) -> Option<u64> {
    let frames = codec_params.n_frames?;
    let rate = codec_params.sample_rate? as u64;
    if rate == 0 {
        return None;
    }
    Some(frames.saturating_mul(1000) / rate)
}

fn codec_name_from_params(params: &CodecParameters) -> Option<String> {
    use symphonia::core::codecs::*;
    let name = match params.codec {
        CODEC_TYPE_FLAC => "FLAC",
        CODEC_TYPE_MP3 => "MP3",
        CODEC_TYPE_AAC => "AAC",
        CODEC_TYPE_ALAC => "ALAC",
        CODEC_TYPE_VORBIS => "VORBIS",
        CODEC_TYPE_PCM_S16LE | CODEC_TYPE_PCM_S16BE => "PCM_S16",
        CODEC_TYPE_PCM_S24LE | CODEC_TYPE_PCM_S24BE => "PCM_S24",
        CODEC_TYPE_PCM_S32LE | CODEC_TYPE_PCM_S32BE => "PCM_S32",
        CODEC_TYPE_PCM_F32LE | CODEC_TYPE_PCM_F32BE => "PCM_F32",
        _ => return None,
    };
    Some(name.to_string())
}

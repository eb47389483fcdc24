//! Output device discovery and selection.
//!
//! Thin wrappers around CPAL for:
//! - listing available output devices
//! - selecting either the default device or a device by substring match
//! - choosing a stream config that plays the source rate without resampling

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait};

/// Largest fixed buffer we ask the device for, in frames.
const MAX_BUFFER_FRAMES: u32 = 16_384;

/// Pick the first output device matching `needle` (case-insensitive), or the default device.
///
/// Returns an error if no suitable device is found.
pub fn pick_device(host: &cpal::Host, needle: Option<&str>) -> Result<cpal::Device> {
    if let Some(needle) = needle {
        let mut devices = host.output_devices().context("No output devices")?;
        return devices
            .find(|d| {
                d.description()
                    .ok()
                    .map(|n| matches_device_name(&n.name(), needle))
                    .unwrap_or(false)
            })
            .ok_or_else(|| anyhow!("No output device matched: {needle}"));
    }

    host.default_output_device()
        .ok_or_else(|| anyhow!("No default output device"))
}

/// Choose an output config that runs at exactly `sample_rate`.
///
/// Among ranges containing the rate, prefer one with `channels` channels, then the best
/// sample format. No range containing the rate is an error.
pub fn pick_output_config(
    device: &cpal::Device,
    sample_rate: u32,
    channels: u16,
) -> Result<cpal::SupportedStreamConfig> {
    let ranges: Vec<cpal::SupportedStreamConfigRange> = device
        .supported_output_configs()
        .context("query output configs")?
        .collect();
    if ranges.is_empty() {
        return Err(anyhow!("No supported output configs"));
    }

    let mut best: Option<(bool, u8, cpal::SupportedStreamConfigRange)> = None;
    for range in ranges {
        if !rate_in_range(range.min_sample_rate(), range.max_sample_rate(), sample_rate) {
            continue;
        }
        let matches = range.channels() == channels;
        let rank = sample_format_rank(range.sample_format());
        let replace = match &best {
            None => true,
            Some((b_matches, b_rank, _)) => is_better_candidate(matches, rank, *b_matches, *b_rank),
        };
        if replace {
            best = Some((matches, rank, range));
        }
    }

    best.map(|(_, _, range)| range.with_sample_rate(sample_rate))
        .ok_or_else(|| anyhow!("Output device does not support {sample_rate} Hz"))
}

/// Prefer a fixed buffer size if the device advertises one.
///
/// Returns `None` when the device only supports the default buffer size.
pub fn pick_buffer_size(config: &cpal::SupportedStreamConfig) -> Option<cpal::BufferSize> {
    match config.buffer_size() {
        cpal::SupportedBufferSize::Range { min, max } => {
            Some(cpal::BufferSize::Fixed(capped_buffer_frames(*min, *max)))
        }
        cpal::SupportedBufferSize::Unknown => None,
    }
}

/// Print available output devices to stdout for `--list-devices`.
pub fn list_devices(host: &cpal::Host) -> Result<()> {
    let devices = host.output_devices().context("No output devices")?;
    for (i, d) in devices.enumerate() {
        println!("#{i}: {}", d.description()?);
    }
    Ok(())
}

fn capped_buffer_frames(min: u32, max: u32) -> u32 {
    if max > MAX_BUFFER_FRAMES {
        min.max(MAX_BUFFER_FRAMES)
    } else {
        max
    }
}

fn rate_in_range(min: u32, max: u32, rate: u32) -> bool {
    rate >= min && rate <= max
}

fn sample_format_rank(format: cpal::SampleFormat) -> u8 {
    match format {
        cpal::SampleFormat::F32 => 0,
        cpal::SampleFormat::I32 => 1,
        cpal::SampleFormat::I16 => 2,
        cpal::SampleFormat::U16 => 3,
        _ => 10,
    }
}

fn is_better_candidate(channels_match: bool, rank: u8, best_match: bool, best_rank: u8) -> bool {
    if channels_match != best_match {
        channels_match
    } else {
        rank < best_rank
    }
}

fn matches_device_name(name: &str, needle: &str) -> bool {
    let needle = needle.trim();
    if needle.is_empty() {
        return false;
    }
    name.to_lowercase().contains(&needle.to_lowercase())
}

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "av-play", version)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Option<Command>,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Use a specific output device by substring match
    #[arg(long)]
    pub device: Option<String>,

    /// How video catches up with the clock
    #[arg(long, value_enum, default_value_t = SyncArg::Skip)]
    pub sync: SyncArg,

    /// Sleep between playback ticks (milliseconds)
    #[arg(long, default_value_t = 1)]
    pub tick_ms: u64,

    /// Queue depth poll interval while audio drains (milliseconds)
    #[arg(long, default_value_t = 10)]
    pub drain_poll_ms: u64,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play raw YUV video and/or an audio file in sync
    Play(PlayArgs),
}

#[derive(ClapArgs, Debug)]
pub struct PlayArgs {
    /// Raw planar YUV 4:2:0 file
    #[arg(long)]
    pub video: Option<PathBuf>,

    #[arg(long, default_value_t = 640)]
    pub width: u32,

    #[arg(long, default_value_t = 480)]
    pub height: u32,

    /// Video frame rate
    #[arg(long, default_value_t = 30.0)]
    pub fps: f64,

    /// Audio file: raw S16LE PCM or anything the decoder can probe
    #[arg(long)]
    pub audio: Option<PathBuf>,

    #[arg(long, default_value_t = 44_100)]
    pub sample_rate: u32,

    #[arg(long, default_value_t = 2)]
    pub channels: u16,

    /// Bytes read per audio request (default: one video frame interval, or 4096)
    #[arg(long)]
    pub chunk_bytes: Option<usize>,

    #[arg(long, value_enum, default_value_t = AudioFormatArg::Auto)]
    pub audio_format: AudioFormatArg,

    /// Write every presented frame to this raw YUV file
    #[arg(long)]
    pub video_out: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SyncArg {
    /// Drop late frames, present only the latest
    Skip,
    /// Present every frame, sleeping when it is early
    Wait,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum AudioFormatArg {
    /// Pick by file extension (.pcm/.raw are raw)
    Auto,
    Raw,
    Decoded,
}

use std::time::Duration;

use av_sync::config::{AudioConfig, AudioFormat, LoopTiming, SessionConfig, SyncStrategy, VideoConfig};

use crate::cli::{Args, AudioFormatArg, PlayArgs, SyncArg};

/// Build the session configuration from the command line. Validation happens when the
/// session opens.
pub fn session_config(args: &Args, play: &PlayArgs) -> SessionConfig {
    let video = play.video.as_ref().map(|path| VideoConfig {
        path: path.clone(),
        width: play.width,
        height: play.height,
        fps: play.fps,
    });
    let audio = play.audio.as_ref().map(|path| AudioConfig {
        path: path.clone(),
        format: match play.audio_format {
            AudioFormatArg::Auto => AudioFormat::Auto,
            AudioFormatArg::Raw => AudioFormat::Raw,
            AudioFormatArg::Decoded => AudioFormat::Decoded,
        },
        sample_rate: play.sample_rate,
        channels: play.channels,
        chunk_bytes: play.chunk_bytes,
    });

    SessionConfig {
        video,
        audio,
        strategy: match args.sync {
            SyncArg::Skip => SyncStrategy::SkipToLatest,
            SyncArg::Wait => SyncStrategy::WaitThenPresent,
        },
        timing: LoopTiming {
            tick_interval: Duration::from_millis(args.tick_ms),
            drain_poll_interval: Duration::from_millis(args.drain_poll_ms),
            ..LoopTiming::default()
        },
    }
}

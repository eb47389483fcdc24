//! av-play: plays a raw YUV video stream and an audio stream against one wall clock.
//!
//! ## Loop
//! Every tick reads the clock once, lets video catch up (dropping late frames, or
//! waiting for early ones with `--sync wait`), tops the audio device queue up to four
//! chunks, presents the newest frame and checks for Ctrl-C. When every stream has ended
//! the queued audio plays out before the process exits.
//!
//! Rendering is headless: frames are discarded, or written to `--video-out`.

mod backend;
mod cli;
mod config;
mod events;
mod render;

use anyhow::{Result, anyhow};
use av_sync::PlaybackSession;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use backend::LocalBackend;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,av_play=info,av_sync=info")
        }))
        .init();

    if args.list_devices {
        let host = cpal::default_host();
        av_sync::device::list_devices(&host)?;
        return Ok(());
    }

    if let Err(e) = run(&args) {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
    Ok(())
}

fn run(args: &cli::Args) -> Result<()> {
    let Some(cli::Command::Play(play)) = &args.cmd else {
        return Err(anyhow!("nothing to do; see `av-play play --help`"));
    };

    let config = config::session_config(args, play);
    let cancel_rx = events::install_ctrlc_handler()?;
    let mut backend = LocalBackend::new(args.device.clone(), play.video_out.clone(), cancel_rx);

    let report = {
        let mut session = PlaybackSession::open(&config, &mut backend)?;
        session.run()?
    };

    tracing::info!(
        end = ?report.end_reason,
        ticks = report.ticks,
        frames_read = report.frames_read,
        frames_presented = report.frames_presented,
        frames_dropped = report.frames_dropped,
        transient_skips = report.transient_skips,
        audio_bytes = report.audio_bytes_enqueued,
        audio_requests = report.audio_enqueue_requests,
        video_wait_ms = report.video_wait.as_millis() as u64,
        elapsed_ms = report.elapsed.as_millis() as u64,
        effective_fps = report.effective_fps().unwrap_or(0.0),
        "playback finished"
    );
    if let Some(underruns) = backend.underruns() {
        tracing::info!(
            underrun_events = underruns.events(),
            underrun_frames = underruns.frames(),
            "audio underruns"
        );
    }

    Ok(())
}

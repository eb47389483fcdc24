//! Ctrl-C as the session's event source.

use anyhow::{Context, Result};
use av_sync::collab::EventSource;
use crossbeam_channel::{Receiver, Sender};

/// Install the process Ctrl-C handler; every interrupt sends one message.
pub fn install_ctrlc_handler() -> Result<Receiver<()>> {
    let (tx, rx): (Sender<()>, Receiver<()>) = crossbeam_channel::unbounded();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("install Ctrl-C handler")?;
    Ok(rx)
}

/// Drains interrupt messages; any pending message cancels playback.
pub struct SignalEvents {
    rx: Receiver<()>,
}

impl SignalEvents {
    pub fn new(rx: Receiver<()>) -> Self {
        Self { rx }
    }
}

impl EventSource for SignalEvents {
    fn poll_cancel(&mut self) -> bool {
        let pending = self.rx.try_iter().count();
        if pending > 0 {
            tracing::info!(pending, "interrupt received");
        }
        pending > 0
    }
}

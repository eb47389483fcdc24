pub mod audio;
pub mod buffer;
pub mod clock;
pub mod collab;
pub mod config;
pub mod decode;
pub mod device;
pub mod error;
pub mod frame;
pub mod output;
pub mod playback;
pub mod queue;
pub mod raw;
pub mod report;
pub mod session;
pub mod video;

#[cfg(test)]
mod testing;

pub use clock::{Clock, MediaClock};
pub use config::{AudioConfig, AudioFormat, LoopTiming, SessionConfig, SyncStrategy, VideoConfig};
pub use error::{PlaybackError, Resource};
pub use report::{EndReason, PlaybackReport};
pub use session::PlaybackSession;

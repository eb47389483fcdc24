use std::fmt;

/// Collaborator a session acquires during startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resource {
    VideoSource,
    AudioSource,
    RenderSink,
    AudioSink,
    EventSource,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::VideoSource => "video source",
            Resource::AudioSource => "audio source",
            Resource::RenderSink => "render sink",
            Resource::AudioSink => "audio sink",
            Resource::EventSource => "event source",
        };
        f.write_str(name)
    }
}

/// Failures surfaced by session construction and the playback loop.
///
/// End-of-stream is not represented here; it is internal consumer state.
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("could not open {resource}")]
    Open {
        resource: Resource,
        #[source]
        source: anyhow::Error,
    },
    #[error("render sink failed")]
    Render(#[source] anyhow::Error),
    #[error("audio sink failed")]
    AudioSink(#[source] anyhow::Error),
}

impl PlaybackError {
    /// `true` for errors raised before the loop started.
    pub fn is_startup(&self) -> bool {
        matches!(self, PlaybackError::Config(_) | PlaybackError::Open { .. })
    }

    /// Resource that failed to open, if this is an open failure.
    pub fn resource(&self) -> Option<Resource> {
        match self {
            PlaybackError::Open { resource, .. } => Some(*resource),
            _ => None,
        }
    }
}

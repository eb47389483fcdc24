//! In-memory collaborators and a virtual clock for unit tests.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Result, anyhow};

use crate::clock::Clock;
use crate::collab::{
    AudioSink, AudioSource, EventSource, FrameRead, MediaBackend, RenderSink, VideoSource,
};
use crate::config::{AudioConfig, SessionConfig, VideoConfig};
use crate::error::Resource;
use crate::frame::Frame;

/// Virtual clock: `sleep` advances time instantly and is recorded.
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
    sleeps: Rc<RefCell<Vec<Duration>>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, at: Duration) {
        self.now.set(at);
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Clock for ManualClock {
    fn elapsed(&self) -> Duration {
        self.now.get()
    }

    fn sleep(&self, dur: Duration) {
        self.sleeps.borrow_mut().push(dur);
        self.advance(dur);
    }
}

/// Shared log of collaborator drops, in drop order.
pub type DropLog = Rc<RefCell<Vec<Resource>>>;

struct DropProbe {
    resource: Resource,
    log: Option<DropLog>,
}

impl Drop for DropProbe {
    fn drop(&mut self) {
        if let Some(log) = &self.log {
            log.borrow_mut().push(self.resource);
        }
    }
}

/// Video source with `frames` pictures; the first luma byte holds the frame number.
pub struct MemVideoSource {
    frames: u64,
    next: u64,
    fps: f64,
    stamp_pts: bool,
    transient: HashSet<u64>,
    reads: Rc<Cell<u64>>,
    _probe: DropProbe,
}

impl MemVideoSource {
    pub fn new(frames: u64, fps: f64) -> Self {
        Self {
            frames,
            next: 0,
            fps,
            stamp_pts: true,
            transient: HashSet::new(),
            reads: Rc::new(Cell::new(0)),
            _probe: DropProbe {
                resource: Resource::VideoSource,
                log: None,
            },
        }
    }

    /// Leave `pts` unset so consumers fall back to frame index timing.
    pub fn without_pts(mut self) -> Self {
        self.stamp_pts = false;
        self
    }

    /// Fail transiently on the given read attempts (0-based, counting every call).
    pub fn with_transient(mut self, attempts: &[u64]) -> Self {
        self.transient.extend(attempts.iter().copied());
        self
    }

    pub fn with_drop_log(mut self, log: DropLog) -> Self {
        self._probe.log = Some(log);
        self
    }

    /// Counter of read attempts, shared with the test.
    pub fn reads(&self) -> Rc<Cell<u64>> {
        self.reads.clone()
    }
}

impl VideoSource for MemVideoSource {
    fn read_frame(&mut self, frame: &mut Frame) -> Result<FrameRead> {
        let attempt = self.reads.get();
        self.reads.set(attempt + 1);
        if self.transient.contains(&attempt) {
            return Ok(FrameRead::Skipped);
        }
        if self.next >= self.frames {
            return Ok(FrameRead::EndOfStream);
        }
        let [y, _, _] = frame.planes_mut();
        y[0] = self.next as u8;
        frame.pts = self
            .stamp_pts
            .then(|| Duration::from_secs_f64(self.next as f64 / self.fps));
        self.next += 1;
        Ok(FrameRead::Frame)
    }
}

/// Audio source over a byte vector, optionally capping each read.
pub struct MemAudioSource {
    data: Vec<u8>,
    pos: usize,
    max_read: Option<usize>,
    fail_at: Option<usize>,
    _probe: DropProbe,
}

impl MemAudioSource {
    pub fn new(len: usize) -> Self {
        Self {
            data: (0..len).map(|i| i as u8).collect(),
            pos: 0,
            max_read: None,
            fail_at: None,
            _probe: DropProbe {
                resource: Resource::AudioSource,
                log: None,
            },
        }
    }

    pub fn with_max_read(mut self, max: usize) -> Self {
        self.max_read = Some(max);
        self
    }

    /// Return an error once the read position reaches `pos`.
    pub fn failing_at(mut self, pos: usize) -> Self {
        self.fail_at = Some(pos);
        self
    }

    pub fn with_drop_log(mut self, log: DropLog) -> Self {
        self._probe.log = Some(log);
        self
    }
}

impl AudioSource for MemAudioSource {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.fail_at.is_some_and(|at| self.pos >= at) {
            return Err(anyhow!("read failed"));
        }
        let mut want = buf.len().min(self.data.len() - self.pos);
        if let Some(max) = self.max_read {
            want = want.min(max);
        }
        buf[..want].copy_from_slice(&self.data[self.pos..self.pos + want]);
        self.pos += want;
        Ok(want)
    }
}

/// Records the first luma byte of every presented frame.
pub struct RecordingRenderSink {
    presented: Rc<RefCell<Vec<u8>>>,
    fail: bool,
    _probe: DropProbe,
}

impl RecordingRenderSink {
    pub fn new() -> Self {
        Self {
            presented: Rc::default(),
            fail: false,
            _probe: DropProbe {
                resource: Resource::RenderSink,
                log: None,
            },
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn presented(&self) -> Rc<RefCell<Vec<u8>>> {
        self.presented.clone()
    }

    pub fn with_drop_log(mut self, log: DropLog) -> Self {
        self._probe.log = Some(log);
        self
    }
}

impl RenderSink for RecordingRenderSink {
    fn present(&mut self, frame: &Frame) -> Result<()> {
        if self.fail {
            return Err(anyhow!("surface lost"));
        }
        let [y, _, _] = frame.planes();
        self.presented.borrow_mut().push(y.data[0]);
        Ok(())
    }
}

/// Audio sink that plays `bytes_per_sec` against a [`ManualClock`].
pub struct MockAudioSink {
    clock: ManualClock,
    bytes_per_sec: f64,
    queued: Cell<usize>,
    last: Cell<Duration>,
    enqueued: Rc<RefCell<Vec<usize>>>,
    _probe: DropProbe,
}

impl MockAudioSink {
    pub fn new(clock: ManualClock, bytes_per_sec: f64) -> Self {
        let last = clock.elapsed();
        Self {
            clock,
            bytes_per_sec,
            queued: Cell::new(0),
            last: Cell::new(last),
            enqueued: Rc::default(),
            _probe: DropProbe {
                resource: Resource::AudioSink,
                log: None,
            },
        }
    }

    /// Sizes of every enqueue call.
    pub fn enqueued(&self) -> Rc<RefCell<Vec<usize>>> {
        self.enqueued.clone()
    }

    pub fn with_drop_log(mut self, log: DropLog) -> Self {
        self._probe.log = Some(log);
        self
    }

    fn drain(&self) {
        let now = self.clock.elapsed();
        let played = (now.saturating_sub(self.last.get()).as_secs_f64() * self.bytes_per_sec) as usize;
        if played > 0 {
            self.queued.set(self.queued.get().saturating_sub(played));
            self.last.set(now);
        }
    }
}

impl AudioSink for MockAudioSink {
    fn enqueue(&mut self, bytes: &[u8]) -> Result<()> {
        self.drain();
        self.queued.set(self.queued.get() + bytes.len());
        self.enqueued.borrow_mut().push(bytes.len());
        Ok(())
    }

    fn queued_bytes(&self) -> usize {
        self.drain();
        self.queued.get()
    }
}

/// Cancels on the `after`-th poll (1-based); never when `None`.
pub struct ScriptedEvents {
    after: Option<u64>,
    polls: u64,
    _probe: DropProbe,
}

impl ScriptedEvents {
    pub fn never() -> Self {
        Self {
            after: None,
            polls: 0,
            _probe: DropProbe {
                resource: Resource::EventSource,
                log: None,
            },
        }
    }

    pub fn cancel_on(poll: u64) -> Self {
        let mut ev = Self::never();
        ev.after = Some(poll);
        ev
    }

    pub fn with_drop_log(mut self, log: DropLog) -> Self {
        self._probe.log = Some(log);
        self
    }
}

impl EventSource for ScriptedEvents {
    fn poll_cancel(&mut self) -> bool {
        self.polls += 1;
        self.after.is_some_and(|n| self.polls >= n)
    }
}

/// Backend handing out in-memory collaborators.
pub struct TestBackend {
    pub clock: ManualClock,
    pub video_frames: u64,
    pub audio_bytes: usize,
    pub drain_bytes_per_sec: f64,
    pub cancel_on_poll: Option<u64>,
    pub fail_on: Option<Resource>,
    pub drops: DropLog,
    pub opened: Vec<Resource>,
    pub presented: Rc<RefCell<Vec<u8>>>,
    pub enqueued: Rc<RefCell<Vec<usize>>>,
}

impl TestBackend {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            video_frames: 0,
            audio_bytes: 0,
            drain_bytes_per_sec: 176_400.0,
            cancel_on_poll: None,
            fail_on: None,
            drops: DropLog::default(),
            opened: Vec::new(),
            presented: Rc::default(),
            enqueued: Rc::default(),
        }
    }

    fn acquire(&mut self, resource: Resource) -> Result<()> {
        if self.fail_on == Some(resource) {
            return Err(anyhow!("{resource} unavailable"));
        }
        self.opened.push(resource);
        Ok(())
    }
}

impl MediaBackend for TestBackend {
    fn open_video_source(&mut self, cfg: &VideoConfig) -> Result<Box<dyn VideoSource>> {
        self.acquire(Resource::VideoSource)?;
        Ok(Box::new(
            MemVideoSource::new(self.video_frames, cfg.fps).with_drop_log(self.drops.clone()),
        ))
    }

    fn open_audio_source(&mut self, _cfg: &AudioConfig) -> Result<Box<dyn AudioSource>> {
        self.acquire(Resource::AudioSource)?;
        Ok(Box::new(
            MemAudioSource::new(self.audio_bytes).with_drop_log(self.drops.clone()),
        ))
    }

    fn open_render_sink(&mut self, _cfg: &VideoConfig) -> Result<Box<dyn RenderSink>> {
        self.acquire(Resource::RenderSink)?;
        let sink = RecordingRenderSink::new().with_drop_log(self.drops.clone());
        self.presented = sink.presented();
        Ok(Box::new(sink))
    }

    fn open_audio_sink(&mut self, _cfg: &AudioConfig) -> Result<Box<dyn AudioSink>> {
        self.acquire(Resource::AudioSink)?;
        let sink = MockAudioSink::new(self.clock.clone(), self.drain_bytes_per_sec)
            .with_drop_log(self.drops.clone());
        self.enqueued = sink.enqueued();
        Ok(Box::new(sink))
    }

    fn open_event_source(&mut self, _cfg: &SessionConfig) -> Result<Box<dyn EventSource>> {
        self.acquire(Resource::EventSource)?;
        let events = match self.cancel_on_poll {
            Some(n) => ScriptedEvents::cancel_on(n),
            None => ScriptedEvents::never(),
        };
        Ok(Box::new(events.with_drop_log(self.drops.clone())))
    }
}

use std::{
    sync::{
        mpsc::{self, Receiver, Sender},
        Arc, Mutex, MutexGuard, Weak,
    },
    thread,
};

use crate::{FrequencyAnalyser, FrequencySnapshot, PetError, Result};

/// Samples kept in a [`SampleQueue`] before the oldest are discarded.
const QUEUE_CAPACITY: usize = 8192;

/// Screen or audio source offered by the platform for capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSource {
    pub id: String,
    pub name: String,
}

/// Live system-audio loopback. Dropping the stream releases the underlying
/// platform resource.
pub trait LoopbackStream {
    /// Appends the mono samples captured since the previous call to `out`.
    fn read(&mut self, out: &mut Vec<f32>) -> Result<()>;
}

/// Platform capture service. Calls may block on permission prompts or stream
/// negotiation, so the overlay only reaches it through [`AsyncCapture`].
pub trait CaptureBackend {
    fn sources(&mut self) -> Result<Vec<CaptureSource>>;
    fn open(&mut self, source: &CaptureSource) -> Result<Box<dyn LoopbackStream + Send>>;
}

/// Finished setup attempt, tagged with the ticket it was requested under.
pub type CaptureReady = (SetupTicket, Result<Box<dyn LoopbackStream>>);

/// Non-blocking front of a capture service. `request` starts a setup and
/// returns at once; the outcome is collected later through `poll_ready`.
pub trait AsyncCapture {
    fn request(&mut self, ticket: SetupTicket);
    fn poll_ready(&mut self) -> Option<CaptureReady>;
}

/// Opens the first available source. Every failure is reported as
/// [`PetError::CaptureSetup`].
pub fn open_first_source(
    backend: &mut dyn CaptureBackend,
) -> Result<Box<dyn LoopbackStream + Send>> {
    let sources = backend.sources().map_err(into_setup_error)?;
    let source = sources
        .first()
        .ok_or_else(|| PetError::CaptureSetup("no capture source available".into()))?;
    tracing::info!(id = %source.id, name = %source.name, "opening capture source");
    backend.open(source).map_err(into_setup_error)
}

fn into_setup_error(err: PetError) -> PetError {
    match err {
        PetError::CaptureSetup(_) => err,
        other => PetError::CaptureSetup(other.to_string()),
    }
}

/// Runs each setup on its own thread and hands the stream back over a
/// channel. The backend is shared behind a mutex so attempts never overlap.
pub struct BackgroundCapture<B> {
    backend: Arc<Mutex<B>>,
    sender: Sender<(SetupTicket, Result<Box<dyn LoopbackStream + Send>>)>,
    receiver: Receiver<(SetupTicket, Result<Box<dyn LoopbackStream + Send>>)>,
}

impl<B> BackgroundCapture<B>
where
    B: CaptureBackend + Send + 'static,
{
    pub fn new(backend: B) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            backend: Arc::new(Mutex::new(backend)),
            sender,
            receiver,
        }
    }
}

impl<B> AsyncCapture for BackgroundCapture<B>
where
    B: CaptureBackend + Send + 'static,
{
    fn request(&mut self, ticket: SetupTicket) {
        let backend = Arc::clone(&self.backend);
        let sender = self.sender.clone();
        let spawned = thread::Builder::new()
            .name("capture-setup".into())
            .spawn(move || {
                let result = match backend.lock() {
                    Ok(mut backend) => open_first_source(&mut *backend),
                    Err(_) => Err(PetError::CaptureSetup("capture backend poisoned".into())),
                };
                // The receiver is gone once the overlay has shut down.
                let _ = sender.send((ticket, result));
            });

        if let Err(err) = spawned {
            let _ = self
                .sender
                .send((ticket, Err(PetError::CaptureSetup(err.to_string()))));
        }
    }

    fn poll_ready(&mut self) -> Option<CaptureReady> {
        let (ticket, result) = self.receiver.try_recv().ok()?;
        Some((ticket, result.map(|stream| stream as Box<dyn LoopbackStream>)))
    }
}

impl<B> std::fmt::Debug for BackgroundCapture<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundCapture").finish_non_exhaustive()
    }
}

/// Identifies one start attempt; a stop in between makes it stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupTicket(u64);

enum TapState {
    Inactive,
    Pending(SetupTicket),
    Active(ActiveCapture),
}

struct ActiveCapture {
    stream: Box<dyn LoopbackStream>,
    analyser: FrequencyAnalyser,
    scratch: Vec<f32>,
}

/// Owns the capture stream and hands out one frequency snapshot per frame.
pub struct AudioTap {
    state: TapState,
    generation: u64,
}

impl AudioTap {
    pub fn new() -> Self {
        Self {
            state: TapState::Inactive,
            generation: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, TapState::Active(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, TapState::Pending(_))
    }

    /// Moves to the pending state. Returns `None` when a capture is already
    /// running or being set up.
    pub fn begin_start(&mut self) -> Option<SetupTicket> {
        if !matches!(self.state, TapState::Inactive) {
            return None;
        }
        self.generation += 1;
        let ticket = SetupTicket(self.generation);
        self.state = TapState::Pending(ticket);
        Some(ticket)
    }

    /// Completes a start attempt. `Ok(false)` means the ticket went stale and
    /// the stream was released on the spot. A setup error returns the tap to
    /// inactive and is passed back to the caller.
    pub fn finish_start(
        &mut self,
        ticket: SetupTicket,
        result: Result<Box<dyn LoopbackStream>>,
    ) -> Result<bool> {
        match self.state {
            TapState::Pending(pending) if pending == ticket => {}
            _ => {
                tracing::debug!(?ticket, "discarding stale capture setup");
                return Ok(false);
            }
        }

        match result {
            Ok(stream) => {
                tracing::info!("audio capture started");
                self.state = TapState::Active(ActiveCapture {
                    stream,
                    analyser: FrequencyAnalyser::new(),
                    scratch: Vec::new(),
                });
                Ok(true)
            }
            Err(err) => {
                self.state = TapState::Inactive;
                Err(into_setup_error(err))
            }
        }
    }

    /// Releases the stream, or cancels a pending setup. Safe in any state.
    pub fn stop(&mut self) {
        if matches!(self.state, TapState::Inactive) {
            return;
        }
        self.generation += 1;
        self.state = TapState::Inactive;
        tracing::info!("audio capture stopped");
    }

    /// Reads pending samples and returns this frame's snapshot, or `None`
    /// while no capture is active.
    pub fn snapshot(&mut self) -> Result<Option<&FrequencySnapshot>> {
        let TapState::Active(capture) = &mut self.state else {
            return Ok(None);
        };

        capture.scratch.clear();
        capture.stream.read(&mut capture.scratch)?;
        capture.analyser.push_samples(&capture.scratch);
        capture.analyser.snapshot().map(Some)
    }
}

impl Default for AudioTap {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AudioTap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            TapState::Inactive => "inactive",
            TapState::Pending(_) => "pending",
            TapState::Active(_) => "active",
        };
        f.debug_struct("AudioTap")
            .field("state", &state)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Thread-safe sample hand-off for backends whose capture callback runs on
/// its own thread. The callback pushes through a [`SampleProducer`]; the tap
/// reads through the queue's [`LoopbackStream`] side.
#[derive(Debug)]
pub struct SampleQueue {
    shared: Arc<Mutex<Vec<f32>>>,
}

impl SampleQueue {
    pub fn new() -> (Self, SampleProducer) {
        let shared = Arc::new(Mutex::new(Vec::new()));
        let producer = SampleProducer {
            shared: Arc::downgrade(&shared),
        };
        (Self { shared }, producer)
    }
}

impl LoopbackStream for SampleQueue {
    fn read(&mut self, out: &mut Vec<f32>) -> Result<()> {
        let mut queue = lock(&self.shared)?;
        out.append(&mut queue);
        Ok(())
    }
}

/// Writing side of a [`SampleQueue`]. Samples pushed after the queue is
/// dropped are discarded.
#[derive(Debug, Clone)]
pub struct SampleProducer {
    shared: Weak<Mutex<Vec<f32>>>,
}

impl SampleProducer {
    pub fn push_samples(&self, samples: &[f32]) -> Result<()> {
        let Some(shared) = self.shared.upgrade() else {
            return Ok(());
        };
        if samples.is_empty() {
            return Ok(());
        }
        let mut queue = lock(&shared)?;
        queue.extend_from_slice(samples);
        if queue.len() > QUEUE_CAPACITY {
            let overflow = queue.len() - QUEUE_CAPACITY;
            queue.drain(..overflow);
        }
        Ok(())
    }

    /// `false` once the reading side has been dropped.
    pub fn is_connected(&self) -> bool {
        self.shared.strong_count() > 0
    }
}

fn lock(shared: &Mutex<Vec<f32>>) -> Result<MutexGuard<'_, Vec<f32>>> {
    shared
        .lock()
        .map_err(|_| PetError::msg("sample queue has been poisoned"))
}

#[cfg(test)]
mod tests {
    use std::{
        cell::Cell,
        rc::Rc,
        time::{Duration, Instant},
    };

    use super::*;

    struct FakeBackend {
        sources: Vec<CaptureSource>,
        opened: Vec<String>,
    }

    impl CaptureBackend for FakeBackend {
        fn sources(&mut self) -> Result<Vec<CaptureSource>> {
            Ok(self.sources.clone())
        }

        fn open(&mut self, source: &CaptureSource) -> Result<Box<dyn LoopbackStream + Send>> {
            self.opened.push(source.id.clone());
            let (queue, _producer) = SampleQueue::new();
            Ok(Box::new(queue))
        }
    }

    struct CountingStream {
        released: Rc<Cell<bool>>,
    }

    impl LoopbackStream for CountingStream {
        fn read(&mut self, out: &mut Vec<f32>) -> Result<()> {
            out.extend_from_slice(&[0.0; 64]);
            Ok(())
        }
    }

    impl Drop for CountingStream {
        fn drop(&mut self) {
            self.released.set(true);
        }
    }

    fn source(id: &str) -> CaptureSource {
        CaptureSource {
            id: id.to_string(),
            name: format!("Screen {id}"),
        }
    }

    #[test]
    fn picks_first_source() {
        let mut backend = FakeBackend {
            sources: vec![source("screen:0"), source("screen:1")],
            opened: Vec::new(),
        };
        open_first_source(&mut backend).unwrap();
        assert_eq!(backend.opened, ["screen:0"]);
    }

    #[test]
    fn no_source_is_setup_failure() {
        let mut backend = FakeBackend {
            sources: Vec::new(),
            opened: Vec::new(),
        };
        let err = open_first_source(&mut backend).err().unwrap();
        assert!(matches!(err, PetError::CaptureSetup(_)));
    }

    #[test]
    fn snapshots_flow_only_while_active() {
        let mut tap = AudioTap::new();
        assert!(tap.snapshot().unwrap().is_none());

        let ticket = tap.begin_start().unwrap();
        assert!(tap.is_pending());
        assert!(tap.begin_start().is_none());
        assert!(tap.snapshot().unwrap().is_none());

        let (queue, producer) = SampleQueue::new();
        assert!(tap.finish_start(ticket, Ok(Box::new(queue))).unwrap());
        producer.push_samples(&[0.25; 512]).unwrap();
        let snapshot = tap.snapshot().unwrap().unwrap();
        assert_eq!(snapshot.len(), crate::analysis::BIN_COUNT);

        tap.stop();
        assert!(!tap.is_active());
        assert!(tap.snapshot().unwrap().is_none());
        assert!(!producer.is_connected());
    }

    #[test]
    fn stop_during_setup_releases_late_stream() {
        let mut tap = AudioTap::new();
        let ticket = tap.begin_start().unwrap();
        tap.stop();
        assert!(!tap.is_pending());

        let released = Rc::new(Cell::new(false));
        let stream = CountingStream {
            released: released.clone(),
        };
        assert!(!tap.finish_start(ticket, Ok(Box::new(stream))).unwrap());
        assert!(released.get());
        assert!(!tap.is_active());
    }

    #[test]
    fn failed_setup_returns_to_inactive() {
        let mut tap = AudioTap::new();
        let ticket = tap.begin_start().unwrap();
        let err = tap
            .finish_start(ticket, Err(PetError::msg("permission denied")))
            .unwrap_err();
        assert!(matches!(err, PetError::CaptureSetup(ref reason) if reason == "permission denied"));
        assert!(!tap.is_active() && !tap.is_pending());
        assert!(tap.begin_start().is_some());
    }

    #[test]
    fn stop_releases_active_stream() {
        let mut tap = AudioTap::new();
        let ticket = tap.begin_start().unwrap();
        let released = Rc::new(Cell::new(false));
        let stream = CountingStream {
            released: released.clone(),
        };
        tap.finish_start(ticket, Ok(Box::new(stream))).unwrap();
        assert!(tap.snapshot().unwrap().is_some());

        tap.stop();
        tap.stop();
        assert!(released.get());
    }

    #[test]
    fn background_setup_arrives_through_poll() {
        let mut capture = BackgroundCapture::new(FakeBackend {
            sources: vec![source("screen:0")],
            opened: Vec::new(),
        });
        let mut tap = AudioTap::new();
        let ticket = tap.begin_start().unwrap();
        capture.request(ticket);

        let deadline = Instant::now() + Duration::from_secs(5);
        let (arrived, result) = loop {
            if let Some(ready) = capture.poll_ready() {
                break ready;
            }
            assert!(Instant::now() < deadline, "setup never finished");
            thread::sleep(Duration::from_millis(1));
        };
        assert_eq!(arrived, ticket);
        assert!(tap.finish_start(arrived, result).unwrap());
        assert!(tap.is_active());
        assert!(capture.poll_ready().is_none());
    }

    #[test]
    fn producer_caps_queue() {
        let (mut queue, producer) = SampleQueue::new();
        producer.push_samples(&vec![1.0; QUEUE_CAPACITY + 10]).unwrap();
        let mut out = Vec::new();
        queue.read(&mut out).unwrap();
        assert_eq!(out.len(), QUEUE_CAPACITY);
        out.clear();
        queue.read(&mut out).unwrap();
        assert!(out.is_empty());
    }
}

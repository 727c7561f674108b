use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::config::RenderJob;
use crate::encode::{EncoderArgs, EncoderLauncher, EncoderProcess, FfmpegLauncher, ensure_parent_dir};
use crate::foundation::error::{SubprocessError, WavescopeError, WavescopeResult};
use crate::render::{FrameRGBA, Player, ScopeRenderer};
use crate::source::SourceProvider;
use crate::worker::socket::{
    AudioProducer, PreviewSlot, ProducerFactory, SocketWorker, StreamKind, UnitProducer,
    VideoProducer, WorkerDone,
};

/// Message recorded when a session is stopped on request or after a worker failure.
pub const STOP_MESSAGE: &str = "Rendering aborted.";

const EXIT_POLL: Duration = Duration::from_millis(20);
const TERMINATE_GRACE: Duration = Duration::from_secs(10);

/// Lifecycle of the orchestrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerSessionState {
    Idle,
    Initializing,
    Running,
}

/// Result of one render session, delivered exactly once per started session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionOutcome {
    pub ok: bool,
    pub message: String,
}

enum SessionEvent {
    Worker(WorkerDone),
    EncoderExited { session: u64, code: Option<i32> },
    Shutdown,
}

#[derive(Clone)]
struct EncoderHandle {
    process: Arc<Mutex<Box<dyn EncoderProcess>>>,
    stop_requested: Arc<AtomicBool>,
}

impl EncoderHandle {
    fn lock(&self) -> MutexGuard<'_, Box<dyn EncoderProcess>> {
        self.process.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn terminate(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.lock().terminate();
    }

    fn kill_and_wait(&self) {
        let mut process = self.lock();
        process.kill();
        if let Err(e) = process.wait() {
            tracing::debug!(error = %e, "waiting for stale encoder failed");
        }
    }
}

struct Session {
    state: WorkerSessionState,
    id: u64,
    ok: bool,
    message: String,
    encoder: Option<EncoderHandle>,
}

struct Shared {
    session: Mutex<Session>,
    video: SocketWorker,
    audio: SocketWorker,
    launcher: Box<dyn EncoderLauncher>,
    events: mpsc::Sender<SessionEvent>,
    outcomes: mpsc::Sender<SessionOutcome>,
    progress: Arc<AtomicU32>,
    preview: PreviewSlot,
}

/// Runs render sessions: a video and an audio [`SocketWorker`] feeding one encoder subprocess.
///
/// [`RenderWorker::work`] starts a session from `Idle`; the session ends, and the orchestrator
/// returns to `Idle`, once the encoder process has exited. Every started session yields exactly
/// one [`SessionOutcome`].
pub struct RenderWorker {
    shared: Arc<Shared>,
    control: Option<std::thread::JoinHandle<()>>,
    outcomes: Mutex<mpsc::Receiver<SessionOutcome>>,
}

impl std::fmt::Debug for RenderWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderWorker")
            .field("state", &self.state())
            .field("progress", &self.progress())
            .finish_non_exhaustive()
    }
}

impl RenderWorker {
    /// Orchestrator driving the `ffmpeg` executable.
    pub fn new() -> WavescopeResult<Self> {
        Self::with_launcher(Box::new(FfmpegLauncher))
    }

    pub fn with_launcher(launcher: Box<dyn EncoderLauncher>) -> WavescopeResult<Self> {
        let (events, events_rx) = mpsc::channel();
        let (outcomes, outcomes_rx) = mpsc::channel();

        let notify = |events: &mpsc::Sender<SessionEvent>| {
            let events = events.clone();
            move |done: WorkerDone| {
                let _ = events.send(SessionEvent::Worker(done));
            }
        };
        let video = SocketWorker::spawn(StreamKind::Video, notify(&events))?;
        let audio = SocketWorker::spawn(StreamKind::Audio, notify(&events))?;

        let shared = Arc::new(Shared {
            session: Mutex::new(Session {
                state: WorkerSessionState::Idle,
                id: 0,
                ok: true,
                message: String::new(),
                encoder: None,
            }),
            video,
            audio,
            launcher,
            events,
            outcomes,
            progress: Arc::new(AtomicU32::new(0)),
            preview: Arc::new(Mutex::new(None)),
        });

        let control_shared = Arc::clone(&shared);
        let control = std::thread::Builder::new()
            .name("wavescope-control".to_owned())
            .spawn(move || control_loop(&control_shared, &events_rx))
            .map_err(|e| WavescopeError::io(format!("failed to spawn control thread: {e}")))?;

        Ok(Self {
            shared,
            control: Some(control),
            outcomes: Mutex::new(outcomes_rx),
        })
    }

    pub fn state(&self) -> WorkerSessionState {
        self.shared.lock_session().state
    }

    /// Start a session for `job`, opening its input on the worker threads.
    ///
    /// Returns `false` without doing anything unless the orchestrator is `Idle`.
    pub fn work(&self, job: &RenderJob) -> bool {
        self.begin(job, None)
    }

    /// Like [`RenderWorker::work`], reading from `provider` instead of the job's input file.
    pub fn work_with_provider(&self, job: &RenderJob, provider: Arc<dyn SourceProvider>) -> bool {
        self.begin(job, Some(provider))
    }

    /// Stop the running session: abort both workers and ask the encoder to quit.
    ///
    /// The session still reports its outcome once the encoder exits.
    pub fn request_stop(&self) {
        let mut s = self.shared.lock_session();
        if s.state == WorkerSessionState::Running {
            tracing::info!(session = s.id, "stop requested");
            self.shared.stop_locked(&mut s);
        }
    }

    /// Fraction of the current (or last) session's video rendered, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        f64::from(self.shared.progress.load(Ordering::Relaxed)) / 1000.0
    }

    /// Most recent preview frame of the video stream.
    pub fn latest_preview(&self) -> Option<FrameRGBA> {
        self.shared
            .preview
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Block until the next session outcome arrives.
    pub fn recv_outcome(&self) -> Option<SessionOutcome> {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv()
            .ok()
    }

    pub fn recv_outcome_timeout(&self, timeout: Duration) -> Option<SessionOutcome> {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv_timeout(timeout)
            .ok()
    }

    fn begin(&self, job: &RenderJob, provider: Option<Arc<dyn SourceProvider>>) -> bool {
        let shared = &self.shared;
        let mut s = shared.lock_session();
        if s.state != WorkerSessionState::Idle {
            tracing::debug!(state = ?s.state, "work ignored: session in progress");
            return false;
        }
        s.state = WorkerSessionState::Initializing;
        s.ok = true;
        s.message.clear();
        s.id += 1;
        let session = s.id;

        if let Some(stale) = s.encoder.take() {
            drop(s);
            tracing::debug!("stopping previous encoder");
            stale.kill_and_wait();
            s = shared.lock_session();
        }

        tracing::info!(session, output = %job.output.display(), "starting render session");
        match shared.launch_session(session, job, provider) {
            Ok(encoder) => {
                s.encoder = Some(encoder);
                s.state = WorkerSessionState::Running;
            }
            Err(e) => {
                tracing::error!(session, error = %e, "render session failed to start");
                s.state = WorkerSessionState::Idle;
                shared.emit(SessionOutcome {
                    ok: false,
                    message: e.to_string(),
                });
            }
        }
        true
    }
}

impl Drop for RenderWorker {
    fn drop(&mut self) {
        {
            let mut s = self.shared.lock_session();
            if s.state == WorkerSessionState::Running {
                self.shared.stop_locked(&mut s);
            }
            if let Some(encoder) = s.encoder.take() {
                encoder.kill_and_wait();
            }
        }
        let _ = self.shared.events.send(SessionEvent::Shutdown);
        if let Some(control) = self.control.take()
            && control.join().is_err()
        {
            tracing::warn!("control thread panicked");
        }
    }
}

impl Shared {
    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, outcome: SessionOutcome) {
        tracing::info!(ok = outcome.ok, message = %outcome.message, "render session finished");
        if self.outcomes.send(outcome).is_err() {
            tracing::debug!("session outcome dropped: no receiver");
        }
    }

    /// Arm both workers, launch the encoder and start streaming.
    #[tracing::instrument(skip(self, job, provider))]
    fn launch_session(
        &self,
        session: u64,
        job: &RenderJob,
        provider: Option<Arc<dyn SourceProvider>>,
    ) -> WavescopeResult<EncoderHandle> {
        job.validate()?;
        ensure_parent_dir(&job.output)?;

        let video = self
            .video
            .init(session, self.video_factory(job, provider.clone()))?;
        let audio = match self.audio.init(session, audio_factory(job, provider)) {
            Ok(audio) => audio,
            Err(e) => {
                self.video.discard();
                return Err(e);
            }
        };
        let discard = || {
            self.video.discard();
            self.audio.discard();
        };

        let Some(format) = audio.audio_format else {
            discard();
            return Err(WavescopeError::validation("audio worker reported no sample format"));
        };
        let args = EncoderArgs::new(
            &job.global,
            video.url,
            audio.url,
            format.sample_rate,
            format.channels,
            &job.output,
        );
        let process = match self.launcher.launch(job.ffmpeg_path.as_deref(), &args) {
            Ok(process) => process,
            Err(e) => {
                discard();
                return Err(e.into());
            }
        };
        let encoder = EncoderHandle {
            process: Arc::new(Mutex::new(process)),
            stop_requested: Arc::new(AtomicBool::new(false)),
        };

        let monitor = encoder.clone();
        let events = self.events.clone();
        if let Err(e) = std::thread::Builder::new()
            .name("wavescope-encoder-monitor".to_owned())
            .spawn(move || monitor_encoder(session, &monitor, &events))
        {
            discard();
            encoder.kill_and_wait();
            return Err(WavescopeError::io(format!("failed to spawn encoder monitor: {e}")));
        }

        if let Err(e) = self.video.start().and_then(|()| self.audio.start()) {
            encoder.kill_and_wait();
            return Err(e);
        }
        Ok(encoder)
    }

    fn video_factory(&self, job: &RenderJob, provider: Option<Arc<dyn SourceProvider>>) -> ProducerFactory {
        let job = job.clone();
        let progress = Arc::clone(&self.progress);
        let preview = Arc::clone(&self.preview);
        Box::new(move || {
            let renderer = match &provider {
                Some(p) => ScopeRenderer::from_provider(p.as_ref(), &job)?,
                None => ScopeRenderer::from_job(&job)?,
            };
            Ok(Box::new(VideoProducer::new(
                renderer,
                job.global.background_color,
                job.global.fps,
                progress,
                preview,
            )) as Box<dyn UnitProducer>)
        })
    }

    fn stop_locked(&self, s: &mut Session) {
        self.video.request_stop();
        self.audio.request_stop();
        s.ok = false;
        if s.message.is_empty() {
            s.message = STOP_MESSAGE.to_owned();
        }
        if let Some(encoder) = &s.encoder {
            encoder.terminate();
        }
    }

    fn on_worker_done(&self, done: WorkerDone) {
        let mut s = self.lock_session();
        if done.session != s.id || s.state != WorkerSessionState::Running {
            tracing::debug!(kind = %done.kind, session = done.session, "stale worker report");
            return;
        }
        tracing::debug!(kind = %done.kind, ok = done.ok, message = %done.message, "worker done");
        s.ok &= done.ok;
        if s.message.is_empty() && !done.message.is_empty() {
            s.message = done.message;
        }
        if !s.ok {
            self.stop_locked(&mut s);
        }
    }

    fn on_encoder_exit(&self, session: u64, code: Option<i32>) {
        let mut s = self.lock_session();
        if session != s.id || s.state != WorkerSessionState::Running {
            tracing::debug!(session, ?code, "stale encoder exit");
            return;
        }
        self.video.request_stop();
        self.audio.request_stop();
        if code != Some(0) {
            s.ok = false;
            if s.message.is_empty() {
                s.message = SubprocessError::AbnormalExit {
                    code: code.unwrap_or(-1),
                }
                .to_string();
            }
        }
        s.state = WorkerSessionState::Idle;
        self.emit(SessionOutcome {
            ok: s.ok,
            message: s.message.clone(),
        });
    }
}

fn audio_factory(job: &RenderJob, provider: Option<Arc<dyn SourceProvider>>) -> ProducerFactory {
    let job = job.clone();
    Box::new(move || {
        let player = match &provider {
            Some(p) => Player::from_provider(p.as_ref(), job.global.fps)?,
            None => Player::from_job(&job)?,
        };
        Ok(Box::new(AudioProducer::new(player)) as Box<dyn UnitProducer>)
    })
}

fn control_loop(shared: &Shared, events: &mpsc::Receiver<SessionEvent>) {
    for event in events {
        match event {
            SessionEvent::Worker(done) => shared.on_worker_done(done),
            SessionEvent::EncoderExited { session, code } => shared.on_encoder_exit(session, code),
            SessionEvent::Shutdown => break,
        }
    }
}

fn monitor_encoder(session: u64, encoder: &EncoderHandle, events: &mpsc::Sender<SessionEvent>) {
    let mut stop_seen: Option<Instant> = None;
    let mut killed = false;
    loop {
        let status = encoder.lock().try_wait();
        match status {
            Ok(Some(code)) => {
                let _ = events.send(SessionEvent::EncoderExited { session, code });
                return;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "lost track of encoder process");
                let _ = events.send(SessionEvent::EncoderExited { session, code: None });
                return;
            }
        }
        if !killed && encoder.stop_requested.load(Ordering::Acquire) {
            let since = *stop_seen.get_or_insert_with(Instant::now);
            if since.elapsed() >= TERMINATE_GRACE {
                tracing::warn!("encoder ignored quit request, killing it");
                encoder.lock().kill();
                killed = true;
            }
        }
        std::thread::sleep(EXIT_POLL);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/worker/orchestrator.rs"]
mod tests;

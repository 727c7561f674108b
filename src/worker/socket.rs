use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::encode::write_opaque_rgba8;
use crate::foundation::core::Rgba8;
use crate::foundation::error::{WavescopeError, WavescopeResult};
use crate::render::{FrameRGBA, Player, ScopeRenderer};
use crate::worker::endpoint::{Connection, LocalEndpoint};

/// Message a worker reports when it aborted instead of finishing.
pub const ABORTED_MESSAGE: &str = "Rendering aborted";

/// Which raw stream a [`SocketWorker`] serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Video,
    Audio,
}

impl StreamKind {
    pub fn endpoint_prefix(self) -> &'static str {
        match self {
            Self::Video => "wsvid-",
            Self::Audio => "wsaud-",
        }
    }

    fn write_error_prefix(self) -> &'static str {
        match self {
            Self::Video => "Error writing frame data: ",
            Self::Audio => "Error writing audio data: ",
        }
    }

    fn thread_name(self) -> &'static str {
        match self {
            Self::Video => "wavescope-video",
            Self::Audio => "wavescope-audio",
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Video => "video",
            Self::Audio => "audio",
        })
    }
}

/// Interleaved f32 PCM layout of an audio stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Produces the byte units one worker streams, one unit per frame tick.
pub trait UnitProducer {
    fn has_more(&self) -> bool;

    /// Replace the contents of `out` with the next unit.
    fn produce(&mut self, out: &mut Vec<u8>) -> WavescopeResult<()>;

    /// Called after each unit was fully written.
    fn unit_written(&mut self) {}

    /// PCM layout, for audio producers.
    fn audio_format(&self) -> Option<AudioFormat> {
        None
    }

    /// Called once when the stream loop ends, whatever the reason.
    fn finish(&mut self, _stats: &StreamStats) {}
}

/// Builds a producer on the worker thread.
pub type ProducerFactory =
    Box<dyn FnOnce() -> WavescopeResult<Box<dyn UnitProducer>> + Send + 'static>;

/// Counters of one stream loop.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StreamStats {
    pub units: u64,
    pub produce_time: Duration,
    pub write_time: Duration,
}

/// Reply to a successful [`SocketWorker::init`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerReady {
    pub url: String,
    pub audio_format: Option<AudioFormat>,
}

/// Completion of one worker's stream, reported exactly once per started session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerDone {
    pub kind: StreamKind,
    pub session: u64,
    pub ok: bool,
    pub message: String,
}

enum WorkerCommand {
    Init {
        session: u64,
        factory: ProducerFactory,
        reply: mpsc::Sender<WavescopeResult<WorkerReady>>,
    },
    Start,
    Discard,
    Shutdown,
}

struct Armed {
    session: u64,
    endpoint: LocalEndpoint,
    producer: Box<dyn UnitProducer>,
}

/// Long-lived thread that streams one raw media stream to a single consumer per session.
///
/// A session is armed with [`SocketWorker::init`], which binds a fresh endpoint and builds the
/// producer, and runs once [`SocketWorker::start`] is called. The worker accepts one
/// connection, writes units until the producer runs out or the abort flag is set, and reports
/// one [`WorkerDone`].
pub struct SocketWorker {
    kind: StreamKind,
    commands: mpsc::Sender<WorkerCommand>,
    abort: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl std::fmt::Debug for SocketWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketWorker")
            .field("kind", &self.kind)
            .field("abort", &self.abort.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl SocketWorker {
    pub fn spawn(
        kind: StreamKind,
        on_done: impl Fn(WorkerDone) + Send + 'static,
    ) -> WavescopeResult<Self> {
        let (commands, rx) = mpsc::channel();
        let abort = Arc::new(AtomicBool::new(false));
        let thread_abort = Arc::clone(&abort);
        let thread = std::thread::Builder::new()
            .name(kind.thread_name().to_owned())
            .spawn(move || worker_loop(kind, &rx, &thread_abort, &on_done))
            .map_err(|e| WavescopeError::io(format!("failed to spawn {kind} worker: {e}")))?;
        Ok(Self {
            kind,
            commands,
            abort,
            thread: Some(thread),
        })
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Bind a new endpoint and build the producer for `session`. Blocks until the worker replied.
    pub fn init(&self, session: u64, factory: ProducerFactory) -> WavescopeResult<WorkerReady> {
        let (reply, reply_rx) = mpsc::channel();
        self.send(WorkerCommand::Init {
            session,
            factory,
            reply,
        })?;
        reply_rx
            .recv()
            .map_err(|_| WavescopeError::io(format!("{} worker stopped", self.kind)))?
    }

    /// Begin accepting on the armed endpoint.
    pub fn start(&self) -> WavescopeResult<()> {
        self.send(WorkerCommand::Start)
    }

    /// Drop an armed session without running it.
    pub fn discard(&self) {
        if self.send(WorkerCommand::Discard).is_err() {
            tracing::debug!(kind = %self.kind, "discard sent to stopped worker");
        }
    }

    /// Ask the running stream loop to stop after the current unit.
    pub fn request_stop(&self) {
        self.abort.store(true, Ordering::Release);
    }

    fn send(&self, cmd: WorkerCommand) -> WavescopeResult<()> {
        self.commands
            .send(cmd)
            .map_err(|_| WavescopeError::io(format!("{} worker stopped", self.kind)))
    }
}

impl Drop for SocketWorker {
    fn drop(&mut self) {
        self.request_stop();
        let _ = self.commands.send(WorkerCommand::Shutdown);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::warn!(kind = %self.kind, "worker thread panicked");
        }
    }
}

fn worker_loop(
    kind: StreamKind,
    commands: &mpsc::Receiver<WorkerCommand>,
    abort: &AtomicBool,
    on_done: &dyn Fn(WorkerDone),
) {
    let mut armed: Option<Armed> = None;
    for cmd in commands {
        match cmd {
            WorkerCommand::Init {
                session,
                factory,
                reply,
            } => {
                armed = None;
                abort.store(false, Ordering::Release);
                let ready = match arm(kind, session, factory) {
                    Ok(a) => {
                        let ready = WorkerReady {
                            url: a.endpoint.url(),
                            audio_format: a.producer.audio_format(),
                        };
                        armed = Some(a);
                        Ok(ready)
                    }
                    Err(e) => Err(e),
                };
                if reply.send(ready).is_err() {
                    // caller went away; nothing will start this session
                    armed = None;
                }
            }
            WorkerCommand::Start => {
                let Some(Armed {
                    session,
                    endpoint,
                    mut producer,
                }) = armed.take()
                else {
                    tracing::debug!(%kind, "start without an armed session");
                    continue;
                };
                let (ok, message, conn) = run_stream(kind, &endpoint, producer.as_mut(), abort);
                // report before the consumer can observe end of stream
                on_done(WorkerDone {
                    kind,
                    session,
                    ok,
                    message,
                });
                drop(conn);
                drop(endpoint);
            }
            WorkerCommand::Discard => armed = None,
            WorkerCommand::Shutdown => break,
        }
    }
}

fn arm(kind: StreamKind, session: u64, factory: ProducerFactory) -> WavescopeResult<Armed> {
    let producer = factory()?;
    let endpoint = LocalEndpoint::bind(kind.endpoint_prefix())
        .map_err(|e| WavescopeError::io(format!("failed to listen for {kind} stream: {e}")))?;
    Ok(Armed {
        session,
        endpoint,
        producer,
    })
}

#[tracing::instrument(skip_all, fields(%kind))]
fn run_stream(
    kind: StreamKind,
    endpoint: &LocalEndpoint,
    producer: &mut dyn UnitProducer,
    abort: &AtomicBool,
) -> (bool, String, Option<Connection>) {
    let mut conn = match endpoint.accept(abort) {
        Ok(Some(conn)) => conn,
        Ok(None) => return (true, ABORTED_MESSAGE.to_owned(), None),
        Err(e) => return (false, format!("{}{e}", kind.write_error_prefix()), None),
    };
    tracing::debug!("consumer connected");

    let mut stats = StreamStats::default();
    let mut unit = Vec::new();
    let mut failure = None;
    while producer.has_more() && !abort.load(Ordering::Acquire) {
        let t0 = Instant::now();
        if let Err(e) = producer.produce(&mut unit) {
            failure = Some(e.to_string());
            break;
        }
        let t1 = Instant::now();
        if let Err(e) = conn.write_all(&unit) {
            failure = Some(format!("{}{e}", kind.write_error_prefix()));
            break;
        }
        stats.produce_time += t1 - t0;
        stats.write_time += t1.elapsed();
        stats.units += 1;
        producer.unit_written();
    }
    if failure.is_none()
        && let Err(e) = conn.flush()
    {
        failure = Some(format!("{}{e}", kind.write_error_prefix()));
    }
    producer.finish(&stats);

    let (ok, message) = match failure {
        Some(message) => {
            tracing::warn!(units = stats.units, %message, "stream failed");
            (false, message)
        }
        None if abort.load(Ordering::Acquire) => (true, ABORTED_MESSAGE.to_owned()),
        None => (true, String::new()),
    };
    (ok, message, Some(conn))
}

/// Most recent preview frame, shared with observers.
pub type PreviewSlot = Arc<Mutex<Option<FrameRGBA>>>;

/// Streams opaque RGBA frames from a [`ScopeRenderer`].
pub struct VideoProducer {
    renderer: ScopeRenderer,
    background: Rgba8,
    preview_interval: u64,
    frames: u64,
    last_frame: Option<FrameRGBA>,
    progress: Arc<AtomicU32>,
    preview: PreviewSlot,
    advance_time: Duration,
    paint_time: Duration,
}

impl VideoProducer {
    /// `progress` receives the renderer progress in permille after every frame; `preview`
    /// receives a copy of every `max(1, fps / 2)`-th frame.
    pub fn new(
        renderer: ScopeRenderer,
        background: Rgba8,
        fps: u32,
        progress: Arc<AtomicU32>,
        preview: PreviewSlot,
    ) -> Self {
        progress.store(0, Ordering::Relaxed);
        Self {
            renderer,
            background,
            preview_interval: u64::from((fps / 2).max(1)),
            frames: 0,
            last_frame: None,
            progress,
            preview,
            advance_time: Duration::ZERO,
            paint_time: Duration::ZERO,
        }
    }
}

impl UnitProducer for VideoProducer {
    fn has_more(&self) -> bool {
        self.renderer.has_frames_remaining()
    }

    fn produce(&mut self, out: &mut Vec<u8>) -> WavescopeResult<()> {
        let t0 = Instant::now();
        self.renderer.advance_frame()?;
        let t1 = Instant::now();
        let frame = self.renderer.paint()?;
        self.advance_time += t1 - t0;
        self.paint_time += t1.elapsed();
        write_opaque_rgba8(&frame, self.background, out)?;
        self.last_frame = Some(frame);
        Ok(())
    }

    fn unit_written(&mut self) {
        if self.frames.is_multiple_of(self.preview_interval)
            && let Some(frame) = self.last_frame.take()
        {
            *self.preview.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame);
        }
        self.frames += 1;
        let permille = (self.renderer.progress() * 1000.0).round().clamp(0.0, 1000.0) as u32;
        self.progress.store(permille, Ordering::Relaxed);
    }

    fn finish(&mut self, stats: &StreamStats) {
        let n = stats.units.max(1) as f64;
        tracing::info!(
            frames = stats.units,
            avg_advance_ms = self.advance_time.as_secs_f64() * 1000.0 / n,
            avg_paint_ms = self.paint_time.as_secs_f64() * 1000.0 / n,
            avg_write_ms = stats.write_time.as_secs_f64() * 1000.0 / n,
            "video stream finished"
        );
    }
}

/// Streams little-endian f32 PCM from a [`Player`].
#[derive(Debug)]
pub struct AudioProducer {
    player: Player,
}

impl AudioProducer {
    pub fn new(player: Player) -> Self {
        Self { player }
    }
}

impl UnitProducer for AudioProducer {
    fn has_more(&self) -> bool {
        self.player.is_playing()
    }

    fn produce(&mut self, out: &mut Vec<u8>) -> WavescopeResult<()> {
        let samples = self.player.next_wave_data()?;
        out.clear();
        out.reserve(samples.len() * 4);
        for s in samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        Ok(())
    }

    fn audio_format(&self) -> Option<AudioFormat> {
        Some(AudioFormat {
            sample_rate: self.player.sample_rate(),
            channels: self.player.channels(),
        })
    }

    fn finish(&mut self, stats: &StreamStats) {
        tracing::debug!(batches = stats.units, "audio stream finished");
    }
}

#[cfg(test)]
#[path = "../../tests/unit/worker/socket.rs"]
mod tests;

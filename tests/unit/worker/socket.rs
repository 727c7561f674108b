use std::io::Read;
use std::time::Duration;

use super::*;
use crate::source::MemorySource;
use crate::worker::endpoint::connect;

const DONE_TIMEOUT: Duration = Duration::from_secs(20);

/// Emits `remaining` units of `unit_len` copies of the unit index.
struct CountingProducer {
    remaining: u32,
    unit_len: usize,
    next: u8,
}

impl UnitProducer for CountingProducer {
    fn has_more(&self) -> bool {
        self.remaining > 0
    }

    fn produce(&mut self, out: &mut Vec<u8>) -> WavescopeResult<()> {
        out.clear();
        out.resize(self.unit_len, self.next);
        self.next = self.next.wrapping_add(1);
        self.remaining -= 1;
        Ok(())
    }
}

fn counting(units: u32, unit_len: usize) -> ProducerFactory {
    Box::new(move || {
        Ok(Box::new(CountingProducer {
            remaining: units,
            unit_len,
            next: 0,
        }) as Box<dyn UnitProducer>)
    })
}

fn spawn_worker(kind: StreamKind) -> (SocketWorker, mpsc::Receiver<WorkerDone>) {
    let (tx, rx) = mpsc::channel();
    let worker = SocketWorker::spawn(kind, move |done| {
        let _ = tx.send(done);
    })
    .unwrap();
    (worker, rx)
}

#[test]
fn streams_every_unit_then_reports_success() {
    let (worker, done) = spawn_worker(StreamKind::Video);
    let ready = worker.init(7, counting(3, 4)).unwrap();
    assert!(ready.url.contains("wsvid-"));
    assert_eq!(ready.audio_format, None);

    let reader = std::thread::spawn(move || {
        let mut conn = connect(&ready.url).unwrap();
        let mut bytes = Vec::new();
        conn.read_to_end(&mut bytes).unwrap();
        bytes
    });
    worker.start().unwrap();

    let done = done.recv_timeout(DONE_TIMEOUT).unwrap();
    assert_eq!(
        done,
        WorkerDone {
            kind: StreamKind::Video,
            session: 7,
            ok: true,
            message: String::new(),
        }
    );
    assert_eq!(reader.join().unwrap(), [0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2]);
}

#[test]
fn abort_before_connection_reports_aborted() {
    let (worker, done) = spawn_worker(StreamKind::Audio);
    worker.init(1, counting(3, 4)).unwrap();
    worker.start().unwrap();
    worker.request_stop();

    let done = done.recv_timeout(DONE_TIMEOUT).unwrap();
    assert!(done.ok);
    assert_eq!(done.message, ABORTED_MESSAGE);
}

#[test]
fn consumer_hangup_reports_write_error() {
    let (worker, done) = spawn_worker(StreamKind::Audio);
    let ready = worker.init(2, counting(u32::MAX, 1 << 16)).unwrap();
    worker.start().unwrap();
    drop(connect(&ready.url).unwrap());

    let done = done.recv_timeout(DONE_TIMEOUT).unwrap();
    assert!(!done.ok);
    assert!(
        done.message.starts_with("Error writing audio data: "),
        "{}",
        done.message
    );
}

#[test]
fn factory_failure_is_returned_from_init() {
    let (worker, _done) = spawn_worker(StreamKind::Video);
    let err = worker
        .init(3, Box::new(|| Err(WavescopeError::config("bad renderer"))))
        .unwrap_err();
    assert!(err.to_string().contains("bad renderer"));

    // the worker stays usable for the next session
    assert!(worker.init(4, counting(1, 1)).is_ok());
}

#[test]
fn discarded_sessions_never_report() {
    let (worker, done) = spawn_worker(StreamKind::Video);
    worker.init(5, counting(1, 1)).unwrap();
    worker.discard();
    worker.start().unwrap();
    assert!(done.recv_timeout(Duration::from_millis(200)).is_err());
}

#[test]
fn audio_units_are_little_endian_f32() {
    let source = MemorySource::new(4, 2, vec![0.5f32, -0.25, 1.0, 0.0]);
    let player = Player::new(Box::new(source), 2).unwrap();
    let mut producer = AudioProducer::new(player);
    assert_eq!(
        producer.audio_format(),
        Some(AudioFormat {
            sample_rate: 4,
            channels: 2
        })
    );

    let mut out = Vec::new();
    producer.produce(&mut out).unwrap();
    let expected: Vec<u8> = [0.5f32, -0.25, 1.0, 0.0]
        .iter()
        .flat_map(|s| s.to_le_bytes())
        .collect();
    assert_eq!(out, expected);
    assert!(!producer.has_more());
}

#[test]
fn stream_kinds_use_distinct_prefixes() {
    assert_eq!(StreamKind::Video.endpoint_prefix(), "wsvid-");
    assert_eq!(StreamKind::Audio.endpoint_prefix(), "wsaud-");
    assert_eq!(StreamKind::Audio.to_string(), "audio");
}

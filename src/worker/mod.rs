//! Session plumbing: local stream endpoints, the video/audio socket workers and the
//! orchestrator that ties them to one encoder process.

pub mod endpoint;
pub mod orchestrator;
pub mod socket;

pub use endpoint::{Connection, LocalEndpoint};
pub use orchestrator::{RenderWorker, STOP_MESSAGE, SessionOutcome, WorkerSessionState};
pub use socket::{
    ABORTED_MESSAGE, AudioFormat, AudioProducer, ProducerFactory, SocketWorker, StreamKind,
    StreamStats, UnitProducer, VideoProducer, WorkerDone, WorkerReady,
};

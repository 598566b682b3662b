//! Concurrent extraction pipeline.
//!
//! Workers drain the [`TaskQueue`], decode chunks through the
//! [`ChunkExtractor`], and push [`BuildResult`]s into the [`ResultSink`].
//! Results are applied only from the controller's periodic tick, never by a
//! worker: applying mutates the host's authoritative state and must stay
//! serialized on a single logical caller.

mod extractor;
mod queue;
mod sink;
mod worker;

pub use extractor::{ChunkExtractor, ExtractOutcome, SkipReason};
pub use queue::{Task, TaskQueue};
pub use sink::{ApplyError, ApplySink, BuildResult, ResultSink};
pub use worker::{WorkerPool, PAUSE_POLL_INTERVAL};

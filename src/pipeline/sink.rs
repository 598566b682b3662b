//! Result queue and the apply boundary.
//!
//! Workers push from any thread; results leave the sink only through
//! [`ResultSink::apply_batch`], which the job controller invokes from its
//! single periodic tick. Duplicate suppression against the checkpoint store
//! happens here, both when applying and when restoring a persisted dump.

use std::collections::VecDeque;
use std::fs;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use thiserror::Error;
use tracing::warn;

use crate::checkpoint::CheckpointStore;
use crate::coord::ChunkCoord;

use super::queue::parse_coord_line;

/// A decoded chunk awaiting application: coordinate plus serialized
/// payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    pub coord: ChunkCoord,
    pub payload: Vec<u8>,
}

impl BuildResult {
    pub fn new(coord: ChunkCoord, payload: Vec<u8>) -> Self {
        Self { coord, payload }
    }
}

/// Error from the external apply delegate.
#[derive(Debug, Error)]
#[error("apply failed for chunk: {0}")]
pub struct ApplyError(pub String);

/// External consumer of applied results.
///
/// Implemented outside the core (the host writes into its authoritative
/// state). Invoked once per non-duplicate result, always from the single
/// logical caller driving [`ResultSink::apply_batch`].
pub trait ApplySink: Send {
    fn apply(&mut self, result: &BuildResult) -> Result<(), ApplyError>;
}

impl<F> ApplySink for F
where
    F: FnMut(&BuildResult) -> Result<(), ApplyError> + Send,
{
    fn apply(&mut self, result: &BuildResult) -> Result<(), ApplyError> {
        self(result)
    }
}

/// Multi-producer queue of pending results with a single logical consumer.
#[derive(Debug, Default)]
pub struct ResultSink {
    queue: Mutex<VecDeque<BuildResult>>,
}

impl ResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a result. Callable from any worker thread.
    pub fn push(&self, result: BuildResult) {
        self.queue.lock().unwrap().push_back(result);
    }

    /// Number of results awaiting application.
    pub fn pending(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// True when no results are pending.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().unwrap().is_empty()
    }

    /// Apply up to `max` pending results.
    ///
    /// A result whose checkpoint bit is already set is discarded without
    /// touching the delegate (duplicate suppression, not an error). A
    /// delegate failure is logged and the result dropped; extraction
    /// continues. Returns the count actually applied.
    pub fn apply_batch(
        &self,
        max: usize,
        checkpoints: &CheckpointStore,
        sink: &mut dyn ApplySink,
    ) -> usize {
        let mut applied = 0;
        while applied < max {
            let result = match self.queue.lock().unwrap().pop_front() {
                Some(r) => r,
                None => break,
            };
            if checkpoints.is_chunk_done(result.coord) {
                continue;
            }
            if let Err(e) = sink.apply(&result) {
                warn!("apply failed for chunk {}: {}", result.coord, e);
                continue;
            }
            if let Err(e) = checkpoints.mark_chunk_done(result.coord) {
                warn!("failed to checkpoint chunk {}: {}", result.coord, e);
            }
            applied += 1;
        }
        applied
    }

    /// Drain every pending result to a file, one `x,z,<base64 payload>`
    /// line each. Returns the number of entries written.
    pub fn drain_to_file(&self, path: &Path) -> io::Result<usize> {
        let drained: Vec<BuildResult> = {
            let mut queue = self.queue.lock().unwrap();
            queue.drain(..).collect()
        };
        let mut writer = BufWriter::new(fs::File::create(path)?);
        for result in &drained {
            writeln!(
                writer,
                "{},{},{}",
                result.coord.x,
                result.coord.z,
                BASE64.encode(&result.payload)
            )?;
        }
        writer.flush()?;
        Ok(drained.len())
    }

    /// Restore results from a file written by [`drain_to_file`], skipping
    /// malformed lines and coordinates already checkpointed. Returns the
    /// number of entries restored.
    ///
    /// [`drain_to_file`]: ResultSink::drain_to_file
    pub fn load_from_file(&self, path: &Path, checkpoints: &CheckpointStore) -> io::Result<usize> {
        let reader = BufReader::new(fs::File::open(path)?);
        let mut restored = 0;
        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (coord_part, payload_part) = match line.rsplit_once(',') {
                Some(parts) => parts,
                None => continue,
            };
            let coord = match parse_coord_line(coord_part) {
                Some(c) => c,
                None => continue,
            };
            if checkpoints.is_chunk_done(coord) {
                continue;
            }
            let payload = match BASE64.decode(payload_part) {
                Ok(p) => p,
                Err(_) => continue,
            };
            self.push(BuildResult::new(coord, payload));
            restored += 1;
        }
        Ok(restored)
    }
}

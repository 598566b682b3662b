//! Worker pool draining the task queue.
//!
//! Each worker runs a simple state machine: cancelled → exit; paused →
//! sleep and re-check; otherwise pop a task and decode it. An empty queue
//! ends the worker, so the pool drains naturally when the job's task set is
//! exhausted. Pause is cooperative with bounded latency; the cancel flag is
//! re-checked on every pause-poll iteration so cancellation always
//! terminates a paused worker promptly.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use super::extractor::{ChunkExtractor, ExtractOutcome};
use super::queue::TaskQueue;
use super::sink::{BuildResult, ResultSink};

/// How often a paused worker re-checks the pause and cancel flags.
pub const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Shared control flags, owned by the pool and polled by every worker.
#[derive(Debug, Default)]
struct Control {
    paused: AtomicBool,
    cancelled: AtomicBool,
}

/// Fixed-size pool of extraction workers.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    control: Arc<Control>,
}

impl WorkerPool {
    /// Spawn `threads` workers draining `queue` into `sink`.
    ///
    /// Every popped task bumps `completed` exactly once, whether or not it
    /// produced a result, keeping progress monotonic.
    pub fn spawn(
        threads: usize,
        queue: Arc<TaskQueue>,
        sink: Arc<ResultSink>,
        extractor: Arc<ChunkExtractor>,
        completed: Arc<AtomicU64>,
    ) -> WorkerPool {
        let control = Arc::new(Control::default());
        let mut handles = Vec::with_capacity(threads);
        for index in 0..threads {
            let queue = queue.clone();
            let sink = sink.clone();
            let extractor = extractor.clone();
            let completed = completed.clone();
            let control = control.clone();
            let handle = thread::Builder::new()
                .name(format!("extract-worker-{}", index))
                .spawn(move || {
                    worker_loop(&queue, &sink, &extractor, &completed, &control);
                    debug!("worker {} finished", index);
                })
                .expect("failed to spawn extraction worker");
            handles.push(handle);
        }
        WorkerPool { handles, control }
    }

    /// Ask workers to stop picking up tasks. Takes effect within one poll
    /// interval; in-flight decodes finish first.
    pub fn pause(&self) {
        self.control.paused.store(true, Ordering::Relaxed);
    }

    /// Let paused workers continue.
    pub fn resume(&self) {
        self.control.paused.store(false, Ordering::Relaxed);
    }

    /// Whether the pool is currently paused.
    pub fn is_paused(&self) -> bool {
        self.control.paused.load(Ordering::Relaxed)
    }

    /// Cancel all workers and wait for them to exit. Abandons any tasks
    /// still queued; safe because decoding has no external side effects
    /// until a result reaches the sink.
    pub fn stop(&mut self) {
        self.control.cancelled.store(true, Ordering::Relaxed);
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.join() {
                warn!("extraction worker panicked: {:?}", e);
            }
        }
    }

    /// True while any worker thread is still running.
    pub fn is_running(&self) -> bool {
        self.handles.iter().any(|h| !h.is_finished())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(
    queue: &TaskQueue,
    sink: &ResultSink,
    extractor: &ChunkExtractor,
    completed: &AtomicU64,
    control: &Control,
) {
    loop {
        if control.cancelled.load(Ordering::Relaxed) {
            return;
        }
        if control.paused.load(Ordering::Relaxed) {
            thread::sleep(PAUSE_POLL_INTERVAL);
            continue;
        }
        let task = match queue.pop() {
            Some(t) => t,
            None => return,
        };
        match extractor.extract(task.coord) {
            ExtractOutcome::Extracted(record) => {
                sink.push(BuildResult::new(task.coord, record.encode_summary()));
            }
            ExtractOutcome::Skipped(reason) => {
                debug!("chunk {} skipped: {}", task.coord, reason);
            }
        }
        completed.fetch_add(1, Ordering::Relaxed);
    }
}

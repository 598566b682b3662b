//! Job lifecycle: start, tick, pause, resume, cancel.
//!
//! One controller owns at most one active job. Everything the job needs
//! (queue, sink, checkpoint store, cache, worker pool, counters) lives in an
//! explicit [`ActiveJob`] value rather than process-wide statics, so tests
//! can run isolated controllers side by side.
//!
//! The controller itself is single-caller: the host drives `tick()`
//! periodically from one logical thread, and result application only ever
//! happens inside `tick()`. Workers never touch the apply sink.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::ExtractionCache;
use crate::checkpoint::{CheckpointError, CheckpointStore};
use crate::coord::{self, ChunkCoord};
use crate::liveness::{LivenessMonitor, NOMINAL_RATE};
use crate::pipeline::{ApplySink, ChunkExtractor, ResultSink, Task, TaskQueue, WorkerPool};
use crate::region::{LocateError, RegionLocator};

use super::config::{JobConfig, JobCounters};

/// Job-state file written on pause, read on resume.
pub const JOB_STATE_FILE: &str = "last_job.state";

/// Pending-task dump written on pause.
pub const QUEUE_DUMP_FILE: &str = "last_queue.dat";

/// Pending-result dump written on pause.
pub const RESULT_DUMP_FILE: &str = "last_results.dat";

/// Smoothing factor for the applied-results/second estimate.
const THROUGHPUT_ALPHA: f64 = 0.2;

/// Errors starting or driving a job.
#[derive(Debug, Error)]
pub enum JobError {
    /// A job is already active; the running job is untouched
    #[error("a job is already active")]
    AlreadyActive,

    /// Configuration rejected before any state change
    #[error("invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    /// The world directory could not be resolved
    #[error(transparent)]
    Locate(#[from] LocateError),

    /// Checkpoint bitmaps reference chunks with no matching output
    #[error("{mismatches} checkpointed chunk(s) have no output; pass force to proceed")]
    Consistency { mismatches: i64 },

    /// Checkpoint store failure
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    /// State file I/O failure
    #[error("job state I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Point-in-time view of the active job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobStatus {
    pub total: u64,
    pub completed: u64,
    pub pending_results: usize,
    pub paused: bool,
    pub liveness: f64,
    pub applied_per_sec: f64,
    pub elapsed: Duration,
}

struct ActiveJob {
    config: JobConfig,
    total: u64,
    completed: Arc<AtomicU64>,
    queue: Arc<TaskQueue>,
    sink: Arc<ResultSink>,
    checkpoints: CheckpointStore,
    pool: WorkerPool,
    throttled: bool,
    applied_ewma: f64,
    last_apply: Instant,
    started: Instant,
}

/// Drives extraction jobs against worlds under one base directory.
pub struct JobController {
    base_dir: PathBuf,
    liveness: Arc<LivenessMonitor>,
    apply: Box<dyn ApplySink>,
    active: Option<ActiveJob>,
}

impl JobController {
    /// Create a controller searching for worlds under `base_dir` and
    /// delegating applied results to `apply`.
    pub fn new(
        base_dir: impl Into<PathBuf>,
        liveness: Arc<LivenessMonitor>,
        apply: Box<dyn ApplySink>,
    ) -> Self {
        Self {
            base_dir: base_dir.into(),
            liveness,
            apply,
            active: None,
        }
    }

    /// Whether a job is currently active (running or throttled).
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Start a job. Fails without touching any state when a job is already
    /// active or the configuration is invalid; resumes automatically from
    /// queue/result dumps left behind by a previous pause.
    pub fn start(&mut self, config: JobConfig) -> Result<(), JobError> {
        if self.active.is_some() {
            return Err(JobError::AlreadyActive);
        }

        let mut config = config;
        for warning in config.sanitize() {
            warn!("job config: {}", warning);
        }
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(JobError::InvalidConfig(errors));
        }

        let locator = RegionLocator::resolve(&config.world_id, &self.base_dir)?;
        for issue in locator.validate() {
            warn!("world '{}': {}", config.world_id, issue);
        }

        let checkpoints = CheckpointStore::open(&config.checkpoint_path)?;
        if let Some(output_dir) = &config.output_path {
            match checkpoints.validate_against_output(output_dir) {
                0 => {}
                m if m < 0 => warn!("checkpoint consistency scan failed; continuing"),
                mismatches if config.force => {
                    warn!(
                        "{} checkpointed chunk(s) have no output; forced start, \
                         bitmaps left as-is",
                        mismatches
                    );
                }
                mismatches => return Err(JobError::Consistency { mismatches }),
            }
        }

        let radius = coord::chunk_radius(config.radius);
        let total = coord::total_chunks(config.radius);
        let queue = self.build_queue(&checkpoints, radius)?;
        let sink = self.build_sink(&checkpoints)?;
        let completed = total.saturating_sub(queue.len() as u64);

        info!(
            "starting extraction of '{}': {} chunk(s) total, {} already done, \
             {} worker(s)",
            config.world_id,
            total,
            completed,
            config.threads
        );

        let queue = Arc::new(queue);
        let sink = Arc::new(sink);
        let completed = Arc::new(AtomicU64::new(completed));
        let extractor = Arc::new(ChunkExtractor::new(
            locator,
            Arc::new(ExtractionCache::default()),
        ));
        let pool = WorkerPool::spawn(
            config.threads,
            queue.clone(),
            sink.clone(),
            extractor,
            completed.clone(),
        );

        let now = Instant::now();
        self.active = Some(ActiveJob {
            config,
            total,
            completed,
            queue,
            sink,
            checkpoints,
            pool,
            throttled: false,
            applied_ewma: 0.0,
            last_apply: now,
            started: now,
        });
        Ok(())
    }

    /// Drive one scheduling step: throttle workers on low host liveness and
    /// apply a liveness-scaled batch of results. Returns the number of
    /// results applied. Finalizes the job once every chunk is completed and
    /// applied.
    pub fn tick(&mut self) -> usize {
        let liveness = self.liveness.liveness();
        let job = match self.active.as_mut() {
            Some(j) => j,
            None => return 0,
        };

        // min_liveness of zero disables throttling entirely
        if job.config.min_liveness > 0.0 {
            if liveness < job.config.min_liveness {
                if !job.throttled {
                    info!(
                        "host liveness {:.1} below {:.1}; pausing extraction",
                        liveness, job.config.min_liveness
                    );
                    job.pool.pause();
                    job.throttled = true;
                }
                return 0;
            }
            // Between the threshold and threshold + hysteresis the workers
            // stay paused, but pending results keep flowing to the host
            if job.throttled && liveness >= job.config.min_liveness + job.config.hysteresis {
                info!("host liveness {:.1} recovered; resuming extraction", liveness);
                job.pool.resume();
                job.throttled = false;
            }
        }

        let scaled = ((job.config.batch as f64 * liveness / NOMINAL_RATE).round() as usize).max(1);
        let applied = job
            .sink
            .apply_batch(scaled, &job.checkpoints, self.apply.as_mut());
        if applied > 0 {
            let now = Instant::now();
            let secs = now.duration_since(job.last_apply).as_secs_f64().max(1e-3);
            let rate = applied as f64 / secs;
            job.applied_ewma = THROUGHPUT_ALPHA * rate + (1.0 - THROUGHPUT_ALPHA) * job.applied_ewma;
            job.last_apply = now;
        }

        let done = job.completed.load(Ordering::Relaxed) >= job.total && job.sink.is_empty();
        if done {
            self.finalize();
        }
        applied
    }

    /// Stop the pool and persist the job for a later resume: config plus
    /// counters to the job-state file, pending tasks and results to their
    /// dump files. A controller with no active job is a no-op.
    pub fn pause(&mut self) -> Result<(), JobError> {
        let mut job = match self.active.take() {
            Some(j) => j,
            None => {
                debug!("pause requested with no active job");
                return Ok(());
            }
        };
        job.pool.stop();

        let dir = job.checkpoints.dir();
        let counters = JobCounters {
            total: job.total,
            completed: job.completed.load(Ordering::Relaxed),
        };
        job.config.write_to(&dir.join(JOB_STATE_FILE), counters)?;
        let queued = job.queue.drain_to_file(&dir.join(QUEUE_DUMP_FILE))?;
        let pending = job.sink.drain_to_file(&dir.join(RESULT_DUMP_FILE))?;

        info!(
            "paused extraction of '{}' at {}/{} chunk(s); {} task(s) and \
             {} result(s) persisted",
            job.config.world_id, counters.completed, counters.total, queued, pending
        );
        Ok(())
    }

    /// Resume from a job-state file written by [`pause`]. The queue and
    /// result dumps next to it are picked up by [`start`].
    ///
    /// [`pause`]: JobController::pause
    /// [`start`]: JobController::start
    pub fn resume(&mut self, state_file: &Path) -> Result<(), JobError> {
        let (config, counters) = JobConfig::load_from(state_file)?;
        info!(
            "resuming extraction of '{}' from {}/{} chunk(s)",
            config.world_id, counters.completed, counters.total
        );
        self.start(config)
    }

    /// Abandon the active job: stop the pool and discard pending tasks,
    /// results, and any stale pause state. Checkpoint bitmaps are kept, so
    /// applied chunks stay done.
    pub fn cancel(&mut self) {
        let mut job = match self.active.take() {
            Some(j) => j,
            None => return,
        };
        job.pool.stop();
        let dir = job.checkpoints.dir();
        for file in [JOB_STATE_FILE, QUEUE_DUMP_FILE, RESULT_DUMP_FILE] {
            let _ = fs::remove_file(dir.join(file));
        }
        info!(
            "cancelled extraction of '{}' at {}/{} chunk(s)",
            job.config.world_id,
            job.completed.load(Ordering::Relaxed),
            job.total
        );
    }

    /// Snapshot of the active job, or `None` when idle.
    pub fn status(&self) -> Option<JobStatus> {
        let job = self.active.as_ref()?;
        Some(JobStatus {
            total: job.total,
            completed: job.completed.load(Ordering::Relaxed),
            pending_results: job.sink.pending(),
            paused: job.throttled,
            liveness: self.liveness.liveness(),
            applied_per_sec: job.applied_ewma,
            elapsed: job.started.elapsed(),
        })
    }

    /// Build the task queue: from the pause dump when one exists
    /// (checkpoint-filtered), otherwise the full coordinate grid minus
    /// already-checkpointed chunks.
    fn build_queue(
        &self,
        checkpoints: &CheckpointStore,
        chunk_radius: u32,
    ) -> Result<TaskQueue, JobError> {
        let dump = checkpoints.dir().join(QUEUE_DUMP_FILE);
        let queue = TaskQueue::new();
        if dump.exists() {
            let loaded = TaskQueue::load_from_file(&dump)?;
            let mut skipped = 0usize;
            while let Some(task) = loaded.pop() {
                if checkpoints.is_chunk_done(task.coord) {
                    skipped += 1;
                } else {
                    queue.enqueue(task);
                }
            }
            fs::remove_file(&dump)?;
            info!(
                "restored {} pending task(s) from {} ({} already checkpointed)",
                queue.len(),
                dump.display(),
                skipped
            );
        } else {
            for coord in coord::grid(ChunkCoord::new(0, 0), chunk_radius) {
                if !checkpoints.is_chunk_done(coord) {
                    queue.enqueue(Task::new(coord));
                }
            }
        }
        Ok(queue)
    }

    /// Build the result sink, restoring the pause dump when one exists.
    fn build_sink(&self, checkpoints: &CheckpointStore) -> Result<ResultSink, JobError> {
        let dump = checkpoints.dir().join(RESULT_DUMP_FILE);
        let sink = ResultSink::new();
        if dump.exists() {
            let restored = sink.load_from_file(&dump, checkpoints)?;
            fs::remove_file(&dump)?;
            info!(
                "restored {} pending result(s) from {}",
                restored,
                dump.display()
            );
        }
        Ok(sink)
    }

    fn finalize(&mut self) {
        let mut job = match self.active.take() {
            Some(j) => j,
            None => return,
        };
        job.pool.stop();
        let _ = fs::remove_file(job.checkpoints.dir().join(JOB_STATE_FILE));
        info!(
            "extraction of '{}' complete: {} chunk(s) in {:.1}s",
            job.config.world_id,
            job.total,
            job.started.elapsed().as_secs_f64()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nbt::encode;
    use crate::pipeline::{ApplyError, BuildResult};
    use crate::region::{testutil::write_chunk, COMPRESSION_ZLIB};
    use std::sync::Mutex;
    use std::thread;
    use tempfile::TempDir;

    type Applied = Arc<Mutex<Vec<ChunkCoord>>>;

    struct Harness {
        tmp: TempDir,
        monitor: Arc<LivenessMonitor>,
        applied: Applied,
        controller: JobController,
    }

    fn harness(chunks: &[ChunkCoord]) -> Harness {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("w");
        fs::create_dir_all(root.join("region")).unwrap();
        fs::write(root.join("level.dat"), b"").unwrap();

        let payload = encode::document("", &[]);
        for &coord in chunks {
            let region = coord.region();
            let file = root
                .join("region")
                .join(format!("r.{}.{}.mca", region.x, region.z));
            write_chunk(&file, coord, COMPRESSION_ZLIB, &payload);
        }

        let monitor = Arc::new(LivenessMonitor::new());
        let applied: Applied = Arc::new(Mutex::new(Vec::new()));
        let recorder = applied.clone();
        let controller = JobController::new(
            tmp.path(),
            monitor.clone(),
            Box::new(move |r: &BuildResult| {
                recorder.lock().unwrap().push(r.coord);
                Ok::<(), ApplyError>(())
            }),
        );
        Harness {
            tmp,
            monitor,
            applied,
            controller,
        }
    }

    fn config(h: &Harness, radius: u32) -> JobConfig {
        JobConfig {
            world_id: "w".to_string(),
            radius,
            threads: 2,
            checkpoint_path: h.tmp.path().join("chk"),
            min_liveness: 0.0,
            ..JobConfig::default()
        }
    }

    fn wait_for(mut done: impl FnMut() -> bool) {
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(5) {
            if done() {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert!(done(), "condition not met within deadline");
    }

    fn drive_liveness(monitor: &LivenessMonitor, dt_ms: u64, samples: usize) {
        for _ in 0..samples {
            monitor.record_interval_ms(dt_ms);
        }
    }

    #[test]
    fn test_total_independent_of_thread_count() {
        for threads in [1, 4] {
            let mut h = harness(&[]);
            let mut cfg = config(&h, 16);
            cfg.threads = threads;
            h.controller.start(cfg).unwrap();
            assert_eq!(h.controller.status().unwrap().total, 9);
            h.controller.cancel();
        }
    }

    #[test]
    fn test_second_start_rejected_and_job_untouched() {
        let mut h = harness(&[]);
        h.controller.start(config(&h, 16)).unwrap();
        wait_for(|| h.controller.status().unwrap().completed == 9);

        let before = h.controller.status().unwrap();
        let err = h.controller.start(config(&h, 64)).unwrap_err();
        assert!(matches!(err, JobError::AlreadyActive));

        let after = h.controller.status().unwrap();
        assert_eq!(after.total, before.total);
        assert_eq!(after.completed, before.completed);
        h.controller.cancel();
    }

    #[test]
    fn test_invalid_config_rejected_without_state_change() {
        let mut h = harness(&[]);
        let mut cfg = config(&h, 16);
        cfg.world_id = String::new();
        match h.controller.start(cfg) {
            Err(JobError::InvalidConfig(errors)) => assert!(!errors.is_empty()),
            other => panic!("expected InvalidConfig, got {:?}", other.err()),
        }
        assert!(!h.controller.is_active());
    }

    #[test]
    fn test_unknown_world_is_fatal_at_start() {
        let mut h = harness(&[]);
        let mut cfg = config(&h, 16);
        cfg.world_id = "ghost".to_string();
        assert!(matches!(
            h.controller.start(cfg),
            Err(JobError::Locate(LocateError::WorldNotFound { .. }))
        ));
    }

    #[test]
    fn test_throttle_pauses_workers_but_gray_zone_still_applies() {
        let coords: Vec<ChunkCoord> = (-1..=1)
            .flat_map(|x| (-1..=1).map(move |z| ChunkCoord::new(x, z)))
            .collect();
        let mut h = harness(&coords);
        let mut cfg = config(&h, 16); // total = 9
        cfg.min_liveness = 5.0;
        cfg.hysteresis = 2.0;
        cfg.batch = 1;
        h.controller.start(cfg).unwrap();
        wait_for(|| {
            let s = h.controller.status().unwrap();
            s.completed == 9 && s.pending_results == 9
        });

        // Stalled host: one heartbeat per second, nothing applied at all
        drive_liveness(&h.monitor, 1000, 200);
        assert!(h.monitor.liveness() < 5.0);
        assert_eq!(h.controller.tick(), 0);
        let status = h.controller.status().unwrap();
        assert!(status.paused);
        assert_eq!(status.pending_results, 9);
        assert!(h.applied.lock().unwrap().is_empty());

        // Between threshold and threshold + hysteresis the workers stay
        // paused while results keep draining at the scaled batch
        drive_liveness(&h.monitor, 175, 200); // ~5.7/s
        assert!(h.monitor.liveness() > 5.0 && h.monitor.liveness() < 7.0);
        assert_eq!(h.controller.tick(), 1);
        let status = h.controller.status().unwrap();
        assert!(status.paused);
        assert_eq!(status.pending_results, 8);

        // Past threshold + hysteresis the workers resume
        drive_liveness(&h.monitor, 50, 200);
        assert!(h.monitor.liveness() >= 7.0);
        assert_eq!(h.controller.tick(), 1);
        assert!(!h.controller.status().unwrap().paused);

        for _ in 0..20 {
            if !h.controller.is_active() {
                break;
            }
            h.controller.tick();
        }
        assert!(!h.controller.is_active());
        let mut applied = h.applied.lock().unwrap().clone();
        applied.sort();
        let mut expected = coords;
        expected.sort();
        assert_eq!(applied, expected);
    }

    #[test]
    fn test_zero_threshold_disables_throttling() {
        let origin = ChunkCoord::new(0, 0);
        let mut h = harness(&[origin]);
        h.controller.start(config(&h, 0)).unwrap();
        wait_for(|| h.controller.status().unwrap().pending_results == 1);

        drive_liveness(&h.monitor, 1000, 200);
        // Liveness ~1 never pauses and the scaled batch still applies
        assert_eq!(h.controller.tick(), 1);
        assert_eq!(*h.applied.lock().unwrap(), vec![origin]);
        assert!(!h.controller.is_active());
    }

    #[test]
    fn test_applied_results_are_checkpointed() {
        let origin = ChunkCoord::new(0, 0);
        let mut h = harness(&[origin]);
        let cfg = config(&h, 0);
        let checkpoint_path = cfg.checkpoint_path.clone();
        h.controller.start(cfg).unwrap();
        wait_for(|| h.controller.status().unwrap().pending_results == 1);
        h.controller.tick();

        let store = CheckpointStore::open(&checkpoint_path).unwrap();
        assert!(store.is_chunk_done(origin));
    }

    #[test]
    fn test_consistency_mismatch_blocks_start_unless_forced() {
        let mut h = harness(&[]);
        let output = h.tmp.path().join("out");
        fs::create_dir_all(&output).unwrap();

        let mut cfg = config(&h, 16);
        cfg.output_path = Some(output);
        // A checkpointed chunk with no matching output file
        CheckpointStore::open(&cfg.checkpoint_path)
            .unwrap()
            .mark_chunk_done(ChunkCoord::new(5, 5))
            .unwrap();

        match h.controller.start(cfg.clone()) {
            Err(JobError::Consistency { mismatches }) => assert_eq!(mismatches, 1),
            other => panic!("expected Consistency, got {:?}", other.err()),
        }
        assert!(!h.controller.is_active());

        cfg.force = true;
        h.controller.start(cfg).unwrap();
        assert!(h.controller.is_active());
        h.controller.cancel();
    }

    #[test]
    fn test_start_skips_checkpointed_coordinates() {
        let mut h = harness(&[]);
        let cfg = config(&h, 0);
        CheckpointStore::open(&cfg.checkpoint_path)
            .unwrap()
            .mark_chunk_done(ChunkCoord::new(0, 0))
            .unwrap();

        h.controller.start(cfg).unwrap();
        let status = h.controller.status().unwrap();
        assert_eq!(status.total, 1);
        assert_eq!(status.completed, 1);

        // Nothing left to apply: the first tick finalizes
        h.controller.tick();
        assert!(!h.controller.is_active());
        assert!(h.applied.lock().unwrap().is_empty());
    }

    #[test]
    fn test_cancel_clears_state_and_allows_restart() {
        let mut h = harness(&[]);
        h.controller.start(config(&h, 16)).unwrap();
        h.controller.cancel();
        assert!(!h.controller.is_active());

        h.controller.start(config(&h, 16)).unwrap();
        assert_eq!(h.controller.status().unwrap().total, 9);
        h.controller.cancel();
    }

    #[test]
    fn test_pause_persists_state_files() {
        let mut h = harness(&[]);
        let cfg = config(&h, 16);
        let dir = cfg.checkpoint_path.clone();
        h.controller.start(cfg).unwrap();
        wait_for(|| h.controller.status().unwrap().completed == 9);
        h.controller.pause().unwrap();

        assert!(!h.controller.is_active());
        assert!(dir.join(JOB_STATE_FILE).exists());
        assert!(dir.join(QUEUE_DUMP_FILE).exists());
        assert!(dir.join(RESULT_DUMP_FILE).exists());

        let (loaded, counters) = JobConfig::load_from(&dir.join(JOB_STATE_FILE)).unwrap();
        assert_eq!(loaded.world_id, "w");
        assert_eq!(counters.total, 9);
        assert_eq!(counters.completed, 9);
    }
}

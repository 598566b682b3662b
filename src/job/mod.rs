//! Extraction job configuration and lifecycle.

mod config;
mod controller;

pub use config::{JobConfig, JobCounters, MAX_LIVENESS_THRESHOLD, MAX_THREADS};
pub use controller::{
    JobController, JobError, JobStatus, JOB_STATE_FILE, QUEUE_DUMP_FILE, RESULT_DUMP_FILE,
};

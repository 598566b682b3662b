//! Chunkmill - Resumable chunk extraction from Anvil world saves
//!
//! This library provides the core pipeline for decoding chunk data out of a
//! world's region containers: binary region/NBT decoding, a pausable worker
//! pool, per-region checkpoint bitmaps for idempotent resumes, and a job
//! controller that throttles extraction against a host liveness signal.
//!
//! # High-Level API
//!
//! The [`job`] module is the main entry point:
//!
//! ```ignore
//! use chunkmill::job::{JobConfig, JobController};
//! use chunkmill::liveness::LivenessMonitor;
//! use std::sync::Arc;
//!
//! let monitor = Arc::new(LivenessMonitor::new());
//! let mut controller = JobController::new(base_dir, monitor.clone(), apply_sink);
//! controller.start(JobConfig {
//!     world_id: "minecraft:overworld".into(),
//!     ..JobConfig::default()
//! })?;
//!
//! // Host drives the job: heartbeat + tick, once per host cycle
//! monitor.record_heartbeat();
//! controller.tick();
//! ```

pub mod cache;
pub mod checkpoint;
pub mod coord;
pub mod job;
pub mod liveness;
pub mod logging;
pub mod nbt;
pub mod pipeline;
pub mod record;
pub mod region;

/// Version of the chunkmill library.
///
/// Defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Job configuration: sanitization, validation, and key=value persistence.
//!
//! A [`JobConfig`] is sanitized (out-of-range values clamped with warnings)
//! and then validated (hard errors) before any job state changes. The same
//! struct round-trips through the job-state file written on pause, with the
//! progress counters appended so a resumed job can report where it left off.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

/// Maximum worker threads a job may request.
pub const MAX_THREADS: usize = 32;

/// Upper bound for the liveness pause threshold (the nominal host rate).
pub const MAX_LIVENESS_THRESHOLD: f64 = 20.0;

/// Extraction job parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct JobConfig {
    /// Logical world identifier, resolved against the search root
    /// (a `namespace:` prefix is accepted and stripped).
    pub world_id: String,
    /// Extraction radius around the origin, in blocks.
    pub radius: u32,
    /// Worker thread count, clamped to 1..=32.
    pub threads: usize,
    /// Directory holding rendered chunk output, if any. When set, job
    /// start cross-checks checkpoint bitmaps against it.
    pub output_path: Option<PathBuf>,
    /// Directory for checkpoint bitmaps and pause/resume state files.
    pub checkpoint_path: PathBuf,
    /// Liveness (ticks/second) below which workers pause. Zero disables
    /// throttling entirely.
    pub min_liveness: f64,
    /// Extra liveness required above `min_liveness` before paused workers
    /// resume.
    pub hysteresis: f64,
    /// Base number of results applied per tick at nominal liveness.
    pub batch: usize,
    /// Proceed past a checkpoint/output consistency mismatch.
    pub force: bool,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            world_id: String::new(),
            radius: 256,
            threads: 4,
            output_path: None,
            checkpoint_path: PathBuf::from("checkpoints"),
            min_liveness: 5.0,
            hysteresis: 2.0,
            batch: 100,
            force: false,
        }
    }
}

/// Progress counters persisted alongside the config in the job-state file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCounters {
    pub total: u64,
    pub completed: u64,
}

impl JobConfig {
    /// Clamp out-of-range fields into their valid domains and anchor the
    /// paths, returning one human-readable warning per adjustment.
    ///
    /// `output_path` and `checkpoint_path` are made absolute against the
    /// current working directory and lexically normalized, so a host whose
    /// working directory moves between pause and resume still finds the
    /// same bitmaps and dump files.
    pub fn sanitize(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();
        if let Some(path) = self.output_path.take() {
            self.output_path = Some(absolutize(&path));
        }
        if !self.checkpoint_path.as_os_str().is_empty() {
            self.checkpoint_path = absolutize(&self.checkpoint_path);
        }
        if self.threads == 0 {
            warnings.push("threads must be at least 1; using 1".to_string());
            self.threads = 1;
        } else if self.threads > MAX_THREADS {
            warnings.push(format!(
                "threads capped at {} (requested {})",
                MAX_THREADS, self.threads
            ));
            self.threads = MAX_THREADS;
        }
        if self.batch == 0 {
            warnings.push("batch must be at least 1; using 1".to_string());
            self.batch = 1;
        }
        if self.min_liveness.is_finite() {
            if self.min_liveness < 0.0 {
                warnings.push("min_liveness below 0; throttling disabled".to_string());
                self.min_liveness = 0.0;
            } else if self.min_liveness > MAX_LIVENESS_THRESHOLD {
                warnings.push(format!(
                    "min_liveness capped at the nominal rate {}",
                    MAX_LIVENESS_THRESHOLD
                ));
                self.min_liveness = MAX_LIVENESS_THRESHOLD;
            }
        }
        if self.hysteresis.is_finite() && self.hysteresis < 0.0 {
            warnings.push("hysteresis below 0; using 0".to_string());
            self.hysteresis = 0.0;
        }
        warnings
    }

    /// Hard configuration errors. A non-empty return aborts job start
    /// before any state changes.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.world_id.trim().is_empty() {
            errors.push("world_id must not be empty".to_string());
        }
        if self.checkpoint_path.as_os_str().is_empty() {
            errors.push("checkpoint_path must not be empty".to_string());
        }
        if !self.min_liveness.is_finite() {
            errors.push("min_liveness must be a finite number".to_string());
        }
        if !self.hysteresis.is_finite() {
            errors.push("hysteresis must be a finite number".to_string());
        }
        errors
    }

    /// Serialize config plus counters as `key=value` lines.
    pub fn to_lines(&self, counters: JobCounters) -> Vec<String> {
        vec![
            format!("worldId={}", self.world_id),
            format!("radius={}", self.radius),
            format!("threads={}", self.threads),
            format!(
                "outputPath={}",
                self.output_path
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default()
            ),
            format!("checkpointPath={}", self.checkpoint_path.display()),
            format!("minLiveness={}", self.min_liveness),
            format!("hysteresis={}", self.hysteresis),
            format!("batch={}", self.batch),
            format!("force={}", self.force),
            format!("chunksTotal={}", counters.total),
            format!("chunksCompleted={}", counters.completed),
        ]
    }

    /// Write the job-state file.
    pub fn write_to(&self, path: &Path, counters: JobCounters) -> io::Result<()> {
        let mut writer = BufWriter::new(fs::File::create(path)?);
        for line in self.to_lines(counters) {
            writeln!(writer, "{}", line)?;
        }
        writer.flush()
    }

    /// Parse `key=value` lines, overlaying onto defaults. Blank lines and
    /// `#` comments are ignored; an unparsable value keeps the default and
    /// logs a warning.
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> (JobConfig, JobCounters) {
        let mut config = JobConfig::default();
        let mut counters = JobCounters::default();
        for line in lines {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = match line.split_once('=') {
                Some((k, v)) => (k.trim(), v.trim()),
                None => {
                    warn!("ignoring malformed job-state line: {}", line);
                    continue;
                }
            };
            match key {
                "worldId" => config.world_id = value.to_string(),
                "radius" => parse_into(key, value, &mut config.radius),
                "threads" => parse_into(key, value, &mut config.threads),
                "outputPath" => {
                    config.output_path = if value.is_empty() {
                        None
                    } else {
                        Some(PathBuf::from(value))
                    };
                }
                "checkpointPath" => {
                    if !value.is_empty() {
                        config.checkpoint_path = PathBuf::from(value);
                    }
                }
                "minLiveness" => parse_into(key, value, &mut config.min_liveness),
                "hysteresis" => parse_into(key, value, &mut config.hysteresis),
                "batch" => parse_into(key, value, &mut config.batch),
                "force" => parse_into(key, value, &mut config.force),
                "chunksTotal" => parse_into(key, value, &mut counters.total),
                "chunksCompleted" => parse_into(key, value, &mut counters.completed),
                other => warn!("ignoring unknown job-state key: {}", other),
            }
        }
        (config, counters)
    }

    /// Load a job-state file written by [`write_to`].
    ///
    /// [`write_to`]: JobConfig::write_to
    pub fn load_from(path: &Path) -> io::Result<(JobConfig, JobCounters)> {
        let text = fs::read_to_string(path)?;
        Ok(Self::from_lines(text.lines()))
    }
}

/// Anchor a path to the working directory and resolve `.`/`..` lexically.
fn absolutize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(e) => {
                warn!("cannot resolve working directory for {}: {}", path.display(), e);
                path.to_path_buf()
            }
        }
    };

    use std::path::Component;
    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn parse_into<T: std::str::FromStr>(key: &str, value: &str, field: &mut T) {
    match value.parse() {
        Ok(v) => *field = v,
        Err(_) => warn!("ignoring unparsable job-state value {}={}", key, value),
    }
}

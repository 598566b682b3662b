//! Pending-task queue with line-oriented persistence.

use std::collections::VecDeque;
use std::fs;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use crate::coord::ChunkCoord;

/// One pending chunk coordinate. Immutable once enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Task {
    pub coord: ChunkCoord,
}

impl Task {
    pub fn new(coord: ChunkCoord) -> Self {
        Self { coord }
    }
}

/// Thread-safe FIFO of pending tasks.
///
/// `pop` never blocks: an empty queue returns `None` and the calling
/// worker exits, draining the pool naturally.
#[derive(Debug, Default)]
pub struct TaskQueue {
    queue: Mutex<VecDeque<Task>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task.
    pub fn enqueue(&self, task: Task) {
        self.queue.lock().unwrap().push_back(task);
    }

    /// Remove and return the oldest task, if any.
    pub fn pop(&self) -> Option<Task> {
        self.queue.lock().unwrap().pop_front()
    }

    /// Number of pending tasks.
    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// True when no tasks are pending.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().unwrap().is_empty()
    }

    /// Drain every pending task to a file, one `x,z` line each.
    /// Returns the number of entries written.
    pub fn drain_to_file(&self, path: &Path) -> io::Result<usize> {
        let drained: Vec<Task> = {
            let mut queue = self.queue.lock().unwrap();
            queue.drain(..).collect()
        };
        let mut writer = BufWriter::new(fs::File::create(path)?);
        for task in &drained {
            writeln!(writer, "{},{}", task.coord.x, task.coord.z)?;
        }
        writer.flush()?;
        Ok(drained.len())
    }

    /// Rebuild a queue from a file written by [`drain_to_file`], silently
    /// skipping malformed lines.
    ///
    /// [`drain_to_file`]: TaskQueue::drain_to_file
    pub fn load_from_file(path: &Path) -> io::Result<TaskQueue> {
        let queue = TaskQueue::new();
        let reader = BufReader::new(fs::File::open(path)?);
        for line in reader.lines() {
            let line = line?;
            if let Some(coord) = parse_coord_line(line.trim()) {
                queue.enqueue(Task::new(coord));
            }
        }
        Ok(queue)
    }
}

/// Parse an `x,z` line; `None` for anything malformed.
pub(crate) fn parse_coord_line(line: &str) -> Option<ChunkCoord> {
    if line.is_empty() {
        return None;
    }
    let (x, z) = line.split_once(',')?;
    Some(ChunkCoord::new(
        x.trim().parse().ok()?,
        z.trim().parse().ok()?,
    ))
}

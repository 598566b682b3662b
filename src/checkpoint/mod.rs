//! Persistent per-region completion bitmaps.
//!
//! Each region gets a 128-byte file (`<rx>_<rz>.chk`) of 1024 bits, one per
//! chunk slot (`bit = local_x + local_z * 32`). A set bit means the chunk's
//! result has been applied; bits are never cleared within a checkpoint
//! directory, which is what makes extraction idempotent across restarts.
//!
//! All file access for a given region goes through a per-region mutex, so a
//! reader can never observe a half-written bitmap and concurrent
//! read-modify-write cycles cannot lose bits.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, warn};

use crate::coord::{ChunkCoord, RegionCoord};

/// Size of one region bitmap: 1024 bits.
pub const BITMAP_BYTES: usize = 128;

/// Extension of bitmap files.
const BITMAP_EXT: &str = "chk";

/// Errors updating the checkpoint store.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// Bitmap file could not be read or written
    #[error("checkpoint I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Disk-backed completion bitmap store.
pub struct CheckpointStore {
    dir: PathBuf,
    locks: Mutex<HashMap<RegionCoord, Arc<Mutex<()>>>>,
}

impl CheckpointStore {
    /// Open (creating if needed) a checkpoint directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<CheckpointStore, CheckpointError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(CheckpointStore {
            dir,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Directory holding the bitmap files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn bitmap_path(&self, region: RegionCoord) -> PathBuf {
        self.dir
            .join(format!("{}_{}.{}", region.x, region.z, BITMAP_EXT))
    }

    fn region_lock(&self, region: RegionCoord) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks.entry(region).or_default().clone()
    }

    /// Whether a chunk's completion bit is set. An absent or unreadable
    /// bitmap reads as "not done".
    pub fn is_chunk_done(&self, coord: ChunkCoord) -> bool {
        let region = coord.region();
        let lock = self.region_lock(region);
        let _guard = lock.lock().unwrap();

        let bytes = match fs::read(self.bitmap_path(region)) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return false,
            Err(e) => {
                warn!("failed to read checkpoint bitmap for {}: {}", region, e);
                return false;
            }
        };
        let bit = coord.region_slot() as usize;
        let idx = bit / 8;
        if idx >= bytes.len() {
            return false;
        }
        (bytes[idx] >> (bit % 8)) & 1 != 0
    }

    /// Set a chunk's completion bit, creating the bitmap if needed.
    pub fn mark_chunk_done(&self, coord: ChunkCoord) -> Result<(), CheckpointError> {
        let region = coord.region();
        let lock = self.region_lock(region);
        let _guard = lock.lock().unwrap();

        let path = self.bitmap_path(region);
        let mut bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => vec![0u8; BITMAP_BYTES],
            Err(e) => return Err(e.into()),
        };
        if bytes.len() < BITMAP_BYTES {
            bytes.resize(BITMAP_BYTES, 0);
        }
        let bit = coord.region_slot() as usize;
        bytes[bit / 8] |= 1 << (bit % 8);
        fs::write(&path, &bytes)?;
        Ok(())
    }

    /// Best-effort consistency scan against the extraction output.
    ///
    /// Counts completion bits whose chunk has no `chunk_<x>_<z>.json` in
    /// `output_dir`. Returns 0 when everything matches (including when no
    /// bitmaps exist yet) and -1 when the scan itself hits an I/O failure.
    pub fn validate_against_output(&self, output_dir: &Path) -> i64 {
        let entries = match fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!("checkpoint validation failed to list {}: {}", self.dir.display(), e);
                return -1;
            }
        };

        let mut mismatches: i64 = 0;
        for entry in entries {
            let path = match entry {
                Ok(e) => e.path(),
                Err(e) => {
                    warn!("checkpoint validation failed reading directory: {}", e);
                    return -1;
                }
            };
            let region = match parse_bitmap_name(&path) {
                Some(r) => r,
                None => continue,
            };
            let bytes = match fs::read(&path) {
                Ok(b) => b,
                Err(e) => {
                    warn!("checkpoint validation failed to read {}: {}", path.display(), e);
                    return -1;
                }
            };
            for bit in 0..(bytes.len() * 8).min(1024) {
                if (bytes[bit / 8] >> (bit % 8)) & 1 == 0 {
                    continue;
                }
                let cx = region.x * 32 + (bit as i32 % 32);
                let cz = region.z * 32 + (bit as i32 / 32);
                let output = output_dir.join(format!("chunk_{}_{}.json", cx, cz));
                if !output.exists() {
                    mismatches += 1;
                }
            }
        }
        debug!("checkpoint validation found {} mismatch(es)", mismatches);
        mismatches
    }
}

fn parse_bitmap_name(path: &Path) -> Option<RegionCoord> {
    let stem = path.file_name()?.to_str()?;
    let stem = stem.strip_suffix(&format!(".{}", BITMAP_EXT))?;
    let (x, z) = stem.split_once('_')?;
    Some(RegionCoord {
        x: x.parse().ok()?,
        z: z.parse().ok()?,
    })
}

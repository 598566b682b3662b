//! World directory resolution.
//!
//! Maps a logical dimension id (e.g. `minecraft:overworld`, `the_nether`,
//! or a bare save name) to a world root and its region-container directory,
//! searching the conventional layouts under a base directory.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::coord::RegionCoord;

/// Marker file identifying a valid world root.
const ROOT_MARKER: &str = "level.dat";

/// File extension of region containers.
const REGION_EXT: &str = "mca";

/// Errors resolving a world directory.
#[derive(Debug, Error)]
pub enum LocateError {
    /// No candidate directory contained a world with the marker file
    #[error("world '{world}' not found under {base}")]
    WorldNotFound { world: String, base: PathBuf },

    /// World root was found but its region directory is missing
    #[error("region directory not found: {0}")]
    RegionDirMissing(PathBuf),
}

/// Resolves and enumerates region container files for one dimension.
#[derive(Debug, Clone)]
pub struct RegionLocator {
    world_root: PathBuf,
    region_dir: PathBuf,
}

impl RegionLocator {
    /// Resolve a world id to its on-disk layout.
    ///
    /// The namespace prefix (`minecraft:`) is stripped; the remaining name
    /// is searched under `<base>/saves/<name>`, `<base>/worlds/<name>`, and
    /// `<base>/<name>`, accepting the first directory containing
    /// `level.dat`. The region subdirectory depends on the dimension kind:
    /// names containing `nether` use `DIM-1/data`, names containing `end`
    /// use `DIM1/data`, anything else uses `region`.
    pub fn resolve(world_id: &str, base_dir: &Path) -> Result<RegionLocator, LocateError> {
        let name = world_id.rsplit(':').next().unwrap_or(world_id);

        let candidates = [
            base_dir.join("saves").join(name),
            base_dir.join("worlds").join(name),
            base_dir.join(name),
        ];
        let world_root = candidates
            .into_iter()
            .find(|p| p.is_dir() && p.join(ROOT_MARKER).exists())
            .ok_or_else(|| LocateError::WorldNotFound {
                world: name.to_string(),
                base: base_dir.to_path_buf(),
            })?;

        let dim_path = if name.contains("nether") {
            "DIM-1/data"
        } else if name.contains("end") {
            "DIM1/data"
        } else {
            "region"
        };
        let region_dir = world_root.join(dim_path);
        if !region_dir.is_dir() {
            return Err(LocateError::RegionDirMissing(region_dir));
        }

        Ok(RegionLocator {
            world_root,
            region_dir,
        })
    }

    /// Path of the container file for a region coordinate. The file may
    /// not exist; absent regions simply hold no chunks.
    pub fn region_file(&self, region: RegionCoord) -> PathBuf {
        self.region_dir
            .join(format!("r.{}.{}.{}", region.x, region.z, REGION_EXT))
    }

    /// All region container files present in the region directory.
    pub fn list_region_files(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.region_dir)? {
            let path = entry?.path();
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(n) => n,
                None => continue,
            };
            if name.starts_with("r.") && name.ends_with(&format!(".{}", REGION_EXT)) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// World root directory.
    pub fn world_root(&self) -> &Path {
        &self.world_root
    }

    /// Region container directory.
    pub fn region_dir(&self) -> &Path {
        &self.region_dir
    }

    /// Best-effort structural validation.
    ///
    /// Collects every problem found rather than stopping at the first;
    /// an empty list means the world looks sound.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !self.world_root.exists() {
            issues.push(format!(
                "world directory does not exist: {}",
                self.world_root.display()
            ));
        } else if !self.world_root.is_dir() {
            issues.push(format!(
                "world path is not a directory: {}",
                self.world_root.display()
            ));
        }

        if !self.world_root.join(ROOT_MARKER).exists() {
            issues.push(format!("{} not found", ROOT_MARKER));
        }

        if !self.region_dir.exists() {
            issues.push(format!(
                "region directory does not exist: {}",
                self.region_dir.display()
            ));
        } else if !self.region_dir.is_dir() {
            issues.push(format!(
                "region path is not a directory: {}",
                self.region_dir.display()
            ));
        } else {
            match self.list_region_files() {
                Ok(files) if files.is_empty() => {
                    issues.push("no region files found".to_string());
                }
                Ok(_) => {}
                Err(e) => issues.push(format!("failed to list regions: {}", e)),
            }
        }

        issues
    }
}

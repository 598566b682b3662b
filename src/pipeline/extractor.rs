//! Per-chunk extraction: region read, decompression, NBT decode, mapping.
//!
//! Every failure mode below the job level is folded into an explicit
//! [`ExtractOutcome`] so the pipeline's decision to continue is visible and
//! testable, not hidden in a catch-all.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::cache::ExtractionCache;
use crate::coord::ChunkCoord;
use crate::record::ChunkRecord;
use crate::region::{RegionDecoder, RegionError, RegionLocator};

/// Why a chunk produced no record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The region container for this chunk does not exist
    MissingRegion,
    /// The chunk's slot is empty, truncated, or its stream is corrupt
    AbsentOrCorrupt,
    /// The payload declared an unsupported compression tag
    UnknownCompression(u8),
    /// Reading the container failed
    Io(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingRegion => write!(f, "region file missing"),
            SkipReason::AbsentOrCorrupt => write!(f, "chunk absent or corrupt"),
            SkipReason::UnknownCompression(tag) => {
                write!(f, "unknown compression tag {}", tag)
            }
            SkipReason::Io(msg) => write!(f, "I/O failure: {}", msg),
        }
    }
}

/// Result of extracting one chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractOutcome {
    /// A record was produced (possibly a stub carrying an `error`
    /// metadata entry when NBT mapping failed)
    Extracted(ChunkRecord),
    /// No record; the chunk is skipped and the job continues
    Skipped(SkipReason),
}

/// Decodes chunks for worker threads, consulting the payload cache before
/// touching region files.
pub struct ChunkExtractor {
    locator: RegionLocator,
    decoder: RegionDecoder,
    cache: Arc<ExtractionCache>,
}

impl ChunkExtractor {
    pub fn new(locator: RegionLocator, cache: Arc<ExtractionCache>) -> Self {
        Self {
            locator,
            decoder: RegionDecoder::new(),
            cache,
        }
    }

    /// Extract one chunk. Never panics and never returns an error that
    /// could halt the pool; every failure becomes a [`SkipReason`].
    pub fn extract(&self, coord: ChunkCoord) -> ExtractOutcome {
        let payload = match self.payload(coord) {
            Ok(Some(p)) => p,
            Ok(None) => return ExtractOutcome::Skipped(SkipReason::AbsentOrCorrupt),
            Err(reason) => return ExtractOutcome::Skipped(reason),
        };
        ExtractOutcome::Extracted(ChunkRecord::decode(coord, &payload))
    }

    /// Fetch the decompressed payload, from cache when possible.
    fn payload(&self, coord: ChunkCoord) -> Result<Option<Vec<u8>>, SkipReason> {
        if let Some(cached) = self.cache.get(coord) {
            return Ok(Some(cached));
        }

        let region_file = self.locator.region_file(coord.region());
        if !region_file.exists() {
            debug!("no region container for chunk {}", coord);
            return Err(SkipReason::MissingRegion);
        }

        match self.decoder.read_payload(&region_file, coord) {
            Ok(Some(payload)) => {
                self.cache.put(coord, payload.clone());
                Ok(Some(payload))
            }
            Ok(None) => Ok(None),
            Err(RegionError::UnknownCompression(tag)) => {
                debug!("unknown compression tag {} for chunk {}", tag, coord);
                Err(SkipReason::UnknownCompression(tag))
            }
            Err(RegionError::Io(e)) => {
                debug!("region read failed for chunk {}: {}", coord, e);
                Err(SkipReason::Io(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nbt::encode;
    use crate::region::testutil::write_chunk;
    use crate::region::COMPRESSION_ZLIB;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn make_locator(tmp: &TempDir) -> RegionLocator {
        let root = tmp.path().join("w");
        fs::create_dir_all(root.join("region")).unwrap();
        fs::write(root.join("level.dat"), b"").unwrap();
        RegionLocator::resolve("w", tmp.path()).unwrap()
    }

    fn write_payload(region_dir: &Path, coord: ChunkCoord, tag: u8) {
        let region = coord.region();
        let file = region_dir.join(format!("r.{}.{}.mca", region.x, region.z));
        let payload = encode::document("", &[]);
        write_chunk(&file, coord, tag, &payload);
    }

    #[test]
    fn test_extracts_record_from_region() {
        let tmp = TempDir::new().unwrap();
        let locator = make_locator(&tmp);
        let coord = ChunkCoord::new(2, 3);
        write_payload(locator.region_dir(), coord, COMPRESSION_ZLIB);

        let extractor = ChunkExtractor::new(locator, Arc::new(ExtractionCache::default()));
        match extractor.extract(coord) {
            ExtractOutcome::Extracted(record) => {
                assert_eq!(record.coord, coord);
                assert!(!record.metadata.contains_key("error"));
            }
            other => panic!("expected record, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_region_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let locator = make_locator(&tmp);
        let extractor = ChunkExtractor::new(locator, Arc::new(ExtractionCache::default()));
        assert_eq!(
            extractor.extract(ChunkCoord::new(100, 100)),
            ExtractOutcome::Skipped(SkipReason::MissingRegion)
        );
    }

    #[test]
    fn test_absent_chunk_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let locator = make_locator(&tmp);
        // Populate a sibling so the container exists
        write_payload(locator.region_dir(), ChunkCoord::new(9, 9), COMPRESSION_ZLIB);

        let extractor = ChunkExtractor::new(locator, Arc::new(ExtractionCache::default()));
        assert_eq!(
            extractor.extract(ChunkCoord::new(0, 0)),
            ExtractOutcome::Skipped(SkipReason::AbsentOrCorrupt)
        );
    }

    #[test]
    fn test_unknown_compression_skipped_with_tag() {
        let tmp = TempDir::new().unwrap();
        let locator = make_locator(&tmp);
        let coord = ChunkCoord::new(1, 1);
        write_payload(locator.region_dir(), coord, 3);

        let extractor = ChunkExtractor::new(locator, Arc::new(ExtractionCache::default()));
        assert_eq!(
            extractor.extract(coord),
            ExtractOutcome::Skipped(SkipReason::UnknownCompression(3))
        );
    }

    #[test]
    fn test_cache_serves_payload_after_region_removed() {
        let tmp = TempDir::new().unwrap();
        let locator = make_locator(&tmp);
        let coord = ChunkCoord::new(4, 4);
        write_payload(locator.region_dir(), coord, COMPRESSION_ZLIB);

        let cache = Arc::new(ExtractionCache::default());
        let extractor = ChunkExtractor::new(locator.clone(), cache.clone());
        assert!(matches!(
            extractor.extract(coord),
            ExtractOutcome::Extracted(_)
        ));
        assert_eq!(cache.len(), 1);

        // Remove the container; the cached payload still decodes
        fs::remove_file(locator.region_file(coord.region())).unwrap();
        assert!(matches!(
            extractor.extract(coord),
            ExtractOutcome::Extracted(_)
        ));
    }

    #[test]
    fn test_garbage_payload_yields_error_record_not_skip() {
        let tmp = TempDir::new().unwrap();
        let locator = make_locator(&tmp);
        let coord = ChunkCoord::new(7, 7);
        let region = coord.region();
        let file = locator
            .region_dir()
            .join(format!("r.{}.{}.mca", region.x, region.z));
        // Valid container framing and compression, invalid NBT inside
        write_chunk(&file, coord, COMPRESSION_ZLIB, &[0xff, 0xfe, 0xfd]);

        let extractor = ChunkExtractor::new(locator, Arc::new(ExtractionCache::default()));
        match extractor.extract(coord) {
            ExtractOutcome::Extracted(record) => {
                assert!(record.metadata.contains_key("error"));
            }
            other => panic!("expected stub record, got {:?}", other),
        }
    }
}

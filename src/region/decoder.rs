//! Region container payload reader.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use flate2::read::{GzDecoder, ZlibDecoder};
use thiserror::Error;
use tracing::warn;

use crate::coord::ChunkCoord;

/// Compression tag for gzip payloads.
pub const COMPRESSION_GZIP: u8 = 1;
/// Compression tag for zlib payloads.
pub const COMPRESSION_ZLIB: u8 = 2;

/// Bytes per chunk slot in the container.
const SECTOR_BYTES: u64 = 4096;

/// Errors reading a payload from a region container.
#[derive(Debug, Error)]
pub enum RegionError {
    /// Container could not be opened or read
    #[error("region I/O error: {0}")]
    Io(#[from] io::Error),

    /// Compression tag was neither gzip (1) nor zlib (2)
    #[error("unknown compression tag: {0}")]
    UnknownCompression(u8),
}

/// Reads and decompresses single chunk payloads from region containers.
///
/// Stateless; safe to share across worker threads.
#[derive(Debug, Default)]
pub struct RegionDecoder;

impl RegionDecoder {
    pub fn new() -> Self {
        RegionDecoder
    }

    /// Read the decompressed payload of one chunk from its region file.
    ///
    /// Returns `Ok(None)` when the chunk is absent (zero-length slot), when
    /// the payload is truncated, or when the compressed stream is corrupt;
    /// those cases are logged and the caller treats the chunk as skipped.
    /// An unknown compression tag or a failure to read the file itself is
    /// an error.
    pub fn read_payload(
        &self,
        region_file: &Path,
        coord: ChunkCoord,
    ) -> Result<Option<Vec<u8>>, RegionError> {
        let mut file = File::open(region_file)?;
        let offset = coord.region_slot() as u64 * SECTOR_BYTES;

        let file_len = file.metadata()?.len();
        if offset + 5 > file_len {
            // Slot past the end of the container: nothing was ever written
            return Ok(None);
        }
        file.seek(SeekFrom::Start(offset))?;

        let mut header = [0u8; 4];
        file.read_exact(&mut header)?;
        let length = u32::from_be_bytes(header);
        if length == 0 {
            return Ok(None);
        }

        let mut tag = [0u8; 1];
        file.read_exact(&mut tag)?;
        let compression = tag[0];

        // The length header comes from untrusted data; never allocate more
        // than the file can actually hold
        let declared = length as u64 - 1;
        let available = file_len - (offset + 5);
        if declared > available {
            warn!(
                "truncated payload for chunk {} in {}: {} byte(s) declared, {} available",
                coord,
                region_file.display(),
                declared,
                available
            );
            return Ok(None);
        }

        let mut compressed = vec![0u8; declared as usize];
        if let Err(e) = file.read_exact(&mut compressed) {
            warn!(
                "truncated payload for chunk {} in {}: {}",
                coord,
                region_file.display(),
                e
            );
            return Ok(None);
        }

        match self.decompress(compression, &compressed)? {
            Some(payload) => Ok(Some(payload)),
            None => {
                warn!(
                    "corrupt compressed stream for chunk {} in {}",
                    coord,
                    region_file.display()
                );
                Ok(None)
            }
        }
    }

    /// Inflate a payload. `Ok(None)` marks a corrupt stream; the unknown
    /// tag is the only hard error.
    fn decompress(&self, compression: u8, data: &[u8]) -> Result<Option<Vec<u8>>, RegionError> {
        let mut out = Vec::new();
        let result = match compression {
            COMPRESSION_GZIP => GzDecoder::new(data).read_to_end(&mut out),
            COMPRESSION_ZLIB => ZlibDecoder::new(data).read_to_end(&mut out),
            other => return Err(RegionError::UnknownCompression(other)),
        };
        match result {
            Ok(_) => Ok(Some(out)),
            Err(_) => Ok(None),
        }
    }
}

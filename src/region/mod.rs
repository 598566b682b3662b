//! Anvil region container access.
//!
//! A region file (`r.<x>.<z>.mca`) holds up to 32×32 chunk payloads. Each
//! local chunk slot `i = local_x + local_z * 32` sits at file offset
//! `i * 4096` and starts with a 4-byte big-endian payload length and a
//! one-byte compression tag (1 = gzip, 2 = zlib), followed by the
//! compressed NBT payload.

mod decoder;
mod locator;

pub use decoder::{RegionDecoder, RegionError, COMPRESSION_GZIP, COMPRESSION_ZLIB};
pub use locator::{LocateError, RegionLocator};

#[cfg(test)]
pub(crate) use decoder::testutil;

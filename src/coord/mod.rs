//! Chunk and region coordinate types.
//!
//! An Anvil world is a grid of 16×16-block chunks, grouped into 32×32-chunk
//! region containers. Chunk coordinates are signed; the region holding a
//! chunk is derived by floor division so that negative coordinates map to
//! the correct region (chunk −1 lives in region −1, not region 0).

mod types;

pub use types::{ChunkCoord, RegionCoord, REGION_CHUNKS};

/// Blocks per chunk edge.
pub const CHUNK_BLOCKS: u32 = 16;

/// Number of chunks from the origin (inclusive) covered by a block radius.
///
/// A radius of 0 still covers the origin chunk; any partial chunk at the
/// edge of the radius is included in full.
#[inline]
pub fn chunk_radius(radius_blocks: u32) -> u32 {
    radius_blocks.div_ceil(CHUNK_BLOCKS)
}

/// Total number of chunks in the square grid covered by a block radius.
///
/// `(2 * chunk_radius + 1)^2`, independent of worker count.
#[inline]
pub fn total_chunks(radius_blocks: u32) -> u64 {
    let r = chunk_radius(radius_blocks) as u64;
    (2 * r + 1) * (2 * r + 1)
}

/// Iterates every chunk coordinate in the square grid of `chunk_radius`
/// chunks around `origin`, in row-major order.
pub fn grid(origin: ChunkCoord, chunk_radius: u32) -> impl Iterator<Item = ChunkCoord> {
    let r = chunk_radius as i32;
    (-r..=r).flat_map(move |dx| {
        (-r..=r).map(move |dz| ChunkCoord {
            x: origin.x + dx,
            z: origin.z + dz,
        })
    })
}

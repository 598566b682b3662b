//! Coordinate type definitions.

use std::fmt;

/// Chunks per region edge (regions are 32×32 chunks).
pub const REGION_CHUNKS: i32 = 32;

/// Coordinates of a single chunk, in chunk units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    /// East-west chunk coordinate
    pub x: i32,
    /// North-south chunk coordinate
    pub z: i32,
}

impl ChunkCoord {
    /// Create a new chunk coordinate.
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// The region container holding this chunk.
    #[inline]
    pub fn region(&self) -> RegionCoord {
        RegionCoord {
            x: self.x.div_euclid(REGION_CHUNKS),
            z: self.z.div_euclid(REGION_CHUNKS),
        }
    }

    /// Chunk X position within its region (0–31).
    #[inline]
    pub fn local_x(&self) -> u32 {
        self.x.rem_euclid(REGION_CHUNKS) as u32
    }

    /// Chunk Z position within its region (0–31).
    #[inline]
    pub fn local_z(&self) -> u32 {
        self.z.rem_euclid(REGION_CHUNKS) as u32
    }

    /// Index of this chunk within its region's 1024-slot table:
    /// `local_x + local_z * 32`.
    #[inline]
    pub fn region_slot(&self) -> u32 {
        self.local_x() + self.local_z() * REGION_CHUNKS as u32
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Coordinates of a region container, in region units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionCoord {
    /// East-west region coordinate
    pub x: i32,
    /// North-south region coordinate
    pub z: i32,
}

impl fmt::Display for RegionCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r({}, {})", self.x, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_floor_division() {
        assert_eq!(ChunkCoord::new(0, 0).region(), RegionCoord { x: 0, z: 0 });
        assert_eq!(ChunkCoord::new(31, 31).region(), RegionCoord { x: 0, z: 0 });
        assert_eq!(ChunkCoord::new(32, 0).region(), RegionCoord { x: 1, z: 0 });
        // Negative coordinates floor toward negative infinity
        assert_eq!(ChunkCoord::new(-1, -1).region(), RegionCoord { x: -1, z: -1 });
        assert_eq!(
            ChunkCoord::new(-32, -33).region(),
            RegionCoord { x: -1, z: -2 }
        );
    }

    #[test]
    fn test_local_coordinates_wrap() {
        let c = ChunkCoord::new(-1, -1);
        assert_eq!(c.local_x(), 31);
        assert_eq!(c.local_z(), 31);
        assert_eq!(c.region_slot(), 31 + 31 * 32);

        let c = ChunkCoord::new(33, 5);
        assert_eq!(c.local_x(), 1);
        assert_eq!(c.local_z(), 5);
        assert_eq!(c.region_slot(), 1 + 5 * 32);
    }

    #[test]
    fn test_region_slot_range() {
        for x in -64..64 {
            for z in -64..64 {
                let slot = ChunkCoord::new(x, z).region_slot();
                assert!(slot < 1024);
            }
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(ChunkCoord::new(-3, 7).to_string(), "(-3, 7)");
        assert_eq!(RegionCoord { x: 1, z: -2 }.to_string(), "r(1, -2)");
    }
}

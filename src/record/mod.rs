//! Structured chunk records extracted from decoded NBT trees.
//!
//! The mapping from the generic tag tree is best-effort: a payload that
//! decodes as NBT but is missing expected structure still yields a record
//! with defaults, and a payload that fails to decode yields a stub record
//! carrying an `error` metadata entry. Extraction never aborts on a single
//! malformed chunk.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::coord::ChunkCoord;
use crate::nbt::{decode_root, Tag};

/// Vertical bounds used when the payload does not declare its own
/// (the post-1.18 world height).
pub const DEFAULT_MIN_Y: i32 = -64;
pub const DEFAULT_MAX_Y: i32 = 320;

/// One extracted entity: type id, position, and its raw attribute tree
/// passed through opaquely.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    /// Namespaced type id, e.g. `minecraft:cow`
    pub kind: String,
    /// World position (x, y, z)
    pub pos: [f64; 3],
    /// Full entity compound, untouched
    pub attributes: Tag,
}

/// Structured data extracted from one chunk payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    /// Chunk coordinate this record was extracted from
    pub coord: ChunkCoord,
    /// Lowest block Y covered by the chunk
    pub min_y: i32,
    /// Highest block Y covered by the chunk
    pub max_y: i32,
    /// Estimated block/content count
    pub block_count: u32,
    /// Entities found in the chunk, in payload order
    pub entities: Vec<EntityRecord>,
    /// String-keyed metadata (coordinates, section counts, error notes)
    pub metadata: HashMap<String, String>,
    /// Extraction time, milliseconds since the Unix epoch
    pub timestamp_ms: u64,
}

impl ChunkRecord {
    /// Decode a raw NBT payload into a record.
    ///
    /// A payload that is not valid NBT produces a stub record with an
    /// `error` metadata entry rather than failing.
    pub fn decode(coord: ChunkCoord, payload: &[u8]) -> ChunkRecord {
        match decode_root(payload) {
            Ok(root) => Self::from_tree(coord, &root),
            Err(e) => {
                tracing::warn!("NBT decode failed for chunk {}: {}", coord, e);
                let mut record = Self::stub(coord);
                record.metadata.insert("error".to_string(), e.to_string());
                record
            }
        }
    }

    /// Map a decoded tag tree into a record.
    pub fn from_tree(coord: ChunkCoord, root: &HashMap<String, Tag>) -> ChunkRecord {
        let mut record = Self::stub(coord);

        if let Some(data) = root.get("Data").and_then(Tag::as_compound) {
            if let Some(y) = data.get("yMin").and_then(Tag::as_i64) {
                record.min_y = y as i32;
            }
            if let Some(y) = data.get("yMax").and_then(Tag::as_i64) {
                record.max_y = y as i32;
            }
        }

        match root.get("Sections").and_then(Tag::as_list) {
            Some(sections) => {
                record
                    .metadata
                    .insert("section_count".to_string(), sections.len().to_string());
                let mut total: u64 = 0;
                for section in sections {
                    if let Some(palette) = section.get("Palette").and_then(Tag::as_list) {
                        total += palette.len() as u64;
                    }
                }
                record.block_count = total.min(u32::MAX as u64) as u32;
            }
            None => {
                let height = (record.max_y - record.min_y).max(0) as u32;
                record.block_count = 16 * 16 * height / 2;
            }
        }

        if let Some(entities) = root.get("Entities").and_then(Tag::as_list) {
            for entity in entities {
                if let Some(e) = Self::map_entity(entity) {
                    record.entities.push(e);
                }
            }
        }

        record
    }

    fn map_entity(entity: &Tag) -> Option<EntityRecord> {
        let compound = entity.as_compound()?;
        let kind = compound
            .get("id")
            .and_then(Tag::as_str)
            .unwrap_or_default()
            .to_string();
        let mut pos = [0.0; 3];
        if let Some(values) = compound.get("Pos").and_then(Tag::as_list) {
            if values.len() >= 3 {
                for (slot, value) in pos.iter_mut().zip(values) {
                    *slot = value.as_f64().unwrap_or(0.0);
                }
            }
        }
        Some(EntityRecord {
            kind,
            pos,
            attributes: entity.clone(),
        })
    }

    /// A record with defaults and coordinate metadata only.
    pub fn stub(coord: ChunkCoord) -> ChunkRecord {
        let mut metadata = HashMap::new();
        let region = coord.region();
        metadata.insert("region_x".to_string(), region.x.to_string());
        metadata.insert("region_z".to_string(), region.z.to_string());
        metadata.insert("local_x".to_string(), coord.local_x().to_string());
        metadata.insert("local_z".to_string(), coord.local_z().to_string());
        ChunkRecord {
            coord,
            min_y: DEFAULT_MIN_Y,
            max_y: DEFAULT_MAX_Y,
            block_count: 0,
            entities: Vec::new(),
            metadata,
            timestamp_ms: now_ms(),
        }
    }

    /// Minimal JSON summary used as the payload of a
    /// [`BuildResult`](crate::pipeline::BuildResult).
    pub fn encode_summary(&self) -> Vec<u8> {
        format!(
            "{{\"x\":{},\"z\":{},\"blocks\":{}}}",
            self.coord.x, self.coord.z, self.block_count
        )
        .into_bytes()
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

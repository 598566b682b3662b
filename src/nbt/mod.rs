//! NBT (Named Binary Tag) decoding.
//!
//! Chunk payloads inside Anvil region containers are NBT: a nested, named,
//! typed binary tree of compounds, lists, and primitives, all big-endian.
//! This module provides a bounds-checked recursive-descent decoder producing
//! a generic [`Tag`] tree; mapping that tree into a domain record lives in
//! [`crate::record`].

mod decode;
mod tag;

pub use decode::{decode_root, DecodeError, MAX_DEPTH};
pub use tag::Tag;

#[cfg(test)]
pub(crate) use decode::encode;

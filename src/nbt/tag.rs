//! Generic NBT value tree.

use std::collections::HashMap;

/// A decoded NBT value.
///
/// The `End` marker (kind 0) terminates compounds during decoding and never
/// appears as a value in the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    /// Signed 8-bit integer (kind 1)
    Byte(i8),
    /// Signed 16-bit integer (kind 2)
    Short(i16),
    /// Signed 32-bit integer (kind 3)
    Int(i32),
    /// Signed 64-bit integer (kind 4)
    Long(i64),
    /// 32-bit float (kind 5)
    Float(f32),
    /// 64-bit float (kind 6)
    Double(f64),
    /// Raw byte array (kind 7)
    ByteArray(Vec<u8>),
    /// Length-prefixed string (kind 8)
    String(String),
    /// Homogeneous list (kind 9)
    List(Vec<Tag>),
    /// Named children terminated by an end tag (kind 10)
    Compound(HashMap<String, Tag>),
    /// Array of 32-bit integers (kind 11)
    IntArray(Vec<i32>),
    /// Array of 64-bit integers (kind 12)
    LongArray(Vec<i64>),
}

impl Tag {
    /// Child lookup on a compound; `None` for any other kind.
    pub fn get(&self, name: &str) -> Option<&Tag> {
        match self {
            Tag::Compound(map) => map.get(name),
            _ => None,
        }
    }

    /// The compound's children, if this is a compound.
    pub fn as_compound(&self) -> Option<&HashMap<String, Tag>> {
        match self {
            Tag::Compound(map) => Some(map),
            _ => None,
        }
    }

    /// The list's elements, if this is a list.
    pub fn as_list(&self) -> Option<&[Tag]> {
        match self {
            Tag::List(items) => Some(items),
            _ => None,
        }
    }

    /// String contents, if this is a string tag.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Tag::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integral value widened to i64 for any integer kind.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Tag::Byte(v) => Some(*v as i64),
            Tag::Short(v) => Some(*v as i64),
            Tag::Int(v) => Some(*v as i64),
            Tag::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric value widened to f64 for any numeric kind.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Tag::Float(v) => Some(*v as f64),
            Tag::Double(v) => Some(*v),
            other => other.as_i64().map(|v| v as f64),
        }
    }
}

//! Recursive-descent NBT decoder.
//!
//! Every read is bounds-checked against the input buffer; a truncated or
//! malformed stream surfaces as a [`DecodeError`], never as a panic or an
//! out-of-bounds read.

use std::collections::HashMap;

use thiserror::Error;

use super::tag::Tag;

const TAG_END: u8 = 0;
const TAG_BYTE: u8 = 1;
const TAG_SHORT: u8 = 2;
const TAG_INT: u8 = 3;
const TAG_LONG: u8 = 4;
const TAG_FLOAT: u8 = 5;
const TAG_DOUBLE: u8 = 6;
const TAG_BYTE_ARRAY: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_LIST: u8 = 9;
const TAG_COMPOUND: u8 = 10;
const TAG_INT_ARRAY: u8 = 11;
const TAG_LONG_ARRAY: u8 = 12;

/// Maximum compound/list nesting the decoder will follow, matching the
/// vanilla reader's limit. Anything deeper is rejected rather than risking
/// stack exhaustion.
pub const MAX_DEPTH: usize = 512;

/// Errors from decoding an NBT stream.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DecodeError {
    /// Read would run past the end of the input buffer
    #[error("unexpected end of NBT data: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },

    /// Tag kind discriminant outside the known range
    #[error("unknown NBT tag kind: {0}")]
    UnknownTagKind(u8),

    /// Root tag was not a compound
    #[error("expected compound root tag, got kind {0}")]
    RootNotCompound(u8),

    /// List or array declared a negative element count
    #[error("negative length {0} in NBT stream")]
    NegativeLength(i32),

    /// Compound/list nesting exceeded [`MAX_DEPTH`]
    #[error("NBT nesting deeper than {MAX_DEPTH} levels")]
    DepthLimitExceeded,
}

/// Decode a complete NBT document.
///
/// The stream must start with a named compound tag (kind 10); the root's
/// name is discarded and its children returned.
pub fn decode_root(data: &[u8]) -> Result<HashMap<String, Tag>, DecodeError> {
    let mut r = Reader { data, pos: 0 };
    let kind = r.read_u8()?;
    if kind != TAG_COMPOUND {
        return Err(DecodeError::RootNotCompound(kind));
    }
    r.read_string()?; // root name, ignored
    r.read_compound(0)
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let remaining = self.data.len() - self.pos;
        if n > remaining {
            return Err(DecodeError::UnexpectedEof {
                needed: n,
                remaining,
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn read_i16(&mut self) -> Result<i16, DecodeError> {
        let b = self.take(2)?;
        Ok(i16::from_be_bytes([b[0], b[1]]))
    }

    fn read_i32(&mut self) -> Result<i32, DecodeError> {
        let b = self.take(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_i64(&mut self) -> Result<i64, DecodeError> {
        let b = self.take(8)?;
        Ok(i64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn read_f32(&mut self) -> Result<f32, DecodeError> {
        let b = self.take(4)?;
        Ok(f32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_f64(&mut self) -> Result<f64, DecodeError> {
        let b = self.take(8)?;
        Ok(f64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// 2-byte big-endian length prefix, then UTF-8 text. Invalid sequences
    /// are replaced rather than rejected, matching vanilla reader behavior.
    fn read_string(&mut self) -> Result<String, DecodeError> {
        let len = self.read_i16()? as u16 as usize;
        let bytes = self.take(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    fn read_len(&mut self) -> Result<usize, DecodeError> {
        let len = self.read_i32()?;
        if len < 0 {
            return Err(DecodeError::NegativeLength(len));
        }
        Ok(len as usize)
    }

    fn read_compound(&mut self, depth: usize) -> Result<HashMap<String, Tag>, DecodeError> {
        if depth > MAX_DEPTH {
            return Err(DecodeError::DepthLimitExceeded);
        }
        let mut map = HashMap::new();
        loop {
            let kind = self.read_u8()?;
            if kind == TAG_END {
                return Ok(map);
            }
            let name = self.read_string()?;
            let value = self.read_value(kind, depth)?;
            map.insert(name, value);
        }
    }

    fn read_list(&mut self, depth: usize) -> Result<Vec<Tag>, DecodeError> {
        if depth > MAX_DEPTH {
            return Err(DecodeError::DepthLimitExceeded);
        }
        let element_kind = self.read_u8()?;
        let len = self.read_len()?;
        let mut items = Vec::new();
        for _ in 0..len {
            items.push(self.read_value(element_kind, depth)?);
        }
        Ok(items)
    }

    fn read_value(&mut self, kind: u8, depth: usize) -> Result<Tag, DecodeError> {
        match kind {
            TAG_BYTE => Ok(Tag::Byte(self.read_u8()? as i8)),
            TAG_SHORT => Ok(Tag::Short(self.read_i16()?)),
            TAG_INT => Ok(Tag::Int(self.read_i32()?)),
            TAG_LONG => Ok(Tag::Long(self.read_i64()?)),
            TAG_FLOAT => Ok(Tag::Float(self.read_f32()?)),
            TAG_DOUBLE => Ok(Tag::Double(self.read_f64()?)),
            TAG_BYTE_ARRAY => {
                let len = self.read_len()?;
                Ok(Tag::ByteArray(self.take(len)?.to_vec()))
            }
            TAG_STRING => Ok(Tag::String(self.read_string()?)),
            TAG_LIST => Ok(Tag::List(self.read_list(depth + 1)?)),
            TAG_COMPOUND => Ok(Tag::Compound(self.read_compound(depth + 1)?)),
            TAG_INT_ARRAY => {
                let len = self.read_len()?;
                let mut values = Vec::with_capacity(len.min(4096));
                for _ in 0..len {
                    values.push(self.read_i32()?);
                }
                Ok(Tag::IntArray(values))
            }
            TAG_LONG_ARRAY => {
                let len = self.read_len()?;
                let mut values = Vec::with_capacity(len.min(4096));
                for _ in 0..len {
                    values.push(self.read_i64()?);
                }
                Ok(Tag::LongArray(values))
            }
            other => Err(DecodeError::UnknownTagKind(other)),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(children: &[(&str, Tag)]) -> HashMap<String, Tag> {
        let bytes = encode::document("root", children);
        decode_root(&bytes).expect("decode should succeed")
    }

    #[test]
    fn test_primitive_roundtrip() {
        let map = roundtrip(&[
            ("b", Tag::Byte(-5)),
            ("s", Tag::Short(1234)),
            ("i", Tag::Int(-100_000)),
            ("l", Tag::Long(1 << 40)),
            ("f", Tag::Float(1.25)),
            ("d", Tag::Double(-2.5)),
        ]);
        assert_eq!(map["b"], Tag::Byte(-5));
        assert_eq!(map["s"], Tag::Short(1234));
        assert_eq!(map["i"], Tag::Int(-100_000));
        assert_eq!(map["l"], Tag::Long(1 << 40));
        assert_eq!(map["f"], Tag::Float(1.25));
        assert_eq!(map["d"], Tag::Double(-2.5));
    }

    #[test]
    fn test_arrays_and_strings_roundtrip() {
        let map = roundtrip(&[
            ("bytes", Tag::ByteArray(vec![1, 2, 3])),
            ("ints", Tag::IntArray(vec![-1, 0, 1])),
            ("longs", Tag::LongArray(vec![i64::MIN, i64::MAX])),
            ("name", Tag::String("minecraft:cow".into())),
        ]);
        assert_eq!(map["bytes"], Tag::ByteArray(vec![1, 2, 3]));
        assert_eq!(map["ints"], Tag::IntArray(vec![-1, 0, 1]));
        assert_eq!(map["longs"], Tag::LongArray(vec![i64::MIN, i64::MAX]));
        assert_eq!(map["name"], Tag::String("minecraft:cow".into()));
    }

    #[test]
    fn test_nested_compound_and_list() {
        let mut inner = HashMap::new();
        inner.insert("y".to_string(), Tag::Int(64));
        let map = roundtrip(&[
            (
                "Pos",
                Tag::List(vec![Tag::Double(1.0), Tag::Double(2.0), Tag::Double(3.0)]),
            ),
            ("Data", Tag::Compound(inner.clone())),
        ]);
        assert_eq!(
            map["Pos"],
            Tag::List(vec![Tag::Double(1.0), Tag::Double(2.0), Tag::Double(3.0)])
        );
        assert_eq!(map["Data"], Tag::Compound(inner));
    }

    #[test]
    fn test_empty_list() {
        let map = roundtrip(&[("empty", Tag::List(vec![]))]);
        assert_eq!(map["empty"], Tag::List(vec![]));
    }

    #[test]
    fn test_root_must_be_compound() {
        // Kind 3 (int) as root
        let bytes = vec![3, 0, 0, 0, 0, 0, 42];
        assert_eq!(decode_root(&bytes), Err(DecodeError::RootNotCompound(3)));
    }

    #[test]
    fn test_unknown_tag_kind_rejected() {
        let mut bytes = encode::document("root", &[]);
        // Splice an unknown kind (13) in place of the end marker
        let end = bytes.len() - 1;
        bytes[end] = 13;
        bytes.extend_from_slice(&[0, 1, b'x', 0]);
        assert_eq!(decode_root(&bytes), Err(DecodeError::UnknownTagKind(13)));
    }

    #[test]
    fn test_truncated_stream_is_error_not_panic() {
        let bytes = encode::document("root", &[("i", Tag::Int(7))]);
        for cut in 0..bytes.len() {
            let result = decode_root(&bytes[..cut]);
            assert!(result.is_err(), "truncation at {} should fail", cut);
        }
    }

    #[test]
    fn test_string_length_never_reads_past_end() {
        // Compound root declaring a string whose length exceeds the buffer
        let mut bytes = vec![10, 0, 0]; // root compound, empty name
        bytes.push(8); // string tag
        bytes.extend_from_slice(&[0, 1, b'n']); // name "n"
        bytes.extend_from_slice(&[0x7f, 0xff]); // claimed length 32767
        bytes.push(b'x'); // only one byte present
        let err = decode_root(&bytes).unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedEof { .. }));
    }

    #[test]
    fn test_deeply_nested_compounds_rejected_not_overflowed() {
        let mut bytes = vec![10, 0, 0]; // root compound, empty name
        for _ in 0..(MAX_DEPTH + 10) {
            bytes.push(10); // child compound named "a"
            bytes.extend_from_slice(&[0, 1, b'a']);
        }
        // No end tags needed; the depth limit trips first
        assert_eq!(decode_root(&bytes), Err(DecodeError::DepthLimitExceeded));
    }

    #[test]
    fn test_deeply_nested_lists_rejected_not_overflowed() {
        let mut bytes = vec![10, 0, 0];
        bytes.push(9); // list named "l"
        bytes.extend_from_slice(&[0, 1, b'l']);
        for _ in 0..(MAX_DEPTH + 10) {
            bytes.push(9); // element kind: list
            bytes.extend_from_slice(&1i32.to_be_bytes());
        }
        assert_eq!(decode_root(&bytes), Err(DecodeError::DepthLimitExceeded));
    }

    #[test]
    fn test_nesting_within_limit_decodes() {
        let levels = 32;
        let mut bytes = vec![10, 0, 0];
        for _ in 0..levels {
            bytes.push(10);
            bytes.extend_from_slice(&[0, 1, b'a']);
        }
        for _ in 0..=levels {
            bytes.push(0);
        }
        assert!(decode_root(&bytes).is_ok());
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(
            decode_root(&[]),
            Err(DecodeError::UnexpectedEof { .. })
        ));
    }
}

//! Object stream parsing (PDF 1.5+).
//!
//! Object streams (/Type /ObjStm) allow multiple objects to be compressed together
//! in a single stream for better compression ratios.
//!
//! # Format
//!
//! ```text
//! N 0 obj
//! << /Type /ObjStm
//!    /N 5              % Number of objects in stream
//!    /First 30         % Byte offset to first object's data
//!    /Filter /FlateDecode
//! >>
//! stream
//! 10 0 11 15 12 28 13 42 14 55    % Pairs: (obj_num, offset)
//! <dict>                           % Object 10 at offset 0
//! <array>                          % Object 11 at offset 15
//! ...
//! endstream
//! endobj
//! ```
//!
//! Offsets in the header are relative to `/First`. Cross-reference streams
//! address compressed objects by their index in the header, not by offset.

use crate::error::{Error, Result};
use crate::lexer::skip_ws;
use crate::object::Object;
use crate::parser::{error_offset, ObjectParser};
use crate::parser_config::ParserOptions;

/// Upper bound on `/N`.
const MAX_OBJECTS_PER_STREAM: i64 = 1_000_000;

/// A decoded object stream whose members are parsed on demand.
#[derive(Debug, Clone)]
pub struct ObjectStream {
    data: Vec<u8>,
    first: usize,
    pairs: Vec<(u32, usize)>,
}

impl ObjectStream {
    /// Number of objects listed in the header.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether the stream holds no objects.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Object number at position `index`.
    pub fn object_number(&self, index: usize) -> Option<u32> {
        self.pairs.get(index).map(|&(num, _)| num)
    }

    /// Position of object `obj_num` in the header.
    pub fn index_of(&self, obj_num: u32) -> Option<usize> {
        self.pairs.iter().position(|&(num, _)| num == obj_num)
    }

    /// Parse the object at position `index`.
    ///
    /// # Errors
    ///
    /// [`Error::MalformedDocument`] with an offset relative to the decoded
    /// stream data when the index or the object is invalid.
    pub fn object_at(&self, index: usize, parser: &ObjectParser<'_>) -> Result<(u32, Object)> {
        let &(obj_num, relative) = self.pairs.get(index).ok_or_else(|| {
            Error::malformed(0, format!("index {} beyond {} objects", index, self.pairs.len()))
        })?;

        let start = self.first.checked_add(relative).ok_or_else(|| {
            Error::malformed(self.first, format!("offset of object {} overflows", obj_num))
        })?;
        let input = self.data.get(start..).filter(|s| !s.is_empty()).ok_or_else(|| {
            Error::malformed(start, format!("object {} lies beyond stream data", obj_num))
        })?;

        match parser.parse(input) {
            Ok((_, Object::Stream { .. })) => {
                Err(Error::malformed(start, format!("object {} is a stream", obj_num)))
            },
            Ok((_, obj)) => Ok((obj_num, obj)),
            Err(e) => Err(Error::malformed(
                start + error_offset(input, &e),
                format!("unparseable object {}", obj_num),
            )),
        }
    }
}

/// Decode an object stream and read its header.
///
/// # Errors
///
/// Returns an error if:
/// - The object is not a stream, or its /Type is not /ObjStm
/// - /N or /First is missing or out of range
/// - Stream decoding fails or exceeds the decompression limits
/// - The header holds fewer than /N integer pairs
pub fn parse_object_stream(stream_obj: &Object, options: &ParserOptions) -> Result<ObjectStream> {
    let dict = match stream_obj {
        Object::Stream { dict, .. } => dict,
        _ => {
            return Err(Error::malformed(
                0,
                format!("object stream is a {}, not a Stream", stream_obj.type_name()),
            ))
        },
    };

    if let Some(type_name) = stream_obj.dict_type() {
        if type_name != "ObjStm" {
            return Err(Error::malformed(0, format!("expected /Type /ObjStm, got /{}", type_name)));
        }
    }

    let n = dict
        .get("N")
        .and_then(Object::as_integer)
        .ok_or_else(|| Error::malformed(0, "object stream missing /N entry"))?;
    let first = dict
        .get("First")
        .and_then(Object::as_integer)
        .ok_or_else(|| Error::malformed(0, "object stream missing /First entry"))?;

    if !(0..=MAX_OBJECTS_PER_STREAM).contains(&n) {
        return Err(Error::malformed(0, format!("invalid object stream /N value: {}", n)));
    }
    if first < 0 {
        return Err(Error::malformed(0, format!("invalid object stream /First value: {}", first)));
    }

    let data = stream_obj.decode_stream_data(Some(options))?;
    let first = first as usize;

    if data.len() < first {
        return Err(Error::malformed(
            data.len(),
            format!("object stream data too short: {} bytes, /First is {}", data.len(), first),
        ));
    }

    let pairs = parse_object_number_pairs(&data[..first], n as usize)?;
    log::trace!("Object stream with {} objects", pairs.len());

    Ok(ObjectStream { data, first, pairs })
}

/// Parse the header: `count` pairs of (object number, relative offset).
fn parse_object_number_pairs(data: &[u8], count: usize) -> Result<Vec<(u32, usize)>> {
    let mut pairs = Vec::with_capacity(count.min(4096));
    let mut remaining = data;

    for i in 0..count {
        let (rest, obj_num) = read_unsigned(remaining).ok_or_else(|| {
            Error::malformed(data.len() - remaining.len(), format!("missing object number for pair {}", i))
        })?;
        let (rest, offset) = read_unsigned(rest).ok_or_else(|| {
            Error::malformed(data.len() - rest.len(), format!("missing offset for pair {}", i))
        })?;

        let obj_num = u32::try_from(obj_num)
            .map_err(|_| Error::malformed(0, format!("object number {} out of range", obj_num)))?;
        let offset = usize::try_from(offset)
            .map_err(|_| Error::malformed(0, format!("offset {} of object {} out of range", offset, obj_num)))?;
        pairs.push((obj_num, offset));
        remaining = rest;
    }

    Ok(pairs)
}

/// Read an unsigned decimal integer after optional whitespace.
fn read_unsigned(data: &[u8]) -> Option<(&[u8], u64)> {
    let data = skip_ws(data);
    let len = data.iter().take_while(|b| b.is_ascii_digit()).count();
    let value = std::str::from_utf8(&data[..len]).ok()?.parse().ok()?;
    Some((&data[len..], value))
}

//! PDF object serialization.
//!
//! Serializes PDF objects to their byte representation according to
//! PDF specification ISO 32000-1:2008, Section 7.3.

use crate::object::{Dictionary, Object, ObjectRef};
use std::io::Write;

/// Serializer for PDF objects.
///
/// Converts PDF Object types to their byte representation following
/// the PDF specification syntax rules. Dictionaries are written in their
/// stored key order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectSerializer {
    /// Whether to use compact formatting (minimal whitespace)
    compact: bool,
}

impl ObjectSerializer {
    /// Create a new object serializer with readable dictionary layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a compact serializer (minimal whitespace).
    pub fn compact() -> Self {
        Self { compact: true }
    }

    /// Create a serializer with the given layout.
    pub fn with_compact(compact: bool) -> Self {
        Self { compact }
    }

    /// Serialize an object to bytes.
    pub fn serialize(&self, obj: &Object) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_into(&mut buf, obj);
        buf
    }

    /// Write an indirect object definition.
    ///
    /// Format: `{id} {gen} obj\n{object}\nendobj\n`
    pub fn write_indirect<W: Write>(&self, w: &mut W, id: ObjectRef, obj: &Object) -> std::io::Result<()> {
        let mut buf = format!("{} {} obj\n", id.id, id.gen).into_bytes();
        self.write_into(&mut buf, obj);
        buf.extend_from_slice(b"\nendobj\n");
        w.write_all(&buf)
    }

    /// Write an object to a buffer.
    pub fn write_into(&self, buf: &mut Vec<u8>, obj: &Object) {
        match obj {
            Object::Null => buf.extend_from_slice(b"null"),
            Object::Boolean(b) => buf.extend_from_slice(if *b { b"true" } else { b"false" }),
            Object::Integer(i) => buf.extend_from_slice(i.to_string().as_bytes()),
            Object::Real(r) => write_real(buf, *r),
            Object::String(s) => write_string(buf, s),
            Object::Name(n) => write_name(buf, n),
            Object::Array(arr) => self.write_array(buf, arr),
            Object::Dictionary(dict) => self.write_dictionary(buf, dict),
            Object::Stream { dict, data } => self.write_stream(buf, dict, data),
            Object::Reference(r) => buf.extend_from_slice(format!("{} {} R", r.id, r.gen).as_bytes()),
        }
    }

    /// Write a PDF array.
    fn write_array(&self, buf: &mut Vec<u8>, arr: &[Object]) {
        buf.push(b'[');
        for (i, obj) in arr.iter().enumerate() {
            if i > 0 {
                buf.push(b' ');
            }
            self.write_into(buf, obj);
        }
        buf.push(b']');
    }

    /// Write a PDF dictionary.
    fn write_dictionary(&self, buf: &mut Vec<u8>, dict: &Dictionary) {
        buf.extend_from_slice(b"<<");

        for (key, value) in dict {
            if !self.compact {
                buf.extend_from_slice(b"\n  ");
            }
            write_name(buf, key);
            buf.push(b' ');
            self.write_into(buf, value);
        }

        if !self.compact && !dict.is_empty() {
            buf.push(b'\n');
        }
        buf.extend_from_slice(b">>");
    }

    /// Write a PDF stream. `/Length` is always the payload size.
    fn write_stream(&self, buf: &mut Vec<u8>, dict: &Dictionary, data: &[u8]) {
        let mut dict_with_length = dict.clone();
        dict_with_length.insert("Length".to_string(), Object::Integer(data.len() as i64));

        self.write_dictionary(buf, &dict_with_length);
        buf.extend_from_slice(b"\nstream\n");
        buf.extend_from_slice(data);
        buf.extend_from_slice(b"\nendstream");
    }
}

/// Write a real number in its shortest exact decimal form.
fn write_real(buf: &mut Vec<u8>, value: f64) {
    if !value.is_finite() {
        log::warn!("Non-finite real {} written as 0", value);
        buf.push(b'0');
    } else if value == 0.0 {
        buf.push(b'0');
    } else {
        // f64 Display is the shortest round-trip form and never uses an exponent
        buf.extend_from_slice(value.to_string().as_bytes());
    }
}

/// Write a PDF string.
///
/// Uses literal string syntax `(...)` with proper escaping,
/// or hex string syntax `<...>` for binary data.
fn write_string(buf: &mut Vec<u8>, data: &[u8]) {
    let is_printable = data
        .iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b'\t' || (0x20..=0x7E).contains(&b));

    if is_printable {
        buf.push(b'(');
        for &byte in data {
            match byte {
                b'(' => buf.extend_from_slice(b"\\("),
                b')' => buf.extend_from_slice(b"\\)"),
                b'\\' => buf.extend_from_slice(b"\\\\"),
                b'\n' => buf.extend_from_slice(b"\\n"),
                b'\r' => buf.extend_from_slice(b"\\r"),
                b'\t' => buf.extend_from_slice(b"\\t"),
                _ => buf.push(byte),
            }
        }
        buf.push(b')');
    } else {
        buf.push(b'<');
        for byte in data {
            buf.extend_from_slice(format!("{:02X}", byte).as_bytes());
        }
        buf.push(b'>');
    }
}

/// Write a PDF name.
///
/// Names start with `/` and escape bytes outside the regular character set
/// with `#xx`. Characters up to U+00FF stand for one byte each.
fn write_name(buf: &mut Vec<u8>, name: &str) {
    buf.push(b'/');
    for c in name.chars() {
        match u8::try_from(u32::from(c)) {
            Ok(byte) => write_name_byte(buf, byte),
            Err(_) => {
                let mut utf8 = [0u8; 4];
                for &byte in c.encode_utf8(&mut utf8).as_bytes() {
                    write_name_byte(buf, byte);
                }
            },
        }
    }
}

fn write_name_byte(buf: &mut Vec<u8>, byte: u8) {
    let regular = (0x21..=0x7E).contains(&byte)
        && !matches!(
            byte,
            b'#' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
        );
    if regular {
        buf.push(byte);
    } else {
        buf.extend_from_slice(format!("#{:02X}", byte).as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_object;

    fn to_string(s: &ObjectSerializer, obj: &Object) -> String {
        String::from_utf8_lossy(&s.serialize(obj)).to_string()
    }

    fn dict(entries: Vec<(&str, Object)>) -> Dictionary {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn test_serialize_scalars() {
        let s = ObjectSerializer::new();
        assert_eq!(to_string(&s, &Object::Null), "null");
        assert_eq!(to_string(&s, &Object::Boolean(true)), "true");
        assert_eq!(to_string(&s, &Object::Boolean(false)), "false");
        assert_eq!(to_string(&s, &Object::Integer(-123)), "-123");
        assert_eq!(to_string(&s, &Object::Reference(ObjectRef::new(10, 2))), "10 2 R");
    }

    #[test]
    fn test_serialize_real() {
        let s = ObjectSerializer::new();
        assert_eq!(to_string(&s, &Object::Real(3.14258)), "3.14258");
        assert_eq!(to_string(&s, &Object::Real(1.0)), "1");
        assert_eq!(to_string(&s, &Object::Real(-0.5)), "-0.5");
        assert_eq!(to_string(&s, &Object::Real(0.1)), "0.1");
        assert_eq!(to_string(&s, &Object::Real(-0.0)), "0");
        assert_eq!(to_string(&s, &Object::Real(1e20)), "100000000000000000000");
        assert_eq!(to_string(&s, &Object::Real(f64::NAN)), "0");
    }

    #[test]
    fn test_serialize_string() {
        let s = ObjectSerializer::new();
        assert_eq!(to_string(&s, &Object::String(b"Hello".to_vec())), "(Hello)");
        assert_eq!(to_string(&s, &Object::String(b"Test (parens)".to_vec())), "(Test \\(parens\\))");
        assert_eq!(to_string(&s, &Object::String(b"a\\b\n".to_vec())), "(a\\\\b\\n)");
    }

    #[test]
    fn test_serialize_hex_string() {
        let s = ObjectSerializer::new();
        assert_eq!(to_string(&s, &Object::String(vec![0x00, 0xFF, 0x80])), "<00FF80>");
    }

    #[test]
    fn test_serialize_name() {
        let s = ObjectSerializer::new();
        assert_eq!(to_string(&s, &Object::name("Type")), "/Type");
        assert_eq!(to_string(&s, &Object::name("Name With Space")), "/Name#20With#20Space");
        assert_eq!(to_string(&s, &Object::name("A#B(C)")), "/A#23B#28C#29");
        assert_eq!(to_string(&s, &Object::name("a/b%c")), "/a#2Fb#25c");
        assert_eq!(to_string(&s, &Object::name("caf\u{e9}")), "/caf#E9");
    }

    #[test]
    fn test_name_round_trip_through_parser() {
        let s = ObjectSerializer::compact();
        let name = Object::name("Odd [name] #1 \u{e9}");
        let bytes = s.serialize(&name);
        let (_, parsed) = parse_object(&bytes).unwrap();
        assert_eq!(parsed, name);
    }

    #[test]
    fn test_serialize_array() {
        let s = ObjectSerializer::compact();
        let arr = Object::Array(vec![Object::Integer(1), Object::Integer(2), Object::Integer(3)]);
        assert_eq!(to_string(&s, &arr), "[1 2 3]");
    }

    #[test]
    fn test_dictionary_preserves_key_order() {
        let obj = Object::Dictionary(dict(vec![
            ("Type", Object::name("Page")),
            ("Count", Object::Integer(1)),
            ("Alpha", Object::Null),
        ]));
        assert_eq!(
            to_string(&ObjectSerializer::compact(), &obj),
            "<</Type /Page/Count 1/Alpha null>>"
        );
        assert_eq!(
            to_string(&ObjectSerializer::new(), &obj),
            "<<\n  /Type /Page\n  /Count 1\n  /Alpha null\n>>"
        );
    }

    #[test]
    fn test_write_indirect() {
        let s = ObjectSerializer::new();
        let mut out = Vec::new();
        s.write_indirect(&mut out, ObjectRef::new(1, 0), &Object::Integer(42)).unwrap();
        assert_eq!(out, b"1 0 obj\n42\nendobj\n");
    }

    #[test]
    fn test_stream_length_rewritten() {
        let s = ObjectSerializer::compact();
        let stream = Object::Stream {
            dict: dict(vec![
                ("Length", Object::Reference(ObjectRef::new(9, 0))),
                ("Filter", Object::name("FlateDecode")),
            ]),
            data: bytes::Bytes::from_static(b"stream data"),
        };

        let result = to_string(&s, &stream);
        assert_eq!(result, "<</Length 11/Filter /FlateDecode>>\nstream\nstream data\nendstream");
    }
}

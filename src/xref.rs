//! Cross-reference table parser.
//!
//! The xref table maps object numbers to byte offsets in the PDF file,
//! enabling random access to PDF objects.
//!
//! Supports traditional xref tables (PDF 1.0-1.4), cross-reference streams
//! (PDF 1.5+), hybrid files whose trailer points at an additional stream via
//! `/XRefStm`, and chains of incremental updates linked by `/Prev`.

use crate::error::{Error, Result};
use crate::lexer::{is_whitespace, skip_ws};
use crate::object::{Dictionary, Object};
use crate::parser::{error_offset, parse_indirect_object_at, ObjectParser};
use crate::parser_config::ParserOptions;
use std::collections::{BTreeMap, HashSet};

/// Upper bound on the number of sections in a `/Prev` chain.
const MAX_XREF_SECTIONS: usize = 100;

/// Upper bound on the entry count of a single subsection.
const MAX_SUBSECTION_COUNT: u64 = 1_000_000;

/// How many trailing bytes are searched for `startxref`.
const STARTXREF_SEARCH_WINDOW: usize = 2048;

/// Cross-reference table entry type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntryType {
    /// Entry for a free object
    Free,
    /// Entry for an uncompressed object at a byte offset
    Uncompressed,
    /// Entry for an object in an object stream (PDF 1.5+)
    Compressed,
}

/// Cross-reference table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XRefEntry {
    /// Type of entry
    pub entry_type: XRefEntryType,
    /// Byte offset (uncompressed), object stream number (compressed) or next free object
    pub offset: u64,
    /// Generation number (uncompressed, free) or index within stream (compressed)
    pub generation: u16,
}

impl XRefEntry {
    /// Create a new uncompressed entry.
    pub fn uncompressed(offset: u64, generation: u16) -> Self {
        Self {
            entry_type: XRefEntryType::Uncompressed,
            offset,
            generation,
        }
    }

    /// Create a new compressed entry (object in object stream).
    pub fn compressed(stream_obj_num: u64, index_in_stream: u16) -> Self {
        Self {
            entry_type: XRefEntryType::Compressed,
            offset: stream_obj_num,
            generation: index_in_stream,
        }
    }

    /// Create a new free entry.
    pub fn free(next_free: u64, generation: u16) -> Self {
        Self {
            entry_type: XRefEntryType::Free,
            offset: next_free,
            generation,
        }
    }

    /// Whether the entry describes an object that exists.
    pub fn in_use(&self) -> bool {
        self.entry_type != XRefEntryType::Free
    }
}

/// Merged cross-reference data of a whole file.
#[derive(Debug, Clone, Default)]
pub struct CrossRefTable {
    entries: BTreeMap<u32, XRefEntry>,
    trailer: Dictionary,
    sections: Vec<u64>,
}

impl CrossRefTable {
    /// Create a new empty cross-reference table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trailer dictionary (for xref streams, the stream dictionary).
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// Replace the trailer dictionary.
    pub fn set_trailer(&mut self, trailer: Dictionary) {
        self.trailer = trailer;
    }

    /// Consume the table, returning the trailer.
    pub fn into_trailer(self) -> Dictionary {
        self.trailer
    }

    /// Byte offsets of every section read, newest first.
    pub fn sections(&self) -> &[u64] {
        &self.sections
    }

    /// Add or replace an entry.
    pub fn add_entry(&mut self, object_number: u32, entry: XRefEntry) {
        self.entries.insert(object_number, entry);
    }

    /// Get an entry by object number.
    pub fn get(&self, object_number: u32) -> Option<&XRefEntry> {
        self.entries.get(&object_number)
    }

    /// Entries in object number order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &XRefEntry)> + '_ {
        self.entries.iter().map(|(&num, entry)| (num, entry))
    }

    /// Number of entries, free ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge a section written before this one.
    ///
    /// Entries already present win. Trailer keys missing here are filled
    /// from the older trailer, except the chain links themselves.
    pub fn merge_older(&mut self, older: CrossRefTable) {
        for (obj_num, entry) in older.entries {
            self.entries.entry(obj_num).or_insert(entry);
        }
        for (key, value) in older.trailer {
            if key != "Prev" && key != "XRefStm" && !self.trailer.contains_key(&key) {
                self.trailer.insert(key, value);
            }
        }
        self.sections.extend(older.sections);
    }

    /// Merge entries of a hybrid file's `/XRefStm` section.
    ///
    /// Stream entries fill object numbers this table lists as free or not at all.
    fn merge_hybrid(&mut self, stream: CrossRefTable) {
        for (obj_num, entry) in stream.entries {
            let replace = self
                .entries
                .get(&obj_num)
                .map_or(true, |existing| !existing.in_use());
            if replace && entry.in_use() {
                self.entries.insert(obj_num, entry);
            }
        }
        self.sections.extend(stream.sections);
    }
}

/// Find the byte offset of the newest xref section from `startxref`.
///
/// Only the last 2 KiB of the file are searched.
///
/// # Errors
///
/// [`Error::MalformedDocument`] when the keyword or its offset is missing.
pub fn find_xref_offset(data: &[u8]) -> Result<u64> {
    let window_start = data.len().saturating_sub(STARTXREF_SEARCH_WINDOW);
    let window = &data[window_start..];
    let keyword = b"startxref";

    let keyword_pos = window
        .windows(keyword.len())
        .rposition(|w| w == keyword)
        .ok_or_else(|| Error::malformed(data.len(), "startxref not found"))?;

    let digits_start = window_start + keyword_pos + keyword.len();
    let after = skip_ws(&data[digits_start..]);
    let digits: Vec<u8> = after.iter().take_while(|b| b.is_ascii_digit()).copied().collect();

    std::str::from_utf8(&digits)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| Error::malformed(digits_start, "startxref is not followed by an offset"))
}

/// Parse the xref section at `offset` and every section it chains to.
///
/// # Errors
///
/// [`Error::MalformedDocument`] when a section cannot be read, when the
/// `/Prev` chain loops, or when it is longer than 100 sections.
pub fn parse_xref(data: &[u8], offset: u64, options: &ParserOptions) -> Result<CrossRefTable> {
    let mut visited = HashSet::new();
    let mut next = Some(offset);
    let mut merged: Option<CrossRefTable> = None;

    while let Some(section_offset) = next {
        if !visited.insert(section_offset) {
            return Err(Error::malformed(section_offset as usize, "cycle in /Prev chain"));
        }
        if visited.len() > MAX_XREF_SECTIONS {
            return Err(Error::malformed(
                section_offset as usize,
                format!("/Prev chain longer than {} sections", MAX_XREF_SECTIONS),
            ));
        }

        let section = parse_section(data, section_offset, options)?;
        next = section
            .trailer
            .get("Prev")
            .and_then(Object::as_integer)
            .filter(|&prev| prev >= 0)
            .map(|prev| prev as u64);

        if let Some(prev) = next {
            log::debug!("Section at {} continues at /Prev {}", section_offset, prev);
        }

        match merged.as_mut() {
            None => merged = Some(section),
            Some(newer) => newer.merge_older(section),
        }
    }

    merged.ok_or_else(|| Error::malformed(offset as usize, "no cross-reference data"))
}

/// Parse one section (table or stream), including a hybrid `/XRefStm`.
fn parse_section(data: &[u8], offset: u64, options: &ParserOptions) -> Result<CrossRefTable> {
    let start = usize::try_from(offset)
        .ok()
        .filter(|&start| start < data.len())
        .ok_or_else(|| Error::malformed(data.len(), format!("xref offset {} beyond end of file", offset)))?;
    let content = skip_ws(&data[start..]);
    let content_start = data.len() - content.len();

    if content.starts_with(b"xref") {
        log::debug!("Traditional xref at offset {}", offset);
        let mut table = parse_traditional_xref(data, content_start)?;
        table.sections.insert(0, offset);

        if let Some(stm_offset) = table.trailer.get("XRefStm").and_then(Object::as_integer) {
            log::debug!("Hybrid file, merging /XRefStm at {}", stm_offset);
            let stream = parse_xref_stream(data, stm_offset.max(0) as usize, options)?;
            table.merge_hybrid(stream);
        }
        Ok(table)
    } else if content.first().is_some_and(u8::is_ascii_digit) {
        log::debug!("Cross-reference stream at offset {}", offset);
        parse_xref_stream(data, content_start, options)
    } else {
        Err(Error::malformed(content_start, "expected 'xref' or a cross-reference stream"))
    }
}

/// Read one line, accepting CR, LF or CRLF as terminator.
///
/// Returns the line and the position after its terminator.
fn read_line(data: &[u8], pos: usize) -> (&[u8], usize) {
    let rest = &data[pos..];
    match rest.iter().position(|&b| b == b'\r' || b == b'\n') {
        Some(end) => {
            let mut next = pos + end + 1;
            if rest[end] == b'\r' && data.get(next) == Some(&b'\n') {
                next += 1;
            }
            (&rest[..end], next)
        },
        None => (rest, data.len()),
    }
}

fn trim(line: &[u8]) -> &[u8] {
    let start = line.iter().position(|&b| !is_whitespace(b)).unwrap_or(line.len());
    let end = line.iter().rposition(|&b| !is_whitespace(b)).map_or(start, |e| e + 1);
    &line[start..end]
}

fn parse_u64(field: &[u8]) -> Option<u64> {
    std::str::from_utf8(field).ok()?.parse().ok()
}

/// Parse a traditional cross-reference table and its trailer.
///
/// ```text
/// xref
/// 0 3
/// 0000000000 65535 f
/// 0000000018 00000 n
/// 0000000154 00000 n
/// trailer
/// << /Size 3 /Root 1 0 R >>
/// ```
///
/// Malformed entries become free entries so numbering stays aligned.
fn parse_traditional_xref(data: &[u8], start: usize) -> Result<CrossRefTable> {
    let mut table = CrossRefTable::new();
    let mut pos = start + b"xref".len();

    loop {
        if pos >= data.len() {
            return Err(Error::malformed(pos, "missing trailer after xref table"));
        }
        let line_start = pos;
        let (line, next) = read_line(data, pos);
        pos = next;
        let line = trim(line);

        if line.is_empty() || line.starts_with(b"%") {
            continue;
        }

        if line.starts_with(b"trailer") {
            let after_keyword = line_start
                + data[line_start..]
                    .windows(7)
                    .position(|w| w == b"trailer")
                    .unwrap_or(0)
                + 7;
            table.trailer = parse_trailer_dict(data, after_keyword)?;
            return Ok(table);
        }

        // Subsection header: "start_obj count"
        let mut fields = line.split(|&b| is_whitespace(b)).filter(|f| !f.is_empty());
        let (start_obj, count) = match (
            fields.next().and_then(parse_u64),
            fields.next().and_then(parse_u64),
            fields.next(),
        ) {
            (Some(start_obj), Some(count), None) => (start_obj, count),
            _ => return Err(Error::malformed(line_start, "invalid xref subsection header")),
        };

        if count > MAX_SUBSECTION_COUNT {
            return Err(Error::malformed(
                line_start,
                format!("xref subsection count {} exceeds limit", count),
            ));
        }
        if start_obj
            .checked_add(count)
            .filter(|&end| end <= u64::from(u32::MAX))
            .is_none()
        {
            return Err(Error::malformed(line_start, "xref subsection exceeds object number range"));
        }

        let mut i = 0;
        while i < count {
            if pos >= data.len() {
                return Err(Error::malformed(pos, "truncated xref subsection"));
            }
            let entry_start = pos;
            let (line, next) = read_line(data, pos);
            let line = trim(line);
            if line.is_empty() {
                pos = next;
                continue;
            }
            if line.starts_with(b"trailer") {
                log::warn!("Expected {} xref entries but found {} before trailer", count, i);
                break;
            }
            pos = next;

            let obj_num = (start_obj + i) as u32;
            table.add_entry(obj_num, parse_table_entry(line, entry_start));
            i += 1;
        }
    }
}

/// Parse one "nnnnnnnnnn ggggg n" entry.
fn parse_table_entry(line: &[u8], position: usize) -> XRefEntry {
    let fields: Vec<&[u8]> = line
        .split(|&b| is_whitespace(b))
        .filter(|f| !f.is_empty())
        .collect();

    let parsed = match fields.as_slice() {
        [offset, generation, flag, ..] => parse_u64(offset)
            .zip(parse_u64(generation).and_then(|g| u16::try_from(g).ok()))
            .map(|(offset, generation)| (offset, generation, flag.first().copied())),
        _ => None,
    };

    match parsed {
        Some((offset, generation, Some(b'n' | b'N'))) => XRefEntry::uncompressed(offset, generation),
        Some((offset, generation, Some(b'f' | b'F'))) => XRefEntry::free(offset, generation),
        _ => {
            log::warn!(
                "Malformed xref entry at byte {}: {:?}, treating as free",
                position,
                String::from_utf8_lossy(line)
            );
            XRefEntry::free(0, 65535)
        },
    }
}

fn parse_trailer_dict(data: &[u8], start: usize) -> Result<Dictionary> {
    let input = &data[start..];
    match ObjectParser::default().parse(input) {
        Ok((_, Object::Dictionary(dict))) => Ok(dict),
        Ok((_, other)) => Err(Error::malformed(
            start,
            format!("trailer is a {}, not a dictionary", other.type_name()),
        )),
        Err(e) => Err(Error::malformed(start + error_offset(input, &e), "unparseable trailer")),
    }
}

/// Parse a cross-reference stream (PDF 1.5+).
///
/// The stream dictionary holds:
/// - `/W [w1 w2 w3]` - field widths in bytes
/// - `/Size` - one more than the highest object number
/// - `/Index [start1 count1 ...]` - subsection ranges, default `[0 Size]`
///
/// Entry types: 0 free, 1 byte offset, 2 index in an object stream. A type
/// field of width 0 defaults to 1. Other types denote the null object.
fn parse_xref_stream(data: &[u8], offset: usize, options: &ParserOptions) -> Result<CrossRefTable> {
    let parser = ObjectParser::new(options);
    let (_, obj) = parse_indirect_object_at(data, offset, &parser)?;

    if obj.dict_type().is_some_and(|t| t != "XRef") {
        return Err(Error::malformed(offset, "expected /Type /XRef"));
    }
    let dict = match &obj {
        Object::Stream { dict, .. } => dict,
        _ => return Err(Error::malformed(offset, "xref stream is not a stream object")),
    };

    let invalid = |what: &str| Error::malformed(offset, format!("invalid {} in xref stream", what));

    let widths: Vec<usize> = dict
        .get("W")
        .and_then(Object::as_array)
        .filter(|w| w.len() == 3)
        .ok_or_else(|| invalid("/W"))?
        .iter()
        .map(|w| w.as_integer().filter(|&w| (0..=8).contains(&w)).map(|w| w as usize))
        .collect::<Option<_>>()
        .ok_or_else(|| invalid("/W"))?;
    let (w1, w2, w3) = (widths[0], widths[1], widths[2]);
    let entry_size = w1 + w2 + w3;
    if entry_size == 0 {
        return Err(invalid("/W"));
    }

    let size = dict
        .get("Size")
        .and_then(Object::as_integer)
        .filter(|&s| s >= 0)
        .ok_or_else(|| invalid("/Size"))? as u64;

    let ranges: Vec<(u64, u64)> = match dict.get("Index") {
        Some(index) => {
            let items = index.as_array().ok_or_else(|| invalid("/Index"))?;
            if items.len() % 2 != 0 {
                return Err(invalid("/Index"));
            }
            items
                .chunks(2)
                .map(|pair| {
                    let start = pair[0].as_integer().filter(|&v| v >= 0)?;
                    let count = pair[1].as_integer().filter(|&v| v >= 0)?;
                    Some((start as u64, count as u64))
                })
                .collect::<Option<_>>()
                .ok_or_else(|| invalid("/Index"))?
        },
        None => vec![(0, size)],
    };

    let decoded = obj
        .decode_stream_data(Some(options))
        .map_err(|e| Error::malformed(offset, format!("cannot decode xref stream: {}", e)))?;

    let mut table = CrossRefTable::new();
    let mut rows = decoded.chunks_exact(entry_size);

    for (start_obj, count) in ranges {
        if start_obj
            .checked_add(count)
            .filter(|&end| end <= u64::from(u32::MAX))
            .is_none()
        {
            return Err(invalid("/Index"));
        }
        for i in 0..count {
            let row = rows
                .next()
                .ok_or_else(|| Error::malformed(offset, "truncated xref stream data"))?;

            let entry_type = if w1 == 0 { 1 } else { read_int(&row[..w1]) };
            let field2 = read_int(&row[w1..w1 + w2]);
            let field3 = read_int(&row[w1 + w2..]);
            let obj_num = (start_obj + i) as u32;

            let entry = match entry_type {
                0 => XRefEntry::free(field2, field3.min(u64::from(u16::MAX)) as u16),
                1 => XRefEntry::uncompressed(field2, field3.min(u64::from(u16::MAX)) as u16),
                2 => match u16::try_from(field3) {
                    Ok(index) => XRefEntry::compressed(field2, index),
                    Err(_) => return Err(Error::malformed(offset, "object stream index out of range")),
                },
                other => {
                    log::warn!("Unknown xref entry type {} for object {}", other, obj_num);
                    continue;
                },
            };
            table.add_entry(obj_num, entry);
        }
    }

    table.sections.push(offset as u64);
    table.trailer = match obj {
        Object::Stream { dict, .. } => dict,
        _ => Dictionary::new(),
    };
    Ok(table)
}

/// Read a big-endian integer of 1-8 bytes.
fn read_int(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn parse(data: &[u8]) -> Result<CrossRefTable> {
        parse_xref(data, 0, &ParserOptions::default())
    }

    // ========================================================================
    // Entries and Tables
    // ========================================================================

    #[test]
    fn test_xref_entry_kinds() {
        assert!(XRefEntry::uncompressed(1234, 0).in_use());
        assert!(XRefEntry::compressed(7, 3).in_use());
        assert!(!XRefEntry::free(0, 65535).in_use());
    }

    #[test]
    fn test_merge_older_keeps_newer_entries_and_fills_trailer() {
        let mut newer = CrossRefTable::new();
        newer.add_entry(1, XRefEntry::uncompressed(500, 0));
        newer.trailer.insert("Root".into(), Object::Reference(crate::object::ObjectRef::new(1, 0)));
        newer.trailer.insert("Prev".into(), Object::Integer(10));

        let mut older = CrossRefTable::new();
        older.add_entry(1, XRefEntry::uncompressed(10, 0));
        older.add_entry(2, XRefEntry::uncompressed(20, 0));
        older.trailer.insert("Info".into(), Object::Integer(9));
        older.trailer.insert("XRefStm".into(), Object::Integer(99));

        newer.merge_older(older);
        assert_eq!(newer.get(1).unwrap().offset, 500);
        assert_eq!(newer.get(2).unwrap().offset, 20);
        assert!(newer.trailer().contains_key("Info"));
        assert!(!newer.trailer().contains_key("XRefStm"));
        assert_eq!(newer.trailer()["Prev"], Object::Integer(10));
    }

    #[test]
    fn test_read_int() {
        assert_eq!(read_int(&[]), 0);
        assert_eq!(read_int(&[0x01, 0x02]), 0x0102);
        assert_eq!(read_int(&[0xFF, 0x00, 0x10]), 0xFF0010);
    }

    // ========================================================================
    // startxref
    // ========================================================================

    #[test]
    fn test_find_xref_offset_valid() {
        let pdf = b"%PDF-1.4\n1 0 obj\n<< >>\nendobj\nstartxref\n50\n%%EOF";
        assert_eq!(find_xref_offset(pdf).unwrap(), 50);
    }

    #[test]
    fn test_find_xref_offset_uses_last_keyword() {
        let pdf = b"startxref\n10\n%%EOF\nstartxref\n\n\n12345\n%%EOF\n";
        assert_eq!(find_xref_offset(pdf).unwrap(), 12345);
    }

    #[test]
    fn test_find_xref_offset_cr_only_line_endings() {
        assert_eq!(find_xref_offset(b"content\rstartxref\r173\r%%EOF\r").unwrap(), 173);
    }

    #[test]
    fn test_find_xref_offset_missing() {
        assert!(matches!(
            find_xref_offset(b"%PDF-1.4\ntrailer << >>\n"),
            Err(Error::MalformedDocument { .. })
        ));
        assert!(find_xref_offset(b"startxref\n%%EOF").is_err());
    }

    // ========================================================================
    // Traditional Tables
    // ========================================================================

    #[test]
    fn test_parse_xref_single_subsection() {
        let xref_data = b"xref\n\
            0 3\n\
            0000000000 65535 f\r\n\
            0000000018 00000 n\r\n\
            0000000154 00000 n\r\n\
            trailer\n\
            << /Size 3 /Root 1 0 R >>\n";

        let table = parse(xref_data).unwrap();
        assert_eq!(table.len(), 3);
        assert!(!table.get(0).unwrap().in_use());
        assert_eq!(table.get(1).unwrap(), &XRefEntry::uncompressed(18, 0));
        assert_eq!(table.get(2).unwrap().offset, 154);
        assert_eq!(table.trailer()["Size"], Object::Integer(3));
        assert_eq!(table.sections(), &[0]);
    }

    #[test]
    fn test_parse_xref_multiple_subsections() {
        let xref_data = b"xref\n\
            0 2\n\
            0000000000 65535 f\n\
            0000000018 00000 n\n\
            5 3\n\
            0000000200 00000 n\n\
            0000000300 00000 n\n\
            0000000400 00000 n\n\
            trailer << /Size 8 >>";

        let table = parse(xref_data).unwrap();
        assert_eq!(table.len(), 5);
        assert_eq!(table.get(5).unwrap().offset, 200);
        assert_eq!(table.get(7).unwrap().offset, 400);
        assert!(table.get(3).is_none());
    }

    #[test]
    fn test_parse_xref_cr_only_line_endings() {
        let xref_data = b"xref\r0 2\r0000000000 65535 f\r0000000018 00000 n\rtrailer\r<< /Size 2 >>\r";
        let table = parse(xref_data).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1).unwrap().offset, 18);
    }

    #[test]
    fn test_parse_xref_malformed_entry_becomes_free() {
        let xref_data = b"xref\n\
            0 3\n\
            0000000000 65535 f\n\
            invalid entry here\n\
            0000000018 00000 x\n\
            trailer\n<< >>";

        let table = parse(xref_data).unwrap();
        assert_eq!(table.len(), 3);
        assert!(!table.get(1).unwrap().in_use());
        assert!(!table.get(2).unwrap().in_use());
    }

    #[test]
    fn test_parse_xref_with_comments() {
        let xref_data = b"xref\n\
            % This is a comment\n\
            0 2\n\
            0000000000 65535 f\n\
            0000000018 00000 n\n\
            % Another comment\n\
            trailer\n<< >>";
        assert_eq!(parse(xref_data).unwrap().len(), 2);
    }

    #[test]
    fn test_parse_xref_errors() {
        assert!(parse(b"notxref\n0 1\n0000000000 65535 f\ntrailer\n<< >>").is_err());
        assert!(parse(b"xref\n0 2000000\n0000000000 65535 f\ntrailer\n<< >>").is_err());
        // No trailer
        assert!(parse(b"xref\n0 1\n0000000000 65535 f\n").is_err());
        // Trailer that is not a dictionary
        assert!(parse(b"xref\n0 1\n0000000000 65535 f\ntrailer\n[1 2]").is_err());
        assert!(parse_xref(b"xref", 900, &ParserOptions::default()).is_err());
    }

    #[test]
    fn test_parse_xref_subsection_beyond_object_numbers() {
        let huge = b"xref\n18446744073709551615 1\n0000000018 00000 n\ntrailer\n<< /Size 1 >>";
        assert!(matches!(parse(huge), Err(Error::MalformedDocument { .. })));

        let past_u32 = b"xref\n4294967295 2\n0000000018 00000 n\n0000000036 00000 n\ntrailer\n<< >>";
        assert!(matches!(parse(past_u32), Err(Error::MalformedDocument { .. })));
    }

    // ========================================================================
    // Incremental Updates
    // ========================================================================

    #[test]
    fn test_prev_chain_newest_wins() {
        let older = b"xref\n0 3\n0000000000 65535 f \n0000000100 00000 n \n0000000200 00000 n \ntrailer\n<< /Size 3 /Root 1 0 R /Info 9 0 R >>\n";
        let newer_offset = older.len();
        let mut data = older.to_vec();
        data.extend_from_slice(
            b"xref\n2 1\n0000000300 00000 n \ntrailer\n<< /Size 3 /Root 1 0 R /Prev 0 >>\n",
        );

        let table = parse_xref(&data, newer_offset as u64, &ParserOptions::default()).unwrap();
        assert_eq!(table.get(1).unwrap().offset, 100);
        assert_eq!(table.get(2).unwrap().offset, 300);
        assert!(table.trailer().contains_key("Info"));
        assert_eq!(table.sections(), &[newer_offset as u64, 0]);
    }

    #[test]
    fn test_prev_cycle_is_malformed() {
        let data = b"xref\n0 1\n0000000000 65535 f \ntrailer\n<< /Size 1 /Prev 0 >>\n";
        match parse(data) {
            Err(Error::MalformedDocument { reason, .. }) => assert!(reason.contains("cycle")),
            other => panic!("expected cycle error, got {:?}", other),
        }
    }

    // ========================================================================
    // Cross-Reference Streams
    // ========================================================================

    fn png_up(rows: &[Vec<u8>]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut prev = vec![0u8; rows[0].len()];
        for row in rows {
            out.push(2);
            out.extend(row.iter().zip(&prev).map(|(b, p)| b.wrapping_sub(*p)));
            prev = row.clone();
        }
        out
    }

    fn xref_stream_object(num: u32, dict: &str, payload: &[u8]) -> Vec<u8> {
        let mut out = format!("{} 0 obj\n<< /Type /XRef {} /Length {} >>\nstream\n", num, dict, payload.len())
            .into_bytes();
        out.extend_from_slice(payload);
        out.extend_from_slice(b"\nendstream\nendobj\n");
        out
    }

    #[test]
    fn test_parse_xref_stream_plain() {
        let rows: Vec<u8> = vec![
            0, 0, 0, 255, //
            1, 0, 15, 0, //
            2, 0, 9, 2,
        ];
        let data = xref_stream_object(3, "/W [1 2 1] /Size 3 /Root 1 0 R", &rows);
        let table = parse(&data).unwrap();

        assert!(!table.get(0).unwrap().in_use());
        assert_eq!(table.get(1).unwrap(), &XRefEntry::uncompressed(15, 0));
        assert_eq!(table.get(2).unwrap(), &XRefEntry::compressed(9, 2));
        assert_eq!(table.trailer().get("Root").and_then(Object::as_reference).map(|r| r.id), Some(1));
    }

    #[test]
    fn test_parse_xref_stream_flate_with_predictor_and_index() {
        let rows = vec![vec![1, 0, 10, 0], vec![1, 1, 4, 0], vec![2, 0, 7, 1]];
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&png_up(&rows)).unwrap();
        let compressed = encoder.finish().unwrap();

        let data = xref_stream_object(
            12,
            "/W [1 2 1] /Size 13 /Index [4 1 10 2] /Filter /FlateDecode /DecodeParms << /Predictor 12 /Columns 4 >>",
            &compressed,
        );
        let table = parse(&data).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.get(4).unwrap().offset, 10);
        assert_eq!(table.get(10).unwrap().offset, 260);
        assert_eq!(table.get(11).unwrap(), &XRefEntry::compressed(7, 1));
    }

    #[test]
    fn test_parse_xref_stream_truncated() {
        let data = xref_stream_object(3, "/W [1 2 1] /Size 5", &[1, 0, 15, 0]);
        assert!(parse(&data).is_err());
    }

    #[test]
    fn test_parse_xref_stream_rejects_bad_widths() {
        let data = xref_stream_object(3, "/W [1 2] /Size 1", &[1, 0, 15]);
        assert!(parse(&data).is_err());
    }

    #[test]
    fn test_hybrid_xrefstm_fills_free_entries() {
        let stream = xref_stream_object(9, "/W [1 2 1] /Size 10 /Index [5 1]", &[2, 0, 8, 0]);
        let table_offset = stream.len();
        let mut data = stream;
        data.extend_from_slice(
            b"xref\n0 6\n0000000000 65535 f \n0000000100 00000 n \n0000000000 65535 f \n0000000000 65535 f \n0000000000 65535 f \n0000000000 65535 f \n",
        );
        data.extend_from_slice(b"trailer\n<< /Size 10 /XRefStm 0 >>\n");

        let table = parse_xref(&data, table_offset as u64, &ParserOptions::default()).unwrap();
        assert_eq!(table.get(1).unwrap().offset, 100);
        assert_eq!(table.get(5).unwrap(), &XRefEntry::compressed(8, 0));
        assert_eq!(table.sections(), &[table_offset as u64, 0]);
    }
}

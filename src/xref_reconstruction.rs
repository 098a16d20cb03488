//! Cross-reference table reconstruction for damaged PDFs.
//!
//! When the xref data cannot be read, the table is rebuilt by scanning the
//! whole file for `N G obj` markers. Only used when
//! [`ParserOptions::recover_xref`] is set.

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::objstm::parse_object_stream;
use crate::parser::{parse_indirect_object_at, ObjectParser};
use crate::parser_config::ParserOptions;
use crate::xref::{CrossRefTable, XRefEntry, XRefEntryType};
use lazy_static::lazy_static;

lazy_static! {
    /// "N G obj" object headers
    static ref RE_OBJ_PATTERN: regex::bytes::Regex =
        regex::bytes::Regex::new(r"(?-u)\b(\d{1,10})[\x00\t\n\x0C\r ]+(\d{1,5})[\x00\t\n\x0C\r ]+obj\b")
            .expect("object header pattern is valid");

    /// "trailer <<" keywords
    static ref RE_TRAILER: regex::bytes::Regex =
        regex::bytes::Regex::new(r"(?-u)trailer[\x00\t\n\x0C\r ]*<<").expect("trailer pattern is valid");
}

/// Rebuild the cross-reference table by scanning `data`.
///
/// Later definitions of an object number win, as in an incremental update.
/// Members of object streams found during the scan are added as compressed
/// entries unless they are also defined directly. The trailer comes from the
/// last `trailer` dictionary that names a `/Root`, or is synthesised from
/// the object whose `/Type` is `/Catalog`.
///
/// # Errors
///
/// [`Error::MalformedDocument`] when no object or no catalog can be found.
///
/// # Example
///
/// ```
/// use pdf_reorder::parser_config::ParserOptions;
/// use pdf_reorder::xref_reconstruction::reconstruct_xref;
///
/// let pdf = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n%%EOF";
/// let xref = reconstruct_xref(pdf, &ParserOptions::lenient()).unwrap();
/// assert!(xref.get(1).is_some());
/// assert!(xref.trailer().contains_key("Root"));
/// ```
pub fn reconstruct_xref(data: &[u8], options: &ParserOptions) -> Result<CrossRefTable> {
    log::warn!("Reconstructing xref table by scanning {} bytes", data.len());

    let mut xref = CrossRefTable::new();

    for capture in RE_OBJ_PATTERN.captures_iter(data) {
        let (full, num, gen) = match (capture.get(0), capture.get(1), capture.get(2)) {
            (Some(full), Some(num), Some(gen)) => (full, num, gen),
            _ => continue,
        };
        let obj_num = std::str::from_utf8(num.as_bytes()).ok().and_then(|s| s.parse::<u32>().ok());
        let gen_num = std::str::from_utf8(gen.as_bytes()).ok().and_then(|s| s.parse::<u16>().ok());
        let (obj_num, gen_num) = match (obj_num, gen_num) {
            (Some(n), Some(g)) => (n, g),
            _ => continue,
        };

        if !followed_by_object(&data[full.end()..]) {
            log::debug!("Skipping false positive object header at offset {}", full.start());
            continue;
        }

        xref.add_entry(obj_num, XRefEntry::uncompressed(full.start() as u64, gen_num));
    }

    if xref.is_empty() {
        return Err(Error::malformed(0, "no objects found during xref reconstruction"));
    }
    log::info!("Reconstructed xref with {} objects", xref.len());

    let parser = ObjectParser::new(options);
    let mut catalog: Option<(u64, ObjectRef)> = None;
    let mut compressed = Vec::new();

    let direct: Vec<(u32, XRefEntry)> = xref.iter().map(|(num, e)| (num, e.clone())).collect();
    for (obj_num, entry) in direct {
        let obj = match parse_indirect_object_at(data, entry.offset as usize, &parser) {
            Ok((_, obj)) => obj,
            Err(e) => {
                log::debug!("Object {} at {} unreadable: {}", obj_num, entry.offset, e);
                continue;
            },
        };

        match obj.dict_type() {
            Some("Catalog") => {
                if catalog.map_or(true, |(offset, _)| entry.offset > offset) {
                    catalog = Some((entry.offset, ObjectRef::new(obj_num, entry.generation)));
                }
            },
            Some("ObjStm") => match parse_object_stream(&obj, options) {
                Ok(stream) => {
                    for index in 0..stream.len() {
                        let member = match stream.object_at(index, &parser) {
                            Ok((member, member_obj)) => {
                                if member_obj.dict_type() == Some("Catalog")
                                    && catalog.map_or(true, |(offset, _)| entry.offset >= offset)
                                {
                                    catalog = Some((entry.offset, ObjectRef::new(member, 0)));
                                }
                                member
                            },
                            Err(_) => match stream.object_number(index) {
                                Some(member) => member,
                                None => continue,
                            },
                        };
                        compressed.push((member, obj_num, index));
                    }
                },
                Err(e) => log::debug!("Object stream {} unreadable: {}", obj_num, e),
            },
            _ => {},
        }
    }

    for (member, stream_num, index) in compressed {
        let defined_directly = xref
            .get(member)
            .is_some_and(|e| e.entry_type == XRefEntryType::Uncompressed);
        if !defined_directly {
            if let Ok(index) = u16::try_from(index) {
                xref.add_entry(member, XRefEntry::compressed(u64::from(stream_num), index));
            }
        }
    }

    let trailer = match find_trailer(data) {
        Some(trailer) => trailer,
        None => {
            let (_, root) = catalog
                .ok_or_else(|| Error::malformed(0, "could not find catalog in reconstructed xref"))?;
            log::warn!("No usable trailer, using catalog {} as /Root", root);
            let size = xref.iter().map(|(num, _)| num).max().map_or(0, |max| i64::from(max) + 1);
            let mut trailer = Dictionary::new();
            trailer.insert("Size".to_string(), Object::Integer(size));
            trailer.insert("Root".to_string(), Object::Reference(root));
            trailer
        },
    };
    xref.set_trailer(trailer);

    Ok(xref)
}

/// Check that an object header is followed by something that can start an object.
fn followed_by_object(rest: &[u8]) -> bool {
    let rest = crate::lexer::skip_ws(rest);
    match rest.first() {
        Some(&b) => {
            matches!(b, b'<' | b'[' | b'(' | b'/' | b't' | b'f' | b'n' | b'-' | b'+' | b'.')
                || b.is_ascii_digit()
        },
        None => false,
    }
}

/// Parse the last `trailer` dictionary that names a `/Root`.
fn find_trailer(data: &[u8]) -> Option<Dictionary> {
    let parser = ObjectParser::default();
    let starts: Vec<usize> = RE_TRAILER.find_iter(data).map(|m| m.start()).collect();

    starts.into_iter().rev().find_map(|start| {
        let input = &data[start + b"trailer".len()..];
        match parser.parse(input) {
            Ok((_, Object::Dictionary(dict))) if dict.contains_key("Root") => Some(dict),
            Ok(_) => None,
            Err(e) => {
                log::debug!("Failed to parse trailer at {}: {:?}", start, e);
                None
            },
        }
    })
}

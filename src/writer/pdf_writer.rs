//! PDF document writer.
//!
//! Assembles a complete PDF file from a [`Document`]: header, every object
//! reachable from the trailer, one cross-reference table and the trailer.

use super::object_serializer::ObjectSerializer;
use crate::config::WriterOptions;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::Write;

/// Trailer entries that anchor reachability.
const TRAILER_ROOTS: [&str; 3] = ["Root", "Info", "Encrypt"];

/// Writes a [`Document`] as a standalone PDF file.
///
/// # Example
///
/// ```
/// use pdf_reorder::config::WriterOptions;
/// use pdf_reorder::document::Document;
/// use pdf_reorder::object::{Dictionary, Object};
/// use pdf_reorder::writer::PdfWriter;
///
/// let mut doc = Document::new((1, 7));
/// let mut catalog = Dictionary::new();
/// catalog.insert("Type".to_string(), Object::name("Catalog"));
/// let root = doc.add_object(Object::Dictionary(catalog));
/// doc.trailer_mut().insert("Root".to_string(), Object::Reference(root));
///
/// let bytes = PdfWriter::new(&doc, WriterOptions::default()).finish().unwrap();
/// assert!(bytes.starts_with(b"%PDF-1.7"));
/// ```
#[derive(Debug)]
pub struct PdfWriter<'a> {
    doc: &'a Document,
    options: WriterOptions,
    serializer: ObjectSerializer,
}

impl<'a> PdfWriter<'a> {
    /// Create a writer for `doc`.
    pub fn new(doc: &'a Document, options: WriterOptions) -> Self {
        Self {
            doc,
            options,
            serializer: ObjectSerializer::with_compact(options.compact),
        }
    }

    /// Objects reachable from the trailer roots, breadth-first.
    ///
    /// # Errors
    ///
    /// [`Error::Serialization`] if a reachable reference does not resolve.
    pub fn live_objects(&self) -> Result<Vec<ObjectRef>> {
        let mut queue = VecDeque::new();
        let mut seen = HashSet::new();
        let mut order = Vec::new();

        for key in TRAILER_ROOTS {
            if let Some(id) = self.doc.trailer().get(key).and_then(Object::as_reference) {
                if seen.insert(id) {
                    queue.push_back(id);
                }
            }
        }

        while let Some(id) = queue.pop_front() {
            let obj = self
                .doc
                .get(id)
                .ok_or_else(|| Error::Serialization(format!("unresolved reference {}", id)))?;
            order.push(id);

            let mut missing = None;
            let mut visit = |child: ObjectRef| {
                if !self.doc.contains(child) {
                    missing.get_or_insert(child);
                } else if seen.insert(child) {
                    queue.push_back(child);
                }
            };
            match obj {
                // /Length is rewritten as a direct integer
                Object::Stream { dict, .. } => dict
                    .iter()
                    .filter(|(key, _)| key.as_str() != "Length")
                    .for_each(|(_, value)| value.for_each_reference(&mut visit)),
                other => other.for_each_reference(&mut visit),
            }
            if let Some(child) = missing {
                return Err(Error::Serialization(format!(
                    "object {} references missing object {}",
                    id, child
                )));
            }
        }

        Ok(order)
    }

    /// Build the complete PDF file.
    ///
    /// # Errors
    ///
    /// [`Error::Serialization`] when the catalog is missing or not a
    /// dictionary, or a reachable reference does not resolve.
    pub fn finish(self) -> Result<Vec<u8>> {
        let catalog = self
            .doc
            .catalog_ref()
            .ok_or_else(|| Error::Serialization("trailer has no /Root reference".to_string()))?;
        match self.doc.get(catalog) {
            Some(Object::Dictionary(_)) => {},
            Some(other) => {
                return Err(Error::Serialization(format!(
                    "catalog {} is a {}, not a dictionary",
                    catalog,
                    other.type_name()
                )))
            },
            None => return Err(Error::Serialization(format!("catalog {} does not exist", catalog))),
        }

        let live = self.live_objects()?;
        let encrypted = self.doc.trailer().contains_key("Encrypt");
        let renumber = self.options.renumber && !encrypted;
        if self.options.renumber && encrypted {
            log::debug!("Encrypted document, keeping original object numbers");
        }

        let (numbering, ordered) = if renumber {
            let numbering: HashMap<ObjectRef, ObjectRef> = live
                .iter()
                .enumerate()
                .map(|(i, &id)| (id, ObjectRef::new(i as u32 + 1, 0)))
                .collect();
            (numbering, live)
        } else {
            let mut ordered = live;
            ordered.sort();
            if let Some(pair) = ordered.windows(2).find(|pair| pair[0].id == pair[1].id) {
                return Err(Error::Serialization(format!(
                    "objects {} and {} share an object number",
                    pair[0], pair[1]
                )));
            }
            let numbering = ordered.iter().map(|&id| (id, id)).collect();
            (numbering, ordered)
        };

        let mut output = Vec::new();

        // PDF Header
        writeln!(output, "%PDF-{}.{}", self.doc.version().0, self.doc.version().1)?;
        // Binary marker (recommended for binary content)
        output.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

        let mut offsets: Vec<(ObjectRef, usize)> = Vec::with_capacity(ordered.len());
        for id in &ordered {
            let mut obj = self
                .doc
                .get(*id)
                .cloned()
                .ok_or_else(|| Error::Serialization(format!("unresolved reference {}", id)))?;
            let new_id = renumbered(&numbering, *id)?;
            if let Object::Stream { dict, data } = &mut obj {
                dict.insert("Length".to_string(), Object::Integer(data.len() as i64));
            }
            remap(&mut obj, &numbering)?;

            offsets.push((new_id, output.len()));
            self.serializer.write_indirect(&mut output, new_id, &obj)?;
        }

        let size = offsets.iter().map(|(id, _)| id.id).max().map_or(1, |max| max + 1);

        // Cross-reference table
        let xref_start = output.len();
        write_xref_table(&mut output, &offsets, size)?;

        // Trailer
        let trailer = self.build_trailer(&numbering, size)?;
        writeln!(output, "trailer")?;
        self.serializer.write_into(&mut output, &Object::Dictionary(trailer));
        writeln!(output)?;
        writeln!(output, "startxref")?;
        writeln!(output, "{}", xref_start)?;
        writeln!(output, "%%EOF")?;

        log::debug!(
            "Wrote {} objects ({} bytes, renumbered: {})",
            offsets.len(),
            output.len(),
            renumber
        );
        Ok(output)
    }

    fn build_trailer(&self, numbering: &HashMap<ObjectRef, ObjectRef>, size: u32) -> Result<Dictionary> {
        let mut trailer = Dictionary::new();
        trailer.insert("Size".to_string(), Object::Integer(i64::from(size)));

        for key in TRAILER_ROOTS {
            if let Some(Object::Reference(id)) = self.doc.trailer().get(key) {
                trailer.insert(key.to_string(), Object::Reference(renumbered(numbering, *id)?));
            }
        }
        if let Some(id) = self.doc.trailer().get("ID") {
            trailer.insert("ID".to_string(), id.clone());
        }
        Ok(trailer)
    }
}

/// Write `doc` with `options`.
pub fn write_document(doc: &Document, options: &WriterOptions) -> Result<Vec<u8>> {
    PdfWriter::new(doc, *options).finish()
}

fn renumbered(numbering: &HashMap<ObjectRef, ObjectRef>, id: ObjectRef) -> Result<ObjectRef> {
    numbering
        .get(&id)
        .copied()
        .ok_or_else(|| Error::Serialization(format!("object {} is not being written", id)))
}

fn remap(obj: &mut Object, numbering: &HashMap<ObjectRef, ObjectRef>) -> Result<()> {
    let mut missing = None;
    obj.map_references(&mut |id| match numbering.get(&id) {
        Some(&new_id) => Object::Reference(new_id),
        None => {
            missing.get_or_insert(id);
            Object::Null
        },
    });
    match missing {
        Some(id) => Err(Error::Serialization(format!("unresolved reference {}", id))),
        None => Ok(()),
    }
}

/// Write a traditional xref table covering `0..size`.
///
/// Numbers without an object become free entries chained from entry 0.
fn write_xref_table(output: &mut Vec<u8>, offsets: &[(ObjectRef, usize)], size: u32) -> Result<()> {
    let in_use: HashMap<u32, (u16, usize)> = offsets
        .iter()
        .map(|(id, offset)| (id.id, (id.gen, *offset)))
        .collect();
    let free: Vec<u32> = (1..size).filter(|n| !in_use.contains_key(n)).collect();

    writeln!(output, "xref")?;
    writeln!(output, "0 {}", size)?;

    // Object 0 heads the free list
    let first_free = free.first().copied().unwrap_or(0);
    write!(output, "{:010} 65535 f\r\n", first_free)?;

    let mut next_free = free.iter().skip(1);
    for number in 1..size {
        match in_use.get(&number) {
            Some((gen, offset)) => write!(output, "{:010} {:05} n\r\n", offset, gen)?,
            None => {
                let next = next_free.next().copied().unwrap_or(0);
                write!(output, "{:010} 00000 f\r\n", next)?;
            },
        }
    }
    Ok(())
}

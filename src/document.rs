//! PDF document model.
//!
//! A [`Document`] is an arena of indirect objects keyed by [`ObjectRef`],
//! together with the header version and the merged trailer. Loading is eager:
//! every in-use cross-reference entry is parsed up front, so later stages
//! work on a self-contained graph and never touch the input bytes again.

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::objstm::{parse_object_stream, ObjectStream};
use crate::parser::{parse_indirect_object_at, LengthResolver, ObjectParser};
use crate::parser_config::ParserOptions;
use crate::xref::{find_xref_offset, parse_xref, CrossRefTable, XRefEntry, XRefEntryType};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

/// How far into the file the `%PDF-` header may start.
const HEADER_SEARCH_WINDOW: usize = 1024;

static NULL: Object = Object::Null;

/// In-memory PDF document.
///
/// # Example
///
/// ```
/// use pdf_reorder::document::Document;
/// use pdf_reorder::object::{Dictionary, Object};
///
/// let mut doc = Document::new((1, 7));
/// let id = doc.add_object(Object::Integer(42));
/// assert_eq!(id.id, 1);
/// assert_eq!(doc.resolve(&Object::Reference(id)), &Object::Integer(42));
/// ```
#[derive(Debug, Clone)]
pub struct Document {
    /// PDF version (major, minor)
    version: (u8, u8),
    /// Every loaded indirect object
    objects: BTreeMap<ObjectRef, Object>,
    /// Trailer dictionary, merged across incremental updates
    trailer: Dictionary,
    /// Byte offsets of the cross-reference sections read, newest first
    xref_offsets: Vec<u64>,
    /// Options the document was loaded with
    options: ParserOptions,
}

impl Document {
    /// Create an empty document.
    pub fn new(version: (u8, u8)) -> Self {
        Self {
            version,
            objects: BTreeMap::new(),
            trailer: Dictionary::new(),
            xref_offsets: Vec::new(),
            options: ParserOptions::default(),
        }
    }

    /// Load a document with default parser options.
    ///
    /// # Errors
    ///
    /// [`Error::MalformedDocument`] when the header, cross-reference data,
    /// trailer or any in-use object cannot be read.
    pub fn load(data: &[u8]) -> Result<Self> {
        Self::load_with_options(data, &ParserOptions::default())
    }

    /// Load a document.
    ///
    /// This function:
    /// 1. Parses the `%PDF-M.m` header
    /// 2. Locates `startxref` and reads every cross-reference section
    /// 3. Loads every in-use object, including compressed ones
    /// 4. Replaces references to missing objects with `null`
    ///
    /// With `recover_xref` set, unreadable cross-reference data is rebuilt by
    /// scanning the file.
    pub fn load_with_options(data: &[u8], options: &ParserOptions) -> Result<Self> {
        if options.max_file_size > 0 && data.len() > options.max_file_size {
            return Err(Error::malformed(
                0,
                format!("file size {} exceeds limit {}", data.len(), options.max_file_size),
            ));
        }

        let version = parse_header(data)?;
        let xref = read_xref(data, options)?;
        log::debug!(
            "PDF {}.{}: {} xref entries in {} sections",
            version.0,
            version.1,
            xref.len(),
            xref.sections().len()
        );

        let loader = Loader::new(data, &xref, options);
        let mut objects = BTreeMap::new();
        let mut skipped = 0;

        for (obj_num, entry) in xref.iter() {
            if obj_num == 0 || !entry.in_use() {
                continue;
            }
            match loader.load(obj_num, entry) {
                Ok((id, obj)) => {
                    objects.insert(id, obj);
                },
                Err(e) if options.skip_invalid_objects => {
                    skipped += 1;
                    log::warn!("Skipping object {}: {}", obj_num, e);
                    if !options.should_continue(skipped) {
                        return Err(e);
                    }
                },
                Err(e) => return Err(e),
            }
        }

        let xref_offsets = xref.sections().to_vec();
        let mut trailer = xref.into_trailer();
        trailer.shift_remove("Prev");
        trailer.shift_remove("XRefStm");

        match trailer.get("Root") {
            Some(Object::Reference(root)) if objects.contains_key(root) => {},
            Some(Object::Reference(root)) => {
                return Err(Error::malformed(0, format!("trailer /Root {} does not exist", root)))
            },
            _ => return Err(Error::malformed(0, "trailer has no /Root reference")),
        }

        let mut document = Self {
            version,
            objects,
            trailer,
            xref_offsets,
            options: *options,
        };
        document.normalize_dangling_references();

        log::debug!("Loaded {} objects", document.objects.len());
        Ok(document)
    }

    /// PDF version from the header.
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// Trailer dictionary.
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// Mutable trailer dictionary.
    pub fn trailer_mut(&mut self) -> &mut Dictionary {
        &mut self.trailer
    }

    /// Byte offsets of every cross-reference section read, newest first.
    pub fn xref_offsets(&self) -> &[u64] {
        &self.xref_offsets
    }

    /// Options the document was loaded with.
    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Number of indirect objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the document holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Look up an indirect object.
    pub fn get(&self, id: ObjectRef) -> Option<&Object> {
        self.objects.get(&id)
    }

    /// Look up an indirect object for modification.
    pub fn get_mut(&mut self, id: ObjectRef) -> Option<&mut Object> {
        self.objects.get_mut(&id)
    }

    /// Whether `id` names an object in the arena.
    pub fn contains(&self, id: ObjectRef) -> bool {
        self.objects.contains_key(&id)
    }

    /// Follow a reference. Non-references resolve to themselves and
    /// dangling references to `null`.
    pub fn resolve<'a>(&'a self, obj: &'a Object) -> &'a Object {
        match obj {
            Object::Reference(id) => self.objects.get(id).unwrap_or(&NULL),
            other => other,
        }
    }

    /// Every object in identifier order.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectRef, &Object)> + '_ {
        self.objects.iter().map(|(&id, obj)| (id, obj))
    }

    /// Reference to the document catalog from the trailer's `/Root`.
    pub fn catalog_ref(&self) -> Option<ObjectRef> {
        self.trailer.get("Root").and_then(Object::as_reference)
    }

    /// The document catalog dictionary.
    pub fn catalog(&self) -> Option<&Dictionary> {
        self.get(self.catalog_ref()?)?.as_dict()
    }

    /// Highest object number in use (0 for an empty document).
    pub fn max_object_number(&self) -> u32 {
        self.objects.keys().next_back().map_or(0, |id| id.id)
    }

    /// Store `obj` under a fresh identifier.
    pub fn add_object(&mut self, obj: Object) -> ObjectRef {
        let id = ObjectRef::new(self.max_object_number() + 1, 0);
        self.objects.insert(id, obj);
        id
    }

    /// Store `obj` under `id`, returning the previous object.
    pub fn insert(&mut self, id: ObjectRef, obj: Object) -> Option<Object> {
        self.objects.insert(id, obj)
    }

    /// Number of pages in the page tree.
    pub fn page_count(&self) -> Result<usize> {
        crate::page_tree::PageTree::walk(self).map(|tree| tree.len())
    }

    /// Replace references to absent objects with `null`.
    fn normalize_dangling_references(&mut self) {
        let present: HashSet<ObjectRef> = self.objects.keys().copied().collect();
        let mut dangling = 0usize;
        let mut replace = |id: ObjectRef| {
            if present.contains(&id) {
                Object::Reference(id)
            } else {
                dangling += 1;
                log::debug!("Dangling reference {} replaced with null", id);
                Object::Null
            }
        };

        for obj in self.objects.values_mut() {
            obj.map_references(&mut replace);
        }
        for value in self.trailer.values_mut() {
            value.map_references(&mut replace);
        }

        if dangling > 0 {
            log::warn!("Replaced {} dangling references with null", dangling);
        }
    }
}

/// Read cross-reference data, rebuilding it when allowed.
fn read_xref(data: &[u8], options: &ParserOptions) -> Result<CrossRefTable> {
    let regular = find_xref_offset(data).and_then(|offset| parse_xref(data, offset, options));

    match regular {
        Ok(xref) if xref.trailer().contains_key("Root") => Ok(xref),
        Ok(_) if options.recover_xref => {
            log::warn!("Trailer has no /Root, reconstructing xref");
            crate::xref_reconstruction::reconstruct_xref(data, options)
        },
        Ok(xref) => Ok(xref),
        Err(e) if options.recover_xref => {
            log::warn!("Regular xref parsing failed: {}, attempting reconstruction", e);
            crate::xref_reconstruction::reconstruct_xref(data, options).map_err(|recon_err| {
                log::warn!("Xref reconstruction also failed: {}", recon_err);
                e
            })
        },
        Err(e) => Err(e),
    }
}

/// Parse the `%PDF-M.m` header within the first 1024 bytes.
///
/// # Example
///
/// ```rust
/// # use pdf_reorder::document::parse_header;
/// assert_eq!(parse_header(b"%PDF-1.7\n").unwrap(), (1, 7));
/// assert_eq!(parse_header(b"junk\r\n%PDF-2.0\n").unwrap(), (2, 0));
/// assert!(parse_header(b"%PS-Adobe-3.0").is_err());
/// ```
pub fn parse_header(data: &[u8]) -> Result<(u8, u8)> {
    let window = &data[..data.len().min(HEADER_SEARCH_WINDOW)];
    let magic = b"%PDF-";
    let start = window
        .windows(magic.len())
        .position(|w| w == magic)
        .ok_or_else(|| Error::malformed(0, "missing %PDF- header"))?;

    if start > 0 {
        log::warn!("{} bytes of garbage before the PDF header", start);
    }

    let version_start = start + magic.len();
    let version = data
        .get(version_start..version_start + 3)
        .ok_or_else(|| Error::malformed(version_start, "truncated PDF header"))?;

    let (major, minor) = match version {
        [major @ b'0'..=b'9', b'.', minor @ b'0'..=b'9'] => (major - b'0', minor - b'0'),
        _ => {
            return Err(Error::malformed(
                version_start,
                format!("invalid version '{}'", String::from_utf8_lossy(version)),
            ))
        },
    };

    match (major, minor) {
        (1, _) | (2, 0) => Ok((major, minor)),
        _ => Err(Error::malformed(
            version_start,
            format!("unsupported PDF version {}.{}", major, minor),
        )),
    }
}

/// Loads objects out of the input bytes.
struct Loader<'a> {
    data: &'a [u8],
    xref: &'a CrossRefTable,
    options: &'a ParserOptions,
    /// Decoded object streams by object number
    object_streams: RefCell<HashMap<u32, Rc<ObjectStream>>>,
    /// Objects currently being loaded (cycle detection for /Length lookups)
    resolving: RefCell<HashSet<u32>>,
}

impl<'a> Loader<'a> {
    fn new(data: &'a [u8], xref: &'a CrossRefTable, options: &'a ParserOptions) -> Self {
        Self {
            data,
            xref,
            options,
            object_streams: RefCell::new(HashMap::new()),
            resolving: RefCell::new(HashSet::new()),
        }
    }

    fn load(&self, obj_num: u32, entry: &XRefEntry) -> Result<(ObjectRef, Object)> {
        match entry.entry_type {
            XRefEntryType::Uncompressed => self.load_uncompressed(obj_num, entry),
            XRefEntryType::Compressed => {
                let obj = self.load_compressed(obj_num, entry)?;
                Ok((ObjectRef::new(obj_num, 0), obj))
            },
            XRefEntryType::Free => Err(Error::malformed(0, format!("object {} is free", obj_num))),
        }
    }

    fn load_uncompressed(&self, obj_num: u32, entry: &XRefEntry) -> Result<(ObjectRef, Object)> {
        if !self.resolving.borrow_mut().insert(obj_num) {
            return Err(Error::malformed(
                entry.offset as usize,
                format!("object {} depends on itself", obj_num),
            ));
        }

        let parser = ObjectParser::new(self.options).with_length_resolver(self);
        let result = parse_indirect_object_at(self.data, entry.offset as usize, &parser);
        self.resolving.borrow_mut().remove(&obj_num);
        let (found, obj) = result?;

        if found.id != obj_num || found.gen != entry.generation {
            let reason = format!(
                "expected {} {} obj, found {} {} obj",
                obj_num, entry.generation, found.id, found.gen
            );
            if self.options.strict {
                return Err(Error::malformed(entry.offset as usize, reason));
            }
            log::warn!("Object header mismatch at offset {}: {}", entry.offset, reason);
        }

        Ok((ObjectRef::new(obj_num, entry.generation), obj))
    }

    fn load_compressed(&self, obj_num: u32, entry: &XRefEntry) -> Result<Object> {
        let stream_num = u32::try_from(entry.offset)
            .map_err(|_| Error::malformed(0, format!("object stream number {} out of range", entry.offset)))?;
        let stream = self.object_stream(stream_num)?;
        let stream_offset = self.xref.get(stream_num).map_or(0, |e| e.offset as usize);

        let mut index = usize::from(entry.generation);
        if stream.object_number(index) != Some(obj_num) {
            index = stream.index_of(obj_num).ok_or_else(|| {
                Error::malformed(
                    stream_offset,
                    format!("object {} not found in object stream {}", obj_num, stream_num),
                )
            })?;
            log::warn!("Object {} found at index {} of stream {}", obj_num, index, stream_num);
        }

        let parser = ObjectParser::new(self.options);
        stream
            .object_at(index, &parser)
            .map(|(_, obj)| obj)
            .map_err(|e| Error::malformed(stream_offset, format!("object stream {}: {}", stream_num, e)))
    }

    fn object_stream(&self, stream_num: u32) -> Result<Rc<ObjectStream>> {
        if let Some(stream) = self.object_streams.borrow().get(&stream_num) {
            return Ok(Rc::clone(stream));
        }

        let entry = self
            .xref
            .get(stream_num)
            .filter(|e| e.entry_type == XRefEntryType::Uncompressed)
            .ok_or_else(|| {
                Error::malformed(0, format!("object stream {} is not an uncompressed object", stream_num))
            })?;

        let (_, stream_obj) = self.load_uncompressed(stream_num, entry)?;
        let stream = parse_object_stream(&stream_obj, self.options).map_err(|e| {
            Error::malformed(entry.offset as usize, format!("object stream {}: {}", stream_num, e))
        })?;

        let stream = Rc::new(stream);
        self.object_streams
            .borrow_mut()
            .insert(stream_num, Rc::clone(&stream));
        Ok(stream)
    }
}

impl LengthResolver for Loader<'_> {
    fn resolve_length(&self, length_ref: ObjectRef) -> Option<usize> {
        let entry = self.xref.get(length_ref.id)?;
        let obj = match entry.entry_type {
            XRefEntryType::Uncompressed => self.load_uncompressed(length_ref.id, entry).ok()?.1,
            XRefEntryType::Compressed => self.load_compressed(length_ref.id, entry).ok()?,
            XRefEntryType::Free => return None,
        };
        obj.as_integer().and_then(|len| usize::try_from(len).ok())
    }
}

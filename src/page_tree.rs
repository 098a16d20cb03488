//! Page tree traversal.
//!
//! PDF Spec: ISO 32000-1:2008, Section 7.7.3 - Page Tree
//!
//! The walker flattens the tree rooted at the catalog's `/Pages` entry into
//! the document's page order. Each leaf is recorded with a snapshot of the
//! inheritable attributes in effect for it, so the tree can later be rebuilt
//! without losing anything the old intermediate nodes contributed.

use crate::document::Document;
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use std::collections::{HashMap, HashSet};

/// Attributes a page inherits from its ancestors (Table 30).
pub const INHERITABLE_ATTRIBUTES: [&str; 4] = ["Resources", "MediaBox", "CropBox", "Rotate"];

/// Inheritable attributes in effect for one page.
///
/// The nearest ancestor definition wins and the page's own value overrides
/// all of them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InheritedAttributes {
    values: Dictionary,
}

impl InheritedAttributes {
    /// Value of `name`, if any node on the path defines it.
    pub fn get(&self, name: &str) -> Option<&Object> {
        self.values.get(name)
    }

    /// Defined attributes in [`INHERITABLE_ATTRIBUTES`] order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Object)> + '_ {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Whether no attribute is defined.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Snapshot for a child of a node carrying `node`'s attributes.
    fn overridden_by(&self, node: &Dictionary) -> Self {
        let mut values = Dictionary::new();
        for name in INHERITABLE_ATTRIBUTES {
            if let Some(value) = node.get(name).or_else(|| self.values.get(name)) {
                values.insert(name.to_string(), value.clone());
            }
        }
        Self { values }
    }
}

/// Child → parent map of a page tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParentIndex {
    parents: HashMap<ObjectRef, ObjectRef>,
}

impl ParentIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `parent` for `child`. The first parent recorded is kept.
    pub fn insert(&mut self, child: ObjectRef, parent: ObjectRef) -> bool {
        match self.parents.entry(child) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(parent);
                true
            },
        }
    }

    /// Parent of `child`.
    pub fn get(&self, child: ObjectRef) -> Option<ObjectRef> {
        self.parents.get(&child).copied()
    }

    /// Number of children with a recorded parent.
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

/// One leaf of the page tree.
#[derive(Debug, Clone, PartialEq)]
pub struct PageEntry {
    /// The Page object
    pub id: ObjectRef,
    /// The Pages node whose /Kids lists it
    pub parent: ObjectRef,
    /// Inheritable attributes in effect for the page
    pub inherited: InheritedAttributes,
}

/// Flattened page tree of a document.
///
/// # Example
///
/// ```no_run
/// use pdf_reorder::document::Document;
/// use pdf_reorder::page_tree::PageTree;
///
/// # fn main() -> pdf_reorder::Result<()> {
/// let data = std::fs::read("input.pdf")?;
/// let doc = Document::load(&data)?;
/// let tree = PageTree::walk(&doc)?;
/// for (index, page) in tree.pages().iter().enumerate() {
///     println!("page {} is object {}", index + 1, page.id);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PageTree {
    root: ObjectRef,
    pages: Vec<PageEntry>,
    parents: ParentIndex,
    positions: HashMap<ObjectRef, Vec<usize>>,
    intermediate_nodes: Vec<ObjectRef>,
}

impl PageTree {
    /// Walk the page tree of `doc` depth-first.
    ///
    /// # Errors
    ///
    /// [`Error::CorruptPageTree`] when the catalog or root is missing, a node
    /// is malformed, the tree is cyclic or deeper than the configured limit,
    /// an intermediate node is reachable twice, or a `/Count` disagrees with
    /// the number of leaves below it.
    pub fn walk(doc: &Document) -> Result<Self> {
        let catalog = doc
            .catalog()
            .ok_or_else(|| Error::CorruptPageTree("document has no catalog dictionary".to_string()))?;
        let root = catalog
            .get("Pages")
            .and_then(Object::as_reference)
            .ok_or_else(|| Error::CorruptPageTree("catalog /Pages is not a reference".to_string()))?;

        let root_dict = node_dict(doc, root)?;
        if node_kind(root, root_dict) != NodeKind::Pages {
            return Err(Error::CorruptPageTree(format!("page tree root {} is not a Pages node", root)));
        }

        let mut walker = Walker {
            doc,
            max_depth: doc.options().max_recursion_depth,
            ancestors: Vec::new(),
            visited: HashSet::new(),
            tree: PageTree {
                root,
                pages: Vec::new(),
                parents: ParentIndex::new(),
                positions: HashMap::new(),
                intermediate_nodes: Vec::new(),
            },
        };
        walker.visit(root, None, &InheritedAttributes::default(), 0)?;

        log::debug!(
            "Page tree rooted at {}: {} pages, {} intermediate nodes",
            root,
            walker.tree.pages.len(),
            walker.tree.intermediate_nodes.len()
        );
        Ok(walker.tree)
    }

    /// The root `Pages` node.
    pub fn root(&self) -> ObjectRef {
        self.root
    }

    /// Number of pages.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Whether the tree holds no pages.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Pages in document order.
    pub fn pages(&self) -> &[PageEntry] {
        &self.pages
    }

    /// Page at 0-based position `index`.
    pub fn get(&self, index: usize) -> Option<&PageEntry> {
        self.pages.get(index)
    }

    /// Page object identifiers in document order.
    pub fn page_ids(&self) -> impl Iterator<Item = ObjectRef> + '_ {
        self.pages.iter().map(|page| page.id)
    }

    /// 0-based positions at which `id` appears (more than one for aliased leaves).
    pub fn positions_of(&self, id: ObjectRef) -> &[usize] {
        self.positions.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Child → parent index of the traversed tree.
    pub fn parent_index(&self) -> &ParentIndex {
        &self.parents
    }

    /// Every `Pages` node in traversal order, root first.
    pub fn intermediate_nodes(&self) -> &[ObjectRef] {
        &self.intermediate_nodes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Page,
    Pages,
}

fn node_kind(id: ObjectRef, dict: &Dictionary) -> NodeKind {
    match dict.get("Type").and_then(Object::as_name) {
        Some("Pages") => NodeKind::Pages,
        Some("Page") => NodeKind::Page,
        other => {
            let kind = if dict.contains_key("Kids") {
                NodeKind::Pages
            } else {
                NodeKind::Page
            };
            log::warn!(
                "Page tree node {} has /Type {:?}, treating it as {:?}",
                id,
                other.unwrap_or("(none)"),
                kind
            );
            kind
        },
    }
}

fn node_dict(doc: &Document, id: ObjectRef) -> Result<&Dictionary> {
    match doc.get(id) {
        Some(Object::Dictionary(dict)) => Ok(dict),
        Some(other) => Err(Error::CorruptPageTree(format!(
            "page tree node {} is a {}, not a dictionary",
            id,
            other.type_name()
        ))),
        None => Err(Error::CorruptPageTree(format!("page tree node {} does not exist", id))),
    }
}

struct Walker<'a> {
    doc: &'a Document,
    max_depth: u32,
    ancestors: Vec<ObjectRef>,
    visited: HashSet<ObjectRef>,
    tree: PageTree,
}

impl Walker<'_> {
    /// Visit `id` and return the number of leaves below it.
    fn visit(
        &mut self,
        id: ObjectRef,
        parent: Option<ObjectRef>,
        inherited: &InheritedAttributes,
        depth: u32,
    ) -> Result<usize> {
        if depth > self.max_depth {
            return Err(Error::CorruptPageTree(format!(
                "page tree deeper than {} levels at {}",
                self.max_depth, id
            )));
        }
        if self.ancestors.contains(&id) {
            return Err(Error::CorruptPageTree(format!("cycle: {} is its own ancestor", id)));
        }

        let doc = self.doc;
        let dict = node_dict(doc, id)?;

        if let Some(parent) = parent {
            match dict.get("Parent").and_then(Object::as_reference) {
                Some(declared) if declared == parent => {},
                declared => log::warn!(
                    "Node {} declares /Parent {:?} but is a kid of {}",
                    id,
                    declared,
                    parent
                ),
            }
            if !self.tree.parents.insert(id, parent) {
                log::debug!("Node {} has more than one parent", id);
            }
        }

        let snapshot = inherited.overridden_by(dict);

        match node_kind(id, dict) {
            NodeKind::Page => {
                let position = self.tree.pages.len();
                self.tree.positions.entry(id).or_default().push(position);
                self.tree.pages.push(PageEntry {
                    id,
                    parent: parent.unwrap_or(id),
                    inherited: snapshot,
                });
                Ok(1)
            },
            NodeKind::Pages => {
                if !self.visited.insert(id) {
                    return Err(Error::CorruptPageTree(format!(
                        "Pages node {} is reachable through more than one parent",
                        id
                    )));
                }
                self.tree.intermediate_nodes.push(id);

                let kids = match dict.get("Kids").map(|kids| doc.resolve(kids)) {
                    Some(Object::Array(kids)) => kids,
                    _ => {
                        return Err(Error::CorruptPageTree(format!(
                            "Pages node {} has no /Kids array",
                            id
                        )))
                    },
                };
                let declared = doc
                    .resolve(dict.get("Count").unwrap_or(&Object::Null))
                    .as_integer()
                    .ok_or_else(|| {
                        Error::CorruptPageTree(format!("Pages node {} has no /Count", id))
                    })?;

                self.ancestors.push(id);
                let mut count = 0;
                for kid in kids {
                    let kid_id = kid.as_reference().ok_or_else(|| {
                        Error::CorruptPageTree(format!(
                            "kid of {} is a {}, not a reference",
                            id,
                            kid.type_name()
                        ))
                    })?;
                    count += self.visit(kid_id, Some(id), &snapshot, depth + 1)?;
                }
                self.ancestors.pop();

                if usize::try_from(declared).ok() != Some(count) {
                    return Err(Error::CorruptPageTree(format!(
                        "Pages node {} declares /Count {} but has {} leaves",
                        id, declared, count
                    )));
                }
                Ok(count)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict(entries: Vec<(&str, Object)>) -> Object {
        Object::Dictionary(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }

    fn r(id: u32) -> Object {
        Object::Reference(ObjectRef::new(id, 0))
    }

    fn refs(ids: &[u32]) -> Object {
        Object::Array(ids.iter().map(|&id| r(id)).collect())
    }

    fn page(parent: u32) -> Object {
        dict(vec![("Type", Object::name("Page")), ("Parent", r(parent))])
    }

    fn pages(kids: &[u32], count: i64) -> Object {
        dict(vec![
            ("Type", Object::name("Pages")),
            ("Kids", refs(kids)),
            ("Count", Object::Integer(count)),
        ])
    }

    /// Catalog 1, root 2.
    fn document(objects: Vec<(u32, Object)>) -> Document {
        let mut doc = Document::new((1, 7));
        doc.insert(
            ObjectRef::new(1, 0),
            dict(vec![("Type", Object::name("Catalog")), ("Pages", r(2))]),
        );
        for (id, obj) in objects {
            doc.insert(ObjectRef::new(id, 0), obj);
        }
        doc.trailer_mut().insert("Root".to_string(), r(1));
        doc
    }

    fn ids(tree: &PageTree) -> Vec<u32> {
        tree.page_ids().map(|id| id.id).collect()
    }

    // ========================================================================
    // Traversal order
    // ========================================================================

    #[test]
    fn test_flat_tree() {
        let doc = document(vec![(2, pages(&[3, 4, 5], 3)), (3, page(2)), (4, page(2)), (5, page(2))]);
        let tree = PageTree::walk(&doc).unwrap();
        assert_eq!(ids(&tree), vec![3, 4, 5]);
        assert_eq!(tree.root(), ObjectRef::new(2, 0));
        assert_eq!(tree.get(1).unwrap().parent, ObjectRef::new(2, 0));
        assert_eq!(tree.intermediate_nodes(), &[ObjectRef::new(2, 0)]);
    }

    #[test]
    fn test_nested_tree_depth_first() {
        let doc = document(vec![
            (2, pages(&[10, 5, 11], 4)),
            (10, pages(&[3, 4], 2)),
            (11, pages(&[6], 1)),
            (3, page(10)),
            (4, page(10)),
            (5, page(2)),
            (6, page(11)),
        ]);
        let tree = PageTree::walk(&doc).unwrap();
        assert_eq!(ids(&tree), vec![3, 4, 5, 6]);
        assert_eq!(tree.parent_index().get(ObjectRef::new(6, 0)), Some(ObjectRef::new(11, 0)));
        assert_eq!(tree.parent_index().get(ObjectRef::new(10, 0)), Some(ObjectRef::new(2, 0)));
        assert_eq!(tree.positions_of(ObjectRef::new(5, 0)), &[2]);
        assert_eq!(tree.positions_of(ObjectRef::new(99, 0)), &[] as &[usize]);
    }

    #[test]
    fn test_aliased_leaf_appears_twice() {
        let doc = document(vec![(2, pages(&[3, 4, 3], 3)), (3, page(2)), (4, page(2))]);
        let tree = PageTree::walk(&doc).unwrap();
        assert_eq!(ids(&tree), vec![3, 4, 3]);
        assert_eq!(tree.positions_of(ObjectRef::new(3, 0)), &[0, 2]);
    }

    #[test]
    fn test_missing_type_uses_kids() {
        let doc = document(vec![
            (2, dict(vec![("Kids", refs(&[3])), ("Count", Object::Integer(1))])),
            (3, dict(vec![("Parent", r(2))])),
        ]);
        let tree = PageTree::walk(&doc).unwrap();
        assert_eq!(ids(&tree), vec![3]);
    }

    // ========================================================================
    // Inheritance
    // ========================================================================

    #[test]
    fn test_inherited_attributes_nearest_wins() {
        let mut root = pages(&[10], 2);
        let mut mid = pages(&[3, 4], 2);
        if let (Object::Dictionary(root), Object::Dictionary(mid)) = (&mut root, &mut mid) {
            root.insert("MediaBox".to_string(), Object::Array(vec![Object::Integer(0); 4]));
            root.insert("Rotate".to_string(), Object::Integer(90));
            mid.insert("Rotate".to_string(), Object::Integer(180));
            mid.insert("Resources".to_string(), r(20));
        }
        let mut own = page(10);
        if let Object::Dictionary(own) = &mut own {
            own.insert("Rotate".to_string(), Object::Integer(270));
        }
        let doc = document(vec![(2, root), (10, mid), (3, page(10)), (4, own), (20, dict(vec![]))]);

        let tree = PageTree::walk(&doc).unwrap();
        let first = &tree.pages()[0].inherited;
        assert_eq!(first.get("Rotate"), Some(&Object::Integer(180)));
        assert_eq!(first.get("Resources"), Some(&r(20)));
        assert!(first.get("MediaBox").is_some());
        assert!(first.get("CropBox").is_none());

        let second = &tree.pages()[1].inherited;
        assert_eq!(second.get("Rotate"), Some(&Object::Integer(270)));
    }

    // ========================================================================
    // Corruption
    // ========================================================================

    #[test]
    fn test_cycle_detected() {
        let doc = document(vec![(2, pages(&[10], 1)), (10, pages(&[2], 1))]);
        assert!(matches!(PageTree::walk(&doc), Err(Error::CorruptPageTree(_))));
    }

    #[test]
    fn test_self_referencing_node() {
        let doc = document(vec![(2, pages(&[2], 1))]);
        assert!(matches!(PageTree::walk(&doc), Err(Error::CorruptPageTree(_))));
    }

    #[test]
    fn test_shared_intermediate_node() {
        let doc = document(vec![(2, pages(&[10, 10], 2)), (10, pages(&[3], 1)), (3, page(10))]);
        assert!(matches!(PageTree::walk(&doc), Err(Error::CorruptPageTree(_))));
    }

    #[test]
    fn test_count_mismatch() {
        let doc = document(vec![(2, pages(&[3, 4], 3)), (3, page(2)), (4, page(2))]);
        let err = PageTree::walk(&doc).unwrap_err();
        assert!(err.to_string().contains("/Count 3"));
    }

    #[test]
    fn test_structural_errors() {
        // Kid is not a reference
        let mut root = pages(&[], 0);
        if let Object::Dictionary(d) = &mut root {
            d.insert("Kids".to_string(), Object::Array(vec![Object::Integer(3)]));
        }
        assert!(PageTree::walk(&document(vec![(2, root)])).is_err());

        // Kid does not exist
        assert!(PageTree::walk(&document(vec![(2, pages(&[9], 1))])).is_err());

        // Root is a Page
        assert!(PageTree::walk(&document(vec![(2, page(1))])).is_err());

        // Missing /Count
        let doc = document(vec![
            (2, dict(vec![("Type", Object::name("Pages")), ("Kids", refs(&[3]))])),
            (3, page(2)),
        ]);
        assert!(PageTree::walk(&doc).is_err());

        // No catalog
        assert!(PageTree::walk(&Document::new((1, 4))).is_err());
    }

    #[test]
    fn test_depth_limit() {
        // Chain of 150 Pages nodes ending in one leaf
        let mut objects = Vec::new();
        for id in 2..152u32 {
            objects.push((id, pages(&[id + 1], 1)));
        }
        objects.push((152, page(151)));
        let doc = document(objects);
        let err = PageTree::walk(&doc).unwrap_err();
        assert!(err.to_string().contains("deeper than"));
    }

    #[test]
    fn test_empty_tree() {
        let doc = document(vec![(2, pages(&[], 0))]);
        let tree = PageTree::walk(&doc).unwrap();
        assert!(tree.is_empty());
        assert_eq!(doc.page_count().unwrap(), 0);
    }
}

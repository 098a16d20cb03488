//! Page tree rewriting.
//!
//! Applies a [`Permutation`] to a document in place. The root `Pages` node
//! keeps every attribute except `/Kids` and `/Count` and is given a fresh set
//! of kids in the requested order, either directly or through new balanced
//! intermediate nodes. Everything outside the page tree is left alone.

use crate::config::PageTreeLayout;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::page_tree::{PageEntry, PageTree, ParentIndex};
use crate::planner::Permutation;
use std::collections::HashSet;

/// What a rewrite did to the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteSummary {
    /// Number of pages in the rewritten tree
    pub page_count: usize,
    /// Duplicated pages as (source page, clone)
    pub clones: Vec<(ObjectRef, ObjectRef)>,
    /// Source pages that are no longer in the tree
    pub dropped: Vec<ObjectRef>,
    /// Intermediate `Pages` nodes created for a balanced layout
    pub intermediate_nodes: Vec<ObjectRef>,
}

/// Rewrite the page tree of `doc` so its leaves follow `permutation`.
///
/// `tree` must be the result of walking `doc` before any modification.
///
/// # Errors
///
/// - [`Error::PageOutOfBounds`] if the permutation names a page the tree does not have
/// - [`Error::CorruptPageTree`] if a page or the root is not a dictionary
pub fn rewrite(
    doc: &mut Document,
    tree: &PageTree,
    permutation: &Permutation,
    layout: PageTreeLayout,
) -> Result<RewriteSummary> {
    let mut summary = RewriteSummary::default();
    let mut placed: HashSet<ObjectRef> = HashSet::new();
    let mut leaves = Vec::with_capacity(permutation.len());

    for &index in permutation {
        let entry = tree.get(index).ok_or(Error::PageOutOfBounds {
            page: index as u64 + 1,
            page_count: tree.len(),
        })?;

        let page = materialize(doc, entry)?;
        if placed.insert(entry.id) {
            doc.insert(entry.id, Object::Dictionary(page));
            leaves.push(entry.id);
        } else {
            let clone = doc.add_object(Object::Dictionary(page));
            log::debug!("Page {} duplicated as {}", entry.id, clone);
            summary.clones.push((entry.id, clone));
            leaves.push(clone);
        }
    }

    let mut dropped: HashSet<ObjectRef> = HashSet::new();
    for id in tree.page_ids() {
        if placed.contains(&id) || !dropped.insert(id) {
            continue;
        }
        if let Some(page) = doc.get_mut(id).and_then(Object::as_dict_mut) {
            page.shift_remove("Parent");
        }
        summary.dropped.push(id);
    }

    let root = tree.root();
    let mut parents = ParentIndex::new();
    let kids = match layout {
        PageTreeLayout::Balanced { max_kids } if leaves.len() > max_kids.max(2) => {
            let (kids, created) = build_balanced(doc, root, &leaves, max_kids.max(2), &mut parents);
            summary.intermediate_nodes = created;
            kids
        },
        _ => {
            for &leaf in &leaves {
                parents.insert(leaf, root);
            }
            leaves.iter().map(|&leaf| (leaf, 1)).collect()
        },
    };

    for &leaf in &leaves {
        set_parent(doc, leaf, &parents);
    }
    for &node in &summary.intermediate_nodes {
        set_parent(doc, node, &parents);
    }

    let root_dict = doc
        .get_mut(root)
        .and_then(Object::as_dict_mut)
        .ok_or_else(|| Error::CorruptPageTree(format!("page tree root {} is not a dictionary", root)))?;
    root_dict.insert(
        "Kids".to_string(),
        Object::Array(kids.iter().map(|&(kid, _)| Object::Reference(kid)).collect()),
    );
    root_dict.insert("Count".to_string(), Object::Integer(leaves.len() as i64));

    summary.page_count = leaves.len();
    log::debug!(
        "Rewrote page tree: {} pages, {} clones, {} dropped, {} new nodes",
        summary.page_count,
        summary.clones.len(),
        summary.dropped.len(),
        summary.intermediate_nodes.len()
    );
    Ok(summary)
}

/// Copy of the page dictionary with inherited attributes filled in.
fn materialize(doc: &Document, entry: &PageEntry) -> Result<Dictionary> {
    let mut page = doc
        .get(entry.id)
        .and_then(Object::as_dict)
        .cloned()
        .ok_or_else(|| Error::CorruptPageTree(format!("page {} is not a dictionary", entry.id)))?;

    for (name, value) in entry.inherited.iter() {
        if !page.contains_key(name) {
            page.insert(name.to_string(), value.clone());
        }
    }
    Ok(page)
}

/// Group `leaves` into new `Pages` nodes of at most `max_kids` kids, level by
/// level, until the top level fits under the root.
///
/// Returns the root's kids with their leaf counts, and the nodes created.
fn build_balanced(
    doc: &mut Document,
    root: ObjectRef,
    leaves: &[ObjectRef],
    max_kids: usize,
    parents: &mut ParentIndex,
) -> (Vec<(ObjectRef, usize)>, Vec<ObjectRef>) {
    let mut level: Vec<(ObjectRef, usize)> = leaves.iter().map(|&leaf| (leaf, 1)).collect();
    let mut created = Vec::new();

    while level.len() > max_kids {
        let mut next = Vec::with_capacity(level.len().div_ceil(max_kids));
        for group in level.chunks(max_kids) {
            let count: usize = group.iter().map(|&(_, count)| count).sum();
            let mut node = Dictionary::new();
            node.insert("Type".to_string(), Object::name("Pages"));
            node.insert(
                "Kids".to_string(),
                Object::Array(group.iter().map(|&(kid, _)| Object::Reference(kid)).collect()),
            );
            node.insert("Count".to_string(), Object::Integer(count as i64));

            let id = doc.add_object(Object::Dictionary(node));
            for &(kid, _) in group {
                parents.insert(kid, id);
            }
            created.push(id);
            next.push((id, count));
        }
        level = next;
    }

    for &(kid, _) in &level {
        parents.insert(kid, root);
    }
    (level, created)
}

fn set_parent(doc: &mut Document, id: ObjectRef, parents: &ParentIndex) {
    if let (Some(parent), Some(node)) = (parents.get(id), doc.get_mut(id).and_then(Object::as_dict_mut)) {
        node.insert("Parent".to_string(), Object::Reference(parent));
    }
}

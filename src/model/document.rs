//! Inspected documents and the page subsets cut from them.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use lopdf::{Document as LopdfDocument, Object, ObjectId};

use super::PageRange;
use crate::error::{Error, Result};

/// An inspected, read-only PDF document.
///
/// Only [`crate::inspect`] creates documents, so the page count is always
/// at least one.
#[derive(Clone)]
pub struct Document {
    source: Option<PathBuf>,
    version: String,
    page_count: u32,
    inner: LopdfDocument,
}

impl Document {
    pub(crate) fn from_parts(
        source: Option<PathBuf>,
        version: String,
        page_count: u32,
        inner: LopdfDocument,
    ) -> Self {
        Self {
            source,
            version,
            page_count,
            inner,
        }
    }

    /// Path the document was read from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// PDF version (e.g., "1.7").
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Total number of pages.
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Derive a standalone document holding exactly the pages of `range`.
    ///
    /// Works on a copy of the parsed document; the original is never
    /// modified and never re-read from disk. The kept pages are hung directly
    /// off the root page tree node in one pass, taking along any attributes
    /// they inherited from intermediate nodes. Everything no longer reachable
    /// is then pruned.
    pub fn slice(&self, range: PageRange) -> Result<SubDocument> {
        if range.end() > self.page_count {
            return Err(Error::InvalidPlan(format!(
                "{} exceeds document length of {} pages",
                range, self.page_count
            )));
        }

        let mut doc = self.inner.clone();
        let tree_id = doc.catalog()?.get(b"Pages")?.as_reference()?;
        let pages = doc.get_pages();

        let mut kept = Vec::with_capacity(range.len() as usize);
        let mut removed: HashSet<ObjectId> = HashSet::new();
        for (&number, &page_id) in &pages {
            if range.contains(number) {
                kept.push(page_id);
            } else {
                removed.insert(page_id);
            }
        }
        // Intermediate tree nodes go as well.
        for &page_id in pages.values() {
            let mut node = parent_of(&doc, page_id);
            while let Some(node_id) = node {
                if node_id == tree_id || !removed.insert(node_id) {
                    break;
                }
                node = parent_of(&doc, node_id);
            }
        }

        for &page_id in &kept {
            let inherited = inherited_attributes(&doc, page_id);
            let page = doc.get_dictionary_mut(page_id)?;
            for (key, value) in inherited {
                page.set(key, value);
            }
            page.set("Parent", tree_id);
        }

        let tree = doc.get_dictionary_mut(tree_id)?;
        tree.set(
            "Kids",
            kept.iter().map(|&id| Object::Reference(id)).collect::<Vec<_>>(),
        );
        tree.set("Count", kept.len() as i64);
        doc.catalog_mut()?.remove(b"Outlines");

        for id in &removed {
            doc.objects.remove(id);
        }
        // Renumbering would otherwise let a stale reference point at a kept object.
        doc.traverse_objects(|object| {
            if let Object::Reference(id) = *object {
                if removed.contains(&id) {
                    *object = Object::Null;
                }
            }
        });
        doc.prune_objects();
        doc.renumber_objects();
        doc.compress();

        let mut data = Vec::new();
        doc.save_to(&mut data)?;

        log::debug!("sliced {} into {} bytes", range, data.len());

        Ok(SubDocument { range, data })
    }
}

/// Attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Deepest page tree walked when collecting inherited attributes.
const MAX_TREE_DEPTH: usize = 64;

fn parent_of(doc: &LopdfDocument, id: ObjectId) -> Option<ObjectId> {
    doc.get_dictionary(id)
        .ok()?
        .get(b"Parent")
        .ok()?
        .as_reference()
        .ok()
}

/// Inheritable attributes `page_id` does not set itself, taken from the
/// nearest ancestor that does.
fn inherited_attributes(doc: &LopdfDocument, page_id: ObjectId) -> Vec<(Vec<u8>, Object)> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };
    let mut missing: Vec<&[u8]> = INHERITABLE
        .iter()
        .copied()
        .filter(|key| !page.has(key))
        .collect();

    let mut found = Vec::new();
    let mut node = parent_of(doc, page_id);
    let mut depth = 0;
    while let Some(node_id) = node {
        if missing.is_empty() || depth == MAX_TREE_DEPTH {
            break;
        }
        let Ok(dict) = doc.get_dictionary(node_id) else {
            break;
        };
        missing.retain(|key| match dict.get(key) {
            Ok(value) => {
                found.push((key.to_vec(), value.clone()));
                false
            }
            Err(_) => true,
        });
        node = parent_of(doc, node_id);
        depth += 1;
    }
    found
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("source", &self.source)
            .field("version", &self.version)
            .field("page_count", &self.page_count)
            .finish_non_exhaustive()
    }
}

/// A serialized page subset of a [`Document`], ready to submit to a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubDocument {
    range: PageRange,
    data: Vec<u8>,
}

impl SubDocument {
    /// Build a sub-document from already-serialized PDF bytes.
    pub fn from_bytes(range: PageRange, data: Vec<u8>) -> Self {
        Self { range, data }
    }

    /// Pages of the parent document this subset covers.
    pub fn range(&self) -> PageRange {
        self.range
    }

    /// Serialized PDF bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Size of the serialized PDF in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Write the PDF bytes to `path`.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, &self.data)?;
        Ok(())
    }
}

//! Page tree walking.
//!
//! Produces the ordered page index the document model serves lookups
//! from: a depth-first left-to-right traversal of `/Pages.Kids`, with
//! `/MediaBox` inherited from the nearest ancestor that defines one.

use crate::document::Document;
use crate::error::{Error, Result};
use crate::object::{Object, ObjectRef};

/// US Letter, used when no node on the path defines a MediaBox.
const FALLBACK_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

const MAX_TREE_DEPTH: u32 = 64;

/// One entry of the page index.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord {
    /// Object number of the page
    pub id: u32,
    /// Effective MediaBox `[x0 y0 x1 y1]`
    pub media_box: [f64; 4],
}

/// Walk the page tree from the catalog and build the page index.
pub fn build_page_index(doc: &Document) -> Result<Vec<PageRecord>> {
    let root_ref = doc
        .trailer()
        .get("Root")
        .and_then(|o| o.as_reference())
        .ok_or(Error::MissingRoot)?;
    let catalog = doc.get_object(root_ref.id).ok_or(Error::MissingRoot)?;

    let pages_ref = catalog
        .dict()
        .and_then(|d| d.get("Pages"))
        .and_then(|o| o.as_reference())
        .ok_or_else(|| Error::InvalidTree("catalog has no /Pages reference".to_string()))?;

    let mut index = Vec::new();
    walk_node(doc, pages_ref, None, 0, &mut index)?;
    Ok(index)
}

fn walk_node(
    doc: &Document,
    node_ref: ObjectRef,
    inherited_box: Option<[f64; 4]>,
    depth: u32,
    out: &mut Vec<PageRecord>,
) -> Result<()> {
    if depth > MAX_TREE_DEPTH {
        return Err(Error::InvalidTree("page tree deeper than 64 levels".to_string()));
    }

    let node = doc
        .get_object(node_ref.id)
        .ok_or_else(|| Error::InvalidTree(format!("missing page tree node {}", node_ref.id)))?;
    let dict = node
        .dict()
        .ok_or_else(|| Error::InvalidTree(format!("node {} is not a dictionary", node_ref.id)))?;

    let media_box = resolve_rect(doc, dict.get("MediaBox")).or(inherited_box);

    match dict.get("Type").and_then(|o| o.as_name()) {
        Some("Pages") => {
            let kids_value = dict
                .get("Kids")
                .ok_or_else(|| Error::InvalidTree(format!("node {} has no /Kids", node_ref.id)))?;

            // /Kids may itself be indirect; the materialized value must be
            // a list of references and nothing else.
            let kids_owned;
            let kids = match kids_value {
                Object::Array(items) => items,
                Object::Reference(r) => {
                    let obj = doc.get_object(r.id).ok_or_else(|| {
                        Error::InvalidTree(format!("missing /Kids object {}", r.id))
                    })?;
                    match obj.value {
                        Object::Array(items) => {
                            kids_owned = items;
                            &kids_owned
                        },
                        _ => {
                            return Err(Error::InvalidTree(format!(
                                "/Kids of node {} is not a list",
                                node_ref.id
                            )));
                        },
                    }
                },
                _ => {
                    return Err(Error::InvalidTree(format!(
                        "/Kids of node {} is not a list",
                        node_ref.id
                    )));
                },
            };

            for kid in kids {
                let kid_ref = kid.as_reference().ok_or_else(|| {
                    Error::InvalidTree(format!(
                        "/Kids of node {} holds a non-reference entry",
                        node_ref.id
                    ))
                })?;
                walk_node(doc, kid_ref, media_box, depth + 1, out)?;
            }
            Ok(())
        },
        Some("Page") => {
            let media_box = media_box.unwrap_or_else(|| {
                log::debug!("page {} has no MediaBox on its path, using Letter", node_ref.id);
                FALLBACK_MEDIA_BOX
            });
            out.push(PageRecord {
                id: node_ref.id,
                media_box,
            });
            Ok(())
        },
        other => Err(Error::InvalidTree(format!(
            "node {} has unexpected /Type {:?}",
            node_ref.id, other
        ))),
    }
}

/// Read a rectangle value, chasing one level of indirection.
fn resolve_rect(doc: &Document, value: Option<&Object>) -> Option<[f64; 4]> {
    match value? {
        Object::Reference(r) => doc.get_object(r.id)?.value.as_rectangle(),
        direct => direct.as_rectangle(),
    }
}

//! Form flattening: removal of all interactivity.
//!
//! Drops the document-level form dictionary and every widget annotation
//! while preserving other annotation kinds (links, comments). Runs after
//! filling when the two are combined, so frozen values stay visible as
//! static page content.

use crate::objects::{is_widget, resolve};
use lopdf::{Document, Object};

/// Remove the form dictionary and all widget annotations from `doc`.
pub fn flatten_document(doc: &mut Document) {
    remove_form_dictionary(doc);

    let page_ids: Vec<_> = doc.get_pages().values().copied().collect();
    for page_id in page_ids {
        let retained = retained_annotations(doc, page_id);
        let Ok(obj) = doc.get_object_mut(page_id) else {
            continue;
        };
        let Ok(page_dict) = obj.as_dict_mut() else {
            continue;
        };
        if !page_dict.has(b"Annots") {
            continue;
        }
        match retained {
            Some(kept) if !kept.is_empty() => {
                page_dict.set("Annots", Object::Array(kept));
            }
            _ => {
                // An empty list would still be interactive clutter.
                page_dict.remove(b"Annots");
            }
        }
    }
}

fn remove_form_dictionary(doc: &mut Document) {
    let Some(root_id) = doc
        .trailer
        .get(b"Root")
        .ok()
        .and_then(|obj| obj.as_reference().ok())
    else {
        return;
    };
    if let Ok(obj) = doc.get_object_mut(root_id) {
        if let Ok(catalog) = obj.as_dict_mut() {
            catalog.remove(b"AcroForm");
        }
    }
}

/// Annotation entries on a page that are not widgets, in original order.
fn retained_annotations(doc: &Document, page_id: lopdf::ObjectId) -> Option<Vec<Object>> {
    let page_dict = doc.get_dictionary(page_id).ok()?;
    let annots = page_dict.get(b"Annots").ok()?;
    let entries = resolve(doc, annots).as_array().ok()?;

    let kept = entries
        .iter()
        .filter(|entry| match resolve(doc, entry).as_dict() {
            Ok(dict) => !is_widget(dict),
            // Unresolvable entries are preserved untouched.
            Err(_) => true,
        })
        .cloned()
        .collect();
    Some(kept)
}

//! Shared fixtures: in-memory form documents built with `lopdf` and saved
//! to temp files so tests exercise the same load/save path as callers.

#![allow(dead_code)]

use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::path::PathBuf;
use tempfile::TempDir;

pub fn literal(s: &str) -> Object {
    Object::String(s.as_bytes().to_vec(), StringFormat::Literal)
}

/// A single-page document under construction, with handles to the nodes
/// fields and annotations get attached to.
pub struct Fixture {
    pub doc: Document,
    pub page_id: ObjectId,
    pub acroform_id: Option<ObjectId>,
}

/// One empty page, no form dictionary.
pub fn plain_doc() -> Fixture {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut doc = Document::with_version("1.7");
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    let pages_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => vec![Object::Reference(page_id)],
        "Count" => 1,
    });
    set_dict_entry(&mut doc, page_id, "Parent", Object::Reference(pages_id));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));
    Fixture {
        doc,
        page_id,
        acroform_id: None,
    }
}

/// One empty page plus an AcroForm dictionary with an empty field list.
pub fn form_doc() -> Fixture {
    let mut fx = plain_doc();
    let acroform_id = fx.doc.add_object(dictionary! {
        "Fields" => Vec::<Object>::new(),
    });
    let root_id = fx
        .doc
        .trailer
        .get(b"Root")
        .and_then(|obj| obj.as_reference())
        .unwrap();
    set_dict_entry(
        &mut fx.doc,
        root_id,
        "AcroForm",
        Object::Reference(acroform_id),
    );
    fx.acroform_id = Some(acroform_id);
    fx
}

/// Add a combined field/widget text field.
pub fn add_text_field(
    fx: &mut Fixture,
    name: &str,
    flags: i64,
    max_len: Option<i64>,
) -> ObjectId {
    let mut dict = dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Tx",
        "T" => literal(name),
        "Ff" => flags,
        "Rect" => vec![100.into(), 700.into(), 300.into(), 720.into()],
        "DA" => literal("/Helv 10 Tf 0 g"),
    };
    if let Some(len) = max_len {
        dict.set("MaxLen", len);
    }
    let id = fx.doc.add_object(dict);
    attach(fx, id);
    id
}

/// Add a combined field/widget checkbox with one custom on-state.
pub fn add_checkbox(fx: &mut Fixture, name: &str, on_state: &str) -> ObjectId {
    let on_ap = empty_form_xobject(&mut fx.doc);
    let off_ap = empty_form_xobject(&mut fx.doc);
    let mut normal = lopdf::Dictionary::new();
    normal.set(on_state, Object::Reference(on_ap));
    normal.set("Off", Object::Reference(off_ap));

    let id = fx.doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Btn",
        "T" => literal(name),
        "V" => "Off",
        "AS" => "Off",
        "Rect" => vec![100.into(), 650.into(), 115.into(), 665.into()],
        "AP" => dictionary! { "N" => Object::Dictionary(normal) },
    });
    attach(fx, id);
    id
}

/// Add a combined field/widget combo box with display-string options.
pub fn add_dropdown(fx: &mut Fixture, name: &str, options: &[&str]) -> ObjectId {
    let opt: Vec<Object> = options.iter().map(|o| literal(o)).collect();
    let id = fx.doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Ch",
        "T" => literal(name),
        // Combo flag, bit 18
        "Ff" => 1i64 << 17,
        "Opt" => opt,
        "Rect" => vec![100.into(), 600.into(), 250.into(), 620.into()],
    });
    attach(fx, id);
    id
}

/// Add a text widget stored inline in the page's `/Annots` array, outside
/// the `/Fields` tree entirely.
pub fn add_inline_text_field(fx: &mut Fixture, name: &str) {
    let widget = Object::Dictionary(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Tx",
        "T" => literal(name),
        "Rect" => vec![100.into(), 500.into(), 300.into(), 520.into()],
    });
    let page_id = fx.page_id;
    if let Ok(obj) = fx.doc.get_object_mut(page_id) {
        if let Ok(dict) = obj.as_dict_mut() {
            match dict.get_mut(b"Annots") {
                Ok(Object::Array(annots)) => annots.push(widget),
                _ => dict.set("Annots", vec![widget]),
            }
        }
    }
}

/// Attach a standard-security `/Encrypt` dictionary carrying the given
/// protection word.
pub fn set_protection(fx: &mut Fixture, p: i64) {
    let encrypt_id = fx.doc.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => 2,
        "R" => 3,
        "P" => p,
    });
    fx.doc.trailer.set("Encrypt", Object::Reference(encrypt_id));
}

/// Add a link annotation (must survive flattening).
pub fn add_link(fx: &mut Fixture) -> ObjectId {
    let id = fx.doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Link",
        "Rect" => vec![0.into(), 0.into(), 100.into(), 20.into()],
    });
    push_page_annot(fx, id);
    id
}

/// Attach an `/XFA` array of `[name, stream]` packet pairs to the form root.
pub fn set_xfa(fx: &mut Fixture, packets: &[(&str, &str)]) {
    let mut entries = Vec::new();
    for (name, xml) in packets {
        let stream_id = fx.doc.add_object(Object::Stream(Stream::new(
            lopdf::Dictionary::new(),
            xml.as_bytes().to_vec(),
        )));
        entries.push(literal(name));
        entries.push(Object::Reference(stream_id));
    }
    let acroform_id = fx.acroform_id.expect("fixture has no form dictionary");
    set_dict_entry(&mut fx.doc, acroform_id, "XFA", Object::Array(entries));
}

/// Save the fixture to a temp file; the directory guard keeps it alive.
pub fn save(fx: &mut Fixture) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("input.pdf");
    fx.doc.save(&path).unwrap();
    (dir, path)
}

/// Scan every stream in a document for a byte pattern.
pub fn any_stream_contains(doc: &Document, needle: &str) -> bool {
    doc.objects.values().any(|obj| match obj {
        Object::Stream(stream) => {
            String::from_utf8_lossy(&stream.content).contains(needle)
        }
        _ => false,
    })
}

fn attach(fx: &mut Fixture, id: ObjectId) {
    let acroform_id = fx.acroform_id.expect("fixture has no form dictionary");
    if let Ok(obj) = fx.doc.get_object_mut(acroform_id) {
        if let Ok(dict) = obj.as_dict_mut() {
            if let Ok(Object::Array(fields)) = dict.get_mut(b"Fields") {
                fields.push(Object::Reference(id));
            }
        }
    }
    push_page_annot(fx, id);
}

fn push_page_annot(fx: &mut Fixture, id: ObjectId) {
    let page_id = fx.page_id;
    if let Ok(obj) = fx.doc.get_object_mut(page_id) {
        if let Ok(dict) = obj.as_dict_mut() {
            match dict.get_mut(b"Annots") {
                Ok(Object::Array(annots)) => annots.push(Object::Reference(id)),
                _ => dict.set("Annots", vec![Object::Reference(id)]),
            }
        }
    }
}

fn set_dict_entry(doc: &mut Document, id: ObjectId, key: &str, value: Object) {
    if let Ok(obj) = doc.get_object_mut(id) {
        if let Ok(dict) = obj.as_dict_mut() {
            dict.set(key, value);
        }
    }
}

fn empty_form_xobject(doc: &mut Document) -> ObjectId {
    doc.add_object(Object::Stream(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![0.into(), 0.into(), 15.into(), 15.into()],
        },
        Vec::new(),
    )))
}

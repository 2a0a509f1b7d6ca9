//! Form field extraction: the two-pass AcroForm/widget merge.
//!
//! Pass 1 walks the form root's `/Fields` tree and is authoritative for
//! values, defaults, options, flags, max length, and font info. Pass 2
//! walks every page's widget annotations to attach page indices and
//! rectangles, and to pick up widgets that never appear in the field tree.
//! Hierarchical names are resolved once here, by joining `/T` segments from
//! parent to child with `.`; nothing re-walks parent chains at lookup time.

use crate::appearance::parse_default_appearance;
use crate::model::{Field, FieldFlags, FieldType};
use crate::objects::{
    dict_get, inherited, is_widget, object_to_i64, object_to_string, parse_rect, resolve,
    MAX_PARENT_DEPTH,
};
use indexmap::IndexMap;
use lopdf::{Dictionary, Document, Object};

/// Extract the unified field map from a loaded document.
pub fn extract_fields(doc: &Document) -> IndexMap<String, Field> {
    let mut fields = IndexMap::new();

    if let Some(roots) = field_tree_roots(doc) {
        for root in roots {
            walk_field(doc, root, "", &mut fields, 0);
        }
    }

    merge_page_widgets(doc, &mut fields);
    fields
}

/// The form root's `/Fields` array, when present.
fn field_tree_roots(doc: &Document) -> Option<&Vec<Object>> {
    let catalog = doc.catalog().ok()?;
    let acroform = dict_get(doc, catalog, b"AcroForm")?.as_dict().ok()?;
    dict_get(doc, acroform, b"Fields")?.as_array().ok()
}

fn walk_field(
    doc: &Document,
    obj: &Object,
    parent_name: &str,
    fields: &mut IndexMap<String, Field>,
    depth: usize,
) {
    if depth > MAX_PARENT_DEPTH {
        log::warn!("field tree deeper than {} levels; truncating walk", MAX_PARENT_DEPTH);
        return;
    }

    let Ok(dict) = resolve(doc, obj).as_dict() else {
        return;
    };

    let partial = dict_get(doc, dict, b"T").and_then(object_to_string);
    let full_name = join_name(parent_name, partial.as_deref());

    // Terminal fields carry an /FT (possibly inherited); containers only
    // route naming to their kids.
    if !full_name.is_empty() && inherited(doc, dict, b"FT").is_some() {
        fields
            .entry(full_name.clone())
            .or_insert_with(|| parse_field(doc, dict, &full_name));
    }

    if let Some(kids) = dict_get(doc, dict, b"Kids").and_then(|o| o.as_array().ok()) {
        for kid in kids {
            walk_field(doc, kid, &full_name, fields, depth + 1);
        }
    }
}

fn join_name(parent: &str, partial: Option<&str>) -> String {
    match (parent.is_empty(), partial) {
        (true, Some(p)) => p.to_string(),
        (false, Some(p)) => format!("{}.{}", parent, p),
        (_, None) => parent.to_string(),
    }
}

/// Build a `Field` from a field or widget dictionary, following `/Parent`
/// for inheritable entries.
fn parse_field(doc: &Document, dict: &Dictionary, name: &str) -> Field {
    let raw_flags = inherited(doc, dict, b"Ff")
        .and_then(object_to_i64)
        .unwrap_or(0) as u32;
    let ft = inherited(doc, dict, b"FT")
        .and_then(|o| o.as_name().ok())
        .unwrap_or(b"");
    let field_type = classify_field_type(ft, FieldFlags::from_raw(raw_flags));

    let mut field = Field::new(name, field_type);
    field.set_flags(raw_flags);
    field.value = inherited(doc, dict, b"V").and_then(|o| parse_value(doc, o));
    field.default_value = inherited(doc, dict, b"DV").and_then(|o| parse_value(doc, o));
    field.rect = dict_get(doc, dict, b"Rect").and_then(|o| parse_rect(doc, o));
    field.options = dict_get(doc, dict, b"Opt")
        .and_then(|o| o.as_array().ok())
        .map(|arr| parse_options(doc, arr))
        .unwrap_or_default();

    if field_type == FieldType::Text {
        field.max_length = inherited(doc, dict, b"MaxLen")
            .and_then(object_to_i64)
            .and_then(|len| u32::try_from(len).ok());
    }

    if let Some(da) = inherited(doc, dict, b"DA").and_then(object_to_string) {
        let (font_name, font_size) = parse_default_appearance(&da);
        field.font_name = font_name;
        field.font_size = font_size;
    }

    field
}

/// Classify per the `/FT` indicator and type-specific flag bits.
fn classify_field_type(ft: &[u8], flags: FieldFlags) -> FieldType {
    match ft {
        b"Tx" => FieldType::Text,
        b"Ch" => {
            if flags.contains(FieldFlags::COMBO) {
                FieldType::Dropdown
            } else {
                FieldType::Listbox
            }
        }
        b"Btn" => {
            if flags.contains(FieldFlags::RADIO) {
                FieldType::Radio
            } else if flags.contains(FieldFlags::PUSH_BUTTON) {
                FieldType::Button
            } else {
                FieldType::Checkbox
            }
        }
        b"Sig" => FieldType::Signature,
        _ => FieldType::Unknown,
    }
}

/// Canonical string form of a `/V` or `/DV` entry.
fn parse_value(doc: &Document, obj: &Object) -> Option<String> {
    match resolve(doc, obj) {
        Object::Array(items) => {
            // Multi-select list boxes store an array of exports.
            let values: Vec<String> = items
                .iter()
                .filter_map(|item| object_to_string(resolve(doc, item)))
                .collect();
            if values.is_empty() {
                None
            } else {
                Some(values.join(", "))
            }
        }
        // An explicitly written empty string stays Some("") so analysis
        // after a fill reports exactly what was stored.
        other => object_to_string(other),
    }
}

/// `/Opt` entries are either display strings or `[export, display]` pairs;
/// the display string is kept.
fn parse_options(doc: &Document, arr: &[Object]) -> Vec<String> {
    arr.iter()
        .filter_map(|entry| match resolve(doc, entry) {
            Object::Array(pair) => pair.last().and_then(|o| object_to_string(resolve(doc, o))),
            other => object_to_string(other),
        })
        .collect()
}

/// Pass 2: attach page indices and rectangles from widget annotations, and
/// create fields for widgets absent from the field tree.
fn merge_page_widgets(doc: &Document, fields: &mut IndexMap<String, Field>) {
    for (page_index, (_, page_id)) in doc.get_pages().iter().enumerate() {
        let Ok(page_dict) = doc.get_dictionary(*page_id) else {
            continue;
        };
        let Some(annots) = dict_get(doc, page_dict, b"Annots").and_then(|o| o.as_array().ok())
        else {
            continue;
        };

        for annot in annots {
            let Ok(widget) = resolve(doc, annot).as_dict() else {
                continue;
            };
            if !is_widget(widget) {
                continue;
            }
            let Some(name) = resolve_widget_name(doc, widget) else {
                // No addressable name; the field could never be filled.
                log::debug!("dropping unnamed widget on page {}", page_index);
                continue;
            };

            match fields.get_mut(&name) {
                Some(field) => {
                    field.page_index = page_index;
                    if field.rect.is_none() {
                        field.rect = dict_get(doc, widget, b"Rect").and_then(|o| parse_rect(doc, o));
                    }
                }
                None => {
                    let mut field = parse_field(doc, widget, &name);
                    field.page_index = page_index;
                    fields.insert(name, field);
                }
            }
        }
    }
}

/// Fully qualified name of a widget, joining `/T` segments along the
/// `/Parent` chain. Widgets with no named ancestor are unaddressable.
fn resolve_widget_name(doc: &Document, widget: &Dictionary) -> Option<String> {
    let mut segments = Vec::new();
    let mut current = widget;
    for _ in 0..MAX_PARENT_DEPTH {
        if let Some(segment) = dict_get(doc, current, b"T").and_then(object_to_string) {
            segments.push(segment);
        }
        match dict_get(doc, current, b"Parent").and_then(|o| o.as_dict().ok()) {
            Some(parent) => current = parent,
            None => break,
        }
    }
    if segments.is_empty() {
        None
    } else {
        segments.reverse();
        Some(segments.join("."))
    }
}

//! Field filling: value normalization and document mutation.
//!
//! The filler iterates the caller's value map in caller order, converts
//! each value to the field's canonical on-disk representation, and writes
//! it into the output document. Per-field problems land in
//! `failed_fields` and never abort the batch; only load, permission, and
//! serialization problems are fatal.

use crate::appearance::{build_text_appearance, compute_font_size};
use crate::error::{FormError, Result};
use crate::flatten::flatten_document;
use crate::fonts::{contains_cjk, FontResolver};
use crate::model::{Field, FieldType, FillOptions, FillResult, FillValue, FormAnalysis, FormType};
use crate::objects::{dict_get, dict_get_dict, encode_text_string, inherited, resolve};
use crate::xfa::sync_field_values;
use indexmap::IndexMap;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};

/// Conventional on-state used only when a checkbox exposes no discoverable
/// appearance state. Real widgets often use custom names, so relying on
/// this without a warning would be a latent correctness bug.
const FALLBACK_ON_STATE: &str = "Yes";
const OFF_STATE: &str = "Off";

/// Addressable objects for one field: the field dictionary itself plus any
/// widget kids that carry appearance state.
struct FieldTarget {
    id: ObjectId,
    kids: Vec<ObjectId>,
}

/// Applies caller values to a loaded document.
pub struct Filler<'a> {
    fonts: &'a FontResolver,
}

impl<'a> Filler<'a> {
    /// Filler borrowing the engine's font resolver.
    pub fn new(fonts: &'a FontResolver) -> Self {
        Filler { fonts }
    }

    /// Fill `values` into `doc` per `options`, recording per-field outcomes
    /// into `result`. Fatal preconditions return `Err` before any mutation.
    pub fn fill_document(
        &self,
        doc: &mut Document,
        analysis: &FormAnalysis,
        values: &IndexMap<String, FillValue>,
        options: &FillOptions,
        result: &mut FillResult,
    ) -> Result<()> {
        if !analysis.permissions.can_fill_forms {
            return Err(FormError::PermissionDenied);
        }

        if analysis.form_type == FormType::XfaDynamic {
            result.warnings.push(
                "Dynamic XFA form may not fill correctly; a dedicated XFA processor is recommended"
                    .to_string(),
            );
        }

        if options.set_need_appearances {
            set_need_appearances(doc);
        }

        let targets = collect_targets(doc);
        let mut normalized = IndexMap::new();

        for (name, value) in values {
            let Some(field) = analysis.fields.get(name) else {
                log::debug!("fill skipped unknown field '{}'", name);
                result.failed_fields.push(name.clone());
                continue;
            };
            if field.is_readonly {
                log::debug!("fill skipped read-only field '{}'", name);
                result.failed_fields.push(name.clone());
                continue;
            }
            let Some(target) = targets.get(name) else {
                result.failed_fields.push(name.clone());
                continue;
            };

            match self.apply_value(doc, field, target, value, options, &mut result.warnings) {
                Ok(canonical) => {
                    result.filled_fields.push(name.clone());
                    normalized.insert(name.clone(), canonical);
                }
                Err(err) => {
                    result.warnings.push(err.to_string());
                    result.failed_fields.push(name.clone());
                }
            }
        }

        if analysis.has_xfa && analysis.form_type != FormType::XfaDynamic && !normalized.is_empty()
        {
            if let Err(err) = sync_field_values(doc, &normalized) {
                result.warnings.push(err.to_string());
            }
        }

        if options.flatten {
            flatten_document(doc);
        }

        Ok(())
    }

    /// Normalize and write one value, returning its canonical string form.
    fn apply_value(
        &self,
        doc: &mut Document,
        field: &Field,
        target: &FieldTarget,
        value: &FillValue,
        options: &FillOptions,
        warnings: &mut Vec<String>,
    ) -> Result<String> {
        match field.field_type {
            FieldType::Checkbox => self.apply_checkbox(doc, field, target, value, warnings),
            FieldType::Radio => self.apply_radio(doc, field, target, value),
            FieldType::Text => self.apply_text(doc, field, target, value, options, warnings),
            _ => {
                let text = value_as_string(value);
                write_field_entry(doc, target.id, "V", encode_text_string(&text));
                Ok(text)
            }
        }
    }

    fn apply_checkbox(
        &self,
        doc: &mut Document,
        field: &Field,
        target: &FieldTarget,
        value: &FillValue,
        warnings: &mut Vec<String>,
    ) -> Result<String> {
        let checked = parse_checkbox_value(&field.name, value)?;
        let on_state = match discover_on_state(doc, target) {
            Some(state) => state,
            None => {
                warnings.push(format!(
                    "Field '{}' exposes no on-state appearance; assuming '{}'",
                    field.name, FALLBACK_ON_STATE
                ));
                FALLBACK_ON_STATE.to_string()
            }
        };
        let canonical = if checked {
            on_state
        } else {
            OFF_STATE.to_string()
        };

        write_state(doc, target, &canonical);
        Ok(canonical)
    }

    fn apply_radio(
        &self,
        doc: &mut Document,
        field: &Field,
        target: &FieldTarget,
        value: &FillValue,
    ) -> Result<String> {
        let FillValue::Text(state) = value else {
            return Err(FormError::ValueConversion {
                field: field.name.clone(),
                reason: "radio groups take the selected widget's state name".to_string(),
            });
        };
        write_state(doc, target, state);
        Ok(state.clone())
    }

    fn apply_text(
        &self,
        doc: &mut Document,
        field: &Field,
        target: &FieldTarget,
        value: &FillValue,
        options: &FillOptions,
        warnings: &mut Vec<String>,
    ) -> Result<String> {
        let mut text = value_as_string(value);

        if let Some(max) = field.max_length {
            let max = max as usize;
            if text.chars().count() > max {
                text = text.chars().take(max).collect();
                warnings.push(format!(
                    "Value for field '{}' truncated to {} characters",
                    field.name, max
                ));
            }
        }

        write_field_entry(doc, target.id, "V", encode_text_string(&text));

        if options.update_appearances && contains_cjk(&text) {
            if let Err(err) = self.render_appearance(doc, field, target, &text) {
                // Raw value stays written; only the appearance degrades.
                warnings.push(err.to_string());
            }
        }

        Ok(text)
    }

    /// Draw a custom appearance for text the built-in generator cannot
    /// cover, and install it as the widget's normal appearance.
    fn render_appearance(
        &self,
        doc: &mut Document,
        field: &Field,
        target: &FieldTarget,
        text: &str,
    ) -> Result<()> {
        let rect = field.rect.ok_or_else(|| {
            FormError::AppearanceRender(format!("field '{}' has no rectangle", field.name))
        })?;
        let font = self.fonts.resolve();
        if !font.covers_cjk() {
            log::warn!(
                "rendering '{}' with Latin fallback font; CJK glyphs will degrade",
                field.name
            );
        }
        let size = compute_font_size(field.font_size, &rect);
        let stream_id = build_text_appearance(doc, &rect, text, font, size)?;
        write_field_entry(
            doc,
            target.id,
            "AP",
            Object::Dictionary(dictionary! { "N" => Object::Reference(stream_id) }),
        );
        Ok(())
    }
}

/// Normalize a caller value into plain text.
fn value_as_string(value: &FillValue) -> String {
    match value {
        FillValue::Text(s) => s.clone(),
        FillValue::Bool(b) => b.to_string(),
    }
}

/// Checkbox synonym handling: booleans, or `true/1/yes` vs `false/0/no`
/// (case-insensitive).
fn parse_checkbox_value(field: &str, value: &FillValue) -> Result<bool> {
    match value {
        FillValue::Bool(b) => Ok(*b),
        FillValue::Text(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => Err(FormError::ValueConversion {
                field: field.to_string(),
                reason: format!("'{}' is not a recognized checkbox value", other),
            }),
        },
    }
}

/// First appearance-state name (other than `Off`) found on the field or
/// its widget kids. Custom state names are the reason this is read from
/// the document instead of hardcoded.
fn discover_on_state(doc: &Document, target: &FieldTarget) -> Option<String> {
    let mut candidates = Vec::new();
    if let Ok(dict) = doc.get_dictionary(target.id) {
        candidates.extend(appearance_states(doc, dict));
    }
    for kid in &target.kids {
        if let Ok(dict) = doc.get_dictionary(*kid) {
            candidates.extend(appearance_states(doc, dict));
        }
    }
    candidates.into_iter().find(|state| state != OFF_STATE)
}

fn appearance_states(doc: &Document, dict: &Dictionary) -> Vec<String> {
    dict_get_dict(doc, dict, b"AP")
        .and_then(|ap| dict_get_dict(doc, ap, b"N"))
        .map(|normal| {
            normal
                .iter()
                .map(|(key, _)| String::from_utf8_lossy(key).to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Write `/V` plus the `/AS` appearance state for on/off-style fields: the
/// field dictionary itself and every widget kid that actually carries the
/// state; kids without it reset to `Off`.
fn write_state(doc: &mut Document, target: &FieldTarget, state: &str) {
    let mut kid_states = Vec::with_capacity(target.kids.len());
    for kid in &target.kids {
        let has_state = doc
            .get_dictionary(*kid)
            .map(|dict| appearance_states(doc, dict).iter().any(|s| s == state))
            .unwrap_or(false);
        kid_states.push((*kid, has_state));
    }

    write_field_entry(doc, target.id, "V", Object::Name(state.as_bytes().to_vec()));
    write_field_entry(doc, target.id, "AS", Object::Name(state.as_bytes().to_vec()));
    for (kid, has_state) in kid_states {
        let as_value = if has_state { state } else { OFF_STATE };
        write_field_entry(doc, kid, "AS", Object::Name(as_value.as_bytes().to_vec()));
    }
}

fn write_field_entry(doc: &mut Document, id: ObjectId, key: &str, value: Object) {
    if let Ok(obj) = doc.get_object_mut(id) {
        if let Ok(dict) = obj.as_dict_mut() {
            dict.set(key, value);
        }
    }
}

/// Set the form-level `/NeedAppearances` flag so conforming viewers
/// rebuild any appearance the engine did not regenerate itself.
fn set_need_appearances(doc: &mut Document) {
    let Some(root_id) = doc
        .trailer
        .get(b"Root")
        .ok()
        .and_then(|obj| obj.as_reference().ok())
    else {
        return;
    };
    let acroform = doc
        .get_dictionary(root_id)
        .ok()
        .and_then(|catalog| catalog.get(b"AcroForm").ok().cloned());

    match acroform {
        Some(Object::Reference(id)) => {
            write_field_entry(doc, id, "NeedAppearances", Object::Boolean(true))
        }
        Some(Object::Dictionary(mut dict)) => {
            dict.set("NeedAppearances", true);
            if let Ok(obj) = doc.get_object_mut(root_id) {
                if let Ok(catalog) = obj.as_dict_mut() {
                    catalog.set("AcroForm", Object::Dictionary(dict));
                }
            }
        }
        _ => {}
    }
}

/// Resolve every addressable field to its object id, joining hierarchical
/// names exactly like extraction does. Resolved once per fill; nothing
/// chases parent pointers afterwards. Inline widget dictionaries are
/// promoted to indirect objects first so they have an id to write to.
fn collect_targets(doc: &mut Document) -> IndexMap<String, FieldTarget> {
    promote_inline_widgets(doc);

    let mut targets = IndexMap::new();

    let roots: Vec<Object> = doc
        .catalog()
        .ok()
        .and_then(|catalog| dict_get(doc, catalog, b"AcroForm"))
        .and_then(|obj| obj.as_dict().ok())
        .and_then(|acroform| dict_get(doc, acroform, b"Fields"))
        .and_then(|obj| obj.as_array().ok())
        .cloned()
        .unwrap_or_default();
    for root in &roots {
        collect_target_tree(doc, root, "", &mut targets, 0);
    }

    // Widget-only fields never listed under /Fields.
    for (_, page_id) in doc.get_pages() {
        let Ok(page_dict) = doc.get_dictionary(page_id) else {
            continue;
        };
        let Some(annots) = dict_get(doc, page_dict, b"Annots").and_then(|o| o.as_array().ok())
        else {
            continue;
        };
        for annot in annots {
            let Object::Reference(id) = annot else {
                continue;
            };
            let Ok(dict) = doc.get_dictionary(*id) else {
                continue;
            };
            if !crate::objects::is_widget(dict) {
                continue;
            }
            if let Some(name) = widget_name(doc, dict) {
                targets
                    .entry(name)
                    .or_insert_with(|| FieldTarget { id: *id, kids: Vec::new() });
            }
        }
    }

    targets
}

/// Replace widget dictionaries stored inline in a page's `/Annots` array
/// with references to promoted indirect objects. Extraction resolves such
/// widgets transparently; filling needs an object id to mutate.
fn promote_inline_widgets(doc: &mut Document) {
    let page_ids: Vec<ObjectId> = doc.get_pages().values().copied().collect();
    for page_id in page_ids {
        // The array lives either directly on the page or behind a reference.
        let holder = {
            let Ok(page) = doc.get_dictionary(page_id) else {
                continue;
            };
            match page.get(b"Annots") {
                Ok(Object::Reference(id)) => Some(*id),
                Ok(Object::Array(_)) => None,
                _ => continue,
            }
        };

        let entries: Vec<Object> = match holder {
            Some(id) => match doc.get_object(id) {
                Ok(Object::Array(arr)) => arr.clone(),
                _ => continue,
            },
            None => match doc.get_dictionary(page_id) {
                Ok(page) => match page.get(b"Annots") {
                    Ok(Object::Array(arr)) => arr.clone(),
                    _ => continue,
                },
                _ => continue,
            },
        };

        let mut changed = false;
        let promoted: Vec<Object> = entries
            .into_iter()
            .map(|entry| match entry {
                Object::Dictionary(dict) if crate::objects::is_widget(&dict) => {
                    changed = true;
                    Object::Reference(doc.add_object(dict))
                }
                other => other,
            })
            .collect();
        if !changed {
            continue;
        }

        match holder {
            Some(id) => {
                if let Ok(obj) = doc.get_object_mut(id) {
                    *obj = Object::Array(promoted);
                }
            }
            None => {
                if let Ok(obj) = doc.get_object_mut(page_id) {
                    if let Ok(page) = obj.as_dict_mut() {
                        page.set("Annots", Object::Array(promoted));
                    }
                }
            }
        }
    }
}

fn collect_target_tree(
    doc: &Document,
    obj: &Object,
    parent_name: &str,
    targets: &mut IndexMap<String, FieldTarget>,
    depth: usize,
) {
    if depth > crate::objects::MAX_PARENT_DEPTH {
        return;
    }
    let Object::Reference(id) = obj else {
        return;
    };
    let Ok(dict) = doc.get_dictionary(*id) else {
        return;
    };

    let partial = dict_get(doc, dict, b"T").and_then(|o| crate::objects::object_to_string(o));
    let full_name = match (parent_name.is_empty(), partial) {
        (true, Some(p)) => p,
        (false, Some(p)) => format!("{}.{}", parent_name, p),
        (_, None) => parent_name.to_string(),
    };

    let kid_refs: Vec<Object> = dict_get(doc, dict, b"Kids")
        .and_then(|o| o.as_array().ok())
        .cloned()
        .unwrap_or_default();

    if !full_name.is_empty() && inherited(doc, dict, b"FT").is_some() {
        let kids = kid_refs
            .iter()
            .filter_map(|kid| resolve_reference(doc, kid))
            .collect();
        targets
            .entry(full_name.clone())
            .or_insert_with(|| FieldTarget { id: *id, kids });
    }

    for kid in &kid_refs {
        collect_target_tree(doc, kid, &full_name, targets, depth + 1);
    }
}

fn resolve_reference(_doc: &Document, obj: &Object) -> Option<ObjectId> {
    match obj {
        Object::Reference(id) => Some(*id),
        _ => None,
    }
}

fn widget_name(doc: &Document, widget: &Dictionary) -> Option<String> {
    let mut segments = Vec::new();
    let mut current = widget;
    for _ in 0..crate::objects::MAX_PARENT_DEPTH {
        if let Some(segment) =
            dict_get(doc, current, b"T").and_then(|o| crate::objects::object_to_string(o))
        {
            segments.push(segment);
        }
        match dict_get(doc, current, b"Parent").and_then(|o| resolve(doc, o).as_dict().ok()) {
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

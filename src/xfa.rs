//! XFA payload detection, classification, and best-effort data sync.
//!
//! XFA data lives under the form root's `/XFA` entry, either as one opaque
//! stream or as an alternating `[name, stream, ...]` array of packets. The
//! detector concatenates every packet (lossy UTF-8) into one text blob; the
//! static/dynamic split is a literal marker scan, not a parse, so false
//! negatives are possible on exotic documents.

use crate::error::{FormError, Result};
use crate::objects::resolve;
use indexmap::IndexMap;
use lopdf::{Document, Object, ObjectId};
use quick_xml::events::{BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashMap;

/// Marker literals that indicate a dynamically rendered XFA form.
const DYNAMIC_MARKERS: [&str; 5] = [
    "dynamicRender",
    "<script",
    "layout=\"tb\"",
    "layout=\"lr\"",
    "layout=\"rl-tb\"",
];

/// Outcome of XFA detection.
#[derive(Debug, Clone, Default)]
pub struct XfaInfo {
    /// Whether an `/XFA` entry exists under the form root
    pub has_xfa: bool,
    /// Concatenated packet text, when any stream decoded
    pub data: Option<String>,
}

/// Locate and concatenate the document's XFA payload.
pub fn detect_xfa(doc: &Document) -> XfaInfo {
    let Some(xfa_obj) = locate_xfa_entry(doc) else {
        return XfaInfo::default();
    };

    let mut text = String::new();
    match xfa_obj {
        Object::Stream(stream) => {
            text.push_str(&String::from_utf8_lossy(&stream_bytes(stream)));
        }
        Object::Array(arr) => {
            // Alternating [name, stream, name, stream, ...]; names are
            // skipped, streams concatenated in sequence order.
            for packet in arr.iter().skip(1).step_by(2) {
                if let Object::Stream(stream) = resolve(doc, packet) {
                    text.push_str(&String::from_utf8_lossy(&stream_bytes(stream)));
                }
            }
        }
        _ => {
            log::debug!("/XFA entry is neither stream nor array; treating as opaque");
        }
    }

    XfaInfo {
        has_xfa: true,
        data: if text.is_empty() { None } else { Some(text) },
    }
}

/// Classify an XFA blob as dynamic. Absence of every marker means static.
pub fn is_dynamic_xfa(data: &str) -> bool {
    DYNAMIC_MARKERS.iter().any(|marker| data.contains(marker))
}

fn locate_xfa_entry(doc: &Document) -> Option<&Object> {
    let catalog = doc.catalog().ok()?;
    let acroform = catalog.get(b"AcroForm").ok().map(|obj| resolve(doc, obj))?;
    let acroform_dict = acroform.as_dict().ok()?;
    acroform_dict.get(b"XFA").ok().map(|obj| resolve(doc, obj))
}

fn stream_bytes(stream: &lopdf::Stream) -> Vec<u8> {
    if stream.dict.has(b"Filter") {
        stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone())
    } else {
        stream.content.clone()
    }
}

/// Rewrite the text content of elements whose local name matches the last
/// segment of a filled field's name.
///
/// The rewrite is namespace-agnostic and event-level: element structure,
/// attributes, and everything not matched pass through unchanged. Elements
/// without a text child (including self-closing ones) are left alone.
pub fn rewrite_packet(xml: &str, values: &IndexMap<String, String>) -> Result<String> {
    let lookup: HashMap<Vec<u8>, &str> = values
        .iter()
        .map(|(name, value)| {
            let segment = name.rsplit('.').next().unwrap_or(name);
            (segment.as_bytes().to_vec(), value.as_str())
        })
        .collect();

    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::new());
    let mut stack: Vec<Vec<u8>> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                stack.push(e.local_name().as_ref().to_vec());
                writer
                    .write_event(Event::Start(e))
                    .map_err(sync_unsupported)?;
            }
            Ok(Event::End(e)) => {
                stack.pop();
                writer
                    .write_event(Event::End(e))
                    .map_err(sync_unsupported)?;
            }
            Ok(Event::Text(t)) => {
                let replacement = stack
                    .last()
                    .and_then(|name| lookup.get(name.as_slice()).copied());
                match replacement {
                    Some(value) => writer
                        .write_event(Event::Text(BytesText::new(value)))
                        .map_err(sync_unsupported)?,
                    None => writer.write_event(Event::Text(t)).map_err(sync_unsupported)?,
                }
            }
            Ok(event) => writer.write_event(event).map_err(sync_unsupported)?,
            Err(err) => return Err(sync_unsupported(err)),
        }
    }

    String::from_utf8(writer.into_inner())
        .map_err(|err| FormError::XfaSyncUnsupported(err.to_string()))
}

/// Push the filled values into the document's XFA packets.
///
/// For the array form only the `datasets` packet is rewritten; a single
/// opaque stream is rewritten wholesale. Rewritten streams are stored
/// uncompressed. Returns the number of updated packets.
pub fn sync_field_values(doc: &mut Document, values: &IndexMap<String, String>) -> Result<usize> {
    if values.is_empty() {
        return Ok(0);
    }

    let targets = collect_packet_targets(doc)?;
    if targets.is_empty() {
        return Err(FormError::XfaSyncUnsupported(
            "no rewritable XFA packet stream found".to_string(),
        ));
    }

    let mut updated = 0;
    for id in targets {
        let xml = match doc.get_object(id) {
            Ok(Object::Stream(stream)) => String::from_utf8_lossy(&stream_bytes(stream)).to_string(),
            _ => continue,
        };
        let rewritten = rewrite_packet(&xml, values)?;
        if let Ok(Object::Stream(stream)) = doc.get_object_mut(id) {
            stream.dict.remove(b"Filter");
            stream.set_content(rewritten.into_bytes());
            updated += 1;
        }
    }
    Ok(updated)
}

fn collect_packet_targets(doc: &Document) -> Result<Vec<ObjectId>> {
    let Some(xfa_obj) = locate_xfa_entry(doc) else {
        return Ok(Vec::new());
    };

    let mut targets = Vec::new();
    match xfa_obj {
        Object::Stream(_) => {
            // Must be re-located as a reference so we can mutate it.
            if let Some(id) = locate_xfa_reference(doc) {
                targets.push(id);
            }
        }
        Object::Array(arr) => {
            let mut i = 0;
            while i + 1 < arr.len() {
                let is_datasets = matches!(&arr[i], Object::Name(n) if n == b"datasets")
                    || matches!(&arr[i], Object::String(s, _) if s == b"datasets");
                if is_datasets {
                    if let Object::Reference(id) = &arr[i + 1] {
                        targets.push(*id);
                    }
                }
                i += 2;
            }
        }
        _ => {}
    }
    Ok(targets)
}

fn locate_xfa_reference(doc: &Document) -> Option<ObjectId> {
    let catalog = doc.catalog().ok()?;
    let acroform = catalog.get(b"AcroForm").ok().map(|obj| resolve(doc, obj))?;
    let acroform_dict = acroform.as_dict().ok()?;
    match acroform_dict.get(b"XFA").ok()? {
        Object::Reference(id) => Some(*id),
        _ => None,
    }
}

fn sync_unsupported(err: impl std::fmt::Display) -> FormError {
    FormError::XfaSyncUnsupported(err.to_string())
}

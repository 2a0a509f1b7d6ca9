//! Helpers over the `lopdf` object graph.
//!
//! Thin lookup and decoding utilities shared by the extractor, filler, and
//! flattener: indirect-reference resolution, text-string decoding per
//! ISO 32000-1 §7.9.2.2, and numeric coercions.

use crate::model::Rect;
use lopdf::{Dictionary, Document, Object, StringFormat};

/// Guard against reference cycles when chasing `/Parent` chains.
pub const MAX_PARENT_DEPTH: usize = 32;

/// Resolve an object, following an indirect reference if present.
///
/// Unresolvable references return the original object rather than failing;
/// callers treat that like any other unexpected type.
pub fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    let mut current = obj;
    for _ in 0..MAX_PARENT_DEPTH {
        match current {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(target) => current = target,
                Err(_) => return current,
            },
            _ => return current,
        }
    }
    current
}

/// Fetch and resolve a dictionary entry.
pub fn dict_get<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().map(|obj| resolve(doc, obj))
}

/// Fetch a dictionary entry that is itself a dictionary.
pub fn dict_get_dict<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Dictionary> {
    dict_get(doc, dict, key).and_then(|obj| obj.as_dict().ok())
}

/// Decode a PDF text string: UTF-16BE when prefixed with the FE FF BOM,
/// otherwise treated as PDFDocEncoding (Latin-1 superset).
pub fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

/// Encode a text string for storage: plain literal bytes when ASCII,
/// UTF-16BE with BOM otherwise.
pub fn encode_text_string(text: &str) -> Object {
    if text.is_ascii() {
        Object::String(text.as_bytes().to_vec(), StringFormat::Literal)
    } else {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Object::String(bytes, StringFormat::Hexadecimal)
    }
}

/// Read an object as text, accepting strings and names.
pub fn object_to_string(obj: &Object) -> Option<String> {
    match obj {
        Object::String(bytes, _) => Some(decode_text_string(bytes)),
        Object::Name(name) => Some(String::from_utf8_lossy(name).to_string()),
        Object::Integer(i) => Some(i.to_string()),
        Object::Real(r) => Some(r.to_string()),
        Object::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Coerce an integer or real object to f64.
pub fn object_to_f64(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Coerce an integer object to i64.
pub fn object_to_i64(obj: &Object) -> Option<i64> {
    match obj {
        Object::Integer(i) => Some(*i),
        _ => None,
    }
}

/// Parse a `/Rect` array into a normalized rectangle.
pub fn parse_rect(doc: &Document, obj: &Object) -> Option<Rect> {
    let arr = resolve(doc, obj).as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let mut coords = [0.0f64; 4];
    for (slot, item) in coords.iter_mut().zip(arr.iter()) {
        *slot = object_to_f64(resolve(doc, item))?;
    }
    Some(Rect::new(coords[0], coords[1], coords[2], coords[3]))
}

/// Whether an annotation dictionary is a form widget.
pub fn is_widget(dict: &Dictionary) -> bool {
    matches!(dict.get(b"Subtype"), Ok(Object::Name(name)) if name == b"Widget")
}

/// Look up a key on a field dictionary, falling back to inherited values
/// along the `/Parent` chain (depth-limited).
pub fn inherited<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    let mut current = dict;
    for _ in 0..MAX_PARENT_DEPTH {
        if let Some(obj) = dict_get(doc, current, key) {
            return Some(obj);
        }
        match dict_get(doc, current, b"Parent").and_then(|obj| obj.as_dict().ok()) {
            Some(parent) => current = parent,
            None => return None,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn test_decode_latin_string() {
        assert_eq!(decode_text_string(b"hello"), "hello");
    }

    #[test]
    fn test_decode_utf16_string() {
        // "张" encoded as UTF-16BE with BOM
        let bytes = [0xFE, 0xFF, 0x5F, 0x20];
        assert_eq!(decode_text_string(&bytes), "张");
    }

    #[test]
    fn test_encode_roundtrip() {
        for text in ["plain ascii", "姓名", "mixed 名"] {
            let obj = encode_text_string(text);
            match obj {
                Object::String(bytes, _) => assert_eq!(decode_text_string(&bytes), text),
                _ => panic!("expected string object"),
            }
        }
    }

    #[test]
    fn test_parse_rect_normalizes() {
        let doc = Document::with_version("1.7");
        let obj = Object::Array(vec![
            Object::Integer(120),
            Object::Real(740.0),
            Object::Integer(100),
            Object::Real(700.0),
        ]);
        let rect = parse_rect(&doc, &obj).unwrap();
        assert_eq!(rect.x1, 100.0);
        assert_eq!(rect.y2, 740.0);
    }

    #[test]
    fn test_resolve_follows_reference() {
        let mut doc = Document::with_version("1.7");
        let id = doc.add_object(Object::Integer(42));
        let reference = Object::Reference(id);
        assert_eq!(object_to_i64(resolve(&doc, &reference)), Some(42));
    }

    #[test]
    fn test_inherited_walks_parent_chain() {
        let mut doc = Document::with_version("1.7");
        let parent_id = doc.add_object(Object::Dictionary(dictionary! {
            "FT" => "Btn",
        }));
        let child = dictionary! {
            "Parent" => Object::Reference(parent_id),
        };
        let ft = inherited(&doc, &child, b"FT").unwrap();
        assert_eq!(ft.as_name().ok(), Some(b"Btn".as_slice()));
    }

    #[test]
    fn test_is_widget() {
        let widget = dictionary! { "Subtype" => "Widget" };
        let link = dictionary! { "Subtype" => "Link" };
        assert!(is_widget(&widget));
        assert!(!is_widget(&link));
    }
}

//! Appearance stream generation and default-appearance parsing.
//!
//! Viewers honoring `/NeedAppearances` regenerate field appearances on
//! their own, but text containing glyphs outside the codec's built-in
//! coverage gets an explicit Form XObject drawn here so the value stays
//! visible even in viewers that trust stored appearances.

use crate::error::{FormError, Result};
use crate::fonts::{FontSource, ResolvedFont};
use crate::model::Rect;
use lazy_static::lazy_static;
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use regex::Regex;

lazy_static! {
    // e.g. "/Helv 9 Tf 0 g" -> ("Helv", 9.0)
    static ref DA_FONT_RE: Regex = Regex::new(r"/([\w-]+)\s+([\d.]+)\s+Tf").unwrap();
}

/// Parse font name and size out of a `/DA` default-appearance string.
pub fn parse_default_appearance(da: &str) -> (Option<String>, Option<f32>) {
    match DA_FONT_RE.captures(da) {
        Some(caps) => {
            let name = caps.get(1).map(|m| m.as_str().to_string());
            let size = caps.get(2).and_then(|m| m.as_str().parse::<f32>().ok());
            (name, size)
        }
        None => (None, None),
    }
}

/// Effective font size for a field: the declared size, or 80% of the field
/// height (capped at 12pt) when the declaration is zero or absent.
pub fn compute_font_size(declared: Option<f32>, rect: &Rect) -> f32 {
    match declared {
        Some(size) if size > 0.0 => size,
        _ => (rect.height() as f32 * 0.8).min(12.0),
    }
}

/// Build a normal-appearance Form XObject drawing `text` into a box the
/// size of the field rect, and return its object id.
///
/// The font resource is referenced by logical name only; glyph embedding is
/// out of scope, so the CID tiers use the conventional non-embedded Type0
/// arrangement (UniGB-UCS2-H encoding with UTF-16BE text).
pub fn build_text_appearance(
    doc: &mut Document,
    rect: &Rect,
    text: &str,
    font: &ResolvedFont,
    font_size: f32,
) -> Result<ObjectId> {
    let width = rect.width();
    let height = rect.height();
    if width <= 0.0 || height <= 0.0 {
        return Err(FormError::AppearanceRender(
            "field rectangle has no area".to_string(),
        ));
    }

    let font_id = doc.add_object(Object::Dictionary(font_dictionary(font)));

    let baseline = (height as f32 - font_size - 2.0).max(2.0);
    let mut content = String::new();
    content.push_str("/Tx BMC\nq\nBT\n");
    content.push_str(&format!("/F0 {} Tf\n0 g\n", font_size));
    content.push_str(&format!("2 {} Td\n", baseline));
    content.push_str(&show_text_operator(text, font));
    content.push_str("\nET\nQ\nEMC\n");

    let stream_dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Form",
        "BBox" => vec![
            Object::Real(0.0),
            Object::Real(0.0),
            Object::Real(width as f32),
            Object::Real(height as f32),
        ],
        "Resources" => dictionary! {
            "Font" => dictionary! {
                "F0" => Object::Reference(font_id),
            },
        },
    };

    Ok(doc.add_object(Object::Stream(Stream::new(stream_dict, content.into_bytes()))))
}

fn font_dictionary(font: &ResolvedFont) -> lopdf::Dictionary {
    match font.source {
        FontSource::BaseLatin => dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => font.name.as_str(),
        },
        // Non-embedded CID arrangement; the viewer supplies the glyphs.
        FontSource::SystemFile | FontSource::BuiltinCid => dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => font.name.as_str(),
            "Encoding" => "UniGB-UCS2-H",
            "DescendantFonts" => vec![Object::Dictionary(dictionary! {
                "Type" => "Font",
                "Subtype" => "CIDFontType0",
                "BaseFont" => font.name.as_str(),
                "CIDSystemInfo" => dictionary! {
                    "Registry" => Object::string_literal("Adobe"),
                    "Ordering" => Object::string_literal("GB1"),
                    "Supplement" => 4,
                },
            })],
        },
    }
}

fn show_text_operator(text: &str, font: &ResolvedFont) -> String {
    match font.source {
        FontSource::BaseLatin => {
            let mut escaped = String::with_capacity(text.len());
            for c in text.chars() {
                match c {
                    '(' | ')' | '\\' => {
                        escaped.push('\\');
                        escaped.push(c);
                    }
                    c if c.is_ascii() => escaped.push(c),
                    // Outside coverage anyway; keep the stream valid.
                    _ => escaped.push('?'),
                }
            }
            format!("({}) Tj", escaped)
        }
        FontSource::SystemFile | FontSource::BuiltinCid => {
            let mut hex = String::with_capacity(text.len() * 4);
            for unit in text.encode_utf16() {
                hex.push_str(&format!("{:04X}", unit));
            }
            format!("<{}> Tj", hex)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::FontResolver;

    #[test]
    fn test_parse_default_appearance() {
        let (name, size) = parse_default_appearance("/Helv 9.5 Tf 0 g");
        assert_eq!(name.as_deref(), Some("Helv"));
        assert_eq!(size, Some(9.5));
    }

    #[test]
    fn test_parse_default_appearance_no_match() {
        assert_eq!(parse_default_appearance("0 g"), (None, None));
    }

    #[test]
    fn test_font_size_declared_wins() {
        let rect = Rect::new(0.0, 0.0, 200.0, 30.0);
        assert_eq!(compute_font_size(Some(9.0), &rect), 9.0);
    }

    #[test]
    fn test_font_size_from_height_when_zero() {
        let rect = Rect::new(0.0, 0.0, 200.0, 10.0);
        assert_eq!(compute_font_size(Some(0.0), &rect), 8.0);
        // Tall fields cap at 12pt
        let tall = Rect::new(0.0, 0.0, 200.0, 100.0);
        assert_eq!(compute_font_size(None, &tall), 12.0);
    }

    #[test]
    fn test_build_appearance_stream() {
        let mut doc = Document::with_version("1.7");
        let resolver = FontResolver::with_candidates(Vec::new(), true);
        let rect = Rect::new(100.0, 700.0, 300.0, 720.0);
        let id = build_text_appearance(&mut doc, &rect, "姓名", resolver.resolve(), 10.0).unwrap();

        let Ok(Object::Stream(stream)) = doc.get_object(id) else {
            panic!("appearance is not a stream");
        };
        let content = String::from_utf8_lossy(&stream.content);
        assert!(content.contains("/Tx BMC"));
        assert!(content.contains("/F0 10 Tf"));
        // UTF-16BE hex for 姓名
        assert!(content.contains("<59D3540D> Tj"));
        assert_eq!(
            stream.dict.get(b"Subtype").unwrap().as_name().unwrap(),
            b"Form"
        );
    }

    #[test]
    fn test_degenerate_rect_rejected() {
        let mut doc = Document::with_version("1.7");
        let resolver = FontResolver::with_candidates(Vec::new(), true);
        let rect = Rect::new(100.0, 700.0, 100.0, 700.0);
        let err =
            build_text_appearance(&mut doc, &rect, "x", resolver.resolve(), 10.0).unwrap_err();
        assert!(matches!(err, FormError::AppearanceRender(_)));
    }
}

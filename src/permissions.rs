//! Permission decoding from the document's protection bitmask.
//!
//! The decoder is a read-mostly capability probe: any failure to read the
//! encryption dictionary falls back to the all-true default instead of
//! raising. Mutating operations re-check `can_fill_forms` before writing.

use crate::model::Permissions;
use crate::objects::{dict_get, object_to_i64, resolve};
use lopdf::Document;

/// Whether the document carries an encryption dictionary.
pub fn is_encrypted(doc: &Document) -> bool {
    doc.trailer.has(b"Encrypt")
}

/// Decode the capability set from the trailer's `/Encrypt` dictionary.
///
/// Unencrypted documents grant everything. Encrypted documents decode the
/// standard security handler's `/P` word: bit 3 print, bit 4 modify, bit 5
/// extract, bit 9 fill forms. `/P` is stored two's-complement and usually
/// negative in real files; the bit tests below are unaffected.
pub fn decode_permissions(doc: &Document) -> Permissions {
    if !is_encrypted(doc) {
        return Permissions::default();
    }

    match read_protection_word(doc) {
        Some(p) => Permissions {
            can_print: p & 4 != 0,
            can_modify: p & 8 != 0,
            can_extract: p & 16 != 0,
            can_fill_forms: p & 256 != 0,
        },
        None => {
            // Fail-open: a malformed encryption dictionary must not make a
            // readable document unusable.
            log::debug!("encryption dictionary present but /P unreadable; assuming full access");
            Permissions::default()
        }
    }
}

fn read_protection_word(doc: &Document) -> Option<i64> {
    let encrypt = doc.trailer.get(b"Encrypt").ok()?;
    let encrypt_dict = resolve(doc, encrypt).as_dict().ok()?;
    dict_get(doc, encrypt_dict, b"P").and_then(object_to_i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Object};

    fn doc_with_protection(p: Option<i64>) -> Document {
        let mut doc = Document::with_version("1.7");
        let mut encrypt = dictionary! {
            "Filter" => "Standard",
            "V" => 2,
            "R" => 3,
        };
        if let Some(p) = p {
            encrypt.set("P", Object::Integer(p));
        }
        let encrypt_id = doc.add_object(Object::Dictionary(encrypt));
        doc.trailer.set("Encrypt", Object::Reference(encrypt_id));
        doc
    }

    #[test]
    fn test_unencrypted_grants_everything() {
        let doc = Document::with_version("1.7");
        assert!(!is_encrypted(&doc));
        assert_eq!(decode_permissions(&doc), Permissions::default());
    }

    #[test]
    fn test_decodes_protection_bits() {
        // Print and fill-forms only
        let doc = doc_with_protection(Some(4 | 256));
        let perms = decode_permissions(&doc);
        assert!(perms.can_print);
        assert!(perms.can_fill_forms);
        assert!(!perms.can_modify);
        assert!(!perms.can_extract);
    }

    #[test]
    fn test_negative_protection_word() {
        // Typical real-world value: all bits set except modify (bit 4)
        let p = -1i64 & !8;
        let doc = doc_with_protection(Some(p));
        let perms = decode_permissions(&doc);
        assert!(!perms.can_modify);
        assert!(perms.can_print);
        assert!(perms.can_fill_forms);
    }

    #[test]
    fn test_fill_forms_bit_clear() {
        let doc = doc_with_protection(Some(4 | 8 | 16));
        assert!(!decode_permissions(&doc).can_fill_forms);
    }

    #[test]
    fn test_malformed_encrypt_fails_open() {
        let doc = doc_with_protection(None);
        assert!(is_encrypted(&doc));
        assert_eq!(decode_permissions(&doc), Permissions::default());
    }
}

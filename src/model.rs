//! Shared data model for form analysis and filling.
//!
//! The types here are the engine's public vocabulary: field and form
//! classification enums, the per-field record produced by extraction, and
//! the analysis/fill result structs handed back to callers. All of them
//! serialize with serde so the API layer above the engine can pass them
//! through unchanged.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Form field type, resolved from the field's `/FT` entry and type-specific
/// flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Single or multi-line text field (`/Tx`)
    Text,
    /// Checkbox (`/Btn` without radio or pushbutton flags)
    Checkbox,
    /// Radio button group (`/Btn` with the radio flag)
    Radio,
    /// Combo box (`/Ch` with the combo flag)
    Dropdown,
    /// List box (`/Ch` without the combo flag)
    Listbox,
    /// Signature field (`/Sig`)
    Signature,
    /// Push button (`/Btn` with the pushbutton flag)
    Button,
    /// Unrecognized field type
    Unknown,
}

/// Which form technology a document carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormType {
    /// No interactive form at all
    #[serde(rename = "none")]
    None,
    /// AcroForm field dictionaries only
    #[serde(rename = "acroform")]
    AcroFieldsOnly,
    /// XFA payload without dynamic-render markers
    #[serde(rename = "xfa_static")]
    XfaStatic,
    /// XFA payload with dynamic-render markers
    #[serde(rename = "xfa_dynamic")]
    XfaDynamic,
    /// Both AcroForm fields and an XFA payload
    #[serde(rename = "hybrid")]
    Hybrid,
}

bitflags::bitflags! {
    /// Field flag bits from the `/Ff` entry (ISO 32000-1, Tables 221/226/228/230).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FieldFlags: u32 {
        /// Field is read-only (bit 1)
        const READ_ONLY = 1;
        /// Field is required (bit 2)
        const REQUIRED = 1 << 1;
        /// Field should not be exported (bit 3)
        const NO_EXPORT = 1 << 2;
        /// Text field allows multiple lines (bit 13)
        const MULTILINE = 1 << 12;
        /// Text field is a password field (bit 14)
        const PASSWORD = 1 << 13;
        /// Radio button group (bit 16)
        const RADIO = 1 << 15;
        /// Push button (bit 17)
        const PUSH_BUTTON = 1 << 16;
        /// Choice field is a combo box (bit 18)
        const COMBO = 1 << 17;
        /// Choice field is editable (bit 19)
        const EDIT = 1 << 18;
        /// Choice field allows multiple selection (bit 22)
        const MULTI_SELECT = 1 << 21;
    }
}

impl FieldFlags {
    /// Interpret a raw `/Ff` word, keeping unknown bits.
    pub fn from_raw(raw: u32) -> Self {
        FieldFlags::from_bits_retain(raw)
    }
}

/// Axis-aligned field rectangle in page space, `(x1, y1, x2, y2)` with
/// `x1 <= x2` and `y1 <= y2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge
    pub x1: f64,
    /// Bottom edge
    pub y1: f64,
    /// Right edge
    pub x2: f64,
    /// Top edge
    pub y2: f64,
}

impl Rect {
    /// Build a normalized rectangle from two corner points.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Rect {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    /// Rectangle width.
    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    /// Rectangle height.
    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }
}

/// One form field, keyed by its fully qualified name.
///
/// Hierarchical names are joined with `.` from parent to child. Values hold
/// the canonical on-disk representation (e.g. a checkbox's appearance-state
/// name), not a UI rendering of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    /// Fully qualified field name
    pub name: String,
    /// Resolved field type
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Current value (`/V`), canonical form
    pub value: Option<String>,
    /// Default value (`/DV`), canonical form
    pub default_value: Option<String>,
    /// Choice-field option list (`/Opt`), in document order
    pub options: Vec<String>,
    /// Widget rectangle in page space
    pub rect: Option<Rect>,
    /// Page the primary widget lives on (0-based)
    pub page_index: usize,
    /// Raw `/Ff` bitmask
    pub flags: u32,
    /// Decoded from flag bit 0
    pub is_readonly: bool,
    /// Decoded from flag bit 1
    pub is_required: bool,
    /// Maximum text length (`/MaxLen`), text fields only
    pub max_length: Option<u32>,
    /// Font name parsed from the `/DA` default-appearance string
    pub font_name: Option<String>,
    /// Font size parsed from the `/DA` default-appearance string
    pub font_size: Option<f32>,
}

impl Field {
    /// Create an empty field of the given name and type; extraction fills
    /// in the rest.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Field {
            name: name.into(),
            field_type,
            value: None,
            default_value: None,
            options: Vec::new(),
            rect: None,
            page_index: 0,
            flags: 0,
            is_readonly: false,
            is_required: false,
            max_length: None,
            font_name: None,
            font_size: None,
        }
    }

    /// Apply a raw `/Ff` word, decoding the readonly/required bits.
    pub fn set_flags(&mut self, raw: u32) {
        let flags = FieldFlags::from_raw(raw);
        self.flags = raw;
        self.is_readonly = flags.contains(FieldFlags::READ_ONLY);
        self.is_required = flags.contains(FieldFlags::REQUIRED);
    }
}

/// Capability set decoded from the document's protection bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    /// Document modification (bit 4 of `/P`)
    pub can_modify: bool,
    /// Form filling (bit 9 of `/P`)
    pub can_fill_forms: bool,
    /// Content extraction (bit 5 of `/P`)
    pub can_extract: bool,
    /// Printing (bit 3 of `/P`)
    pub can_print: bool,
}

impl Default for Permissions {
    fn default() -> Self {
        // Unencrypted documents grant everything.
        Permissions {
            can_modify: true,
            can_fill_forms: true,
            can_extract: true,
            can_print: true,
        }
    }
}

/// Result of analyzing one document's form structure.
///
/// Produced once per analyze call and never cached across calls: field
/// state lives inside the document file, not in engine memory.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormAnalysis {
    /// Detected form technology
    pub form_type: FormType,
    /// Field map, keyed by fully qualified name, in extraction order
    pub fields: IndexMap<String, Field>,
    /// Whether an XFA payload is present
    pub has_xfa: bool,
    /// Full concatenated XFA packet text, when present
    pub xfa_data: Option<String>,
    /// Whether the document carries an encryption dictionary
    pub is_encrypted: bool,
    /// Decoded capability set
    pub permissions: Permissions,
    /// Non-fatal findings, in detection order
    pub warnings: Vec<String>,
    /// Errors recorded during analysis
    pub errors: Vec<String>,
}

impl FormAnalysis {
    /// Analysis of a form-free document.
    pub fn empty() -> Self {
        FormAnalysis {
            form_type: FormType::None,
            fields: IndexMap::new(),
            has_xfa: false,
            xfa_data: None,
            is_encrypted: false,
            permissions: Permissions::default(),
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Number of extracted fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// JSON summary in the shape the API layer exposes: form type, field
    /// list with readonly/required markers, permissions, and any findings.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "formType": self.form_type,
            "hasXfa": self.has_xfa,
            "isEncrypted": self.is_encrypted,
            "permissions": self.permissions,
            "fieldCount": self.field_count(),
            "fields": self.fields.values().map(|f| serde_json::json!({
                "name": f.name,
                "type": f.field_type,
                "value": f.value,
                "isReadonly": f.is_readonly,
                "isRequired": f.is_required,
            })).collect::<Vec<_>>(),
            "warnings": self.warnings,
            "errors": self.errors,
        })
    }
}

/// A caller-supplied value for one field.
///
/// JSON booleans and strings both deserialize; checkbox fields additionally
/// accept the string synonyms `true/1/yes` and `false/0/no`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FillValue {
    /// Boolean value (checkboxes)
    Bool(bool),
    /// Text value (everything else, plus checkbox synonyms)
    Text(String),
}

impl From<&str> for FillValue {
    fn from(s: &str) -> Self {
        FillValue::Text(s.to_string())
    }
}

impl From<String> for FillValue {
    fn from(s: String) -> Self {
        FillValue::Text(s)
    }
}

impl From<bool> for FillValue {
    fn from(b: bool) -> Self {
        FillValue::Bool(b)
    }
}

/// How the filled document is written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveMode {
    /// Append-only update. The codec has no append-only writer, so this
    /// currently falls back to a full rewrite with a recorded warning.
    Incremental,
    /// Re-serialize the entire object graph
    FullRewrite,
}

/// Options controlling a fill call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct FillOptions {
    /// Request appearance regeneration for written values
    pub update_appearances: bool,
    /// Set the form-level `/NeedAppearances` flag
    pub set_need_appearances: bool,
    /// Output serialization mode
    pub save_mode: SaveMode,
    /// Remove all interactivity after filling
    pub flatten: bool,
}

impl Default for FillOptions {
    fn default() -> Self {
        FillOptions {
            update_appearances: true,
            set_need_appearances: true,
            save_mode: SaveMode::FullRewrite,
            flatten: false,
        }
    }
}

/// Result of one fill or flatten call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FillResult {
    /// Whether the call as a whole succeeded
    pub success: bool,
    /// Path the output document was written to
    pub output_path: Option<PathBuf>,
    /// Names filled successfully, in caller order
    pub filled_fields: Vec<String>,
    /// Names that could not be filled, in caller order
    pub failed_fields: Vec<String>,
    /// Non-fatal findings
    pub warnings: Vec<String>,
    /// Fatal errors (present only when `success` is false)
    pub errors: Vec<String>,
}

impl FillResult {
    /// An empty, not-yet-successful result.
    pub fn new() -> Self {
        FillResult {
            success: false,
            output_path: None,
            filled_fields: Vec::new(),
            failed_fields: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// A failed result carrying a single fatal error.
    pub fn failure(error: impl Into<String>) -> Self {
        let mut result = FillResult::new();
        result.errors.push(error.into());
        result
    }
}

impl Default for FillResult {
    fn default() -> Self {
        FillResult::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_normalizes_corners() {
        let r = Rect::new(120.0, 740.0, 100.0, 700.0);
        assert_eq!(r.x1, 100.0);
        assert_eq!(r.y1, 700.0);
        assert_eq!(r.width(), 20.0);
        assert_eq!(r.height(), 40.0);
    }

    #[test]
    fn test_flags_decode_readonly_required() {
        let mut field = Field::new("name", FieldType::Text);
        field.set_flags(0b11);
        assert!(field.is_readonly);
        assert!(field.is_required);

        field.set_flags(1 << 1);
        assert!(!field.is_readonly);
        assert!(field.is_required);
    }

    #[test]
    fn test_field_flags_keep_unknown_bits() {
        let raw = (1 << 15) | (1 << 30);
        let flags = FieldFlags::from_raw(raw);
        assert!(flags.contains(FieldFlags::RADIO));
        assert_eq!(flags.bits(), raw);
    }

    #[test]
    fn test_form_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&FormType::AcroFieldsOnly).unwrap(),
            "\"acroform\""
        );
        assert_eq!(
            serde_json::to_string(&FormType::XfaDynamic).unwrap(),
            "\"xfa_dynamic\""
        );
    }

    #[test]
    fn test_fill_value_deserializes_untagged() {
        let v: FillValue = serde_json::from_str("true").unwrap();
        assert_eq!(v, FillValue::Bool(true));
        let v: FillValue = serde_json::from_str("\"hello\"").unwrap();
        assert_eq!(v, FillValue::Text("hello".to_string()));
    }

    #[test]
    fn test_fill_options_defaults() {
        let opts: FillOptions = serde_json::from_str("{}").unwrap();
        assert!(opts.update_appearances);
        assert!(opts.set_need_appearances);
        assert_eq!(opts.save_mode, SaveMode::FullRewrite);
        assert!(!opts.flatten);
    }

    #[test]
    fn test_summary_shape() {
        let mut analysis = FormAnalysis::empty();
        analysis.fields.insert(
            "name".to_string(),
            Field::new("name", FieldType::Text),
        );
        let summary = analysis.summary();
        assert_eq!(summary["formType"], "none");
        assert_eq!(summary["fieldCount"], 1);
        assert_eq!(summary["fields"][0]["name"], "name");
    }
}

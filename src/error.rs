//! Error types for form analysis, filling, and flattening.
//!
//! Fatal errors (`Load`, `PermissionDenied`, `Serialization`) abort the whole
//! call. Per-field errors are collected into `FillResult::failed_fields` and
//! never abort the batch.

/// Result type alias for form engine operations.
pub type Result<T> = std::result::Result<T, FormError>;

/// Error types that can occur while analyzing or mutating a form document.
#[derive(Debug, thiserror::Error)]
pub enum FormError {
    /// Document could not be opened or parsed. Fatal.
    #[error("Failed to load PDF document: {0}")]
    Load(String),

    /// The document's protection settings forbid form filling. Fatal,
    /// checked before any mutation.
    #[error("PDF document does not permit form filling")]
    PermissionDenied,

    /// A requested field name does not exist in the document. Per-field.
    #[error("Field not found: {0}")]
    FieldNotFound(String),

    /// A requested field is marked read-only. Per-field.
    #[error("Field is read-only: {0}")]
    FieldReadonly(String),

    /// The supplied value cannot be converted to the field's canonical
    /// representation. Per-field.
    #[error("Cannot convert value for field '{field}': {reason}")]
    ValueConversion {
        /// Fully qualified field name
        field: String,
        /// Why the conversion failed
        reason: String,
    },

    /// An appearance stream could not be generated. Non-fatal; the raw
    /// value is still written and the appearance degrades.
    #[error("Appearance generation failed: {0}")]
    AppearanceRender(String),

    /// The output document could not be serialized. Fatal; any partially
    /// written output file must be discarded by the caller.
    #[error("Failed to write output PDF: {0}")]
    Serialization(String),

    /// The best-effort XFA packet rewrite failed. Warning only.
    #[error("XFA data sync unsupported for this document: {0}")]
    XfaSyncUnsupported(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FormError {
    /// Whether this error aborts the whole operation rather than a single
    /// field.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FormError::Load(_)
                | FormError::PermissionDenied
                | FormError::Serialization(_)
                | FormError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_message() {
        let err = FormError::Load("truncated xref".to_string());
        let msg = format!("{}", err);
        assert!(msg.contains("Failed to load"));
        assert!(msg.contains("truncated xref"));
    }

    #[test]
    fn test_value_conversion_message() {
        let err = FormError::ValueConversion {
            field: "consent".to_string(),
            reason: "expected a boolean".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("consent"));
        assert!(msg.contains("expected a boolean"));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(FormError::PermissionDenied.is_fatal());
        assert!(FormError::Serialization("disk full".into()).is_fatal());
        assert!(!FormError::FieldNotFound("x".into()).is_fatal());
        assert!(!FormError::XfaSyncUnsupported("bad xml".into()).is_fatal());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FormError>();
    }
}

//! # pdf_formfill
//!
//! A PDF form semantics engine: detect which form technology a document
//! carries, extract a unified field model, fill fields with canonical
//! value normalization, flatten interactivity, and decode document
//! permissions.
//!
//! Object-level PDF reading and writing is delegated to `lopdf`; this
//! crate owns everything form-shaped above it.
//!
//! ## Quick start
//!
//! ```no_run
//! use pdf_formfill::{FillOptions, FillValue, FormEngine};
//! use indexmap::IndexMap;
//!
//! # fn main() -> Result<(), pdf_formfill::FormError> {
//! let engine = FormEngine::new();
//!
//! let analysis = engine.analyze("form.pdf")?;
//! println!("{} fields ({:?})", analysis.field_count(), analysis.form_type);
//!
//! let mut values: IndexMap<String, FillValue> = IndexMap::new();
//! values.insert("name".to_string(), "张三".into());
//! values.insert("subscribe".to_string(), true.into());
//!
//! let result = engine.fill("form.pdf", "filled.pdf", &values, &FillOptions::default());
//! assert!(result.success);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod appearance;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod filler;
pub mod flatten;
pub mod fonts;
pub mod model;
pub mod objects;
pub mod permissions;
pub mod xfa;

pub use engine::{analyze_document, analyze_form, fill_form, flatten_form, FormEngine};
pub use error::{FormError, Result};
pub use fonts::FontResolver;
pub use model::{
    Field, FieldFlags, FieldType, FillOptions, FillResult, FillValue, FormAnalysis, FormType,
    Permissions, Rect, SaveMode,
};

//! Public engine API: analyze, fill, flatten, and permission checks.
//!
//! Each call loads its own document and produces its own output file; no
//! state is shared across documents except the engine's font resolver
//! cache. The API layer above is responsible for path lifecycle and for
//! bounding request size and duration.

use crate::error::{FormError, Result};
use crate::extractor::extract_fields;
use crate::filler::Filler;
use crate::fonts::FontResolver;
use crate::model::{
    FillOptions, FillResult, FillValue, FormAnalysis, FormType, Permissions, SaveMode,
};
use crate::permissions::{decode_permissions, is_encrypted};
use crate::xfa::{detect_xfa, is_dynamic_xfa};
use indexmap::IndexMap;
use lopdf::Document;
use std::path::Path;

/// The form semantics engine.
///
/// Construct once and share by reference; concurrent calls on different
/// input files are independent.
#[derive(Debug, Default)]
pub struct FormEngine {
    fonts: FontResolver,
}

impl FormEngine {
    /// Engine with the platform default font resolver.
    pub fn new() -> Self {
        FormEngine {
            fonts: FontResolver::new(),
        }
    }

    /// Engine with a custom font resolver (used by tests and embedders
    /// that preload fonts at startup).
    pub fn with_fonts(fonts: FontResolver) -> Self {
        FormEngine { fonts }
    }

    /// Analyze a document's form structure.
    pub fn analyze(&self, path: impl AsRef<Path>) -> Result<FormAnalysis> {
        let doc = load_document(path.as_ref())?;
        Ok(analyze_document(&doc))
    }

    /// Fill `values` into the document at `path`, writing the result to
    /// `output_path`.
    ///
    /// Never returns `Err`: fatal errors come back as `success = false`
    /// with the error text appended, and per-field problems land in
    /// `failed_fields` without aborting the batch.
    pub fn fill(
        &self,
        path: impl AsRef<Path>,
        output_path: impl AsRef<Path>,
        values: &IndexMap<String, FillValue>,
        options: &FillOptions,
    ) -> FillResult {
        match self.fill_inner(path.as_ref(), output_path.as_ref(), values, options) {
            Ok(result) => result,
            Err(err) => FillResult::failure(err.to_string()),
        }
    }

    /// Remove all interactivity from the document at `path`.
    pub fn flatten(&self, path: impl AsRef<Path>, output_path: impl AsRef<Path>) -> FillResult {
        let options = FillOptions {
            update_appearances: false,
            set_need_appearances: false,
            save_mode: SaveMode::FullRewrite,
            flatten: true,
        };
        self.fill(path, output_path, &IndexMap::new(), &options)
    }

    /// Decode the document's capability set.
    pub fn check_permissions(&self, path: impl AsRef<Path>) -> Result<Permissions> {
        let doc = load_document(path.as_ref())?;
        Ok(decode_permissions(&doc))
    }

    fn fill_inner(
        &self,
        path: &Path,
        output_path: &Path,
        values: &IndexMap<String, FillValue>,
        options: &FillOptions,
    ) -> Result<FillResult> {
        let mut doc = load_document(path)?;
        let analysis = analyze_document(&doc);

        let mut result = FillResult::new();
        result.warnings.extend(analysis.warnings.iter().cloned());

        let filler = Filler::new(&self.fonts);
        filler.fill_document(&mut doc, &analysis, values, options, &mut result)?;

        if options.save_mode == SaveMode::Incremental {
            log::debug!("incremental save requested; codec performs a full rewrite");
            result
                .warnings
                .push("Incremental save is not supported; output is a full rewrite".to_string());
        }

        doc.save(output_path)
            .map_err(|err| FormError::Serialization(err.to_string()))?;

        result.success = true;
        result.output_path = Some(output_path.to_path_buf());
        Ok(result)
    }
}

fn load_document(path: &Path) -> Result<Document> {
    Document::load(path).map_err(|err| FormError::Load(err.to_string()))
}

/// Run the full analysis pipeline over a loaded document: permissions,
/// XFA detection, field extraction, and form classification.
pub fn analyze_document(doc: &Document) -> FormAnalysis {
    let mut analysis = FormAnalysis::empty();

    analysis.is_encrypted = is_encrypted(doc);
    if analysis.is_encrypted {
        analysis
            .warnings
            .push("Document is encrypted; some operations may be restricted".to_string());
    }
    analysis.permissions = decode_permissions(doc);

    let xfa = detect_xfa(doc);
    analysis.has_xfa = xfa.has_xfa;
    analysis.xfa_data = xfa.data;

    analysis.fields = extract_fields(doc);

    analysis.form_type = match (analysis.has_xfa, !analysis.fields.is_empty()) {
        (true, true) => {
            analysis
                .warnings
                .push("Hybrid form detected (AcroForm + XFA); AcroForm takes priority".to_string());
            FormType::Hybrid
        }
        (true, false) => {
            let dynamic = analysis
                .xfa_data
                .as_deref()
                .map(is_dynamic_xfa)
                .unwrap_or(false);
            if dynamic {
                analysis
                    .warnings
                    .push("Dynamic XFA form detected; processing may be incomplete".to_string());
                FormType::XfaDynamic
            } else {
                FormType::XfaStatic
            }
        }
        (false, true) => FormType::AcroFieldsOnly,
        (false, false) => FormType::None,
    };

    analysis
}

/// Analyze a document by path.
pub fn analyze_form(path: impl AsRef<Path>) -> Result<FormAnalysis> {
    FormEngine::new().analyze(path)
}

/// Fill a document by path with default-constructed engine state.
pub fn fill_form(
    path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    values: &IndexMap<String, FillValue>,
    options: &FillOptions,
) -> FillResult {
    FormEngine::new().fill(path, output_path, values, options)
}

/// Flatten a document by path.
pub fn flatten_form(path: impl AsRef<Path>, output_path: impl AsRef<Path>) -> FillResult {
    FormEngine::new().flatten(path, output_path)
}

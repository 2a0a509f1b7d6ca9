//! CJK-capable font selection for appearance regeneration.
//!
//! The resolver walks a priority-ordered, platform-specific list of system
//! font files and registers the first hit under one logical name. With no
//! usable file it degrades to a viewer-provided CID font, and finally to a
//! base Latin font (missing glyphs render as boxes; accepted, not fatal).
//!
//! Resolution is cached after first use. The cache lives inside the
//! resolver instance owned by the engine, not in process-global state, and
//! is safe under concurrent first use.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Logical resource name system font files are registered under.
pub const LOGICAL_FONT_NAME: &str = "ChineseFont";

/// Viewer-provided CID font used when no system file exists.
pub const BUILTIN_CID_FONT: &str = "STSong-Light";

/// Last-resort base font.
pub const BASE_LATIN_FONT: &str = "Helvetica";

/// Candidate CJK font files, highest priority first.
const CANDIDATE_PATHS: [&str; 11] = [
    // macOS
    "/System/Library/Fonts/PingFang.ttc",
    "/System/Library/Fonts/STHeiti Light.ttc",
    "/Library/Fonts/Arial Unicode.ttf",
    "/System/Library/Fonts/Supplemental/Songti.ttc",
    // Linux
    "/usr/share/fonts/truetype/droid/DroidSansFallbackFull.ttf",
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/truetype/wqy/wqy-microhei.ttc",
    "/usr/share/fonts/truetype/arphic/uming.ttc",
    // Windows
    "C:/Windows/Fonts/msyh.ttc",
    "C:/Windows/Fonts/simsun.ttc",
    "C:/Windows/Fonts/simhei.ttf",
];

/// Which tier of the fallback chain produced the font.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontSource {
    /// A system font file from the candidate list
    SystemFile,
    /// The viewer-provided CID identity
    BuiltinCid,
    /// The base Latin fallback; CJK glyphs will degrade
    BaseLatin,
}

/// A resolved, registrable font identity.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFont {
    /// Logical name to reference from appearance streams
    pub name: String,
    /// Fallback tier that satisfied the request
    pub source: FontSource,
    /// File backing the font, for the system-file tier
    pub path: Option<PathBuf>,
}

impl ResolvedFont {
    /// Whether the font can be expected to cover CJK glyphs.
    pub fn covers_cjk(&self) -> bool {
        self.source != FontSource::BaseLatin
    }
}

/// Glyph-capable font resolver with a guarded one-shot cache.
#[derive(Debug)]
pub struct FontResolver {
    candidates: Vec<PathBuf>,
    builtin_enabled: bool,
    cache: OnceLock<ResolvedFont>,
}

impl Default for FontResolver {
    fn default() -> Self {
        FontResolver {
            candidates: CANDIDATE_PATHS.iter().map(PathBuf::from).collect(),
            builtin_enabled: true,
            cache: OnceLock::new(),
        }
    }
}

impl FontResolver {
    /// Resolver with the platform default candidate list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver with an explicit candidate list. `builtin_enabled` controls
    /// whether the CID tier is available before the Latin fallback.
    pub fn with_candidates(candidates: Vec<PathBuf>, builtin_enabled: bool) -> Self {
        FontResolver {
            candidates,
            builtin_enabled,
            cache: OnceLock::new(),
        }
    }

    /// Resolve a font, caching the first successful result for the life of
    /// the resolver. Concurrent first calls race benignly inside the
    /// `OnceLock`.
    pub fn resolve(&self) -> &ResolvedFont {
        self.cache.get_or_init(|| self.locate())
    }

    fn locate(&self) -> ResolvedFont {
        for candidate in &self.candidates {
            if Path::new(candidate).exists() {
                log::debug!("registered CJK font from {}", candidate.display());
                return ResolvedFont {
                    name: LOGICAL_FONT_NAME.to_string(),
                    source: FontSource::SystemFile,
                    path: Some(candidate.clone()),
                };
            }
        }

        if self.builtin_enabled {
            log::debug!("no system CJK font found; using builtin {}", BUILTIN_CID_FONT);
            return ResolvedFont {
                name: BUILTIN_CID_FONT.to_string(),
                source: FontSource::BuiltinCid,
                path: None,
            };
        }

        log::warn!("no CJK-capable font available; falling back to {}", BASE_LATIN_FONT);
        ResolvedFont {
            name: BASE_LATIN_FONT.to_string(),
            source: FontSource::BaseLatin,
            path: None,
        }
    }
}

/// Script-range test for glyphs outside the codec's built-in appearance
/// coverage: CJK Unified Ideographs, Extension A, and Extension B.
pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(|c| {
        matches!(c,
            '\u{4E00}'..='\u{9FFF}'
            | '\u{3400}'..='\u{4DBF}'
            | '\u{20000}'..='\u{2A6DF}')
    })
}

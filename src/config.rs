//! Configuration types for the round-trip pipeline.
//!
//! Every knob lives in [`RoundTripConfig`], built via its
//! [`RoundTripConfigBuilder`]. The defaults describe the document class the
//! tool was written for (a Ukrainian diploma thesis); callers targeting a
//! different document only override the title lists and captions.

use crate::error::RoundTripError;
use crate::pipeline::classify::{BlockClassifier, DIAGRAM_LINE_PERCENT, MIN_LISTING_LINES};
use crate::progress::ProgressCallback;
use std::fmt;

/// Caption used when no heading or bold title precedes a listing.
pub const DEFAULT_PLACEHOLDER_CAPTION: &str = "Фрагмент програмного коду";

/// Word placed before the listing number in rendered captions.
pub const DEFAULT_LISTING_PREFIX: &str = "Лістинг";

/// Source unit that holds the title page and table of contents.
pub const DEFAULT_TITLE_UNIT: &str = "titlepage.tex";

/// Directory (relative to the restored document) that receives assets.
pub const DEFAULT_ASSET_SUBDIR: &str = "images";

/// Configuration for preparing and restoring a project.
///
/// Built via [`RoundTripConfig::builder()`] or using
/// [`RoundTripConfig::default()`].
///
/// # Example
/// ```rust
/// use texround::RoundTripConfig;
///
/// let config = RoundTripConfig::builder()
///     .min_listing_lines(8)
///     .title_unit("cover.tex")
///     .build()
///     .unwrap();
/// assert_eq!(config.min_listing_lines, 8);
/// ```
#[derive(Clone)]
pub struct RoundTripConfig {
    /// Minimum number of non-blank lines for a `verbatim` block to become a
    /// numbered listing. Default: [`MIN_LISTING_LINES`].
    pub min_listing_lines: usize,

    /// Percentage of non-blank lines carrying box-drawing glyphs at which a
    /// block counts as a diagram. Default: [`DIAGRAM_LINE_PERCENT`].
    pub diagram_line_percent: u32,

    /// Caption used when no heading precedes a listing.
    pub placeholder_caption: String,

    /// Word preceding the listing number, e.g. "Лістинг 2.1".
    pub listing_prefix: String,

    /// Tag eligible `verbatim` blocks as listings while preparing. Default: true.
    ///
    /// When false only blocks already written as `lstlisting` get numbered.
    pub tag_listings: bool,

    /// File name of the title-page unit. Default: `titlepage.tex`.
    pub title_unit: String,

    /// Subsection titles promoted to `\section` after the round trip.
    pub promote_titles: Vec<String>,

    /// Section titles rewritten to `\section*` after the round trip.
    pub unnumbered_titles: Vec<String>,

    /// Headings the converter injects for its own table of contents.
    pub contents_titles: Vec<String>,

    /// File extensions (lower case, no dot) treated as binary assets.
    pub asset_extensions: Vec<String>,

    /// Subdirectory next to the restored document that receives assets.
    pub asset_subdir: String,

    /// Preamble prepended when the restored document has no
    /// `\documentclass`. If None, uses the built-in default.
    pub preamble: Option<String>,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for RoundTripConfig {
    fn default() -> Self {
        Self {
            min_listing_lines: MIN_LISTING_LINES,
            diagram_line_percent: DIAGRAM_LINE_PERCENT,
            placeholder_caption: DEFAULT_PLACEHOLDER_CAPTION.to_string(),
            listing_prefix: DEFAULT_LISTING_PREFIX.to_string(),
            tag_listings: true,
            title_unit: DEFAULT_TITLE_UNIT.to_string(),
            promote_titles: vec![
                "ПРАКТИЧНА ЧАСТИНА".to_string(),
                "ПРОГРАМНА РЕАЛІЗАЦІЯ".to_string(),
                "Опис експериментального стенду".to_string(),
            ],
            unnumbered_titles: vec![
                "ВСТУП".to_string(),
                "ВИСНОВКИ".to_string(),
                "СПИСОК ВИКОРИСТАНИХ ДЖЕРЕЛ".to_string(),
            ],
            contents_titles: vec!["Table of Contents".to_string()],
            asset_extensions: ["png", "jpg", "jpeg", "gif", "svg"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            asset_subdir: DEFAULT_ASSET_SUBDIR.to_string(),
            preamble: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for RoundTripConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoundTripConfig")
            .field("min_listing_lines", &self.min_listing_lines)
            .field("diagram_line_percent", &self.diagram_line_percent)
            .field("placeholder_caption", &self.placeholder_caption)
            .field("listing_prefix", &self.listing_prefix)
            .field("tag_listings", &self.tag_listings)
            .field("title_unit", &self.title_unit)
            .field("promote_titles", &self.promote_titles)
            .field("unnumbered_titles", &self.unnumbered_titles)
            .field("contents_titles", &self.contents_titles)
            .field("asset_extensions", &self.asset_extensions)
            .field("asset_subdir", &self.asset_subdir)
            .field("preamble", &self.preamble.as_ref().map(|p| p.len()))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ProgressObserver>"),
            )
            .finish()
    }
}

impl RoundTripConfig {
    /// Create a new builder for `RoundTripConfig`.
    pub fn builder() -> RoundTripConfigBuilder {
        RoundTripConfigBuilder {
            config: Self::default(),
        }
    }

    /// Block classifier carrying this config's thresholds.
    pub fn classifier(&self) -> BlockClassifier {
        BlockClassifier::new(self.min_listing_lines, self.diagram_line_percent)
    }

    /// True if `ext` (any case, without the dot) names an asset type.
    pub fn is_asset_extension(&self, ext: &str) -> bool {
        let ext = ext.to_lowercase();
        self.asset_extensions.iter().any(|e| *e == ext)
    }
}

/// Builder for [`RoundTripConfig`].
#[derive(Debug)]
pub struct RoundTripConfigBuilder {
    config: RoundTripConfig,
}

impl RoundTripConfigBuilder {
    pub fn min_listing_lines(mut self, n: usize) -> Self {
        self.config.min_listing_lines = n;
        self
    }

    pub fn diagram_line_percent(mut self, pct: u32) -> Self {
        self.config.diagram_line_percent = pct;
        self
    }

    pub fn placeholder_caption(mut self, caption: impl Into<String>) -> Self {
        self.config.placeholder_caption = caption.into();
        self
    }

    pub fn listing_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.listing_prefix = prefix.into();
        self
    }

    pub fn tag_listings(mut self, v: bool) -> Self {
        self.config.tag_listings = v;
        self
    }

    pub fn title_unit(mut self, name: impl Into<String>) -> Self {
        self.config.title_unit = name.into();
        self
    }

    pub fn promote_titles(mut self, titles: Vec<String>) -> Self {
        self.config.promote_titles = titles;
        self
    }

    pub fn unnumbered_titles(mut self, titles: Vec<String>) -> Self {
        self.config.unnumbered_titles = titles;
        self
    }

    pub fn contents_titles(mut self, titles: Vec<String>) -> Self {
        self.config.contents_titles = titles;
        self
    }

    pub fn asset_extensions(mut self, exts: Vec<String>) -> Self {
        self.config.asset_extensions = exts
            .into_iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    pub fn asset_subdir(mut self, dir: impl Into<String>) -> Self {
        self.config.asset_subdir = dir.into();
        self
    }

    pub fn preamble(mut self, preamble: impl Into<String>) -> Self {
        self.config.preamble = Some(preamble.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RoundTripConfig, RoundTripError> {
        let c = &self.config;
        if c.min_listing_lines == 0 {
            return Err(RoundTripError::InvalidConfig(
                "min_listing_lines must be ≥ 1".into(),
            ));
        }
        if c.diagram_line_percent > 100 {
            return Err(RoundTripError::InvalidConfig(format!(
                "diagram_line_percent must be 0–100, got {}",
                c.diagram_line_percent
            )));
        }
        if c.asset_subdir.trim().is_empty()
            || c.asset_subdir.contains("..")
            || c.asset_subdir.starts_with('/')
        {
            return Err(RoundTripError::InvalidConfig(format!(
                "asset_subdir must be a relative directory name, got '{}'",
                c.asset_subdir
            )));
        }
        if c.title_unit.trim().is_empty() {
            return Err(RoundTripError::InvalidConfig(
                "title_unit must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

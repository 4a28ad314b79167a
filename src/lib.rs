//! # texround
//!
//! Survive a LaTeX → DOCX → LaTeX round trip.
//!
//! ## Why this crate?
//!
//! Editors and reviewers want a DOCX; the thesis lives in LaTeX. Pandoc can
//! convert both ways, but the trip is lossy in predictable ways: labels fall
//! off captions, images come back as `media/rId9.png`, headings carry baked
//! numbers, display math turns into `\[…\]`, and code listings lose their
//! numbering. This crate owns the two asymmetric halves that make the trip
//! survivable: forward normalization before the converter runs, and reverse
//! restoration after it.
//!
//! ## Pipeline Overview
//!
//! ```text
//! sources/*.tex
//!  │
//!  ├─ 1. Normalize  figure placement, math scripts, duplicate labels, title page
//!  ├─ 2. Listings   tag code blocks, number them per chapter (2.1, 2.2, …)
//!  ├─ 3. Convert    pandoc → DOCX → pandoc (external)
//!  ├─ 4. Repair     nine ordered stages undoing converter artifacts
//!  ├─ 5. Anchors    re-attach \label{…} by caption text
//!  ├─ 6. Assets     map renamed images back to originals by SHA-256
//!  └─ 7. Preamble   make the result compile on its own
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use texround::{prepare_project, restore_file, RestoreOptions, RoundTripConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RoundTripConfig::default();
//!     let prepared = prepare_project(Path::new("src"), Path::new("build/prepared"), &config)?;
//!     eprintln!("{} listings numbered", prepared.total_listings());
//!
//!     // … run pandoc both ways …
//!
//!     let options = RestoreOptions {
//!         src_dir: Some("src".into()),
//!         media_dir: Some("build/media".into()),
//!         ..Default::default()
//!     };
//!     let report = restore_file(
//!         Path::new("build/converted.tex"),
//!         Path::new("out/thesis.tex"),
//!         &options,
//!         &config,
//!     )?;
//!     eprintln!("labels: {} restored, {} unresolved",
//!         report.labels_restored(), report.labels_unresolved());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `texround` binary (clap, anyhow, tracing-subscriber, indicatif, serde_json, tempfile) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! texround = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{RoundTripConfig, RoundTripConfigBuilder};
pub use convert::{
    annotate_project, build_caption_index, prepare_project, prepare_unit, restore_document,
    restore_file, round_trip, RestoreOptions,
};
pub use error::RoundTripError;
pub use output::{
    AnchorOutcome, AssetOutcome, PrepareReport, RestoreReport, RoundTripOutput, UnitReport,
};
pub use pipeline::anchors::{CaptionIndex, CaptionKey};
pub use pipeline::external::{DocumentConverter, PandocConverter};
pub use progress::{ProgressCallback, ProgressObserver};

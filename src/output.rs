//! Result types returned by the pipeline entry points.
//!
//! Reconciliation outcomes are enums rather than `Option`s so a caller can
//! count restored vs. unresolved items per category without special cases.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What happened to one Caption Index entry during restoration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnchorOutcome {
    /// `\label{label}` was appended after the first unlabelled caption.
    Restored { label: String, caption: String },
    /// The label already exists in the restored text; nothing was added.
    AlreadyPresent { label: String },
    /// No unlabelled `\caption{..}` with this exact text was found.
    Unresolved { label: String, caption: String },
    /// Equation anchors have no caption to match on.
    EquationSkipped { label: String },
}

impl AnchorOutcome {
    pub fn label(&self) -> &str {
        match self {
            AnchorOutcome::Restored { label, .. }
            | AnchorOutcome::AlreadyPresent { label }
            | AnchorOutcome::Unresolved { label, .. }
            | AnchorOutcome::EquationSkipped { label } => label,
        }
    }

    /// True when the label is present in the output after restoration.
    pub fn is_resolved(&self) -> bool {
        matches!(
            self,
            AnchorOutcome::Restored { .. } | AnchorOutcome::AlreadyPresent { .. }
        )
    }
}

/// What happened to one asset emitted by the reverse converter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AssetOutcome {
    /// Byte-identical to an original asset.
    Resolved {
        /// Path as written by the converter.
        generated: PathBuf,
        /// Original asset the content hash matched.
        original: PathBuf,
    },
    /// No original asset has the same content hash.
    Unresolved { generated: PathBuf, hash: String },
}

impl AssetOutcome {
    pub fn generated(&self) -> &PathBuf {
        match self {
            AssetOutcome::Resolved { generated, .. } | AssetOutcome::Unresolved { generated, .. } => {
                generated
            }
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, AssetOutcome::Resolved { .. })
    }

    /// File name of the original asset, when resolved.
    pub fn original_name(&self) -> Option<String> {
        match self {
            AssetOutcome::Resolved { original, .. } => original
                .file_name()
                .map(|n| n.to_string_lossy().into_owned()),
            AssetOutcome::Unresolved { .. } => None,
        }
    }
}

/// Per-unit record of the forward stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitReport {
    /// Path relative to the project root.
    pub path: String,
    /// Position in lexical path order.
    pub ordinal: usize,
    /// `verbatim` blocks tagged as listings.
    pub listings_tagged: usize,
    /// Listings rendered with a number.
    pub listings_numbered: usize,
    /// Duplicate `\label`s commented out.
    pub duplicate_labels: usize,
    /// Whether the written file differs from what was there before.
    pub written: bool,
}

/// Summary of [`crate::convert::prepare_project`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrepareReport {
    pub units: Vec<UnitReport>,
    /// Assets copied into the prepared directory.
    pub assets_staged: usize,
    /// Final listing count per chapter, e.g. `{2: 3}`.
    pub listings_per_chapter: std::collections::BTreeMap<u32, u32>,
}

impl PrepareReport {
    pub fn total_listings(&self) -> usize {
        self.units.iter().map(|u| u.listings_numbered).sum()
    }
}

/// Summary of [`crate::convert::restore_file`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RestoreReport {
    /// Repair stages that changed the text, in pipeline order.
    pub stages_applied: Vec<String>,
    pub anchors: Vec<AnchorOutcome>,
    pub assets: Vec<AssetOutcome>,
    /// Original assets copied into the output asset directory.
    pub assets_copied: usize,
    pub preamble_added: bool,
    /// Whether the output file was (re)written.
    pub written: bool,
}

impl RestoreReport {
    pub fn labels_restored(&self) -> usize {
        self.anchors
            .iter()
            .filter(|a| matches!(a, AnchorOutcome::Restored { .. }))
            .count()
    }

    pub fn labels_unresolved(&self) -> usize {
        self.anchors
            .iter()
            .filter(|a| matches!(a, AnchorOutcome::Unresolved { .. }))
            .count()
    }

    pub fn equations_skipped(&self) -> usize {
        self.anchors
            .iter()
            .filter(|a| matches!(a, AnchorOutcome::EquationSkipped { .. }))
            .count()
    }

    pub fn images_mapped(&self) -> usize {
        self.assets.iter().filter(|a| a.is_resolved()).count()
    }

    pub fn images_unresolved(&self) -> usize {
        self.assets.iter().filter(|a| !a.is_resolved()).count()
    }

    /// Restored items across both categories.
    pub fn total_resolved(&self) -> usize {
        self.anchors.iter().filter(|a| a.is_resolved()).count() + self.images_mapped()
    }

    /// Items left in their unrestored form across both categories.
    pub fn total_unresolved(&self) -> usize {
        self.labels_unresolved() + self.equations_skipped() + self.images_unresolved()
    }
}

/// Result of a full [`crate::convert::round_trip`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundTripOutput {
    pub prepare: PrepareReport,
    pub restore: RestoreReport,
    /// Intermediate document produced by the forward converter.
    pub intermediate: PathBuf,
    /// Final restored document.
    pub output: PathBuf,
}

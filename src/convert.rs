//! Round-trip entry points.
//!
//! The forward half ([`prepare_project`]) normalizes every source unit and
//! writes a converter-ready copy of the project. The reverse half
//! ([`restore_file`], or the pure [`restore_document`]) repairs the
//! converter's LaTeX and re-attaches what the intermediate format lost.
//! [`round_trip`] runs both halves around a [`DocumentConverter`].

use crate::config::RoundTripConfig;
use crate::error::RoundTripError;
use crate::output::{
    AssetOutcome, PrepareReport, RestoreReport, RoundTripOutput, UnitReport,
};
use crate::pipeline::anchors::{restore_anchors, CaptionIndex};
use crate::pipeline::assets::{copy_resolved, rewrite_references, AssetIndex};
use crate::pipeline::external::DocumentConverter;
use crate::pipeline::input::{
    collect_files, enumerate_units, read_text, write_if_changed, SourceUnit,
};
use crate::pipeline::listings::{render_listings, tag_listings, ListingCounter};
use crate::pipeline::normalize::normalize_unit;
use crate::pipeline::preamble::ensure_preamble;
use crate::pipeline::repair::repair_document;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// ── Forward ──────────────────────────────────────────────────────────────────

/// A unit after the forward stage, before it is written.
#[derive(Debug, Clone)]
pub struct PreparedUnit {
    pub text: String,
    pub report: UnitReport,
}

/// Normalize, tag and number one unit.
///
/// `counter` carries listing numbers across units; callers must feed units
/// in lexical path order.
pub fn prepare_unit(
    unit: &SourceUnit,
    counter: &mut ListingCounter,
    config: &RoundTripConfig,
) -> Result<PreparedUnit, RoundTripError> {
    let normalized = normalize_unit(&unit.path, &unit.text, config);

    let (tagged_text, listings_tagged) = if config.tag_listings {
        let tagged = tag_listings(&unit.path, &normalized.text, config)?;
        (tagged.text, tagged.tagged)
    } else {
        (normalized.text, 0)
    };

    let rendered = render_listings(&unit.path, &tagged_text, counter, config)?;

    Ok(PreparedUnit {
        text: rendered.text,
        report: UnitReport {
            path: unit.path.clone(),
            ordinal: unit.ordinal,
            listings_tagged,
            listings_numbered: rendered.numbers.len(),
            duplicate_labels: normalized.duplicate_labels,
            written: false,
        },
    })
}

/// Write a converter-ready copy of the project at `src_dir` into `out_dir`.
///
/// Every `.tex` unit goes through [`prepare_unit`] in lexical path order with
/// one shared [`ListingCounter`]; asset files are copied alongside so the
/// converter can embed them.
///
/// # Errors
/// Fails on a missing source directory, an `out_dir` inside `src_dir`,
/// unreadable or malformed units (unbalanced `verbatim` / `lstlisting`), and
/// write failures.
pub fn prepare_project(
    src_dir: &Path,
    out_dir: &Path,
    config: &RoundTripConfig,
) -> Result<PrepareReport, RoundTripError> {
    info!("Preparing {} → {}", src_dir.display(), out_dir.display());
    let units = enumerate_units(src_dir)?;
    ensure_outside(src_dir, out_dir)?;
    let total = units.len();

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total);
    }

    let mut counter = ListingCounter::new();
    let mut reports = Vec::with_capacity(total);

    for unit in &units {
        let PreparedUnit { text, mut report } = prepare_unit(unit, &mut counter, config)?;
        report.written = write_if_changed(&out_dir.join(&unit.path), text.as_bytes())?;
        debug!(
            "{}: {} tagged, {} numbered, {} duplicate labels",
            unit.path, report.listings_tagged, report.listings_numbered, report.duplicate_labels
        );
        if let Some(ref cb) = config.progress_callback {
            cb.on_unit_complete(unit.ordinal, total, &unit.path, report.listings_numbered);
        }
        reports.push(report);
    }

    let assets_staged = stage_assets(src_dir, out_dir, config)?;

    let report = PrepareReport {
        units: reports,
        assets_staged,
        listings_per_chapter: counter.counts().clone(),
    };
    info!(
        "Prepared {} units, {} listings, {} assets staged",
        report.units.len(),
        report.total_listings(),
        report.assets_staged
    );
    Ok(report)
}

/// Refuse an `out_dir` equal to or below `src_dir`: a rerun would read the
/// previous output back as source units.
fn ensure_outside(src_dir: &Path, out_dir: &Path) -> Result<(), RoundTripError> {
    let src = src_dir
        .canonicalize()
        .map_err(|source| RoundTripError::ReadFailed {
            path: src_dir.to_path_buf(),
            source,
        })?;
    if resolve_through_ancestors(out_dir).starts_with(&src) {
        return Err(RoundTripError::OutputInsideSource {
            out_dir: out_dir.to_path_buf(),
            src_dir: src_dir.to_path_buf(),
        });
    }
    Ok(())
}

/// `path` with its longest existing prefix canonicalized; the missing tail
/// is appended as given.
fn resolve_through_ancestors(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut missing = Vec::new();
    loop {
        if let Ok(real) = existing.canonicalize() {
            return missing.iter().rev().fold(real, |acc, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = if parent.as_os_str().is_empty() {
                    Path::new(".")
                } else {
                    parent
                };
            }
            _ => return path.to_path_buf(),
        }
    }
}

/// Copy asset files (by extension) from `src_dir` into `out_dir`, keeping
/// their relative paths. Returns the number of files written.
fn stage_assets(
    src_dir: &Path,
    out_dir: &Path,
    config: &RoundTripConfig,
) -> Result<usize, RoundTripError> {
    let mut files = Vec::new();
    let mut is_asset = |p: &Path| {
        p.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| config.is_asset_extension(e))
    };
    collect_files(src_dir, &mut is_asset, &mut files)?;

    let mut staged = 0;
    for path in files {
        let rel = path.strip_prefix(src_dir).unwrap_or(&path);
        let bytes = std::fs::read(&path).map_err(|source| RoundTripError::ReadFailed {
            path: path.clone(),
            source,
        })?;
        if write_if_changed(&out_dir.join(rel), &bytes)? {
            staged += 1;
        }
    }
    Ok(staged)
}

/// Tag eligible `verbatim` blocks as captioned listings in the sources
/// themselves.
///
/// Only units whose text changes are rewritten.
pub fn annotate_project(
    src_dir: &Path,
    config: &RoundTripConfig,
) -> Result<Vec<UnitReport>, RoundTripError> {
    let units = enumerate_units(src_dir)?;
    let total = units.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total);
    }

    let mut reports = Vec::with_capacity(total);
    for unit in &units {
        let tagged = tag_listings(&unit.path, &unit.text, config)?;
        let written = tagged.tagged > 0
            && write_if_changed(&src_dir.join(&unit.path), tagged.text.as_bytes())?;
        if written {
            info!("{}: tagged {} listings", unit.path, tagged.tagged);
        }
        if let Some(ref cb) = config.progress_callback {
            cb.on_unit_complete(unit.ordinal, total, &unit.path, tagged.tagged);
        }
        reports.push(UnitReport {
            path: unit.path.clone(),
            ordinal: unit.ordinal,
            listings_tagged: tagged.tagged,
            listings_numbered: 0,
            duplicate_labels: 0,
            written,
        });
    }
    Ok(reports)
}

// ── Reverse ──────────────────────────────────────────────────────────────────

/// Caption index over every unit of the original project.
pub fn build_caption_index(src_dir: &Path) -> Result<CaptionIndex, RoundTripError> {
    let units = enumerate_units(src_dir)?;
    let index = CaptionIndex::from_units(&units);
    info!("Indexed {} anchors from {} units", index.len(), units.len());
    Ok(index)
}

/// Repair converter output and restore anchors, asset references and the
/// preamble. Pure: no file system access.
///
/// `assets` are the outcomes of [`AssetIndex::resolve`]; only resolved ones
/// rewrite references.
pub fn restore_document(
    text: &str,
    index: &CaptionIndex,
    assets: &[AssetOutcome],
    config: &RoundTripConfig,
) -> (String, RestoreReport) {
    let repaired = repair_document(text, config);
    let (anchored, anchors) = restore_anchors(&repaired.text, index);
    let rewritten = rewrite_references(&anchored, assets, &config.asset_subdir);
    let (restored, preamble_added) = ensure_preamble(&rewritten, config.preamble.as_deref());

    let report = RestoreReport {
        stages_applied: repaired
            .stages_applied
            .iter()
            .map(|s| s.to_string())
            .collect(),
        anchors,
        assets: assets.to_vec(),
        assets_copied: 0,
        preamble_added,
        written: false,
    };
    (restored, report)
}

/// Where [`restore_file`] finds the original project and extracted media.
#[derive(Debug, Clone, Default)]
pub struct RestoreOptions {
    /// Original sources; enables anchor restoration.
    pub src_dir: Option<PathBuf>,
    /// Original assets. Defaults to `src_dir`.
    pub asset_dir: Option<PathBuf>,
    /// Media extracted by the reverse converter; enables asset mapping.
    pub media_dir: Option<PathBuf>,
}

/// Restore the converter output at `input` into `output`.
///
/// Resolved assets are copied into `<output dir>/<asset_subdir>/`.
pub fn restore_file(
    input: &Path,
    output: &Path,
    options: &RestoreOptions,
    config: &RoundTripConfig,
) -> Result<RestoreReport, RoundTripError> {
    info!("Restoring {} → {}", input.display(), output.display());
    let text = read_text(input)?;

    let stage = |name: &str| {
        if let Some(ref cb) = config.progress_callback {
            cb.on_stage(name);
        }
    };

    stage("index");
    let index = match &options.src_dir {
        Some(dir) => build_caption_index(dir)?,
        None => {
            warn!("No source directory given; skipping label restoration");
            CaptionIndex::new()
        }
    };

    stage("assets");
    let asset_dir = options.asset_dir.as_ref().or(options.src_dir.as_ref());
    let assets = match (asset_dir, &options.media_dir) {
        (Some(originals), Some(media)) => AssetIndex::build(originals, config)?.resolve(media)?,
        _ => {
            warn!("No asset or media directory given; skipping image mapping");
            Vec::new()
        }
    };

    stage("repair");
    let (restored, mut report) = restore_document(&text, &index, &assets, config);

    stage("write");
    report.written = write_if_changed(output, restored.as_bytes())?;
    let output_dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    report.assets_copied = copy_resolved(&report.assets, output_dir, &config.asset_subdir)?;

    info!(
        "Restored {} labels ({} unresolved), mapped {} images ({} unresolved)",
        report.labels_restored(),
        report.labels_unresolved(),
        report.images_mapped(),
        report.images_unresolved()
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(report.total_resolved(), report.total_unresolved());
    }
    Ok(report)
}

// ── Both halves ──────────────────────────────────────────────────────────────

/// Prepare `src_dir`, convert `main_unit` to DOCX and back, and restore the
/// result into `output`. Intermediate files live under `work_dir`.
///
/// # Errors
/// Any forward error, and any converter failure: the run aborts and no
/// output is written.
pub fn round_trip(
    src_dir: &Path,
    main_unit: &str,
    work_dir: &Path,
    output: &Path,
    converter: &dyn DocumentConverter,
    config: &RoundTripConfig,
) -> Result<RoundTripOutput, RoundTripError> {
    let prepared_dir = work_dir.join("prepared");
    let prepare = prepare_project(src_dir, &prepared_dir, config)?;

    let main = prepared_dir.join(main_unit);
    if !main.is_file() {
        return Err(RoundTripError::InvalidConfig(format!(
            "main unit '{main_unit}' not found in {}",
            src_dir.display()
        )));
    }

    let intermediate = work_dir.join("intermediate.docx");
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage("to-docx");
    }
    converter.to_intermediate(&main, &prepared_dir, &intermediate)?;

    let raw = work_dir.join("converted.tex");
    let media = work_dir.join("media");
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage("to-latex");
    }
    converter.to_markup(&intermediate, &raw, &media)?;

    let options = RestoreOptions {
        src_dir: Some(src_dir.to_path_buf()),
        asset_dir: None,
        media_dir: Some(media),
    };
    let restore = restore_file(&raw, output, &options, config)?;

    Ok(RoundTripOutput {
        prepare,
        restore,
        intermediate,
        output: output.to_path_buf(),
    })
}

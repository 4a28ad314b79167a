//! Error types for the texround library.
//!
//! Two kinds of failure exist in a round trip:
//!
//! * [`RoundTripError`] - **Fatal**: the run cannot continue (missing source
//!   directory, malformed unit, converter crashed). Returned as
//!   `Err(RoundTripError)` from the entry points in [`crate::convert`].
//!
//! * Soft degradation - a caption with no restoration target, an image with
//!   no byte-identical original. These are not errors at all: they are
//!   recorded as [`crate::output::AnchorOutcome`] and
//!   [`crate::output::AssetOutcome`] values and counted in the reports, and
//!   the artifact stays in the text in its unrestored form.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the texround library.
#[derive(Debug, Error)]
pub enum RoundTripError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The project source directory does not exist.
    #[error("Source directory not found: '{path}'")]
    SourceDirNotFound { path: PathBuf },

    /// A file could not be read.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A source unit is not valid UTF-8.
    #[error("'{path}' is not valid UTF-8 text")]
    NotUtf8 { path: PathBuf },

    /// A literal block was opened but never closed (or closed twice).
    #[error(
        "Unbalanced \\begin{{{environment}}}/\\end{{{environment}}} in '{unit}': \
         {opened} opened, {closed} closed"
    )]
    UnbalancedBlock {
        unit: String,
        environment: String,
        opened: usize,
        closed: usize,
    },

    // ── Converter errors ──────────────────────────────────────────────────
    /// The external converter binary could not be located.
    #[error("Converter '{tool}' not found.\nInstall it or set TEXROUND_PANDOC=/path/to/{tool}.")]
    ConverterNotFound { tool: String },

    /// The external converter ran but exited unsuccessfully.
    #[error("Converter '{tool}' failed ({status}) while producing '{output}':\n{stderr}")]
    ConverterFailed {
        tool: String,
        status: String,
        output: PathBuf,
        stderr: String,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The output directory is the source directory or lies inside it.
    #[error("Output directory '{out_dir}' must not be inside source directory '{src_dir}'")]
    OutputInsideSource { out_dir: PathBuf, src_dir: PathBuf },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbalanced_block_display() {
        let e = RoundTripError::UnbalancedBlock {
            unit: "sections/ch2.tex".into(),
            environment: "verbatim".into(),
            opened: 3,
            closed: 2,
        };
        let msg = e.to_string();
        assert!(msg.contains("\\begin{verbatim}"), "got: {msg}");
        assert!(msg.contains("sections/ch2.tex"));
        assert!(msg.contains("3 opened, 2 closed"));
    }

    #[test]
    fn converter_failed_display() {
        let e = RoundTripError::ConverterFailed {
            tool: "pandoc".into(),
            status: "exit status: 64".into(),
            output: PathBuf::from("build/thesis.docx"),
            stderr: "Unknown option --bogus".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("pandoc"));
        assert!(msg.contains("Unknown option"));
    }

    #[test]
    fn nested_output_names_both_dirs() {
        let e = RoundTripError::OutputInsideSource {
            out_dir: PathBuf::from("thesis/build"),
            src_dir: PathBuf::from("thesis"),
        };
        let msg = e.to_string();
        assert!(msg.contains("'thesis/build'"), "got: {msg}");
        assert!(msg.contains("'thesis'"));
    }

    #[test]
    fn converter_not_found_hint() {
        let e = RoundTripError::ConverterNotFound {
            tool: "pandoc".into(),
        };
        assert!(e.to_string().contains("TEXROUND_PANDOC"));
    }
}

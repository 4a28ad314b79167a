//! Project input and output: enumerate source units, read them, write results.
//!
//! Units are sorted by their path relative to the project root. The listing
//! counter accumulates across units, so this order decides every listing
//! number and must not depend on directory iteration order.
//!
//! Writes go through [`write_if_changed`]: a destination that already holds
//! the right bytes is left alone, otherwise the new content is written to a
//! temp file and renamed into place so a crash never leaves a partial file.

use crate::error::RoundTripError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extension of markup source units.
pub const UNIT_EXTENSION: &str = "tex";

/// One markup source file of the project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    /// Path relative to the project root, `/`-separated.
    pub path: String,
    pub text: String,
    /// Position in lexical path order.
    pub ordinal: usize,
}

impl SourceUnit {
    /// File name without directories (`sections/ch1.tex` → `ch1.tex`).
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Read every `.tex` file under `root`, recursively, in lexical path order.
pub fn enumerate_units(root: &Path) -> Result<Vec<SourceUnit>, RoundTripError> {
    if !root.is_dir() {
        return Err(RoundTripError::SourceDirNotFound {
            path: root.to_path_buf(),
        });
    }

    let mut files = Vec::new();
    let mut is_unit = |p: &Path| p.extension().is_some_and(|e| e == UNIT_EXTENSION);
    collect_files(root, &mut is_unit, &mut files)?;

    let mut rel: Vec<(String, PathBuf)> = files
        .into_iter()
        .map(|abs| (relative_slash_path(root, &abs), abs))
        .collect();
    rel.sort_by(|a, b| a.0.cmp(&b.0));

    let units = rel
        .into_iter()
        .enumerate()
        .map(|(ordinal, (path, abs))| {
            let text = read_text(&abs)?;
            debug!("Unit {ordinal}: {path} ({} bytes)", text.len());
            Ok(SourceUnit {
                path,
                text,
                ordinal,
            })
        })
        .collect::<Result<Vec<_>, RoundTripError>>()?;

    Ok(units)
}

/// Recursively collect regular files under `dir` accepted by `keep`, sorted.
pub fn collect_files(
    dir: &Path,
    keep: &mut dyn FnMut(&Path) -> bool,
    out: &mut Vec<PathBuf>,
) -> Result<(), RoundTripError> {
    let read_err = |source| RoundTripError::ReadFailed {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(read_err)?
        .map(|e| e.map(|e| e.path()))
        .collect::<Result<_, _>>()
        .map_err(read_err)?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            collect_files(&path, keep, out)?;
        } else if path.is_file() && keep(&path) {
            out.push(path);
        }
    }
    Ok(())
}

fn relative_slash_path(root: &Path, abs: &Path) -> String {
    let rel = abs.strip_prefix(root).unwrap_or(abs);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Read a UTF-8 text file.
pub fn read_text(path: &Path) -> Result<String, RoundTripError> {
    let bytes = fs::read(path).map_err(|source| RoundTripError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    String::from_utf8(bytes).map_err(|_| RoundTripError::NotUtf8 {
        path: path.to_path_buf(),
    })
}

/// Write `contents` to `path` unless it already holds exactly those bytes.
///
/// Returns `true` if the file was written.
pub fn write_if_changed(path: &Path, contents: &[u8]) -> Result<bool, RoundTripError> {
    if fs::read(path).is_ok_and(|existing| existing == contents) {
        debug!("Unchanged: {}", path.display());
        return Ok(false);
    }

    let write_err = |source| RoundTripError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    fs::write(&tmp_path, contents).map_err(write_err)?;
    fs::rename(&tmp_path, path).map_err(write_err)?;

    debug!("Wrote {} ({} bytes)", path.display(), contents.len());
    Ok(true)
}

//! Content identity: map converter-renamed assets back to the originals.
//!
//! The reverse converter extracts every embedded image under an opaque name
//! (`media/rId9.png`). Names carry no information, so identity is decided
//! by content: an extracted file resolves to the original asset with the same
//! SHA-256 digest, and to nothing otherwise.

use crate::config::RoundTripConfig;
use crate::error::RoundTripError;
use crate::output::AssetOutcome;
use crate::pipeline::input::collect_files;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Hex-encoded SHA-256 digest of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Digest of a file's bytes.
pub fn hash_file(path: &Path) -> Result<String, RoundTripError> {
    let bytes = fs::read(path).map_err(|source| RoundTripError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(sha256_hex(&bytes))
}

/// Content hash → original asset path.
#[derive(Debug, Clone, Default)]
pub struct AssetIndex {
    by_hash: BTreeMap<String, PathBuf>,
}

impl AssetIndex {
    /// Hash every asset directly inside `dir`.
    ///
    /// Byte-identical originals collapse onto the lexically first name.
    pub fn build(dir: &Path, config: &RoundTripConfig) -> Result<Self, RoundTripError> {
        let mut by_hash = BTreeMap::new();
        if !dir.is_dir() {
            warn!("Asset directory '{}' does not exist", dir.display());
            return Ok(Self { by_hash });
        }

        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(|source| RoundTripError::ReadFailed {
                path: dir.to_path_buf(),
                source,
            })?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_asset(p, config))
            .collect();
        files.sort();

        for path in files {
            let hash = hash_file(&path)?;
            by_hash.entry(hash).or_insert(path);
        }
        debug!("Indexed {} original assets in {}", by_hash.len(), dir.display());
        Ok(Self { by_hash })
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    /// Original asset with this content hash.
    pub fn original_for(&self, hash: &str) -> Option<&Path> {
        self.by_hash.get(hash).map(PathBuf::as_path)
    }

    /// One outcome per file under `media_dir`, recursively, in path order.
    pub fn resolve(&self, media_dir: &Path) -> Result<Vec<AssetOutcome>, RoundTripError> {
        if !media_dir.is_dir() {
            debug!("No media directory at {}", media_dir.display());
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        collect_files(media_dir, &mut |_| true, &mut files)?;

        files
            .into_iter()
            .map(|generated| {
                let hash = hash_file(&generated)?;
                Ok(match self.original_for(&hash) {
                    Some(original) => {
                        debug!("{} → {}", generated.display(), original.display());
                        AssetOutcome::Resolved {
                            generated,
                            original: original.to_path_buf(),
                        }
                    }
                    None => {
                        warn!("No original asset matches {}", generated.display());
                        AssetOutcome::Unresolved { generated, hash }
                    }
                })
            })
            .collect()
    }
}

fn is_asset(path: &Path, config: &RoundTripConfig) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| config.is_asset_extension(e))
}

/// Reference forms the converter may have written for `generated`, longest
/// first: the full path, `grandparent/parent/file`, `parent/file`, `file`.
fn reference_variants(generated: &Path) -> Vec<String> {
    let full = generated.to_string_lossy().replace('\\', "/");
    let parts: Vec<&str> = full.split('/').filter(|p| !p.is_empty()).collect();
    let mut variants = vec![full.clone()];
    for keep in [3, 2, 1] {
        if parts.len() >= keep {
            let v = parts[parts.len() - keep..].join("/");
            if !variants.contains(&v) {
                variants.push(v);
            }
        }
    }
    variants
}

/// Point resolved asset references at `<subdir>/<original name>`.
///
/// For each resolved asset the first reference variant found in the text is
/// replaced everywhere. Unresolved assets keep their generated reference.
pub fn rewrite_references(text: &str, outcomes: &[AssetOutcome], subdir: &str) -> String {
    let mut out = text.to_string();
    for outcome in outcomes {
        let Some(name) = outcome.original_name() else {
            continue;
        };
        let target = format!("{subdir}/{name}");
        if let Some(variant) = reference_variants(outcome.generated())
            .into_iter()
            .find(|v| out.contains(v.as_str()))
        {
            out = out.replace(&variant, &target);
        }
    }
    out
}

/// Copy every resolved original into `<output_dir>/<subdir>/`.
///
/// An existing file of the same name is left alone. Returns the number of
/// files copied.
pub fn copy_resolved(
    outcomes: &[AssetOutcome],
    output_dir: &Path,
    subdir: &str,
) -> Result<usize, RoundTripError> {
    let dest_dir = output_dir.join(subdir);
    let mut copied = 0;
    for outcome in outcomes {
        let AssetOutcome::Resolved { original, .. } = outcome else {
            continue;
        };
        let Some(name) = original.file_name() else {
            continue;
        };
        let dest = dest_dir.join(name);
        if dest.exists() {
            continue;
        }
        let write_err = |source| RoundTripError::OutputWriteFailed {
            path: dest.clone(),
            source,
        };
        fs::create_dir_all(&dest_dir).map_err(write_err)?;
        fs::copy(original, &dest).map_err(write_err)?;
        copied += 1;
    }
    if copied > 0 {
        info!("Copied {copied} assets into {}", dest_dir.display());
    }
    Ok(copied)
}

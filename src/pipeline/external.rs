//! External converter seam: LaTeX → DOCX and DOCX → LaTeX.
//!
//! The converters are black boxes run as blocking child processes. A
//! non-zero exit aborts the run with the captured stderr; nothing is
//! retried. [`PandocConverter`] is the only implementation shipped; tests and
//! embedders can provide their own [`DocumentConverter`].

use crate::error::RoundTripError;
use std::env;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};
use which::which;

/// Environment variable overriding the pandoc binary.
pub const PANDOC_ENV: &str = "TEXROUND_PANDOC";

/// Drives the two conversion directions of a round trip.
pub trait DocumentConverter {
    /// Tool name used in logs and errors.
    fn name(&self) -> &str;

    /// Convert `main` (a unit inside `work_dir`) into `out_docx`.
    fn to_intermediate(
        &self,
        main: &Path,
        work_dir: &Path,
        out_docx: &Path,
    ) -> Result<(), RoundTripError>;

    /// Convert `docx` back into `out_tex`, extracting images under `media_dir`.
    fn to_markup(&self, docx: &Path, out_tex: &Path, media_dir: &Path)
        -> Result<(), RoundTripError>;
}

/// Locate pandoc: `$TEXROUND_PANDOC` first, then `PATH`.
pub fn resolve_pandoc_binary() -> Result<PathBuf, RoundTripError> {
    if let Some(path) = env::var_os(PANDOC_ENV) {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    which("pandoc").map_err(|_| RoundTripError::ConverterNotFound {
        tool: "pandoc".into(),
    })
}

/// [`DocumentConverter`] backed by the `pandoc` CLI.
#[derive(Debug, Clone)]
pub struct PandocConverter {
    binary: PathBuf,
    reference_doc: Option<PathBuf>,
}

impl PandocConverter {
    /// Use the pandoc found by [`resolve_pandoc_binary`].
    pub fn locate() -> Result<Self, RoundTripError> {
        Ok(Self::with_binary(resolve_pandoc_binary()?))
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            reference_doc: None,
        }
    }

    /// Style template forwarded as `--reference-doc` on the forward pass.
    pub fn reference_doc(mut self, path: Option<PathBuf>) -> Self {
        self.reference_doc = path;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn run(&self, args: Vec<OsString>, cwd: &Path, output: &Path) -> Result<(), RoundTripError> {
        debug!("{} {:?} (in {})", self.binary.display(), args, cwd.display());
        let result = Command::new(&self.binary)
            .args(&args)
            .current_dir(cwd)
            .output()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => RoundTripError::ConverterNotFound {
                    tool: self.binary.display().to_string(),
                },
                _ => RoundTripError::ConverterFailed {
                    tool: self.name().to_string(),
                    status: "could not start".into(),
                    output: output.to_path_buf(),
                    stderr: e.to_string(),
                },
            })?;

        if !result.status.success() {
            return Err(RoundTripError::ConverterFailed {
                tool: self.name().to_string(),
                status: result.status.to_string(),
                output: output.to_path_buf(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        info!("{} wrote {}", self.name(), output.display());
        Ok(())
    }
}

impl DocumentConverter for PandocConverter {
    fn name(&self) -> &str {
        "pandoc"
    }

    fn to_intermediate(
        &self,
        main: &Path,
        work_dir: &Path,
        out_docx: &Path,
    ) -> Result<(), RoundTripError> {
        let mut args: Vec<OsString> = vec![
            main.as_os_str().to_owned(),
            "--from=latex".into(),
            "--to=docx".into(),
            "-o".into(),
            out_docx.as_os_str().to_owned(),
        ];
        let mut resource = OsString::from("--resource-path=");
        resource.push(work_dir.as_os_str());
        args.push(resource);
        if let Some(reference) = &self.reference_doc {
            let mut arg = OsString::from("--reference-doc=");
            arg.push(reference.as_os_str());
            args.push(arg);
        }
        self.run(args, work_dir, out_docx)
    }

    fn to_markup(
        &self,
        docx: &Path,
        out_tex: &Path,
        media_dir: &Path,
    ) -> Result<(), RoundTripError> {
        let mut media = OsString::from("--extract-media=");
        media.push(media_dir.as_os_str());
        let args: Vec<OsString> = vec![
            docx.as_os_str().to_owned(),
            "--from=docx".into(),
            "--to=latex".into(),
            "-o".into(),
            out_tex.as_os_str().to_owned(),
            media,
        ];
        let cwd = out_tex
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        self.run(args, cwd, out_tex)
    }
}

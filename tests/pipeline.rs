//! File-system integration tests for the forward and reverse halves.
//!
//! Every test builds a small project in a temporary directory; no external
//! converter is needed. The pandoc round trip lives in `tests/e2e.rs`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use texround::{
    annotate_project, build_caption_index, prepare_project, restore_file, round_trip, CaptionKey,
    DocumentConverter, ProgressObserver, RestoreOptions, RoundTripConfig, RoundTripError,
};

// ── Test helpers ─────────────────────────────────────────────────────────────

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nstand-diagram";

fn code_block(lines: usize) -> String {
    let body: String = (0..lines).map(|i| format!("let x{i} = {i};\n")).collect();
    format!("\\begin{{verbatim}}\n{body}\\end{{verbatim}}\n")
}

fn write(path: &Path, text: impl AsRef<[u8]>) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, text).unwrap();
}

/// A three-unit project: title page, two chapters, one image.
fn sample_project(root: &Path) -> PathBuf {
    let src = root.join("src");
    write(
        &src.join("titlepage.tex"),
        "\\begin{titlepage}\nМіністерство\n\\end{titlepage}\nКиїв 2024\n\\tableofcontents\n\\newpage\n",
    );
    write(
        &src.join("chapters/ch1.tex"),
        format!(
            "\\section{{1. Огляд}}\n{}\\begin{{figure}}[H]\n\\includegraphics{{stand.png}}\n\
\\caption{{Схема стенду}}\\label{{fig:stand}}\n\\end{{figure}}\n",
            code_block(6)
        ),
    );
    write(
        &src.join("chapters/ch2.tex"),
        format!(
            "\\section{{2. Методи}}\n\\label{{sec:m}}\n\\label{{sec:m}}\n{}{}",
            code_block(5),
            code_block(2)
        ),
    );
    write(&src.join("stand.png"), PNG_BYTES);
    src
}

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl ProgressObserver for RecordingObserver {
    fn on_run_start(&self, total_units: usize) {
        self.events.lock().unwrap().push(format!("start:{total_units}"));
    }
    fn on_unit_complete(&self, ordinal: usize, _total: usize, path: &str, listings: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("unit:{ordinal}:{path}:{listings}"));
    }
    fn on_stage(&self, stage: &str) {
        self.events.lock().unwrap().push(format!("stage:{stage}"));
    }
    fn on_run_complete(&self, restored: usize, unresolved: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done:{restored}:{unresolved}"));
    }
}

// ── Forward ──────────────────────────────────────────────────────────────────

#[test]
fn prepare_writes_normalized_copy() {
    let dir = TempDir::new().unwrap();
    let src = sample_project(dir.path());
    let out = dir.path().join("prepared");

    let report = prepare_project(&src, &out, &RoundTripConfig::default()).unwrap();

    assert_eq!(report.units.len(), 3);
    let paths: Vec<&str> = report.units.iter().map(|u| u.path.as_str()).collect();
    assert_eq!(paths, ["chapters/ch1.tex", "chapters/ch2.tex", "titlepage.tex"]);
    assert_eq!(report.total_listings(), 2);
    assert_eq!(report.listings_per_chapter.get(&1), Some(&1));
    assert_eq!(report.listings_per_chapter.get(&2), Some(&1));
    assert_eq!(report.assets_staged, 1);

    let ch1 = fs::read_to_string(out.join("chapters/ch1.tex")).unwrap();
    assert!(ch1.contains("Лістинг 1.1 --- Огляд"));
    assert!(ch1.contains("\\begin{figure}[htbp]"));

    let ch2 = fs::read_to_string(out.join("chapters/ch2.tex")).unwrap();
    assert!(ch2.contains("Лістинг 2.1 --- Методи"));
    assert!(ch2.contains("% duplicate: \\label{sec:m}"));
    assert_eq!(report.units[1].duplicate_labels, 1);

    let title = fs::read_to_string(out.join("titlepage.tex")).unwrap();
    assert!(!title.contains("\\begin{titlepage}"));
    assert!(!title.contains("\\tableofcontents"));
    assert!(!title.contains("Міністерство"));
    assert!(title.contains("Київ 2024"));

    assert_eq!(fs::read(out.join("stand.png")).unwrap(), PNG_BYTES);

    // Sources are untouched.
    let original = fs::read_to_string(src.join("chapters/ch1.tex")).unwrap();
    assert!(original.contains("\\begin{figure}[H]"));
}

#[test]
fn prepare_rerun_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let src = sample_project(dir.path());
    let out = dir.path().join("prepared");
    let config = RoundTripConfig::default();

    let first = prepare_project(&src, &out, &config).unwrap();
    assert!(first.units.iter().all(|u| u.written));

    let snapshot = fs::read_to_string(out.join("chapters/ch2.tex")).unwrap();
    let second = prepare_project(&src, &out, &config).unwrap();
    assert!(second.units.iter().all(|u| !u.written));
    assert_eq!(second.assets_staged, 0);
    assert_eq!(
        fs::read_to_string(out.join("chapters/ch2.tex")).unwrap(),
        snapshot
    );
}

#[test]
fn prepare_reports_progress_in_unit_order() {
    let dir = TempDir::new().unwrap();
    let src = sample_project(dir.path());
    let observer = Arc::new(RecordingObserver::default());
    let config = RoundTripConfig::builder()
        .progress_callback(observer.clone() as Arc<dyn ProgressObserver>)
        .build()
        .unwrap();

    prepare_project(&src, &dir.path().join("out"), &config).unwrap();

    let events = observer.events.lock().unwrap().clone();
    assert_eq!(
        events,
        [
            "start:3",
            "unit:0:chapters/ch1.tex:1",
            "unit:1:chapters/ch2.tex:1",
            "unit:2:titlepage.tex:0",
        ]
    );
}

#[test]
fn prepare_missing_source_dir() {
    let dir = TempDir::new().unwrap();
    let err = prepare_project(
        &dir.path().join("nope"),
        &dir.path().join("out"),
        &RoundTripConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, RoundTripError::SourceDirNotFound { .. }));
}

#[test]
fn prepare_aborts_on_unbalanced_block() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("src");
    write(&src.join("a.tex"), "\\begin{verbatim}\nopen forever\n");
    let err = prepare_project(&src, &dir.path().join("out"), &RoundTripConfig::default())
        .unwrap_err();
    assert!(matches!(err, RoundTripError::UnbalancedBlock { .. }));
}

#[test]
fn prepare_rejects_output_inside_sources() {
    let dir = TempDir::new().unwrap();
    let src = sample_project(dir.path());
    let config = RoundTripConfig::default();

    let err = prepare_project(&src, &src.join("build/prepared"), &config).unwrap_err();
    assert!(matches!(err, RoundTripError::OutputInsideSource { .. }));
    assert!(!src.join("build").exists());

    let err = prepare_project(&src, &src, &config).unwrap_err();
    assert!(matches!(err, RoundTripError::OutputInsideSource { .. }));

    // A sibling whose name merely starts with the source name is fine.
    let report = prepare_project(&src, &dir.path().join("src-prepared"), &config).unwrap();
    assert_eq!(report.units.len(), 3);
}

#[test]
fn prepare_skips_commented_markers_and_escapes_captions() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("src");
    write(
        &src.join("a.tex"),
        format!(
            "% \\begin{{verbatim}} old draft\n\\section{{1 Шум 50\\% смуги}}\n{}",
            code_block(5)
        ),
    );
    let out = dir.path().join("out");

    let report = prepare_project(&src, &out, &RoundTripConfig::default()).unwrap();
    assert_eq!(report.total_listings(), 1);

    let text = fs::read_to_string(out.join("a.tex")).unwrap();
    assert!(text.starts_with("% \\begin{verbatim} old draft\n"));
    assert!(text.contains("\\textbf{Лістинг 1.1 --- Шум 50\\% смуги}"));
}

#[test]
fn annotate_rewrites_sources_once() {
    let dir = TempDir::new().unwrap();
    let src = sample_project(dir.path());
    let config = RoundTripConfig::default();

    let first = annotate_project(&src, &config).unwrap();
    let tagged: usize = first.iter().map(|r| r.listings_tagged).sum();
    assert_eq!(tagged, 2);
    assert!(!first.iter().find(|r| r.path == "titlepage.tex").unwrap().written);

    let ch2 = fs::read_to_string(src.join("chapters/ch2.tex")).unwrap();
    assert!(ch2.contains("\\begin{lstlisting}[caption={Методи}]"));
    // The two-line block stays plain.
    assert_eq!(ch2.matches("\\begin{verbatim}").count(), 1);

    let second = annotate_project(&src, &config).unwrap();
    assert!(second.iter().all(|r| r.listings_tagged == 0 && !r.written));
}

// ── Reverse ──────────────────────────────────────────────────────────────────

/// Converter output as pandoc writes it for the sample project.
fn converted_document(root: &Path) -> (PathBuf, PathBuf) {
    let build = root.join("build");
    let media = build.join("media");
    write(&media.join("media/rId9.png"), PNG_BYTES);
    write(&media.join("media/rId10.png"), b"unknown image");
    let converted = build.join("converted.tex");
    write(
        &converted,
        "\\section{1. Огляд}\n\
\\includegraphics{media/rId9.png}\n\
\\caption{Схема стенду}\n\
\\includegraphics{media/rId10.png}\n\
Як видно з \\hyperref[fig:stand]{Figure 1}, \\[ a = b \\]\n",
    );
    (converted, media)
}

#[test]
fn caption_index_covers_project() {
    let dir = TempDir::new().unwrap();
    let src = sample_project(dir.path());
    let index = build_caption_index(&src).unwrap();
    assert_eq!(
        index.get("fig:stand"),
        Some(&CaptionKey::Caption("Схема стенду".into()))
    );
}

#[test]
fn restore_file_recovers_labels_and_images() {
    let dir = TempDir::new().unwrap();
    let src = sample_project(dir.path());
    let (converted, media) = converted_document(dir.path());
    let output = dir.path().join("out/thesis.tex");
    let options = RestoreOptions {
        src_dir: Some(src.clone()),
        asset_dir: None,
        media_dir: Some(media),
    };

    let report = restore_file(&converted, &output, &options, &RoundTripConfig::default()).unwrap();

    let text = fs::read_to_string(&output).unwrap();
    assert!(text.starts_with("\\documentclass"));
    assert!(text.trim_end().ends_with("\\end{document}"));
    assert!(text.contains("\\section{Огляд}"));
    assert!(text.contains("\\caption{Схема стенду}\\label{fig:stand}"));
    assert!(text.contains("\\includegraphics{images/stand.png}"));
    assert!(text.contains("\\includegraphics{media/rId10.png}"));
    assert!(text.contains("\\ref{fig:stand}"));

    assert_eq!(report.labels_restored(), 1);
    assert_eq!(report.images_mapped(), 1);
    assert_eq!(report.images_unresolved(), 1);
    assert_eq!(report.assets_copied, 1);
    assert!(report.preamble_added);
    assert!(report.written);
    assert_eq!(
        fs::read(dir.path().join("out/images/stand.png")).unwrap(),
        PNG_BYTES
    );
}

#[test]
fn restore_file_counts_equation_anchors_as_unresolved() {
    let dir = TempDir::new().unwrap();
    let src = sample_project(dir.path());
    write(
        &src.join("chapters/ch3.tex"),
        "\\begin{equation}\\label{eq:energy}\nE = mc^2\n\\end{equation}\n",
    );
    let (converted, media) = converted_document(dir.path());
    let output = dir.path().join("out/thesis.tex");
    let options = RestoreOptions {
        src_dir: Some(src),
        asset_dir: None,
        media_dir: Some(media),
    };

    let report = restore_file(&converted, &output, &options, &RoundTripConfig::default()).unwrap();

    assert!(report.written);
    assert_eq!(report.equations_skipped(), 1);
    assert_eq!(report.labels_restored(), 1);
    assert_eq!(report.labels_unresolved(), 0);
    assert_eq!(
        report.total_unresolved(),
        report.equations_skipped() + report.images_unresolved()
    );
    let text = fs::read_to_string(&output).unwrap();
    assert!(!text.contains("\\label{eq:energy}"));
    assert!(text.contains("\\label{fig:stand}"));
}

#[test]
fn restore_rerun_is_stable() {
    let dir = TempDir::new().unwrap();
    let src = sample_project(dir.path());
    let (converted, media) = converted_document(dir.path());
    let output = dir.path().join("out/thesis.tex");
    let options = RestoreOptions {
        src_dir: Some(src),
        asset_dir: None,
        media_dir: Some(media),
    };
    let config = RoundTripConfig::default();

    restore_file(&converted, &output, &options, &config).unwrap();
    let first = fs::read_to_string(&output).unwrap();

    let again = restore_file(&converted, &output, &options, &config).unwrap();
    assert!(!again.written);
    assert_eq!(again.assets_copied, 0);
    assert_eq!(fs::read_to_string(&output).unwrap(), first);

    // Restoring the restored file changes nothing either.
    let twice = restore_file(&output, &output, &options, &config).unwrap();
    assert!(!twice.written);
    assert!(!twice.preamble_added);
}

#[test]
fn restore_without_sources_still_repairs() {
    let dir = TempDir::new().unwrap();
    let (converted, _) = converted_document(dir.path());
    let output = dir.path().join("thesis.tex");

    let report = restore_file(
        &converted,
        &output,
        &RestoreOptions::default(),
        &RoundTripConfig::default(),
    )
    .unwrap();

    assert!(report.anchors.is_empty());
    assert!(report.assets.is_empty());
    let text = fs::read_to_string(&output).unwrap();
    assert!(text.contains("\\section{Огляд}"));
    assert!(!text.contains("\\label{fig:stand}"));
}

#[test]
fn restore_reports_stages() {
    let dir = TempDir::new().unwrap();
    let (converted, _) = converted_document(dir.path());
    let observer = Arc::new(RecordingObserver::default());
    let config = RoundTripConfig::builder()
        .progress_callback(observer.clone() as Arc<dyn ProgressObserver>)
        .build()
        .unwrap();

    restore_file(
        &converted,
        &dir.path().join("thesis.tex"),
        &RestoreOptions::default(),
        &config,
    )
    .unwrap();

    let events = observer.events.lock().unwrap().clone();
    assert_eq!(
        events,
        [
            "stage:index",
            "stage:assets",
            "stage:repair",
            "stage:write",
            "done:0:0",
        ]
    );
}

// ── Both halves, with a scripted converter ───────────────────────────────────

/// Stands in for pandoc: copies the main unit as "DOCX", then writes a
/// fixed converted document and media file.
struct ScriptedConverter {
    fail_reverse: bool,
}

impl DocumentConverter for ScriptedConverter {
    fn name(&self) -> &str {
        "scripted"
    }

    fn to_intermediate(
        &self,
        main: &Path,
        _work_dir: &Path,
        out_docx: &Path,
    ) -> Result<(), RoundTripError> {
        fs::copy(main, out_docx).map_err(|source| RoundTripError::OutputWriteFailed {
            path: out_docx.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    fn to_markup(&self, _docx: &Path, out_tex: &Path, media_dir: &Path) -> Result<(), RoundTripError> {
        if self.fail_reverse {
            return Err(RoundTripError::ConverterFailed {
                tool: "scripted".into(),
                status: "exit status: 1".into(),
                output: out_tex.to_path_buf(),
                stderr: "boom".into(),
            });
        }
        write(&media_dir.join("media/rId9.png"), PNG_BYTES);
        write(
            out_tex,
            "\\subsection{1.1 Опис експериментального стенду}\n\
\\includegraphics{media/rId9.png}\n\\caption{Схема стенду}\n",
        );
        Ok(())
    }
}

#[test]
fn round_trip_with_scripted_converter() {
    let dir = TempDir::new().unwrap();
    let src = sample_project(dir.path());
    write(&src.join("main.tex"), "\\input{chapters/ch1}\n");
    let work = dir.path().join("work");
    let output = dir.path().join("out/thesis.tex");

    let result = round_trip(
        &src,
        "main.tex",
        &work,
        &output,
        &ScriptedConverter { fail_reverse: false },
        &RoundTripConfig::default(),
    )
    .unwrap();

    assert_eq!(result.prepare.units.len(), 4);
    assert_eq!(result.intermediate, work.join("intermediate.docx"));
    assert!(work.join("prepared/chapters/ch1.tex").is_file());

    let text = fs::read_to_string(&output).unwrap();
    assert!(text.contains("\\section{Опис експериментального стенду}"));
    assert!(text.contains("\\caption{Схема стенду}\\label{fig:stand}"));
    assert!(text.contains("\\includegraphics{images/stand.png}"));
    assert_eq!(result.restore.labels_restored(), 1);
}

#[test]
fn round_trip_missing_main_unit() {
    let dir = TempDir::new().unwrap();
    let src = sample_project(dir.path());
    let err = round_trip(
        &src,
        "main.tex",
        &dir.path().join("work"),
        &dir.path().join("out.tex"),
        &ScriptedConverter { fail_reverse: false },
        &RoundTripConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, RoundTripError::InvalidConfig(_)));
}

#[test]
fn converter_failure_writes_no_output() {
    let dir = TempDir::new().unwrap();
    let src = sample_project(dir.path());
    write(&src.join("main.tex"), "\\input{chapters/ch1}\n");
    let output = dir.path().join("out/thesis.tex");

    let err = round_trip(
        &src,
        "main.tex",
        &dir.path().join("work"),
        &output,
        &ScriptedConverter { fail_reverse: true },
        &RoundTripConfig::default(),
    )
    .unwrap_err();

    assert!(matches!(err, RoundTripError::ConverterFailed { .. }));
    assert!(!output.exists());
}

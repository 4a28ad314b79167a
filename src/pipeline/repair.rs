//! Reverse repair: deterministic cleanup of converter-generated LaTeX.
//!
//! The DOCX→LaTeX converter produces valid LaTeX that still differs from the
//! source in predictable ways: display math in `\[…\]`, inline math in
//! `\(…\)`, cross references as `\hyperref`, numbers baked into heading text,
//! demoted top-level sections, `--` for en-dashes and list items split over
//! two lines. Each [`RepairStage`] undoes one of those artifacts.
//!
//! ## Stage order
//!
//! Stages run in [`RepairStage::ORDER`]. Heading numbers are stripped before
//! the hierarchy and unnumbered-section stages so those can match on the bare
//! title. Every stage is a fixed point after one application, and so is the
//! composition: running [`repair_document`] on its own output changes nothing.
//!
//! ## Literal text
//!
//! Stages only see the text between `verbatim`/`lstlisting` blocks and `%`
//! comments (see [`map_unprotected`]). Code bodies and commented-out source
//! come back byte for byte.

use crate::config::RoundTripConfig;
use crate::pipeline::tex::{braced_arg, map_unprotected};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// One reverse repair pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStage {
    /// Drop the converter's own `\section{Table of Contents}\label{…}`.
    ContentsHeading,
    /// `\[ … \]` → `\begin{equation} … \end{equation}`.
    ///
    /// A `\\[2pt]` line break is not math.
    DisplayMath,
    /// `\( … \)` → `$ … $`, keeping parentheses inside the math.
    InlineMath,
    /// `\hyperref[x]{3}` → `\ref{x}`; the display text is stale.
    CrossReferences,
    /// `\section{2.3 Методи}` → `\section{Методи}`.
    HeadingNumbers,
    /// Promote allow-listed `\subsection` titles to `\section`.
    ///
    /// Pre: heading numbers stripped.
    SectionHierarchy,
    /// Exactly two hyphens → `–`.
    EnDashes,
    /// `\item` followed by a line break and indented text is rejoined.
    ListItems,
    /// `\section{ВСТУП}` → `\section*{ВСТУП}` for the configured titles.
    ///
    /// Pre: heading numbers stripped.
    UnnumberedSections,
}

impl RepairStage {
    /// Application order.
    pub const ORDER: [RepairStage; 9] = [
        RepairStage::ContentsHeading,
        RepairStage::DisplayMath,
        RepairStage::InlineMath,
        RepairStage::CrossReferences,
        RepairStage::HeadingNumbers,
        RepairStage::SectionHierarchy,
        RepairStage::EnDashes,
        RepairStage::ListItems,
        RepairStage::UnnumberedSections,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RepairStage::ContentsHeading => "contents-heading",
            RepairStage::DisplayMath => "display-math",
            RepairStage::InlineMath => "inline-math",
            RepairStage::CrossReferences => "cross-references",
            RepairStage::HeadingNumbers => "heading-numbers",
            RepairStage::SectionHierarchy => "section-hierarchy",
            RepairStage::EnDashes => "en-dashes",
            RepairStage::ListItems => "list-items",
            RepairStage::UnnumberedSections => "unnumbered-sections",
        }
    }

    /// Run this stage over the unprotected parts of `text`.
    pub fn apply(self, text: &str, config: &RoundTripConfig) -> String {
        map_unprotected(text, |segment| self.rewrite(segment, config))
    }

    fn rewrite(self, text: &str, config: &RoundTripConfig) -> String {
        match self {
            RepairStage::ContentsHeading => drop_contents_headings(text, &config.contents_titles),
            RepairStage::DisplayMath => fix_display_math(text),
            RepairStage::InlineMath => fix_inline_math(text),
            RepairStage::CrossReferences => fix_hyperref(text),
            RepairStage::HeadingNumbers => strip_heading_numbers(text),
            RepairStage::SectionHierarchy => promote_sections(text, &config.promote_titles),
            RepairStage::EnDashes => fix_en_dashes(text),
            RepairStage::ListItems => join_list_items(text),
            RepairStage::UnnumberedSections => unnumber_sections(text, &config.unnumbered_titles),
        }
    }
}

/// Repaired text plus the names of the stages that changed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairResult {
    pub text: String,
    pub stages_applied: Vec<&'static str>,
}

/// Apply every repair stage in order.
pub fn repair_document(input: &str, config: &RoundTripConfig) -> RepairResult {
    let mut text = input.to_string();
    let mut stages_applied = Vec::new();
    for stage in RepairStage::ORDER {
        let next = stage.apply(&text, config);
        if next != text {
            debug!("repair stage {} changed the document", stage.name());
            stages_applied.push(stage.name());
            text = next;
        }
    }
    RepairResult {
        text,
        stages_applied,
    }
}

// ── Stage 1: Converter contents heading ─────────────────────────────────────

fn drop_contents_headings(input: &str, titles: &[String]) -> String {
    let mut out = input.to_string();
    for title in titles {
        for head in [
            format!("\\section{{{title}}}"),
            format!("\\section*{{{title}}}"),
        ] {
            while let Some(start) = out.find(&head) {
                let mut end = start + head.len();
                if out[end..].starts_with("\\label{") {
                    if let Some((_, after)) = braced_arg(&out, end + "\\label".len()) {
                        end = after;
                    }
                }
                let tail = &out[end..];
                end += tail.len() - tail.trim_start_matches([' ', '\t']).len();
                if out[end..].starts_with('\n') {
                    end += 1;
                }
                out.replace_range(start..end, "");
            }
        }
    }
    out
}

// ── Stage 2: Display math ────────────────────────────────────────────────────

static RE_DISPLAY_SINGLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*\\\[[ \t]*(.+?)[ \t]*\\\][ \t]*$").unwrap());

static RE_DISPLAY_MULTI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)(^|[^\\])\\\[[ \t]*\n(.*?)\n[ \t]*\\\]").unwrap());

fn fix_display_math(input: &str) -> String {
    let s = RE_DISPLAY_SINGLE.replace_all(input, "\\begin{equation}\n$1\n\\end{equation}");
    RE_DISPLAY_MULTI
        .replace_all(&s, "$1\\begin{equation}\n$2\n\\end{equation}")
        .into_owned()
}

// ── Stage 3: Inline math ─────────────────────────────────────────────────────

/// How a `\(` opener resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InlineRun {
    /// Closed by the first `\)` with no `\(` in between; close index.
    Flat(usize),
    /// Closed, but only after nested openers; index just past the close.
    Nested(usize),
    /// Never closed.
    Unclosed,
}

/// Byte scanner: a flat `\( … \)` becomes `$ … $`. Runs with nested
/// delimiters are copied unchanged and an opener that never closes is
/// literal text. `\\` pairs are skipped so a line break never opens math.
fn fix_inline_math(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut copied = 0;
    let mut i = 0;

    while i + 1 < bytes.len() {
        if bytes[i] != b'\\' {
            i += 1;
            continue;
        }
        if bytes[i + 1] != b'(' {
            i += 2;
            continue;
        }
        match inline_run(bytes, i + 2) {
            InlineRun::Flat(close) => {
                out.push_str(&input[copied..i]);
                out.push('$');
                out.push_str(&input[i + 2..close]);
                out.push('$');
                i = close + 2;
                copied = i;
            }
            InlineRun::Nested(end) => i = end,
            InlineRun::Unclosed => i += 2,
        }
    }
    out.push_str(&input[copied..]);
    out
}

fn inline_run(bytes: &[u8], from: usize) -> InlineRun {
    let mut depth = 1usize;
    let mut nested = false;
    let mut j = from;
    while j + 1 < bytes.len() {
        if bytes[j] != b'\\' {
            j += 1;
            continue;
        }
        match bytes[j + 1] {
            b'(' => {
                depth += 1;
                nested = true;
            }
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return if nested {
                        InlineRun::Nested(j + 2)
                    } else {
                        InlineRun::Flat(j)
                    };
                }
            }
            _ => {}
        }
        j += 2;
    }
    InlineRun::Unclosed
}

// ── Stage 4: Cross references ────────────────────────────────────────────────

static RE_HYPERREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\hyperref\[([^\]]+)\]\{[^}]*\}").unwrap());

fn fix_hyperref(input: &str) -> String {
    RE_HYPERREF.replace_all(input, r"\ref{$1}").into_owned()
}

// ── Stage 5: Heading numbers ─────────────────────────────────────────────────

static RE_HEADING_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\\(?:sub){0,2}section\*?\{(?:\\texorpdfstring\{)?)(?:\d+(?:\.\d+)*\.?\s+)+")
        .unwrap()
});

fn strip_heading_numbers(input: &str) -> String {
    RE_HEADING_NUMBER.replace_all(input, "$1").into_owned()
}

// ── Stage 6: Section hierarchy ───────────────────────────────────────────────

const SUBSECTION: &str = "\\subsection";

fn promote_sections(input: &str, titles: &[String]) -> String {
    if titles.is_empty() {
        return input.to_string();
    }
    let mut out = String::with_capacity(input.len());
    let mut cursor = 0;
    while let Some(pos) = input[cursor..].find(SUBSECTION) {
        let start = cursor + pos;
        let after_cmd = start + SUBSECTION.len();
        let open = if input[after_cmd..].starts_with("*{") {
            after_cmd + 1
        } else {
            after_cmd
        };
        out.push_str(&input[cursor..start]);
        let promote = braced_arg(input, open)
            .is_some_and(|(title, _)| titles.iter().any(|t| title.contains(t.as_str())));
        out.push_str(if promote { "\\section" } else { SUBSECTION });
        cursor = after_cmd;
    }
    out.push_str(&input[cursor..]);
    out
}

// ── Stage 7: En-dashes ───────────────────────────────────────────────────────

fn fix_en_dashes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut run = 0usize;
    let flush = |out: &mut String, run: usize| {
        if run == 2 {
            out.push('–');
        } else {
            out.extend(std::iter::repeat_n('-', run));
        }
    };
    for c in s.chars() {
        if c == '-' {
            run += 1;
            continue;
        }
        flush(&mut out, run);
        run = 0;
        out.push(c);
    }
    flush(&mut out, run);
    out
}

// ── Stage 8: List items ──────────────────────────────────────────────────────

static RE_SPLIT_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\\item)\s*\n\s+").unwrap());

fn join_list_items(input: &str) -> String {
    RE_SPLIT_ITEM.replace_all(input, "$1 ").into_owned()
}

// ── Stage 9: Unnumbered sections ─────────────────────────────────────────────

const SECTION: &str = "\\section{";

fn unnumber_sections(input: &str, titles: &[String]) -> String {
    if titles.is_empty() {
        return input.to_string();
    }
    let mut out = String::with_capacity(input.len());
    let mut cursor = 0;
    while let Some(pos) = input[cursor..].find(SECTION) {
        let start = cursor + pos;
        let open = start + SECTION.len() - 1;
        out.push_str(&input[cursor..start]);
        let unnumbered = braced_arg(input, open)
            .is_some_and(|(title, _)| titles.iter().any(|t| title.trim() == t));
        out.push_str(if unnumbered { "\\section*{" } else { SECTION });
        cursor = open + 1;
    }
    out.push_str(&input[cursor..]);
    out
}

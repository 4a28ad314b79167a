//! Forward normalization: rewrite LaTeX the converter would otherwise mangle.
//!
//! Each [`NormalizeRule`] is a pure `&str → String` pass. They run in
//! [`NormalizeRule::ORDER`]; later rules assume earlier ones already ran
//! (e.g. [`NormalizeRule::BareScriptWrap`] relies on escaped underscores
//! having been removed from script groups by
//! [`NormalizeRule::ScriptUnderscores`]).

use crate::config::RoundTripConfig;
use crate::pipeline::tex::{comment_start, is_non_latin_letter};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// One forward rewrite pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeRule {
    /// `\begin{figure}[H]` → `[htbp]`.
    ///
    /// Post: no figure requests strict "here" placement.
    FigurePlacement,
    /// `\_` inside `_{…}` / `^{…}` → `{\text{-}}`.
    ///
    /// Post: script groups contain no escaped underscores.
    ScriptUnderscores,
    /// `\text{…}` with non-Latin letters → `\textrm{…}`.
    MathTextScript,
    /// `_{кирилиця}` → `_{\textrm{кирилиця}}`.
    ///
    /// Pre: `ScriptUnderscores` ran. Post: bare non-Latin scripts are wrapped.
    BareScriptWrap,
    /// Second and later `\label{x}` on the unit move into a trailing comment.
    ///
    /// Post: every label name occurs at most once outside comments.
    DuplicateLabels,
    /// Title-page unit only: drop the titlepage environment and TOC setup.
    TitlePage,
    /// Drop `\titleformat` commands (xelatex-only).
    TitleFormat,
}

impl NormalizeRule {
    /// Application order.
    pub const ORDER: [NormalizeRule; 7] = [
        NormalizeRule::FigurePlacement,
        NormalizeRule::ScriptUnderscores,
        NormalizeRule::MathTextScript,
        NormalizeRule::BareScriptWrap,
        NormalizeRule::DuplicateLabels,
        NormalizeRule::TitlePage,
        NormalizeRule::TitleFormat,
    ];

    pub fn name(self) -> &'static str {
        match self {
            NormalizeRule::FigurePlacement => "figure-placement",
            NormalizeRule::ScriptUnderscores => "script-underscores",
            NormalizeRule::MathTextScript => "math-text-script",
            NormalizeRule::BareScriptWrap => "bare-script-wrap",
            NormalizeRule::DuplicateLabels => "duplicate-labels",
            NormalizeRule::TitlePage => "title-page",
            NormalizeRule::TitleFormat => "title-format",
        }
    }

    /// Whether the rule runs for the unit at `unit_path`.
    pub fn applies_to(self, unit_path: &str, config: &RoundTripConfig) -> bool {
        match self {
            NormalizeRule::TitlePage => Path::new(unit_path)
                .file_name()
                .is_some_and(|n| n.to_string_lossy() == config.title_unit),
            _ => true,
        }
    }

    pub fn apply(self, text: &str) -> String {
        match self {
            NormalizeRule::FigurePlacement => fix_figure_placement(text),
            NormalizeRule::ScriptUnderscores => fix_script_underscores(text),
            NormalizeRule::MathTextScript => fix_math_text(text),
            NormalizeRule::BareScriptWrap => wrap_bare_scripts(text),
            NormalizeRule::DuplicateLabels => neutralize_duplicate_labels(text).0,
            NormalizeRule::TitlePage => strip_title_page(text),
            NormalizeRule::TitleFormat => strip_titleformat(text),
        }
    }
}

/// Result of normalizing one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeResult {
    pub text: String,
    /// Duplicate labels commented out.
    pub duplicate_labels: usize,
    /// Rules that changed the text.
    pub rules_applied: Vec<&'static str>,
}

/// Run every applicable rule over one unit, in order.
pub fn normalize_unit(unit_path: &str, text: &str, config: &RoundTripConfig) -> NormalizeResult {
    let mut current = text.to_string();
    let mut duplicate_labels = 0;
    let mut rules_applied = Vec::new();

    for rule in NormalizeRule::ORDER {
        if !rule.applies_to(unit_path, config) {
            continue;
        }
        let next = match rule {
            NormalizeRule::DuplicateLabels => {
                let (t, n) = neutralize_duplicate_labels(&current);
                duplicate_labels = n;
                t
            }
            _ => rule.apply(&current),
        };
        if next != current {
            debug!("{unit_path}: {} changed the text", rule.name());
            rules_applied.push(rule.name());
            current = next;
        }
    }

    NormalizeResult {
        text: current,
        duplicate_labels,
        rules_applied,
    }
}

// ── Rule 1: Figure placement ─────────────────────────────────────────────────

static RE_STRICT_FIGURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\begin\{figure\}\s*(?:\[!?H!?\]|\{!?H!?\})").unwrap()
});

fn fix_figure_placement(input: &str) -> String {
    RE_STRICT_FIGURE
        .replace_all(input, r"\begin{figure}[htbp]")
        .into_owned()
}

// ── Rule 2: Escaped underscores in scripts ──────────────────────────────────

static RE_SCRIPT_WITH_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[_^]\{[^{}]*\\_[^{}]*\}").unwrap());

fn fix_script_underscores(input: &str) -> String {
    RE_SCRIPT_WITH_ESCAPE
        .replace_all(input, |caps: &Captures<'_>| caps[0].replace(r"\_", r"{\text{-}}"))
        .into_owned()
}

// ── Rule 3: Non-Latin \text in math ─────────────────────────────────────────

static RE_TEXT_CMD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\text\{([^{}]+)\}").unwrap());

fn fix_math_text(input: &str) -> String {
    RE_TEXT_CMD
        .replace_all(input, |caps: &Captures<'_>| {
            let inner = &caps[1];
            if inner.chars().any(is_non_latin_letter) {
                format!(r"\textrm{{{inner}}}")
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

// ── Rule 4: Bare non-Latin scripts ──────────────────────────────────────────

static RE_SCRIPT_GROUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"([_^])\{([^{}]+)\}").unwrap());

fn wrap_bare_scripts(input: &str) -> String {
    RE_SCRIPT_GROUP
        .replace_all(input, |caps: &Captures<'_>| {
            let inner = &caps[2];
            let pure = inner.chars().any(is_non_latin_letter)
                && inner
                    .chars()
                    .all(|c| is_non_latin_letter(c) || c == '_' || c == ' ');
            if pure {
                format!(r"{}{{\textrm{{{}}}}}", &caps[1], inner)
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

// ── Rule 5: Duplicate labels ─────────────────────────────────────────────────

static RE_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\label\{([^{}]+)\}").unwrap());

/// Keep the first `\label{x}`; move later ones to a `% duplicate:` comment
/// at the end of their line. Returns the new text and the number moved.
pub fn neutralize_duplicate_labels(input: &str) -> (String, usize) {
    let mut seen: HashSet<String> = HashSet::new();
    let mut moved = 0;

    let lines: Vec<String> = input
        .split('\n')
        .map(|line| {
            let split = comment_start(line).unwrap_or(line.len());
            let (code, comment) = line.split_at(split);
            if !code.contains("\\label{") {
                return line.to_string();
            }

            let mut duplicates = Vec::new();
            let kept = RE_LABEL.replace_all(code, |caps: &Captures<'_>| {
                let name = caps[1].to_string();
                if seen.insert(name) {
                    caps[0].to_string()
                } else {
                    duplicates.push(caps[0].to_string());
                    String::new()
                }
            });
            if duplicates.is_empty() {
                return line.to_string();
            }

            moved += duplicates.len();
            let mut out = format!("{kept}{comment}");
            for label in duplicates {
                out.push_str(" % duplicate: ");
                out.push_str(&label);
            }
            out
        })
        .collect();

    (lines.join("\n"), moved)
}

// ── Rule 6: Title page ───────────────────────────────────────────────────────

static TITLE_PAGE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?s)\\begin\{titlepage\}.*?\\end\{titlepage\}",
        r"\\tableofcontents\b",
        r"\\renewcommand\{\\cfttoctitlefont\}.*",
        r"\\renewcommand\{\\cftaftertoctitle\}.*",
        r"\\renewcommand\{\\contentsname\}.*",
        r"\\setcounter\{page\}\{[^}]*\}",
        r"\\thispagestyle\{empty\}",
        r"\\newpage\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

fn strip_title_page(input: &str) -> String {
    TITLE_PAGE_PATTERNS
        .iter()
        .fold(input.to_string(), |text, re| re.replace_all(&text, "").into_owned())
}

// ── Rule 7: \titleformat ─────────────────────────────────────────────────────

static RE_TITLEFORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\\titleformat\s*\{[^}]*\}\s*(?:\[[^\]]*\]\s*)?\{[^}]*\}\s*\{[^}]*\}\s*\{[^}]*\}\s*\{[^}]*\}",
    )
    .unwrap()
});

fn strip_titleformat(input: &str) -> String {
    RE_TITLEFORMAT.replace_all(input, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_figure_placement_is_relaxed() {
        assert_eq!(
            fix_figure_placement(r"\begin{figure}[H]"),
            r"\begin{figure}[htbp]"
        );
        assert_eq!(
            fix_figure_placement(r"\begin{figure}[H!]"),
            r"\begin{figure}[htbp]"
        );
        assert_eq!(
            fix_figure_placement(r"\begin{figure}[t]"),
            r"\begin{figure}[t]"
        );
    }

    #[test]
    fn escaped_underscore_in_subscript() {
        assert_eq!(
            fix_script_underscores(r"$V_{q\_rms}$ and file\_name"),
            r"$V_{q{\text{-}}rms}$ and file\_name"
        );
        assert_eq!(
            fix_script_underscores(r"$x^{a\_b}$"),
            r"$x^{a{\text{-}}b}$"
        );
    }

    #[test]
    fn non_latin_text_becomes_textrm() {
        assert_eq!(
            fix_math_text(r"$P = U \cdot I \text{ Вт}$"),
            r"$P = U \cdot I \textrm{ Вт}$"
        );
        assert_eq!(fix_math_text(r"$\text{if } x$"), r"$\text{if } x$");
    }

    #[test]
    fn bare_cyrillic_script_is_wrapped_once() {
        let once = wrap_bare_scripts(r"$V_{перенапруга}$");
        assert_eq!(once, r"$V_{\textrm{перенапруга}}$");
        assert_eq!(wrap_bare_scripts(&once), once);
        assert_eq!(wrap_bare_scripts(r"$V_{max}$"), r"$V_{max}$");
        assert_eq!(wrap_bare_scripts(r"$V_{1п}$"), r"$V_{1п}$");
    }

    #[test]
    fn bare_cyrillic_superscript_is_wrapped_once() {
        let once = wrap_bare_scripts(r"$I^{макс} + I_{мін}^{2}$");
        assert_eq!(once, r"$I^{\textrm{макс}} + I_{\textrm{мін}}^{2}$");
        assert_eq!(wrap_bare_scripts(&once), once);
    }

    #[test]
    fn duplicate_labels_are_commented_not_deleted() {
        let input = "\\label{fig:a}\nText\n\\caption{B}\\label{fig:a} tail\n\\label{fig:b}";
        let (out, moved) = neutralize_duplicate_labels(input);
        assert_eq!(moved, 1);
        assert_eq!(out.lines().count(), input.lines().count());
        assert_eq!(
            out,
            "\\label{fig:a}\nText\n\\caption{B} tail % duplicate: \\label{fig:a}\n\\label{fig:b}"
        );
        // Second pass finds nothing new: the moved label sits in a comment.
        let (again, moved_again) = neutralize_duplicate_labels(&out);
        assert_eq!(moved_again, 0);
        assert_eq!(again, out);
    }

    #[test]
    fn commented_labels_do_not_count() {
        let input = "% \\label{x}\n\\label{x}";
        let (out, moved) = neutralize_duplicate_labels(input);
        assert_eq!(moved, 0);
        assert_eq!(out, input);
    }

    #[test]
    fn title_page_is_stripped_only_in_title_unit() {
        let config = RoundTripConfig::default();
        let text = "\\begin{titlepage}\nУніверситет\n\\end{titlepage}\n\\tableofcontents\n\\newpage\n";

        let title = normalize_unit("titlepage.tex", text, &config);
        assert!(!title.text.contains("titlepage"));
        assert!(!title.text.contains("tableofcontents"));
        assert!(!title.text.contains("newpage"));
        assert!(title.rules_applied.contains(&"title-page"));

        let other = normalize_unit("sections/ch1.tex", text, &config);
        assert_eq!(other.text, text);
    }

    #[test]
    fn titleformat_is_removed() {
        let input = "\\titleformat{\\section}\n  {\\normalfont\\Large\\bfseries}\n  {РОЗДІЛ \\thesection.}\n  {0.5em}\n  {\\MakeUppercase}\nBody";
        assert_eq!(strip_titleformat(input), "\nBody");
    }

    const SAMPLES: &[&str] = &[
        "\\begin{figure}[H]\n\\begin{figure}{!H}\n\\begin{figure}[t]\n",
        r"$V_{q\_rms} + x^{a\_b\_c}$ file\_name",
        r"$P = U \text{ Вт} + \text{if } x$",
        r"$U_{вх} + I^{макс} + V_{max} + V_{1п}$",
        "\\label{a}\n\\label{a} x\n% \\label{b}\n\\label{b}\\label{b}\n",
        "\\begin{titlepage}\nУніверситет\n\\end{titlepage}\n\\tableofcontents\n\\newpage\n\\setcounter{page}{2}\n",
        "\\titleformat{\\section}{\\bfseries}{\\thesection.}{0.5em}{}\nBody\n",
    ];

    #[test]
    fn every_rule_is_a_fixed_point() {
        for rule in NormalizeRule::ORDER {
            for sample in SAMPLES {
                let once = rule.apply(sample);
                assert_eq!(rule.apply(&once), once, "rule {} on {sample:?}", rule.name());
            }
        }
    }

    #[test]
    fn normalize_settles_after_one_pass() {
        let config = RoundTripConfig::default();
        let doc: String = SAMPLES.concat();
        let once = normalize_unit("titlepage.tex", &doc, &config);
        assert!(!once.rules_applied.is_empty());
        let twice = normalize_unit("titlepage.tex", &once.text, &config);
        assert_eq!(twice.text, once.text);
        assert!(twice.rules_applied.is_empty());
        assert_eq!(twice.duplicate_labels, 0);
    }

    #[test]
    fn rules_compose_in_order() {
        let config = RoundTripConfig::default();
        let input = r"\begin{figure}[H]
$V_{q\_rms} + U_{вх} \text{ В}$
\label{eq:1}\label{eq:1}";
        let r = normalize_unit("ch2.tex", input, &config);
        assert!(r.text.contains(r"\begin{figure}[htbp]"));
        assert!(r.text.contains(r"V_{q{\text{-}}rms}"));
        assert!(r.text.contains(r"U_{\textrm{вх}}"));
        assert!(r.text.contains(r"\textrm{ В}"));
        assert!(r.text.ends_with(r"\label{eq:1} % duplicate: \label{eq:1}"));
        assert_eq!(r.duplicate_labels, 1);
    }
}

//! Plain-text extraction for diffing an original against its round trip.
//!
//! Strips comments, the preamble and most markup, keeping only what a reader
//! would compare: prose, math, section titles (`## …`), captions
//! (`[Caption: …]`), references (`[ref:x]`), images (`[IMAGE]`) and equation
//! markers (`[EQ]`).

use crate::pipeline::tex::comment_start;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Ordered substitutions applied after comments and preamble are gone.
static MARKUP_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        // Equations become markers.
        (r"\\begin\{equation\}", "[EQ]"),
        (r"\\end\{equation\}", "[/EQ]"),
        // Float wrappers go, captions stay.
        (r"\\begin\{(?:figure|table|longtable|tabular)\}(?:\[[^\]]*\])?(?:\{[^}]*\})?\s*", ""),
        (r"\\end\{(?:figure|table|longtable|tabular)\}", ""),
        // Table boilerplate.
        (r"(?m)\\(?:toprule|midrule|bottomrule|endhead|endfirsthead|endlastfoot|tabularnewline).*$", ""),
        (r"(?m)\\begin\{minipage\}.*$", ""),
        (r"\\end\{minipage\}", ""),
        // Headings.
        (r"\\section\*?\{([^}]+)\}", "\n## $1\n"),
        (r"\\subsection\*?\{([^}]+)\}", "\n### $1\n"),
        (r"\\subsubsection\*?\{([^}]+)\}", "\n#### $1\n"),
        (r"\\caption\{([^}]+)\}", "[Caption: $1]"),
        (r"\\(?:textbf|textit|texttt|emph)\{([^}]+)\}", "$1"),
        // Anchors and references.
        (r"\\label\{[^}]+\}", ""),
        (r"\\ref\{([^}]+)\}", "[ref:$1]"),
        (r"\\hyperref\[([^\]]+)\]\{[^}]*\}", "[ref:$1]"),
        (r"\\includegraphics(?:\[[^\]]*\])?\{[^}]+\}", "[IMAGE]"),
        // Layout commands.
        (r"\\(?:centering|hline|newpage|noindent|clearpage|pagebreak)\b", ""),
        (r"\\(?:begin|end)\{[^}]+\}", ""),
        (r"\\item\b", "- "),
        (r"\\(?:hfill|vfill|vspace|hspace)\{[^}]*\}", ""),
        (r"\\(?:def|let|renewcommand|newcommand)[^{]*\{[^}]*\}", ""),
    ]
    .into_iter()
    .map(|(p, r)| (Regex::new(p).unwrap(), r))
    .collect()
});

static RE_COMMAND: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\[a-zA-Z]+\{?").unwrap());
static RE_BRACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[{}]").unwrap());
static RE_BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());
static RE_HSPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());

/// Readable text of a LaTeX document.
pub fn extract_text(tex: &str) -> String {
    let without_comments: String = tex
        .split('\n')
        .map(|line| &line[..comment_start(line).unwrap_or(line.len())])
        .collect::<Vec<_>>()
        .join("\n");

    let mut body = without_comments.as_str();
    if let Some(pos) = body.find("\\begin{document}") {
        body = &body[pos + "\\begin{document}".len()..];
    }
    if let Some(pos) = body.find("\\end{document}") {
        body = &body[..pos];
    }

    let mut text = MARKUP_RULES
        .iter()
        .fold(body.to_string(), |acc, (re, rep)| re.replace_all(&acc, *rep).into_owned());

    // Commands that take no argument vanish; those with one keep their text.
    text = RE_COMMAND
        .replace_all(&text, |caps: &Captures<'_>| {
            if caps[0].ends_with('{') {
                caps[0].to_string()
            } else {
                String::new()
            }
        })
        .into_owned();

    text = RE_BRACES.replace_all(&text, "").into_owned();
    text = text.replace('&', " | ").replace("\\\\", "").replace('~', " ");
    text = RE_BLANK_RUNS.replace_all(&text, "\n\n").into_owned();
    text = RE_HSPACE.replace_all(&text, " ").into_owned();

    let mut out: Vec<&str> = Vec::new();
    let mut prev_empty = false;
    for line in text.split('\n').map(str::trim) {
        if line.is_empty() {
            if !prev_empty {
                out.push("");
            }
            prev_empty = true;
        } else {
            out.push(line);
            prev_empty = false;
        }
    }
    out.join("\n").trim().to_string()
}

//! Minimal preamble for restored documents that lack one.
//!
//! The reverse converter emits a body-only document. Wrapping it in a
//! preamble that matches the thesis class makes the output compile with
//! xelatex without hand-editing.

/// Preamble used when [`crate::config::RoundTripConfig::preamble`] is unset.
pub const DEFAULT_PREAMBLE: &str = r"\documentclass[14pt,a4paper]{extarticle}

\usepackage{fontspec}
\setmainfont{Times New Roman}

\usepackage[ukrainian]{babel}
\usepackage{geometry}
\usepackage{graphicx}
\usepackage{indentfirst}
\usepackage{fancyhdr}
\usepackage{amsmath}
\usepackage{tocloft}
\usepackage{xcolor}
\usepackage{titlesec}
\usepackage{hyperref}

\titleformat{\section}
  {\raggedright\normalfont\Large\bfseries}
  {РОЗДІЛ \thesection.}
  {0.5em}
  {\MakeUppercase}

\titleformat{\subsection}
  {\normalfont\large\bfseries}
  {\thesubsection}
  {0.5em}
  {}

\renewcommand{\cftsecpresnum}{РОЗДІЛ~}
\renewcommand{\cftsecaftersnum}{. }
\setlength{\cftsecnumwidth}{6em}

\geometry{left=3cm,right=1.5cm,top=2cm,bottom=2cm}
\linespread{1.5}

\begin{document}
";

/// Wrap `text` in `preamble … \end{document}` unless it already has a
/// `\documentclass`. Returns the text and whether it was wrapped.
pub fn ensure_preamble(text: &str, preamble: Option<&str>) -> (String, bool) {
    if text.contains("\\documentclass") {
        return (text.to_string(), false);
    }
    let preamble = preamble.unwrap_or(DEFAULT_PREAMBLE);
    let mut out = String::with_capacity(preamble.len() + text.len() + 20);
    out.push_str(preamble);
    if !preamble.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(text);
    out.push_str("\n\\end{document}\n");
    (out, true)
}

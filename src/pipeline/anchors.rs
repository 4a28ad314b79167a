//! Anchor restoration: put `\label{…}`s back after the round trip.
//!
//! The intermediate format keeps captions but drops the labels attached to
//! them. A [`CaptionIndex`] built from the original sources remembers which
//! label followed which caption text; [`restore_anchors`] re-attaches each
//! label to the first matching caption that has none.
//!
//! Captions are matched on exact text and each index entry is consumed at
//! most once. Entries are kept in source order (units in lexical path order,
//! then position inside the unit), so two identical captions bind to the
//! first and second unlabelled occurrence in the restored document.

use crate::output::AnchorOutcome;
use crate::pipeline::input::SourceUnit;
use crate::pipeline::tex::braced_arg;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

const CAPTION: &str = "\\caption";
const LABEL: &str = "\\label";

/// What an anchor was attached to in the original source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum CaptionKey {
    /// `\caption{text}\label{name}`.
    Caption(String),
    /// `\begin{equation}\label{name}`; no caption to match on.
    Equation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionEntry {
    pub label: String,
    pub key: CaptionKey,
}

/// Ordered label → caption table built from the original sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionIndex {
    entries: Vec<CaptionEntry>,
}

static RE_EQUATION_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\begin\{equation\}\s*\\label\{([^}]+)\}").unwrap());

impl CaptionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the index from units already in lexical path order.
    pub fn from_units(units: &[SourceUnit]) -> Self {
        let mut index = Self::new();
        for unit in units {
            let before = index.len();
            index.scan(&unit.text);
            debug!("{}: {} anchors indexed", unit.path, index.len() - before);
        }
        index
    }

    /// Append the anchors found in `text`, in position order.
    ///
    /// A label already in the index is ignored: the first occurrence wins.
    pub fn scan(&mut self, text: &str) {
        let mut found: Vec<(usize, CaptionEntry)> = caption_labels(text);
        found.extend(RE_EQUATION_LABEL.captures_iter(text).filter_map(|caps| {
            let m = caps.get(0)?;
            Some((
                m.start(),
                CaptionEntry {
                    label: caps[1].trim().to_string(),
                    key: CaptionKey::Equation,
                },
            ))
        }));
        found.sort_by_key(|(pos, _)| *pos);

        let mut known: HashSet<String> = self.entries.iter().map(|e| e.label.clone()).collect();
        for (_, entry) in found {
            if known.insert(entry.label.clone()) {
                self.entries.push(entry);
            }
        }
    }

    pub fn entries(&self) -> &[CaptionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, label: &str) -> Option<&CaptionKey> {
        self.entries
            .iter()
            .find(|e| e.label == label)
            .map(|e| &e.key)
    }

    /// Append a caption entry unless the label is already indexed.
    pub fn push_caption(&mut self, label: impl Into<String>, caption: impl Into<String>) {
        let label = label.into();
        if self.get(&label).is_none() {
            self.entries.push(CaptionEntry {
                label,
                key: CaptionKey::Caption(caption.into()),
            });
        }
    }
}

/// `(position, entry)` for every `\caption{…}` directly followed by `\label{…}`.
fn caption_labels(text: &str) -> Vec<(usize, CaptionEntry)> {
    let mut out = Vec::new();
    let mut cursor = 0;
    while let Some(pos) = text[cursor..].find(CAPTION) {
        let start = cursor + pos;
        let open = start + CAPTION.len();
        cursor = open;
        let Some((caption, after)) = braced_arg(text, open) else {
            continue;
        };
        cursor = after;
        let Some(label) = label_at(text, after) else {
            continue;
        };
        let caption = caption.trim();
        if caption.is_empty() {
            continue;
        }
        out.push((
            start,
            CaptionEntry {
                label: label.trim().to_string(),
                key: CaptionKey::Caption(caption.to_string()),
            },
        ));
    }
    out
}

/// The `\label{…}` argument starting at `at` (after optional whitespace).
fn label_at(text: &str, at: usize) -> Option<&str> {
    let rest = &text[at..];
    let skipped = rest.len() - rest.trim_start().len();
    let label_start = at + skipped;
    if !text[label_start..].starts_with("\\label{") {
        return None;
    }
    braced_arg(text, label_start + LABEL.len()).map(|(name, _)| name)
}

/// Re-attach labels to captions in `text`.
///
/// Returns the new text and one [`AnchorOutcome`] per index entry, in index
/// order.
pub fn restore_anchors(text: &str, index: &CaptionIndex) -> (String, Vec<AnchorOutcome>) {
    let mut out = text.to_string();
    let mut outcomes = Vec::with_capacity(index.len());

    for entry in index.entries() {
        let label = entry.label.clone();
        if out.contains(&format!("\\label{{{label}}}")) {
            outcomes.push(AnchorOutcome::AlreadyPresent { label });
            continue;
        }
        let caption = match &entry.key {
            CaptionKey::Equation => {
                outcomes.push(AnchorOutcome::EquationSkipped { label });
                continue;
            }
            CaptionKey::Caption(c) => c.clone(),
        };

        match find_unlabelled_caption(&out, &caption) {
            Some(insert_at) => {
                out.insert_str(insert_at, &format!("\\label{{{label}}}"));
                debug!("Restored \\label{{{label}}} after caption '{caption}'");
                outcomes.push(AnchorOutcome::Restored { label, caption });
            }
            None => {
                warn!("No unlabelled caption '{caption}' for label '{label}'");
                outcomes.push(AnchorOutcome::Unresolved { label, caption });
            }
        }
    }

    (out, outcomes)
}

/// Byte offset just past the first `\caption{caption}` not already followed
/// by a `\label`.
fn find_unlabelled_caption(text: &str, caption: &str) -> Option<usize> {
    let needle = format!("{CAPTION}{{{caption}}}");
    let mut cursor = 0;
    while let Some(pos) = text[cursor..].find(&needle) {
        let end = cursor + pos + needle.len();
        if label_at(text, end).is_none() {
            return Some(end);
        }
        cursor = end;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(path: &str, text: &str, ordinal: usize) -> SourceUnit {
        SourceUnit {
            path: path.into(),
            text: text.into(),
            ordinal,
        }
    }

    #[test]
    fn index_collects_captions_and_equations_in_order() {
        let text = "\\begin{figure}\\caption{Схема стенду}\n  \\label{fig:stand}\\end{figure}\n\
\\begin{equation}\\label{eq:ohm}U = IR\\end{equation}\n\
\\caption{Без мітки}\n\
\\caption{Таблиця \\textbf{1}}\\label{tab:1}";
        let index = CaptionIndex::from_units(&[unit("a.tex", text, 0)]);
        let labels: Vec<&str> = index.entries().iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["fig:stand", "eq:ohm", "tab:1"]);
        assert_eq!(
            index.get("fig:stand"),
            Some(&CaptionKey::Caption("Схема стенду".into()))
        );
        assert_eq!(index.get("eq:ohm"), Some(&CaptionKey::Equation));
        assert_eq!(
            index.get("tab:1"),
            Some(&CaptionKey::Caption("Таблиця \\textbf{1}".into()))
        );
    }

    #[test]
    fn first_label_occurrence_wins_across_units() {
        let units = [
            unit("a.tex", "\\caption{A}\\label{x}", 0),
            unit("b.tex", "\\caption{B}\\label{x}", 1),
        ];
        let index = CaptionIndex::from_units(&units);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("x"), Some(&CaptionKey::Caption("A".into())));
    }

    #[test]
    fn restores_missing_label() {
        let mut index = CaptionIndex::new();
        index.push_caption("fig:scheme", "Схема");
        let (out, outcomes) = restore_anchors("\\caption{Схема}\n", &index);
        assert_eq!(out, "\\caption{Схема}\\label{fig:scheme}\n");
        assert_eq!(
            outcomes,
            vec![AnchorOutcome::Restored {
                label: "fig:scheme".into(),
                caption: "Схема".into()
            }]
        );
    }

    #[test]
    fn each_entry_is_consumed_once() {
        let mut index = CaptionIndex::new();
        index.push_caption("fig:a", "Same");
        let text = "\\caption{Same}\n\\caption{Same}\n";
        let (out, _) = restore_anchors(text, &index);
        assert_eq!(out, "\\caption{Same}\\label{fig:a}\n\\caption{Same}\n");
    }

    #[test]
    fn identical_captions_bind_in_order() {
        let units = [
            unit("a.tex", "\\caption{Same}\\label{fig:a}", 0),
            unit("b.tex", "\\caption{Same}\\label{fig:b}", 1),
        ];
        let index = CaptionIndex::from_units(&units);
        let (out, _) = restore_anchors("\\caption{Same}\n\\caption{Same}\n", &index);
        assert_eq!(
            out,
            "\\caption{Same}\\label{fig:a}\n\\caption{Same}\\label{fig:b}\n"
        );
    }

    #[test]
    fn present_equation_and_missing_outcomes() {
        let mut index = CaptionIndex::new();
        index.scan("\\begin{equation}\n\\label{eq:1}\nx\n\\end{equation}");
        index.push_caption("fig:here", "Here");
        index.push_caption("fig:gone", "Gone");
        let (out, outcomes) = restore_anchors("\\caption{Here} \\label{fig:here}", &index);
        assert_eq!(out, "\\caption{Here} \\label{fig:here}");
        assert_eq!(
            outcomes,
            vec![
                AnchorOutcome::EquationSkipped {
                    label: "eq:1".into()
                },
                AnchorOutcome::AlreadyPresent {
                    label: "fig:here".into()
                },
                AnchorOutcome::Unresolved {
                    label: "fig:gone".into(),
                    caption: "Gone".into()
                },
            ]
        );
    }

    #[test]
    fn index_serializes_as_json() {
        let mut index = CaptionIndex::new();
        index.push_caption("fig:1", "Схема");
        let json = serde_json::to_string(&index).unwrap();
        assert!(json.contains(r#""kind":"caption""#));
        let back: CaptionIndex = serde_json::from_str(&json).unwrap();
        assert_eq!(back, index);
    }
}

//! Listing transcoding between `lstlisting` and captioned `verbatim`.
//!
//! The converter keeps `verbatim` blocks intact but has no notion of a
//! numbered, captioned code listing. Two directions exist:
//!
//! * [`tag_listings`] - author side: an eligible `verbatim` block becomes
//!   `\begin{lstlisting}[caption={…}]`, the caption taken from the nearest
//!   preceding heading.
//! * [`render_listings`] - converter side: every captioned `lstlisting`
//!   becomes a centered bold "Лістинг N.M --- caption" line followed by a plain
//!   `verbatim` block, numbered through a [`ListingCounter`].
//!
//! Numbers depend on processing order, so units must be fed in lexical path
//! order with one counter for the whole run.

use crate::config::RoundTripConfig;
use crate::error::RoundTripError;
use crate::pipeline::tex::{braced_arg, check_balanced, scan_literals};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// How far back (in characters) to look for a `\textbf{…}` fallback caption.
pub const CAPTION_LOOKBACK_CHARS: usize = 500;

const VERBATIM_BEGIN: &str = "\\begin{verbatim}";
const VERBATIM_END: &str = "\\end{verbatim}";
const LISTING_BEGIN: &str = "\\begin{lstlisting}";
const LISTING_END: &str = "\\end{lstlisting}";

/// Characters escaped inside a listing caption option.
const CAPTION_SPECIALS: [char; 4] = ['_', '#', '&', '%'];

static RE_HEADING_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\(?:sub){0,2}section\*?\{").unwrap());

static RE_TEXTBF_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\textbf\{").unwrap());

static RE_NUMBER_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\d+(?:\.\d+)*(?:\.\s*|\s+)").unwrap());

static RE_CHAPTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\(?:sub){0,2}section\*?\{\s*(\d+)[.\s]").unwrap());

// ── Counter state ────────────────────────────────────────────────────────────

/// Running listing count per chapter, shared by every unit of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingCounter {
    counts: BTreeMap<u32, u32>,
}

/// A `chapter.index` listing number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingNumber {
    pub chapter: u32,
    pub index: u32,
}

impl fmt::Display for ListingNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.chapter, self.index)
    }
}

impl ListingCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next number in `chapter`.
    pub fn next(&mut self, chapter: u32) -> ListingNumber {
        let count = self.counts.entry(chapter).or_insert(0);
        *count += 1;
        ListingNumber {
            chapter,
            index: *count,
        }
    }

    /// Listings numbered so far in `chapter`.
    pub fn count(&self, chapter: u32) -> u32 {
        self.counts.get(&chapter).copied().unwrap_or(0)
    }

    pub fn counts(&self) -> &BTreeMap<u32, u32> {
        &self.counts
    }
}

// ── Caption escaping ─────────────────────────────────────────────────────────

/// Escape `_ # & %` for use inside a LaTeX option value.
pub fn escape_caption(caption: &str) -> String {
    let mut out = String::with_capacity(caption.len() + 8);
    for c in caption.chars() {
        if CAPTION_SPECIALS.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Exact inverse of [`escape_caption`].
pub fn unescape_caption(caption: &str) -> String {
    let mut out = String::with_capacity(caption.len());
    let mut chars = caption.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if CAPTION_SPECIALS.contains(&next) {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

// ── Forward: verbatim → lstlisting ───────────────────────────────────────────

/// Result of tagging one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagResult {
    pub text: String,
    pub tagged: usize,
}

/// Wrap every eligible `verbatim` block as a captioned `lstlisting`.
///
/// Diagrams and short blocks are copied through byte for byte.
pub fn tag_listings(
    unit: &str,
    text: &str,
    config: &RoundTripConfig,
) -> Result<TagResult, RoundTripError> {
    check_balanced(unit, text, "verbatim")?;
    let classifier = config.classifier();

    let mut out = String::with_capacity(text.len() + 256);
    let mut last = 0;
    let mut tagged = 0;

    let blocks = scan_literals(text).blocks;
    for block in blocks.iter().filter(|b| b.environment == "verbatim") {
        let span = block.span.clone();
        out.push_str(&text[last..span.start]);
        let whole = &text[span.clone()];
        let body = &whole[VERBATIM_BEGIN.len()..whole.len() - VERBATIM_END.len()];

        if classifier.is_transcodable(body) {
            let caption = derive_caption(&text[..span.start], &config.placeholder_caption);
            debug!("{unit}: tagging listing \"{caption}\"");
            out.push_str(LISTING_BEGIN);
            out.push_str("[caption={");
            out.push_str(&escape_caption(&caption));
            out.push_str("}]");
            out.push_str(body.trim_end());
            out.push('\n');
            out.push_str(LISTING_END);
            tagged += 1;
        } else {
            out.push_str(whole);
        }
        last = span.end;
    }
    out.push_str(&text[last..]);

    Ok(TagResult { text: out, tagged })
}

/// Plain-text caption for a block preceded by `before`.
///
/// Most recent heading with its number stripped, else the most recent
/// `\textbf{…}` in the last [`CAPTION_LOOKBACK_CHARS`] characters, else
/// `placeholder`.
pub fn derive_caption(before: &str, placeholder: &str) -> String {
    if let Some(heading) = last_group(&RE_HEADING_OPEN, before) {
        let plain = unescape_caption(heading);
        let stripped = RE_NUMBER_PREFIX.replace(&plain, "");
        let title = stripped.trim();
        if !title.is_empty() {
            return title.to_string();
        }
    }

    let window_start = before
        .char_indices()
        .rev()
        .nth(CAPTION_LOOKBACK_CHARS - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    if let Some(bold) = last_group(&RE_TEXTBF_OPEN, &before[window_start..]) {
        let title = unescape_caption(bold);
        let title = title.trim().trim_end_matches('.').trim_end();
        if !title.is_empty() {
            return title.to_string();
        }
    }

    placeholder.to_string()
}

/// Braced argument following the last match of `open_re` (which ends in `{`).
fn last_group<'a>(open_re: &Regex, haystack: &'a str) -> Option<&'a str> {
    open_re
        .find_iter(haystack)
        .filter_map(|m| braced_arg(haystack, m.end() - 1).map(|(arg, _)| arg))
        .last()
}

// ── Reverse: lstlisting → captioned verbatim ─────────────────────────────────

/// Result of numbering one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderResult {
    pub text: String,
    pub numbers: Vec<ListingNumber>,
}

/// Replace each captioned `lstlisting` with a numbered caption line and a
/// plain `verbatim` block, advancing `counter`.
///
/// Listings without a `caption=` option are left as they are.
pub fn render_listings(
    unit: &str,
    text: &str,
    counter: &mut ListingCounter,
    config: &RoundTripConfig,
) -> Result<RenderResult, RoundTripError> {
    check_balanced(unit, text, "lstlisting")?;

    let mut out = String::with_capacity(text.len() + 256);
    let mut numbers = Vec::new();
    let mut cursor = 0;

    let blocks = scan_literals(text).blocks;
    for block in blocks.iter().filter(|b| b.environment == "lstlisting") {
        let start = block.span.start;
        let stop = block.span.end;
        let inner_start = start + LISTING_BEGIN.len();
        let inner_end = stop - LISTING_END.len();

        out.push_str(&text[cursor..start]);
        match parse_caption_option(&text[inner_start..inner_end]) {
            Some((caption, body_offset)) => {
                let body = &text[inner_start + body_offset..inner_end];
                let number = counter.next(chapter_before(&text[..start]));
                debug!("{unit}: listing {number}");
                out.push_str(&format!(
                    "\\begin{{center}}\n\\textbf{{{} {} --- {}}}\n\\end{{center}}\n",
                    config.listing_prefix,
                    number,
                    escape_caption(&unescape_caption(caption))
                ));
                out.push_str(VERBATIM_BEGIN);
                out.push_str(body);
                out.push_str(VERBATIM_END);
                numbers.push(number);
            }
            None => out.push_str(&text[start..stop]),
        }
        cursor = stop;
    }
    out.push_str(&text[cursor..]);

    Ok(RenderResult { text: out, numbers })
}

/// Chapter of the nearest numbered heading in `before`, or 0.
pub fn chapter_before(before: &str) -> u32 {
    RE_CHAPTER
        .captures_iter(before)
        .last()
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(0)
}

/// Parse `[…caption={X}…]` at the start of a listing.
///
/// Returns the raw caption and the offset where the code body starts.
fn parse_caption_option(inner: &str) -> Option<(&str, usize)> {
    if !inner.starts_with('[') {
        return None;
    }
    let bytes = inner.as_bytes();
    let mut depth = 0usize;
    let mut close = None;
    for (i, &b) in bytes.iter().enumerate().skip(1) {
        match b {
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b']' if depth == 0 => {
                close = Some(i);
                break;
            }
            _ => {}
        }
    }
    let close = close?;
    let options = &inner[1..close];

    let key = options.find("caption=")?;
    let value_start = key + "caption=".len();
    let caption = if options[value_start..].starts_with('{') {
        braced_arg(options, value_start)?.0
    } else {
        let rest = &options[value_start..];
        rest.split(',').next().unwrap_or("").trim()
    };
    Some((caption, close + 1))
}

//! Small LaTeX scanning helpers shared by the rewrite rules.
//!
//! The `regex` crate has no look-around and no recursion, so anything that
//! needs balanced braces, escape awareness or environment extents goes
//! through these byte scanners instead. All returned offsets sit on ASCII
//! bytes and are therefore valid `str` boundaries.

use crate::error::RoundTripError;
use std::ops::Range;

/// Index of the `}` closing the `{` at `open`, honouring nesting and `\{`/`\}`.
pub fn matching_brace(s: &str, open: usize) -> Option<usize> {
    let bytes = s.as_bytes();
    if bytes.get(open) != Some(&b'{') {
        return None;
    }
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Content of the braced group starting at `open`, plus the index just past it.
pub fn braced_arg(s: &str, open: usize) -> Option<(&str, usize)> {
    let close = matching_brace(s, open)?;
    Some((&s[open + 1..close], close + 1))
}

/// Byte offset of the first unescaped `%` in `line`.
pub fn comment_start(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'%' => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

/// Environments whose bodies LaTeX reads character by character.
pub const LITERAL_ENVIRONMENTS: [&str; 2] = ["verbatim", "lstlisting"];

fn markers(env: &str) -> (String, String) {
    (format!("\\begin{{{env}}}"), format!("\\end{{{env}}}"))
}

/// One literal environment found by [`scan_literals`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralBlock {
    pub environment: &'static str,
    /// Markers included.
    pub span: Range<usize>,
    /// False when the text ends before the closing marker.
    pub terminated: bool,
}

/// Literal blocks, stray end markers and comments of a text, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiteralScan {
    pub blocks: Vec<LiteralBlock>,
    /// Environments of `\end{…}` markers met outside any block.
    pub stray_ends: Vec<&'static str>,
    /// `%` up to, not including, the end of its line.
    pub comments: Vec<Range<usize>>,
}

/// Tokenize `text` the way LaTeX sees literal environments.
///
/// Outside a block, `%` comments are skipped and `\x` pairs are consumed
/// whole, so `\%` and `\\` never start anything. Inside a block only the
/// first matching `\end{…}` counts: bodies do not nest and have no comments.
pub fn scan_literals(text: &str) -> LiteralScan {
    let envs: Vec<(&'static str, String, String)> = LITERAL_ENVIRONMENTS
        .iter()
        .map(|&env| {
            let (begin, end) = markers(env);
            (env, begin, end)
        })
        .collect();
    let bytes = text.as_bytes();
    let mut scan = LiteralScan::default();
    let mut i = 0;

    'outer: while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let stop = text[i..].find('\n').map_or(text.len(), |n| i + n);
                scan.comments.push(i..stop);
                i = stop;
            }
            b'\\' => {
                let rest = &text[i..];
                for (env, begin, end) in &envs {
                    if rest.starts_with(begin.as_str()) {
                        let body = i + begin.len();
                        let (stop, terminated) = match text[body..].find(end.as_str()) {
                            Some(e) => (body + e + end.len(), true),
                            None => (text.len(), false),
                        };
                        scan.blocks.push(LiteralBlock {
                            environment: *env,
                            span: i..stop,
                            terminated,
                        });
                        i = stop;
                        continue 'outer;
                    }
                    if rest.starts_with(end.as_str()) {
                        scan.stray_ends.push(*env);
                        i += end.len();
                        continue 'outer;
                    }
                }
                i += 2;
            }
            _ => i += 1,
        }
    }
    scan
}

/// Fail unless every `\begin{env}` outside comments is closed and no
/// `\end{env}` appears outside a block.
pub fn check_balanced(unit: &str, text: &str, env: &str) -> Result<(), RoundTripError> {
    let scan = scan_literals(text);
    let blocks: Vec<&LiteralBlock> = scan
        .blocks
        .iter()
        .filter(|b| b.environment == env)
        .collect();
    let stray = scan.stray_ends.iter().filter(|e| **e == env).count();
    let unterminated = blocks.iter().filter(|b| !b.terminated).count();

    if stray > 0 || unterminated > 0 {
        return Err(RoundTripError::UnbalancedBlock {
            unit: unit.to_string(),
            environment: env.to_string(),
            opened: blocks.len(),
            closed: blocks.len() - unterminated + stray,
        });
    }
    Ok(())
}

/// Literal blocks and comments: text no rewrite may touch. Sorted, disjoint.
pub fn protected_spans(text: &str) -> Vec<Range<usize>> {
    let scan = scan_literals(text);
    let mut spans: Vec<Range<usize>> = scan.blocks.into_iter().map(|b| b.span).collect();
    spans.extend(scan.comments);
    spans.sort_by_key(|r| r.start);
    spans
}

/// Apply `rewrite` to each stretch of text between protected spans.
pub fn map_unprotected(text: &str, mut rewrite: impl FnMut(&str) -> String) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in protected_spans(text) {
        out.push_str(&rewrite(&text[cursor..span.start]));
        out.push_str(&text[span.clone()]);
        cursor = span.end;
    }
    out.push_str(&rewrite(&text[cursor..]));
    out
}

/// True if `c` is a letter outside the Latin script (Cyrillic, Greek, …).
pub fn is_non_latin_letter(c: char) -> bool {
    c.is_alphabetic() && !is_latin(c)
}

fn is_latin(c: char) -> bool {
    matches!(c,
        'A'..='Z' | 'a'..='z'
        | '\u{00AA}' | '\u{00BA}'
        | '\u{00C0}'..='\u{00D6}' | '\u{00D8}'..='\u{00F6}' | '\u{00F8}'..='\u{024F}'
        | '\u{1E00}'..='\u{1EFF}' | '\u{2C60}'..='\u{2C7F}' | '\u{A720}'..='\u{A7FF}'
        | '\u{FB00}'..='\u{FB06}' | '\u{FF21}'..='\u{FF3A}' | '\u{FF41}'..='\u{FF5A}')
}

//! Block classification: is a `verbatim` block code, or a diagram?
//!
//! A heuristic, not a parser. Short blocks are not worth a numbered caption,
//! and blocks drawn with box/tree glyphs are alignment-sensitive ASCII art
//! that must never be reformatted.

use serde::{Deserialize, Serialize};

/// Fewer non-blank lines than this and a block stays a plain `verbatim`.
pub const MIN_LISTING_LINES: usize = 5;

/// A block where at least this percentage of non-blank lines carries a
/// diagram glyph is treated as a diagram.
pub const DIAGRAM_LINE_PERCENT: u32 = 30;

/// Corners, tees, crosses and rules used by ASCII/Unicode box drawings and
/// file trees.
pub const DIAGRAM_GLYPHS: &[char] = &[
    '+', '|', '├', '└', '┌', '┐', '┘', '┤', '┬', '┴', '┼', '─', '│',
];

/// Classification of a literal block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockClass {
    /// Box-drawing or tree diagram; left untouched.
    Diagram,
    /// Code worth a numbered listing.
    Eligible,
    /// Below the line-count floor.
    TooShort,
}

/// Threshold-carrying classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockClassifier {
    pub min_lines: usize,
    pub diagram_percent: u32,
}

impl Default for BlockClassifier {
    fn default() -> Self {
        Self {
            min_lines: MIN_LISTING_LINES,
            diagram_percent: DIAGRAM_LINE_PERCENT,
        }
    }
}

impl BlockClassifier {
    pub fn new(min_lines: usize, diagram_percent: u32) -> Self {
        Self {
            min_lines,
            diagram_percent,
        }
    }

    /// Classify the body of a literal block.
    pub fn classify(&self, body: &str) -> BlockClass {
        let lines: Vec<&str> = body.lines().filter(|l| !l.trim().is_empty()).collect();
        if lines.len() < self.min_lines {
            return BlockClass::TooShort;
        }

        let art = lines.iter().filter(|l| is_diagram_line(l)).count();
        // Integer form of `art / lines >= percent / 100`.
        if art * 100 >= lines.len() * self.diagram_percent as usize {
            return BlockClass::Diagram;
        }

        BlockClass::Eligible
    }

    /// True if the block should become a numbered listing.
    pub fn is_transcodable(&self, body: &str) -> bool {
        self.classify(body) == BlockClass::Eligible
    }
}

fn is_diagram_line(line: &str) -> bool {
    line.contains(DIAGRAM_GLYPHS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(n: usize) -> String {
        (0..n).map(|i| format!("let x{i} = {i};\n")).collect()
    }

    #[test]
    fn rejects_short_blocks_regardless_of_content() {
        let c = BlockClassifier::default();
        assert_eq!(c.classify(&code(4)), BlockClass::TooShort);
        assert_eq!(c.classify(""), BlockClass::TooShort);
        // Blank lines do not count toward the floor.
        let padded = format!("\n\n{}\n\n\n", code(4));
        assert_eq!(c.classify(&padded), BlockClass::TooShort);
    }

    #[test]
    fn accepts_five_code_lines() {
        let c = BlockClassifier::default();
        assert_eq!(c.classify(&code(5)), BlockClass::Eligible);
        assert!(c.is_transcodable(&code(12)));
    }

    #[test]
    fn file_tree_is_a_diagram() {
        let tree = "project/\n├── src/\n│   ├── main.rs\n│   └── lib.rs\n└── Cargo.toml\n";
        let c = BlockClassifier::default();
        assert_eq!(c.classify(tree), BlockClass::Diagram);
    }

    #[test]
    fn thirty_percent_boundary_is_exact() {
        let c = BlockClassifier::default();
        // 3 of 10 lines carry a glyph: exactly 30% → diagram.
        let mut body = code(7);
        body.push_str("+-----+\n| box |\n+-----+\n");
        assert_eq!(c.classify(&body), BlockClass::Diagram);

        // 2 of 10 lines: 20% → still code.
        let mut body = code(8);
        body.push_str("a | b\nc + d\n");
        assert_eq!(c.classify(&body), BlockClass::Eligible);
    }

    #[test]
    fn thresholds_are_configurable() {
        let strict = BlockClassifier::new(2, 50);
        assert_eq!(strict.classify("a\nb\n"), BlockClass::Eligible);
        assert_eq!(strict.classify("a\n│ b\n"), BlockClass::Diagram);
    }
}

//! Line/indent emission for synthesized code.
//!
//! The rewriter lays out rewritten functions as [`Line`]s holding an indent
//! *level* and the line text without leading whitespace; [`Emitted::render`]
//! applies the indent unit. Keeping levels symbolic until the very end is what
//! makes the output satisfy the layout contract (every block body exactly one
//! level deeper than its header) by construction.

/// Spaces per indent level in rewritten output.
pub const INDENT: usize = 4;

#[derive(Debug, Clone)]
pub struct Line {
    pub indent: usize,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct Emitted {
    pub lines: Vec<Line>,
}

impl Emitted {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, indent: usize, text: impl Into<String>) {
        self.lines.push(Line {
            indent,
            text: text.into(),
        });
    }

    pub fn blank(&mut self) {
        self.lines.push(Line {
            indent: 0,
            text: String::new(),
        });
    }

    /// Appends `other`, shifting its lines deeper by `shift` levels.
    pub fn extend(&mut self, other: Emitted, shift: usize) {
        for mut line in other.lines {
            line.indent += shift;
            self.lines.push(line);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Renders with `INDENT` spaces per level. No trailing newline: the caller
    /// re-attaches the statement's original separator trivia.
    pub fn render(&self, base: usize) -> String {
        let mut out = String::new();
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            if line.text.is_empty() {
                continue;
            }
            for _ in 0..(base + line.indent) * INDENT {
                out.push(' ');
            }
            out.push_str(&line.text);
        }
        out
    }
}

//! Structural layout check for rewritten output.
//!
//! Rewritten functions are laid out so every line's leading whitespace is an
//! exact multiple of the indent unit and each block body sits one level deeper
//! than its header. [`verify_layout`] walks a rendered text and checks that
//! contract line by line. It works on the normalized shape the emitter
//! produces (lines never carry string literals containing braces), so it is a
//! test-side oracle rather than a general-purpose validator.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutError {
    /// 1-based line number.
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for LayoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for LayoutError {}

/// Checks indentation against `unit` spaces per brace depth.
pub fn verify_layout(text: &str, unit: usize) -> Result<(), LayoutError> {
    let mut depth: usize = 0;
    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim_start();
        let content = trimmed.trim_end();
        if content.is_empty() {
            continue;
        }
        let lead = raw.len() - trimmed.len();

        let expect = if content.starts_with('}') {
            depth.checked_sub(1).ok_or_else(|| LayoutError {
                line,
                message: "unbalanced `}`".to_string(),
            })?
        } else {
            depth
        };

        if lead != expect * unit {
            return Err(LayoutError {
                line,
                message: format!(
                    "expected {} leading spaces, found {}",
                    expect * unit,
                    lead
                ),
            });
        }

        depth = if content.ends_with('{') {
            expect + 1
        } else {
            expect
        };
    }
    if depth != 0 {
        return Err(LayoutError {
            line: text.lines().count(),
            message: format!("{depth} unclosed block(s)"),
        });
    }
    Ok(())
}

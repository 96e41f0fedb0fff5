//! Byte-offset to line/column mapping over one source text.
//!
//! Diagnostic spans carry byte offsets; rendering wants 1-based line/column
//! plus the offending source line. Line starts are collected once up front so
//! lookups are a binary search.

pub struct SourceMap<'a> {
    src: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> SourceMap<'a> {
    pub fn new(src: &'a str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in src.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self { src, line_starts }
    }

    /// Returns (line, col), both 1-based.
    pub fn line_col(&self, byte: u32) -> (usize, usize) {
        let b = byte as usize;
        let line_idx = match self.line_starts.binary_search(&b) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let col = b.saturating_sub(self.line_starts[line_idx]);
        (line_idx + 1, col + 1)
    }

    /// The text of a 1-based line, without its trailing newline.
    pub fn line_text(&self, line: usize) -> &'a str {
        let Some(&start) = self.line_starts.get(line.saturating_sub(1)) else {
            return "";
        };
        let end = match self.line_starts.get(line) {
            Some(&next) => next - 1,
            None => self.src.len(),
        };
        &self.src[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::SourceMap;

    #[test]
    fn test_line_col_and_line_text() {
        let sm = SourceMap::new("ab\ncd\nlast");
        assert_eq!(sm.line_col(0), (1, 1));
        assert_eq!(sm.line_col(4), (2, 2));
        assert_eq!(sm.line_col(6), (3, 1));
        assert_eq!(sm.line_text(1), "ab");
        assert_eq!(sm.line_text(2), "cd");
        assert_eq!(sm.line_text(3), "last");
        assert_eq!(sm.line_text(4), "");
    }
}

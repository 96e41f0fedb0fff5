//! Statement and block model over the lossless token stream.
//!
//! A [`Statement`] is an ordered, contiguous slice of tokens. Statements of a
//! block partition its token range with no gaps and no overlap: every statement
//! owns its leading trivia and its trailing separator (newline or `;`), so
//! concatenating `Statement::text()` over a block reproduces the block's
//! source exactly.
//!
//! All index ranges here follow the half-open `[lo, hi)` convention and all
//! scans treat [`Token::is_trivia`] as the sole trivia definition.

use crate::lexer::{Span, Token, TokenKind, render_tokens};

#[derive(Debug, Clone)]
pub struct Statement {
    pub tokens: Vec<Token>,
}

impl Statement {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }

    /// Exact source text of this statement.
    pub fn text(&self) -> String {
        render_tokens(&self.tokens)
    }

    /// Index of the first non-trivia token, if any.
    pub fn first_content(&self) -> Option<usize> {
        self.tokens.iter().position(|t| !t.is_trivia())
    }

    /// Index of the last non-trivia token, if any.
    pub fn last_content(&self) -> Option<usize> {
        self.tokens.iter().rposition(|t| !t.is_trivia())
    }

    pub fn is_trivia_only(&self) -> bool {
        self.first_content().is_none()
    }

    /// The source span of the statement's content (empty for trivia-only statements).
    pub fn span(&self) -> Span {
        match (self.first_content(), self.last_content()) {
            (Some(lo), Some(hi)) => Span::new(self.tokens[lo].span.start, self.tokens[hi].span.end),
            _ => Span::SYNTHETIC,
        }
    }

    /// Leading whitespace of the line the statement's content starts on.
    pub fn indent(&self) -> String {
        let mut indent = String::new();
        for tok in &self.tokens {
            match &tok.kind {
                TokenKind::Newline => indent.clear(),
                TokenKind::Whitespace(sym) => indent.push_str(&sym.text),
                kind if kind.is_comment() => indent.clear(),
                _ => break,
            }
        }
        indent
    }
}

/// Returns the nearest non-trivia token index strictly before `idx`.
pub fn prev_nontrivia(tokens: &[Token], idx: usize) -> Option<usize> {
    let idx = idx.min(tokens.len());
    tokens[..idx].iter().rposition(|t| !t.is_trivia())
}

/// Returns the nearest non-trivia token index at or after `idx`.
pub fn next_nontrivia(tokens: &[Token], idx: usize) -> Option<usize> {
    let idx = idx.min(tokens.len());
    tokens[idx..]
        .iter()
        .position(|t| !t.is_trivia())
        .map(|p| idx + p)
}

fn depth_delta(kind: &TokenKind) -> i32 {
    match kind {
        TokenKind::OpenParen | TokenKind::OpenBracket | TokenKind::OpenBrace => 1,
        TokenKind::CloseParen | TokenKind::CloseBracket | TokenKind::CloseBrace => -1,
        _ => 0,
    }
}

/// Index of the closer matching the opener at `open`, if brackets balance.
pub fn matching_close(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0i32;
    for (i, tok) in tokens.iter().enumerate().skip(open) {
        depth += depth_delta(&tok.kind);
        if depth == 0 {
            return Some(i);
        }
    }
    None
}

/// Splits a token list (a file or a block interior) into top-level statements.
///
/// Statement boundaries are newline or `;` tokens at bracket depth zero. A
/// newline does not split when the next non-trivia token is `rescue` or
/// `finally`, so a handler chain written across lines stays one statement.
/// The EOF token, if present, is dropped.
pub fn split_statements(tokens: &[Token]) -> Vec<Statement> {
    let mut stmts = Vec::new();
    let mut current: Vec<Token> = Vec::new();
    let mut depth = 0i32;

    for (i, tok) in tokens.iter().enumerate() {
        if matches!(tok.kind, TokenKind::Eof) {
            break;
        }
        depth += depth_delta(&tok.kind);
        if depth < 0 {
            // Unbalanced closer: treat as depth zero and keep going.
            depth = 0;
        }
        current.push(tok.clone());

        let splits = match tok.kind {
            TokenKind::Semi => depth == 0,
            TokenKind::Newline => {
                depth == 0
                    && !matches!(
                        next_nontrivia(tokens, i + 1).map(|j| &tokens[j].kind),
                        Some(TokenKind::Rescue) | Some(TokenKind::Finally)
                    )
            }
            _ => false,
        };
        if splits {
            stmts.push(Statement::new(std::mem::take(&mut current)));
        }
    }
    if !current.is_empty() {
        stmts.push(Statement::new(current));
    }
    stmts
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockRole {
    Body,
    Rescue,
    Finally,
}

/// A depth-zero brace group within a statement.
///
/// `open` and `close` are token indices of the braces themselves; the block
/// interior is `[open + 1, close)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub open: usize,
    pub close: usize,
    pub role: BlockRole,
}

impl BlockRange {
    /// Half-open token-index range of the block interior.
    pub fn interior(&self) -> (usize, usize) {
        (self.open + 1, self.close)
    }
}

/// Returns the statement's depth-zero brace blocks in order, tagged by role.
///
/// The role is `Body` until a depth-zero `rescue` or `finally` keyword is
/// seen, after which the next block carries that handler's role.
pub fn block_ranges(stmt: &Statement) -> Vec<BlockRange> {
    let mut ranges = Vec::new();
    let mut role = BlockRole::Body;
    let mut depth = 0i32;
    let mut i = 0;
    while i < stmt.tokens.len() {
        let tok = &stmt.tokens[i];
        if depth == 0 {
            match tok.kind {
                TokenKind::Rescue => role = BlockRole::Rescue,
                TokenKind::Finally => role = BlockRole::Finally,
                TokenKind::OpenBrace => {
                    if let Some(close) = matching_close(&stmt.tokens, i) {
                        ranges.push(BlockRange {
                            open: i,
                            close,
                            role,
                        });
                        i = close + 1;
                        continue;
                    }
                }
                _ => {}
            }
        }
        depth += depth_delta(&tok.kind);
        if depth < 0 {
            depth = 0;
        }
        i += 1;
    }
    ranges
}

/// Renders a token slice to a single normalized line: comments dropped, every
/// trivia run collapsed to one space, leading/trailing trivia trimmed.
pub fn normalize_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut pending_space = false;
    for tok in tokens {
        if tok.is_trivia() {
            pending_space = true;
            continue;
        }
        if matches!(tok.kind, TokenKind::Eof) {
            break;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push_str(tok.text());
    }
    out
}

//! Statement classification and deferred-call detection.
//!
//! The rewriter dispatches on a statement's *shape* rather than re-scanning
//! token text at every step: [`classify`] folds a statement into the tagged
//! [`StmtShape`] union once, validating the deferred-call surface syntax as it
//! goes. Malformations come back as typed [`Malformation`]s so the caller can
//! apply the active error policy.

use crate::diagnostics::DiagnosticCode;
use crate::lexer::{Span, Token, TokenKind};
use crate::stmt::{BlockRole, Statement, block_ranges, next_nontrivia, prev_nontrivia};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredVariant {
    Plain,
    Repeat,
    Ignore,
}

/// A deferred-call point at bracket depth zero of a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredPoint {
    pub variant: DeferredVariant,
    /// Index of the `later` token.
    pub later_idx: usize,
    /// Index of the suffix-terminating `:`.
    pub colon_idx: usize,
    /// Index of the call's closing `)` the suffix follows.
    pub close_idx: usize,
    /// First token of the call expression (past `var NAME =` when bound).
    pub call_start: usize,
    /// The `var NAME =` binding, if the result is bound.
    pub binding: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StmtShape {
    /// Trivia only: blank lines and standalone comments.
    Empty,
    /// A nested `fn` definition (rewritten as its own function).
    FnDef,
    /// `return`, `return expr`, or the deferred `return later expr`.
    Return { deferred: bool },
    /// `await NAME`.
    Await { name: String },
    /// A `do { .. } [rescue ..] [finally ..]` statement.
    Do {
        has_rescue: bool,
        has_finally: bool,
    },
    /// A statement with exactly one depth-zero deferred-call point.
    Deferred(DeferredPoint),
    /// Anything else; recursed into for nested blocks, otherwise untouched.
    Generic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Malformation {
    pub code: DiagnosticCode,
    pub span: Span,
    pub message: String,
}

impl Malformation {
    fn new(code: DiagnosticCode, span: Span, message: impl Into<String>) -> Self {
        Self {
            code,
            span,
            message: message.into(),
        }
    }
}

/// Classifies one statement, validating deferred-call and do/rescue syntax.
pub fn classify(stmt: &Statement) -> Result<StmtShape, Malformation> {
    let Some(first) = stmt.first_content() else {
        return Ok(StmtShape::Empty);
    };
    let tokens = &stmt.tokens;

    match tokens[first].kind {
        TokenKind::Fn => {
            if block_ranges(stmt).is_empty() {
                return Ok(StmtShape::Generic);
            }
            return Ok(StmtShape::FnDef);
        }
        TokenKind::Return => {
            let later = next_nontrivia(tokens, first + 1)
                .filter(|&i| matches!(tokens[i].kind, TokenKind::Later));
            // Only the `return later` keyword position is legal; a suffix
            // buried in the value expression cannot be rewritten here.
            let mut depth = 0i32;
            for (i, tok) in tokens.iter().enumerate() {
                match tok.kind {
                    TokenKind::OpenParen | TokenKind::OpenBracket | TokenKind::OpenBrace => {
                        depth += 1
                    }
                    TokenKind::CloseParen | TokenKind::CloseBracket | TokenKind::CloseBrace => {
                        depth -= 1
                    }
                    TokenKind::Later if depth == 0 && later != Some(i) => {
                        return Err(Malformation::new(
                            DiagnosticCode::SuffixInReturnValue,
                            tok.span,
                            "deferred-call suffix cannot appear inside a `return` value",
                        ));
                    }
                    _ => {}
                }
            }
            return Ok(StmtShape::Return {
                deferred: later.is_some(),
            });
        }
        TokenKind::Await => {
            let Some(name_idx) = next_nontrivia(tokens, first + 1) else {
                return Err(Malformation::new(
                    DiagnosticCode::AwaitWithoutBinding,
                    tokens[first].span,
                    "`await` must be followed by a variable name",
                ));
            };
            let Some(name) = tokens[name_idx].ident_text() else {
                return Err(Malformation::new(
                    DiagnosticCode::AwaitWithoutBinding,
                    tokens[name_idx].span,
                    "`await` must be followed by a variable name",
                ));
            };
            return Ok(StmtShape::Await {
                name: name.to_string(),
            });
        }
        TokenKind::Do => return classify_do(stmt, first),
        _ => {}
    }

    match find_deferred_point(stmt)? {
        Some(point) => Ok(StmtShape::Deferred(point)),
        None => Ok(StmtShape::Generic),
    }
}

fn classify_do(stmt: &Statement, first: usize) -> Result<StmtShape, Malformation> {
    let tokens = &stmt.tokens;
    let span = tokens[first].span;
    let ranges = block_ranges(stmt);

    let roles: Vec<BlockRole> = ranges.iter().map(|r| r.role).collect();
    let (has_rescue, has_finally) = match roles.as_slice() {
        [BlockRole::Body] => (false, false),
        [BlockRole::Body, BlockRole::Rescue] => (true, false),
        [BlockRole::Body, BlockRole::Finally] => (false, true),
        [BlockRole::Body, BlockRole::Rescue, BlockRole::Finally] => (true, true),
        _ => {
            return Err(Malformation::new(
                DiagnosticCode::MalformedRescueFinally,
                span,
                "`do` must be followed by a block, then optional `rescue` and `finally` blocks in that order",
            ));
        }
    };

    // Handler keywords must pair up with blocks (no `rescue` without a body).
    let mut depth = 0i32;
    let mut kw_rescue = 0usize;
    let mut kw_finally = 0usize;
    for tok in tokens.iter() {
        match tok.kind {
            TokenKind::OpenParen | TokenKind::OpenBracket | TokenKind::OpenBrace => depth += 1,
            TokenKind::CloseParen | TokenKind::CloseBracket | TokenKind::CloseBrace => depth -= 1,
            TokenKind::Rescue if depth == 0 => kw_rescue += 1,
            TokenKind::Finally if depth == 0 => kw_finally += 1,
            _ => {}
        }
    }
    if kw_rescue != usize::from(has_rescue) || kw_finally != usize::from(has_finally) {
        return Err(Malformation::new(
            DiagnosticCode::MalformedRescueFinally,
            span,
            "`rescue`/`finally` must each introduce exactly one block",
        ));
    }

    // Nothing but a separator may follow the last block.
    if let Some(last) = ranges.last() {
        if let Some(extra) = next_nontrivia(tokens, last.close + 1) {
            if !matches!(tokens[extra].kind, TokenKind::Semi) {
                return Err(Malformation::new(
                    DiagnosticCode::MalformedRescueFinally,
                    tokens[extra].span,
                    "unexpected tokens after `do` statement",
                ));
            }
        }
    }

    Ok(StmtShape::Do {
        has_rescue,
        has_finally,
    })
}

/// Finds the statement's unique depth-zero deferred-call point, if any.
///
/// More than one depth-zero `later` keyword means the statement is not
/// rewritten at this level, so `Ok(None)` is returned; a single malformed one
/// is an error.
pub fn find_deferred_point(stmt: &Statement) -> Result<Option<DeferredPoint>, Malformation> {
    let tokens = &stmt.tokens;
    let mut depth = 0i32;
    let mut points = Vec::new();
    for (i, tok) in tokens.iter().enumerate() {
        match tok.kind {
            TokenKind::OpenParen | TokenKind::OpenBracket | TokenKind::OpenBrace => depth += 1,
            TokenKind::CloseParen | TokenKind::CloseBracket | TokenKind::CloseBrace => depth -= 1,
            TokenKind::Later if depth == 0 => points.push(i),
            _ => {}
        }
    }

    let later_idx = match points.as_slice() {
        [] => return Ok(None),
        [idx] => *idx,
        _ => return Ok(None),
    };
    let later_span = tokens[later_idx].span;

    let close_idx = match prev_nontrivia(tokens, later_idx) {
        Some(i) if matches!(tokens[i].kind, TokenKind::CloseParen) => i,
        _ => {
            return Err(Malformation::new(
                DiagnosticCode::SuffixNotAfterCall,
                later_span,
                "deferred-call suffix must immediately follow a call's `)`",
            ));
        }
    };

    let (variant, colon_idx) = parse_suffix(tokens, later_idx)?;

    // The suffix terminates the statement.
    if let Some(extra) = next_nontrivia(tokens, colon_idx + 1) {
        if !matches!(tokens[extra].kind, TokenKind::Semi) {
            return Err(Malformation::new(
                DiagnosticCode::UnknownSuffixVariant,
                tokens[extra].span,
                "tokens after deferred-call suffix",
            ));
        }
    }

    let first = stmt.first_content().unwrap_or(0);
    let (call_start, binding) = if matches!(tokens[first].kind, TokenKind::Var) {
        parse_binding(tokens, first)?
    } else {
        (first, None)
    };

    Ok(Some(DeferredPoint {
        variant,
        later_idx,
        colon_idx,
        close_idx,
        call_start,
        binding,
    }))
}

fn parse_suffix(tokens: &[Token], later_idx: usize) -> Result<(DeferredVariant, usize), Malformation> {
    let later_span = tokens[later_idx].span;
    let Some(next) = next_nontrivia(tokens, later_idx + 1) else {
        return Err(Malformation::new(
            DiagnosticCode::UnknownSuffixVariant,
            later_span,
            "deferred-call suffix must end with `:`",
        ));
    };
    match &tokens[next].kind {
        TokenKind::Colon => Ok((DeferredVariant::Plain, next)),
        TokenKind::Ident(sym) if sym.text == "repeat" || sym.text == "ignore" => {
            let variant = if sym.text == "repeat" {
                DeferredVariant::Repeat
            } else {
                DeferredVariant::Ignore
            };
            match next_nontrivia(tokens, next + 1) {
                Some(colon) if matches!(tokens[colon].kind, TokenKind::Colon) => Ok((variant, colon)),
                _ => Err(Malformation::new(
                    DiagnosticCode::UnknownSuffixVariant,
                    tokens[next].span,
                    format!("`later {}` must end with `:`", sym.text),
                )),
            }
        }
        other => Err(Malformation::new(
            DiagnosticCode::UnknownSuffixVariant,
            tokens[next].span,
            format!(
                "deferred-call suffix must be `later:`, `later repeat:` or `later ignore:`, found `{}`",
                other.text()
            ),
        )),
    }
}

fn parse_binding(tokens: &[Token], var_idx: usize) -> Result<(usize, Option<String>), Malformation> {
    let var_span = tokens[var_idx].span;
    let name_idx = next_nontrivia(tokens, var_idx + 1);
    let name = match name_idx {
        Some(i) => match tokens[i].ident_text() {
            Some(name) => name.to_string(),
            None => {
                return Err(Malformation::new(
                    DiagnosticCode::BindingMissingEq,
                    tokens[i].span,
                    "`var` must bind a name",
                ));
            }
        },
        None => {
            return Err(Malformation::new(
                DiagnosticCode::BindingMissingEq,
                var_span,
                "`var` must bind a name",
            ));
        }
    };
    let name_idx = name_idx.unwrap_or(var_idx);

    let eq_idx = match next_nontrivia(tokens, name_idx + 1) {
        Some(i) if matches!(tokens[i].kind, TokenKind::Eq) => i,
        _ => {
            return Err(Malformation::new(
                DiagnosticCode::BindingMissingEq,
                var_span,
                "`var NAME ... later:` is missing its `=`",
            ));
        }
    };

    let call_start = match next_nontrivia(tokens, eq_idx + 1) {
        Some(i) => i,
        None => {
            return Err(Malformation::new(
                DiagnosticCode::BindingMissingEq,
                var_span,
                "`var NAME =` has no call expression",
            ));
        }
    };
    Ok((call_start, Some(name)))
}

/// True if the statement mentions async surface syntax anywhere, at any depth.
pub fn mentions_async(stmt: &Statement) -> bool {
    stmt.tokens
        .iter()
        .any(|t| matches!(t.kind, TokenKind::Later | TokenKind::Await))
}

/// What kind of deferred-call usage a function body makes, transitively
/// through nested blocks but never across nested `fn` definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Usage {
    None,
    /// Only `later ignore:` points: the function keeps a synchronous-looking
    /// signature.
    IgnoreOnly,
    /// At least one plain/`repeat` point or deferred return: the function
    /// gains a trailing callback parameter.
    Async,
}

/// Pre-scan deciding callback-parameter injection (never crosses `fn` defs).
pub fn scan_usage(stmts: &[Statement]) -> Usage {
    let mut usage = Usage::None;
    for stmt in stmts {
        scan_usage_stmt(stmt, &mut usage);
        if usage == Usage::Async {
            break;
        }
    }
    usage
}

fn scan_usage_stmt(stmt: &Statement, usage: &mut Usage) {
    let Some(first) = stmt.first_content() else {
        return;
    };
    if matches!(stmt.tokens[first].kind, TokenKind::Fn) && !block_ranges(stmt).is_empty() {
        return;
    }

    if matches!(stmt.tokens[first].kind, TokenKind::Return) {
        if matches!(
            next_nontrivia(&stmt.tokens, first + 1).map(|i| &stmt.tokens[i].kind),
            Some(TokenKind::Later)
        ) {
            *usage = Usage::Async;
            return;
        }
    } else if let Ok(Some(point)) = find_deferred_point(stmt) {
        match point.variant {
            DeferredVariant::Plain | DeferredVariant::Repeat => {
                *usage = Usage::Async;
                return;
            }
            DeferredVariant::Ignore => *usage = (*usage).max(Usage::IgnoreOnly),
        }
    }

    for range in block_ranges(stmt) {
        let (lo, hi) = range.interior();
        for inner in crate::stmt::split_statements(&stmt.tokens[lo..hi]) {
            scan_usage_stmt(&inner, usage);
            if *usage == Usage::Async {
                return;
            }
        }
    }
}

/// True if any statement (transitively, skipping nested `fn` defs) is
/// `await NAME` for the given name.
pub fn contains_await_of(stmts: &[Statement], name: &str) -> bool {
    for stmt in stmts {
        let Some(first) = stmt.first_content() else {
            continue;
        };
        if matches!(stmt.tokens[first].kind, TokenKind::Fn) && !block_ranges(stmt).is_empty() {
            continue;
        }
        if matches!(stmt.tokens[first].kind, TokenKind::Await) {
            if let Some(i) = next_nontrivia(&stmt.tokens, first + 1) {
                if stmt.tokens[i].ident_text() == Some(name) {
                    return true;
                }
            }
        }
        for range in block_ranges(stmt) {
            let (lo, hi) = range.interior();
            let inner = crate::stmt::split_statements(&stmt.tokens[lo..hi]);
            if contains_await_of(&inner, name) {
                return true;
            }
        }
    }
    false
}

/// A parsed `rescue [TYPE] [as NAME]` header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RescueHeader {
    /// Normalized text of the error-type filter, if present.
    pub ty: Option<String>,
    /// The bound error name, if present.
    pub binding: Option<String>,
}

/// Parses the tokens between a body block's `}` and the rescue block's `{`.
pub fn parse_rescue_header(tokens: &[Token]) -> Result<RescueHeader, Malformation> {
    let mut content: Vec<&Token> = tokens.iter().filter(|t| !t.is_trivia()).collect();
    let span = content
        .first()
        .map(|t| t.span)
        .unwrap_or(crate::lexer::Span::SYNTHETIC);
    match content.first().map(|t| &t.kind) {
        Some(TokenKind::Rescue) => {
            content.remove(0);
        }
        _ => {
            return Err(Malformation::new(
                DiagnosticCode::MalformedRescueFinally,
                span,
                "expected `rescue` header",
            ));
        }
    }

    let mut header = RescueHeader::default();
    // `as NAME` is the trailing pair, if present.
    if content.len() >= 2 && content[content.len() - 2].ident_text() == Some("as") {
        match content[content.len() - 1].ident_text() {
            Some(name) => header.binding = Some(name.to_string()),
            None => {
                return Err(Malformation::new(
                    DiagnosticCode::MalformedRescueFinally,
                    content[content.len() - 1].span,
                    "`as` must bind an error name",
                ));
            }
        }
        content.truncate(content.len() - 2);
    } else if content.last().and_then(|t| t.ident_text()) == Some("as") {
        return Err(Malformation::new(
            DiagnosticCode::MalformedRescueFinally,
            content[content.len() - 1].span,
            "`as` must bind an error name",
        ));
    }

    if !content.is_empty() {
        let ty = content
            .iter()
            .map(|t| t.text())
            .collect::<Vec<_>>()
            .join(" ");
        header.ty = Some(ty);
    }
    Ok(header)
}

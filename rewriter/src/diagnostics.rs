use crate::lexer::Span;
use crate::source_map::SourceMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Error,
    Warning,
}

/// Stable codes for everything the lexer and the rewriter can complain about.
///
/// Each rewriter code corresponds to one malformation of the deferred-call /
/// await / do-rescue surface syntax; in strict mode the first of these aborts
/// the transform, in lenient mode the offending statement is left unmodified
/// and the code is collected here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticCode {
    /* lexer */
    UnexpectedChar,
    UnterminatedString,
    UnterminatedComment,

    /* rewriter */
    /// `do`/`rescue`/`finally` with a missing block, misordered handlers, or
    /// a malformed `rescue` header.
    MalformedRescueFinally,
    /// A `later` suffix that is not one of `later:`, `later repeat:`,
    /// `later ignore:`.
    UnknownSuffixVariant,
    /// A `later` suffix not immediately preceded by a call's `)`.
    SuffixNotAfterCall,
    /// `var NAME ... later:` without an `=`.
    BindingMissingEq,
    /// A deferred-call suffix inside a `return` value expression.
    SuffixInReturnValue,
    /// `await` where no error binding is in scope.
    AwaitOutsideErrorScope,
    /// `await NAME` where `NAME` was never bound by a deferred call.
    AwaitWithoutBinding,
    /// `var NAME = call() later:` with no `await NAME` in the continuation.
    BindingWithoutAwait,
    /// `later repeat:` with no enclosing continuation to re-enter.
    RepeatOutsideContinuation,
    /// Statements after a `later repeat:` in the same block are unreachable.
    RepeatDeadCode,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        use DiagnosticCode::*;
        match self {
            UnexpectedChar => "unexpected-char",
            UnterminatedString => "unterminated-string",
            UnterminatedComment => "unterminated-comment",
            MalformedRescueFinally => "malformed-rescue-finally",
            UnknownSuffixVariant => "unknown-suffix-variant",
            SuffixNotAfterCall => "suffix-not-after-call",
            BindingMissingEq => "binding-missing-eq",
            SuffixInReturnValue => "suffix-in-return-value",
            AwaitOutsideErrorScope => "await-outside-error-scope",
            AwaitWithoutBinding => "await-without-binding",
            BindingWithoutAwait => "binding-without-await",
            RepeatOutsideContinuation => "repeat-outside-continuation",
            RepeatDeadCode => "repeat-dead-code",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub code: DiagnosticCode,
    pub message: String,
    pub span: Span,
    pub notes: Vec<String>,
}

#[derive(Default, Debug)]
pub struct Diagnostics {
    pub diags: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn emit_error(&mut self, code: DiagnosticCode, span: Span, message: impl Into<String>) {
        self.diags.push(Diagnostic {
            kind: DiagnosticKind::Error,
            code,
            message: message.into(),
            span,
            notes: vec![],
        });
    }

    pub fn emit_warning(&mut self, code: DiagnosticCode, span: Span, message: impl Into<String>) {
        self.diags.push(Diagnostic {
            kind: DiagnosticKind::Warning,
            code,
            message: message.into(),
            span,
            notes: vec![],
        });
    }
}

/// Error policy for the transform.
///
/// Both policies collect diagnostics; `Strict` additionally aborts on the first
/// malformation while `Lenient` leaves the offending statement unmodified and
/// keeps rewriting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Policy {
    Strict,
    #[default]
    Lenient,
}

/// The typed abort of a strict-mode transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteError {
    pub code: DiagnosticCode,
    pub message: String,
    pub span: Span,
}

impl std::fmt::Display for RewriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}..{}]: {}",
            self.code.as_str(),
            self.span.start,
            self.span.end,
            self.message
        )
    }
}

impl std::error::Error for RewriteError {}

/// Renders diagnostics deterministically (sorted by span, then message).
pub fn format_diagnostics(source: &str, mut diags: Vec<Diagnostic>) -> String {
    use std::fmt::Write;

    diags.sort_by(|a, b| {
        (a.span.start, a.span.end, &a.message).cmp(&(b.span.start, b.span.end, &b.message))
    });
    let sm = SourceMap::new(source);

    let mut out = String::new();

    for d in diags {
        let label = match d.kind {
            DiagnosticKind::Error => "error",
            DiagnosticKind::Warning => "warning",
        };
        let (line, col) = sm.line_col(d.span.start);
        let _ = writeln!(&mut out, "{}[{}]: {}", label, d.code.as_str(), d.message);
        let _ = writeln!(
            &mut out,
            "  --> <input>:{}:{} [{}..{}]",
            line, col, d.span.start, d.span.end
        );
        let snippet = sm.line_text(line);
        if !snippet.is_empty() {
            let len = (d.span.end.saturating_sub(d.span.start) as usize).max(1);
            let width = len.min(snippet.len().saturating_sub(col - 1).max(1));
            let _ = writeln!(&mut out, "   | {}", snippet);
            let _ = writeln!(&mut out, "   | {}{}", " ".repeat(col - 1), "^".repeat(width));
        }
        for note in d.notes {
            let _ = writeln!(&mut out, "  note: {}", note);
        }
    }

    out
}

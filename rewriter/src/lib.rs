//! Source-to-source rewriting of deferred-call suffixes into
//! continuation-passing style.
//!
//! The input language marks asynchronous call sites with a `later:` suffix
//! (plus the `later repeat:` and `later ignore:` variants) and pairs result
//! bindings with `await` markers. [`rewrite_source`] lexes a whole source
//! text, rewrites every function that uses a deferred call, and reproduces
//! everything else byte-for-byte. Rewritten functions gain a trailing
//! completion callback parameter, their post-call statements move into
//! synthesized continuations, and enclosing `do`/`rescue`/`finally` levels
//! are hoisted so cleanup handlers run exactly once across resumptions.
//!
//! The output is plain source in the same language and is a fixed point:
//! rewriting it again changes nothing.

pub mod cps;
pub mod diagnostics;
pub mod layout;
pub mod lexer;
pub mod names;
pub mod scan;
pub mod source_map;
pub mod stmt;

#[cfg(test)]
mod tests;

pub use cps::emit::INDENT;
pub use diagnostics::{
    Diagnostic, DiagnosticCode, DiagnosticKind, Policy, RewriteError, format_diagnostics,
};
pub use lexer::{Token, TokenKind, lex};

use tracing::debug;

use cps::Rewriter;
use diagnostics::Diagnostics;
use scan::{StmtShape, classify};
use stmt::{block_ranges, split_statements};

/// Knobs for one rewrite run.
#[derive(Debug, Clone)]
pub struct RewriteOptions {
    /// How malformed constructs are handled.
    pub policy: Policy,
    /// Runtime entry point a `return later expr` thunk is submitted through.
    pub defer_fn: String,
    /// Runtime entry point an ignored deferred-call error is reported to.
    pub report_fn: String,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self {
            policy: Policy::default(),
            defer_fn: "submit_delayed".to_string(),
            report_fn: "log_error".to_string(),
        }
    }
}

/// Result of a successful (possibly diagnostic-carrying) rewrite.
#[derive(Debug, Clone)]
pub struct RewriteOutput {
    /// The rewritten source text.
    pub source: String,
    /// The rewritten source, re-lexed.
    pub tokens: Vec<Token>,
    /// Diagnostics collected along the way, lexer first.
    pub diagnostics: Vec<Diagnostic>,
}

/// Rewrites a whole source text.
///
/// Top-level statements that are not function definitions, and functions with
/// no deferred-call usage, are reproduced byte-for-byte. Under
/// [`Policy::Strict`] the first malformed construct aborts with an error;
/// under [`Policy::Lenient`] it is left as written and recorded as a
/// diagnostic.
pub fn rewrite_source(text: &str, opts: &RewriteOptions) -> Result<RewriteOutput, RewriteError> {
    let lexed = lexer::lex(text);
    if !lexed.diagnostics.is_empty() {
        if opts.policy == Policy::Strict {
            let first = &lexed.diagnostics[0];
            return Err(RewriteError {
                code: first.code,
                message: first.message.clone(),
                span: first.span,
            });
        }
        // Unlexable input cannot be rewritten safely; hand it back as-is.
        return Ok(RewriteOutput {
            source: text.to_string(),
            tokens: lexed.tokens,
            diagnostics: lexed.diagnostics,
        });
    }

    let stmts = split_statements(&lexed.tokens);
    let mut diags = Diagnostics::default();
    let mut rewritten = 0usize;
    let mut out = String::new();
    {
        let mut rewriter = Rewriter::new(&mut diags, opts.policy, &opts.defer_fn, &opts.report_fn);
        for stmt in &stmts {
            let shape = match classify(stmt) {
                Ok(shape) => shape,
                Err(m) => {
                    if opts.policy == Policy::Strict {
                        return Err(RewriteError {
                            code: m.code,
                            message: m.message,
                            span: m.span,
                        });
                    }
                    rewriter.diags().emit_error(m.code, m.span, m.message);
                    out.push_str(&stmt.text());
                    continue;
                }
            };
            if !matches!(shape, StmtShape::FnDef) {
                out.push_str(&stmt.text());
                continue;
            }
            match rewriter.rewrite_function(stmt)? {
                Some(emitted) => {
                    rewritten += 1;
                    let first = stmt.first_content().unwrap_or(0);
                    let close = block_ranges(stmt)
                        .last()
                        .map(|r| r.close)
                        .unwrap_or(stmt.tokens.len() - 1);
                    out.push_str(&lexer::render_tokens(&stmt.tokens[..first]));
                    out.push_str(&emitted.render(0));
                    out.push_str(&lexer::render_tokens(&stmt.tokens[close + 1..]));
                }
                None => out.push_str(&stmt.text()),
            }
        }
    }
    debug!(functions = rewritten, "rewrite complete");

    let mut diagnostics = lexed.diagnostics;
    diagnostics.extend(diags.diags);
    let relexed = lexer::lex(&out);
    Ok(RewriteOutput {
        source: out,
        tokens: relexed.tokens,
        diagnostics,
    })
}

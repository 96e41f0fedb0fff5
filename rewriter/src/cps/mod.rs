//! The continuation-passing rewrite.
//!
//! [`Rewriter::rewrite_function`] walks one `fn` definition bottom-up and
//! produces its rewritten body as indented lines. Each statement falls into
//! one of six cases (return, protected block, await marker, plain statement,
//! deferred call, pass-through), and a deferred call consumes the remainder of
//! its block into a synthesized continuation. Functions with no deferred-call
//! usage anywhere are left to the caller to pass through byte-for-byte.

use tracing::{debug, trace};

use crate::diagnostics::{DiagnosticCode, Diagnostics, Policy, RewriteError};
use crate::lexer::{Token, TokenKind};
use crate::names::NameGen;
use crate::scan::{
    DeferredPoint, DeferredVariant, Malformation, StmtShape, Usage, classify, contains_await_of,
    parse_rescue_header, scan_usage,
};
use crate::stmt::{
    BlockRange, BlockRole, Statement, block_ranges, normalize_tokens, prev_nontrivia,
    split_statements,
};

pub mod cleanup;
pub mod emit;

use cleanup::CleanupFrame;
use emit::Emitted;

/// Lexical context threaded through one function's rewrite.
///
/// Continuations get a clone with `repeat_target`/`error_binding` swapped for
/// their own deferred point; the cleanup stack snapshot travels with it so the
/// guard skeleton can be rebuilt around resumed code.
#[derive(Debug, Clone, Default)]
struct Ctx {
    /// Completion callback parameter of the enclosing function, if injected.
    callback: Option<String>,
    /// Continuation name a `later repeat:` point re-submits with.
    repeat_target: Option<String>,
    /// Error parameter of the innermost continuation.
    error_binding: Option<String>,
    /// Result names bound by enclosing deferred points, eligible for `await`.
    bound: Vec<String>,
    /// Active hoisted `do`/`rescue`/`finally` levels, outermost first.
    cleanup: Vec<CleanupFrame>,
}

struct BlockOut {
    out: Emitted,
    /// True when the last statement unconditionally left the function.
    terminated: bool,
}

pub(crate) struct Rewriter<'a> {
    names: NameGen,
    diags: &'a mut Diagnostics,
    policy: Policy,
    defer_fn: &'a str,
    report_fn: &'a str,
}

impl<'a> Rewriter<'a> {
    pub fn new(
        diags: &'a mut Diagnostics,
        policy: Policy,
        defer_fn: &'a str,
        report_fn: &'a str,
    ) -> Self {
        Self {
            names: NameGen::new(),
            diags,
            policy,
            defer_fn,
            report_fn,
        }
    }

    /// Diagnostics sink shared with the caller.
    pub fn diags(&mut self) -> &mut Diagnostics {
        self.diags
    }

    /// Rewrites one `fn` statement. Returns `None` when the function makes no
    /// deferred-call usage and must be reproduced verbatim.
    pub fn rewrite_function(&mut self, stmt: &Statement) -> Result<Option<Emitted>, RewriteError> {
        let ranges = block_ranges(stmt);
        let Some(body) = ranges.first() else {
            return Ok(None);
        };
        let (lo, hi) = body.interior();
        let body_stmts = split_statements(&stmt.tokens[lo..hi]);

        // Callback injection only counts usage in this function's own body,
        // but a nested definition with usage of its own still forces a rewrite
        // pass over the body so it gets transformed in place.
        let usage = scan_usage(&body_stmts);
        if usage == Usage::None && !crate::scan::mentions_async(stmt) {
            return Ok(None);
        }

        let first = stmt.first_content().unwrap_or(0);
        let name = crate::stmt::next_nontrivia(&stmt.tokens, first + 1)
            .and_then(|i| stmt.tokens[i].ident_text())
            .unwrap_or("<anon>");
        debug!(name, ?usage, "rewriting function");

        let callback = match usage {
            Usage::Async => Some(self.names.fresh("cb")),
            _ => None,
        };

        let header = self.function_header(stmt, body.open, callback.as_deref());

        let ctx = Ctx {
            callback: callback.clone(),
            ..Ctx::default()
        };
        let body_out = self.rewrite_block(&body_stmts, &ctx)?;

        let mut out = Emitted::new();
        out.push(0, header);
        let fell_through = !body_out.terminated;
        out.extend(body_out.out, 1);
        if fell_through {
            if let Some(cb) = &callback {
                out.push(1, format!("{cb}(none, none)"));
                out.push(1, "return");
            }
        }
        out.push(0, "}");
        Ok(Some(out))
    }

    /// Builds the rewritten header line, appending the callback parameter to
    /// the parameter list when one was injected.
    fn function_header(&self, stmt: &Statement, open: usize, callback: Option<&str>) -> String {
        let first = stmt.first_content().unwrap_or(0);
        let Some(cb) = callback else {
            let text = normalize_tokens(&stmt.tokens[first..open]);
            return format!("{text} {{");
        };
        match prev_nontrivia(&stmt.tokens, open) {
            Some(close) if matches!(stmt.tokens[close].kind, TokenKind::CloseParen) => {
                let base = normalize_tokens(&stmt.tokens[first..close]);
                let sep = match prev_nontrivia(&stmt.tokens, close).map(|i| &stmt.tokens[i].kind) {
                    Some(TokenKind::OpenParen) => "",
                    Some(TokenKind::Comma) => " ",
                    _ => ", ",
                };
                format!("{base}{sep}{cb}) {{")
            }
            _ => {
                // Headless definition; give it a parameter list.
                let base = normalize_tokens(&stmt.tokens[first..open]);
                format!("{base}({cb}) {{")
            }
        }
    }

    fn rewrite_block(&mut self, stmts: &[Statement], ctx: &Ctx) -> Result<BlockOut, RewriteError> {
        let mut out = Emitted::new();
        let mut terminated = false;

        let mut i = 0;
        while i < stmts.len() {
            let stmt = &stmts[i];
            let shape = match classify(stmt) {
                Ok(shape) => shape,
                Err(m) => {
                    self.malformed(m)?;
                    out.extend(raw_lines(stmt), 0);
                    i += 1;
                    continue;
                }
            };

            match shape {
                StmtShape::Empty => {
                    // Keep comments and blank lines; trivia never terminates.
                    // The newline that closes the block header line splits off
                    // as a first, contentless statement and is not a blank.
                    let structural =
                        i == 0 && !stmt.tokens.iter().any(|t| t.kind.is_comment());
                    if !structural {
                        emit_trivia(&mut out, stmt);
                    }
                    i += 1;
                    continue;
                }
                StmtShape::FnDef => {
                    terminated = false;
                    match self.rewrite_function(stmt)? {
                        Some(emitted) => out.extend(emitted, 0),
                        None => out.extend(raw_lines(stmt), 0),
                    }
                }
                StmtShape::Generic => {
                    terminated = false;
                    let ranges = block_ranges(stmt);
                    if ranges.is_empty() {
                        let first = stmt.first_content().unwrap_or(0);
                        out.push(0, normalize_stmt(&stmt.tokens[first..]));
                    } else {
                        let nested = self.relayout_blocks(stmt, &ranges, ctx)?;
                        out.extend(nested, 0);
                    }
                }
                StmtShape::Return { deferred } => {
                    self.emit_return(&mut out, stmt, deferred, ctx);
                    terminated = true;
                }
                StmtShape::Await { name } => {
                    terminated = false;
                    self.emit_await(&mut out, stmt, &name, ctx)?;
                }
                StmtShape::Do {
                    has_rescue,
                    has_finally,
                } => {
                    terminated = false;
                    self.emit_do(&mut out, stmt, has_rescue, has_finally, ctx)?;
                }
                StmtShape::Deferred(point) => {
                    let rest = &stmts[i + 1..];
                    match self.emit_deferred(&mut out, stmt, &point, rest, ctx)? {
                        DeferredOutcome::Consumed => {
                            terminated = true;
                            break;
                        }
                        DeferredOutcome::LeftInPlace => terminated = false,
                    }
                }
            }
            i += 1;
        }

        Ok(BlockOut { out, terminated })
    }

    /// Case: `return` / `return expr` / `return later expr`.
    fn emit_return(&mut self, out: &mut Emitted, stmt: &Statement, deferred: bool, ctx: &Ctx) {
        let tokens = &stmt.tokens;
        let first = stmt.first_content().unwrap_or(0);

        if deferred {
            // `return later expr`: the value comes from a zero-argument thunk
            // run through the delayed-call queue.
            let later = crate::stmt::next_nontrivia(tokens, first + 1).unwrap_or(first);
            let value = return_value(tokens, later);
            if let Some(cb) = &ctx.callback {
                let thunk = self.names.fresh("thunk");
                out.push(0, format!("fn {thunk}() {{"));
                out.push(1, format!("{cb}(none, {value})"));
                out.push(0, "}");
                out.push(0, format!("return {}({thunk})", self.defer_fn));
            } else {
                // No callback to hand the value to; degrade to a plain return.
                out.push(0, format!("return {value}"));
            }
            return;
        }

        if let Some(cb) = &ctx.callback {
            let value = return_value(tokens, first);
            out.push(0, format!("{cb}(none, {value})"));
            out.push(0, "return");
        } else {
            out.push(0, normalize_stmt(&tokens[first..]));
        }
    }

    /// Case: `await NAME` becomes an error check against the continuation's
    /// error parameter.
    fn emit_await(
        &mut self,
        out: &mut Emitted,
        stmt: &Statement,
        name: &str,
        ctx: &Ctx,
    ) -> Result<(), RewriteError> {
        let span = stmt.span();
        let Some(err) = ctx.error_binding.clone() else {
            self.malformed(Malformation {
                code: DiagnosticCode::AwaitOutsideErrorScope,
                span,
                message: format!("`await {name}` is not preceded by a deferred call"),
            })?;
            out.extend(raw_lines(stmt), 0);
            return Ok(());
        };
        if !ctx.bound.iter().any(|b| b == name) {
            self.malformed(Malformation {
                code: DiagnosticCode::AwaitWithoutBinding,
                span,
                message: format!("`await {name}` does not match a deferred-call binding in scope"),
            })?;
            out.extend(raw_lines(stmt), 0);
            return Ok(());
        }
        out.push(0, format!("if {err} != none {{"));
        out.push(1, format!("throw {err}"));
        out.push(0, "}");
        Ok(())
    }

    /// Case: `do { .. } rescue .. finally ..` with deferred-call usage inside
    /// the body. Handlers are hoisted to named closures guarded by disabler
    /// variables so continuations from inside the body can replay them.
    fn emit_do(
        &mut self,
        out: &mut Emitted,
        stmt: &Statement,
        has_rescue: bool,
        has_finally: bool,
        ctx: &Ctx,
    ) -> Result<(), RewriteError> {
        let ranges = block_ranges(stmt);
        let body = &ranges[0];
        let (lo, hi) = body.interior();
        let body_stmts = split_statements(&stmt.tokens[lo..hi]);

        let body_async = body_stmts.iter().any(crate::scan::mentions_async);
        if !(has_rescue || has_finally) || !body_async {
            // Nothing to hoist; recurse in place like any nested block.
            let nested = self.relayout_blocks(stmt, &ranges, ctx)?;
            out.extend(nested, 0);
            return Ok(());
        }

        let rescue_range = ranges.iter().find(|r| r.role == BlockRole::Rescue);
        let finally_range = ranges.iter().find(|r| r.role == BlockRole::Finally);

        let header = match rescue_range {
            Some(range) => {
                let header_tokens = &stmt.tokens[body.close + 1..range.open];
                match parse_rescue_header(header_tokens) {
                    Ok(header) => Some(header),
                    Err(m) => {
                        self.malformed(m)?;
                        out.extend(raw_lines(stmt), 0);
                        return Ok(());
                    }
                }
            }
            None => None,
        };

        let disable_rescue = self.names.fresh("skip");
        let disable_finally = self.names.fresh("skip");
        let binding = header
            .as_ref()
            .and_then(|h| h.binding.clone())
            .unwrap_or_else(|| self.names.fresh("e"));
        let rescue_fn = rescue_range.map(|_| self.names.fresh("rescue"));
        let finally_fn = finally_range.map(|_| self.names.fresh("finally"));
        trace!(
            rescue = rescue_fn.as_deref(),
            finally = finally_fn.as_deref(),
            "hoisting cleanup handlers"
        );

        out.push(0, format!("var {disable_rescue} = false"));
        out.push(0, format!("var {disable_finally} = false"));

        if let (Some(range), Some(name)) = (rescue_range, &rescue_fn) {
            out.push(0, format!("fn {name}({binding}) {{"));
            let (lo, hi) = range.interior();
            let inner = self.rewrite_block(&split_statements(&stmt.tokens[lo..hi]), ctx)?;
            out.extend(inner.out, 1);
            out.push(0, "}");
        }
        if let (Some(range), Some(name)) = (finally_range, &finally_fn) {
            out.push(0, format!("fn {name}() {{"));
            let (lo, hi) = range.interior();
            let inner = self.rewrite_block(&split_statements(&stmt.tokens[lo..hi]), ctx)?;
            out.extend(inner.out, 1);
            out.push(0, "}");
        }

        let frame = CleanupFrame {
            rescue_fn: rescue_fn.clone(),
            finally_fn: finally_fn.clone(),
            rescue_ty: header.as_ref().and_then(|h| h.ty.clone()),
            disable_rescue,
            disable_finally,
        };

        let mut inner_ctx = ctx.clone();
        inner_ctx.cleanup.push(frame.clone());
        let body_out = self.rewrite_block(&body_stmts, &inner_ctx)?;

        out.push(0, "do {");
        out.extend(body_out.out, 1);
        if rescue_fn.is_some() {
            push_guarded_rescue(out, &frame, &binding);
        }
        if finally_fn.is_some() {
            push_guarded_finally(out, &frame);
        }
        out.push(0, "}");
        Ok(())
    }

    /// Case: a statement carrying a depth-zero deferred-call point. Consumes
    /// the rest of the block into a continuation.
    fn emit_deferred(
        &mut self,
        out: &mut Emitted,
        stmt: &Statement,
        point: &DeferredPoint,
        rest: &[Statement],
        ctx: &Ctx,
    ) -> Result<DeferredOutcome, RewriteError> {
        if point.variant == DeferredVariant::Repeat {
            return self.emit_repeat(out, stmt, point, rest, ctx);
        }

        // A binding with no matching `await` downstream would silently drop
        // the error; refuse to rewrite the statement.
        if let Some(name) = &point.binding {
            if !contains_await_of(rest, name) {
                self.malformed(Malformation {
                    code: DiagnosticCode::BindingWithoutAwait,
                    span: stmt.tokens[point.later_idx].span,
                    message: format!("deferred binding `{name}` has no matching `await {name}`"),
                })?;
                out.extend(raw_lines(stmt), 0);
                return Ok(DeferredOutcome::LeftInPlace);
            }
        }

        let k = self.names.fresh("k");
        let err = self.names.fresh("err");
        let res = point
            .binding
            .clone()
            .unwrap_or_else(|| self.names.fresh("res"));
        trace!(continuation = %k, ?point.variant, "splitting block at deferred call");

        let mut inner_ctx = ctx.clone();
        inner_ctx.repeat_target = Some(k.clone());
        inner_ctx.error_binding = Some(err.clone());
        if let Some(name) = &point.binding {
            inner_ctx.bound.push(name.clone());
        }
        let rest_out = self.rewrite_block(rest, &inner_ctx)?;

        // Guard skeleton: re-wrap the resumed code in every active cleanup
        // level, innermost last so lexical nesting is preserved.
        let wrapped = !ctx.cleanup.is_empty();
        let mut body = rest_out.out;
        for frame in ctx.cleanup.iter().rev() {
            body = self.wrap_skeleton(body, frame);
        }

        if wrapped || !rest_out.terminated {
            // Completion tail: runs on skeleton fall-through (including a
            // handled rescue) and when the resumed code did not return.
            for frame in &ctx.cleanup {
                body.push(0, format!("{} = true", frame.disable_rescue));
                body.push(0, format!("{} = true", frame.disable_finally));
            }
            if let Some(cb) = &ctx.callback {
                body.push(0, format!("{cb}(none, none)"));
            }
            body.push(0, "return");
        }

        let e = self.names.fresh("e");
        let mut guarded = Emitted::new();
        guarded.push(0, "do {");
        guarded.extend(body, 1);
        guarded.push(0, format!("}} rescue as {e} {{"));
        match point.variant {
            DeferredVariant::Ignore => {
                guarded.push(1, format!("{}({e})", self.report_fn));
            }
            _ => {
                if let Some(cb) = &ctx.callback {
                    guarded.push(1, format!("{cb}({e}, none)"));
                } else {
                    guarded.push(1, format!("{}({e})", self.report_fn));
                }
                guarded.push(1, "return");
            }
        }
        guarded.push(0, "}");

        out.push(0, format!("fn {k}({err}, {res}) {{"));
        for frame in &ctx.cleanup {
            // Re-arm the handlers for the resumed region.
            out.push(1, format!("{} = false", frame.disable_rescue));
            out.push(1, format!("{} = false", frame.disable_finally));
        }
        out.extend(guarded, 1);
        out.push(0, "}");

        out.push(0, rewire_call(&stmt.tokens, point, &k));
        self.push_disabler_sets(out, ctx);
        out.push(0, "return");
        Ok(DeferredOutcome::Consumed)
    }

    /// `later repeat:` re-submits with the innermost continuation and retires
    /// the current activation.
    fn emit_repeat(
        &mut self,
        out: &mut Emitted,
        stmt: &Statement,
        point: &DeferredPoint,
        rest: &[Statement],
        ctx: &Ctx,
    ) -> Result<DeferredOutcome, RewriteError> {
        let span = stmt.tokens[point.later_idx].span;
        let Some(target) = ctx.repeat_target.clone() else {
            self.malformed(Malformation {
                code: DiagnosticCode::RepeatOutsideContinuation,
                span,
                message: "`later repeat:` outside a resumed deferred-call region".to_string(),
            })?;
            out.extend(raw_lines(stmt), 0);
            return Ok(DeferredOutcome::LeftInPlace);
        };

        if let Some(first_live) = rest.iter().find(|s| !s.is_trivia_only()) {
            self.diags.emit_warning(
                DiagnosticCode::RepeatDeadCode,
                first_live.span(),
                "statements after `later repeat:` never run",
            );
        }

        out.push(0, rewire_call(&stmt.tokens, point, &target));
        self.push_disabler_sets(out, ctx);
        out.push(0, "return");
        Ok(DeferredOutcome::Consumed)
    }

    /// Disables every active cleanup level before the synchronous return that
    /// follows a re-submission, so unwinding out of the original block does
    /// not fire handlers that now belong to the continuation.
    fn push_disabler_sets(&self, out: &mut Emitted, ctx: &Ctx) {
        for frame in &ctx.cleanup {
            out.push(0, format!("{} = true", frame.disable_rescue));
            out.push(0, format!("{} = true", frame.disable_finally));
        }
    }

    /// Rebuilds one cleanup level around resumed code, forwarding to the
    /// hoisted handlers through their disablers.
    fn wrap_skeleton(&mut self, body: Emitted, frame: &CleanupFrame) -> Emitted {
        let mut out = Emitted::new();
        out.push(0, "do {");
        out.extend(body, 1);
        if frame.rescue_fn.is_some() {
            let e = self.names.fresh("e");
            push_guarded_rescue(&mut out, frame, &e);
        }
        if frame.finally_fn.is_some() {
            push_guarded_finally(&mut out, frame);
        }
        out.push(0, "}");
        out
    }

    /// Case: a statement with nested blocks but no deferred point of its own.
    /// Headers are reproduced normalized; block interiors are rewritten.
    fn relayout_blocks(
        &mut self,
        stmt: &Statement,
        ranges: &[BlockRange],
        ctx: &Ctx,
    ) -> Result<Emitted, RewriteError> {
        let tokens = &stmt.tokens;
        let mut out = Emitted::new();
        let mut seg_start = stmt.first_content().unwrap_or(0);
        for range in ranges {
            out.push(0, normalize_tokens(&tokens[seg_start..=range.open]));
            let (lo, hi) = range.interior();
            let inner = self.rewrite_block(&split_statements(&tokens[lo..hi]), ctx)?;
            out.extend(inner.out, 1);
            seg_start = range.close;
        }
        out.push(0, normalize_stmt(&tokens[seg_start..]));
        Ok(out)
    }

    /// Policy gate for malformed constructs: strict mode aborts the rewrite,
    /// lenient mode records a diagnostic and leaves the construct unmodified.
    fn malformed(&mut self, m: Malformation) -> Result<(), RewriteError> {
        match self.policy {
            Policy::Strict => Err(RewriteError {
                code: m.code,
                message: m.message,
                span: m.span,
            }),
            Policy::Lenient => {
                self.diags.emit_error(m.code, m.span, m.message);
                Ok(())
            }
        }
    }
}

enum DeferredOutcome {
    /// The point was rewritten and the rest of the block moved into a
    /// continuation.
    Consumed,
    /// Lenient fallback: the statement stayed as written.
    LeftInPlace,
}

fn push_guarded_rescue(out: &mut Emitted, frame: &CleanupFrame, binding: &str) {
    let Some(rescue_fn) = &frame.rescue_fn else {
        return;
    };
    match &frame.rescue_ty {
        Some(ty) => out.push(0, format!("}} rescue {ty} as {binding} {{")),
        None => out.push(0, format!("}} rescue as {binding} {{")),
    }
    out.push(1, format!("if not {} {{", frame.disable_rescue));
    out.push(2, format!("{} = true", frame.disable_rescue));
    out.push(2, format!("{rescue_fn}({binding})"));
    out.push(1, "}");
}

fn push_guarded_finally(out: &mut Emitted, frame: &CleanupFrame) {
    let Some(finally_fn) = &frame.finally_fn else {
        return;
    };
    out.push(0, "} finally {");
    out.push(1, format!("if not {} {{", frame.disable_finally));
    out.push(2, format!("{} = true", frame.disable_finally));
    out.push(2, format!("{finally_fn}()"));
    out.push(1, "}");
}

/// The normalized return value expression, or `none` when absent. `start` is
/// the token the value follows (`return` or `later`).
fn return_value(tokens: &[Token], start: usize) -> String {
    let value = normalize_stmt(&tokens[start + 1..]);
    if value.is_empty() {
        "none".to_string()
    } else {
        value
    }
}

/// Normalizes a statement slice, dropping the trailing `;` separator if any.
fn normalize_stmt(tokens: &[Token]) -> String {
    let text = normalize_tokens(tokens);
    text.trim_end_matches(';').trim_end().to_string()
}

/// Strips the suffix off a deferred call and appends `extra` as the trailing
/// argument.
fn rewire_call(tokens: &[Token], point: &DeferredPoint, extra: &str) -> String {
    let base = normalize_tokens(&tokens[point.call_start..point.close_idx]);
    let sep = match prev_nontrivia(tokens, point.close_idx).map(|i| &tokens[i].kind) {
        Some(TokenKind::OpenParen) => "",
        Some(TokenKind::Comma) => " ",
        _ => ", ",
    };
    format!("{base}{sep}{extra})")
}

/// Reproduces a statement's lines, dedented by its own leading indentation.
/// Used for statements left unmodified under lenient malformation handling.
fn raw_lines(stmt: &Statement) -> Emitted {
    let mut out = Emitted::new();
    let text = stmt.text();
    let base = stmt.indent();
    let mut seen_content = false;
    for line in text.lines() {
        let line = line.strip_prefix(base.as_str()).unwrap_or(line);
        if line.trim().is_empty() {
            if seen_content {
                out.blank();
            }
            continue;
        }
        seen_content = true;
        out.push(0, line);
    }
    out
}

/// Emits a trivia-only statement: comments on their own lines, otherwise one
/// blank line.
fn emit_trivia(out: &mut Emitted, stmt: &Statement) {
    let mut pushed = false;
    for tok in &stmt.tokens {
        if tok.kind.is_comment() {
            out.push(0, tok.text());
            pushed = true;
        }
    }
    if !pushed {
        out.blank();
    }
}

use crate::DiagnosticCode;
use crate::lexer::lex;
use crate::scan::{
    DeferredVariant, StmtShape, Usage, classify, contains_await_of, find_deferred_point,
    parse_rescue_header, scan_usage,
};
use crate::stmt::{Statement, split_statements};

fn stmt(input: &str) -> Statement {
    let out = lex(input);
    assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
    let mut stmts = split_statements(&out.tokens);
    assert_eq!(stmts.len(), 1, "expected one statement in {input:?}");
    stmts.remove(0)
}

fn stmts(input: &str) -> Vec<Statement> {
    let out = lex(input);
    assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
    split_statements(&out.tokens)
}

#[test]
fn test_classify_basic_shapes() {
    assert!(matches!(classify(&stmt("\n")), Ok(StmtShape::Empty)));
    assert!(matches!(classify(&stmt("// note\n")), Ok(StmtShape::Empty)));
    assert!(matches!(
        classify(&stmt("fn f() {\n}\n")),
        Ok(StmtShape::FnDef)
    ));
    assert!(matches!(
        classify(&stmt("return\n")),
        Ok(StmtShape::Return { deferred: false })
    ));
    assert!(matches!(
        classify(&stmt("return later f()\n")),
        Ok(StmtShape::Return { deferred: true })
    ));
    assert!(matches!(classify(&stmt("x()\n")), Ok(StmtShape::Generic)));
}

#[test]
fn test_classify_return_value_suffix() {
    // The suffix is only legal directly after `return`; in the value
    // expression it is a malformation, not a plain return.
    match classify(&stmt("return g() later:\n")) {
        Err(m) => assert_eq!(m.code, DiagnosticCode::SuffixInReturnValue),
        other => panic!("expected malformation, got {other:?}"),
    }
    match classify(&stmt("return later g() later:\n")) {
        Err(m) => assert_eq!(m.code, DiagnosticCode::SuffixInReturnValue),
        other => panic!("expected malformation, got {other:?}"),
    }
    // A nested suffix is someone else's statement.
    assert!(matches!(
        classify(&stmt("return fn_holder(fn g() { h() later ignore: })\n")),
        Ok(StmtShape::Return { deferred: false })
    ));
}

#[test]
fn test_classify_await() {
    match classify(&stmt("await r\n")) {
        Ok(StmtShape::Await { name }) => assert_eq!(name, "r"),
        other => panic!("expected Await, got {other:?}"),
    }
}

#[test]
fn test_classify_do_variants() {
    assert!(matches!(
        classify(&stmt("do {\n    x()\n}\n")),
        Ok(StmtShape::Do {
            has_rescue: false,
            has_finally: false
        })
    ));
    assert!(matches!(
        classify(&stmt("do {\n    x()\n} rescue as e {\n    h(e)\n}\n")),
        Ok(StmtShape::Do {
            has_rescue: true,
            has_finally: false
        })
    ));
    assert!(matches!(
        classify(&stmt("do {\n    x()\n} finally {\n    c()\n}\n")),
        Ok(StmtShape::Do {
            has_rescue: false,
            has_finally: true
        })
    ));
}

#[test]
fn test_classify_do_misordered_handlers() {
    let got = classify(&stmt("do {\n    x()\n} finally {\n    c()\n} rescue as e {\n    h(e)\n}\n"));
    match got {
        Err(m) => assert_eq!(m.code, DiagnosticCode::MalformedRescueFinally),
        other => panic!("expected malformation, got {other:?}"),
    }
}

#[test]
fn test_deferred_point_plain() {
    let point = find_deferred_point(&stmt("call(x) later:\n"))
        .unwrap()
        .unwrap();
    assert_eq!(point.variant, DeferredVariant::Plain);
    assert_eq!(point.binding, None);
}

#[test]
fn test_deferred_point_variants() {
    let point = find_deferred_point(&stmt("poll() later repeat:\n"))
        .unwrap()
        .unwrap();
    assert_eq!(point.variant, DeferredVariant::Repeat);

    let point = find_deferred_point(&stmt("log() later ignore:\n"))
        .unwrap()
        .unwrap();
    assert_eq!(point.variant, DeferredVariant::Ignore);
}

#[test]
fn test_deferred_point_binding() {
    let point = find_deferred_point(&stmt("var r = compute(a, b) later:\n"))
        .unwrap()
        .unwrap();
    assert_eq!(point.binding.as_deref(), Some("r"));
    assert_eq!(point.variant, DeferredVariant::Plain);
}

#[test]
fn test_deferred_point_none_without_later() {
    assert_eq!(find_deferred_point(&stmt("call(x)\n")).unwrap(), None);
}

#[test]
fn test_nested_later_is_not_a_point() {
    // A suffix inside a nested brace block belongs to that block's rewrite.
    let s = stmt("if c {\n    call(x) later:\n}\n");
    assert_eq!(find_deferred_point(&s).unwrap(), None);
}

#[test]
fn test_suffix_not_after_call() {
    let got = find_deferred_point(&stmt("x later:\n"));
    match got {
        Err(m) => assert_eq!(m.code, DiagnosticCode::SuffixNotAfterCall),
        other => panic!("expected malformation, got {other:?}"),
    }
}

#[test]
fn test_unknown_suffix_variant() {
    let got = find_deferred_point(&stmt("f() later always:\n"));
    match got {
        Err(m) => assert_eq!(m.code, DiagnosticCode::UnknownSuffixVariant),
        other => panic!("expected malformation, got {other:?}"),
    }
}

#[test]
fn test_binding_missing_eq() {
    let got = find_deferred_point(&stmt("var r f() later:\n"));
    match got {
        Err(m) => assert_eq!(m.code, DiagnosticCode::BindingMissingEq),
        other => panic!("expected malformation, got {other:?}"),
    }
}

#[test]
fn test_usage_none() {
    assert_eq!(scan_usage(&stmts("a()\nb()\n")), Usage::None);
}

#[test]
fn test_usage_ignore_only() {
    assert_eq!(scan_usage(&stmts("log() later ignore:\n")), Usage::IgnoreOnly);
}

#[test]
fn test_usage_async_beats_ignore() {
    let got = scan_usage(&stmts("log() later ignore:\ncall() later:\n"));
    assert_eq!(got, Usage::Async);
}

#[test]
fn test_usage_deferred_return() {
    assert_eq!(scan_usage(&stmts("return later f()\n")), Usage::Async);
}

#[test]
fn test_usage_recurses_into_blocks() {
    let got = scan_usage(&stmts("if c {\n    call() later:\n}\n"));
    assert_eq!(got, Usage::Async);
}

#[test]
fn test_usage_stops_at_nested_fn() {
    let got = scan_usage(&stmts("fn inner() {\n    call() later:\n}\n"));
    assert_eq!(got, Usage::None);
}

#[test]
fn test_contains_await_of() {
    let block = stmts("x()\nawait r\n");
    assert!(contains_await_of(&block, "r"));
    assert!(!contains_await_of(&block, "s"));
}

#[test]
fn test_contains_await_of_recurses() {
    let block = stmts("if c {\n    await r\n}\n");
    assert!(contains_await_of(&block, "r"));
}

#[test]
fn test_contains_await_of_skips_nested_fn() {
    let block = stmts("fn inner() {\n    await r\n}\n");
    assert!(!contains_await_of(&block, "r"));
}

#[test]
fn test_parse_rescue_header() {
    let s = stmt("do {\n    x()\n} rescue NetError as e {\n    h(e)\n}\n");
    let ranges = crate::stmt::block_ranges(&s);
    let header =
        parse_rescue_header(&s.tokens[ranges[0].close + 1..ranges[1].open]).unwrap();
    assert_eq!(header.ty.as_deref(), Some("NetError"));
    assert_eq!(header.binding.as_deref(), Some("e"));
}

#[test]
fn test_parse_rescue_header_bare() {
    let s = stmt("do {\n    x()\n} rescue {\n    h()\n}\n");
    let ranges = crate::stmt::block_ranges(&s);
    let header =
        parse_rescue_header(&s.tokens[ranges[0].close + 1..ranges[1].open]).unwrap();
    assert_eq!(header.ty, None);
    assert_eq!(header.binding, None);
}

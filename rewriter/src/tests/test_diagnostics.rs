use super::common::{rewrite_lenient, rewrite_strict, src};
use crate::{DiagnosticCode, DiagnosticKind, format_diagnostics};

fn codes(input: &str) -> Vec<DiagnosticCode> {
    rewrite_lenient(input)
        .diagnostics
        .iter()
        .map(|d| d.code)
        .collect()
}

#[test]
fn test_binding_without_await_lenient() {
    let input = src(r#"
        fn f() {
            var r = compute() later:
            done()
        }"#);
    let out = rewrite_lenient(&input);
    assert_eq!(
        out.diagnostics.iter().map(|d| d.code).collect::<Vec<_>>(),
        vec![DiagnosticCode::BindingWithoutAwait]
    );
    // The offending statement stays as written.
    assert!(out.source.contains("var r = compute() later:"), "{}", out.source);
}

#[test]
fn test_binding_without_await_strict() {
    let input = src(r#"
        fn f() {
            var r = compute() later:
            done()
        }"#);
    let err = rewrite_strict(&input).unwrap_err();
    assert_eq!(err.code, DiagnosticCode::BindingWithoutAwait);
}

#[test]
fn test_return_value_suffix_lenient() {
    let input = src(r#"
        fn f() {
            return g() later:
        }"#);
    let out = rewrite_lenient(&input);
    assert_eq!(
        out.diagnostics.iter().map(|d| d.code).collect::<Vec<_>>(),
        vec![DiagnosticCode::SuffixInReturnValue]
    );
    // The statement stays as written; the suffix never reaches a callback
    // argument list.
    assert!(out.source.contains("return g() later:"), "{}", out.source);
    assert!(!out.source.contains("__cb"), "{}", out.source);
}

#[test]
fn test_return_value_suffix_strict() {
    let input = src(r#"
        fn f() {
            return g() later:
        }"#);
    let err = rewrite_strict(&input).unwrap_err();
    assert_eq!(err.code, DiagnosticCode::SuffixInReturnValue);
}

#[test]
fn test_return_value_suffix_in_continuation() {
    // The malformed return sits in a resumed region; the rest of the rewrite
    // still goes through.
    let input = src(r#"
        fn f() {
            start() later:
            return g() later:
        }"#);
    let out = rewrite_lenient(&input);
    assert_eq!(
        out.diagnostics.iter().map(|d| d.code).collect::<Vec<_>>(),
        vec![DiagnosticCode::SuffixInReturnValue]
    );
    assert!(out.source.contains("return g() later:"), "{}", out.source);
    assert!(out.source.contains("start(__k2)"), "{}", out.source);
}

#[test]
fn test_await_without_binding() {
    let input = src(r#"
        fn f() {
            log() later ignore:
            await x
        }"#);
    assert_eq!(codes(&input), vec![DiagnosticCode::AwaitWithoutBinding]);
}

#[test]
fn test_await_outside_error_scope() {
    let input = src(r#"
        fn f() {
            await r
        }"#);
    assert_eq!(codes(&input), vec![DiagnosticCode::AwaitOutsideErrorScope]);
}

#[test]
fn test_repeat_outside_continuation() {
    let input = src(r#"
        fn f() {
            poll() later repeat:
        }"#);
    assert_eq!(codes(&input), vec![DiagnosticCode::RepeatOutsideContinuation]);
}

#[test]
fn test_repeat_dead_code_warning() {
    let input = src(r#"
        fn f() {
            poll() later:
            check() later repeat:
            dead()
        }"#);
    let out = rewrite_lenient(&input);
    assert_eq!(out.diagnostics.len(), 1);
    let diag = &out.diagnostics[0];
    assert_eq!(diag.code, DiagnosticCode::RepeatDeadCode);
    assert_eq!(diag.kind, DiagnosticKind::Warning);
    // A warning does not block the rewrite.
    assert!(!out.source.contains("later"), "{}", out.source);
}

#[test]
fn test_unknown_suffix_top_level() {
    let input = "f() later bogus:\n";
    let out = rewrite_lenient(input);
    assert_eq!(
        out.diagnostics.iter().map(|d| d.code).collect::<Vec<_>>(),
        vec![DiagnosticCode::UnknownSuffixVariant]
    );
    assert_eq!(out.source, input);

    let err = rewrite_strict(input).unwrap_err();
    assert_eq!(err.code, DiagnosticCode::UnknownSuffixVariant);
}

#[test]
fn test_lex_error_returns_input_unchanged() {
    let input = "var s = \"oops\n";
    let out = rewrite_lenient(input);
    assert_eq!(out.source, input);
    assert_eq!(
        out.diagnostics.iter().map(|d| d.code).collect::<Vec<_>>(),
        vec![DiagnosticCode::UnterminatedString]
    );
}

#[test]
fn test_format_diagnostics_rendering() {
    let input = "f() later bogus:\n";
    let out = rewrite_lenient(input);
    let rendered = format_diagnostics(input, out.diagnostics);
    insta::assert_snapshot!(rendered, @r#"
    error[unknown-suffix-variant]: deferred-call suffix must be `later:`, `later repeat:` or `later ignore:`, found `bogus`
      --> <input>:1:11 [10..15]
       | f() later bogus:
       |           ^^^^^
    "#);
}

#[test]
fn test_diagnostics_sorted_by_span() {
    let input = src(r#"
        fn f() {
            await r
            poll() later repeat:
        }"#);
    let out = rewrite_lenient(&input);
    let spans: Vec<u32> = out.diagnostics.iter().map(|d| d.span.start).collect();
    let mut sorted = spans.clone();
    sorted.sort_unstable();
    // Collection order is already source order here.
    assert_eq!(spans, sorted);
    assert_eq!(
        out.diagnostics.iter().map(|d| d.code).collect::<Vec<_>>(),
        vec![
            DiagnosticCode::AwaitOutsideErrorScope,
            DiagnosticCode::RepeatOutsideContinuation,
        ]
    );
}

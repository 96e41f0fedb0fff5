use super::common::{rewrite, src};
use crate::INDENT;
use crate::layout::verify_layout;

#[test]
fn test_rewritten_outputs_verify() {
    let cases = [
        src(r#"
        fn f() {
            call(x) later:
            print("b")
        }"#),
        src(r#"
        fn g() {
            var r = compute() later:
            await r
            use(r)
        }"#),
        src(r#"
        fn h() {
            do {
                risky() later:
                ok()
            } rescue as e {
                log(e)
            } finally {
                close()
            }
        }"#),
        src(r#"
        fn f(c) {
            if c {
                call() later:
                inner()
            }
            outer()
        }"#),
    ];
    for input in &cases {
        let got = rewrite(input);
        verify_layout(&got, INDENT).unwrap_or_else(|e| panic!("{e}\n{got}"));
    }
}

#[test]
fn test_accepts_well_formed_text() {
    let text = "fn f() {\n    if c {\n        x()\n    }\n}\n";
    assert!(verify_layout(text, 4).is_ok());
}

#[test]
fn test_rejects_bad_indent() {
    let text = "fn f() {\n  x()\n}\n";
    let err = verify_layout(text, 4).unwrap_err();
    assert_eq!(err.line, 2);
}

#[test]
fn test_rejects_unbalanced_close() {
    let text = "x()\n}\n";
    assert!(verify_layout(text, 4).is_err());
}

#[test]
fn test_rejects_unclosed_block() {
    let text = "fn f() {\n    x()\n";
    assert!(verify_layout(text, 4).is_err());
}

#[test]
fn test_handler_chain_lines_keep_depth() {
    // `} rescue as e {` closes and reopens on one line.
    let text = "do {\n    x()\n} rescue as e {\n    h(e)\n}\n";
    assert!(verify_layout(text, 4).is_ok());
}

#[test]
fn test_blank_lines_ignored() {
    let text = "fn f() {\n\n    x()\n\n}\n";
    assert!(verify_layout(text, 4).is_ok());
}

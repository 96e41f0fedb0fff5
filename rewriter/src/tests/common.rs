use crate::{Policy, RewriteError, RewriteOptions, RewriteOutput, rewrite_source};

pub fn trim_indent(s: &str) -> String {
    let lines: Vec<&str> = s.lines().collect();
    let min_indent = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.chars().take_while(|c| c.is_whitespace()).count())
        .min()
        .unwrap_or(0);

    lines
        .iter()
        // Skip the first line (which is the empty line)
        .skip(1)
        .map(|l| {
            if l.len() >= min_indent {
                &l[min_indent..]
            } else {
                *l
            }
        })
        .collect::<Vec<&str>>()
        .join("\n")
}

#[test]
fn test_trim_indent() {
    let s = r#"
        fn f() {
            print("a")
        }"#;
    let expected = "fn f() {\n    print(\"a\")\n}";
    assert_eq!(expected, trim_indent(s));
}

/// Builds a source file from an indented raw literal: dedents and appends the
/// trailing newline every file ends with.
pub fn src(raw: &str) -> String {
    format!("{}\n", trim_indent(raw))
}

/// Opt-in log output for test runs, e.g. `RUST_LOG=rewriter=debug`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn rewrite_lenient(input: &str) -> RewriteOutput {
    init_tracing();
    rewrite_source(input, &RewriteOptions::default()).unwrap()
}

/// Rewrites under the default (lenient) policy and asserts a clean run.
pub fn rewrite(input: &str) -> String {
    let out = rewrite_lenient(input);
    assert!(
        out.diagnostics.is_empty(),
        "unexpected diagnostics: {:?}",
        out.diagnostics
    );
    out.source
}

pub fn rewrite_strict(input: &str) -> Result<RewriteOutput, RewriteError> {
    rewrite_source(
        input,
        &RewriteOptions {
            policy: Policy::Strict,
            ..RewriteOptions::default()
        },
    )
}

use crate::diagnostics::{Diagnostic, DiagnosticCode, DiagnosticKind};

mod token;

pub use token::{Lit, LitKind, Span, Symbol, Token, TokenIdx, TokenKind, TokenRange, render_tokens};

pub struct LexOutput {
    pub tokens: Vec<Token>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Lex the input into a lossless token stream.
///
/// - Numbers: ASCII digits only (no decimals).
/// - Strings: double-quoted, no escapes.
/// - Identifiers: ASCII letters/`_` and any non-ASCII codepoint.
/// - Spaces/tabs become [`TokenKind::Whitespace`] runs and every `\n` becomes a
///   [`TokenKind::Newline`]; concatenating all token texts reproduces the input.
pub fn lex(input: &str) -> LexOutput {
    let mut tokens = Vec::new();
    let mut diagnostics = Vec::new();
    let mut iter = input.char_indices().peekable();

    while let Some((start, ch)) = iter.next() {
        if ch == '\n' {
            tokens.push(Token::new(
                TokenKind::Newline,
                Span::new(start as u32, (start + 1) as u32),
            ));
            continue;
        }

        // Whitespace is kept: the rewriter reconstructs formatting from tokens.
        if matches!(ch, ' ' | '\t' | '\r') {
            let mut end = start + ch.len_utf8();
            while let Some(&(i, c2)) = iter.peek() {
                if matches!(c2, ' ' | '\t' | '\r') {
                    iter.next();
                    end = i + c2.len_utf8();
                } else {
                    break;
                }
            }
            tokens.push(Token::new(
                TokenKind::Whitespace(Symbol::new(&input[start..end])),
                Span::new(start as u32, end as u32),
            ));
            continue;
        }

        let kind = match ch {
            '=' => {
                if matches!(iter.peek(), Some((_, '='))) {
                    iter.next();
                    TokenKind::EqEq
                } else {
                    TokenKind::Eq
                }
            }
            '!' => {
                if matches!(iter.peek(), Some((_, '='))) {
                    iter.next();
                    TokenKind::Ne
                } else {
                    TokenKind::Bang
                }
            }
            '<' => {
                if matches!(iter.peek(), Some((_, '='))) {
                    iter.next();
                    TokenKind::Le
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if matches!(iter.peek(), Some((_, '='))) {
                    iter.next();
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            '&' => {
                if matches!(iter.peek(), Some((_, '&'))) {
                    iter.next();
                    TokenKind::AndAnd
                } else {
                    diagnostics.push(make_error(
                        Span::new(start as u32, (start + 1) as u32),
                        "unexpected char '&' (did you mean '&&')".to_string(),
                    ));
                    break;
                }
            }
            '|' => {
                if matches!(iter.peek(), Some((_, '|'))) {
                    iter.next();
                    TokenKind::OrOr
                } else {
                    diagnostics.push(make_error(
                        Span::new(start as u32, (start + 1) as u32),
                        "unexpected char '|' (did you mean '||')".to_string(),
                    ));
                    break;
                }
            }

            '/' => {
                if matches!(iter.peek(), Some((_, '/'))) {
                    iter.next();
                    let mut end = start + 2;
                    while let Some(&(i, c2)) = iter.peek() {
                        if c2 == '\n' {
                            break;
                        }
                        iter.next();
                        end = i + c2.len_utf8();
                    }

                    tokens.push(Token::new(
                        TokenKind::LineComment(Symbol::new(&input[start..end])),
                        Span::new(start as u32, end as u32),
                    ));
                    continue;
                } else if matches!(iter.peek(), Some((_, '*'))) {
                    iter.next();

                    let mut end = start + 2;
                    let mut terminated = false;
                    while let Some((i, c2)) = iter.next() {
                        if c2 == '*' && matches!(iter.peek(), Some((_, '/'))) {
                            let (j, slash) = match iter.next() {
                                Some(pair) => pair,
                                None => break,
                            };
                            end = j + slash.len_utf8();
                            terminated = true;
                            break;
                        }
                        end = i + c2.len_utf8();
                    }

                    if !terminated {
                        diagnostics.push(Diagnostic {
                            kind: DiagnosticKind::Error,
                            code: DiagnosticCode::UnterminatedComment,
                            message: "unterminated block comment".to_string(),
                            span: Span::new(start as u32, input.len() as u32),
                            notes: vec![],
                        });
                        break;
                    }

                    tokens.push(Token::new(
                        TokenKind::BlockComment(Symbol::new(&input[start..end])),
                        Span::new(start as u32, end as u32),
                    ));
                    continue;
                } else {
                    TokenKind::Slash
                }
            }

            '(' => TokenKind::OpenParen,
            ')' => TokenKind::CloseParen,
            '{' => TokenKind::OpenBrace,
            '}' => TokenKind::CloseBrace,
            '[' => TokenKind::OpenBracket,
            ']' => TokenKind::CloseBracket,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semi,
            '.' => TokenKind::Dot,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '%' => TokenKind::Percent,

            '"' => {
                // Read string until next quote (no escapes).
                let mut end: Option<usize> = None;
                for (i, c) in iter.by_ref() {
                    if c == '"' {
                        end = Some(i + 1);
                        break;
                    }
                }

                let end = match end {
                    Some(end) => end,
                    None => {
                        diagnostics.push(Diagnostic {
                            kind: DiagnosticKind::Error,
                            code: DiagnosticCode::UnterminatedString,
                            message: "unterminated string literal".to_string(),
                            span: Span::new(start as u32, input.len() as u32),
                            notes: vec![],
                        });
                        break;
                    }
                };

                tokens.push(Token::new(
                    TokenKind::Literal(Lit {
                        kind: LitKind::String,
                        symbol: Symbol::new(&input[start..end]),
                    }),
                    Span::new(start as u32, end as u32),
                ));
                continue;
            }

            c if c.is_ascii_digit() => {
                let mut end = start + c.len_utf8();
                while let Some(&(i, c2)) = iter.peek() {
                    if c2.is_ascii_digit() {
                        iter.next();
                        end = i + c2.len_utf8();
                    } else {
                        break;
                    }
                }

                tokens.push(Token::new(
                    TokenKind::Literal(Lit {
                        kind: LitKind::Number,
                        symbol: Symbol::new(&input[start..end]),
                    }),
                    Span::new(start as u32, end as u32),
                ));
                continue;
            }

            c if is_ident_start(c) => {
                let mut end = start + c.len_utf8();
                let mut ident = String::new();
                ident.push(c);

                while let Some(&(i, ch2)) = iter.peek() {
                    if is_ident_continue(ch2) {
                        ident.push(ch2);
                        iter.next();
                        end = i + ch2.len_utf8();
                    } else {
                        break;
                    }
                }

                let kind = match ident.as_str() {
                    "true" | "false" => TokenKind::Literal(Lit {
                        kind: LitKind::Bool,
                        symbol: Symbol::new(ident),
                    }),
                    word => match TokenKind::keyword(word) {
                        Some(kw) => kw,
                        None => TokenKind::Ident(Symbol::new(ident)),
                    },
                };

                tokens.push(Token::new(kind, Span::new(start as u32, end as u32)));
                continue;
            }

            _ => {
                diagnostics.push(make_error(
                    Span::new(start as u32, (start + ch.len_utf8()) as u32),
                    format!("unexpected char '{}'", ch),
                ));
                break;
            }
        };

        // Two-char operators consumed an extra char; extend the span.
        let end = match kind {
            TokenKind::Le
            | TokenKind::Ge
            | TokenKind::EqEq
            | TokenKind::Ne
            | TokenKind::AndAnd
            | TokenKind::OrOr => (start + 2) as u32,
            _ => (start + ch.len_utf8()) as u32,
        };

        tokens.push(Token::new(kind, Span::new(start as u32, end)));
    }

    tokens.push(Token::new(
        TokenKind::Eof,
        Span::new(input.len() as u32, input.len() as u32),
    ));

    LexOutput {
        tokens,
        diagnostics,
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_ascii_alphabetic() || c.len_utf8() > 1
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric() || c.len_utf8() > 1
}

fn make_error(span: Span, message: String) -> Diagnostic {
    Diagnostic {
        kind: DiagnosticKind::Error,
        code: DiagnosticCode::UnexpectedChar,
        message,
        span,
        notes: vec![],
    }
}

//! Lexer tokens and spans.
//!
//! [`Span`] uses UTF-8 byte offsets into the original source and is half-open `[start, end)`.
//! Unlike a conventional lexer, whitespace runs and newlines are real tokens here: the
//! rewriter reconstructs source text, so concatenating `Token::text()` over a statement's
//! tokens must reproduce that statement's source exactly. Synthesized tokens carry
//! [`Span::SYNTHETIC`].

pub type TokenIdx = u32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub text: String,
}

impl Symbol {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Half-open byte span into the source string: `[start, end)`.
///
/// `start` and `end` must be valid UTF-8 slice boundaries for that same source string.
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    /// The span used for tokens the rewriter synthesizes (no source position).
    pub const SYNTHETIC: Span = Span { start: 0, end: 0 };

    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Half-open range of token indices: `[lo, hi)`.
pub struct TokenRange {
    pub lo: TokenIdx,
    pub hi: TokenIdx,
}

impl TokenRange {
    /// Construct a token range `[lo, hi)`.
    pub fn new(lo: TokenIdx, hi: TokenIdx) -> Self {
        Self { lo, hi }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LitKind {
    Bool,
    Number,
    String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lit {
    pub kind: LitKind,
    /// Exact source text, quotes included for strings.
    pub symbol: Symbol,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /* Reserved keywords the rewriter dispatches on. */
    /// `fn`
    Fn,
    /// `do`
    Do,
    /// `rescue`
    Rescue,
    /// `finally`
    Finally,
    /// `later`
    Later,
    /// `await`
    Await,
    /// `return`
    Return,
    /// `var`
    Var,
    /// `throw`
    Throw,
    /// `if`
    If,
    /// `while`
    While,
    /// `not`
    Not,
    /// `none`
    NoneKw,

    /* Structural symbols */
    /// `(`
    OpenParen,
    /// `)`
    CloseParen,
    /// `{`
    OpenBrace,
    /// `}`
    CloseBrace,
    /// `[`
    OpenBracket,
    /// `]`
    CloseBracket,
    /// `,`
    Comma,
    /// `:`
    Colon,
    /// `;`
    Semi,
    /// `.`
    Dot,

    /* Operators */
    /// `=`
    Eq,
    /// `==`
    EqEq,
    /// `!=`
    Ne,
    /// `!`
    Bang,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `&&`
    AndAnd,
    /// `||`
    OrOr,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,

    /* Literals and names */
    /// Literal token.
    Literal(Lit),
    /// Identifier token (including contextual keywords like `repeat`, `ignore`, `as`).
    Ident(Symbol),

    /* Trivia */
    /// A line comment, exact text including the leading `//`.
    LineComment(Symbol),
    /// A block comment, exact text including the `/*` and `*/` delimiters.
    BlockComment(Symbol),
    /// A run of spaces and/or tabs (and `\r`), exact text.
    Whitespace(Symbol),
    /// A single `\n`.
    Newline,

    /// End Of File
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A token with its source span.
///
/// `span` is a byte offset range into the original source (`[start, end)`).
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// A token created by the rewriter rather than the lexer.
    pub fn synthetic(kind: TokenKind) -> Self {
        Self {
            kind,
            span: Span::SYNTHETIC,
        }
    }

    pub fn is_trivia(&self) -> bool {
        self.kind.is_trivia()
    }

    /// The exact source text of this token.
    pub fn text(&self) -> &str {
        self.kind.text()
    }

    /// The identifier text, if this is an identifier token.
    pub fn ident_text(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Ident(sym) => Some(&sym.text),
            _ => None,
        }
    }
}

impl TokenKind {
    pub fn is_trivia(&self) -> bool {
        matches!(
            self,
            TokenKind::LineComment(_)
                | TokenKind::BlockComment(_)
                | TokenKind::Whitespace(_)
                | TokenKind::Newline
        )
    }

    pub fn is_comment(&self) -> bool {
        matches!(self, TokenKind::LineComment(_) | TokenKind::BlockComment(_))
    }

    /// The exact source text this kind renders as.
    pub fn text(&self) -> &str {
        use TokenKind::*;
        match self {
            Fn => "fn",
            Do => "do",
            Rescue => "rescue",
            Finally => "finally",
            Later => "later",
            Await => "await",
            Return => "return",
            Var => "var",
            Throw => "throw",
            If => "if",
            While => "while",
            Not => "not",
            NoneKw => "none",

            OpenParen => "(",
            CloseParen => ")",
            OpenBrace => "{",
            CloseBrace => "}",
            OpenBracket => "[",
            CloseBracket => "]",
            Comma => ",",
            Colon => ":",
            Semi => ";",
            Dot => ".",

            Eq => "=",
            EqEq => "==",
            Ne => "!=",
            Bang => "!",
            Lt => "<",
            Le => "<=",
            Gt => ">",
            Ge => ">=",
            AndAnd => "&&",
            OrOr => "||",
            Plus => "+",
            Minus => "-",
            Star => "*",
            Slash => "/",
            Percent => "%",

            Literal(lit) => &lit.symbol.text,
            Ident(sym) => &sym.text,

            LineComment(sym) => &sym.text,
            BlockComment(sym) => &sym.text,
            Whitespace(sym) => &sym.text,
            Newline => "\n",

            Eof => "",
        }
    }

    /// Maps a reserved word to its keyword kind, if it is one.
    pub fn keyword(ident: &str) -> Option<TokenKind> {
        use TokenKind::*;
        let kind = match ident {
            "fn" => Fn,
            "do" => Do,
            "rescue" => Rescue,
            "finally" => Finally,
            "later" => Later,
            "await" => Await,
            "return" => Return,
            "var" => Var,
            "throw" => Throw,
            "if" => If,
            "while" => While,
            "not" => Not,
            "none" => NoneKw,
            _ => return None,
        };
        Some(kind)
    }
}

/// Renders a token slice back to source text.
///
/// For lexed tokens this reproduces the input exactly (the lossless-token invariant);
/// for synthesized tokens it produces the text the rewriter laid out.
pub fn render_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    for tok in tokens {
        out.push_str(tok.text());
    }
    out
}

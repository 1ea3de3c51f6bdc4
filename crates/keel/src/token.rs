/// Lexical classification of a single token.
///
/// The set is deliberately minimal: everything that is not structural
/// punctuation, a literal, or a variable reference is either a `Word` (command
/// names, bare arguments) or an `Operator` (a symbol registered at runtime via
/// `defoperator`). The tokenizer never decides what an operator *means*; it
/// only recognizes the symbols the registry currently knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum TokenKind {
    /// Placeholder kind; never produced by the tokenizer.
    Empty,
    /// Identifier, command name, or unquoted literal.
    Word,
    /// `"quoted string"` — quotes included in the token text.
    String,
    /// `123` or `3.14`.
    Number,
    /// `$var` or `${var}` — the `$` (and braces) included in the token text.
    Variable,
    /// A symbol found in the operator registry (`+`, `==`, `++`, `?`, …).
    Operator,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semicolon,
    /// A standalone `=` that is not the prefix of a longer registered operator.
    Assign,
    /// Reserved; comments are consumed by the tokenizer without emitting tokens.
    Comment,
    /// End of the input line. Always the last token of a tokenization.
    Eof,
    /// A single unrecognized character. Never aborts tokenization.
    Error,
}

/// One token of a source line.
///
/// `text` borrows from the line passed to [`tokenize`](crate::tokenize) and is
/// the exact source substring: string tokens keep their surrounding quotes and
/// variable tokens keep the leading `$` (and `{…}` if present). Tokens are
/// only valid while that line's processing is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// 1-based source line number.
    pub line: u32,
    /// 1-based column of the token's first character.
    pub col: u32,
}

impl<'a> Token<'a> {
    pub(crate) fn new(kind: TokenKind, text: &'a str, line: u32, col: u32) -> Self {
        Self { kind, text, line, col }
    }

    /// True for the terminating end-of-line token.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }

    /// True if this token is a `Word` whose text equals `word`.
    #[must_use]
    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Word && self.text == word
    }
}

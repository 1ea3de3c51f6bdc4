//! The dynamic tokenizer.
//!
//! One call tokenizes one source line. Operator recognition is driven by the
//! [`OperatorRegistry`] at call time: a symbol registered by a script on one
//! line is recognized on the next. Matching is longest-first, so `==` never
//! splits into two `=` tokens. Classification is byte-level ASCII, matching
//! the shell's historical behavior; non-ASCII bytes fall out as `Error`
//! tokens, which never abort the line.

use crate::{
    registry::OperatorRegistry,
    token::{Token, TokenKind},
};

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Tokenizes one line of source text.
///
/// `line_no` is the 1-based source line; every token records it together with
/// the 1-based column of its first byte. The returned sequence always ends
/// with an [`TokenKind::Eof`] token. Token text borrows from `line`.
#[must_use]
pub fn tokenize<'a>(line: &'a str, line_no: u32, registry: &OperatorRegistry) -> Vec<Token<'a>> {
    let bytes = line.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    'scan: while i < bytes.len() {
        // Whitespace separates tokens and is not emitted.
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        let start = i;
        let col = (start + 1) as u32;

        match bytes[i] {
            // A comment consumes the remainder of the line; nothing is emitted.
            b'#' => break 'scan,

            // Variable: `$name` or `${name}`, text includes the `$` and braces.
            b'$' => {
                i += 1;
                if bytes.get(i) == Some(&b'{') {
                    i += 1;
                    while i < bytes.len() && bytes[i] != b'}' {
                        i += 1;
                    }
                    if i < bytes.len() {
                        i += 1;
                    }
                } else {
                    while i < bytes.len() && is_word_byte(bytes[i]) {
                        i += 1;
                    }
                }
                tokens.push(Token::new(TokenKind::Variable, &line[start..i], line_no, col));
            }

            // String: quotes included; a backslash escapes the next byte.
            // Unescaping happens later, in the expansion stage.
            b'"' => {
                i += 1;
                while i < bytes.len() {
                    match bytes[i] {
                        b'\\' if i + 1 < bytes.len() => i += 2,
                        b'"' => {
                            i += 1;
                            break;
                        }
                        _ => i += 1,
                    }
                }
                tokens.push(Token::new(TokenKind::String, &line[start..i], line_no, col));
            }

            // Number: digits, optionally one '.', more digits. A leading '.'
            // counts only when a digit follows.
            b if b.is_ascii_digit() || (b == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)) => {
                let leading_dot = b == b'.';
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                if !leading_dot && bytes.get(i) == Some(&b'.') {
                    i += 1;
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                tokens.push(Token::new(TokenKind::Number, &line[start..i], line_no, col));
            }

            _ => {
                // Structural punctuation. `=` is Assign only when the registry's
                // longest match here is not a longer symbol such as `==`.
                let punct = match bytes[i] {
                    b'(' => Some(TokenKind::LParen),
                    b')' => Some(TokenKind::RParen),
                    b'{' => Some(TokenKind::LBrace),
                    b'}' => Some(TokenKind::RBrace),
                    b'[' => Some(TokenKind::LBracket),
                    b']' => Some(TokenKind::RBracket),
                    b';' => Some(TokenKind::Semicolon),
                    b'=' => {
                        let longest = registry.match_longest(&line[i..]).map_or(0, |(_, len)| len);
                        if longest > 1 { None } else { Some(TokenKind::Assign) }
                    }
                    _ => None,
                };
                if let Some(kind) = punct {
                    i += 1;
                    tokens.push(Token::new(kind, &line[start..i], line_no, col));
                    continue;
                }

                // Script-defined operator, longest match first.
                if let Some((_, len)) = registry.match_longest(&line[i..]) {
                    i += len;
                    tokens.push(Token::new(TokenKind::Operator, &line[start..i], line_no, col));
                    continue;
                }

                // Word. `-` may start a word but the run never continues over
                // it, so `build-cache` reads as `build`, `-`, `cache` and the
                // command dispatcher re-combines `-word` arguments.
                if is_word_byte(bytes[i]) || bytes[i] == b'-' {
                    if bytes[i] == b'-' {
                        i += 1;
                    } else {
                        while i < bytes.len() && is_word_byte(bytes[i]) {
                            i += 1;
                        }
                    }
                    tokens.push(Token::new(TokenKind::Word, &line[start..i], line_no, col));
                    continue;
                }

                // Unrecognized character: record and keep going. The whole
                // character is consumed so multi-byte input stays intact.
                let c = line[start..].chars().next().expect("scan index is on a char boundary");
                i += c.len_utf8();
                tokens.push(Token::new(TokenKind::Error, &line[start..i], line_no, col));
            }
        }
    }

    let eof_col = (i + 1) as u32;
    tokens.push(Token::new(TokenKind::Eof, "", line_no, eof_col));
    tokens
}

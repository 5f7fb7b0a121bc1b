//! Tokenizer for predicate source text

use crate::predicate::PredicateError;

/// Kinds of tokens produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Semicolon,
    Dot,
    QuestionDot,
    Question,
    Colon,
    Arrow,
    Assign,
    Bang,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    EqEq,
    NotEq,
    EqEqEq,
    NotEqEq,
    AndAnd,
    OrOr,
    Nullish,
    Eof,
}

/// A token with the byte offset where it starts
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub offset: usize,
    /// A line break separates this token from the previous one
    pub line_break: bool,
}

/// Splits predicate source into tokens
///
/// Line (`//`) and block (`/* */`) comments are skipped. The returned
/// vector always ends with an `Eof` token.
pub fn tokenize(source: &str) -> Result<Vec<Token>, PredicateError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut line_break = false;

    while pos < bytes.len() {
        let c = bytes[pos];

        if c.is_ascii_whitespace() {
            line_break |= c == b'\n';
            pos += 1;
            continue;
        }

        if c == b'/' && bytes.get(pos + 1) == Some(&b'/') {
            while pos < bytes.len() && bytes[pos] != b'\n' {
                pos += 1;
            }
            continue;
        }

        if c == b'/' && bytes.get(pos + 1) == Some(&b'*') {
            let start = pos;
            pos += 2;
            loop {
                if pos + 1 >= bytes.len() {
                    return Err(PredicateError::syntax("Unterminated comment", start));
                }
                if bytes[pos] == b'*' && bytes[pos + 1] == b'/' {
                    pos += 2;
                    break;
                }
                line_break |= bytes[pos] == b'\n';
                pos += 1;
            }
            continue;
        }

        let start = pos;

        let starts_fraction =
            c == b'.' && bytes.get(pos + 1).is_some_and(|d| d.is_ascii_digit());
        if c.is_ascii_digit() || starts_fraction {
            let (number, end) = lex_number(source, pos)?;
            tokens.push(Token {
                kind: TokenKind::Number(number),
                offset: start,
                line_break,
            });
            line_break = false;
            pos = end;
            continue;
        }

        if c == b'"' || c == b'\'' {
            let (text, end) = lex_string(source, pos)?;
            tokens.push(Token {
                kind: TokenKind::Str(text),
                offset: start,
                line_break,
            });
            line_break = false;
            pos = end;
            continue;
        }

        if c.is_ascii_alphabetic() || c == b'_' || c == b'$' {
            while pos < bytes.len()
                && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_' || bytes[pos] == b'$')
            {
                pos += 1;
            }
            tokens.push(Token {
                kind: TokenKind::Ident(source[start..pos].to_string()),
                offset: start,
                line_break,
            });
            line_break = false;
            continue;
        }

        let next = bytes.get(pos + 1).copied();
        let next2 = bytes.get(pos + 2).copied();
        let (kind, len) = match (c, next, next2) {
            (b'=', Some(b'='), Some(b'=')) => (TokenKind::EqEqEq, 3),
            (b'!', Some(b'='), Some(b'=')) => (TokenKind::NotEqEq, 3),
            (b'=', Some(b'='), _) => (TokenKind::EqEq, 2),
            (b'!', Some(b'='), _) => (TokenKind::NotEq, 2),
            (b'=', Some(b'>'), _) => (TokenKind::Arrow, 2),
            (b'<', Some(b'='), _) => (TokenKind::LessEq, 2),
            (b'>', Some(b'='), _) => (TokenKind::GreaterEq, 2),
            (b'&', Some(b'&'), _) => (TokenKind::AndAnd, 2),
            (b'|', Some(b'|'), _) => (TokenKind::OrOr, 2),
            (b'?', Some(b'?'), _) => (TokenKind::Nullish, 2),
            // `a?.5:b` is a conditional, not optional chaining
            (b'?', Some(b'.'), n) if !n.is_some_and(|d| d.is_ascii_digit()) => {
                (TokenKind::QuestionDot, 2)
            }
            (b'(', _, _) => (TokenKind::LParen, 1),
            (b')', _, _) => (TokenKind::RParen, 1),
            (b'[', _, _) => (TokenKind::LBracket, 1),
            (b']', _, _) => (TokenKind::RBracket, 1),
            (b'{', _, _) => (TokenKind::LBrace, 1),
            (b'}', _, _) => (TokenKind::RBrace, 1),
            (b',', _, _) => (TokenKind::Comma, 1),
            (b';', _, _) => (TokenKind::Semicolon, 1),
            (b'.', _, _) => (TokenKind::Dot, 1),
            (b'?', _, _) => (TokenKind::Question, 1),
            (b':', _, _) => (TokenKind::Colon, 1),
            (b'=', _, _) => (TokenKind::Assign, 1),
            (b'!', _, _) => (TokenKind::Bang, 1),
            (b'+', _, _) => (TokenKind::Plus, 1),
            (b'-', _, _) => (TokenKind::Minus, 1),
            (b'*', _, _) => (TokenKind::Star, 1),
            (b'/', _, _) => (TokenKind::Slash, 1),
            (b'%', _, _) => (TokenKind::Percent, 1),
            (b'<', _, _) => (TokenKind::Less, 1),
            (b'>', _, _) => (TokenKind::Greater, 1),
            _ => {
                let ch = source[pos..].chars().next().unwrap_or('?');
                return Err(PredicateError::syntax(
                    format!("Unexpected character '{}'", ch),
                    pos,
                ));
            }
        };

        tokens.push(Token {
            kind,
            offset: start,
            line_break,
        });
        line_break = false;
        pos += len;
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        offset: source.len(),
        line_break,
    });

    Ok(tokens)
}

/// Lexes a decimal number literal with optional fraction and exponent
fn lex_number(source: &str, start: usize) -> Result<(f64, usize), PredicateError> {
    let bytes = source.as_bytes();
    let mut pos = start;

    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }

    if pos + 1 < bytes.len() && bytes[pos] == b'.' && bytes[pos + 1].is_ascii_digit() {
        pos += 1;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
    }

    if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
        let mut exp = pos + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        if exp < bytes.len() && bytes[exp].is_ascii_digit() {
            pos = exp;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
        }
    }

    if pos < bytes.len() && (bytes[pos].is_ascii_alphabetic() || bytes[pos] == b'_') {
        return Err(PredicateError::syntax(
            "Identifier directly after number",
            pos,
        ));
    }

    let literal = &source[start..pos];
    let normalized = if literal.starts_with('.') {
        format!("0{}", literal)
    } else {
        literal.to_string()
    };

    normalized
        .parse::<f64>()
        .map(|n| (n, pos))
        .map_err(|_| PredicateError::syntax("Invalid number literal", start))
}

/// Lexes a single- or double-quoted string literal
fn lex_string(source: &str, start: usize) -> Result<(String, usize), PredicateError> {
    let mut chars = source[start..].char_indices();
    let quote = match chars.next() {
        Some((_, q)) => q,
        None => return Err(PredicateError::syntax("Expected string", start)),
    };
    let mut text = String::new();

    while let Some((i, ch)) = chars.next() {
        match ch {
            c if c == quote => return Ok((text, start + i + 1)),
            '\n' => break,
            '\\' => {
                let (j, escaped) = chars
                    .next()
                    .ok_or_else(|| PredicateError::syntax("Unterminated string", start))?;
                match escaped {
                    'n' => text.push('\n'),
                    't' => text.push('\t'),
                    'r' => text.push('\r'),
                    '0' => text.push('\0'),
                    'u' => {
                        let hex_start = start + j + 1;
                        let hex = source.get(hex_start..hex_start + 4).ok_or_else(|| {
                            PredicateError::syntax("Invalid unicode escape", start + j)
                        })?;
                        let decoded = u32::from_str_radix(hex, 16)
                            .ok()
                            .and_then(char::from_u32)
                            .ok_or_else(|| {
                                PredicateError::syntax("Invalid unicode escape", start + j)
                            })?;
                        text.push(decoded);
                        for _ in 0..4 {
                            chars.next();
                        }
                    }
                    other => text.push(other),
                }
            }
            other => text.push(other),
        }
    }

    Err(PredicateError::syntax("Unterminated string", start))
}

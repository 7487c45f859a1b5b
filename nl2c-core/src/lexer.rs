//! Lexer for netlist sources.

use crate::error::CoreError;
use crate::types::Opcode;

/// Kind of a token produced by the lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Eof,

    Ident(String),
    /// Integer literal; `width` is set for bare binary strings (`0101`).
    Number { value: u64, width: Option<u32> },

    Comma, // ,
    Colon, // :
    Equal, // =

    // Section keywords
    Input,
    Output,
    Var,
    In,

    Opcode(Opcode),
}

/// A token with its 1-based source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

/// Lex a netlist source into tokens, ending with [`TokenKind::Eof`].
///
/// `#` starts a comment running to the end of the line.
pub fn lex(source: &str) -> Result<Vec<Token>, CoreError> {
    let mut lexer = Lexer {
        source,
        chars: source.as_bytes(),
        index: 0,
        line: 1,
        line_start: 0,
    };
    lexer.run()
}

struct Lexer<'src> {
    source: &'src str,
    chars: &'src [u8],
    index: usize,
    line: usize,
    line_start: usize,
}

impl<'src> Lexer<'src> {
    fn run(&mut self) -> Result<Vec<Token>, CoreError> {
        let mut tokens = Vec::new();

        while let Some(ch) = self.peek_char() {
            if is_whitespace(ch) {
                self.consume_char();
                continue;
            }
            if ch == b'#' {
                while self.peek_char().is_some_and(|c| c != b'\n') {
                    self.consume_char();
                }
                continue;
            }

            let (line, column) = (self.line, self.column());
            let kind = match ch {
                b',' => {
                    self.consume_char();
                    TokenKind::Comma
                }
                b':' => {
                    self.consume_char();
                    TokenKind::Colon
                }
                b'=' => {
                    self.consume_char();
                    TokenKind::Equal
                }
                b'0'..=b'9' => self.lex_number()?,
                _ if is_ident_start(ch) => self.lex_ident_or_keyword(),
                _ => {
                    return Err(self.error(format!(
                        "unexpected character '{}'",
                        char::from(ch).escape_default()
                    )));
                }
            };
            tokens.push(Token { kind, line, column });
        }

        tokens.push(Token {
            kind: TokenKind::Eof,
            line: self.line,
            column: self.column(),
        });
        Ok(tokens)
    }

    fn lex_number(&mut self) -> Result<TokenKind, CoreError> {
        let start = self.index;
        while self.peek_char().is_some_and(|c| c.is_ascii_alphanumeric()) {
            self.consume_char();
        }
        let text = &self.source[start..self.index];

        let (digits, radix, width) = if let Some(hex) = text.strip_prefix("0x") {
            (hex, 16, None)
        } else if let Some(bin) = text.strip_prefix("0b") {
            (bin, 2, None)
        } else if text.len() > 1 && text.starts_with('0') {
            if !text.bytes().all(|c| c == b'0' || c == b'1') {
                return Err(self.error(format!(
                    "invalid literal '{text}': leading zeros are only allowed in binary strings"
                )));
            }
            let width = u32::try_from(text.len()).unwrap_or(u32::MAX);
            (text, 2, Some(width))
        } else {
            (text, 10, None)
        };

        if digits.is_empty() {
            return Err(self.error(format!("literal '{text}' has no digits")));
        }
        let value = u64::from_str_radix(digits, radix)
            .map_err(|err| self.error(format!("invalid literal '{text}': {err}")))?;
        Ok(TokenKind::Number { value, width })
    }

    fn lex_ident_or_keyword(&mut self) -> TokenKind {
        let start = self.index;
        while self.peek_char().is_some_and(is_ident_continue) {
            self.consume_char();
        }
        let text = &self.source[start..self.index];

        match text {
            "INPUT" => TokenKind::Input,
            "OUTPUT" => TokenKind::Output,
            "VAR" => TokenKind::Var,
            "IN" => TokenKind::In,
            _ => match Opcode::from_keyword(text) {
                Some(op) => TokenKind::Opcode(op),
                None => TokenKind::Ident(text.to_string()),
            },
        }
    }

    fn error(&self, message: String) -> CoreError {
        CoreError::LexError {
            line: self.line,
            column: self.column(),
            message,
        }
    }

    fn column(&self) -> usize {
        self.index - self.line_start + 1
    }

    fn peek_char(&self) -> Option<u8> {
        self.chars.get(self.index).copied()
    }

    fn consume_char(&mut self) {
        if let Some(&ch) = self.chars.get(self.index) {
            self.index += 1;
            if ch == b'\n' {
                self.line += 1;
                self.line_start = self.index;
            }
        }
    }
}

fn is_whitespace(ch: u8) -> bool {
    matches!(ch, b' ' | b'\t' | b'\n' | b'\r')
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_ident_continue(ch: u8) -> bool {
    is_ident_start(ch) || ch.is_ascii_digit()
}

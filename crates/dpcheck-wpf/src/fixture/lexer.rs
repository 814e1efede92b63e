//! Lexer for the C# subset the fixture front end reads.
//!
//! Comments, preprocessor lines and whitespace are skipped. Operators the
//! parser does not distinguish come out as [`TokenKind::Punct`].

use dpcheck_core::patch::Span;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    /// String literal with escapes resolved.
    Str(String),
    Number,
    Char,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semi,
    Dot,
    Colon,
    ColonColon,
    Question,
    Lt,
    Gt,
    Assign,
    EqEq,
    NotEq,
    Bang,
    AndAnd,
    OrOr,
    Arrow,
    Star,
    Minus,
    /// Any other operator.
    Punct,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

pub struct Lexer<'a> {
    bytes: &'a [u8],
    pos: usize,
    token_start: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            bytes: source.as_bytes(),
            pos: 0,
            token_start: 0,
        }
    }

    /// Tokenize the whole source. The last token is always `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, (String, u32)> {
        let mut tokens = Vec::with_capacity(self.bytes.len() / 4);
        loop {
            let token = self.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                return Ok(tokens);
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, (String, u32)> {
        self.skip_trivia()?;
        self.token_start = self.pos;
        let Some(c) = self.advance() else {
            return Ok(self.make_token(TokenKind::Eof));
        };

        let kind = match c {
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b',' => TokenKind::Comma,
            b';' => TokenKind::Semi,
            b'.' if self.peek().is_some_and(|b| b.is_ascii_digit()) => {
                self.number_tail();
                TokenKind::Number
            }
            b'.' => TokenKind::Dot,
            b':' if self.eat(b':') => TokenKind::ColonColon,
            b':' => TokenKind::Colon,
            b'?' if self.eat(b'?') => {
                self.eat(b'=');
                TokenKind::Punct
            }
            b'?' => TokenKind::Question,
            b'<' if self.eat(b'=') => TokenKind::Punct,
            b'<' if self.eat(b'<') => {
                self.eat(b'=');
                TokenKind::Punct
            }
            b'<' => TokenKind::Lt,
            // `>>` stays two tokens so nested generic arguments close.
            b'>' if self.eat(b'=') => TokenKind::Punct,
            b'>' => TokenKind::Gt,
            b'=' if self.eat(b'=') => TokenKind::EqEq,
            b'=' if self.eat(b'>') => TokenKind::Arrow,
            b'=' => TokenKind::Assign,
            b'!' if self.eat(b'=') => TokenKind::NotEq,
            b'!' => TokenKind::Bang,
            b'&' if self.eat(b'&') => TokenKind::AndAnd,
            b'|' if self.eat(b'|') => TokenKind::OrOr,
            b'*' if self.eat(b'=') => TokenKind::Punct,
            b'*' => TokenKind::Star,
            b'-' if self.eat(b'=') || self.eat(b'-') || self.eat(b'>') => TokenKind::Punct,
            b'-' => TokenKind::Minus,
            b'+' | b'/' | b'%' | b'^' | b'&' | b'|' | b'~' => {
                if !self.eat(b'=') && c == b'+' {
                    self.eat(b'+');
                }
                TokenKind::Punct
            }
            b'"' => self.string(false)?,
            b'@' if self.eat(b'"') => self.string(true)?,
            b'$' if self.eat(b'"') => self.string(false)?,
            b'$' if self.peek() == Some(b'@') && self.peek_at(1) == Some(b'"') => {
                self.pos += 2;
                self.string(true)?
            }
            b'@' if self.peek().is_some_and(is_ident_start) => {
                self.ident_tail();
                TokenKind::Ident
            }
            b'\'' => self.char_literal()?,
            c if c.is_ascii_digit() => {
                self.number_tail();
                TokenKind::Number
            }
            c if is_ident_start(c) => {
                self.ident_tail();
                TokenKind::Ident
            }
            other => {
                return Err((
                    format!("unexpected character '{}'", other as char),
                    self.token_start as u32,
                ))
            }
        };
        Ok(self.make_token(kind))
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token {
            kind,
            span: Span::new(self.token_start as u32, self.pos as u32),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn eat(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_trivia(&mut self) -> Result<(), (String, u32)> {
        let mut line_start = self.pos == 0;
        while let Some(c) = self.peek() {
            match c {
                b'\n' => {
                    self.pos += 1;
                    line_start = true;
                }
                c if c.is_ascii_whitespace() => self.pos += 1,
                b'#' if line_start => self.skip_line(),
                b'/' if self.peek_at(1) == Some(b'/') => self.skip_line(),
                b'/' if self.peek_at(1) == Some(b'*') => {
                    let start = self.pos;
                    self.pos += 2;
                    loop {
                        match self.advance() {
                            Some(b'*') if self.eat(b'/') => break,
                            Some(_) => {}
                            None => return Err(("unterminated comment".to_string(), start as u32)),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
        Ok(())
    }

    fn skip_line(&mut self) {
        while self.peek().is_some_and(|c| c != b'\n') {
            self.pos += 1;
        }
    }

    fn ident_tail(&mut self) {
        while self.peek().is_some_and(is_ident_continue) {
            self.pos += 1;
        }
    }

    fn number_tail(&mut self) {
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == b'.' || c == b'_')
        {
            // `1.ToString()` is a member access, not a fraction.
            if self.peek() == Some(b'.') && !self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
                break;
            }
            self.pos += 1;
        }
    }

    fn string(&mut self, verbatim: bool) -> Result<TokenKind, (String, u32)> {
        let mut value = Vec::new();
        loop {
            let Some(c) = self.advance() else {
                return Err(("unterminated string".to_string(), self.token_start as u32));
            };
            match c {
                b'"' if verbatim && self.eat(b'"') => value.push(b'"'),
                b'"' => break,
                b'\\' if !verbatim => {
                    let Some(escaped) = self.advance() else {
                        return Err(("unterminated string".to_string(), self.token_start as u32));
                    };
                    value.push(match escaped {
                        b'n' => b'\n',
                        b't' => b'\t',
                        b'r' => b'\r',
                        b'0' => 0,
                        other => other,
                    });
                }
                b'\n' if !verbatim => {
                    return Err(("newline in string".to_string(), self.token_start as u32));
                }
                other => value.push(other),
            }
        }
        Ok(TokenKind::Str(String::from_utf8_lossy(&value).into_owned()))
    }

    fn char_literal(&mut self) -> Result<TokenKind, (String, u32)> {
        loop {
            match self.advance() {
                Some(b'\\') => {
                    self.advance();
                }
                Some(b'\'') => return Ok(TokenKind::Char),
                Some(b'\n') | None => {
                    return Err(("unterminated character literal".to_string(), self.token_start as u32))
                }
                Some(_) => {}
            }
        }
    }
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c >= 0x80
}

fn is_ident_continue(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c >= 0x80
}

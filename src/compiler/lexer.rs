use std::sync::mpsc;
use std::thread;

use crate::compiler::token::{Keyword, Sym, Token};
use crate::diagnostic::Diagnostic;
use crate::span::{Span, Spanned};

/// Largest Jack integer constant.
const MAX_INT: u32 = 32767;

/// Bound on the scanner→parser token queue. The scanner blocks when the
/// queue is full; the parser blocks when it is empty.
pub const TOKEN_QUEUE_CAPACITY: usize = 64;

pub type TokenResult = Result<Spanned<Token>, Diagnostic>;

pub struct Lexer<'src> {
    source: &'src [u8],
    file_id: u16,
    pos: usize,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str, file_id: u16) -> Self {
        Self {
            source: source.as_bytes(),
            file_id,
            pos: 0,
        }
    }

    /// Scan the whole input eagerly. Stops at the first lexical error.
    pub fn tokenize(mut self) -> Result<Vec<Spanned<Token>>, Diagnostic> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let is_eof = tok.node == Token::Eof;
            tokens.push(tok);
            if is_eof {
                return Ok(tokens);
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Spanned<Token>, Diagnostic> {
        self.skip_whitespace_and_comments();

        if self.pos >= self.source.len() {
            return Ok(self.make_token(Token::Eof, self.pos, self.pos));
        }

        let start = self.pos;
        let ch = self.source[self.pos];

        if let Some(sym) = Sym::from_byte(ch) {
            self.pos += 1;
            return Ok(self.make_token(Token::Sym(sym), start, self.pos));
        }

        if ch == b'"' {
            return self.scan_string();
        }

        if ch.is_ascii_digit() {
            return self.scan_integer();
        }

        if is_ident_start(ch) {
            return Ok(self.scan_ident_or_keyword());
        }

        Err(Diagnostic::error(
            format!("unexpected character '{}' (U+{:04X})", ch as char, ch),
            Span::new(self.file_id, start as u32, (start + 1) as u32),
        )
        .with_help("this character is not part of the Jack alphabet".to_string()))
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.pos < self.source.len() && self.source[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }

            // Line comment: skip to end of line.
            if self.at_str(b"//") {
                while self.pos < self.source.len() && self.source[self.pos] != b'\n' {
                    self.pos += 1;
                }
                continue;
            }

            // Block comment: not nestable; only the terminator is searched for.
            if self.at_str(b"/*") {
                self.pos += 2;
                while self.pos < self.source.len() && !self.at_str(b"*/") {
                    self.pos += 1;
                }
                if self.pos < self.source.len() {
                    self.pos += 2;
                }
                continue;
            }

            break;
        }
    }

    fn at_str(&self, pat: &[u8]) -> bool {
        self.source[self.pos..].starts_with(pat)
    }

    /// Consume through the closing quote. A string constant must end
    /// before the next newline.
    fn scan_string(&mut self) -> Result<Spanned<Token>, Diagnostic> {
        let start = self.pos;
        self.pos += 1; // opening quote
        let body_start = self.pos;
        while self.pos < self.source.len() {
            match self.source[self.pos] {
                b'"' => {
                    let text = std::str::from_utf8(&self.source[body_start..self.pos])
                        .unwrap_or_default()
                        .to_string();
                    self.pos += 1;
                    return Ok(self.make_token(Token::Str(text), start, self.pos));
                }
                b'\n' => break,
                _ => self.pos += 1,
            }
        }
        Err(Diagnostic::error(
            "string constant missing closing quote".to_string(),
            Span::new(self.file_id, start as u32, self.pos as u32),
        )
        .with_help("string constants must close on the same line".to_string()))
    }

    fn scan_integer(&mut self) -> Result<Spanned<Token>, Diagnostic> {
        let start = self.pos;
        while self.pos < self.source.len() && self.source[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap_or_default();
        match text.parse::<u32>() {
            Ok(n) if n <= MAX_INT => Ok(self.make_token(Token::Int(n as u16), start, self.pos)),
            _ => Err(Diagnostic::error(
                format!("integer constant '{}' is out of range", text),
                Span::new(self.file_id, start as u32, self.pos as u32),
            )
            .with_help(format!("the largest integer constant is {}", MAX_INT))),
        }
    }

    fn scan_ident_or_keyword(&mut self) -> Spanned<Token> {
        let start = self.pos;
        while self.pos < self.source.len() && is_ident_continue(self.source[self.pos]) {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap_or_default();
        let token = match Keyword::from_str(text) {
            Some(kw) => Token::Keyword(kw),
            None => Token::Ident(text.to_string()),
        };
        self.make_token(token, start, self.pos)
    }

    fn make_token(&self, token: Token, start: usize, end: usize) -> Spanned<Token> {
        Spanned::new(token, Span::new(self.file_id, start as u32, end as u32))
    }
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_ident_continue(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || ch == b'_'
}

/// Run the scanner on its own thread, producing tokens through a bounded
/// queue. End of input is the `Eof` token followed by channel close; a
/// lexical error is sent in-band and ends the stream.
pub fn stream(source: String, file_id: u16) -> mpsc::Receiver<TokenResult> {
    let (tx, rx) = mpsc::sync_channel(TOKEN_QUEUE_CAPACITY);
    thread::spawn(move || {
        let mut lexer = Lexer::new(&source, file_id);
        loop {
            match lexer.next_token() {
                Ok(tok) => {
                    let is_eof = tok.node == Token::Eof;
                    // A send error means the consumer hung up; just stop.
                    if tx.send(Ok(tok)).is_err() || is_eof {
                        return;
                    }
                }
                Err(diag) => {
                    let _ = tx.send(Err(diag));
                    return;
                }
            }
        }
    });
    rx
}

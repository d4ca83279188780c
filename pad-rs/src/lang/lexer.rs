//! Template lexer.
//!
//! The source starts in text mode.  Everything up to the next `{@` or `{:`
//! becomes a [`TokenKind::Text`] token; the delimiter switches into code or
//! reference mode, where the usual identifier/number/operator scanning
//! applies until `@}` or `:}` switches back.
//!
//! Inside blocks, `//` and `/* */` comments are replaced by a single
//! newline token so statement boundaries survive.  A newline directly after
//! `@}` is dropped so that code-only lines do not leave blank lines in the
//! output.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use tracing::trace;

use super::error::{Error, Result};
use super::token::{Pos, Token, TokenKind};

// ── LexerOptions ──────────────────────────────────────────────────────────────

/// Lexer configuration.  The reference-block delimiters are configurable;
/// code blocks always use `{@` / `@}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexerOptions {
    pub ref_open: String,
    pub ref_close: String,
}

impl Default for LexerOptions {
    fn default() -> Self {
        LexerOptions { ref_open: "{:".into(), ref_close: ":}".into() }
    }
}

impl LexerOptions {
    fn validate(&self) -> bool {
        self.ref_open.len() == 2
            && self.ref_close.len() == 2
            && self.ref_open.is_ascii()
            && self.ref_close.is_ascii()
            && self.ref_open != "{@"
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Tokenize `src` with the default delimiters.
pub fn tokenize(src: &str) -> Result<Vec<Token>> {
    tokenize_with(src, &LexerOptions::default())
}

/// Tokenize `src` with explicit [`LexerOptions`].
pub fn tokenize_with(src: &str, opts: &LexerOptions) -> Result<Vec<Token>> {
    if !opts.validate() {
        return Err(Error::lex("validate error of tokenizer", Pos::new(0, 1)));
    }
    Lexer::new(src, opts).run()
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Text,
    Code,
    Ref,
}

struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: usize,
    mode: Mode,
    ref_close: [u8; 2],
    openers: AhoCorasick,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str, opts: &LexerOptions) -> Self {
        let close = opts.ref_close.as_bytes();
        let openers = AhoCorasickBuilder::new()
            .match_kind(MatchKind::LeftmostFirst)
            .build(["{@", opts.ref_open.as_str()]);
        Lexer {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            line: 1,
            mode: Mode::Text,
            ref_close: [close[0], close[1]],
            openers,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<u8> {
        self.bytes.get(self.pos + 1).copied()
    }

    fn here(&self) -> Pos {
        Pos::new(self.pos, self.line)
    }

    fn push(&mut self, kind: TokenKind, pos: Pos) {
        self.tokens.push(Token::new(kind, pos));
    }

    fn run(mut self) -> Result<Vec<Token>> {
        while self.pos < self.bytes.len() {
            match self.mode {
                Mode::Text => self.lex_text(),
                Mode::Code | Mode::Ref => self.lex_code()?,
            }
        }
        if self.mode != Mode::Text {
            return Err(Error::lex("not closed by block", self.here()));
        }
        Ok(self.tokens)
    }

    // ── Text mode ─────────────────────────────────────────────────────────────

    fn lex_text(&mut self) {
        let start = self.here();
        let rest = &self.src[self.pos..];
        let (text_end, opener) = match self.openers.find(rest) {
            Some(m) => (self.pos + m.start(), Some(m.pattern())),
            None => (self.bytes.len(), None),
        };
        if text_end > self.pos {
            let text = &self.src[self.pos..text_end];
            self.line += text.matches('\n').count() + bare_cr_count(text);
            self.push(TokenKind::Text(text.to_owned()), start);
        }
        self.pos = text_end;
        if let Some(which) = opener {
            let pos = self.here();
            self.pos += 2;
            if which == 0 {
                self.push(TokenKind::CodeOpen, pos);
                self.mode = Mode::Code;
            } else {
                self.push(TokenKind::RefOpen, pos);
                self.mode = Mode::Ref;
            }
            trace!(line = pos.line, mode = ?self.mode, "enter block");
        }
    }

    // ── Code / reference mode ─────────────────────────────────────────────────

    fn lex_code(&mut self) -> Result<()> {
        let Some(c) = self.peek() else { return Ok(()) };
        let pos = self.here();

        // closing delimiters
        if c == b'@' {
            if self.peek2() == Some(b'}') {
                self.pos += 2;
                self.push(TokenKind::CodeClose, pos);
                self.mode = Mode::Text;
                self.skip_one_newline();
                return Ok(());
            }
            return Err(Error::lex("invalid syntax. single '@' is not supported", pos));
        }
        if self.mode == Mode::Ref && c == self.ref_close[0] && self.peek2() == Some(self.ref_close[1]) {
            self.pos += 2;
            self.push(TokenKind::RefClose, pos);
            self.mode = Mode::Text;
            return Ok(());
        }

        match c {
            b'\r' => {
                self.pos += 1;
                if self.peek() == Some(b'\n') {
                    self.pos += 1;
                }
                self.push(TokenKind::Newline, pos);
                self.line += 1;
            }
            b'\n' => {
                self.pos += 1;
                self.push(TokenKind::Newline, pos);
                self.line += 1;
            }
            b' ' | b'\t' | 0x0b | 0x0c => self.pos += 1,
            b'/' if self.peek2() == Some(b'/') => self.line_comment(pos),
            b'/' if self.peek2() == Some(b'*') => self.block_comment(pos),
            b'"' => self.string(pos)?,
            b'0'..=b'9' => self.number(pos)?,
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.identifier(pos),
            _ => self.operator(c, pos)?,
        }
        Ok(())
    }

    /// `//` up to and including the line break becomes one newline token.
    fn line_comment(&mut self, pos: Pos) {
        self.pos += 2;
        while let Some(c) = self.peek() {
            if c == b'\n' || c == b'\r' {
                self.pos += 1;
                if c == b'\r' && self.peek() == Some(b'\n') {
                    self.pos += 1;
                }
                self.line += 1;
                break;
            }
            self.pos += 1;
        }
        self.push(TokenKind::Newline, pos);
    }

    fn block_comment(&mut self, pos: Pos) {
        self.pos += 2;
        while let Some(c) = self.peek() {
            if c == b'*' && self.peek2() == Some(b'/') {
                self.pos += 2;
                break;
            }
            if c == b'\n' {
                self.line += 1;
            }
            self.pos += 1;
        }
        self.push(TokenKind::Newline, pos);
    }

    fn skip_one_newline(&mut self) {
        match self.peek() {
            Some(b'\n') => {
                self.pos += 1;
                self.line += 1;
            }
            Some(b'\r') => {
                self.pos += 1;
                if self.peek() == Some(b'\n') {
                    self.pos += 1;
                }
                self.line += 1;
            }
            _ => {}
        }
    }

    fn string(&mut self, pos: Pos) -> Result<()> {
        self.pos += 1; // opening quote
        let mut buf: Vec<u8> = Vec::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(Error::lex("not closed by double quote", pos));
            };
            self.pos += 1;
            match c {
                b'"' => break,
                b'\\' => {
                    let Some(e) = self.peek() else {
                        return Err(Error::lex("not closed by double quote", pos));
                    };
                    self.pos += 1;
                    match e {
                        b'0' => buf.push(0),
                        b'a' => buf.push(0x07),
                        b'b' => buf.push(0x08),
                        b'f' => buf.push(0x0c),
                        b'n' => buf.push(b'\n'),
                        b'r' => buf.push(b'\r'),
                        b't' => buf.push(b'\t'),
                        b'\\' => buf.push(b'\\'),
                        b'\'' => buf.push(b'\''),
                        b'"' => buf.push(b'"'),
                        other => {
                            buf.push(b'\\');
                            buf.push(other);
                        }
                    }
                }
                b'\n' => {
                    self.line += 1;
                    buf.push(c);
                }
                _ => buf.push(c),
            }
        }
        let s = String::from_utf8_lossy(&buf).into_owned();
        self.push(TokenKind::Str(s), pos);
        Ok(())
    }

    fn number(&mut self, pos: Pos) -> Result<()> {
        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        if self.peek() == Some(b'.') {
            if !matches!(self.peek2(), Some(b'0'..=b'9')) {
                return Err(Error::lex("invalid float", self.here()));
            }
            self.pos += 1;
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.pos += 1;
            }
            let text = &self.src[start..self.pos];
            let x: f64 = text
                .parse()
                .map_err(|_| Error::lex(format!("invalid float \"{text}\""), pos))?;
            self.push(TokenKind::Float(x), pos);
            return Ok(());
        }
        let text = &self.src[start..self.pos];
        let n: i64 = text
            .parse()
            .map_err(|_| Error::lex(format!("integer \"{text}\" is out of range"), pos))?;
        self.push(TokenKind::Int(n), pos);
        Ok(())
    }

    fn identifier(&mut self, pos: Pos) {
        let start = self.pos;
        while matches!(self.peek(), Some(b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_')) {
            self.pos += 1;
        }
        let word = &self.src[start..self.pos];
        let kind = TokenKind::keyword(word).unwrap_or_else(|| TokenKind::Ident(word.to_owned()));
        self.push(kind, pos);
    }

    fn operator(&mut self, c: u8, pos: Pos) -> Result<()> {
        let next_eq = self.peek2() == Some(b'=');
        let (kind, width) = match c {
            b'+' if next_eq => (TokenKind::PlusAssign, 2),
            b'-' if next_eq => (TokenKind::MinusAssign, 2),
            b'*' if next_eq => (TokenKind::StarAssign, 2),
            b'/' if next_eq => (TokenKind::SlashAssign, 2),
            b'%' if next_eq => (TokenKind::PercentAssign, 2),
            b'=' if next_eq => (TokenKind::Eq, 2),
            b'!' if next_eq => (TokenKind::Ne, 2),
            b'<' if next_eq => (TokenKind::Le, 2),
            b'>' if next_eq => (TokenKind::Ge, 2),
            b'+' => (TokenKind::Plus, 1),
            b'-' => (TokenKind::Minus, 1),
            b'*' => (TokenKind::Star, 1),
            b'/' => (TokenKind::Slash, 1),
            b'%' => (TokenKind::Percent, 1),
            b'=' => (TokenKind::Assign, 1),
            b'<' => (TokenKind::Lt, 1),
            b'>' => (TokenKind::Gt, 1),
            b'(' => (TokenKind::LParen, 1),
            b')' => (TokenKind::RParen, 1),
            b'[' => (TokenKind::LBracket, 1),
            b']' => (TokenKind::RBracket, 1),
            b'{' => (TokenKind::LBrace, 1),
            b'}' => (TokenKind::RBrace, 1),
            b',' => (TokenKind::Comma, 1),
            b':' => (TokenKind::Colon, 1),
            b';' => (TokenKind::Semicolon, 1),
            b'.' => (TokenKind::Dot, 1),
            _ => {
                let ch = self.src[self.pos..].chars().next().unwrap_or('?');
                return Err(Error::lex(format!("syntax error. unsupported character \"{ch}\""), pos));
            }
        };
        self.pos += width;
        self.push(kind, pos);
        Ok(())
    }
}

/// Count `\r` line breaks that are not part of a `\r\n` pair.
fn bare_cr_count(text: &str) -> usize {
    let b = text.as_bytes();
    (0..b.len()).filter(|&i| b[i] == b'\r' && b.get(i + 1) != Some(&b'\n')).count()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

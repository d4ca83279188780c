//! Error record shared by the lexer, parser, importer and evaluator.
//!
//! Every tier reports the same shape: a message, an optional source
//! position, and a trace of the call boundaries the error crossed (most
//! recent first).  Callers print either the message alone (`Display`) or the
//! full trace via [`Error::render_trace`].

use std::fmt::Write as _;

use thiserror::Error;

use super::token::Pos;

// ── ErrorKind ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lex,
    Parse,
    Runtime,
    Import,
    /// `exit(code)` or `die(...)`; unwinds to the host carrying the status.
    Exit(i32),
}

// ── TraceFrame ────────────────────────────────────────────────────────────────

/// One entry of an error trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFrame {
    /// Program file name, or `None` for in-memory sources.
    pub file: Option<String>,
    pub line: usize,
    /// Name of the function executing at this boundary (`<main>` at top level).
    pub func: String,
    pub message: String,
}

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
    pub pos: Option<Pos>,
    pub trace: Vec<TraceFrame>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    fn new(kind: ErrorKind, message: impl Into<String>, pos: Option<Pos>) -> Self {
        Error { kind, message: message.into(), pos, trace: Vec::new() }
    }

    pub fn lex(message: impl Into<String>, pos: Pos) -> Self {
        Self::new(ErrorKind::Lex, message, Some(pos))
    }

    pub fn parse(message: impl Into<String>, pos: Pos) -> Self {
        Self::new(ErrorKind::Parse, message, Some(pos))
    }

    pub fn runtime(message: impl Into<String>, pos: Option<Pos>) -> Self {
        Self::new(ErrorKind::Runtime, message, pos)
    }

    pub fn import(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Import, message, None)
    }

    pub fn exit(code: i32) -> Self {
        Self::new(ErrorKind::Exit(code), format!("exit with status {code}"), None)
    }

    /// The requested process status if this is an exit request.
    pub fn exit_code(&self) -> Option<i32> {
        match self.kind {
            ErrorKind::Exit(code) => Some(code),
            _ => None,
        }
    }

    /// Append a trace frame for a call boundary the error is unwinding past.
    pub fn push_frame(&mut self, file: Option<&str>, line: usize, func: &str) {
        self.trace.push(TraceFrame {
            file: file.map(str::to_owned),
            line,
            func: func.to_owned(),
            message: self.message.clone(),
        });
    }

    pub fn with_frame(mut self, file: Option<&str>, line: usize, func: &str) -> Self {
        self.push_frame(file, line, func);
        self
    }

    /// Render the full trace.
    ///
    /// ```text
    /// Stack trace:
    ///     main.pad: 3: "x" is not defined in ref block
    ///
    ///     {: x :}
    ///        ^
    /// ```
    ///
    /// With `debug`, each frame also names the function it was raised in.
    /// The source excerpt is included when `source` is given and the error
    /// carries a position.
    pub fn render_trace(&self, source: Option<&str>, debug: bool) -> String {
        let mut out = String::from("Stack trace:\n");
        if self.trace.is_empty() {
            let line = self.pos.map(|p| p.line).unwrap_or(0);
            let _ = writeln!(out, "    (unknown module): {line}: {}", self.message);
        }
        for frame in &self.trace {
            let file = frame.file.as_deref().unwrap_or("(unknown module)");
            if debug {
                let _ = writeln!(out, "    {file}: {}: {}: {}", frame.line, frame.func, frame.message);
            } else {
                let _ = writeln!(out, "    {file}: {}: {}", frame.line, frame.message);
            }
        }
        if let (Some(src), Some(pos)) = (source, self.pos) {
            if let Some(snippet) = pointer_snippet(src, pos.offset) {
                out.push('\n');
                out.push_str(&snippet);
            }
        }
        out
    }
}

/// The source line containing `offset` followed by a `^` under the column.
fn pointer_snippet(src: &str, offset: usize) -> Option<String> {
    if offset > src.len() || !src.is_char_boundary(offset) {
        return None;
    }
    let start = src[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let end = src[offset..].find('\n').map(|i| offset + i).unwrap_or(src.len());
    let line = src[start..end].trim_end_matches('\r');
    let col = src[start..offset].chars().count();
    Some(format!("    {line}\n    {}^\n", " ".repeat(col)))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_message_only() {
        let e = Error::runtime("zero division error", None).with_frame(Some("a.pad"), 2, "f");
        assert_eq!(e.to_string(), "zero division error");
    }

    #[test]
    fn trace_lists_frames_in_order() {
        let e = Error::runtime("boom", None)
            .with_frame(Some("a.pad"), 2, "f")
            .with_frame(Some("a.pad"), 7, "<main>");
        let out = e.render_trace(None, false);
        assert_eq!(out, "Stack trace:\n    a.pad: 2: boom\n    a.pad: 7: boom\n");
    }

    #[test]
    fn debug_trace_names_function() {
        let e = Error::runtime("boom", None).with_frame(None, 1, "f");
        assert!(e.render_trace(None, true).contains("(unknown module): 1: f: boom"));
    }

    #[test]
    fn exit_carries_status() {
        assert_eq!(Error::exit(3).exit_code(), Some(3));
        assert_eq!(Error::runtime("boom", None).exit_code(), None);
    }

    #[test]
    fn snippet_points_at_column() {
        let src = "abc\n{@ @ @}\n";
        let e = Error::lex("invalid syntax. single '@' is not supported", Pos::new(7, 2));
        let out = e.render_trace(Some(src), false);
        assert!(out.ends_with("    {@ @ @}\n       ^\n"), "{out}");
    }
}

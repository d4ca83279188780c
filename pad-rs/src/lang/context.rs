//! Execution context: global scope, output buffers, alias table, program
//! options and the import cache.
//!
//! A context outlives a single run.  Running another program against the
//! same context keeps its variables and buffered output until the caller
//! resets it with [`Context::clear`] or [`Context::clear_buffers`].

use std::collections::{BTreeMap, HashMap};
use std::io::{self, Write};
use std::path::PathBuf;
use std::str::FromStr;

use tracing::warn;

use super::opts::Opts;
use super::value::{new_scope, Scope, Value};

// ── LineEncoding ──────────────────────────────────────────────────────────────

/// Newline sequence written by `puts` and `eputs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEncoding {
    #[default]
    Lf,
    CrLf,
    Cr,
}

impl LineEncoding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEncoding::Lf => "\n",
            LineEncoding::CrLf => "\r\n",
            LineEncoding::Cr => "\r",
        }
    }
}

impl FromStr for LineEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lf" => Ok(LineEncoding::Lf),
            "crlf" => Ok(LineEncoding::CrLf),
            "cr" => Ok(LineEncoding::Cr),
            other => Err(format!("invalid line encoding \"{other}\"")),
        }
    }
}

// ── Alias ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub value: String,
    pub desc: Option<String>,
}

// ── Context ───────────────────────────────────────────────────────────────────

pub struct Context {
    globals: Scope,
    stdout_buf: String,
    stderr_buf: String,
    /// When false, output goes straight to the process streams.
    use_buf: bool,
    line_encoding: LineEncoding,
    aliases: BTreeMap<String, Alias>,
    opts: Opts,
    /// Evaluated modules keyed by resolved path.
    pub(crate) imports: HashMap<PathBuf, Value>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Context {
            globals: new_scope(),
            stdout_buf: String::new(),
            stderr_buf: String::new(),
            use_buf: true,
            line_encoding: LineEncoding::default(),
            aliases: BTreeMap::new(),
            opts: Opts::default(),
            imports: HashMap::new(),
        }
    }

    /// Context that streams output to stdout/stderr instead of buffering.
    pub fn unbuffered() -> Self {
        Context { use_buf: false, ..Self::new() }
    }

    pub fn globals(&self) -> &Scope {
        &self.globals
    }

    pub fn get_var(&self, name: &str) -> Option<Value> {
        self.globals.borrow().get(name).cloned()
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: Value) {
        self.globals.borrow_mut().insert(name, value);
    }

    // ── Output ────────────────────────────────────────────────────────────────

    /// Append to the stdout buffer, or write through to the process stdout
    /// when unbuffered.  A failed write is logged and returned.
    pub fn write_stdout(&mut self, s: &str) -> io::Result<()> {
        if self.use_buf {
            self.stdout_buf.push_str(s);
            return Ok(());
        }
        let mut out = io::stdout().lock();
        out.write_all(s.as_bytes()).and_then(|()| out.flush()).map_err(|e| {
            warn!(error = %e, "failed to write stdout");
            e
        })
    }

    pub fn write_stderr(&mut self, s: &str) -> io::Result<()> {
        if self.use_buf {
            self.stderr_buf.push_str(s);
            return Ok(());
        }
        io::stderr().lock().write_all(s.as_bytes()).map_err(|e| {
            warn!(error = %e, "failed to write stderr");
            e
        })
    }

    pub fn stdout_buf(&self) -> &str {
        &self.stdout_buf
    }

    pub fn stderr_buf(&self) -> &str {
        &self.stderr_buf
    }

    pub fn newline(&self) -> &'static str {
        self.line_encoding.as_str()
    }

    pub fn line_encoding(&self) -> LineEncoding {
        self.line_encoding
    }

    pub fn set_line_encoding(&mut self, enc: LineEncoding) {
        self.line_encoding = enc;
    }

    // ── Aliases and options ───────────────────────────────────────────────────

    pub fn set_alias(&mut self, key: impl Into<String>, value: impl Into<String>, desc: Option<String>) {
        self.aliases.insert(key.into(), Alias { value: value.into(), desc });
    }

    pub fn alias(&self, key: &str) -> Option<&Alias> {
        self.aliases.get(key)
    }

    pub fn aliases(&self) -> impl Iterator<Item = (&String, &Alias)> {
        self.aliases.iter()
    }

    /// Parse `argv` (program name first) into the options seen by `opts`.
    pub fn set_args<S: AsRef<str>>(&mut self, argv: &[S]) {
        self.opts = Opts::parse(argv);
    }

    pub fn opts(&self) -> &Opts {
        &self.opts
    }

    // ── Reset ─────────────────────────────────────────────────────────────────

    pub fn clear_buffers(&mut self) {
        self.stdout_buf.clear();
        self.stderr_buf.clear();
    }

    /// Drop all variables, aliases, cached modules and buffered output.
    pub fn clear(&mut self) {
        self.globals = new_scope();
        self.aliases.clear();
        self.imports.clear();
        self.clear_buffers();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

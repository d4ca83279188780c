//! One-call facade: compile and run a program against a persistent context.
//!
//! ```no_run
//! use pad::config::Config;
//! use pad::kit::Kit;
//!
//! let mut kit = Kit::new(Config::default());
//! kit.compile_from_str("{@ name = \"pad\" @}hello {: name :}").unwrap();
//! assert_eq!(kit.stdout_buf(), "hello pad");
//! ```

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tracing::debug;

use crate::config::Config;
use crate::lang::{parser, Context, Error, Importer, Interpreter, Result};

pub struct Kit {
    config: Config,
    ctx: Context,
    importer: Importer,
    /// Error of the most recent compile, if it failed.
    error: Option<Error>,
    /// Source and file name of the most recent compile, for traces.
    last: Option<(String, Option<String>)>,
}

impl Kit {
    /// Buffered output; read it back with [`Kit::stdout_buf`].
    pub fn new(config: Config) -> Self {
        Self::with_context(config, Context::new())
    }

    /// Output goes straight to the process streams.
    pub fn unbuffered(config: Config) -> Self {
        Self::with_context(config, Context::unbuffered())
    }

    fn with_context(config: Config, mut ctx: Context) -> Self {
        ctx.set_line_encoding(config.line_encoding);
        let importer = Importer::new(config.std_lib_dir.clone());
        Kit { config, ctx, importer, error: None, last: None }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.ctx
    }

    // ── Compile ───────────────────────────────────────────────────────────────

    pub fn compile_from_str(&mut self, src: &str) -> Result<()> {
        self.compile(src, None, &[] as &[&str])
    }

    /// `args` is the program's argument vector, program name first.
    pub fn compile_from_str_args<S: AsRef<str>>(&mut self, src: &str, args: &[S]) -> Result<()> {
        self.compile(src, None, args)
    }

    pub fn compile_from_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.compile_from_path_args(path, &[] as &[&str])
    }

    pub fn compile_from_path_args<S: AsRef<str>>(&mut self, path: impl AsRef<Path>, args: &[S]) -> Result<()> {
        let path = path.as_ref();
        let src = match fs::read_to_string(path) {
            Ok(src) => src,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "failed to read program");
                let err = Error::import(format!("not found \"{}\"", path.display()));
                self.error = Some(err.clone());
                self.last = None;
                return Err(err);
            }
        };
        let file = path.to_string_lossy().into_owned();
        self.compile(&src, Some(&file), args)
    }

    fn compile<S: AsRef<str>>(&mut self, src: &str, file: Option<&str>, args: &[S]) -> Result<()> {
        if !args.is_empty() {
            self.ctx.set_args(args);
        }
        self.last = Some((src.to_owned(), file.map(str::to_owned)));
        let result = parser::parse(src)
            .map_err(|e| {
                let line = e.pos.map_or(0, |p| p.line);
                e.with_frame(file, line, "<main>")
            })
            .and_then(|program| Interpreter::new(&mut self.ctx, &self.importer).with_file(file).run(&program));
        self.error = result.as_ref().err().cloned();
        result
    }

    // ── Context ───────────────────────────────────────────────────────────────

    /// Drop variables, aliases, cached modules and buffered output.
    pub fn clear_context(&mut self) {
        self.ctx.clear();
        self.error = None;
    }

    pub fn clear_context_buffer(&mut self) {
        self.ctx.clear_buffers();
    }

    pub fn stdout_buf(&self) -> &str {
        self.ctx.stdout_buf()
    }

    pub fn stderr_buf(&self) -> &str {
        self.ctx.stderr_buf()
    }

    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Status requested by `exit`/`die` in the last program, if it stopped
    /// that way.  Its output up to that point is left in the buffers.
    pub fn exit_code(&self) -> Option<i32> {
        self.error.as_ref().and_then(Error::exit_code)
    }

    /// Write the trace of the last error, if any.  The source excerpt is
    /// shown only when the error was raised in the compiled program itself.
    /// An exit request has no trace.
    pub fn trace_error(&self, w: &mut impl Write, debug: bool) -> io::Result<()> {
        let Some(err) = self.error.as_ref().filter(|e| e.exit_code().is_none()) else { return Ok(()) };
        let source = self
            .last
            .as_ref()
            .filter(|(_, file)| err.trace.first().map_or(true, |frame| frame.file == *file))
            .map(|(src, _)| src.as_str());
        w.write_all(err.render_trace(source, debug).as_bytes())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn kit() -> Kit {
        Kit::new(Config::with_app_dir("/nonexistent/.pad"))
    }

    #[test]
    fn context_persists_between_compiles() {
        let mut k = kit();
        k.compile_from_str("{@ x = 41 @}").unwrap();
        k.compile_from_str("{: x + 1 :}").unwrap();
        assert_eq!(k.stdout_buf(), "42");
        k.clear_context_buffer();
        assert_eq!(k.stdout_buf(), "");
        k.clear_context();
        assert!(k.compile_from_str("{: x :}").is_err());
    }

    #[test]
    fn args_reach_opts() {
        let mut k = kit();
        k.compile_from_str_args("{: opts.get(\"mode\") :}", &["prog", "--mode", "fast"]).unwrap();
        assert_eq!(k.stdout_buf(), "fast");
    }

    #[test]
    fn trace_points_at_source() {
        let mut k = kit();
        assert!(k.compile_from_str("ok\n{: missing :}").is_err());
        let mut out = Vec::new();
        k.trace_error(&mut out, false).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Stack trace:\n"));
        assert!(text.contains("2: \"missing\" is not defined in ref block"));
        assert!(text.contains("{: missing :}\n"));
        assert!(text.contains("^"));
    }

    #[test]
    fn parse_errors_carry_a_frame() {
        let mut k = kit();
        let err = k.compile_from_str("{@ def f( @}").unwrap_err();
        assert_eq!(err.trace.len(), 1);
        assert_eq!(err.trace[0].func, "<main>");
    }

    #[test]
    fn missing_program_file() {
        let mut k = kit();
        let err = k.compile_from_path("/definitely/not/here.pad").unwrap_err();
        assert_eq!(err.message, "not found \"/definitely/not/here.pad\"");
        assert!(k.error().is_some());
    }

    #[test]
    fn program_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.pad");
        fs::write(&path, "{@ puts(\"hi\") @}").unwrap();
        let mut k = kit();
        k.compile_from_path(&path).unwrap();
        assert_eq!(k.stdout_buf(), "hi\n");
        assert!(k.error().is_none());
    }

    #[test]
    fn exit_keeps_output_and_status() {
        let mut k = kit();
        assert!(k.compile_from_str("a{@ puts(\"b\") exit(3) @}c").is_err());
        assert_eq!(k.stdout_buf(), "ab\n");
        assert_eq!(k.exit_code(), Some(3));
        let mut out = Vec::new();
        k.trace_error(&mut out, false).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn die_writes_stderr_and_exits_with_one() {
        let mut k = kit();
        assert!(k.compile_from_str("{@ def f(): die(\"bad\", 2) end f() @}").is_err());
        assert_eq!(k.stderr_buf(), "bad 2\n");
        assert_eq!(k.exit_code(), Some(1));
        k.compile_from_str("{: 1 :}").unwrap();
        assert_eq!(k.exit_code(), None);
    }

    #[test]
    fn line_encoding_from_config() {
        let mut config = Config::with_app_dir("/nonexistent/.pad");
        config.line_encoding = crate::lang::LineEncoding::CrLf;
        let mut k = Kit::new(config);
        k.compile_from_str("{@ puts(1) @}").unwrap();
        assert_eq!(k.stdout_buf(), "1\r\n");
    }
}

//! Run programs through the `pad` binary and check what reaches the process
//! streams and the exit status.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Spawn the binary with an isolated home directory, feeding `stdin`.
fn run_pad(home: &Path, args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_pad"))
        .args(args)
        .env("HOME", home)
        .env_remove("PAD_STDLIB")
        .env_remove("PAD_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn pad binary");
    child
        .stdin
        .as_mut()
        .expect("stdin not open")
        .write_all(stdin.as_bytes())
        .expect("write to stdin");
    child.wait_with_output().expect("wait failed")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

// ── Cases ─────────────────────────────────────────────────────────────────────

#[test]
fn program_from_stdin() {
    let home = tempfile::tempdir().unwrap();
    let out = run_pad(home.path(), &[], "{@ for i = 0; i < 3; i += 1: @}{: i :},{@ end @}\n");
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    // the newline right after the final `@}` is swallowed
    assert_eq!(stdout(&out), "0,1,2,");
}

#[test]
fn program_from_file_with_args() {
    let home = tempfile::tempdir().unwrap();
    let file = home.path().join("greet.pad");
    std::fs::write(&file, "hello {: opts.args(1) :}{@ eputs(\"done\") @}").unwrap();
    let out = run_pad(home.path(), &[file.to_str().unwrap(), "world"], "");
    assert!(out.status.success());
    assert_eq!(stdout(&out), "hello world");
    assert_eq!(stderr(&out), "done\n");
}

#[test]
fn imports_from_stdlib_dir() {
    let home = tempfile::tempdir().unwrap();
    let lib = home.path().join("lib");
    std::fs::create_dir(&lib).unwrap();
    std::fs::write(lib.join("fmt.pad"), "{@ def bold(s): return \"*\" + s + \"*\" end @}").unwrap();
    let out = run_pad(
        home.path(),
        &["--stdlib", lib.to_str().unwrap()],
        "{@ from \"fmt.pad\" import bold\n@}{: bold(\"x\") :}",
    );
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "*x*");
}

#[test]
fn runtime_error_prints_trace_and_fails() {
    let home = tempfile::tempdir().unwrap();
    let out = run_pad(home.path(), &[], "partial\n{: nope :}");
    assert_eq!(out.status.code(), Some(1));
    assert_eq!(stdout(&out), "partial\n");
    let err = stderr(&out);
    assert!(err.starts_with("Stack trace:\n"), "stderr: {err}");
    assert!(err.contains("\"nope\" is not defined in ref block"));
}

#[test]
fn exit_sets_process_status() {
    let home = tempfile::tempdir().unwrap();
    let out = run_pad(home.path(), &[], "before{@ exit(3) @}after");
    assert_eq!(out.status.code(), Some(3));
    assert_eq!(stdout(&out), "before");
    assert_eq!(stderr(&out), "");
}

#[test]
fn die_reports_and_fails() {
    let home = tempfile::tempdir().unwrap();
    let out = run_pad(home.path(), &[], "{@ die(\"cannot continue\") @}never");
    assert_eq!(out.status.code(), Some(1));
    assert_eq!(stdout(&out), "");
    assert_eq!(stderr(&out), "cannot continue\n");
}

#[test]
fn deep_recursion_runs_on_the_main_thread() {
    let home = tempfile::tempdir().unwrap();
    let src = "{@ def f(n): if n == 0: return 0 end return f(n - 1) end @}{: f(1000) :}";
    let out = run_pad(home.path(), &[], src);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "0");
}

#[test]
fn missing_file() {
    let home = tempfile::tempdir().unwrap();
    let out = run_pad(home.path(), &["no-such-file.pad"], "");
    assert_eq!(out.status.code(), Some(1));
    assert_eq!(stderr(&out), "not found \"no-such-file.pad\"\n");
}

#[test]
fn debug_trace_names_functions() {
    let home = tempfile::tempdir().unwrap();
    let src = "{@\ndef boom():\n    return [][0]\nend\nboom()\n@}";
    let out = run_pad(home.path(), &["-d"], src);
    assert_eq!(out.status.code(), Some(1));
    let err = stderr(&out);
    assert!(err.contains(": 3: boom: index out of range"), "stderr: {err}");
    assert!(err.contains(": 5: <main>: index out of range"), "stderr: {err}");
}

#[test]
fn creates_application_directory() {
    let home = tempfile::tempdir().unwrap();
    let out = run_pad(home.path(), &[], "x");
    assert!(out.status.success());
    assert!(home.path().join(".pad").is_dir());
}

//! Program argument parsing for the `opts` module.
//!
//! `argv[0]` is kept as positional argument 0.  After that, `--key value`
//! and `-k value` pairs become options, a flag followed directly by another
//! flag (or by nothing) gets an empty value, and everything else is a
//! positional argument.

use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Opts {
    opts: HashMap<String, String>,
    args: Vec<String>,
}

impl Opts {
    pub fn parse<S: AsRef<str>>(argv: &[S]) -> Self {
        let mut out = Opts::default();
        let Some((first, rest)) = argv.split_first() else {
            return out;
        };
        out.args.push(first.as_ref().to_owned());

        let mut pending: Option<String> = None;
        for arg in rest.iter().map(AsRef::as_ref) {
            let flag = arg.strip_prefix("--").or_else(|| arg.strip_prefix('-'));
            match (flag, pending.take()) {
                (Some(key), prev) => {
                    if let Some(prev) = prev {
                        out.opts.insert(prev, String::new());
                    }
                    pending = Some(key.to_owned());
                }
                (None, Some(key)) => {
                    out.opts.insert(key, arg.to_owned());
                }
                (None, None) => out.args.push(arg.to_owned()),
            }
        }
        if let Some(key) = pending {
            out.opts.insert(key, String::new());
        }
        out
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.opts.get(name).map(String::as_str)
    }

    pub fn has(&self, name: &str) -> bool {
        self.opts.contains_key(name)
    }

    /// Positional argument `idx`; index 0 is the program name.
    pub fn arg(&self, idx: i64) -> Option<&str> {
        usize::try_from(idx).ok().and_then(|i| self.args.get(i)).map(String::as_str)
    }

    pub fn args_len(&self) -> usize {
        self.args.len()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Opts {
        Opts::parse(argv)
    }

    #[test]
    fn long_and_short_options_take_values() {
        let o = parse(&["prog", "--name", "alice", "-n", "3"]);
        assert_eq!(o.get("name"), Some("alice"));
        assert_eq!(o.get("n"), Some("3"));
        assert_eq!(o.args_len(), 1);
    }

    #[test]
    fn flag_followed_by_flag_is_empty() {
        let o = parse(&["prog", "--verbose", "-x", "--last"]);
        assert_eq!(o.get("verbose"), Some(""));
        assert_eq!(o.get("x"), Some(""));
        assert!(o.has("last"));
    }

    #[test]
    fn positionals_keep_program_name_first() {
        let o = parse(&["prog", "a", "--k", "v", "b"]);
        assert_eq!(o.arg(0), Some("prog"));
        assert_eq!(o.arg(1), Some("a"));
        assert_eq!(o.arg(2), Some("b"));
        assert_eq!(o.arg(3), None);
        assert_eq!(o.arg(-1), None);
    }

    #[test]
    fn empty_argv() {
        let o = parse(&[]);
        assert_eq!(o.args_len(), 0);
        assert!(!o.has("x"));
    }
}

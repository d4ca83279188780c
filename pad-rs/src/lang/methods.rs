//! Built-in methods of strings, arrays, dicts and files.
//!
//! Attribute access on one of these kinds yields a bound
//! [`Method`](super::value::Method) naming one of the entries below; calling
//! it dispatches through [`call_method`] with the already-evaluated
//! arguments.

use std::io::{Read, Write};
use std::sync::OnceLock;

use regex::{Captures, Regex};

use super::value::{FileHandle, Object, TypeKind, Value};

const STRING_METHODS: &[&str] = &[
    "upper", "lower", "capitalize", "snake", "camel", "hacker", "split", "strip", "lstrip", "rstrip",
    "isdigit", "isalpha", "isspace",
];
const ARRAY_METHODS: &[&str] = &["push", "pop"];
const DICT_METHODS: &[&str] = &["get", "pop"];
const FILE_METHODS: &[&str] = &["read", "write", "close"];

const DEFAULT_STRIP: &str = " \r\n\t";

/// The static name of method `name` on values of `kind`, if there is one.
pub fn lookup(kind: TypeKind, name: &str) -> Option<&'static str> {
    let table = match kind {
        TypeKind::String => STRING_METHODS,
        TypeKind::Array => ARRAY_METHODS,
        TypeKind::Dict => DICT_METHODS,
        TypeKind::File => FILE_METHODS,
        _ => return None,
    };
    table.iter().find(|m| **m == name).copied()
}

pub fn call_method(name: &str, receiver: &Value, args: Vec<Value>) -> Result<Value, String> {
    match &**receiver {
        Object::Str(s) => string_method(name, s, args),
        Object::Array(_) => array_method(name, receiver, args),
        Object::Dict(_) => dict_method(name, receiver, args),
        Object::File(f) => file_method(name, f, args),
        _ => Err(format!("can't call {name} method")),
    }
}

// ── String ────────────────────────────────────────────────────────────────────

fn string_method(name: &str, s: &str, args: Vec<Value>) -> Result<Value, String> {
    let no_args = |args: &[Value]| {
        if args.is_empty() {
            Ok(())
        } else {
            Err(format!("can't invoke {name}. too many arguments"))
        }
    };
    Ok(match name {
        "upper" => {
            no_args(&args)?;
            Value::from(s.to_uppercase())
        }
        "lower" => {
            no_args(&args)?;
            Value::from(s.to_lowercase())
        }
        "capitalize" => {
            no_args(&args)?;
            Value::from(capitalize(s))
        }
        "snake" => {
            no_args(&args)?;
            Value::from(snake(s))
        }
        "camel" => {
            no_args(&args)?;
            Value::from(camel(s))
        }
        "hacker" => {
            no_args(&args)?;
            Value::from(hacker(s))
        }
        "split" => {
            let sep = match args.first().and_then(Value::as_str) {
                Some(sep) if !sep.is_empty() => sep,
                Some(_) => return Err("empty separator".into()),
                None => return Err("invalid argument".into()),
            };
            Value::from(s.split(sep).filter(|p| !p.is_empty()).map(Value::from).collect::<Vec<_>>())
        }
        "strip" | "lstrip" | "rstrip" => {
            let chars = match args.first() {
                None => DEFAULT_STRIP,
                Some(v) => v.as_str().ok_or("invalid argument")?,
            };
            let pat = |c: char| chars.contains(c);
            let out = match name {
                "strip" => s.trim_matches(pat),
                "lstrip" => s.trim_start_matches(pat),
                _ => s.trim_end_matches(pat),
            };
            Value::from(out)
        }
        "isdigit" => Value::from(s.chars().all(|c| c.is_ascii_digit())),
        "isalpha" => Value::from(s.chars().all(char::is_alphabetic)),
        "isspace" => Value::from(s.chars().all(char::is_whitespace)),
        _ => return Err(format!("\"{name}\" is not a method of string")),
    })
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn cached(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

/// Leading separators dropped and the first character lowercased; both
/// case conversions start from here.
fn head_lowered(s: &str) -> (String, &str) {
    let s = s.trim_start_matches(['-', '_']);
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => (c.to_lowercase().collect(), chars.as_str()),
        None => (String::new(), ""),
    }
}

/// `HelloWorld`, `hello-world` → `hello_world`.
pub fn snake(s: &str) -> String {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    let (mut out, rest) = head_lowered(s);
    match cached(&RE, r"[-_]+(.)?|(\p{Lu})") {
        Some(re) => out.push_str(&re.replace_all(rest, |caps: &Captures| {
            let c = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
            format!("_{}", c.to_lowercase())
        })),
        None => out.push_str(rest),
    }
    out
}

/// `hello_world`, `hello-world` → `helloWorld`.
pub fn camel(s: &str) -> String {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    let (mut out, rest) = head_lowered(s);
    match cached(&RE, r"[-_]+(.)?") {
        Some(re) => out.push_str(&re.replace_all(rest, |caps: &Captures| {
            caps.get(1).map_or(String::new(), |m| m.as_str().to_uppercase())
        })),
        None => out.push_str(rest),
    }
    out
}

/// Separators removed and everything lowercased: `Hello_World` → `helloworld`.
pub fn hacker(s: &str) -> String {
    s.chars().filter(|c| !matches!(c, '-' | '_')).flat_map(char::to_lowercase).collect()
}

// ── Array ─────────────────────────────────────────────────────────────────────

fn array_method(name: &str, receiver: &Value, args: Vec<Value>) -> Result<Value, String> {
    let Object::Array(items) = &**receiver else {
        return Err(format!("can't call {name} method"));
    };
    match name {
        "push" => {
            let [arg] = <[Value; 1]>::try_from(args).map_err(|_| "can't invoke array.push. need one argument")?;
            items.borrow_mut().push(arg);
            Ok(receiver.clone())
        }
        "pop" => Ok(items.borrow_mut().pop().unwrap_or_default()),
        _ => Err(format!("\"{name}\" is not a method of array")),
    }
}

// ── Dict ──────────────────────────────────────────────────────────────────────

fn dict_method(name: &str, receiver: &Value, args: Vec<Value>) -> Result<Value, String> {
    let Object::Dict(dict) = &**receiver else {
        return Err(format!("can't call {name} method"));
    };
    if !(1..=2).contains(&args.len()) {
        return Err(format!("can't invoke dict.{name}(). need one or two argument"));
    }
    let key = args[0].as_str().ok_or("invalid key")?;
    let found = match name {
        "get" => dict.borrow().get(key).cloned(),
        "pop" => dict.borrow_mut().remove(key),
        _ => return Err(format!("\"{name}\" is not a method of dict")),
    };
    Ok(found.or_else(|| args.get(1).cloned()).unwrap_or_default())
}

// ── File ──────────────────────────────────────────────────────────────────────

fn file_method(name: &str, handle: &FileHandle, args: Vec<Value>) -> Result<Value, String> {
    if name == "close" {
        handle.file.borrow_mut().take();
        return Ok(Value::nil());
    }
    let mut slot = handle.file.borrow_mut();
    let file = slot.as_mut().ok_or_else(|| format!("can't {name} \"{}\". file is closed", handle.path))?;
    match name {
        "read" => {
            if !args.is_empty() {
                return Err("invalid arguments length".into());
            }
            let mut content = String::new();
            file.read_to_string(&mut content).map_err(|_| "failed to read content from file")?;
            Ok(Value::from(content))
        }
        "write" => {
            let [text] = <[Value; 1]>::try_from(args).map_err(|_| "invalid arguments length")?;
            let text = text.as_str().ok_or("invalid argument type")?;
            file.write_all(text.as_bytes()).map_err(|_| "failed to write text")?;
            Ok(Value::nil())
        }
        _ => Err(format!("\"{name}\" is not a method of file")),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

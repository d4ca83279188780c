//! Built-in free functions and type constructors.
//!
//! Each function receives a `Vec<Value>` of already-evaluated arguments and
//! returns `Result<Value, String>`; the interpreter attaches position and
//! trace to the message.  Functions that need interpreter state (`puts`,
//! `extract`, `dance`, `exit`, `die`, the `alias`/`opts` modules) live in
//! [`eval`](super::eval) instead.

use std::fs::OpenOptions;

use tracing::debug;

use super::value::{Dict, FileHandle, Object, TypeKind, Value};

/// Every built-in free function name, including the interpreter-aware ones.
pub const FUNCTIONS: &[&str] = &[
    "puts", "eputs", "len", "type", "copy", "deepcopy", "id", "assert", "extract", "setattr", "getattr",
    "dance", "ord", "chr", "cast", "die", "exit", "open",
];

/// Functions of the built-in `alias` and `opts` modules.
pub const MODULE_FUNCTIONS: &[&str] = &["alias.set", "opts.get", "opts.has", "opts.args"];

/// The static name of built-in function `name`.
pub fn lookup(name: &str) -> Option<&'static str> {
    FUNCTIONS.iter().find(|f| **f == name).copied()
}

pub fn is_module(name: &str) -> bool {
    matches!(name, "alias" | "opts")
}

/// `(func, "module.func")` for every function of built-in module `module`.
pub fn module_functions(module: &str) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
    MODULE_FUNCTIONS
        .iter()
        .filter_map(move |full| match full.split_once('.') {
            Some((m, func)) if m == module => Some((func, *full)),
            _ => None,
        })
}

/// Dispatch a built-in function call.
///
/// Returns `None` if `name` is not handled here (caller should then try
/// the interpreter-aware built-ins).
pub fn call_builtin(name: &str, args: Vec<Value>) -> Option<Result<Value, String>> {
    fn inner(name: &str, args: Vec<Value>) -> Result<Option<Value>, String> {
        Ok(Some(match name {
            "len" => {
                let [arg] = exactly(args, "len function need one argument")?;
                let n = match &*arg {
                    Object::Str(s) => s.chars().count(),
                    Object::Array(a) => a.borrow().len(),
                    Object::Dict(d) => d.borrow().len(),
                    _ => return Err(format!("not supported object ({}) for len", arg.type_name())),
                };
                Value::from(n as i64)
            }
            "type" => {
                let [arg] = exactly(args, "invalid arguments length")?;
                type_of(&arg)
            }
            "copy" => {
                let [arg] = exactly(args, "invalid arguments length for copy")?;
                arg.shallow_copy()
            }
            "deepcopy" => {
                let [arg] = exactly(args, "invalid arguments length for deepcopy")?;
                arg.deep_copy()
            }
            "id" => {
                let [arg] = exactly(args, "invalid arguments length")?;
                Value::from(arg.id())
            }
            "assert" => {
                let [arg] = exactly(args, "invalid arguments length for assert")?;
                if !arg.is_truthy() {
                    return Err("assertion error".into());
                }
                Value::nil()
            }
            "ord" => {
                let [arg] = exactly(args, "need one argument")?;
                let s = arg.as_str().ok_or("invalid type")?;
                let c = s.chars().next().ok_or("empty strings")?;
                Value::from(c as i64)
            }
            "chr" => {
                let [arg] = exactly(args, "need one argument")?;
                let Object::Int(n) = &*arg else {
                    return Err("invalid type".into());
                };
                let c = u32::try_from(*n).ok().and_then(char::from_u32).ok_or("invalid code point")?;
                Value::from(c.to_string())
            }
            "cast" => {
                let [value, ty] = exactly(args, "invalid arguments length for cast")?;
                let Object::Type(kind) = &*ty else {
                    return Err("invalid type for cast".into());
                };
                construct(*kind, vec![value])?
            }
            "setattr" => {
                let [obj, key, value] = exactly(args, "invalid arguments length for setattr")?;
                let scope = obj.namespace().ok_or("unsupported object type")?;
                let key = key.as_str().ok_or("invalid key")?;
                scope.borrow_mut().insert(key, value);
                obj
            }
            "getattr" => {
                let [obj, key] = exactly(args, "invalid arguments length for getattr")?;
                let scope = obj.namespace().ok_or("unsupported object type")?;
                let key = key.as_str().ok_or("invalid key")?;
                let found = scope.borrow().get(key).cloned();
                found.unwrap_or_default()
            }
            "open" => {
                if args.len() < 2 {
                    return Err("need file name and mode".into());
                }
                let path = args[0].as_str().ok_or("invalid file name type")?;
                let mode = args[1].as_str().ok_or("invalid mode type")?;
                let opts = open_options(mode).ok_or_else(|| format!("invalid mode \"{mode}\""))?;
                let file = opts.open(path).map_err(|e| {
                    debug!(path, mode, error = %e, "open failed");
                    "failed to open file".to_owned()
                })?;
                Value::from(Object::File(FileHandle::new(path, file)))
            }
            _ => return Ok(None),
        }))
    }
    inner(name, args).transpose()
}

/// `open` modes: `r`, `w`, `a`, each optionally with `+`; a `b` is accepted
/// and ignored.
fn open_options(mode: &str) -> Option<OpenOptions> {
    let mode: String = mode.chars().filter(|c| *c != 'b').collect();
    let mut opts = OpenOptions::new();
    match mode.as_str() {
        "r" => opts.read(true),
        "w" => opts.write(true).create(true).truncate(true),
        "a" => opts.append(true).create(true),
        "r+" => opts.read(true).write(true),
        "w+" => opts.read(true).write(true).create(true).truncate(true),
        "a+" => opts.read(true).append(true).create(true),
        _ => return None,
    };
    Some(opts)
}

fn exactly<const N: usize>(args: Vec<Value>, msg: &str) -> Result<[Value; N], String> {
    <[Value; N]>::try_from(args).map_err(|_| msg.to_owned())
}

/// `type(x)`: a Type value, or the struct itself for struct types and
/// instances.
pub fn type_of(v: &Value) -> Value {
    match &**v {
        Object::Struct(_) | Object::Builtin(_) => v.clone(),
        Object::Instance(i) => i.ty.clone(),
        _ => Value::type_value(v.kind()),
    }
}

// ── Type constructors ─────────────────────────────────────────────────────────

/// Call a type value: `Int("3")`, `Array()`, `String(1.5)`, ...
pub fn construct(kind: TypeKind, args: Vec<Value>) -> Result<Value, String> {
    if args.len() > 1 {
        return Err(format!("invalid arguments length for {}", kind.name()));
    }
    let Some(arg) = args.into_iter().next() else {
        return Ok(match kind {
            TypeKind::Int => Value::from(0),
            TypeKind::Float => Value::from(0.0),
            TypeKind::String => Value::from(""),
            TypeKind::Bool => Value::from(false),
            TypeKind::Array => Value::from(Vec::new()),
            TypeKind::Dict => Value::from(Dict::new()),
            _ => return Err(format!("can't construct {}", kind.name())),
        });
    };
    let fail = || format!("can't cast {} to {}", arg.type_name(), kind.name());
    Ok(match (kind, &*arg) {
        (TypeKind::Int, Object::Int(_)) => arg.clone(),
        (TypeKind::Int, Object::Bool(b)) => Value::from(*b as i64),
        (TypeKind::Int, Object::Float(x)) => Value::from(*x as i64),
        (TypeKind::Int, Object::Str(s)) => {
            let n = s.trim().parse::<i64>().map_err(|_| format!("can't cast \"{s}\" to int"))?;
            Value::from(n)
        }
        (TypeKind::Float, Object::Float(_)) => arg.clone(),
        (TypeKind::Float, Object::Bool(b)) => Value::from(*b as i64 as f64),
        (TypeKind::Float, Object::Int(n)) => Value::from(*n as f64),
        (TypeKind::Float, Object::Str(s)) => {
            let x = s.trim().parse::<f64>().map_err(|_| format!("can't cast \"{s}\" to float"))?;
            Value::from(x)
        }
        (TypeKind::String, _) => Value::from(arg.to_string()),
        (TypeKind::Bool, _) => Value::from(arg.is_truthy()),
        (TypeKind::Array, Object::Array(_)) => arg.shallow_copy(),
        (TypeKind::Array, Object::Str(s)) => Value::from(s.chars().map(|c| Value::from(c.to_string())).collect::<Vec<_>>()),
        (TypeKind::Array, Object::Dict(d)) => {
            Value::from(d.borrow().keys().map(|k| Value::from(k.as_str())).collect::<Vec<_>>())
        }
        (TypeKind::Dict, Object::Dict(_)) => arg.shallow_copy(),
        (TypeKind::Dict, Object::Instance(i)) => Value::from(i.fields.borrow().clone()),
        _ => return Err(fail()),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Vec<Value>) -> Result<Value, String> {
        call_builtin(name, args).expect("not a pure builtin")
    }

    #[test]
    fn len_counts_chars() {
        assert_eq!(call("len", vec![Value::from("héllo")]), Ok(Value::from(5)));
        assert_eq!(call("len", vec![Value::from(vec![Value::nil()])]), Ok(Value::from(1)));
        assert_eq!(call("len", vec![]).unwrap_err(), "len function need one argument");
        assert_eq!(call("len", vec![Value::from(1)]).unwrap_err(), "not supported object (int) for len");
    }

    #[test]
    fn type_values_compare_by_kind() {
        let t = call("type", vec![Value::from(1)]).unwrap();
        assert!(t.equals(&Value::type_value(TypeKind::Int)));
        assert!(!t.equals(&Value::type_value(TypeKind::Float)));
    }

    #[test]
    fn assert_fails_on_falsy() {
        assert!(call("assert", vec![Value::from(1)]).is_ok());
        assert_eq!(call("assert", vec![Value::from(0)]).unwrap_err(), "assertion error");
    }

    #[test]
    fn ord_and_chr() {
        assert_eq!(call("ord", vec![Value::from("A")]), Ok(Value::from(65)));
        assert_eq!(call("chr", vec![Value::from(97)]), Ok(Value::from("a")));
        assert_eq!(call("ord", vec![Value::from("")]).unwrap_err(), "empty strings");
        assert_eq!(call("chr", vec![Value::from("a")]).unwrap_err(), "invalid type");
    }

    #[test]
    fn constructors_and_cast() {
        assert_eq!(construct(TypeKind::Int, vec![Value::from(" 42 ")]), Ok(Value::from(42)));
        assert_eq!(construct(TypeKind::Int, vec![Value::from(2.9)]), Ok(Value::from(2)));
        assert_eq!(construct(TypeKind::String, vec![Value::from(2.0)]), Ok(Value::from("2.0")));
        assert_eq!(construct(TypeKind::Bool, vec![Value::from(vec![])]), Ok(Value::from(true)));
        assert_eq!(construct(TypeKind::Int, vec![]), Ok(Value::from(0)));
        assert_eq!(construct(TypeKind::Int, vec![Value::from("x")]).unwrap_err(), "can't cast \"x\" to int");
        let cast = call("cast", vec![Value::from("1.5"), Value::type_value(TypeKind::Float)]);
        assert_eq!(cast, Ok(Value::from(1.5)));
    }

    #[test]
    fn copy_is_a_new_object() {
        let a = Value::from(vec![Value::from(1)]);
        let b = call("copy", vec![a.clone()]).unwrap();
        assert!(a.equals(&b));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn open_checks_arguments() {
        assert_eq!(call("open", vec![Value::from("x")]).unwrap_err(), "need file name and mode");
        assert_eq!(call("open", vec![Value::from(1), Value::from("r")]).unwrap_err(), "invalid file name type");
        assert_eq!(call("open", vec![Value::from("x"), Value::nil()]).unwrap_err(), "invalid mode type");
        assert_eq!(call("open", vec![Value::from("x"), Value::from("q")]).unwrap_err(), "invalid mode \"q\"");
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.txt");
        let args = vec![Value::from(missing.to_str().unwrap()), Value::from("r")];
        assert_eq!(call("open", args).unwrap_err(), "failed to open file");
    }

    #[test]
    fn open_creates_for_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.txt");
        let f = call("open", vec![Value::from(path.to_str().unwrap()), Value::from("wb")]).unwrap();
        assert_eq!(f.type_name(), "file");
        assert_eq!(f.to_string(), "(file)");
        assert!(path.exists());
    }

    #[test]
    fn not_a_pure_builtin() {
        assert!(call_builtin("puts", vec![]).is_none());
        assert!(call_builtin("exit", vec![Value::from(0)]).is_none());
        assert!(call_builtin("nope", vec![]).is_none());
    }

    #[test]
    fn module_function_names() {
        let opts: Vec<_> = module_functions("opts").map(|(f, _)| f).collect();
        assert_eq!(opts, vec!["get", "has", "args"]);
        assert_eq!(module_functions("alias").collect::<Vec<_>>(), vec![("set", "alias.set")]);
        assert_eq!(lookup("dance"), Some("dance"));
        assert!(is_module("alias"));
    }
}

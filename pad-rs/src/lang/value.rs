//! Runtime values.
//!
//! Every value is a shared handle ([`Value`]) to an [`Object`].  Cloning a
//! `Value` aliases the same object, which is what a plain assignment does;
//! arithmetic always allocates a fresh object.  Arrays, dicts and instances
//! carry interior mutability, so mutation through one binding is visible
//! through every alias.  Scalars are immutable, so sharing them is
//! indistinguishable from copying except through `id()`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::ops::Deref;
use std::rc::Rc;

use super::ast::{ArithOp, CompOp, FuncDef, StructDef};

/// Longest string `*` may build.
const MAX_STRING_LEN: usize = 1 << 30;

// ── Dict ──────────────────────────────────────────────────────────────────────

/// Insertion-ordered string → value map, used for dict values and scopes.
#[derive(Clone, Default)]
pub struct Dict {
    keys: Vec<String>,
    map: HashMap<String, Value>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Insert or replace; a replaced key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if !self.map.contains_key(&key) {
            self.keys.push(key.clone());
        }
        self.map.insert(key, value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let v = self.map.remove(key)?;
        self.keys.retain(|k| k != key);
        Some(v)
    }

    pub fn clear(&mut self) {
        self.keys.clear();
        self.map.clear();
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.keys.iter()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.keys.iter().filter_map(move |k| self.map.get(k).map(|v| (k, v)))
    }
}

impl fmt::Debug for Dict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// A variable table shared between frames, struct types and modules.
pub type Scope = Rc<RefCell<Dict>>;

pub fn new_scope() -> Scope {
    Rc::new(RefCell::new(Dict::new()))
}

// ── Callable and composite payloads ───────────────────────────────────────────

/// A user-defined function.  `globals` is the namespace of the module that
/// defined it; name lookups inside the body fall back to it.
pub struct Function {
    pub def: Rc<FuncDef>,
    pub globals: Scope,
    pub file: Option<Rc<str>>,
}

/// A struct type.  `fields` holds the static attributes and members
/// evaluated once at definition time.
pub struct StructType {
    pub def: Rc<StructDef>,
    pub fields: Scope,
    pub globals: Scope,
    pub file: Option<Rc<str>>,
}

/// An instance of a struct; `ty` is the [`Object::Struct`] it was built from.
pub struct Instance {
    pub ty: Value,
    pub fields: Scope,
}

pub struct Module {
    pub name: String,
    pub scope: Scope,
}

pub enum MethodTarget {
    /// A `met` member of a struct.
    Func(Value),
    /// A built-in string/array/dict method.
    Builtin(&'static str),
}

/// A file opened by `open`; `None` once closed.
pub struct FileHandle {
    pub path: String,
    pub file: RefCell<Option<File>>,
}

impl FileHandle {
    pub fn new(path: impl Into<String>, file: File) -> Self {
        FileHandle { path: path.into(), file: RefCell::new(Some(file)) }
    }
}

/// A callable with its receiver already bound.
pub struct Method {
    pub receiver: Value,
    pub target: MethodTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Nil,
    Bool,
    Int,
    Float,
    String,
    Array,
    Dict,
    Function,
    Struct,
    Object,
    Module,
    Type,
    Builtin,
    Method,
    File,
}

impl TypeKind {
    pub fn name(self) -> &'static str {
        match self {
            TypeKind::Nil => "nil",
            TypeKind::Bool => "bool",
            TypeKind::Int => "int",
            TypeKind::Float => "float",
            TypeKind::String => "string",
            TypeKind::Array => "array",
            TypeKind::Dict => "dict",
            TypeKind::Function => "function",
            TypeKind::Struct => "struct",
            TypeKind::Object => "object",
            TypeKind::Module => "module",
            TypeKind::Type => "type",
            TypeKind::Builtin => "builtin-function",
            TypeKind::Method => "method",
            TypeKind::File => "file",
        }
    }

    /// The type-constructor identifiers available in every scope.
    pub fn from_constructor(name: &str) -> Option<TypeKind> {
        let k = match name {
            "Array" => TypeKind::Array,
            "Dict" => TypeKind::Dict,
            "String" => TypeKind::String,
            "Int" => TypeKind::Int,
            "Float" => TypeKind::Float,
            "Bool" => TypeKind::Bool,
            _ => return None,
        };
        Some(k)
    }
}

// ── Object ────────────────────────────────────────────────────────────────────

pub enum Object {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(RefCell<Vec<Value>>),
    Dict(RefCell<Dict>),
    Func(Function),
    Struct(StructType),
    Instance(Instance),
    Module(Module),
    Builtin(&'static str),
    Method(Method),
    Type(TypeKind),
    File(FileHandle),
}

// ── Value ─────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Value(Rc<Object>);

impl Deref for Value {
    type Target = Object;

    fn deref(&self) -> &Object {
        &self.0
    }
}

impl From<Object> for Value {
    fn from(obj: Object) -> Self {
        Value(Rc::new(obj))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::from(Object::Bool(b))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::from(Object::Int(n))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::from(Object::Float(x))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::from(Object::Str(s.to_owned()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::from(Object::Str(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::from(Object::Array(RefCell::new(items)))
    }
}

impl From<Dict> for Value {
    fn from(d: Dict) -> Self {
        Value::from(Object::Dict(RefCell::new(d)))
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::nil()
    }
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Float(x) => x,
        }
    }
}

impl Value {
    pub fn nil() -> Self {
        Value::from(Object::Nil)
    }

    pub fn type_value(kind: TypeKind) -> Self {
        Value::from(Object::Type(kind))
    }

    pub fn builtin(name: &'static str) -> Self {
        Value::from(Object::Builtin(name))
    }

    pub fn kind(&self) -> TypeKind {
        match &**self {
            Object::Nil => TypeKind::Nil,
            Object::Bool(_) => TypeKind::Bool,
            Object::Int(_) => TypeKind::Int,
            Object::Float(_) => TypeKind::Float,
            Object::Str(_) => TypeKind::String,
            Object::Array(_) => TypeKind::Array,
            Object::Dict(_) => TypeKind::Dict,
            Object::Func(_) => TypeKind::Function,
            Object::Struct(_) => TypeKind::Struct,
            Object::Instance(_) => TypeKind::Object,
            Object::Module(_) => TypeKind::Module,
            Object::Builtin(_) => TypeKind::Builtin,
            Object::Method(_) => TypeKind::Method,
            Object::Type(_) => TypeKind::Type,
            Object::File(_) => TypeKind::File,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind().name()
    }

    /// Identity of the underlying object, as returned by `id()`.
    pub fn id(&self) -> i64 {
        Rc::as_ptr(&self.0) as usize as i64
    }

    pub fn ptr_eq(&self, other: &Value) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_nil(&self) -> bool {
        matches!(**self, Object::Nil)
    }

    /// `nil`, `false`, `0`, `0.0` and `""` are falsy; everything else,
    /// including empty arrays and dicts, is truthy.
    pub fn is_truthy(&self) -> bool {
        match &**self {
            Object::Nil => false,
            Object::Bool(b) => *b,
            Object::Int(n) => *n != 0,
            Object::Float(x) => *x != 0.0,
            Object::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &**self {
            Object::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view of bool/int values.
    pub fn as_int(&self) -> Option<i64> {
        match &**self {
            Object::Bool(b) => Some(*b as i64),
            Object::Int(n) => Some(*n),
            _ => None,
        }
    }

    fn num(&self) -> Option<Num> {
        match &**self {
            Object::Bool(b) => Some(Num::Int(*b as i64)),
            Object::Int(n) => Some(Num::Int(*n)),
            Object::Float(x) => Some(Num::Float(*x)),
            _ => None,
        }
    }

    /// Fields scope of a struct type, instance or module.
    pub fn namespace(&self) -> Option<&Scope> {
        match &**self {
            Object::Struct(s) => Some(&s.fields),
            Object::Instance(i) => Some(&i.fields),
            Object::Module(m) => Some(&m.scope),
            _ => None,
        }
    }

    // ── Equality ──────────────────────────────────────────────────────────────

    /// Total equality: never fails; values of unrelated kinds are unequal.
    /// Containers that reach themselves compare equal when their shapes
    /// match.
    pub fn equals(&self, other: &Value) -> bool {
        self.equals_in(other, &mut Vec::new())
    }

    /// `seen` holds the container pairs already under comparison.
    fn equals_in(&self, other: &Value, seen: &mut Vec<(usize, usize)>) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        if let (Some(a), Some(b)) = (self.num(), other.num()) {
            return match (a, b) {
                (Num::Int(x), Num::Int(y)) => x == y,
                _ => a.as_f64() == b.as_f64(),
            };
        }
        match (&**self, &**other) {
            (Object::Nil, Object::Nil) => true,
            (Object::Str(a), Object::Str(b)) => a == b,
            (Object::Array(a), Object::Array(b)) => {
                if !self.enter_pair(other, seen) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equals_in(y, seen))
            }
            (Object::Dict(a), Object::Dict(b)) => {
                if !self.enter_pair(other, seen) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k).is_some_and(|w| v.equals_in(w, seen)))
            }
            (Object::Type(a), Object::Type(b)) => a == b,
            (Object::Builtin(a), Object::Builtin(b)) => a == b,
            _ => false,
        }
    }

    /// Record `(self, other)` as under comparison; false if it already was.
    fn enter_pair(&self, other: &Value, seen: &mut Vec<(usize, usize)>) -> bool {
        let pair = (self.addr(), other.addr());
        if seen.contains(&pair) {
            return false;
        }
        seen.push(pair);
        true
    }

    fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    // ── Operators ─────────────────────────────────────────────────────────────

    /// Binary arithmetic across the bool/int/float family, plus string
    /// concatenation and repetition.
    pub fn arith(op: ArithOp, lhs: &Value, rhs: &Value) -> Result<Value, String> {
        match (op, &**lhs, &**rhs) {
            (ArithOp::Add, Object::Str(a), Object::Str(b)) => {
                return Ok(Value::from(format!("{a}{b}")));
            }
            (ArithOp::Mul, Object::Str(s), _) => {
                let Some(n) = rhs.as_int() else {
                    return Err(format!("can't mul string with {}", rhs.type_name()));
                };
                if n < 0 {
                    return Err("can't mul string by negative value".into());
                }
                let fits = usize::try_from(n).ok().and_then(|n| s.len().checked_mul(n));
                if !fits.is_some_and(|len| len <= MAX_STRING_LEN) {
                    return Err("can't mul string. result too large".into());
                }
                return Ok(Value::from(s.repeat(n as usize)));
            }
            _ => {}
        }

        let (Some(a), Some(b)) = (lhs.num(), rhs.num()) else {
            return Err(format!("can't {} {} with {}", op.verb(), lhs.type_name(), rhs.type_name()));
        };
        match (a, b) {
            (Num::Int(x), Num::Int(y)) => int_arith(op, x, y),
            _ => float_arith(op, a.as_f64(), b.as_f64()),
        }
    }

    /// Comparison.  `==`/`!=` are total; ordering is defined only within the
    /// bool/int/float family.
    pub fn compare(op: CompOp, lhs: &Value, rhs: &Value) -> Result<bool, String> {
        match op {
            CompOp::Eq => return Ok(lhs.equals(rhs)),
            CompOp::Ne => return Ok(!lhs.equals(rhs)),
            _ => {}
        }
        let (Some(a), Some(b)) = (lhs.num(), rhs.num()) else {
            return Err(format!("can't compare {} {} with {}", op.name(), lhs.type_name(), rhs.type_name()));
        };
        let ord = match (a, b) {
            (Num::Int(x), Num::Int(y)) => x.partial_cmp(&y),
            _ => a.as_f64().partial_cmp(&b.as_f64()),
        };
        let Some(ord) = ord else { return Ok(false) };
        Ok(match op {
            CompOp::Lt => ord.is_lt(),
            CompOp::Le => ord.is_le(),
            CompOp::Gt => ord.is_gt(),
            _ => ord.is_ge(),
        })
    }

    pub fn negate(&self) -> Result<Value, String> {
        match &**self {
            Object::Bool(b) => Ok(Value::from(-(*b as i64))),
            Object::Int(n) => Ok(Value::from(n.wrapping_neg())),
            Object::Float(x) => Ok(Value::from(-x)),
            _ => Err(format!("can't negative {}", self.type_name())),
        }
    }

    // ── Copying ───────────────────────────────────────────────────────────────

    /// New object with the same contents; container elements stay shared.
    /// Functions, types and modules are returned as-is.
    pub fn shallow_copy(&self) -> Value {
        match &**self {
            Object::Nil => Value::nil(),
            Object::Bool(b) => Value::from(*b),
            Object::Int(n) => Value::from(*n),
            Object::Float(x) => Value::from(*x),
            Object::Str(s) => Value::from(s.clone()),
            Object::Array(a) => Value::from(a.borrow().clone()),
            Object::Dict(d) => Value::from(d.borrow().clone()),
            Object::Instance(i) => Value::from(Object::Instance(Instance {
                ty: i.ty.clone(),
                fields: Rc::new(RefCell::new(i.fields.borrow().clone())),
            })),
            _ => self.clone(),
        }
    }

    /// Recursive copy of arrays, dicts and instances.  A container reached
    /// twice is copied once, so shared and cyclic structure is preserved.
    pub fn deep_copy(&self) -> Value {
        self.deep_copy_in(&mut HashMap::new())
    }

    fn deep_copy_in(&self, copies: &mut HashMap<usize, Value>) -> Value {
        if let Some(done) = copies.get(&self.addr()) {
            return done.clone();
        }
        match &**self {
            Object::Array(a) => {
                let copy = Value::from(Vec::<Value>::new());
                copies.insert(self.addr(), copy.clone());
                let items: Vec<Value> = a.borrow().iter().map(|v| v.deep_copy_in(copies)).collect();
                if let Object::Array(slot) = &*copy {
                    *slot.borrow_mut() = items;
                }
                copy
            }
            Object::Dict(d) => {
                let copy = Value::from(Dict::new());
                copies.insert(self.addr(), copy.clone());
                let mut out = Dict::new();
                for (k, v) in d.borrow().iter() {
                    out.insert(k.clone(), v.deep_copy_in(copies));
                }
                if let Object::Dict(slot) = &*copy {
                    *slot.borrow_mut() = out;
                }
                copy
            }
            Object::Instance(i) => {
                let fields = new_scope();
                let copy = Value::from(Object::Instance(Instance { ty: i.ty.clone(), fields: fields.clone() }));
                copies.insert(self.addr(), copy.clone());
                let mut out = Dict::new();
                for (k, v) in i.fields.borrow().iter() {
                    out.insert(k.clone(), v.deep_copy_in(copies));
                }
                *fields.borrow_mut() = out;
                copy
            }
            _ => self.shallow_copy(),
        }
    }
}

fn int_arith(op: ArithOp, x: i64, y: i64) -> Result<Value, String> {
    let n = match op {
        ArithOp::Add => x.wrapping_add(y),
        ArithOp::Sub => x.wrapping_sub(y),
        ArithOp::Mul => x.wrapping_mul(y),
        ArithOp::Div | ArithOp::Mod if y == 0 => return Err("zero division error".into()),
        ArithOp::Div => x.wrapping_div(y),
        ArithOp::Mod => x.wrapping_rem(y),
    };
    Ok(Value::from(n))
}

fn float_arith(op: ArithOp, x: f64, y: f64) -> Result<Value, String> {
    let r = match op {
        ArithOp::Add => x + y,
        ArithOp::Sub => x - y,
        ArithOp::Mul => x * y,
        ArithOp::Div | ArithOp::Mod if y == 0.0 => return Err("zero division error".into()),
        ArithOp::Div => x / y,
        ArithOp::Mod => x % y,
    };
    Ok(Value::from(r))
}

/// Six decimals with trailing zeros removed, keeping one digit after the
/// point: `2.0`, `2.2`, `0.125`.
pub fn format_float(x: f64) -> String {
    let mut s = format!("{x:.6}");
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.push('0');
        }
    }
    s
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &**self {
            Object::Nil => f.write_str("nil"),
            Object::Bool(b) => write!(f, "{b}"),
            Object::Int(n) => write!(f, "{n}"),
            Object::Float(x) => f.write_str(&format_float(*x)),
            Object::Str(s) => f.write_str(s),
            Object::Builtin(_) => f.write_str("(builtin-function)"),
            _ => write!(f, "({})", self.type_name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &**self {
            Object::Str(s) => write!(f, "{s:?}"),
            Object::Array(a) => f.debug_list().entries(a.borrow().iter()).finish(),
            Object::Dict(d) => write!(f, "{:?}", d.borrow()),
            _ => write!(f, "{self}"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

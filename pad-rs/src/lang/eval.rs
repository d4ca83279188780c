//! Tree-walking evaluator.
//!
//! The [`Interpreter`] executes a parsed [`Program`] against a [`Context`].
//! It keeps exactly one active [`Frame`]; calls swap a new frame in and
//! restore the caller's on the way out, so name resolution only ever sees
//! the current locals and the defining module's globals.
//!
//! `break`, `continue` and `return` travel as [`ControlFlow`] values through
//! `exec_block`; a signal that reaches a boundary it may not cross becomes
//! an error there.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use super::ast::{Expr, ForStmt, Formula, IfStmt, ImportStmt, InjectStmt, Program, RingOp, Stmt};
use super::builtins;
use super::context::Context;
use super::error::{Error, Result};
use super::import::Importer;
use super::methods;
use super::parser;
use super::token::Pos;
use super::value::{
    new_scope, Dict, Function, Instance, Method, MethodTarget, Module, Object, Scope, StructType, TypeKind, Value,
};

/// Maximum nesting of calls, struct bodies, inject bodies and imports.
pub const MAX_DEPTH: usize = 1024;

/// Remaining stack below which evaluation switches to a fresh segment.
const STACK_RED_ZONE: usize = 64 * 1024;
/// Size of each segment allocated once the red zone is reached.
const STACK_GROW_SIZE: usize = 1024 * 1024;

// ── ControlFlow ───────────────────────────────────────────────────────────────

/// Non-error control-flow signals that unwind statement lists.
#[derive(Debug)]
pub enum ControlFlow {
    Break(Pos),
    Continue(Pos),
    Return(Value, Pos),
}

pub(super) type Flow = Result<Option<ControlFlow>>;

// ── Frames ────────────────────────────────────────────────────────────────────

/// An `inject` body registered by a derived function, together with the
/// scope it runs in.
#[derive(Clone)]
pub(super) struct Injection {
    pub(super) stmt: Rc<InjectStmt>,
    pub(super) locals: Scope,
    pub(super) globals: Scope,
    pub(super) func: Option<Value>,
    pub(super) name: Rc<str>,
    pub(super) file: Option<Rc<str>>,
}

pub(super) struct Frame {
    pub(super) locals: Scope,
    pub(super) globals: Scope,
    /// Function being executed; `super` and `inject` need it.
    pub(super) func: Option<Value>,
    /// Name shown in traces.
    pub(super) name: Rc<str>,
    /// Overrides for `block` statements, most-derived first in.
    pub(super) injects: HashMap<String, Injection>,
    pub(super) file: Option<Rc<str>>,
}

impl Frame {
    /// Module-level frame: locals and globals are the same table.
    fn top(globals: Scope, file: Option<Rc<str>>) -> Self {
        Frame {
            locals: globals.clone(),
            globals,
            func: None,
            name: Rc::from("<main>"),
            injects: HashMap::new(),
            file,
        }
    }
}

/// An assignable location.
enum Place {
    Var(String, Pos),
    Attr(Value, String, Pos),
    Index(Value, Value, Pos),
}

// ── Interpreter ───────────────────────────────────────────────────────────────

pub struct Interpreter<'a> {
    ctx: &'a mut Context,
    importer: &'a Importer,
    pub(super) frame: Frame,
    depth: usize,
    /// Evaluating the formula of a `{: :}` block.
    in_ref: bool,
}

impl<'a> Interpreter<'a> {
    pub fn new(ctx: &'a mut Context, importer: &'a Importer) -> Self {
        let frame = Frame::top(ctx.globals().clone(), None);
        Interpreter { ctx, importer, frame, depth: 0, in_ref: false }
    }

    /// Name the program file; used for traces and relative imports.
    pub fn with_file(mut self, file: Option<&str>) -> Self {
        self.frame.file = file.map(Rc::from);
        self
    }

    /// Execute a whole program in the context's global scope.  Output
    /// written before a failure stays in the context.
    pub fn run(&mut self, program: &Program) -> Result<()> {
        match self.exec_block(&program.stmts)? {
            None => Ok(()),
            Some(cf) => Err(self.stray_signal(cf)),
        }
    }

    // ── Errors and frames ─────────────────────────────────────────────────────

    pub(super) fn error(&self, msg: impl Into<String>, pos: Option<Pos>) -> Error {
        self.raise(Error::runtime(msg, pos), pos)
    }

    fn raise(&self, mut err: Error, pos: Option<Pos>) -> Error {
        err.pos = err.pos.or(pos);
        err.with_frame(self.frame.file.as_deref(), pos.map_or(0, |p| p.line), &self.frame.name)
    }

    fn check_write(&self, written: std::io::Result<()>, pos: Option<Pos>) -> Result<()> {
        written.map_err(|e| self.error(format!("failed to write output: {e}"), pos))
    }

    fn stray_signal(&self, cf: ControlFlow) -> Error {
        match cf {
            ControlFlow::Break(p) => self.error("invalid break statement. not in loop", Some(p)),
            ControlFlow::Continue(p) => self.error("invalid continue statement. not in loop", Some(p)),
            ControlFlow::Return(_, p) => self.error("invalid return statement. not in function", Some(p)),
        }
    }

    /// Run `body` with `frame` active, restoring the caller's frame after.
    /// Errors crossing back get a trace frame for the call site at `pos`.
    pub(super) fn enter<T>(&mut self, frame: Frame, pos: Pos, body: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("reached maximum recursion depth", Some(pos)));
        }
        let saved = std::mem::replace(&mut self.frame, frame);
        let saved_ref = std::mem::replace(&mut self.in_ref, false);
        self.depth += 1;
        let result = body(self);
        self.depth -= 1;
        self.in_ref = saved_ref;
        self.frame = saved;
        result.map_err(|mut e| {
            e.push_frame(self.frame.file.as_deref(), pos.line, &self.frame.name);
            e
        })
    }

    /// Run a struct or module body; every control-flow signal is stray there.
    fn run_body(&mut self, frame: Frame, body: &[Stmt], pos: Pos) -> Result<()> {
        self.enter(frame, pos, |me| match me.exec_block(body)? {
            None => Ok(()),
            Some(cf) => Err(me.stray_signal(cf)),
        })
    }

    // ── Statements ────────────────────────────────────────────────────────────

    pub(super) fn exec_block(&mut self, stmts: &[Stmt]) -> Flow {
        for stmt in stmts {
            if let Some(cf) = self.exec_stmt(stmt)? {
                return Ok(Some(cf));
            }
        }
        Ok(None)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Flow {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.exec_stmt_inner(stmt))
    }

    fn exec_stmt_inner(&mut self, stmt: &Stmt) -> Flow {
        match stmt {
            Stmt::Text(text) => {
                let written = self.ctx.write_stdout(text);
                self.check_write(written, None)?;
            }
            Stmt::Ref(formula, pos) => {
                let saved = std::mem::replace(&mut self.in_ref, true);
                let value = self.eval_formula(formula);
                self.in_ref = saved;
                let text = value?.to_string();
                let written = self.ctx.write_stdout(&text);
                self.check_write(written, Some(*pos))?;
            }
            Stmt::Formula(formula, _) => {
                self.eval_formula(formula)?;
            }
            Stmt::If(s) => return self.exec_if(s),
            Stmt::For(s) => return self.exec_for(s),
            Stmt::Break(p) => return Ok(Some(ControlFlow::Break(*p))),
            Stmt::Continue(p) => return Ok(Some(ControlFlow::Continue(*p))),
            Stmt::Return(formula, p) => {
                let value = match formula {
                    Some(f) => self.eval_formula(f)?,
                    None => Value::nil(),
                };
                return Ok(Some(ControlFlow::Return(value, *p)));
            }
            Stmt::Import(s) => self.exec_import(s)?,
            Stmt::FuncDef(def) => {
                let func = Function {
                    def: def.clone(),
                    globals: self.frame.globals.clone(),
                    file: self.frame.file.clone(),
                };
                self.frame.locals.borrow_mut().insert(def.name.clone(), Value::from(Object::Func(func)));
            }
            Stmt::StructDef(def) => {
                let fields = new_scope();
                let frame = Frame {
                    locals: fields.clone(),
                    globals: self.frame.globals.clone(),
                    func: None,
                    name: Rc::from(def.name.as_str()),
                    injects: HashMap::new(),
                    file: self.frame.file.clone(),
                };
                self.run_body(frame, &def.body, def.pos)?;
                let ty = StructType {
                    def: def.clone(),
                    fields,
                    globals: self.frame.globals.clone(),
                    file: self.frame.file.clone(),
                };
                self.frame.locals.borrow_mut().insert(def.name.clone(), Value::from(Object::Struct(ty)));
            }
            Stmt::Block(b) => return self.exec_block_stmt(b),
            Stmt::Inject(s) => self.register_inject(s)?,
        }
        Ok(None)
    }

    fn exec_if(&mut self, s: &IfStmt) -> Flow {
        for (cond, body) in &s.branches {
            if self.eval_expr(cond)?.is_truthy() {
                return self.exec_block(body);
            }
        }
        match &s.else_body {
            Some(body) => self.exec_block(body),
            None => Ok(None),
        }
    }

    /// `for` introduces no scope; the loop variable stays visible after.
    fn exec_for(&mut self, s: &ForStmt) -> Flow {
        if let Some(init) = &s.init {
            self.eval_formula(init)?;
        }
        loop {
            if let Some(cond) = &s.cond {
                if !self.eval_formula(cond)?.is_truthy() {
                    break;
                }
            }
            match self.exec_block(&s.body)? {
                Some(ControlFlow::Break(_)) => break,
                Some(ret @ ControlFlow::Return(..)) => return Ok(Some(ret)),
                Some(ControlFlow::Continue(_)) | None => {}
            }
            if let Some(update) = &s.update {
                self.eval_formula(update)?;
            }
        }
        Ok(None)
    }

    // ── Imports ───────────────────────────────────────────────────────────────

    fn exec_import(&mut self, stmt: &ImportStmt) -> Result<()> {
        match stmt {
            ImportStmt::As { path, alias, pos } => {
                let module = self.import_module(path, *pos)?;
                self.frame.locals.borrow_mut().insert(alias.clone(), module);
            }
            ImportStmt::From { path, names, pos } => {
                let module = self.import_module(path, *pos)?;
                let Object::Module(m) = &*module else {
                    return Err(self.error(format!("\"{path}\" is not a module"), Some(*pos)));
                };
                for name in names {
                    let found = m.scope.borrow().get(&name.name).cloned();
                    let Some(value) = found else {
                        let msg = format!("\"{}\" is not defined in module \"{path}\"", name.name);
                        return Err(self.error(msg, Some(*pos)));
                    };
                    self.frame.locals.borrow_mut().insert(name.bound_name(), value);
                }
            }
        }
        Ok(())
    }

    /// Compile and evaluate a module once per context; later imports of the
    /// same file reuse it.
    fn import_module(&mut self, path: &str, pos: Pos) -> Result<Value> {
        let resolved = self
            .importer
            .resolve(path, self.frame.file.as_deref())
            .map_err(|msg| self.raise(Error::import(msg), Some(pos)))?;
        if let Some(module) = self.ctx.imports.get(&resolved) {
            debug!(path, "import cached");
            return Ok(module.clone());
        }
        let src = self.importer.read(&resolved).map_err(|msg| self.raise(Error::import(msg), Some(pos)))?;
        let file: Rc<str> = Rc::from(resolved.to_string_lossy().as_ref());
        let program = parser::parse(&src).map_err(|mut e| {
            let line = e.pos.map_or(0, |p| p.line);
            e.push_frame(Some(&file), line, "<main>");
            e.push_frame(self.frame.file.as_deref(), pos.line, &self.frame.name);
            e
        })?;

        debug!(path, file = %file, "import");
        let scope = new_scope();
        let module = Value::from(Object::Module(Module { name: path.to_owned(), scope: scope.clone() }));
        self.ctx.imports.insert(resolved.clone(), module.clone());
        if let Err(e) = self.run_body(Frame::top(scope, Some(file)), &program.stmts, pos) {
            self.ctx.imports.remove(&resolved);
            return Err(e);
        }
        Ok(module)
    }

    // ── Formulas and assignment ───────────────────────────────────────────────

    fn eval_formula(&mut self, formula: &Formula) -> Result<Value> {
        match formula {
            Formula::AssignList(chains) => {
                let mut last = Value::nil();
                for chain in chains {
                    let Some((value, targets)) = chain.split_last() else { continue };
                    let v = self.eval_expr(value)?;
                    for target in targets.iter().rev() {
                        self.assign(target, v.clone())?;
                    }
                    last = v;
                }
                Ok(last)
            }
            Formula::MultiAssign(lists) => {
                let Some((values, targets)) = lists.split_last() else {
                    return Ok(Value::nil());
                };
                let value = self.eval_test_list(values)?;
                for list in targets.iter().rev() {
                    self.assign_many(list, &value)?;
                }
                Ok(value)
            }
        }
    }

    /// One test is its own value; several make an array.
    fn eval_test_list(&mut self, tests: &[Expr]) -> Result<Value> {
        if let [only] = tests {
            return self.eval_expr(only);
        }
        Ok(Value::from(self.eval_args(tests)?))
    }

    fn assign_many(&mut self, targets: &[Expr], value: &Value) -> Result<()> {
        if let [only] = targets {
            return self.assign(only, value.clone());
        }
        let pos = targets.first().and_then(Expr::pos);
        let Object::Array(items) = &**value else {
            return Err(self.error("can't assign to multiple targets. value is not array", pos));
        };
        let items = items.borrow().clone();
        if items.len() != targets.len() {
            let msg = format!("can't assign {} values to {} targets", items.len(), targets.len());
            return Err(self.error(msg, pos));
        }
        for (target, item) in targets.iter().zip(items) {
            self.assign(target, item)?;
        }
        Ok(())
    }

    fn assign(&mut self, target: &Expr, value: Value) -> Result<()> {
        let place = self.place(target)?;
        self.write_place(place, value)
    }

    fn place(&mut self, target: &Expr) -> Result<Place> {
        match target {
            Expr::Ident(name, pos) => Ok(Place::Var(name.clone(), *pos)),
            Expr::Ring { head, ops } => {
                let Some((last, init)) = ops.split_last() else {
                    return Err(self.error("invalid assign target", target.pos()));
                };
                let owner = self.eval_ring(head, init)?;
                match last {
                    RingOp::Attr(name, pos) => Ok(Place::Attr(owner, name.clone(), *pos)),
                    RingOp::Index(index, pos) => {
                        let key = self.eval_expr(index)?;
                        Ok(Place::Index(owner, key, *pos))
                    }
                    RingOp::Call(_, pos) => Err(self.error("can't assign to function call", Some(*pos))),
                }
            }
            other => Err(self.error("invalid assign target", other.pos())),
        }
    }

    fn read_place(&mut self, place: &Place) -> Result<Value> {
        match place {
            Place::Var(name, pos) => {
                self.lookup(name).ok_or_else(|| self.error(format!("\"{name}\" is not defined"), Some(*pos)))
            }
            Place::Attr(owner, name, pos) => self.get_attr(owner, name, *pos),
            Place::Index(owner, key, pos) => self.get_index(owner, key, *pos),
        }
    }

    /// Variables are always bound in the current frame's locals.
    fn write_place(&mut self, place: Place, value: Value) -> Result<()> {
        match place {
            Place::Var(name, _) => {
                self.frame.locals.borrow_mut().insert(name, value);
                Ok(())
            }
            Place::Attr(owner, name, pos) => self.set_attr(&owner, name, value, pos),
            Place::Index(owner, key, pos) => self.set_index(&owner, &key, value, pos),
        }
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    pub(super) fn eval_args(&mut self, args: &[Expr]) -> Result<Vec<Value>> {
        args.iter().map(|a| self.eval_expr(a)).collect()
    }

    fn eval_expr(&mut self, expr: &Expr) -> Result<Value> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.eval_expr_inner(expr))
    }

    fn eval_expr_inner(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Nil => Ok(Value::nil()),
            Expr::Bool(b) => Ok(Value::from(*b)),
            Expr::Int(n) => Ok(Value::from(*n)),
            Expr::Float(x) => Ok(Value::from(*x)),
            Expr::Str(s) => Ok(Value::from(s.as_str())),
            Expr::Ident(name, pos) => self.read_var(name, *pos),
            Expr::Array(items, _) => Ok(Value::from(self.eval_args(items)?)),
            Expr::Dict(pairs, pos) => {
                let mut dict = Dict::new();
                for (k, v) in pairs {
                    let key = self.eval_expr(k)?;
                    let Some(key) = key.as_str().map(str::to_owned) else {
                        return Err(self.error("key is not string in dict", k.pos().or(Some(*pos))));
                    };
                    let value = self.eval_expr(v)?;
                    dict.insert(key, value);
                }
                Ok(Value::from(dict))
            }
            Expr::Super(pos) => Err(self.error("invalid super usage. super needs call", Some(*pos))),
            Expr::Ring { head, ops } => self.eval_ring(head, ops),
            Expr::Negative(operand, pos) => {
                let v = self.eval_expr(operand)?;
                v.negate().map_err(|m| self.error(m, Some(*pos)))
            }
            Expr::Arith { first, rest } => {
                let mut acc = self.eval_expr(first)?;
                for (op, rhs, pos) in rest {
                    let r = self.eval_expr(rhs)?;
                    acc = Value::arith(*op, &acc, &r).map_err(|m| self.error(m, Some(*pos)))?;
                }
                Ok(acc)
            }
            Expr::AssCalc { target, rest } => {
                let place = self.place(target)?;
                let mut acc = self.read_place(&place)?;
                for (op, rhs, pos) in rest {
                    let r = self.eval_expr(rhs)?;
                    acc = Value::arith(*op, &acc, &r).map_err(|m| self.error(m, Some(*pos)))?;
                }
                self.write_place(place, acc.clone())?;
                Ok(acc)
            }
            Expr::Comparison { first, rest } => {
                let mut acc = self.eval_expr(first)?;
                for (op, rhs, pos) in rest {
                    let r = self.eval_expr(rhs)?;
                    let b = Value::compare(*op, &acc, &r).map_err(|m| self.error(m, Some(*pos)))?;
                    acc = Value::from(b);
                }
                Ok(acc)
            }
            Expr::Not(operand, _) => Ok(Value::from(!self.eval_expr(operand)?.is_truthy())),
            Expr::And(items) => {
                let mut last = Value::nil();
                for item in items {
                    last = self.eval_expr(item)?;
                    if !last.is_truthy() {
                        break;
                    }
                }
                Ok(last)
            }
            Expr::Or(items) => {
                let mut last = Value::nil();
                for item in items {
                    last = self.eval_expr(item)?;
                    if last.is_truthy() {
                        break;
                    }
                }
                Ok(last)
            }
        }
    }

    fn eval_ring(&mut self, head: &Expr, ops: &[RingOp]) -> Result<Value> {
        let (mut cur, ops) = match (head, ops.split_first()) {
            (Expr::Super(_), Some((RingOp::Call(args, pos), rest))) => (self.call_super(args, *pos)?, rest),
            _ => (self.eval_expr(head)?, ops),
        };
        for op in ops {
            cur = match op {
                RingOp::Attr(name, pos) => self.get_attr(&cur, name, *pos)?,
                RingOp::Index(index, pos) => {
                    let key = self.eval_expr(index)?;
                    self.get_index(&cur, &key, *pos)?
                }
                RingOp::Call(args, pos) => {
                    let args = self.eval_args(args)?;
                    self.call_value(&cur, args, *pos)?
                }
            };
        }
        Ok(cur)
    }

    // ── Names ─────────────────────────────────────────────────────────────────

    /// Current locals, then the defining module's globals, then built-ins.
    fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.frame.locals.borrow().get(name) {
            return Some(v.clone());
        }
        if let Some(v) = self.frame.globals.borrow().get(name) {
            return Some(v.clone());
        }
        builtin_value(name)
    }

    fn read_var(&self, name: &str, pos: Pos) -> Result<Value> {
        self.lookup(name).ok_or_else(|| {
            let msg = if self.in_ref {
                format!("\"{name}\" is not defined in ref block")
            } else {
                format!("\"{name}\" is not defined")
            };
            self.error(msg, Some(pos))
        })
    }

    // ── Attributes and indexing ───────────────────────────────────────────────

    fn get_attr(&self, owner: &Value, name: &str, pos: Pos) -> Result<Value> {
        let found = match &**owner {
            Object::Module(m) => m.scope.borrow().get(name).cloned(),
            Object::Struct(s) => s.fields.borrow().get(name).cloned(),
            Object::Instance(i) => {
                let own = i.fields.borrow().get(name).cloned();
                let v = own.or_else(|| i.ty.namespace().and_then(|ty| ty.borrow().get(name).cloned()));
                v.map(|v| bind_method(owner, v))
            }
            _ => methods::lookup(owner.kind(), name).map(|m| {
                Value::from(Object::Method(Method { receiver: owner.clone(), target: MethodTarget::Builtin(m) }))
            }),
        };
        found.ok_or_else(|| self.error(format!("\"{name}\" is not defined in {}", owner.type_name()), Some(pos)))
    }

    fn set_attr(&self, owner: &Value, name: String, value: Value, pos: Pos) -> Result<()> {
        match owner.namespace() {
            Some(scope) => {
                scope.borrow_mut().insert(name, value);
                Ok(())
            }
            None => {
                let msg = format!("can't assign attribute \"{name}\" to {}", owner.type_name());
                Err(self.error(msg, Some(pos)))
            }
        }
    }

    /// Normalize a possibly negative index against `len`.
    fn index_of(&self, key: &Value, len: usize, pos: Pos) -> Result<usize> {
        let Object::Int(i) = &**key else {
            return Err(self.error(format!("index is not int but {}", key.type_name()), Some(pos)));
        };
        let i = if *i < 0 { i.wrapping_add(len as i64) } else { *i };
        if i < 0 || i >= len as i64 {
            return Err(self.error("index out of range", Some(pos)));
        }
        Ok(i as usize)
    }

    fn get_index(&self, owner: &Value, key: &Value, pos: Pos) -> Result<Value> {
        match &**owner {
            Object::Array(items) => {
                let items = items.borrow();
                let i = self.index_of(key, items.len(), pos)?;
                Ok(items[i].clone())
            }
            Object::Str(s) => {
                let i = self.index_of(key, s.chars().count(), pos)?;
                Ok(Value::from(s.chars().nth(i).map(String::from).unwrap_or_default()))
            }
            Object::Dict(d) => {
                let Some(k) = key.as_str() else {
                    return Err(self.error("dict key is not string", Some(pos)));
                };
                let found = d.borrow().get(k).cloned();
                found.ok_or_else(|| self.error(format!("not found key \"{k}\""), Some(pos)))
            }
            _ => Err(self.error(format!("can't index {}", owner.type_name()), Some(pos))),
        }
    }

    fn set_index(&self, owner: &Value, key: &Value, value: Value, pos: Pos) -> Result<()> {
        match &**owner {
            Object::Array(items) => {
                let len = items.borrow().len();
                let i = self.index_of(key, len, pos)?;
                items.borrow_mut()[i] = value;
                Ok(())
            }
            Object::Dict(d) => {
                let Some(k) = key.as_str() else {
                    return Err(self.error("dict key is not string", Some(pos)));
                };
                d.borrow_mut().insert(k, value);
                Ok(())
            }
            _ => Err(self.error(format!("can't assign index to {}", owner.type_name()), Some(pos))),
        }
    }

    // ── Calls ─────────────────────────────────────────────────────────────────

    fn call_value(&mut self, callee: &Value, args: Vec<Value>, pos: Pos) -> Result<Value> {
        match &**callee {
            Object::Func(_) => self.call_function(callee, args, pos, HashMap::new()),
            Object::Method(m) => match &m.target {
                MethodTarget::Func(func) => {
                    let mut full = Vec::with_capacity(args.len() + 1);
                    full.push(m.receiver.clone());
                    full.extend(args);
                    self.call_function(func, full, pos, HashMap::new())
                }
                MethodTarget::Builtin(name) => {
                    methods::call_method(name, &m.receiver, args).map_err(|e| self.error(e, Some(pos)))
                }
            },
            Object::Builtin(name) => self.call_builtin(name, args, pos),
            Object::Struct(_) => self.instantiate(callee, args, pos),
            Object::Type(kind) => builtins::construct(*kind, args).map_err(|e| self.error(e, Some(pos))),
            _ => Err(self.error(format!("can't call {}", callee.type_name()), Some(pos))),
        }
    }

    pub(super) fn call_function(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
        pos: Pos,
        injects: HashMap<String, Injection>,
    ) -> Result<Value> {
        let Object::Func(func) = &**callee else {
            return Err(self.error(format!("can't call {}", callee.type_name()), Some(pos)));
        };
        let def = &func.def;
        if args.len() != def.params.len() {
            let msg = format!(
                "invalid arguments length. \"{}\" takes {} arguments but {} given",
                def.name,
                def.params.len(),
                args.len()
            );
            return Err(self.error(msg, Some(pos)));
        }
        let locals = new_scope();
        {
            let mut l = locals.borrow_mut();
            for (param, arg) in def.params.iter().zip(args) {
                l.insert(param.clone(), arg);
            }
        }
        debug!(func = %def.name, depth = self.depth, "call");
        let frame = Frame {
            locals,
            globals: func.globals.clone(),
            func: Some(callee.clone()),
            name: Rc::from(def.name.as_str()),
            injects,
            file: func.file.clone(),
        };
        self.enter(frame, pos, |me| match me.exec_block(&def.body)? {
            None => Ok(Value::nil()),
            Some(ControlFlow::Return(v, _)) => Ok(v),
            Some(cf) => Err(me.stray_signal(cf)),
        })
    }

    /// Re-run the struct body into fresh fields, then overwrite the leading
    /// data fields with the positional arguments.  Surplus or missing
    /// arguments are not an error.
    fn instantiate(&mut self, ty: &Value, args: Vec<Value>, pos: Pos) -> Result<Value> {
        let Object::Struct(st) = &**ty else {
            return Err(self.error(format!("can't call {}", ty.type_name()), Some(pos)));
        };
        let fields = new_scope();
        let frame = Frame {
            locals: fields.clone(),
            globals: st.globals.clone(),
            func: None,
            name: Rc::from(st.def.name.as_str()),
            injects: HashMap::new(),
            file: st.file.clone(),
        };
        self.run_body(frame, &st.def.body, pos)?;
        let names: Vec<String> = fields
            .borrow()
            .iter()
            .filter(|(_, v)| !matches!(v.kind(), TypeKind::Function | TypeKind::Struct))
            .map(|(k, _)| k.clone())
            .collect();
        {
            let mut f = fields.borrow_mut();
            for (name, arg) in names.into_iter().zip(args) {
                f.insert(name, arg);
            }
        }
        Ok(Value::from(Object::Instance(Instance { ty: ty.clone(), fields })))
    }

    // ── Interpreter-aware built-ins ───────────────────────────────────────────

    fn call_builtin(&mut self, name: &str, args: Vec<Value>, pos: Pos) -> Result<Value> {
        let result = match name {
            "exit" => return self.builtin_exit(args, pos),
            "die" => return self.builtin_die(args, pos),
            "dance" => return self.builtin_dance(args, pos),
            "puts" => self.builtin_puts(args, false),
            "eputs" => self.builtin_puts(args, true),
            "extract" => self.builtin_extract(args),
            "alias.set" => self.builtin_alias_set(args),
            "opts.get" | "opts.has" | "opts.args" => self.builtin_opts(name, args),
            _ => builtins::call_builtin(name, args).unwrap_or_else(|| Err(format!("\"{name}\" is not defined"))),
        };
        result.map_err(|e| self.error(e, Some(pos)))
    }

    /// Space-joined, line-terminated; returns the argument count.
    fn builtin_puts(&mut self, args: Vec<Value>, stderr: bool) -> std::result::Result<Value, String> {
        let mut line = args.iter().map(Value::to_string).collect::<Vec<_>>().join(" ");
        line.push_str(self.ctx.newline());
        let written = if stderr { self.ctx.write_stderr(&line) } else { self.ctx.write_stdout(&line) };
        written.map_err(|e| format!("failed to write output: {e}"))?;
        Ok(Value::from(args.len() as i64))
    }

    /// `exit(code)`: stop the whole run with status `code`.  Output written
    /// so far stays in the context for the host to flush.
    fn builtin_exit(&mut self, args: Vec<Value>, pos: Pos) -> Result<Value> {
        let [code] = <[Value; 1]>::try_from(args).map_err(|_| self.error("invalid arguments length for exit", Some(pos)))?;
        let Object::Int(code) = &*code else {
            return Err(self.error("invalid exit code type for exit", Some(pos)));
        };
        debug!(code, "exit requested");
        Err(self.raise(Error::exit(*code as i32), Some(pos)))
    }

    /// `die(args...)`: `eputs(args...)` then exit with status 1.
    fn builtin_die(&mut self, args: Vec<Value>, pos: Pos) -> Result<Value> {
        self.builtin_puts(args, true).map_err(|e| self.error(e, Some(pos)))?;
        Err(self.raise(Error::exit(1), Some(pos)))
    }

    /// Copy the fields of structs/instances into the current scope.
    fn builtin_extract(&mut self, args: Vec<Value>) -> std::result::Result<Value, String> {
        if args.is_empty() {
            return Err("invalid arguments length for extract".into());
        }
        for arg in &args {
            let scope = match &**arg {
                Object::Struct(s) => &s.fields,
                Object::Instance(i) => &i.fields,
                _ => return Err("unsupported object".into()),
            };
            let entries: Vec<(String, Value)> = scope.borrow().iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            let mut locals = self.frame.locals.borrow_mut();
            for (k, v) in entries {
                locals.insert(k, v);
            }
        }
        Ok(Value::nil())
    }

    /// `dance(code[, vars])`: run `code` in a fresh context and return
    /// `[stdout, stderr-or-nil]`.  A failure is reported through the second
    /// element after any stderr output.  An exit inside the danced code
    /// forwards its output to this context and exits here too.
    fn builtin_dance(&mut self, args: Vec<Value>, pos: Pos) -> Result<Value> {
        let Some(code) = args.first() else {
            return Err(self.error("need one argument", Some(pos)));
        };
        let Some(code) = code.as_str() else {
            return Err(self.error("invalid source code", Some(pos)));
        };
        let mut ctx = Context::new();
        ctx.set_line_encoding(self.ctx.line_encoding());
        if let Some(vars) = args.get(1) {
            let Object::Dict(d) = &**vars else {
                return Err(self.error("invalid context type. context will be dict", Some(pos)));
            };
            for (k, v) in d.borrow().iter() {
                ctx.set_var(k.clone(), v.clone());
            }
        }
        let result = parser::parse(code).and_then(|program| {
            let mut sub = Interpreter::new(&mut ctx, self.importer);
            sub.depth = self.depth + 1;
            sub.run(&program)
        });
        if let Some(e) = result.as_ref().err().filter(|e| e.exit_code().is_some()).cloned() {
            let written = self.ctx.write_stdout(ctx.stdout_buf());
            self.check_write(written, Some(pos))?;
            let written = self.ctx.write_stderr(ctx.stderr_buf());
            self.check_write(written, Some(pos))?;
            return Err(self.raise(e, Some(pos)));
        }
        let out = Value::from(ctx.stdout_buf());
        let err = match result {
            Ok(()) if ctx.stderr_buf().is_empty() => Value::nil(),
            Ok(()) => Value::from(ctx.stderr_buf()),
            Err(e) => Value::from(format!("{}{}", ctx.stderr_buf(), e.message)),
        };
        Ok(Value::from(vec![out, err]))
    }

    fn builtin_alias_set(&mut self, args: Vec<Value>) -> std::result::Result<Value, String> {
        if args.len() < 2 {
            return Err("can't invoke alias.set. too few arguments".into());
        }
        if args.len() > 3 {
            return Err("can't invoke alias.set. too many arguments".into());
        }
        let key = args[0].as_str().ok_or("can't invoke alias.set. key is not string")?;
        let value = args[1].as_str().ok_or("can't invoke alias.set. value is not string")?;
        let desc = match args.get(2) {
            Some(d) => Some(d.as_str().ok_or("can't invoke alias.set. description is not unicode")?.to_owned()),
            None => None,
        };
        self.ctx.set_alias(key, value, desc);
        Ok(Value::nil())
    }

    fn builtin_opts(&self, name: &str, args: Vec<Value>) -> std::result::Result<Value, String> {
        let [arg] = <[Value; 1]>::try_from(args).map_err(|_| format!("can't invoke {name}. need one argument"))?;
        let opts = self.ctx.opts();
        if name == "opts.args" {
            let Object::Int(i) = &*arg else {
                return Err("invalid argument type. argument is not int".into());
            };
            return Ok(opts.arg(*i).map(Value::from).unwrap_or_default());
        }
        let key = arg.as_str().ok_or_else(|| format!("can't invoke {name}. argument is not string"))?;
        Ok(if name == "opts.has" {
            Value::from(opts.has(key))
        } else {
            opts.get(key).map(Value::from).unwrap_or_default()
        })
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Built-in functions, type constructors and the `alias`/`opts` modules,
/// visible from every scope unless shadowed.
fn builtin_value(name: &str) -> Option<Value> {
    if let Some(f) = builtins::lookup(name) {
        return Some(Value::builtin(f));
    }
    if let Some(kind) = TypeKind::from_constructor(name) {
        return Some(Value::type_value(kind));
    }
    if builtins::is_module(name) {
        let scope = new_scope();
        for (func, full) in builtins::module_functions(name) {
            scope.borrow_mut().insert(func, Value::builtin(full));
        }
        return Some(Value::from(Object::Module(Module { name: name.to_owned(), scope })));
    }
    None
}

/// A `met` fetched through an instance is bound to it.
fn bind_method(receiver: &Value, v: Value) -> Value {
    let is_met = matches!(&*v, Object::Func(f) if f.def.is_met);
    if is_met {
        Value::from(Object::Method(Method { receiver: receiver.clone(), target: MethodTarget::Func(v) }))
    } else {
        v
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str) -> (Context, Result<()>) {
        let mut ctx = Context::new();
        let importer = Importer::default();
        let result = parser::parse(src).and_then(|p| Interpreter::new(&mut ctx, &importer).run(&p));
        (ctx, result)
    }

    fn output(src: &str) -> String {
        let (ctx, result) = run(src);
        if let Err(e) = result {
            panic!("unexpected error: {e}");
        }
        ctx.stdout_buf().to_owned()
    }

    fn error(src: &str) -> String {
        match run(src).1 {
            Ok(()) => panic!("expected an error"),
            Err(e) => e.message,
        }
    }

    #[test]
    fn text_and_ref_blocks() {
        assert_eq!(output("{@ a = 1 + 2 @}{: a :}"), "3");
        assert_eq!(output("hello {: \"world\" :}!"), "hello world!");
        assert_eq!(output("{: 1 + 1.2 :}"), "2.2");
        assert_eq!(output("{: 2 * 2 / 4 % 2 :}"), "1");
    }

    #[test]
    fn functions_return_values() {
        assert_eq!(output("{@ def f(): return 1 end @}{: f() :}"), "1");
        assert_eq!(output("{@ def add(a, b): return a + b end @}{: add(2, 3) :}"), "5");
        assert_eq!(output("{@ def f(): end @}{: f() :}"), "nil");
    }

    #[test]
    fn recursion() {
        let src = "{@
def fact(n):
    if n <= 1: return 1 end
    return n * fact(n - 1)
end
@}{: fact(10) :}";
        assert_eq!(output(src), "3628800");
    }

    #[test]
    fn for_loop_forms() {
        assert_eq!(output("{@ for i=0;i<2;i+=1: puts(i) end @}"), "0\n1\n");
        assert_eq!(output("{@ for i = 0; i < 4; i += 1: end @}{: i :}"), "4");
        assert_eq!(output("{@ i = 0 for i < 3: i += 1 end @}{: i :}"), "3");
        assert_eq!(output("{@ i = 0 for: i += 1 if i == 5: break end end @}{: i :}"), "5");
    }

    #[test]
    fn continue_runs_update() {
        let src = "{@ for i = 0; i < 5; i += 1: if i % 2 == 0: continue end puts(i) end @}";
        assert_eq!(output(src), "1\n3\n");
    }

    #[test]
    fn if_elif_else_with_text() {
        let src = "{@ x = 2 @}{@ if x == 1: @}one{@ elif x == 2: @}two{@ else: @}many{@ end @}";
        assert_eq!(output(src), "two");
    }

    #[test]
    fn and_or_return_operands() {
        assert_eq!(output("{: 0 or \"x\" :}"), "x");
        assert_eq!(output("{: 1 and 2 :}"), "2");
        assert_eq!(output("{: nil and undefined_name :}"), "nil");
        assert_eq!(output("{: not [] :}"), "false");
    }

    #[test]
    fn scalar_alias_law() {
        let src = "{@ a = 1 b = a same = id(a) == id(b) a += 1 @}{: same :},{: id(a) == id(b) :},{: b :}";
        assert_eq!(output(src), "true,false,1");
    }

    #[test]
    fn reference_law() {
        let src = "{@ a = [1] b = a b.push(2) @}{: len(a) :},{: id(a) == id(b) :}";
        assert_eq!(output(src), "2,true");
    }

    #[test]
    fn element_update_round_trip() {
        let src = "{@ a = [1, 2] a[0] = a[0] + 1 @}{: a[0] :},{: len(a) :}";
        assert_eq!(output(src), "2,2");
        assert_eq!(output("{@ d = {\"k\": 1} d[\"k\"] += 4 @}{: d[\"k\"] :}"), "5");
        assert_eq!(output("{@ a = [1, 2, 3] @}{: a[-1] :}{: \"abc\"[1] :}"), "3b");
    }

    #[test]
    fn multi_assign() {
        assert_eq!(output("{@ a, b = 1, 2 @}{: a :}{: b :}"), "12");
        assert_eq!(output("{@ a, b = [3, 4] @}{: a :}{: b :}"), "34");
        assert_eq!(output("{@ a = b = 5 @}{: a :}{: b :}"), "55");
        assert_eq!(output("{@ a = 1, 2 @}{: len(a) :}"), "2");
        assert_eq!(error("{@ a, b = [1] @}"), "can't assign 1 values to 2 targets");
    }

    #[test]
    fn undefined_names() {
        assert_eq!(error("{@ x += 1 @}"), "\"x\" is not defined");
        assert_eq!(error("{: x :}"), "\"x\" is not defined in ref block");
        assert_eq!(error("{@ y = x @}"), "\"x\" is not defined");
    }

    #[test]
    fn augmented_assign_reads_globals_writes_locals() {
        let src = "{@ n = 10
def f():
    n += 1
    return n
end
@}{: f() :},{: n :}";
        assert_eq!(output(src), "11,10");
    }

    #[test]
    fn no_closure_capture() {
        let src = "{@
def outer():
    x = 1
    def inner():
        return x
    end
    return inner()
end
outer()
@}";
        assert_eq!(error(src), "\"x\" is not defined");
    }

    #[test]
    fn arithmetic_errors() {
        assert_eq!(error("{@ 4 / 0 @}"), "zero division error");
        assert_eq!(error("{@ 1 + \"a\" @}"), "can't add int with string");
        assert_eq!(error("{@ [] < 1 @}"), "can't compare lt array with int");
        assert_eq!(error("{@ a = [1] a[3] @}"), "index out of range");
        assert_eq!(error("{@ d = {} d[\"z\"] @}"), "not found key \"z\"");
    }

    #[test]
    fn stray_control_flow() {
        assert_eq!(error("{@ break @}"), "invalid break statement. not in loop");
        assert_eq!(error("{@ def f(): continue end f() @}"), "invalid continue statement. not in loop");
        assert_eq!(error("{@ return 1 @}"), "invalid return statement. not in function");
    }

    #[test]
    fn arity_is_checked() {
        assert_eq!(
            error("{@ def f(a): end f() @}"),
            "invalid arguments length. \"f\" takes 1 arguments but 0 given"
        );
    }

    #[test]
    fn block_inject_super() {
        let src = "{@
def f():
    block c:
        puts(1)
    end
end
def g() extends f:
    inject c:
        puts(2)
    end
    super()
end
g()
@}";
        assert_eq!(output(src), "2\n");
    }

    #[test]
    fn block_runs_default_without_inject() {
        let src = "{@ def f(): block c: puts(1) end end f() @}";
        assert_eq!(output(src), "1\n");
    }

    #[test]
    fn inject_sees_injecting_locals() {
        let src = "{@
def base():
    block body: puts(\"base\") end
end
def page() extends base:
    title = \"page\"
    inject body: puts(title) end
    super()
end
page()
@}";
        assert_eq!(output(src), "page\n");
    }

    #[test]
    fn most_derived_inject_wins_across_three_levels() {
        let src = "{@
def a():
    block x: puts(\"a\") end
    block y: puts(\"a-y\") end
end
def b() extends a:
    inject x: puts(\"b\") end
    inject y: puts(\"b-y\") end
    super()
end
def c() extends b:
    inject x: puts(\"c\") end
    super()
end
c()
@}";
        assert_eq!(output(src), "c\nb-y\n");
    }

    #[test]
    fn nested_blocks_are_overridable() {
        let src = "{@
def base():
    block outer:
        puts(\"o1\")
        block inner: puts(\"i\") end
        puts(\"o2\")
    end
end
def d() extends base:
    inject inner: puts(\"I\") end
    super()
end
d()
@}";
        assert_eq!(output(src), "o1\nI\no2\n");
    }

    #[test]
    fn super_passes_arguments() {
        let src = "{@
def base(n): puts(n) end
def d(n) extends base: super(n + 1) end
d(1)
@}";
        assert_eq!(output(src), "2\n");
    }

    #[test]
    fn inheritance_errors() {
        assert_eq!(error("{@ inject x: end @}"), "inject statement needs function");
        assert_eq!(error("{@ super() @}"), "invalid super call. not in function");
        assert_eq!(error("{@ def f(): super() end f() @}"), "invalid super call. \"f\" has no extends");
        assert_eq!(error("{@ def f() extends g: super() end f() @}"), "can't extends. \"g\" is not defined");
        let src = "{@ def a(): end def b() extends a: inject z: end super() end b() @}";
        assert_eq!(error(src), "not found \"z\" block");
        assert_eq!(error("{@ f = 1 def g() extends f: super() end g() @}"), "can't extends. \"f\" is not a function");
        assert_eq!(error("{@ def g(): x = super end g() @}"), "invalid super usage. super needs call");
    }

    #[test]
    fn struct_instances_have_independent_fields() {
        let src = "{@
struct P:
    x = 1
    y = 2
end
a = P()
b = P()
a.x = 5
P.y = 9
c = P(7)
@}{: a.x :},{: b.x :},{: b.y :},{: c.x :},{: c.y :}";
        assert_eq!(output(src), "5,1,2,7,2");
    }

    #[test]
    fn struct_methods() {
        let src = "{@
struct Counter:
    n = 0
    met inc(self, by):
        self.n += by
        return self
    end
    def make(): return Counter() end
end
c = Counter.make()
c.inc(2).inc(3)
Counter.inc(c, 1)
@}{: c.n :}";
        assert_eq!(output(src), "6");
    }

    #[test]
    fn struct_construction_tolerates_extra_args() {
        assert_eq!(output("{@ struct S: a = 1 end s = S(1, 2, 3) @}{: s.a :}"), "1");
        assert_eq!(output("{@ struct S: a = 1 end @}{: type(S()) == S :}"), "true");
    }

    #[test]
    fn builtin_methods_and_types() {
        assert_eq!(output("{: \"Hello-World\".snake() :}"), "hello_world");
        assert_eq!(output("{: \"a b\".split(\" \")[1].upper() :}"), "B");
        assert_eq!(output("{: type(1) == Int :}{: Int(\"7\") + 1 :}"), "true8");
        assert_eq!(output("{: cast(\"2.5\", Float) :}"), "2.5");
    }

    #[test]
    fn puts_and_eputs() {
        let (ctx, result) = run("{@ n = puts(1, \"a\", nil) eputs(\"oops\") @}{: n :}");
        assert!(result.is_ok());
        assert_eq!(ctx.stdout_buf(), "1 a nil\n3");
        assert_eq!(ctx.stderr_buf(), "oops\n");
    }

    #[test]
    fn partial_output_survives_errors() {
        let (ctx, result) = run("before{@ puts(1) x = 1 / 0 @}after");
        assert!(result.is_err());
        assert_eq!(ctx.stdout_buf(), "before1\n");
    }

    #[test]
    fn extract_copies_fields() {
        assert_eq!(output("{@ struct S: a = 1 b = 2 end extract(S) @}{: a + b :}"), "3");
    }

    #[test]
    fn getattr_setattr() {
        let src = "{@ struct S: a = 1 end s = S() setattr(s, \"b\", 2) @}{: getattr(s, \"b\") :}{: getattr(s, \"z\") :}";
        assert_eq!(output(src), "2nil");
    }

    #[test]
    fn dance_runs_in_fresh_context() {
        let src = "{@ r = dance(\"{: x * 2 :}{@ puts(1) @}\", {\"x\": 4}) @}{: r[0] :}|{: r[1] :}";
        assert_eq!(output(src), "81\n|nil");
        let src = "{@ r = dance(\"{: nope :}\") @}{: r[1] :}";
        assert_eq!(output(src), "\"nope\" is not defined in ref block");
    }

    #[test]
    fn alias_and_opts_modules() {
        let mut ctx = Context::new();
        ctx.set_args(&["prog", "--name", "pad", "file.txt"]);
        let importer = Importer::default();
        let src = "{@ alias.set(\"ll\", \"ls -l\", \"long\") @}{: opts.get(\"name\") :},{: opts.has(\"x\") :},{: opts.args(1) :}";
        let program = parser::parse(src).unwrap();
        Interpreter::new(&mut ctx, &importer).run(&program).unwrap();
        assert_eq!(ctx.stdout_buf(), "pad,false,file.txt");
        let alias = ctx.alias("ll").unwrap();
        assert_eq!(alias.value, "ls -l");
        assert_eq!(alias.desc.as_deref(), Some("long"));
    }

    #[test]
    fn trace_records_call_boundaries() {
        let src = "{@\ndef f():\n    return 1 / 0\nend\nf()\n@}";
        let err = run(src).1.unwrap_err();
        let funcs: Vec<_> = err.trace.iter().map(|t| t.func.as_str()).collect();
        assert_eq!(funcs, vec!["f", "<main>"]);
        assert_eq!(err.trace[0].line, 3);
        assert_eq!(err.trace[1].line, 5);
    }

    #[test]
    fn recursion_depth_is_capped() {
        assert_eq!(error("{@ def f(): return f() end f() @}"), "reached maximum recursion depth");
    }

    #[test]
    fn deep_recursion_below_the_cap() {
        let src = "{@ def f(n): if n == 0: return 0 end return f(n - 1) end @}{: f(900) :}";
        assert_eq!(output(src), "0");
    }

    #[test]
    fn exit_unwinds_with_status() {
        let (ctx, result) = run("a{@ def f(): exit(4) end f() @}b");
        assert_eq!(result.unwrap_err().exit_code(), Some(4));
        assert_eq!(ctx.stdout_buf(), "a");
        assert_eq!(error("{@ exit() @}"), "invalid arguments length for exit");
        assert_eq!(error("{@ exit(\"1\") @}"), "invalid exit code type for exit");
    }

    #[test]
    fn die_writes_stderr_first() {
        let (ctx, result) = run("{@ die(\"no\", 1) @}");
        assert_eq!(result.unwrap_err().exit_code(), Some(1));
        assert_eq!(ctx.stderr_buf(), "no 1\n");
    }

    #[test]
    fn exit_inside_dance_forwards_output() {
        let (ctx, result) = run("{@ r = dance(\"x{@ eputs(1) exit(2) @}\") @}never");
        assert_eq!(result.unwrap_err().exit_code(), Some(2));
        assert_eq!(ctx.stdout_buf(), "x");
        assert_eq!(ctx.stderr_buf(), "1\n");
    }

    #[test]
    fn imports_bind_module_and_names() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lib.pad"), "{@ def twice(x): return x * 2 end\nk = 3 @}").unwrap();
        let main = dir.path().join("main.pad");
        let src = "{@ import \"lib.pad\" as lib\nfrom \"lib.pad\" import k, twice as t\n@}{: lib.twice(k) :},{: t(1) :}";
        let mut ctx = Context::new();
        let importer = Importer::default();
        let program = parser::parse(src).unwrap();
        Interpreter::new(&mut ctx, &importer).with_file(main.to_str()).run(&program).unwrap();
        assert_eq!(ctx.stdout_buf(), "6,2");
        assert_eq!(ctx.imports.len(), 1);
    }

    #[test]
    fn missing_import() {
        assert_eq!(error("{@ import \"nope.pad\" as n\n@}"), "\"nope.pad\" is not found");
    }
}

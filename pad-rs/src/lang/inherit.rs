//! `extends`, `super()` and `block`/`inject` resolution.
//!
//! A derived function registers its `inject` bodies in the current frame,
//! then `super()` hands that table to the parent call.  When a `block`
//! statement runs, the most-derived registered body replaces the default
//! one and executes in the scope of the function that injected it.
//! Resolution is by name only; there is no inheritance of locals.

use std::rc::Rc;

use tracing::trace;

use super::ast::{BlockStmt, Expr, InjectStmt};
use super::error::Result;
use super::eval::{Flow, Frame, Injection, Interpreter, MAX_DEPTH};
use super::token::Pos;
use super::value::{Object, Value};

impl Interpreter<'_> {
    pub(super) fn exec_block_stmt(&mut self, block: &BlockStmt) -> Flow {
        let Some(inj) = self.frame.injects.get(&block.name).cloned() else {
            return self.exec_block(&block.body);
        };
        trace!(block = %block.name, from = %inj.name, "running injected body");
        let frame = Frame {
            locals: inj.locals,
            globals: inj.globals,
            func: inj.func,
            name: inj.name,
            injects: self.frame.injects.clone(),
            file: inj.file,
        };
        let stmt = inj.stmt;
        self.enter(frame, block.pos, |me| me.exec_block(&stmt.body))
    }

    pub(super) fn register_inject(&mut self, stmt: &Rc<InjectStmt>) -> Result<()> {
        let Some(func) = self.frame.func.clone() else {
            return Err(self.error("inject statement needs function", Some(stmt.pos)));
        };
        if !self.ancestor_declares(&func, &stmt.name, stmt.pos)? {
            return Err(self.error(format!("not found \"{}\" block", stmt.name), Some(stmt.pos)));
        }
        if self.frame.injects.contains_key(&stmt.name) {
            trace!(block = %stmt.name, "inject overridden by derived function");
            return Ok(());
        }
        let entry = Injection {
            stmt: stmt.clone(),
            locals: self.frame.locals.clone(),
            globals: self.frame.globals.clone(),
            func: Some(func),
            name: self.frame.name.clone(),
            file: self.frame.file.clone(),
        };
        self.frame.injects.insert(stmt.name.clone(), entry);
        Ok(())
    }

    /// Whether any function up the `extends` chain of `func` declares
    /// `block`.
    fn ancestor_declares(&self, func: &Value, block: &str, pos: Pos) -> Result<bool> {
        let mut cur = func.clone();
        for _ in 0..MAX_DEPTH {
            match &*cur {
                Object::Func(f) if f.def.extends.is_some() => {}
                _ => return Ok(false),
            }
            let parent = self.parent_of(&cur, pos)?;
            if let Object::Func(p) = &*parent {
                if p.def.blocks.iter().any(|b| b == block) {
                    return Ok(true);
                }
            }
            cur = parent;
        }
        Ok(false)
    }

    /// Resolve the `extends` target of `func` in its defining module.
    fn parent_of(&self, func: &Value, pos: Pos) -> Result<Value> {
        let Object::Func(f) = &**func else {
            return Err(self.error("invalid super call. not in function", Some(pos)));
        };
        let Some(name) = &f.def.extends else {
            return Err(self.error(format!("invalid super call. \"{}\" has no extends", f.def.name), Some(pos)));
        };
        let found = f.globals.borrow().get(name).cloned();
        match found {
            Some(v) if matches!(&*v, Object::Func(_)) => Ok(v),
            Some(_) => Err(self.error(format!("can't extends. \"{name}\" is not a function"), Some(pos))),
            None => Err(self.error(format!("can't extends. \"{name}\" is not defined"), Some(pos))),
        }
    }

    pub(super) fn call_super(&mut self, args: &[Expr], pos: Pos) -> Result<Value> {
        let args = self.eval_args(args)?;
        let Some(func) = self.frame.func.clone() else {
            return Err(self.error("invalid super call. not in function", Some(pos)));
        };
        let parent = self.parent_of(&func, pos)?;
        trace!(from = %self.frame.name, injects = self.frame.injects.len(), "super");
        let injects = self.frame.injects.clone();
        self.call_function(&parent, args, pos, injects)
    }
}

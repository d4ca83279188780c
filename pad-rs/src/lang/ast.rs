//! Syntax tree produced by the [parser](super::parser).
//!
//! Template blocks are flattened into a statement list: literal text and
//! reference blocks become [`Stmt::Text`] and [`Stmt::Ref`], so bodies of
//! `if`/`for`/`def` can interleave code and template text freely.
//!
//! Each binary precedence level stores its first operand followed by an
//! ordered list of `(operator, operand)` pairs, which the evaluator folds
//! left to right.

use std::rc::Rc;

use super::token::Pos;

// ── Program ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub stmts: Vec<Stmt>,
}

// ── Statements ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Literal template text.
    Text(String),
    /// `{: formula :}`; the stringified value is written to output.
    Ref(Formula, Pos),
    /// A formula evaluated for its side effects.
    Formula(Formula, Pos),
    If(IfStmt),
    For(ForStmt),
    Break(Pos),
    Continue(Pos),
    Return(Option<Formula>, Pos),
    Import(ImportStmt),
    FuncDef(Rc<FuncDef>),
    StructDef(Rc<StructDef>),
    Block(BlockStmt),
    Inject(Rc<InjectStmt>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    /// `if` followed by each `elif`, in order.
    pub branches: Vec<(Expr, Vec<Stmt>)>,
    pub else_body: Option<Vec<Stmt>>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    pub init: Option<Formula>,
    pub cond: Option<Formula>,
    pub update: Option<Formula>,
    pub body: Vec<Stmt>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportStmt {
    /// `import "path" as alias`
    As { path: String, alias: String, pos: Pos },
    /// `from "path" import a, b as c`
    From { path: String, names: Vec<ImportName>, pos: Pos },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportName {
    pub name: String,
    pub alias: Option<String>,
}

impl ImportName {
    /// Name bound in the importing scope.
    pub fn bound_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncDef {
    pub name: String,
    pub params: Vec<String>,
    pub extends: Option<String>,
    pub body: Vec<Stmt>,
    /// `met` rather than `def`: the first parameter receives the instance.
    pub is_met: bool,
    /// Names of every `block` declared in the body, nested ones included.
    pub blocks: Vec<String>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDef {
    pub name: String,
    pub body: Vec<Stmt>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockStmt {
    pub name: String,
    pub body: Vec<Stmt>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InjectStmt {
    pub name: String,
    pub body: Vec<Stmt>,
    pub pos: Pos,
}

// ── Formula ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Formula {
    /// `a = b = 1, c = 2`: each chain lists its targets followed by the value.
    AssignList(Vec<Vec<Expr>>),
    /// `a, b = 1, 2`: the last test list is the value; a single list with no
    /// `=` is a plain expression (or an array when it has several items).
    MultiAssign(Vec<Vec<Expr>>),
}

// ── Expressions ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithOp {
    pub fn verb(self) -> &'static str {
        match self {
            ArithOp::Add => "add",
            ArithOp::Sub => "sub",
            ArithOp::Mul => "mul",
            ArithOp::Div => "division",
            ArithOp::Mod => "mod",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompOp {
    pub fn name(self) -> &'static str {
        match self {
            CompOp::Eq => "eq",
            CompOp::Ne => "not eq",
            CompOp::Lt => "lt",
            CompOp::Le => "lte",
            CompOp::Gt => "gt",
            CompOp::Ge => "gte",
        }
    }
}

/// One postfix operation of a ring (chain) expression.
#[derive(Debug, Clone, PartialEq)]
pub enum RingOp {
    Attr(String, Pos),
    Call(Vec<Expr>, Pos),
    Index(Box<Expr>, Pos),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String, Pos),
    Array(Vec<Expr>, Pos),
    Dict(Vec<(Expr, Expr)>, Pos),
    /// The `super` keyword; only meaningful as `super(...)`.
    Super(Pos),
    /// `head.attr(args)[index]...`
    Ring { head: Box<Expr>, ops: Vec<RingOp> },
    Negative(Box<Expr>, Pos),
    /// `expr` and `term` levels.
    Arith { first: Box<Expr>, rest: Vec<(ArithOp, Expr, Pos)> },
    /// Augmented assignment: `target op= value`.
    AssCalc { target: Box<Expr>, rest: Vec<(ArithOp, Expr, Pos)> },
    Comparison { first: Box<Expr>, rest: Vec<(CompOp, Expr, Pos)> },
    Not(Box<Expr>, Pos),
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

impl Expr {
    /// Best-effort source position for error reporting.
    pub fn pos(&self) -> Option<Pos> {
        match self {
            Expr::Ident(_, p)
            | Expr::Array(_, p)
            | Expr::Dict(_, p)
            | Expr::Super(p)
            | Expr::Negative(_, p)
            | Expr::Not(_, p) => Some(*p),
            Expr::Ring { head, .. } => head.pos(),
            Expr::Arith { first, .. } | Expr::Comparison { first, .. } => first.pos(),
            Expr::AssCalc { target, .. } => target.pos(),
            Expr::And(v) | Expr::Or(v) => v.first().and_then(Expr::pos),
            _ => None,
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Collect the names of all `block` statements in `body`, descending into
/// control flow and nested blocks but not into nested definitions.
pub fn collect_blocks(body: &[Stmt], out: &mut Vec<String>) {
    for stmt in body {
        match stmt {
            Stmt::Block(b) => {
                if !out.contains(&b.name) {
                    out.push(b.name.clone());
                }
                collect_blocks(&b.body, out);
            }
            Stmt::If(s) => {
                for (_, body) in &s.branches {
                    collect_blocks(body, out);
                }
                if let Some(body) = &s.else_body {
                    collect_blocks(body, out);
                }
            }
            Stmt::For(s) => collect_blocks(&s.body, out),
            Stmt::Inject(s) => collect_blocks(&s.body, out),
            _ => {}
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn block(name: &str, body: Vec<Stmt>) -> Stmt {
        Stmt::Block(BlockStmt { name: name.into(), body, pos: Pos::default() })
    }

    #[test]
    fn collect_blocks_descends_into_nested_blocks() {
        let body = vec![
            block("head", vec![block("title", vec![])]),
            Stmt::For(ForStmt {
                init: None,
                cond: None,
                update: None,
                body: vec![block("row", vec![])],
                pos: Pos::default(),
            }),
        ];
        let mut names = Vec::new();
        collect_blocks(&body, &mut names);
        assert_eq!(names, vec!["head", "title", "row"]);
    }

    #[test]
    fn import_name_prefers_alias() {
        let n = ImportName { name: "a".into(), alias: Some("b".into()) };
        assert_eq!(n.bound_name(), "b");
    }
}

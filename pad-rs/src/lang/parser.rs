//! Recursive-descent parser: token stream → [`Program`].
//!
//! Precedence (lowest → highest):
//!   formula  →  or  →  and  →  not  →  comparison  →  asscalc  →
//!   additive  →  multiplicative  →  negative  →  ring  →  factor  →  atom
//!
//! Statement bodies use the content grammar
//! `( '@}' blocks '{@' | elems )*`, which lets literal text and reference
//! blocks appear inside control flow.  Errors stop parsing and carry a
//! message naming the construct and the missing piece.

use std::rc::Rc;

use tracing::trace;

use super::ast::*;
use super::error::{Error, Result};
use super::lexer::tokenize;
use super::token::{Pos, Token, TokenKind};

// ── Public API ────────────────────────────────────────────────────────────────

/// Parse a token stream into a [`Program`].
pub fn compile(tokens: Vec<Token>) -> Result<Program> {
    let mut p = Parser::new(tokens);
    let program = p.program()?;
    trace!(stmts = program.stmts.len(), "compiled program");
    Ok(program)
}

/// Tokenize and parse `src` in one step.
pub fn parse(src: &str) -> Result<Program> {
    compile(tokenize(src)?)
}

// ── Parser ────────────────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.peek() == Some(kind)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn starts_expr(&self) -> bool {
        self.peek().is_some_and(TokenKind::starts_expr)
    }

    /// Position of the current token, or of the end of input.
    fn here(&self) -> Pos {
        match self.tokens.get(self.pos).or_else(|| self.tokens.last()) {
            Some(t) => t.pos,
            None => Pos::new(0, 1),
        }
    }

    fn err(&self, msg: impl Into<String>) -> Error {
        Error::parse(msg, self.here())
    }

    fn skip_newlines(&mut self) {
        while self.eat(&TokenKind::Newline) {}
    }

    fn ident(&mut self) -> Option<String> {
        if let Some(TokenKind::Ident(name)) = self.peek() {
            let name = name.clone();
            self.pos += 1;
            Some(name)
        } else {
            None
        }
    }

    fn token_desc(&self) -> String {
        match self.peek() {
            Some(k) => format!("\"{k}\""),
            None => "EOF".into(),
        }
    }

    // ── Blocks ────────────────────────────────────────────────────────────────

    fn program(&mut self) -> Result<Program> {
        let mut stmts = Vec::new();
        while let Some(kind) = self.peek() {
            match kind {
                TokenKind::Text(s) => {
                    stmts.push(Stmt::Text(s.clone()));
                    self.pos += 1;
                }
                TokenKind::RefOpen => stmts.push(self.ref_block()?),
                TokenKind::CodeOpen => {
                    self.pos += 1;
                    self.code_block(&mut stmts)?;
                }
                _ => {
                    return Err(self.err(format!("syntax error. invalid token {} in blocks", self.token_desc())))
                }
            }
        }
        Ok(Program { stmts })
    }

    /// Elements of a `{@ ... @}` block; the opening delimiter is consumed.
    fn code_block(&mut self, out: &mut Vec<Stmt>) -> Result<()> {
        loop {
            self.skip_newlines();
            match self.peek() {
                None => return Err(self.err("syntax error. reached EOF in code block")),
                Some(TokenKind::CodeClose) => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(_) => out.push(self.elem()?),
            }
        }
    }

    fn ref_block(&mut self) -> Result<Stmt> {
        let pos = self.here();
        self.pos += 1; // {:
        self.skip_newlines();
        if !self.starts_expr() {
            return Err(self.err("syntax error. not found formula in reference block"));
        }
        let formula = self.formula()?;
        self.skip_newlines();
        match self.peek() {
            None => Err(self.err("syntax error. reached EOF in reference block")),
            Some(TokenKind::RefClose) => {
                self.pos += 1;
                Ok(Stmt::Ref(formula, pos))
            }
            Some(_) => Err(self.err("syntax error. not found \":}\"")),
        }
    }

    /// Statement body up to (not including) one of `terminators`.
    fn content(&mut self, terminators: &[TokenKind]) -> Result<Vec<Stmt>> {
        let mut body = Vec::new();
        loop {
            self.skip_newlines();
            match self.peek() {
                None => break,
                Some(k) if terminators.contains(k) => break,
                Some(TokenKind::CodeClose) => {
                    self.pos += 1;
                    self.template_blocks(&mut body)?;
                }
                Some(_) => body.push(self.elem()?),
            }
        }
        Ok(body)
    }

    /// Text and reference blocks between `@}` and the next `{@`.
    fn template_blocks(&mut self, out: &mut Vec<Stmt>) -> Result<()> {
        loop {
            match self.peek() {
                None => return Ok(()),
                Some(TokenKind::CodeOpen) => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(TokenKind::Text(s)) => {
                    out.push(Stmt::Text(s.clone()));
                    self.pos += 1;
                }
                Some(TokenKind::RefOpen) => out.push(self.ref_block()?),
                Some(_) => {
                    return Err(self.err(format!("syntax error. invalid token {} in blocks", self.token_desc())))
                }
            }
        }
    }

    // ── Statements ────────────────────────────────────────────────────────────

    fn elem(&mut self) -> Result<Stmt> {
        let pos = self.here();
        match self.peek() {
            Some(TokenKind::If) => self.if_stmt(),
            Some(TokenKind::For) => self.for_stmt(),
            Some(TokenKind::Def | TokenKind::Met) => self.func_def(),
            Some(TokenKind::Struct) => self.struct_def(),
            Some(TokenKind::Block) => self.block_stmt(),
            Some(TokenKind::Inject) => self.inject_stmt(),
            Some(TokenKind::Import) => self.import_as_stmt(),
            Some(TokenKind::From) => self.from_import_stmt(),
            Some(TokenKind::Return) => {
                self.pos += 1;
                let value = if self.starts_expr() { Some(self.formula()?) } else { None };
                Ok(Stmt::Return(value, pos))
            }
            Some(TokenKind::Break) => {
                self.pos += 1;
                Ok(Stmt::Break(pos))
            }
            Some(TokenKind::Continue) => {
                self.pos += 1;
                Ok(Stmt::Continue(pos))
            }
            Some(k) if k.starts_expr() => Ok(Stmt::Formula(self.formula()?, pos)),
            _ => Err(self.err(format!("syntax error. invalid token {} in code block", self.token_desc()))),
        }
    }

    fn if_stmt(&mut self) -> Result<Stmt> {
        let pos = self.here();
        self.pos += 1; // if
        let mut branches = Vec::new();
        if !self.starts_expr() {
            return Err(self.err("syntax error. not found test in if statement"));
        }
        let cond = self.test()?;
        if !self.eat(&TokenKind::Colon) {
            return Err(self.err("syntax error. not found colon in if statement"));
        }
        let body = self.content(&[TokenKind::Elif, TokenKind::Else, TokenKind::End])?;
        branches.push((cond, body));

        let mut else_body = None;
        loop {
            match self.peek() {
                Some(TokenKind::Elif) => {
                    self.pos += 1;
                    if !self.starts_expr() {
                        return Err(self.err("syntax error. not found test in elif statement"));
                    }
                    let cond = self.test()?;
                    if !self.eat(&TokenKind::Colon) {
                        return Err(self.err("syntax error. not found colon in elif statement"));
                    }
                    let body = self.content(&[TokenKind::Elif, TokenKind::Else, TokenKind::End])?;
                    branches.push((cond, body));
                }
                Some(TokenKind::Else) => {
                    self.pos += 1;
                    if !self.eat(&TokenKind::Colon) {
                        return Err(self.err("syntax error. not found colon in else statement"));
                    }
                    else_body = Some(self.content(&[TokenKind::End])?);
                    if !self.eat(&TokenKind::End) {
                        return Err(self.err("syntax error. not found 'end' in if statement"));
                    }
                    break;
                }
                Some(TokenKind::End) => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(self.err("syntax error. not found 'end' in if statement")),
            }
        }
        Ok(Stmt::If(IfStmt { branches, else_body, pos }))
    }

    fn for_stmt(&mut self) -> Result<Stmt> {
        let pos = self.here();
        self.pos += 1; // for
        let (mut init, mut cond, mut update) = (None, None, None);

        if !self.eat(&TokenKind::Colon) {
            let first = if self.at(&TokenKind::Semicolon) { None } else { Some(self.formula()?) };
            if first.is_some() && self.eat(&TokenKind::Colon) {
                cond = first;
            } else if self.eat(&TokenKind::Semicolon) {
                init = first;
                if !self.at(&TokenKind::Semicolon) {
                    cond = Some(self.formula()?);
                }
                if !self.eat(&TokenKind::Semicolon) {
                    return Err(self.err("syntax error. not found semicolon (2)"));
                }
                if !self.at(&TokenKind::Colon) {
                    update = Some(self.formula()?);
                }
                if !self.eat(&TokenKind::Colon) {
                    return Err(self.err("syntax error. not found colon in for statement"));
                }
            } else {
                return Err(self.err("syntax error. not found colon in for statement"));
            }
        }

        let body = self.content(&[TokenKind::End])?;
        if !self.eat(&TokenKind::End) {
            return Err(self.err("syntax error. not found 'end' in for statement"));
        }
        Ok(Stmt::For(ForStmt { init, cond, update, body, pos }))
    }

    fn func_def(&mut self) -> Result<Stmt> {
        let pos = self.here();
        let is_met = self.at(&TokenKind::Met);
        self.pos += 1; // def / met
        let Some(name) = self.ident() else {
            return Err(self.err("syntax error. not found identifier in func def"));
        };

        let mut params = Vec::new();
        if self.eat(&TokenKind::LParen) {
            loop {
                self.skip_newlines();
                if self.eat(&TokenKind::RParen) {
                    break;
                }
                let Some(param) = self.ident() else {
                    return Err(self.err("syntax error. not found identifier in func def args"));
                };
                params.push(param);
                self.skip_newlines();
                if self.eat(&TokenKind::Comma) {
                    continue;
                }
                if self.eat(&TokenKind::RParen) {
                    break;
                }
                return Err(self.err("syntax error. not found ')' in func def params"));
            }
        }

        let extends = if self.eat(&TokenKind::Extends) {
            match self.ident() {
                Some(base) => Some(base),
                None => return Err(self.err("not found identifier in function extends")),
            }
        } else {
            None
        };

        if !self.eat(&TokenKind::Colon) {
            return Err(self.err("not found colon"));
        }
        let body = self.content(&[TokenKind::End])?;
        if !self.eat(&TokenKind::End) {
            return Err(self.err("not found 'end' in parse func def"));
        }

        let mut blocks = Vec::new();
        collect_blocks(&body, &mut blocks);
        trace!(%name, ?extends, ?blocks, "func def");
        Ok(Stmt::FuncDef(Rc::new(FuncDef { name, params, extends, body, is_met, blocks, pos })))
    }

    fn struct_def(&mut self) -> Result<Stmt> {
        let pos = self.here();
        self.pos += 1; // struct
        let Some(name) = self.ident() else {
            return Err(self.err("syntax error. not found identifier in struct"));
        };
        if !self.eat(&TokenKind::Colon) {
            return Err(self.err("syntax error. not found colon in struct"));
        }
        let body = self.content(&[TokenKind::End])?;
        if !self.eat(&TokenKind::End) {
            return Err(self.err("syntax error. not found 'end' in struct"));
        }
        Ok(Stmt::StructDef(Rc::new(StructDef { name, body, pos })))
    }

    fn block_stmt(&mut self) -> Result<Stmt> {
        let pos = self.here();
        self.pos += 1; // block
        let Some(name) = self.ident() else {
            return Err(self.err("syntax error. not found identifier in block statement"));
        };
        if !self.eat(&TokenKind::Colon) {
            return Err(self.err("syntax error. not found colon in block statement"));
        }
        let body = self.content(&[TokenKind::End])?;
        if !self.eat(&TokenKind::End) {
            return Err(self.err("syntax error. not found 'end' in block statement"));
        }
        Ok(Stmt::Block(BlockStmt { name, body, pos }))
    }

    fn inject_stmt(&mut self) -> Result<Stmt> {
        let pos = self.here();
        self.pos += 1; // inject
        let Some(name) = self.ident() else {
            return Err(self.err("syntax error. not found identifier in inject statement"));
        };
        if !self.eat(&TokenKind::Colon) {
            return Err(self.err("syntax error. not found colon in inject statement"));
        }
        let body = self.content(&[TokenKind::End])?;
        if !self.eat(&TokenKind::End) {
            return Err(self.err("syntax error. not found 'end' in inject statement"));
        }
        Ok(Stmt::Inject(Rc::new(InjectStmt { name, body, pos })))
    }

    fn path_literal(&mut self) -> Option<String> {
        if let Some(TokenKind::Str(s)) = self.peek() {
            let s = s.clone();
            self.pos += 1;
            Some(s)
        } else {
            None
        }
    }

    fn import_as_stmt(&mut self) -> Result<Stmt> {
        let pos = self.here();
        self.pos += 1; // import
        let Some(path) = self.path_literal() else {
            return Err(self.err("syntax error. not found path in compile import as statement"));
        };
        if !self.eat(&TokenKind::As) {
            return Err(self.err("syntax error. not found keyword 'as' in compile import as statement"));
        }
        let Some(alias) = self.ident() else {
            return Err(self.err("syntax error. not found alias in compile import as statement"));
        };
        self.import_tail()?;
        Ok(Stmt::Import(ImportStmt::As { path, alias, pos }))
    }

    fn from_import_stmt(&mut self) -> Result<Stmt> {
        let pos = self.here();
        self.pos += 1; // from
        let Some(path) = self.path_literal() else {
            return Err(self.err("syntax error. not found path in compile from import statement"));
        };
        if !self.eat(&TokenKind::Import) {
            return Err(self.err("syntax error. not found import in compile from import statement"));
        }

        let mut names = Vec::new();
        if self.eat(&TokenKind::LParen) {
            loop {
                self.skip_newlines();
                if self.eat(&TokenKind::RParen) {
                    break;
                }
                names.push(self.import_name()?);
                self.skip_newlines();
                if self.eat(&TokenKind::Comma) {
                    continue;
                }
                if self.eat(&TokenKind::RParen) {
                    break;
                }
                return Err(self.err(format!(
                    "syntax error. invalid token {} in compile import variables",
                    self.token_desc()
                )));
            }
        } else {
            names.push(self.import_name()?);
            while self.eat(&TokenKind::Comma) {
                names.push(self.import_name()?);
            }
        }
        if names.is_empty() {
            return Err(self.err("syntax error. not found import variables in compile from import statement"));
        }
        self.import_tail()?;
        Ok(Stmt::Import(ImportStmt::From { path, names, pos }))
    }

    fn import_name(&mut self) -> Result<ImportName> {
        let Some(name) = self.ident() else {
            return Err(self.err(format!(
                "syntax error. invalid token {} in compile import variables",
                self.token_desc()
            )));
        };
        let alias = if self.eat(&TokenKind::As) {
            match self.ident() {
                Some(a) => Some(a),
                None => return Err(self.err("syntax error. not found alias in compile import variables")),
            }
        } else {
            None
        };
        Ok(ImportName { name, alias })
    }

    /// Import statements end at a newline, `@}` or end of input.
    fn import_tail(&self) -> Result<()> {
        match self.peek() {
            None | Some(TokenKind::Newline) | Some(TokenKind::CodeClose) => Ok(()),
            Some(_) => Err(self.err(format!(
                "syntax error. invalid token {} in compile import statement",
                self.token_desc()
            ))),
        }
    }

    // ── Formula ───────────────────────────────────────────────────────────────

    fn formula(&mut self) -> Result<Formula> {
        if let Some(f) = self.assign_list()? {
            return Ok(f);
        }
        self.multi_assign()
    }

    /// `assign (',' assign)*` where `assign := test '=' test ('=' test)*`.
    /// Rewinds and returns `None` when the input is not of that shape.
    fn assign_list(&mut self) -> Result<Option<Formula>> {
        let save = self.pos;
        let mut chains = Vec::new();
        loop {
            let first = self.test()?;
            if !self.at(&TokenKind::Assign) {
                self.pos = save;
                return Ok(None);
            }
            let mut chain = vec![first];
            while self.eat(&TokenKind::Assign) {
                if !self.starts_expr() {
                    return Err(self.err("syntax error. not found rhs test in assign list"));
                }
                chain.push(self.test()?);
            }
            chains.push(chain);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
            if !self.starts_expr() {
                self.pos = save;
                return Ok(None);
            }
        }
        Ok(Some(Formula::AssignList(chains)))
    }

    fn multi_assign(&mut self) -> Result<Formula> {
        let mut lists = vec![self.test_list()?];
        while self.eat(&TokenKind::Assign) {
            if !self.starts_expr() {
                return Err(self.err("syntax error. not found rhs in multi assign"));
            }
            lists.push(self.test_list()?);
        }
        Ok(Formula::MultiAssign(lists))
    }

    fn test_list(&mut self) -> Result<Vec<Expr>> {
        let mut tests = vec![self.test()?];
        while self.eat(&TokenKind::Comma) {
            if !self.starts_expr() {
                return Err(self.err("syntax error. not found test in test list"));
            }
            tests.push(self.test()?);
        }
        Ok(tests)
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    /// Entry of every nested expression; grows the stack for deep nesting.
    fn test(&mut self) -> Result<Expr> {
        stacker::maybe_grow(32 * 1024, 256 * 1024, || self.or_test())
    }

    fn or_test(&mut self) -> Result<Expr> {
        let mut items = vec![self.and_test()?];
        while self.eat(&TokenKind::Or) {
            self.skip_newlines();
            if !self.starts_expr() {
                return Err(self.err("syntax error. not found rhs operand in 'or' operator"));
            }
            items.push(self.and_test()?);
        }
        Ok(if items.len() == 1 { items.remove(0) } else { Expr::Or(items) })
    }

    fn and_test(&mut self) -> Result<Expr> {
        let mut items = vec![self.not_test()?];
        while self.eat(&TokenKind::And) {
            self.skip_newlines();
            if !self.starts_expr() {
                return Err(self.err("syntax error. not found rhs operand in 'and' operator"));
            }
            items.push(self.not_test()?);
        }
        Ok(if items.len() == 1 { items.remove(0) } else { Expr::And(items) })
    }

    fn not_test(&mut self) -> Result<Expr> {
        if self.at(&TokenKind::Not) {
            let pos = self.here();
            self.pos += 1;
            if !self.starts_expr() {
                return Err(self.err("syntax error. not found operand in not operator"));
            }
            return Ok(Expr::Not(Box::new(self.not_test()?), pos));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr> {
        let first = self.asscalc()?;
        let mut rest = Vec::new();
        loop {
            let op = match self.peek() {
                Some(TokenKind::Eq) => CompOp::Eq,
                Some(TokenKind::Ne) => CompOp::Ne,
                Some(TokenKind::Lt) => CompOp::Lt,
                Some(TokenKind::Le) => CompOp::Le,
                Some(TokenKind::Gt) => CompOp::Gt,
                Some(TokenKind::Ge) => CompOp::Ge,
                _ => break,
            };
            let pos = self.here();
            self.pos += 1;
            if !self.starts_expr() {
                return Err(self.err("syntax error. not found rhs operand in comparison"));
            }
            rest.push((op, self.asscalc()?, pos));
        }
        Ok(if rest.is_empty() { first } else { Expr::Comparison { first: Box::new(first), rest } })
    }

    fn asscalc(&mut self) -> Result<Expr> {
        let target = self.expr()?;
        let mut rest = Vec::new();
        loop {
            let op = match self.peek() {
                Some(TokenKind::PlusAssign) => ArithOp::Add,
                Some(TokenKind::MinusAssign) => ArithOp::Sub,
                Some(TokenKind::StarAssign) => ArithOp::Mul,
                Some(TokenKind::SlashAssign) => ArithOp::Div,
                Some(TokenKind::PercentAssign) => ArithOp::Mod,
                _ => break,
            };
            let pos = self.here();
            self.pos += 1;
            if !self.starts_expr() {
                return Err(self.err("syntax error. not found rhs operand in asscalc"));
            }
            rest.push((op, self.expr()?, pos));
        }
        Ok(if rest.is_empty() { target } else { Expr::AssCalc { target: Box::new(target), rest } })
    }

    fn expr(&mut self) -> Result<Expr> {
        let first = self.term()?;
        let mut rest = Vec::new();
        loop {
            let op = match self.peek() {
                Some(TokenKind::Plus) => ArithOp::Add,
                Some(TokenKind::Minus) => ArithOp::Sub,
                _ => break,
            };
            let pos = self.here();
            self.pos += 1;
            if !self.starts_expr() {
                return Err(self.err("syntax error. not found rhs operand in expr"));
            }
            rest.push((op, self.term()?, pos));
        }
        Ok(if rest.is_empty() { first } else { Expr::Arith { first: Box::new(first), rest } })
    }

    fn term(&mut self) -> Result<Expr> {
        let first = self.negative()?;
        let mut rest = Vec::new();
        loop {
            let op = match self.peek() {
                Some(TokenKind::Star) => ArithOp::Mul,
                Some(TokenKind::Slash) => ArithOp::Div,
                Some(TokenKind::Percent) => ArithOp::Mod,
                _ => break,
            };
            let pos = self.here();
            self.pos += 1;
            if !self.starts_expr() {
                return Err(self.err("syntax error. not found rhs operand in term"));
            }
            rest.push((op, self.negative()?, pos));
        }
        Ok(if rest.is_empty() { first } else { Expr::Arith { first: Box::new(first), rest } })
    }

    fn negative(&mut self) -> Result<Expr> {
        if self.at(&TokenKind::Minus) {
            let pos = self.here();
            self.pos += 1;
            if !self.starts_expr() {
                return Err(self.err("syntax error. not found operand in negative"));
            }
            return Ok(Expr::Negative(Box::new(self.ring()?), pos));
        }
        self.ring()
    }

    fn ring(&mut self) -> Result<Expr> {
        let head = self.factor()?;
        let mut ops = Vec::new();
        loop {
            let pos = self.here();
            match self.peek() {
                Some(TokenKind::Dot) => {
                    self.pos += 1;
                    match self.ident() {
                        Some(name) => ops.push(RingOp::Attr(name, pos)),
                        None if self.peek().is_none() => return Err(self.err("reached EOF after '.'")),
                        None => return Err(self.err("not found identifier after '.'")),
                    }
                }
                Some(TokenKind::LParen) => {
                    self.pos += 1;
                    let args = self.call_args()?;
                    ops.push(RingOp::Call(args, pos));
                }
                Some(TokenKind::LBracket) => {
                    self.pos += 1;
                    self.skip_newlines();
                    if !self.starts_expr() {
                        return Err(self.err("not found index in ring"));
                    }
                    let index = self.test()?;
                    self.skip_newlines();
                    if !self.eat(&TokenKind::RBracket) {
                        return Err(self.err("not found ']'"));
                    }
                    ops.push(RingOp::Index(Box::new(index), pos));
                }
                _ => break,
            }
        }
        Ok(if ops.is_empty() { head } else { Expr::Ring { head: Box::new(head), ops } })
    }

    fn call_args(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        loop {
            self.skip_newlines();
            if self.eat(&TokenKind::RParen) {
                return Ok(args);
            }
            if !self.starts_expr() {
                return Err(self.err("not found ')'"));
            }
            args.push(self.test()?);
            self.skip_newlines();
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            if self.eat(&TokenKind::RParen) {
                return Ok(args);
            }
            return Err(self.err("not found ')'"));
        }
    }

    fn factor(&mut self) -> Result<Expr> {
        if self.eat(&TokenKind::LParen) {
            self.skip_newlines();
            if !self.starts_expr() {
                return Err(self.err("syntax error. not found test in factor"));
            }
            let inner = self.test()?;
            self.skip_newlines();
            if !self.eat(&TokenKind::RParen) {
                return Err(self.err("syntax error. not found ) in factor"));
            }
            return Ok(inner);
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<Expr> {
        let pos = self.here();
        let Some(tok) = self.advance() else {
            return Err(self.err("syntax error. reached EOF in atom"));
        };
        let expr = match tok.kind {
            TokenKind::Nil => Expr::Nil,
            TokenKind::True => Expr::Bool(true),
            TokenKind::False => Expr::Bool(false),
            TokenKind::Int(n) => Expr::Int(n),
            TokenKind::Float(x) => Expr::Float(x),
            TokenKind::Str(s) => Expr::Str(s),
            TokenKind::Ident(name) => Expr::Ident(name, pos),
            TokenKind::Super => Expr::Super(pos),
            TokenKind::LBracket => self.array(pos)?,
            TokenKind::LBrace => self.dict(pos)?,
            other => {
                self.pos -= 1;
                return Err(self.err(format!("syntax error. invalid token \"{other}\" in atom")));
            }
        };
        Ok(expr)
    }

    fn array(&mut self, pos: Pos) -> Result<Expr> {
        let mut items = Vec::new();
        loop {
            self.skip_newlines();
            if self.eat(&TokenKind::RBracket) {
                return Ok(Expr::Array(items, pos));
            }
            if !self.starts_expr() {
                return Err(self.err("not found ']' in array"));
            }
            items.push(self.test()?);
            self.skip_newlines();
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            if self.eat(&TokenKind::RBracket) {
                return Ok(Expr::Array(items, pos));
            }
            return Err(self.err("not found ']' in array"));
        }
    }

    fn dict(&mut self, pos: Pos) -> Result<Expr> {
        let mut items = Vec::new();
        loop {
            self.skip_newlines();
            if self.eat(&TokenKind::RBrace) {
                return Ok(Expr::Dict(items, pos));
            }
            if !self.starts_expr() {
                return Err(self.err("not found right brace in parse dict"));
            }
            let key = self.test()?;
            self.skip_newlines();
            if !self.eat(&TokenKind::Colon) {
                return Err(self.err("not found colon in parse dict elem"));
            }
            self.skip_newlines();
            if !self.starts_expr() {
                return Err(self.err("not found value in parse dict elem"));
            }
            let value = self.test()?;
            items.push((key, value));
            self.skip_newlines();
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            if self.eat(&TokenKind::RBrace) {
                return Ok(Expr::Dict(items, pos));
            }
            return Err(self.err("not found right brace in parse dict"));
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

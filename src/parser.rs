//! Recursive-descent parser over the token stream.
//!
//! Precedence, lowest first: relational, additive (`+ - or`), multiplicative
//! (`* / div mod and`), then factors. The first token that does not fit the
//! grammar aborts the parse; no partial tree is ever returned.

use thiserror::Error;
use tracing::debug;

use crate::ast::*;
use crate::lexer::{Kw, Token, TokenKind};
use crate::ty::Type;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("syntax error at line {line}: unexpected {found}{}", expected_hint(.expected))]
pub struct SyntaxError {
    pub line: usize,
    pub found: String,
    pub expected: Option<String>,
}

fn expected_hint(expected: &Option<String>) -> String {
    match expected {
        Some(e) => format!(", expected {e}"),
        None => String::new(),
    }
}

type PResult<T> = Result<T, SyntaxError>;

pub fn parse_tokens(tokens: &[Token]) -> PResult<Program> {
    let mut p = Parser { tokens, pos: 0 };
    let program = p.program()?;
    if p.peek().is_some() {
        return Err(p.unexpected("end of input"));
    }
    debug!(name = %program.name, decls = program.block.decls.len(), "parsed program");
    Ok(program)
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Parser<'t> {
    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&'t TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    fn at_kw(&self, kw: Kw) -> bool {
        self.at(&TokenKind::Keyword(kw))
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_kw(&mut self, kw: Kw) -> bool {
        self.eat(&TokenKind::Keyword(kw))
    }

    fn line(&self) -> usize {
        self.peek()
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn unexpected(&self, expected: &str) -> SyntaxError {
        let found = match self.peek() {
            Some(t) => format!("token '{}'", t.kind),
            None => "end of input".to_string(),
        };
        SyntaxError {
            line: self.line(),
            found,
            expected: Some(expected.to_string()),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> PResult<&'t Token> {
        match self.peek() {
            Some(t) if t.kind == kind => {
                self.pos += 1;
                Ok(t)
            }
            _ => Err(self.unexpected(&format!("'{kind}'"))),
        }
    }

    fn expect_kw(&mut self, kw: Kw) -> PResult<&'t Token> {
        self.expect(TokenKind::Keyword(kw))
    }

    fn expect_ident(&mut self) -> PResult<String> {
        match self.peek_kind() {
            Some(TokenKind::Ident(name)) => {
                self.pos += 1;
                Ok(name.clone())
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn program(&mut self) -> PResult<Program> {
        self.expect_kw(Kw::Program)?;
        let name = self.expect_ident()?;
        self.expect(TokenKind::Semicolon)?;
        let block = self.block()?;
        self.expect(TokenKind::Dot)?;
        Ok(Program { name, block })
    }

    fn block(&mut self) -> PResult<Block> {
        let mut decls = vec![];
        loop {
            match self.peek_kind() {
                Some(TokenKind::Keyword(Kw::Var)) => self.var_section(&mut decls)?,
                Some(TokenKind::Keyword(Kw::Procedure)) => {
                    decls.push(Decl::Procedure(self.procedure_decl()?))
                }
                Some(TokenKind::Keyword(Kw::Function)) => {
                    decls.push(Decl::Function(self.function_decl()?))
                }
                _ => break,
            }
        }
        let body = self.compound()?;
        Ok(Block { decls, body })
    }

    fn var_section(&mut self, decls: &mut Vec<Decl>) -> PResult<()> {
        self.expect_kw(Kw::Var)?;
        loop {
            let line = self.line();
            let names = self.id_list()?;
            self.expect(TokenKind::Colon)?;
            let ty = self.type_spec()?;
            self.expect(TokenKind::Semicolon)?;
            decls.push(Decl::Var(VarDecl { names, ty, line }));
            if !matches!(self.peek_kind(), Some(TokenKind::Ident(_))) {
                return Ok(());
            }
        }
    }

    fn id_list(&mut self) -> PResult<Vec<String>> {
        let mut names = vec![self.expect_ident()?];
        while self.eat(&TokenKind::Comma) {
            names.push(self.expect_ident()?);
        }
        Ok(names)
    }

    fn type_spec(&mut self) -> PResult<Type> {
        match self.peek_kind() {
            Some(TokenKind::Keyword(Kw::Integer)) => {
                self.pos += 1;
                Ok(Type::Integer)
            }
            Some(TokenKind::Keyword(Kw::Boolean)) => {
                self.pos += 1;
                Ok(Type::Boolean)
            }
            Some(TokenKind::Keyword(Kw::String)) => {
                self.pos += 1;
                Ok(Type::String)
            }
            Some(TokenKind::Keyword(Kw::Array)) => {
                self.pos += 1;
                self.expect(TokenKind::LBracket)?;
                let mut ranges = vec![self.range()?];
                while self.eat(&TokenKind::Comma) {
                    ranges.push(self.range()?);
                }
                self.expect(TokenKind::RBracket)?;
                self.expect_kw(Kw::Of)?;
                let mut ty = self.type_spec()?;
                for (lower, upper) in ranges.into_iter().rev() {
                    ty = Type::array(lower, upper, ty);
                }
                Ok(ty)
            }
            _ => Err(self.unexpected("type")),
        }
    }

    fn range(&mut self) -> PResult<(i32, i32)> {
        let lower = self.signed_int()?;
        self.expect(TokenKind::DotDot)?;
        let upper = self.signed_int()?;
        Ok((lower, upper))
    }

    fn signed_int(&mut self) -> PResult<i32> {
        let negative = if self.eat(&TokenKind::Minus) {
            true
        } else {
            self.eat(&TokenKind::Plus);
            false
        };
        match self.peek_kind() {
            Some(TokenKind::IntConst(n)) => {
                self.pos += 1;
                Ok(if negative { -n } else { *n })
            }
            _ => Err(self.unexpected("integer constant")),
        }
    }

    fn params(&mut self) -> PResult<Vec<ParamDecl>> {
        let mut params = vec![];
        if !self.eat(&TokenKind::LParen) {
            return Ok(params);
        }
        if self.eat(&TokenKind::RParen) {
            return Ok(params);
        }
        loop {
            let names = self.id_list()?;
            self.expect(TokenKind::Colon)?;
            let ty = self.type_spec()?;
            params.extend(names.into_iter().map(|name| ParamDecl {
                name,
                ty: ty.clone(),
            }));
            if self.eat(&TokenKind::Semicolon) {
                continue;
            }
            if self.eat(&TokenKind::RParen) {
                return Ok(params);
            }
            return Err(self.unexpected("';' or ')'"));
        }
    }

    fn procedure_decl(&mut self) -> PResult<ProcedureDecl> {
        let line = self.expect_kw(Kw::Procedure)?.line;
        let name = self.expect_ident()?;
        let params = self.params()?;
        self.expect(TokenKind::Semicolon)?;
        let block = self.block()?;
        self.expect(TokenKind::Semicolon)?;
        Ok(ProcedureDecl {
            name,
            params,
            block,
            line,
        })
    }

    fn function_decl(&mut self) -> PResult<FunctionDecl> {
        let line = self.expect_kw(Kw::Function)?.line;
        let name = self.expect_ident()?;
        let params = self.params()?;
        self.expect(TokenKind::Colon)?;
        let ret_ty = self.type_spec()?;
        self.expect(TokenKind::Semicolon)?;
        let block = self.block()?;
        self.expect(TokenKind::Semicolon)?;
        Ok(FunctionDecl {
            name,
            params,
            ret_ty,
            block,
            line,
        })
    }

    fn compound(&mut self) -> PResult<Vec<Stmt>> {
        self.expect_kw(Kw::Begin)?;
        let mut stmts = vec![];
        loop {
            let s = self.statement()?;
            if s != Stmt::Empty {
                stmts.push(s);
            }
            if self.eat(&TokenKind::Semicolon) {
                continue;
            }
            if self.eat_kw(Kw::End) {
                return Ok(stmts);
            }
            return Err(self.unexpected("';' or 'end'"));
        }
    }

    fn statement(&mut self) -> PResult<Stmt> {
        let Some(kind) = self.peek_kind() else {
            return Err(self.unexpected("statement"));
        };
        match kind {
            TokenKind::Ident(name) => {
                self.pos += 1;
                self.ident_statement(name.clone())
            }
            TokenKind::Keyword(Kw::Begin) => Ok(Stmt::Compound(self.compound()?)),
            TokenKind::Keyword(Kw::If) => self.if_statement(),
            TokenKind::Keyword(Kw::While) => {
                self.pos += 1;
                let cond = self.expr()?;
                self.expect_kw(Kw::Do)?;
                let body = Box::new(self.statement()?);
                Ok(Stmt::While { cond, body })
            }
            TokenKind::Keyword(Kw::For) => self.for_statement(),
            TokenKind::Keyword(Kw::Write) => self.io_call(IoOp::Write),
            TokenKind::Keyword(Kw::Writeln) => self.io_call(IoOp::Writeln),
            TokenKind::Keyword(Kw::Read) => self.io_call(IoOp::Read),
            TokenKind::Keyword(Kw::Readln) => self.io_call(IoOp::Readln),
            _ => Ok(Stmt::Empty),
        }
    }

    fn ident_statement(&mut self, name: String) -> PResult<Stmt> {
        match self.peek_kind() {
            Some(TokenKind::Assign) => {
                self.pos += 1;
                let value = self.expr()?;
                Ok(Stmt::Assign {
                    target: Expr::Var(name),
                    value,
                })
            }
            Some(TokenKind::LBracket) => {
                let target = self.index_chain(Expr::Var(name))?;
                self.expect(TokenKind::Assign)?;
                let value = self.expr()?;
                Ok(Stmt::Assign { target, value })
            }
            Some(TokenKind::LParen) => {
                let args = self.call_args()?;
                Ok(Stmt::ProcCall { name, args })
            }
            _ => Ok(Stmt::ProcCall { name, args: vec![] }),
        }
    }

    fn if_statement(&mut self) -> PResult<Stmt> {
        self.expect_kw(Kw::If)?;
        let cond = self.expr()?;
        self.expect_kw(Kw::Then)?;
        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.eat_kw(Kw::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then_branch,
            else_branch,
        })
    }

    fn for_statement(&mut self) -> PResult<Stmt> {
        self.expect_kw(Kw::For)?;
        let var = self.expect_ident()?;
        self.expect(TokenKind::Assign)?;
        let start = self.expr()?;
        let direction = if self.eat_kw(Kw::To) {
            Direction::To
        } else if self.eat_kw(Kw::Downto) {
            Direction::Downto
        } else {
            return Err(self.unexpected("'to' or 'downto'"));
        };
        let end = self.expr()?;
        self.expect_kw(Kw::Do)?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::For {
            var,
            start,
            end,
            direction,
            body,
        })
    }

    fn io_call(&mut self, op: IoOp) -> PResult<Stmt> {
        self.pos += 1;
        let mut args = vec![];
        if self.eat(&TokenKind::LParen) {
            if !self.eat(&TokenKind::RParen) {
                loop {
                    let arg = if op.is_read() {
                        self.variable()?
                    } else {
                        self.expr()?
                    };
                    args.push(arg);
                    if self.eat(&TokenKind::Comma) {
                        continue;
                    }
                    self.expect(TokenKind::RParen)?;
                    break;
                }
            }
        }
        Ok(Stmt::Io { op, args })
    }

    fn variable(&mut self) -> PResult<Expr> {
        let name = self.expect_ident()?;
        self.index_chain(Expr::Var(name))
    }

    // a[i, j] and a[i][j] produce the same tree
    fn index_chain(&mut self, mut base: Expr) -> PResult<Expr> {
        while self.eat(&TokenKind::LBracket) {
            loop {
                let index = self.expr()?;
                base = Expr::Index {
                    base: Box::new(base),
                    index: Box::new(index),
                };
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RBracket)?;
        }
        Ok(base)
    }

    fn call_args(&mut self) -> PResult<Vec<Expr>> {
        self.expect(TokenKind::LParen)?;
        let mut args = vec![];
        if self.eat(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            self.expect(TokenKind::RParen)?;
            return Ok(args);
        }
    }

    fn expr(&mut self) -> PResult<Expr> {
        let lhs = self.simple_expr()?;
        let op = match self.peek_kind() {
            Some(TokenKind::Eq) => BinOp::Eq,
            Some(TokenKind::Ne) => BinOp::Ne,
            Some(TokenKind::Lt) => BinOp::Lt,
            Some(TokenKind::Le) => BinOp::Le,
            Some(TokenKind::Gt) => BinOp::Gt,
            Some(TokenKind::Ge) => BinOp::Ge,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.simple_expr()?;
        Ok(Expr::Binary(Box::new(lhs), op, Box::new(rhs)))
    }

    fn simple_expr(&mut self) -> PResult<Expr> {
        let mut e = self.term()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinOp::Add,
                Some(TokenKind::Minus) => BinOp::Sub,
                Some(TokenKind::Keyword(Kw::Or)) => BinOp::Or,
                _ => return Ok(e),
            };
            self.pos += 1;
            let rhs = self.term()?;
            e = Expr::Binary(Box::new(e), op, Box::new(rhs));
        }
    }

    fn term(&mut self) -> PResult<Expr> {
        let mut e = self.factor()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Star) => BinOp::Mul,
                Some(TokenKind::Slash) => BinOp::Slash,
                Some(TokenKind::Keyword(Kw::Div)) => BinOp::Div,
                Some(TokenKind::Keyword(Kw::Mod)) => BinOp::Mod,
                Some(TokenKind::Keyword(Kw::And)) => BinOp::And,
                _ => return Ok(e),
            };
            self.pos += 1;
            let rhs = self.factor()?;
            e = Expr::Binary(Box::new(e), op, Box::new(rhs));
        }
    }

    fn factor(&mut self) -> PResult<Expr> {
        let Some(kind) = self.peek_kind() else {
            return Err(self.unexpected("expression"));
        };
        let e = match kind {
            TokenKind::IntConst(n) => Expr::Int(*n),
            TokenKind::RealConst(r) => Expr::Real(r.clone()),
            TokenKind::StrConst(s) => Expr::Str(s.clone()),
            TokenKind::Keyword(Kw::True) => Expr::Bool(true),
            TokenKind::Keyword(Kw::False) => Expr::Bool(false),
            TokenKind::LParen => {
                self.pos += 1;
                let inner = self.expr()?;
                self.expect(TokenKind::RParen)?;
                return Ok(inner);
            }
            TokenKind::Keyword(Kw::Not) => return self.unary(UnOp::Not),
            TokenKind::Minus => return self.unary(UnOp::Neg),
            TokenKind::Plus => return self.unary(UnOp::Plus),
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.pos += 1;
                if self.at(&TokenKind::LParen) {
                    let args = self.call_args()?;
                    return Ok(Expr::Call { name, args });
                }
                return self.index_chain(Expr::Var(name));
            }
            _ => return Err(self.unexpected("expression")),
        };
        self.pos += 1;
        Ok(e)
    }

    fn unary(&mut self, op: UnOp) -> PResult<Expr> {
        self.pos += 1;
        let operand = self.factor()?;
        Ok(Expr::Unary(op, Box::new(operand)))
    }
}

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::ast::*;
use crate::config::Framing;
use crate::instr::Instr;
use crate::scope::{ScopeId, Storage, SymbolId, SymbolKind, SymbolTable};
use crate::sema::Analysis;
use crate::ty::Type;

/// Generator failures. All of them mean analysis let through something it
/// should not have.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodegenError {
    #[error("internal: analysis reported errors, refusing to generate code")]
    NotAnalyzed,
    #[error("internal: unresolved symbol '{0}'")]
    Unresolved(String),
    #[error("internal: '{0}' is not a {1}")]
    WrongKind(String, &'static str),
    #[error("internal: cannot generate code for {0}")]
    Unsupported(String),
}

type GResult<T> = Result<T, CodegenError>;

pub fn generate(
    program: &Program,
    analysis: &Analysis,
    framing: &Framing,
) -> Result<Vec<Instr>, CodegenError> {
    if !analysis.is_ok() {
        return Err(CodegenError::NotAnalyzed);
    }
    let mut gen = EwvmGen::new(&analysis.symbols);
    gen.gen_program(program, framing)?;
    let code = gen.finish();
    debug!(instructions = code.len(), "generated code");
    Ok(code)
}

struct EwvmGen<'a> {
    symbols: &'a SymbolTable,
    scope: ScopeId,
    out: Vec<Instr>,
    next_label: usize,
    routine_labels: HashMap<SymbolId, String>,
}

impl<'a> EwvmGen<'a> {
    fn new(symbols: &'a SymbolTable) -> Self {
        Self {
            symbols,
            scope: symbols.global(),
            out: vec![],
            next_label: 0,
            routine_labels: HashMap::new(),
        }
    }

    fn finish(self) -> Vec<Instr> {
        self.out
    }

    fn emit(&mut self, i: Instr) {
        self.out.push(i);
    }

    fn new_label(&mut self) -> String {
        let l = format!("L{}", self.next_label);
        self.next_label += 1;
        l
    }

    fn routine_label(&mut self, id: SymbolId) -> String {
        if let Some(l) = self.routine_labels.get(&id) {
            return l.clone();
        }
        let l = self.new_label();
        self.routine_labels.insert(id, l.clone());
        l
    }

    fn gen_program(&mut self, prog: &Program, framing: &Framing) -> GResult<()> {
        self.out.extend(framing.prologue.iter().cloned());
        let globals = self.symbols.scope(self.symbols.global()).reserved;
        if globals > 0 {
            self.emit(Instr::PushN(globals));
        }
        if has_routines(&prog.block) {
            let main = self.new_label();
            self.emit(Instr::Jump(main.clone()));
            self.gen_routines(&prog.block)?;
            self.emit(Instr::Label(main));
        }
        self.gen_stmts(&prog.block.body)?;
        self.out.extend(framing.epilogue.iter().cloned());
        Ok(())
    }

    fn gen_routines(&mut self, block: &Block) -> GResult<()> {
        for decl in &block.decls {
            match decl {
                Decl::Var(_) => {}
                Decl::Procedure(p) => self.gen_routine(&p.name, p.params.len(), &p.block)?,
                Decl::Function(f) => self.gen_routine(&f.name, f.params.len(), &f.block)?,
            }
        }
        Ok(())
    }

    fn gen_routine(&mut self, name: &str, nparams: usize, block: &Block) -> GResult<()> {
        let id = self
            .symbols
            .lookup_local(self.scope, name)
            .ok_or_else(|| CodegenError::Unresolved(name.to_string()))?;
        let (scope, is_function) = match &self.symbols.symbol(id).kind {
            SymbolKind::Procedure(r) => (r.scope, false),
            SymbolKind::Function(r) => (r.scope, true),
            SymbolKind::Variable { .. } => {
                return Err(CodegenError::WrongKind(name.to_string(), "routine"))
            }
        };
        let label = self.routine_label(id);
        let outer = std::mem::replace(&mut self.scope, scope);

        self.gen_routines(block)?;

        let locals = self.symbols.scope(scope).reserved;
        self.emit(Instr::Label(label));
        if is_function {
            self.emit(Instr::PushI(0));
        }
        if locals > 0 {
            self.emit(Instr::PushN(locals));
        }
        self.gen_stmts(&block.body)?;
        if is_function {
            let n = nparams as i32;
            self.emit(Instr::PushL(0));
            self.emit(Instr::StoreL(-(n + 1)));
            self.emit(Instr::Pop(locals + 1));
        } else if locals > 0 {
            self.emit(Instr::Pop(locals));
        }
        self.emit(Instr::Return);

        self.scope = outer;
        Ok(())
    }

    fn gen_stmts(&mut self, stmts: &[Stmt]) -> GResult<()> {
        for s in stmts {
            self.gen_stmt(s)?;
        }
        Ok(())
    }

    fn gen_stmt(&mut self, s: &Stmt) -> GResult<()> {
        match s {
            Stmt::Empty => {}
            Stmt::Compound(stmts) => self.gen_stmts(stmts)?,
            Stmt::Assign { target, value } => self.gen_assign(target, value)?,
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let else_l = self.new_label();
                let end_l = self.new_label();
                self.gen_expr(cond)?;
                self.emit(Instr::Jz(else_l.clone()));
                self.gen_stmt(then_branch)?;
                self.emit(Instr::Jump(end_l.clone()));
                self.emit(Instr::Label(else_l));
                if let Some(e) = else_branch {
                    self.gen_stmt(e)?;
                }
                self.emit(Instr::Label(end_l));
            }
            Stmt::While { cond, body } => {
                let head = self.new_label();
                let end = self.new_label();
                self.emit(Instr::Label(head.clone()));
                self.gen_expr(cond)?;
                self.emit(Instr::Jz(end.clone()));
                self.gen_stmt(body)?;
                self.emit(Instr::Jump(head));
                self.emit(Instr::Label(end));
            }
            Stmt::For {
                var,
                start,
                end,
                direction,
                body,
            } => {
                let (storage, _) = self.variable(var)?;
                let head = self.new_label();
                let done = self.new_label();
                self.gen_expr(start)?;
                self.emit(store(storage));
                // the bound stays on the stack for the whole loop
                self.gen_expr(end)?;
                self.emit(Instr::Label(head.clone()));
                self.emit(Instr::Dup(1));
                self.emit(load(storage));
                self.emit(Instr::Swap);
                self.emit(match direction {
                    Direction::To => Instr::InfEq,
                    Direction::Downto => Instr::SupEq,
                });
                self.emit(Instr::Jz(done.clone()));
                self.gen_stmt(body)?;
                self.emit(load(storage));
                self.emit(Instr::PushI(1));
                self.emit(match direction {
                    Direction::To => Instr::Add,
                    Direction::Downto => Instr::Sub,
                });
                self.emit(store(storage));
                self.emit(Instr::Jump(head));
                self.emit(Instr::Label(done));
                self.emit(Instr::Pop(1));
            }
            Stmt::ProcCall { name, args } => self.gen_call(name, args, false)?,
            Stmt::Io { op, args } => self.gen_io(*op, args)?,
        }
        Ok(())
    }

    fn gen_assign(&mut self, target: &Expr, value: &Expr) -> GResult<()> {
        match target {
            Expr::Var(name) => {
                let symbols = self.symbols;
                let id = self.lookup(name)?;
                match &symbols.symbol(id).kind {
                    SymbolKind::Function(_) => {
                        self.gen_expr(value)?;
                        self.emit(Instr::StoreL(0));
                    }
                    SymbolKind::Variable { ty, storage, .. } if ty.is_simple() => {
                        let storage = *storage;
                        self.gen_expr(value)?;
                        self.emit(store(storage));
                    }
                    SymbolKind::Variable { ty, storage, .. } => {
                        let Expr::Var(src) = value else {
                            return Err(CodegenError::Unsupported(format!(
                                "array assignment to '{name}'"
                            )));
                        };
                        let (dst, dst_size) = (*storage, ty.size());
                        let (src, src_ty) = self.variable(src)?;
                        let n = dst_size.min(src_ty.size()).unwrap_or(0);
                        for i in 0..n {
                            self.emit(load(shift(src, i)));
                            self.emit(store(shift(dst, i)));
                        }
                    }
                    SymbolKind::Procedure(_) => {
                        return Err(CodegenError::WrongKind(name.clone(), "variable"))
                    }
                }
            }
            Expr::Index { .. } => {
                self.gen_expr(value)?;
                self.gen_element_address(target)?;
                self.emit(Instr::Swap);
                self.emit(Instr::Store(0));
            }
            other => {
                return Err(CodegenError::Unsupported(format!(
                    "assignment target {other:?}"
                )))
            }
        }
        Ok(())
    }

    fn gen_io(&mut self, op: IoOp, args: &[Expr]) -> GResult<()> {
        if op.is_read() {
            if args.is_empty() && op == IoOp::Readln {
                self.emit(Instr::Read);
                self.emit(Instr::Pop(1));
            }
            for arg in args {
                let ty = self.type_of(arg)?;
                self.emit(Instr::Read);
                if ty != Type::String {
                    self.emit(Instr::Atoi);
                }
                match arg {
                    Expr::Var(name) => {
                        let (storage, _) = self.variable(name)?;
                        self.emit(store(storage));
                    }
                    _ => {
                        self.gen_element_address(arg)?;
                        self.emit(Instr::Swap);
                        self.emit(Instr::Store(0));
                    }
                }
            }
            return Ok(());
        }

        for arg in args {
            let ty = self.type_of(arg)?;
            self.gen_expr(arg)?;
            match ty {
                Type::String => self.emit(Instr::WriteS),
                Type::Integer | Type::Boolean => self.emit(Instr::WriteI),
                Type::Array { .. } => {
                    return Err(CodegenError::Unsupported(format!("{} of {ty}", op.name())))
                }
            }
        }
        if op == IoOp::Writeln {
            self.emit(Instr::WriteLn);
        }
        Ok(())
    }

    fn gen_call(&mut self, name: &str, args: &[Expr], is_function: bool) -> GResult<()> {
        let id = self.lookup(name)?;
        let label = self.routine_label(id);
        if is_function {
            self.emit(Instr::PushI(0));
        }
        for a in args {
            self.gen_expr(a)?;
        }
        self.emit(Instr::PushA(label));
        self.emit(Instr::Call);
        if !args.is_empty() {
            self.emit(Instr::Pop(args.len() as i32));
        }
        Ok(())
    }

    fn gen_expr(&mut self, e: &Expr) -> GResult<()> {
        match e {
            Expr::Int(n) => self.emit(Instr::PushI(*n)),
            Expr::Bool(b) => self.emit(Instr::PushI(i32::from(*b))),
            Expr::Str(s) => self.emit(Instr::PushS(s.clone())),
            Expr::Real(r) => return Err(CodegenError::Unsupported(format!("real literal {r}"))),
            Expr::Var(name) => {
                let (storage, _) = self.variable(name)?;
                self.emit(load(storage));
            }
            Expr::Index { .. } => {
                self.gen_element_address(e)?;
                self.emit(Instr::Load(0));
            }
            Expr::Call { name, args } => self.gen_call(name, args, true)?,
            Expr::Unary(UnOp::Neg, inner) => {
                self.emit(Instr::PushI(0));
                self.gen_expr(inner)?;
                self.emit(Instr::Sub);
            }
            Expr::Unary(UnOp::Plus, inner) => self.gen_expr(inner)?,
            Expr::Unary(UnOp::Not, inner) => {
                self.gen_expr(inner)?;
                self.emit(Instr::Not);
            }
            Expr::Binary(lhs, op, rhs) => {
                self.gen_expr(lhs)?;
                self.gen_expr(rhs)?;
                match op {
                    BinOp::Add => self.emit(Instr::Add),
                    BinOp::Sub => self.emit(Instr::Sub),
                    BinOp::Mul => self.emit(Instr::Mul),
                    BinOp::Slash | BinOp::Div => self.emit(Instr::Div),
                    BinOp::Mod => self.emit(Instr::Mod),
                    BinOp::And => self.emit(Instr::And),
                    BinOp::Or => self.emit(Instr::Or),
                    BinOp::Eq => self.emit(Instr::Equal),
                    BinOp::Ne => {
                        self.emit(Instr::Equal);
                        self.emit(Instr::Not);
                    }
                    BinOp::Lt => self.emit(Instr::Inf),
                    BinOp::Le => self.emit(Instr::InfEq),
                    BinOp::Gt => self.emit(Instr::Sup),
                    BinOp::Ge => self.emit(Instr::SupEq),
                }
            }
        }
        Ok(())
    }

    /// Leaves the address of an array element on the stack.
    fn gen_element_address(&mut self, e: &Expr) -> GResult<()> {
        let mut indices = vec![];
        let mut cur = e;
        while let Expr::Index { base, index } = cur {
            indices.push(index.as_ref());
            cur = base.as_ref();
        }
        indices.reverse();
        let Expr::Var(name) = cur else {
            return Err(CodegenError::Unsupported(format!("indexing {cur:?}")));
        };
        let (storage, mut ty) = self.variable(name)?;

        self.emit(match storage {
            Storage::Global(_) => Instr::PushGp,
            Storage::Local(_) => Instr::PushFp,
        });
        for (i, index) in indices.into_iter().enumerate() {
            let Type::Array { lower, elem, .. } = ty else {
                return Err(CodegenError::WrongKind(name.clone(), "array"));
            };
            self.gen_expr(index)?;
            if *lower != 0 {
                self.emit(Instr::PushI(*lower));
                self.emit(Instr::Sub);
            }
            let elem_size = elem
                .size()
                .ok_or_else(|| CodegenError::Unsupported(format!("element size of '{name}'")))?;
            if elem_size != 1 {
                self.emit(Instr::PushI(elem_size));
                self.emit(Instr::Mul);
            }
            if i > 0 {
                self.emit(Instr::Add);
            }
            ty = elem.as_ref();
        }
        self.emit(Instr::PushI(storage.offset()));
        self.emit(Instr::Add);
        self.emit(Instr::Padd);
        Ok(())
    }

    fn lookup(&self, name: &str) -> GResult<SymbolId> {
        self.symbols
            .lookup(self.scope, name)
            .ok_or_else(|| CodegenError::Unresolved(name.to_string()))
    }

    fn variable(&self, name: &str) -> GResult<(Storage, &'a Type)> {
        let symbols = self.symbols;
        let id = self.lookup(name)?;
        match &symbols.symbol(id).kind {
            SymbolKind::Variable { ty, storage, .. } => Ok((*storage, ty)),
            _ => Err(CodegenError::WrongKind(name.to_string(), "variable")),
        }
    }

    /// Static type of an already checked expression.
    fn type_of(&self, e: &Expr) -> GResult<Type> {
        Ok(match e {
            Expr::Int(_) => Type::Integer,
            Expr::Bool(_) => Type::Boolean,
            Expr::Str(_) => Type::String,
            Expr::Real(r) => return Err(CodegenError::Unsupported(format!("real literal {r}"))),
            Expr::Var(name) => self.variable(name)?.1.clone(),
            Expr::Index { base, .. } => match self.type_of(base)? {
                Type::Array { elem, .. } => *elem,
                _ => return Err(CodegenError::WrongKind(format!("{base:?}"), "array")),
            },
            Expr::Call { name, .. } => {
                let id = self.lookup(name)?;
                match &self.symbols.symbol(id).kind {
                    SymbolKind::Function(r) => r
                        .ret
                        .clone()
                        .ok_or_else(|| CodegenError::WrongKind(name.clone(), "function"))?,
                    _ => return Err(CodegenError::WrongKind(name.clone(), "function")),
                }
            }
            Expr::Unary(UnOp::Not, _) => Type::Boolean,
            Expr::Unary(_, _) => Type::Integer,
            Expr::Binary(_, op, _) if op.is_arithmetic() => Type::Integer,
            Expr::Binary(..) => Type::Boolean,
        })
    }
}

fn has_routines(block: &Block) -> bool {
    block
        .decls
        .iter()
        .any(|d| matches!(d, Decl::Procedure(_) | Decl::Function(_)))
}

fn load(s: Storage) -> Instr {
    match s {
        Storage::Global(n) => Instr::PushG(n),
        Storage::Local(n) => Instr::PushL(n),
    }
}

fn store(s: Storage) -> Instr {
    match s {
        Storage::Global(n) => Instr::StoreG(n),
        Storage::Local(n) => Instr::StoreL(n),
    }
}

fn shift(s: Storage, by: i32) -> Storage {
    match s {
        Storage::Global(n) => Storage::Global(n + by),
        Storage::Local(n) => Storage::Local(n + by),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::listing;
    use crate::lexer::tokenize;
    use crate::parser::parse_tokens;
    use crate::sema::analyze;

    fn gen_with(src: &str, framing: &Framing) -> Vec<Instr> {
        let lexed = tokenize(src);
        assert!(lexed.errors.is_empty(), "lexical errors: {:?}", lexed.errors);
        let program = parse_tokens(&lexed.tokens).expect("program should parse");
        let analysis = analyze(&program);
        assert!(analysis.is_ok(), "semantic errors: {:?}", analysis.errors);
        generate(&program, &analysis, framing).expect("codegen should succeed")
    }

    fn gen(src: &str) -> Vec<Instr> {
        gen_with(src, &Framing::default())
    }

    fn body(src: &str) -> String {
        listing(&gen_with(src, &Framing::bare()))
    }

    fn lines(s: &str) -> String {
        s.lines().map(str::trim).filter(|l| !l.is_empty()).fold(String::new(), |mut acc, l| {
            acc.push_str(l);
            acc.push('\n');
            acc
        })
    }

    #[test]
    fn minimal_program_is_framed() {
        let code = gen("program P; var x: integer; begin x := 1; writeln(x); end.");
        assert_eq!(
            code,
            vec![
                Instr::PushI(0),
                Instr::PushI(0),
                Instr::Start,
                Instr::PushN(1),
                Instr::PushI(1),
                Instr::StoreG(0),
                Instr::PushG(0),
                Instr::WriteI,
                Instr::WriteLn,
                Instr::Stop,
            ]
        );
    }

    #[test]
    fn no_storage_no_pushn() {
        assert_eq!(body("program p; begin writeln('hi') end."), "PUSHS \"hi\"\nWRITES\nWRITELN\n");
    }

    #[test]
    fn write_picks_opcode_by_static_type() {
        let out = body(
            "program p; var b: boolean; s: string;
             begin b := 1 < 2; s := 'x'; write(b, s, 3, 'lit') end.",
        );
        assert!(out.ends_with("PUSHG 0\nWRITEI\nPUSHG 1\nWRITES\nPUSHI 3\nWRITEI\nPUSHS \"lit\"\nWRITES\n"), "{out}");
    }

    #[test]
    fn operators_map_to_opcodes() {
        let out = body(
            "program p; var b: boolean; x: integer;
             begin x := 7 mod 2 - 8 div 4; b := x <> 3; b := not (x >= 1) and (x < 2) end.",
        );
        let expected = lines(
            "PUSHN 2
             PUSHI 7
             PUSHI 2
             MOD
             PUSHI 8
             PUSHI 4
             DIV
             SUB
             STOREG 1
             PUSHG 1
             PUSHI 3
             EQUAL
             NOT
             STOREG 0
             PUSHG 1
             PUSHI 1
             SUPEQ
             NOT
             PUSHG 1
             PUSHI 2
             INF
             AND
             STOREG 0",
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn unary_minus_subtracts_from_zero() {
        let out = body("program p; var x: integer; begin x := -x end.");
        assert_eq!(out, lines("PUSHN 1\nPUSHI 0\nPUSHG 0\nSUB\nSTOREG 0"));
    }

    #[test]
    fn if_else_uses_fresh_label_pair() {
        let out = body(
            "program p; var x: integer;
             begin if true then x := 1 else x := 2; if false then x := 3 end.",
        );
        let expected = lines(
            "PUSHN 1
             PUSHI 1
             JZ L0
             PUSHI 1
             STOREG 0
             JUMP L1
             L0:
             PUSHI 2
             STOREG 0
             L1:
             PUSHI 0
             JZ L2
             PUSHI 3
             STOREG 0
             JUMP L3
             L2:
             L3:",
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn while_loops_back_to_head() {
        let out = body("program p; var i: integer; begin i := 0; while i < 3 do i := i + 1 end.");
        let expected = lines(
            "PUSHN 1
             PUSHI 0
             STOREG 0
             L0:
             PUSHG 0
             PUSHI 3
             INF
             JZ L1
             PUSHG 0
             PUSHI 1
             ADD
             STOREG 0
             JUMP L0
             L1:",
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn for_keeps_bound_on_stack() {
        let out = body("program p; var i: integer; begin for i := 1 to 3 do write(i) end.");
        let expected = lines(
            "PUSHN 1
             PUSHI 1
             STOREG 0
             PUSHI 3
             L0:
             DUP 1
             PUSHG 0
             SWAP
             INFEQ
             JZ L1
             PUSHG 0
             WRITEI
             PUSHG 0
             PUSHI 1
             ADD
             STOREG 0
             JUMP L0
             L1:
             POP 1",
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn downto_counts_down() {
        let out = body("program p; var i: integer; begin for i := 3 downto 1 do end.");
        assert!(out.contains("SWAP\nSUPEQ\n"), "{out}");
        assert!(out.contains("PUSHI 1\nSUB\nSTOREG 0\n"), "{out}");
    }

    #[test]
    fn array_element_access_subtracts_lower_bound() {
        let out = body(
            "program p; var x: integer; a: array[1..5] of integer;
             begin a[2] := 7; x := a[2] end.",
        );
        let expected = lines(
            "PUSHN 6
             PUSHI 7
             PUSHGP
             PUSHI 2
             PUSHI 1
             SUB
             PUSHI 1
             ADD
             PADD
             SWAP
             STORE 0
             PUSHGP
             PUSHI 2
             PUSHI 1
             SUB
             PUSHI 1
             ADD
             PADD
             LOAD 0
             STOREG 0",
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn nested_array_scales_outer_index() {
        let out = body("program p; var m: array[0..2, 1..4] of integer; begin m[1, 2] := 0 end.");
        let expected = lines(
            "PUSHN 12
             PUSHI 0
             PUSHGP
             PUSHI 1
             PUSHI 4
             MUL
             PUSHI 2
             PUSHI 1
             SUB
             ADD
             PUSHI 0
             ADD
             PADD
             SWAP
             STORE 0",
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn whole_array_assignment_copies_slots() {
        let out = body(
            "program p; var a, b: array[1..2] of integer;
             begin b[1] := 0; b[2] := 0; a := b end.",
        );
        assert!(out.ends_with("PUSHG 2\nSTOREG 0\nPUSHG 3\nSTOREG 1\n"), "{out}");
    }

    #[test]
    fn function_frame_and_call_sequence() {
        let out = body(
            "program p; var r: integer;
             function add(a, b: integer): integer; var t: integer;
             begin t := a + b; add := t end;
             begin r := add(1, 2) end.",
        );
        let expected = lines(
            "PUSHN 1
             JUMP L0
             L1:
             PUSHI 0
             PUSHN 1
             PUSHL -2
             PUSHL -1
             ADD
             STOREL 1
             PUSHL 1
             STOREL 0
             PUSHL 0
             STOREL -3
             POP 2
             RETURN
             L0:
             PUSHI 0
             PUSHI 1
             PUSHI 2
             PUSHA L1
             CALL
             POP 2
             STOREG 0",
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn procedure_without_args_or_locals() {
        let out = body(
            "program p;
             procedure hello; begin writeln('hello') end;
             begin hello; hello() end.",
        );
        let expected = lines(
            "JUMP L0
             L1:
             PUSHS \"hello\"
             WRITES
             WRITELN
             RETURN
             L0:
             PUSHA L1
             CALL
             PUSHA L1
             CALL",
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn nested_routines_are_emitted_first() {
        let out = body(
            "program p;
             procedure outer;
                procedure inner; begin writeln(1) end;
             begin inner end;
             begin outer end.",
        );
        let expected = lines(
            "JUMP L0
             L2:
             PUSHI 1
             WRITEI
             WRITELN
             RETURN
             L1:
             PUSHA L2
             CALL
             RETURN
             L0:
             PUSHA L1
             CALL",
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn read_converts_non_strings() {
        let out = body(
            "program p; var x: integer; s: string; a: array[1..3] of integer;
             begin readln(x, s); read(a[x]); readln end.",
        );
        let expected = lines(
            "PUSHN 5
             READ
             ATOI
             STOREG 0
             READ
             STOREG 1
             READ
             ATOI
             PUSHGP
             PUSHG 0
             PUSHI 1
             SUB
             PUSHI 2
             ADD
             PADD
             SWAP
             STORE 0
             READ
             POP 1",
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn locals_in_procedure_use_frame_pointer() {
        let out = body(
            "program p;
             procedure fill(v: integer); var a: array[1..2] of integer;
             begin a[1] := v end;
             begin fill(9) end.",
        );
        assert!(out.contains("L1:\nPUSHN 2\nPUSHL -1\nPUSHFP\n"), "{out}");
        assert!(out.contains("POP 2\nRETURN\n"), "{out}");
        assert!(out.ends_with("PUSHI 9\nPUSHA L1\nCALL\nPOP 1\n"), "{out}");
    }

    #[test]
    fn generation_is_deterministic() {
        let src = "program p; var i, s: integer;
            function sq(n: integer): integer; begin sq := n * n end;
            begin s := 0; for i := 1 to 4 do if i mod 2 = 0 then s := s + sq(i); writeln(s) end.";
        assert_eq!(gen(src), gen(src));
    }

    #[test]
    fn refuses_to_generate_after_failed_analysis() {
        let lexed = tokenize("program p; begin x := 1 end.");
        let program = parse_tokens(&lexed.tokens).unwrap();
        let analysis = analyze(&program);
        assert_eq!(
            generate(&program, &analysis, &Framing::default()),
            Err(CodegenError::NotAnalyzed)
        );
    }
}

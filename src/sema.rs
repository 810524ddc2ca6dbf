use std::collections::HashSet;

use thiserror::Error;
use tracing::debug;

use crate::ast::*;
use crate::scope::{Routine, ScopeId, Storage, SymbolId, SymbolKind, SymbolTable};
use crate::ty::Type;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemanticError {
    #[error("identifier '{name}' is already declared in this scope")]
    Redeclared { name: String },
    #[error("undeclared identifier '{name}'")]
    Undeclared { name: String },
    #[error("'{name}' is a {kind}, not a variable")]
    NotAVariable { name: String, kind: &'static str },
    #[error("'{name}' is a {found}, not a {expected}")]
    WrongRoutineKind {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("'{name}' is not an array")]
    NotAnArray { name: String },
    #[error("type mismatch in {context}: expected {expected}, found {found}")]
    TypeMismatch {
        context: String,
        expected: Type,
        found: Type,
    },
    #[error("operator '{op}' expects {expected} operands, found {found}")]
    OperandType {
        op: &'static str,
        expected: Type,
        found: Type,
    },
    #[error("division by zero in '{op}'")]
    DivisionByZero { op: &'static str },
    #[error("index {index} out of bounds for '{name}' [{lower}..{upper}]")]
    IndexOutOfBounds {
        name: String,
        index: i64,
        lower: i32,
        upper: i32,
    },
    #[error("index into '{name}' must be integer, found {found}")]
    NonIntegerIndex { name: String, found: Type },
    #[error("array '{name}' has lower bound {lower} greater than upper bound {upper}")]
    InvalidBounds { name: String, lower: i32, upper: i32 },
    #[error("array '{name}' is too large")]
    ArrayTooLarge { name: String },
    #[error("'{name}' expects {expected} argument(s), found {found}")]
    ArgumentCount {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("argument {position} of '{name}': expected {expected}, found {found}")]
    ArgumentType {
        name: String,
        position: usize,
        expected: Type,
        found: Type,
    },
    #[error("condition of '{construct}' must be boolean, found {found}")]
    ConditionNotBoolean {
        construct: &'static str,
        found: Type,
    },
    #[error("for-loop control '{name}' must be an integer variable")]
    ForVariable { name: String },
    #[error("cannot {op} a value of type {found}")]
    Unprintable { op: &'static str, found: Type },
    #[error("cannot {op} into a value of type {found}")]
    NotReadable { op: &'static str, found: Type },
    #[error("real literal {literal} is not supported")]
    UnsupportedReal { literal: String },
    #[error("'{name}' belongs to an enclosing routine and is not accessible here")]
    CapturedLocal { name: String },
    #[error("routine '{routine}' cannot take or return a value of type {ty}")]
    NonSimpleRoutineType { routine: String, ty: Type },
    #[error("array assignment to '{name}' needs plain variables on both sides")]
    ArrayAssignmentSource { name: String },
    #[error("operator '{op}' cannot compare arrays")]
    ArrayComparison { op: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemanticWarning {
    #[error("variable '{name}' may be used before it is initialized")]
    PossiblyUninitialized { name: String },
}

/// Outcome of analysis. `symbols` carries the storage layout that code
/// generation reads back.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub symbols: SymbolTable,
    pub errors: Vec<SemanticError>,
    pub warnings: Vec<SemanticWarning>,
}

impl Analysis {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

pub fn analyze(program: &Program) -> Analysis {
    let symbols = SymbolTable::new();
    let scope = symbols.global();
    let mut a = Analyzer {
        symbols,
        scope,
        errors: vec![],
        warnings: vec![],
        warned: HashSet::new(),
    };
    a.block(&program.block);
    debug!(
        program = %program.name,
        globals = a.symbols.scope(a.symbols.global()).reserved,
        errors = a.errors.len(),
        warnings = a.warnings.len(),
        "analysis finished"
    );
    Analysis {
        symbols: a.symbols,
        errors: a.errors,
        warnings: a.warnings,
    }
}

struct Analyzer {
    symbols: SymbolTable,
    scope: ScopeId,
    errors: Vec<SemanticError>,
    warnings: Vec<SemanticWarning>,
    warned: HashSet<SymbolId>,
}

impl Analyzer {
    fn error(&mut self, e: SemanticError) {
        self.errors.push(e);
    }

    fn block(&mut self, block: &Block) {
        for decl in &block.decls {
            match decl {
                Decl::Var(v) => self.var_decl(v),
                Decl::Procedure(p) => self.routine(&p.name, &p.params, None, &p.block),
                Decl::Function(f) => {
                    self.routine(&f.name, &f.params, Some(&f.ret_ty), &f.block)
                }
            }
        }
        for stmt in &block.body {
            self.stmt(stmt);
        }
    }

    fn var_decl(&mut self, decl: &VarDecl) {
        for name in &decl.names {
            if self.symbols.lookup_local(self.scope, name).is_some()
                || self.is_result_name(self.scope, name)
            {
                self.error(SemanticError::Redeclared { name: name.clone() });
                continue;
            }
            if !self.check_bounds(name, &decl.ty) {
                continue;
            }
            let Some(offset) = decl
                .ty
                .size()
                .and_then(|size| self.symbols.allocate(self.scope, size))
            else {
                self.error(SemanticError::ArrayTooLarge { name: name.clone() });
                continue;
            };
            let storage = if self.symbols.is_global(self.scope) {
                Storage::Global(offset)
            } else {
                Storage::Local(offset)
            };
            let kind = SymbolKind::Variable {
                ty: decl.ty.clone(),
                storage,
                initialized: false,
            };
            // redeclaration was ruled out above
            let _ = self.symbols.declare(self.scope, name, kind);
        }
    }

    fn check_bounds(&mut self, name: &str, ty: &Type) -> bool {
        match ty {
            Type::Array { lower, upper, elem } => {
                if lower > upper {
                    self.error(SemanticError::InvalidBounds {
                        name: name.to_string(),
                        lower: *lower,
                        upper: *upper,
                    });
                    return false;
                }
                self.check_bounds(name, elem)
            }
            _ => true,
        }
    }

    fn routine(&mut self, name: &str, params: &[ParamDecl], ret: Option<&Type>, block: &Block) {
        for ty in params.iter().map(|p| &p.ty).chain(ret) {
            if !ty.is_simple() {
                self.error(SemanticError::NonSimpleRoutineType {
                    routine: name.to_string(),
                    ty: ty.clone(),
                });
            }
        }

        let sig = Routine {
            params: params.iter().map(|p| (p.name.clone(), p.ty.clone())).collect(),
            ret: ret.cloned(),
            scope: self.scope,
        };
        let kind = match ret {
            Some(_) => SymbolKind::Function(sig),
            None => SymbolKind::Procedure(sig),
        };
        let declared = if self.is_result_name(self.scope, name) {
            None
        } else {
            self.symbols.declare(self.scope, name, kind).ok()
        };
        let id = match declared {
            Some(id) => Some(id),
            None => {
                self.error(SemanticError::Redeclared {
                    name: name.to_string(),
                });
                None
            }
        };

        // a function's result slot is local 0
        let first_local = if ret.is_some() { 1 } else { 0 };
        let inner = self.symbols.push_scope(self.scope, id, first_local);
        if let Some(id) = id {
            if let SymbolKind::Procedure(r) | SymbolKind::Function(r) =
                &mut self.symbols.symbol_mut(id).kind
            {
                r.scope = inner;
            }
        }

        let n = params.len() as i32;
        for (i, p) in params.iter().enumerate() {
            let kind = SymbolKind::Variable {
                ty: p.ty.clone(),
                storage: Storage::Local(i as i32 - n),
                initialized: true,
            };
            if self.is_result_name(inner, &p.name)
                || self.symbols.declare(inner, &p.name, kind).is_err()
            {
                self.error(SemanticError::Redeclared {
                    name: p.name.clone(),
                });
            }
        }

        // Whatever is visible from outside was set up by the caller.
        let before = self.symbols.initialized();
        self.symbols.restore_initialized(&vec![true; before.len()]);
        let outer = std::mem::replace(&mut self.scope, inner);
        self.block(block);
        self.scope = outer;
        self.symbols.restore_initialized(&before);

        debug!(
            routine = name,
            level = self.symbols.scope(inner).level,
            locals = self.symbols.scope(inner).reserved,
            "analyzed routine"
        );
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Empty => {}
            Stmt::Compound(stmts) => {
                for s in stmts {
                    self.stmt(s);
                }
            }
            Stmt::Assign { target, value } => self.assign(target, value),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.condition("if", cond);
                let before = self.symbols.initialized();
                self.stmt(then_branch);
                match else_branch {
                    Some(else_branch) => {
                        let after_then = self.symbols.initialized();
                        self.symbols.restore_initialized(&before);
                        self.stmt(else_branch);
                        let merged: Vec<bool> = self
                            .symbols
                            .initialized()
                            .iter()
                            .zip(&after_then)
                            .map(|(a, b)| *a && *b)
                            .collect();
                        self.symbols.restore_initialized(&merged);
                    }
                    None => self.symbols.restore_initialized(&before),
                }
            }
            Stmt::While { cond, body } => {
                self.condition("while", cond);
                let before = self.symbols.initialized();
                self.stmt(body);
                self.symbols.restore_initialized(&before);
            }
            Stmt::For {
                var,
                start,
                end,
                body,
                ..
            } => {
                self.check_int("for-loop start", start);
                self.check_int("for-loop bound", end);
                match self.variable(var, false) {
                    Some((id, Type::Integer)) => self.symbols.set_initialized(id, true),
                    Some(_) => self.error(SemanticError::ForVariable { name: var.clone() }),
                    None => {}
                }
                let before = self.symbols.initialized();
                self.stmt(body);
                self.symbols.restore_initialized(&before);
            }
            Stmt::ProcCall { name, args } => {
                let Some(id) = self.resolve(name) else {
                    self.exprs(args);
                    return;
                };
                match &self.symbols.symbol(id).kind {
                    SymbolKind::Procedure(r) => {
                        let params = r.params.clone();
                        self.call_args(name, &params, args);
                    }
                    other => {
                        let found = other.describe();
                        self.error(SemanticError::WrongRoutineKind {
                            name: name.clone(),
                            expected: "procedure",
                            found,
                        });
                        self.exprs(args);
                    }
                }
            }
            Stmt::Io { op, args } => self.io(*op, args),
        }
    }

    fn condition(&mut self, construct: &'static str, cond: &Expr) {
        match self.expr(cond) {
            Some(Type::Boolean) | None => {}
            Some(found) => self.error(SemanticError::ConditionNotBoolean { construct, found }),
        }
    }

    fn check_int(&mut self, context: &str, e: &Expr) {
        match self.expr(e) {
            Some(Type::Integer) | None => {}
            Some(found) => self.error(SemanticError::TypeMismatch {
                context: context.to_string(),
                expected: Type::Integer,
                found,
            }),
        }
    }

    fn assign(&mut self, target: &Expr, value: &Expr) {
        if let Expr::Var(name) = target {
            if let Some(ret) = self.own_result(name) {
                if let Some(found) = self.expr(value) {
                    if !ret.compatible(&found) {
                        self.error(SemanticError::TypeMismatch {
                            context: format!("result of '{name}'"),
                            expected: ret,
                            found,
                        });
                    }
                }
                return;
            }
        }

        let vt = self.expr(value);
        let Some((root, tt)) = self.place(target, false) else {
            return;
        };
        let name = self.symbols.symbol(root).name.clone();
        if let Some(vt) = vt {
            if !tt.compatible(&vt) {
                self.error(SemanticError::TypeMismatch {
                    context: format!("assignment to '{name}'"),
                    expected: tt,
                    found: vt,
                });
            } else if !tt.is_simple()
                && !(matches!(target, Expr::Var(_)) && matches!(value, Expr::Var(_)))
            {
                self.error(SemanticError::ArrayAssignmentSource { name });
            }
        }
        self.symbols.set_initialized(root, true);
    }

    /// A function's own name stands for its result inside its body, so no
    /// parameter, local or nested routine there may reuse it.
    fn is_result_name(&self, scope: ScopeId, name: &str) -> bool {
        self.symbols.scope(scope).owner.is_some_and(|id| {
            let owner = self.symbols.symbol(id);
            matches!(owner.kind, SymbolKind::Function(_)) && owner.name.eq_ignore_ascii_case(name)
        })
    }

    /// Return type when `name` is the function whose body is being analyzed.
    fn own_result(&self, name: &str) -> Option<Type> {
        let id = self.symbols.lookup(self.scope, name)?;
        if self.symbols.scope(self.scope).owner != Some(id) {
            return None;
        }
        match &self.symbols.symbol(id).kind {
            SymbolKind::Function(r) => r.ret.clone(),
            _ => None,
        }
    }

    fn io(&mut self, op: IoOp, args: &[Expr]) {
        for arg in args {
            if op.is_read() {
                let Some((root, ty)) = self.place(arg, false) else {
                    continue;
                };
                if ty.is_simple() {
                    self.symbols.set_initialized(root, true);
                } else {
                    self.error(SemanticError::NotReadable {
                        op: op.name(),
                        found: ty,
                    });
                }
            } else if let Some(ty) = self.expr(arg) {
                if !ty.is_simple() {
                    self.error(SemanticError::Unprintable {
                        op: op.name(),
                        found: ty,
                    });
                }
            }
        }
    }

    fn resolve(&mut self, name: &str) -> Option<SymbolId> {
        let id = self.symbols.lookup(self.scope, name);
        if id.is_none() {
            self.error(SemanticError::Undeclared {
                name: name.to_string(),
            });
        }
        id
    }

    /// Resolves `name` as a variable visible from the current frame.
    fn variable(&mut self, name: &str, reading: bool) -> Option<(SymbolId, Type)> {
        let id = self.resolve(name)?;
        let sym = self.symbols.symbol(id);
        let home = sym.scope;
        let (ty, storage) = match &sym.kind {
            SymbolKind::Variable { ty, storage, .. } => (ty.clone(), *storage),
            other => {
                let kind = other.describe();
                self.error(SemanticError::NotAVariable {
                    name: name.to_string(),
                    kind,
                });
                return None;
            }
        };
        if matches!(storage, Storage::Local(_)) && home != self.scope {
            self.error(SemanticError::CapturedLocal {
                name: name.to_string(),
            });
            return None;
        }
        if reading && !self.symbols.is_initialized(id) && self.warned.insert(id) {
            self.warnings.push(SemanticWarning::PossiblyUninitialized {
                name: name.to_string(),
            });
        }
        Some((id, ty))
    }

    /// Type of a variable or element reference, with the root variable.
    fn place(&mut self, e: &Expr, reading: bool) -> Option<(SymbolId, Type)> {
        match e {
            Expr::Var(name) => self.variable(name, reading),
            Expr::Index { base, index } => {
                let base_ty = self.place(base, reading);
                let index_ty = self.expr(index);
                let (root, base_ty) = base_ty?;
                let name = e.root_name().unwrap_or_default().to_string();
                let Type::Array { lower, upper, elem } = base_ty else {
                    self.error(SemanticError::NotAnArray { name });
                    return None;
                };
                match index_ty {
                    Some(Type::Integer) => {
                        if let Some(i) = index.literal_int() {
                            if i < i64::from(lower) || i > i64::from(upper) {
                                self.error(SemanticError::IndexOutOfBounds {
                                    name,
                                    index: i,
                                    lower,
                                    upper,
                                });
                            }
                        }
                    }
                    Some(found) => self.error(SemanticError::NonIntegerIndex { name, found }),
                    None => {}
                }
                Some((root, *elem))
            }
            _ => None,
        }
    }

    fn exprs(&mut self, es: &[Expr]) {
        for e in es {
            self.expr(e);
        }
    }

    fn call_args(&mut self, name: &str, params: &[(String, Type)], args: &[Expr]) {
        if params.len() != args.len() {
            self.error(SemanticError::ArgumentCount {
                name: name.to_string(),
                expected: params.len(),
                found: args.len(),
            });
        }
        for (i, arg) in args.iter().enumerate() {
            let found = self.expr(arg);
            if let (Some(found), Some((_, expected))) = (found, params.get(i)) {
                if !expected.compatible(&found) {
                    self.error(SemanticError::ArgumentType {
                        name: name.to_string(),
                        position: i + 1,
                        expected: expected.clone(),
                        found,
                    });
                }
            }
        }
    }

    /// Static type of `e`; `None` once an error has been reported for it.
    fn expr(&mut self, e: &Expr) -> Option<Type> {
        match e {
            Expr::Int(_) => Some(Type::Integer),
            Expr::Bool(_) => Some(Type::Boolean),
            Expr::Str(_) => Some(Type::String),
            Expr::Real(r) => {
                self.error(SemanticError::UnsupportedReal {
                    literal: r.to_string(),
                });
                None
            }
            Expr::Var(_) | Expr::Index { .. } => self.place(e, true).map(|(_, ty)| ty),
            Expr::Call { name, args } => {
                let Some(id) = self.resolve(name) else {
                    self.exprs(args);
                    return None;
                };
                match &self.symbols.symbol(id).kind {
                    SymbolKind::Function(r) => {
                        let params = r.params.clone();
                        let ret = r.ret.clone();
                        self.call_args(name, &params, args);
                        ret
                    }
                    other => {
                        let found = other.describe();
                        self.error(SemanticError::WrongRoutineKind {
                            name: name.clone(),
                            expected: "function",
                            found,
                        });
                        self.exprs(args);
                        None
                    }
                }
            }
            Expr::Unary(op, inner) => {
                let (want, sym) = match op {
                    UnOp::Not => (Type::Boolean, "not"),
                    UnOp::Neg => (Type::Integer, "-"),
                    UnOp::Plus => (Type::Integer, "+"),
                };
                if let Some(found) = self.expr(inner) {
                    if found != want {
                        self.error(SemanticError::OperandType {
                            op: sym,
                            expected: want.clone(),
                            found,
                        });
                    }
                }
                Some(want)
            }
            Expr::Binary(lhs, op, rhs) => self.binary(lhs, *op, rhs),
        }
    }

    fn binary(&mut self, lhs: &Expr, op: BinOp, rhs: &Expr) -> Option<Type> {
        let lt = self.expr(lhs);
        let rt = self.expr(rhs);

        if op.is_relational() {
            if lt.iter().chain(&rt).any(|t| !t.is_simple()) {
                self.error(SemanticError::ArrayComparison { op: op.symbol() });
            } else if let (Some(l), Some(r)) = (lt, rt) {
                if !l.compatible(&r) {
                    self.error(SemanticError::TypeMismatch {
                        context: format!("comparison '{}'", op.symbol()),
                        expected: l,
                        found: r,
                    });
                }
            }
            return Some(Type::Boolean);
        }

        let want = if op.is_arithmetic() {
            Type::Integer
        } else {
            Type::Boolean
        };
        for found in [lt, rt].into_iter().flatten() {
            if found != want {
                self.error(SemanticError::OperandType {
                    op: op.symbol(),
                    expected: want.clone(),
                    found,
                });
            }
        }
        if op.is_division() && rhs.literal_int() == Some(0) {
            self.error(SemanticError::DivisionByZero { op: op.symbol() });
        }
        Some(want)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse_tokens;

    fn analyze_src(src: &str) -> Analysis {
        let lexed = tokenize(src);
        assert!(lexed.errors.is_empty(), "lexical errors: {:?}", lexed.errors);
        let program = parse_tokens(&lexed.tokens).expect("program should parse");
        analyze(&program)
    }

    fn errors(src: &str) -> Vec<SemanticError> {
        analyze_src(src).errors
    }

    fn uninit(name: &str) -> SemanticWarning {
        SemanticWarning::PossiblyUninitialized {
            name: name.to_string(),
        }
    }

    fn storage_of(a: &Analysis, scope: ScopeId, name: &str) -> Storage {
        let id = a.symbols.lookup(scope, name).expect("symbol exists");
        match a.symbols.symbol(id).kind {
            SymbolKind::Variable { storage, .. } => storage,
            _ => panic!("{name} is not a variable"),
        }
    }

    fn routine_scope(a: &Analysis, name: &str) -> ScopeId {
        let id = a.symbols.lookup(a.symbols.global(), name).expect("routine exists");
        match &a.symbols.symbol(id).kind {
            SymbolKind::Procedure(r) | SymbolKind::Function(r) => r.scope,
            _ => panic!("{name} is not a routine"),
        }
    }

    #[test]
    fn clean_program_has_no_diagnostics() {
        let a = analyze_src("program P; var x: integer; begin x := 1; writeln(x); end.");
        assert!(a.is_ok(), "{:?}", a.errors);
        assert!(a.warnings.is_empty());
    }

    #[test]
    fn identifiers_are_case_insensitive() {
        let a = analyze_src("program p; var Total: integer; begin TOTAL := 1; writeln(total) end.");
        assert!(a.is_ok(), "{:?}", a.errors);
        assert!(a.warnings.is_empty());
    }

    #[test]
    fn redeclaration_in_same_scope_is_rejected() {
        assert_eq!(
            errors("program p; var x: integer; X: boolean; begin end."),
            vec![SemanticError::Redeclared { name: "X".into() }]
        );
        assert_eq!(
            errors("program p; var x, x: integer; begin end."),
            vec![SemanticError::Redeclared { name: "x".into() }]
        );
    }

    #[test]
    fn function_name_is_reserved_inside_its_body() {
        assert_eq!(
            errors(
                "program p; var r: integer;
                 function f(f: integer): integer; begin f := 7 end;
                 begin r := f(2); writeln(r) end."
            ),
            vec![SemanticError::Redeclared { name: "f".into() }]
        );
        assert_eq!(
            errors(
                "program p;
                 function F(n: integer): integer; var f: integer; begin F := n end;
                 begin writeln(F(1)) end."
            ),
            vec![SemanticError::Redeclared { name: "f".into() }]
        );
        assert_eq!(
            errors(
                "program p;
                 function f: integer; procedure f; begin end; begin f := 1 end;
                 begin writeln(f()) end."
            ),
            vec![SemanticError::Redeclared { name: "f".into() }]
        );
    }

    #[test]
    fn shadowing_in_routine_is_accepted() {
        let src = "program p; var x: integer;
            procedure q; var x: boolean; begin x := true; writeln(x) end;
            begin x := 1; q end.";
        let a = analyze_src(src);
        assert!(a.is_ok(), "{:?}", a.errors);
    }

    #[test]
    fn undeclared_identifier_is_reported() {
        assert_eq!(
            errors("program p; begin y := 1 end."),
            vec![SemanticError::Undeclared { name: "y".into() }]
        );
    }

    #[test]
    fn uninitialized_read_warns_once() {
        let a = analyze_src("program P; var x: integer; begin writeln(x); writeln(x + 1); end.");
        assert!(a.is_ok());
        assert_eq!(a.warnings, vec![uninit("x")]);
    }

    #[test]
    fn assignment_target_does_not_warn() {
        let a = analyze_src("program p; var x, y: integer; begin x := 1; y := x end.");
        assert!(a.warnings.is_empty());
    }

    #[test]
    fn if_else_initializes_when_both_branches_do() {
        let src = "program p; var x, y: integer; c: boolean;
            begin c := true; if c then x := 1 else x := 2; y := x end.";
        let a = analyze_src(src);
        assert!(a.is_ok(), "{:?}", a.errors);
        assert!(a.warnings.is_empty(), "{:?}", a.warnings);
    }

    #[test]
    fn if_without_else_does_not_initialize() {
        let src = "program p; var x, y: integer; c: boolean;
            begin c := true; if c then x := 1; y := x end.";
        assert_eq!(analyze_src(src).warnings, vec![uninit("x")]);
    }

    #[test]
    fn one_sided_if_else_does_not_initialize() {
        let src = "program p; var x, y: integer; c: boolean;
            begin c := false; if c then x := 1 else y := 2; writeln(x) end.";
        assert_eq!(analyze_src(src).warnings, vec![uninit("x")]);
    }

    #[test]
    fn if_without_else_keeps_prior_initialization() {
        let src = "program p; var x: integer; c: boolean;
            begin c := true; x := 0; if c then x := 1; writeln(x) end.";
        assert!(analyze_src(src).warnings.is_empty());
    }

    #[test]
    fn loop_body_initialization_is_not_definite() {
        let src = "program p; var x, i: integer;
            begin for i := 1 to 3 do x := i; writeln(x); writeln(i) end.";
        assert_eq!(analyze_src(src).warnings, vec![uninit("x")]);

        let src = "program p; var x: integer; c: boolean;
            begin c := false; while c do x := 1; writeln(x) end.";
        assert_eq!(analyze_src(src).warnings, vec![uninit("x")]);
    }

    #[test]
    fn literal_index_bounds_are_checked() {
        let bad = errors("program p; var a: array[1..5] of integer; begin a[0] := 1 end.");
        assert_eq!(
            bad,
            vec![SemanticError::IndexOutOfBounds {
                name: "a".into(),
                index: 0,
                lower: 1,
                upper: 5,
            }]
        );
        assert!(errors("program p; var a: array[1..5] of integer; begin a[1] := 1 end.").is_empty());
        assert!(errors("program p; var a: array[1..5] of integer; i: integer; begin i := 9; a[i] := 1 end.").is_empty());
    }

    #[test]
    fn negative_literal_index_is_checked() {
        let errs = errors("program p; var a: array[-2..2] of integer; begin a[-3] := 1; a[-2] := 0 end.");
        assert_eq!(errs.len(), 1);
        assert!(matches!(errs[0], SemanticError::IndexOutOfBounds { index: -3, .. }));
    }

    #[test]
    fn literal_zero_divisor_is_an_error() {
        assert_eq!(
            errors("program p; var x: integer; begin x := 10 div 0 end."),
            vec![SemanticError::DivisionByZero { op: "div" }]
        );
        assert_eq!(
            errors("program p; var x: integer; begin x := 10 mod 0 end."),
            vec![SemanticError::DivisionByZero { op: "mod" }]
        );
        assert!(errors("program p; var x, y: integer; begin y := 0; x := 10 div y end.").is_empty());
    }

    #[test]
    fn assignment_types_must_match() {
        assert_eq!(
            errors("program p; var x: integer; begin x := true end."),
            vec![SemanticError::TypeMismatch {
                context: "assignment to 'x'".into(),
                expected: Type::Integer,
                found: Type::Boolean,
            }]
        );
    }

    #[test]
    fn operator_operand_types_are_checked() {
        assert_eq!(
            errors("program p; var b: boolean; begin b := 1 and true end."),
            vec![SemanticError::OperandType {
                op: "and",
                expected: Type::Boolean,
                found: Type::Integer,
            }]
        );
        assert_eq!(
            errors("program p; var x: integer; begin x := 'a' + 1 end."),
            vec![SemanticError::OperandType {
                op: "+",
                expected: Type::Integer,
                found: Type::String,
            }]
        );
        assert_eq!(
            errors("program p; var b: boolean; begin b := 1 < true end.").len(),
            1
        );
    }

    #[test]
    fn whole_array_assignment_uses_element_compatibility() {
        let src = "program p; var a: array[1..3] of integer; b: array[0..9] of integer;
            c: array[1..3] of boolean;
            begin b[0] := 1; a := b end.";
        assert!(errors(src).is_empty());

        let src = "program p; var a: array[1..3] of integer; c: array[1..3] of boolean;
            begin c[1] := true; a := c end.";
        assert!(matches!(errors(src)[..], [SemanticError::TypeMismatch { .. }]));
    }

    #[test]
    fn array_copies_need_plain_variables() {
        let src = "program p; var m: array[1..2, 1..2] of integer; row: array[1..2] of integer;
            begin row[1] := 0; m[1] := row end.";
        assert_eq!(
            errors(src),
            vec![SemanticError::ArrayAssignmentSource { name: "m".into() }]
        );
    }

    #[test]
    fn arrays_cannot_be_compared_or_printed() {
        let src = "program p; var a, b: array[1..2] of integer; c: boolean;
            begin a[1] := 1; b[1] := 1; c := a = b; writeln(a) end.";
        let errs = errors(src);
        assert!(errs.contains(&SemanticError::ArrayComparison { op: "=" }));
        assert!(errs
            .iter()
            .any(|e| matches!(e, SemanticError::Unprintable { op: "writeln", .. })));
    }

    #[test]
    fn calls_are_checked_against_signature() {
        let decls = "program p; var r: integer;
            function add(a, b: integer): integer; begin add := a + b end;
            procedure show(s: string); begin writeln(s) end;";
        assert!(errors(&format!("{decls} begin r := add(1, 2); show('x') end.")).is_empty());
        assert_eq!(
            errors(&format!("{decls} begin r := add(1) end.")),
            vec![SemanticError::ArgumentCount {
                name: "add".into(),
                expected: 2,
                found: 1,
            }]
        );
        assert_eq!(
            errors(&format!("{decls} begin show(3) end.")),
            vec![SemanticError::ArgumentType {
                name: "show".into(),
                position: 1,
                expected: Type::String,
                found: Type::Integer,
            }]
        );
    }

    #[test]
    fn routine_kind_mismatches_are_reported() {
        let decls = "program p; var r: integer;
            function one: integer; begin one := 1 end;
            procedure noop; begin end;";
        assert_eq!(
            errors(&format!("{decls} begin r := noop() end.")),
            vec![SemanticError::WrongRoutineKind {
                name: "noop".into(),
                expected: "function",
                found: "procedure",
            }]
        );
        assert_eq!(
            errors(&format!("{decls} begin one end.")),
            vec![SemanticError::WrongRoutineKind {
                name: "one".into(),
                expected: "procedure",
                found: "function",
            }]
        );
        assert_eq!(
            errors(&format!("{decls} begin r := one end.")),
            vec![SemanticError::NotAVariable {
                name: "one".into(),
                kind: "function",
            }]
        );
        assert_eq!(
            errors(&format!("{decls} begin r(1) end.")),
            vec![SemanticError::WrongRoutineKind {
                name: "r".into(),
                expected: "procedure",
                found: "variable",
            }]
        );
    }

    #[test]
    fn recursive_function_resolves_itself() {
        let src = "program p; var r: integer;
            function fact(n: integer): integer;
            begin if n <= 1 then fact := 1 else fact := n * fact(n - 1) end;
            begin r := fact(5); writeln(r) end.";
        let a = analyze_src(src);
        assert!(a.is_ok(), "{:?}", a.errors);
    }

    #[test]
    fn nested_routine_cannot_capture_enclosing_locals() {
        let src = "program p;
            procedure outer; var t: integer;
                procedure inner; begin t := 1 end;
            begin inner end;
            begin outer end.";
        assert_eq!(
            errors(src),
            vec![SemanticError::CapturedLocal { name: "t".into() }]
        );
    }

    #[test]
    fn globals_count_as_initialized_inside_routines() {
        let src = "program p; var g: integer;
            procedure show; begin writeln(g) end;
            begin g := 1; show end.";
        assert!(analyze_src(src).warnings.is_empty());
    }

    #[test]
    fn routine_locals_are_tracked() {
        let src = "program p;
            procedure show; var t: integer; begin writeln(t) end;
            begin show end.";
        assert_eq!(analyze_src(src).warnings, vec![uninit("t")]);
    }

    #[test]
    fn language_restrictions_are_enforced() {
        let errs = errors("program p; var x: integer; begin x := 1.5 end.");
        assert_eq!(
            errs,
            vec![SemanticError::UnsupportedReal {
                literal: "1.5".into()
            }]
        );

        let errs = errors("program p; var a: array[5..1] of integer; begin end.");
        assert_eq!(
            errs,
            vec![SemanticError::InvalidBounds {
                name: "a".into(),
                lower: 5,
                upper: 1,
            }]
        );

        let errs = errors("program p; var x: integer; begin x := 1; if x then x := 2 end.");
        assert_eq!(
            errs,
            vec![SemanticError::ConditionNotBoolean {
                construct: "if",
                found: Type::Integer,
            }]
        );

        let errs = errors("program p; var b: boolean; begin for b := 1 to 2 do end.");
        assert_eq!(errs, vec![SemanticError::ForVariable { name: "b".into() }]);

        let errs = errors(
            "program p; procedure q(a: array[1..2] of integer); begin end; begin end.",
        );
        assert!(matches!(errs[..], [SemanticError::NonSimpleRoutineType { .. }]));

        let errs = errors("program p; var a: array[1..2] of integer; begin read(a) end.");
        assert!(matches!(errs[..], [SemanticError::NotReadable { op: "read", .. }]));
    }

    #[test]
    fn read_initializes_its_targets() {
        let src = "program p; var x: integer; a: array[1..3] of integer;
            begin readln(x); read(a[x]); writeln(x + a[1]) end.";
        let a = analyze_src(src);
        assert!(a.is_ok(), "{:?}", a.errors);
        assert!(a.warnings.is_empty(), "{:?}", a.warnings);
    }

    #[test]
    fn global_offsets_ascend_by_size() {
        let a = analyze_src(
            "program p; var x: integer; a: array[1..5] of integer; m: array[1..2, 1..3] of boolean; y: string; begin end.",
        );
        let g = a.symbols.global();
        assert_eq!(storage_of(&a, g, "x"), Storage::Global(0));
        assert_eq!(storage_of(&a, g, "a"), Storage::Global(1));
        assert_eq!(storage_of(&a, g, "m"), Storage::Global(6));
        assert_eq!(storage_of(&a, g, "y"), Storage::Global(12));
        assert_eq!(a.symbols.scope(g).reserved, 13);
    }

    #[test]
    fn routine_frames_place_params_below_fp() {
        let a = analyze_src(
            "program p;
             function f(a, b, c: integer): integer; var t, u: integer; begin f := a end;
             procedure q(s: string); var v: integer; begin end;
             begin end.",
        );
        let f = routine_scope(&a, "f");
        assert_eq!(storage_of(&a, f, "a"), Storage::Local(-3));
        assert_eq!(storage_of(&a, f, "c"), Storage::Local(-1));
        assert_eq!(storage_of(&a, f, "t"), Storage::Local(1));
        assert_eq!(storage_of(&a, f, "u"), Storage::Local(2));
        assert_eq!(a.symbols.scope(f).reserved, 2);

        let q = routine_scope(&a, "q");
        assert_eq!(storage_of(&a, q, "s"), Storage::Local(-1));
        assert_eq!(storage_of(&a, q, "v"), Storage::Local(0));
        assert_eq!(a.symbols.scope(q).reserved, 1);
    }

    #[test]
    fn diagnostics_accumulate_across_the_program() {
        let src = "program p; var x: integer;
            begin x := true; y := 1; x := 1 div 0 end.";
        assert_eq!(errors(src).len(), 3);
    }
}

use crate::ty::Type;

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub name: String,
    pub block: Block,
}

/// Declarations in source order, then the compound statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub decls: Vec<Decl>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Var(VarDecl),
    Procedure(ProcedureDecl),
    Function(FunctionDecl),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub names: Vec<String>,
    pub ty: Type,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureDecl {
    pub name: String,
    pub params: Vec<ParamDecl>,
    pub block: Block,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<ParamDecl>,
    pub ret_ty: Type,
    pub block: Block,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    To,
    Downto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOp {
    Read,
    Readln,
    Write,
    Writeln,
}

impl IoOp {
    pub fn name(self) -> &'static str {
        match self {
            IoOp::Read => "read",
            IoOp::Readln => "readln",
            IoOp::Write => "write",
            IoOp::Writeln => "writeln",
        }
    }

    pub fn is_read(self) -> bool {
        matches!(self, IoOp::Read | IoOp::Readln)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Stmt {
    #[default]
    Empty,
    Compound(Vec<Stmt>),
    /// `target` is always `Expr::Var` or `Expr::Index`.
    Assign {
        target: Expr,
        value: Expr,
    },
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    For {
        var: String,
        start: Expr,
        end: Expr,
        direction: Direction,
        body: Box<Stmt>,
    },
    ProcCall {
        name: String,
        args: Vec<Expr>,
    },
    /// Built-in terminal I/O. Read targets are `Expr::Var` or `Expr::Index`.
    Io {
        op: IoOp,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i32),
    Real(String),
    Str(String),
    Bool(bool),
    Var(String),
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Unary(UnOp, Box<Expr>),
    Binary(Box<Expr>, BinOp, Box<Expr>),
}

impl Expr {
    /// Literal integer value, looking through unary signs.
    pub fn literal_int(&self) -> Option<i64> {
        match self {
            Expr::Int(n) => Some(i64::from(*n)),
            Expr::Unary(UnOp::Neg, inner) => inner.literal_int().map(|n| -n),
            Expr::Unary(UnOp::Plus, inner) => inner.literal_int(),
            _ => None,
        }
    }

    /// Name of the variable an lvalue expression is rooted at.
    pub fn root_name(&self) -> Option<&str> {
        match self {
            Expr::Var(n) => Some(n),
            Expr::Index { base, .. } => base.root_name(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Plus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Slash,
    Div,
    Mod,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Slash => "/",
            BinOp::Div => "div",
            BinOp::Mod => "mod",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Eq => "=",
            BinOp::Ne => "<>",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
        }
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Slash | BinOp::Div | BinOp::Mod
        )
    }

    pub fn is_relational(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }

    pub fn is_division(self) -> bool {
        matches!(self, BinOp::Slash | BinOp::Div | BinOp::Mod)
    }
}

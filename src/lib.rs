//! Compiler from a small Pascal subset to EWVM stack-machine assembly.
//!
//! The pipeline is `lexer -> parser -> sema -> codegen`. Each stage is
//! usable on its own; [`compile`] runs all of them with fresh state.

pub mod ast;
pub mod codegen;
pub mod config;
pub mod error;
pub mod instr;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod sema;
pub mod ty;

use tracing::{debug, error, warn};

pub use config::{CompileOptions, Framing};
pub use error::CompileError;
pub use instr::Instr;
pub use sema::{Analysis, SemanticError, SemanticWarning};

use ast::Program;
use lexer::LexicalError;

#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    pub code: Vec<Instr>,
    pub warnings: Vec<SemanticWarning>,
}

impl Compiled {
    pub fn listing(&self) -> String {
        instr::listing(&self.code)
    }
}

/// Tokenizes and parses. Lexical errors reject the unit once the parse has
/// gone through.
pub fn parse(src: &str) -> Result<Program, CompileError> {
    let (program, lexical) = parse_unit(src)?;
    if !lexical.is_empty() {
        return Err(CompileError::Rejected {
            lexical,
            semantic: vec![],
            warnings: vec![],
        });
    }
    Ok(program)
}

pub fn compile(src: &str) -> Result<Compiled, CompileError> {
    compile_with(src, &CompileOptions::default())
}

pub fn compile_with(src: &str, opts: &CompileOptions) -> Result<Compiled, CompileError> {
    let (program, lexical) = parse_unit(src)?;
    let analysis = sema::analyze(&program);
    for w in &analysis.warnings {
        warn!("{w}");
    }
    for e in &analysis.errors {
        error!("{e}");
    }
    if !lexical.is_empty() || !analysis.is_ok() {
        return Err(CompileError::Rejected {
            lexical,
            semantic: analysis.errors,
            warnings: analysis.warnings,
        });
    }
    let code = codegen::generate(&program, &analysis, &opts.framing)?;
    Ok(Compiled {
        code,
        warnings: analysis.warnings,
    })
}

fn parse_unit(src: &str) -> Result<(Program, Vec<LexicalError>), CompileError> {
    let lexed = lexer::tokenize(src);
    for e in &lexed.errors {
        error!("{e}");
    }
    let program = parser::parse_tokens(&lexed.tokens).inspect_err(|e| error!("{e}"))?;
    debug!(program = %program.name, "parsed");
    Ok((program, lexed.errors))
}

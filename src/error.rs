use thiserror::Error;

use crate::codegen::CodegenError;
use crate::lexer::LexicalError;
use crate::parser::SyntaxError;
use crate::sema::{SemanticError, SemanticWarning};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error("{} error(s) found; no code generated", .lexical.len() + .semantic.len())]
    Rejected {
        lexical: Vec<LexicalError>,
        semantic: Vec<SemanticError>,
        warnings: Vec<SemanticWarning>,
    },
    #[error(transparent)]
    Codegen(#[from] CodegenError),
}

impl CompileError {
    /// Every diagnostic carried by this error, rendered one per line.
    pub fn diagnostics(&self) -> Vec<String> {
        match self {
            CompileError::Syntax(e) => vec![e.to_string()],
            CompileError::Rejected {
                lexical, semantic, ..
            } => lexical
                .iter()
                .map(ToString::to_string)
                .chain(semantic.iter().map(ToString::to_string))
                .collect(),
            CompileError::Codegen(e) => vec![e.to_string()],
        }
    }

    pub fn warnings(&self) -> &[SemanticWarning] {
        match self {
            CompileError::Rejected { warnings, .. } => warnings,
            _ => &[],
        }
    }
}

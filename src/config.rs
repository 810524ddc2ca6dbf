use crate::instr::Instr;

/// Instructions wrapped around every generated program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Framing {
    pub prologue: Vec<Instr>,
    pub epilogue: Vec<Instr>,
}

impl Default for Framing {
    /// EWVM entry convention.
    fn default() -> Self {
        Self {
            prologue: vec![Instr::PushI(0), Instr::PushI(0), Instr::Start],
            epilogue: vec![Instr::Stop],
        }
    }
}

impl Framing {
    pub fn bare() -> Self {
        Self {
            prologue: vec![],
            epilogue: vec![],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOptions {
    pub framing: Framing,
}

impl CompileOptions {
    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }
}

use std::fmt;

/// One line of EWVM assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instr {
    PushI(i32),
    PushS(String),
    PushN(i32),
    PushG(i32),
    StoreG(i32),
    PushL(i32),
    StoreL(i32),
    PushGp,
    PushFp,
    Padd,
    Load(i32),
    Store(i32),
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Equal,
    Not,
    Inf,
    InfEq,
    Sup,
    SupEq,
    And,
    Or,
    Jump(String),
    Jz(String),
    PushA(String),
    Call,
    Return,
    WriteI,
    WriteS,
    WriteLn,
    Read,
    Atoi,
    Dup(i32),
    Swap,
    Pop(i32),
    Start,
    Stop,
    Label(String),
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::PushI(n) => write!(f, "PUSHI {n}"),
            Instr::PushS(s) => write!(f, "PUSHS \"{}\"", escape(s)),
            Instr::PushN(n) => write!(f, "PUSHN {n}"),
            Instr::PushG(n) => write!(f, "PUSHG {n}"),
            Instr::StoreG(n) => write!(f, "STOREG {n}"),
            Instr::PushL(n) => write!(f, "PUSHL {n}"),
            Instr::StoreL(n) => write!(f, "STOREL {n}"),
            Instr::PushGp => f.write_str("PUSHGP"),
            Instr::PushFp => f.write_str("PUSHFP"),
            Instr::Padd => f.write_str("PADD"),
            Instr::Load(n) => write!(f, "LOAD {n}"),
            Instr::Store(n) => write!(f, "STORE {n}"),
            Instr::Add => f.write_str("ADD"),
            Instr::Sub => f.write_str("SUB"),
            Instr::Mul => f.write_str("MUL"),
            Instr::Div => f.write_str("DIV"),
            Instr::Mod => f.write_str("MOD"),
            Instr::Equal => f.write_str("EQUAL"),
            Instr::Not => f.write_str("NOT"),
            Instr::Inf => f.write_str("INF"),
            Instr::InfEq => f.write_str("INFEQ"),
            Instr::Sup => f.write_str("SUP"),
            Instr::SupEq => f.write_str("SUPEQ"),
            Instr::And => f.write_str("AND"),
            Instr::Or => f.write_str("OR"),
            Instr::Jump(l) => write!(f, "JUMP {l}"),
            Instr::Jz(l) => write!(f, "JZ {l}"),
            Instr::PushA(l) => write!(f, "PUSHA {l}"),
            Instr::Call => f.write_str("CALL"),
            Instr::Return => f.write_str("RETURN"),
            Instr::WriteI => f.write_str("WRITEI"),
            Instr::WriteS => f.write_str("WRITES"),
            Instr::WriteLn => f.write_str("WRITELN"),
            Instr::Read => f.write_str("READ"),
            Instr::Atoi => f.write_str("ATOI"),
            Instr::Dup(n) => write!(f, "DUP {n}"),
            Instr::Swap => f.write_str("SWAP"),
            Instr::Pop(n) => write!(f, "POP {n}"),
            Instr::Start => f.write_str("START"),
            Instr::Stop => f.write_str("STOP"),
            Instr::Label(l) => write!(f, "{l}:"),
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Newline-terminated listing, one instruction per line.
pub fn listing(code: &[Instr]) -> String {
    let mut out = String::new();
    for i in code {
        out.push_str(&i.to_string());
        out.push('\n');
    }
    out
}

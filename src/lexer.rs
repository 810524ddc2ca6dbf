use std::fmt;

use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;
use tracing::debug;

#[derive(Parser)]
#[grammar = "pascal.pest"]
struct PascalLexer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kw {
    Program,
    Begin,
    End,
    Var,
    Integer,
    Boolean,
    String,
    Array,
    Of,
    If,
    Then,
    Else,
    While,
    Do,
    For,
    To,
    Downto,
    Function,
    Procedure,
    Read,
    Readln,
    Write,
    Writeln,
    True,
    False,
    Div,
    Mod,
    And,
    Or,
    Not,
}

impl Kw {
    pub fn as_str(self) -> &'static str {
        match self {
            Kw::Program => "program",
            Kw::Begin => "begin",
            Kw::End => "end",
            Kw::Var => "var",
            Kw::Integer => "integer",
            Kw::Boolean => "boolean",
            Kw::String => "string",
            Kw::Array => "array",
            Kw::Of => "of",
            Kw::If => "if",
            Kw::Then => "then",
            Kw::Else => "else",
            Kw::While => "while",
            Kw::Do => "do",
            Kw::For => "for",
            Kw::To => "to",
            Kw::Downto => "downto",
            Kw::Function => "function",
            Kw::Procedure => "procedure",
            Kw::Read => "read",
            Kw::Readln => "readln",
            Kw::Write => "write",
            Kw::Writeln => "writeln",
            Kw::True => "true",
            Kw::False => "false",
            Kw::Div => "div",
            Kw::Mod => "mod",
            Kw::And => "and",
            Kw::Or => "or",
            Kw::Not => "not",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Keyword(Kw),
    Ident(String),
    IntConst(i32),
    /// Kept as written; real arithmetic is rejected later.
    RealConst(String),
    StrConst(String),
    Plus,
    Minus,
    Star,
    Slash,
    Assign,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Colon,
    Dot,
    DotDot,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Keyword(k) => k.as_str(),
            TokenKind::Ident(name) => return write!(f, "{name}"),
            TokenKind::IntConst(n) => return write!(f, "{n}"),
            TokenKind::RealConst(r) => return write!(f, "{r}"),
            TokenKind::StrConst(s) => return write!(f, "'{}'", s.replace('\'', "''")),
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Assign => ":=",
            TokenKind::Eq => "=",
            TokenKind::Ne => "<>",
            TokenKind::Lt => "<",
            TokenKind::Le => "<=",
            TokenKind::Gt => ">",
            TokenKind::Ge => ">=",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Semicolon => ";",
            TokenKind::Colon => ":",
            TokenKind::Dot => ".",
            TokenKind::DotDot => "..",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexicalError {
    #[error("illegal character '{ch}' at line {line}")]
    IllegalChar { ch: char, line: usize },
    #[error("integer literal {text} out of range at line {line}")]
    IntegerOutOfRange { text: String, line: usize },
}

impl LexicalError {
    pub fn line(&self) -> usize {
        match self {
            LexicalError::IllegalChar { line, .. }
            | LexicalError::IntegerOutOfRange { line, .. } => *line,
        }
    }
}

/// Result of scanning one compilation unit. Lexical errors never stop the
/// scan; the offending input is skipped and reported here.
#[derive(Debug, Default, Clone)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub errors: Vec<LexicalError>,
}

pub fn tokenize(src: &str) -> Lexed {
    let mut out = Lexed::default();
    // `illegal` matches any character, so the top rule accepts every input
    let Some(top) = PascalLexer::parse(Rule::tokens, src)
        .ok()
        .and_then(|mut pairs| pairs.next())
    else {
        return out;
    };

    for pair in top.into_inner() {
        let line = pair.line_col().0;
        let text = pair.as_str();
        let kind = match pair.as_rule() {
            Rule::EOI => break,
            Rule::illegal => {
                let ch = text.chars().next().unwrap_or('\0');
                out.errors.push(LexicalError::IllegalChar { ch, line });
                continue;
            }
            Rule::integer => match text.parse::<i32>() {
                Ok(n) => TokenKind::IntConst(n),
                Err(_) => {
                    out.errors.push(LexicalError::IntegerOutOfRange {
                        text: text.to_string(),
                        line,
                    });
                    continue;
                }
            },
            Rule::real => TokenKind::RealConst(text.to_string()),
            Rule::string => TokenKind::StrConst(unescape_string(text)),
            Rule::ident => TokenKind::Ident(text.to_string()),
            rule => match punct_or_keyword(rule) {
                Some(k) => k,
                None => continue,
            },
        };
        out.tokens.push(Token { kind, line });
    }

    debug!(
        tokens = out.tokens.len(),
        errors = out.errors.len(),
        "tokenized source"
    );
    out
}

fn punct_or_keyword(rule: Rule) -> Option<TokenKind> {
    let kw = match rule {
        Rule::kw_procedure => Kw::Procedure,
        Rule::kw_function => Kw::Function,
        Rule::kw_program => Kw::Program,
        Rule::kw_writeln => Kw::Writeln,
        Rule::kw_boolean => Kw::Boolean,
        Rule::kw_integer => Kw::Integer,
        Rule::kw_readln => Kw::Readln,
        Rule::kw_downto => Kw::Downto,
        Rule::kw_string => Kw::String,
        Rule::kw_begin => Kw::Begin,
        Rule::kw_array => Kw::Array,
        Rule::kw_false => Kw::False,
        Rule::kw_while => Kw::While,
        Rule::kw_write => Kw::Write,
        Rule::kw_then => Kw::Then,
        Rule::kw_true => Kw::True,
        Rule::kw_else => Kw::Else,
        Rule::kw_read => Kw::Read,
        Rule::kw_end => Kw::End,
        Rule::kw_for => Kw::For,
        Rule::kw_mod => Kw::Mod,
        Rule::kw_not => Kw::Not,
        Rule::kw_var => Kw::Var,
        Rule::kw_div => Kw::Div,
        Rule::kw_and => Kw::And,
        Rule::kw_do => Kw::Do,
        Rule::kw_if => Kw::If,
        Rule::kw_of => Kw::Of,
        Rule::kw_or => Kw::Or,
        Rule::kw_to => Kw::To,
        _ => {
            return Some(match rule {
                Rule::assign => TokenKind::Assign,
                Rule::le => TokenKind::Le,
                Rule::ge => TokenKind::Ge,
                Rule::ne => TokenKind::Ne,
                Rule::dotdot => TokenKind::DotDot,
                Rule::plus => TokenKind::Plus,
                Rule::minus => TokenKind::Minus,
                Rule::star => TokenKind::Star,
                Rule::slash => TokenKind::Slash,
                Rule::eq => TokenKind::Eq,
                Rule::lt => TokenKind::Lt,
                Rule::gt => TokenKind::Gt,
                Rule::lparen => TokenKind::LParen,
                Rule::rparen => TokenKind::RParen,
                Rule::lbracket => TokenKind::LBracket,
                Rule::rbracket => TokenKind::RBracket,
                Rule::comma => TokenKind::Comma,
                Rule::semicolon => TokenKind::Semicolon,
                Rule::colon => TokenKind::Colon,
                Rule::dot => TokenKind::Dot,
                _ => return None,
            })
        }
    };
    Some(TokenKind::Keyword(kw))
}

// 'it''s' and 'it\'s' both decode to it's. The grammar only lets a quote
// inside the literal appear doubled or escaped.
fn unescape_string(src: &str) -> String {
    let inner = src.strip_prefix('\'').unwrap_or(src);
    let inner = inner.strip_suffix('\'').unwrap_or(inner);
    let mut out = String::with_capacity(inner.len());
    let mut it = inner.chars();
    while let Some(ch) = it.next() {
        match ch {
            '\'' => {
                it.next();
                out.push('\'');
            }
            '\\' => match it.next() {
                Some(c @ ('\'' | '\\')) => out.push(c),
                Some(c) => {
                    out.push('\\');
                    out.push(c);
                }
                None => out.push('\\'),
            },
            _ => out.push(ch),
        }
    }
    out
}

use super::Value;

/// A template language token, e.g. `if` or `for`.
#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    // e.g. `<html><body></body></html>`
    Text(String),
    // e.g. `<% logged_in %>`
    Variable(String),
    // e.g. `<% "hello world" %>` or `<% 5 %>`
    Value(Value),
    // `<% if %>`
    If,
    // `<% elsif %>`
    ElseIf,
    // `<% else %>`
    Else,
    End,
    For,
    Foreach,
    In,
    As,
    // `<%`
    BlockStart,
    // `<%=`
    BlockStartPrint,
    // `<%-`
    BlockStartPrintRaw,
    // `%>`
    BlockEnd,
    Dot,
    And,
    Or,
    Not,
    Plus,
    Minus,
    Mod,
    Div,
    Mult,
    Equals,
    NotEquals,
    GreaterThan,
    GreaterEqualThan,
    LessThan,
    LessEqualThan,
    Assign,
    Arrow,
    Semicolon,
    SquareBracketStart,
    SquareBracketEnd,
    Comma,
    RoundBracketStart,
    RoundBracketEnd,
}

impl Token {
    /// Length of the token as written in the source, used to underline errors.
    pub fn len(&self) -> usize {
        match self {
            Token::Text(text) => text.chars().count(),
            Token::Variable(name) => name.chars().count(),
            Token::If | Token::In | Token::As => 2,
            Token::For | Token::End => 3,
            Token::Else => 4,
            Token::ElseIf => 5,
            Token::Foreach => 7,
            Token::BlockStartPrint | Token::BlockStartPrintRaw => 3,
            Token::BlockStart
            | Token::BlockEnd
            | Token::And
            | Token::Or
            | Token::Equals
            | Token::NotEquals
            | Token::GreaterEqualThan
            | Token::LessEqualThan
            | Token::Arrow => 2,
            Token::Value(_) => 0,
            _ => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub mod token;
pub mod value;

pub use token::Token;
pub use value::{ToTemplateValue, Value};

use super::Error;

use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, PartialEq)]
pub struct TokenWithContext {
    token: Token,
    line: usize,
    column: usize,
}

impl std::fmt::Display for TokenWithContext {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{:?} (line: {}, column: {})",
            self.token, self.line, self.column
        )
    }
}

impl TokenWithContext {
    pub fn new(token: Token, line: usize, column: usize) -> Self {
        Self {
            token,
            line,
            column,
        }
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn column(&self) -> usize {
        self.column
    }

    pub fn token(&self) -> Token {
        self.token.clone()
    }
}

/// The lexer converts executable template source
/// into a list of tokens that may mean something
/// in our template language.
///
/// Anything that's not inside a code block, e.g. `<% %>`, is considered
/// to be just text that needs to be printed as-is.
/// This text is represented by the special `Token::Text`. A literal `<%` is written as `<%%`.
pub struct Lexer<'a> {
    // Template source.
    source: &'a str,
    // Resulting tokens.
    tokens: Vec<TokenWithContext>,
    // Buffer for multi-character tokens.
    buffer: String,
    // Indicates if we're inside code block where
    // some characters have special meaning, e.g. `<% 5 / 3 %>`
    code_block: bool,
    // The code block doesn't print anything, so a newline right after it is dropped.
    statement_block: bool,
    // Which line we're on.
    line: usize,
    // Which column we're on.
    column: usize,
}

impl<'a> Lexer<'a> {
    /// Create new lexer from text input.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            tokens: vec![],
            buffer: String::new(),
            code_block: false,
            statement_block: false,
            line: 1,
            column: 0,
        }
    }

    /// Parse an input string into tokens supported by our template language.
    ///
    /// Tokens are processed one character at a time. Multi-character tokens like `if`
    /// or `for` are buffered and parsed as a string.
    pub fn tokens(mut self) -> Result<Vec<TokenWithContext>, Error> {
        let source = self.source;
        let mut iter = source.chars().peekable();

        while let Some(c) = self.advance(&mut iter) {
            if self.code_block {
                self.code(c, &mut iter)?;
            } else {
                self.text(c, &mut iter);
            }
        }

        self.drain_buffer();

        Ok(self.tokens)
    }

    fn advance(&mut self, iter: &mut Peekable<Chars>) -> Option<char> {
        let c = iter.next()?;

        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }

        Some(c)
    }

    fn text(&mut self, c: char, iter: &mut Peekable<Chars>) {
        if c != '<' || iter.peek() != Some(&'%') {
            self.buffer.push(c);
            return;
        }

        self.advance(iter);

        match iter.peek() {
            // `<%%` is a literal `<%`.
            Some('%') => {
                self.advance(iter);
                self.buffer.push_str("<%");
            }

            // `<%=` (print expression)
            Some('=') => {
                self.advance(iter);
                self.open_block(Token::BlockStartPrint);
            }

            // `<%-` (print without escaping)
            Some('-') => {
                self.advance(iter);
                self.open_block(Token::BlockStartPrintRaw);
            }

            // `<%` (code block start)
            _ => self.open_block(Token::BlockStart),
        }
    }

    fn open_block(&mut self, token: Token) {
        self.drain_buffer();
        self.statement_block = token == Token::BlockStart;
        self.push(token);
        self.code_block = true;
    }

    fn code(&mut self, c: char, iter: &mut Peekable<Chars>) -> Result<(), Error> {
        match c {
            // Whitespace separates tokens.
            ' ' | '\t' | '\r' | '\n' => self.drain_buffer(),

            // Potentially a code block end tag.
            '%' => {
                if iter.peek() == Some(&'>') {
                    self.advance(iter);
                    self.operator(Token::BlockEnd);
                    self.code_block = false;

                    if self.statement_block && iter.peek() == Some(&'\n') {
                        self.advance(iter);
                    }
                } else {
                    // Modulus operator, e.g. `5 % 3 == 2`
                    self.operator(Token::Mod);
                }
            }

            '"' | '\'' => {
                self.drain_buffer();
                let string = self.string(c, iter)?;
                self.push(Token::Value(Value::String(string)));
            }

            '.' => {
                // If we're parsing a number, keep the dot for the floating point
                // notation. Otherwise, it's an accessor for a method call or object attribute.
                let number =
                    !self.buffer.is_empty() && self.buffer.chars().all(|c| c.is_ascii_digit());
                let fraction = iter.peek().map(|c| c.is_ascii_digit()).unwrap_or(false);

                if number && fraction {
                    self.buffer.push('.');
                } else {
                    self.operator(Token::Dot);
                }
            }

            // `->` is an accessor too.
            '-' => {
                if iter.peek() == Some(&'>') {
                    self.advance(iter);
                    self.operator(Token::Dot);
                } else {
                    self.operator(Token::Minus);
                }
            }

            '!' => {
                if iter.peek() == Some(&'=') {
                    self.advance(iter);
                    self.operator(Token::NotEquals);
                } else {
                    self.operator(Token::Not);
                }
            }

            '=' => match iter.peek() {
                Some('=') => {
                    self.advance(iter);
                    self.operator(Token::Equals);
                }
                Some('>') => {
                    self.advance(iter);
                    self.operator(Token::Arrow);
                }
                _ => self.operator(Token::Assign),
            },

            '<' => {
                if iter.peek() == Some(&'=') {
                    self.advance(iter);
                    self.operator(Token::LessEqualThan);
                } else {
                    self.operator(Token::LessThan);
                }
            }

            '>' => {
                if iter.peek() == Some(&'=') {
                    self.advance(iter);
                    self.operator(Token::GreaterEqualThan);
                } else {
                    self.operator(Token::GreaterThan);
                }
            }

            '&' => {
                if iter.peek() == Some(&'&') {
                    self.advance(iter);
                }
                self.operator(Token::And);
            }

            '|' => {
                if iter.peek() == Some(&'|') {
                    self.advance(iter);
                }
                self.operator(Token::Or);
            }

            '+' => self.operator(Token::Plus),
            '*' => self.operator(Token::Mult),
            '/' => self.operator(Token::Div),
            ',' => self.operator(Token::Comma),
            ';' => self.operator(Token::Semicolon),
            '(' => self.operator(Token::RoundBracketStart),
            ')' => self.operator(Token::RoundBracketEnd),
            '[' => self.operator(Token::SquareBracketStart),
            ']' => self.operator(Token::SquareBracketEnd),

            // `$variable` is the same as `variable`.
            '$' if self.buffer.is_empty() => (),

            c => self.buffer.push(c),
        }

        Ok(())
    }

    // Read a string literal until the closing quote.
    fn string(&mut self, quote: char, iter: &mut Peekable<Chars>) -> Result<String, Error> {
        let mut string = String::new();

        while let Some(c) = self.advance(iter) {
            match c {
                '\\' => match self.advance(iter) {
                    Some('n') => string.push('\n'),
                    Some('t') => string.push('\t'),
                    Some(c) => string.push(c),
                    None => break,
                },
                c if c == quote => return Ok(string),
                c => string.push(c),
            }
        }

        Err(Error::Eof("string"))
    }

    fn operator(&mut self, token: Token) {
        self.drain_buffer();
        self.push(token);
    }

    // Handle multi-character tokens.
    fn drain_buffer(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        let s = std::mem::take(&mut self.buffer);

        if !self.code_block {
            self.push(Token::Text(s));
            return;
        }

        let token = match s.as_str() {
            "if" => Token::If,
            "elsif" | "elseif" => Token::ElseIf,
            "else" => Token::Else,
            "end" => Token::End,
            "for" => Token::For,
            "foreach" => Token::Foreach,
            "in" => Token::In,
            "as" => Token::As,
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "true" => Token::Value(Value::Boolean(true)),
            "false" => Token::Value(Value::Boolean(false)),
            "null" | "nil" => Token::Value(Value::Null),
            st => {
                if let Ok(integer) = st.parse::<i64>() {
                    Token::Value(Value::Integer(integer))
                } else if let Ok(float) = st.parse::<f64>() {
                    Token::Value(Value::Float(float))
                } else {
                    Token::Variable(s)
                }
            }
        };

        self.push(token);
    }

    // Add token to output with lexer context (e.g. line number).
    fn push(&mut self, token: Token) {
        self.tokens
            .push(TokenWithContext::new(token, self.line, self.column));
    }
}

// Easily tokenize strings.
pub trait Tokenize {
    // Parse a string and convert it to a list of tokens.
    fn tokenize(&self) -> Result<Vec<TokenWithContext>, Error>;
}

impl Tokenize for &str {
    fn tokenize(&self) -> Result<Vec<TokenWithContext>, Error> {
        Lexer::new(self).tokens()
    }
}

impl Tokenize for String {
    fn tokenize(&self) -> Result<Vec<TokenWithContext>, Error> {
        Lexer::new(self).tokens()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn tokens(source: &str) -> Result<Vec<Token>, Error> {
        Ok(source.tokenize()?.into_iter().map(|t| t.token()).collect())
    }

    #[test]
    fn test_tokenize_basic() -> Result<(), Error> {
        let tokens = tokens(r#"<title><%= title %></title><% if count >= 1 && $ok %>yes<% end %>"#)?;

        assert_eq!(
            tokens,
            vec![
                Token::Text("<title>".into()),
                Token::BlockStartPrint,
                Token::Variable("title".into()),
                Token::BlockEnd,
                Token::Text("</title>".into()),
                Token::BlockStart,
                Token::If,
                Token::Variable("count".into()),
                Token::GreaterEqualThan,
                Token::Value(Value::Integer(1)),
                Token::And,
                Token::Variable("ok".into()),
                Token::BlockEnd,
                Token::Text("yes".into()),
                Token::BlockStart,
                Token::End,
                Token::BlockEnd,
            ]
        );

        Ok(())
    }

    #[test]
    fn test_literal_block_start() -> Result<(), Error> {
        assert_eq!(
            tokens("a <%% b %> c")?,
            vec![Token::Text("a <% b %> c".into())]
        );

        Ok(())
    }

    #[test]
    fn test_statement_block_newline() -> Result<(), Error> {
        assert_eq!(
            tokens("<% x = 1 %>\nline\n<%= x %>\n")?,
            vec![
                Token::BlockStart,
                Token::Variable("x".into()),
                Token::Assign,
                Token::Value(Value::Integer(1)),
                Token::BlockEnd,
                Token::Text("line\n".into()),
                Token::BlockStartPrint,
                Token::Variable("x".into()),
                Token::BlockEnd,
                Token::Text("\n".into()),
            ]
        );

        Ok(())
    }

    #[test]
    fn test_strings_and_numbers() -> Result<(), Error> {
        assert_eq!(
            tokens(r#"<%- render('it\'s', ["a" => 1.5]) %>"#)?,
            vec![
                Token::BlockStartPrintRaw,
                Token::Variable("render".into()),
                Token::RoundBracketStart,
                Token::Value(Value::String("it's".into())),
                Token::Comma,
                Token::SquareBracketStart,
                Token::Value(Value::String("a".into())),
                Token::Arrow,
                Token::Value(Value::Float(1.5)),
                Token::SquareBracketEnd,
                Token::RoundBracketEnd,
                Token::BlockEnd,
            ]
        );

        assert_eq!(
            tokens("<%= user->name.0 %>")?,
            vec![
                Token::BlockStartPrint,
                Token::Variable("user".into()),
                Token::Dot,
                Token::Variable("name".into()),
                Token::Dot,
                Token::Value(Value::Integer(0)),
                Token::BlockEnd,
            ]
        );

        Ok(())
    }

    #[test]
    fn test_unterminated_string() {
        assert!(matches!(
            r#"<%= "open %>"#.tokenize(),
            Err(Error::Eof("string"))
        ));
    }
}

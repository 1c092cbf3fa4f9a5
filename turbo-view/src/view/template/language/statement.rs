//! Template language statements, e.g. `<% if %>`, `<% for %>` or `<%= print %>`.
use super::{
    super::lexer::{Token, TokenWithContext, Value},
    super::Context,
    super::Error,
    Expression, Interpreter, Term,
};

use std::iter::{Iterator, Peekable};

/// A statement is a block of code that does something, e.g.
/// prints a value, loops over a list, or branches on a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    // `<%= expression %>` (escaped) or `<%- expression %>` (raw).
    Print {
        expression: Expression,
        escape: bool,
    },

    // `<% render("nav") %>`, evaluated only for side effects.
    Expression {
        expression: Expression,
    },

    // `<% title = "Home" %>`
    Assign {
        name: String,
        expression: Expression,
    },

    // `<% if expression %> ... <% elsif other %> ... <% else %> ... <% end %>`.
    // `elsif` is an `if` nested in the else body.
    If {
        expression: Expression,
        if_body: Vec<Statement>,
        else_body: Vec<Statement>,
    },

    // `<% for item in list %>` or `<% foreach list as key => value %>`.
    For {
        variables: Vec<String>,
        list: Expression,
        body: Vec<Statement>,
    },

    // Anything outside of code blocks.
    Text {
        text: String,
    },
}

// Tokens closing a block body.
enum BlockEnd {
    End(TokenWithContext),
    Else(TokenWithContext),
    ElseIf(TokenWithContext),
}

impl BlockEnd {
    fn token(self) -> TokenWithContext {
        match self {
            BlockEnd::End(token) | BlockEnd::Else(token) | BlockEnd::ElseIf(token) => token,
        }
    }
}

// What a code block parsed into. Block ends are
// only allowed where an `if` or a loop expects them.
enum Parsed {
    Statement(Statement),
    BlockEnd(BlockEnd),
}

impl Statement {
    /// Evaluate the statement, writing output to the interpreter.
    pub fn evaluate(
        &self,
        context: &mut Context,
        interpreter: &mut dyn Interpreter,
    ) -> Result<(), Error> {
        match self {
            Statement::Text { text } => interpreter.write(text),

            Statement::Print {
                expression,
                escape: true,
            } => {
                let value = match expression.evaluate(context, interpreter) {
                    Ok(value) => value,
                    Err(Error::UndefinedVariable(_)) => Value::Null,
                    Err(err) => return Err(err),
                };

                interpreter.write(&crate::escape_html(&value.to_string()));
            }

            Statement::Print {
                expression,
                escape: false,
            } => {
                let value = expression.evaluate(context, interpreter)?;
                interpreter.write(&value.to_string());
            }

            Statement::Expression { expression } => {
                expression.evaluate(context, interpreter)?;
            }

            Statement::Assign { name, expression } => {
                let value = expression.evaluate(context, interpreter)?;
                context.insert(name, value);
            }

            Statement::If {
                expression,
                if_body,
                else_body,
            } => {
                let body = if expression.evaluate(context, interpreter)?.truthy() {
                    if_body
                } else {
                    else_body
                };

                for statement in body {
                    statement.evaluate(context, interpreter)?;
                }
            }

            Statement::For {
                variables,
                list,
                body,
            } => {
                let items = Self::items(list.evaluate(context, interpreter)?, variables.len())?;

                // Loop variables and assignments stay inside the loop.
                let mut scope = context.clone();

                for values in items {
                    for (name, value) in variables.iter().zip(values) {
                        scope.insert(name, value);
                    }

                    for statement in body {
                        statement.evaluate(&mut scope, interpreter)?;
                    }
                }
            }
        }

        Ok(())
    }

    // Values bound to loop variables on each iteration.
    fn items(value: Value, variables: usize) -> Result<Vec<Vec<Value>>, Error> {
        let pairs = variables > 1;

        Ok(match value {
            Value::List(list) => list
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    if pairs {
                        vec![Value::Integer(i as i64), item]
                    } else {
                        vec![item]
                    }
                })
                .collect(),

            Value::Hash(hash) => hash
                .into_iter()
                .map(|(key, value)| {
                    if pairs {
                        vec![Value::String(key), value]
                    } else {
                        vec![value]
                    }
                })
                .collect(),

            Value::Null => vec![],

            value => {
                return Err(Error::Runtime(format!(
                    "cannot loop over \"{}\", expected a list or a hash",
                    value
                )))
            }
        })
    }

    /// Parse a statement from a token stream.
    pub fn parse(iter: &mut Peekable<impl Iterator<Item = TokenWithContext>>) -> Result<Self, Error> {
        match Self::parse_block(iter)? {
            Parsed::Statement(statement) => Ok(statement),
            Parsed::BlockEnd(end) => Err(Error::Syntax(end.token())),
        }
    }

    fn parse_block(
        iter: &mut Peekable<impl Iterator<Item = TokenWithContext>>,
    ) -> Result<Parsed, Error> {
        let next = iter.peek().ok_or(Error::Eof("statement"))?.clone();

        match next.token() {
            Token::Text(text) => {
                let _ = iter.next();
                Ok(Parsed::Statement(Statement::Text { text }))
            }

            Token::BlockStartPrint | Token::BlockStartPrintRaw => {
                let _ = iter.next();
                let expression = Expression::parse(iter)?;
                Self::expect_block_end(iter)?;

                Ok(Parsed::Statement(Statement::Print {
                    expression,
                    escape: next.token() == Token::BlockStartPrint,
                }))
            }

            Token::BlockStart => {
                let _ = iter.next();
                Self::code(iter)
            }

            // Next statement in the same code block, after a `;`.
            _ => Self::code(iter),
        }
    }

    fn code(iter: &mut Peekable<impl Iterator<Item = TokenWithContext>>) -> Result<Parsed, Error> {
        let next = iter.peek().ok_or(Error::Eof("code block"))?.clone();

        match next.token() {
            // Empty block, e.g. `<% %>`.
            Token::BlockEnd => {
                let _ = iter.next();
                Ok(Parsed::Statement(Statement::Text {
                    text: String::new(),
                }))
            }

            Token::If => {
                let _ = iter.next();
                Ok(Parsed::Statement(Self::if_statement(iter)?))
            }

            Token::For => {
                let _ = iter.next();
                Ok(Parsed::Statement(Self::for_statement(iter)?))
            }

            Token::Foreach => {
                let _ = iter.next();
                Ok(Parsed::Statement(Self::foreach_statement(iter)?))
            }

            Token::End => {
                let _ = iter.next();
                Self::statement_end(iter)?;
                Ok(Parsed::BlockEnd(BlockEnd::End(next)))
            }

            Token::Else => {
                let _ = iter.next();
                Self::statement_end(iter)?;
                Ok(Parsed::BlockEnd(BlockEnd::Else(next)))
            }

            Token::ElseIf => {
                let _ = iter.next();
                Ok(Parsed::BlockEnd(BlockEnd::ElseIf(next)))
            }

            _ => {
                let expression = Expression::parse(iter)?;

                let statement = match iter.peek().map(|t| t.token()) {
                    Some(Token::Assign) => {
                        let assign = iter.next().ok_or(Error::Eof("assignment"))?;

                        let name = match expression {
                            Expression::Term {
                                term: Term::Variable(name),
                            } => name,
                            _ => return Err(Error::Syntax(assign)),
                        };

                        Statement::Assign {
                            name,
                            expression: Expression::parse(iter)?,
                        }
                    }

                    _ => Statement::Expression { expression },
                };

                Self::statement_end(iter)?;
                Ok(Parsed::Statement(statement))
            }
        }
    }

    fn if_statement(iter: &mut Peekable<impl Iterator<Item = TokenWithContext>>) -> Result<Self, Error> {
        let expression = Expression::parse(iter)?;
        Self::statement_end(iter)?;

        let (if_body, end) = Self::body(iter, "if")?;

        let else_body = match end {
            BlockEnd::End(_) => vec![],

            BlockEnd::Else(_) => match Self::body(iter, "else")? {
                (else_body, BlockEnd::End(_)) => else_body,
                (_, end) => return Err(Error::Syntax(end.token())),
            },

            // `elsif` closes this `if` and opens another one,
            // which consumes the final `end`.
            BlockEnd::ElseIf(_) => vec![Self::if_statement(iter)?],
        };

        Ok(Statement::If {
            expression,
            if_body,
            else_body,
        })
    }

    // `<% for item in list %>` or `<% for key, value in hash %>`
    fn for_statement(
        iter: &mut Peekable<impl Iterator<Item = TokenWithContext>>,
    ) -> Result<Self, Error> {
        let mut variables = vec![];

        loop {
            let next = iter.next().ok_or(Error::Eof("for loop"))?;

            match next.token() {
                Token::Variable(name) => variables.push(name),
                Token::Comma if !variables.is_empty() => continue,
                Token::In if !variables.is_empty() => break,
                _ => return Err(Error::Syntax(next)),
            }
        }

        let list = Expression::parse(iter)?;
        Self::statement_end(iter)?;

        Self::loop_body(variables, list, iter)
    }

    // `<% foreach list as item %>` or `<% foreach hash as key => value %>`
    fn foreach_statement(
        iter: &mut Peekable<impl Iterator<Item = TokenWithContext>>,
    ) -> Result<Self, Error> {
        let list = Expression::parse(iter)?;

        let next = iter.next().ok_or(Error::Eof("foreach loop"))?;
        if next.token() != Token::As {
            return Err(Error::WrongToken(next, Token::As));
        }

        let mut variables = vec![Self::loop_variable(iter)?];

        if iter.peek().map(|t| t.token()) == Some(Token::Arrow) {
            let _ = iter.next();
            variables.push(Self::loop_variable(iter)?);
        }

        Self::statement_end(iter)?;

        Self::loop_body(variables, list, iter)
    }

    fn loop_variable(
        iter: &mut Peekable<impl Iterator<Item = TokenWithContext>>,
    ) -> Result<String, Error> {
        let next = iter.next().ok_or(Error::Eof("loop variable"))?;

        match next.token() {
            Token::Variable(name) => Ok(name),
            _ => Err(Error::Syntax(next)),
        }
    }

    fn loop_body(
        variables: Vec<String>,
        list: Expression,
        iter: &mut Peekable<impl Iterator<Item = TokenWithContext>>,
    ) -> Result<Self, Error> {
        let (body, end) = Self::body(iter, "for loop")?;

        match end {
            BlockEnd::End(_) => Ok(Statement::For {
                variables,
                list,
                body,
            }),
            end => Err(Error::Syntax(end.token())),
        }
    }

    // Parse statements until a block end, e.g. `<% end %>` or `<% else %>`.
    fn body(
        iter: &mut Peekable<impl Iterator<Item = TokenWithContext>>,
        what: &'static str,
    ) -> Result<(Vec<Statement>, BlockEnd), Error> {
        let mut statements = vec![];

        loop {
            if iter.peek().is_none() {
                return Err(Error::Eof(what));
            }

            match Self::parse_block(iter)? {
                Parsed::Statement(statement) => statements.push(statement),
                Parsed::BlockEnd(end) => return Ok((statements, end)),
            }
        }
    }

    fn expect_block_end(
        iter: &mut Peekable<impl Iterator<Item = TokenWithContext>>,
    ) -> Result<(), Error> {
        let next = iter.next().ok_or(Error::Eof("block end"))?;

        match next.token() {
            Token::BlockEnd => Ok(()),
            _ => Err(Error::WrongToken(next, Token::BlockEnd)),
        }
    }

    // A statement inside a code block ends with `%>` or `;`.
    fn statement_end(
        iter: &mut Peekable<impl Iterator<Item = TokenWithContext>>,
    ) -> Result<(), Error> {
        let next = match iter.next() {
            Some(next) => next,
            None => return Ok(()),
        };

        match next.token() {
            Token::BlockEnd | Token::Semicolon => Ok(()),
            _ => Err(Error::WrongToken(next, Token::BlockEnd)),
        }
    }
}

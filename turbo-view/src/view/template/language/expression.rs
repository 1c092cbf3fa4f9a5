use super::{
    super::lexer::{Token, TokenWithContext, Value},
    super::Context,
    super::Error,
    Interpreter, Op, Term,
};

use std::collections::BTreeMap;
use std::iter::{Iterator, Peekable};

/// An expression, like `5 == 6` or `logged_in == false`,
/// which when evaluated produces a single value, e.g. `true`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    // Standard `5 + 6`-style expression.
    // It's recursive, so you can have something like `(5 + 6) / (1 - 5)`.
    Binary {
        left: Box<Expression>,
        op: Op,
        right: Box<Expression>,
    },

    Unary {
        op: Op,
        operand: Box<Expression>,
    },

    // Base case for recursive expression parsing, which evaluates to the value
    // of the term, e.g. `5` evaluates to `5` or `variable_name` evaluates to whatever
    // the variable is set to in the context.
    Term {
        term: Term,
    },

    // A list of expressions, e.g.
    // `[1, 2, variable, "hello world"]`
    //
    // The list is dynamically evaluated at runtime, so it can contain variables
    // and constants, as long as the variable is in scope.
    List {
        terms: Vec<Expression>,
    },

    // `["title" => "Home", "count" => 5]`
    Hash {
        pairs: Vec<(Expression, Expression)>,
    },

    // Call a method on a value, e.g. `name.upcase`, or a global
    // function when the term is the interpreter, e.g. `render("nav")`.
    Function {
        term: Box<Expression>,
        name: String,
        args: Vec<Expression>,
    },

    // `list[0]` or `hash["key"]`
    Index {
        term: Box<Expression>,
        index: Box<Expression>,
    },

    Interpreter,
}

impl Expression {
    /// Create new constant expression (term).
    pub fn constant(value: Value) -> Self {
        Self::Term {
            term: Term::constant(value),
        }
    }

    /// Create new variable expression (term).
    pub fn variable(variable: String) -> Self {
        Self::Term {
            term: Term::variable(variable),
        }
    }

    /// Evaluate the expression to a value given the context.
    pub fn evaluate(
        &self,
        context: &Context,
        interpreter: &mut dyn Interpreter,
    ) -> Result<Value, Error> {
        match self {
            Expression::Term { term } => match term.evaluate(context) {
                Ok(value) => Ok(value),

                // A bare name that isn't a variable could be a global
                // function called without arguments, e.g. `<%= csrf_token %>`.
                Err(Error::UndefinedVariable(name)) => {
                    match interpreter.call(term.name(), &[], context) {
                        Ok(value) => Ok(value),
                        Err(Error::UnknownMethod(_, "global")) => {
                            Err(Error::UndefinedVariable(name))
                        }
                        Err(err) => Err(err),
                    }
                }
                Err(err) => Err(err),
            },

            Expression::Binary { left, op, right } => {
                let left = left.evaluate(context, interpreter)?;

                // Short-circuit, so `user and user.admin` doesn't evaluate the right side.
                match op {
                    Op::And if !left.truthy() => return Ok(Value::Boolean(false)),
                    Op::Or if left.truthy() => return Ok(Value::Boolean(true)),
                    _ => (),
                }

                let right = right.evaluate(context, interpreter)?;
                Ok(op.evaluate_binary(&left, &right))
            }

            Expression::Unary { op, operand } => {
                let operand = operand.evaluate(context, interpreter)?;
                Ok(op.evaluate_unary(&operand))
            }

            Expression::List { terms } => {
                let mut list = vec![];
                for term in terms {
                    list.push(term.evaluate(context, interpreter)?);
                }
                Ok(Value::List(list))
            }

            Expression::Hash { pairs } => {
                let mut hash = BTreeMap::new();
                for (key, value) in pairs {
                    let key = key.evaluate(context, interpreter)?.to_string();
                    let value = value.evaluate(context, interpreter)?;
                    hash.insert(key, value);
                }
                Ok(Value::Hash(hash))
            }

            Expression::Index { term, index } => {
                let value = term.evaluate(context, interpreter)?;
                let index = index.evaluate(context, interpreter)?;
                Ok(value.index(&index))
            }

            Expression::Function { term, name, args } => {
                let global = matches!(**term, Expression::Interpreter);

                // Allow to pass undefined variables to `default`.
                // Typically that's not great, but the purpose of this function
                // is to catch such cases and replace with a default value (presumably defined).
                let allow_undefined = global && name == "default";

                let args = args
                    .iter()
                    .map(|arg| match arg.evaluate(context, interpreter) {
                        Err(Error::UndefinedVariable(_)) if allow_undefined => Ok(Value::Null),
                        result => result,
                    })
                    .collect::<Result<Vec<Value>, Error>>()?;

                if global {
                    interpreter.call(name, &args, context)
                } else {
                    term.evaluate(context, interpreter)?.call(name, &args)
                }
            }

            Expression::Interpreter => Ok(Value::Null),
        }
    }

    fn term(iter: &mut Peekable<impl Iterator<Item = TokenWithContext>>) -> Result<Self, Error> {
        let next = iter.next().ok_or(Error::Eof("expression"))?;

        let expr = match next.token() {
            Token::Not => {
                return Ok(Expression::Unary {
                    op: Op::Not,
                    operand: Box::new(Self::term(iter)?),
                })
            }

            Token::Minus => {
                return Ok(Expression::Unary {
                    op: Op::Sub,
                    operand: Box::new(Self::term(iter)?),
                })
            }

            Token::Plus => {
                return Ok(Expression::Unary {
                    op: Op::Add,
                    operand: Box::new(Self::term(iter)?),
                })
            }

            Token::RoundBracketStart => {
                let expr = Self::parse(iter)?;
                Self::expect(iter, Token::RoundBracketEnd)?;
                expr
            }

            Token::Variable(name) => match iter.peek().map(|t| t.token()) {
                Some(Token::RoundBracketStart) => Expression::Function {
                    term: Box::new(Expression::Interpreter),
                    args: Self::args(iter)?,
                    name,
                },
                _ => Self::variable(name),
            },

            Token::Value(value) => Self::constant(value),

            Token::SquareBracketStart => Self::collection(iter)?,

            _ => return Err(Error::ExpressionSyntax(next)),
        };

        Self::accessor(expr, iter)
    }

    // List or hash literal, the opening bracket is already consumed.
    fn collection(iter: &mut Peekable<impl Iterator<Item = TokenWithContext>>) -> Result<Self, Error> {
        let mut terms = vec![];
        let mut pairs = vec![];

        if iter.peek().map(|t| t.token()) == Some(Token::SquareBracketEnd) {
            let _ = iter.next();
            return Ok(Expression::List { terms });
        }

        loop {
            let expr = Self::parse(iter)?;
            let mut next = iter.next().ok_or(Error::Eof("list"))?;

            if next.token() == Token::Arrow {
                if !terms.is_empty() {
                    return Err(Error::ExpressionSyntax(next));
                }

                pairs.push((expr, Self::parse(iter)?));
                next = iter.next().ok_or(Error::Eof("hash"))?;
            } else if !pairs.is_empty() {
                return Err(Error::ExpressionSyntax(next));
            } else {
                terms.push(expr);
            }

            match next.token() {
                Token::SquareBracketEnd => break,
                Token::Comma => continue,
                _ => return Err(Error::ExpressionSyntax(next)),
            }
        }

        if pairs.is_empty() {
            Ok(Expression::List { terms })
        } else {
            Ok(Expression::Hash { pairs })
        }
    }

    // Function call arguments, e.g. `("nav", ["active" => true])`.
    fn args(iter: &mut Peekable<impl Iterator<Item = TokenWithContext>>) -> Result<Vec<Self>, Error> {
        Self::expect(iter, Token::RoundBracketStart)?;

        let mut args = vec![];

        if iter.peek().map(|t| t.token()) == Some(Token::RoundBracketEnd) {
            let _ = iter.next();
            return Ok(args);
        }

        loop {
            args.push(Self::parse(iter)?);

            let next = iter.next().ok_or(Error::Eof("function arguments"))?;
            match next.token() {
                Token::Comma => continue,
                Token::RoundBracketEnd => break,
                _ => return Err(Error::WrongToken(next, Token::RoundBracketEnd)),
            }
        }

        Ok(args)
    }

    fn accessor(
        mut expr: Self,
        iter: &mut Peekable<impl Iterator<Item = TokenWithContext>>,
    ) -> Result<Self, Error> {
        loop {
            let accessor = iter.peek().map(|t| t.token());

            expr = match accessor {
                Some(Token::Dot) => {
                    let _ = iter.next();
                    let name = iter.next().ok_or(Error::Eof("accessor name"))?;
                    let name = match name.token() {
                        Token::Variable(name) => name,
                        Token::Value(Value::Integer(n)) => n.to_string(),
                        _ => return Err(Error::ExpressionSyntax(name)),
                    };

                    let args = match iter.peek().map(|t| t.token()) {
                        Some(Token::RoundBracketStart) => Self::args(iter)?,
                        _ => vec![],
                    };

                    Expression::Function {
                        term: Box::new(expr),
                        name,
                        args,
                    }
                }

                Some(Token::SquareBracketStart) => {
                    let _ = iter.next();
                    let index = Self::parse(iter)?;
                    Self::expect(iter, Token::SquareBracketEnd)?;

                    Expression::Index {
                        term: Box::new(expr),
                        index: Box::new(index),
                    }
                }

                Some(_) | None => return Ok(expr),
            };
        }
    }

    fn expect(
        iter: &mut Peekable<impl Iterator<Item = TokenWithContext>>,
        token: Token,
    ) -> Result<(), Error> {
        let next = iter.next().ok_or(Error::Eof("expression"))?;

        if next.token() == token {
            Ok(())
        } else {
            Err(Error::WrongToken(next, token))
        }
    }

    // Precedence climbing: keep folding operators that bind
    // tighter than `limit` into the left side.
    fn binary(
        iter: &mut Peekable<impl Iterator<Item = TokenWithContext>>,
        limit: u8,
    ) -> Result<Self, Error> {
        let mut left = Self::term(iter)?;

        loop {
            let op = match iter.peek().and_then(|t| Op::from_token(t.token())) {
                Some(op) if op.binary() && op.precedence() < limit => op,
                _ => return Ok(left),
            };

            let _ = iter.next();
            let right = Self::binary(iter, op.precedence())?;

            left = Expression::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
    }

    /// Recursively parse the expression.
    ///
    /// Consumes language tokens automatically.
    pub fn parse(
        iter: &mut Peekable<impl Iterator<Item = TokenWithContext>>,
    ) -> Result<Self, Error> {
        Self::binary(iter, u8::MAX)
    }
}

//! Expression term, a single entity in an expression.
use super::super::{
    lexer::{Token, Value},
    Context,
};
use crate::view::template::error::Error;

/// Expression term.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Constant(Value),
    Variable(String),
}

impl Term {
    /// Convert a token into a term. If the token isn't a term, return `None`.
    pub fn from_token(token: Token) -> Option<Self> {
        Option::<Self>::from(token)
    }

    /// Create a constant term from a value. Constant terms are evaluated to the value.
    pub fn constant(value: Value) -> Self {
        Term::Constant(value)
    }

    /// Create a variable term. The term requires a context to be evaluated.
    pub fn variable(name: String) -> Self {
        Term::Variable(name)
    }

    /// Evaluate the term given the context.
    pub fn evaluate(&self, context: &Context) -> Result<Value, Error> {
        match self {
            Term::Constant(value) => Ok(value.clone()),
            Term::Variable(name) => context
                .get(name)
                .ok_or_else(|| Error::UndefinedVariable(name.clone())),
        }
    }

    /// Get the term name, i.e. what it's called in the code.
    /// Constant terms don't have names.
    pub fn name(&self) -> &str {
        match self {
            Term::Variable(name) => name,
            Term::Constant(_) => "",
        }
    }
}

impl From<Token> for Option<Term> {
    fn from(token: Token) -> Option<Term> {
        Some(match token {
            Token::Variable(name) => Term::Variable(name),
            Token::Value(value) => Term::Constant(value),
            _ => return None,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::view::template::Lexer;

    #[test]
    fn test_terms() -> Result<(), Error> {
        let tokens = Lexer::new("<% 1 %>").tokens()?;
        let integer = Term::from_token(tokens[1].token());
        assert_eq!(
            integer.expect("integer").evaluate(&Context::default())?,
            Value::Integer(1)
        );

        let tokens = Lexer::new(r#"<% "string" %>"#).tokens()?;
        let string = Term::from_token(tokens[1].token());
        assert_eq!(
            string.expect("string").evaluate(&Context::default())?,
            Value::String("string".into())
        );

        let tokens = Lexer::new("<% 1.54 %>").tokens()?;
        let float = Term::from_token(tokens[1].token());
        assert_eq!(
            float.expect("float").evaluate(&Context::default())?,
            Value::Float(1.54)
        );

        let tokens = Lexer::new("<% $variable %>").tokens()?;
        let variable = Term::from_token(tokens[1].token()).expect("variable");
        let context = Context::try_from([("variable", "test")])?;
        assert_eq!(variable.name(), "variable");
        assert_eq!(variable.evaluate(&context)?, Value::String("test".into()));
        assert!(matches!(
            variable.evaluate(&Context::new()),
            Err(Error::UndefinedVariable(_))
        ));

        Ok(())
    }
}

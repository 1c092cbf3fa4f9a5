//! Executable template.
//!
//! A program is a list of statements.
use super::super::{Context, Error, TokenWithContext, Tokenize};
use super::{Buffer, Interpreter, Statement};

/// Executable program.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    statements: Vec<Statement>,
}

impl Program {
    /// Evaluate the program given the context. The context contains variable definitions;
    /// assignments made by the program stay in this copy.
    pub fn evaluate(
        &self,
        context: &mut Context,
        interpreter: &mut dyn Interpreter,
    ) -> Result<(), Error> {
        for statement in &self.statements {
            statement.evaluate(context, interpreter)?;
        }

        Ok(())
    }

    /// Evaluate the program without global functions and return its output.
    pub fn render(&self, context: &Context) -> Result<String, Error> {
        let mut buffer = Buffer::new();
        self.evaluate(&mut context.clone(), &mut buffer)?;

        Ok(buffer.into_string())
    }

    /// Parse the program from a list of tokens.
    pub fn parse(tokens: Vec<TokenWithContext>) -> Result<Self, Error> {
        let mut iter = tokens.into_iter().peekable();
        let mut statements = vec![];

        while iter.peek().is_some() {
            let statement = Statement::parse(&mut iter)?;
            statements.push(statement);
        }

        Ok(Program { statements })
    }

    /// Compile the program from executable source.
    pub fn from_str(source: &str) -> Result<Self, Error> {
        let tokens = source.tokenize()?;
        Program::parse(tokens)
    }
}

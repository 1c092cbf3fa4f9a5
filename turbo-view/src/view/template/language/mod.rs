//! Implementation of the template language.
//!
//! Includes the parser and the evaluator. Evaluation writes output
//! and calls global functions through an [`Interpreter`].
pub mod expression;
pub mod op;
pub mod program;
pub mod statement;
pub mod term;

pub use expression::Expression;
pub use op::Op;
pub use program::Program;
pub use statement::Statement;
pub use term::Term;

use super::{Context, Error, Value};

/// Where a program sends its output and global function calls.
pub trait Interpreter {
    /// Append text to the output that's currently being captured.
    fn write(&mut self, text: &str);

    /// Call a global function, e.g. `render("nav")` or `csrf_field()`.
    ///
    /// Unknown functions return `Error::UnknownMethod(name, "global")`.
    fn call(&mut self, name: &str, args: &[Value], context: &Context) -> Result<Value, Error>;
}

/// Interpreter without global functions that collects output into a string.
#[derive(Default, Debug)]
pub struct Buffer {
    output: String,
}

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_string(self) -> String {
        self.output
    }
}

impl Interpreter for Buffer {
    fn write(&mut self, text: &str) {
        self.output.push_str(text);
    }

    fn call(&mut self, name: &str, _args: &[Value], _context: &Context) -> Result<Value, Error> {
        Err(Error::UnknownMethod(name.into(), "global"))
    }
}

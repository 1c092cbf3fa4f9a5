use super::{Token, TokenWithContext};
use thiserror::Error;

use std::path::Path;

#[derive(Error, Debug)]
pub enum Error {
    #[error("syntax error")]
    Syntax(TokenWithContext),

    #[error("expression syntax error")]
    ExpressionSyntax(TokenWithContext),

    #[error("expected token \"{1:?}\", but have token \"{0}\" instead")]
    WrongToken(TokenWithContext, Token),

    #[error("reached end of file while performing \"{0}\", did you forget a closing tag?")]
    Eof(&'static str),

    #[error("variable \"{0}\" is not defined or in scope")]
    UndefinedVariable(String),

    #[error("method \"{0}\" is not defined on {1}")]
    UnknownMethod(String, &'static str),

    #[error("template \"{0}\" does not exist")]
    TemplateDoesNotExist(String),

    #[error("cannot end a section, no section is open")]
    NoOpenSection,

    #[error("section and cache blocks are not closed in the order they were opened")]
    UnbalancedCapture,

    #[error("block \"{0}\" was opened but never closed")]
    Unclosed(&'static str),

    #[error("layouts and partials are nested too deeply while rendering \"{0}\"")]
    LayoutTooDeep(String),

    #[error("{0}")]
    Runtime(String),

    #[error("serialization error")]
    SerializationError,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to format a timestamp correctly, error: \"{0}\"")]
    TimeFormatError(#[from] time::error::Format),

    /// An error shown with the template it happened in.
    #[error("{message}")]
    Pretty {
        message: String,
        #[source]
        error: Box<Error>,
    },
}

impl Error {
    /// Render the error with the offending line of source underlined.
    pub fn pretty(self, source: &str, path: Option<impl AsRef<Path> + Copy>) -> Self {
        let token = match self {
            Error::Syntax(ref token) => token,
            Error::ExpressionSyntax(ref token) => token,
            Error::WrongToken(ref token, _) => token,
            Error::Pretty { .. } => return self,
            _ => {
                if let Some(path) = path {
                    let prefix = "---> ";
                    let message = format!(
                        "{}{}\n\n{}{}",
                        prefix,
                        path.as_ref().display(),
                        " ".repeat(prefix.len()),
                        self
                    );
                    return self.wrap(message);
                } else {
                    return self;
                }
            }
        };

        let error_msg = match self {
            Error::Syntax(_) => "syntax error",
            Error::ExpressionSyntax(_) => "expression syntax error",
            Error::WrongToken(_, _) => "unexpected token",
            _ => "",
        };

        let context = source.lines().nth(std::cmp::max(1, token.line()) - 1); // lines start at 0
        let leading_spaces = if let Some(context) = context {
            context.len() - context.trim_start().len()
        } else {
            0
        };

        let underline = " ".repeat(std::cmp::max(
            0,
            token.column() as i64 - token.token().len() as i64 + 1 - leading_spaces as i64,
        ) as usize)
            + &format!("^ {}", error_msg);

        let line_number = format!("{} | ", token.line());
        let underline_offset = " ".repeat(token.line().to_string().len()) + " | ";

        let path = if let Some(path) = path {
            format!(
                "---> {}:{}:{}\n\n",
                path.as_ref().display(),
                token.line(),
                token.column()
            )
        } else {
            "".to_string()
        };

        if let Some(context) = context {
            let message = format!(
                "{}{}\n{}{}\n{}{}",
                path,
                underline_offset,
                line_number,
                context.trim(),
                underline_offset,
                underline
            );
            self.wrap(message)
        } else {
            self
        }
    }

    /// The error without the template it happened in, e.g. to match on it.
    pub fn inner(&self) -> &Error {
        match self {
            Error::Pretty { error, .. } => error.inner(),
            error => error,
        }
    }

    fn wrap(self, message: String) -> Self {
        Error::Pretty {
            message,
            error: Box::new(self),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_underline() {
        let token = TokenWithContext::new(Token::If, 1, 4);
        let error = Error::Syntax(token);
        let pretty = error.pretty(
            "<% if apples %>
    <% if oranges are blue %>
",
            None::<&str>,
        );

        assert_eq!(
            pretty.to_string(),
            "  | \n1 | <% if apples %>\n  |    ^ syntax error"
        );
    }

    #[test]
    fn test_pretty_runtime_error() {
        let error = Error::UndefinedVariable("user".into()).pretty("", Some("views/home.html"));

        assert_eq!(
            error.to_string(),
            "---> views/home.html\n\n     variable \"user\" is not defined or in scope"
        );
        assert!(matches!(error.inner(), Error::UndefinedVariable(name) if name == "user"));
        assert!(std::error::Error::source(&error).is_some());
    }
}

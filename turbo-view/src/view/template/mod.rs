//! Templates: translation, parsing and evaluation.
//!
//! Template source is translated into executable source by the [`compiler`], which the
//! [`lexer`] and the [`language`] parser turn into a [`Program`]. Programs are evaluated by a
//! [`Runtime`], which handles sections, fragments, layouts and partials.
pub mod compiler;
pub mod context;
pub mod error;
pub mod fragment;
pub mod language;
pub mod lexer;
pub mod output;
pub mod runtime;
pub mod sections;
pub mod verbatim;

pub use context::Context;
pub use error::Error;
pub use fragment::{FragmentCache, Fragments};
pub use language::Program;
pub use lexer::{Lexer, ToTemplateValue, Token, TokenWithContext, Tokenize, Value};
pub use output::{Capture, Output};
pub use runtime::Runtime;
pub use sections::SectionStack;

use crate::colors::MaybeColorize;
use crate::view::Engine;

use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// A compiled template.
#[derive(Clone, Debug)]
pub struct Template {
    name: String,
    path: PathBuf,
    executable: String,
    program: Program,
}

impl Template {
    /// Read template source from disk and compile it.
    pub fn load(name: &str, path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let start = Instant::now();

        let source = match read_to_string(path) {
            Ok(source) => source,
            Err(_) => return Err(Error::TemplateDoesNotExist(name.to_string())),
        };

        let executable = Self::compile(&source);
        let program = Program::from_str(&executable)?;

        let template = Template {
            name: name.to_string(),
            path: path.to_owned(),
            executable,
            program,
        };

        info!(
            "{} {} ({:.3} ms)",
            "compiled".green(),
            name.purple(),
            start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(template)
    }

    /// Compile a template from source.
    pub fn from_str(source: &str) -> Result<Self, Error> {
        Self::from_executable("inline", "/dev/null", Self::compile(source))
    }

    /// Parse already translated source, e.g. a compiled template read from disk.
    pub fn from_executable(
        name: &str,
        path: impl AsRef<Path>,
        executable: String,
    ) -> Result<Self, Error> {
        Ok(Template {
            name: name.to_string(),
            path: path.as_ref().to_owned(),
            program: Program::from_str(&executable)?,
            executable,
        })
    }

    /// Translate template source into executable source.
    pub fn compile(source: &str) -> String {
        compiler::translate(source)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Executable source the template was parsed from.
    pub fn executable(&self) -> &str {
        &self.executable
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Render the template with the process-wide engine, see [`Engine::global`].
    /// Its fragment cache is shared by all templates rendered this way.
    pub fn render(&self, context: impl TryInto<Context, Error = Error>) -> Result<String, Error> {
        Engine::global().render_template(self, context)
    }

    pub fn render_default(&self) -> Result<String, Error> {
        self.render(&Context::default())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_from_str() -> Result<(), Error> {
        let template = Template::from_str(
            "@if($count > 1)<p>{{ $count }} items</p>@else<p>{{ $count }} item</p>@endif",
        )?;

        assert_eq!(template.render([("count", 3)])?, "<p>3 items</p>");
        assert_eq!(template.render([("count", 1)])?, "<p>1 item</p>");

        Ok(())
    }

    #[test]
    fn test_escaping() -> Result<(), Error> {
        let template = Template::from_str("{{ $html }}|{!! $html !!}|{{{ $html }}}")?;
        let output = template.render([("html", "<script>alert('x')</script>")])?;

        assert_eq!(
            output,
            "&lt;script&gt;alert(&#039;x&#039;)&lt;/script&gt;|<script>alert('x')</script>|&lt;script&gt;alert(&#039;x&#039;)&lt;/script&gt;"
        );

        Ok(())
    }

    #[test]
    fn test_verbatim_output() -> Result<(), Error> {
        let content = "  {{ not translated }}\n\t@if(x) <% not code %> <%% %>  ";
        let template = Template::from_str(&format!("@verbatim{}@endverbatim", content))?;

        assert_eq!(template.render_default()?, content);

        Ok(())
    }

    #[test]
    fn test_load() -> Result<(), Error> {
        let dir = TempDir::new("turbo-template")?;
        let path = dir.path().join("hello.turbo.html");
        std::fs::write(&path, "Hello, {{ $name }}!")?;

        let template = Template::load("hello", &path)?;
        assert_eq!(template.name(), "hello");
        assert_eq!(template.executable(), "Hello, <%= $name %>!");
        assert_eq!(template.render([("name", "Lev")])?, "Hello, Lev!");

        assert!(matches!(
            Template::load("missing", dir.path().join("missing.html")),
            Err(Error::TemplateDoesNotExist(name)) if name == "missing"
        ));

        Ok(())
    }

    #[test]
    fn test_huge_repeat() -> Result<(), Error> {
        let template = Template::from_str("[{{ 'ab' * 9223372036854775807 }}]")?;
        assert_eq!(template.render_default()?, "[]");

        Ok(())
    }

    #[test]
    fn test_fragment_cache() -> Result<(), Error> {
        let template = Template::from_str("@cache('template-test-greeting')Hi {{ $name }}@endcache")?;

        assert_eq!(template.render([("name", "Lev")])?, "Hi Lev");
        assert_eq!(template.render([("name", "Alice")])?, "Hi Lev");

        Ok(())
    }

    #[test]
    fn test_syntax_error() {
        assert!(Template::from_str("@if(x)never closed").is_err());

        let dir = TempDir::new("turbo-template").unwrap();
        let path = dir.path().join("bad.html");
        std::fs::write(&path, "@if(x)never closed").unwrap();
        assert!(matches!(Template::load("bad", &path), Err(Error::Eof(_))));
        assert!(Template::from_str("{{ 1 + }}").is_err());
    }
}

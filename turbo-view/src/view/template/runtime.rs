//! Evaluation of one template in a render call.
//!
//! The runtime is where a program's output and global function calls go. It owns the
//! output buffers and the fragments being captured; sections belong to the whole layout chain
//! and are borrowed from the engine's render loop.
use super::fragment::Fragments;
use super::language::Interpreter;
use super::output::{Capture, Output};
use super::{Context, Error, SectionStack, Template, ToTemplateValue, Value};
use crate::csrf::{csrf_field, csrf_token, Session};
use crate::escape_html;
use crate::view::Engine;

use time::{Duration, OffsetDateTime};

pub struct Runtime<'a> {
    engine: &'a Engine,
    session: &'a dyn Session,
    sections: &'a mut SectionStack,
    fragments: Fragments<'a>,
    output: Output,
    layout: Option<String>,
    depth: usize,
}

impl<'a> Runtime<'a> {
    /// Create a runtime. `depth` counts the partials and layouts
    /// rendered above this template.
    pub fn new(
        engine: &'a Engine,
        session: &'a dyn Session,
        sections: &'a mut SectionStack,
        depth: usize,
    ) -> Self {
        Self {
            engine,
            session,
            sections,
            fragments: Fragments::new(engine.fragments()),
            output: Output::new(),
            layout: None,
            depth,
        }
    }

    /// Evaluate the template. Returns its output and
    /// the layout it extends, if any.
    pub fn evaluate(
        mut self,
        template: &Template,
        context: &mut Context,
    ) -> Result<(String, Option<String>), Error> {
        template.program().evaluate(context, &mut self)?;

        let layout = self.layout.take();
        let output = self.output.finish()?;

        Ok((output, layout))
    }

    fn render(&mut self, args: &[Value]) -> Result<Value, Error> {
        let (name, data) = match args {
            [Value::String(name)] => (name, Context::new()),
            [Value::String(name), Value::Hash(data)] => {
                let mut context = Context::new();
                for (key, value) in data {
                    context.insert(key, value.clone());
                }
                (name, context)
            }
            [Value::String(name), Value::Null] => (name, Context::new()),
            _ => return Err(Self::arguments("render", args)),
        };

        let html = self
            .engine
            .render_partial(name, data, self.session, self.depth + 1)?;

        Ok(Value::String(html))
    }

    fn section_start(&mut self, args: &[Value]) -> Result<Value, Error> {
        match args {
            [Value::String(name)] => {
                self.sections.start(name);
                self.output.start(Capture::Section);
            }

            // `@section('title', $title)` sets the content inline, escaped.
            [Value::String(name), content] => {
                self.sections
                    .insert(name, escape_html(&content.to_string()));
            }

            _ => return Err(Self::arguments("section_start", args)),
        }

        Ok(Value::Null)
    }

    fn section_end(&mut self) -> Result<Value, Error> {
        if !self.sections.is_open() {
            return Err(Error::NoOpenSection);
        }

        let content = self.output.end(Capture::Section)?;
        let name = self.sections.end()?;
        self.sections.insert(&name, content);

        Ok(Value::Null)
    }

    fn fragment_start(&mut self, args: &[Value]) -> Result<Value, Error> {
        let (key, ttl) = match args {
            [key] => (key.to_string(), None),
            [key, Value::Integer(seconds)] => (key.to_string(), Some(Duration::seconds(*seconds))),
            [key, Value::Null] => (key.to_string(), None),
            _ => return Err(Self::arguments("fragment_start", args)),
        };

        let run = self.fragments.start(&key, ttl, &mut self.output);

        Ok(Value::Boolean(run))
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.engine.config().url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn arguments(name: &str, args: &[Value]) -> Error {
        let args = args
            .iter()
            .map(|arg| format!("{:?}", arg))
            .collect::<Vec<_>>()
            .join(", ");

        Error::Runtime(format!("wrong arguments for {}({})", name, args))
    }
}

impl Interpreter for Runtime<'_> {
    fn write(&mut self, text: &str) {
        self.output.write(text);
    }

    fn call(&mut self, name: &str, args: &[Value], _context: &Context) -> Result<Value, Error> {
        match name {
            "render" => self.render(args),

            "extends" => match args {
                [Value::String(layout)] => {
                    self.layout = Some(layout.clone());
                    Ok(Value::Null)
                }
                _ => Err(Self::arguments(name, args)),
            },

            "section_start" => self.section_start(args),
            "section_end" => self.section_end(),

            "yield_section" => match args {
                [Value::String(section)] => Ok(Value::String(
                    self.sections.yield_section(section, ""),
                )),
                [Value::String(section), default] => Ok(Value::String(
                    self.sections
                        .yield_section(section, &default.to_string()),
                )),
                _ => Err(Self::arguments(name, args)),
            },

            "fragment_start" => self.fragment_start(args),
            "fragment_end" => {
                self.fragments.end(&mut self.output)?;
                Ok(Value::Null)
            }

            "csrf_token" => Ok(Value::String(csrf_token(self.session))),
            "csrf_field" => Ok(Value::String(csrf_field(self.session))),

            "session" => match args {
                [Value::String(key)] => Ok(self
                    .session
                    .get(key)
                    .map(Value::String)
                    .unwrap_or(Value::Null)),
                [Value::String(key), default] => Ok(self
                    .session
                    .get(key)
                    .map(Value::String)
                    .unwrap_or_else(|| default.clone())),
                _ => Err(Self::arguments(name, args)),
            },

            "e" => match args {
                [value] => Ok(Value::String(escape_html(&value.to_string()))),
                _ => Err(Self::arguments(name, args)),
            },

            "default" => match args {
                [Value::Null, fallback] => Ok(fallback.clone()),
                [value, _] => Ok(value.clone()),
                _ => Err(Self::arguments(name, args)),
            },

            "url" => match args {
                [] => Ok(Value::String(self.url(""))),
                [path] => Ok(Value::String(self.url(&path.to_string()))),
                _ => Err(Self::arguments(name, args)),
            },

            "asset" => match args {
                [path] => Ok(Value::String(self.url(&path.to_string()))),
                _ => Err(Self::arguments(name, args)),
            },

            "now" => OffsetDateTime::now_utc().to_template_value(),

            name => match self.engine.call_function(name, args) {
                Some(result) => result,
                None => Err(Error::UnknownMethod(name.to_string(), "global")),
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Config;
    use crate::csrf::MemorySession;

    fn evaluate(
        source: &str,
        sections: &mut SectionStack,
    ) -> Result<(String, Option<String>), Error> {
        let engine = Engine::new(Config::default());
        let session = MemorySession::new();
        let template = Template::from_str(source)?;

        Runtime::new(&engine, &session, sections, 0).evaluate(&template, &mut Context::new())
    }

    #[test]
    fn test_layout_and_sections() -> Result<(), Error> {
        let mut sections = SectionStack::new();
        let (output, layout) = evaluate(
            "@extends('layouts.app')@section('nav')<a>@section('inner')x@endsection</a>@endsection body",
            &mut sections,
        )?;

        assert_eq!(output, " body");
        assert_eq!(layout, Some("layouts.app".to_string()));
        assert_eq!(sections.get("nav"), Some("<a></a>"));
        assert_eq!(sections.get("inner"), Some("x"));

        Ok(())
    }

    #[test]
    fn test_unclosed() {
        let mut sections = SectionStack::new();

        assert!(matches!(
            evaluate("@section('open')never closed", &mut sections),
            Err(Error::Unclosed("section"))
        ));
        assert!(matches!(
            evaluate("@cache('x')@section('a')@endcache@endsection", &mut sections),
            Err(Error::UnbalancedCapture)
        ));
    }

    #[test]
    fn test_session() -> Result<(), Error> {
        let engine = Engine::new(Config::default());
        let session = MemorySession::new();
        session.put("flash", "Saved!".into());

        let template = Template::from_str("{{ session('flash') }}|{{ session('other', 'none') }}")?;
        let mut sections = SectionStack::new();
        let (output, _) = Runtime::new(&engine, &session, &mut sections, 0)
            .evaluate(&template, &mut Context::new())?;

        assert_eq!(output, "Saved!|none");

        Ok(())
    }

    #[test]
    fn test_wrong_arguments() {
        let mut sections = SectionStack::new();

        assert!(matches!(
            evaluate("<% extends(1) %>", &mut sections),
            Err(Error::Runtime(_))
        ));
    }
}

//! Rendering templates stored on disk.
//!
//! The engine resolves dotted template names to files in the views directory, gets their compiled
//! form from the [`Templates`] cache, and evaluates them. If a template extends a layout, the layout
//! is rendered next with the same data and sections, and the template's output becomes the `content`
//! section, unless it's blank, so `@yield('content', 'default')` can fall back to its default.
//! This repeats until a template doesn't extend anything.
//!
//! Everything shared between renders lives in the engine: configuration, shared bindings,
//! registered functions and both caches. Sections, captures and the layout being extended belong to
//! one render call.
use super::cache::Templates;
use super::template::{
    Context, Error, FragmentCache, Runtime, SectionStack, Template, ToTemplateValue, Value,
};
use crate::cache::{Cache, MemoryCache};
use crate::colors::MaybeColorize;
use crate::config::{get_config, Config};
use crate::csrf::{MemorySession, Session};

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::spawn_blocking;
use tracing::{debug, error};

/// Function callable from templates, e.g. `{{ money($price) }}`.
pub type Function = Arc<dyn Fn(&[Value]) -> Result<Value, Error> + Send + Sync>;

static ENGINE: Lazy<Engine> = Lazy::new(Engine::default);

/// Template engine.
pub struct Engine {
    config: Config,
    shared: RwLock<Context>,
    templates: Templates,
    fragments: FragmentCache,
    functions: RwLock<HashMap<String, Function>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(get_config().clone())
    }
}

impl Engine {
    /// Create an engine caching fragments in memory.
    pub fn new(config: Config) -> Self {
        Self::with_cache(config, Arc::new(MemoryCache::new()))
    }

    /// Create an engine caching fragments in the given store.
    pub fn with_cache(config: Config, cache: Arc<dyn Cache>) -> Self {
        Self {
            templates: Templates::new(&config.views.cache_path),
            fragments: FragmentCache::new(cache, &config.fragments),
            shared: RwLock::new(Context::new()),
            functions: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Engine used by [`Template::render`], configured with [`get_config`].
    pub fn global() -> &'static Engine {
        &ENGINE
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Make a value available to all templates. Render data
    /// with the same name takes precedence.
    pub fn share(&self, key: &str, value: impl ToTemplateValue) -> Result<(), Error> {
        self.shared.write().set(key, value)?;
        Ok(())
    }

    /// Shared bindings.
    pub fn shared(&self) -> Context {
        self.shared.read().clone()
    }

    /// Register a function templates can call.
    pub fn function<F>(&self, name: &str, function: F)
    where
        F: Fn(&[Value]) -> Result<Value, Error> + Send + Sync + 'static,
    {
        self.functions
            .write()
            .insert(name.to_string(), Arc::new(function));
    }

    /// Call a registered function, if there is one with that name.
    pub fn call_function(&self, name: &str, args: &[Value]) -> Option<Result<Value, Error>> {
        // Don't hold the lock while the function runs.
        let function = self.functions.read().get(name).cloned()?;
        Some(function(args))
    }

    pub fn fragments(&self) -> &FragmentCache {
        &self.fragments
    }

    pub fn templates(&self) -> &Templates {
        &self.templates
    }

    /// Find the source of a template, e.g. `layouts.main` is
    /// `<views>/layouts/main.turbo.html` or `<views>/layouts/main.html`.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, Error> {
        let parts = name.split('.').collect::<Vec<_>>();

        if parts
            .iter()
            .any(|part| part.is_empty() || part.contains(['/', '\\']))
        {
            return Err(Error::TemplateDoesNotExist(name.to_string()));
        }

        let base = parts
            .iter()
            .fold(self.config.views.path.clone(), |path, part| path.join(part));

        for extension in &self.config.views.extensions {
            let mut path = base.clone().into_os_string();
            path.push(".");
            path.push(extension);

            let path = PathBuf::from(path);
            if path.is_file() {
                return Ok(path);
            }
        }

        Err(Error::TemplateDoesNotExist(name.to_string()))
    }

    /// Get a compiled template by name.
    pub fn template(&self, name: &str) -> Result<Arc<Template>, Error> {
        let path = self.resolve(name)?;
        self.templates
            .get(name, &path, self.config.cache_templates())
            .map_err(|err| self.pretty_source(err, &path))
    }

    /// Render a template.
    ///
    /// ```rust,ignore
    /// let html = engine.render("users.show", [("name", "Lev")])?;
    /// ```
    pub fn render(
        &self,
        name: &str,
        data: impl TryInto<Context, Error = Error>,
    ) -> Result<String, Error> {
        self.render_with_session(name, data, &MemorySession::new())
    }

    /// Render a template for a user session, used by `@csrf` and `session()`.
    pub fn render_with_session(
        &self,
        name: &str,
        data: impl TryInto<Context, Error = Error>,
        session: &dyn Session,
    ) -> Result<String, Error> {
        let start = Instant::now();
        let data = data.try_into()?;
        let html = self.render_partial(name, data, session, 0)?;

        debug!(
            "{} {} ({:.3} ms)",
            "rendered".green(),
            name.purple(),
            start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(html)
    }

    /// Render a template on Tokio's blocking thread pool.
    pub async fn render_async(
        self: &Arc<Self>,
        name: &str,
        data: impl TryInto<Context, Error = Error>,
    ) -> Result<String, Error> {
        let engine = self.clone();
        let name = name.to_string();
        let data = data.try_into()?;

        spawn_blocking(move || engine.render(&name, &data))
            .await
            .map_err(|err| Error::Runtime(err.to_string()))?
    }

    /// Render an already compiled template, following its layouts.
    pub fn render_template(
        &self,
        template: &Template,
        data: impl TryInto<Context, Error = Error>,
    ) -> Result<String, Error> {
        self.render_chain(template, data.try_into()?, &MemorySession::new(), 0)
    }

    /// Render a template called from another one. `depth` is the number
    /// of templates rendering above it.
    pub fn render_partial(
        &self,
        name: &str,
        data: Context,
        session: &dyn Session,
        depth: usize,
    ) -> Result<String, Error> {
        if depth > self.config.views.max_depth {
            return Err(Error::LayoutTooDeep(name.to_string()));
        }

        let template = self.template(name)?;
        self.render_chain(&template, data, session, depth)
    }

    /// Evict a compiled template from memory.
    pub fn forget(&self, name: &str) {
        self.templates.forget(name);
    }

    /// Evict all compiled templates and delete them from disk.
    pub fn clear(&self) -> Result<(), Error> {
        self.templates.clear()
    }

    fn render_chain(
        &self,
        first: &Template,
        data: Context,
        session: &dyn Session,
        depth: usize,
    ) -> Result<String, Error> {
        let mut context = self.shared();
        context.extend(&data);

        let mut sections = SectionStack::new();
        let mut layout_template: Option<Arc<Template>> = None;
        let mut layouts = 0;

        loop {
            let template = layout_template.as_deref().unwrap_or(first);

            sections.begin_pass();
            let mut scope = context.clone();

            let runtime = Runtime::new(self, session, &mut sections, depth + layouts);
            let (output, layout) = runtime
                .evaluate(template, &mut scope)
                .map_err(|err| self.report(err, template, depth))?;

            let layout = match layout {
                Some(layout) => layout,
                None => return Ok(output),
            };

            // A template can set `content` for its layout itself.
            if !sections.defined_in_pass("content") && !output.trim().is_empty() {
                sections.insert("content", output);
            }

            layouts += 1;

            if depth + layouts > self.config.views.max_depth {
                return Err(self.report(Error::LayoutTooDeep(layout), template, depth));
            }

            layout_template = Some(self.template(&layout)?);
        }
    }

    // Compile errors happen before there is a template to show them with.
    fn pretty_source(&self, err: Error, path: &Path) -> Error {
        if !self.config.debug {
            return err;
        }

        match read_to_string(path) {
            Ok(source) => err.pretty(&Template::compile(&source), Some(path)),
            Err(_) => err,
        }
    }

    fn report(&self, err: Error, template: &Template, depth: usize) -> Error {
        let err = if self.config.debug {
            err.pretty(template.executable(), Some(template.path()))
        } else {
            err
        };

        // Partials return errors to the template calling them.
        if depth == 0 {
            error!("{} {}: {}", "failed".red(), template.name().purple(), err);
        }

        err
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::csrf::csrf_token;
    use std::fs::{create_dir_all, write, File};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, SystemTime};
    use tempdir::TempDir;

    fn engine(dir: &TempDir, debug: bool, files: &[(&str, &str)]) -> Result<Engine, Error> {
        let views = dir.path().join("views");

        for (name, source) in files {
            let path = views.join(name);
            if let Some(parent) = path.parent() {
                create_dir_all(parent)?;
            }
            write(path, source)?;
        }

        let mut config = Config::default();
        config.debug = debug;
        config.nitrous = false;
        config.url = "https://example.com/".into();
        config.views.path = views;
        config.views.cache_path = dir.path().join("cache");

        Ok(Engine::new(config))
    }

    #[test]
    fn test_layout() -> Result<(), Error> {
        let dir = TempDir::new("turbo-engine")?;
        let engine = engine(
            &dir,
            false,
            &[
                (
                    "layouts/main.html",
                    "<title>@yield('title', 'default')</title><main>@yield('content')</main>",
                ),
                (
                    "home.html",
                    "@extends('layouts.main')\n@section('title')Hi@endsection\n<p>{{ $name }}</p>",
                ),
                ("bare.html", "@extends('layouts.main')<p>bare</p>"),
            ],
        )?;

        assert_eq!(
            engine.render("home", [("name", "Lev")])?,
            "<title>Hi</title><main><p>Lev</p></main>"
        );
        assert_eq!(
            engine.render("bare", &Context::new())?,
            "<title>default</title><main><p>bare</p></main>"
        );

        // Sections don't leak between render calls.
        assert_eq!(
            engine.render("layouts.main", &Context::new())?,
            "<title>default</title><main></main>"
        );

        Ok(())
    }

    #[test]
    fn test_content_section() -> Result<(), Error> {
        let dir = TempDir::new("turbo-engine")?;
        let engine = engine(
            &dir,
            false,
            &[
                ("layout.html", "[@yield('content')]"),
                (
                    "child.html",
                    "@extends('layout')ignored@section('content')explicit@endsection",
                ),
            ],
        )?;

        assert_eq!(engine.render("child", &Context::new())?, "[explicit]");

        Ok(())
    }

    #[test]
    fn test_inline_section() -> Result<(), Error> {
        let dir = TempDir::new("turbo-engine")?;
        let engine = engine(
            &dir,
            false,
            &[
                ("layout.html", "<title>@yield('title')</title>"),
                ("page.html", "@extends('layout')@section('title', $title)"),
            ],
        )?;

        assert_eq!(
            engine.render("page", [("title", "Tom & Jerry")])?,
            "<title>Tom &amp; Jerry</title>"
        );

        Ok(())
    }

    #[test]
    fn test_no_open_section() -> Result<(), Error> {
        let dir = TempDir::new("turbo-engine")?;
        let engine = engine(&dir, false, &[("broken.html", "a@endsection")])?;

        assert!(matches!(
            engine.render("broken", &Context::new()),
            Err(Error::NoOpenSection)
        ));

        Ok(())
    }

    #[test]
    fn test_fragment_cache() -> Result<(), Error> {
        let dir = TempDir::new("turbo-engine")?;
        let engine = engine(
            &dir,
            false,
            &[(
                "sidebar.html",
                "@cache('sidebar', 60)<aside>{{ tick() }}</aside>@endcache",
            )],
        )?;

        let counter = Arc::new(AtomicUsize::new(0));
        let ticks = counter.clone();
        engine.function("tick", move |_| {
            Ok(Value::Integer(ticks.fetch_add(1, Ordering::SeqCst) as i64 + 1))
        });

        assert_eq!(engine.render("sidebar", &Context::new())?, "<aside>1</aside>");
        assert_eq!(engine.render("sidebar", &Context::new())?, "<aside>1</aside>");
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        engine.fragments().forget("sidebar").map_err(|err| Error::Runtime(err.to_string()))?;
        assert_eq!(engine.render("sidebar", &Context::new())?, "<aside>2</aside>");

        Ok(())
    }

    #[test]
    fn test_source_modified() -> Result<(), Error> {
        let dir = TempDir::new("turbo-engine")?;
        let engine = engine(&dir, false, &[("page.html", "old {{ $a }}")])?;

        assert_eq!(engine.render("page", [("a", 1)])?, "old 1");

        let path = engine.resolve("page")?;
        write(&path, "new {{ $a }}")?;
        File::options()
            .write(true)
            .open(&path)?
            .set_modified(SystemTime::now() + Duration::from_secs(10))?;

        assert_eq!(engine.render("page", [("a", 1)])?, "new 1");

        // Another engine, like a restarted process, sees the new source too.
        let restarted = Engine::new(engine.config().clone());
        assert_eq!(restarted.render("page", [("a", 2)])?, "new 2");

        Ok(())
    }

    #[test]
    fn test_debug_recompiles() -> Result<(), Error> {
        let dir = TempDir::new("turbo-engine")?;
        let engine = engine(&dir, true, &[("page.html", "first")])?;

        assert_eq!(engine.render("page", &Context::new())?, "first");

        write(engine.resolve("page")?, "second")?;
        assert_eq!(engine.render("page", &Context::new())?, "second");

        assert!(engine.templates().is_empty());
        assert!(!engine.templates().artifact_path("page").exists());

        Ok(())
    }

    #[test]
    fn test_deterministic() -> Result<(), Error> {
        let dir = TempDir::new("turbo-engine")?;
        let engine = engine(
            &dir,
            false,
            &[(
                "list.html",
                "@foreach($items as $item)<li>{{ $item }}</li>@endforeach",
            )],
        )?;

        let first = engine.render("list", [("items", vec!["a", "<b>"])])?;
        let second = engine.render("list", [("items", vec!["a", "<b>"])])?;

        assert_eq!(first, "<li>a</li><li>&lt;b&gt;</li>");
        assert_eq!(first, second);

        Ok(())
    }

    #[test]
    fn test_calling() -> Result<(), Error> {
        let dir = TempDir::new("turbo-engine")?;
        let engine = engine(
            &dir,
            false,
            &[
                (
                    "partials/nav.html",
                    "<nav>{{ $active }} {{ $app }}{{ $secret }}</nav>",
                ),
                (
                    "page.html",
                    "@calling('partials.nav', ['active' => 'home'])",
                ),
            ],
        )?;

        engine.share("app", "Turbo")?;

        assert_eq!(
            engine.render("page", [("secret", "x")])?,
            "<nav>home Turbo</nav>"
        );

        Ok(())
    }

    #[test]
    fn test_layout_too_deep() -> Result<(), Error> {
        let dir = TempDir::new("turbo-engine")?;
        let engine = engine(
            &dir,
            false,
            &[
                ("a.html", "@extends('b')"),
                ("b.html", "@extends('a')"),
                ("self.html", "@calling('self')"),
            ],
        )?;

        assert!(matches!(
            engine.render("a", &Context::new()),
            Err(Error::LayoutTooDeep(_))
        ));
        assert!(matches!(
            engine.render("self", &Context::new()),
            Err(Error::LayoutTooDeep(_))
        ));

        Ok(())
    }

    #[test]
    fn test_resolve() -> Result<(), Error> {
        let dir = TempDir::new("turbo-engine")?;
        let engine = engine(
            &dir,
            false,
            &[("both.turbo.html", "turbo"), ("both.html", "html")],
        )?;

        assert_eq!(engine.render("both", &Context::new())?, "turbo");
        assert!(matches!(
            engine.render("missing.page", &Context::new()),
            Err(Error::TemplateDoesNotExist(name)) if name == "missing.page"
        ));
        assert!(engine.resolve("..both").is_err());

        Ok(())
    }

    #[test]
    fn test_csrf() -> Result<(), Error> {
        let dir = TempDir::new("turbo-engine")?;
        let engine = engine(&dir, false, &[("form.html", "<form>@csrf</form>")])?;
        let session = MemorySession::new();

        let html = engine.render_with_session("form", &Context::new(), &session)?;

        assert_eq!(
            html,
            format!(
                r#"<form><input type="hidden" name="_token" value="{}"></form>"#,
                csrf_token(&session)
            )
        );

        Ok(())
    }

    #[test]
    fn test_helpers() -> Result<(), Error> {
        let dir = TempDir::new("turbo-engine")?;
        let engine = engine(
            &dir,
            false,
            &[(
                "links.html",
                "{{ url('/about') }} {{ asset('css/app.css') }} {{ default($missing, 'none') }} {{ e('<b>') }}",
            )],
        )?;

        assert_eq!(
            engine.render("links", &Context::new())?,
            "https://example.com/about https://example.com/css/app.css none &amp;lt;b&amp;gt;"
        );

        Ok(())
    }

    #[test]
    fn test_unknown_function() -> Result<(), Error> {
        let dir = TempDir::new("turbo-engine")?;
        let engine = engine(&dir, false, &[("page.html", "{{ nope(1) }}")])?;

        assert!(matches!(
            engine.render("page", &Context::new()),
            Err(Error::UnknownMethod(name, "global")) if name == "nope"
        ));

        Ok(())
    }

    #[test]
    fn test_debug_error() -> Result<(), Error> {
        let dir = TempDir::new("turbo-engine")?;
        let engine = engine(&dir, true, &[("raw.html", "{!! $missing !!}")])?;

        match engine.render("raw", &Context::new()) {
            Err(Error::Pretty { message, error }) => {
                assert!(message.contains("raw.html"));
                assert!(message.contains("missing"));
                assert!(matches!(error.as_ref(), Error::UndefinedVariable(name) if name == "missing"));
            }
            other => panic!("expected a pretty error, got {:?}", other),
        }

        Ok(())
    }

    #[test]
    fn test_debug_error_kind() -> Result<(), Error> {
        let dir = TempDir::new("turbo-engine")?;
        let engine = engine(
            &dir,
            true,
            &[
                ("broken.html", "a@endsection"),
                ("page.html", "@calling('partials.missing')"),
            ],
        )?;

        let err = engine.render("broken", &Context::new()).unwrap_err();
        assert!(matches!(err, Error::Pretty { .. }));
        assert!(matches!(err.inner(), Error::NoOpenSection));

        let err = engine.render("page", &Context::new()).unwrap_err();
        assert!(matches!(err.inner(), Error::TemplateDoesNotExist(name) if name == "partials.missing"));

        Ok(())
    }

    #[test]
    fn test_parse_error() -> Result<(), Error> {
        let dir = TempDir::new("turbo-engine")?;
        let files = [("bad.html", "@if(x)never closed")];

        let production = engine(&dir, false, &files)?;
        assert!(matches!(
            production.render("bad", &Context::new()),
            Err(Error::Eof(_))
        ));

        let debug = engine(&dir, true, &files)?;
        match debug.render("bad", &Context::new()) {
            Err(Error::Pretty { message, error }) => {
                assert!(message.contains("bad.html"));
                assert!(matches!(error.as_ref(), Error::Eof(_)));
            }
            other => panic!("expected a pretty error, got {:?}", other),
        }

        Ok(())
    }

    #[test]
    fn test_yield_default_content() -> Result<(), Error> {
        let dir = TempDir::new("turbo-engine")?;
        let engine = engine(
            &dir,
            false,
            &[
                ("layout.html", "[@yield('content','default')]"),
                ("empty.html", "@extends('layout')"),
                ("blank.html", "@extends('layout')\n  \n"),
                (
                    "child.html",
                    "@extends('layout')\n@section('content') Hi @endsection",
                ),
            ],
        )?;

        assert_eq!(engine.render("empty", &Context::new())?, "[default]");
        assert_eq!(engine.render("blank", &Context::new())?, "[default]");
        assert_eq!(engine.render("child", &Context::new())?, "[ Hi ]");

        Ok(())
    }

    #[test]
    fn test_concurrent_renders() -> Result<(), Error> {
        let dir = TempDir::new("turbo-engine")?;
        let engine = Arc::new(engine(
            &dir,
            false,
            &[
                ("layout.html", "<h1>@yield('title')</h1>@yield('content')"),
                (
                    "page.html",
                    "@extends('layout')@section('title'){{ $n }}@endsection@cache('nav')<nav></nav>@endcache<p>{{ $n }}</p>",
                ),
            ],
        )?);

        std::thread::scope(|scope| {
            let handles = (0..8)
                .map(|n| {
                    let engine = engine.clone();
                    scope.spawn(move || -> Result<(), Error> {
                        for _ in 0..50 {
                            let html = engine.render("page", [("n", n)])?;
                            assert_eq!(html, format!("<h1>{}</h1><nav></nav><p>{}</p>", n, n));
                        }
                        Ok(())
                    })
                })
                .collect::<Vec<_>>();

            for handle in handles {
                handle.join().expect("render thread")?;
            }

            Ok(())
        })
    }

    #[test]
    fn test_shared_data() -> Result<(), Error> {
        let dir = TempDir::new("turbo-engine")?;
        let engine = engine(&dir, false, &[("hi.html", "{{ $greeting }}, {{ $name }}")])?;

        engine.share("greeting", "Hello")?;
        engine.share("name", "nobody")?;

        assert_eq!(engine.render("hi", [("name", "Lev")])?, "Hello, Lev");
        assert_eq!(engine.shared()["name"], Value::String("nobody".into()));

        Ok(())
    }

    #[tokio::test]
    async fn test_render_async() -> Result<(), Error> {
        let dir = TempDir::new("turbo-engine")?;
        let engine = Arc::new(engine(&dir, false, &[("hello.html", "Hello, {{ $name }}!")])?);

        let html = engine.render_async("hello", [("name", "Lev")]).await?;
        assert_eq!(html, "Hello, Lev!");

        Ok(())
    }
}

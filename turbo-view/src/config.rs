//! Engine configuration.
//!
//! Loaded once from `Turbo.toml` in the working directory, if present, with
//! defaults for everything that's missing. A few settings can be overridden with
//! environment variables:
//!
//! - `TURBO_DEBUG` (or `APP_DEBUG`): debug mode, templates are recompiled on every render,
//! - `NITROUS_MODE`: use the compiled template cache even in debug mode,
//! - `APP_URL`: base URL used by the `url()` and `asset()` template helpers.
//!
//! ### Example
//!
//! ```toml
//! [general]
//! debug = false
//! url = "https://example.com"
//!
//! [views]
//! path = "views"
//! cache_path = "storage/views"
//! extensions = ["turbo.html", "html"]
//!
//! [fragments]
//! prefix = "fragment_"
//! ttl = 3600
//! ```
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::env::var;
use std::fs::read_to_string;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use thiserror::Error;
use time::Duration;
use tracing::info;

static CONFIG: OnceCell<Config> = OnceCell::new();

static CONFIG_FILES: [&str; 2] = ["Turbo.toml", "turbo.toml"];

#[derive(Error, Debug)]
pub enum Error {
    #[error("config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("config file not found")]
    Io(#[from] std::io::Error),

    #[error("config not found")]
    NoConfig,
}

/// Global configuration.
#[derive(Debug, Clone)]
pub struct Config {
    path: Option<PathBuf>,
    /// Print colors in logs.
    pub tty: bool,
    /// Recompile templates on every render.
    pub debug: bool,
    /// Use the compiled template cache, even in debug mode.
    pub nitrous: bool,
    /// Base URL of the application.
    pub url: String,
    pub views: Views,
    pub fragments: Fragments,
}

/// Where templates live and how they are looked up.
#[derive(Debug, Clone)]
pub struct Views {
    /// Directory with template sources.
    pub path: PathBuf,
    /// Directory with compiled templates.
    pub cache_path: PathBuf,
    /// Extensions tried in order when resolving a template name.
    pub extensions: Vec<String>,
    /// Maximum number of nested layouts and partials.
    pub max_depth: usize,
}

/// Fragment cache defaults.
#[derive(Debug, Clone)]
pub struct Fragments {
    pub prefix: String,
    pub ttl: Duration,
}

impl Default for Views {
    fn default() -> Self {
        Self {
            path: PathBuf::from("views"),
            cache_path: PathBuf::from("storage/views"),
            extensions: vec!["turbo.html".into(), "html".into()],
            max_depth: 32,
        }
    }
}

impl Default for Fragments {
    fn default() -> Self {
        Self {
            prefix: "fragment_".into(),
            ttl: Duration::hours(1),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let debug = env_flag("TURBO_DEBUG")
            .or_else(|| env_flag("APP_DEBUG"))
            .unwrap_or(cfg!(debug_assertions));

        Self {
            path: None,
            tty: std::io::stderr().is_terminal(),
            debug,
            nitrous: env_flag("NITROUS_MODE").unwrap_or(false),
            url: var("APP_URL").unwrap_or_else(|_| "http://localhost:7000".into()),
            views: Views::default(),
            fragments: Fragments::default(),
        }
    }
}

impl Config {
    /// Load configuration from the first config file found in the working directory.
    pub fn load() -> Result<Config, Error> {
        let path = CONFIG_FILES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
            .ok_or(Error::NoConfig)?;

        Self::load_from(&path)
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Config, Error> {
        let config_file = ConfigFile::load(path.as_ref())?;
        let mut config = Config::default();

        config.path = Some(path.as_ref().to_owned());

        if let Some(debug) = config_file.general.debug {
            config.debug = debug;
        }

        if let Some(nitrous) = config_file.general.nitrous {
            config.nitrous = nitrous;
        }

        if let Some(url) = config_file.general.url {
            config.url = url;
        }

        // Environment wins over the file.
        if let Some(debug) = env_flag("TURBO_DEBUG").or_else(|| env_flag("APP_DEBUG")) {
            config.debug = debug;
        }

        if let Some(nitrous) = env_flag("NITROUS_MODE") {
            config.nitrous = nitrous;
        }

        if let Ok(url) = var("APP_URL") {
            config.url = url;
        }

        config
            .views
            .from_config_file(&config_file.views.unwrap_or_default());
        config
            .fragments
            .from_config_file(&config_file.fragments.unwrap_or_default());

        Ok(config)
    }

    pub fn get() -> &'static Config {
        get_config()
    }

    /// Compiled templates are cached in memory and on disk.
    pub fn cache_templates(&self) -> bool {
        !self.debug || self.nitrous
    }

    pub fn log_info(&self) {
        let path = match &self.path {
            Some(path) => path.display().to_string(),
            None => "defaults".to_string(),
        };

        info!(
            "Configuration {} loaded (debug: {}, nitrous: {}, views: \"{}\")",
            path,
            self.debug,
            self.nitrous,
            self.views.path.display()
        );
    }
}

impl Views {
    fn from_config_file(&mut self, file: &ViewsConfig) {
        if let Some(path) = &file.path {
            self.path = path.clone();
        }

        if let Some(cache_path) = &file.cache_path {
            self.cache_path = cache_path.clone();
        }

        if let Some(extensions) = &file.extensions {
            self.extensions = extensions.clone();
        }

        self.max_depth = file.max_depth;
    }
}

impl Fragments {
    fn from_config_file(&mut self, file: &FragmentsConfig) {
        if let Some(prefix) = &file.prefix {
            self.prefix = prefix.clone();
        }

        self.ttl = Duration::seconds(file.ttl);
    }
}

pub fn get_config() -> &'static Config {
    CONFIG.get_or_init(|| Config::load().unwrap_or_default())
}

fn env_flag(name: &str) -> Option<bool> {
    var(name)
        .ok()
        .map(|value| matches!(value.to_lowercase().as_str(), "true" | "1" | "yes" | "on"))
}

#[derive(Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    general: General,
    views: Option<ViewsConfig>,
    fragments: Option<FragmentsConfig>,
}

impl ConfigFile {
    fn load(path: &Path) -> Result<ConfigFile, Error> {
        let file = read_to_string(path)?;
        let config: Self = toml::from_str(&file)?;

        Ok(config)
    }
}

#[derive(Serialize, Deserialize, Default)]
struct General {
    debug: Option<bool>,
    nitrous: Option<bool>,
    url: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct ViewsConfig {
    path: Option<PathBuf>,
    cache_path: Option<PathBuf>,
    extensions: Option<Vec<String>>,
    #[serde(default = "ViewsConfig::default_max_depth")]
    max_depth: usize,
}

impl ViewsConfig {
    fn default_max_depth() -> usize {
        32
    }
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self {
            path: None,
            cache_path: None,
            extensions: None,
            max_depth: Self::default_max_depth(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct FragmentsConfig {
    prefix: Option<String>,
    #[serde(default = "FragmentsConfig::default_ttl")]
    ttl: i64,
}

impl FragmentsConfig {
    fn default_ttl() -> i64 {
        3600
    }
}

impl Default for FragmentsConfig {
    fn default() -> Self {
        Self {
            prefix: None,
            ttl: Self::default_ttl(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_load_config_file() -> Result<(), Error> {
        let dir = TempDir::new("turbo-config")?;
        let path = dir.path().join("Turbo.toml");
        std::fs::write(
            &path,
            r#"
[general]
nitrous = true

[views]
path = "templates"
extensions = ["tpl"]

[fragments]
prefix = "frag:"
ttl = 60
"#,
        )?;

        let config = Config::load_from(&path)?;

        assert_eq!(config.views.path, PathBuf::from("templates"));
        assert_eq!(config.views.cache_path, PathBuf::from("storage/views"));
        assert_eq!(config.views.extensions, vec!["tpl".to_string()]);
        assert_eq!(config.views.max_depth, 32);
        assert_eq!(config.fragments.prefix, "frag:");
        assert_eq!(config.fragments.ttl, Duration::seconds(60));

        if var("NITROUS_MODE").is_err() {
            assert!(config.nitrous);
            assert!(config.cache_templates());
        }

        Ok(())
    }

    #[test]
    fn test_cache_templates() {
        let mut config = Config::default();

        config.debug = true;
        config.nitrous = false;
        assert!(!config.cache_templates());

        config.nitrous = true;
        assert!(config.cache_templates());

        config.debug = false;
        config.nitrous = false;
        assert!(config.cache_templates());
    }
}

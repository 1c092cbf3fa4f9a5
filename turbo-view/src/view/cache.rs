//! Compiled template cache.
//!
//! Translating and parsing a template is done once and reused, first from process memory,
//! then from the compiled artifact written to disk, which survives restarts. Artifacts are named
//! after the SHA-1 of the template name and are only reused if they are not older than the source.
//! A source modified after it was cached, e.g. by a deploy, is recompiled on the next render.
//!
//! In debug mode (without `nitrous`), templates are recompiled on every render and neither
//! tier is used.
use super::template::{Error, Template};
use crate::cache::sha1_hex;
use crate::colors::MaybeColorize;

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::{create_dir_all, metadata, read_dir, read_to_string, remove_file, write};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, warn};

#[derive(Debug)]
struct Cached {
    template: Arc<Template>,
    modified: Option<SystemTime>,
}

/// Templates cache.
#[derive(Debug)]
pub struct Templates {
    templates: RwLock<HashMap<String, Cached>>,
    path: PathBuf,
}

impl Templates {
    /// Extension of compiled artifacts.
    pub const EXTENSION: &'static str = "turbo";

    /// Create an empty cache, writing artifacts to `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            templates: RwLock::new(HashMap::new()),
            path: path.as_ref().to_owned(),
        }
    }

    /// Get a compiled template, compiling it from `source` if needed.
    ///
    /// The lock is only held to look up or insert. Two renders missing the same
    /// template at the same time both compile it; the result is the same.
    pub fn get(&self, name: &str, source: &Path, cache: bool) -> Result<Arc<Template>, Error> {
        if !cache {
            return Ok(Arc::new(Template::load(name, source)?));
        }

        let modified = modified(source);

        if let Some(cached) = self.templates.read().get(name) {
            if !stale(cached.modified, modified) {
                return Ok(cached.template.clone());
            }
        }

        let template = match self.load_artifact(name, source, modified) {
            Some(template) => template,
            None => {
                let template = Template::load(name, source)?;
                self.write_artifact(&template);
                template
            }
        };

        let template = Arc::new(template);

        self.templates.write().insert(
            name.to_string(),
            Cached {
                template: template.clone(),
                modified,
            },
        );

        Ok(template)
    }

    /// Where the compiled artifact of a template is stored.
    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.path
            .join(format!("{}.{}", sha1_hex(name), Self::EXTENSION))
    }

    /// Evict a template from memory.
    pub fn forget(&self, name: &str) {
        self.templates.write().remove(name);
    }

    /// Evict all templates from memory and delete compiled artifacts.
    pub fn clear(&self) -> Result<(), Error> {
        self.templates.write().clear();

        let entries = match read_dir(&self.path) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };

        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some(Self::EXTENSION) {
                remove_file(path)?;
            }
        }

        Ok(())
    }

    /// Number of templates in memory.
    pub fn len(&self) -> usize {
        self.templates.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn load_artifact(
        &self,
        name: &str,
        source: &Path,
        source_modified: Option<SystemTime>,
    ) -> Option<Template> {
        let path = self.artifact_path(name);

        if stale(modified(&path), source_modified) {
            return None;
        }

        let executable = read_to_string(&path).ok()?;

        // A torn or outdated artifact is compiled again.
        match Template::from_executable(name, source, executable) {
            Ok(template) => {
                debug!("{} loaded from {}", name.purple(), path.display());
                Some(template)
            }
            Err(err) => {
                warn!("compiled template \"{}\" is invalid: {}", name, err);
                None
            }
        }
    }

    fn write_artifact(&self, template: &Template) {
        let path = self.artifact_path(template.name());

        let result = create_dir_all(&self.path).and_then(|_| write(&path, template.executable()));

        if let Err(err) = result {
            warn!(
                "compiled template \"{}\" could not be written to {}: {}",
                template.name(),
                path.display(),
                err
            );
        }
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    metadata(path).and_then(|metadata| metadata.modified()).ok()
}

// Compiled output is stale if it's older than its source.
fn stale(compiled: Option<SystemTime>, source: Option<SystemTime>) -> bool {
    match (compiled, source) {
        (Some(compiled), Some(source)) => compiled < source,
        (None, _) => true,
        (Some(_), None) => false,
    }
}

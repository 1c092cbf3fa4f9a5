//! Fragment caching, e.g. `@cache('sidebar', 600) ... @endcache`.
//!
//! On a hit, the cached HTML is printed and the block is skipped. On a miss, the block
//! runs with its output captured; the capture is stored and then printed.
//! Cache store failures never fail the render, they are logged.
use super::output::{Capture, Output};
use super::Error;
use crate::cache::Cache;
use crate::config;

use std::sync::Arc;
use time::Duration;
use tracing::{debug, warn};

/// Fragment cache shared by all renders of an engine.
#[derive(Clone)]
pub struct FragmentCache {
    store: Arc<dyn Cache>,
    prefix: String,
    ttl: Duration,
}

impl std::fmt::Debug for FragmentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("FragmentCache")
            .field("prefix", &self.prefix)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl FragmentCache {
    pub fn new(store: Arc<dyn Cache>, config: &config::Fragments) -> Self {
        Self {
            store,
            prefix: config.prefix.clone(),
            ttl: config.ttl,
        }
    }

    /// Key of the fragment in the store.
    pub fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Get a cached fragment.
    pub fn get(&self, key: &str) -> Option<String> {
        match self.store.get(&self.key(key)) {
            Ok(hit) => hit,
            Err(err) => {
                warn!("fragment \"{}\" could not be read from cache: {}", key, err);
                None
            }
        }
    }

    /// Store a fragment, for the default TTL if none is given.
    pub fn put(&self, key: &str, content: &str, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.ttl);

        if let Err(err) = self.store.put(&self.key(key), content, ttl) {
            warn!("fragment \"{}\" could not be cached: {}", key, err);
        }
    }

    /// Remove a fragment, e.g. after the data it shows has changed.
    pub fn forget(&self, key: &str) -> Result<(), crate::cache::Error> {
        self.store.forget(&self.key(key))
    }

    pub fn flush(&self) -> Result<(), crate::cache::Error> {
        self.store.flush()
    }
}

#[derive(Debug)]
struct Pending {
    key: String,
    ttl: Option<Duration>,
}

/// Fragments being captured during one render call.
#[derive(Debug)]
pub struct Fragments<'a> {
    cache: &'a FragmentCache,
    pending: Vec<Pending>,
}

impl<'a> Fragments<'a> {
    pub fn new(cache: &'a FragmentCache) -> Self {
        Self {
            cache,
            pending: vec![],
        }
    }

    /// Start a fragment. Returns `true` if the block needs to run.
    pub fn start(&mut self, key: &str, ttl: Option<Duration>, output: &mut Output) -> bool {
        if let Some(content) = self.cache.get(key) {
            debug!("fragment \"{}\" served from cache", key);
            output.write(&content);
            return false;
        }

        self.pending.push(Pending {
            key: key.to_string(),
            ttl,
        });
        output.start(Capture::Fragment);

        true
    }

    /// Finish the innermost fragment: cache it and print it.
    pub fn end(&mut self, output: &mut Output) -> Result<(), Error> {
        let pending = self.pending.pop().ok_or(Error::UnbalancedCapture)?;
        let content = output.end(Capture::Fragment)?;

        self.cache.put(&pending.key, &content, pending.ttl);
        output.write(&content);

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cache::MemoryCache;

    #[test]
    fn test_miss_then_hit() -> Result<(), Error> {
        let store = Arc::new(MemoryCache::new());
        let cache = FragmentCache::new(store.clone(), &config::Fragments::default());

        let mut output = Output::new();
        let mut fragments = Fragments::new(&cache);

        assert!(fragments.start("nav", None, &mut output));
        output.write("<nav></nav>");
        fragments.end(&mut output)?;
        assert_eq!(output.finish()?, "<nav></nav>");

        assert_eq!(
            store.get("fragment_nav").ok().flatten(),
            Some("<nav></nav>".to_string())
        );

        let mut output = Output::new();
        let mut fragments = Fragments::new(&cache);
        assert!(!fragments.start("nav", None, &mut output));
        assert_eq!(output.finish()?, "<nav></nav>");

        Ok(())
    }

    #[test]
    fn test_expired() -> Result<(), Error> {
        let cache = FragmentCache::new(
            Arc::new(MemoryCache::new()),
            &config::Fragments::default(),
        );

        let mut output = Output::new();
        let mut fragments = Fragments::new(&cache);
        assert!(fragments.start("old", Some(Duration::seconds(-1)), &mut output));
        fragments.end(&mut output)?;

        assert_eq!(cache.get("old"), None);

        Ok(())
    }

    #[test]
    fn test_end_without_start() {
        let cache = FragmentCache::new(
            Arc::new(MemoryCache::new()),
            &config::Fragments::default(),
        );
        let mut output = Output::new();

        assert!(matches!(
            Fragments::new(&cache).end(&mut output),
            Err(Error::UnbalancedCapture)
        ));
    }
}

//! The template engine — compiled-template cache in front of a
//! [`SourceProvider`], plus the render entry points.
//!
//! One [`Engine`] is built at startup and shared by every request thread.
//! The cache is the only shared mutable state:
//!
//! * a hit hands out the cached `Arc<CompiledTemplate>`;
//! * a miss fetches and compiles *outside* the lock, then installs the result
//!   (two threads missing on the same name may both compile; the last insert
//!   wins and both renders are correct);
//! * [`Engine::invalidate`] drops one entry so the next render recompiles.
//!   A compile that started before an invalidation or [`Engine::clear`] still
//!   serves its own render but is not installed.

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Deserialize;

use crate::data::TemplateData;
use crate::error::{ParseError, ParseErrorKind, RenderError};
use crate::exec;
use crate::format::FormatterRegistry;
use crate::parser::{self, Delimiters};
use crate::source::SourceProvider;
use crate::template::CompiledTemplate;

/// Default bound on `.include` nesting.
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 16;

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Engine settings. Deserializable so hosts can embed it in their own config
/// file; every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Keep compiled templates between renders.
    pub caching: bool,
    pub delimiters: Delimiters,
    pub max_include_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            caching: true,
            delimiters: Delimiters::default(),
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Compiled templates plus a counter bumped on every invalidation.
#[derive(Default)]
struct TemplateCache {
    entries: HashMap<String, Arc<CompiledTemplate>>,
    generation: u64,
}

/// Compiles, caches and renders templates by name.
pub struct Engine {
    source: RwLock<Arc<dyn SourceProvider>>,
    formatters: FormatterRegistry,
    cache: RwLock<TemplateCache>,
    caching: AtomicBool,
    config: EngineConfig,
}

impl Engine {
    /// An engine with the default [`EngineConfig`].
    pub fn new(source: impl SourceProvider + 'static, formatters: FormatterRegistry) -> Self {
        Self::with_config(source, formatters, EngineConfig::default())
    }

    pub fn with_config(
        source: impl SourceProvider + 'static,
        formatters: FormatterRegistry,
        config: EngineConfig,
    ) -> Self {
        let source: Arc<dyn SourceProvider> = Arc::new(source);
        Engine {
            source: RwLock::new(source),
            formatters,
            cache: RwLock::new(TemplateCache::default()),
            caching: AtomicBool::new(config.caching),
            config,
        }
    }

    pub fn formatters(&self) -> &FormatterRegistry {
        &self.formatters
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Render template `name` into `sink`.
    ///
    /// Missing data renders as empty output; a failing formatter, query or
    /// sink aborts with an error. Output written before the failure stays in
    /// the sink.
    pub fn render(
        &self,
        name: &str,
        data: &mut TemplateData<'_>,
        sink: &mut dyn Write,
    ) -> Result<(), RenderError> {
        let template = self.load(name)?;
        exec::execute(self, &template, data, sink)
    }

    pub fn render_to_vec(
        &self,
        name: &str,
        data: &mut TemplateData<'_>,
    ) -> Result<Vec<u8>, RenderError> {
        let mut out: Vec<u8> = Vec::new();
        self.render(name, data, &mut out)?;
        Ok(out)
    }

    pub fn render_to_string(
        &self,
        name: &str,
        data: &mut TemplateData<'_>,
    ) -> Result<String, RenderError> {
        Ok(String::from_utf8(self.render_to_vec(name, data)?)?)
    }

    /// Compile `text` under `name` and render it. The result is never cached;
    /// `.include`s inside it still go through the cache.
    pub fn render_str(
        &self,
        name: &str,
        text: &str,
        data: &mut TemplateData<'_>,
        sink: &mut dyn Write,
    ) -> Result<(), RenderError> {
        let template = parser::compile(name, text, &self.formatters, &self.config.delimiters)?;
        exec::execute(self, &template, data, sink)
    }

    /// Fetch and compile `name` without rendering it, installing it in the
    /// cache when caching is on.
    pub fn compile(&self, name: &str) -> Result<Arc<CompiledTemplate>, RenderError> {
        self.load(name)
    }

    /// Drop the cached entry for `name`. Returns whether one was present.
    pub fn invalidate(&self, name: &str) -> bool {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.generation += 1;
        let removed = cache.entries.remove(name).is_some();
        drop(cache);
        tracing::debug!(template = name, removed, "invalidated");
        removed
    }

    pub fn clear(&self) {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!(entries = cache.entries.len(), "cleared template cache");
        cache.generation += 1;
        cache.entries.clear();
    }

    pub fn is_cached(&self, name: &str) -> bool {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .contains_key(name)
    }

    pub fn caching(&self) -> bool {
        self.caching.load(Ordering::Acquire)
    }

    /// Turn caching on or off. Turning it off also empties the cache.
    pub fn set_caching(&self, enabled: bool) {
        self.caching.store(enabled, Ordering::Release);
        if !enabled {
            self.clear();
        }
    }

    /// Swap the source provider. Already-cached templates are kept; call
    /// [`Engine::clear`] to force them to be refetched.
    pub fn set_source(&self, source: impl SourceProvider + 'static) {
        let source: Arc<dyn SourceProvider> = Arc::new(source);
        *self.source.write().unwrap_or_else(PoisonError::into_inner) = source;
    }

    /// Cached template, or fetch + compile (+ install).
    pub(crate) fn load(&self, name: &str) -> Result<Arc<CompiledTemplate>, RenderError> {
        let caching = self.caching();
        let generation = {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if caching {
                if let Some(template) = cache.entries.get(name) {
                    tracing::trace!(template = name, "cache hit");
                    return Ok(Arc::clone(template));
                }
            }
            cache.generation
        };

        let template = Arc::new(self.fetch_and_compile(name)?);
        if caching && self.caching() {
            let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
            if cache.generation == generation {
                cache
                    .entries
                    .insert(name.to_string(), Arc::clone(&template));
                tracing::debug!(template = name, "installed compiled template");
            } else {
                tracing::debug!(template = name, "cache invalidated during compile; not installed");
            }
        }
        Ok(template)
    }

    fn fetch_and_compile(&self, name: &str) -> Result<CompiledTemplate, RenderError> {
        let source = self.source.read().unwrap_or_else(PoisonError::into_inner).clone();
        let bytes = source.fetch(name).map_err(|source| RenderError::Source {
            name: name.to_string(),
            source,
        })?;
        let text = String::from_utf8(bytes).map_err(|e| {
            let valid = &e.as_bytes()[..e.utf8_error().valid_up_to()];
            ParseError {
                template: name.to_string(),
                line: 1 + valid.iter().filter(|&&b| b == b'\n').count(),
                kind: ParseErrorKind::InvalidUtf8,
            }
        })?;
        tracing::debug!(template = name, bytes = text.len(), "compiling");
        Ok(parser::compile(
            name,
            &text,
            &self.formatters,
            &self.config.delimiters,
        )?)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cached = self
            .cache
            .read()
            .map(|c| c.entries.len())
            .unwrap_or_default();
        f.debug_struct("Engine")
            .field("formatters", &self.formatters)
            .field("cached", &cached)
            .field("caching", &self.caching())
            .field("config", &self.config)
            .finish()
    }
}

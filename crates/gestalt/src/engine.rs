//! The configuration engine: orchestrates load → merge → post-process →
//! decode, with caching and core-reload notification.

use crate::cache::{CacheKey, ValueCache};
use crate::config::GestaltConfig;
use crate::decode::{Decode, DecodeContext, DecoderRegistry};
use crate::error::{ErrorLevel, GestaltError, ValidationError};
use crate::lexer::PathLexer;
use crate::loader::ConfigLoader;
use crate::manager::NodeManager;
use crate::mapper::PathMapper;
use crate::node;
use crate::post::PostProcessorChain;
use crate::results::Validated;
use crate::source::{ConfigSource, SourceId};
use crate::tag::Tags;
use parking_lot::RwLock;
use std::any::type_name;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Notified after every successful generation build.
pub trait CoreReloadListener: Send + Sync {
    fn on_core_reload(&self);
}

/// A built configuration instance.
///
/// Construct one through [`crate::builder::GestaltBuilder`], call
/// [`Gestalt::load_configs`] to produce the first generation, then read
/// typed values with [`Gestalt::get_config`] and friends.
pub struct Gestalt {
    sources: Vec<Arc<dyn ConfigSource>>,
    loaders: Vec<Arc<dyn ConfigLoader>>,
    registry: DecoderRegistry,
    mappers: Vec<Arc<dyn PathMapper>>,
    lexer: PathLexer,
    manager: NodeManager,
    chain: PostProcessorChain,
    listeners: RwLock<Vec<Arc<dyn CoreReloadListener>>>,
    cache: ValueCache,
    config: GestaltConfig,
}

impl std::fmt::Debug for Gestalt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gestalt")
            .field("sources", &self.sources.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("generation", &self.manager.snapshot().id())
            .finish_non_exhaustive()
    }
}

impl Gestalt {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        sources: Vec<Arc<dyn ConfigSource>>,
        loaders: Vec<Arc<dyn ConfigLoader>>,
        registry: DecoderRegistry,
        mappers: Vec<Arc<dyn PathMapper>>,
        lexer: PathLexer,
        chain: PostProcessorChain,
        listeners: Vec<Arc<dyn CoreReloadListener>>,
        config: GestaltConfig,
    ) -> Self {
        Self {
            sources,
            loaders,
            registry,
            mappers,
            lexer,
            manager: NodeManager::new(),
            chain,
            listeners: RwLock::new(listeners),
            cache: ValueCache::new(),
            config,
        }
    }

    /// Id of the currently published generation (0 before the first load).
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.manager.snapshot().id()
    }

    /// Registers a listener for core-reload events.
    pub fn register_listener(&self, listener: Arc<dyn CoreReloadListener>) {
        self.listeners.write().push(listener);
    }

    /// Loads every source in order, merges their fragments (later sources
    /// win), post-processes, and publishes a new generation.
    pub fn load_configs(&self) -> Result<(), GestaltError> {
        for source in &self.sources {
            self.load_source(source)?;
        }
        self.rebuild()
    }

    /// Re-loads a single source by id and publishes a new generation,
    /// keeping the original source precedence.
    pub fn reload_source(&self, source_id: &SourceId) -> Result<(), GestaltError> {
        let source = self
            .sources
            .iter()
            .find(|source| &source.id() == source_id)
            .ok_or_else(|| GestaltError::Build {
                message: format!("unknown source id \"{source_id}\"").into(),
            })?
            .clone();
        self.load_source(&source)?;
        self.rebuild()
    }

    fn load_source(&self, source: &Arc<dyn ConfigSource>) -> Result<(), GestaltError> {
        let format = source.format();
        let loader = self
            .loaders
            .iter()
            .find(|loader| loader.accepts(&format))
            .ok_or_else(|| GestaltError::SourceLoad {
                name: source.name(),
                message: format!("no loader accepts format \"{format}\"").into(),
            })?;

        debug!(source = %source.id(), loader = loader.name(), "loading source");
        let (fragment, errors) = loader.load(source.as_ref(), &self.lexer)?.into_parts();
        if fragment.is_none() || errors.iter().any(|e| e.level() == ErrorLevel::Error) {
            return Err(GestaltError::SourceLoad {
                name: source.name(),
                message: errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ")
                    .into(),
            });
        }
        for error in &errors {
            warn!(source = %source.id(), %error, "source produced a non-fatal error");
        }

        if let Some(fragment) = fragment {
            self.manager.upsert_fragment(source.id(), fragment);
        }
        Ok(())
    }

    fn rebuild(&self) -> Result<(), GestaltError> {
        let (root, errors) = self
            .manager
            .build_root(&self.chain, &self.lexer, &self.config)
            .into_parts();

        if errors.iter().any(|e| e.level() == ErrorLevel::Error) {
            return Err(GestaltError::PostProcessing { errors });
        }
        for error in &errors {
            match error.level() {
                ErrorLevel::Warn | ErrorLevel::MissingValue => {
                    warn!(%error, "generation build produced a non-fatal error");
                },
                _ => debug!(%error, "generation build note"),
            }
        }

        let root = root.ok_or_else(|| GestaltError::Build {
            message: "generation build produced no tree".into(),
        })?;

        // Clear memoized values before the swap: a reader that beats the
        // swap sees the old generation and its cached values, which remain
        // mutually consistent.
        self.cache.invalidate_all();
        let generation = self.manager.publish(root);
        info!(generation = generation.id(), "configuration reloaded");

        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener.on_core_reload();
        }
        Ok(())
    }

    /// Reads and decodes a typed value at `path`.
    ///
    /// Fails on error-level problems and missing values; warnings fail too
    /// when `treat_warnings_as_errors` is set.
    pub fn get_config<T>(&self, path: &str) -> Result<T, GestaltError>
    where
        T: Decode + Clone,
    {
        self.get_config_with_tags(path, Tags::empty())
    }

    /// [`Gestalt::get_config`] with tags namespacing the cache entry.
    pub fn get_config_with_tags<T>(&self, path: &str, tags: Tags) -> Result<T, GestaltError>
    where
        T: Decode + Clone,
    {
        let key = self
            .config
            .use_cache
            .then(|| CacheKey::new::<T>(path, tags.clone()));
        if let Some(key) = &key {
            if let Some(hit) = self.cache.get::<T>(key) {
                return Ok(hit);
            }
        }

        let (result, cacheable) = self.resolve::<T>(path);
        let value = self.finish(path, result)?;
        if let Some(key) = key {
            if cacheable {
                self.cache.insert(key, value.clone());
            }
        }
        Ok(value)
    }

    /// Reads a typed value, returning `None` when it is absent. Corrupt
    /// data still fails.
    pub fn get_config_optional<T>(&self, path: &str) -> Result<Option<T>, GestaltError>
    where
        T: Decode + Clone,
    {
        self.get_config_with_tags::<Option<T>>(path, Tags::empty())
    }

    /// Reads a typed value, falling back to `default` when it is missing.
    /// Corrupt data still fails.
    pub fn get_config_or<T>(&self, path: &str, default: T) -> Result<T, GestaltError>
    where
        T: Decode + Clone,
    {
        match self.get_config_with_tags::<T>(path, Tags::empty()) {
            Ok(value) => Ok(value),
            Err(GestaltError::Decode { errors, .. })
                if errors.iter().all(ValidationError::is_missing) =>
            {
                debug!(path, "missing value, falling back to provided default");
                Ok(default)
            },
            Err(error) => Err(error),
        }
    }

    fn resolve<T: Decode>(&self, path: &str) -> (Validated<T>, bool) {
        let snapshot = self.manager.snapshot();
        let ctx = DecodeContext::new(&self.registry, &self.config, &self.lexer, &self.mappers);

        let (tokens, token_errors) = self.lexer.tokenize("getConfig", path).into_parts();
        let Some(tokens) = tokens else {
            return (Validated::errors(token_errors), false);
        };

        let (found, nav_errors) = node::navigate(snapshot.root(), &tokens).into_parts();
        match found {
            Some(target) => {
                let cacheable = !target.metadata().is_secret();
                (ctx.decode::<T>(path, target), cacheable)
            },
            None if nav_errors.iter().all(ValidationError::is_missing) => {
                (ctx.decode_absent::<T>(path), true)
            },
            None => (Validated::errors(nav_errors), false),
        }
    }

    fn finish<T>(&self, path: &str, result: Validated<T>) -> Result<T, GestaltError> {
        let (value, errors) = result.into_parts();
        let failing = errors.iter().any(|error| self.error_fails(error));
        match value {
            Some(value) if !failing => {
                for error in &errors {
                    debug!(path, %error, "non-fatal error reading config");
                }
                Ok(value)
            },
            _ => Err(GestaltError::Decode {
                path: path.to_owned(),
                kind: type_name::<T>().into(),
                errors,
            }),
        }
    }

    fn error_fails(&self, error: &ValidationError) -> bool {
        let level = error.level();
        if self.config.treat_warnings_as_errors {
            level > ErrorLevel::Debug
        } else {
            matches!(level, ErrorLevel::Error | ErrorLevel::MissingValue)
        }
    }
}

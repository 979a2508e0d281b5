//! The builder: explicit registration of sources, loaders, decoders,
//! mappers, transforms, and policies, then [`GestaltBuilder::build`].
//!
//! At least one source is required; the type-state transition from
//! [`NoSources`] to [`WithSources`] enforces that at compile time.

use crate::config::GestaltConfig;
use crate::decode::{Decoder, DecoderRegistry};
use crate::engine::{CoreReloadListener, Gestalt};
use crate::error::{ErrorLevel, GestaltError};
use crate::lexer::{DEFAULT_DELIMITER, PathLexer};
use crate::loader::{ConfigLoader, EnvVarsLoader, MapLoader, PropertiesLoader};
use crate::mapper::{PathMapper, SnakeCasePathMapper, StandardPathMapper};
use crate::post::{
    EnvTransform, FileTransform, NodeTransform, PostProcessor, PostProcessorChain, SecretRule,
    SubstitutionProcessor, TemporarySecretProcessor, Transform,
};
use crate::source::ConfigSource;
use private::Sealed;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Default)]
pub struct NoSources;

#[derive(Debug)]
pub struct WithSources(Vec<Arc<dyn ConfigSource>>);

mod private {
    pub(super) trait Sealed {}
}
impl Sealed for NoSources {}
impl Sealed for WithSources {}

/// Builder for a [`Gestalt`] instance.
#[allow(private_bounds)]
pub struct GestaltBuilder<S: Sealed = NoSources> {
    state: S,
    config: GestaltConfig,
    delimiter: char,
    loaders: Vec<Arc<dyn ConfigLoader>>,
    mappers: Vec<Arc<dyn PathMapper>>,
    processors: Vec<Arc<dyn PostProcessor>>,
    transforms: Vec<Arc<dyn Transform>>,
    secret_rules: Vec<(String, usize)>,
    listeners: Vec<Arc<dyn CoreReloadListener>>,
    registry: DecoderRegistry,
}

impl Default for GestaltBuilder<NoSources> {
    fn default() -> Self {
        Self {
            state: NoSources,
            config: GestaltConfig::default(),
            delimiter: DEFAULT_DELIMITER,
            loaders: Vec::new(),
            mappers: Vec::new(),
            processors: Vec::new(),
            transforms: Vec::new(),
            secret_rules: Vec::new(),
            listeners: Vec::new(),
            registry: DecoderRegistry::new(),
        }
    }
}

#[allow(private_bounds)]
impl<S: Sealed + std::fmt::Debug> std::fmt::Debug for GestaltBuilder<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GestaltBuilder")
            .field("state", &self.state)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[allow(private_bounds)]
impl<S: Sealed> GestaltBuilder<S> {
    fn transition<N: Sealed>(self, state: N) -> GestaltBuilder<N> {
        GestaltBuilder {
            state,
            config: self.config,
            delimiter: self.delimiter,
            loaders: self.loaders,
            mappers: self.mappers,
            processors: self.processors,
            transforms: self.transforms,
            secret_rules: self.secret_rules,
            listeners: self.listeners,
            registry: self.registry,
        }
    }

    /// Registers a format loader; tried before the built-in loaders.
    #[must_use]
    pub fn add_loader(mut self, loader: impl ConfigLoader + 'static) -> Self {
        self.loaders.push(Arc::new(loader));
        self
    }

    /// Registers a decoder override for its target type.
    #[must_use]
    pub fn add_decoder<T: 'static>(mut self, decoder: impl Decoder<T>) -> Self {
        self.registry.add_decoder(decoder);
        self
    }

    /// Registers a path mapper; tried before the built-in mappers.
    #[must_use]
    pub fn add_path_mapper(mut self, mapper: impl PathMapper + 'static) -> Self {
        self.mappers.push(Arc::new(mapper));
        self
    }

    /// Registers a post-processor; ordering among processors is by
    /// priority.
    #[must_use]
    pub fn add_post_processor(mut self, processor: impl PostProcessor + 'static) -> Self {
        self.processors.push(Arc::new(processor));
        self
    }

    /// Registers a substitution transform; a transform with a built-in
    /// name replaces the built-in.
    #[must_use]
    pub fn add_transform(mut self, transform: impl Transform + 'static) -> Self {
        self.transforms.push(Arc::new(transform));
        self
    }

    /// Marks leaves whose path matches `pattern` as temporary secrets
    /// readable `accesses` times.
    #[must_use]
    pub fn add_secret_rule(mut self, pattern: impl Into<String>, accesses: usize) -> Self {
        self.secret_rules.push((pattern.into(), accesses));
        self
    }

    /// Registers a core-reload listener.
    #[must_use]
    pub fn add_listener(mut self, listener: Arc<dyn CoreReloadListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Path segment delimiter, `.` by default.
    #[must_use]
    pub const fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    #[must_use]
    pub const fn treat_warnings_as_errors(mut self, enabled: bool) -> Self {
        self.config.treat_warnings_as_errors = enabled;
        self
    }

    #[must_use]
    pub const fn treat_missing_array_index_as_error(mut self, enabled: bool) -> Self {
        self.config.treat_missing_array_index_as_error = enabled;
        self
    }

    #[must_use]
    pub const fn treat_missing_values_as_errors(mut self, enabled: bool) -> Self {
        self.config.treat_missing_values_as_errors = enabled;
        self
    }

    #[must_use]
    pub const fn treat_null_values_in_class_as_errors(mut self, enabled: bool) -> Self {
        self.config.treat_null_values_in_class_as_errors = enabled;
        self
    }

    /// Level recorded when a default or optional target absorbs a missing
    /// value.
    #[must_use]
    pub const fn log_level_for_missing_values(mut self, level: ErrorLevel) -> Self {
        self.config.log_level_for_missing_values_when_default_or_optional = level;
        self
    }

    #[must_use]
    pub fn date_decoder_format(mut self, format: impl Into<String>) -> Self {
        self.config.date_decoder_format = Some(format.into());
        self
    }

    #[must_use]
    pub fn local_date_time_format(mut self, format: impl Into<String>) -> Self {
        self.config.local_date_time_format = Some(format.into());
        self
    }

    #[must_use]
    pub fn local_date_format(mut self, format: impl Into<String>) -> Self {
        self.config.local_date_format = Some(format.into());
        self
    }

    #[must_use]
    pub fn substitution_opening_token(mut self, token: impl Into<String>) -> Self {
        self.config.substitution_opening_token = token.into();
        self
    }

    #[must_use]
    pub fn substitution_closing_token(mut self, token: impl Into<String>) -> Self {
        self.config.substitution_closing_token = token.into();
        self
    }

    #[must_use]
    pub fn substitution_regex(mut self, pattern: impl Into<String>) -> Self {
        self.config.substitution_regex = pattern.into();
        self
    }

    #[must_use]
    pub const fn max_substitution_nested_depth(mut self, depth: usize) -> Self {
        self.config.max_substitution_nested_depth = depth;
        self
    }

    #[must_use]
    pub const fn use_cache(mut self, enabled: bool) -> Self {
        self.config.use_cache = enabled;
        self
    }
}

impl GestaltBuilder<NoSources> {
    #[must_use = "the builder must be given at least one source and built"]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the first configuration source.
    #[must_use]
    pub fn add_source(self, source: impl ConfigSource + 'static) -> GestaltBuilder<WithSources> {
        let source: Arc<dyn ConfigSource> = Arc::new(source);
        self.transition(WithSources(vec![source]))
    }
}

impl GestaltBuilder<WithSources> {
    /// Adds another source; later sources win merge conflicts.
    #[must_use]
    pub fn add_source(mut self, source: impl ConfigSource + 'static) -> Self {
        self.state.0.push(Arc::new(source));
        self
    }

    /// Finalizes the configuration instance. Sources sharing an id dedupe
    /// to the first registration. Call [`Gestalt::load_configs`] next.
    pub fn build(self) -> Result<Gestalt, GestaltError> {
        let mut sources: Vec<Arc<dyn ConfigSource>> = Vec::new();
        for source in self.state.0 {
            if sources.iter().any(|existing| existing.id() == source.id()) {
                warn!(source = %source.id(), "duplicate source dropped");
                continue;
            }
            sources.push(source);
        }

        let lexer = PathLexer::new(self.delimiter);

        let mut loaders = self.loaders;
        loaders.push(Arc::new(MapLoader));
        loaders.push(Arc::new(EnvVarsLoader));
        loaders.push(Arc::new(PropertiesLoader));

        let mut mappers = self.mappers;
        mappers.push(Arc::new(StandardPathMapper));
        mappers.push(Arc::new(SnakeCasePathMapper));

        let mut transforms: Vec<Arc<dyn Transform>> =
            vec![Arc::new(EnvTransform), Arc::new(NodeTransform), Arc::new(FileTransform)];
        transforms.extend(self.transforms);

        let substitution = SubstitutionProcessor::new(
            self.config.substitution_opening_token.clone(),
            self.config.substitution_closing_token.clone(),
            &self.config.substitution_regex,
            self.config.max_substitution_nested_depth,
            transforms,
        )
        .map_err(|error| GestaltError::Build {
            message: format!("invalid substitution regex: {error}").into(),
        })?;

        let mut processors = self.processors;
        processors.push(Arc::new(substitution));
        if !self.secret_rules.is_empty() {
            let rules = self
                .secret_rules
                .iter()
                .map(|(pattern, accesses)| SecretRule::new(pattern, *accesses))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|error| GestaltError::Build {
                    message: format!("invalid secret rule pattern: {error}").into(),
                })?;
            processors.push(Arc::new(TemporarySecretProcessor::new(rules)));
        }

        Ok(Gestalt::new(
            sources,
            loaders,
            self.registry,
            mappers,
            lexer,
            PostProcessorChain::new(processors),
            self.listeners,
            self.config,
        ))
    }
}

//! Configuration sources: where raw configuration comes from.
//!
//! A source either streams bytes (parsed by a format loader) or materializes
//! a key/value list. Sources are identified by a stable id; adding the same
//! source twice dedupes by id, keeping the first registration.

use crate::error::GestaltError;
use crate::tag::Tags;
use std::fmt;
use std::path::{Path, PathBuf};

/// Format name of in-memory key/value sources.
pub const FORMAT_MAP: &str = "mapConfig";

/// Format name of the environment-variables source.
pub const FORMAT_ENV_VARS: &str = "envVars";

/// Format name of `.properties` files.
pub const FORMAT_PROPERTIES: &str = "properties";

/// Stable identity of a source, used for dedupe and reload targeting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceId(String);

impl SourceId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A provider of raw configuration.
pub trait ConfigSource: Send + Sync {
    /// Human-readable name, used in errors and logs.
    fn name(&self) -> String;

    /// Stable identity; equality of sources is equality of ids.
    fn id(&self) -> SourceId;

    /// Format name used to select a loader.
    fn format(&self) -> String;

    /// Tags attached to this source's values.
    fn tags(&self) -> Tags {
        Tags::empty()
    }

    fn has_stream(&self) -> bool {
        false
    }

    fn load_stream(&self) -> Result<Vec<u8>, GestaltError> {
        Err(GestaltError::SourceLoad {
            name: self.name(),
            message: "source does not provide a stream".into(),
        })
    }

    fn has_list(&self) -> bool {
        false
    }

    fn load_list(&self) -> Result<Vec<(String, String)>, GestaltError> {
        Err(GestaltError::SourceLoad {
            name: self.name(),
            message: "source does not provide a key/value list".into(),
        })
    }
}

impl fmt::Debug for dyn ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Materializes the process environment as a key/value list, optionally
/// filtered by a prefix (which can be stripped from the keys).
#[derive(Debug, Clone, Default)]
pub struct EnvVarsSource {
    prefix: Option<String>,
    strip_prefix: bool,
    tags: Tags,
}

impl EnvVarsSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Only variables starting with `prefix` are loaded.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Removes the prefix (and one following separator) from loaded keys.
    #[must_use]
    pub fn strip_prefix(mut self, strip: bool) -> Self {
        self.strip_prefix = strip;
        self
    }

    #[must_use]
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }
}

impl ConfigSource for EnvVarsSource {
    fn name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("environment variables ({prefix}*)"),
            None => "environment variables".to_owned(),
        }
    }

    fn id(&self) -> SourceId {
        match &self.prefix {
            Some(prefix) => SourceId::new(format!("env-vars:{prefix}")),
            None => SourceId::new("env-vars"),
        }
    }

    fn format(&self) -> String {
        FORMAT_ENV_VARS.to_owned()
    }

    fn tags(&self) -> Tags {
        self.tags.clone()
    }

    fn has_list(&self) -> bool {
        true
    }

    fn load_list(&self) -> Result<Vec<(String, String)>, GestaltError> {
        let entries = std::env::vars()
            .filter(|(key, _)| {
                self.prefix.as_deref().is_none_or(|prefix| key.starts_with(prefix))
            })
            .map(|(key, value)| {
                let key = match (&self.prefix, self.strip_prefix) {
                    (Some(prefix), true) => {
                        let stripped = key.trim_start_matches(prefix.as_str());
                        stripped.trim_start_matches(['_', '.']).to_owned()
                    },
                    _ => key,
                };
                (key, value)
            })
            .filter(|(key, _)| !key.is_empty())
            .collect();
        Ok(entries)
    }
}

/// An in-memory key/value source, mainly for defaults and tests.
#[derive(Debug, Clone)]
pub struct MapSource {
    name: String,
    entries: Vec<(String, String)>,
    tags: Tags,
}

impl MapSource {
    #[must_use]
    pub fn new<K, V>(name: impl Into<String>, entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            name: name.into(),
            entries: entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            tags: Tags::empty(),
        }
    }

    #[must_use]
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }
}

impl ConfigSource for MapSource {
    fn name(&self) -> String {
        format!("map source {}", self.name)
    }

    fn id(&self) -> SourceId {
        SourceId::new(format!("map:{}", self.name))
    }

    fn format(&self) -> String {
        FORMAT_MAP.to_owned()
    }

    fn tags(&self) -> Tags {
        self.tags.clone()
    }

    fn has_list(&self) -> bool {
        true
    }

    fn load_list(&self) -> Result<Vec<(String, String)>, GestaltError> {
        Ok(self.entries.clone())
    }
}

/// Streams a file's bytes; the format defaults to the file extension.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    format: Option<String>,
    tags: Tags,
}

impl FileSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), format: None, tags: Tags::empty() }
    }

    /// Overrides the format derived from the file extension.
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    #[must_use]
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for FileSource {
    fn name(&self) -> String {
        format!("file source {}", self.path.display())
    }

    fn id(&self) -> SourceId {
        SourceId::new(format!("file:{}", self.path.display()))
    }

    fn format(&self) -> String {
        self.format.clone().unwrap_or_else(|| {
            self.path
                .extension()
                .and_then(|ext| ext.to_str())
                .unwrap_or_default()
                .to_owned()
        })
    }

    fn tags(&self) -> Tags {
        self.tags.clone()
    }

    fn has_stream(&self) -> bool {
        true
    }

    fn load_stream(&self) -> Result<Vec<u8>, GestaltError> {
        std::fs::read(&self.path).map_err(|source| GestaltError::Io {
            path: self.path.display().to_string(),
            source,
        })
    }
}

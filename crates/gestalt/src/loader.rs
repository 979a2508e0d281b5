//! Format loaders: turn a source's contribution into a config node
//! fragment.
//!
//! Rich formats (YAML, JSON, HOCON, ...) plug in through the same trait;
//! the built-in loaders cover key/value lists, environment variables, and
//! `.properties` streams.

use crate::error::GestaltError;
use crate::lexer::PathLexer;
use crate::node::{self, ConfigNode};
use crate::results::Validated;
use crate::source::{ConfigSource, FORMAT_ENV_VARS, FORMAT_MAP, FORMAT_PROPERTIES};
use crate::token::Token;
use tracing::trace;

pub trait ConfigLoader: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this loader understands the given source format.
    fn accepts(&self, format: &str) -> bool;

    /// Loads the source into a single node fragment. IO failures are
    /// fatal; malformed entries accumulate as validation errors.
    fn load(
        &self,
        source: &dyn ConfigSource,
        lexer: &PathLexer,
    ) -> Result<Validated<ConfigNode>, GestaltError>;
}

fn tree_from_pairs(
    pairs: Vec<(String, String)>,
    lexer: &PathLexer,
) -> Validated<ConfigNode> {
    let mut errors = Vec::new();
    let mut tokenized = Vec::with_capacity(pairs.len());
    for (key, value) in pairs {
        let (tokens, key_errors) = lexer.tokenize("loader", &key).into_parts();
        errors.extend(key_errors);
        if let Some(tokens) = tokens {
            tokenized.push((tokens, value));
        }
    }
    let mut tree = node::build_tree(tokenized);
    tree.add_errors(errors);
    tree
}

/// Loads in-memory key/value lists, lexing each key as a path.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapLoader;

impl ConfigLoader for MapLoader {
    fn name(&self) -> &'static str {
        "MapLoader"
    }

    fn accepts(&self, format: &str) -> bool {
        format == FORMAT_MAP
    }

    fn load(
        &self,
        source: &dyn ConfigSource,
        lexer: &PathLexer,
    ) -> Result<Validated<ConfigNode>, GestaltError> {
        let pairs = source.load_list()?;
        trace!(source = %source.id(), entries = pairs.len(), "loading map source");
        Ok(tree_from_pairs(pairs, lexer))
    }
}

/// Loads environment-variable lists: `DB_HOSTS_0_URL` becomes the path
/// `db.hosts[0].url` (underscores separate segments, numeric segments are
/// indices, keys are lowercased).
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvVarsLoader;

impl EnvVarsLoader {
    fn tokens_for(key: &str) -> Vec<Token> {
        key.split('_')
            .filter(|segment| !segment.is_empty())
            .map(|segment| {
                if segment.chars().all(|c| c.is_ascii_digit()) {
                    match segment.parse::<usize>() {
                        Ok(index) => Token::Index(index),
                        Err(_) => Token::Object(segment.to_lowercase()),
                    }
                } else {
                    Token::Object(segment.to_lowercase())
                }
            })
            .collect()
    }
}

impl ConfigLoader for EnvVarsLoader {
    fn name(&self) -> &'static str {
        "EnvVarsLoader"
    }

    fn accepts(&self, format: &str) -> bool {
        format == FORMAT_ENV_VARS
    }

    fn load(
        &self,
        source: &dyn ConfigSource,
        _lexer: &PathLexer,
    ) -> Result<Validated<ConfigNode>, GestaltError> {
        let pairs = source.load_list()?;
        trace!(source = %source.id(), entries = pairs.len(), "loading environment variables");
        let tokenized = pairs
            .into_iter()
            .map(|(key, value)| (Self::tokens_for(&key), value))
            .filter(|(tokens, _)| !tokens.is_empty())
            .collect::<Vec<_>>();
        Ok(node::build_tree(tokenized))
    }
}

/// Loads `.properties` streams: `key=value` lines, `#`/`!` comments.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropertiesLoader;

impl ConfigLoader for PropertiesLoader {
    fn name(&self) -> &'static str {
        "PropertiesLoader"
    }

    fn accepts(&self, format: &str) -> bool {
        format == FORMAT_PROPERTIES
    }

    fn load(
        &self,
        source: &dyn ConfigSource,
        lexer: &PathLexer,
    ) -> Result<Validated<ConfigNode>, GestaltError> {
        let bytes = source.load_stream()?;
        let text = String::from_utf8(bytes).map_err(|_| GestaltError::SourceLoad {
            name: source.name(),
            message: "properties stream is not valid UTF-8".into(),
        })?;

        let pairs = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
            .filter_map(|line| {
                line.split_once('=')
                    .map(|(key, value)| (key.trim().to_owned(), value.trim().to_owned()))
            })
            .collect();
        Ok(tree_from_pairs(pairs, lexer))
    }
}

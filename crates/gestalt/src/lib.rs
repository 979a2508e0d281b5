//! Gestalt is a layered configuration library.
//!
//! Heterogeneous sources (files, environment variables, in-memory maps)
//! are merged into a single hierarchical node tree, post-processed
//! (string substitution, temporary secrets), and decoded into typed values
//! on demand, with caching and live reloads.
//!
//! ## Pipeline
//!
//! ```text
//! sources -> loaders -> node fragments -> merge (later wins)
//!         -> post-processors -> frozen generation
//!         -> navigate -> decode -> cache
//! ```
//!
//! Each [`Gestalt::load_configs`] produces a new frozen *generation* of the
//! tree; readers always observe exactly one generation, and the typed-value
//! cache is cleared before a new one is published.
//!
//! ## Errors
//!
//! Nothing below the public API aborts on the first problem: tokenizing,
//! merging, and decoding accumulate [`ValidationError`]s inside a
//! [`Validated`] container, and only the `get_config` family translates
//! accumulated failures into a [`GestaltError`].
//!
//! ## Example
//!
//! ```rust
//! use gestalt::prelude::*;
//!
//! #[derive(DecodeConfig, Clone, Debug)]
//! struct DbConfig {
//!     host: String,
//!     port: u16,
//! }
//!
//! # fn main() -> Result<(), GestaltError> {
//! let gestalt = GestaltBuilder::new()
//!     .add_source(MapSource::new(
//!         "defaults",
//!         vec![
//!             ("db.host", "localhost"),
//!             ("db.port", "5432"),
//!             ("db.timeout", "${db.default_timeout:=90}"),
//!         ],
//!     ))
//!     .build()?;
//! gestalt.load_configs()?;
//!
//! let db: DbConfig = gestalt.get_config("db")?;
//! assert_eq!(db.host, "localhost");
//! assert_eq!(db.port, 5432);
//!
//! // The substitution had no value for `db.default_timeout`, so the
//! // default applied.
//! let timeout: u64 = gestalt.get_config("db.timeout")?;
//! assert_eq!(timeout, 90);
//! # Ok(())
//! # }
//! ```

mod builder;
mod cache;
mod config;
pub mod decode;
mod engine;
mod error;
mod lexer;
mod loader;
mod manager;
mod mapper;
mod metadata;
pub mod node;
pub mod post;
mod priority;
mod results;
mod source;
mod tag;
pub mod token;

pub use builder::{GestaltBuilder, NoSources, WithSources};
pub use config::{
    DEFAULT_SUBSTITUTION_CLOSING, DEFAULT_SUBSTITUTION_MAX_DEPTH, DEFAULT_SUBSTITUTION_OPENING,
    DEFAULT_SUBSTITUTION_REGEX, GestaltConfig,
};
pub use engine::{CoreReloadListener, Gestalt};
pub use error::{ErrorLevel, GestaltError, ValidationError};
pub use gestalt_derive::DecodeConfig;
pub use lexer::{DEFAULT_DELIMITER, PathLexer};
pub use loader::{ConfigLoader, EnvVarsLoader, MapLoader, PropertiesLoader};
pub use manager::{Generation, NodeManager};
pub use mapper::{PathMapper, SnakeCasePathMapper, StandardPathMapper};
pub use metadata::{META_IS_SECRET, META_SOURCE, MetaValue, Metadata};
pub use node::{ConfigNode, LeafNode, LeafValue, MapNode, NodeKind, TemporaryValue};
pub use priority::Priority;
pub use results::Validated;
pub use source::{
    ConfigSource, EnvVarsSource, FORMAT_ENV_VARS, FORMAT_MAP, FORMAT_PROPERTIES, FileSource,
    MapSource, SourceId,
};
pub use tag::Tags;
pub use token::Token;

pub mod prelude {
    pub use crate::builder::GestaltBuilder;
    pub use crate::config::GestaltConfig;
    pub use crate::decode::{Decode, DecodeContext, Decoder, DecoderRegistry};
    pub use crate::engine::{CoreReloadListener, Gestalt};
    pub use crate::error::{ErrorLevel, GestaltError, ValidationError};
    pub use crate::node::ConfigNode;
    pub use crate::post::{PostProcessor, Transform};
    pub use crate::priority::Priority;
    pub use crate::results::Validated;
    pub use crate::source::{ConfigSource, EnvVarsSource, FileSource, MapSource, SourceId};
    pub use crate::tag::Tags;
    pub use gestalt_derive::DecodeConfig;
}

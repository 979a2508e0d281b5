//! The decoder registry and typed decoding pipeline.
//!
//! Decoding is type-driven through the [`Decode`] trait: primitives parse
//! leaf values, containers recurse, and derived objects walk their declared
//! fields. Every recursion re-enters [`DecodeContext::decode`], which first
//! consults the registry of user-registered [`Decoder`]s for the concrete
//! type (highest [`Priority`] wins, first-added breaks ties) before falling
//! back to the built-in `Decode` impl, so overrides apply recursively.

mod composite;
mod date;
mod duration;
mod leaf;

pub use date::{DEFAULT_LOCAL_DATE_FORMAT, DEFAULT_LOCAL_DATE_TIME_FORMAT};
pub use leaf::leaf_value;

use crate::config::GestaltConfig;
use crate::error::{ErrorLevel, ValidationError};
use crate::lexer::PathLexer;
use crate::mapper::PathMapper;
use crate::node::{self, ConfigNode};
pub use crate::priority::Priority;
use crate::results::Validated;
use fxhash::FxHashMap;
use std::any::{Any, TypeId, type_name};
use std::sync::Arc;
use tracing::{trace, warn};

/// A registered decoder for one concrete target type.
///
/// Registered decoders take precedence over the built-in [`Decode`] impl of
/// the same type; recursion through the context keeps that precedence for
/// nested values.
pub trait Decoder<T: 'static>: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn priority(&self) -> Priority {
        Priority::Medium
    }

    fn decode(&self, path: &str, node: &ConfigNode, ctx: &DecodeContext<'_>) -> Validated<T>;
}

/// A type decodable from a config node. Implemented for primitives, chrono
/// dates, `Duration`, `Uuid`, `PathBuf`, containers, and by
/// `#[derive(DecodeConfig)]` for user structs and enums.
pub trait Decode: Sized + Send + Sync + 'static {
    fn decode(path: &str, node: &ConfigNode, ctx: &DecodeContext<'_>) -> Validated<Self>;

    /// Called when no node exists at `path`. The default reports a missing
    /// value; optional targets override this to absorb the absence.
    fn absent(path: &str, ctx: &DecodeContext<'_>) -> Validated<Self> {
        Validated::invalid(ctx.missing_error::<Self>(path))
    }
}

struct DecoderEntry {
    name: &'static str,
    priority: Priority,
    seq: usize,
    decoder: Box<dyn Any + Send + Sync>,
}

impl std::fmt::Debug for DecoderEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderEntry")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish()
    }
}

/// Decoders registered by concrete target type.
#[derive(Debug, Default)]
pub struct DecoderRegistry {
    decoders: FxHashMap<TypeId, Vec<DecoderEntry>>,
    seq: usize,
}

impl DecoderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a decoder for `T`. Duplicates by `(name, priority)` are
    /// dropped with a warning; a second decoder at an already-taken
    /// priority is kept but the earlier registration wins selection.
    pub fn add_decoder<T: 'static>(&mut self, decoder: impl Decoder<T>) {
        let name = decoder.name();
        let priority = decoder.priority();
        let entries = self.decoders.entry(TypeId::of::<T>()).or_default();

        if entries.iter().any(|e| e.name == name && e.priority == priority) {
            warn!(decoder = name, %priority, "duplicate decoder registration dropped");
            return;
        }
        if entries.iter().any(|e| e.priority == priority) {
            warn!(
                decoder = name,
                %priority,
                kind = type_name::<T>(),
                "multiple decoders registered at the same priority, first registered wins"
            );
        }

        self.seq += 1;
        let erased: Arc<dyn Decoder<T>> = Arc::new(decoder);
        entries.push(DecoderEntry { name, priority, seq: self.seq, decoder: Box::new(erased) });
        entries.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));
    }

    /// Registered decoders for `T`, in selection order.
    #[must_use]
    pub fn decoders_for<T: 'static>(&self) -> Vec<(&'static str, Priority)> {
        self.decoders
            .get(&TypeId::of::<T>())
            .map(|entries| entries.iter().map(|e| (e.name, e.priority)).collect())
            .unwrap_or_default()
    }

    fn dispatch<T: Decode>(
        &self,
        path: &str,
        node: &ConfigNode,
        ctx: &DecodeContext<'_>,
    ) -> Option<Validated<T>> {
        let entries = self.decoders.get(&TypeId::of::<T>())?;
        let entry = entries.first()?;
        trace!(decoder = entry.name, path, "dispatching registered decoder");
        match entry.decoder.downcast_ref::<Arc<dyn Decoder<T>>>() {
            Some(decoder) => Some(decoder.decode(path, node, ctx)),
            None => Some(Validated::invalid(ValidationError::NoDecoderFor {
                kind: type_name::<T>().into(),
            })),
        }
    }
}

/// Everything a decoder invocation can reach: the registry for recursion,
/// the policy config, and the lexer plus path mappers for field navigation.
#[derive(Clone, Copy)]
pub struct DecodeContext<'a> {
    registry: &'a DecoderRegistry,
    config: &'a GestaltConfig,
    lexer: &'a PathLexer,
    mappers: &'a [Arc<dyn PathMapper>],
}

impl std::fmt::Debug for DecodeContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeContext").finish_non_exhaustive()
    }
}

impl<'a> DecodeContext<'a> {
    #[must_use]
    pub fn new(
        registry: &'a DecoderRegistry,
        config: &'a GestaltConfig,
        lexer: &'a PathLexer,
        mappers: &'a [Arc<dyn PathMapper>],
    ) -> Self {
        Self { registry, config, lexer, mappers }
    }

    #[must_use]
    pub fn config(&self) -> &GestaltConfig {
        self.config
    }

    #[must_use]
    pub fn lexer(&self) -> &PathLexer {
        self.lexer
    }

    /// Decodes a node as `T`, preferring registered decoders over the
    /// built-in impl.
    pub fn decode<T: Decode>(&self, path: &str, node: &ConfigNode) -> Validated<T> {
        match self.registry.dispatch::<T>(path, node, self) {
            Some(result) => result,
            None => T::decode(path, node, self),
        }
    }

    /// Decodes an absent path as `T`, through [`Decode::absent`].
    pub fn decode_absent<T: Decode>(&self, path: &str) -> Validated<T> {
        T::absent(path, self)
    }

    /// Resolves `segment` against `node`, trying each path mapper in order.
    /// The first mapper whose tokens navigate successfully wins; when none
    /// does, every mapper's errors are concatenated.
    pub fn next_node<'n>(
        &self,
        path: &str,
        segment: &str,
        node: &'n ConfigNode,
    ) -> Validated<&'n ConfigNode> {
        let mut errors = Vec::new();
        for mapper in self.mappers {
            let (tokens, mapper_errors) = mapper.map(path, segment, self.lexer).into_parts();
            errors.extend(mapper_errors);
            if let Some(tokens) = tokens {
                let result = node::navigate(node, &tokens);
                if result.has_results() {
                    return result;
                }
                errors.extend(result.into_parts().1);
            }
        }
        if errors.is_empty() {
            errors.push(ValidationError::NoResultsFoundForNode {
                path: Self::join_path(path, segment),
                kind: "node".into(),
                level: ErrorLevel::MissingValue,
            });
        }
        Validated::errors(errors)
    }

    /// Decodes the field `name` of an object at `path`, appending any
    /// errors. Absent fields go through [`Decode::absent`].
    pub fn field<T: Decode>(
        &self,
        path: &str,
        node: &ConfigNode,
        name: &str,
        errors: &mut Vec<ValidationError>,
    ) -> Option<T> {
        let child_path = Self::join_path(path, name);
        let (found, lookup_errors) = self.next_node(path, name, node).into_parts();
        match found {
            Some(child) => {
                let (value, decode_errors) = self.decode::<T>(&child_path, child).into_parts();
                errors.extend(decode_errors);
                value
            },
            None if lookup_errors.iter().all(ValidationError::is_missing) => {
                let (value, absent_errors) = T::absent(&child_path, self).into_parts();
                errors.extend(absent_errors);
                value
            },
            None => {
                errors.extend(lookup_errors);
                None
            },
        }
    }

    /// Like [`DecodeContext::field`], but an absent field falls back to
    /// `default` with an error at the configured accepted-missing level.
    pub fn field_or<T: Decode>(
        &self,
        path: &str,
        node: &ConfigNode,
        name: &str,
        errors: &mut Vec<ValidationError>,
        default: impl FnOnce() -> T,
    ) -> Option<T> {
        let child_path = Self::join_path(path, name);
        let (found, lookup_errors) = self.next_node(path, name, node).into_parts();
        match found {
            Some(child) => {
                let (value, decode_errors) = self.decode::<T>(&child_path, child).into_parts();
                errors.extend(decode_errors);
                value
            },
            None if lookup_errors.iter().all(ValidationError::is_missing) => {
                errors.push(ValidationError::OptionalMissingValue {
                    path: child_path,
                    kind: type_name::<T>().into(),
                    level: self.optional_missing_level(),
                });
                Some(default())
            },
            None => {
                errors.extend(lookup_errors);
                None
            },
        }
    }

    /// Joins a parent path and a field name.
    #[must_use]
    pub fn join_path(path: &str, field: &str) -> String {
        if path.is_empty() {
            field.to_owned()
        } else {
            format!("{path}.{field}")
        }
    }

    pub(crate) fn missing_error<T>(&self, path: &str) -> ValidationError {
        let level = if self.config.treat_missing_values_as_errors {
            ErrorLevel::Error
        } else {
            ErrorLevel::MissingValue
        };
        ValidationError::NoResultsFoundForNode {
            path: path.to_owned(),
            kind: type_name::<T>().into(),
            level,
        }
    }

    pub(crate) fn optional_missing_level(&self) -> ErrorLevel {
        self.config.log_level_for_missing_values_when_default_or_optional
    }
}
